use std::{
    fs::{create_dir, create_dir_all},
    io::{ErrorKind, Read, Write},
    path::PathBuf,
};

use flate2::{read::ZlibDecoder, write::ZlibEncoder, Compression};

use crate::{
    error::Error,
    object::{Object, ObjectKind},
    object_id::{identify, ObjectId},
    persist::temp_file_for,
};

use super::ObjectStore;

/// A persistent [`ObjectStore`] stored in a directory,
/// using the first two hexadecimal characters of the [`ObjectId`]
/// to determine which directory to place the object in
/// and creating a file with the rest of the hexadecimal characters
/// as the file name. Each file holds the zlib-compressed preimage.
#[derive(Debug, Clone)]
pub struct DirectoryObjectStore {
    root: PathBuf,
}

impl DirectoryObjectStore {
    pub fn new(root: PathBuf) -> Result<Self, std::io::Error> {
        if !root.try_exists()? {
            log::info!("creating directory store root: {:?}", root);
            create_dir_all(&root)?;
        }
        Ok(Self { root })
    }

    pub fn root(&self) -> &PathBuf {
        &self.root
    }

    fn path(&self, id: ObjectId) -> PathBuf {
        let (subdir, filename) = id.shard();
        self.root.join(subdir).join(filename)
    }
}

impl ObjectStore for DirectoryObjectStore {
    fn has(&self, id: ObjectId) -> Result<bool, Error> {
        log::debug!("checking whether {} is contained in {:?}", id, self.root);
        Ok(self.path(id).try_exists()?)
    }

    fn read(&self, id: ObjectId) -> Result<Option<Object>, Error> {
        log::debug!("reading {} from {:?}", id, self.root);
        let compressed = match std::fs::read(self.path(id)) {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err.into()),
        };
        let mut preimage = Vec::new();
        ZlibDecoder::new(compressed.as_slice())
            .read_to_end(&mut preimage)
            .map_err(|err| Error::corrupt(id, format!("decompression failed: {}", err)))?;
        Object::decode(id, preimage).map(Some)
    }

    fn insert(&mut self, kind: ObjectKind, content: &[u8]) -> Result<ObjectId, Error> {
        let id = identify(kind, content);
        let (subdir, filename) = id.shard();
        let subdir_path = self.root.join(subdir);
        let path = subdir_path.join(&filename);
        if path.try_exists()? {
            log::debug!("{:?} already exists", path);
            return Ok(id);
        }
        if !subdir_path.try_exists()? {
            log::debug!("creating subdir path {:?} in {:?}", subdir_path, self.root);
            match create_dir(&subdir_path) {
                Err(err) if err.kind() != ErrorKind::AlreadyExists => return Err(err.into()),
                _ => {}
            }
        }
        log::info!("inserting {} {} ({} bytes) into {:?}", kind, id, content.len(), self.root);

        let mut encoder = ZlibEncoder::new(temp_file_for(&path)?, Compression::default());
        encoder.write_all(&kind.header(content.len()))?;
        encoder.write_all(content)?;
        let file = encoder.finish()?;
        file.as_file().sync_all()?;
        file.persist(&path).map_err(|err| err.error)?;
        Ok(id)
    }
}

#[test]
fn test_directory_object_store() {
    let tempdir = tempfile::tempdir().unwrap();
    let mut store = DirectoryObjectStore::new(tempdir.path().join("objects")).unwrap();
    let id = store.insert(ObjectKind::Blob, b"hello, world").unwrap();
    assert!(store.has(id).unwrap());
    assert_eq!(
        store.get(id).unwrap(),
        Object::new(ObjectKind::Blob, b"hello, world".to_vec())
    );
}

#[test]
fn test_insert_is_idempotent() {
    let tempdir = tempfile::tempdir().unwrap();
    let mut store = DirectoryObjectStore::new(tempdir.path().into()).unwrap();
    let first = store.insert(ObjectKind::Blob, b"Hello, World!\n").unwrap();
    let second = store.insert(ObjectKind::Blob, b"Hello, World!\n").unwrap();
    assert_eq!(first, second);

    let (subdir, filename) = first.shard();
    let files: Vec<_> = std::fs::read_dir(tempdir.path().join(&subdir))
        .unwrap()
        .map(|entry| entry.unwrap().file_name())
        .collect();
    assert_eq!(files, vec![std::ffi::OsString::from(filename)]);
}

#[test]
fn test_stored_file_is_zlib_preimage() {
    let tempdir = tempfile::tempdir().unwrap();
    let mut store = DirectoryObjectStore::new(tempdir.path().into()).unwrap();
    let id = store.insert(ObjectKind::Tree, b"entries").unwrap();
    let (subdir, filename) = id.shard();
    let compressed = std::fs::read(tempdir.path().join(subdir).join(filename)).unwrap();
    let mut preimage = Vec::new();
    ZlibDecoder::new(compressed.as_slice())
        .read_to_end(&mut preimage)
        .unwrap();
    assert_eq!(preimage, b"tree 7\0entries");
}

#[test]
fn test_missing_and_corrupt_objects() {
    let tempdir = tempfile::tempdir().unwrap();
    let store = DirectoryObjectStore::new(tempdir.path().into()).unwrap();
    let id = identify(ObjectKind::Blob, b"never stored");
    assert!(!store.has(id).unwrap());
    assert!(matches!(store.get(id), Err(Error::ObjectNotFound(missing)) if missing == id));

    let (subdir, filename) = id.shard();
    std::fs::create_dir(tempdir.path().join(&subdir)).unwrap();
    std::fs::write(tempdir.path().join(&subdir).join(&filename), b"not zlib").unwrap();
    assert!(matches!(store.get(id), Err(Error::Corrupt { .. })));

    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(b"blob without delimiter").unwrap();
    std::fs::write(
        tempdir.path().join(&subdir).join(&filename),
        encoder.finish().unwrap(),
    )
    .unwrap();
    assert!(matches!(store.get(id), Err(Error::Corrupt { .. })));
}

#[test]
fn test_insert_leaves_only_objects() {
    let tempdir = tempfile::tempdir().unwrap();
    let mut store = DirectoryObjectStore::new(tempdir.path().into()).unwrap();
    let ids: Vec<ObjectId> = (0..16)
        .map(|i| store.insert(ObjectKind::Blob, format!("blob {}", i).as_bytes()).unwrap())
        .collect();
    let mut stored = 0;
    for shard in std::fs::read_dir(tempdir.path()).unwrap() {
        for file in std::fs::read_dir(shard.unwrap().path()).unwrap() {
            let name = file.unwrap().file_name().into_string().unwrap();
            assert_eq!(name.len(), 38, "unexpected file {:?}", name);
            stored += 1;
        }
    }
    assert_eq!(stored, ids.len());
}
