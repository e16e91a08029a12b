use std::{collections::BTreeMap, io::ErrorKind, path::PathBuf};

use crate::{error::Error, object_id::ObjectId, persist::write_atomic};

/// The paths staged for the next commit, each pointing at the blob holding
/// the content it had when it was staged.
pub type Entries = BTreeMap<String, ObjectId>;

/// The staging area, persisted as one `"<id> <path>"` line per entry.
#[derive(Debug, Clone)]
pub struct Index {
    path: PathBuf,
}

impl Index {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &PathBuf {
        &self.path
    }

    /// Reads the staged entries. A missing or empty index has none.
    pub fn load(&self) -> Result<Entries, Error> {
        let bytes = match std::fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Entries::new()),
            Err(err) => return Err(err.into()),
        };
        let mut entries = Entries::new();
        for (n, raw) in bytes.split(|&b| b == b'\n').enumerate() {
            if raw.is_empty() {
                continue;
            }
            let line = std::str::from_utf8(raw).map_err(|_| Error::IndexCorrupt {
                line: n + 1,
                content: String::from_utf8_lossy(raw).into_owned(),
            })?;
            let corrupt = || Error::IndexCorrupt {
                line: n + 1,
                content: line.to_string(),
            };
            let (id, path) = line.split_once(' ').ok_or_else(corrupt)?;
            let id: ObjectId = id.parse().map_err(|_| corrupt())?;
            if path.is_empty() {
                return Err(corrupt());
            }
            entries.insert(path.to_string(), id);
        }
        log::debug!("loaded {} index entries from {:?}", entries.len(), self.path);
        Ok(entries)
    }

    /// Overwrites the index with exactly `entries`.
    pub fn save(&self, entries: &Entries) -> Result<(), Error> {
        let mut text = String::new();
        for (path, id) in entries {
            text.push_str(&format!("{} {}\n", id, path));
        }
        write_atomic(&self.path, text.as_bytes())?;
        log::debug!("saved {} index entries to {:?}", entries.len(), self.path);
        Ok(())
    }

    /// Stages `path` as `id`, replacing whatever was staged for it before.
    pub fn stage(&self, path: &str, id: ObjectId) -> Result<(), Error> {
        validate_path(path)?;
        let mut entries = self.load()?;
        if let Some(previous) = entries.insert(path.to_string(), id) {
            log::info!("restaging {} (was {}, now {})", path, previous, id);
        }
        self.save(&entries)
    }

    pub fn clear(&self) -> Result<(), Error> {
        self.save(&Entries::new())
    }
}

/// Paths are stored verbatim in line-oriented formats, so they must not
/// contain line or field separators.
pub fn validate_path(path: &str) -> Result<(), Error> {
    if path.is_empty() || path.contains(['\n', '\r', '\t']) {
        return Err(Error::InvalidPath(path.to_string()));
    }
    Ok(())
}

#[test]
fn test_missing_index_is_empty() {
    let tempdir = tempfile::tempdir().unwrap();
    let index = Index::new(tempdir.path().join("index"));
    assert!(index.load().unwrap().is_empty());
    std::fs::write(index.path(), "").unwrap();
    assert!(index.load().unwrap().is_empty());
}

#[test]
fn test_stage_overwrites() {
    use crate::{object::ObjectKind, object_id::identify};

    let tempdir = tempfile::tempdir().unwrap();
    let index = Index::new(tempdir.path().join("index"));
    let first = identify(ObjectKind::Blob, b"one");
    let second = identify(ObjectKind::Blob, b"two");
    index.stage("notes/a b.txt", first).unwrap();
    index.stage("readme.md", first).unwrap();
    index.stage("notes/a b.txt", second).unwrap();

    let entries = index.load().unwrap();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries["notes/a b.txt"], second);
    assert_eq!(entries["readme.md"], first);

    let text = std::fs::read_to_string(index.path()).unwrap();
    assert_eq!(
        text,
        format!("{} notes/a b.txt\n{} readme.md\n", second, first)
    );

    index.clear().unwrap();
    assert!(index.load().unwrap().is_empty());
}

#[test]
fn test_corrupt_lines() {
    let tempdir = tempfile::tempdir().unwrap();
    let index = Index::new(tempdir.path().join("index"));
    let id = crate::object_id::identify(crate::object::ObjectKind::Blob, b"");

    std::fs::write(index.path(), format!("{} ok.txt\nmissing-separator\n", id)).unwrap();
    match index.load() {
        Err(Error::IndexCorrupt { line, content }) => {
            assert_eq!(line, 2);
            assert_eq!(content, "missing-separator");
        }
        other => panic!("expected corrupt index, got {:?}", other),
    }

    std::fs::write(index.path(), "nothex file.txt\n").unwrap();
    assert!(matches!(index.load(), Err(Error::IndexCorrupt { line: 1, .. })));
}

#[test]
fn test_rejects_unrepresentable_paths() {
    let tempdir = tempfile::tempdir().unwrap();
    let index = Index::new(tempdir.path().join("index"));
    let id = crate::object_id::identify(crate::object::ObjectKind::Blob, b"");
    for path in ["", "a\nb", "tab\there"] {
        assert!(matches!(index.stage(path, id), Err(Error::InvalidPath(_))));
    }
}

#[test]
fn test_non_utf8_line_is_corrupt() {
    let tempdir = tempfile::tempdir().unwrap();
    let index = Index::new(tempdir.path().join("index"));
    let id = crate::object_id::identify(crate::object::ObjectKind::Blob, b"");

    let mut bytes = format!("{} ok.txt\n{} caf", id, id).into_bytes();
    bytes.extend_from_slice(b"\xe9.txt\n");
    std::fs::write(index.path(), bytes).unwrap();
    match index.load() {
        Err(Error::IndexCorrupt { line, content }) => {
            assert_eq!(line, 2);
            assert!(content.ends_with(".txt"));
        }
        other => panic!("expected corrupt index, got {:?}", other),
    }
}

#[test]
fn test_save_replaces_index_file() {
    let tempdir = tempfile::tempdir().unwrap();
    let index = Index::new(tempdir.path().join("index"));
    let id = crate::object_id::identify(crate::object::ObjectKind::Blob, b"");
    index.stage("a.txt", id).unwrap();
    index.stage("b.txt", id).unwrap();
    index.clear().unwrap();
    assert_eq!(std::fs::read(index.path()).unwrap(), b"");
    // Only the index itself remains next to it.
    assert_eq!(std::fs::read_dir(tempdir.path()).unwrap().count(), 1);
}
