use std::{io::Write, path::Path};

use tempfile::NamedTempFile;

/// Creates a temporary file in the directory that will hold `path`, so it can
/// later be renamed into place on the same filesystem. It is deleted when
/// dropped without being persisted.
pub(crate) fn temp_file_for(path: &Path) -> std::io::Result<NamedTempFile> {
    match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => NamedTempFile::new_in(dir),
        _ => NamedTempFile::new_in("."),
    }
}

/// Replaces the contents of `path` with `contents`. Readers see either the
/// old file or the new one, never a partial write.
pub(crate) fn write_atomic(path: &Path, contents: &[u8]) -> std::io::Result<()> {
    let mut file = temp_file_for(path)?;
    file.write_all(contents)?;
    file.as_file().sync_all()?;
    file.persist(path).map_err(|err| err.error)?;
    Ok(())
}

#[test]
fn test_write_atomic_replaces_contents() {
    let tempdir = tempfile::tempdir().unwrap();
    let path = tempdir.path().join("HEAD");
    write_atomic(&path, b"first\n").unwrap();
    write_atomic(&path, b"second\n").unwrap();
    assert_eq!(std::fs::read(&path).unwrap(), b"second\n");
    assert_eq!(std::fs::read_dir(tempdir.path()).unwrap().count(), 1);
}

#[test]
fn test_failed_write_leaves_no_temp_file() {
    let tempdir = tempfile::tempdir().unwrap();
    // A directory in the way makes the final rename fail.
    let blocked = tempdir.path().join("master");
    std::fs::create_dir(&blocked).unwrap();
    std::fs::write(blocked.join("inside"), b"x").unwrap();

    assert!(write_atomic(&blocked, b"id\n").is_err());
    let names: Vec<_> = std::fs::read_dir(tempdir.path())
        .unwrap()
        .map(|entry| entry.unwrap().file_name())
        .collect();
    assert_eq!(names, vec![std::ffi::OsString::from("master")]);
}
