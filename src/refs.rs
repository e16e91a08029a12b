use std::{
    io::ErrorKind,
    path::{Component, Path, PathBuf},
};

use crate::{error::Error, object_id::ObjectId, persist::write_atomic};

const SYMBOLIC_PREFIX: &str = "ref: ";
const BRANCH_PREFIX: &str = "refs/heads/";

/// What `HEAD` points at.
#[derive(PartialEq, Eq, Debug, Clone)]
pub enum Head {
    /// The name of a reference file relative to the repository, e.g. `refs/heads/master`.
    Symbolic(String),
    /// A commit, with no branch to move along.
    Detached(ObjectId),
}

impl Head {
    pub fn branch(name: &str) -> Self {
        Head::Symbolic(format!("{}{}", BRANCH_PREFIX, name))
    }

    /// The branch name, or `None` when detached or pointing outside `refs/heads`.
    pub fn branch_name(&self) -> Option<&str> {
        match self {
            Head::Symbolic(reference) => reference.strip_prefix(BRANCH_PREFIX),
            Head::Detached(_) => None,
        }
    }

    fn parse(text: &str) -> Result<Self, Error> {
        let text = text.trim();
        match text.strip_prefix(SYMBOLIC_PREFIX) {
            Some(reference) => {
                check_reference(reference)?;
                Ok(Head::Symbolic(reference.to_string()))
            }
            None => text
                .parse()
                .map(Head::Detached)
                .map_err(|_| Error::RefCorrupt(format!("HEAD contains {:?}", text))),
        }
    }

    fn render(&self) -> String {
        match self {
            Head::Symbolic(reference) => format!("{}{}", SYMBOLIC_PREFIX, reference),
            Head::Detached(id) => format!("{}\n", id),
        }
    }
}

/// References must stay inside the repository directory.
fn check_reference(reference: &str) -> Result<(), Error> {
    let path = Path::new(reference);
    let escapes = reference.is_empty()
        || path
            .components()
            .any(|component| !matches!(component, Component::Normal(_)));
    if escapes {
        return Err(Error::RefCorrupt(format!("invalid reference {:?}", reference)));
    }
    Ok(())
}

/// Reads a small text file, or `None` if it does not exist. Content that is
/// not UTF-8 is a corrupt reference rather than an I/O failure.
fn read_text(path: &Path, name: &str) -> Result<Option<String>, Error> {
    match std::fs::read(path) {
        Ok(bytes) => String::from_utf8(bytes).map(Some).map_err(|err| {
            Error::RefCorrupt(format!(
                "{} is not UTF-8: {:?}",
                name,
                String::from_utf8_lossy(err.as_bytes())
            ))
        }),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
        Err(err) => Err(err.into()),
    }
}

/// Reads and writes `HEAD` and the reference files it names, rooted at the
/// repository directory.
#[derive(Debug, Clone)]
pub struct Refs {
    root: PathBuf,
}

impl Refs {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    fn head_path(&self) -> PathBuf {
        self.root.join("HEAD")
    }

    /// Reads `HEAD`, or `None` if it does not exist.
    pub fn head(&self) -> Result<Option<Head>, Error> {
        match read_text(&self.head_path(), "HEAD")? {
            Some(text) => Head::parse(&text).map(Some),
            None => Ok(None),
        }
    }

    pub fn set_head(&self, head: &Head) -> Result<(), Error> {
        log::info!("pointing HEAD at {:?}", head);
        write_atomic(&self.head_path(), head.render().as_bytes())?;
        Ok(())
    }

    /// Reads the commit a reference file points at, or `None` if the
    /// reference has not been written yet.
    pub fn read(&self, reference: &str) -> Result<Option<ObjectId>, Error> {
        check_reference(reference)?;
        match read_text(&self.root.join(reference), reference)? {
            Some(text) => text.trim().parse().map(Some).map_err(|_| {
                Error::RefCorrupt(format!("{} contains {:?}", reference, text.trim()))
            }),
            None => Ok(None),
        }
    }

    pub fn write(&self, reference: &str, id: ObjectId) -> Result<(), Error> {
        check_reference(reference)?;
        let path = self.root.join(reference);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        log::info!("updating {} to {}", reference, id);
        write_atomic(&path, format!("{}\n", id).as_bytes())?;
        Ok(())
    }

    /// The commit `HEAD` currently resolves to, if any.
    pub fn resolve_head(&self) -> Result<Option<ObjectId>, Error> {
        match self.head()? {
            None => Ok(None),
            Some(Head::Detached(id)) => Ok(Some(id)),
            Some(Head::Symbolic(reference)) => self.read(&reference),
        }
    }

    /// Moves whatever `HEAD` points at to `id`: the named reference when
    /// symbolic, `HEAD` itself when detached or absent.
    pub fn update_head(&self, id: ObjectId) -> Result<(), Error> {
        match self.head()? {
            Some(Head::Symbolic(reference)) => self.write(&reference, id),
            Some(Head::Detached(_)) | None => self.set_head(&Head::Detached(id)),
        }
    }
}

#[test]
fn test_symbolic_head_resolution() {
    use crate::{object::ObjectKind, object_id::identify};

    let tempdir = tempfile::tempdir().unwrap();
    let refs = Refs::new(tempdir.path().into());
    assert_eq!(refs.head().unwrap(), None);
    assert_eq!(refs.resolve_head().unwrap(), None);

    refs.set_head(&Head::branch("master")).unwrap();
    assert_eq!(
        std::fs::read_to_string(tempdir.path().join("HEAD")).unwrap(),
        "ref: refs/heads/master"
    );
    assert_eq!(refs.head().unwrap().unwrap().branch_name(), Some("master"));
    assert_eq!(refs.resolve_head().unwrap(), None);

    let id = identify(ObjectKind::Commit, b"one");
    refs.update_head(id).unwrap();
    assert_eq!(
        std::fs::read_to_string(tempdir.path().join("refs/heads/master")).unwrap(),
        format!("{}\n", id)
    );
    assert_eq!(refs.resolve_head().unwrap(), Some(id));
    assert_eq!(refs.head().unwrap(), Some(Head::branch("master")));
}

#[test]
fn test_detached_head_updates_itself() {
    use crate::{object::ObjectKind, object_id::identify};

    let tempdir = tempfile::tempdir().unwrap();
    let refs = Refs::new(tempdir.path().into());
    let first = identify(ObjectKind::Commit, b"one");
    let second = identify(ObjectKind::Commit, b"two");
    refs.set_head(&Head::Detached(first)).unwrap();
    assert_eq!(refs.resolve_head().unwrap(), Some(first));
    assert_eq!(refs.head().unwrap().unwrap().branch_name(), None);

    refs.update_head(second).unwrap();
    assert_eq!(refs.head().unwrap(), Some(Head::Detached(second)));
    assert!(!tempdir.path().join("refs").exists());
}

#[test]
fn test_corrupt_references() {
    let tempdir = tempfile::tempdir().unwrap();
    let refs = Refs::new(tempdir.path().into());
    std::fs::write(tempdir.path().join("HEAD"), "garbage").unwrap();
    assert!(matches!(refs.head(), Err(Error::RefCorrupt(_))));

    std::fs::write(tempdir.path().join("HEAD"), "ref: ../outside").unwrap();
    assert!(matches!(refs.head(), Err(Error::RefCorrupt(_))));

    std::fs::write(tempdir.path().join("HEAD"), "ref: refs/heads/master\n").unwrap();
    std::fs::create_dir_all(tempdir.path().join("refs/heads")).unwrap();
    std::fs::write(tempdir.path().join("refs/heads/master"), "not an id\n").unwrap();
    assert!(matches!(refs.resolve_head(), Err(Error::RefCorrupt(_))));
}

#[test]
fn test_non_utf8_references_are_corrupt() {
    let tempdir = tempfile::tempdir().unwrap();
    let refs = Refs::new(tempdir.path().into());
    std::fs::write(tempdir.path().join("HEAD"), b"ref: refs/heads/ma\xffster").unwrap();
    assert!(matches!(refs.head(), Err(Error::RefCorrupt(_))));

    refs.set_head(&Head::branch("master")).unwrap();
    std::fs::create_dir_all(tempdir.path().join("refs/heads")).unwrap();
    std::fs::write(tempdir.path().join("refs/heads/master"), b"\xfe\xff\n").unwrap();
    assert!(matches!(refs.resolve_head(), Err(Error::RefCorrupt(_))));
}

#[test]
fn test_reference_writes_replace_whole_file() {
    use crate::{object::ObjectKind, object_id::identify};

    let tempdir = tempfile::tempdir().unwrap();
    let refs = Refs::new(tempdir.path().into());
    refs.set_head(&Head::branch("master")).unwrap();
    refs.update_head(identify(ObjectKind::Commit, b"one")).unwrap();
    let second = identify(ObjectKind::Commit, b"two");
    refs.update_head(second).unwrap();

    let heads = tempdir.path().join("refs/heads");
    assert_eq!(
        std::fs::read_to_string(heads.join("master")).unwrap(),
        format!("{}\n", second)
    );
    assert_eq!(std::fs::read_dir(&heads).unwrap().count(), 1);
    assert_eq!(std::fs::read_dir(tempdir.path()).unwrap().count(), 2);
}
