use std::path::PathBuf;

use derive_more::{Display, From};

use crate::object_id::ObjectId;

#[derive(Debug, Display, From)]
pub enum Error {
    #[from]
    #[display(fmt = "I/O failure: {}", _0)]
    IO(std::io::Error),
    #[from]
    #[display(fmt = "configuration failure: {}", _0)]
    Serde(serde_json::Error),
    #[display(fmt = "object {} not found", _0)]
    ObjectNotFound(ObjectId),
    #[display(fmt = "object {} is corrupt: {}", id, reason)]
    Corrupt { id: ObjectId, reason: String },
    #[display(fmt = "index is corrupt at line {}: {:?}", line, content)]
    IndexCorrupt { line: usize, content: String },
    #[display(fmt = "commit {} is corrupt: {}", id, reason)]
    CommitCorrupt { id: ObjectId, reason: String },
    #[display(fmt = "reference is corrupt: {}", _0)]
    RefCorrupt(String),
    #[display(fmt = "invalid object id: {:?}", _0)]
    InvalidObjectId(String),
    #[display(fmt = "path cannot be staged: {:?}", _0)]
    InvalidPath(String),
    #[display(fmt = "not a repository: {:?}", _0)]
    NotARepository(PathBuf),
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::IO(err) => Some(err),
            Error::Serde(err) => Some(err),
            _ => None,
        }
    }
}

impl Error {
    pub(crate) fn corrupt(id: ObjectId, reason: impl Into<String>) -> Self {
        Error::Corrupt {
            id,
            reason: reason.into(),
        }
    }

    pub(crate) fn commit_corrupt(id: ObjectId, reason: impl Into<String>) -> Self {
        Error::CommitCorrupt {
            id,
            reason: reason.into(),
        }
    }
}

#[test]
fn test_error_display() {
    let id = crate::object_id::identify(crate::object::ObjectKind::Blob, b"");
    let err = Error::commit_corrupt(id, "missing tree line");
    assert_eq!(
        err.to_string(),
        format!("commit {} is corrupt: missing tree line", id)
    );
    let err: Error = std::io::Error::new(std::io::ErrorKind::Other, "disk full").into();
    assert!(matches!(err, Error::IO(_)));
}
