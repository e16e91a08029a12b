use std::{fmt::Display, str::FromStr};

use crate::{error::Error, object_id::ObjectId};

/// The type tag carried in every object's header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ObjectKind {
    Blob,
    Tree,
    Commit,
}

impl ObjectKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ObjectKind::Blob => "blob",
            ObjectKind::Tree => "tree",
            ObjectKind::Commit => "commit",
        }
    }

    /// The `"<kind> <length>\0"` prefix of an object's preimage.
    pub fn header(&self, len: usize) -> Vec<u8> {
        format!("{} {}\0", self.as_str(), len).into_bytes()
    }
}

impl Display for ObjectKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ObjectKind {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "blob" => Ok(ObjectKind::Blob),
            "tree" => Ok(ObjectKind::Tree),
            "commit" => Ok(ObjectKind::Commit),
            _ => Err(()),
        }
    }
}

/// A typed, immutable payload as held by an object store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Object {
    pub kind: ObjectKind,
    pub content: Vec<u8>,
}

impl Object {
    pub fn new(kind: ObjectKind, content: impl Into<Vec<u8>>) -> Self {
        Self {
            kind,
            content: content.into(),
        }
    }

    /// The full preimage: header followed by the content.
    pub fn encode(&self) -> Vec<u8> {
        let mut preimage = self.kind.header(self.content.len());
        preimage.extend_from_slice(&self.content);
        preimage
    }

    /// Parses a preimage read back for `id`, validating the header's
    /// type tag and declared length.
    pub fn decode(id: ObjectId, mut preimage: Vec<u8>) -> Result<Self, Error> {
        let nul = preimage
            .iter()
            .position(|&b| b == 0)
            .ok_or_else(|| Error::corrupt(id, "missing header delimiter"))?;
        let header = std::str::from_utf8(&preimage[..nul])
            .map_err(|_| Error::corrupt(id, "header is not UTF-8"))?;
        let (kind, len) = header
            .split_once(' ')
            .ok_or_else(|| Error::corrupt(id, format!("malformed header {:?}", header)))?;
        let kind: ObjectKind = kind
            .parse()
            .map_err(|()| Error::corrupt(id, format!("unknown object type {:?}", kind)))?;
        let malformed_len = || Error::corrupt(id, format!("malformed length {:?}", len));
        if len.is_empty() || !len.bytes().all(|b| b.is_ascii_digit()) {
            return Err(malformed_len());
        }
        let len: usize = len.parse().map_err(|_| malformed_len())?;
        let content = preimage.split_off(nul + 1);
        if content.len() != len {
            return Err(Error::corrupt(
                id,
                format!("declared length {} but found {} bytes", len, content.len()),
            ));
        }
        Ok(Object { kind, content })
    }
}

#[test]
fn test_encode_decode() {
    let object = Object::new(ObjectKind::Blob, b"hello".to_vec());
    let preimage = object.encode();
    assert_eq!(preimage, b"blob 5\0hello");
    let id = crate::object_id::identify(object.kind, &object.content);
    assert_eq!(Object::decode(id, preimage).unwrap(), object);
}

#[test]
fn test_decode_rejects_bad_headers() {
    let id = crate::object_id::identify(ObjectKind::Blob, b"");
    for preimage in [
        &b"blob 5hello"[..],
        b"blob\0",
        b"sock 0\0",
        b"blob x\0",
        b"blob 3\0hello",
        b"blob +5\0hello",
        b"blob  5\0hello",
        b"blob \0",
    ] {
        match Object::decode(id, preimage.to_vec()) {
            Err(Error::Corrupt { .. }) => {}
            other => panic!("expected corrupt for {:?}, got {:?}", preimage, other),
        }
    }
}
