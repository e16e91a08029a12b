use crate::{error::Error, hex::Hex, object::ObjectKind};
use serde::{Deserialize, Serialize};
use sha1::{Digest, Sha1};

use std::{fmt::Display, str::FromStr};

/// An identifier for a particular typed piece of binary content.
/// Under the hood, this is a SHA-1 hash of the object's preimage,
/// `"<kind> <length>\0"` followed by the content.
///
/// It is displayed in hexadecimal format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ObjectId([u8; 20]);

/// Number of hexadecimal characters in a displayed [`ObjectId`].
pub const HEX_LEN: usize = 40;

/// Computes the [`ObjectId`] of `content` stored as an object of type `kind`.
pub fn identify(kind: ObjectKind, content: &[u8]) -> ObjectId {
    let mut hasher = Sha1::new();
    hasher.update(kind.header(content.len()));
    hasher.update(content);
    let mut id = [0u8; 20];
    id.copy_from_slice(&hasher.finalize());
    ObjectId(id)
}

impl ObjectId {
    /// The leading hex characters used for display, e.g. in commit summaries.
    pub fn short(&self) -> String {
        let mut s = self.to_string();
        s.truncate(7);
        s
    }

    /// Splits the hex form into its shard directory and file name.
    pub(crate) fn shard(&self) -> (String, String) {
        let mut s = self.to_string();
        let rest = s.split_off(2);
        (s, rest)
    }
}

impl Display for ObjectId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let b: &[u8] = &self.0;
        write!(f, "{}", Hex::from(b))
    }
}

impl FromStr for ObjectId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ObjectId::try_from(&Hex(s.as_bytes().to_vec()))
    }
}

impl TryFrom<&Hex> for ObjectId {
    type Error = Error;

    fn try_from(hex: &Hex) -> Result<Self, Self::Error> {
        let invalid = || Error::InvalidObjectId(String::from_utf8_lossy(&hex.0).into_owned());
        if hex.0.len() != HEX_LEN {
            return Err(invalid());
        }
        let bytes = hex.decode().ok_or_else(invalid)?;
        let mut id = [0u8; 20];
        id.copy_from_slice(&bytes);
        Ok(ObjectId(id))
    }
}

impl Serialize for ObjectId {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        let b: &[u8] = &self.0;
        Hex::from(b).serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for ObjectId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let hex = Hex::deserialize(deserializer)?;
        ObjectId::try_from(&hex).map_err(serde::de::Error::custom)
    }
}

#[test]
fn test_identify_matches_known_digest() {
    // `printf 'Hello, World!\n' | git hash-object --stdin`
    let id = identify(ObjectKind::Blob, b"Hello, World!\n");
    assert_eq!(id.to_string(), "8ab686eafeb1f44702738c8b0f24f2567c36da6d");
    // The empty blob.
    let id = identify(ObjectKind::Blob, b"");
    assert_eq!(id.to_string(), "e69de29bb2d1d6434b8b29ae775ad8c2e48c5391");
}

#[test]
fn test_identify_is_deterministic_and_typed() {
    let a = identify(ObjectKind::Blob, b"same bytes");
    let b = identify(ObjectKind::Blob, b"same bytes");
    let c = identify(ObjectKind::Tree, b"same bytes");
    assert_eq!(a, b);
    assert_ne!(a, c);
}

#[test]
fn test_parse_round_trip() {
    let id = identify(ObjectKind::Commit, b"tree x\n");
    let parsed: ObjectId = id.to_string().parse().unwrap();
    assert_eq!(id, parsed);
    assert!("abc".parse::<ObjectId>().is_err());
    assert!("g".repeat(HEX_LEN).parse::<ObjectId>().is_err());
}

#[test]
fn test_shard() {
    let id = identify(ObjectKind::Blob, b"Hello, World!\n");
    let (dir, file) = id.shard();
    assert_eq!(dir, "8a");
    assert_eq!(file.len(), 38);
    assert_eq!(format!("{}{}", dir, file), id.to_string());
    assert_eq!(id.short(), "8ab686e");
}

#[test]
fn test_serde_as_hex_string() {
    let id = identify(ObjectKind::Blob, b"Hello, World!\n");
    let json = serde_json::to_string(&id).unwrap();
    assert_eq!(json, "\"8ab686eafeb1f44702738c8b0f24f2567c36da6d\"");
    assert_eq!(serde_json::from_str::<ObjectId>(&json).unwrap(), id);
    assert!(serde_json::from_str::<ObjectId>("\"8ab686\"").is_err());
    assert!(serde_json::from_str::<ObjectId>(&format!("\"{}\"", "z".repeat(HEX_LEN))).is_err());
}
