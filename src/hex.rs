use std::fmt::Display;

use serde::{Deserialize, Serialize};

/// A valid hexadecimal encoding of binary data.
#[derive(PartialEq, Eq, Debug, Clone)]
pub struct Hex(pub Vec<u8>);

impl Hex {
    /// Decodes the hex digits back into bytes, returning [`None`] if the
    /// length is odd or a character is not a lowercase hex digit.
    pub fn decode(&self) -> Option<Vec<u8>> {
        fn unhex_digit(h: u8) -> Option<u8> {
            match h {
                b'0'..=b'9' => Some(h - b'0'),
                b'a'..=b'f' => Some(h - b'a' + 10),
                _ => None,
            }
        }

        if self.0.len() % 2 != 0 {
            return None;
        }
        self.0
            .chunks(2)
            .map(|pair| Some((unhex_digit(pair[0])? << 4) | unhex_digit(pair[1])?))
            .collect()
    }
}

impl Serialize for Hex {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        format!("{}", self).serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Hex {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s: String = String::deserialize(deserializer)?;
        let hex = Hex(s.into_bytes());
        if hex.decode().is_none() {
            return Err(serde::de::Error::custom("invalid hex string"));
        }
        Ok(hex)
    }
}

impl Display for Hex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Only ever built from `From<&[u8]>` or validated input, so always ASCII.
        for &b in &self.0 {
            write!(f, "{}", b as char)?;
        }
        Ok(())
    }
}

impl<'a> From<&'a [u8]> for Hex {
    fn from(bytes: &[u8]) -> Self {
        const DIGITS: &[u8; 16] = b"0123456789abcdef";

        let mut out = Vec::with_capacity(bytes.len() * 2);
        for &b in bytes {
            out.push(DIGITS[(b >> 4) as usize]);
            out.push(DIGITS[(b & 0x0f) as usize]);
        }
        Hex(out)
    }
}

#[test]
fn test_hex_round_trip() {
    let example: &[u8] = b"hello, world";
    let hex: Hex = Hex::from(example);
    assert_eq!(hex.decode().as_deref(), Some(example));
}

#[test]
fn test_hex_rejects_bad_digits() {
    assert_eq!(Hex(b"abc".to_vec()).decode(), None);
    assert_eq!(Hex(b"zz".to_vec()).decode(), None);
    assert_eq!(Hex(b"AB".to_vec()).decode(), None);
}

#[test]
fn test_hex_deserialize() {
    let example: &[u8] = b"hello, world";
    let hex: Hex = Hex::from(example);
    let json = serde_json::to_vec(&hex).unwrap();
    let hex_: Hex = serde_json::from_slice(&json).unwrap();
    assert_eq!(hex, hex_);
    assert!(serde_json::from_slice::<Hex>(b"\"xyz\"").is_err());
}
