
use chrono::{FixedOffset, Local, TimeZone};

use crate::{error::Error, object_id::ObjectId};

/// Layout used when rendering commit dates, e.g. `Mon Oct 19 14:03:11 2026 +0200`.
pub const DATE_FORMAT: &str = "%a %b %d %H:%M:%S %Y %z";

/// Who made a change, and when (seconds since the Unix epoch).
#[derive(PartialEq, Eq, Debug, Clone)]
pub struct Signature {
    pub identity: String,
    pub timestamp: i64,
}

impl Signature {
    fn parse(id: ObjectId, field: &str, value: &str) -> Result<Self, Error> {
        let (identity, timestamp) = value
            .rsplit_once(' ')
            .ok_or_else(|| Error::commit_corrupt(id, format!("{} has no timestamp", field)))?;
        let timestamp = timestamp.parse().map_err(|_| {
            Error::commit_corrupt(id, format!("{} has a malformed timestamp {:?}", field, timestamp))
        })?;
        Ok(Signature {
            identity: identity.to_string(),
            timestamp,
        })
    }

    /// Renders the timestamp in the local time zone.
    pub fn date(&self) -> Option<String> {
        let when = Local.timestamp_opt(self.timestamp, 0).single()?;
        Some(when.format(DATE_FORMAT).to_string())
    }

    /// Renders the timestamp at a fixed UTC offset.
    pub fn date_at(&self, offset: FixedOffset) -> Option<String> {
        let when = offset.timestamp_opt(self.timestamp, 0).single()?;
        Some(when.format(DATE_FORMAT).to_string())
    }
}

/// A decoded commit object.
#[derive(PartialEq, Eq, Debug, Clone)]
pub struct Commit {
    pub tree: ObjectId,
    pub parent: Option<ObjectId>,
    pub author: Signature,
    pub committer: Signature,
    pub message: String,
}

impl Commit {
    pub fn encode(&self) -> Vec<u8> {
        let mut body = String::new();
        body.push_str(&format!("tree {}\n", self.tree));
        if let Some(parent) = self.parent {
            body.push_str(&format!("parent {}\n", parent));
        }
        body.push_str(&format!(
            "author {} {}\n",
            self.author.identity, self.author.timestamp
        ));
        body.push_str(&format!(
            "committer {} {}\n",
            self.committer.identity, self.committer.timestamp
        ));
        body.push('\n');
        body.push_str(&format!("{}\n", self.message));
        body.into_bytes()
    }

    /// Parses the body of the commit object `id`. Headers come first, one
    /// per line, then a blank line and the message.
    pub fn decode(id: ObjectId, body: &[u8]) -> Result<Self, Error> {
        let text = std::str::from_utf8(body)
            .map_err(|_| Error::commit_corrupt(id, "commit is not UTF-8"))?;
        let (headers, message) = text
            .split_once("\n\n")
            .ok_or_else(|| Error::commit_corrupt(id, "missing blank line before message"))?;

        let mut tree = None;
        let mut parent = None;
        let mut author = None;
        let mut committer = None;
        for line in headers.lines() {
            let (field, value) = line
                .split_once(' ')
                .ok_or_else(|| Error::commit_corrupt(id, format!("malformed header {:?}", line)))?;
            let duplicate = match field {
                "tree" => tree.replace(parse_id(id, field, value)?).is_some(),
                "parent" => parent.replace(parse_id(id, field, value)?).is_some(),
                "author" => author.replace(Signature::parse(id, field, value)?).is_some(),
                "committer" => committer.replace(Signature::parse(id, field, value)?).is_some(),
                _ => return Err(Error::commit_corrupt(id, format!("unknown header {:?}", field))),
            };
            if duplicate {
                return Err(Error::commit_corrupt(id, format!("repeated {} header", field)));
            }
        }

        let missing = |field: &str| Error::commit_corrupt(id, format!("missing {} header", field));
        Ok(Commit {
            tree: tree.ok_or_else(|| missing("tree"))?,
            parent,
            author: author.ok_or_else(|| missing("author"))?,
            committer: committer.ok_or_else(|| missing("committer"))?,
            message: message.strip_suffix('\n').unwrap_or(message).to_string(),
        })
    }
}

fn parse_id(id: ObjectId, field: &str, value: &str) -> Result<ObjectId, Error> {
    value
        .parse()
        .map_err(|_| Error::commit_corrupt(id, format!("{} is not an object id: {:?}", field, value)))
}

#[cfg(test)]
fn sample(parent: Option<ObjectId>) -> Commit {
    use crate::{object::ObjectKind, object_id::identify};

    let signature = Signature {
        identity: "alice <alice@example.com>".to_string(),
        timestamp: 1_700_000_000,
    };
    Commit {
        tree: identify(ObjectKind::Tree, b""),
        parent,
        author: signature.clone(),
        committer: signature,
        message: "Initial commit".to_string(),
    }
}

#[test]
fn test_encode_layout() {
    let commit = sample(None);
    let text = String::from_utf8(commit.encode()).unwrap();
    assert_eq!(
        text,
        format!(
            "tree {}\nauthor alice <alice@example.com> 1700000000\ncommitter alice <alice@example.com> 1700000000\n\nInitial commit\n",
            commit.tree
        )
    );
}

#[test]
fn test_decode_with_parent_and_multiline_message() {
    use crate::{object::ObjectKind, object_id::identify};

    let mut commit = sample(Some(identify(ObjectKind::Commit, b"parent")));
    commit.message = "Subject\n\nLonger body.".to_string();
    let id = identify(ObjectKind::Commit, &commit.encode());
    assert_eq!(Commit::decode(id, &commit.encode()).unwrap(), commit);
}

#[test]
fn test_decode_fails_closed() {
    use crate::{object::ObjectKind, object_id::identify};

    let id = identify(ObjectKind::Commit, b"");
    let tree = identify(ObjectKind::Tree, b"");
    let bodies = [
        "author a 1\ncommitter a 1\n\nmissing tree\n".to_string(),
        format!("tree {}\ncommitter a 1\n\nmissing author\n", tree),
        format!("tree {}\nauthor a 1\ncommitter a 1\nno separator\n", tree),
        format!("tree {}\nauthor a yesterday\ncommitter a 1\n\nbad time\n", tree),
        format!("tree {}\nauthor a\ncommitter a 1\n\nno time\n", tree),
        format!("tree {}\ntree {}\nauthor a 1\ncommitter a 1\n\ntwice\n", tree, tree),
        "tree abc\nauthor a 1\ncommitter a 1\n\nbad id\n".to_string(),
    ];
    for body in bodies {
        match Commit::decode(id, body.as_bytes()) {
            Err(Error::CommitCorrupt { .. }) => {}
            other => panic!("expected corrupt commit for {:?}, got {:?}", body, other),
        }
    }
}

#[test]
fn test_date_rendering() {
    let signature = Signature {
        identity: "alice".to_string(),
        timestamp: 0,
    };
    assert_eq!(
        signature.date_at(FixedOffset::east_opt(0).unwrap()).unwrap(),
        "Thu Jan 01 00:00:00 1970 +0000"
    );
    assert_eq!(
        signature
            .date_at(FixedOffset::east_opt(2 * 3600).unwrap())
            .unwrap(),
        "Thu Jan 01 02:00:00 1970 +0200"
    );
}
