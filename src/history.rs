use serde::{Deserialize, Serialize};

use crate::{
    commit::Commit,
    error::Error,
    object::ObjectKind,
    object_id::ObjectId,
    object_store::ObjectStore,
};

/// One commit as presented by `log`.
#[derive(PartialEq, Eq, Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    pub id: ObjectId,
    pub tree: ObjectId,
    pub parent: Option<ObjectId>,
    pub author: String,
    pub timestamp: i64,
    pub date: String,
    pub message: String,
}

/// Reads and decodes the commit object `id`.
pub fn read_commit<S: ObjectStore>(store: &S, id: ObjectId) -> Result<Commit, Error> {
    let object = store.get(id)?;
    if object.kind != ObjectKind::Commit {
        return Err(Error::commit_corrupt(
            id,
            format!("expected a commit, found a {}", object.kind),
        ));
    }
    Commit::decode(id, &object.content)
}

/// Walks from a commit to the root of its history, newest first.
pub struct History<'a, S> {
    store: &'a S,
    next: Option<ObjectId>,
}

/// Lazily follows parent links starting at `start`.
pub fn walk<S: ObjectStore>(store: &S, start: ObjectId) -> History<'_, S> {
    History::new(store, Some(start))
}

impl<'a, S: ObjectStore> History<'a, S> {
    /// A walk from `start`; empty when there is no starting commit.
    pub fn new(store: &'a S, start: Option<ObjectId>) -> Self {
        History { store, next: start }
    }

    fn entry(&self, id: ObjectId) -> Result<LogEntry, Error> {
        let commit = read_commit(self.store, id)?;
        let date = commit.author.date().ok_or_else(|| {
            Error::commit_corrupt(
                id,
                format!("timestamp {} is out of range", commit.author.timestamp),
            )
        })?;
        Ok(LogEntry {
            id,
            tree: commit.tree,
            parent: commit.parent,
            author: commit.author.identity,
            timestamp: commit.author.timestamp,
            date,
            message: commit.message,
        })
    }
}

impl<'a, S: ObjectStore> Iterator for History<'a, S> {
    type Item = Result<LogEntry, Error>;

    fn next(&mut self) -> Option<Self::Item> {
        let id = self.next.take()?;
        let entry = self.entry(id);
        if let Ok(entry) = &entry {
            self.next = entry.parent;
        }
        Some(entry)
    }
}

#[cfg(test)]
fn chain(store: &mut crate::object_store::in_memory::InMemoryObjectStore, n: usize) -> Vec<ObjectId> {
    use crate::commit::Signature;

    let tree = store.insert(ObjectKind::Tree, b"").unwrap();
    let mut ids = Vec::new();
    for i in 0..n {
        let signature = Signature {
            identity: "alice <alice@example.com>".to_string(),
            timestamp: 1_700_000_000 + i as i64,
        };
        let commit = Commit {
            tree,
            parent: ids.last().copied(),
            author: signature.clone(),
            committer: signature,
            message: format!("commit {}", i),
        };
        ids.push(store.insert(ObjectKind::Commit, &commit.encode()).unwrap());
    }
    ids
}

#[test]
fn test_walk_is_child_to_ancestor() {
    use crate::object_store::in_memory::InMemoryObjectStore;

    let mut store = InMemoryObjectStore::new();
    let ids = chain(&mut store, 4);
    let entries: Vec<LogEntry> = walk(&store, ids[3]).collect::<Result<_, _>>().unwrap();
    assert_eq!(entries.len(), 4);
    let walked: Vec<ObjectId> = entries.iter().map(|entry| entry.id).collect();
    let mut expected = ids.clone();
    expected.reverse();
    assert_eq!(walked, expected);
    assert_eq!(entries[0].message, "commit 3");
    assert_eq!(entries[3].parent, None);
    assert_eq!(entries[0].author, "alice <alice@example.com>");

    // Restartable: the same start gives the same sequence.
    let again: Vec<LogEntry> = walk(&store, ids[3]).collect::<Result<_, _>>().unwrap();
    assert_eq!(entries, again);
}

#[test]
fn test_walk_stops_after_error() {
    use crate::object_store::in_memory::InMemoryObjectStore;

    let mut store = InMemoryObjectStore::new();
    let blob = store.insert(ObjectKind::Blob, b"not a commit").unwrap();
    let mut history = walk(&store, blob);
    assert!(matches!(history.next(), Some(Err(Error::CommitCorrupt { .. }))));
    assert!(history.next().is_none());

    let missing = crate::object_id::identify(ObjectKind::Commit, b"missing");
    let mut history = walk(&store, missing);
    assert!(matches!(history.next(), Some(Err(Error::ObjectNotFound(_)))));
    assert!(history.next().is_none());
}
