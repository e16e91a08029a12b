use crate::{
    error::Error,
    index::Entries,
    object::ObjectKind,
    object_id::ObjectId,
    object_store::ObjectStore,
};

/// File mode recorded for every entry; executable bits and symlinks are not tracked.
pub const REGULAR_FILE_MODE: &str = "100644";

/// One line of a tree object.
#[derive(PartialEq, Eq, Debug, Clone)]
pub struct TreeEntry {
    pub mode: String,
    pub kind: ObjectKind,
    pub id: ObjectId,
    pub path: String,
}

/// A flat snapshot of staged paths, sorted by path.
#[derive(PartialEq, Eq, Debug, Clone, Default)]
pub struct Tree {
    pub entries: Vec<TreeEntry>,
}

impl From<&Entries> for Tree {
    fn from(staged: &Entries) -> Self {
        // BTreeMap iteration is already ordered by path.
        let entries = staged
            .iter()
            .map(|(path, id)| TreeEntry {
                mode: REGULAR_FILE_MODE.to_string(),
                kind: ObjectKind::Blob,
                id: *id,
                path: path.clone(),
            })
            .collect();
        Tree { entries }
    }
}

impl Tree {
    pub fn encode(&self) -> Vec<u8> {
        let mut body = String::new();
        for entry in &self.entries {
            body.push_str(&format!(
                "{} {} {}\t{}\n",
                entry.mode, entry.kind, entry.id, entry.path
            ));
        }
        body.into_bytes()
    }

    /// Parses the body of the tree object `id`.
    pub fn decode(id: ObjectId, body: &[u8]) -> Result<Self, Error> {
        let text = std::str::from_utf8(body).map_err(|_| Error::corrupt(id, "tree is not UTF-8"))?;
        let mut entries = Vec::new();
        for line in text.lines() {
            let bad_line = || Error::corrupt(id, format!("malformed tree entry {:?}", line));
            let (meta, path) = line.split_once('\t').ok_or_else(bad_line)?;
            let mut fields = meta.splitn(3, ' ');
            let (Some(mode), Some(kind), Some(entry_id)) =
                (fields.next(), fields.next(), fields.next())
            else {
                return Err(bad_line());
            };
            entries.push(TreeEntry {
                mode: mode.to_string(),
                kind: kind.parse().map_err(|()| bad_line())?,
                id: entry_id.parse().map_err(|_| bad_line())?,
                path: path.to_string(),
            });
        }
        Ok(Tree { entries })
    }

    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|entry| entry.path.as_str())
    }
}

/// Stores the staged entries as a tree object and returns its id.
pub fn build<S: ObjectStore>(store: &mut S, staged: &Entries) -> Result<ObjectId, Error> {
    let tree = Tree::from(staged);
    let id = store.insert(ObjectKind::Tree, &tree.encode())?;
    log::info!("built tree {} with {} entries", id, tree.entries.len());
    Ok(id)
}

/// Reads back the tree object `id`.
pub fn read_tree<S: ObjectStore>(store: &S, id: ObjectId) -> Result<Tree, Error> {
    let object = store.get(id)?;
    if object.kind != ObjectKind::Tree {
        return Err(Error::corrupt(id, format!("expected a tree, found a {}", object.kind)));
    }
    Tree::decode(id, &object.content)
}

#[test]
fn test_tree_is_order_independent() {
    use crate::{object_id::identify, object_store::in_memory::InMemoryObjectStore};

    let x = identify(ObjectKind::Blob, b"x");
    let y = identify(ObjectKind::Blob, b"y");
    let mut store = InMemoryObjectStore::new();

    let mut first = Entries::new();
    first.insert("b.txt".to_string(), x);
    first.insert("a.txt".to_string(), y);
    let mut second = Entries::new();
    second.insert("a.txt".to_string(), y);
    second.insert("b.txt".to_string(), x);

    assert_eq!(build(&mut store, &first).unwrap(), build(&mut store, &second).unwrap());
}

#[test]
fn test_tree_body_format() {
    use crate::{object_id::identify, object_store::in_memory::InMemoryObjectStore};

    let x = identify(ObjectKind::Blob, b"x");
    let y = identify(ObjectKind::Blob, b"y");
    let mut staged = Entries::new();
    staged.insert("z.txt".to_string(), x);
    staged.insert("dir/a.txt".to_string(), y);

    let mut store = InMemoryObjectStore::new();
    let id = build(&mut store, &staged).unwrap();
    let object = store.get(id).unwrap();
    assert_eq!(object.kind, ObjectKind::Tree);
    assert_eq!(
        String::from_utf8(object.content).unwrap(),
        format!("100644 blob {}\tdir/a.txt\n100644 blob {}\tz.txt\n", y, x)
    );

    let tree = read_tree(&store, id).unwrap();
    assert_eq!(tree, Tree::from(&staged));
    assert_eq!(tree.paths().collect::<Vec<_>>(), vec!["dir/a.txt", "z.txt"]);
}

#[test]
fn test_decode_rejects_malformed_entries() {
    let id = crate::object_id::identify(ObjectKind::Tree, b"");
    assert!(matches!(
        Tree::decode(id, b"100644 blob nothex\tpath\n"),
        Err(Error::Corrupt { .. })
    ));
    assert!(matches!(
        Tree::decode(id, b"100644 blob no-tab\n"),
        Err(Error::Corrupt { .. })
    ));
}
