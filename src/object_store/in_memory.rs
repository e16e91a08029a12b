use std::collections::BTreeMap;

use crate::{
    error::Error,
    object::{Object, ObjectKind},
    object_id::{identify, ObjectId},
};

use super::ObjectStore;

#[derive(Debug, Default)]
pub struct InMemoryObjectStore {
    objects: BTreeMap<ObjectId, Object>,
}

impl InMemoryObjectStore {
    pub fn new() -> Self {
        Self {
            objects: BTreeMap::new(),
        }
    }
}

impl ObjectStore for InMemoryObjectStore {
    fn has(&self, id: ObjectId) -> Result<bool, Error> {
        Ok(self.objects.contains_key(&id))
    }

    fn read(&self, id: ObjectId) -> Result<Option<Object>, Error> {
        Ok(self.objects.get(&id).cloned())
    }

    fn insert(&mut self, kind: ObjectKind, content: &[u8]) -> Result<ObjectId, Error> {
        let id = identify(kind, content);
        self.objects
            .entry(id)
            .or_insert_with(|| Object::new(kind, content));
        Ok(id)
    }
}

#[test]
fn test_in_memory_object_store() {
    let mut store = InMemoryObjectStore::new();
    let id = store.insert(ObjectKind::Blob, b"hello, world").unwrap();
    assert!(store.has(id).unwrap());
    assert_eq!(store.get(id).unwrap().content, b"hello, world".to_vec());
    assert_eq!(store.insert(ObjectKind::Blob, b"hello, world").unwrap(), id);
    assert!(!store.has(crate::object_id::identify(ObjectKind::Tree, b"hello, world")).unwrap());
}
