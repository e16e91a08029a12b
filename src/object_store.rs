use crate::{
    error::Error,
    object::{Object, ObjectKind},
    object_id::ObjectId,
};

pub mod directory;
pub mod in_memory;

pub trait ObjectStore {
    fn has(&self, id: ObjectId) -> Result<bool, Error>;

    /// Reads the object stored under `id`, if there is one.
    fn read(&self, id: ObjectId) -> Result<Option<Object>, Error>;

    /// Stores `content` as an object of type `kind`, returning its id.
    /// Storing an object which is already present does nothing.
    fn insert(&mut self, kind: ObjectKind, content: &[u8]) -> Result<ObjectId, Error>;

    /// Like [`ObjectStore::read`], but a missing object is an error.
    fn get(&self, id: ObjectId) -> Result<Object, Error> {
        self.read(id)?.ok_or(Error::ObjectNotFound(id))
    }
}
