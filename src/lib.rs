//! # Revision Store
//!
//! This is an implementation of a basic content-addressed revision control
//! system: files are staged as blobs, snapshotted into flat trees, and
//! linked into a history of commits, all named by the SHA-1 of their content.

mod hex;

/// Commit objects and their text encoding.
pub mod commit;
/// Per-repository settings.
pub mod config;
/// The `.rev` directory and the operations performed on it.
pub mod dot_rev;
pub mod error;
/// Walking the history of commits.
pub mod history;
/// The staging area.
pub mod index;
mod lock;
mod persist;
/// Typed objects and their on-disk preimage.
pub mod object;
/// Hash-based object identifier.
pub mod object_id;
/// Content addressible store API using the [`object_id::ObjectId`].
pub mod object_store;
/// `HEAD` and branch references.
pub mod refs;
/// Building tree objects out of the staging area.
pub mod snapshot;

pub use error::Error;
