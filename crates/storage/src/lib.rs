#![forbid(unsafe_code)]

pub mod json_file;
pub mod memory;
mod records;
pub mod repository;
pub mod sqlite;

pub use json_file::JsonFileBackend;
pub use memory::InMemoryBackend;
pub use repository::{CollectionStore, Snapshot, StorageError, Store};
pub use sqlite::SqliteBackend;
