#![forbid(unsafe_code)]

pub mod repository;
pub mod sqlite;
pub mod store;

pub use repository::{InMemoryRepository, ProgressRepository, Storage, StorageError};
pub use store::ProgressStore;
