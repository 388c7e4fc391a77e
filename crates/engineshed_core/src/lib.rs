//! Core domain logic for the EngineShed inventory.
//! This crate is the single source of truth for collection ordering invariants.

pub mod collection;
pub mod db;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;

pub use collection::memory::{ChildId, MemoryCollectionStore, MemoryStoreError, ParentId};
pub use collection::plan::{is_contiguous, IndexWrite, Slot};
pub use collection::store::{ChangeBatch, ChildState, CollectionStore};
pub use logging::{default_log_level, init_logging, logging_status, LoggingConfig};
pub use model::inventory::{CollectionKind, Model, Purchase, RecordId, Train, TrainMember};
pub use repo::collection_repo::SqliteCollectionRepository;
pub use repo::inventory_repo::{RepoError, RepoResult, SqliteInventoryRepository};
pub use service::collection_service::{
    IndexerError, IndexerResult, OrderedCollectionIndexer, StoreIndexerError,
};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
