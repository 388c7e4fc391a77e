//! Repository layer over the SQLite inventory.
//!
//! # Responsibility
//! - Isolate SQL details from the indexer and use-case services.
//! - Implement the ordered-collection store contract for inventory relations.
//!
//! # Invariants
//! - Repositories refuse connections that are not fully migrated.
//! - Repository APIs return semantic errors (`NotFound`) in addition to DB
//!   transport errors.

pub mod collection_repo;
pub mod inventory_repo;
