//! Inventory domain model.
//!
//! # Responsibility
//! - Define the records persisted for purchases, models, trains and members.
//!
//! # Invariants
//! - Every record is identified by a stable `RecordId`.
//! - Deletion is a tombstone flag; ids are never reused.

pub mod inventory;
