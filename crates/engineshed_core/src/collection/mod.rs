//! Ordered-collection index maintenance.
//!
//! # Responsibility
//! - Plan minimal `index` rewrites for parent-owned ordered children.
//! - Define the storage contract plan results are applied through.
//!
//! # Invariants
//! - Every operation leaves a parent's child indexes contiguous from 0.
//! - Gaps and duplicates are repaired, never reported.

pub mod memory;
pub mod plan;
pub mod store;
