//! Persistence contract consumed by the ordered-collection indexer.
//!
//! # Responsibility
//! - Describe the narrow read/write surface the indexer needs from storage.
//! - Carry one operation's staged mutations as a single batch.
//!
//! # Invariants
//! - `CollectionStore::apply` is all-or-nothing: on error no field changed.
//! - Stores must not mark a child dirty unless the batch touches it.

use super::plan::{IndexWrite, Slot};
use std::error::Error;
use std::fmt::{Debug, Display};
use std::hash::Hash;

/// Ownership and ordering state of one live child.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChildState<P> {
    /// Owning parent, `None` when detached.
    pub parent: Option<P>,
    /// Stored index.
    pub index: i16,
}

/// Mutations staged by one indexer operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeBatch<Id> {
    /// Sibling index rewrites.
    pub writes: Vec<IndexWrite<Id>>,
    /// Detached child to attach under the parent at the given index.
    pub attach: Option<Slot<Id>>,
    /// Child to detach from the parent and mark deleted.
    pub delete: Option<Id>,
}

impl<Id> ChangeBatch<Id> {
    /// Creates a batch holding only index rewrites.
    pub fn reindex(writes: Vec<IndexWrite<Id>>) -> Self {
        Self {
            writes,
            attach: None,
            delete: None,
        }
    }

    /// Adds an attach step.
    pub fn with_attach(mut self, slot: Slot<Id>) -> Self {
        self.attach = Some(slot);
        self
    }

    /// Adds a detach-and-delete step.
    pub fn with_delete(mut self, id: Id) -> Self {
        self.delete = Some(id);
        self
    }

    /// Returns whether applying this batch would change nothing.
    pub fn is_empty(&self) -> bool {
        self.writes.is_empty() && self.attach.is_none() && self.delete.is_none()
    }
}

/// Storage surface for one parent/child ordered relation.
pub trait CollectionStore {
    /// Parent identity.
    type ParentId: Copy + Eq + Hash + Debug + Display;
    /// Child identity. `Ord` is the tie-break for duplicate indexes.
    type ChildId: Copy + Ord + Hash + Debug + Display;
    /// Storage failure.
    type Error: Error + 'static;

    /// Returns whether the parent exists.
    fn contains_parent(&self, parent: Self::ParentId) -> Result<bool, Self::Error>;
    /// Lists live children of one parent, in any order.
    fn children(&self, parent: Self::ParentId) -> Result<Vec<Slot<Self::ChildId>>, Self::Error>;
    /// Loads one live child, or `None` when unknown or deleted.
    fn find_child(
        &self,
        child: Self::ChildId,
    ) -> Result<Option<ChildState<Self::ParentId>>, Self::Error>;
    /// Applies one staged batch atomically.
    fn apply(
        &mut self,
        parent: Self::ParentId,
        batch: &ChangeBatch<Self::ChildId>,
    ) -> Result<(), Self::Error>;
}
