//! Arena-backed in-memory collection store.
//!
//! # Responsibility
//! - Hold parents and children in flat arenas with explicit ownership edges.
//! - Track per-child dirty state the way an object-graph context would.
//!
//! # Invariants
//! - A child listed under a parent has that parent as its back-reference.
//! - `has_changes` flips only when a stored value actually changes.
//! - Deleted children keep their id but are invisible to store reads.

use super::plan::Slot;
use super::store::{ChangeBatch, ChildState, CollectionStore};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Arena handle of one parent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ParentId(u32);

/// Arena handle of one child. Handles are issued in creation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ChildId(u32);

impl Display for ParentId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "parent#{}", self.0)
    }
}

impl Display for ChildId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "child#{}", self.0)
    }
}

/// Errors from the in-memory store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MemoryStoreError {
    /// Handle was not issued by this store.
    UnknownParent(ParentId),
    /// Handle was not issued by this store.
    UnknownChild(ChildId),
    /// Child has been deleted.
    DeletedChild(ChildId),
    /// Child is not owned by the parent a batch targets.
    NotOwned { child: ChildId, parent: ParentId },
    /// Child to attach already has an owner.
    AlreadyOwned(ChildId),
}

impl Display for MemoryStoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnknownParent(id) => write!(f, "unknown parent: {id}"),
            Self::UnknownChild(id) => write!(f, "unknown child: {id}"),
            Self::DeletedChild(id) => write!(f, "child is deleted: {id}"),
            Self::NotOwned { child, parent } => write!(f, "{child} is not owned by {parent}"),
            Self::AlreadyOwned(id) => write!(f, "child already has an owner: {id}"),
        }
    }
}

impl Error for MemoryStoreError {}

#[derive(Debug, Default)]
struct ParentRecord {
    children: Vec<ChildId>,
}

#[derive(Debug)]
struct ChildRecord {
    parent: Option<ParentId>,
    index: i16,
    has_changes: bool,
    is_deleted: bool,
}

/// In-memory ordered-collection store.
///
/// Children of one parent are held in attach order; `index` is the ordering
/// field and is never implied by list position.
#[derive(Debug, Default)]
pub struct MemoryCollectionStore {
    parents: Vec<ParentRecord>,
    children: Vec<ChildRecord>,
}

impl MemoryCollectionStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates one parent with no children.
    pub fn create_parent(&mut self) -> ParentId {
        self.parents.push(ParentRecord::default());
        ParentId((self.parents.len() - 1) as u32)
    }

    /// Creates one detached, unsaved child.
    pub fn create_child(&mut self) -> ChildId {
        self.children.push(ChildRecord {
            parent: None,
            index: 0,
            has_changes: true,
            is_deleted: false,
        });
        ChildId((self.children.len() - 1) as u32)
    }

    /// Creates one child already attached at `index`, bypassing the indexer.
    ///
    /// Mirrors records arriving from sync import, where indexes may collide
    /// or leave gaps.
    pub fn insert_unordered(
        &mut self,
        parent: ParentId,
        index: i16,
    ) -> Result<ChildId, MemoryStoreError> {
        self.parent_record(parent)?;
        let child = self.create_child();
        if let Some(record) = self.children.get_mut(child.0 as usize) {
            record.parent = Some(parent);
            record.index = index;
        }
        if let Some(record) = self.parents.get_mut(parent.0 as usize) {
            record.children.push(child);
        }
        Ok(child)
    }

    /// Clears every dirty flag, like committing a context.
    pub fn save(&mut self) {
        for record in &mut self.children {
            record.has_changes = false;
        }
    }

    /// Returns the stored index of a live or deleted child.
    pub fn index_of(&self, child: ChildId) -> Option<i16> {
        self.children.get(child.0 as usize).map(|record| record.index)
    }

    /// Returns the owning parent.
    pub fn parent_of(&self, child: ChildId) -> Option<ParentId> {
        self.children
            .get(child.0 as usize)
            .and_then(|record| record.parent)
    }

    /// Returns whether the child changed since the last `save`.
    pub fn has_changes(&self, child: ChildId) -> bool {
        self.children
            .get(child.0 as usize)
            .is_some_and(|record| record.has_changes)
    }

    /// Returns whether the child has been deleted.
    pub fn is_deleted(&self, child: ChildId) -> bool {
        self.children
            .get(child.0 as usize)
            .is_some_and(|record| record.is_deleted)
    }

    /// Returns the parent's children in attach order.
    pub fn members(&self, parent: ParentId) -> Option<&[ChildId]> {
        self.parents
            .get(parent.0 as usize)
            .map(|record| record.children.as_slice())
    }

    fn parent_record(&self, parent: ParentId) -> Result<&ParentRecord, MemoryStoreError> {
        self.parents
            .get(parent.0 as usize)
            .ok_or(MemoryStoreError::UnknownParent(parent))
    }

    fn live_child(&self, child: ChildId) -> Result<&ChildRecord, MemoryStoreError> {
        let record = self
            .children
            .get(child.0 as usize)
            .ok_or(MemoryStoreError::UnknownChild(child))?;
        if record.is_deleted {
            return Err(MemoryStoreError::DeletedChild(child));
        }
        Ok(record)
    }

    fn ensure_owned(&self, child: ChildId, parent: ParentId) -> Result<(), MemoryStoreError> {
        if self.live_child(child)?.parent != Some(parent) {
            return Err(MemoryStoreError::NotOwned { child, parent });
        }
        Ok(())
    }

    fn validate(
        &self,
        parent: ParentId,
        batch: &ChangeBatch<ChildId>,
    ) -> Result<(), MemoryStoreError> {
        self.parent_record(parent)?;
        for write in &batch.writes {
            self.ensure_owned(write.id, parent)?;
        }
        if let Some(slot) = batch.attach {
            if self.live_child(slot.id)?.parent.is_some() {
                return Err(MemoryStoreError::AlreadyOwned(slot.id));
            }
        }
        if let Some(child) = batch.delete {
            self.ensure_owned(child, parent)?;
        }
        Ok(())
    }

    fn child_mut(&mut self, child: ChildId) -> Result<&mut ChildRecord, MemoryStoreError> {
        self.children
            .get_mut(child.0 as usize)
            .ok_or(MemoryStoreError::UnknownChild(child))
    }
}

impl ChildRecord {
    fn set_index(&mut self, index: i16) {
        if self.index != index {
            self.index = index;
            self.has_changes = true;
        }
    }
}

impl CollectionStore for MemoryCollectionStore {
    type ParentId = ParentId;
    type ChildId = ChildId;
    type Error = MemoryStoreError;

    fn contains_parent(&self, parent: ParentId) -> Result<bool, MemoryStoreError> {
        Ok(self.parents.get(parent.0 as usize).is_some())
    }

    fn children(&self, parent: ParentId) -> Result<Vec<Slot<ChildId>>, MemoryStoreError> {
        let record = self.parent_record(parent)?;
        let mut slots = Vec::with_capacity(record.children.len());
        for child in &record.children {
            slots.push(Slot::new(*child, self.live_child(*child)?.index));
        }
        Ok(slots)
    }

    fn find_child(
        &self,
        child: ChildId,
    ) -> Result<Option<ChildState<ParentId>>, MemoryStoreError> {
        Ok(self
            .children
            .get(child.0 as usize)
            .filter(|record| !record.is_deleted)
            .map(|record| ChildState {
                parent: record.parent,
                index: record.index,
            }))
    }

    fn apply(
        &mut self,
        parent: ParentId,
        batch: &ChangeBatch<ChildId>,
    ) -> Result<(), MemoryStoreError> {
        self.validate(parent, batch)?;

        for write in &batch.writes {
            self.child_mut(write.id)?.set_index(write.to);
        }

        if let Some(slot) = batch.attach {
            let record = self.child_mut(slot.id)?;
            record.parent = Some(parent);
            record.has_changes = true;
            record.set_index(slot.index);
            if let Some(owner) = self.parents.get_mut(parent.0 as usize) {
                owner.children.push(slot.id);
            }
        }

        if let Some(child) = batch.delete {
            let record = self.child_mut(child)?;
            record.parent = None;
            record.is_deleted = true;
            record.has_changes = true;
            if let Some(owner) = self.parents.get_mut(parent.0 as usize) {
                owner.children.retain(|id| *id != child);
            }
        }

        Ok(())
    }
}
