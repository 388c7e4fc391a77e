//! Ordered-collection use-case service.
//!
//! # Responsibility
//! - Validate ownership and position preconditions above the store.
//! - Provide append, remove, move and normalize over one ordered relation.
//!
//! # Invariants
//! - Preconditions are checked before anything is applied to the store.
//! - Each operation applies at most one `ChangeBatch`.
//! - Siblings whose index is already correct are never rewritten.

use crate::collection::plan::{
    plan_append, plan_move, plan_normalize, plan_remove, IndexWrite, PlanError, Slot,
};
use crate::collection::store::{ChangeBatch, ChildState, CollectionStore};
use log::{debug, warn};
use std::error::Error;
use std::fmt::{Debug, Display, Formatter};

/// Errors from ordered-collection operations.
///
/// Every variant except `Store` is a caller defect; none leaves the store
/// partially updated.
#[derive(Debug)]
pub enum IndexerError<P, C, E> {
    /// Parent does not exist.
    ParentNotFound(P),
    /// Child does not exist or is deleted.
    ChildNotFound(C),
    /// Child is detached or owned by another parent.
    ChildNotInParent { child: C, parent: P },
    /// Child to append already has an owner.
    ChildAlreadyAttached { child: C, parent: P },
    /// Move position is outside the collection.
    PositionOutOfRange { position: usize, len: usize },
    /// Collection cannot grow past `i16` indexes.
    CapacityExceeded { len: usize },
    /// Storage-level failure.
    Store(E),
}

impl<P: Display, C: Display, E: Display> Display for IndexerError<P, C, E> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ParentNotFound(id) => write!(f, "collection parent not found: {id}"),
            Self::ChildNotFound(id) => write!(f, "collection child not found: {id}"),
            Self::ChildNotInParent { child, parent } => {
                write!(f, "child {child} does not belong to parent {parent}")
            }
            Self::ChildAlreadyAttached { child, parent } => {
                write!(f, "child {child} is already attached to parent {parent}")
            }
            Self::PositionOutOfRange { position, len } => {
                write!(f, "position {position} out of range for {len} children")
            }
            Self::CapacityExceeded { len } => {
                write!(f, "collection of {len} children exceeds index capacity")
            }
            Self::Store(err) => write!(f, "{err}"),
        }
    }
}

impl<P, C, E> Error for IndexerError<P, C, E>
where
    P: Debug + Display,
    C: Debug + Display,
    E: Error + 'static,
{
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Store(err) => Some(err),
            _ => None,
        }
    }
}

/// Error type produced for store `S`.
pub type StoreIndexerError<S> = IndexerError<
    <S as CollectionStore>::ParentId,
    <S as CollectionStore>::ChildId,
    <S as CollectionStore>::Error,
>;

/// Result type produced for store `S`.
pub type IndexerResult<T, S> = Result<T, StoreIndexerError<S>>;

/// Keeps one ordered relation's `index` fields contiguous.
pub struct OrderedCollectionIndexer<S: CollectionStore> {
    store: S,
}

impl<S: CollectionStore> OrderedCollectionIndexer<S> {
    /// Creates indexer over a store implementation.
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Borrows the underlying store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Mutably borrows the underlying store.
    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    /// Appends a detached child after every existing sibling.
    ///
    /// Returns the index assigned to `child`.
    pub fn append(&mut self, parent: S::ParentId, child: S::ChildId) -> IndexerResult<i16, S> {
        self.ensure_parent(parent)?;
        let state = self.require_child(child)?;
        if let Some(owner) = state.parent {
            return Err(IndexerError::ChildAlreadyAttached {
                child,
                parent: owner,
            });
        }

        let siblings = self.store.children(parent).map_err(store_error::<S>)?;
        let plan = plan_append(siblings).map_err(|err| from_plan::<S>(err, parent))?;
        let rewrites = plan.writes.len();
        let batch = ChangeBatch::reindex(plan.writes).with_attach(Slot::new(child, plan.index));
        self.store
            .apply(parent, &batch)
            .map_err(store_error::<S>)?;

        debug!(
            "event=collection_append module=indexer status=ok parent={} child={} index={} rewrites={}",
            parent, child, plan.index, rewrites
        );
        Ok(plan.index)
    }

    /// Removes `child` from `parent`, deletes it, and closes the gap.
    pub fn remove(&mut self, parent: S::ParentId, child: S::ChildId) -> IndexerResult<(), S> {
        self.ensure_parent(parent)?;
        let state = self.require_child(child)?;
        if state.parent != Some(parent) {
            return Err(IndexerError::ChildNotInParent { child, parent });
        }

        let siblings = self.store.children(parent).map_err(store_error::<S>)?;
        let writes = plan_remove(siblings, child).map_err(|err| from_plan::<S>(err, parent))?;
        let rewrites = writes.len();
        let batch = ChangeBatch::reindex(writes).with_delete(child);
        self.store
            .apply(parent, &batch)
            .map_err(store_error::<S>)?;

        debug!(
            "event=collection_remove module=indexer status=ok parent={} child={} rewrites={}",
            parent, child, rewrites
        );
        Ok(())
    }

    /// Moves the child at position `from` to position `to`.
    ///
    /// Positions are taken over the repaired order, so a collection with
    /// stale gaps is addressed as if it were already contiguous.
    pub fn move_child(
        &mut self,
        parent: S::ParentId,
        from: usize,
        to: usize,
    ) -> IndexerResult<(), S> {
        self.ensure_parent(parent)?;
        let siblings = self.store.children(parent).map_err(store_error::<S>)?;
        let writes = plan_move(siblings, from, to).map_err(|err| from_plan::<S>(err, parent))?;
        let rewrites = writes.len();
        self.apply_writes(parent, writes)?;

        debug!(
            "event=collection_move module=indexer status=ok parent={} from={} to={} rewrites={}",
            parent, from, to, rewrites
        );
        Ok(())
    }

    /// Repairs gaps and duplicates without changing membership.
    ///
    /// Returns the number of children rewritten.
    pub fn normalize(&mut self, parent: S::ParentId) -> IndexerResult<usize, S> {
        self.ensure_parent(parent)?;
        let siblings = self.store.children(parent).map_err(store_error::<S>)?;
        let writes = plan_normalize(siblings).map_err(|err| from_plan::<S>(err, parent))?;
        let rewrites = writes.len();
        self.apply_writes(parent, writes)?;

        if rewrites > 0 {
            warn!(
                "event=collection_normalize module=indexer status=repaired parent={} rewrites={}",
                parent, rewrites
            );
        }
        Ok(rewrites)
    }

    /// Lists children ordered by `index ASC, id ASC`.
    pub fn list_children(&self, parent: S::ParentId) -> IndexerResult<Vec<Slot<S::ChildId>>, S> {
        self.ensure_parent(parent)?;
        let mut children = self.store.children(parent).map_err(store_error::<S>)?;
        children.sort_by(|left, right| {
            left.index
                .cmp(&right.index)
                .then_with(|| left.id.cmp(&right.id))
        });
        Ok(children)
    }

    fn apply_writes(
        &mut self,
        parent: S::ParentId,
        writes: Vec<IndexWrite<S::ChildId>>,
    ) -> IndexerResult<(), S> {
        let batch = ChangeBatch::reindex(writes);
        if batch.is_empty() {
            return Ok(());
        }
        self.store
            .apply(parent, &batch)
            .map_err(store_error::<S>)
    }

    fn ensure_parent(&self, parent: S::ParentId) -> IndexerResult<(), S> {
        if self
            .store
            .contains_parent(parent)
            .map_err(store_error::<S>)?
        {
            return Ok(());
        }
        Err(IndexerError::ParentNotFound(parent))
    }

    fn require_child(&self, child: S::ChildId) -> IndexerResult<ChildState<S::ParentId>, S> {
        self.store
            .find_child(child)
            .map_err(store_error::<S>)?
            .ok_or(IndexerError::ChildNotFound(child))
    }
}

fn store_error<S: CollectionStore>(err: S::Error) -> StoreIndexerError<S> {
    IndexerError::Store(err)
}

fn from_plan<S: CollectionStore>(
    err: PlanError<S::ChildId>,
    parent: S::ParentId,
) -> StoreIndexerError<S> {
    match err {
        PlanError::PositionOutOfRange { position, len } => {
            IndexerError::PositionOutOfRange { position, len }
        }
        PlanError::NotInCollection(child) => IndexerError::ChildNotInParent { child, parent },
        PlanError::CapacityExceeded { len } => IndexerError::CapacityExceeded { len },
    }
}
