//! Index planning for parent-owned ordered collections.
//!
//! # Responsibility
//! - Compute the `index` rewrites needed by append, remove and move.
//! - Repair gaps and duplicates found anywhere in a sibling snapshot.
//!
//! # Invariants
//! - Applying a plan leaves sibling indexes at exactly `0..n-1`.
//! - A sibling whose stored index already equals its position is never
//!   part of the write set.
//! - Siblings are ordered by `index ASC, id ASC`.

use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Debug, Display, Formatter};

/// Ordering state of one child, as read from the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Slot<Id> {
    /// Child identity.
    pub id: Id,
    /// Stored position among siblings.
    pub index: i16,
}

impl<Id> Slot<Id> {
    /// Creates one slot.
    pub fn new(id: Id, index: i16) -> Self {
        Self { id, index }
    }
}

/// One staged index rewrite.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexWrite<Id> {
    /// Child to rewrite.
    pub id: Id,
    /// Index currently stored.
    pub from: i16,
    /// Index to store.
    pub to: i16,
}

/// Result of planning an append.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppendPlan<Id> {
    /// Repairs for existing siblings.
    pub writes: Vec<IndexWrite<Id>>,
    /// Index assigned to the appended child.
    pub index: i16,
}

pub type PlanResult<T, Id> = Result<T, PlanError<Id>>;

/// Precondition violations detected while planning.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlanError<Id> {
    /// Requested position is outside `0..len`.
    PositionOutOfRange { position: usize, len: usize },
    /// Child is not part of the sibling snapshot.
    NotInCollection(Id),
    /// Collection would hold more children than `i16` can index.
    CapacityExceeded { len: usize },
}

impl<Id: Display> Display for PlanError<Id> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::PositionOutOfRange { position, len } => {
                write!(f, "position {position} out of range for {len} children")
            }
            Self::NotInCollection(id) => write!(f, "child is not in collection: {id}"),
            Self::CapacityExceeded { len } => {
                write!(f, "collection of {len} children exceeds index capacity")
            }
        }
    }
}

impl<Id: Debug + Display> Error for PlanError<Id> {}

/// Plans repairs only, leaving membership unchanged.
pub fn plan_normalize<Id: Ord + Copy>(
    siblings: Vec<Slot<Id>>,
) -> PlanResult<Vec<IndexWrite<Id>>, Id> {
    let ordered = sort_siblings(siblings);
    diff_positions(&ordered)
}

/// Plans appending one child after every existing sibling.
///
/// Existing siblings are repaired to their sorted position; the new child
/// takes the post-repair count as its index.
pub fn plan_append<Id: Ord + Copy>(siblings: Vec<Slot<Id>>) -> PlanResult<AppendPlan<Id>, Id> {
    let ordered = sort_siblings(siblings);
    let len = ordered.len();
    let index = position_to_index(len).ok_or(PlanError::CapacityExceeded { len: len + 1 })?;
    Ok(AppendPlan {
        writes: diff_positions(&ordered)?,
        index,
    })
}

/// Plans removing `removed` and closing the gap it leaves.
///
/// Siblings ordered before the removed child keep their index when they are
/// already contiguous.
pub fn plan_remove<Id: Ord + Copy>(
    siblings: Vec<Slot<Id>>,
    removed: Id,
) -> PlanResult<Vec<IndexWrite<Id>>, Id> {
    let before = siblings.len();
    let remaining: Vec<Slot<Id>> = siblings
        .into_iter()
        .filter(|slot| slot.id != removed)
        .collect();
    if remaining.len() == before {
        return Err(PlanError::NotInCollection(removed));
    }

    let ordered = sort_siblings(remaining);
    diff_positions(&ordered)
}

/// Plans moving the child at position `from` to position `to`.
///
/// Positions refer to the repaired order. Children strictly between the two
/// positions shift one slot toward the vacated position.
pub fn plan_move<Id: Ord + Copy>(
    siblings: Vec<Slot<Id>>,
    from: usize,
    to: usize,
) -> PlanResult<Vec<IndexWrite<Id>>, Id> {
    let len = siblings.len();
    for position in [from, to] {
        if position >= len {
            return Err(PlanError::PositionOutOfRange { position, len });
        }
    }

    let mut ordered = sort_siblings(siblings);
    let moved = ordered.remove(from);
    ordered.insert(to, moved);
    diff_positions(&ordered)
}

/// Returns whether `indexes` is exactly `0..n-1` with no duplicates.
pub fn is_contiguous(indexes: impl IntoIterator<Item = i16>) -> bool {
    let mut values: Vec<i16> = indexes.into_iter().collect();
    values.sort_unstable();
    values
        .iter()
        .enumerate()
        .all(|(position, value)| usize::try_from(*value).ok() == Some(position))
}

fn sort_siblings<Id: Ord + Copy>(mut siblings: Vec<Slot<Id>>) -> Vec<Slot<Id>> {
    siblings.sort_by(|left, right| {
        left.index
            .cmp(&right.index)
            .then_with(|| left.id.cmp(&right.id))
    });
    siblings
}

fn diff_positions<Id: Copy>(ordered: &[Slot<Id>]) -> PlanResult<Vec<IndexWrite<Id>>, Id> {
    let mut writes = Vec::new();
    for (position, slot) in ordered.iter().enumerate() {
        let to = position_to_index(position)
            .ok_or(PlanError::CapacityExceeded { len: ordered.len() })?;
        if slot.index != to {
            writes.push(IndexWrite {
                id: slot.id,
                from: slot.index,
                to,
            });
        }
    }
    Ok(writes)
}

fn position_to_index(position: usize) -> Option<i16> {
    i16::try_from(position).ok()
}
