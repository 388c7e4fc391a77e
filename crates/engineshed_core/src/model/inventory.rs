//! Inventory read models.
//!
//! # Responsibility
//! - Define the purchase/model and train/member records owned by storage.
//! - Name the two ordered relations the indexer maintains.
//!
//! # Invariants
//! - `index` is the only ordering field; row order carries no meaning.
//! - A child with `is_deleted = true` has no owning parent.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Stable identifier for every inventory record.
pub type RecordId = Uuid;

/// One purchase; owns an ordered list of models.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Purchase {
    pub uuid: RecordId,
    pub manufacturer: String,
    pub catalog_number: String,
    /// Epoch ms creation timestamp.
    pub created_at: i64,
    /// Epoch ms update timestamp.
    pub updated_at: i64,
}

/// One model within a purchase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Model {
    pub uuid: RecordId,
    /// Owning purchase, `None` when detached.
    pub purchase_uuid: Option<RecordId>,
    /// Position within the purchase.
    pub index: i16,
    pub model_class: String,
    pub number: String,
    /// Set when the row changed since it was last replicated.
    pub needs_sync: bool,
    pub is_deleted: bool,
}

/// One train; owns an ordered list of members.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Train {
    pub uuid: RecordId,
    pub name: String,
    pub created_at: i64,
    pub updated_at: i64,
}

/// One member vehicle of a train.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrainMember {
    pub uuid: RecordId,
    /// Owning train, `None` when detached.
    pub train_uuid: Option<RecordId>,
    /// Position within the train.
    pub index: i16,
    pub title: String,
    pub needs_sync: bool,
    pub is_deleted: bool,
}

/// Ordered parent/child relation kept by the indexer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CollectionKind {
    /// `Purchase.models`.
    PurchaseModels,
    /// `Train.members`.
    TrainMembers,
}

impl CollectionKind {
    /// All relations, in a stable order.
    pub const ALL: [CollectionKind; 2] = [Self::PurchaseModels, Self::TrainMembers];

    /// Table holding parent rows.
    pub fn parent_table(self) -> &'static str {
        match self {
            Self::PurchaseModels => "purchases",
            Self::TrainMembers => "trains",
        }
    }

    /// Table holding child rows.
    pub fn child_table(self) -> &'static str {
        match self {
            Self::PurchaseModels => "models",
            Self::TrainMembers => "train_members",
        }
    }

    /// Child column referencing the parent.
    pub fn parent_column(self) -> &'static str {
        match self {
            Self::PurchaseModels => "purchase_uuid",
            Self::TrainMembers => "train_uuid",
        }
    }

    /// Stable label used in logs and CLI output.
    pub fn label(self) -> &'static str {
        match self {
            Self::PurchaseModels => "purchase_models",
            Self::TrainMembers => "train_members",
        }
    }
}
