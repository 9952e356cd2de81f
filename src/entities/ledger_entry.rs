//! Ledger entry entity - One immutable row per point-affecting event.
//!
//! Entries are never mutated or deleted in normal operation except the
//! status transitions pending→available (conversion) and pending→expired.
//! The available balance is always derived by aggregating these rows, never
//! stored as a counter.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Entry type for points earned (missions, referral milestones, promos)
pub const TYPE_EARN: &str = "earn";
/// Entry type for points spent on redemptions
pub const TYPE_SPEND: &str = "spend";
/// Entry type for signed admin corrections
pub const TYPE_ADJUSTMENT: &str = "adjustment";

/// Status for provisional entries, not yet spendable
pub const STATUS_PENDING: &str = "pending";
/// Status for spendable entries (and all spends)
pub const STATUS_AVAILABLE: &str = "available";
/// Status for pending entries whose deadline passed unconverted
pub const STATUS_EXPIRED: &str = "expired";

/// Ledger entry database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "ledger_entries")]
pub struct Model {
    /// Unique, monotonically assigned identifier
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Owning user
    pub user_id: i64,
    /// One of `"earn"`, `"spend"`, `"adjustment"`
    pub entry_type: String,
    /// One of `"pending"`, `"available"`, `"expired"`
    pub status: String,
    /// Point magnitude. Positive for earn/spend (sign implied by type);
    /// signed for adjustments
    pub points: i64,
    /// Cause tag (e.g. `"mission_first_upload"`, `"redemption"`, `"admin"`).
    /// Combined with `source_id` and `user_id` this forms the natural
    /// idempotency key for milestone de-duplication
    pub source: String,
    /// Optional secondary key (referred user id, reward id, ...)
    pub source_id: Option<String>,
    /// Free-text annotation (admin reason, mission title, ...)
    pub note: Option<String>,
    /// When set, a still-pending entry expires at this time
    pub expires_at: Option<DateTimeUtc>,
    /// Immutable creation timestamp
    pub created_at: DateTimeUtc,
}

/// Defines relationships between `LedgerEntry` and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each ledger entry belongs to one user
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::UserId",
        to = "super::user::Column::Id"
    )]
    User,
}

impl Related<super::user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::User.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
