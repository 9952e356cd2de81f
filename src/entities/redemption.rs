//! Redemption entity - One row per attempt to spend points on a reward.
//!
//! Created `pending` the instant points are spent, then moved to `fulfilled`
//! or `failed` by the fulfillment step. Failed redemptions keep their points
//! spent and are held for manual review; they are never auto-refunded.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Points spent, fulfillment not yet attempted or in flight
pub const STATUS_PENDING: &str = "pending";
/// Fulfillment delivered successfully
pub const STATUS_FULFILLED: &str = "fulfilled";
/// Fulfillment errored; held for manual review
pub const STATUS_FAILED: &str = "failed";

/// Redemption database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "redemptions")]
pub struct Model {
    /// Unique identifier for the redemption
    #[sea_orm(primary_key)]
    pub id: i64,
    /// User who redeemed
    pub user_id: i64,
    /// The redeemed reward
    pub reward_id: i64,
    /// Points deducted for this redemption
    pub points_spent: i64,
    /// One of `"pending"`, `"fulfilled"`, `"failed"`
    pub status: String,
    /// When fulfillment succeeded, if it has
    pub fulfilled_at: Option<DateTimeUtc>,
    /// Fulfillment details (feature unlocked, processor reference, or the
    /// error that put this row into `failed`)
    pub metadata: Option<Json>,
    /// When the redemption was created
    pub created_at: DateTimeUtc,
}

/// Defines relationships between Redemption and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each redemption belongs to one user
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::UserId",
        to = "super::user::Column::Id"
    )]
    User,
    /// Each redemption belongs to one reward
    #[sea_orm(
        belongs_to = "super::reward::Entity",
        from = "Column::RewardId",
        to = "super::reward::Column::Id"
    )]
    Reward,
}

impl Related<super::user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::User.def()
    }
}

impl Related<super::reward::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Reward.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
