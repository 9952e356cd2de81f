//! Reward entity - Catalog of redeemable rewards.
//!
//! `reward_value` carries type-specific parameters as JSON:
//! `{"amount_cents": ...}` for `stripe_credit`, `{"months": ...}` for
//! `free_months`, `{"feature": "..."}` for `feature_unlock`.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Reward type: negative balance transaction at the payment processor
pub const TYPE_STRIPE_CREDIT: &str = "stripe_credit";
/// Reward type: extend the subscription end date
pub const TYPE_FREE_MONTHS: &str = "free_months";
/// Reward type: record a feature unlock for later gating
pub const TYPE_FEATURE_UNLOCK: &str = "feature_unlock";

/// Reward catalog database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "rewards")]
pub struct Model {
    /// Unique identifier for the reward
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Human-readable title
    pub title: String,
    /// Longer description shown in the catalog
    pub description: String,
    /// Points deducted on redemption
    pub points_cost: i64,
    /// One of `"stripe_credit"`, `"free_months"`, `"feature_unlock"`
    pub reward_type: String,
    /// Type-specific parameters
    pub reward_value: Json,
    /// Minimum tier level required to redeem
    pub min_tier: i32,
    /// Display ordering
    pub sort_order: i32,
    /// Inactive rewards are invisible and cannot be redeemed
    pub is_active: bool,
}

/// Defines relationships between Reward and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// One reward has many redemptions
    #[sea_orm(has_many = "super::redemption::Entity")]
    Redemptions,
}

impl Related<super::redemption::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Redemptions.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
