//! Referral tracking entity - One row per referred user.
//!
//! The unique index on `referred_id` enforces the first-touch policy: a user
//! can be referred at most once, and the attribution is permanent. Status
//! moves pending → active when the referred user verifies, and → completed
//! once the terminal retention milestone has paid out.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Attribution recorded, referred user not yet verified
pub const STATUS_PENDING: &str = "pending";
/// Referred user verified; milestone checks apply
pub const STATUS_ACTIVE: &str = "active";
/// Terminal retention milestone paid; nothing further accrues
pub const STATUS_COMPLETED: &str = "completed";

/// Referral tracking database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "referral_tracking")]
pub struct Model {
    /// Unique identifier
    #[sea_orm(primary_key)]
    pub id: i64,
    /// The user whose code was used
    pub referrer_id: i64,
    /// The newly signed-up user; unique, first touch wins
    #[sea_orm(unique)]
    pub referred_id: i64,
    /// The code that linked the two
    pub referral_code: String,
    /// One of `"pending"`, `"active"`, `"completed"`
    pub status: String,
    /// When the attribution was created
    pub created_at: DateTimeUtc,
    /// When the terminal milestone fired, if it has
    pub completed_at: Option<DateTimeUtc>,
}

/// `ReferralTracking` references users on both sides; neither direction is
/// the canonical one, so no `Related` impl is defined
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
