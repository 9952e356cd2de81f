//! User entity - The minimal slice of the user record the ledger needs.
//!
//! Authentication and profile data live elsewhere; this table carries the
//! referral code, the code the user signed up with, and the subscription
//! state that retention milestones and free-months fulfillment read.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Subscription status value for a paying, active subscription
pub const SUBSCRIPTION_ACTIVE: &str = "active";
/// Subscription status value for a free-plan user
pub const SUBSCRIPTION_FREE: &str = "free";
/// Subscription status value for a lapsed subscription
pub const SUBSCRIPTION_CANCELED: &str = "canceled";

/// User database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "users")]
pub struct Model {
    /// Unique identifier for the user
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Display name, used in notes and admin tooling
    pub display_name: String,
    /// This user's own referral code, generated on demand
    #[sea_orm(unique)]
    pub referral_code: Option<String>,
    /// The code this user signed up with, stamped at attribution time
    pub referred_by_code: Option<String>,
    /// Subscription status: `"free"`, `"active"`, or `"canceled"`
    pub subscription_status: String,
    /// End of the current paid period, if any
    pub subscription_ends_at: Option<DateTimeUtc>,
    /// When the user record was created
    pub created_at: DateTimeUtc,
}

/// Defines relationships between User and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// One user has many ledger entries
    #[sea_orm(has_many = "super::ledger_entry::Entity")]
    LedgerEntries,
    /// One user has many redemptions
    #[sea_orm(has_many = "super::redemption::Entity")]
    Redemptions,
}

impl Related<super::ledger_entry::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::LedgerEntries.def()
    }
}

impl Related<super::redemption::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Redemptions.def()
    }
}

impl Model {
    /// Whether the user is on a paid subscription that is active at `now`.
    ///
    /// Retention milestones re-check this at award time; a lapsed
    /// subscription disqualifies the milestone even if it once qualified.
    #[must_use]
    pub fn is_paid_and_active(&self, now: DateTimeUtc) -> bool {
        self.subscription_status == SUBSCRIPTION_ACTIVE
            && self.subscription_ends_at.is_none_or(|end| end > now)
    }
}

impl ActiveModelBehavior for ActiveModel {}
