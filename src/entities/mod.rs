//! Entity module - Contains all SeaORM entity definitions for the database.
//! These entities represent the database tables and their relationships.
//! Each entity has a Model struct for data and an Entity struct for operations.

pub mod ledger_entry;
pub mod mission;
pub mod mission_completion;
pub mod redemption;
pub mod referral_tracking;
pub mod reward;
pub mod user;

// Re-export specific types to avoid conflicts
pub use ledger_entry::{
    Column as LedgerEntryColumn, Entity as LedgerEntry, Model as LedgerEntryModel,
};
pub use mission::{Column as MissionColumn, Entity as Mission, Model as MissionModel};
pub use mission_completion::{
    Column as MissionCompletionColumn, Entity as MissionCompletion,
    Model as MissionCompletionModel,
};
pub use redemption::{Column as RedemptionColumn, Entity as Redemption, Model as RedemptionModel};
pub use referral_tracking::{
    Column as ReferralTrackingColumn, Entity as ReferralTracking, Model as ReferralTrackingModel,
};
pub use reward::{Column as RewardColumn, Entity as Reward, Model as RewardModel};
pub use user::{Column as UserColumn, Entity as User, Model as UserModel};
