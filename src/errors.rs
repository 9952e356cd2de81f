//! Unified error types for the rewards ledger.
//!
//! Business-rule rejections (insufficient balance, tier gating, referral
//! conflicts) are modeled as dedicated variants so callers can match on them
//! and surface specific messages; they are expected, user-recoverable
//! conditions rather than system failures.

use thiserror::Error;

/// Crate-wide error type.
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration loading or validation failed
    #[error("Configuration error: {message}")]
    Config {
        /// Human-readable description of the problem
        message: String,
    },

    /// Underlying database operation failed
    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    /// I/O error (config files, etc.)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Environment variable lookup failed
    #[error("Environment variable error: {0}")]
    EnvVar(#[from] std::env::VarError),

    /// Referenced user does not exist
    #[error("User {user_id} not found")]
    UserNotFound {
        /// The missing user id
        user_id: i64,
    },

    /// Point amount failed validation (zero, negative where positive is
    /// required, etc.)
    #[error("Invalid point amount: {points}")]
    InvalidPoints {
        /// The rejected amount
        points: i64,
    },

    /// Admin adjustments require a non-empty reason
    #[error("A note is required for point adjustments")]
    EmptyNote,

    /// Spend rejected because the available balance is too low
    #[error("Insufficient points: {required} required, {available} available")]
    InsufficientPoints {
        /// Spendable balance at the time of the check
        available: i64,
        /// Points the operation asked for
        required: i64,
    },

    /// Mission key does not match any active mission
    #[error("Mission '{key}' not found")]
    MissionNotFound {
        /// The unknown mission key
        key: String,
    },

    /// Reward id does not match any active catalog entry
    #[error("Reward {reward_id} not found")]
    RewardNotFound {
        /// The unknown reward id
        reward_id: i64,
    },

    /// Redemption rejected because the user's tier is below the reward's
    /// minimum
    #[error("Tier {required} required, user is tier {current}")]
    TierTooLow {
        /// Minimum tier level the reward demands
        required: i32,
        /// The user's current tier level
        current: i32,
    },

    /// Referral code does not resolve to any user
    #[error("Invalid referral code '{code}'")]
    InvalidReferralCode {
        /// The unrecognized code
        code: String,
    },

    /// A user attempted to redeem their own referral code
    #[error("Self-referral is not allowed")]
    SelfReferral,

    /// The referred user already has a referral attribution (first-touch wins)
    #[error("User {referred_id} is already attributed to a referrer")]
    AlreadyAttributed {
        /// The already-attributed user
        referred_id: i64,
    },

    /// Code generation kept colliding with existing codes
    #[error("Could not generate a unique referral code after {attempts} attempts")]
    ReferralCodeExhausted {
        /// How many attempts were made
        attempts: u32,
    },

    /// Fulfillment of a redemption failed; points stay spent and the
    /// redemption is held in the `failed` state for manual review
    #[error("Fulfillment failed, held for review: {message}")]
    Fulfillment {
        /// What went wrong during fulfillment
        message: String,
    },
}

/// Convenience `Result` type
pub type Result<T> = std::result::Result<T, Error>;
