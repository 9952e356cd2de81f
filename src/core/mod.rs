//! Core business logic - framework-agnostic ledger, tier, mission, referral,
//! and redemption operations. All point mutations funnel through the ledger
//! module's transactional primitives; the tier module is a read-only consumer.

pub mod ledger;
pub mod mission;
pub mod redemption;
pub mod referral;
pub mod tier;
