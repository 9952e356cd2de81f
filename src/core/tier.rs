//! Tier calculator - Derives a tier from lifetime-earned points.
//!
//! Thresholds are fixed and evaluated in ascending order; the last satisfied
//! one wins, so an exact threshold boundary belongs to the higher tier
//! (500 lifetime points is Silver, 499 is Bronze).

use crate::{core::ledger, errors::Result};
use sea_orm::DatabaseConnection;

/// A tier threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tier {
    /// Level, 1-based (Bronze = 1)
    pub level: i32,
    /// Display name
    pub name: &'static str,
    /// Minimum lifetime points for this tier
    pub min_points: i64,
}

/// Fixed ascending tier thresholds.
pub const TIERS: [Tier; 5] = [
    Tier { level: 1, name: "Bronze", min_points: 0 },
    Tier { level: 2, name: "Silver", min_points: 500 },
    Tier { level: 3, name: "Gold", min_points: 1500 },
    Tier { level: 4, name: "Platinum", min_points: 3000 },
    Tier { level: 5, name: "Diamond", min_points: 6000 },
];

/// A user's tier along with progress toward the next one.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TierInfo {
    /// The current tier
    pub tier: Tier,
    /// Lifetime points the tier was derived from
    pub lifetime_points: i64,
    /// Percentage of the way from this tier's floor to the next tier's
    /// floor, 0-100; 100 at the top tier
    pub progress: f64,
    /// The next tier's floor, if there is a next tier
    pub next_tier_min: Option<i64>,
}

/// Selects the highest tier whose floor is at or below `lifetime_points`.
#[must_use]
pub fn calculate_tier(lifetime_points: i64) -> Tier {
    let idx = TIERS
        .iter()
        .rposition(|t| t.min_points <= lifetime_points)
        .unwrap_or(0);
    TIERS[idx]
}

/// Progress from the current tier's floor toward the next tier's floor as a
/// percentage, capped at 100. At the top tier there is no next floor, so
/// progress is 100.
#[must_use]
pub fn calculate_progress(lifetime_points: i64, tier: Tier, next: Option<Tier>) -> f64 {
    next.map_or(100.0, |next_tier| {
        let span = next_tier.min_points - tier.min_points;
        if span <= 0 {
            return 100.0;
        }
        #[allow(clippy::cast_precision_loss)]
        let pct = (lifetime_points - tier.min_points) as f64 / span as f64 * 100.0;
        pct.clamp(0.0, 100.0)
    })
}

fn next_tier(tier: Tier) -> Option<Tier> {
    TIERS
        .iter()
        .position(|t| t.level == tier.level)
        .and_then(|idx| TIERS.get(idx + 1))
        .copied()
}

/// Fetches the user's lifetime points and computes their tier and progress.
pub async fn get_user_tier(db: &DatabaseConnection, user_id: i64) -> Result<TierInfo> {
    let balance = ledger::get_balance(db, user_id).await?;
    let tier = calculate_tier(balance.lifetime);
    let next = next_tier(tier);

    Ok(TierInfo {
        tier,
        lifetime_points: balance.lifetime,
        progress: calculate_progress(balance.lifetime, tier, next),
        next_tier_min: next.map(|t| t.min_points),
    })
}
