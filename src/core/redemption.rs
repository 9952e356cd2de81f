//! Redemption engine - Spends points against the rewards catalog and drives
//! fulfillment.
//!
//! The catalog's `can_redeem` flag is advisory for display; the authoritative
//! gates run at redemption time: the tier re-check and the atomic
//! balance-check-plus-spend, which closes any window between showing the
//! catalog and redeeming from it. Points and the `pending` redemption row
//! commit together; fulfillment then runs outside the transaction and a
//! failure moves the redemption to `failed` with the points still spent,
//! held for manual review rather than auto-refunded.

use crate::{
    config::catalog::RewardSeed,
    core::{ledger, tier},
    entities::{Redemption, Reward, User, redemption, reward, user},
    errors::{Error, Result},
};
use chrono::Months;
use sea_orm::{DatabaseConnection, QueryOrder, Set, TransactionTrait, prelude::*};
use serde_json::json;
use tracing::{info, warn};

/// Seam to the payment processor. The only operation the ledger needs is
/// "apply a negative balance transaction to this user's customer record";
/// everything else about billing lives outside this crate.
#[allow(async_fn_in_trait)]
pub trait PaymentProcessor {
    /// Credits the user's account by `amount_cents`.
    async fn credit_customer(
        &self,
        user_id: i64,
        amount_cents: i64,
    ) -> std::result::Result<(), String>;
}

/// A catalog reward with the per-user redeemability flag.
#[derive(Debug, Clone)]
pub struct CatalogEntry {
    /// The reward
    pub reward: reward::Model,
    /// Advisory: the user currently meets the tier and balance requirements.
    /// Re-checked authoritatively at redemption time
    pub can_redeem: bool,
}

/// Lists active catalog rewards with per-user redeemability, ordered by
/// `sort_order`.
pub async fn get_rewards_catalog(
    db: &DatabaseConnection,
    user_id: i64,
) -> Result<Vec<CatalogEntry>> {
    let tier_info = tier::get_user_tier(db, user_id).await?;
    let available = ledger::available_balance(db, user_id).await?;

    let rewards = Reward::find()
        .filter(reward::Column::IsActive.eq(true))
        .order_by_asc(reward::Column::SortOrder)
        .all(db)
        .await?;

    Ok(rewards
        .into_iter()
        .map(|r| {
            let can_redeem = tier_info.tier.level >= r.min_tier && available >= r.points_cost;
            CatalogEntry {
                reward: r,
                can_redeem,
            }
        })
        .collect())
}

/// Redeems a catalog reward for the user.
///
/// Spends the points and creates the `pending` redemption row in one
/// transaction, then dispatches fulfillment by reward type. Returns the
/// final redemption row (`fulfilled`) on success. On fulfillment failure
/// the redemption is marked `failed`, the points remain spent, and
/// [`Error::Fulfillment`] is surfaced to the caller.
pub async fn redeem_reward<P>(
    db: &DatabaseConnection,
    processor: &P,
    user_id: i64,
    reward_id: i64,
) -> Result<redemption::Model>
where
    P: PaymentProcessor,
{
    let reward = Reward::find_by_id(reward_id)
        .filter(reward::Column::IsActive.eq(true))
        .one(db)
        .await?
        .ok_or(Error::RewardNotFound { reward_id })?;

    let tier_info = tier::get_user_tier(db, user_id).await?;
    if tier_info.tier.level < reward.min_tier {
        return Err(Error::TierTooLow {
            required: reward.min_tier,
            current: tier_info.tier.level,
        });
    }

    // Atomic gate: balance check, spend entry, and pending redemption row
    // commit together or not at all
    let txn = db.begin().await?;

    ledger::spend_points_in(
        &txn,
        user_id,
        reward.points_cost,
        ledger::SOURCE_REDEMPTION,
        Some(reward_id.to_string()),
    )
    .await?;

    let pending = redemption::ActiveModel {
        user_id: Set(user_id),
        reward_id: Set(reward_id),
        points_spent: Set(reward.points_cost),
        status: Set(redemption::STATUS_PENDING.to_string()),
        fulfilled_at: Set(None),
        metadata: Set(None),
        created_at: Set(chrono::Utc::now()),
        ..Default::default()
    };
    let pending = pending.insert(&txn).await?;

    txn.commit().await?;
    info!(user_id, reward_id, points = reward.points_cost, "redemption created");

    match fulfill(db, processor, user_id, &reward).await {
        Ok(metadata) => {
            let mut active: redemption::ActiveModel = pending.into();
            active.status = Set(redemption::STATUS_FULFILLED.to_string());
            active.fulfilled_at = Set(Some(chrono::Utc::now()));
            active.metadata = Set(Some(metadata));
            let fulfilled = active.update(db).await?;
            Ok(fulfilled)
        }
        Err(message) => {
            warn!(
                user_id,
                reward_id,
                redemption_id = pending.id,
                %message,
                "fulfillment failed, redemption held for review"
            );
            let mut active: redemption::ActiveModel = pending.into();
            active.status = Set(redemption::STATUS_FAILED.to_string());
            active.metadata = Set(Some(json!({ "error": message })));
            active.update(db).await?;
            Err(Error::Fulfillment { message })
        }
    }
}

/// Runs the type-specific fulfillment side effect. Any error here, including
/// database errors while applying the effect, is a fulfillment failure: the
/// spend has already committed and only the redemption status reflects the
/// outcome.
async fn fulfill<P>(
    db: &DatabaseConnection,
    processor: &P,
    user_id: i64,
    reward: &reward::Model,
) -> std::result::Result<Json, String>
where
    P: PaymentProcessor,
{
    match reward.reward_type.as_str() {
        reward::TYPE_STRIPE_CREDIT => {
            let amount_cents = reward
                .reward_value
                .get("amount_cents")
                .and_then(serde_json::Value::as_i64)
                .ok_or("reward_value is missing amount_cents")?;

            processor.credit_customer(user_id, amount_cents).await?;
            Ok(json!({ "amount_cents": amount_cents }))
        }
        reward::TYPE_FREE_MONTHS => {
            let months = reward
                .reward_value
                .get("months")
                .and_then(serde_json::Value::as_u64)
                .filter(|m| *m > 0)
                .ok_or("reward_value is missing months")?;

            let new_end = extend_subscription(db, user_id, months)
                .await
                .map_err(|e| e.to_string())?;
            Ok(json!({ "months": months, "new_end": new_end }))
        }
        reward::TYPE_FEATURE_UNLOCK => {
            let feature = reward
                .reward_value
                .get("feature")
                .and_then(serde_json::Value::as_str)
                .ok_or("reward_value is missing feature")?;

            // The unlock is the metadata itself; feature gating reads it at
            // feature-check time
            Ok(json!({ "feature": feature }))
        }
        other => Err(format!("unknown reward type '{other}'")),
    }
}

/// Extends the user's subscription end date, anchored to the later of now
/// and the existing end so consecutive redemptions stack instead of
/// overlapping.
async fn extend_subscription(
    db: &DatabaseConnection,
    user_id: i64,
    months: u64,
) -> Result<DateTimeUtc> {
    let user_model = User::find_by_id(user_id)
        .one(db)
        .await?
        .ok_or(Error::UserNotFound { user_id })?;

    let now = chrono::Utc::now();
    let base = user_model
        .subscription_ends_at
        .map_or(now, |end| end.max(now));

    #[allow(clippy::cast_possible_truncation)]
    let new_end = base
        .checked_add_months(Months::new(months as u32))
        .ok_or_else(|| Error::Fulfillment {
            message: format!("cannot extend subscription by {months} months"),
        })?;

    let mut active: user::ActiveModel = user_model.into();
    active.subscription_ends_at = Set(Some(new_end));
    active.update(db).await?;

    Ok(new_end)
}

/// Seeds catalog rewards from configuration, inserting only titles that do
/// not exist yet. Returns the number of rewards inserted.
pub async fn seed_rewards(db: &DatabaseConnection, seeds: &[RewardSeed]) -> Result<usize> {
    let mut inserted = 0;
    for seed in seeds {
        let existing = Reward::find()
            .filter(reward::Column::Title.eq(seed.title.as_str()))
            .one(db)
            .await?;
        if existing.is_some() {
            continue;
        }

        let model = reward::ActiveModel {
            title: Set(seed.title.clone()),
            description: Set(seed.description.clone()),
            points_cost: Set(seed.points_cost),
            reward_type: Set(seed.reward_type.clone()),
            reward_value: Set(seed.reward_value_json()?),
            min_tier: Set(seed.min_tier),
            sort_order: Set(seed.sort_order),
            is_active: Set(true),
            ..Default::default()
        };
        model.insert(db).await?;
        inserted += 1;
    }

    Ok(inserted)
}
