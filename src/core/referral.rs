//! Referral attributor - Links signed-up users to referrers and pays
//! milestone rewards.
//!
//! Attribution is first-touch and permanent: the unique index on
//! `referred_id` is the authoritative guard, application pre-checks are
//! advisory. Referral rewards accrue on the paid-conversion/retention
//! schedule only; signup and verification award nothing. Every milestone
//! payout is de-duplicated through a ledger existence check on
//! `(referrer, source, source_id = referred user id)`.

use crate::{
    core::ledger::{self, EarnOptions},
    entities::{ReferralTracking, User, referral_tracking, user},
    errors::{Error, Result},
};
use chrono::Duration;
use rand::Rng;
use sea_orm::{DatabaseConnection, Set, SqlErr, TransactionTrait, prelude::*};
use tracing::info;

const CODE_LENGTH: usize = 8;
// No 0/O/1/I, codes get read out loud and typed from phone screens
const CODE_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";
const MAX_CODE_ATTEMPTS: u32 = 10;

/// Milestone paid when the referred user converts to a paid subscription
pub const MILESTONE_PAID_CONVERSION: &str = "paid_conversion";
/// Milestone paid when the referred user is still paying after 30 days
pub const MILESTONE_RETENTION_30D: &str = "retention_30d";
/// Terminal milestone, paid when the referred user is still paying after
/// 90 days; completes the tracking row
pub const MILESTONE_RETENTION_90D: &str = "retention_90d";

const RETENTION_30_DAYS: i64 = 30;
const RETENTION_90_DAYS: i64 = 90;

/// Referrer points for each milestone; `None` for unknown keys.
#[must_use]
pub fn milestone_points(milestone: &str) -> Option<i64> {
    match milestone {
        MILESTONE_PAID_CONVERSION => Some(500),
        MILESTONE_RETENTION_30D => Some(300),
        MILESTONE_RETENTION_90D => Some(1000),
        _ => None,
    }
}

/// Builds the ledger source tag for a milestone payout.
#[must_use]
pub fn milestone_source(milestone: &str) -> String {
    format!("referral_{milestone}")
}

/// Summary of one retention sweep run.
#[derive(Debug, Clone, Default)]
pub struct RetentionSweepResult {
    /// Tracking rows examined
    pub checked: usize,
    /// 30-day milestones awarded in this run
    pub awarded_30d: usize,
    /// 90-day milestones awarded in this run
    pub awarded_90d: usize,
    /// Rows skipped because the referred user's subscription lapsed
    pub skipped_unpaid: usize,
}

fn generate_code() -> String {
    let mut rng = rand::rng();
    (0..CODE_LENGTH)
        .map(|_| {
            let idx = rng.random_range(0..CODE_ALPHABET.len());
            CODE_ALPHABET[idx] as char
        })
        .collect()
}

async fn find_user(db: &DatabaseConnection, user_id: i64) -> Result<user::Model> {
    User::find_by_id(user_id)
        .one(db)
        .await?
        .ok_or(Error::UserNotFound { user_id })
}

/// Returns the user's referral code, generating and persisting one if they
/// do not have one yet. Collisions with existing codes are retried a bounded
/// number of times before giving up.
pub async fn ensure_referral_code(db: &DatabaseConnection, user_id: i64) -> Result<String> {
    let user = find_user(db, user_id).await?;
    if let Some(code) = user.referral_code {
        return Ok(code);
    }

    for _ in 0..MAX_CODE_ATTEMPTS {
        let code = generate_code();

        let mut active: user::ActiveModel = user.clone().into();
        active.referral_code = Set(Some(code.clone()));
        match active.update(db).await {
            Ok(_) => return Ok(code),
            // Lost a uniqueness race against another user's code; retry
            Err(e) if matches!(e.sql_err(), Some(SqlErr::UniqueConstraintViolation(_))) => {}
            Err(e) => return Err(e.into()),
        }
    }

    Err(Error::ReferralCodeExhausted {
        attempts: MAX_CODE_ATTEMPTS,
    })
}

/// Attributes a newly signed-up user to the owner of `code`.
///
/// Fails with [`Error::InvalidReferralCode`] for unknown codes,
/// [`Error::SelfReferral`] when the code belongs to the referred user, and
/// [`Error::AlreadyAttributed`] when an attribution already exists
/// (first-touch wins, permanently). On success the tracking row is created
/// in `pending` status and the referred user's record is stamped with the
/// code used, in one transaction.
pub async fn attribute_referral(
    db: &DatabaseConnection,
    referred_user_id: i64,
    code: &str,
) -> Result<referral_tracking::Model> {
    let referrer = User::find()
        .filter(user::Column::ReferralCode.eq(code))
        .one(db)
        .await?
        .ok_or_else(|| Error::InvalidReferralCode {
            code: code.to_string(),
        })?;

    if referrer.id == referred_user_id {
        return Err(Error::SelfReferral);
    }

    let referred = find_user(db, referred_user_id).await?;

    // Advisory pre-check; the unique index on referred_id is authoritative
    let existing = ReferralTracking::find()
        .filter(referral_tracking::Column::ReferredId.eq(referred_user_id))
        .one(db)
        .await?;
    if existing.is_some() {
        return Err(Error::AlreadyAttributed {
            referred_id: referred_user_id,
        });
    }

    let txn = db.begin().await?;

    let tracking = referral_tracking::ActiveModel {
        referrer_id: Set(referrer.id),
        referred_id: Set(referred_user_id),
        referral_code: Set(code.to_string()),
        status: Set(referral_tracking::STATUS_PENDING.to_string()),
        created_at: Set(chrono::Utc::now()),
        completed_at: Set(None),
        ..Default::default()
    };

    let tracking = match tracking.insert(&txn).await {
        Ok(model) => model,
        Err(e) if matches!(e.sql_err(), Some(SqlErr::UniqueConstraintViolation(_))) => {
            txn.rollback().await?;
            return Err(Error::AlreadyAttributed {
                referred_id: referred_user_id,
            });
        }
        Err(e) => return Err(e.into()),
    };

    let mut referred_active: user::ActiveModel = referred.into();
    referred_active.referred_by_code = Set(Some(code.to_string()));
    referred_active.update(&txn).await?;

    txn.commit().await?;
    info!(
        referrer_id = referrer.id,
        referred_id = referred_user_id,
        "referral attributed"
    );
    Ok(tracking)
}

/// Marks a referred user as verified, moving their tracking row
/// `pending → active`. Awards nothing by itself: point accrual starts at
/// paid conversion. Returns `false` when there is no pending attribution.
pub async fn mark_referred_user_verified(
    db: &DatabaseConnection,
    referred_user_id: i64,
) -> Result<bool> {
    let Some(tracking) = ReferralTracking::find()
        .filter(referral_tracking::Column::ReferredId.eq(referred_user_id))
        .one(db)
        .await?
    else {
        return Ok(false);
    };

    if tracking.status != referral_tracking::STATUS_PENDING {
        return Ok(false);
    }

    let mut active: referral_tracking::ActiveModel = tracking.into();
    active.status = Set(referral_tracking::STATUS_ACTIVE.to_string());
    active.update(db).await?;
    Ok(true)
}

/// Pays a named milestone to the referred user's referrer, if one exists.
///
/// Returns `true` if points were awarded by this call. Users without an
/// attribution generate no referral rewards (silent `false`), and a ledger
/// existence check on the milestone's source key makes the payout
/// at-most-once per referred user. The terminal 90-day milestone also marks
/// the tracking row `completed`.
pub async fn trigger_referral_milestone(
    db: &DatabaseConnection,
    referred_user_id: i64,
    milestone: &str,
) -> Result<bool> {
    let Some(points) = milestone_points(milestone) else {
        return Err(Error::Config {
            message: format!("Unknown referral milestone '{milestone}'"),
        });
    };

    let Some(tracking) = ReferralTracking::find()
        .filter(referral_tracking::Column::ReferredId.eq(referred_user_id))
        .one(db)
        .await?
    else {
        return Ok(false);
    };

    let source = milestone_source(milestone);
    let source_id = referred_user_id.to_string();
    if ledger::has_entry(db, tracking.referrer_id, &source, &source_id).await? {
        return Ok(false);
    }

    let txn = db.begin().await?;

    ledger::earn_points(
        &txn,
        tracking.referrer_id,
        points,
        &source,
        EarnOptions {
            source_id: Some(source_id),
            note: Some(format!("Referral milestone: {milestone}")),
            ..Default::default()
        },
    )
    .await?;

    if milestone == MILESTONE_RETENTION_90D {
        let referrer_id = tracking.referrer_id;
        let mut active: referral_tracking::ActiveModel = tracking.into();
        active.status = Set(referral_tracking::STATUS_COMPLETED.to_string());
        active.completed_at = Set(Some(chrono::Utc::now()));
        active.update(&txn).await?;
        info!(referrer_id, referred_user_id, "referral completed");
    }

    txn.commit().await?;
    info!(referred_user_id, milestone, points, "referral milestone awarded");
    Ok(true)
}

/// Event hook for the referred user converting to a paid subscription.
pub async fn on_referred_user_subscribed(
    db: &DatabaseConnection,
    referred_user_id: i64,
) -> Result<bool> {
    trigger_referral_milestone(db, referred_user_id, MILESTONE_PAID_CONVERSION).await
}

/// Periodic retention sweep, driven by an external scheduler.
///
/// Examines verified, not-yet-completed tracking rows old enough for the
/// 30- or 90-day milestones, re-verifies that the referred user is still on
/// a paid active subscription at check time (a lapsed subscription
/// disqualifies the milestone even if it once qualified), and awards
/// through the same de-duplication path as event-driven milestones. The
/// 30-day milestone can still fire independently on rows that are already
/// past 90 days but were never swept.
pub async fn run_retention_sweep(
    db: &DatabaseConnection,
    now: DateTimeUtc,
) -> Result<RetentionSweepResult> {
    let cutoff_30d = now - Duration::days(RETENTION_30_DAYS);
    let cutoff_90d = now - Duration::days(RETENTION_90_DAYS);

    let due = ReferralTracking::find()
        .filter(referral_tracking::Column::Status.eq(referral_tracking::STATUS_ACTIVE))
        .filter(referral_tracking::Column::CreatedAt.lte(cutoff_30d))
        .all(db)
        .await?;

    let mut result = RetentionSweepResult::default();

    for tracking in due {
        result.checked += 1;

        let referred = find_user(db, tracking.referred_id).await?;
        if !referred.is_paid_and_active(now) {
            result.skipped_unpaid += 1;
            continue;
        }

        if trigger_referral_milestone(db, tracking.referred_id, MILESTONE_RETENTION_30D).await? {
            result.awarded_30d += 1;
        }

        if tracking.created_at <= cutoff_90d
            && trigger_referral_milestone(db, tracking.referred_id, MILESTONE_RETENTION_90D).await?
        {
            result.awarded_90d += 1;
        }
    }

    Ok(result)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::core::ledger::get_balance;
    use crate::test_utils::{create_paid_user, create_test_user, setup_test_db};

    async fn attributed_pair(
        db: &DatabaseConnection,
    ) -> Result<(user::Model, user::Model, String)> {
        let referrer = create_test_user(db, "referrer").await?;
        let referred = create_paid_user(db, "referred").await?;
        let code = ensure_referral_code(db, referrer.id).await?;
        attribute_referral(db, referred.id, &code).await?;
        Ok((referrer, referred, code))
    }

    #[tokio::test]
    async fn test_ensure_referral_code_is_stable() -> Result<()> {
        let db = setup_test_db().await?;
        let user = create_test_user(&db, "alice").await?;

        let code = ensure_referral_code(&db, user.id).await?;
        assert_eq!(code.len(), CODE_LENGTH);
        assert!(code.bytes().all(|b| CODE_ALPHABET.contains(&b)));

        // Second call returns the persisted code, not a fresh one
        let again = ensure_referral_code(&db, user.id).await?;
        assert_eq!(code, again);

        Ok(())
    }

    #[tokio::test]
    async fn test_attribute_referral_happy_path() -> Result<()> {
        let db = setup_test_db().await?;
        let (referrer, referred, code) = attributed_pair(&db).await?;

        let tracking = ReferralTracking::find()
            .filter(referral_tracking::Column::ReferredId.eq(referred.id))
            .one(&db)
            .await?
            .unwrap();
        assert_eq!(tracking.referrer_id, referrer.id);
        assert_eq!(tracking.status, referral_tracking::STATUS_PENDING);
        assert_eq!(tracking.referral_code, code);

        // The referred user's record is stamped with the code used
        let stamped = User::find_by_id(referred.id).one(&db).await?.unwrap();
        assert_eq!(stamped.referred_by_code, Some(code));

        // Attribution alone pays nothing
        assert_eq!(get_balance(&db, referrer.id).await?.lifetime, 0);

        Ok(())
    }

    #[tokio::test]
    async fn test_invalid_code_rejected() -> Result<()> {
        let db = setup_test_db().await?;
        let referred = create_test_user(&db, "referred").await?;

        let result = attribute_referral(&db, referred.id, "NOTACODE").await;
        assert!(matches!(
            result.unwrap_err(),
            Error::InvalidReferralCode { code } if code == "NOTACODE"
        ));

        Ok(())
    }

    #[tokio::test]
    async fn test_self_referral_rejected() -> Result<()> {
        let db = setup_test_db().await?;
        let user = create_test_user(&db, "alice").await?;
        let code = ensure_referral_code(&db, user.id).await?;

        let result = attribute_referral(&db, user.id, &code).await;
        assert!(matches!(result.unwrap_err(), Error::SelfReferral));

        // No tracking row was created
        let count = ReferralTracking::find()
            .filter(referral_tracking::Column::ReferredId.eq(user.id))
            .one(&db)
            .await?;
        assert!(count.is_none());

        Ok(())
    }

    #[tokio::test]
    async fn test_first_touch_wins() -> Result<()> {
        let db = setup_test_db().await?;
        let (_, referred, code_a) = attributed_pair(&db).await?;

        let other = create_test_user(&db, "other_referrer").await?;
        let code_b = ensure_referral_code(&db, other.id).await?;

        let result = attribute_referral(&db, referred.id, &code_b).await;
        assert!(matches!(
            result.unwrap_err(),
            Error::AlreadyAttributed { referred_id } if referred_id == referred.id
        ));

        // Original attribution is unchanged
        let tracking = ReferralTracking::find()
            .filter(referral_tracking::Column::ReferredId.eq(referred.id))
            .one(&db)
            .await?
            .unwrap();
        assert_eq!(tracking.referral_code, code_a);

        Ok(())
    }

    #[tokio::test]
    async fn test_verification_activates_without_awarding() -> Result<()> {
        let db = setup_test_db().await?;
        let (referrer, referred, _) = attributed_pair(&db).await?;

        assert!(mark_referred_user_verified(&db, referred.id).await?);
        // Re-verifying is a no-op
        assert!(!mark_referred_user_verified(&db, referred.id).await?);

        let tracking = ReferralTracking::find()
            .filter(referral_tracking::Column::ReferredId.eq(referred.id))
            .one(&db)
            .await?
            .unwrap();
        assert_eq!(tracking.status, referral_tracking::STATUS_ACTIVE);

        assert_eq!(get_balance(&db, referrer.id).await?.lifetime, 0);

        Ok(())
    }

    #[tokio::test]
    async fn test_verify_unattributed_user_is_noop() -> Result<()> {
        let db = setup_test_db().await?;
        let user = create_test_user(&db, "loner").await?;
        assert!(!mark_referred_user_verified(&db, user.id).await?);
        Ok(())
    }

    #[tokio::test]
    async fn test_milestone_pays_referrer_once() -> Result<()> {
        let db = setup_test_db().await?;
        let (referrer, referred, _) = attributed_pair(&db).await?;
        mark_referred_user_verified(&db, referred.id).await?;

        assert!(on_referred_user_subscribed(&db, referred.id).await?);
        // Retried webhook, double click, replayed job: still one payout
        assert!(!on_referred_user_subscribed(&db, referred.id).await?);

        let balance = get_balance(&db, referrer.id).await?;
        assert_eq!(balance.available, 500);
        assert_eq!(balance.lifetime, 500);

        Ok(())
    }

    #[tokio::test]
    async fn test_milestone_without_attribution_is_noop() -> Result<()> {
        let db = setup_test_db().await?;
        let user = create_paid_user(&db, "organic_signup").await?;

        assert!(!on_referred_user_subscribed(&db, user.id).await?);
        Ok(())
    }

    #[tokio::test]
    async fn test_unknown_milestone_is_config_error() -> Result<()> {
        let db = setup_test_db().await?;
        let (_, referred, _) = attributed_pair(&db).await?;

        let result = trigger_referral_milestone(&db, referred.id, "retention_7d").await;
        assert!(matches!(result.unwrap_err(), Error::Config { message: _ }));
        Ok(())
    }

    async fn backdate_tracking(
        db: &DatabaseConnection,
        referred_id: i64,
        days: i64,
    ) -> Result<()> {
        let tracking = ReferralTracking::find()
            .filter(referral_tracking::Column::ReferredId.eq(referred_id))
            .one(db)
            .await?
            .unwrap();
        let mut active: referral_tracking::ActiveModel = tracking.into();
        active.created_at = Set(chrono::Utc::now() - Duration::days(days));
        active.update(db).await?;
        Ok(())
    }

    #[tokio::test]
    async fn test_retention_sweep_30_day_milestone() -> Result<()> {
        let db = setup_test_db().await?;
        let (referrer, referred, _) = attributed_pair(&db).await?;
        mark_referred_user_verified(&db, referred.id).await?;
        backdate_tracking(&db, referred.id, 45).await?;

        let result = run_retention_sweep(&db, chrono::Utc::now()).await?;
        assert_eq!(result.checked, 1);
        assert_eq!(result.awarded_30d, 1);
        assert_eq!(result.awarded_90d, 0);

        assert_eq!(get_balance(&db, referrer.id).await?.available, 300);

        // The tracking row stays active; the terminal milestone is still due
        let tracking = ReferralTracking::find()
            .filter(referral_tracking::Column::ReferredId.eq(referred.id))
            .one(&db)
            .await?
            .unwrap();
        assert_eq!(tracking.status, referral_tracking::STATUS_ACTIVE);

        // Re-running the sweep awards nothing new
        let again = run_retention_sweep(&db, chrono::Utc::now()).await?;
        assert_eq!(again.awarded_30d, 0);
        assert_eq!(get_balance(&db, referrer.id).await?.available, 300);

        Ok(())
    }

    #[tokio::test]
    async fn test_retention_sweep_90_day_completes_tracking() -> Result<()> {
        let db = setup_test_db().await?;
        let (referrer, referred, _) = attributed_pair(&db).await?;
        mark_referred_user_verified(&db, referred.id).await?;
        backdate_tracking(&db, referred.id, 120).await?;

        // Never swept before: both milestones fire in one run
        let result = run_retention_sweep(&db, chrono::Utc::now()).await?;
        assert_eq!(result.awarded_30d, 1);
        assert_eq!(result.awarded_90d, 1);

        assert_eq!(get_balance(&db, referrer.id).await?.available, 1300);

        let tracking = ReferralTracking::find()
            .filter(referral_tracking::Column::ReferredId.eq(referred.id))
            .one(&db)
            .await?
            .unwrap();
        assert_eq!(tracking.status, referral_tracking::STATUS_COMPLETED);
        assert!(tracking.completed_at.is_some());

        // Completed rows are no longer examined
        let again = run_retention_sweep(&db, chrono::Utc::now()).await?;
        assert_eq!(again.checked, 0);

        Ok(())
    }

    #[tokio::test]
    async fn test_retention_sweep_skips_lapsed_subscription() -> Result<()> {
        let db = setup_test_db().await?;
        let (referrer, referred, _) = attributed_pair(&db).await?;
        mark_referred_user_verified(&db, referred.id).await?;
        backdate_tracking(&db, referred.id, 45).await?;

        // The referred user cancels before the sweep runs
        let referred_user = User::find_by_id(referred.id).one(&db).await?.unwrap();
        let mut active: user::ActiveModel = referred_user.into();
        active.subscription_status = Set(user::SUBSCRIPTION_CANCELED.to_string());
        active.update(&db).await?;

        let result = run_retention_sweep(&db, chrono::Utc::now()).await?;
        assert_eq!(result.checked, 1);
        assert_eq!(result.skipped_unpaid, 1);
        assert_eq!(result.awarded_30d, 0);

        assert_eq!(get_balance(&db, referrer.id).await?.available, 0);

        Ok(())
    }

    #[tokio::test]
    async fn test_unverified_rows_not_swept() -> Result<()> {
        let db = setup_test_db().await?;
        let (_, referred, _) = attributed_pair(&db).await?;
        // Still pending (never verified), even though it is old enough
        backdate_tracking(&db, referred.id, 45).await?;

        let result = run_retention_sweep(&db, chrono::Utc::now()).await?;
        assert_eq!(result.checked, 0);

        Ok(())
    }
}
