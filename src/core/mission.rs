//! Mission tracker - Idempotent one-time achievements with a fixed reward.
//!
//! Awarding is made at-most-once by inserting the completion row before the
//! points: the composite unique index on `(user_id, mission_id)` lets only
//! one concurrent caller win the insert, and the loser treats the constraint
//! violation as "already completed" and awards nothing.

use crate::{
    config::catalog::MissionSeed,
    core::ledger::{self, EarnOptions},
    entities::{Mission, MissionCompletion, mission, mission_completion},
    errors::Result,
};
use sea_orm::{
    DatabaseConnection, QueryOrder, Set, SqlErr, TransactionTrait, prelude::*,
};
use tracing::info;

/// An active mission with the user's completion state.
#[derive(Debug, Clone)]
pub struct MissionStatus {
    /// The mission
    pub mission: mission::Model,
    /// When this user completed it, if they have
    pub completed_at: Option<DateTimeUtc>,
}

/// Builds the ledger source tag for a mission award.
#[must_use]
pub fn mission_source(key: &str) -> String {
    format!("mission_{key}")
}

/// Idempotently completes a mission for a user and awards its points.
///
/// Returns `true` if the mission was completed (and awarded) by this call.
/// Unknown or inactive mission keys and already-completed missions are
/// silent no-ops returning `false`. The completion insert and the point
/// award share one transaction, so a crash cannot leave a completion row
/// without its points or vice versa.
pub async fn check_and_complete_mission(
    db: &DatabaseConnection,
    user_id: i64,
    mission_key: &str,
) -> Result<bool> {
    let Some(mission) = Mission::find()
        .filter(mission::Column::Key.eq(mission_key))
        .filter(mission::Column::IsActive.eq(true))
        .one(db)
        .await?
    else {
        return Ok(false);
    };

    // Advisory pre-check; the unique index is the authoritative guard
    let existing = MissionCompletion::find()
        .filter(mission_completion::Column::UserId.eq(user_id))
        .filter(mission_completion::Column::MissionId.eq(mission.id))
        .one(db)
        .await?;
    if existing.is_some() {
        return Ok(false);
    }

    let txn = db.begin().await?;

    let completion = mission_completion::ActiveModel {
        user_id: Set(user_id),
        mission_id: Set(mission.id),
        completed_at: Set(chrono::Utc::now()),
        ..Default::default()
    };

    match completion.insert(&txn).await {
        Ok(_) => {}
        Err(e) if matches!(e.sql_err(), Some(SqlErr::UniqueConstraintViolation(_))) => {
            // A concurrent caller won the race; the desired end state
            // (exactly one award) already holds
            txn.rollback().await?;
            return Ok(false);
        }
        Err(e) => return Err(e.into()),
    }

    ledger::earn_points(
        &txn,
        user_id,
        mission.points,
        &mission_source(mission_key),
        EarnOptions {
            source_id: Some(mission.id.to_string()),
            note: Some(mission.title.clone()),
            ..Default::default()
        },
    )
    .await?;

    txn.commit().await?;
    info!(user_id, mission_key, points = mission.points, "mission completed");
    Ok(true)
}

/// Lists active missions with the user's completion state, ordered by
/// `sort_order`.
pub async fn list_missions(db: &DatabaseConnection, user_id: i64) -> Result<Vec<MissionStatus>> {
    let missions = Mission::find()
        .filter(mission::Column::IsActive.eq(true))
        .order_by_asc(mission::Column::SortOrder)
        .all(db)
        .await?;

    let completions = MissionCompletion::find()
        .filter(mission_completion::Column::UserId.eq(user_id))
        .all(db)
        .await?;

    Ok(missions
        .into_iter()
        .map(|m| {
            let completed_at = completions
                .iter()
                .find(|c| c.mission_id == m.id)
                .map(|c| c.completed_at);
            MissionStatus {
                mission: m,
                completed_at,
            }
        })
        .collect())
}

/// Seeds missions from configuration, inserting only keys that do not exist
/// yet. Returns the number of missions inserted.
pub async fn seed_missions(db: &DatabaseConnection, seeds: &[MissionSeed]) -> Result<usize> {
    let mut inserted = 0;
    for seed in seeds {
        let existing = Mission::find()
            .filter(mission::Column::Key.eq(seed.key.as_str()))
            .one(db)
            .await?;
        if existing.is_some() {
            continue;
        }

        let model = mission::ActiveModel {
            key: Set(seed.key.clone()),
            title: Set(seed.title.clone()),
            description: Set(seed.description.clone()),
            points: Set(seed.points),
            sort_order: Set(seed.sort_order),
            is_active: Set(true),
            ..Default::default()
        };
        model.insert(db).await?;
        inserted += 1;
    }

    Ok(inserted)
}
