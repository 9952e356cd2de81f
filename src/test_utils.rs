//! Shared test utilities for `RewardsLedger`.
//!
//! This module provides common helper functions for setting up test databases
//! and creating test entities with sensible defaults.

use crate::{
    entities::{mission, reward, user},
    errors::Result,
};
use sea_orm::{DatabaseConnection, Set, prelude::*};

/// Creates an in-memory `SQLite` database with all tables initialized.
/// This is the standard setup for all integration tests.
pub async fn setup_test_db() -> Result<DatabaseConnection> {
    let db = sea_orm::Database::connect("sqlite::memory:").await?;
    crate::config::database::create_tables(&db).await?;
    Ok(db)
}

/// Creates a free-plan user with no referral code.
pub async fn create_test_user(db: &DatabaseConnection, name: &str) -> Result<user::Model> {
    let model = user::ActiveModel {
        display_name: Set(name.to_string()),
        referral_code: Set(None),
        referred_by_code: Set(None),
        subscription_status: Set(user::SUBSCRIPTION_FREE.to_string()),
        subscription_ends_at: Set(None),
        created_at: Set(chrono::Utc::now()),
        ..Default::default()
    };
    let result = model.insert(db).await?;
    Ok(result)
}

/// Creates a user on an active paid subscription with an open-ended period.
pub async fn create_paid_user(db: &DatabaseConnection, name: &str) -> Result<user::Model> {
    let model = user::ActiveModel {
        display_name: Set(name.to_string()),
        referral_code: Set(None),
        referred_by_code: Set(None),
        subscription_status: Set(user::SUBSCRIPTION_ACTIVE.to_string()),
        subscription_ends_at: Set(None),
        created_at: Set(chrono::Utc::now()),
        ..Default::default()
    };
    let result = model.insert(db).await?;
    Ok(result)
}

/// Creates an active mission with sensible defaults.
pub async fn create_test_mission(
    db: &DatabaseConnection,
    key: &str,
    points: i64,
) -> Result<mission::Model> {
    let model = mission::ActiveModel {
        key: Set(key.to_string()),
        title: Set(format!("Mission {key}")),
        description: Set(format!("Test mission {key}")),
        points: Set(points),
        sort_order: Set(0),
        is_active: Set(true),
        ..Default::default()
    };
    let result = model.insert(db).await?;
    Ok(result)
}

/// Creates an active catalog reward.
pub async fn create_test_reward(
    db: &DatabaseConnection,
    title: &str,
    points_cost: i64,
    reward_type: &str,
    reward_value: serde_json::Value,
    min_tier: i32,
) -> Result<reward::Model> {
    let model = reward::ActiveModel {
        title: Set(title.to_string()),
        description: Set(format!("Test reward: {title}")),
        points_cost: Set(points_cost),
        reward_type: Set(reward_type.to_string()),
        reward_value: Set(reward_value),
        min_tier: Set(min_tier),
        sort_order: Set(0),
        is_active: Set(true),
        ..Default::default()
    };
    let result = model.insert(db).await?;
    Ok(result)
}
