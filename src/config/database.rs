//! Database configuration module.
//!
//! Handles the `SQLite` connection and table creation using `SeaORM`.
//! Tables are generated from the entity definitions via
//! `Schema::create_table_from_entity`, so the database schema always matches
//! the Rust struct definitions without manual SQL. The composite unique
//! index that backs mission idempotency is created here as well, since
//! `DeriveEntityModel` only expresses single-column uniqueness.

use crate::entities::{
    LedgerEntry, Mission, MissionCompletion, Redemption, ReferralTracking, Reward, User,
    mission_completion,
};
use crate::errors::Result;
use sea_orm::sea_query::Index;
use sea_orm::{ConnectionTrait, Database, DatabaseConnection, Schema};

/// Gets the database URL from environment variable or returns default `SQLite` path.
pub fn get_database_url() -> String {
    std::env::var("DATABASE_URL").unwrap_or_else(|_| "sqlite://data/rewards_ledger.sqlite".to_string())
}

/// Establishes a connection using the `DATABASE_URL` environment variable,
/// falling back to a default local `SQLite` file if it is not set.
pub async fn create_connection() -> Result<DatabaseConnection> {
    Database::connect(get_database_url()).await.map_err(Into::into)
}

/// Creates all tables and unique indexes from the entity definitions.
///
/// Safe to call on every startup: both the tables and the indexes are
/// created with `IF NOT EXISTS`.
pub async fn create_tables(db: &DatabaseConnection) -> Result<()> {
    let builder = db.get_database_backend();
    let schema = Schema::new(builder);

    let mut user_table = schema.create_table_from_entity(User);
    let mut ledger_table = schema.create_table_from_entity(LedgerEntry);
    let mut mission_table = schema.create_table_from_entity(Mission);
    let mut completion_table = schema.create_table_from_entity(MissionCompletion);
    let mut tracking_table = schema.create_table_from_entity(ReferralTracking);
    let mut reward_table = schema.create_table_from_entity(Reward);
    let mut redemption_table = schema.create_table_from_entity(Redemption);

    db.execute(builder.build(user_table.if_not_exists())).await?;
    db.execute(builder.build(ledger_table.if_not_exists())).await?;
    db.execute(builder.build(mission_table.if_not_exists())).await?;
    db.execute(builder.build(completion_table.if_not_exists())).await?;
    db.execute(builder.build(tracking_table.if_not_exists())).await?;
    db.execute(builder.build(reward_table.if_not_exists())).await?;
    db.execute(builder.build(redemption_table.if_not_exists())).await?;

    // The durable at-most-once guard for mission awards: only one
    // (user, mission) completion row can ever exist, regardless of how many
    // server instances race on the insert.
    let completion_unique = Index::create()
        .name("idx_mission_completions_user_mission")
        .table(MissionCompletion)
        .col(mission_completion::Column::UserId)
        .col(mission_completion::Column::MissionId)
        .unique()
        .if_not_exists()
        .to_owned();
    db.execute(builder.build(&completion_unique)).await?;

    Ok(())
}
