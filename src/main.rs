//! Maintenance runner for the rewards ledger.
//!
//! Intended to be invoked periodically (cron or a scheduler): it seeds the
//! mission and reward catalogs from config.toml, expires stale pending
//! ledger entries, and runs the referral retention sweep. Each invocation
//! is one request-scoped run; there is no long-lived process.

use dotenvy::dotenv;
use rewards_ledger::config::{catalog, database};
use rewards_ledger::core::{ledger, mission, redemption, referral};
use rewards_ledger::errors::Result;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // 1. Initialize tracing (as early as possible)
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // 2. Load .env file; env vars can also be set externally
    dotenv().ok();

    // 3. Load the catalog seed configuration
    let config = catalog::load_default_config()
        .inspect_err(|e| error!("Failed to load config.toml: {e}"))?;

    // 4. Initialize database
    let db = database::create_connection()
        .await
        .inspect_err(|e| error!("Failed to connect to database: {e}"))?;
    database::create_tables(&db).await?;
    info!("Database initialized successfully.");

    // 5. Seed catalogs (insert-if-absent; never overwrites edited rows)
    let missions_added = mission::seed_missions(&db, &config.missions).await?;
    let rewards_added = redemption::seed_rewards(&db, &config.rewards).await?;
    info!(missions_added, rewards_added, "catalog seeding finished");

    // 6. Expire pending ledger entries whose deadline passed
    let now = chrono::Utc::now();
    let expired = ledger::expire_pending_entries(&db, now).await?;
    info!(expired, "pending-entry expiry sweep finished");

    // 7. Referral retention milestones (30/90 day)
    let sweep = referral::run_retention_sweep(&db, now).await?;
    info!(
        checked = sweep.checked,
        awarded_30d = sweep.awarded_30d,
        awarded_90d = sweep.awarded_90d,
        skipped_unpaid = sweep.skipped_unpaid,
        "retention sweep finished"
    );

    Ok(())
}
