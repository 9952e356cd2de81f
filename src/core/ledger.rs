//! Ledger store - The single mutation path for point-affecting events.
//!
//! The ledger is append-only: earns, spends, and adjustments are inserted,
//! never updated, with the sole exception of the pending→available and
//! pending→expired status transitions. Balances are derived by aggregation
//! on demand, so there is no counter to drift out of sync with the event log.
//!
//! The spend path performs its balance check and insert inside one database
//! transaction; two concurrent spends therefore cannot both pass the check
//! and overdraw the account.

use crate::{
    entities::{LedgerEntry, ledger_entry},
    errors::{Error, Result},
};
use sea_orm::{
    ConnectionTrait, DatabaseConnection, FromQueryResult, PaginatorTrait, QueryOrder, QuerySelect,
    Set, TransactionTrait, prelude::*, sea_query::Expr,
};
use tracing::debug;

/// Ledger source tag for admin adjustments
pub const SOURCE_ADMIN: &str = "admin";
/// Ledger source tag for reward redemptions
pub const SOURCE_REDEMPTION: &str = "redemption";

/// Optional parameters for [`earn_points`].
#[derive(Debug, Default, Clone)]
pub struct EarnOptions {
    /// Insert the entry as `pending` instead of the default `available`
    pub pending: bool,
    /// Secondary idempotency key (referred user id, reward id, ...)
    pub source_id: Option<String>,
    /// Free-text annotation
    pub note: Option<String>,
    /// Deadline after which a still-pending entry expires
    pub expires_at: Option<DateTimeUtc>,
}

/// A user's derived balances.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BalanceSummary {
    /// Spendable now: available earns and adjustments minus all spends
    pub available: i64,
    /// Provisional earns, not yet spendable
    pub pending: i64,
    /// All-time earned (determines tier), unaffected by spending
    pub lifetime: i64,
}

#[derive(FromQueryResult)]
struct PointsSum {
    total: Option<i64>,
}

async fn sum_points<C>(
    db: &C,
    user_id: i64,
    entry_types: &[&str],
    status: &str,
) -> Result<i64>
where
    C: ConnectionTrait,
{
    let row = LedgerEntry::find()
        .select_only()
        .column_as(ledger_entry::Column::Points.sum(), "total")
        .filter(ledger_entry::Column::UserId.eq(user_id))
        .filter(ledger_entry::Column::EntryType.is_in(entry_types.iter().copied()))
        .filter(ledger_entry::Column::Status.eq(status))
        .into_model::<PointsSum>()
        .one(db)
        .await?;

    Ok(row.and_then(|r| r.total).unwrap_or(0))
}

/// Computes the spendable balance: available earns and adjustments minus
/// spends. Generic over the connection so the spend path can evaluate it
/// inside its own transaction.
pub async fn available_balance<C>(db: &C, user_id: i64) -> Result<i64>
where
    C: ConnectionTrait,
{
    let earned = sum_points(
        db,
        user_id,
        &[ledger_entry::TYPE_EARN, ledger_entry::TYPE_ADJUSTMENT],
        ledger_entry::STATUS_AVAILABLE,
    )
    .await?;
    let spent = sum_points(
        db,
        user_id,
        &[ledger_entry::TYPE_SPEND],
        ledger_entry::STATUS_AVAILABLE,
    )
    .await?;

    Ok(earned - spent)
}

/// Computes available, pending, and lifetime balances in one call.
pub async fn get_balance(db: &DatabaseConnection, user_id: i64) -> Result<BalanceSummary> {
    let lifetime = sum_points(
        db,
        user_id,
        &[ledger_entry::TYPE_EARN, ledger_entry::TYPE_ADJUSTMENT],
        ledger_entry::STATUS_AVAILABLE,
    )
    .await?;
    let spent = sum_points(
        db,
        user_id,
        &[ledger_entry::TYPE_SPEND],
        ledger_entry::STATUS_AVAILABLE,
    )
    .await?;
    let pending = sum_points(
        db,
        user_id,
        &[ledger_entry::TYPE_EARN],
        ledger_entry::STATUS_PENDING,
    )
    .await?;

    Ok(BalanceSummary {
        available: lifetime - spent,
        pending,
        lifetime,
    })
}

/// Inserts an `earn`-type entry for the user.
///
/// Points must be a positive integer. No idempotency check is performed
/// here: callers (mission tracker, referral attributor) own the
/// "already awarded" semantics via their `source`/`source_id` checks, since
/// the ledger itself is append-only and unaware of business rules.
pub async fn earn_points<C>(
    db: &C,
    user_id: i64,
    points: i64,
    source: &str,
    options: EarnOptions,
) -> Result<ledger_entry::Model>
where
    C: ConnectionTrait,
{
    if points <= 0 {
        return Err(Error::InvalidPoints { points });
    }

    let status = if options.pending {
        ledger_entry::STATUS_PENDING
    } else {
        ledger_entry::STATUS_AVAILABLE
    };

    let entry = ledger_entry::ActiveModel {
        user_id: Set(user_id),
        entry_type: Set(ledger_entry::TYPE_EARN.to_string()),
        status: Set(status.to_string()),
        points: Set(points),
        source: Set(source.to_string()),
        source_id: Set(options.source_id),
        note: Set(options.note),
        expires_at: Set(options.expires_at),
        created_at: Set(chrono::Utc::now()),
        ..Default::default()
    };

    let result = entry.insert(db).await?;
    debug!(user_id, points, source, status, "recorded earn entry");
    Ok(result)
}

/// Inserts a `spend`-type entry, rejecting it if the available balance is
/// too low. The check and the insert run in a single transaction.
pub async fn spend_points(
    db: &DatabaseConnection,
    user_id: i64,
    points: i64,
    source: &str,
    source_id: Option<String>,
) -> Result<ledger_entry::Model> {
    let txn = db.begin().await?;
    let entry = spend_points_in(&txn, user_id, points, source, source_id).await?;
    txn.commit().await?;
    Ok(entry)
}

/// Transaction-scoped spend: balance check plus insert against the caller's
/// connection. The redemption engine uses this to co-commit the spend entry
/// with its redemption row.
pub async fn spend_points_in<C>(
    db: &C,
    user_id: i64,
    points: i64,
    source: &str,
    source_id: Option<String>,
) -> Result<ledger_entry::Model>
where
    C: ConnectionTrait,
{
    if points <= 0 {
        return Err(Error::InvalidPoints { points });
    }

    let available = available_balance(db, user_id).await?;
    if points > available {
        return Err(Error::InsufficientPoints {
            available,
            required: points,
        });
    }

    let entry = ledger_entry::ActiveModel {
        user_id: Set(user_id),
        entry_type: Set(ledger_entry::TYPE_SPEND.to_string()),
        status: Set(ledger_entry::STATUS_AVAILABLE.to_string()),
        points: Set(points),
        source: Set(source.to_string()),
        source_id: Set(source_id),
        note: Set(None),
        expires_at: Set(None),
        created_at: Set(chrono::Utc::now()),
        ..Default::default()
    };

    let result = entry.insert(db).await?;
    debug!(user_id, points, source, "recorded spend entry");
    Ok(result)
}

/// Inserts a signed `adjustment`-type entry attributed to an admin actor.
///
/// The delta must be non-zero and a reason note is required. Adjustments
/// are always immediately `available`; a negative delta is checked against
/// the available balance inside the transaction so the balance can never go
/// negative through admin action either.
pub async fn adjust_points(
    db: &DatabaseConnection,
    user_id: i64,
    delta: i64,
    note: &str,
    admin_actor: &str,
) -> Result<ledger_entry::Model> {
    if delta == 0 {
        return Err(Error::InvalidPoints { points: delta });
    }
    if note.trim().is_empty() {
        return Err(Error::EmptyNote);
    }

    let txn = db.begin().await?;

    if delta < 0 {
        let available = available_balance(&txn, user_id).await?;
        if -delta > available {
            return Err(Error::InsufficientPoints {
                available,
                required: -delta,
            });
        }
    }

    let entry = ledger_entry::ActiveModel {
        user_id: Set(user_id),
        entry_type: Set(ledger_entry::TYPE_ADJUSTMENT.to_string()),
        status: Set(ledger_entry::STATUS_AVAILABLE.to_string()),
        points: Set(delta),
        source: Set(SOURCE_ADMIN.to_string()),
        source_id: Set(Some(admin_actor.to_string())),
        note: Set(Some(note.trim().to_string())),
        expires_at: Set(None),
        created_at: Set(chrono::Utc::now()),
        ..Default::default()
    };

    let result = entry.insert(&txn).await?;
    txn.commit().await?;
    debug!(user_id, delta, admin_actor, "recorded admin adjustment");
    Ok(result)
}

/// Transitions matching pending entries to `available`.
///
/// Used when a provisional award becomes unconditional (e.g. the referred
/// user verified their email). Returns the number of converted entries.
pub async fn convert_pending_to_available<C>(
    db: &C,
    user_id: i64,
    source: &str,
    source_id: Option<&str>,
) -> Result<u64>
where
    C: ConnectionTrait,
{
    let mut update = LedgerEntry::update_many()
        .col_expr(
            ledger_entry::Column::Status,
            Expr::value(ledger_entry::STATUS_AVAILABLE),
        )
        .filter(ledger_entry::Column::UserId.eq(user_id))
        .filter(ledger_entry::Column::Source.eq(source))
        .filter(ledger_entry::Column::Status.eq(ledger_entry::STATUS_PENDING));

    update = match source_id {
        Some(id) => update.filter(ledger_entry::Column::SourceId.eq(id)),
        None => update.filter(ledger_entry::Column::SourceId.is_null()),
    };

    let res = update.exec(db).await?;
    Ok(res.rows_affected)
}

/// Sweep: expires pending entries whose deadline has passed.
///
/// Conversion to `available` only ever happens through
/// [`convert_pending_to_available`]; this sweep is the other side of the
/// coin, retiring provisional awards that never became unconditional.
pub async fn expire_pending_entries(db: &DatabaseConnection, now: DateTimeUtc) -> Result<u64> {
    let res = LedgerEntry::update_many()
        .col_expr(
            ledger_entry::Column::Status,
            Expr::value(ledger_entry::STATUS_EXPIRED),
        )
        .filter(ledger_entry::Column::Status.eq(ledger_entry::STATUS_PENDING))
        .filter(ledger_entry::Column::ExpiresAt.is_not_null())
        .filter(ledger_entry::Column::ExpiresAt.lte(now))
        .exec(db)
        .await?;

    Ok(res.rows_affected)
}

/// Checks whether an entry with this exact `(user, source, source_id)` key
/// already exists. This is the milestone de-duplication primitive.
pub async fn has_entry<C>(db: &C, user_id: i64, source: &str, source_id: &str) -> Result<bool>
where
    C: ConnectionTrait,
{
    let count = LedgerEntry::find()
        .filter(ledger_entry::Column::UserId.eq(user_id))
        .filter(ledger_entry::Column::Source.eq(source))
        .filter(ledger_entry::Column::SourceId.eq(source_id))
        .count(db)
        .await?;

    Ok(count > 0)
}

/// Retrieves a page of the user's ledger history, newest first.
///
/// `page` is zero-based. Returns the page of entries and the total entry
/// count for the user.
pub async fn get_history(
    db: &DatabaseConnection,
    user_id: i64,
    page: u64,
    per_page: u64,
) -> Result<(Vec<ledger_entry::Model>, u64)> {
    let paginator = LedgerEntry::find()
        .filter(ledger_entry::Column::UserId.eq(user_id))
        .order_by_desc(ledger_entry::Column::CreatedAt)
        .order_by_desc(ledger_entry::Column::Id)
        .paginate(db, per_page.max(1));

    let total = paginator.num_items().await?;
    let entries = paginator.fetch_page(page).await?;
    Ok((entries, total))
}
