use chrono::{DateTime, Utc};
use log::debug;
use pm_common::CurrencyMap;
use sqlx::{types::Json, FromRow, SqliteConnection};

use crate::{
    db_types::{ExternalTransaction, NewExternalTransaction},
    traits::SyncEngineError,
};

#[derive(FromRow)]
struct TransactionRow {
    id: i64,
    external_id: String,
    cabinet_id: i64,
    wallet: String,
    amount: Json<CurrencyMap>,
    total: Json<CurrencyMap>,
    status: i32,
    panel_created_at: Option<String>,
    approved_at: Option<String>,
    expired_at: Option<String>,
    ingested_at: DateTime<Utc>,
    extra: Json<serde_json::Value>,
}

impl From<TransactionRow> for ExternalTransaction {
    fn from(row: TransactionRow) -> Self {
        Self {
            id: row.id,
            external_id: row.external_id,
            cabinet_id: row.cabinet_id,
            wallet: row.wallet,
            amount: row.amount.0,
            total: row.total.0,
            status: row.status,
            panel_created_at: row.panel_created_at,
            approved_at: row.approved_at,
            expired_at: row.expired_at,
            ingested_at: row.ingested_at,
            extra: row.extra.0,
        }
    }
}

/// Inserts the transaction unless it is already stored, returning `true` only when a row was actually
/// created. The (external_id, cabinet_id) pair is the deduplication key; re-ingesting a record the panel has
/// reported before is a no-op, never a duplicate row.
pub async fn idempotent_insert(
    tx: NewExternalTransaction,
    conn: &mut SqliteConnection,
) -> Result<bool, SyncEngineError> {
    match fetch_transaction(&tx.external_id, tx.cabinet_id, &mut *conn).await? {
        Some(_) => Ok(false),
        None => {
            let inserted = insert_transaction(tx, conn).await?;
            debug!(
                "🗄️ Transaction [{}] for cabinet {} inserted with id {}",
                inserted.external_id, inserted.cabinet_id, inserted.id
            );
            Ok(true)
        },
    }
}

async fn insert_transaction(
    tx: NewExternalTransaction,
    conn: &mut SqliteConnection,
) -> Result<ExternalTransaction, SyncEngineError> {
    let row: TransactionRow = sqlx::query_as(
        r#"
            INSERT INTO external_transactions (
                external_id,
                cabinet_id,
                wallet,
                amount,
                total,
                status,
                panel_created_at,
                approved_at,
                expired_at,
                extra
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING *;
        "#,
    )
    .bind(tx.external_id)
    .bind(tx.cabinet_id)
    .bind(tx.wallet)
    .bind(Json(tx.amount))
    .bind(Json(tx.total))
    .bind(tx.status)
    .bind(tx.panel_created_at)
    .bind(tx.approved_at)
    .bind(tx.expired_at)
    .bind(Json(tx.extra))
    .fetch_one(conn)
    .await?;
    Ok(row.into())
}

pub async fn fetch_transaction(
    external_id: &str,
    cabinet_id: i64,
    conn: &mut SqliteConnection,
) -> Result<Option<ExternalTransaction>, sqlx::Error> {
    let row: Option<TransactionRow> =
        sqlx::query_as("SELECT * FROM external_transactions WHERE external_id = $1 AND cabinet_id = $2")
            .bind(external_id)
            .bind(cabinet_id)
            .fetch_optional(conn)
            .await?;
    Ok(row.map(ExternalTransaction::from))
}

/// Newest-first page of a cabinet's ingested transactions.
pub async fn fetch_transactions_for_cabinet(
    cabinet_id: i64,
    limit: u32,
    offset: u32,
    conn: &mut SqliteConnection,
) -> Result<Vec<ExternalTransaction>, sqlx::Error> {
    let rows: Vec<TransactionRow> = sqlx::query_as(
        "SELECT * FROM external_transactions WHERE cabinet_id = $1 ORDER BY ingested_at DESC, id DESC LIMIT $2 \
         OFFSET $3",
    )
    .bind(cabinet_id)
    .bind(i64::from(limit))
    .bind(i64::from(offset))
    .fetch_all(conn)
    .await?;
    Ok(rows.into_iter().map(ExternalTransaction::from).collect())
}

pub async fn transaction_count(cabinet_id: Option<i64>, conn: &mut SqliteConnection) -> Result<u64, sqlx::Error> {
    let count: i64 = match cabinet_id {
        Some(id) => {
            sqlx::query_scalar("SELECT COUNT(*) FROM external_transactions WHERE cabinet_id = $1")
                .bind(id)
                .fetch_one(conn)
                .await?
        },
        None => sqlx::query_scalar("SELECT COUNT(*) FROM external_transactions").fetch_one(conn).await?,
    };
    Ok(count.max(0) as u64)
}
