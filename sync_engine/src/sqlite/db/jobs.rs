use chrono::{DateTime, Duration, Utc};
use log::trace;
use sqlx::{sqlite::SqliteRow, types::Json, FromRow, QueryBuilder, SqliteConnection};

use crate::{
    db_types::{CabinetOutcome, NewSyncJob, ProcessedMap, SyncJob, SyncJobStatus},
    sync_api::job_objects::JobQueryFilter,
    traits::SyncEngineError,
};

#[derive(FromRow)]
struct JobRow {
    id: i64,
    cabinet_id: Option<i64>,
    page_depth: i64,
    status: SyncJobStatus,
    created_at: DateTime<Utc>,
    start_sync_at: Option<DateTime<Utc>>,
    end_sync_at: Option<DateTime<Utc>>,
    processed: Json<ProcessedMap>,
    last_error: Option<String>,
}

impl From<JobRow> for SyncJob {
    fn from(row: JobRow) -> Self {
        Self {
            id: row.id,
            cabinet_id: row.cabinet_id,
            page_depth: u32::try_from(row.page_depth).unwrap_or(1),
            status: row.status,
            created_at: row.created_at,
            start_sync_at: row.start_sync_at,
            end_sync_at: row.end_sync_at,
            processed: row.processed.0,
            last_error: row.last_error,
        }
    }
}

pub async fn insert_job(job: NewSyncJob, conn: &mut SqliteConnection) -> Result<SyncJob, SyncEngineError> {
    let row: JobRow = sqlx::query_as("INSERT INTO sync_jobs (cabinet_id, page_depth) VALUES ($1, $2) RETURNING *")
        .bind(job.cabinet_id)
        .bind(i64::from(job.page_depth))
        .fetch_one(conn)
        .await?;
    Ok(row.into())
}

pub async fn fetch_job(id: i64, conn: &mut SqliteConnection) -> Result<Option<SyncJob>, sqlx::Error> {
    let row: Option<JobRow> =
        sqlx::query_as("SELECT * FROM sync_jobs WHERE id = $1").bind(id).fetch_optional(conn).await?;
    Ok(row.map(SyncJob::from))
}

/// The orchestrator's work queue: every `Pending` job, strictly in creation order.
pub async fn fetch_pending_jobs(conn: &mut SqliteConnection) -> Result<Vec<SyncJob>, sqlx::Error> {
    let rows: Vec<JobRow> =
        sqlx::query_as("SELECT * FROM sync_jobs WHERE status = 'Pending' ORDER BY created_at ASC, id ASC")
            .fetch_all(conn)
            .await?;
    Ok(rows.into_iter().map(SyncJob::from).collect())
}

/// Fetches jobs according to criteria specified in the `JobQueryFilter`.
///
/// Resulting jobs are ordered newest-first, which is what a progress-polling UI wants.
pub async fn search_jobs(filter: JobQueryFilter, conn: &mut SqliteConnection) -> Result<Vec<SyncJob>, sqlx::Error> {
    let mut builder = QueryBuilder::new("SELECT * FROM sync_jobs ");
    if !filter.is_empty() {
        builder.push("WHERE ");
    }
    let mut where_clause = builder.separated(" AND ");
    if let Some(cabinet_id) = filter.cabinet_id {
        where_clause.push("cabinet_id = ");
        where_clause.push_bind_unseparated(cabinet_id);
    }
    if let Some(since) = filter.since {
        where_clause.push("created_at >= ");
        where_clause.push_bind_unseparated(since);
    }
    if let Some(until) = filter.until {
        where_clause.push("created_at <= ");
        where_clause.push_bind_unseparated(until);
    }
    if let Some(statuses) = filter.status.as_ref().filter(|s| !s.is_empty()) {
        let status_clause = statuses.iter().map(|s| format!("'{s}'")).collect::<Vec<String>>().join(",");
        where_clause.push(format!("status IN ({status_clause})"));
    }
    builder.push(" ORDER BY created_at DESC, id DESC LIMIT ");
    builder.push_bind(i64::from(filter.page_size()));
    builder.push(" OFFSET ");
    builder.push_bind(i64::from(filter.page_offset()));

    trace!("🗄️ Executing query: {}", builder.sql());
    let rows = builder
        .build()
        .fetch_all(conn)
        .await?
        .into_iter()
        .map(|row: SqliteRow| JobRow::from_row(&row))
        .collect::<Result<Vec<JobRow>, sqlx::Error>>()?;
    Ok(rows.into_iter().map(SyncJob::from).collect())
}

pub async fn mark_in_progress(id: i64, conn: &mut SqliteConnection) -> Result<SyncJob, SyncEngineError> {
    let row: Option<JobRow> = sqlx::query_as(
        "UPDATE sync_jobs SET status = 'InProgress', start_sync_at = CURRENT_TIMESTAMP WHERE id = $1 AND status = \
         'Pending' RETURNING *",
    )
    .bind(id)
    .fetch_optional(&mut *conn)
    .await?;
    match row {
        Some(row) => Ok(row.into()),
        None => Err(transition_error(id, SyncJobStatus::InProgress, conn).await),
    }
}

/// Merges one cabinet's outcome into the job's processed map.
///
/// The update happens inside a single `json_set` statement, so two cabinets finishing at nearly the same
/// instant cannot overwrite each other's entries.
pub async fn record_cabinet_outcome(
    job_id: i64,
    cabinet_id: i64,
    outcome: CabinetOutcome,
    conn: &mut SqliteConnection,
) -> Result<SyncJob, SyncEngineError> {
    let path = format!("$.\"{cabinet_id}\"");
    let value = serde_json::to_string(&outcome).map_err(|e| SyncEngineError::DatabaseError(e.to_string()))?;
    let row: Option<JobRow> = sqlx::query_as(
        "UPDATE sync_jobs SET processed = json_set(processed, $1, json($2)) WHERE id = $3 RETURNING *",
    )
    .bind(path)
    .bind(value)
    .bind(job_id)
    .fetch_optional(conn)
    .await?;
    row.map(SyncJob::from).ok_or(SyncEngineError::JobNotFound(job_id))
}

pub async fn complete_job(id: i64, conn: &mut SqliteConnection) -> Result<SyncJob, SyncEngineError> {
    let row: Option<JobRow> = sqlx::query_as(
        "UPDATE sync_jobs SET status = 'Completed', end_sync_at = CURRENT_TIMESTAMP WHERE id = $1 AND status = \
         'InProgress' RETURNING *",
    )
    .bind(id)
    .fetch_optional(&mut *conn)
    .await?;
    match row {
        Some(row) => Ok(row.into()),
        None => Err(transition_error(id, SyncJobStatus::Completed, conn).await),
    }
}

pub async fn fail_job(id: i64, message: &str, conn: &mut SqliteConnection) -> Result<SyncJob, SyncEngineError> {
    let row: Option<JobRow> = sqlx::query_as(
        "UPDATE sync_jobs SET status = 'Failed', end_sync_at = CURRENT_TIMESTAMP, last_error = $1 WHERE id = $2 AND \
         status IN ('Pending', 'InProgress') RETURNING *",
    )
    .bind(message)
    .bind(id)
    .fetch_optional(&mut *conn)
    .await?;
    match row {
        Some(row) => Ok(row.into()),
        None => Err(transition_error(id, SyncJobStatus::Failed, conn).await),
    }
}

/// Fails jobs that have sat `InProgress` for longer than the given limit. Jobs in that state belong to an
/// orchestrator run that died without reaching a terminal transition.
pub async fn fail_stale_jobs(limit: Duration, conn: &mut SqliteConnection) -> Result<Vec<SyncJob>, SyncEngineError> {
    let rows: Vec<JobRow> = sqlx::query_as(
        format!(
            "UPDATE sync_jobs SET status = 'Failed', end_sync_at = CURRENT_TIMESTAMP, last_error = 'sync job \
             abandoned by a previous worker run' WHERE status = 'InProgress' AND \
             (unixepoch(CURRENT_TIMESTAMP) - unixepoch(start_sync_at)) > {} RETURNING *;",
            limit.num_seconds()
        )
        .as_str(),
    )
    .fetch_all(conn)
    .await?;
    Ok(rows.into_iter().map(SyncJob::from).collect())
}

async fn transition_error(id: i64, requested: SyncJobStatus, conn: &mut SqliteConnection) -> SyncEngineError {
    match fetch_job(id, conn).await {
        Ok(Some(job)) => SyncEngineError::IllegalJobTransition { id, found: job.status, requested },
        Ok(None) => SyncEngineError::JobNotFound(id),
        Err(e) => e.into(),
    }
}
