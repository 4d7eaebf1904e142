//! `SqliteDatabase` is the concrete SQLite implementation of the sync engine's storage backend.
use std::fmt::Debug;

use chrono::Duration;
use sqlx::SqlitePool;

use super::db::{cabinets, jobs, new_pool, transactions};
use crate::{
    db_types::{
        Cabinet,
        CabinetOutcome,
        ExternalTransaction,
        NewCabinet,
        NewExternalTransaction,
        NewSyncJob,
        SyncJob,
        UpdateCabinetRequest,
    },
    sync_api::job_objects::JobQueryFilter,
    traits::{CabinetManagement, JobStore, SyncBackend, SyncEngineError, TransactionStore},
};

#[derive(Clone)]
pub struct SqliteDatabase {
    url: String,
    pool: SqlitePool,
}

impl Debug for SqliteDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "SqliteDatabase ({:?})", self.pool)
    }
}

impl SqliteDatabase {
    pub async fn new_with_url(url: &str, max_connections: u32) -> Result<Self, SyncEngineError> {
        let pool = new_pool(url, max_connections).await?;
        Ok(Self { url: url.to_string(), pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Applies any outstanding schema migrations.
    pub async fn run_migrations(&self) -> Result<(), SyncEngineError> {
        sqlx::migrate!("./src/sqlite/migrations")
            .run(&self.pool)
            .await
            .map_err(|e| SyncEngineError::DatabaseError(e.to_string()))
    }
}

impl CabinetManagement for SqliteDatabase {
    async fn insert_cabinet(&self, cabinet: NewCabinet) -> Result<Cabinet, SyncEngineError> {
        let mut conn = self.pool.acquire().await?;
        cabinets::insert_cabinet(cabinet, &mut conn).await
    }

    async fn fetch_cabinet(&self, id: i64) -> Result<Option<Cabinet>, SyncEngineError> {
        let mut conn = self.pool.acquire().await?;
        Ok(cabinets::fetch_cabinet(id, &mut conn).await?)
    }

    async fn fetch_all_cabinets(&self) -> Result<Vec<Cabinet>, SyncEngineError> {
        let mut conn = self.pool.acquire().await?;
        Ok(cabinets::fetch_all_cabinets(&mut conn).await?)
    }

    async fn update_cabinet(&self, id: i64, update: UpdateCabinetRequest) -> Result<Option<Cabinet>, SyncEngineError> {
        let mut conn = self.pool.acquire().await?;
        cabinets::update_cabinet(id, update, &mut conn).await
    }

    async fn delete_cabinet(&self, id: i64) -> Result<bool, SyncEngineError> {
        let mut conn = self.pool.acquire().await?;
        cabinets::delete_cabinet(id, &mut conn).await
    }
}

impl TransactionStore for SqliteDatabase {
    async fn insert_transaction(&self, tx: NewExternalTransaction) -> Result<bool, SyncEngineError> {
        let mut conn = self.pool.acquire().await?;
        transactions::idempotent_insert(tx, &mut conn).await
    }

    async fn fetch_transaction(
        &self,
        external_id: &str,
        cabinet_id: i64,
    ) -> Result<Option<ExternalTransaction>, SyncEngineError> {
        let mut conn = self.pool.acquire().await?;
        Ok(transactions::fetch_transaction(external_id, cabinet_id, &mut conn).await?)
    }

    async fn fetch_transactions_for_cabinet(
        &self,
        cabinet_id: i64,
        limit: u32,
        offset: u32,
    ) -> Result<Vec<ExternalTransaction>, SyncEngineError> {
        let mut conn = self.pool.acquire().await?;
        Ok(transactions::fetch_transactions_for_cabinet(cabinet_id, limit, offset, &mut conn).await?)
    }

    async fn transaction_count(&self, cabinet_id: Option<i64>) -> Result<u64, SyncEngineError> {
        let mut conn = self.pool.acquire().await?;
        Ok(transactions::transaction_count(cabinet_id, &mut conn).await?)
    }
}

impl JobStore for SqliteDatabase {
    async fn insert_job(&self, job: NewSyncJob) -> Result<SyncJob, SyncEngineError> {
        let mut conn = self.pool.acquire().await?;
        jobs::insert_job(job, &mut conn).await
    }

    async fn fetch_job(&self, id: i64) -> Result<Option<SyncJob>, SyncEngineError> {
        let mut conn = self.pool.acquire().await?;
        Ok(jobs::fetch_job(id, &mut conn).await?)
    }

    async fn fetch_pending_jobs(&self) -> Result<Vec<SyncJob>, SyncEngineError> {
        let mut conn = self.pool.acquire().await?;
        Ok(jobs::fetch_pending_jobs(&mut conn).await?)
    }

    async fn search_jobs(&self, filter: JobQueryFilter) -> Result<Vec<SyncJob>, SyncEngineError> {
        let mut conn = self.pool.acquire().await?;
        Ok(jobs::search_jobs(filter, &mut conn).await?)
    }

    async fn mark_job_in_progress(&self, id: i64) -> Result<SyncJob, SyncEngineError> {
        let mut conn = self.pool.acquire().await?;
        jobs::mark_in_progress(id, &mut conn).await
    }

    async fn record_cabinet_outcome(
        &self,
        job_id: i64,
        cabinet_id: i64,
        outcome: CabinetOutcome,
    ) -> Result<SyncJob, SyncEngineError> {
        let mut conn = self.pool.acquire().await?;
        jobs::record_cabinet_outcome(job_id, cabinet_id, outcome, &mut conn).await
    }

    async fn complete_job(&self, id: i64) -> Result<SyncJob, SyncEngineError> {
        let mut conn = self.pool.acquire().await?;
        jobs::complete_job(id, &mut conn).await
    }

    async fn fail_job(&self, id: i64, message: &str) -> Result<SyncJob, SyncEngineError> {
        let mut conn = self.pool.acquire().await?;
        jobs::fail_job(id, message, &mut conn).await
    }

    async fn fail_stale_jobs(&self, older_than: Duration) -> Result<Vec<SyncJob>, SyncEngineError> {
        let mut conn = self.pool.acquire().await?;
        jobs::fail_stale_jobs(older_than, &mut conn).await
    }
}

impl SyncBackend for SqliteDatabase {
    fn url(&self) -> &str {
        self.url.as_str()
    }

    async fn close(&mut self) -> Result<(), SyncEngineError> {
        self.pool.close().await;
        Ok(())
    }
}
