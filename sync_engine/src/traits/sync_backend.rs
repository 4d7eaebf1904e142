use chrono::Duration;
use thiserror::Error;

use crate::{
    db_types::{
        Cabinet,
        CabinetOutcome,
        ExternalTransaction,
        NewCabinet,
        NewExternalTransaction,
        NewSyncJob,
        SyncJob,
        SyncJobStatus,
        UpdateCabinetRequest,
    },
    sync_api::job_objects::JobQueryFilter,
};

/// Cabinet credential storage. Created and edited from the admin surface; read by the orchestrator to resolve
/// a job's target set.
#[allow(async_fn_in_trait)]
pub trait CabinetManagement {
    async fn insert_cabinet(&self, cabinet: NewCabinet) -> Result<Cabinet, SyncEngineError>;

    async fn fetch_cabinet(&self, id: i64) -> Result<Option<Cabinet>, SyncEngineError>;

    async fn fetch_all_cabinets(&self) -> Result<Vec<Cabinet>, SyncEngineError>;

    /// Applies a partial update. Returns the updated record, or `None` if the cabinet does not exist.
    async fn update_cabinet(&self, id: i64, update: UpdateCabinetRequest) -> Result<Option<Cabinet>, SyncEngineError>;

    /// Returns true if a row was deleted. The sync path itself never calls this.
    async fn delete_cabinet(&self, id: i64) -> Result<bool, SyncEngineError>;
}

/// Ingested transaction storage.
#[allow(async_fn_in_trait)]
pub trait TransactionStore {
    /// Inserts the record unless one with the same (external_id, cabinet_id) already exists. Returns true if a
    /// row was inserted, false if it was a duplicate. This call is idempotent.
    async fn insert_transaction(&self, tx: NewExternalTransaction) -> Result<bool, SyncEngineError>;

    async fn fetch_transaction(
        &self,
        external_id: &str,
        cabinet_id: i64,
    ) -> Result<Option<ExternalTransaction>, SyncEngineError>;

    /// Newest-first listing for one cabinet, for the audit/history view.
    async fn fetch_transactions_for_cabinet(
        &self,
        cabinet_id: i64,
        limit: u32,
        offset: u32,
    ) -> Result<Vec<ExternalTransaction>, SyncEngineError>;

    /// Count of stored transactions, over all cabinets or one of them.
    async fn transaction_count(&self, cabinet_id: Option<i64>) -> Result<u64, SyncEngineError>;
}

/// Sync job lifecycle storage.
///
/// Jobs move `Pending -> InProgress -> Completed | Failed` and the terminal transitions stamp `end_sync_at`.
/// The store enforces the legal transitions; an update that would leave a terminal state is an error.
#[allow(async_fn_in_trait)]
pub trait JobStore {
    async fn insert_job(&self, job: NewSyncJob) -> Result<SyncJob, SyncEngineError>;

    async fn fetch_job(&self, id: i64) -> Result<Option<SyncJob>, SyncEngineError>;

    /// All `Pending` jobs, oldest first. This is the orchestrator's work queue.
    async fn fetch_pending_jobs(&self) -> Result<Vec<SyncJob>, SyncEngineError>;

    /// Filtered job listing, newest first, paginated. This is what the admin UI polls.
    async fn search_jobs(&self, filter: JobQueryFilter) -> Result<Vec<SyncJob>, SyncEngineError>;

    /// `Pending -> InProgress`, stamping `start_sync_at`.
    async fn mark_job_in_progress(&self, id: i64) -> Result<SyncJob, SyncEngineError>;

    /// Records one cabinet's outcome into the job's processed map. The read-modify-write of the map is atomic,
    /// so concurrent cabinets finishing at the same instant cannot lose updates.
    async fn record_cabinet_outcome(
        &self,
        job_id: i64,
        cabinet_id: i64,
        outcome: CabinetOutcome,
    ) -> Result<SyncJob, SyncEngineError>;

    /// `InProgress -> Completed`, stamping `end_sync_at`.
    async fn complete_job(&self, id: i64) -> Result<SyncJob, SyncEngineError>;

    /// `Pending | InProgress -> Failed`, stamping `end_sync_at` and recording the message.
    async fn fail_job(&self, id: i64, message: &str) -> Result<SyncJob, SyncEngineError>;

    /// Fails every job that has sat `InProgress` for longer than `older_than`. Such jobs belong to a crashed or
    /// killed orchestrator; nothing is still working on them. Returns the jobs that were failed.
    async fn fail_stale_jobs(&self, older_than: Duration) -> Result<Vec<SyncJob>, SyncEngineError>;
}

/// The full storage backend contract for the sync engine.
#[allow(async_fn_in_trait)]
pub trait SyncBackend: Clone + CabinetManagement + TransactionStore + JobStore {
    /// The URL of the database.
    fn url(&self) -> &str;

    /// Closes the database connection.
    async fn close(&mut self) -> Result<(), SyncEngineError> {
        Ok(())
    }
}

#[derive(Debug, Clone, Error)]
pub enum SyncEngineError {
    #[error("Internal database error: {0}")]
    DatabaseError(String),
    #[error("The requested cabinet {0} does not exist")]
    CabinetNotFound(i64),
    #[error("The requested sync job {0} does not exist")]
    JobNotFound(i64),
    #[error("Illegal status transition for sync job {id}: {found} -> {requested}")]
    IllegalJobTransition { id: i64, found: SyncJobStatus, requested: SyncJobStatus },
    #[error("A sync job must request at least one page")]
    ZeroPageDepth,
    #[error("The requested cabinet change would result in a no-op")]
    CabinetModificationNoOp,
}

impl From<sqlx::Error> for SyncEngineError {
    fn from(e: sqlx::Error) -> Self {
        SyncEngineError::DatabaseError(e.to_string())
    }
}
