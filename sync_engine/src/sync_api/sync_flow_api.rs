use std::{fmt::Debug, time::Duration};

use futures_util::future::join_all;
use log::*;
use tokio_util::sync::CancellationToken;

use crate::{
    db_types::{Cabinet, CabinetOutcome, IngestTally, SyncJob},
    sync_api::{errors::CabinetSyncError, persister::persist_batch},
    traits::{PanelConnector, SyncBackend, SyncEngineError},
};

const DEFAULT_CONCURRENT_REQUESTS: usize = 3;
const DEFAULT_CHUNK_DELAY: Duration = Duration::from_millis(500);
const DEFAULT_CABINET_TIMEOUT: Duration = Duration::from_secs(120);

#[derive(Debug, Clone, Copy)]
pub struct SyncApiConfig {
    /// How many cabinets are synced concurrently within one job.
    pub concurrent_requests: usize,
    /// Pause between cabinet chunks, so a multi-cabinet job does not hammer the panel.
    pub chunk_delay: Duration,
    /// Wall-clock budget for one cabinet's sync. An unresponsive panel fails that cabinet instead of stalling
    /// the whole job.
    pub cabinet_timeout: Duration,
}

impl Default for SyncApiConfig {
    fn default() -> Self {
        Self {
            concurrent_requests: DEFAULT_CONCURRENT_REQUESTS,
            chunk_delay: DEFAULT_CHUNK_DELAY,
            cabinet_timeout: DEFAULT_CABINET_TIMEOUT,
        }
    }
}

/// `SyncApi` is the sync-job orchestrator. It polls the job store for pending jobs and drives each one through
/// `Pending -> InProgress -> Completed | Failed`, fanning out to the job's cabinets with bounded concurrency.
///
/// Jobs are processed strictly one at a time, in creation order, which bounds total load on the panel.
/// Cabinets within a job run `concurrent_requests` at a time; each cabinet's outcome is written into the job's
/// processed map the moment it finishes, so pollers can watch partial progress.
pub struct SyncApi<B, P> {
    db: B,
    panel: P,
    config: SyncApiConfig,
    cancel: CancellationToken,
}

impl<B, P> Debug for SyncApi<B, P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "SyncApi")
    }
}

impl<B, P> SyncApi<B, P> {
    pub fn new(db: B, panel: P) -> Self {
        Self { db, panel, config: SyncApiConfig::default(), cancel: CancellationToken::new() }
    }

    pub fn with_config(mut self, config: SyncApiConfig) -> Self {
        self.config = config;
        self
    }

    /// A handle for cancelling in-flight syncs. Cancellation is checked between pages and between jobs; the
    /// current job is still driven to a terminal state.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }
}

impl<B, P> SyncApi<B, P>
where
    B: SyncBackend,
    P: PanelConnector,
{
    /// Processes every pending sync job, oldest first, one at a time.
    ///
    /// A job that cannot be driven normally (storage errors, for instance) is marked `Failed` with the error
    /// preserved rather than being left `InProgress`. Returns the jobs that reached a terminal state this run.
    pub async fn process_sync_orders(&self) -> Result<Vec<SyncJob>, SyncEngineError> {
        let pending = self.db.fetch_pending_jobs().await?;
        if pending.is_empty() {
            trace!("🔄️ No pending sync jobs");
            return Ok(Vec::new());
        }
        info!("🔄️ Processing {} pending sync job(s)", pending.len());
        let mut terminal = Vec::with_capacity(pending.len());
        for job in pending {
            if self.cancel.is_cancelled() {
                warn!("🔄️ Sync cancelled; remaining jobs stay pending");
                break;
            }
            let id = job.id;
            match self.process_order(job).await {
                Ok(job) => terminal.push(job),
                Err(e) => {
                    error!("🔄️ Sync job #{id} aborted: {e}");
                    match self.db.fail_job(id, &e.to_string()).await {
                        Ok(job) => terminal.push(job),
                        Err(e2) => {
                            error!("🔄️ Could not mark sync job #{id} as failed: {e2}. The job may be stuck InProgress.")
                        },
                    }
                },
            }
        }
        Ok(terminal)
    }

    /// Drives a single pending job to its terminal state.
    pub async fn process_order(&self, job: SyncJob) -> Result<SyncJob, SyncEngineError> {
        let job = self.db.mark_job_in_progress(job.id).await?;
        info!("🔄️ Sync job #{} started. Target: {}", job.id, match job.cabinet_id {
            Some(id) => format!("cabinet {id}"),
            None => "all cabinets".to_string(),
        });
        let cabinets = match job.cabinet_id {
            Some(id) => match self.db.fetch_cabinet(id).await? {
                Some(cabinet) => vec![cabinet],
                None => {
                    let message = SyncEngineError::CabinetNotFound(id).to_string();
                    warn!("🔄️ Sync job #{} failed: {message}", job.id);
                    return self.db.fail_job(job.id, &message).await;
                },
            },
            None => self.db.fetch_all_cabinets().await?,
        };
        if cabinets.is_empty() {
            info!("🔄️ Sync job #{} has no cabinets to sync", job.id);
            return self.db.complete_job(job.id).await;
        }
        let mut outcomes = Vec::with_capacity(cabinets.len());
        for (i, chunk) in cabinets.chunks(self.config.concurrent_requests).enumerate() {
            if i > 0 {
                tokio::time::sleep(self.config.chunk_delay).await;
            }
            let attempts = chunk.iter().map(|cabinet| self.attempt_cabinet(&job, cabinet));
            outcomes.extend(join_all(attempts).await);
        }
        // A multi-cabinet job completes even when some cabinets failed; their errors are in the processed map.
        // A single-cabinet job inherits its one cabinet's failure.
        let single_failure = job.cabinet_id.is_some() && outcomes.first().map(CabinetOutcome::is_failure).unwrap_or(false);
        let job = if single_failure {
            let message =
                outcomes.first().and_then(|o| o.failure_message()).unwrap_or("cabinet sync failed").to_string();
            self.db.fail_job(job.id, &message).await?
        } else {
            self.db.complete_job(job.id).await?
        };
        info!("🔄️ Sync job #{} finished with status {}", job.id, job.status);
        Ok(job)
    }

    /// Syncs one cabinet under the configured timeout and records the outcome into the job immediately.
    /// Never propagates the cabinet's failure; siblings in the same job are isolated from it.
    async fn attempt_cabinet(&self, job: &SyncJob, cabinet: &Cabinet) -> CabinetOutcome {
        debug!("🔄️ Job #{}: syncing cabinet {} ({})", job.id, cabinet.id, cabinet.name);
        let sync = self.sync_cabinet(cabinet, job.page_depth);
        let outcome = match tokio::time::timeout(self.config.cabinet_timeout, sync).await {
            Ok(Ok(tally)) => {
                info!(
                    "🔄️ Job #{}: cabinet {} done. {} processed, {} new",
                    job.id, cabinet.id, tally.total_processed, tally.new_transactions
                );
                CabinetOutcome::from(tally)
            },
            Ok(Err(e)) => {
                warn!("🔄️ Job #{}: cabinet {} failed: {e}", job.id, cabinet.id);
                CabinetOutcome::Failed { message: e.to_string() }
            },
            Err(_) => {
                let e = CabinetSyncError::Timeout(self.config.cabinet_timeout);
                warn!("🔄️ Job #{}: cabinet {} failed: {e}", job.id, cabinet.id);
                CabinetOutcome::Failed { message: e.to_string() }
            },
        };
        if let Err(e) = self.db.record_cabinet_outcome(job.id, cabinet.id, outcome.clone()).await {
            // Progress reporting is best-effort; the terminal transition still runs with the in-memory outcome.
            error!("🔄️ Job #{}: could not record outcome for cabinet {}: {e}", job.id, cabinet.id);
        }
        outcome
    }

    /// Authenticates and pages through the listing, persisting as it goes.
    ///
    /// Pages are fetched strictly in order starting at 1; the loop stops at the requested depth or at the
    /// first empty page, whichever comes first. Cancellation is checked between pages.
    async fn sync_cabinet(&self, cabinet: &Cabinet, page_depth: u32) -> Result<IngestTally, CabinetSyncError> {
        if self.cancel.is_cancelled() {
            return Err(CabinetSyncError::Cancelled);
        }
        let session = self.panel.authenticate(&cabinet.login, &cabinet.password).await?;
        let mut tally = IngestTally::default();
        for page in 1..=page_depth {
            if self.cancel.is_cancelled() {
                return Err(CabinetSyncError::Cancelled);
            }
            let batch = self.panel.fetch_page(&session, page).await?;
            if batch.is_empty() {
                trace!("🔄️ Cabinet {}: page {page} is empty; listing exhausted", cabinet.id);
                break;
            }
            tally.merge(persist_batch(&self.db, cabinet.id, &batch).await);
        }
        Ok(tally)
    }
}
