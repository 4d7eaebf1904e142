use chrono::Duration;
use log::*;

use crate::{
    db_types::{NewSyncJob, SyncJob},
    sync_api::job_objects::JobQueryFilter,
    traits::{JobStore, SyncEngineError},
};

/// `JobApi` creates sync jobs and answers the status queries that the admin UI polls to render sync history.
#[derive(Debug, Clone)]
pub struct JobApi<B> {
    db: B,
}

impl<B> JobApi<B> {
    pub fn new(db: B) -> Self {
        Self { db }
    }
}

impl<B> JobApi<B>
where B: JobStore
{
    /// Requests a sync of one cabinet, or of every cabinet when `cabinet_id` is `None`. The job is inserted as
    /// `Pending` and picked up by the next orchestrator poll.
    pub async fn request_sync(&self, cabinet_id: Option<i64>, page_depth: u32) -> Result<SyncJob, SyncEngineError> {
        if page_depth == 0 {
            return Err(SyncEngineError::ZeroPageDepth);
        }
        let job = self.db.insert_job(NewSyncJob { cabinet_id, page_depth }).await?;
        match job.cabinet_id {
            Some(id) => info!("🧾️ Sync job #{} requested for cabinet {id}, {page_depth} page(s)", job.id),
            None => info!("🧾️ Sync job #{} requested for all cabinets, {page_depth} page(s)", job.id),
        }
        Ok(job)
    }

    pub async fn job(&self, id: i64) -> Result<SyncJob, SyncEngineError> {
        self.db.fetch_job(id).await?.ok_or(SyncEngineError::JobNotFound(id))
    }

    /// Job history, newest first. See [`JobQueryFilter`] for the available criteria.
    pub async fn search(&self, filter: JobQueryFilter) -> Result<Vec<SyncJob>, SyncEngineError> {
        trace!("🧾️ Job search: {filter}");
        self.db.search_jobs(filter).await
    }

    /// Fails any job left `InProgress` for longer than `older_than`. Run this at worker startup, before the
    /// first poll: a job in that state this early belongs to a run that died mid-sync.
    pub async fn fail_stale_jobs(&self, older_than: Duration) -> Result<Vec<SyncJob>, SyncEngineError> {
        let failed = self.db.fail_stale_jobs(older_than).await?;
        if !failed.is_empty() {
            let ids = failed.iter().map(|j| format!("#{}", j.id)).collect::<Vec<String>>().join(", ");
            warn!("🧾️ Failed {} stale sync job(s): {ids}", failed.len());
        }
        Ok(failed)
    }
}
