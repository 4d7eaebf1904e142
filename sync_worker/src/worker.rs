use std::time::Duration;

use log::*;
use sqlx::{migrate::MigrateDatabase, Sqlite};
use sync_engine::{JobApi, SqliteDatabase, SyncApi};
use tokio::task::JoinHandle;

use crate::{config::WorkerConfig, errors::WorkerError, integrations::IdexConnector};

/// Builds the full worker stack from config and runs it until ctrl-c.
///
/// Startup order matters: migrations first, then the stale-job sweep (an `InProgress` job this early belongs
/// to a run that died mid-sync), and only then the poll loop.
pub async fn run_worker(config: WorkerConfig) -> Result<(), WorkerError> {
    if !Sqlite::database_exists(&config.database_url).await.unwrap_or(false) {
        info!("🗄️ Database {} does not exist. Creating it.", config.database_url);
        Sqlite::create_database(&config.database_url)
            .await
            .map_err(|e| WorkerError::Initialization(e.to_string()))?;
    }
    let db = SqliteDatabase::new_with_url(&config.database_url, config.max_connections).await?;
    db.run_migrations().await?;
    if config.sweep_stale_jobs {
        let jobs = JobApi::new(db.clone());
        jobs.fail_stale_jobs(config.stale_job_age).await?;
    }

    let connector = IdexConnector::new(config.panel.clone())?;
    let api = SyncApi::new(db, connector).with_config(config.sync);
    let cancel = api.cancellation_token();
    let worker = start_sync_worker(api, config.poll_interval);

    tokio::signal::ctrl_c().await.map_err(|e| WorkerError::Initialization(e.to_string()))?;
    info!("🛑️ Shutdown requested. Cancelling in-flight syncs.");
    cancel.cancel();
    let _ = worker.await;
    Ok(())
}

/// Starts the sync poll loop. The loop runs until the api's cancellation token fires; the in-flight job, if
/// any, is still driven to a terminal state before the task exits.
pub fn start_sync_worker(api: SyncApi<SqliteDatabase, IdexConnector>, poll_interval: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let cancel = api.cancellation_token();
        let mut timer = tokio::time::interval(poll_interval);
        info!("⏱️ Panel sync worker started. Polling every {poll_interval:?}");
        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    info!("⏱️ Panel sync worker stopped");
                    break;
                },
                _ = timer.tick() => {
                    match api.process_sync_orders().await {
                        Ok(jobs) if jobs.is_empty() => {},
                        Ok(jobs) => info!("⏱️ {} sync job(s) reached a terminal state", jobs.len()),
                        Err(e) => error!("⏱️ Error processing sync jobs: {e}"),
                    }
                },
            }
        }
    })
}
