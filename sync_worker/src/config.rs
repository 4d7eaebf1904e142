use std::{env, time::Duration};

use idex_client::{PanelConfig, RetryPolicy};
use log::*;
use pm_common::helpers::{parse_boolean_flag, parse_number_flag};
use sync_engine::SyncApiConfig;

const DEFAULT_DATABASE_URL: &str = "sqlite://data/pms_store.db";
const DEFAULT_MAX_CONNECTIONS: u32 = 5;
const DEFAULT_POLL_INTERVAL_SECS: u64 = 60;
const DEFAULT_STALE_JOB_AGE_SECS: i64 = 3600;
const DEFAULT_RETRY_MAX_ATTEMPTS: u32 = 5;
const DEFAULT_RETRY_BASE_DELAY_MS: u64 = 500;

#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub database_url: String,
    pub max_connections: u32,
    /// How often the worker polls for pending sync jobs.
    pub poll_interval: Duration,
    /// If true, jobs left `InProgress` by a dead worker run are failed at startup.
    pub sweep_stale_jobs: bool,
    /// An `InProgress` job older than this at startup belongs to a dead worker run and is failed.
    pub stale_job_age: chrono::Duration,
    pub sync: SyncApiConfig,
    pub panel: PanelConfig,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            database_url: DEFAULT_DATABASE_URL.to_string(),
            max_connections: DEFAULT_MAX_CONNECTIONS,
            poll_interval: Duration::from_secs(DEFAULT_POLL_INTERVAL_SECS),
            sweep_stale_jobs: true,
            stale_job_age: chrono::Duration::seconds(DEFAULT_STALE_JOB_AGE_SECS),
            sync: SyncApiConfig::default(),
            panel: PanelConfig::default(),
        }
    }
}

impl WorkerConfig {
    pub fn from_env_or_default() -> Self {
        let database_url = env::var("PMS_DATABASE_URL").unwrap_or_else(|_| {
            warn!("🪛️ PMS_DATABASE_URL is not set. Using the default, {DEFAULT_DATABASE_URL}.");
            DEFAULT_DATABASE_URL.to_string()
        });
        let max_connections = parse_number_flag(env::var("PMS_MAX_CONNECTIONS").ok(), DEFAULT_MAX_CONNECTIONS);
        let poll_interval = Duration::from_secs(parse_number_flag(
            env::var("PMS_POLL_INTERVAL_SECS").ok(),
            DEFAULT_POLL_INTERVAL_SECS,
        ));
        let sweep_stale_jobs = parse_boolean_flag(env::var("PMS_SWEEP_STALE_JOBS").ok(), true);
        let stale_job_age = chrono::Duration::seconds(parse_number_flag(
            env::var("PMS_STALE_JOB_AGE_SECS").ok(),
            DEFAULT_STALE_JOB_AGE_SECS,
        ));
        let defaults = SyncApiConfig::default();
        let sync = SyncApiConfig {
            concurrent_requests: parse_number_flag(
                env::var("PMS_CONCURRENT_REQUESTS").ok(),
                defaults.concurrent_requests,
            ),
            chunk_delay: Duration::from_millis(parse_number_flag(
                env::var("PMS_CHUNK_DELAY_MS").ok(),
                defaults.chunk_delay.as_millis() as u64,
            )),
            cabinet_timeout: Duration::from_secs(parse_number_flag(
                env::var("PMS_CABINET_TIMEOUT_SECS").ok(),
                defaults.cabinet_timeout.as_secs(),
            )),
        };
        let retry = RetryPolicy::new(
            parse_number_flag(env::var("PMS_RETRY_MAX_ATTEMPTS").ok(), DEFAULT_RETRY_MAX_ATTEMPTS),
            Duration::from_millis(parse_number_flag(
                env::var("PMS_RETRY_BASE_DELAY_MS").ok(),
                DEFAULT_RETRY_BASE_DELAY_MS,
            )),
        );
        let panel = PanelConfig::from_env_or_default().with_retry_policy(retry);
        Self { database_url, max_connections, poll_interval, sweep_stale_jobs, stale_job_age, sync, panel }
    }
}
