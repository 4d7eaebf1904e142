use std::{collections::BTreeMap, fmt::Display, str::FromStr};

use chrono::{DateTime, Utc};
use pm_common::{CurrencyMap, Secret};
use serde::{Deserialize, Serialize};
use sqlx::Type;
use thiserror::Error;

use crate::panel_types::PanelTransaction;

//--------------------------------------      Cabinet       ----------------------------------------------------------
/// One external panel account: a login/password pair capable of authenticating against the panel.
#[derive(Debug, Clone)]
pub struct Cabinet {
    pub id: i64,
    /// Human-readable display name, shown in the admin UI and in logs.
    pub name: String,
    pub login: String,
    pub password: Secret<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewCabinet {
    pub name: String,
    pub login: String,
    pub password: Secret<String>,
}

impl NewCabinet {
    pub fn new<S1, S2, S3>(name: S1, login: S2, password: S3) -> Self
    where
        S1: Into<String>,
        S2: Into<String>,
        S3: Into<String>,
    {
        Self { name: name.into(), login: login.into(), password: Secret::new(password.into()) }
    }
}

/// Partial update of a cabinet. Unset fields are left untouched.
#[derive(Debug, Clone, Default)]
pub struct UpdateCabinetRequest {
    pub new_name: Option<String>,
    pub new_login: Option<String>,
    pub new_password: Option<Secret<String>>,
}

impl UpdateCabinetRequest {
    pub fn with_name<S: Into<String>>(mut self, name: S) -> Self {
        self.new_name = Some(name.into());
        self
    }

    pub fn with_login<S: Into<String>>(mut self, login: S) -> Self {
        self.new_login = Some(login.into());
        self
    }

    pub fn with_password<S: Into<String>>(mut self, password: S) -> Self {
        self.new_password = Some(Secret::new(password.into()));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.new_name.is_none() && self.new_login.is_none() && self.new_password.is_none()
    }
}

//--------------------------------------  ExternalTransaction  -------------------------------------------------------
/// A transaction record ingested from the panel.
///
/// The pair (`external_id`, `cabinet_id`) is unique. Records are created only by the sync path and are never
/// updated or deleted by it; the stored row is the audit copy of what the panel reported at ingestion time.
#[derive(Debug, Clone)]
pub struct ExternalTransaction {
    pub id: i64,
    /// Identifier assigned by the panel. Unique within a cabinet, not globally.
    pub external_id: String,
    pub cabinet_id: i64,
    pub wallet: String,
    pub amount: CurrencyMap,
    pub total: CurrencyMap,
    /// Panel-defined small integer status (pending/approved/rejected/...). Stored verbatim.
    pub status: i32,
    /// Timestamps as the panel reported them, kept as strings since their format is the panel's business.
    pub panel_created_at: Option<String>,
    pub approved_at: Option<String>,
    pub expired_at: Option<String>,
    /// Local ingestion time.
    pub ingested_at: DateTime<Utc>,
    /// Everything else the panel sent, preserved for audit.
    pub extra: serde_json::Value,
}

#[derive(Debug, Clone)]
pub struct NewExternalTransaction {
    pub external_id: String,
    pub cabinet_id: i64,
    pub wallet: String,
    pub amount: CurrencyMap,
    pub total: CurrencyMap,
    pub status: i32,
    pub panel_created_at: Option<String>,
    pub approved_at: Option<String>,
    pub expired_at: Option<String>,
    pub extra: serde_json::Value,
}

impl NewExternalTransaction {
    pub fn from_panel(cabinet_id: i64, tx: PanelTransaction) -> Self {
        Self {
            external_id: tx.external_id,
            cabinet_id,
            wallet: tx.wallet,
            amount: tx.amount,
            total: tx.total,
            status: tx.status,
            panel_created_at: tx.created_at,
            approved_at: tx.approved_at,
            expired_at: tx.expired_at,
            extra: tx.extra,
        }
    }
}

//--------------------------------------   SyncJobStatus     ---------------------------------------------------------
/// Lifecycle of a sync job. `Completed` and `Failed` are terminal; no transition ever leaves them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
pub enum SyncJobStatus {
    /// The job has been requested but no orchestrator has picked it up yet.
    Pending,
    /// An orchestrator is working through the job's cabinets.
    InProgress,
    /// All cabinets were attempted. Per-cabinet failures may still be present in `processed`.
    Completed,
    /// The job as a whole failed: its single cabinet errored, or the cabinet set could not be resolved.
    Failed,
}

impl SyncJobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, SyncJobStatus::Completed | SyncJobStatus::Failed)
    }
}

impl Display for SyncJobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SyncJobStatus::Pending => write!(f, "Pending"),
            SyncJobStatus::InProgress => write!(f, "InProgress"),
            SyncJobStatus::Completed => write!(f, "Completed"),
            SyncJobStatus::Failed => write!(f, "Failed"),
        }
    }
}

#[derive(Debug, Clone, Error)]
#[error("Invalid sync job status: {0}")]
pub struct StatusConversionError(String);

impl FromStr for SyncJobStatus {
    type Err = StatusConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Pending" => Ok(Self::Pending),
            "InProgress" => Ok(Self::InProgress),
            "Completed" => Ok(Self::Completed),
            "Failed" => Ok(Self::Failed),
            s => Err(StatusConversionError(s.to_string())),
        }
    }
}

//--------------------------------------   CabinetOutcome    ---------------------------------------------------------
/// The result of one cabinet's attempt within a sync job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum CabinetOutcome {
    Synced { total_processed: u64, new_transactions: u64 },
    Failed { message: String },
}

impl CabinetOutcome {
    pub fn is_failure(&self) -> bool {
        matches!(self, CabinetOutcome::Failed { .. })
    }

    pub fn failure_message(&self) -> Option<&str> {
        match self {
            CabinetOutcome::Failed { message } => Some(message),
            CabinetOutcome::Synced { .. } => None,
        }
    }
}

/// Per-cabinet outcomes for a job, keyed by cabinet id. Persisted as JSON and filled in incrementally as each
/// cabinet finishes, so callers polling the job can observe partial progress while it is still in flight.
pub type ProcessedMap = BTreeMap<i64, CabinetOutcome>;

//--------------------------------------     IngestTally     ---------------------------------------------------------
/// Counters reported by the deduplicating persister.
///
/// `total_processed` counts every input record regardless of outcome; `new_transactions` counts only inserts.
/// The difference is the number of duplicates skipped, which is the primary observable signal of ingestion
/// health.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestTally {
    pub total_processed: u64,
    pub new_transactions: u64,
    /// Records that failed to write. These do not abort the batch; they are logged and counted here.
    pub write_errors: u64,
}

impl IngestTally {
    pub fn duplicates_skipped(&self) -> u64 {
        self.total_processed - self.new_transactions - self.write_errors
    }

    pub fn merge(&mut self, other: IngestTally) {
        self.total_processed += other.total_processed;
        self.new_transactions += other.new_transactions;
        self.write_errors += other.write_errors;
    }
}

impl From<IngestTally> for CabinetOutcome {
    fn from(tally: IngestTally) -> Self {
        CabinetOutcome::Synced { total_processed: tally.total_processed, new_transactions: tally.new_transactions }
    }
}

//--------------------------------------       SyncJob       ---------------------------------------------------------
/// One request to synchronize a single cabinet (`cabinet_id = Some(..)`) or every cabinet (`None`).
#[derive(Debug, Clone)]
pub struct SyncJob {
    pub id: i64,
    pub cabinet_id: Option<i64>,
    /// How many listing pages to fetch per cabinet, at most. Fetching stops early at the first empty page.
    pub page_depth: u32,
    pub status: SyncJobStatus,
    pub created_at: DateTime<Utc>,
    pub start_sync_at: Option<DateTime<Utc>>,
    pub end_sync_at: Option<DateTime<Utc>>,
    pub processed: ProcessedMap,
    /// Job-level failure message. Per-cabinet errors live in `processed`.
    pub last_error: Option<String>,
}

impl SyncJob {
    pub fn targets_all_cabinets(&self) -> bool {
        self.cabinet_id.is_none()
    }
}

#[derive(Debug, Clone)]
pub struct NewSyncJob {
    pub cabinet_id: Option<i64>,
    pub page_depth: u32,
}

impl NewSyncJob {
    pub fn for_cabinet(cabinet_id: i64, page_depth: u32) -> Self {
        Self { cabinet_id: Some(cabinet_id), page_depth }
    }

    pub fn for_all_cabinets(page_depth: u32) -> Self {
        Self { cabinet_id: None, page_depth }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn status_string_roundtrip() {
        for status in
            [SyncJobStatus::Pending, SyncJobStatus::InProgress, SyncJobStatus::Completed, SyncJobStatus::Failed]
        {
            assert_eq!(status.to_string().parse::<SyncJobStatus>().unwrap(), status);
        }
        assert!("Done".parse::<SyncJobStatus>().is_err());
    }

    #[test]
    fn terminal_statuses() {
        assert!(!SyncJobStatus::Pending.is_terminal());
        assert!(!SyncJobStatus::InProgress.is_terminal());
        assert!(SyncJobStatus::Completed.is_terminal());
        assert!(SyncJobStatus::Failed.is_terminal());
    }

    #[test]
    fn processed_map_json_roundtrip() {
        let mut map = ProcessedMap::new();
        map.insert(7, CabinetOutcome::Synced { total_processed: 2, new_transactions: 2 });
        map.insert(9, CabinetOutcome::Failed { message: "login rejected".to_string() });
        let json = serde_json::to_string(&map).unwrap();
        let restored: ProcessedMap = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, map);
        assert!(restored[&9].is_failure());
        assert_eq!(restored[&9].failure_message(), Some("login rejected"));
    }

    #[test]
    fn tally_duplicate_accounting() {
        let tally = IngestTally { total_processed: 10, new_transactions: 7, write_errors: 1 };
        assert_eq!(tally.duplicates_skipped(), 2);
        let mut total = IngestTally::default();
        total.merge(tally);
        total.merge(IngestTally { total_processed: 5, new_transactions: 5, write_errors: 0 });
        assert_eq!(total.total_processed, 15);
        assert_eq!(total.new_transactions, 12);
        assert_eq!(total.duplicates_skipped(), 2);
    }
}
