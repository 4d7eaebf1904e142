//! Panel Sync Engine
//!
//! The sync engine is the core of the payment desk's transaction ingestion service. It periodically pulls
//! transaction listings from an external payment panel and reconciles them against stored records, one cabinet
//! (panel account) at a time. This library contains the storage backend and the orchestration logic; it is
//! HTTP-client agnostic.
//!
//! The library is divided into three main sections:
//! 1. Database management ([`mod@sqlite`]). SQLite is the supported backend. Callers should not reach into the
//!    database directly; use the public APIs instead. The exception is the record types, which are defined in
//!    [`mod@db_types`] and are public.
//! 2. The backend traits ([`mod@traits`]). A storage backend implements [`SyncBackend`]; the HTTP layer that
//!    talks to the actual panel implements [`PanelConnector`]. Tests substitute in-memory fakes at both seams.
//! 3. The engine public API ([`mod@sync_api`]). [`SyncApi`] drives pending sync jobs to their terminal state,
//!    [`JobApi`] creates and queries jobs (this is what the admin UI polls), and [`CabinetApi`] carries the
//!    cabinet CRUD surface.
pub mod db_types;
pub mod panel_types;
#[cfg(feature = "sqlite")]
mod sqlite;
mod sync_api;
pub mod traits;

#[cfg(feature = "sqlite")]
pub use sqlite::SqliteDatabase;
pub use sync_api::{
    cabinets_api::CabinetApi,
    errors::CabinetSyncError,
    job_objects::JobQueryFilter,
    jobs_api::JobApi,
    persister::persist_batch,
    sync_flow_api::{SyncApi, SyncApiConfig},
};
pub use traits::{
    CabinetManagement,
    ConnectorError,
    JobStore,
    PanelConnector,
    SyncBackend,
    SyncEngineError,
    TransactionStore,
};
