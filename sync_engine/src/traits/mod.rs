//! The traits that the sync engine is built around.
//!
//! [`SyncBackend`] is the storage seam: SQLite implements it in production, tests use whatever they like.
//! [`PanelConnector`] is the network seam: the worker binary adapts the real panel client onto it, tests script
//! page sequences and failures against the orchestrator directly.
mod panel_connector;
mod sync_backend;

pub use panel_connector::{ConnectorError, PanelConnector};
pub use sync_backend::{CabinetManagement, JobStore, SyncBackend, SyncEngineError, TransactionStore};
