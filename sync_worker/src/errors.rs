use idex_client::PanelApiError;
use sync_engine::SyncEngineError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("Could not initialize the sync worker: {0}")]
    Initialization(String),
    #[error("Sync engine error: {0}")]
    Engine(#[from] SyncEngineError),
    #[error("Panel client error: {0}")]
    Panel(#[from] PanelApiError),
}
