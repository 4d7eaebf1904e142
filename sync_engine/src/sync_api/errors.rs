use std::time::Duration;

use thiserror::Error;

use crate::traits::ConnectorError;

/// Why one cabinet's sync attempt ended without a tally. The message ends up verbatim in the job's processed
/// map, so it should read sensibly in the admin UI.
#[derive(Debug, Clone, Error)]
pub enum CabinetSyncError {
    #[error("{0}")]
    Connector(#[from] ConnectorError),
    #[error("Sync cancelled before completion")]
    Cancelled,
    #[error("Cabinet sync timed out after {0:?}")]
    Timeout(Duration),
}
