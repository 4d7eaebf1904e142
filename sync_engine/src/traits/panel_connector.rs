use pm_common::Secret;
use thiserror::Error;

use crate::panel_types::PanelTransaction;

/// How a cabinet attempt against the panel can fail, as far as the orchestrator cares.
///
/// Retry and backoff happen inside the connector; by the time an error reaches the orchestrator it is final
/// for that cabinet and is recorded into the job's processed map verbatim.
#[derive(Debug, Clone, Error)]
pub enum ConnectorError {
    #[error("Credentials rejected by the panel: {0}")]
    AuthRejected(String),
    #[error("{0}")]
    Failed(String),
}

/// An authenticated client for the external panel.
///
/// `authenticate` turns a cabinet's credentials into an opaque session; `fetch_page` turns a session and a page
/// number into a batch of records. An empty batch means the page is past the end of the listing.
#[allow(async_fn_in_trait)]
pub trait PanelConnector {
    type Session;

    async fn authenticate(&self, login: &str, password: &Secret<String>) -> Result<Self::Session, ConnectorError>;

    async fn fetch_page(&self, session: &Self::Session, page: u32) -> Result<Vec<PanelTransaction>, ConnectorError>;
}
