//! Adapts the IDEX panel client onto the engine's connector seam.
//!
//! Retry and backoff already happen inside [`PanelApi`]; by the time an error surfaces here it is final, so
//! the only job left is classifying it for the orchestrator and reshaping records into the engine's types.
use idex_client::{PanelApi, PanelApiError, PanelConfig, PanelSession, RawTransaction};
use pm_common::Secret;
use serde_json::Value;
use sync_engine::{panel_types::PanelTransaction, ConnectorError, PanelConnector};

use crate::errors::WorkerError;

#[derive(Clone)]
pub struct IdexConnector {
    api: PanelApi,
}

impl IdexConnector {
    pub fn new(config: PanelConfig) -> Result<Self, WorkerError> {
        let api = PanelApi::new(config)?;
        Ok(Self { api })
    }
}

impl PanelConnector for IdexConnector {
    type Session = PanelSession;

    async fn authenticate(&self, login: &str, password: &Secret<String>) -> Result<PanelSession, ConnectorError> {
        self.api.authenticate(login, password).await.map_err(into_connector_error)
    }

    async fn fetch_page(&self, session: &PanelSession, page: u32) -> Result<Vec<PanelTransaction>, ConnectorError> {
        let batch = self.api.fetch_transaction_page(session, page).await.map_err(into_connector_error)?;
        Ok(batch.into_iter().map(panel_transaction_from_raw).collect())
    }
}

fn into_connector_error(e: PanelApiError) -> ConnectorError {
    match e {
        PanelApiError::AuthRejected => ConnectorError::AuthRejected(e.to_string()),
        other => ConnectorError::Failed(other.to_string()),
    }
}

fn panel_transaction_from_raw(raw: RawTransaction) -> PanelTransaction {
    PanelTransaction {
        external_id: raw.id,
        wallet: raw.wallet,
        amount: raw.amount,
        total: raw.total,
        status: raw.status,
        created_at: raw.created_at,
        approved_at: raw.approved_at,
        expired_at: raw.expired_at,
        extra: Value::Object(raw.extra),
    }
}
