//! Engine-side view of a panel transaction record.
//!
//! The engine never talks HTTP itself; whichever client implements [`crate::PanelConnector`] converts its wire
//! format into this shape. Keeping the type here means the orchestrator and persister can be exercised without
//! any real panel client on hand.
use pm_common::CurrencyMap;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PanelTransaction {
    /// Identifier assigned by the panel, unique within a cabinet.
    pub external_id: String,
    pub wallet: String,
    pub amount: CurrencyMap,
    pub total: CurrencyMap,
    pub status: i32,
    pub created_at: Option<String>,
    pub approved_at: Option<String>,
    pub expired_at: Option<String>,
    /// Opaque pass-through fields, preserved for audit.
    pub extra: serde_json::Value,
}

impl PanelTransaction {
    /// A minimal record, handy for tests and fixtures.
    pub fn new<S1: Into<String>, S2: Into<String>>(external_id: S1, wallet: S2) -> Self {
        Self { external_id: external_id.into(), wallet: wallet.into(), ..Default::default() }
    }

    pub fn with_amount(mut self, amount: CurrencyMap) -> Self {
        self.total = amount.clone();
        self.amount = amount;
        self
    }

    pub fn with_status(mut self, status: i32) -> Self {
        self.status = status;
        self
    }
}
