use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicU32, Ordering},
        Arc,
    },
};

use pm_common::Secret;
use sync_engine::{panel_types::PanelTransaction, ConnectorError, PanelConnector};

/// A scripted stand-in for the real panel client. Each login is assigned a sequence of pages up front; pages
/// past the end of the sequence come back empty, which is the real pagination-termination signal.
#[derive(Clone, Default)]
pub struct FakePanel {
    pages: HashMap<String, Vec<Vec<PanelTransaction>>>,
    rejected_logins: Vec<String>,
    auth_calls: Arc<AtomicU32>,
    fetch_calls: Arc<AtomicU32>,
}

impl FakePanel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_pages(mut self, login: &str, pages: Vec<Vec<PanelTransaction>>) -> Self {
        self.pages.insert(login.to_string(), pages);
        self
    }

    /// Any authentication attempt for this login fails as a credential rejection.
    pub fn with_rejected_login(mut self, login: &str) -> Self {
        self.rejected_logins.push(login.to_string());
        self
    }

    pub fn auth_calls(&self) -> u32 {
        self.auth_calls.load(Ordering::SeqCst)
    }

    pub fn fetch_calls(&self) -> u32 {
        self.fetch_calls.load(Ordering::SeqCst)
    }
}

impl PanelConnector for FakePanel {
    type Session = String;

    async fn authenticate(&self, login: &str, _password: &Secret<String>) -> Result<String, ConnectorError> {
        self.auth_calls.fetch_add(1, Ordering::SeqCst);
        if self.rejected_logins.iter().any(|l| l == login) {
            return Err(ConnectorError::AuthRejected(format!("login {login} is locked")));
        }
        Ok(login.to_string())
    }

    async fn fetch_page(&self, session: &String, page: u32) -> Result<Vec<PanelTransaction>, ConnectorError> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);
        let pages = self
            .pages
            .get(session)
            .ok_or_else(|| ConnectorError::Failed(format!("No session established for {session}")))?;
        Ok(pages.get((page - 1) as usize).cloned().unwrap_or_default())
    }
}
