use std::sync::Arc;

use log::*;
use pm_common::Secret;
use reqwest::{
    header::{HeaderMap, HeaderValue, ACCEPT, COOKIE},
    Client,
    StatusCode,
};
use serde_json::Value;

use crate::{config::PanelConfig, retry::with_retry, PanelApiError, PanelSession, RawTransaction};

const LOGIN_PATH: &str = "/api/auth/basic/login";
const TRANSACTIONS_PATH: &str = "/api/transactions";

#[derive(Clone)]
pub struct PanelApi {
    config: PanelConfig,
    client: Arc<Client>,
}

impl PanelApi {
    pub fn new(config: PanelConfig) -> Result<Self, PanelApiError> {
        let mut headers = HeaderMap::with_capacity(1);
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        let client = Client::builder()
            .default_headers(headers)
            .build()
            .map_err(|e| PanelApiError::Initialization(e.to_string()))?;
        Ok(Self { config, client: Arc::new(client) })
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.config.base_url)
    }

    /// Logs into the panel and returns the session for subsequent fetches.
    ///
    /// Transient failures are retried with backoff per the configured [`crate::RetryPolicy`]. A credential
    /// rejection (HTTP 409) fails immediately without retrying.
    pub async fn authenticate(&self, login: &str, password: &Secret<String>) -> Result<PanelSession, PanelApiError> {
        with_retry("panel login", self.config.retry, || self.try_authenticate(login, password)).await
    }

    async fn try_authenticate(&self, login: &str, password: &Secret<String>) -> Result<PanelSession, PanelApiError> {
        let body = serde_json::json!({ "login": login, "password": password.reveal() });
        trace!("🌐️ Logging into panel as {login}");
        let response = self
            .client
            .post(self.url(LOGIN_PATH))
            .json(&body)
            .send()
            .await
            .map_err(|e| PanelApiError::AuthFailed(e.to_string()))?;
        match response.status() {
            status if status.is_success() => {
                let body = response.json::<Value>().await.map_err(|e| PanelApiError::JsonError(e.to_string()))?;
                let session = session_from_login_response(&body)?;
                debug!("🌐️ Panel login for {login} succeeded");
                Ok(session)
            },
            StatusCode::CONFLICT => Err(PanelApiError::AuthRejected),
            StatusCode::TOO_MANY_REQUESTS => Err(PanelApiError::RateLimited),
            status => {
                let message = response.text().await.unwrap_or_default();
                Err(PanelApiError::AuthFailed(format!("status {status}: {message}")))
            },
        }
    }

    /// Fetches one page of the panel's transaction listing.
    ///
    /// An empty list means the page is past the end of the data; this is the pagination-termination signal,
    /// not an error. Retried with backoff like [`Self::authenticate`].
    pub async fn fetch_transaction_page(
        &self,
        session: &PanelSession,
        page: u32,
    ) -> Result<Vec<RawTransaction>, PanelApiError> {
        with_retry("transaction page fetch", self.config.retry, || self.try_fetch_transaction_page(session, page))
            .await
    }

    async fn try_fetch_transaction_page(
        &self,
        session: &PanelSession,
        page: u32,
    ) -> Result<Vec<RawTransaction>, PanelApiError> {
        trace!("🌐️ Fetching transaction page {page}");
        let cookie = HeaderValue::from_str(session.cookie_header())
            .map_err(|e| PanelApiError::FetchFailed(format!("session cookie is not a valid header value: {e}")))?;
        let response = self
            .client
            .get(self.url(TRANSACTIONS_PATH))
            .query(&[("page", page)])
            .header(COOKIE, cookie)
            .send()
            .await
            .map_err(|e| PanelApiError::FetchFailed(e.to_string()))?;
        match response.status() {
            status if status.is_success() => {
                let body = response.json::<Value>().await.map_err(|e| PanelApiError::JsonError(e.to_string()))?;
                Ok(transactions_from_listing(&body, page))
            },
            StatusCode::TOO_MANY_REQUESTS => Err(PanelApiError::RateLimited),
            status => {
                let message = response.text().await.unwrap_or_default();
                Err(PanelApiError::FetchFailed(format!("status {status}: {message}")))
            },
        }
    }
}

/// The login response carries the issued cookies as a JSON field. A success status with no usable cookie set
/// still cannot authenticate anything, so it is reported as a malformed response.
fn session_from_login_response(body: &Value) -> Result<PanelSession, PanelApiError> {
    let cookies = body["cookies"]
        .as_array()
        .ok_or_else(|| PanelApiError::MalformedResponse("login response carried no cookie set".to_string()))?;
    let cookies = cookies.iter().filter_map(|c| c.as_str().map(String::from)).collect::<Vec<String>>();
    if cookies.is_empty() {
        return Err(PanelApiError::MalformedResponse("login response cookie set was empty".to_string()));
    }
    Ok(PanelSession::from_cookies(cookies))
}

/// Pulls the transaction array out of a listing response.
///
/// The panel's response format has drifted before, so a missing or non-array `data` field is treated as an
/// empty page rather than a hard failure. That keeps pagination loops terminating, but it can silently
/// under-ingest, hence the loud warnings. Individual records that fail to parse are skipped the same way.
fn transactions_from_listing(body: &Value, page: u32) -> Vec<RawTransaction> {
    let records = match body["data"].as_array() {
        Some(records) => records,
        None => {
            warn!("🌐️ Transaction listing page {page} had no 'data' array; treating as an empty page. This may mask real data loss.");
            return Vec::new();
        },
    };
    let mut transactions = Vec::with_capacity(records.len());
    for record in records {
        match serde_json::from_value::<RawTransaction>(record.clone()) {
            Ok(tx) => transactions.push(tx),
            Err(e) => {
                warn!("🌐️ Skipping malformed transaction record on page {page}: {e}. This may mask real data loss.");
            },
        }
    }
    transactions
}
