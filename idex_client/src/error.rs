use thiserror::Error;

#[derive(Debug, Error)]
pub enum PanelApiError {
    #[error("Could not initialize client: {0}")]
    Initialization(String),
    #[error("The panel rejected the credentials (locked account or bad password)")]
    AuthRejected,
    #[error("The panel is rate limiting requests")]
    RateLimited,
    #[error("Login failed: {0}")]
    AuthFailed(String),
    #[error("Transaction fetch failed: {0}")]
    FetchFailed(String),
    #[error("Could not deserialize JSON: {0}")]
    JsonError(String),
    #[error("Unexpected response shape: {0}")]
    MalformedResponse(String),
    #[error("{operation} failed after {attempts} attempts: {source}")]
    RetriesExhausted {
        operation: String,
        attempts: u32,
        #[source]
        source: Box<PanelApiError>,
    },
}

impl PanelApiError {
    /// Errors that no amount of retrying can fix. Everything else is treated as transient.
    pub fn is_permanent(&self) -> bool {
        matches!(self, PanelApiError::AuthRejected | PanelApiError::Initialization(_))
    }

    pub fn is_rate_limited(&self) -> bool {
        matches!(self, PanelApiError::RateLimited)
    }
}
