use log::*;

use crate::retry::RetryPolicy;

#[derive(Debug, Clone)]
pub struct PanelConfig {
    /// Base URL of the panel, e.g. "https://panel.example.com". No trailing slash.
    pub base_url: String,
    pub retry: RetryPolicy,
}

impl Default for PanelConfig {
    fn default() -> Self {
        Self { base_url: "https://panel.example.com".to_string(), retry: RetryPolicy::default() }
    }
}

impl PanelConfig {
    pub fn new<S: Into<String>>(base_url: S) -> Self {
        let mut base_url = base_url.into();
        while base_url.ends_with('/') {
            base_url.pop();
        }
        Self { base_url, ..Default::default() }
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn from_env_or_default() -> Self {
        let base_url = std::env::var("PMS_IDEX_BASE_URL").unwrap_or_else(|_| {
            warn!("PMS_IDEX_BASE_URL not set, using (probably useless) default");
            "https://panel.example.com".to_string()
        });
        Self::new(base_url)
    }
}
