//! HTTP client for the IDEX payment panel.
//!
//! The panel exposes a cookie-authenticated JSON API. This crate turns a cabinet's login/password pair into an
//! opaque [`PanelSession`] and a session + page number into a batch of [`RawTransaction`] records. All network
//! calls go through the bounded exponential-backoff executor in [`retry`], which is tuned for the panel's
//! rate limiting (HTTP 429) and knows which failures are permanent (HTTP 409 credential rejection).
mod api;
mod config;
mod data_objects;
mod error;
mod session;

pub mod retry;

pub use api::PanelApi;
pub use config::PanelConfig;
pub use data_objects::RawTransaction;
pub use error::PanelApiError;
pub use retry::{with_retry, RetryPolicy};
pub use session::PanelSession;
