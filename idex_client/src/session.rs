use std::fmt;

use pm_common::Secret;

/// An authenticated panel session.
///
/// Internally this is the cookie string issued at login, but that is an implementation detail of the panel's
/// HTTP layer. Callers treat the session as an opaque token: obtain one from [`crate::PanelApi::authenticate`]
/// and hand it back to the fetch methods.
#[derive(Clone, Default)]
pub struct PanelSession {
    cookies: Secret<String>,
}

impl PanelSession {
    pub(crate) fn from_cookies(cookies: Vec<String>) -> Self {
        Self { cookies: Secret::new(cookies.join("; ")) }
    }

    /// The value of the `Cookie` header for requests made under this session.
    pub(crate) fn cookie_header(&self) -> &str {
        self.cookies.reveal()
    }
}

impl fmt::Debug for PanelSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("PanelSession(****)")
    }
}
