use thiserror::Error;

/// Adapter error taxonomy.
///
/// `Validation` never reaches the network; `Upstream` always carries the HTTP
/// status so the façade can decide on backend fallback; `Cancelled` is kept
/// separate so callers can render "cancelled" instead of "failed".
#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid credentials: {0}")]
    Validation(String),

    #[error("upstream returned {status}: {message}")]
    Upstream { status: u16, message: String },

    #[error("operation cancelled")]
    Cancelled,

    #[error("{0}")]
    Unknown(String),
}

impl Error {
    /// Build an `Upstream` error from a non-2xx response body, pulling the
    /// message out of a `{"error":{"message":...}}` envelope when one is there.
    pub fn upstream(status: u16, body: &str) -> Self {
        let message = serde_json::from_str::<serde_json::Value>(body)
            .ok()
            .and_then(|v| {
                v.pointer("/error/message")
                    .and_then(|m| m.as_str())
                    .map(|m| m.to_string())
            })
            .unwrap_or_else(|| {
                let trimmed = body.trim();
                if trimmed.is_empty() {
                    format!("HTTP {status}")
                } else {
                    trimmed.chars().take(200).collect()
                }
            });
        Self::Upstream { status, message }
    }

    /// True for the 401/403 responses that make the official path eligible
    /// for a one-shot retry against the internal path.
    pub fn auth_rejected(&self) -> bool {
        matches!(self, Self::Upstream { status: 401 | 403, .. })
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        Self::Unknown(format!("network error: {e}"))
    }
}
