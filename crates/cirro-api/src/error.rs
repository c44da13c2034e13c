use thiserror::Error;

use crate::types::ApiErrorItem;

/// Top-level error type for the `cirro-api` crate.
///
/// Covers every failure mode of the HTTP surface: authentication,
/// transport, structured API rejections, and response decoding.
/// `cirro-core` maps these into consumer-facing variants.
#[derive(Debug, Error)]
pub enum Error {
    // ── Authentication ──────────────────────────────────────────────
    /// Personal access token rejected by the API (HTTP 401).
    #[error("Invalid or expired access token")]
    InvalidToken,

    /// Token valid but not permitted to perform the operation (HTTP 403).
    #[error("Access denied: {message}")]
    AccessDenied { message: String },

    // ── Transport ───────────────────────────────────────────────────
    /// HTTP transport error (connection refused, DNS failure, etc.)
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// URL parsing error.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// TLS setup or certificate error.
    #[error("TLS error: {0}")]
    Tls(String),

    // ── API ─────────────────────────────────────────────────────────
    /// Rate limited by the API. Includes retry-after in seconds when the
    /// server sent one.
    #[error("Rate limited -- retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    /// Structured rejection from the API (`{ errors: [{reason, field}] }`).
    #[error("API error (HTTP {status}): {message}")]
    Api {
        status: u16,
        message: String,
        errors: Vec<ApiErrorItem>,
    },

    // ── Data ────────────────────────────────────────────────────────
    /// JSON deserialization failed, with the raw body for debugging.
    #[error("Deserialization error: {message}")]
    Deserialization { message: String, body: String },
}

impl Error {
    /// Returns `true` if this error indicates the token is no longer
    /// usable and re-authentication might resolve it.
    pub fn is_auth_expired(&self) -> bool {
        matches!(self, Self::InvalidToken)
    }

    /// Returns `true` if this is a transient error worth retrying.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport(e) => e.is_timeout() || e.is_connect(),
            Self::RateLimited { .. } => true,
            Self::Api { status, .. } => matches!(status, 502 | 503 | 504),
            _ => false,
        }
    }

    /// Returns `true` if this is a "not found" error.
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::Transport(e) => e.status() == Some(reqwest::StatusCode::NOT_FOUND),
            Self::Api { status: 404, .. } => true,
            _ => false,
        }
    }

    /// The field the API blamed for a validation failure, if any.
    pub fn rejected_field(&self) -> Option<&str> {
        match self {
            Self::Api { errors, .. } => errors.iter().find_map(|e| e.field.as_deref()),
            _ => None,
        }
    }
}
