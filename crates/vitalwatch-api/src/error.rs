use thiserror::Error;

/// Top-level error type for the `vitalwatch-api` crate.
///
/// Covers every failure mode of both halves of the crate: the HTTP
/// data-access client (timeouts, transport, status codes, fallback lookups)
/// and the realtime channel (handshake failures, malformed frames).
/// The CLI maps these into user-facing diagnostics.
#[derive(Debug, Error)]
pub enum Error {
    // ── Transport ───────────────────────────────────────────────────
    /// The request exceeded its time budget and was aborted.
    #[error("Request timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    /// Transport-level failure: no HTTP response was obtained
    /// (connection refused, DNS failure, reset mid-body, etc.)
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// A response arrived but its status was outside 200-299.
    #[error("HTTP {code}: {status_text}")]
    HttpStatus { code: u16, status_text: String },

    /// URL parsing error.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// The base URL scheme cannot be mapped onto a WebSocket scheme.
    #[error("Unsupported URL scheme '{0}' (expected http or https)")]
    UnsupportedScheme(String),

    /// Building the underlying HTTP client failed (TLS backend, bad CA file).
    #[error("Failed to build HTTP client: {0}")]
    ClientBuild(String),

    // ── Fallback ────────────────────────────────────────────────────
    /// No fallback value exists for the requested path.
    #[error("No fallback data available for {path}")]
    FallbackUnavailable { path: String },

    // ── Endpoints ───────────────────────────────────────────────────
    /// A symbolic endpoint name did not resolve to any known endpoint.
    #[error("Unknown endpoint: {0}")]
    UnknownEndpoint(String),

    // ── WebSocket ───────────────────────────────────────────────────
    /// WebSocket handshake or stream failure.
    #[error("WebSocket connection failed: {0}")]
    WebSocketConnect(String),

    /// Inbound frame was not JSON or lacked a `type` field.
    #[error("Malformed frame: {reason}")]
    MalformedFrame { reason: String },

    // ── Data ────────────────────────────────────────────────────────
    /// JSON deserialization failed, with the raw body for debugging.
    #[error("Deserialization error: {message}")]
    Deserialization { message: String, body: String },
}

impl Error {
    /// Returns `true` if this is a transient error worth retrying.
    ///
    /// Timeouts and transport failures qualify; HTTP status errors do not.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Timeout { .. } | Self::WebSocketConnect(_) => true,
            Self::Network(e) => !e.is_builder() && !e.is_decode(),
            _ => false,
        }
    }

    /// The HTTP status code, for [`HttpStatus`](Self::HttpStatus) errors.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::HttpStatus { code, .. } => Some(*code),
            _ => None,
        }
    }

    /// Returns `true` if the request was aborted by the timeout.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}
