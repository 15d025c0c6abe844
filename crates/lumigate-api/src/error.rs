use std::io;

use thiserror::Error;

/// Top-level error type for the `lumigate-api` crate.
///
/// Covers every failure mode across both protocol generations, pairing,
/// trust negotiation and the event stream. `lumigate-core` maps these
/// into user-facing diagnostics.
#[derive(Debug, Error)]
pub enum Error {
    // ── Authentication ──────────────────────────────────────────────
    /// No capability token is available, or the gateway rejected it.
    #[error("Not authenticated -- pair with the bridge first")]
    NotAuthenticated,

    /// The gateway no longer recognizes the application (legacy error type 1).
    #[error("Pairing required: {message}")]
    PairingRequired { message: String },

    /// The physical link button has not been pressed yet (legacy error type 101).
    #[error("Link button not pressed -- press the button on the bridge and retry")]
    PairingNotConfirmed,

    // ── Addressing / transport ──────────────────────────────────────
    /// The supplied host or IP could not be turned into a gateway URL.
    #[error("Invalid bridge address: {0}")]
    InvalidAddress(String),

    /// HTTP transport error (connection refused, DNS failure, etc.)
    #[error("HTTP transport error: {0}")]
    Transport(reqwest::Error),

    /// URL parsing error.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// Request timed out.
    #[error("Request timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    /// TLS configuration or certificate error.
    #[error("TLS error: {0}")]
    Tls(String),

    /// The OS refused access to the local network.
    #[error("Local network access denied by the operating system")]
    LocalNetworkPermissionDenied,

    // ── Gateway responses ───────────────────────────────────────────
    /// The response did not have the shape the gateway protocol promises.
    #[error("Invalid server response: {0}")]
    InvalidServerResponse(String),

    /// Generic non-2xx status with no more specific mapping.
    #[error("HTTP {status}: {message}")]
    HttpStatus { status: u16, message: String },

    #[error("Resource not found: {resource}")]
    NotFound { resource: String },

    #[error("Rate limited by the bridge")]
    RateLimited,

    /// The bridge's command buffer is full or the service is unavailable.
    #[error("Bridge overloaded -- command buffer full")]
    Overloaded,

    #[error("Conflicting resource state: {0}")]
    ConflictingResourceState(String),

    #[error("Automation loop detected: {0}")]
    AutomationLoopDetected(String),

    #[error("Bridge firmware too old (API {found}, need {required})")]
    FirmwareTooOld { found: String, required: String },

    // ── Data ────────────────────────────────────────────────────────
    /// JSON deserialization failed, with the raw body for debugging.
    #[error("Deserialization error: {message}")]
    Decode { message: String, body: String },

    #[error("{0}")]
    Unknown(String),
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        if io_error_kind(&err) == Some(io::ErrorKind::PermissionDenied) {
            return Self::LocalNetworkPermissionDenied;
        }
        if err.is_decode() {
            return Self::Decode {
                message: err.to_string(),
                body: String::new(),
            };
        }
        Self::Transport(err)
    }
}

// ── Gateway error envelopes ──────────────────────────────────────────

/// `{"errors": [{"description": "..."}]}` from the resource protocol.
#[derive(serde::Deserialize)]
struct ResourceErrorBody {
    #[serde(default)]
    errors: Vec<ResourceErrorItem>,
}

#[derive(serde::Deserialize)]
struct ResourceErrorItem {
    description: String,
}

impl Error {
    /// Map a non-2xx HTTP status (plus the raw body) to an error kind.
    pub fn from_status(status: reqwest::StatusCode, body: &str) -> Self {
        let message = describe_body(body).unwrap_or_else(|| status.to_string());

        match status.as_u16() {
            401 | 403 => Self::NotAuthenticated,
            404 => Self::NotFound { resource: message },
            409 => Self::ConflictingResourceState(message),
            429 => Self::RateLimited,
            503 => Self::Overloaded,
            code => Self::from_description(code, message),
        }
    }

    /// Map an error description carried in a successful response.
    ///
    /// Used for `207 Multi-Status` replies and error items embedded in
    /// an otherwise 2xx body.
    pub fn from_description(status: u16, message: String) -> Self {
        let lower = message.to_ascii_lowercase();
        if lower.contains("loop") {
            Self::AutomationLoopDetected(message)
        } else if lower.contains("rate limit") {
            Self::RateLimited
        } else if lower.contains("buffer") {
            Self::Overloaded
        } else {
            Self::HttpStatus { status, message }
        }
    }

    /// Map a legacy `{"error": {"type": N}}` item.
    ///
    /// The legacy protocol reports most failures with HTTP 200 and a typed
    /// error object in the body.
    pub fn from_legacy(kind: u16, description: String) -> Self {
        match kind {
            1 => Self::PairingRequired {
                message: description,
            },
            3 => Self::NotFound {
                resource: description,
            },
            101 => Self::PairingNotConfirmed,
            201 => Self::ConflictingResourceState(description),
            901 => Self::Overloaded,
            _ => Self::Unknown(format!("legacy error {kind}: {description}")),
        }
    }

    /// Build a decode error with a truncated body preview in the message.
    pub fn decode(err: &serde_json::Error, body: String) -> Self {
        let end = body
            .char_indices()
            .nth(200)
            .map_or(body.len(), |(idx, _)| idx);
        Self::Decode {
            message: format!("{err} (body preview: {:?})", &body[..end]),
            body,
        }
    }

    /// Returns `true` if this is a transient error worth retrying.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport(e) => {
                e.is_timeout()
                    || e.is_connect()
                    || io_error_kind(e) == Some(io::ErrorKind::ConnectionReset)
            }
            Self::Timeout { .. } | Self::RateLimited | Self::Overloaded => true,
            _ => false,
        }
    }

    /// Returns `true` if re-pairing might resolve this error.
    pub fn is_auth_error(&self) -> bool {
        matches!(self, Self::NotAuthenticated | Self::PairingRequired { .. })
    }

    pub fn is_not_found(&self) -> bool {
        match self {
            Self::NotFound { .. } => true,
            Self::HttpStatus { status, .. } => *status == 404,
            _ => false,
        }
    }
}

fn describe_body(body: &str) -> Option<String> {
    let parsed: ResourceErrorBody = serde_json::from_str(body).ok()?;
    let joined = parsed
        .errors
        .into_iter()
        .map(|e| e.description)
        .collect::<Vec<_>>()
        .join("; ");
    if joined.is_empty() { None } else { Some(joined) }
}

/// Walk the error source chain looking for an I/O error kind.
pub(crate) fn io_error_kind(err: &reqwest::Error) -> Option<io::ErrorKind> {
    let mut source: Option<&(dyn std::error::Error + 'static)> = std::error::Error::source(err);
    while let Some(cause) = source {
        if let Some(io_err) = cause.downcast_ref::<io::Error>() {
            return Some(io_err.kind());
        }
        source = cause.source();
    }
    None
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use reqwest::StatusCode;

    #[test]
    fn status_mapping_is_deterministic() {
        assert!(matches!(
            Error::from_status(StatusCode::UNAUTHORIZED, ""),
            Error::NotAuthenticated
        ));
        assert!(matches!(
            Error::from_status(StatusCode::FORBIDDEN, ""),
            Error::NotAuthenticated
        ));
        assert!(matches!(
            Error::from_status(StatusCode::TOO_MANY_REQUESTS, ""),
            Error::RateLimited
        ));
        assert!(matches!(
            Error::from_status(StatusCode::SERVICE_UNAVAILABLE, ""),
            Error::Overloaded
        ));
        assert!(matches!(
            Error::from_status(StatusCode::CONFLICT, ""),
            Error::ConflictingResourceState(_)
        ));
        assert!(matches!(
            Error::from_status(StatusCode::IM_A_TEAPOT, ""),
            Error::HttpStatus { status: 418, .. }
        ));
    }

    #[test]
    fn not_found_carries_gateway_description() {
        let body = r#"{"errors":[{"description":"Not Found"}],"data":[]}"#;
        match Error::from_status(StatusCode::NOT_FOUND, body) {
            Error::NotFound { resource } => assert_eq!(resource, "Not Found"),
            other => panic!("expected NotFound, got {other:?}"),
        }
    }

    #[test]
    fn loop_description_maps_to_automation_loop() {
        let body = r#"{"errors":[{"description":"behavior would create a loop"}]}"#;
        assert!(matches!(
            Error::from_status(StatusCode::BAD_REQUEST, body),
            Error::AutomationLoopDetected(_)
        ));
    }

    #[test]
    fn legacy_link_button_code() {
        assert!(matches!(
            Error::from_legacy(101, "link button not pressed".into()),
            Error::PairingNotConfirmed
        ));
        assert!(matches!(
            Error::from_legacy(1, "unauthorized user".into()),
            Error::PairingRequired { .. }
        ));
        assert!(matches!(
            Error::from_legacy(7, "invalid value".into()),
            Error::Unknown(_)
        ));
    }

    #[test]
    fn transient_classification() {
        assert!(Error::RateLimited.is_transient());
        assert!(Error::Overloaded.is_transient());
        assert!(!Error::NotAuthenticated.is_transient());
        assert!(
            !Error::Decode {
                message: String::new(),
                body: String::new()
            }
            .is_transient()
        );
    }

    #[test]
    fn decode_preview_is_truncated() {
        let body = "x".repeat(500);
        let err = serde_json::from_str::<serde_json::Value>(&body).unwrap_err();
        match Error::decode(&err, body) {
            Error::Decode { message, body } => {
                assert!(message.len() < 300);
                assert_eq!(body.len(), 500);
            }
            other => panic!("unexpected {other:?}"),
        }
    }
}
