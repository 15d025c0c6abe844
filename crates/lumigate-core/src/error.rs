// ── Core error types ──
//
// User-facing errors from lumigate-core. Transport details stay in
// `lumigate_api::Error`; the `From` impl keeps the gateway taxonomy
// intact so callers can still branch on pairing, rate limiting and
// missing resources.

use thiserror::Error;

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Authentication ───────────────────────────────────────────────
    #[error("Not authenticated -- pair with bridge {bridge_id} first")]
    NotAuthenticated { bridge_id: String },

    #[error("Bridge no longer recognizes this application: {message}")]
    PairingRequired { message: String },

    #[error("Link button not pressed -- press the button on the bridge and retry")]
    PairingNotConfirmed,

    #[error("Operation cancelled")]
    Cancelled,

    // ── Connection ───────────────────────────────────────────────────
    #[error("Cannot reach bridge: {reason}")]
    ConnectionFailed { reason: String },

    #[error("Invalid bridge address: {address}")]
    InvalidAddress { address: String },

    #[error("Local network access denied by the operating system")]
    LocalNetworkPermissionDenied,

    #[error("Bridge firmware too old (API {found}, need {required})")]
    FirmwareTooOld { found: String, required: String },

    // ── Gateway responses ────────────────────────────────────────────
    #[error("Not found: {identifier}")]
    NotFound { identifier: String },

    #[error("Rate limited by the bridge")]
    RateLimited,

    #[error("Bridge overloaded -- command buffer full")]
    Overloaded,

    #[error("Conflicting resource state: {message}")]
    ConflictingResourceState { message: String },

    #[error("Automation loop detected: {message}")]
    AutomationLoopDetected { message: String },

    #[error("Bridge returned HTTP {status}: {message}")]
    HttpStatus { status: u16, message: String },

    #[error("Unexpected response from bridge: {message}")]
    InvalidResponse { message: String },

    // ── Input ────────────────────────────────────────────────────────
    #[error("Invalid serial number {input:?}: expected 6 letters or digits")]
    InvalidSerial { input: String },

    #[error("Validation failed: {message}")]
    ValidationFailed { message: String },

    // ── Credential store ─────────────────────────────────────────────
    #[error("Credential store error: {message}")]
    CredentialStore { message: String },

    #[error("{0}")]
    Unknown(String),
}

impl CoreError {
    /// Whether re-pairing could fix this.
    pub fn is_auth_error(&self) -> bool {
        matches!(
            self,
            Self::NotAuthenticated { .. } | Self::PairingRequired { .. }
        )
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

// ── Conversion from transport-layer errors ───────────────────────────

impl From<lumigate_api::Error> for CoreError {
    fn from(err: lumigate_api::Error) -> Self {
        use lumigate_api::Error as Api;

        match err {
            Api::NotAuthenticated => CoreError::NotAuthenticated {
                bridge_id: String::from("<current>"),
            },
            Api::PairingRequired { message } => CoreError::PairingRequired { message },
            Api::PairingNotConfirmed => CoreError::PairingNotConfirmed,
            Api::InvalidAddress(address) => CoreError::InvalidAddress { address },
            Api::InvalidUrl(e) => CoreError::InvalidAddress {
                address: e.to_string(),
            },
            Api::Transport(e) => CoreError::ConnectionFailed {
                reason: e.to_string(),
            },
            Api::Timeout { timeout_ms } => CoreError::ConnectionFailed {
                reason: format!("timed out after {timeout_ms}ms"),
            },
            Api::Tls(msg) => CoreError::ConnectionFailed {
                reason: format!("TLS error: {msg}"),
            },
            Api::LocalNetworkPermissionDenied => CoreError::LocalNetworkPermissionDenied,
            Api::InvalidServerResponse(message) => CoreError::InvalidResponse { message },
            Api::Decode { message, body: _ } => CoreError::InvalidResponse { message },
            Api::HttpStatus { status, message } => CoreError::HttpStatus { status, message },
            Api::NotFound { resource } => CoreError::NotFound {
                identifier: resource,
            },
            Api::RateLimited => CoreError::RateLimited,
            Api::Overloaded => CoreError::Overloaded,
            Api::ConflictingResourceState(message) => {
                CoreError::ConflictingResourceState { message }
            }
            Api::AutomationLoopDetected(message) => CoreError::AutomationLoopDetected { message },
            Api::FirmwareTooOld { found, required } => {
                CoreError::FirmwareTooOld { found, required }
            }
            Api::Unknown(message) => CoreError::Unknown(message),
        }
    }
}
