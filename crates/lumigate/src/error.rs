//! CLI error types with miette diagnostics.
//!
//! Maps `CoreError` and `ConfigError` into user-facing errors with help text.

use miette::Diagnostic;
use thiserror::Error;

use lumigate_config::ConfigError;
use lumigate_core::CoreError;

/// Process exit codes.
pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const AUTH: i32 = 3;
    pub const NOT_FOUND: i32 = 4;
    pub const PERMISSION: i32 = 5;
    pub const CONFLICT: i32 = 6;
    pub const CONNECTION: i32 = 7;
    pub const BUSY: i32 = 8;
    pub const CANCELLED: i32 = 130;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Connection ───────────────────────────────────────────────────
    #[error("Could not reach bridge: {reason}")]
    #[diagnostic(
        code(lumigate::connection_failed),
        help(
            "Check that the bridge is powered and on this network.\n\
             Try: lumigate discover"
        )
    )]
    ConnectionFailed { reason: String },

    #[error("Local network access denied")]
    #[diagnostic(
        code(lumigate::network_permission),
        help("Allow this terminal to access devices on the local network and retry.")
    )]
    NetworkPermission,

    #[error("Bridge firmware API {found} is older than the supported minimum {required}")]
    #[diagnostic(
        code(lumigate::firmware_too_old),
        help("Update the bridge from the vendor app, then retry.")
    )]
    FirmwareTooOld { found: String, required: String },

    // ── Pairing ──────────────────────────────────────────────────────
    #[error("Not paired with bridge {bridge_id}")]
    #[diagnostic(
        code(lumigate::not_paired),
        help("Press the link button on the bridge, then run: lumigate pair")
    )]
    NotPaired { bridge_id: String },

    #[error("Link button not pressed")]
    #[diagnostic(
        code(lumigate::link_button),
        help("Press the round button on the bridge and run the command again within 30s.")
    )]
    LinkButton,

    #[error("Cancelled")]
    #[diagnostic(code(lumigate::cancelled))]
    Cancelled,

    // ── Resources ────────────────────────────────────────────────────
    #[error("'{identifier}' not found")]
    #[diagnostic(code(lumigate::not_found), help("Run: lumigate {list_command}"))]
    NotFound {
        identifier: String,
        list_command: String,
    },

    #[error("Bridge is busy: {message}")]
    #[diagnostic(
        code(lumigate::busy),
        help("Too many commands in flight. Wait a moment and retry.")
    )]
    Busy { message: String },

    #[error("Conflict: {message}")]
    #[diagnostic(code(lumigate::conflict))]
    Conflict { message: String },

    #[error("Bridge error ({code}): {message}")]
    #[diagnostic(code(lumigate::api_error))]
    Api { code: String, message: String },

    // ── Validation ───────────────────────────────────────────────────
    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(lumigate::validation))]
    Validation { field: String, reason: String },

    // ── Configuration ────────────────────────────────────────────────
    #[error("No bridge selected")]
    #[diagnostic(
        code(lumigate::no_bridge),
        help(
            "Run: lumigate discover --save\n\
             Or pass --address <ip>"
        )
    )]
    NoBridge,

    #[error("Bridge '{name}' not found in configuration")]
    #[diagnostic(
        code(lumigate::unknown_bridge),
        help("Known bridges: {available}")
    )]
    UnknownBridge { name: String, available: String },

    #[error("Configuration error: {message}")]
    #[diagnostic(code(lumigate::config))]
    Config { message: String },

    #[error("Credential store error: {message}")]
    #[diagnostic(
        code(lumigate::keyring),
        help("Make sure a system keyring is available and unlocked.")
    )]
    CredentialStore { message: String },

    // ── IO / Serialization ───────────────────────────────────────────
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Invalid JSON payload: {0}")]
    #[diagnostic(code(lumigate::json), help("Check the JSON contents and try again."))]
    Json(#[from] serde_json::Error),
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::ConnectionFailed { .. } => exit_code::CONNECTION,
            Self::NotPaired { .. } | Self::LinkButton => exit_code::AUTH,
            Self::NotFound { .. } => exit_code::NOT_FOUND,
            Self::Conflict { .. } => exit_code::CONFLICT,
            Self::Busy { .. } => exit_code::BUSY,
            Self::NetworkPermission | Self::CredentialStore { .. } => exit_code::PERMISSION,
            Self::Validation { .. } | Self::NoBridge | Self::UnknownBridge { .. } => {
                exit_code::USAGE
            }
            Self::Cancelled => exit_code::CANCELLED,
            _ => exit_code::GENERAL,
        }
    }
}

// ── CoreError → CliError mapping ─────────────────────────────────────

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::NotAuthenticated { bridge_id } => CliError::NotPaired { bridge_id },
            CoreError::PairingRequired { message: _ } => CliError::NotPaired {
                bridge_id: "<current>".into(),
            },
            CoreError::PairingNotConfirmed => CliError::LinkButton,
            CoreError::Cancelled => CliError::Cancelled,

            CoreError::ConnectionFailed { reason } => CliError::ConnectionFailed { reason },
            CoreError::InvalidAddress { address } => CliError::Validation {
                field: "address".into(),
                reason: format!("'{address}' is not a usable host"),
            },
            CoreError::LocalNetworkPermissionDenied => CliError::NetworkPermission,
            CoreError::FirmwareTooOld { found, required } => {
                CliError::FirmwareTooOld { found, required }
            }

            CoreError::NotFound { identifier } => CliError::NotFound {
                identifier,
                list_command: "lights".into(),
            },
            CoreError::RateLimited => CliError::Busy {
                message: "rate limited".into(),
            },
            CoreError::Overloaded => CliError::Busy {
                message: "command buffer full".into(),
            },
            CoreError::ConflictingResourceState { message }
            | CoreError::AutomationLoopDetected { message } => CliError::Conflict { message },
            CoreError::HttpStatus { status, message } => CliError::Api {
                code: status.to_string(),
                message,
            },
            CoreError::InvalidResponse { message } => CliError::Api {
                code: "invalid_response".into(),
                message,
            },

            CoreError::InvalidSerial { input } => CliError::Validation {
                field: "serial".into(),
                reason: format!("'{input}' must be six letters or digits"),
            },
            CoreError::ValidationFailed { message } => CliError::Validation {
                field: "input".into(),
                reason: message,
            },

            CoreError::CredentialStore { message } => CliError::CredentialStore { message },
            CoreError::Unknown(message) => CliError::Api {
                code: "unknown".into(),
                message,
            },
        }
    }
}

// ── ConfigError → CliError mapping ───────────────────────────────────

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::NoBridge => CliError::NoBridge,
            ConfigError::UnknownBridge { name } => CliError::UnknownBridge {
                name,
                available: String::new(),
            },
            ConfigError::Validation { field, reason } => CliError::Validation { field, reason },
            ConfigError::Io(e) => CliError::Io(e),
            other => CliError::Config {
                message: other.to_string(),
            },
        }
    }
}
