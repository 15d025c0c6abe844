//! Shared helpers for command handlers: config loading, bridge selection,
//! gateway construction.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use lumigate_api::{BridgeStatus, BridgeValidator, TransportConfig};
use lumigate_config::{Config, KeyringCredentialStore};
use lumigate_core::convert::bridge_from_identity;
use lumigate_core::{Bridge, CoreError, DiscoverySource, GatewayClient};

use crate::cli::GlobalOpts;
use crate::error::CliError;

/// Loaded configuration plus where it came from.
pub struct Loaded {
    pub config: Config,
    pub path: PathBuf,
}

/// Load the config named by `--config`, or the platform default.
pub fn load(global: &GlobalOpts) -> Result<Loaded, CliError> {
    let path = global
        .config
        .clone()
        .unwrap_or_else(lumigate_config::config_path);
    let config = lumigate_config::load_config_from(&path)?;
    Ok(Loaded { config, path })
}

pub fn save(config: &Config, path: &Path) -> Result<(), CliError> {
    lumigate_config::save_config_to(config, path)?;
    tracing::debug!(path = %path.display(), "config saved");
    Ok(())
}

/// Unauthenticated status probe against `address:port`.
pub async fn probe_status(
    config: &Config,
    address: &str,
    port: u16,
) -> Result<(BridgeValidator, BridgeStatus), CliError> {
    let settings = config.discovery_settings();
    let http = TransportConfig::default()
        .build_probe_client(settings.probe_timeout)
        .map_err(CoreError::from)?;
    let validator = BridgeValidator::new(http, settings.probe_timeout)
        .with_keywords(settings.model_keywords.iter().cloned());
    let status = validator
        .fetch_status(address, port)
        .await
        .map_err(CoreError::from)?;
    Ok((validator, status))
}

/// Pick the target bridge.
///
/// `--address` wins and is identified live so credentials can be keyed by
/// bridge id. Otherwise the `--bridge` profile, the default profile, or
/// the only configured bridge.
pub async fn resolve_bridge(global: &GlobalOpts, config: &Config) -> Result<Bridge, CliError> {
    if let Some(address) = global.address.as_deref() {
        let (validator, status) = probe_status(config, address, global.port).await?;
        let identity = validator
            .identify(address, global.port, status)
            .ok_or_else(|| CliError::Validation {
                field: "address".into(),
                reason: format!("{address} does not look like a bridge"),
            })?;
        return Ok(bridge_from_identity(identity, DiscoverySource::Manual));
    }

    match config.bridge(global.bridge.as_deref()) {
        Ok((name, profile)) => {
            tracing::debug!(name, id = %profile.id, "using configured bridge");
            Ok(profile.to_bridge())
        }
        Err(lumigate_config::ConfigError::UnknownBridge { name }) => Err(CliError::UnknownBridge {
            name,
            available: known_bridges(config),
        }),
        Err(e) => Err(e.into()),
    }
}

/// Connect a gateway client backed by the OS keyring.
pub async fn gateway(global: &GlobalOpts, config: &Config) -> Result<GatewayClient, CliError> {
    let bridge = resolve_bridge(global, config).await?;
    let gateway = GatewayClient::connect(
        bridge,
        config.client_settings(),
        Arc::new(KeyringCredentialStore::default()),
    )?;
    Ok(gateway)
}

fn known_bridges(config: &Config) -> String {
    if config.bridges.is_empty() {
        "(none)".into()
    } else {
        config.bridges.keys().cloned().collect::<Vec<_>>().join(", ")
    }
}

/// Parse `--data`: inline JSON, or `@path` to read a file.
pub fn read_json_arg(data: &str) -> Result<serde_json::Value, CliError> {
    let contents = match data.strip_prefix('@') {
        Some(path) => std::fs::read_to_string(path)?,
        None => data.to_owned(),
    };
    serde_json::from_str(&contents).map_err(|e| CliError::Validation {
        field: "data".into(),
        reason: format!("invalid JSON: {e}"),
    })
}

/// Config profile name for a freshly discovered bridge.
pub fn profile_name(bridge: &Bridge) -> String {
    let base = bridge.name.as_deref().unwrap_or(&bridge.id);
    let slug: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_lowercase()
            } else {
                '-'
            }
        })
        .collect();
    let slug = slug.trim_matches('-').to_owned();
    if slug.is_empty() {
        bridge.id.to_ascii_lowercase()
    } else {
        slug
    }
}
