//! Shared configuration for the lumigate CLI.
//!
//! TOML file at the platform config path, overridden by `LUMIGATE_`
//! environment variables, translated into `lumigate_core`'s
//! [`DiscoverySettings`] and [`ClientSettings`]. Paired credentials live
//! in the OS keyring through [`KeyringCredentialStore`], never in the file.

mod keyring_store;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use lumigate_core::config::{DEFAULT_CLOUD_URL, DISCOVERY_TIMEOUT_RANGE};
use lumigate_core::{Bridge, ClientSettings, DiscoverySettings};

pub use keyring_store::{KEYRING_SERVICE, KeyringCredentialStore};

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("no bridge named '{name}' in the config")]
    UnknownBridge { name: String },

    #[error("no bridge configured; run `lumigate discover` or pass --address")]
    NoBridge,

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

// ── TOML config structs ─────────────────────────────────────────────

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    /// Bridge used when a command doesn't name one.
    pub default_bridge: Option<String>,

    #[serde(default)]
    pub defaults: Defaults,

    #[serde(default)]
    pub discovery: DiscoveryConfig,

    #[serde(default)]
    pub client: ClientConfig,

    /// Named bridges, usually written by `lumigate discover --save`.
    #[serde(default)]
    pub bridges: BTreeMap<String, BridgeProfile>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Defaults {
    #[serde(default = "default_output")]
    pub output: String,

    #[serde(default = "default_color")]
    pub color: String,

    /// Application id sent when pairing.
    #[serde(default = "default_app_id")]
    pub app_id: String,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            output: default_output(),
            color: default_color(),
            app_id: default_app_id(),
        }
    }
}

fn default_output() -> String {
    "table".into()
}
fn default_color() -> String {
    "auto".into()
}
fn default_app_id() -> String {
    "lumigate#cli".into()
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DiscoveryConfig {
    pub timeout_secs: u64,
    pub probe_timeout_ms: u64,
    pub probe_retries: u32,
    pub scan_concurrency: usize,
    /// Probed before the local subnet. `host` or `host:port`.
    pub scan_addresses: Vec<String>,
    pub scan_local_subnet: bool,
    pub cloud_url: String,
    pub listen_window_ms: u64,
    pub sufficient_results: Option<usize>,
    pub cloud: bool,
    pub ip_scan: bool,
    pub service_browse: bool,
    pub multicast: bool,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        let d = DiscoverySettings::default();
        Self {
            timeout_secs: d.timeout.as_secs(),
            probe_timeout_ms: millis(d.probe_timeout),
            probe_retries: d.probe_retries,
            scan_concurrency: d.scan_concurrency,
            scan_addresses: Vec::new(),
            scan_local_subnet: d.scan_local_subnet,
            cloud_url: DEFAULT_CLOUD_URL.into(),
            listen_window_ms: millis(d.listen_window),
            sufficient_results: d.sufficient_results,
            cloud: d.cloud,
            ip_scan: d.ip_scan,
            service_browse: d.service_browse,
            multicast: d.multicast,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ClientConfig {
    pub resource_interval_ms: u64,
    pub group_interval_ms: u64,
    pub request_timeout_secs: u64,
    pub retry_attempts: u32,
    pub blink_interval_ms: u64,
    pub serial_search_timeout_secs: u64,
    /// PEM file with a vendor root certificate to pin.
    pub pinned_root: Option<PathBuf>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        let c = ClientSettings::default();
        Self {
            resource_interval_ms: millis(c.resource_interval),
            group_interval_ms: millis(c.group_interval),
            request_timeout_secs: c.request_timeout.as_secs(),
            retry_attempts: c.retry_attempts,
            blink_interval_ms: millis(c.blink_interval),
            serial_search_timeout_secs: c.serial_search_timeout.as_secs(),
            pinned_root: None,
        }
    }
}

fn millis(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

/// A bridge remembered in the config file.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct BridgeProfile {
    pub id: String,
    pub address: String,
    #[serde(default = "default_port")]
    pub port: u16,
    pub name: Option<String>,
}

fn default_port() -> u16 {
    80
}

impl BridgeProfile {
    pub fn to_bridge(&self) -> Bridge {
        Bridge {
            name: self.name.clone(),
            ..Bridge::manual(self.id.clone(), self.address.clone(), self.port)
        }
    }
}

impl From<&Bridge> for BridgeProfile {
    fn from(bridge: &Bridge) -> Self {
        Self {
            id: bridge.id.clone(),
            address: bridge.address.clone(),
            port: bridge.port,
            name: bridge.name.clone(),
        }
    }
}

// ── Translation to runtime settings ─────────────────────────────────

impl Config {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let timeout = self.discovery.timeout_secs;
        if !DISCOVERY_TIMEOUT_RANGE.contains(&timeout) {
            return Err(ConfigError::Validation {
                field: "discovery.timeout_secs".into(),
                reason: format!(
                    "{timeout} is outside {}..={}",
                    DISCOVERY_TIMEOUT_RANGE.start(),
                    DISCOVERY_TIMEOUT_RANGE.end()
                ),
            });
        }
        if self.client.retry_attempts == 0 {
            return Err(ConfigError::Validation {
                field: "client.retry_attempts".into(),
                reason: "must be at least 1".into(),
            });
        }
        if let Some(name) = &self.default_bridge {
            if !self.bridges.contains_key(name) {
                return Err(ConfigError::UnknownBridge { name: name.clone() });
            }
        }
        Ok(())
    }

    pub fn discovery_settings(&self) -> DiscoverySettings {
        let d = &self.discovery;
        let mut settings = DiscoverySettings {
            timeout: Duration::from_secs(d.timeout_secs),
            probe_timeout: Duration::from_millis(d.probe_timeout_ms),
            probe_retries: d.probe_retries,
            scan_concurrency: d.scan_concurrency,
            scan_local_subnet: d.scan_local_subnet,
            cloud_url: d.cloud_url.clone(),
            listen_window: Duration::from_millis(d.listen_window_ms),
            sufficient_results: d.sufficient_results,
            cloud: d.cloud,
            ip_scan: d.ip_scan,
            service_browse: d.service_browse,
            multicast: d.multicast,
            ..DiscoverySettings::default()
        };
        // Extra addresses go first; the built-in list still follows.
        let mut addresses = d.scan_addresses.clone();
        addresses.append(&mut settings.scan_addresses);
        settings.scan_addresses = addresses;
        settings
    }

    pub fn client_settings(&self) -> ClientSettings {
        let c = &self.client;
        ClientSettings {
            resource_interval: Duration::from_millis(c.resource_interval_ms),
            group_interval: Duration::from_millis(c.group_interval_ms),
            request_timeout: Duration::from_secs(c.request_timeout_secs),
            retry_attempts: c.retry_attempts,
            blink_interval: Duration::from_millis(c.blink_interval_ms),
            serial_search_timeout: Duration::from_secs(c.serial_search_timeout_secs),
            pinned_root: c.pinned_root.clone(),
            ..ClientSettings::default()
        }
    }

    /// The named bridge, or the default one when `name` is `None`.
    pub fn bridge(&self, name: Option<&str>) -> Result<(&str, &BridgeProfile), ConfigError> {
        let name = match name.or(self.default_bridge.as_deref()) {
            Some(name) => name,
            None if self.bridges.len() == 1 => {
                return self
                    .bridges
                    .iter()
                    .next()
                    .map(|(n, p)| (n.as_str(), p))
                    .ok_or(ConfigError::NoBridge);
            }
            None => return Err(ConfigError::NoBridge),
        };
        self.bridges
            .get_key_value(name)
            .map(|(n, p)| (n.as_str(), p))
            .ok_or_else(|| ConfigError::UnknownBridge { name: name.into() })
    }

    /// Remember `bridge` under `name`. The first bridge saved becomes the
    /// default.
    pub fn upsert_bridge(&mut self, name: &str, bridge: &Bridge) {
        self.bridges.insert(name.to_owned(), BridgeProfile::from(bridge));
        if self.default_bridge.is_none() {
            self.default_bridge = Some(name.to_owned());
        }
    }
}

// ── Config file path ────────────────────────────────────────────────

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    ProjectDirs::from("dev", "lumigate", "lumigate").map_or_else(
        || {
            let mut p = dirs_fallback();
            p.push("config.toml");
            p
        },
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

fn dirs_fallback() -> PathBuf {
    let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
    p.push(".config");
    p.push("lumigate");
    p
}

// ── Config loading ──────────────────────────────────────────────────

/// Load the config from the canonical path plus environment.
pub fn load_config() -> Result<Config, ConfigError> {
    load_config_from(&config_path())
}

/// Load from `path` plus `LUMIGATE_` env vars (`__` separates sections,
/// e.g. `LUMIGATE_DISCOVERY__TIMEOUT_SECS=20`). A missing file is fine.
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    let figment = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed("LUMIGATE_").split("__"));

    let config: Config = figment.extract()?;
    config.validate()?;
    tracing::debug!(path = %path.display(), bridges = config.bridges.len(), "config loaded");
    Ok(config)
}

// ── Config saving ───────────────────────────────────────────────────

pub fn save_config(cfg: &Config) -> Result<PathBuf, ConfigError> {
    let path = config_path();
    save_config_to(cfg, &path)?;
    Ok(path)
}

pub fn save_config_to(cfg: &Config, path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let toml_str = toml::to_string_pretty(cfg)?;
    std::fs::write(path, toml_str)?;
    Ok(())
}
