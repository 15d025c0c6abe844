// ── Bridge domain types ──

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// How a bridge was found.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize)]
#[strum(serialize_all = "kebab-case")]
#[serde(rename_all = "kebab-case")]
pub enum DiscoverySource {
    Cloud,
    IpScan,
    ServiceBrowse,
    Multicast,
    Manual,
}

/// A confirmed gateway on the local network.
///
/// `id` is the vendor-issued bridge id, uppercased. It is the merge key
/// for discovery and the key for stored credentials.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bridge {
    pub id: String,
    pub address: String,
    pub port: u16,
    pub name: Option<String>,
    pub model: Option<String>,
    pub api_version: Option<String>,
    pub source: DiscoverySource,
}

impl Bridge {
    /// A bridge the user typed in, not yet confirmed.
    pub fn manual(id: impl Into<String>, address: impl Into<String>, port: u16) -> Self {
        Self {
            id: id.into().to_ascii_uppercase(),
            address: address.into(),
            port,
            name: None,
            model: None,
            api_version: None,
            source: DiscoverySource::Manual,
        }
    }

    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.id)
    }
}
