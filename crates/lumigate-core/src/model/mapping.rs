// ── Device mapping ──

use serde::{Deserialize, Serialize};
use strum::Display;

/// Which reconciliation rule produced a mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, Serialize, Deserialize)]
#[strum(serialize_all = "kebab-case")]
#[serde(rename_all = "kebab-case")]
pub enum MatchRule {
    Name,
    MacSuffix,
    MacFragment,
}

/// One physical device seen through both protocols.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceMapping {
    pub modern_id: String,
    pub legacy_id: String,
    /// MAC-derived unique id reported by the legacy protocol.
    pub unique_id: Option<String>,
    /// Last six hex digits of the MAC, lowercase.
    pub mac_suffix: Option<String>,
    /// Six-character hardware serial, when known (serial addition).
    pub serial: Option<String>,
    pub rule: MatchRule,
}
