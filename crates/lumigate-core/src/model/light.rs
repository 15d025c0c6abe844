// ── Light domain types ──

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Which protocol generation a light record came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, Serialize, Deserialize)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    Legacy,
    Modern,
}

/// Whether the bridge can currently talk to a light.
///
/// `Unknown` is the safe default: it is used whenever reachability
/// cannot be established, and never collapses into `Offline`.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Reachability {
    Online,
    Offline,
    #[default]
    Unknown,
    Issues,
}

impl Reachability {
    pub fn from_reachable(reachable: Option<bool>) -> Self {
        match reachable {
            Some(true) => Self::Online,
            Some(false) => Self::Offline,
            None => Self::Unknown,
        }
    }
}

/// Current color of a light.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "mode")]
pub enum LightColor {
    /// CIE 1931 chromaticity.
    Xy { x: f64, y: f64 },
    /// Color temperature in mired.
    Temperature { mirek: u16 },
}

/// Canonical light, normalized from either protocol.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Light {
    /// Numeric id (legacy) or opaque resource id (modern).
    pub id: String,
    pub protocol: Protocol,
    pub name: String,
    pub on: bool,
    /// 0–100.
    pub brightness: Option<f64>,
    pub color: Option<LightColor>,
    pub reachability: Reachability,
    /// User-assigned subtype, e.g. `pendant_round`.
    pub archetype: Option<String>,
    /// Legacy MAC-derived unique id, e.g. `00:17:88:01:00:aa:bb:cc-0b`.
    pub unique_id: Option<String>,
    /// Owning device resource id (modern only).
    pub device_id: Option<String>,
    pub model: Option<String>,
}
