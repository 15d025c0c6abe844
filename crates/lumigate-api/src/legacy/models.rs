// Legacy API response types
//
// Models for the bridge's numeric-id protocol. Lights are returned as a
// JSON object keyed by numeric id; writes return an array of
// `{success: ...}` / `{error: ...}` items. Fields use `#[serde(default)]`
// liberally because firmware versions disagree about field presence.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

// ── Result items ─────────────────────────────────────────────────────

/// One `{ "success": T }` or `{ "error": {...} }` entry.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LegacyResult<T> {
    Success(T),
    Error(LegacyErrorBody),
}

#[derive(Debug, Clone, Deserialize)]
pub struct LegacyErrorBody {
    #[serde(rename = "type")]
    pub kind: u16,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub description: String,
}

// ── Pairing ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
pub struct PairingSuccess {
    pub username: String,
    #[serde(default)]
    pub clientkey: Option<String>,
}

// ── Lights ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LegacyLight {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub uniqueid: Option<String>,
    #[serde(default, rename = "type")]
    pub light_type: Option<String>,
    #[serde(default)]
    pub modelid: Option<String>,
    #[serde(default)]
    pub manufacturername: Option<String>,
    #[serde(default)]
    pub productname: Option<String>,
    #[serde(default)]
    pub state: LegacyLightState,
    /// Catch-all for undocumented fields.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LegacyLightState {
    #[serde(default)]
    pub on: bool,
    /// 1–254.
    #[serde(default)]
    pub bri: Option<u8>,
    #[serde(default)]
    pub xy: Option<[f64; 2]>,
    /// Mired.
    #[serde(default)]
    pub ct: Option<u16>,
    #[serde(default)]
    pub colormode: Option<String>,
    /// Absent on some virtual lights.
    #[serde(default)]
    pub reachable: Option<bool>,
}

/// Body for `PUT /lights/{id}/state`.
#[derive(Debug, Clone, Default, Serialize)]
pub struct LegacyStateUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub on: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bri: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub xy: Option<[f64; 2]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ct: Option<u16>,
    /// Deciseconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transitiontime: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alert: Option<String>,
}

// ── New-device scan ──────────────────────────────────────────────────

/// `GET /lights/new`: scan status plus any ids found since the last scan.
#[derive(Debug, Clone, Deserialize)]
pub struct NewLightsScan {
    #[serde(default = "default_lastscan")]
    pub lastscan: String,
    #[serde(flatten)]
    pub found: IndexMap<String, NewLight>,
}

fn default_lastscan() -> String {
    "none".into()
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewLight {
    #[serde(default)]
    pub name: String,
}

/// Interpretation of the `lastscan` field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanState {
    Active,
    Never,
    /// Completed at the given (bridge-local) timestamp.
    Completed(String),
}

impl NewLightsScan {
    pub fn state(&self) -> ScanState {
        match self.lastscan.as_str() {
            "active" => ScanState::Active,
            "none" => ScanState::Never,
            ts => ScanState::Completed(ts.to_owned()),
        }
    }
}
