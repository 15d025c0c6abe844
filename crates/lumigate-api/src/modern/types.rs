// Resource protocol types
//
// The modern protocol addresses everything as `/resource/{type}/{id}` with
// opaque string ids. Only lights are modelled field-by-field; the other
// families go through the generic [`Resource`] shape.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumIter, EnumString};

// ── Envelope ─────────────────────────────────────────────────────────

/// `{ "errors": [...], "data": [...] }`
#[derive(Debug, Deserialize)]
pub struct ResourceEnvelope<T> {
    #[serde(default)]
    pub errors: Vec<ResourceError>,
    #[serde(default = "Vec::new")]
    pub data: Vec<T>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ResourceError {
    pub description: String,
}

// ── Kinds and families ───────────────────────────────────────────────

/// Wire name of a resource type, e.g. `grouped_light`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, AsRefStr, EnumIter, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    Light,
    GroupedLight,
    Room,
    Zone,
    Scene,
    Motion,
    Temperature,
    LightLevel,
    Button,
    DevicePower,
    BehaviorInstance,
    Device,
    ZigbeeConnectivity,
    Bridge,
}

/// The five families exposed for CRUD.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, EnumIter)]
#[strum(serialize_all = "lowercase")]
pub enum ResourceFamily {
    Lights,
    Groups,
    Scenes,
    Sensors,
    Automations,
}

impl ResourceFamily {
    /// Wire kinds that belong to this family. The first is the one used
    /// for create calls.
    pub fn kinds(self) -> &'static [ResourceKind] {
        match self {
            Self::Lights => &[ResourceKind::Light],
            Self::Groups => &[ResourceKind::Room, ResourceKind::Zone, ResourceKind::GroupedLight],
            Self::Scenes => &[ResourceKind::Scene],
            Self::Sensors => &[
                ResourceKind::Motion,
                ResourceKind::Temperature,
                ResourceKind::LightLevel,
                ResourceKind::Button,
                ResourceKind::DevicePower,
            ],
            Self::Automations => &[ResourceKind::BehaviorInstance],
        }
    }

    /// Whether mutations in this family go through the group throttle.
    pub fn is_bulk(self) -> bool {
        matches!(self, Self::Groups | Self::Scenes)
    }
}

impl ResourceKind {
    pub fn family(self) -> Option<ResourceFamily> {
        match self {
            Self::Light => Some(ResourceFamily::Lights),
            Self::GroupedLight | Self::Room | Self::Zone => Some(ResourceFamily::Groups),
            Self::Scene => Some(ResourceFamily::Scenes),
            Self::Motion | Self::Temperature | Self::LightLevel | Self::Button | Self::DevicePower => {
                Some(ResourceFamily::Sensors)
            }
            Self::BehaviorInstance => Some(ResourceFamily::Automations),
            Self::Device | Self::ZigbeeConnectivity | Self::Bridge => None,
        }
    }
}

// ── References ───────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceRef {
    pub rid: String,
    pub rtype: String,
}

// ── Generic resource ─────────────────────────────────────────────────

/// Any resource, with fields beyond `id`/`type` kept as raw JSON.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Resource {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(flatten)]
    pub body: serde_json::Map<String, serde_json::Value>,
}

impl Resource {
    /// `metadata.name`, when the resource has one.
    pub fn name(&self) -> Option<&str> {
        self.body.get("metadata")?.get("name")?.as_str()
    }
}

// ── Lights ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LightResource {
    pub id: String,
    #[serde(default)]
    pub owner: Option<ResourceRef>,
    #[serde(default)]
    pub metadata: LightMetadata,
    pub on: OnState,
    #[serde(default)]
    pub dimming: Option<Dimming>,
    #[serde(default)]
    pub color: Option<ColorState>,
    #[serde(default)]
    pub color_temperature: Option<ColorTemperatureState>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LightMetadata {
    #[serde(default)]
    pub name: String,
    /// User-assigned subtype, e.g. `pendant_round`.
    #[serde(default)]
    pub archetype: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OnState {
    pub on: bool,
}

/// Brightness percentage, 0–100.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Dimming {
    pub brightness: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Xy {
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ColorState {
    pub xy: Xy,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ColorTemperatureState {
    /// `null` while the light is in xy mode.
    #[serde(default)]
    pub mirek: Option<u16>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MirekUpdate {
    pub mirek: u16,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Dynamics {
    /// Transition duration in milliseconds.
    pub duration: u32,
}

pub const MIREK_MIN: u16 = 153;
pub const MIREK_MAX: u16 = 500;

/// Body for `PUT /resource/light/{id}` (and `grouped_light`).
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LightUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub on: Option<OnState>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dimming: Option<Dimming>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<ColorState>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color_temperature: Option<MirekUpdate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dynamics: Option<Dynamics>,
}

impl LightUpdate {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn on(mut self, on: bool) -> Self {
        self.on = Some(OnState { on });
        self
    }

    /// Clamped to 0–100.
    #[must_use]
    pub fn brightness(mut self, percent: f64) -> Self {
        self.dimming = Some(Dimming {
            brightness: percent.clamp(0.0, 100.0),
        });
        self
    }

    /// Chromaticity, each coordinate clamped to 0–1.
    #[must_use]
    pub fn xy(mut self, x: f64, y: f64) -> Self {
        self.color = Some(ColorState {
            xy: Xy {
                x: x.clamp(0.0, 1.0),
                y: y.clamp(0.0, 1.0),
            },
        });
        self
    }

    /// Mired color temperature, clamped to the supported range.
    #[must_use]
    pub fn mirek(mut self, mirek: u16) -> Self {
        self.color_temperature = Some(MirekUpdate {
            mirek: mirek.clamp(MIREK_MIN, MIREK_MAX),
        });
        self
    }

    #[must_use]
    pub fn transition(mut self, duration: Duration) -> Self {
        self.dynamics = Some(Dynamics {
            duration: u32::try_from(duration.as_millis()).unwrap_or(u32::MAX),
        });
        self
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// The update that would put a light back into `light`'s current state.
    pub fn restoring(light: &LightResource) -> Self {
        let mut update = Self::new().on(light.on.on);
        if let Some(dimming) = light.dimming {
            update = update.brightness(dimming.brightness);
        }
        match (light.color_temperature.and_then(|ct| ct.mirek), light.color) {
            (Some(mirek), _) => update.mirek(mirek),
            (None, Some(color)) => update.xy(color.xy.x, color.xy.y),
            (None, None) => update,
        }
    }
}
