// ── API-to-domain type conversions ──
//
// Bridges raw `lumigate_api` response types into canonical
// `lumigate_core::model` types. Reachability is only ever set here from
// the legacy `reachable` flag; modern records start `Unknown` and get
// their value from the reconciler's overlay.

use lumigate_api::legacy::models::LegacyLight;
use lumigate_api::modern::types::LightResource;
use lumigate_api::validator::BridgeIdentity;

use crate::model::{Bridge, DiscoverySource, Light, LightColor, Protocol, Reachability};

/// Legacy brightness runs 1–254.
const LEGACY_BRI_MAX: f64 = 254.0;

// ── Bridges ─────────────────────────────────────────────────────────

pub fn bridge_from_identity(identity: BridgeIdentity, source: DiscoverySource) -> Bridge {
    Bridge {
        id: identity.id,
        address: identity.address,
        port: identity.port,
        name: identity.name,
        model: identity.model,
        api_version: identity.api_version,
        source,
    }
}

// ── Lights ──────────────────────────────────────────────────────────

pub fn light_from_legacy(id: &str, light: &LegacyLight) -> Light {
    let state = &light.state;
    let color = match (state.colormode.as_deref(), state.ct, state.xy) {
        (Some("ct"), Some(mirek), _) | (None, Some(mirek), None) => {
            Some(LightColor::Temperature { mirek })
        }
        (_, _, Some([x, y])) => Some(LightColor::Xy { x, y }),
        _ => None,
    };

    Light {
        id: id.to_owned(),
        protocol: Protocol::Legacy,
        name: light.name.clone(),
        on: state.on,
        brightness: state
            .bri
            .map(|bri| (f64::from(bri) / LEGACY_BRI_MAX * 100.0).clamp(0.0, 100.0)),
        color,
        reachability: Reachability::from_reachable(state.reachable),
        archetype: None,
        unique_id: light.uniqueid.clone(),
        device_id: None,
        model: light.modelid.clone(),
    }
}

impl From<&LightResource> for Light {
    fn from(light: &LightResource) -> Self {
        let mirek = light.color_temperature.and_then(|ct| ct.mirek);
        let color = match (mirek, light.color) {
            (Some(mirek), _) => Some(LightColor::Temperature { mirek }),
            (None, Some(c)) => Some(LightColor::Xy {
                x: c.xy.x,
                y: c.xy.y,
            }),
            (None, None) => None,
        };

        Self {
            id: light.id.clone(),
            protocol: Protocol::Modern,
            name: light.metadata.name.clone(),
            on: light.on.on,
            brightness: light.dimming.map(|d| d.brightness),
            color,
            reachability: Reachability::Unknown,
            archetype: light.metadata.archetype.clone(),
            unique_id: None,
            device_id: light.owner.as_ref().map(|o| o.rid.clone()),
            model: None,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn legacy_light_normalizes() {
        let raw: LegacyLight = serde_json::from_value(json!({
            "name": "Desk",
            "uniqueid": "00:17:88:01:00:aa:bb:cc-0b",
            "modelid": "LCT015",
            "state": {"on": true, "bri": 254, "ct": 366, "xy": [0.4, 0.4], "colormode": "ct", "reachable": false}
        }))
        .unwrap();

        let light = light_from_legacy("3", &raw);
        assert_eq!(light.protocol, Protocol::Legacy);
        assert_eq!(light.brightness, Some(100.0));
        assert_eq!(light.color, Some(LightColor::Temperature { mirek: 366 }));
        assert_eq!(light.reachability, Reachability::Offline);
        assert_eq!(light.unique_id.as_deref(), Some("00:17:88:01:00:aa:bb:cc-0b"));
    }

    #[test]
    fn legacy_without_reachable_is_unknown() {
        let raw: LegacyLight =
            serde_json::from_value(json!({"name": "Virtual", "state": {"on": false}})).unwrap();
        assert_eq!(light_from_legacy("9", &raw).reachability, Reachability::Unknown);
    }

    #[test]
    fn modern_light_starts_unknown() {
        let raw: LightResource = serde_json::from_value(json!({
            "id": "a1",
            "owner": {"rid": "dev-1", "rtype": "device"},
            "metadata": {"name": "Hall", "archetype": "ceiling_round"},
            "on": {"on": false},
            "color": {"xy": {"x": 0.2, "y": 0.3}},
            "color_temperature": {"mirek": null}
        }))
        .unwrap();

        let light = Light::from(&raw);
        assert_eq!(light.reachability, Reachability::Unknown);
        assert_eq!(light.color, Some(LightColor::Xy { x: 0.2, y: 0.3 }));
        assert_eq!(light.device_id.as_deref(), Some("dev-1"));
        assert_eq!(light.archetype.as_deref(), Some("ceiling_round"));
    }
}
