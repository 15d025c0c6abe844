// ── Domain events ──
//
// Typed view over raw stream events. Light state changes and connectivity
// changes get their own variants; everything else passes through with its
// kind and change type so callers can still react to it.

use serde::Serialize;

use lumigate_api::stream::StreamEvent;

use crate::model::{Light, LightColor, Protocol, Reachability};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum DomainEvent {
    /// Partial light update: only fields the bridge sent are `Some`.
    LightChanged {
        id: String,
        on: Option<bool>,
        brightness: Option<f64>,
        color: Option<LightColor>,
    },
    /// A device's radio link changed.
    Connectivity {
        id: String,
        device_id: Option<String>,
        reachability: Reachability,
    },
    Added {
        id: String,
        kind: String,
    },
    Removed {
        id: String,
        kind: String,
    },
    Other {
        id: String,
        kind: String,
        change: String,
    },
}

impl DomainEvent {
    pub fn id(&self) -> &str {
        match self {
            Self::LightChanged { id, .. }
            | Self::Connectivity { id, .. }
            | Self::Added { id, .. }
            | Self::Removed { id, .. }
            | Self::Other { id, .. } => id,
        }
    }
}

/// `zigbee_connectivity.status` to reachability.
pub fn connectivity_status(status: &str) -> Reachability {
    match status {
        "connected" => Reachability::Online,
        "disconnected" => Reachability::Offline,
        "connectivity_issue" | "unidirectional_incoming" => Reachability::Issues,
        _ => Reachability::Unknown,
    }
}

impl From<&StreamEvent> for DomainEvent {
    fn from(event: &StreamEvent) -> Self {
        let data = &event.data;
        let id = event.id.clone();

        match (event.change.as_str(), event.kind.as_str()) {
            ("add", _) => Self::Added {
                id,
                kind: event.kind.clone(),
            },
            ("delete", _) => Self::Removed {
                id,
                kind: event.kind.clone(),
            },
            ("update", "light") => {
                let mirek = data["color_temperature"]["mirek"]
                    .as_u64()
                    .and_then(|m| u16::try_from(m).ok());
                let xy = data["color"]["xy"]["x"]
                    .as_f64()
                    .zip(data["color"]["xy"]["y"].as_f64());
                let color = match (mirek, xy) {
                    (Some(mirek), _) => Some(LightColor::Temperature { mirek }),
                    (None, Some((x, y))) => Some(LightColor::Xy { x, y }),
                    (None, None) => None,
                };
                Self::LightChanged {
                    id,
                    on: data["on"]["on"].as_bool(),
                    brightness: data["dimming"]["brightness"].as_f64(),
                    color,
                }
            }
            ("update", "zigbee_connectivity") => Self::Connectivity {
                id,
                device_id: data["owner"]["rid"].as_str().map(str::to_owned),
                reachability: data["status"]
                    .as_str()
                    .map_or(Reachability::Unknown, connectivity_status),
            },
            (change, kind) => Self::Other {
                id,
                kind: kind.to_owned(),
                change: change.to_owned(),
            },
        }
    }
}

/// Fold an event into a light list. Returns whether anything changed.
///
/// Connectivity events apply to every modern light owned by the device.
pub fn apply_event(lights: &mut [Light], event: &DomainEvent) -> bool {
    match event {
        DomainEvent::LightChanged {
            id,
            on,
            brightness,
            color,
        } => {
            let Some(light) = lights
                .iter_mut()
                .find(|l| l.protocol == Protocol::Modern && l.id == *id)
            else {
                return false;
            };
            if let Some(on) = on {
                light.on = *on;
            }
            if brightness.is_some() {
                light.brightness = *brightness;
            }
            if color.is_some() {
                light.color = *color;
            }
            true
        }
        DomainEvent::Connectivity {
            device_id: Some(device_id),
            reachability,
            ..
        } => {
            let mut changed = false;
            for light in lights
                .iter_mut()
                .filter(|l| l.device_id.as_deref() == Some(device_id.as_str()))
            {
                light.reachability = *reachability;
                changed = true;
            }
            changed
        }
        _ => false,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;

    use super::*;

    fn raw(change: &str, data: serde_json::Value) -> StreamEvent {
        StreamEvent {
            id: data["id"].as_str().unwrap().to_owned(),
            kind: data["type"].as_str().unwrap().to_owned(),
            change: change.to_owned(),
            sequence_id: None,
            created_at: None,
            data,
        }
    }

    fn modern_light(id: &str, device: &str) -> Light {
        Light {
            id: id.into(),
            protocol: Protocol::Modern,
            name: id.into(),
            on: false,
            brightness: Some(10.0),
            color: None,
            reachability: Reachability::Unknown,
            archetype: None,
            unique_id: None,
            device_id: Some(device.into()),
            model: None,
        }
    }

    #[test]
    fn light_update_is_partial() {
        let event = DomainEvent::from(&raw(
            "update",
            json!({"id": "l1", "type": "light", "on": {"on": true}}),
        ));
        assert_eq!(
            event,
            DomainEvent::LightChanged {
                id: "l1".into(),
                on: Some(true),
                brightness: None,
                color: None
            }
        );

        let mut lights = vec![modern_light("l1", "d1")];
        assert!(apply_event(&mut lights, &event));
        assert!(lights[0].on);
        assert_eq!(lights[0].brightness, Some(10.0));
    }

    #[test]
    fn connectivity_sets_reachability_on_owned_lights() {
        let event = DomainEvent::from(&raw(
            "update",
            json!({
                "id": "z1",
                "type": "zigbee_connectivity",
                "owner": {"rid": "d1", "rtype": "device"},
                "status": "connectivity_issue"
            }),
        ));

        let mut lights = vec![modern_light("l1", "d1"), modern_light("l2", "d2")];
        assert!(apply_event(&mut lights, &event));
        assert_eq!(lights[0].reachability, Reachability::Issues);
        assert_eq!(lights[1].reachability, Reachability::Unknown);
    }

    #[test]
    fn status_mapping() {
        assert_eq!(connectivity_status("connected"), Reachability::Online);
        assert_eq!(connectivity_status("disconnected"), Reachability::Offline);
        assert_eq!(connectivity_status("weird"), Reachability::Unknown);
    }

    #[test]
    fn add_delete_and_other() {
        let added = DomainEvent::from(&raw("add", json!({"id": "s1", "type": "scene"})));
        assert!(matches!(added, DomainEvent::Added { ref kind, .. } if kind == "scene"));

        let removed = DomainEvent::from(&raw("delete", json!({"id": "s1", "type": "scene"})));
        assert!(matches!(removed, DomainEvent::Removed { .. }));

        let other = DomainEvent::from(&raw("update", json!({"id": "m1", "type": "motion"})));
        assert_eq!(other.id(), "m1");
        assert!(matches!(other, DomainEvent::Other { ref kind, .. } if kind == "motion"));
    }
}
