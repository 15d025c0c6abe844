// ── Device identity reconciliation ──
//
// The two protocol generations share no join key. Mappings are inferred
// from names and MAC fragments, rule by rule:
//
//   1. exact name equality
//   2. last six hex digits of the modern id == last six of the legacy MAC
//   3. a hex fragment (>= 6 chars) of a modern id component, cut to its
//      last six, occurs in the legacy unique id
//
// Each rule runs over all still-unmapped records before the next rule is
// tried, so a weaker rule never steals a record a stronger rule would
// have matched. Records pair at most once. Nothing is guessed: no rule,
// no mapping.

use std::collections::HashSet;

use serde::Serialize;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use lumigate_api::legacy::models::ScanState;

use crate::error::CoreError;
use crate::gateway::GatewayClient;
use crate::model::{DeviceMapping, Light, MatchRule, Protocol, Reachability};
use crate::source::{LegacySource, LightSource, ModernSource};

const SUFFIX_LEN: usize = 6;

// ── Identifier helpers ───────────────────────────────────────────────

/// Strip separators, uppercase, and require exactly six letters/digits.
///
/// Idempotent on valid serials.
pub fn normalize_serial(input: &str) -> Result<String, CoreError> {
    let cleaned: String = input
        .chars()
        .filter(|c| !c.is_whitespace() && !matches!(c, ':' | '-' | '.' | '_'))
        .map(|c| c.to_ascii_uppercase())
        .collect();

    if cleaned.len() == SUFFIX_LEN && cleaned.chars().all(|c| c.is_ascii_alphanumeric()) {
        Ok(cleaned)
    } else {
        Err(CoreError::InvalidSerial {
            input: input.to_owned(),
        })
    }
}

fn hex_digits(s: &str) -> String {
    s.chars()
        .filter(char::is_ascii_hexdigit)
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

fn last_six(hex: &str) -> Option<String> {
    hex.len()
        .checked_sub(SUFFIX_LEN)
        .map(|start| hex[start..].to_owned())
}

/// Last six hex digits of the MAC part of a legacy unique id
/// (`00:17:88:01:00:aa:bb:cc-0b` gives `aabbcc`).
pub fn mac_suffix(unique_id: &str) -> Option<String> {
    let mac = unique_id.split('-').next().unwrap_or(unique_id);
    last_six(&hex_digits(mac))
}

/// Hex fragments of at least six digits in an id's dash-separated
/// components, each cut to its last six.
fn id_fragments(id: &str) -> Vec<String> {
    id.split(['-', ':', '_'])
        .filter(|part| part.len() >= SUFFIX_LEN && part.chars().all(|c| c.is_ascii_hexdigit()))
        .filter_map(|part| last_six(&part.to_ascii_lowercase()))
        .collect()
}

/// Ids a modern light can be matched by: its own and its owning device's.
fn modern_ids(light: &Light) -> impl Iterator<Item = &str> {
    std::iter::once(light.id.as_str()).chain(light.device_id.as_deref())
}

fn rule_matches(rule: MatchRule, modern: &Light, legacy: &Light) -> bool {
    match rule {
        MatchRule::Name => !modern.name.is_empty() && modern.name == legacy.name,
        MatchRule::MacSuffix => {
            let Some(legacy_suffix) = legacy.unique_id.as_deref().and_then(mac_suffix) else {
                return false;
            };
            modern_ids(modern)
                .any(|id| last_six(&hex_digits(id)).as_deref() == Some(legacy_suffix.as_str()))
        }
        MatchRule::MacFragment => {
            let Some(legacy_hex) = legacy.unique_id.as_deref().map(hex_digits) else {
                return false;
            };
            modern_ids(modern)
                .flat_map(id_fragments)
                .any(|fragment| legacy_hex.contains(&fragment))
        }
    }
}

// ── Reconcile ────────────────────────────────────────────────────────

/// Map modern lights to legacy lights. Inputs keep their order; for each
/// modern record the first eligible legacy record (in legacy order) wins.
pub fn reconcile(legacy: &[Light], modern: &[Light]) -> Vec<DeviceMapping> {
    let mut used_legacy: HashSet<usize> = HashSet::new();
    let mut used_modern: HashSet<usize> = HashSet::new();
    let mut mappings = Vec::new();

    for rule in [MatchRule::Name, MatchRule::MacSuffix, MatchRule::MacFragment] {
        for (mi, m) in modern.iter().enumerate() {
            if used_modern.contains(&mi) {
                continue;
            }
            let mut candidates = legacy
                .iter()
                .enumerate()
                .filter(|(li, l)| !used_legacy.contains(li) && rule_matches(rule, m, l));

            let Some((li, l)) = candidates.next() else {
                continue;
            };
            if candidates.next().is_some() {
                debug!(modern = %m.id, %rule, "several legacy candidates, taking the first");
            }

            used_legacy.insert(li);
            used_modern.insert(mi);
            mappings.push(DeviceMapping {
                modern_id: m.id.clone(),
                legacy_id: l.id.clone(),
                unique_id: l.unique_id.clone(),
                mac_suffix: l.unique_id.as_deref().and_then(mac_suffix),
                serial: None,
                rule,
            });
        }
    }

    mappings
}

/// Attach legacy reachability to modern lights.
///
/// `legacy = None` means the legacy fetch failed: every modern light
/// becomes `Unknown`, never `Offline`. Unmapped lights are `Unknown`.
pub fn overlay_reachability(modern: &mut [Light], legacy: Option<&[Light]>) -> Vec<DeviceMapping> {
    for light in modern.iter_mut() {
        light.reachability = Reachability::Unknown;
    }
    let Some(legacy) = legacy else {
        return Vec::new();
    };

    let mappings = reconcile(legacy, modern);
    for mapping in &mappings {
        let reachability = legacy
            .iter()
            .find(|l| l.id == mapping.legacy_id)
            .map_or(Reachability::Unknown, |l| l.reachability);
        if let Some(light) = modern.iter_mut().find(|l| l.id == mapping.modern_id) {
            light.reachability = reachability;
            if light.unique_id.is_none() {
                light.unique_id.clone_from(&mapping.unique_id);
            }
        }
    }
    mappings
}

// ── Serial addition ──────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum SerialMatchSource {
    /// Reported by the bridge's new-device scan.
    Search,
    /// An already-known light whose MAC or name ends with the serial.
    Existing,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SerialMatch {
    pub legacy_id: String,
    pub name: String,
    pub serial: String,
    pub source: SerialMatchSource,
}

fn matches_serial(light: &Light, serial_lower: &str) -> bool {
    let by_mac = light
        .unique_id
        .as_deref()
        .and_then(mac_suffix)
        .is_some_and(|suffix| suffix == serial_lower);
    let name_alnum: String = light
        .name
        .chars()
        .filter(char::is_ascii_alphanumeric)
        .map(|c| c.to_ascii_lowercase())
        .collect();
    by_mac || name_alnum.ends_with(serial_lower)
}

// ── Reconciler ───────────────────────────────────────────────────────

/// Runs reconciliation against a live bridge.
pub struct Reconciler<'a> {
    gateway: &'a GatewayClient,
}

impl<'a> Reconciler<'a> {
    pub fn new(gateway: &'a GatewayClient) -> Self {
        Self { gateway }
    }

    async fn legacy_lights(&self) -> Result<Vec<Light>, CoreError> {
        let client = self.gateway.legacy().await?;
        LegacySource::new(&client).fetch_lights().await
    }

    /// Modern lights with reachability overlaid from the legacy protocol.
    ///
    /// A failed modern fetch is an error; a failed legacy fetch only
    /// degrades reachability to `Unknown`.
    pub async fn lights(&self) -> Result<(Vec<Light>, Vec<DeviceMapping>), CoreError> {
        let client = self.gateway.modern().await?;
        let mut modern = ModernSource::new(&client).fetch_lights().await?;

        let legacy = match self.legacy_lights().await {
            Ok(lights) => Some(lights),
            Err(e) => {
                warn!(error = %e, "legacy fetch failed, reachability unknown");
                None
            }
        };

        let mappings = overlay_reachability(&mut modern, legacy.as_deref());
        debug!(lights = modern.len(), mapped = mappings.len(), "reconciled");
        Ok((modern, mappings))
    }

    /// Current mappings. Both fetches must succeed.
    pub async fn mappings(&self) -> Result<Vec<DeviceMapping>, CoreError> {
        let client = self.gateway.modern().await?;
        let modern = ModernSource::new(&client).fetch_lights().await?;
        let legacy = self.legacy_lights().await?;
        Ok(reconcile(&legacy, &modern))
    }

    /// Add a light by the six-character serial printed on it.
    ///
    /// Triggers a targeted search and polls the scan until it finishes or
    /// the budget runs out. If the scan found nothing, falls back to lights
    /// the bridge already knows whose MAC or name ends with the serial.
    pub async fn add_by_serial(&self, serial: &str) -> Result<Vec<SerialMatch>, CoreError> {
        let serial = normalize_serial(serial)?;
        let settings = self.gateway.settings();
        let client = self.gateway.legacy().await?;

        client.search_lights(std::slice::from_ref(&serial)).await?;
        info!(%serial, "search started");

        let deadline = Instant::now() + settings.serial_search_timeout;
        let mut found = Vec::new();
        loop {
            tokio::time::sleep(settings.serial_poll_interval).await;

            match client.new_lights().await {
                Ok(scan) => {
                    found = scan
                        .found
                        .iter()
                        .map(|(id, light)| SerialMatch {
                            legacy_id: id.clone(),
                            name: light.name.clone(),
                            serial: serial.clone(),
                            source: SerialMatchSource::Search,
                        })
                        .collect();
                    if scan.state() != ScanState::Active {
                        break;
                    }
                }
                Err(e) if e.is_transient() => debug!(error = %e, "scan poll failed, retrying"),
                Err(e) => return Err(e.into()),
            }

            if Instant::now() >= deadline {
                warn!(%serial, "search did not finish in time");
                break;
            }
        }

        if !found.is_empty() {
            info!(%serial, count = found.len(), "search found new lights");
            return Ok(found);
        }

        let serial_lower = serial.to_ascii_lowercase();
        let existing: Vec<SerialMatch> = LegacySource::new(&client)
            .fetch_lights()
            .await?
            .into_iter()
            .filter(|l| l.protocol == Protocol::Legacy && matches_serial(l, &serial_lower))
            .map(|l| SerialMatch {
                legacy_id: l.id,
                name: l.name,
                serial: serial.clone(),
                source: SerialMatchSource::Existing,
            })
            .collect();

        if existing.is_empty() {
            Err(CoreError::NotFound {
                identifier: format!("light with serial {serial}"),
            })
        } else {
            Ok(existing)
        }
    }
}
