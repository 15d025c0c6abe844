// ── Unified domain model ──
//
// Canonical bridge, light and mapping types. Both protocol generations
// are normalized into these before anything above the source layer sees
// them.

pub mod bridge;
pub mod light;
pub mod mapping;

// ── Re-exports ──────────────────────────────────────────────────────

pub use bridge::{Bridge, DiscoverySource};
pub use light::{Light, LightColor, Protocol, Reachability};
pub use mapping::{DeviceMapping, MatchRule};
