//! Discovery, throttled gateway access and device reconciliation on top of
//! `lumigate-api`.
//!
//! - **[`Discovery`]**: runs the cloud lookup, IP scan, service browse and
//!   multicast strategies concurrently and merges confirmed bridges by id
//!   within one global deadline.
//!
//! - **[`GatewayClient`]**: an authenticated client for one bridge. Every
//!   mutation passes a per-resource or group [`Throttle`]; idempotent
//!   requests retry on transient failures through [`RetryPolicy`].
//!
//! - **[`Reconciler`]**: joins legacy and modern light records into
//!   [`DeviceMapping`]s, overlays legacy reachability onto modern lights and
//!   adds lights by serial number.
//!
//! - **[`DomainEvent`]**: typed view over the bridge's event stream.

pub mod config;
pub mod convert;
pub mod credentials;
pub mod discovery;
pub mod error;
pub mod events;
pub mod gateway;
pub mod model;
pub mod reconcile;
pub mod retry;
pub mod source;
pub mod throttle;

// ── Primary re-exports ──────────────────────────────────────────────
pub use config::{ClientSettings, DiscoverySettings};
pub use credentials::{CredentialRepository, MemoryCredentialStore};
pub use discovery::{Discovery, DiscoveryStrategy, ResultSink};
pub use error::CoreError;
pub use events::{DomainEvent, apply_event};
pub use gateway::{
    BatchItem, BatchOutcome, BlinkOutcome, GatewayClient, ensure_supported_version,
};
pub use reconcile::{Reconciler, SerialMatch, SerialMatchSource, reconcile};
pub use retry::RetryPolicy;
pub use source::{LegacySource, LightSource, ModernSource};
pub use throttle::Throttle;

pub use model::{Bridge, DeviceMapping, DiscoverySource, Light, LightColor, MatchRule, Protocol, Reachability};

// Wire-level types callers need to build requests.
pub use lumigate_api::modern::types::{LightUpdate, ResourceFamily, ResourceKind};
pub use lumigate_api::{Credentials, StreamEvent};
