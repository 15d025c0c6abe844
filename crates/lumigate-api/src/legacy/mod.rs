// Legacy API client modules
//
// Hand-written client for the bridge's numeric-id protocol: per-light
// state, the new-device scan, and proximity (touchlink) pairing. All
// paths are scoped under `/api/{token}/`.

pub mod client;
pub mod lights;
pub mod models;
pub mod search;

pub use client::LegacyClient;
