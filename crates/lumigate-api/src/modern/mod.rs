// Resource protocol client
//
// Opaque-id REST surface under `/clip/v2/resource/`, reached over the
// secured channel.

pub mod client;
pub mod types;

pub use client::ModernClient;
