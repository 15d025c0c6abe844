// lumigate-api: Async Rust client for local smart-lighting gateways (legacy + resource protocol)

pub mod auth;
pub mod error;
pub mod legacy;
pub mod modern;
pub mod pairing;
pub mod session;
pub mod stream;
pub mod transport;
pub mod trust;
pub mod validator;

pub use auth::{APPLICATION_KEY_HEADER, Credentials};
pub use error::Error;
pub use legacy::LegacyClient;
pub use modern::ModernClient;
pub use session::Session;
pub use stream::{EventStream, EventStreamParser, StreamEvent};
pub use transport::TransportConfig;
pub use trust::{GatewayTrust, TrustDecision, TrustEvaluator};
pub use validator::{BridgeIdentity, BridgeStatus, BridgeValidator};
