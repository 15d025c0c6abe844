// Legacy API light endpoints
//
// Listing and per-light state. The legacy protocol is the only source of
// the `reachable` flag, which the reconciler overlays onto modern records.

use indexmap::IndexMap;
use tracing::debug;

use crate::error::Error;
use crate::legacy::client::LegacyClient;
use crate::legacy::models::{LegacyLight, LegacyStateUpdate};

impl LegacyClient {
    /// List every light, keyed by numeric id in bridge order.
    ///
    /// `GET /api/{token}/lights`
    pub async fn list_lights(&self) -> Result<IndexMap<String, LegacyLight>, Error> {
        debug!("listing legacy lights");
        self.get("lights").await
    }

    /// `GET /api/{token}/lights/{id}`
    pub async fn get_light(&self, id: &str) -> Result<LegacyLight, Error> {
        self.get(&format!("lights/{id}")).await
    }

    /// `PUT /api/{token}/lights/{id}/state`
    pub async fn set_light_state(&self, id: &str, update: &LegacyStateUpdate) -> Result<(), Error> {
        debug!(id, "setting legacy light state");
        self.put(&format!("lights/{id}/state"), update).await?;
        Ok(())
    }
}
