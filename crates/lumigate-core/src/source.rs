// ── Light sources ──
//
// The two protocol clients behind one normalized interface. Neither
// adapter knows about the other; cross-referencing happens only in the
// reconciler.

use std::future::Future;

use lumigate_api::{LegacyClient, ModernClient};

use crate::convert::light_from_legacy;
use crate::error::CoreError;
use crate::model::{Light, Protocol};

/// Something that can list the bridge's lights in canonical form.
pub trait LightSource {
    fn protocol(&self) -> Protocol;

    fn fetch_lights(&self) -> impl Future<Output = Result<Vec<Light>, CoreError>> + Send;
}

/// Numeric-id protocol. The only source of the `reachable` flag.
pub struct LegacySource<'a> {
    client: &'a LegacyClient,
}

impl<'a> LegacySource<'a> {
    pub fn new(client: &'a LegacyClient) -> Self {
        Self { client }
    }
}

impl LightSource for LegacySource<'_> {
    fn protocol(&self) -> Protocol {
        Protocol::Legacy
    }

    async fn fetch_lights(&self) -> Result<Vec<Light>, CoreError> {
        let lights = self.client.list_lights().await?;
        Ok(lights
            .iter()
            .map(|(id, light)| light_from_legacy(id, light))
            .collect())
    }
}

/// Opaque-id resource protocol.
pub struct ModernSource<'a> {
    client: &'a ModernClient,
}

impl<'a> ModernSource<'a> {
    pub fn new(client: &'a ModernClient) -> Self {
        Self { client }
    }
}

impl LightSource for ModernSource<'_> {
    fn protocol(&self) -> Protocol {
        Protocol::Modern
    }

    async fn fetch_lights(&self) -> Result<Vec<Light>, CoreError> {
        let lights = self.client.list_lights().await?;
        Ok(lights.iter().map(Light::from).collect())
    }
}
