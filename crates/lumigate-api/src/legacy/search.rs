// Legacy API device search
//
// Serial-targeted search, the new-device scan status, and touchlink.
// Used by the reconciler's add-by-serial flow.

use serde_json::json;
use tracing::debug;

use crate::error::Error;
use crate::legacy::client::LegacyClient;
use crate::legacy::models::NewLightsScan;

impl LegacyClient {
    /// Start a search, optionally targeting specific 6-character serials.
    ///
    /// `POST /api/{token}/lights` with `{"deviceid": [...]}`
    pub async fn search_lights(&self, serials: &[String]) -> Result<(), Error> {
        debug!(?serials, "starting legacy light search");
        let body = if serials.is_empty() {
            json!({})
        } else {
            json!({ "deviceid": serials })
        };
        self.post("lights", &body).await?;
        Ok(())
    }

    /// `GET /api/{token}/lights/new`
    pub async fn new_lights(&self) -> Result<NewLightsScan, Error> {
        self.get("lights/new").await
    }

    /// Trigger proximity pairing with lights held close to the bridge.
    ///
    /// `PUT /api/{token}/config` with `{"touchlink": true}`
    pub async fn start_touchlink(&self) -> Result<(), Error> {
        debug!("triggering touchlink");
        self.put("config", &json!({ "touchlink": true })).await?;
        Ok(())
    }
}
