// Pairing
//
// Unauthenticated POST that exchanges a physical link-button press for a
// capability token. Until the button is pressed the bridge answers with
// error type 101, which surfaces as `Error::PairingNotConfirmed` so
// callers can keep polling.

use serde::Serialize;
use tracing::{debug, info};

use crate::auth::Credentials;
use crate::error::Error;
use crate::legacy::models::{LegacyResult, PairingSuccess};
use crate::session::Session;

/// The bridge rejects device types longer than this.
const MAX_DEVICE_TYPE_LEN: usize = 40;

#[derive(Serialize)]
struct PairingRequest<'a> {
    devicetype: &'a str,
    generateclientkey: bool,
}

impl Session {
    /// Request a capability token for `app_id` (`"app#instance"`).
    ///
    /// One attempt; no retries. `PairingNotConfirmed` means "press the
    /// button and call again".
    pub async fn pair(&self, app_id: &str) -> Result<Credentials, Error> {
        let device_type = device_type(app_id)?;
        let url = self.secure_url("api")?;
        debug!(device_type, "POST {url}");

        let resp = self
            .secure()
            .post(url)
            .timeout(self.request_timeout())
            .json(&PairingRequest {
                devicetype: device_type,
                generateclientkey: true,
            })
            .send()
            .await?;

        let status = resp.status();
        let body = resp.text().await?;
        if !status.is_success() {
            return Err(Error::from_status(status, &body));
        }

        let items: Vec<LegacyResult<PairingSuccess>> =
            serde_json::from_str(&body).map_err(|e| Error::decode(&e, body.clone()))?;

        match items.into_iter().next() {
            Some(LegacyResult::Success(success)) => {
                info!("pairing confirmed");
                let mut credentials = Credentials::new(success.username);
                if let Some(key) = success.clientkey {
                    credentials = credentials.with_client_key(key);
                }
                Ok(credentials)
            }
            Some(LegacyResult::Error(err)) => Err(Error::from_legacy(err.kind, err.description)),
            None => Err(Error::InvalidServerResponse(
                "empty pairing response".into(),
            )),
        }
    }
}

fn device_type(app_id: &str) -> Result<&str, Error> {
    let trimmed = app_id.trim();
    if trimmed.is_empty() {
        return Err(Error::Unknown("application id must not be empty".into()));
    }
    let end = trimmed
        .char_indices()
        .nth(MAX_DEVICE_TYPE_LEN)
        .map_or(trimmed.len(), |(idx, _)| idx);
    Ok(&trimmed[..end])
}
