// Legacy API HTTP client
//
// Wraps the session's plaintext channel with token-scoped URL construction
// and result-item unwrapping. Endpoint groups (lights, search) live in
// separate files as inherent methods to keep this module focused on
// transport mechanics.

use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;
use url::Url;

use crate::error::Error;
use crate::legacy::models::{LegacyErrorBody, LegacyResult};
use crate::session::Session;

/// HTTP client for the bridge's numeric-id (legacy) protocol.
///
/// Every path is scoped under `/api/{token}/`. Failures arrive either as a
/// non-2xx status or, more often, as HTTP 200 with an `{"error": ...}`
/// item; both are mapped to [`Error`] before the caller sees them.
pub struct LegacyClient {
    session: Session,
    token: SecretString,
}

impl LegacyClient {
    pub fn new(session: Session, token: SecretString) -> Self {
        Self { session, token }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    // ── URL builders ─────────────────────────────────────────────────

    /// `{plain_base}api/{token}/{path}`
    pub(crate) fn api_url(&self, path: &str) -> Result<Url, Error> {
        let token = self.token.expose_secret();
        if token.is_empty() {
            return Err(Error::NotAuthenticated);
        }
        self.session
            .plain_url(&format!("api/{token}/{}", path.trim_start_matches('/')))
    }

    // ── Request helpers ──────────────────────────────────────────────

    /// GET and decode a JSON document, surfacing embedded error items.
    pub(crate) async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, Error> {
        let url = self.api_url(path)?;
        debug!("GET {}", redact(&url));

        let resp = self
            .session
            .plain()
            .get(url)
            .timeout(self.session.request_timeout())
            .send()
            .await?;
        let body = read_body(resp).await?;
        reject_error_items(&body)?;

        serde_json::from_str(&body).map_err(|e| Error::decode(&e, body))
    }

    /// PUT a JSON body; every returned item must be a success.
    pub(crate) async fn put(
        &self,
        path: &str,
        body: &(impl Serialize + Sync),
    ) -> Result<Vec<serde_json::Value>, Error> {
        let url = self.api_url(path)?;
        debug!("PUT {}", redact(&url));

        let resp = self
            .session
            .plain()
            .put(url)
            .timeout(self.session.request_timeout())
            .json(body)
            .send()
            .await?;
        parse_results(read_body(resp).await?)
    }

    /// POST a JSON body; every returned item must be a success.
    pub(crate) async fn post(
        &self,
        path: &str,
        body: &(impl Serialize + Sync),
    ) -> Result<Vec<serde_json::Value>, Error> {
        let url = self.api_url(path)?;
        debug!("POST {}", redact(&url));

        let resp = self
            .session
            .plain()
            .post(url)
            .timeout(self.session.request_timeout())
            .json(body)
            .send()
            .await?;
        parse_results(read_body(resp).await?)
    }
}

// ── Response handling ────────────────────────────────────────────────

async fn read_body(resp: reqwest::Response) -> Result<String, Error> {
    let status = resp.status();
    let body = resp.text().await?;
    if status.is_success() {
        Ok(body)
    } else {
        Err(Error::from_status(status, &body))
    }
}

/// If the body is an array whose first item is an error, return it.
fn reject_error_items(body: &str) -> Result<(), Error> {
    #[derive(serde::Deserialize)]
    struct ErrorOnly {
        error: LegacyErrorBody,
    }

    if !body.trim_start().starts_with('[') {
        return Ok(());
    }
    if let Ok(items) = serde_json::from_str::<Vec<ErrorOnly>>(body) {
        if let Some(first) = items.into_iter().next() {
            return Err(Error::from_legacy(first.error.kind, first.error.description));
        }
    }
    Ok(())
}

/// Unwrap `[{"success": ...}, ...]`, failing on the first error item.
pub(crate) fn parse_results(body: String) -> Result<Vec<serde_json::Value>, Error> {
    let items: Vec<LegacyResult<serde_json::Value>> =
        serde_json::from_str(&body).map_err(|e| Error::decode(&e, body.clone()))?;

    let mut successes = Vec::with_capacity(items.len());
    for item in items {
        match item {
            LegacyResult::Success(value) => successes.push(value),
            LegacyResult::Error(err) => return Err(Error::from_legacy(err.kind, err.description)),
        }
    }
    Ok(successes)
}

/// Strip the token out of a URL before logging it.
fn redact(url: &Url) -> String {
    let mut segments: Vec<&str> = url.path().split('/').collect();
    if segments.get(1) == Some(&"api") && segments.len() > 2 {
        segments[2] = "***";
    }
    format!("{}{}", url.origin().ascii_serialization(), segments.join("/"))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn redact_hides_token() {
        let url = Url::parse("http://10.0.0.2/api/secret-token/lights/1").unwrap();
        assert_eq!(redact(&url), "http://10.0.0.2/api/***/lights/1");
    }

    #[test]
    fn error_items_are_rejected() {
        let body = r#"[{"error":{"type":1,"address":"/","description":"unauthorized user"}}]"#;
        assert!(matches!(
            reject_error_items(body),
            Err(Error::PairingRequired { .. })
        ));
        assert!(reject_error_items(r#"{"1": {"name": "x"}}"#).is_ok());
    }

    #[test]
    fn parse_results_fails_on_any_error() {
        let body = r#"[{"success":{"/lights/1/state/on":true}},{"error":{"type":201,"address":"/lights/1/state/bri","description":"device is off"}}]"#;
        assert!(matches!(
            parse_results(body.into()),
            Err(Error::ConflictingResourceState(_))
        ));
    }
}
