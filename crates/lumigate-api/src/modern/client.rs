// Hand-crafted async HTTP client for the bridge resource protocol.
//
// Base path: /clip/v2/resource/
// Auth: hue-application-key header

use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;
use url::Url;

use super::types::{LightResource, LightUpdate, ResourceEnvelope, ResourceKind, ResourceRef};
use crate::auth::{APPLICATION_KEY_HEADER, token_header};
use crate::error::Error;
use crate::session::Session;

const RESOURCE_PREFIX: &str = "clip/v2/resource";

/// Async client for the modern resource protocol.
///
/// Runs over the session's secured channel; every request carries the
/// capability token and the session's per-request timeout.
pub struct ModernClient {
    session: Session,
    token: SecretString,
}

impl ModernClient {
    pub fn new(session: Session, token: SecretString) -> Self {
        Self { session, token }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    // ── URL builder ──────────────────────────────────────────────────

    fn url(&self, kind: ResourceKind, id: Option<&str>) -> Result<Url, Error> {
        match id {
            Some(id) => self.session.secure_url(&format!("{RESOURCE_PREFIX}/{kind}/{id}")),
            None => self.session.secure_url(&format!("{RESOURCE_PREFIX}/{kind}")),
        }
    }

    fn authorize(&self, builder: reqwest::RequestBuilder) -> Result<reqwest::RequestBuilder, Error> {
        if self.token.expose_secret().is_empty() {
            return Err(Error::NotAuthenticated);
        }
        Ok(builder
            .header(APPLICATION_KEY_HEADER, token_header(&self.token)?)
            .timeout(self.session.request_timeout()))
    }

    // ── HTTP verbs ───────────────────────────────────────────────────

    async fn get_data<T: DeserializeOwned>(&self, url: Url) -> Result<Vec<T>, Error> {
        debug!("GET {url}");
        let builder = self.authorize(self.session.secure().get(url))?;
        let resp = builder.send().await?;
        handle_envelope(resp).await
    }

    async fn send_body<B: Serialize + Sync>(
        &self,
        method: reqwest::Method,
        url: Url,
        body: &B,
    ) -> Result<Vec<ResourceRef>, Error> {
        debug!("{method} {url}");
        let builder = self.authorize(self.session.secure().request(method, url).json(body))?;
        let resp = builder.send().await?;
        handle_envelope(resp).await
    }

    // ━━ Public API ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

    /// `GET /resource/{kind}`
    pub async fn list<T: DeserializeOwned>(&self, kind: ResourceKind) -> Result<Vec<T>, Error> {
        self.get_data(self.url(kind, None)?).await
    }

    /// `GET /resource/{kind}/{id}`
    pub async fn get<T: DeserializeOwned>(&self, kind: ResourceKind, id: &str) -> Result<T, Error> {
        self.get_data(self.url(kind, Some(id))?)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| Error::NotFound {
                resource: format!("{kind}/{id}"),
            })
    }

    /// `POST /resource/{kind}`, returning the new resource's reference.
    pub async fn create<B: Serialize + Sync>(
        &self,
        kind: ResourceKind,
        body: &B,
    ) -> Result<ResourceRef, Error> {
        self.send_body(reqwest::Method::POST, self.url(kind, None)?, body)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| Error::InvalidServerResponse(format!("create {kind} returned no id")))
    }

    /// `PUT /resource/{kind}/{id}`
    pub async fn update<B: Serialize + Sync>(
        &self,
        kind: ResourceKind,
        id: &str,
        body: &B,
    ) -> Result<Vec<ResourceRef>, Error> {
        self.send_body(reqwest::Method::PUT, self.url(kind, Some(id))?, body)
            .await
    }

    /// `DELETE /resource/{kind}/{id}`
    pub async fn delete(&self, kind: ResourceKind, id: &str) -> Result<(), Error> {
        let url = self.url(kind, Some(id))?;
        debug!("DELETE {url}");
        let builder = self.authorize(self.session.secure().delete(url))?;
        let resp = builder.send().await?;
        let _: Vec<ResourceRef> = handle_envelope(resp).await?;
        Ok(())
    }

    // ── Lights ───────────────────────────────────────────────────────

    pub async fn list_lights(&self) -> Result<Vec<LightResource>, Error> {
        self.list(ResourceKind::Light).await
    }

    pub async fn get_light(&self, id: &str) -> Result<LightResource, Error> {
        self.get(ResourceKind::Light, id).await
    }

    pub async fn update_light(&self, id: &str, update: &LightUpdate) -> Result<(), Error> {
        self.update(ResourceKind::Light, id, update).await?;
        Ok(())
    }
}

// ── Response handling ────────────────────────────────────────────────

async fn handle_envelope<T: DeserializeOwned>(resp: reqwest::Response) -> Result<Vec<T>, Error> {
    let status = resp.status();
    let body = resp.text().await?;

    if !status.is_success() {
        return Err(Error::from_status(status, &body));
    }

    let envelope: ResourceEnvelope<T> =
        serde_json::from_str(&body).map_err(|e| Error::decode(&e, body.clone()))?;

    // 207 and friends: partial failure with nothing applied.
    if envelope.data.is_empty() {
        if let Some(first) = envelope.errors.into_iter().next() {
            return Err(Error::from_description(status.as_u16(), first.description));
        }
    }

    Ok(envelope.data)
}
