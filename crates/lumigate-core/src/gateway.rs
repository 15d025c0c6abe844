// ── Authenticated gateway client ──
//
// Facade over one bridge: pairing, CRUD across the five resource
// families, throttled mutations, retried idempotent calls, blink, and
// the legacy-only operations (touchlink, serial search) the reconciler
// builds on.

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use lumigate_api::modern::types::{
    LightResource, LightUpdate, Resource, ResourceFamily, ResourceKind, ResourceRef,
};
use lumigate_api::stream::EventStream;
use lumigate_api::{BridgeValidator, Credentials, LegacyClient, ModernClient, Session};

use crate::config::{ClientSettings, MIN_API_VERSION};
use crate::credentials::CredentialRepository;
use crate::error::CoreError;
use crate::model::{Bridge, Light};
use crate::retry::RetryPolicy;
use crate::throttle::Throttle;

// ── Outcomes ─────────────────────────────────────────────────────────

/// Result of a blink once the original state has been read.
///
/// `transient_error` is set when the flash itself was rejected;
/// `restore_error` when putting the light back failed. Both can be set.
#[derive(Debug)]
pub struct BlinkOutcome {
    pub light_id: String,
    pub transient_error: Option<CoreError>,
    pub restore_error: Option<CoreError>,
}

impl BlinkOutcome {
    pub fn flashed(&self) -> bool {
        self.transient_error.is_none()
    }

    pub fn restored(&self) -> bool {
        self.restore_error.is_none()
    }
}

/// One entry in a batched update.
#[derive(Debug, Clone, Serialize)]
pub struct BatchItem {
    pub kind: ResourceKind,
    pub id: String,
    pub body: serde_json::Value,
}

#[derive(Debug, Default)]
pub struct BatchOutcome {
    pub applied: Vec<String>,
    pub failed: Vec<(String, CoreError)>,
}

impl BatchOutcome {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

// ── GatewayClient ────────────────────────────────────────────────────

/// Authenticated, rate-limited client for one bridge.
///
/// Throttles are per instance: two clients for the same bridge do not
/// coordinate.
pub struct GatewayClient {
    bridge: Bridge,
    session: Session,
    settings: ClientSettings,
    repository: Arc<dyn CredentialRepository>,
    credentials: RwLock<Option<Credentials>>,
    resource_throttle: Throttle,
    group_throttle: Throttle,
    retry: RetryPolicy,
}

impl GatewayClient {
    /// Open both channels to `bridge` and load any stored credentials.
    pub fn connect(
        bridge: Bridge,
        settings: ClientSettings,
        repository: Arc<dyn CredentialRepository>,
    ) -> Result<Self, CoreError> {
        let transport = settings.transport();
        let evaluator = transport.trust_evaluator()?;
        let session = Session::open(&bridge.address, bridge.port, &transport, evaluator)?;
        Self::with_session(bridge, session, settings, repository)
    }

    /// Build on an existing session.
    pub fn with_session(
        bridge: Bridge,
        session: Session,
        settings: ClientSettings,
        repository: Arc<dyn CredentialRepository>,
    ) -> Result<Self, CoreError> {
        let stored = repository.get(&bridge.id)?;
        debug!(bridge = %bridge.id, paired = stored.is_some(), "gateway client ready");

        Ok(Self {
            resource_throttle: Throttle::new("resource", settings.resource_interval),
            group_throttle: Throttle::new("group", settings.group_interval),
            retry: RetryPolicy::new(settings.retry_attempts, settings.retry_base_delay),
            credentials: RwLock::new(stored),
            bridge,
            session,
            settings,
            repository,
        })
    }

    pub fn bridge(&self) -> &Bridge {
        &self.bridge
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn settings(&self) -> &ClientSettings {
        &self.settings
    }

    pub async fn is_paired(&self) -> bool {
        self.credentials.read().await.is_some()
    }

    /// The current credentials, or `NotAuthenticated` without touching
    /// the network.
    pub async fn credentials(&self) -> Result<Credentials, CoreError> {
        self.credentials
            .read()
            .await
            .clone()
            .ok_or_else(|| CoreError::NotAuthenticated {
                bridge_id: self.bridge.id.clone(),
            })
    }

    pub async fn legacy(&self) -> Result<LegacyClient, CoreError> {
        let creds = self.credentials().await?;
        Ok(LegacyClient::new(self.session.clone(), creds.token))
    }

    pub async fn modern(&self) -> Result<ModernClient, CoreError> {
        let creds = self.credentials().await?;
        Ok(ModernClient::new(self.session.clone(), creds.token))
    }

    // ── Pairing ──────────────────────────────────────────────────────

    /// One pairing attempt. On success the credentials are stored in the
    /// repository and used for every later call.
    pub async fn pair(&self, app_id: &str) -> Result<Credentials, CoreError> {
        let creds = self.session.pair(app_id).await?;
        self.repository.set(&self.bridge.id, &creds)?;
        *self.credentials.write().await = Some(creds.clone());
        info!(bridge = %self.bridge.id, "paired");
        Ok(creds)
    }

    /// Retry [`pair`](Self::pair) every `pairing_poll_interval` while the
    /// link button has not been pressed. Only `cancel` stops the loop.
    pub async fn pair_until_confirmed(
        &self,
        app_id: &str,
        cancel: &CancellationToken,
    ) -> Result<Credentials, CoreError> {
        let interval = self.settings.pairing_poll_interval;
        let mut attempts: u32 = 0;

        loop {
            if cancel.is_cancelled() {
                return Err(CoreError::Cancelled);
            }
            attempts += 1;

            match self.pair(app_id).await {
                Err(CoreError::PairingNotConfirmed) => {
                    debug!(attempts, "link button not pressed yet");
                }
                other => return other,
            }

            tokio::select! {
                () = cancel.cancelled() => return Err(CoreError::Cancelled),
                () = tokio::time::sleep(interval) => {}
            }
        }
    }

    /// Drop stored credentials for this bridge.
    pub async fn forget(&self) -> Result<(), CoreError> {
        self.repository.delete(&self.bridge.id)?;
        *self.credentials.write().await = None;
        info!(bridge = %self.bridge.id, "credentials removed");
        Ok(())
    }

    /// Read the bridge's API version and fail if it predates
    /// [`MIN_API_VERSION`]. Unauthenticated.
    pub async fn check_firmware(&self) -> Result<String, CoreError> {
        let validator =
            BridgeValidator::new(self.session.plain().clone(), self.settings.request_timeout);
        let status = validator
            .fetch_status(&self.bridge.address, self.bridge.port)
            .await?;

        ensure_supported_version(status.apiversion)
    }

    // ── Throttle selection ───────────────────────────────────────────

    fn throttle_for(&self, kind: ResourceKind) -> &Throttle {
        if kind.family().is_some_and(ResourceFamily::is_bulk) {
            &self.group_throttle
        } else {
            &self.resource_throttle
        }
    }

    // ── Lights ───────────────────────────────────────────────────────

    /// Modern lights in canonical form. Reachability is `Unknown` until
    /// the reconciler overlays it.
    pub async fn list_lights(&self) -> Result<Vec<Light>, CoreError> {
        let modern = self.modern().await?;
        let client = &modern;
        let lights = self
            .retry
            .run("list lights", move || client.list_lights())
            .await?;
        Ok(lights.iter().map(Light::from).collect())
    }

    pub async fn get_light(&self, id: &str) -> Result<LightResource, CoreError> {
        let modern = self.modern().await?;
        let client = &modern;
        Ok(self
            .retry
            .run("get light", move || client.get_light(id))
            .await?)
    }

    pub async fn update_light(&self, id: &str, update: &LightUpdate) -> Result<(), CoreError> {
        if update.is_empty() {
            return Err(CoreError::ValidationFailed {
                message: "light update has no fields set".into(),
            });
        }
        let modern = self.modern().await?;
        let client = &modern;
        let throttle = &self.resource_throttle;
        self.retry
            .run("update light", move || async move {
                throttle.acquire().await;
                client.update_light(id, update).await
            })
            .await?;
        Ok(())
    }

    // ── Generic CRUD ─────────────────────────────────────────────────

    /// Every resource in `family`, across all its kinds.
    pub async fn list(&self, family: ResourceFamily) -> Result<Vec<Resource>, CoreError> {
        let modern = self.modern().await?;
        let client = &modern;
        let mut all = Vec::new();
        for &kind in family.kinds() {
            let batch: Vec<Resource> = self
                .retry
                .run("list resources", move || client.list(kind))
                .await?;
            all.extend(batch);
        }
        Ok(all)
    }

    pub async fn get(&self, kind: ResourceKind, id: &str) -> Result<Resource, CoreError> {
        let modern = self.modern().await?;
        let client = &modern;
        Ok(self
            .retry
            .run("get resource", move || client.get(kind, id))
            .await?)
    }

    /// POST; never retried.
    pub async fn create<B: Serialize + Sync>(
        &self,
        kind: ResourceKind,
        body: &B,
    ) -> Result<ResourceRef, CoreError> {
        let modern = self.modern().await?;
        self.throttle_for(kind).acquire().await;
        Ok(modern.create(kind, body).await?)
    }

    pub async fn update<B: Serialize + Sync>(
        &self,
        kind: ResourceKind,
        id: &str,
        body: &B,
    ) -> Result<Vec<ResourceRef>, CoreError> {
        let modern = self.modern().await?;
        let client = &modern;
        let throttle = self.throttle_for(kind);
        Ok(self
            .retry
            .run("update resource", move || async move {
                throttle.acquire().await;
                client.update(kind, id, body).await
            })
            .await?)
    }

    /// DELETE; never retried.
    pub async fn delete(&self, kind: ResourceKind, id: &str) -> Result<(), CoreError> {
        let modern = self.modern().await?;
        self.throttle_for(kind).acquire().await;
        Ok(modern.delete(kind, id).await?)
    }

    /// Apply several updates in order.
    ///
    /// Every dispatch, retries included, takes a slot on the throttle for
    /// its item's kind, so group items stay a full group interval apart.
    /// A failed item does not stop the rest.
    pub async fn batch_update(&self, items: &[BatchItem]) -> Result<BatchOutcome, CoreError> {
        let modern = self.modern().await?;
        let client = &modern;

        let mut outcome = BatchOutcome::default();
        for item in items {
            let (kind, id, body) = (item.kind, item.id.as_str(), &item.body);
            let throttle = self.throttle_for(kind);
            match self
                .retry
                .run("batch update", move || async move {
                    throttle.acquire().await;
                    client.update(kind, id, body).await
                })
                .await
            {
                Ok(_) => outcome.applied.push(item.id.clone()),
                Err(e) => {
                    warn!(id = %item.id, error = %e, "batch item failed");
                    outcome.failed.push((item.id.clone(), e.into()));
                }
            }
        }
        Ok(outcome)
    }

    // ── Composite operations ─────────────────────────────────────────

    /// Flash a light: read its state, flip it, wait, put it back.
    ///
    /// A failed read aborts before anything is changed. Once the
    /// transient state has been sent, restoration is always attempted and
    /// its failure is reported in the outcome.
    pub async fn blink(&self, id: &str) -> Result<BlinkOutcome, CoreError> {
        let original = self.get_light(id).await?;
        let restore = LightUpdate::restoring(&original);

        let transient = if original.on.on {
            LightUpdate::new().on(false)
        } else {
            LightUpdate::new().on(true).brightness(100.0)
        };

        let transient_error = self.update_light(id, &transient).await.err();
        match &transient_error {
            // The bridge may have applied part of it.
            Some(e) => warn!(id, error = %e, "blink state rejected"),
            None => tokio::time::sleep(self.settings.blink_interval).await,
        }

        let restore_error = self.update_light(id, &restore).await.err();
        if let Some(e) = &restore_error {
            warn!(id, error = %e, "failed to restore light after blink");
        }
        Ok(BlinkOutcome {
            light_id: id.to_owned(),
            transient_error,
            restore_error,
        })
    }

    /// Proximity pairing: the bridge looks for lights held close to it.
    pub async fn touchlink(&self) -> Result<(), CoreError> {
        let legacy = self.legacy().await?;
        let client = &legacy;
        let throttle = &self.group_throttle;
        self.retry
            .run("touchlink", move || async move {
                throttle.acquire().await;
                client.start_touchlink().await
            })
            .await?;
        info!(bridge = %self.bridge.id, "touchlink started");
        Ok(())
    }

    /// Subscribe to the bridge's event stream. No reconnection.
    pub async fn event_stream(&self) -> Result<EventStream, CoreError> {
        let creds = self.credentials().await?;
        Ok(EventStream::open(&self.session, &creds.token).await?)
    }
}

// ── Version comparison ───────────────────────────────────────────────

fn version_parts(version: &str) -> Vec<u32> {
    version
        .split('.')
        .map(|part| {
            part.chars()
                .take_while(char::is_ascii_digit)
                .collect::<String>()
                .parse()
                .unwrap_or(0)
        })
        .collect()
}

/// Accept `found` if it is at least [`MIN_API_VERSION`]. A missing
/// version is treated as too old.
pub fn ensure_supported_version(found: Option<String>) -> Result<String, CoreError> {
    let found = found.unwrap_or_default();
    if found.is_empty() || version_lt(&found, MIN_API_VERSION) {
        return Err(CoreError::FirmwareTooOld {
            found: if found.is_empty() { "unknown".into() } else { found },
            required: MIN_API_VERSION.into(),
        });
    }
    Ok(found)
}

/// Dotted-numeric `a < b`; missing components count as zero.
pub(crate) fn version_lt(a: &str, b: &str) -> bool {
    let (mut a, mut b) = (version_parts(a), version_parts(b));
    let len = a.len().max(b.len());
    a.resize(len, 0);
    b.resize(len, 0);
    a < b
}
