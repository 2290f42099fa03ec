use std::sync::Arc;

use parking_lot::RwLock;
use time::OffsetDateTime;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::features;
use super::{redact, FeatureType, LicenseError, RemoteValidator, ResultCache, Subscription, TokenVerdict, TokenVerifier};
use crate::settings::{GeneralSetting, SettingsStore, WorkspaceSetting, WorkspaceSettingKey};

/// Owns license validation and the subscription snapshot feature checks read.
pub struct EntitlementService {
    settings: Arc<dyn SettingsStore>,
    verifier: TokenVerifier,
    remote: Arc<dyn RemoteValidator>,
    cache: ResultCache,
    instance_id: String,
    // Swapped whole; readers clone the Arc and never see a half-written value.
    current: RwLock<Arc<Subscription>>,
    // Held by load and update from the settings read until the swap. Readers never take it.
    writer: Mutex<()>,
}

impl EntitlementService {
    pub fn new(
        settings: Arc<dyn SettingsStore>,
        verifier: TokenVerifier,
        remote: Arc<dyn RemoteValidator>,
        cache: ResultCache,
        instance_id: impl Into<String>,
    ) -> Self {
        Self {
            settings,
            verifier,
            remote,
            cache,
            instance_id: instance_id.into(),
            current: RwLock::new(Arc::new(Subscription::free())),
            writer: Mutex::new(()),
        }
    }

    /// The in-process snapshot. Never performs I/O.
    pub fn current(&self) -> Arc<Subscription> {
        self.current.read().clone()
    }

    /// Re-validates the stored license key and refreshes the snapshot.
    ///
    /// A failed validation is returned to the caller but leaves the snapshot
    /// as it was.
    pub async fn load_subscription(&self) -> Result<Subscription, LicenseError> {
        let _writer = self.writer.lock().await;
        let general = self.general_setting().await?;
        let key = general.license_key.trim();
        if key.is_empty() {
            let free = Subscription::free();
            self.replace_current(free.clone());
            return Ok(free);
        }

        let now = OffsetDateTime::now_utc();
        let cached = self
            .cache
            .get(key, &self.instance_id)
            .filter(|hit| hit.expires_at.map_or(true, |at| at > now));
        let sub = match cached {
            Some(hit) => {
                debug!(key = %redact(key), "license cache hit");
                hit
            }
            None => {
                debug!(key = %redact(key), "license cache miss");
                let fresh = self.validate(key, None).await.map_err(|err| {
                    warn!(key = %redact(key), transient = err.is_transient(), error = %err, "license validation failed");
                    err
                })?;
                self.cache.insert(key, &self.instance_id, fresh.clone());
                fresh
            }
        };

        info!(plan = %sub.plan, expires = sub.expires_at.is_some(), "subscription loaded");
        self.replace_current(sub.clone());
        Ok(sub)
    }

    /// Validates and stores a new license key supplied by an operator.
    ///
    /// The cache is not consulted. On any failure the stored key and the
    /// snapshot are left untouched.
    pub async fn update_subscription(&self, license_key: &str) -> Result<Subscription, LicenseError> {
        let key = license_key.trim();
        if key.is_empty() {
            return Err(LicenseError::InvalidInput("license key must not be empty".into()));
        }

        let _writer = self.writer.lock().await;
        let sub = self.validate(key, Some(self.instance_id.as_str())).await?;
        self.cache.insert(key, &self.instance_id, sub.clone());

        let mut general = self.general_setting().await?;
        general.license_key = key.to_string();
        self.settings
            .upsert_workspace_setting(WorkspaceSetting::General(general))
            .await
            .map_err(LicenseError::Settings)?;

        info!(key = %redact(key), plan = %sub.plan, expires = sub.expires_at.is_some(), "subscription updated");
        self.replace_current(sub.clone());
        Ok(sub)
    }

    /// Like [`load_subscription`](Self::load_subscription) but never fails:
    /// any error reads as the free plan.
    pub async fn get_subscription(&self) -> Subscription {
        match self.load_subscription().await {
            Ok(sub) => sub.normalized(),
            Err(err) => {
                warn!(error = %err, transient = err.is_transient(), "serving free plan");
                Subscription::free()
            }
        }
    }

    /// Unknown feature ids are disabled.
    pub fn is_feature_enabled(&self, feature_id: &str) -> bool {
        feature_id
            .parse::<FeatureType>()
            .map(|feature| self.is_enabled(feature))
            .unwrap_or(false)
    }

    pub fn is_enabled(&self, feature: FeatureType) -> bool {
        features::is_enabled(feature, self.current.read().plan)
    }

    async fn validate(&self, key: &str, instance_name: Option<&str>) -> Result<Subscription, LicenseError> {
        let sub = match self.verifier.verify(key) {
            TokenVerdict::Valid(sub) => {
                debug!(key = %redact(key), "license token verified offline");
                sub
            }
            TokenVerdict::Rejected(denial) => return Err(denial.into()),
            TokenVerdict::NotRecognized => {
                let sub = self.remote.validate(key, instance_name).await?;
                debug!(key = %redact(key), "license verified online");
                sub
            }
        };
        Ok(sub.normalized())
    }

    async fn general_setting(&self) -> Result<GeneralSetting, LicenseError> {
        let record = self
            .settings
            .get_workspace_setting(WorkspaceSettingKey::General)
            .await
            .map_err(LicenseError::Settings)?;
        Ok(match record {
            Some(WorkspaceSetting::General(general)) => general,
            None => GeneralSetting::default(),
        })
    }

    fn replace_current(&self, sub: Subscription) {
        *self.current.write() = Arc::new(sub.normalized());
    }
}
