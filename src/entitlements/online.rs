//! License resolution against the vendor's commerce API.

use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

use super::{redact, Denial, LicenseError, PlanType, Subscription};

const VERIFY_PATH: &str = "/v2/licenses/verify";

/// Resolves license keys that are not vendor-signed tokens.
#[async_trait]
pub trait RemoteValidator: Send + Sync {
    /// `instance_name` is sent on activation so the vendor can track seats.
    async fn validate(
        &self,
        license_key: &str,
        instance_name: Option<&str>,
    ) -> Result<Subscription, LicenseError>;
}

#[derive(Serialize)]
struct VerifyRequest<'a> {
    product_id: &'a str,
    license_key: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    instance_name: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
struct VerifyResponse {
    #[serde(alias = "valid")]
    success: bool,
    #[serde(default)]
    uses: Option<i64>,
    #[serde(default)]
    purchase: Option<PurchaseRecord>,
    #[serde(default, alias = "error")]
    message: Option<String>,
    #[serde(default)]
    meta: Option<LicenseMeta>,
}

#[derive(Debug, Deserialize)]
struct LicenseMeta {
    #[serde(default)]
    store_id: Option<serde_json::Value>,
    #[serde(default)]
    product_id: Option<serde_json::Value>,
}

/// The vendor's view of a purchase. Only used to decide entitlement.
#[derive(Debug, Default, Deserialize)]
struct PurchaseRecord {
    #[serde(default)]
    refunded: bool,
    #[serde(default)]
    disputed: bool,
    #[serde(default)]
    dispute_won: bool,
    #[serde(default)]
    chargebacked: bool,
    #[serde(default)]
    subscription_ended_at: Option<String>,
    #[serde(default)]
    subscription_cancelled_at: Option<String>,
    #[serde(default)]
    subscription_failed_at: Option<String>,
    #[serde(default)]
    subscription_expires_at: Option<String>,
}

impl PurchaseRecord {
    fn denial(&self) -> Option<Denial> {
        if self.refunded {
            return Some(Denial::Refunded);
        }
        if self.chargebacked {
            return Some(Denial::Chargebacked);
        }
        if self.disputed && !self.dispute_won {
            return Some(Denial::Disputed);
        }
        if self.subscription_ended_at.as_deref().is_some_and(|s| !s.is_empty()) {
            return Some(Denial::SubscriptionEnded);
        }
        if self.subscription_cancelled_at.is_some() {
            return Some(Denial::SubscriptionCancelled);
        }
        if self.subscription_failed_at.is_some() {
            return Some(Denial::SubscriptionFailed);
        }
        None
    }
}

#[derive(Clone, Debug)]
pub struct OnlineConfig {
    pub base_url: String,
    pub product_id: String,
    pub store_id: String,
    pub timeout: Duration,
}

pub struct OnlineValidator {
    client: reqwest::Client,
    endpoint: String,
    product_id: String,
    store_id: String,
}

impl OnlineValidator {
    pub fn new(cfg: OnlineConfig) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(cfg.timeout)
            .build()
            .context("building license http client")?;
        Ok(Self {
            client,
            endpoint: format!("{}{}", cfg.base_url.trim_end_matches('/'), VERIFY_PATH),
            product_id: cfg.product_id,
            store_id: cfg.store_id,
        })
    }

    fn check(&self, resp: VerifyResponse) -> Result<Subscription, LicenseError> {
        if let Some(message) = resp.message.filter(|m| !m.trim().is_empty()) {
            return Err(Denial::Rejected(message).into());
        }
        if !resp.success {
            return Err(Denial::NotValid.into());
        }
        if let Some(meta) = &resp.meta {
            let store_ok = id_matches(meta.store_id.as_ref(), &self.store_id);
            let product_ok = id_matches(meta.product_id.as_ref(), &self.product_id);
            if !store_ok || !product_ok {
                return Err(Denial::WrongProduct.into());
            }
        }

        let Some(purchase) = resp.purchase else {
            return Ok(Subscription::new(PlanType::Pro, None));
        };
        if let Some(denial) = purchase.denial() {
            return Err(denial.into());
        }
        let expires_at = match purchase.subscription_expires_at.as_deref() {
            None | Some("") => None,
            Some(raw) => Some(
                OffsetDateTime::parse(raw, &Rfc3339)
                    .map_err(|e| LicenseError::Decode(format!("subscription expiry {raw:?}: {e}")))?,
            ),
        };
        if expires_at.is_some_and(|at| at <= OffsetDateTime::now_utc()) {
            return Err(Denial::SubscriptionExpired.into());
        }
        Ok(Subscription::new(PlanType::Pro, expires_at))
    }
}

fn id_matches(found: Option<&serde_json::Value>, expected: &str) -> bool {
    match found {
        Some(serde_json::Value::String(s)) => s == expected,
        Some(serde_json::Value::Number(n)) => n.to_string() == expected,
        _ => false,
    }
}

#[async_trait]
impl RemoteValidator for OnlineValidator {
    async fn validate(
        &self,
        license_key: &str,
        instance_name: Option<&str>,
    ) -> Result<Subscription, LicenseError> {
        tracing::debug!(key = %redact(license_key), endpoint = %self.endpoint, "verifying license online");
        let body = VerifyRequest {
            product_id: &self.product_id,
            license_key,
            instance_name,
        };
        let resp = self
            .client
            .post(&self.endpoint)
            .json(&body)
            .send()
            .await
            .map_err(|e| LicenseError::Transport(e.to_string()))?;

        let status = resp.status();
        if status.is_server_error() {
            return Err(LicenseError::Transport(format!("license service returned {status}")));
        }
        let raw = resp
            .bytes()
            .await
            .map_err(|e| LicenseError::Transport(e.to_string()))?;
        let parsed: VerifyResponse = match serde_json::from_slice(&raw) {
            Ok(parsed) => parsed,
            Err(_) if !status.is_success() => {
                return Err(LicenseError::Transport(format!("license service returned {status}")))
            }
            Err(e) => return Err(LicenseError::Decode(e.to_string())),
        };
        tracing::debug!(success = parsed.success, uses = ?parsed.uses, "license service answered");
        self.check(parsed)
    }
}
