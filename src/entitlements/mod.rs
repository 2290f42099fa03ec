//! License validation and feature gating.

mod cache;
mod error;
mod features;
mod online;
mod refresh;
mod service;
mod token;

use std::fmt;

use serde::Serialize;
use time::OffsetDateTime;

pub use cache::ResultCache;
pub use error::{Denial, LicenseError};
pub use features::FeatureType;
pub use online::{OnlineConfig, OnlineValidator};
pub(crate) use online::RemoteValidator;
pub use refresh::spawn_refresh;
pub use service::EntitlementService;
pub(crate) use token::TokenVerdict;
pub use token::{TokenVerifier, VENDOR_PUBLIC_KEY};

#[cfg(test)]
pub(crate) use service::tests as testing;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PlanType {
    #[default]
    Unspecified,
    Free,
    Pro,
}

impl PlanType {
    /// Parses a plan name as issued by the vendor. `UNSPECIFIED` is not a plan.
    pub fn parse(name: &str) -> Option<Self> {
        match name.to_ascii_uppercase().as_str() {
            "FREE" => Some(PlanType::Free),
            "PRO" => Some(PlanType::Pro),
            _ => None,
        }
    }

    pub fn normalized(self) -> Self {
        match self {
            PlanType::Unspecified => PlanType::Free,
            other => other,
        }
    }

    /// Column of the feature matrix for this plan.
    pub fn tier_index(self) -> usize {
        match self.normalized() {
            PlanType::Pro => 1,
            _ => 0,
        }
    }
}

impl fmt::Display for PlanType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PlanType::Unspecified => "UNSPECIFIED",
            PlanType::Free => "FREE",
            PlanType::Pro => "PRO",
        };
        f.write_str(name)
    }
}

/// The outcome of a validation, and the shape of the current subscription.
/// `expires_at == None` means the entitlement does not expire.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Subscription {
    pub plan: PlanType,
    pub expires_at: Option<OffsetDateTime>,
}

impl Subscription {
    pub fn free() -> Self {
        Self { plan: PlanType::Free, expires_at: None }
    }

    pub fn new(plan: PlanType, expires_at: Option<OffsetDateTime>) -> Self {
        Self { plan, expires_at }
    }

    pub fn normalized(self) -> Self {
        Self { plan: self.plan.normalized(), ..self }
    }
}

impl Default for Subscription {
    fn default() -> Self {
        Self::free()
    }
}

/// Loggable form of a license key.
pub(crate) fn redact(key: &str) -> String {
    let prefix: String = key.chars().take(4).collect();
    format!("{prefix}…({} chars)", key.chars().count())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plan_ordering_and_parsing() {
        assert!(PlanType::Free < PlanType::Pro);
        assert_eq!(PlanType::parse("pro"), Some(PlanType::Pro));
        assert_eq!(PlanType::parse("FREE"), Some(PlanType::Free));
        assert_eq!(PlanType::parse("UNSPECIFIED"), None);
        assert_eq!(PlanType::parse("ENTERPRISE"), None);
    }

    #[test]
    fn unspecified_normalizes_to_free() {
        let sub = Subscription::new(PlanType::Unspecified, None).normalized();
        assert_eq!(sub, Subscription::free());
        assert_eq!(PlanType::Unspecified.tier_index(), 0);
    }

    #[test]
    fn redact_keeps_only_a_prefix() {
        let shown = redact("ABCD-1234-SECRET");
        assert!(shown.starts_with("ABCD"));
        assert!(!shown.contains("SECRET"));
    }
}
