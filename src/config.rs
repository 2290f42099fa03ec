use std::time::Duration;

use anyhow::{anyhow, Context, Result};

use crate::entitlements::VENDOR_PUBLIC_KEY;

const DEFAULT_PRODUCT_ID: &str = "waypoint-pro";
const DEFAULT_STORE_ID: &str = "98761";

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub bind_addr: String,
    pub instance_id: String,
    pub license_api: String,
    pub product_id: String,
    pub store_id: String,
    pub license_public_key: String,
    pub refresh_interval: Duration,
    pub cache_ttl: Duration,
    pub license_timeout: Duration,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let var = |name: &str, default: &str| get(name).unwrap_or_else(|| default.to_string());
        let duration = |name: &str, default: &str| {
            let raw = var(name, default);
            parse_duration(&raw).with_context(|| format!("{name}={raw:?}"))
        };

        let instance_id = var("WAYPOINT_INSTANCE_ID", "waypoint");
        if instance_id.trim().is_empty() {
            return Err(anyhow!("WAYPOINT_INSTANCE_ID must not be empty"));
        }

        Ok(Self {
            bind_addr: var("WAYPOINT_BIND", "0.0.0.0:5231"),
            instance_id,
            license_api: var("WAYPOINT_LICENSE_API", "https://api.gumroad.com"),
            product_id: var("WAYPOINT_PRODUCT_ID", DEFAULT_PRODUCT_ID),
            store_id: var("WAYPOINT_STORE_ID", DEFAULT_STORE_ID),
            license_public_key: var("WAYPOINT_LICENSE_PUBKEY", VENDOR_PUBLIC_KEY),
            refresh_interval: duration("WAYPOINT_REFRESH_INTERVAL", "12h")?,
            cache_ttl: duration("WAYPOINT_CACHE_TTL", "24h")?,
            license_timeout: duration("WAYPOINT_LICENSE_TIMEOUT", "10s")?,
        })
    }
}

fn parse_duration(raw: &str) -> Result<Duration> {
    let parsed = humantime::parse_duration(raw.trim()).context("expected a duration such as 45s, 1h30m or 12 hours")?;
    if parsed.is_zero() {
        return Err(anyhow!("duration must be positive"));
    }
    Ok(parsed)
}
