use std::time::Duration;

use dsync_common::{env_value_or_default, Secret};
use log::*;

pub const DEFAULT_COURIER_TIMEOUT_SECS: u64 = 5;

#[derive(Debug, Clone)]
pub struct CourierConfig {
    /// The root of the courier's REST API, e.g. `https://api.courier.example/v2`. No trailing slash.
    pub base_url: String,
    pub api_key: Secret<String>,
    /// Applied to every request made by [`crate::CourierApi`].
    pub timeout: Duration,
}

impl Default for CourierConfig {
    fn default() -> Self {
        Self {
            base_url: "https://courier.example.com/api/v2".to_string(),
            api_key: Secret::default(),
            timeout: Duration::from_secs(DEFAULT_COURIER_TIMEOUT_SECS),
        }
    }
}

impl CourierConfig {
    pub fn new_from_env_or_default() -> Self {
        let base_url = std::env::var("DSYNC_COURIER_BASE_URL")
            .map(|s| s.trim_end_matches('/').to_string())
            .unwrap_or_else(|_| {
                warn!("🛵️ DSYNC_COURIER_BASE_URL not set, using (probably useless) default");
                CourierConfig::default().base_url
            });
        let api_key = Secret::new(std::env::var("DSYNC_COURIER_API_KEY").unwrap_or_else(|_| {
            warn!("🛵️ DSYNC_COURIER_API_KEY not set, using (probably useless) default");
            "00000000000000".to_string()
        }));
        let secs = env_value_or_default("DSYNC_COURIER_TIMEOUT_SECS", DEFAULT_COURIER_TIMEOUT_SECS);
        Self { base_url, api_key, timeout: Duration::from_secs(secs) }
    }
}
