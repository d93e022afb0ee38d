use std::{env, net::IpAddr, time::Duration};

use courier_tools::CourierConfig;
use delivery_sync_engine::sweep_objects::{
    SweepConfig,
    TrackBy,
    DEFAULT_SWEEP_CALL_DELAY_MS,
    DEFAULT_SWEEP_MAX_ORDERS,
    DEFAULT_SWEEP_WINDOW_HOURS,
};
use dsync_common::{env_flag, env_value_or_default, Secret};
use log::*;

const DEFAULT_DSYNC_HOST: &str = "127.0.0.1";
const DEFAULT_DSYNC_PORT: u16 = 8470;
const DEFAULT_DATABASE_URL: &str = "sqlite://data/delivery_sync.db";
const DEFAULT_POLL_INTERVAL_SECS: u64 = 60;
const DEFAULT_WEBHOOK_ACK_TIMEOUT_MS: u64 = 2_000;
const MAX_SWEEP_MAX_ORDERS: i64 = 10_000;
const MAX_SWEEP_WINDOW_HOURS: i64 = 24 * 30;

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    /// If true, the X-Forwarded-For header will be used to determine the client's IP address, rather than the
    /// connection's remote address.
    pub use_x_forwarded_for: bool,
    /// If true, the Forwarded header will be used to determine the client's IP address.
    pub use_forwarded: bool,
    /// If supplied, requests against the courier webhook will be checked against a whitelist of courier IP addresses.
    /// To explicitly disable the whitelist, set this to "false", "none", or "0".
    pub courier_whitelist: Option<Vec<IpAddr>>,
    /// How long the webhook waits for its reconciliation to finish before acknowledging the courier anyway.
    pub webhook_ack_timeout: Duration,
    pub sweeper: SweeperConfig,
    pub courier: CourierConfig,
    pub notifier: NotifierConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_DSYNC_HOST.to_string(),
            port: DEFAULT_DSYNC_PORT,
            database_url: DEFAULT_DATABASE_URL.to_string(),
            use_x_forwarded_for: false,
            use_forwarded: false,
            courier_whitelist: None,
            webhook_ack_timeout: Duration::from_millis(DEFAULT_WEBHOOK_ACK_TIMEOUT_MS),
            sweeper: SweeperConfig::default(),
            courier: CourierConfig::default(),
            notifier: NotifierConfig::default(),
        }
    }
}

impl ServerConfig {
    pub fn new(host: &str, port: u16) -> Self {
        Self { host: host.to_string(), port, ..Default::default() }
    }

    pub fn from_env_or_default() -> Self {
        let host = env::var("DSYNC_HOST").ok().unwrap_or_else(|| DEFAULT_DSYNC_HOST.into());
        let port = env::var("DSYNC_PORT")
            .map(|s| {
                s.parse::<u16>().unwrap_or_else(|e| {
                    error!(
                        "🪛️ {s} is not a valid port for DSYNC_PORT. {e} Using the default, {DEFAULT_DSYNC_PORT}, \
                         instead."
                    );
                    DEFAULT_DSYNC_PORT
                })
            })
            .ok()
            .unwrap_or(DEFAULT_DSYNC_PORT);
        let database_url = env::var("DSYNC_DATABASE_URL").ok().unwrap_or_else(|| {
            warn!("🪛️ DSYNC_DATABASE_URL is not set. Using the default, {DEFAULT_DATABASE_URL}.");
            DEFAULT_DATABASE_URL.to_string()
        });
        let use_x_forwarded_for = env_flag("DSYNC_USE_X_FORWARDED_FOR", false);
        let use_forwarded = env_flag("DSYNC_USE_FORWARDED", false);
        let courier_whitelist = configure_whitelist(env::var("DSYNC_COURIER_IP_WHITELIST").ok());
        let ack_ms = env_value_or_default("DSYNC_WEBHOOK_ACK_TIMEOUT_MS", DEFAULT_WEBHOOK_ACK_TIMEOUT_MS);
        let courier = CourierConfig::new_from_env_or_default();
        let sweeper = SweeperConfig::from_env_or_default(courier.timeout);
        let notifier = NotifierConfig::from_env_or_default();
        Self {
            host,
            port,
            database_url,
            use_x_forwarded_for,
            use_forwarded,
            courier_whitelist,
            webhook_ack_timeout: Duration::from_millis(ack_ms),
            sweeper,
            courier,
            notifier,
        }
    }
}

/// Parses a comma-separated list of IP addresses. Invalid entries are logged and skipped.
pub fn configure_whitelist(value: Option<String>) -> Option<Vec<IpAddr>> {
    let whitelist = value.and_then(|s| {
        if ["none", "false", "0", ""].contains(&s.trim().to_lowercase().as_str()) {
            info!(
                "🪛️ Courier IP whitelist is disabled. If this is not what you want, set DSYNC_COURIER_IP_WHITELIST to a \
                 comma-separated list of IP addresses to enable it."
            );
            return None;
        }
        let ip_addrs = s
            .split(',')
            .filter_map(|s| {
                s.trim()
                    .parse()
                    .map_err(|e| {
                        warn!("🪛️ Ignoring invalid IP address ({s}) in DSYNC_COURIER_IP_WHITELIST: {e}");
                    })
                    .ok()
            })
            .collect::<Vec<IpAddr>>();
        Some(ip_addrs)
    });
    match &whitelist {
        Some(whitelist) if whitelist.is_empty() => {
            warn!(
                "🚨️ The courier IP whitelist was configured, but is empty. The server will run, but won't accept any \
                 courier webhooks."
            );
        },
        None => {
            info!("🪛️ No courier IP whitelist is set. Webhooks are accepted from any address.");
        },
        Some(v) => {
            let addrs = v.iter().map(|a| a.to_string()).collect::<Vec<_>>().join(", ");
            info!("🪛️ Courier IP whitelist: {addrs}");
        },
    }
    whitelist
}

//-------------------------------------------------  SweeperConfig  ----------------------------------------------------
#[derive(Clone, Debug)]
pub struct SweeperConfig {
    /// When false, the poll sweeper is never started and the server relies on webhooks alone.
    pub enabled: bool,
    pub interval: Duration,
    pub sweep: SweepConfig,
}

impl Default for SweeperConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval: Duration::from_secs(DEFAULT_POLL_INTERVAL_SECS),
            sweep: SweepConfig::default(),
        }
    }
}

impl SweeperConfig {
    pub fn from_env_or_default(call_timeout: Duration) -> Self {
        let enabled = env_flag("DSYNC_CRON_ENABLED", true);
        if !enabled {
            warn!("🪛️ The poll sweeper is disabled. Delivery status will only be updated by courier webhooks.");
        }
        let mut interval_secs = env_value_or_default("DSYNC_POLL_INTERVAL_SECS", DEFAULT_POLL_INTERVAL_SECS);
        if interval_secs == 0 {
            warn!("🪛️ DSYNC_POLL_INTERVAL_SECS cannot be zero. Using {DEFAULT_POLL_INTERVAL_SECS}s instead.");
            interval_secs = DEFAULT_POLL_INTERVAL_SECS;
        }
        let max_orders = checked_max_orders(env_value_or_default("DSYNC_SWEEP_MAX_ORDERS", DEFAULT_SWEEP_MAX_ORDERS));
        let window_hours =
            checked_window_hours(env_value_or_default("DSYNC_SWEEP_WINDOW_HOURS", DEFAULT_SWEEP_WINDOW_HOURS));
        let delay_ms = env_value_or_default("DSYNC_SWEEP_CALL_DELAY_MS", DEFAULT_SWEEP_CALL_DELAY_MS);
        let track_by = env_value_or_default("DSYNC_TRACK_BY", TrackBy::default());
        let sweep = SweepConfig {
            max_orders,
            window: chrono::Duration::hours(window_hours),
            call_delay: Duration::from_millis(delay_ms),
            call_timeout,
            track_by,
        };
        Self { enabled, interval: Duration::from_secs(interval_secs), sweep }
    }
}

/// The sweep batch size. A negative `LIMIT` means no limit at all to SQLite, so only `1..=MAX_SWEEP_MAX_ORDERS` is
/// accepted.
pub fn checked_max_orders(value: i64) -> i64 {
    if (1..=MAX_SWEEP_MAX_ORDERS).contains(&value) {
        return value;
    }
    warn!(
        "🪛️ DSYNC_SWEEP_MAX_ORDERS must be between 1 and {MAX_SWEEP_MAX_ORDERS}, not {value}. Using \
         {DEFAULT_SWEEP_MAX_ORDERS} instead."
    );
    DEFAULT_SWEEP_MAX_ORDERS
}

/// How far back the sweep looks for active orders, in hours.
pub fn checked_window_hours(value: i64) -> i64 {
    if (1..=MAX_SWEEP_WINDOW_HOURS).contains(&value) {
        return value;
    }
    warn!(
        "🪛️ DSYNC_SWEEP_WINDOW_HOURS must be between 1 and {MAX_SWEEP_WINDOW_HOURS}, not {value}. Using \
         {DEFAULT_SWEEP_WINDOW_HOURS}h instead."
    );
    DEFAULT_SWEEP_WINDOW_HOURS
}

//-------------------------------------------------  NotifierConfig  ---------------------------------------------------
#[derive(Clone, Debug)]
pub struct NotifierConfig {
    /// The root of the notification service, e.g. `https://notify.example.com/v1`. No trailing slash.
    pub base_url: String,
    pub api_key: Secret<String>,
    pub timeout: Duration,
}

impl Default for NotifierConfig {
    fn default() -> Self {
        Self {
            base_url: "https://notifications.example.com/v1".to_string(),
            api_key: Secret::default(),
            timeout: Duration::from_secs(5),
        }
    }
}

impl NotifierConfig {
    pub fn from_env_or_default() -> Self {
        let base_url = env::var("DSYNC_NOTIFIER_URL").map(|s| s.trim_end_matches('/').to_string()).unwrap_or_else(|_| {
            warn!("🪛️ DSYNC_NOTIFIER_URL not set, using (probably useless) default");
            NotifierConfig::default().base_url
        });
        let api_key = Secret::new(env::var("DSYNC_NOTIFIER_API_KEY").unwrap_or_else(|_| {
            warn!("🪛️ DSYNC_NOTIFIER_API_KEY not set, using (probably useless) default");
            "00000000000000".to_string()
        }));
        Self { base_url, api_key, ..Default::default() }
    }
}

//-------------------------------------------------  ServerOptions  ----------------------------------------------------
/// A subset of the server configuration that the request handlers need. Excludes secrets, so that sensitive
/// information is not passed around the system.
#[derive(Clone, Copy, Debug)]
pub struct ServerOptions {
    pub use_x_forwarded_for: bool,
    pub use_forwarded: bool,
    pub webhook_ack_timeout: Duration,
}

impl Default for ServerOptions {
    fn default() -> Self {
        Self::from_config(&ServerConfig::default())
    }
}

impl ServerOptions {
    pub fn from_config(config: &ServerConfig) -> Self {
        Self {
            use_x_forwarded_for: config.use_x_forwarded_for,
            use_forwarded: config.use_forwarded,
            webhook_ack_timeout: config.webhook_ack_timeout,
        }
    }
}

#[cfg(test)]
mod test {
    use std::net::IpAddr;

    use delivery_sync_engine::sweep_objects::{DEFAULT_SWEEP_MAX_ORDERS, DEFAULT_SWEEP_WINDOW_HOURS};

    use super::{checked_max_orders, checked_window_hours, configure_whitelist, SweeperConfig};

    #[test]
    fn whitelist_parsing() {
        assert!(configure_whitelist(None).is_none());
        assert!(configure_whitelist(Some("none".into())).is_none());
        assert!(configure_whitelist(Some("FALSE".into())).is_none());
        let list = configure_whitelist(Some("10.0.0.1, 192.168.1.20,not-an-ip".into())).unwrap();
        assert_eq!(list, vec!["10.0.0.1".parse::<IpAddr>().unwrap(), "192.168.1.20".parse::<IpAddr>().unwrap()]);
        let list = configure_whitelist(Some("garbage".into())).unwrap();
        assert!(list.is_empty());
    }

    #[test]
    fn sweep_limits_must_be_positive_and_bounded() {
        assert_eq!(checked_max_orders(25), 25);
        assert_eq!(checked_max_orders(10_000), 10_000);
        assert_eq!(checked_max_orders(0), DEFAULT_SWEEP_MAX_ORDERS);
        assert_eq!(checked_max_orders(-1), DEFAULT_SWEEP_MAX_ORDERS);
        assert_eq!(checked_max_orders(10_001), DEFAULT_SWEEP_MAX_ORDERS);
        assert_eq!(checked_window_hours(1), 1);
        assert_eq!(checked_window_hours(72), 72);
        assert_eq!(checked_window_hours(0), DEFAULT_SWEEP_WINDOW_HOURS);
        assert_eq!(checked_window_hours(-6), DEFAULT_SWEEP_WINDOW_HOURS);
        assert_eq!(checked_window_hours(i64::MAX), DEFAULT_SWEEP_WINDOW_HOURS);
    }

    #[test]
    fn out_of_range_sweep_settings_fall_back_to_defaults() {
        std::env::set_var("DSYNC_SWEEP_MAX_ORDERS", "-1");
        std::env::set_var("DSYNC_SWEEP_WINDOW_HOURS", "9223372036854775807");
        let config = SweeperConfig::from_env_or_default(std::time::Duration::from_secs(5));
        std::env::remove_var("DSYNC_SWEEP_MAX_ORDERS");
        std::env::remove_var("DSYNC_SWEEP_WINDOW_HOURS");
        assert_eq!(config.sweep.max_orders, DEFAULT_SWEEP_MAX_ORDERS);
        assert_eq!(config.sweep.window, chrono::Duration::hours(DEFAULT_SWEEP_WINDOW_HOURS));
    }
}
