//! Gateway configuration
//!
//! Loaded from `VIESTI_*` environment variables. Every variable is optional;
//! unset variables fall back to the defaults below, malformed ones are a
//! [`GatewayError::Config`].
//!
//! | variable                      | default            |
//! |-------------------------------|--------------------|
//! | `VIESTI_LISTEN_ADDR`          | `0.0.0.0:6000`     |
//! | `VIESTI_METRICS_ADDR`         | `0.0.0.0:9090`     |
//! | `VIESTI_NOTIFY_PATH`          | `/api/v3/notify`   |
//! | `VIESTI_PROFILE_PATH`         | `/api/v3/profile`  |
//! | `VIESTI_WORKERS`              | `10`               |
//! | `VIESTI_ADMISSION_TIMEOUT_MS` | `1000`             |
//! | `VIESTI_MAX_PAYLOAD_BYTES`    | `10485760`         |
//! | `VIESTI_PROFILER_CAPACITY`    | `100`              |
//! | `VIESTI_PROFILE_ORDER`        | `newest-first`     |
//! | `VIESTI_BUCKET_POLICY`        | `decimal`          |
//! | `VIESTI_LISTENERS`            | (none)             |
//! | `VIESTI_DELIVERY_TIMEOUT_MS`  | `5000`             |
//! | `VIESTI_LOG_LEVEL`            | `info`             |
//! | `VIESTI_LOG_FORMAT`           | `pretty`           |

use crate::error::{GatewayError, Result};
use crate::health::BucketPolicy;
use crate::ingress::DEFAULT_MAX_PAYLOAD_BYTES;
use crate::pool::PoolConfig;
use crate::profiler::ReportOrder;
use std::fmt::Display;
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Human-readable output
    #[default]
    Pretty,
    /// One JSON object per line
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pretty" | "text" => Ok(LogFormat::Pretty),
            "json" => Ok(LogFormat::Json),
            other => Err(format!("unknown log format '{other}'")),
        }
    }
}

/// Complete gateway configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Address of the notification listener
    pub listen_addr: SocketAddr,
    /// Address of the metrics and health listener
    pub metrics_addr: SocketAddr,
    /// Route for notification ingress
    pub notify_path: String,
    /// Route for the profile report
    pub profile_path: String,
    /// Worker pool size
    pub workers: usize,
    /// Longest a request waits for an idle worker
    pub admission_timeout: Duration,
    /// Largest accepted request body
    pub max_payload_bytes: usize,
    /// Entries retained by the server profiler
    pub profiler_capacity: usize,
    /// Order of the profile report
    pub profile_order: ReportOrder,
    /// Payload-size bucketing for the health tracker
    pub bucket_policy: BucketPolicy,
    /// Outbound listener URLs
    pub listeners: Vec<String>,
    /// Per-listener delivery timeout
    pub delivery_timeout: Duration,
    /// Default tracing filter when `RUST_LOG` is unset
    pub log_level: String,
    /// Log output format
    pub log_format: LogFormat,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen_addr: SocketAddr::from(([0, 0, 0, 0], 6000)),
            metrics_addr: SocketAddr::from(([0, 0, 0, 0], 9090)),
            notify_path: "/api/v3/notify".to_string(),
            profile_path: "/api/v3/profile".to_string(),
            workers: 10,
            admission_timeout: Duration::from_millis(1_000),
            max_payload_bytes: DEFAULT_MAX_PAYLOAD_BYTES,
            profiler_capacity: 100,
            profile_order: ReportOrder::NewestFirst,
            bucket_policy: BucketPolicy::Decimal,
            listeners: Vec::new(),
            delivery_timeout: Duration::from_millis(5_000),
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
        }
    }
}

impl Config {
    /// Load configuration from the process environment
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Config::default();
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let workers = parse_or(&get, "VIESTI_WORKERS", defaults.workers)?;
        if workers == 0 {
            return Err(GatewayError::Config(
                "VIESTI_WORKERS must be at least 1".to_string(),
            ));
        }

        let profiler_capacity =
            parse_or(&get, "VIESTI_PROFILER_CAPACITY", defaults.profiler_capacity)?;
        if profiler_capacity == 0 {
            return Err(GatewayError::Config(
                "VIESTI_PROFILER_CAPACITY must be at least 1".to_string(),
            ));
        }

        let notify_path = get("VIESTI_NOTIFY_PATH").unwrap_or(defaults.notify_path);
        let profile_path = get("VIESTI_PROFILE_PATH").unwrap_or(defaults.profile_path);
        for (key, path) in [
            ("VIESTI_NOTIFY_PATH", &notify_path),
            ("VIESTI_PROFILE_PATH", &profile_path),
        ] {
            if !path.starts_with('/') {
                return Err(GatewayError::Config(format!(
                    "{key} must start with '/', got '{path}'"
                )));
            }
        }
        if notify_path == profile_path {
            return Err(GatewayError::Config(
                "VIESTI_NOTIFY_PATH and VIESTI_PROFILE_PATH must differ".to_string(),
            ));
        }

        let listeners: Vec<String> = get("VIESTI_LISTENERS")
            .map(|raw| {
                raw.split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();
        for listener in &listeners {
            let url = reqwest::Url::parse(listener).map_err(|e| {
                GatewayError::Config(format!("VIESTI_LISTENERS entry '{listener}': {e}"))
            })?;
            if !matches!(url.scheme(), "http" | "https") {
                return Err(GatewayError::Config(format!(
                    "VIESTI_LISTENERS entry '{listener}' must be http or https"
                )));
            }
        }

        Ok(Self {
            listen_addr: parse_or(&get, "VIESTI_LISTEN_ADDR", defaults.listen_addr)?,
            metrics_addr: parse_or(&get, "VIESTI_METRICS_ADDR", defaults.metrics_addr)?,
            notify_path,
            profile_path,
            workers,
            admission_timeout: Duration::from_millis(parse_or(
                &get,
                "VIESTI_ADMISSION_TIMEOUT_MS",
                defaults.admission_timeout.as_millis() as u64,
            )?),
            max_payload_bytes: parse_or(
                &get,
                "VIESTI_MAX_PAYLOAD_BYTES",
                defaults.max_payload_bytes,
            )?,
            profiler_capacity,
            profile_order: parse_or(&get, "VIESTI_PROFILE_ORDER", defaults.profile_order)?,
            bucket_policy: parse_or(&get, "VIESTI_BUCKET_POLICY", defaults.bucket_policy)?,
            listeners,
            delivery_timeout: Duration::from_millis(parse_or(
                &get,
                "VIESTI_DELIVERY_TIMEOUT_MS",
                defaults.delivery_timeout.as_millis() as u64,
            )?),
            log_level: get("VIESTI_LOG_LEVEL").unwrap_or(defaults.log_level),
            log_format: parse_or(&get, "VIESTI_LOG_FORMAT", defaults.log_format)?,
        })
    }

    /// Worker pool settings derived from this config
    pub fn pool_config(&self) -> PoolConfig {
        PoolConfig {
            workers: self.workers,
            admission_timeout: self.admission_timeout,
        }
    }
}

fn parse_or<T, G>(get: &G, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: Display,
    G: Fn(&str) -> Option<String>,
{
    match get(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e| GatewayError::Config(format!("{key}='{raw}': {e}"))),
        None => Ok(default),
    }
}
