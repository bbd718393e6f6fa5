//! Daemon settings
//!
//! Layered with the `config` crate: built-in defaults, then an optional TOML
//! file (`WAITLINE_CONFIG`, else `./waitline.toml`), then `WAITLINE__*`
//! environment variables such as `WAITLINE__QUEUE__ACTIVE_MAX_SIZE=100`.

use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;
use waitline_api_rpc::{RateLimitConfig, RpcServerConfig};
use waitline_core::application::constants::CLEANUP_INTERVAL_MULTIPLIER;
use waitline_core::application::{PollingConfig, SchedulerConfig};
use waitline_core::domain::QueueConfig;

const DEFAULT_CONFIG_FILE: &str = "waitline.toml";
const ENV_PREFIX: &str = "WAITLINE";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub database: DatabaseSettings,
    pub rpc: RpcSettings,
    pub queue: QueueConfig,
    pub scheduler: SchedulerSettings,
    pub polling: PollingConfig,
    pub rate_limit: RateLimitSettings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseSettings {
    pub url: String,
    pub store_timeout_ms: u64,
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            url: "sqlite://waitline.db".to_string(),
            store_timeout_ms: 2_000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RpcSettings {
    pub host: String,
    pub port: u16,
}

impl Default for RpcSettings {
    fn default() -> Self {
        let rpc = RpcServerConfig::default();
        Self {
            host: rpc.host,
            port: rpc.port,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerSettings {
    /// Unset: 12 admission intervals
    pub cleanup_interval_seconds: Option<u64>,
    pub resource_concurrency: usize,
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        Self {
            cleanup_interval_seconds: None,
            resource_concurrency: SchedulerConfig::default().resource_concurrency,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitSettings {
    pub capacity: u32,
    pub refill_window_seconds: u64,
}

impl Default for RateLimitSettings {
    fn default() -> Self {
        let limits = RateLimitConfig::default();
        Self {
            capacity: limits.capacity,
            refill_window_seconds: limits.refill_window.as_secs(),
        }
    }
}

impl Settings {
    /// Load from the default file location and the process environment
    pub fn load() -> Result<Self, ConfigError> {
        let path = std::env::var("WAITLINE_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_FILE.to_string());
        Self::load_from(&path, None)
    }

    /// `env` replaces the process environment when given
    pub fn load_from(path: &str, env: Option<HashMap<String, String>>) -> Result<Self, ConfigError> {
        Config::builder()
            .add_source(Config::try_from(&Settings::default())?)
            .add_source(File::with_name(path).required(false))
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true)
                    .source(env),
            )
            .build()?
            .try_deserialize::<Settings>()
            .and_then(Settings::validate)
    }

    /// Reject periods of zero (timer intervals must be non-zero)
    fn validate(self) -> Result<Self, ConfigError> {
        let periods = [
            ("queue.admission_interval_seconds", self.queue.admission_interval_seconds),
            ("rate_limit.refill_window_seconds", self.rate_limit.refill_window_seconds),
            (
                "scheduler.cleanup_interval_seconds",
                self.scheduler.cleanup_interval_seconds.unwrap_or(1),
            ),
        ];
        for (key, value) in periods {
            if value == 0 {
                return Err(ConfigError::Message(format!("{} must be positive", key)));
            }
        }
        Ok(self)
    }

    pub fn store_timeout(&self) -> Duration {
        Duration::from_millis(self.database.store_timeout_ms)
    }

    pub fn rpc_config(&self) -> RpcServerConfig {
        RpcServerConfig {
            host: self.rpc.host.clone(),
            port: self.rpc.port,
        }
    }

    pub fn scheduler_config(&self) -> SchedulerConfig {
        let admission_interval = Duration::from_secs(self.queue.admission_interval_seconds);
        let cleanup_interval = match self.scheduler.cleanup_interval_seconds {
            Some(seconds) => Duration::from_secs(seconds),
            None => admission_interval * CLEANUP_INTERVAL_MULTIPLIER,
        };
        SchedulerConfig {
            admission_interval,
            cleanup_interval,
            resource_concurrency: self.scheduler.resource_concurrency.max(1),
        }
    }

    pub fn rate_limit_config(&self) -> RateLimitConfig {
        RateLimitConfig {
            capacity: self.rate_limit.capacity,
            refill_window: Duration::from_secs(self.rate_limit.refill_window_seconds),
        }
    }
}
