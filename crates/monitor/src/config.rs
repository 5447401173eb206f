use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::time::Duration;

use crate::health::HealthThresholds;
use crate::store::StoreConfig;
use crate::{Error, Result};

const DEFAULT_SERVICES: &[&str] = &["nginx", "docker", "postgresql", "redis-server"];

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub monitoring: MonitoringConfig,
    pub callbacks: CallbackConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub addr: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitoringConfig {
    pub collection_interval_secs: u64,
    pub alert_interval_secs: u64,
    pub store: StoreConfig,
    pub collector_timeout_secs: u64,
    pub shutdown_timeout_secs: u64,
    pub services: Vec<String>,
    pub docker_bin: String,
    pub thresholds: HealthThresholds,
}

impl MonitoringConfig {
    pub fn collection_interval(&self) -> Duration {
        Duration::from_secs(self.collection_interval_secs)
    }

    pub fn alert_interval(&self) -> Duration {
        Duration::from_secs(self.alert_interval_secs)
    }

    pub fn collector_timeout(&self) -> Duration {
        Duration::from_secs(self.collector_timeout_secs)
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_secs)
    }
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self {
            collection_interval_secs: 60,
            alert_interval_secs: 30,
            store: StoreConfig::default(),
            collector_timeout_secs: 30,
            shutdown_timeout_secs: 10,
            services: DEFAULT_SERVICES.iter().map(|s| s.to_string()).collect(),
            docker_bin: "docker".to_string(),
            thresholds: HealthThresholds::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum SinkKind {
    #[serde(rename = "webhook")]
    Webhook,
    #[serde(rename = "stdout")]
    Stdout,
}

impl Default for SinkKind {
    fn default() -> Self {
        SinkKind::Webhook
    }
}

impl FromStr for SinkKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "webhook" => Ok(SinkKind::Webhook),
            "stdout" => Ok(SinkKind::Stdout),
            other => Err(Error::Config(format!(
                "CALLBACK_SINK must be 'webhook' or 'stdout', got '{}'",
                other
            ))),
        }
    }
}

/// Where and how engine events are reported to the control plane.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallbackConfig {
    pub base_url: String,
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    #[serde(skip_serializing)]
    pub token: String,
    pub timeout_secs: u64,
    pub max_attempts: u32,
    pub backoff_ms: u64,
    #[serde(default)]
    pub sink: SinkKind,
}

impl CallbackConfig {
    pub const ALERTS_PATH: &'static str = "/api/system-ops/callbacks/monitoring/alerts";
    pub const ACKNOWLEDGED_PATH: &'static str =
        "/api/system-ops/callbacks/monitoring/alert/acknowledged";
    pub const RULE_CREATED_PATH: &'static str =
        "/api/system-ops/callbacks/monitoring/alert-rule/created";

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), path)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn backoff(&self) -> Duration {
        Duration::from_millis(self.backoff_ms)
    }
}

impl Default for CallbackConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:3001".to_string(),
            api_key: None,
            token: "netpilot-system-ops-callback-token".to_string(),
            timeout_secs: 30,
            max_attempts: 3,
            backoff_ms: 1000,
            sink: SinkKind::Webhook,
        }
    }
}

fn parse_or<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: T,
) -> Result<T> {
    match lookup(key) {
        Some(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .map_err(|_| Error::Config(format!("{} has an invalid value '{}'", key, raw))),
        _ => Ok(default),
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        // Load environment variables from .env file if it exists
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary variable source, falling
    /// back to defaults for anything unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let defaults = Config::default();
        let monitoring = &defaults.monitoring;
        let callbacks = &defaults.callbacks;

        let config = Config {
            server: ServerConfig {
                addr: lookup("SERVER_ADDR").unwrap_or(defaults.server.addr.clone()),
            },
            monitoring: MonitoringConfig {
                collection_interval_secs: parse_or(
                    &lookup,
                    "MONITOR_COLLECTION_INTERVAL_SECS",
                    monitoring.collection_interval_secs,
                )?,
                alert_interval_secs: parse_or(
                    &lookup,
                    "MONITOR_ALERT_INTERVAL_SECS",
                    monitoring.alert_interval_secs,
                )?,
                store: StoreConfig {
                    series_capacity: parse_or(
                        &lookup,
                        "MONITOR_SERIES_CAPACITY",
                        monitoring.store.series_capacity,
                    )?,
                    max_series: parse_or(&lookup, "MONITOR_MAX_SERIES", monitoring.store.max_series)?,
                    idle_ttl_secs: parse_or(
                        &lookup,
                        "MONITOR_SERIES_IDLE_TTL_SECS",
                        monitoring.store.idle_ttl_secs,
                    )?,
                },
                collector_timeout_secs: parse_or(
                    &lookup,
                    "MONITOR_COLLECTOR_TIMEOUT_SECS",
                    monitoring.collector_timeout_secs,
                )?,
                shutdown_timeout_secs: parse_or(
                    &lookup,
                    "MONITOR_SHUTDOWN_TIMEOUT_SECS",
                    monitoring.shutdown_timeout_secs,
                )?,
                services: lookup("MONITOR_SERVICES")
                    .map(|raw| {
                        raw.split(',')
                            .map(str::trim)
                            .filter(|s| !s.is_empty())
                            .map(String::from)
                            .collect()
                    })
                    .unwrap_or_else(|| monitoring.services.clone()),
                docker_bin: lookup("MONITOR_DOCKER_BIN")
                    .unwrap_or_else(|| monitoring.docker_bin.clone()),
                thresholds: HealthThresholds {
                    cpu_warning: parse_or(
                        &lookup,
                        "HEALTH_CPU_WARNING",
                        monitoring.thresholds.cpu_warning,
                    )?,
                    memory_warning: parse_or(
                        &lookup,
                        "HEALTH_MEMORY_WARNING",
                        monitoring.thresholds.memory_warning,
                    )?,
                    disk_warning: parse_or(
                        &lookup,
                        "HEALTH_DISK_WARNING",
                        monitoring.thresholds.disk_warning,
                    )?,
                    critical: parse_or(&lookup, "HEALTH_CRITICAL", monitoring.thresholds.critical)?,
                },
            },
            callbacks: CallbackConfig {
                base_url: lookup("NESTJS_API_URL").unwrap_or_else(|| callbacks.base_url.clone()),
                api_key: lookup("NESTJS_API_KEY").filter(|k| !k.trim().is_empty()),
                token: lookup("CALLBACK_TOKEN").unwrap_or_else(|| callbacks.token.clone()),
                timeout_secs: parse_or(&lookup, "CALLBACK_TIMEOUT_SECS", callbacks.timeout_secs)?,
                max_attempts: parse_or(&lookup, "CALLBACK_MAX_ATTEMPTS", callbacks.max_attempts)?,
                backoff_ms: parse_or(&lookup, "CALLBACK_BACKOFF_MS", callbacks.backoff_ms)?,
                sink: parse_or(&lookup, "CALLBACK_SINK", callbacks.sink)?,
            },
        };

        if config.callbacks.api_key.is_none() && config.callbacks.sink == SinkKind::Webhook {
            tracing::warn!("NESTJS_API_KEY is not set. Callbacks will be sent without a bearer token.");
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let m = &self.monitoring;
        for (key, value) in [
            ("MONITOR_COLLECTION_INTERVAL_SECS", m.collection_interval_secs),
            ("MONITOR_ALERT_INTERVAL_SECS", m.alert_interval_secs),
            ("MONITOR_COLLECTOR_TIMEOUT_SECS", m.collector_timeout_secs),
            ("MONITOR_SHUTDOWN_TIMEOUT_SECS", m.shutdown_timeout_secs),
            ("CALLBACK_TIMEOUT_SECS", self.callbacks.timeout_secs),
            ("CALLBACK_MAX_ATTEMPTS", self.callbacks.max_attempts as u64),
        ] {
            if value == 0 {
                return Err(Error::Config(format!("{} must be greater than zero", key)));
            }
        }

        m.store.validate().map_err(Error::Config)?;
        m.thresholds.validate().map_err(Error::Config)?;

        url::Url::parse(&self.callbacks.base_url).map_err(|e| {
            Error::Config(format!(
                "NESTJS_API_URL '{}' is not a valid URL: {}",
                self.callbacks.base_url, e
            ))
        })?;

        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                addr: "0.0.0.0:8001".to_string(),
            },
            monitoring: MonitoringConfig::default(),
            callbacks: CallbackConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn from_pairs(pairs: &[(&str, &str)]) -> Result<Config> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(move |key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_when_nothing_is_set() {
        let config = from_pairs(&[]).unwrap();
        assert_eq!(config.server.addr, "0.0.0.0:8001");
        assert_eq!(config.monitoring.collection_interval_secs, 60);
        assert_eq!(config.monitoring.alert_interval_secs, 30);
        assert_eq!(config.monitoring.store.series_capacity, 1440);
        assert_eq!(
            config.monitoring.services,
            vec!["nginx", "docker", "postgresql", "redis-server"]
        );
        assert_eq!(config.callbacks.base_url, "http://localhost:3001");
        assert_eq!(config.callbacks.token, "netpilot-system-ops-callback-token");
        assert_eq!(config.callbacks.api_key, None);
        assert_eq!(config.callbacks.sink, SinkKind::Webhook);
    }

    #[test]
    fn reads_overrides() {
        let config = from_pairs(&[
            ("SERVER_ADDR", "127.0.0.1:9000"),
            ("MONITOR_ALERT_INTERVAL_SECS", "5"),
            ("MONITOR_SERVICES", "nginx, sshd ,"),
            ("HEALTH_CRITICAL", "95"),
            ("NESTJS_API_KEY", "secret"),
            ("CALLBACK_SINK", "STDOUT"),
        ])
        .unwrap();

        assert_eq!(config.server.addr, "127.0.0.1:9000");
        assert_eq!(config.monitoring.alert_interval(), Duration::from_secs(5));
        assert_eq!(config.monitoring.services, vec!["nginx", "sshd"]);
        assert_eq!(config.monitoring.thresholds.critical, 95.0);
        assert_eq!(config.callbacks.api_key.as_deref(), Some("secret"));
        assert_eq!(config.callbacks.sink, SinkKind::Stdout);
    }

    #[test]
    fn rejects_unparsable_numbers() {
        let err = from_pairs(&[("MONITOR_SERIES_CAPACITY", "lots")]).unwrap_err();
        assert!(matches!(err, Error::Config(msg) if msg.contains("MONITOR_SERIES_CAPACITY")));
    }

    #[test]
    fn rejects_zero_intervals_and_bad_urls() {
        assert!(from_pairs(&[("MONITOR_COLLECTION_INTERVAL_SECS", "0")]).is_err());
        assert!(from_pairs(&[("CALLBACK_MAX_ATTEMPTS", "0")]).is_err());
        assert!(from_pairs(&[("NESTJS_API_URL", "not a url")]).is_err());
        assert!(from_pairs(&[("HEALTH_CPU_WARNING", "99")]).is_err());
    }

    #[test]
    fn callback_urls_join_without_double_slash() {
        let callbacks = CallbackConfig {
            base_url: "http://control:3001/".to_string(),
            ..CallbackConfig::default()
        };
        assert_eq!(
            callbacks.url(CallbackConfig::ALERTS_PATH),
            "http://control:3001/api/system-ops/callbacks/monitoring/alerts"
        );
    }
}
