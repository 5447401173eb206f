//! Component health: per-component probe results and the derived overview.

mod probes;

pub use probes::{DockerProbe, SystemProbe};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

use crate::alerting::{Alert, AlertStatus, Severity};
use crate::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Unknown,
    Warning,
    Critical,
}

impl fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HealthStatus::Healthy => write!(f, "healthy"),
            HealthStatus::Unknown => write!(f, "unknown"),
            HealthStatus::Warning => write!(f, "warning"),
            HealthStatus::Critical => write!(f, "critical"),
        }
    }
}

/// Point-in-time verdict for one component. `response_time` is in
/// milliseconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthCheck {
    pub component: String,
    pub status: HealthStatus,
    pub message: String,
    pub timestamp: DateTime<Utc>,
    pub response_time: f64,
    #[serde(default)]
    pub details: HashMap<String, serde_json::Value>,
}

impl HealthCheck {
    pub fn new(component: &str, status: HealthStatus, message: impl Into<String>) -> Self {
        Self {
            component: component.to_string(),
            status,
            message: message.into(),
            timestamp: Utc::now(),
            response_time: 0.0,
            details: HashMap::new(),
        }
    }

    pub fn with_response_time(mut self, millis: f64) -> Self {
        self.response_time = millis;
        self
    }

    pub fn with_detail(mut self, key: &str, value: impl Into<serde_json::Value>) -> Self {
        self.details.insert(key.to_string(), value.into());
        self
    }

    /// Placeholder recorded when a probe does not answer in time.
    pub fn timed_out(component: &str, timeout_secs: u64) -> Self {
        Self::new(
            component,
            HealthStatus::Unknown,
            format!("probe timed out after {}s", timeout_secs),
        )
    }
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait HealthProbe: Send + Sync {
    fn component(&self) -> &str;

    async fn probe(&self) -> HealthCheck;
}

/// Percent bands for the system probe. A metric at or above `critical` is
/// critical, at or above its warning level is a warning.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HealthThresholds {
    pub cpu_warning: f64,
    pub memory_warning: f64,
    pub disk_warning: f64,
    pub critical: f64,
}

impl Default for HealthThresholds {
    fn default() -> Self {
        Self {
            cpu_warning: 70.0,
            memory_warning: 70.0,
            disk_warning: 80.0,
            critical: 90.0,
        }
    }
}

impl HealthThresholds {
    pub fn validate(&self) -> std::result::Result<(), String> {
        for (name, warning) in [
            ("cpu", self.cpu_warning),
            ("memory", self.memory_warning),
            ("disk", self.disk_warning),
        ] {
            if !warning.is_finite() {
                return Err(format!("{} warning threshold must be finite", name));
            }
            if warning > self.critical {
                return Err(format!(
                    "{} warning threshold {} exceeds critical threshold {}",
                    name, warning, self.critical
                ));
            }
        }
        if !self.critical.is_finite() {
            return Err("critical threshold must be finite".to_string());
        }
        Ok(())
    }

    /// Worst band across the three metrics.
    pub fn classify(&self, cpu: f64, memory: f64, disk: f64) -> HealthStatus {
        let band = |value: f64, warning: f64| {
            if value >= self.critical {
                HealthStatus::Critical
            } else if value >= warning {
                HealthStatus::Warning
            } else {
                HealthStatus::Healthy
            }
        };

        [
            band(cpu, self.cpu_warning),
            band(memory, self.memory_warning),
            band(disk, self.disk_warning),
        ]
        .into_iter()
        .max()
        .unwrap_or(HealthStatus::Healthy)
    }
}

/// Derived summary of alert and component state. Computed on request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitoringOverview {
    pub system_status: HealthStatus,
    pub active_alerts: usize,
    pub critical_alerts: usize,
    pub services_up: usize,
    pub services_down: usize,
    pub last_update: DateTime<Utc>,
    pub components: Vec<HealthCheck>,
}

/// Latest health check per component name.
#[derive(Debug, Default)]
pub struct HealthAggregator {
    checks: HashMap<String, HealthCheck>,
}

impl HealthAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the previous entry for the check's component.
    pub fn record(&mut self, check: HealthCheck) {
        self.checks.insert(check.component.clone(), check);
    }

    pub fn components(&self) -> Vec<HealthCheck> {
        let mut checks: Vec<HealthCheck> = self.checks.values().cloned().collect();
        checks.sort_by(|a, b| a.component.cmp(&b.component));
        checks
    }

    pub fn component(&self, name: &str) -> Result<HealthCheck> {
        self.checks
            .get(name)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("component {}", name)))
    }

    pub fn len(&self) -> usize {
        self.checks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.checks.is_empty()
    }

    pub fn overview<'a>(
        &self,
        alerts: impl IntoIterator<Item = &'a Alert>,
        now: DateTime<Utc>,
    ) -> MonitoringOverview {
        let mut active_alerts = 0;
        let mut critical_alerts = 0;
        for alert in alerts {
            if alert.status != AlertStatus::Active {
                continue;
            }
            active_alerts += 1;
            if alert.severity == Severity::Critical {
                critical_alerts += 1;
            }
        }

        let system_status = if critical_alerts > 0 {
            HealthStatus::Critical
        } else if active_alerts > 0 {
            HealthStatus::Warning
        } else {
            HealthStatus::Healthy
        };

        let components = self.components();
        let services_up = components
            .iter()
            .filter(|c| c.status == HealthStatus::Healthy)
            .count();
        let services_down = components
            .iter()
            .filter(|c| matches!(c.status, HealthStatus::Warning | HealthStatus::Critical))
            .count();

        MonitoringOverview {
            system_status,
            active_alerts,
            critical_alerts,
            services_up,
            services_down,
            last_update: now,
            components,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alerting::{AlertRule, Condition};

    fn alert(id: &str, severity: Severity) -> Alert {
        let rule = AlertRule::new(id, id, "system.cpu_percent", Condition::GreaterThan, 1.0, severity);
        Alert::raise(&rule, 2.0, Utc::now())
    }

    #[test]
    fn bands_are_inclusive_and_worst_wins() {
        let t = HealthThresholds::default();
        assert_eq!(t.classify(10.0, 10.0, 10.0), HealthStatus::Healthy);
        assert_eq!(t.classify(70.0, 10.0, 10.0), HealthStatus::Warning);
        assert_eq!(t.classify(10.0, 10.0, 79.9), HealthStatus::Healthy);
        assert_eq!(t.classify(10.0, 10.0, 80.0), HealthStatus::Warning);
        assert_eq!(t.classify(75.0, 10.0, 90.0), HealthStatus::Critical);
    }

    #[test]
    fn thresholds_reject_inverted_bands() {
        let mut t = HealthThresholds::default();
        assert!(t.validate().is_ok());
        t.disk_warning = 95.0;
        assert!(t.validate().is_err());
    }

    #[test]
    fn record_replaces_previous_check() {
        let mut agg = HealthAggregator::new();
        agg.record(HealthCheck::new("docker", HealthStatus::Critical, "down"));
        agg.record(HealthCheck::new("docker", HealthStatus::Healthy, "up"));

        assert_eq!(agg.len(), 1);
        assert_eq!(agg.component("docker").unwrap().status, HealthStatus::Healthy);
    }

    #[test]
    fn unknown_component_is_not_found() {
        let agg = HealthAggregator::new();
        assert!(matches!(agg.component("nginx"), Err(Error::NotFound(_))));
    }

    #[test]
    fn one_critical_alert_with_two_healthy_components() {
        let mut agg = HealthAggregator::new();
        agg.record(HealthCheck::new("system", HealthStatus::Healthy, "ok"));
        agg.record(HealthCheck::new("docker", HealthStatus::Healthy, "ok"));
        let alerts = vec![alert("disk_full", Severity::Critical)];

        let overview = agg.overview(&alerts, Utc::now());
        assert_eq!(overview.system_status, HealthStatus::Critical);
        assert_eq!(overview.active_alerts, 1);
        assert_eq!(overview.critical_alerts, 1);
        assert_eq!(overview.services_up, 2);
        assert_eq!(overview.services_down, 0);
        assert_eq!(overview.components[0].component, "docker");
    }

    #[test]
    fn acknowledged_alerts_are_not_counted_as_active() {
        let agg = HealthAggregator::new();
        let mut acked = alert("disk_full", Severity::Critical);
        acked.acknowledge(Utc::now());
        let alerts = vec![acked, alert("high_cpu", Severity::High)];

        let overview = agg.overview(&alerts, Utc::now());
        assert_eq!(overview.system_status, HealthStatus::Warning);
        assert_eq!(overview.active_alerts, 1);
        assert_eq!(overview.critical_alerts, 0);
    }

    #[test]
    fn unknown_components_count_neither_up_nor_down() {
        let mut agg = HealthAggregator::new();
        agg.record(HealthCheck::timed_out("docker", 30));
        agg.record(HealthCheck::new("system", HealthStatus::Warning, "cpu high"));

        let overview = agg.overview(std::iter::empty(), Utc::now());
        assert_eq!(overview.system_status, HealthStatus::Healthy);
        assert_eq!(overview.services_up, 0);
        assert_eq!(overview.services_down, 1);
    }
}
