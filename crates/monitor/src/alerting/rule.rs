use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use crate::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Low => write!(f, "low"),
            Severity::Medium => write!(f, "medium"),
            Severity::High => write!(f, "high"),
            Severity::Critical => write!(f, "critical"),
        }
    }
}

/// Comparator applied as `value <op> threshold`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Condition {
    GreaterThan,
    LessThan,
    Equal,
    GreaterOrEqual,
    LessOrEqual,
}

impl Condition {
    pub fn symbol(&self) -> &'static str {
        match self {
            Condition::GreaterThan => ">",
            Condition::LessThan => "<",
            Condition::Equal => "==",
            Condition::GreaterOrEqual => ">=",
            Condition::LessOrEqual => "<=",
        }
    }

    pub fn holds(&self, value: f64, threshold: f64) -> bool {
        match self {
            Condition::GreaterThan => value > threshold,
            Condition::LessThan => value < threshold,
            Condition::Equal => value == threshold,
            Condition::GreaterOrEqual => value >= threshold,
            Condition::LessOrEqual => value <= threshold,
        }
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

impl FromStr for Condition {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            ">" => Ok(Condition::GreaterThan),
            "<" => Ok(Condition::LessThan),
            "==" => Ok(Condition::Equal),
            ">=" => Ok(Condition::GreaterOrEqual),
            "<=" => Ok(Condition::LessOrEqual),
            other => Err(Error::Config(format!(
                "unknown condition operator '{}'",
                other
            ))),
        }
    }
}

impl TryFrom<String> for Condition {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<Condition> for String {
    fn from(condition: Condition) -> Self {
        condition.symbol().to_string()
    }
}

/// Longest sustained-breach window a rule may ask for (one week).
pub const MAX_DURATION_SECS: u64 = 7 * 24 * 60 * 60;

fn default_enabled() -> bool {
    true
}

fn default_duration() -> u64 {
    60
}

/// A validated alert rule. The comparator is resolved once, when the rule
/// is built, and never re-parsed during evaluation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertRule {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub metric: String,
    pub condition: Condition,
    pub threshold: f64,
    pub severity: Severity,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default = "default_duration", alias = "duration")]
    pub duration_seconds: u64,
    #[serde(default)]
    pub labels: HashMap<String, String>,
}

/// Rule definition as submitted by a caller, before the comparator has been
/// checked.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertRuleRequest {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub metric: String,
    pub condition: String,
    pub threshold: f64,
    pub severity: Severity,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default = "default_duration", alias = "duration")]
    pub duration_seconds: u64,
    #[serde(default)]
    pub labels: HashMap<String, String>,
}

impl TryFrom<AlertRuleRequest> for AlertRule {
    type Error = Error;

    fn try_from(request: AlertRuleRequest) -> Result<Self> {
        let rule = AlertRule {
            id: request.id,
            name: request.name,
            description: request.description,
            metric: request.metric,
            condition: request.condition.parse()?,
            threshold: request.threshold,
            severity: request.severity,
            enabled: request.enabled,
            duration_seconds: request.duration_seconds,
            labels: request.labels,
        };
        rule.validate()?;
        Ok(rule)
    }
}

impl AlertRule {
    pub fn new(
        id: &str,
        name: &str,
        metric: &str,
        condition: Condition,
        threshold: f64,
        severity: Severity,
    ) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            description: String::new(),
            metric: metric.to_string(),
            condition,
            threshold,
            severity,
            enabled: true,
            duration_seconds: 0,
            labels: HashMap::new(),
        }
    }

    pub fn with_description(mut self, description: &str) -> Self {
        self.description = description.to_string();
        self
    }

    pub fn with_duration(mut self, seconds: u64) -> Self {
        self.duration_seconds = seconds;
        self
    }

    pub fn with_label(mut self, key: &str, value: &str) -> Self {
        self.labels.insert(key.to_string(), value.to_string());
        self
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.id.trim().is_empty() {
            return Err(Error::Config("rule id is required".into()));
        }
        if self.metric.trim().is_empty() {
            return Err(Error::Config(format!("rule '{}' has no metric", self.id)));
        }
        if !self.threshold.is_finite() {
            return Err(Error::Config(format!(
                "rule '{}' has a non-finite threshold",
                self.id
            )));
        }
        if self.duration_seconds > MAX_DURATION_SECS {
            return Err(Error::Config(format!(
                "rule '{}' duration {}s exceeds the maximum of {}s",
                self.id, self.duration_seconds, MAX_DURATION_SECS
            )));
        }
        Ok(())
    }

    /// Key of the alert this rule raises; one open alert per rule and metric.
    pub fn alert_key(&self) -> String {
        format!("{}_{}", self.id, self.metric)
    }

    pub fn matches(&self, value: f64) -> bool {
        self.condition.holds(value, self.threshold)
    }
}

/// Rules installed at startup.
pub fn default_rules() -> Vec<AlertRule> {
    vec![
        AlertRule::new(
            "high_cpu",
            "High CPU Usage",
            "system.cpu_percent",
            Condition::GreaterThan,
            80.0,
            Severity::High,
        )
        .with_description("CPU usage above 80%")
        .with_duration(300),
        AlertRule::new(
            "high_memory",
            "High Memory Usage",
            "system.memory_percent",
            Condition::GreaterThan,
            85.0,
            Severity::High,
        )
        .with_description("Memory usage above 85%")
        .with_duration(300),
        AlertRule::new(
            "disk_full",
            "Disk Space Critical",
            "system.disk_percent",
            Condition::GreaterThan,
            90.0,
            Severity::Critical,
        )
        .with_description("Disk usage above 90%")
        .with_duration(60),
        AlertRule::new(
            "docker_down",
            "Docker Service Down",
            "docker.containers_running",
            Condition::Equal,
            0.0,
            Severity::Critical,
        )
        .with_description("Docker containers not running")
        .with_duration(60),
    ]
}
