use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

use super::rule::{AlertRule, Severity};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertStatus {
    Active,
    Acknowledged,
    Resolved,
}

impl fmt::Display for AlertStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AlertStatus::Active => write!(f, "active"),
            AlertStatus::Acknowledged => write!(f, "acknowledged"),
            AlertStatus::Resolved => write!(f, "resolved"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    pub id: String,
    pub rule_id: String,
    pub rule_name: String,
    pub message: String,
    pub severity: Severity,
    pub status: AlertStatus,
    pub started_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
    pub acknowledged_at: Option<DateTime<Utc>>,
    pub current_value: f64,
    pub threshold: f64,
    pub labels: HashMap<String, String>,
}

impl Alert {
    pub fn raise(rule: &AlertRule, value: f64, now: DateTime<Utc>) -> Self {
        Self {
            id: rule.alert_key(),
            rule_id: rule.id.clone(),
            rule_name: rule.name.clone(),
            message: format!(
                "{} - Current: {:.2}, Threshold: {}",
                rule.description, value, rule.threshold
            ),
            severity: rule.severity,
            status: AlertStatus::Active,
            started_at: now,
            resolved_at: None,
            acknowledged_at: None,
            current_value: value,
            threshold: rule.threshold,
            labels: rule.labels.clone(),
        }
    }

    pub fn is_open(&self) -> bool {
        self.status != AlertStatus::Resolved
    }

    pub fn acknowledge(&mut self, now: DateTime<Utc>) {
        self.status = AlertStatus::Acknowledged;
        self.acknowledged_at = Some(now);
    }

    pub fn resolve(&mut self, now: DateTime<Utc>) {
        self.status = AlertStatus::Resolved;
        self.resolved_at = Some(now);
    }
}
