use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::json;
use std::collections::HashMap;
use tracing::{info, warn};

use super::alert::{Alert, AlertStatus};
use super::evaluator::EvaluationResult;
use super::rule::{AlertRule, Severity};
use crate::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertEventKind {
    Raised,
    Resolved,
    Acknowledged,
}

impl AlertEventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertEventKind::Raised => "alert_raised",
            AlertEventKind::Resolved => "alert_resolved",
            AlertEventKind::Acknowledged => "alert_acknowledged",
        }
    }
}

/// A state transition of one alert, handed to the notifier.
#[derive(Debug, Clone)]
pub struct AlertEvent {
    pub kind: AlertEventKind,
    pub alert: Alert,
}

impl AlertEvent {
    pub fn payload(&self) -> serde_json::Value {
        let alert = &self.alert;
        json!({
            "event": self.kind.as_str(),
            "alert_id": alert.id,
            "rule_id": alert.rule_id,
            "rule_name": alert.rule_name,
            "message": alert.message,
            "severity": alert.severity,
            "status": alert.status,
            "current_value": alert.current_value,
            "threshold": alert.threshold,
            "started_at": alert.started_at.to_rfc3339(),
            "resolved_at": alert.resolved_at.map(|t| t.to_rfc3339()),
            "acknowledged_at": alert.acknowledged_at.map(|t| t.to_rfc3339()),
            "labels": alert.labels,
        })
    }
}

/// Owns the open (active or acknowledged) alerts. Resolved alerts are
/// evicted immediately; no history is kept.
#[derive(Debug, Default)]
pub struct AlertLifecycleManager {
    active: HashMap<String, Alert>,
}

impl AlertLifecycleManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds one verdict for `rule` into the state machine.
    ///
    /// Raising needs the condition plus the duration requirement; resolving
    /// happens on the first verdict whose condition no longer holds. A
    /// verdict without a value (no data, disabled rule) changes nothing.
    pub fn apply(
        &mut self,
        rule: &AlertRule,
        verdict: &EvaluationResult,
        now: DateTime<Utc>,
    ) -> Option<AlertEvent> {
        let value = verdict.current_value?;
        let key = rule.alert_key();

        if verdict.condition_met {
            if let Some(alert) = self.active.get_mut(&key) {
                alert.current_value = value;
                return None;
            }
            if !verdict.should_fire() {
                return None;
            }

            let alert = Alert::raise(rule, value, now);
            warn!(alert_id = %alert.id, severity = %alert.severity, "New alert: {}", alert.message);
            self.active.insert(key, alert.clone());
            return Some(AlertEvent {
                kind: AlertEventKind::Raised,
                alert,
            });
        }

        let mut alert = self.active.remove(&key)?;
        alert.current_value = value;
        alert.resolve(now);
        info!(alert_id = %alert.id, "Alert resolved: {}", alert.message);
        Some(AlertEvent {
            kind: AlertEventKind::Resolved,
            alert,
        })
    }

    /// Marks an active alert as acknowledged. Acknowledging an alert that is
    /// already acknowledged succeeds without a new event.
    pub fn acknowledge(&mut self, id: &str, now: DateTime<Utc>) -> Result<Option<AlertEvent>> {
        let alert = self
            .active
            .get_mut(id)
            .ok_or_else(|| Error::NotFound(format!("alert {}", id)))?;

        if alert.status == AlertStatus::Acknowledged {
            return Ok(None);
        }

        alert.acknowledge(now);
        info!(alert_id = %id, "Alert acknowledged");
        Ok(Some(AlertEvent {
            kind: AlertEventKind::Acknowledged,
            alert: alert.clone(),
        }))
    }

    /// Resolves and evicts every open alert raised by `rule_id`.
    pub fn resolve_rule(&mut self, rule_id: &str, now: DateTime<Utc>) -> Vec<AlertEvent> {
        let keys: Vec<String> = self
            .active
            .iter()
            .filter(|(_, alert)| alert.rule_id == rule_id)
            .map(|(key, _)| key.clone())
            .collect();

        keys.into_iter()
            .filter_map(|key| self.active.remove(&key))
            .map(|mut alert| {
                alert.resolve(now);
                AlertEvent {
                    kind: AlertEventKind::Resolved,
                    alert,
                }
            })
            .collect()
    }

    pub fn get(&self, id: &str) -> Option<&Alert> {
        self.active.get(id)
    }

    pub fn alerts(&self) -> impl Iterator<Item = &Alert> {
        self.active.values()
    }

    /// Open alerts matching the optional filters, oldest first.
    pub fn list(&self, status: Option<AlertStatus>, severity: Option<Severity>) -> Vec<Alert> {
        let mut alerts: Vec<Alert> = self
            .active
            .values()
            .filter(|a| status.map_or(true, |s| a.status == s))
            .filter(|a| severity.map_or(true, |s| a.severity == s))
            .cloned()
            .collect();
        alerts.sort_by(|a, b| a.started_at.cmp(&b.started_at).then_with(|| a.id.cmp(&b.id)));
        alerts
    }

    pub fn len(&self) -> usize {
        self.active.len()
    }

    pub fn is_empty(&self) -> bool {
        self.active.is_empty()
    }
}
