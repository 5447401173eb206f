use chrono::{DateTime, Duration, Utc};
use std::collections::BTreeMap;
use tracing::info;

use super::rule::{default_rules, AlertRule};
use crate::store::MetricStore;
use crate::{Error, Result};

/// Verdict for one rule against the current store contents.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EvaluationResult {
    pub condition_met: bool,
    pub current_value: Option<f64>,
    pub duration_satisfied: bool,
}

impl EvaluationResult {
    pub fn no_data() -> Self {
        Self {
            condition_met: false,
            current_value: None,
            duration_satisfied: false,
        }
    }

    pub fn should_fire(&self) -> bool {
        self.condition_met && self.duration_satisfied
    }
}

/// Evaluates `rule` against the latest sample of its metric and, when the
/// rule carries a duration, against every sample of the trailing window.
///
/// Pure: nothing is mutated. A missing series or a disabled rule produces
/// [`EvaluationResult::no_data`].
pub fn evaluate_rule(rule: &AlertRule, store: &MetricStore, now: DateTime<Utc>) -> EvaluationResult {
    if !rule.enabled {
        return EvaluationResult::no_data();
    }

    let Some(latest) = store.latest(&rule.metric) else {
        return EvaluationResult::no_data();
    };

    let condition_met = rule.matches(latest.value);
    let duration_satisfied = if !condition_met {
        false
    } else if rule.duration_seconds == 0 {
        true
    } else {
        held_for_duration(rule, store, now)
    };

    EvaluationResult {
        condition_met,
        current_value: Some(latest.value),
        duration_satisfied,
    }
}

/// Every sample in `[now - duration, now]` must breach, and at least two
/// breaching samples must back the window. The last sample before the
/// window start counts as one of the two when it breaches and is no older
/// than `now - 2 * duration`: samples taken at a cadence equal to the
/// duration land just outside the window edge.
fn held_for_duration(rule: &AlertRule, store: &MetricStore, now: DateTime<Utc>) -> bool {
    let Some(start) = window_start(now, rule.duration_seconds) else {
        return false;
    };

    let mut seen = 0usize;
    for sample in store.range(&rule.metric, start, now) {
        if !rule.matches(sample.value) {
            return false;
        }
        seen += 1;
    }

    let edge = window_start(start, rule.duration_seconds)
        .and_then(|oldest| {
            store
                .sample_before(&rule.metric, start)
                .filter(|s| s.timestamp >= oldest)
        })
        .is_some_and(|s| rule.matches(s.value));

    seen + usize::from(edge) >= 2
}

/// `now - secs`, or `None` when that instant is not representable.
fn window_start(now: DateTime<Utc>, secs: u64) -> Option<DateTime<Utc>> {
    let secs = i64::try_from(secs).ok()?;
    now.checked_sub_signed(Duration::try_seconds(secs)?)
}

/// The configured rule set, keyed by rule id.
#[derive(Debug, Clone, Default)]
pub struct RuleEngine {
    rules: BTreeMap<String, AlertRule>,
}

impl RuleEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_default_rules() -> Self {
        let mut engine = Self::new();
        for rule in default_rules() {
            engine.rules.insert(rule.id.clone(), rule);
        }
        engine
    }

    /// Inserts or replaces the rule with the same id. Returns the replaced rule.
    pub fn upsert(&mut self, rule: AlertRule) -> Result<Option<AlertRule>> {
        rule.validate()?;
        info!(rule_id = %rule.id, metric = %rule.metric, "Storing alert rule");
        Ok(self.rules.insert(rule.id.clone(), rule))
    }

    pub fn remove(&mut self, id: &str) -> Result<AlertRule> {
        self.rules
            .remove(id)
            .ok_or_else(|| Error::NotFound(format!("alert rule {}", id)))
    }

    pub fn get(&self, id: &str) -> Option<&AlertRule> {
        self.rules.get(id)
    }

    pub fn rules(&self) -> impl Iterator<Item = &AlertRule> {
        self.rules.values()
    }

    /// Copy of the enabled rules.
    pub fn enabled_rules(&self) -> Vec<AlertRule> {
        self.rules.values().filter(|r| r.enabled).cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alerting::rule::{Condition, Severity};
    use crate::store::StoreConfig;
    use chrono::TimeZone;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    fn cpu_rule(duration: u64) -> AlertRule {
        AlertRule::new(
            "high_cpu",
            "High CPU Usage",
            "system.cpu_percent",
            Condition::GreaterThan,
            80.0,
            Severity::High,
        )
        .with_duration(duration)
    }

    fn store_with(points: &[(i64, f64)]) -> MetricStore {
        let mut store = MetricStore::new(StoreConfig::default());
        for (t, v) in points {
            store.append("system.cpu_percent", at(*t), *v);
        }
        store
    }

    #[test]
    fn missing_series_does_not_fire() {
        let store = MetricStore::default();
        let result = evaluate_rule(&cpu_rule(0), &store, at(0));
        assert_eq!(result, EvaluationResult::no_data());
    }

    #[test]
    fn zero_duration_fires_on_first_breach() {
        let store = store_with(&[(0, 95.0)]);
        let result = evaluate_rule(&cpu_rule(0), &store, at(0));
        assert!(result.condition_met);
        assert!(result.should_fire());
        assert_eq!(result.current_value, Some(95.0));
    }

    #[test]
    fn single_sample_in_window_is_not_enough() {
        let store = store_with(&[(0, 50.0), (300, 95.0)]);
        let result = evaluate_rule(&cpu_rule(120), &store, at(300));
        assert!(result.condition_met);
        assert!(!result.duration_satisfied);
        assert!(!result.should_fire());
    }

    #[test]
    fn every_sample_in_window_must_hold() {
        let store = store_with(&[(0, 95.0), (60, 70.0), (120, 94.0)]);
        let result = evaluate_rule(&cpu_rule(120), &store, at(120));
        assert!(result.condition_met);
        assert!(!result.duration_satisfied);
    }

    #[test]
    fn sustained_breach_satisfies_duration() {
        let store = store_with(&[(0, 95.0), (60, 96.0), (120, 94.0)]);
        let result = evaluate_rule(&cpu_rule(120), &store, at(120));
        assert!(result.should_fire());
        assert_eq!(result.current_value, Some(94.0));
    }

    #[test]
    fn samples_before_window_are_ignored() {
        let store = store_with(&[(0, 10.0), (200, 95.0), (260, 96.0)]);
        let result = evaluate_rule(&cpu_rule(120), &store, at(260));
        assert!(result.should_fire());
    }

    fn at_ms(ms: i64) -> DateTime<Utc> {
        at(0) + Duration::milliseconds(ms)
    }

    #[test]
    fn breaching_sample_just_outside_window_counts() {
        let mut store = MetricStore::new(StoreConfig::default());
        store.append("system.cpu_percent", at_ms(0), 95.0);
        store.append("system.cpu_percent", at_ms(60_004), 96.0);

        let result = evaluate_rule(&cpu_rule(60), &store, at_ms(60_009));
        assert!(result.should_fire());
    }

    #[test]
    fn healthy_sample_before_window_does_not_count() {
        let mut store = MetricStore::new(StoreConfig::default());
        store.append("system.cpu_percent", at_ms(0), 40.0);
        store.append("system.cpu_percent", at_ms(60_004), 96.0);

        let result = evaluate_rule(&cpu_rule(60), &store, at_ms(60_009));
        assert!(result.condition_met);
        assert!(!result.duration_satisfied);
    }

    #[test]
    fn unrepresentable_window_is_not_satisfied() {
        let store = store_with(&[(0, 95.0), (60, 96.0)]);
        let result = evaluate_rule(&cpu_rule(u64::MAX), &store, at(60));
        assert!(result.condition_met);
        assert!(!result.duration_satisfied);

        let result = evaluate_rule(&cpu_rule(10_000_000_000_000), &store, at(60));
        assert!(!result.duration_satisfied);
    }

    #[test]
    fn disabled_rule_is_skipped() {
        let store = store_with(&[(0, 95.0)]);
        let result = evaluate_rule(&cpu_rule(0).disabled(), &store, at(0));
        assert_eq!(result, EvaluationResult::no_data());
    }

    #[test]
    fn upsert_is_idempotent_by_id() {
        let mut engine = RuleEngine::new();
        engine.upsert(cpu_rule(0)).unwrap();
        let mut replacement = cpu_rule(60);
        replacement.threshold = 75.0;
        let previous = engine.upsert(replacement).unwrap();

        assert!(previous.is_some());
        assert_eq!(engine.len(), 1);
        assert_eq!(engine.get("high_cpu").unwrap().threshold, 75.0);
    }

    #[test]
    fn remove_unknown_rule_is_not_found() {
        let mut engine = RuleEngine::with_default_rules();
        assert!(matches!(engine.remove("nope"), Err(Error::NotFound(_))));
        assert!(engine.remove("high_cpu").is_ok());
        assert_eq!(engine.len(), 3);
    }

    #[test]
    fn enabled_rules_excludes_disabled() {
        let mut engine = RuleEngine::with_default_rules();
        let mut rule = engine.get("disk_full").unwrap().clone();
        rule.enabled = false;
        engine.upsert(rule).unwrap();

        let ids: Vec<String> = engine.enabled_rules().into_iter().map(|r| r.id).collect();
        assert_eq!(ids, vec!["docker_down", "high_cpu", "high_memory"]);
    }
}
