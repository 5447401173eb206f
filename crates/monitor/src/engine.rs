//! The monitoring engine: shared state plus the operations exposed to the
//! HTTP layer.
//!
//! State lives behind `tokio` read/write locks. The scheduler is the only
//! writer of the store and the alert set; API handlers take short read
//! locks and never wait on collector or probe I/O. Where more than one lock
//! is needed they are taken in the order store, rules, alerts, health.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::alerting::{
    evaluate_rule, Alert, AlertEvent, AlertEventKind, AlertLifecycleManager, AlertRule,
    AlertRuleRequest, AlertStatus, EvaluationResult, RuleEngine, Severity,
};
use crate::collectors::{self, Collector, DockerCli};
use crate::config::{Config, MonitoringConfig};
use crate::health::{
    DockerProbe, HealthAggregator, HealthCheck, HealthProbe, HealthStatus, MonitoringOverview,
    SystemProbe,
};
use crate::metrics;
use crate::notify::{self, Dispatcher, Notifier};
use crate::store::{MetricStore, Sample};
use crate::{Error, Result};

/// Latest value of one series.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CurrentValue {
    pub value: f64,
    pub timestamp: DateTime<Utc>,
}

impl From<Sample> for CurrentValue {
    fn from(sample: Sample) -> Self {
        Self {
            value: sample.value,
            timestamp: sample.timestamp,
        }
    }
}

/// Parameters of a series query. Every field is optional.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MetricsQuery {
    #[serde(default)]
    pub start_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub end_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub metrics: Option<Vec<String>>,
    #[serde(default)]
    pub labels: Option<HashMap<String, String>>,
    /// Bucket width in seconds; the last sample of each bucket is kept.
    #[serde(default)]
    pub step: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricSeries {
    pub metric_name: String,
    pub labels: HashMap<String, String>,
    pub values: Vec<(DateTime<Utc>, f64)>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DashboardSummary {
    pub cpu_usage: f64,
    pub memory_usage: f64,
    pub disk_usage: f64,
    pub docker_containers: f64,
    pub active_alerts: usize,
    pub critical_alerts: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Dashboard {
    pub summary: DashboardSummary,
    pub metrics: BTreeMap<String, CurrentValue>,
    pub alerts: Vec<Alert>,
    pub components: Vec<HealthCheck>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitoringStats {
    pub system_status: HealthStatus,
    pub total_metrics: usize,
    pub active_alerts: usize,
    pub critical_alerts: usize,
    pub services_monitored: usize,
    pub uptime_hours: f64,
    pub collection_interval: u64,
    pub last_collection: Option<DateTime<Utc>>,
}

/// What one sampling tick did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CollectionReport {
    pub samples: usize,
    pub failed_collectors: usize,
    pub probes: usize,
    pub evicted_series: usize,
}

pub struct MonitoringEngine {
    config: MonitoringConfig,
    store: RwLock<MetricStore>,
    rules: RwLock<RuleEngine>,
    alerts: RwLock<AlertLifecycleManager>,
    health: RwLock<HealthAggregator>,
    last_collection: RwLock<Option<DateTime<Utc>>>,
    collectors: Vec<Box<dyn Collector>>,
    probes: Vec<Box<dyn HealthProbe>>,
    dispatcher: Dispatcher,
}

impl MonitoringEngine {
    /// Empty engine with the default alert rules and no producers.
    pub fn new(config: MonitoringConfig, dispatcher: Dispatcher) -> Self {
        Self {
            store: RwLock::new(MetricStore::new(config.store)),
            rules: RwLock::new(RuleEngine::with_default_rules()),
            alerts: RwLock::new(AlertLifecycleManager::new()),
            health: RwLock::new(HealthAggregator::new()),
            last_collection: RwLock::new(None),
            collectors: Vec::new(),
            probes: Vec::new(),
            dispatcher,
            config,
        }
    }

    /// Engine wired with the built-in collectors and probes and the notifier
    /// selected by the callback configuration.
    pub fn from_config(config: &Config) -> Result<Self> {
        let notifier: Arc<dyn Notifier> = notify::notifier_from_config(&config.callbacks)?;
        let dispatcher = Dispatcher::new(notifier, config.callbacks.clone());
        let monitoring = config.monitoring.clone();

        let mut engine = Self::new(monitoring.clone(), dispatcher);
        for collector in collectors::default_collectors(&monitoring) {
            engine = engine.with_collector(collector);
        }
        Ok(engine
            .with_probe(Box::new(SystemProbe::new(monitoring.thresholds)))
            .with_probe(Box::new(DockerProbe::new(DockerCli::new(&monitoring.docker_bin)))))
    }

    pub fn with_collector(mut self, collector: Box<dyn Collector>) -> Self {
        self.collectors.push(collector);
        self
    }

    pub fn with_probe(mut self, probe: Box<dyn HealthProbe>) -> Self {
        self.probes.push(probe);
        self
    }

    pub fn with_rules(mut self, rules: RuleEngine) -> Self {
        self.rules = RwLock::new(rules);
        self
    }

    pub fn config(&self) -> &MonitoringConfig {
        &self.config
    }

    // ----- scheduler side -----

    /// One sampling tick: every collector, then every probe, each under the
    /// collector timeout. A failing or slow producer is skipped for this
    /// tick only.
    pub async fn run_collection_cycle(&self) -> CollectionReport {
        let now = Utc::now();
        let limit = self.config.collector_timeout();
        let mut report = CollectionReport::default();
        let mut batch: Vec<Vec<(String, f64)>> = Vec::with_capacity(self.collectors.len());

        for collector in &self.collectors {
            match timeout(limit, collector.sample()).await {
                Ok(Ok(points)) => batch.push(points),
                Ok(Err(e)) => {
                    report.failed_collectors += 1;
                    metrics::COLLECTOR_FAILURES_TOTAL.inc();
                    warn!(collector = collector.name(), error = %e, "Collector failed");
                }
                Err(_) => {
                    report.failed_collectors += 1;
                    metrics::COLLECTOR_FAILURES_TOTAL.inc();
                    warn!(
                        collector = collector.name(),
                        timeout_secs = limit.as_secs(),
                        "Collector timed out"
                    );
                }
            }
        }

        report.samples = self.ingest(batch.into_iter().flatten(), now).await;
        report.evicted_series = {
            let mut store = self.store.write().await;
            let evicted = store.evict_idle(now).len();
            metrics::SERIES.set(store.len() as i64);
            evicted
        };
        report.probes = self.run_probes().await;
        *self.last_collection.write().await = Some(now);

        debug!(
            samples = report.samples,
            failed = report.failed_collectors,
            probes = report.probes,
            "Collection cycle finished"
        );
        report
    }

    /// Appends a batch of samples stamped `at` under a single write lock.
    /// Non-finite values are dropped. Returns the number appended.
    pub async fn ingest(
        &self,
        samples: impl IntoIterator<Item = (String, f64)>,
        at: DateTime<Utc>,
    ) -> usize {
        let mut store = self.store.write().await;
        let mut appended = 0;
        for (name, value) in samples {
            if !value.is_finite() {
                debug!(series = %name, "Dropping non-finite sample");
                continue;
            }
            store.append(&name, at, value);
            appended += 1;
        }
        metrics::SAMPLES_APPENDED_TOTAL.inc_by(appended as u64);
        metrics::SERIES.set(store.len() as i64);
        appended
    }

    async fn run_probes(&self) -> usize {
        let limit = self.config.collector_timeout();
        let mut checks = Vec::with_capacity(self.probes.len());

        for probe in &self.probes {
            match timeout(limit, probe.probe()).await {
                Ok(check) => {
                    if check.status != HealthStatus::Healthy {
                        debug!(component = %check.component, status = %check.status, "Component not healthy");
                    }
                    checks.push(check);
                }
                Err(_) => {
                    metrics::COLLECTOR_FAILURES_TOTAL.inc();
                    warn!(component = probe.component(), "Health probe timed out");
                    checks.push(HealthCheck::timed_out(probe.component(), limit.as_secs()));
                }
            }
        }

        let count = checks.len();
        let mut health = self.health.write().await;
        for check in checks {
            health.record(check);
        }
        count
    }

    pub async fn run_alert_cycle(&self) -> Vec<AlertEvent> {
        self.evaluate_alerts(Utc::now()).await
    }

    /// Evaluates every enabled rule as of `now` and applies the verdicts.
    /// Notifications for the resulting transitions are queued in order.
    ///
    /// The rules read lock is held until the verdicts are applied, so a rule
    /// removed concurrently either resolves the alert this cycle raised or
    /// is never applied at all.
    pub async fn evaluate_alerts(&self, now: DateTime<Utc>) -> Vec<AlertEvent> {
        let store = self.store.read().await;
        let rules = self.rules.read().await;
        let verdicts: Vec<(&AlertRule, EvaluationResult)> = rules
            .rules()
            .filter(|rule| rule.enabled)
            .map(|rule| (rule, evaluate_rule(rule, &store, now)))
            .collect();
        drop(store);

        let events: Vec<AlertEvent> = {
            let mut alerts = self.alerts.write().await;
            let events = verdicts
                .iter()
                .filter_map(|(rule, verdict)| alerts.apply(rule, verdict, now))
                .collect();
            metrics::ACTIVE_ALERTS.set(alerts.len() as i64);
            events
        };
        drop(verdicts);
        drop(rules);

        for event in &events {
            match event.kind {
                AlertEventKind::Raised => metrics::ALERTS_RAISED_TOTAL.inc(),
                AlertEventKind::Resolved => metrics::ALERTS_RESOLVED_TOTAL.inc(),
                AlertEventKind::Acknowledged => {}
            }
        }
        self.dispatcher.deliver_all(&events);
        events
    }

    /// Waits for queued notifications to be attempted, bounded by the
    /// shutdown timeout.
    pub async fn flush_notifications(&self) -> bool {
        self.dispatcher.flush(self.config.shutdown_timeout()).await
    }

    // ----- API side -----

    pub async fn current_metrics(&self) -> BTreeMap<String, CurrentValue> {
        let store = self.store.read().await;
        store
            .names()
            .into_iter()
            .filter_map(|name| store.latest(&name).map(|s| (name, s.into())))
            .collect()
    }

    pub async fn metric_series(&self, query: MetricsQuery) -> Vec<MetricSeries> {
        let end = query.end_time.unwrap_or_else(Utc::now);
        let start = query.start_time.unwrap_or(end - Duration::hours(1));
        let labels = query.labels.unwrap_or_default();
        let step = query.step.filter(|s| *s > 0);

        let store = self.store.read().await;
        let names = query.metrics.unwrap_or_else(|| store.names());

        names
            .into_iter()
            .filter_map(|name| {
                let samples = store.range(&name, start, end);
                let values = match step {
                    Some(step) => downsample(samples, start, step),
                    None => samples.map(|s| (s.timestamp, s.value)).collect(),
                };
                if values.is_empty() {
                    return None;
                }
                Some(MetricSeries {
                    metric_name: name,
                    labels: labels.clone(),
                    values,
                })
            })
            .collect()
    }

    pub async fn metric_names(&self) -> Vec<String> {
        self.store.read().await.names()
    }

    pub async fn list_alerts(
        &self,
        status: Option<AlertStatus>,
        severity: Option<Severity>,
    ) -> Vec<Alert> {
        self.alerts.read().await.list(status, severity)
    }

    /// Validates and stores a rule, replacing any rule with the same id.
    /// Takes effect from the next alert cycle. A duration longer than the
    /// store retains at the collection cadence is rejected.
    pub async fn add_alert_rule(&self, request: AlertRuleRequest) -> Result<String> {
        let rule = AlertRule::try_from(request)?;
        let retained = self.retained_window_secs();
        if rule.duration_seconds > retained {
            return Err(Error::Config(format!(
                "rule '{}' duration {}s exceeds the {}s of samples retained",
                rule.id, rule.duration_seconds, retained
            )));
        }

        let id = rule.id.clone();
        self.rules.write().await.upsert(rule.clone())?;
        self.dispatcher.rule_created(&rule);
        Ok(id)
    }

    fn retained_window_secs(&self) -> u64 {
        (self.config.store.series_capacity as u64).saturating_mul(self.config.collection_interval_secs)
    }

    pub async fn list_alert_rules(&self) -> Vec<AlertRule> {
        self.rules.read().await.rules().cloned().collect()
    }

    /// Deletes a rule and resolves any alert it still holds open.
    pub async fn remove_alert_rule(&self, id: &str) -> Result<AlertRule> {
        let rule = self.rules.write().await.remove(id)?;
        let events = {
            let mut alerts = self.alerts.write().await;
            let events = alerts.resolve_rule(id, Utc::now());
            metrics::ACTIVE_ALERTS.set(alerts.len() as i64);
            events
        };
        metrics::ALERTS_RESOLVED_TOTAL.inc_by(events.len() as u64);
        info!(rule_id = %id, resolved = events.len(), "Alert rule removed");
        self.dispatcher.deliver_all(&events);
        Ok(rule)
    }

    pub async fn acknowledge_alert(&self, id: &str) -> Result<()> {
        let event = self.alerts.write().await.acknowledge(id, Utc::now())?;
        if let Some(event) = event {
            self.dispatcher.deliver(&event);
        }
        Ok(())
    }

    pub async fn overview(&self) -> MonitoringOverview {
        let alerts = self.alerts.read().await;
        let health = self.health.read().await;
        health.overview(alerts.alerts(), Utc::now())
    }

    pub async fn component_health(&self, name: &str) -> Result<HealthCheck> {
        self.health.read().await.component(name)
    }

    pub async fn components(&self) -> Vec<HealthCheck> {
        self.health.read().await.components()
    }

    pub async fn dashboard(&self) -> Dashboard {
        let metrics = self.current_metrics().await;
        let alerts = self.list_alerts(None, None).await;
        let components = self.components().await;
        let gauge = |name: &str| metrics.get(name).map(|v| v.value).unwrap_or(0.0);

        let summary = DashboardSummary {
            cpu_usage: gauge("system.cpu_percent"),
            memory_usage: gauge("system.memory_percent"),
            disk_usage: gauge("system.disk_percent"),
            docker_containers: gauge("docker.containers_running"),
            active_alerts: alerts.len(),
            critical_alerts: alerts
                .iter()
                .filter(|a| a.severity == Severity::Critical)
                .count(),
        };

        Dashboard {
            summary,
            metrics,
            alerts,
            components,
        }
    }

    pub async fn stats(&self) -> MonitoringStats {
        let overview = self.overview().await;
        let metrics = self.current_metrics().await;
        let uptime_seconds = metrics
            .get("system.uptime_seconds")
            .map(|v| v.value)
            .unwrap_or(0.0);

        MonitoringStats {
            system_status: overview.system_status,
            total_metrics: metrics.len(),
            active_alerts: overview.active_alerts,
            critical_alerts: overview.critical_alerts,
            services_monitored: overview.components.len(),
            uptime_hours: uptime_seconds / 3600.0,
            collection_interval: self.config.collection_interval_secs,
            last_collection: *self.last_collection.read().await,
        }
    }
}

/// Keeps the last sample of each `step`-second bucket, buckets aligned to
/// `start`.
fn downsample(
    samples: impl Iterator<Item = Sample>,
    start: DateTime<Utc>,
    step: u64,
) -> Vec<(DateTime<Utc>, f64)> {
    let step = step as i64;
    let mut out: Vec<(i64, DateTime<Utc>, f64)> = Vec::new();
    for sample in samples {
        let bucket = (sample.timestamp - start).num_seconds().div_euclid(step);
        match out.last_mut() {
            Some(last) if last.0 == bucket => *last = (bucket, sample.timestamp, sample.value),
            _ => out.push((bucket, sample.timestamp, sample.value)),
        }
    }
    out.into_iter().map(|(_, ts, v)| (ts, v)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alerting::Condition;
    use crate::collectors::MockCollector;
    use crate::config::CallbackConfig;
    use crate::health::MockHealthProbe;
    use crate::notify::MockNotifier;
    use async_trait::async_trait;
    use chrono::TimeZone;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    fn quiet_notifier() -> Arc<dyn Notifier> {
        let mut notifier = MockNotifier::new();
        notifier.expect_name().return_const("mock".to_string());
        notifier.expect_send().return_const(true);
        Arc::new(notifier)
    }

    fn engine() -> MonitoringEngine {
        let dispatcher = Dispatcher::new(quiet_notifier(), CallbackConfig::default());
        MonitoringEngine::new(MonitoringConfig::default(), dispatcher)
    }

    fn cpu_rule(duration: u64) -> AlertRuleRequest {
        serde_json::from_value(serde_json::json!({
            "id": "high_cpu",
            "name": "High CPU Usage",
            "description": "CPU usage above 80%",
            "metric": "system.cpu_percent",
            "condition": ">",
            "threshold": 80.0,
            "severity": "high",
            "duration_seconds": duration
        }))
        .unwrap()
    }

    #[test]
    fn downsample_keeps_last_sample_per_bucket() {
        let samples = vec![
            Sample { timestamp: at(0), value: 1.0 },
            Sample { timestamp: at(30), value: 2.0 },
            Sample { timestamp: at(60), value: 3.0 },
            Sample { timestamp: at(170), value: 4.0 },
        ];
        let values = downsample(samples.into_iter(), at(0), 60);
        assert_eq!(values, vec![(at(30), 2.0), (at(60), 3.0), (at(170), 4.0)]);
    }

    #[tokio::test]
    async fn collection_cycle_isolates_failing_collectors() {
        let mut good = MockCollector::new();
        good.expect_name().return_const("host".to_string());
        good.expect_sample()
            .returning(|| Ok(vec![("system.cpu_percent".to_string(), 42.0), ("system.load_1m".to_string(), f64::NAN)]));

        let mut bad = MockCollector::new();
        bad.expect_name().return_const("docker".to_string());
        bad.expect_sample().returning(|| Err(anyhow::anyhow!("daemon gone")));

        let mut probe = MockHealthProbe::new();
        probe.expect_component().return_const("system".to_string());
        probe
            .expect_probe()
            .returning(|| HealthCheck::new("system", HealthStatus::Healthy, "ok"));

        let engine = engine()
            .with_collector(Box::new(bad))
            .with_collector(Box::new(good))
            .with_probe(Box::new(probe));

        let report = engine.run_collection_cycle().await;
        assert_eq!(report.samples, 1);
        assert_eq!(report.failed_collectors, 1);
        assert_eq!(report.probes, 1);

        let current = engine.current_metrics().await;
        assert_eq!(current.len(), 1);
        assert_eq!(current["system.cpu_percent"].value, 42.0);
        assert_eq!(
            engine.component_health("system").await.unwrap().status,
            HealthStatus::Healthy
        );
        assert!(engine.stats().await.last_collection.is_some());
    }

    struct StuckProbe;

    #[async_trait]
    impl HealthProbe for StuckProbe {
        fn component(&self) -> &str {
            "docker"
        }

        async fn probe(&self) -> HealthCheck {
            tokio::time::sleep(std::time::Duration::from_secs(3600)).await;
            HealthCheck::new("docker", HealthStatus::Healthy, "late")
        }
    }

    #[tokio::test(start_paused = true)]
    async fn slow_probe_is_recorded_as_unknown() {
        let engine = engine().with_probe(Box::new(StuckProbe));
        engine.run_collection_cycle().await;

        let check = engine.component_health("docker").await.unwrap();
        assert_eq!(check.status, HealthStatus::Unknown);
    }

    #[tokio::test]
    async fn zero_duration_rule_fires_on_first_breach() {
        let engine = engine().with_rules(RuleEngine::new());
        engine.add_alert_rule(cpu_rule(0)).await.unwrap();
        engine
            .ingest(vec![("system.cpu_percent".to_string(), 91.0)], at(0))
            .await;

        let events = engine.evaluate_alerts(at(0)).await;
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind, AlertEventKind::Raised);
        assert_eq!(engine.list_alerts(None, None).await.len(), 1);

        // Still breaching: no new event, value refreshed.
        engine
            .ingest(vec![("system.cpu_percent".to_string(), 93.0)], at(30))
            .await;
        assert!(engine.evaluate_alerts(at(30)).await.is_empty());
        assert_eq!(engine.list_alerts(None, None).await[0].current_value, 93.0);
    }

    #[tokio::test]
    async fn invalid_rule_is_rejected_and_not_stored() {
        let engine = engine();
        let mut request = cpu_rule(0);
        request.condition = "=>".to_string();

        assert!(matches!(
            engine.add_alert_rule(request).await,
            Err(crate::Error::Config(_))
        ));
        assert_eq!(engine.list_alert_rules().await.len(), 4);
    }

    #[tokio::test]
    async fn durations_beyond_the_retained_window_are_rejected() {
        let engine = engine();
        for duration in [10_000_000_000_000, 24 * 60 * 60 + 1] {
            assert!(matches!(
                engine.add_alert_rule(cpu_rule(duration)).await,
                Err(crate::Error::Config(_))
            ));
        }
        engine.add_alert_rule(cpu_rule(24 * 60 * 60)).await.unwrap();

        // The remaining rules keep evaluating in the same cycle.
        engine
            .ingest(vec![("system.disk_percent".to_string(), 97.0)], at(0))
            .await;
        engine
            .ingest(vec![("system.disk_percent".to_string(), 98.0)], at(60))
            .await;
        let events = engine.evaluate_alerts(at(60)).await;
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].alert.rule_id, "disk_full");
    }

    #[tokio::test]
    async fn rule_removed_mid_cycle_leaves_no_orphan_alert() {
        let engine = Arc::new(engine().with_rules(RuleEngine::new()));
        engine.add_alert_rule(cpu_rule(0)).await.unwrap();
        engine
            .ingest(vec![("system.cpu_percent".to_string(), 99.0)], at(0))
            .await;

        let store = engine.store.write().await;
        let cycle = tokio::spawn({
            let engine = engine.clone();
            async move { engine.evaluate_alerts(at(0)).await }
        });
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;

        engine.remove_alert_rule("high_cpu").await.unwrap();
        drop(store);

        assert!(cycle.await.unwrap().is_empty());
        assert!(engine.list_alerts(None, None).await.is_empty());
    }

    #[tokio::test]
    async fn removing_a_rule_resolves_its_alert() {
        let engine = engine().with_rules(RuleEngine::new());
        engine.add_alert_rule(cpu_rule(0)).await.unwrap();
        engine
            .ingest(vec![("system.cpu_percent".to_string(), 99.0)], at(0))
            .await;
        engine.evaluate_alerts(at(0)).await;

        let removed = engine.remove_alert_rule("high_cpu").await.unwrap();
        assert_eq!(removed.condition, Condition::GreaterThan);
        assert!(engine.list_alerts(None, None).await.is_empty());
        assert!(matches!(
            engine.remove_alert_rule("high_cpu").await,
            Err(crate::Error::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn series_query_defaults_and_labels() {
        let engine = engine();
        let now = Utc::now();
        engine
            .ingest(vec![("system.cpu_percent".to_string(), 10.0)], now - Duration::hours(2))
            .await;
        engine
            .ingest(
                vec![
                    ("system.cpu_percent".to_string(), 20.0),
                    ("system.memory_percent".to_string(), 30.0),
                ],
                now - Duration::minutes(5),
            )
            .await;

        let all = engine.metric_series(MetricsQuery::default()).await;
        assert_eq!(all.len(), 2);
        let cpu = all.iter().find(|s| s.metric_name == "system.cpu_percent").unwrap();
        assert_eq!(cpu.values.len(), 1);
        assert_eq!(cpu.values[0].1, 20.0);

        let query = MetricsQuery {
            metrics: Some(vec!["system.memory_percent".to_string(), "nope".to_string()]),
            labels: Some(HashMap::from([("host".to_string(), "edge-1".to_string())])),
            ..MetricsQuery::default()
        };
        let filtered = engine.metric_series(query).await;
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered[0].labels["host"], "edge-1");
    }

    #[tokio::test]
    async fn dashboard_summarises_gauges() {
        let engine = engine();
        engine
            .ingest(
                vec![
                    ("system.cpu_percent".to_string(), 12.5),
                    ("docker.containers_running".to_string(), 3.0),
                ],
                at(0),
            )
            .await;

        let dashboard = engine.dashboard().await;
        assert_eq!(dashboard.summary.cpu_usage, 12.5);
        assert_eq!(dashboard.summary.memory_usage, 0.0);
        assert_eq!(dashboard.summary.docker_containers, 3.0);
        assert_eq!(dashboard.metrics.len(), 2);
    }
}
