use lazy_static::lazy_static;
use prometheus::{
    register_int_counter_with_registry, register_int_gauge_with_registry, Encoder, IntCounter,
    IntGauge, Registry, TextEncoder,
};

use crate::{Error, Result};

lazy_static! {
    pub static ref REGISTRY: Registry = Registry::new();
    pub static ref SAMPLES_APPENDED_TOTAL: IntCounter = register_int_counter_with_registry!(
        "sysops_samples_appended_total",
        "Total number of samples appended to the metric store.",
        REGISTRY
    )
    .unwrap();
    pub static ref COLLECTOR_FAILURES_TOTAL: IntCounter = register_int_counter_with_registry!(
        "sysops_collector_failures_total",
        "Total number of failed or timed out collector and probe runs.",
        REGISTRY
    )
    .unwrap();
    pub static ref ALERTS_RAISED_TOTAL: IntCounter = register_int_counter_with_registry!(
        "sysops_alerts_raised_total",
        "Total number of alerts raised.",
        REGISTRY
    )
    .unwrap();
    pub static ref ALERTS_RESOLVED_TOTAL: IntCounter = register_int_counter_with_registry!(
        "sysops_alerts_resolved_total",
        "Total number of alerts resolved.",
        REGISTRY
    )
    .unwrap();
    pub static ref NOTIFICATIONS_FAILED_TOTAL: IntCounter = register_int_counter_with_registry!(
        "sysops_notifications_failed_total",
        "Total number of notifications that exhausted their retries.",
        REGISTRY
    )
    .unwrap();
    pub static ref ACTIVE_ALERTS: IntGauge = register_int_gauge_with_registry!(
        "sysops_active_alerts",
        "Number of open (active or acknowledged) alerts.",
        REGISTRY
    )
    .unwrap();
    pub static ref SERIES: IntGauge = register_int_gauge_with_registry!(
        "sysops_series",
        "Number of series held by the metric store.",
        REGISTRY
    )
    .unwrap();
}

/// Prometheus text exposition of every engine metric.
pub fn gather_metrics() -> Result<String> {
    let mut buffer = vec![];
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    encoder
        .encode(&metric_families, &mut buffer)
        .map_err(|e| Error::Internal(format!("failed to encode metrics: {}", e)))?;
    String::from_utf8(buffer).map_err(|e| Error::Internal(format!("metrics are not UTF-8: {}", e)))
}
