//! Bounded in-memory time series.
//!
//! Every series is a fixed-capacity ring of samples keyed by a free-form
//! dotted name (`system.cpu_percent`, `docker.container.web.cpu_percent`).
//! New names start a new series on first write. The total number of series
//! is capped, and series that stop receiving writes are swept after an idle
//! TTL so churn in dynamically named sources cannot grow the map forever.

mod config;
mod series;

pub use config::StoreConfig;
pub use series::{Sample, Series};

use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use tracing::debug;

pub struct MetricStore {
    config: StoreConfig,
    series: HashMap<String, Series>,
}

impl MetricStore {
    pub fn new(config: StoreConfig) -> Self {
        Self {
            config,
            series: HashMap::new(),
        }
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Appends one sample. Never fails; the oldest sample of a full series
    /// is dropped, and a brand-new series may displace the least recently
    /// written one when the series cap is reached.
    pub fn append(&mut self, name: &str, timestamp: DateTime<Utc>, value: f64) {
        if let Some(series) = self.series.get_mut(name) {
            series.push(Sample { timestamp, value });
            return;
        }

        if self.series.len() >= self.config.max_series {
            self.evict_least_recent();
        }

        let mut series = Series::new(self.config.series_capacity, timestamp);
        series.push(Sample { timestamp, value });
        self.series.insert(name.to_string(), series);
    }

    pub fn latest(&self, name: &str) -> Option<Sample> {
        self.series.get(name).and_then(Series::latest)
    }

    /// Newest sample of `name` strictly older than `t`.
    pub fn sample_before(&self, name: &str, t: DateTime<Utc>) -> Option<Sample> {
        self.series.get(name).and_then(|series| series.before(t))
    }

    /// Lazily yields samples of `name` within `[start, end]`, oldest first.
    /// Unknown names yield nothing.
    pub fn range(
        &self,
        name: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> impl Iterator<Item = Sample> + '_ {
        self.series
            .get(name)
            .into_iter()
            .flat_map(move |series| series.range(start, end))
    }

    /// Names of all series holding at least one sample, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .series
            .iter()
            .filter(|(_, series)| !series.is_empty())
            .map(|(name, _)| name.clone())
            .collect();
        names.sort();
        names
    }

    pub fn series(&self, name: &str) -> Option<&Series> {
        self.series.get(name)
    }

    pub fn len(&self) -> usize {
        self.series.len()
    }

    pub fn is_empty(&self) -> bool {
        self.series.is_empty()
    }

    /// Drops series whose last write is older than the idle TTL.
    pub fn evict_idle(&mut self, now: DateTime<Utc>) -> Vec<String> {
        let cutoff = now - Duration::seconds(self.config.idle_ttl_secs as i64);
        let stale: Vec<String> = self
            .series
            .iter()
            .filter(|(_, series)| series.last_write() < cutoff)
            .map(|(name, _)| name.clone())
            .collect();

        for name in &stale {
            self.series.remove(name);
        }
        if !stale.is_empty() {
            debug!(count = stale.len(), "Evicted idle series");
        }
        stale
    }

    fn evict_least_recent(&mut self) {
        let victim = self
            .series
            .iter()
            .min_by_key(|(_, series)| series.last_write())
            .map(|(name, _)| name.clone());

        if let Some(name) = victim {
            debug!(series = %name, "Series cap reached, evicting least recently written series");
            self.series.remove(&name);
        }
    }
}

impl Default for MetricStore {
    fn default() -> Self {
        Self::new(StoreConfig::default())
    }
}
