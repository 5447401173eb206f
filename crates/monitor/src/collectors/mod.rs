//! Metric producers sampled on the collection cadence.
//!
//! Each [`Collector`] returns a flat list of `(series_name, value)` pairs;
//! the engine stamps them with the tick time and appends them to the store.
//! A collector that cannot read a metric leaves it out rather than failing
//! the whole sample.

pub mod docker;
pub mod host;
pub mod network;
pub mod process;
pub mod process_table;
pub mod services;

pub use docker::{DockerCli, DockerCollector};
pub use host::HostCollector;
pub use network::NetworkCollector;
pub use process::ProcessCollector;
pub use process_table::{ProcessRow, ProcessTable};
pub use services::ServiceCollector;

use anyhow::anyhow;
use async_trait::async_trait;
use std::sync::{Arc, Mutex};

use crate::config::MonitoringConfig;

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Collector: Send + Sync {
    /// Short name used in logs and failure counters (`"host"`, `"docker"`).
    fn name(&self) -> &str;

    async fn sample(&self) -> anyhow::Result<Vec<(String, f64)>>;
}

/// The collectors installed by the binary.
/// The process and service collectors read one shared process listing.
pub fn default_collectors(config: &MonitoringConfig) -> Vec<Box<dyn Collector>> {
    let processes = ProcessTable::new();
    vec![
        Box::new(HostCollector::new()),
        Box::new(NetworkCollector::new()),
        Box::new(ProcessCollector::new(processes.clone())),
        Box::new(DockerCollector::new(DockerCli::new(&config.docker_bin))),
        Box::new(ServiceCollector::new(config.services.clone(), processes)),
    ]
}

/// Runs `f` against the sampler state on the blocking pool. sysinfo
/// refreshes are synchronous; off the runtime workers a timed-out tick can
/// be abandoned while the refresh finishes in the background.
pub(crate) async fn refresh_blocking<S, T, F>(state: &Arc<Mutex<S>>, f: F) -> anyhow::Result<T>
where
    S: Send + 'static,
    T: Send + 'static,
    F: FnOnce(&mut S) -> T + Send + 'static,
{
    let state = Arc::clone(state);
    tokio::task::spawn_blocking(move || {
        let mut guard = state
            .lock()
            .map_err(|_| anyhow!("sampler lock poisoned"))?;
        Ok(f(&mut guard))
    })
    .await?
}

pub(crate) fn percent(part: f64, total: f64) -> f64 {
    if total > 0.0 {
        part / total * 100.0
    } else {
        0.0
    }
}
