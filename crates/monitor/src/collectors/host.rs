use anyhow::Result;
use async_trait::async_trait;
use std::path::Path;
use std::sync::{Arc, Mutex};
use sysinfo::{Disks, System};

use super::{percent, refresh_blocking, Collector};

struct HostState {
    system: System,
    disks: Disks,
}

pub struct HostCollector {
    state: Arc<Mutex<HostState>>,
}

impl HostCollector {
    pub fn new() -> Self {
        let mut system = System::new();
        system.refresh_cpu_all();
        Self {
            state: Arc::new(Mutex::new(HostState {
                system,
                disks: Disks::new_with_refreshed_list(),
            })),
        }
    }
}

impl Default for HostCollector {
    fn default() -> Self {
        Self::new()
    }
}

/// Usage percent of the root filesystem, or of the largest disk when no
/// disk is mounted at `/`.
pub(crate) fn disk_percent(disks: &Disks) -> Option<f64> {
    let disk = disks
        .iter()
        .find(|d| d.mount_point() == Path::new("/"))
        .or_else(|| disks.iter().max_by_key(|d| d.total_space()))?;

    let total = disk.total_space();
    let used = total.saturating_sub(disk.available_space());
    Some(percent(used as f64, total as f64))
}

#[async_trait]
impl Collector for HostCollector {
    fn name(&self) -> &str {
        "host"
    }

    async fn sample(&self) -> Result<Vec<(String, f64)>> {
        let mut points = refresh_blocking(&self.state, |state| {
            state.system.refresh_cpu_all();
            state.system.refresh_memory();
            state.disks.refresh();

            let mut points = vec![
                ("system.cpu_percent".to_string(), state.system.global_cpu_usage() as f64),
                (
                    "system.memory_percent".to_string(),
                    percent(state.system.used_memory() as f64, state.system.total_memory() as f64),
                ),
            ];
            if let Some(pct) = disk_percent(&state.disks) {
                points.push(("system.disk_percent".to_string(), pct));
            }
            points
        })
        .await?;

        points.push(("system.load_1m".to_string(), System::load_average().one));
        points.push(("system.uptime_seconds".to_string(), System::uptime() as f64));

        Ok(points)
    }
}
