use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use std::time::Instant;
use sysinfo::{Disks, System};
use tracing::warn;

use super::{HealthCheck, HealthProbe, HealthStatus, HealthThresholds};
use crate::collectors::host::disk_percent;
use crate::collectors::{percent, refresh_blocking, DockerCli};

struct SystemState {
    system: System,
    disks: Disks,
}

/// Host resource usage against the configured bands.
pub struct SystemProbe {
    state: Arc<Mutex<SystemState>>,
    thresholds: HealthThresholds,
}

impl SystemProbe {
    pub fn new(thresholds: HealthThresholds) -> Self {
        let mut system = System::new();
        system.refresh_cpu_all();
        Self {
            state: Arc::new(Mutex::new(SystemState {
                system,
                disks: Disks::new_with_refreshed_list(),
            })),
            thresholds,
        }
    }

    async fn read(&self) -> anyhow::Result<(f64, f64, f64)> {
        refresh_blocking(&self.state, |state| {
            state.system.refresh_cpu_all();
            state.system.refresh_memory();
            state.disks.refresh();
            (
                state.system.global_cpu_usage() as f64,
                percent(state.system.used_memory() as f64, state.system.total_memory() as f64),
                disk_percent(&state.disks).unwrap_or(0.0),
            )
        })
        .await
    }
}

/// Builds the `system` check from already-sampled percentages.
pub(crate) fn system_check(thresholds: &HealthThresholds, cpu: f64, memory: f64, disk: f64) -> HealthCheck {
    HealthCheck::new(
        "system",
        thresholds.classify(cpu, memory, disk),
        format!("CPU: {:.1}%, Memory: {:.1}%, Disk: {:.1}%", cpu, memory, disk),
    )
    .with_detail("cpu", cpu)
    .with_detail("memory", memory)
    .with_detail("disk", disk)
}

#[async_trait]
impl HealthProbe for SystemProbe {
    fn component(&self) -> &str {
        "system"
    }

    async fn probe(&self) -> HealthCheck {
        let started = Instant::now();
        match self.read().await {
            Ok((cpu, memory, disk)) => system_check(&self.thresholds, cpu, memory, disk)
                .with_response_time(started.elapsed().as_secs_f64() * 1000.0),
            Err(e) => {
                warn!(error = %e, "System sampler unavailable");
                HealthCheck::new("system", HealthStatus::Unknown, "system sampler unavailable")
            }
        }
    }
}

/// Container runtime reachability.
pub struct DockerProbe {
    cli: DockerCli,
}

impl DockerProbe {
    pub fn new(cli: DockerCli) -> Self {
        Self { cli }
    }
}

#[async_trait]
impl HealthProbe for DockerProbe {
    fn component(&self) -> &str {
        "docker"
    }

    async fn probe(&self) -> HealthCheck {
        let started = Instant::now();
        match self.cli.info().await {
            Ok(info) => {
                let message = if info.containers_running > 0 {
                    format!("Docker running with {} active containers", info.containers_running)
                } else {
                    "Docker running, no active containers".to_string()
                };
                HealthCheck::new("docker", HealthStatus::Healthy, message)
                    .with_response_time(started.elapsed().as_secs_f64() * 1000.0)
                    .with_detail("containers_running", info.containers_running)
                    .with_detail("containers_total", info.containers_total)
                    .with_detail("version", info.server_version)
            }
            Err(e) => HealthCheck::new(
                "docker",
                HealthStatus::Critical,
                format!("Docker not reachable: {}", e),
            ),
        }
    }
}
