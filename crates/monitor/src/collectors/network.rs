use anyhow::Result;
use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use sysinfo::Networks;

use super::{refresh_blocking, Collector};

/// Cumulative per-interface counters. Loopback interfaces are skipped.
pub struct NetworkCollector {
    networks: Arc<Mutex<Networks>>,
}

impl NetworkCollector {
    pub fn new() -> Self {
        Self {
            networks: Arc::new(Mutex::new(Networks::new_with_refreshed_list())),
        }
    }
}

impl Default for NetworkCollector {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Collector for NetworkCollector {
    fn name(&self) -> &str {
        "network"
    }

    async fn sample(&self) -> Result<Vec<(String, f64)>> {
        refresh_blocking(&self.networks, |networks| {
            networks.refresh();

            let mut points = Vec::new();
            for (interface, data) in networks.iter() {
                if interface.starts_with("lo") {
                    continue;
                }
                points.push((format!("network.{}.bytes_sent", interface), data.total_transmitted() as f64));
                points.push((format!("network.{}.bytes_recv", interface), data.total_received() as f64));
                points.push((
                    format!("network.{}.packets_sent", interface),
                    data.total_packets_transmitted() as f64,
                ));
                points.push((
                    format!("network.{}.packets_recv", interface),
                    data.total_packets_received() as f64,
                ));
            }
            points
        })
        .await
    }
}
