use anyhow::Result;
use async_trait::async_trait;

use super::{Collector, ProcessTable};

const TOP_N: usize = 10;
const MIN_PERCENT: f64 = 1.0;

/// Busiest processes by CPU, ranked. Slot `i` of `process.top_cpu.<i>.*`
/// holds whichever process ranks `i` on this tick.
pub struct ProcessCollector {
    processes: ProcessTable,
}

impl ProcessCollector {
    pub fn new(processes: ProcessTable) -> Self {
        Self { processes }
    }
}

pub(crate) fn rank_by_cpu(mut usage: Vec<(f64, f64)>) -> Vec<(f64, f64)> {
    usage.retain(|(cpu, mem)| *cpu > MIN_PERCENT || *mem > MIN_PERCENT);
    usage.sort_by(|a, b| b.0.total_cmp(&a.0));
    usage.truncate(TOP_N);
    usage
}

#[async_trait]
impl Collector for ProcessCollector {
    fn name(&self) -> &str {
        "process"
    }

    async fn sample(&self) -> Result<Vec<(String, f64)>> {
        let rows = self.processes.snapshot().await?;
        let usage: Vec<(f64, f64)> = rows
            .iter()
            .map(|p| (p.cpu_percent, p.memory_percent))
            .collect();

        let mut points = Vec::new();
        for (i, (cpu, mem)) in rank_by_cpu(usage).into_iter().enumerate() {
            points.push((format!("process.top_cpu.{}.cpu_percent", i), cpu));
            points.push((format!("process.top_cpu.{}.memory_percent", i), mem));
        }
        Ok(points)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ranks_busy_processes_and_drops_idle_ones() {
        let mut usage = vec![(0.5, 0.2), (12.0, 0.1), (3.0, 4.0), (0.0, 2.5)];
        usage.extend((0..20).map(|i| (1.5 + i as f64 * 0.01, 0.0)));

        let ranked = rank_by_cpu(usage);
        assert_eq!(ranked.len(), TOP_N);
        assert_eq!(ranked[0], (12.0, 0.1));
        assert_eq!(ranked[1], (3.0, 4.0));
        assert!(!ranked.contains(&(0.5, 0.2)));
    }
}
