use anyhow::Result;
use async_trait::async_trait;

use super::{Collector, ProcessTable};

/// Named services, detected by a case-insensitive match on process name.
pub struct ServiceCollector {
    services: Vec<String>,
    processes: ProcessTable,
}

impl ServiceCollector {
    pub fn new(services: Vec<String>, processes: ProcessTable) -> Self {
        Self {
            services,
            processes,
        }
    }

    pub fn services(&self) -> &[String] {
        &self.services
    }
}

/// `(cpu, memory)` of the first process whose name contains `service`.
pub(crate) fn find_service<'a>(
    service: &str,
    processes: impl IntoIterator<Item = (&'a str, f64, f64)>,
) -> Option<(f64, f64)> {
    let needle = service.to_lowercase();
    processes
        .into_iter()
        .find(|(name, _, _)| name.to_lowercase().contains(&needle))
        .map(|(_, cpu, mem)| (cpu, mem))
}

#[async_trait]
impl Collector for ServiceCollector {
    fn name(&self) -> &str {
        "services"
    }

    async fn sample(&self) -> Result<Vec<(String, f64)>> {
        let rows = self.processes.snapshot().await?;

        let mut points = Vec::new();
        for service in &self.services {
            let found = find_service(
                service,
                rows.iter()
                    .map(|p| (p.name.as_str(), p.cpu_percent, p.memory_percent)),
            );
            points.push((
                format!("service.{}.running", service),
                if found.is_some() { 1.0 } else { 0.0 },
            ));
            if let Some((cpu, mem)) = found {
                points.push((format!("service.{}.cpu_percent", service), cpu));
                points.push((format!("service.{}.memory_percent", service), mem));
            }
        }
        Ok(points)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matches_process_names_case_insensitively() {
        let procs = vec![("bash", 0.0, 0.1), ("NGINX: worker", 2.0, 1.5), ("dockerd", 4.0, 3.0)];

        assert_eq!(find_service("nginx", procs.clone()), Some((2.0, 1.5)));
        assert_eq!(find_service("docker", procs.clone()), Some((4.0, 3.0)));
        assert_eq!(find_service("redis-server", procs), None);
    }
}
