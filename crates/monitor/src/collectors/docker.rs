use anyhow::Result as AnyResult;
use async_trait::async_trait;
use serde::Deserialize;
use tokio::process::Command;
use tracing::{debug, warn};

use super::Collector;
use crate::{Error, Result};

const MAX_CONTAINER_STATS: usize = 5;

/// Daemon summary from `docker info`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct DockerInfo {
    #[serde(rename = "ContainersRunning", default)]
    pub containers_running: u64,
    #[serde(rename = "Containers", default)]
    pub containers_total: u64,
    #[serde(rename = "Images", default)]
    pub images_total: u64,
    #[serde(rename = "ServerVersion", default)]
    pub server_version: String,
}

/// One line of `docker stats --no-stream`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ContainerStats {
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "CPUPerc", deserialize_with = "percent_field")]
    pub cpu_percent: f64,
    #[serde(rename = "MemPerc", deserialize_with = "percent_field")]
    pub memory_percent: f64,
}

fn percent_field<'de, D>(deserializer: D) -> std::result::Result<f64, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    Ok(parse_percent(&raw).unwrap_or(0.0))
}

/// Parses `"12.34%"`. `"--"` (container still starting) yields `None`.
pub fn parse_percent(raw: &str) -> Option<f64> {
    raw.trim().trim_end_matches('%').trim().parse().ok()
}

/// Thin wrapper over the container runtime CLI.
#[derive(Debug, Clone)]
pub struct DockerCli {
    bin: String,
}

impl DockerCli {
    pub fn new(bin: &str) -> Self {
        Self {
            bin: bin.to_string(),
        }
    }

    async fn run(&self, args: &[&str]) -> Result<String> {
        let output = Command::new(&self.bin)
            .args(args)
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| Error::Collection(format!("failed to run {}: {}", self.bin, e)))?;

        if !output.status.success() {
            return Err(Error::Collection(format!(
                "{} {} exited with {}: {}",
                self.bin,
                args.first().copied().unwrap_or_default(),
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    pub async fn info(&self) -> Result<DockerInfo> {
        let stdout = self.run(&["info", "--format", "{{json .}}"]).await?;
        Ok(serde_json::from_str(stdout.trim())?)
    }

    /// Stats of running containers, in the order the runtime lists them.
    pub async fn stats(&self) -> Result<Vec<ContainerStats>> {
        let stdout = self
            .run(&["stats", "--no-stream", "--format", "{{json .}}"])
            .await?;
        parse_stats_lines(&stdout)
    }
}

pub(crate) fn parse_stats_lines(stdout: &str) -> Result<Vec<ContainerStats>> {
    stdout
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| serde_json::from_str(line).map_err(Error::from))
        .collect()
}

pub struct DockerCollector {
    cli: DockerCli,
}

impl DockerCollector {
    pub fn new(cli: DockerCli) -> Self {
        Self { cli }
    }
}

#[async_trait]
impl Collector for DockerCollector {
    fn name(&self) -> &str {
        "docker"
    }

    async fn sample(&self) -> AnyResult<Vec<(String, f64)>> {
        // An unreachable daemon reads as zero running containers.
        let info = match self.cli.info().await {
            Ok(info) => info,
            Err(e) => {
                warn!(error = %e, "Container runtime unreachable");
                DockerInfo::default()
            }
        };

        let mut points = vec![
            ("docker.containers_running".to_string(), info.containers_running as f64),
            ("docker.containers_total".to_string(), info.containers_total as f64),
            ("docker.images_total".to_string(), info.images_total as f64),
        ];

        if info.containers_running == 0 {
            return Ok(points);
        }

        match self.cli.stats().await {
            Ok(stats) => {
                let mut total_cpu = 0.0;
                let mut total_memory = 0.0;
                for container in stats.iter().take(MAX_CONTAINER_STATS) {
                    total_cpu += container.cpu_percent;
                    total_memory += container.memory_percent;
                    points.push((
                        format!("docker.container.{}.cpu_percent", container.name),
                        container.cpu_percent,
                    ));
                    points.push((
                        format!("docker.container.{}.memory_percent", container.name),
                        container.memory_percent,
                    ));
                }
                points.push(("docker.total_cpu_usage".to_string(), total_cpu));
                points.push(("docker.total_memory_usage".to_string(), total_memory));
            }
            Err(e) => debug!(error = %e, "Skipping per-container stats"),
        }

        Ok(points)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_percent_strings() {
        assert_eq!(parse_percent("12.34%"), Some(12.34));
        assert_eq!(parse_percent(" 0.00% "), Some(0.0));
        assert_eq!(parse_percent("--"), None);
    }

    #[test]
    fn parses_info_json() {
        let info: DockerInfo = serde_json::from_str(
            r#"{"ContainersRunning":3,"Containers":7,"Images":12,"ServerVersion":"24.0.7","Name":"host"}"#,
        )
        .unwrap();
        assert_eq!(info.containers_running, 3);
        assert_eq!(info.containers_total, 7);
        assert_eq!(info.images_total, 12);
        assert_eq!(info.server_version, "24.0.7");
    }

    #[test]
    fn parses_stats_lines() {
        let stdout = concat!(
            r#"{"Name":"web","CPUPerc":"1.50%","MemPerc":"10.25%","ID":"abc"}"#,
            "\n\n",
            r#"{"Name":"db","CPUPerc":"--","MemPerc":"3.00%","ID":"def"}"#,
            "\n"
        );
        let stats = parse_stats_lines(stdout).unwrap();
        assert_eq!(stats.len(), 2);
        assert_eq!(stats[0].name, "web");
        assert_eq!(stats[0].cpu_percent, 1.5);
        assert_eq!(stats[1].cpu_percent, 0.0);
        assert_eq!(stats[1].memory_percent, 3.0);
    }

    #[tokio::test]
    async fn missing_binary_reports_zero_running_containers() {
        let collector = DockerCollector::new(DockerCli::new("/nonexistent/docker-cli"));
        let points = collector.sample().await.unwrap();

        assert_eq!(points.len(), 3);
        assert!(points.contains(&("docker.containers_running".to_string(), 0.0)));
    }

    #[tokio::test]
    async fn missing_binary_is_a_collection_error() {
        let cli = DockerCli::new("/nonexistent/docker-cli");
        assert!(matches!(cli.info().await, Err(Error::Collection(_))));
    }
}
