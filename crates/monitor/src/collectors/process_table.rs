use anyhow::Result;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use sysinfo::System;

use super::{percent, refresh_blocking};

/// Snapshots younger than this are handed out again instead of refreshing.
const MAX_AGE: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, PartialEq)]
pub struct ProcessRow {
    pub name: String,
    pub cpu_percent: f64,
    pub memory_percent: f64,
}

struct TableState {
    system: System,
    snapshot: Option<(Instant, Arc<Vec<ProcessRow>>)>,
}

/// Process listing shared between collectors, so a sampling tick walks
/// the process table once.
#[derive(Clone)]
pub struct ProcessTable {
    state: Arc<Mutex<TableState>>,
    max_age: Duration,
}

impl ProcessTable {
    pub fn new() -> Self {
        Self::with_max_age(MAX_AGE)
    }

    pub fn with_max_age(max_age: Duration) -> Self {
        Self {
            state: Arc::new(Mutex::new(TableState {
                system: System::new(),
                snapshot: None,
            })),
            max_age,
        }
    }

    pub async fn snapshot(&self) -> Result<Arc<Vec<ProcessRow>>> {
        let max_age = self.max_age;
        refresh_blocking(&self.state, move |state| {
            if let Some((taken, rows)) = &state.snapshot {
                if taken.elapsed() < max_age {
                    return rows.clone();
                }
            }

            state.system.refresh_all();
            let total_memory = state.system.total_memory() as f64;
            let rows: Arc<Vec<ProcessRow>> = Arc::new(
                state
                    .system
                    .processes()
                    .values()
                    .map(|p| ProcessRow {
                        name: p.name().to_string_lossy().into_owned(),
                        cpu_percent: p.cpu_usage() as f64,
                        memory_percent: percent(p.memory() as f64, total_memory),
                    })
                    .collect(),
            );
            state.snapshot = Some((Instant::now(), rows.clone()));
            rows
        })
        .await
    }
}

impl Default for ProcessTable {
    fn default() -> Self {
        Self::new()
    }
}
