use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval, timeout, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::MonitoringEngine;

/// Drives the engine on two independent cadences: sampling plus health
/// probing, and alert evaluation. Each loop runs on its own task and checks
/// the shutdown signal between ticks.
pub struct CollectionScheduler {
    engine: Arc<MonitoringEngine>,
    shutdown: Option<watch::Sender<bool>>,
    tasks: Vec<JoinHandle<()>>,
}

impl CollectionScheduler {
    pub fn new(engine: Arc<MonitoringEngine>) -> Self {
        Self {
            engine,
            shutdown: None,
            tasks: Vec::new(),
        }
    }

    pub fn is_running(&self) -> bool {
        self.shutdown.is_some()
    }

    pub fn start(&mut self) {
        if self.is_running() {
            warn!("Collection scheduler already running");
            return;
        }

        let config = self.engine.config();
        info!(
            collection_interval_secs = config.collection_interval_secs,
            alert_interval_secs = config.alert_interval_secs,
            "Starting collection scheduler"
        );

        let (tx, rx) = watch::channel(false);

        let engine = self.engine.clone();
        let sampling = spawn_loop("sampling", config.collection_interval(), rx.clone(), move || {
            let engine = engine.clone();
            async move {
                engine.run_collection_cycle().await;
            }
        });

        let engine = self.engine.clone();
        let alerting = spawn_loop("alerting", config.alert_interval(), rx, move || {
            let engine = engine.clone();
            async move {
                engine.run_alert_cycle().await;
            }
        });

        self.tasks = vec![sampling, alerting];
        self.shutdown = Some(tx);
    }

    /// Signals both loops and waits for them, up to the shutdown timeout
    /// each. A loop still busy after that is aborted. Notifications already
    /// queued are then given the same bound to go out.
    pub async fn stop(&mut self) {
        let Some(tx) = self.shutdown.take() else {
            return;
        };
        let _ = tx.send(true);

        let limit = self.engine.config().shutdown_timeout();
        for mut task in self.tasks.drain(..) {
            if timeout(limit, &mut task).await.is_err() {
                warn!(timeout_secs = limit.as_secs(), "Scheduler loop did not stop in time, aborting");
                task.abort();
            }
        }
        if !self.engine.flush_notifications().await {
            warn!(timeout_secs = limit.as_secs(), "Pending notifications not delivered before shutdown");
        }
        info!("Collection scheduler stopped");
    }
}

fn spawn_loop<F, Fut>(
    name: &'static str,
    period: Duration,
    mut shutdown: watch::Receiver<bool>,
    mut tick: F,
) -> JoinHandle<()>
where
    F: FnMut() -> Fut + Send + 'static,
    Fut: std::future::Future<Output = ()> + Send + 'static,
{
    tokio::spawn(async move {
        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
                _ = ticker.tick() => {
                    // A panicking tick is contained to that tick.
                    if let Err(e) = tokio::spawn(tick()).await {
                        error!(name, error = %e, "Scheduler tick failed");
                    }
                }
            }
        }
        debug!(name, "Scheduler loop exited");
    })
}
