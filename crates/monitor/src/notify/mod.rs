//! Outbound notifications to the control plane.
//!
//! The engine decides *when* to notify and shapes the payload; a
//! [`Notifier`] owns the transport. Delivery is best effort: a failed
//! delivery is logged and counted, and never rolls back the alert
//! transition that produced it.

mod stdout;
mod webhook;

pub use stdout::StdoutNotifier;
pub use webhook::WebhookNotifier;

use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::time::timeout;
use tracing::{debug, error};

use crate::alerting::{AlertEvent, AlertEventKind, AlertRule};
use crate::config::{CallbackConfig, SinkKind};
use crate::metrics;
use crate::Result;

/// Notifications waiting for delivery before new ones are dropped.
const QUEUE_CAPACITY: usize = 1024;

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Notifier: Send + Sync {
    fn name(&self) -> &str;

    /// Delivers `payload` to `url`, retrying internally. Returns whether the
    /// receiver accepted it.
    async fn send(&self, url: &str, payload: &Value) -> bool;
}

/// Builds the notifier selected by `CALLBACK_SINK`.
pub fn notifier_from_config(callbacks: &CallbackConfig) -> Result<Arc<dyn Notifier>> {
    Ok(match callbacks.sink {
        SinkKind::Webhook => Arc::new(WebhookNotifier::new(callbacks)?),
        SinkKind::Stdout => Arc::new(StdoutNotifier::new(false)),
    })
}

enum Job {
    Send { path: &'static str, payload: Value },
    Flush(oneshot::Sender<()>),
}

/// The single task that talks to the notifier. Jobs run one at a time in
/// queue order, so a retried delivery holds back everything queued after it.
struct Delivery {
    notifier: Arc<dyn Notifier>,
    callbacks: CallbackConfig,
}

impl Delivery {
    async fn run(self, mut jobs: mpsc::Receiver<Job>) {
        while let Some(job) = jobs.recv().await {
            match job {
                Job::Send { path, payload } => {
                    self.emit(path, &payload).await;
                }
                Job::Flush(done) => {
                    let _ = done.send(());
                }
            }
        }
        debug!(notifier = self.notifier.name(), "Notification queue closed");
    }

    async fn emit(&self, path: &str, payload: &Value) -> bool {
        let url = self.callbacks.url(path);
        let delivered = self.notifier.send(&url, payload).await;
        if delivered {
            debug!(url = %url, notifier = self.notifier.name(), "Notification delivered");
        } else {
            metrics::NOTIFICATIONS_FAILED_TOTAL.inc();
            error!(
                url = %url,
                notifier = self.notifier.name(),
                event = payload["event"].as_str().unwrap_or("unknown"),
                "Notification delivery failed"
            );
        }
        delivered
    }
}

/// Maps engine events to callback paths and queues them for the delivery
/// task. Cloning shares the queue.
#[derive(Clone)]
pub struct Dispatcher {
    queue: mpsc::Sender<Job>,
    notifier_name: String,
}

impl Dispatcher {
    /// Starts the delivery task; call from within a tokio runtime. The task
    /// exits once every clone of the dispatcher is dropped.
    pub fn new(notifier: Arc<dyn Notifier>, callbacks: CallbackConfig) -> Self {
        let (queue, jobs) = mpsc::channel(QUEUE_CAPACITY);
        let notifier_name = notifier.name().to_string();
        tokio::spawn(Delivery { notifier, callbacks }.run(jobs));
        Self {
            queue,
            notifier_name,
        }
    }

    pub fn notifier_name(&self) -> &str {
        &self.notifier_name
    }

    pub fn deliver(&self, event: &AlertEvent) -> bool {
        let path = match event.kind {
            AlertEventKind::Raised | AlertEventKind::Resolved => CallbackConfig::ALERTS_PATH,
            AlertEventKind::Acknowledged => CallbackConfig::ACKNOWLEDGED_PATH,
        };
        self.enqueue(path, event.payload())
    }

    /// Queues `events` in order.
    pub fn deliver_all(&self, events: &[AlertEvent]) {
        for event in events {
            self.deliver(event);
        }
    }

    pub fn rule_created(&self, rule: &AlertRule) -> bool {
        let payload = json!({
            "event": "alert_rule_created",
            "rule_id": rule.id,
            "rule_name": rule.name,
            "metric": rule.metric,
            "condition": rule.condition.symbol(),
            "threshold": rule.threshold,
            "severity": rule.severity,
            "enabled": rule.enabled,
            "duration_seconds": rule.duration_seconds,
        });
        self.enqueue(CallbackConfig::RULE_CREATED_PATH, payload)
    }

    /// Never waits: a full or closed queue drops the notification and counts
    /// it as failed.
    fn enqueue(&self, path: &'static str, payload: Value) -> bool {
        let event = payload["event"].as_str().unwrap_or("unknown").to_string();
        match self.queue.try_send(Job::Send { path, payload }) {
            Ok(()) => true,
            Err(e) => {
                metrics::NOTIFICATIONS_FAILED_TOTAL.inc();
                error!(event = %event, error = %e, "Notification dropped");
                false
            }
        }
    }

    /// Waits until everything queued before this call has been attempted.
    /// Returns `false` if that takes longer than `limit`.
    pub async fn flush(&self, limit: Duration) -> bool {
        let (done, drained) = oneshot::channel();
        let flushed = async {
            self.queue.send(Job::Flush(done)).await.is_ok() && drained.await.is_ok()
        };
        matches!(timeout(limit, flushed).await, Ok(true))
    }
}
