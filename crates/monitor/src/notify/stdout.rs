use async_trait::async_trait;
use serde_json::{json, Value};

use super::Notifier;

/// Prints each notification as one JSON document on stdout. Useful when no
/// control plane is reachable.
#[derive(Debug)]
pub struct StdoutNotifier {
    pretty: bool,
}

impl StdoutNotifier {
    pub fn new(pretty: bool) -> Self {
        Self { pretty }
    }

    fn render(&self, url: &str, payload: &Value) -> Result<String, serde_json::Error> {
        let document = json!({ "url": url, "data": payload });
        if self.pretty {
            serde_json::to_string_pretty(&document)
        } else {
            serde_json::to_string(&document)
        }
    }
}

#[async_trait]
impl Notifier for StdoutNotifier {
    fn name(&self) -> &str {
        "stdout"
    }

    async fn send(&self, url: &str, payload: &Value) -> bool {
        match self.render(url, payload) {
            Ok(line) => {
                println!("{}", line);
                true
            }
            Err(e) => {
                eprintln!("Failed to serialize notification: {}", e);
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_stdout_notifier_json_not_pretty() {
        let notifier = StdoutNotifier::new(false);
        let payload = json!({ "event": "alert_raised", "alert_id": "high_cpu_system.cpu_percent" });
        assert!(notifier.send("http://localhost/alerts", &payload).await);
    }

    #[tokio::test]
    async fn test_stdout_notifier_json_pretty() {
        let notifier = StdoutNotifier::new(true);
        let payload = json!({ "event": "alert_resolved" });
        assert!(notifier.send("http://localhost/alerts", &payload).await);
    }

    #[test]
    fn test_render_single_line() {
        let notifier = StdoutNotifier::new(false);
        let line = notifier
            .render("http://localhost/alerts", &json!({ "event": "alert_raised" }))
            .unwrap();
        assert!(!line.contains('\n'));
        let parsed: Value = serde_json::from_str(&line).unwrap();
        assert_eq!(parsed["url"], "http://localhost/alerts");
        assert_eq!(parsed["data"]["event"], "alert_raised");
    }
}
