pub mod alerting;
pub mod collectors;
pub mod config;
pub mod engine;
pub mod health;
pub mod metrics;
pub mod notify;
pub mod scheduler;
pub mod server;
pub mod store;

use thiserror::Error;

pub use engine::MonitoringEngine;
pub use scheduler::CollectionScheduler;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Collection error: {0}")]
    Collection(String),
    #[error("Delivery failure: {0}")]
    Delivery(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    SerdeJson(#[from] serde_json::Error),
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_message_names_the_subject() {
        let err = Error::NotFound("alert high_cpu_system.cpu_percent".to_string());
        assert_eq!(err.to_string(), "Not found: alert high_cpu_system.cpu_percent");
    }

    #[test]
    fn io_errors_convert() {
        fn fails() -> Result<()> {
            Err(std::io::Error::new(std::io::ErrorKind::Other, "boom"))?;
            Ok(())
        }
        assert!(matches!(fails(), Err(Error::Io(_))));
    }
}
