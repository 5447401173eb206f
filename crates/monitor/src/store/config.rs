use serde::{Deserialize, Serialize};

/// Limits applied to the in-memory metric store.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct StoreConfig {
    /// Samples retained per series (24h at a 1-minute cadence by default).
    pub series_capacity: usize,

    /// Upper bound on distinct series names.
    pub max_series: usize,

    /// Series without a write for this many seconds are swept.
    pub idle_ttl_secs: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            series_capacity: 1440,
            max_series: 10_000,
            idle_ttl_secs: 24 * 60 * 60,
        }
    }
}

impl StoreConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.series_capacity == 0 {
            return Err("series capacity must be greater than zero".to_string());
        }
        if self.max_series == 0 {
            return Err("max series must be greater than zero".to_string());
        }
        if self.idle_ttl_secs == 0 {
            return Err("series idle TTL must be greater than zero".to_string());
        }
        Ok(())
    }
}
