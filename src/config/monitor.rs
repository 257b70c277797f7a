use std::time::Duration;

use config::ConfigError;
use serde::Deserialize;
use serde::Serialize;

use crate::Error;
use crate::Result;

/// Parameters for the lease-based failure monitor
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct MonitorConfig {
    /// Smallest TTL a caller may request for a monitor lease (milliseconds).
    /// TTLs shorter than the keepalive round-trip would flap.
    #[serde(default = "default_min_ttl_ms")]
    pub min_ttl_ms: u64,
}

fn default_min_ttl_ms() -> u64 {
    1000
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            min_ttl_ms: default_min_ttl_ms(),
        }
    }
}

impl MonitorConfig {
    pub fn validate(&self) -> Result<()> {
        if self.min_ttl_ms == 0 {
            return Err(Error::Config(ConfigError::Message(
                "min_ttl_ms must be greater than 0".into(),
            )));
        }
        Ok(())
    }

    pub fn min_ttl(&self) -> Duration {
        Duration::from_millis(self.min_ttl_ms)
    }
}
