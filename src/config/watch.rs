use std::time::Duration;

use config::ConfigError;
use serde::Deserialize;
use serde::Serialize;

use crate::Error;
use crate::Result;

/// Parameters for the auto-reconnecting watch channel
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct WatchConfig {
    /// Minimum spacing between reconnect attempts after the underlying
    /// subscription breaks (milliseconds)
    #[serde(default = "default_reconnect_interval_ms")]
    pub reconnect_interval_ms: u64,

    /// Capacity of the outgoing event channel; delivery blocks when full
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
}

fn default_reconnect_interval_ms() -> u64 {
    1000
}

fn default_channel_capacity() -> usize {
    64
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            reconnect_interval_ms: default_reconnect_interval_ms(),
            channel_capacity: default_channel_capacity(),
        }
    }
}

impl WatchConfig {
    pub fn validate(&self) -> Result<()> {
        if self.reconnect_interval_ms < 100 {
            return Err(Error::Config(ConfigError::Message(
                "reconnect_interval_ms must be at least 100".into(),
            )));
        }
        if self.channel_capacity == 0 {
            return Err(Error::Config(ConfigError::Message(
                "channel_capacity must be greater than 0".into(),
            )));
        }
        Ok(())
    }

    pub fn reconnect_interval(&self) -> Duration {
        Duration::from_millis(self.reconnect_interval_ms)
    }
}
