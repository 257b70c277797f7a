//! Configuration for the coordination primitives.
//!
//! Loading priority:
//! 1. Default values (hardcoded)
//! 2. Optional config file
//! 3. Environment variables (highest priority, `FLEETSYNC_` prefix)

mod monitor;
mod store;
mod watch;
pub use monitor::*;
pub use store::*;
pub use watch::*;


//---
use config::Config;
use config::Environment;
use config::File;
use serde::Deserialize;
use serde::Serialize;

use crate::Result;

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct Settings {
    /// Resilient watch channel parameters
    #[serde(default)]
    pub watch: WatchConfig,

    /// Lease-monitor parameters
    #[serde(default)]
    pub monitor: MonitorConfig,

    /// Embedded store parameters
    #[serde(default)]
    pub store: StoreConfig,
}

impl Settings {
    /// Load configuration with priority:
    /// 1. Built-in defaults
    /// 2. Optional TOML file
    /// 3. `FLEETSYNC_`-prefixed environment variables
    pub fn load(path: Option<&str>) -> Result<Self> {
        let mut builder = Config::builder();

        if let Some(path) = path {
            builder = builder.add_source(File::with_name(path).required(true));
        }

        let settings: Settings = builder
            .add_source(Environment::with_prefix("FLEETSYNC").separator("__"))
            .build()?
            .try_deserialize()?;

        settings.validate()?;
        Ok(settings)
    }

    /// Validates all subsystem configurations
    pub fn validate(&self) -> Result<()> {
        self.watch.validate()?;
        self.monitor.validate()?;
        self.store.validate()?;
        Ok(())
    }
}
