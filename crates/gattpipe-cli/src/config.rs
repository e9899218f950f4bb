//! gattpipe CLI Configuration Management
//!
//! Configuration is layered with figment, lowest priority first:
//! - Built-in defaults
//! - `gattpipe.toml` in the working directory
//! - An explicit `--config` file
//! - Environment variables (`GATTPIPE_*`, nested keys separated by `__`,
//!   e.g. `GATTPIPE_BRIDGE__CHUNK_PAUSE=300`)

use std::path::Path;

use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};

use gattpipe_ble::BleCentralConfig;
use gattpipe_core::BridgeConfig;

use crate::error::Result;

const DEFAULT_CONFIG_FILE: &str = "gattpipe.toml";
const ENV_PREFIX: &str = "GATTPIPE_";

// ----------------------------------------------------------------------------
// CLI Application Configuration
// ----------------------------------------------------------------------------

/// Complete configuration for the gattpipe CLI
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Scan, connect and transfer tunables
    pub bridge: BridgeConfig,

    /// Adapter selection
    pub ble: BleCentralConfig,

    /// Terminal output
    pub cli: CliConfig,
}

/// CLI-specific configuration options
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CliConfig {
    /// Print every log line the bridge reports, not only alerts and progress
    pub show_logs: bool,

    /// Use ANSI colors for alerts
    pub colored_output: bool,
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            show_logs: false,
            colored_output: true,
        }
    }
}

// ----------------------------------------------------------------------------
// Configuration Loading Logic
// ----------------------------------------------------------------------------

impl AppConfig {
    /// Load defaults, `gattpipe.toml` and the environment
    pub fn load() -> Result<Self> {
        Self::extract(Self::base_figment().merge(Env::prefixed(ENV_PREFIX).split("__")))
    }

    /// Like [`AppConfig::load`], with `path` layered above `gattpipe.toml`
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::extract(
            Self::base_figment()
                .merge(Toml::file(path.as_ref()))
                .merge(Env::prefixed(ENV_PREFIX).split("__")),
        )
    }

    fn base_figment() -> Figment {
        Figment::new()
            .merge(Serialized::defaults(Self::default()))
            .merge(Toml::file(DEFAULT_CONFIG_FILE))
    }

    fn extract(figment: Figment) -> Result<Self> {
        let config: AppConfig = figment.extract()?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration for consistency and correctness
    pub fn validate(&self) -> Result<()> {
        self.bridge.validate()?;
        Ok(())
    }

    /// Render as TOML for the `config` command
    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }
}
