//! Engine configuration
//!
//! Sources, lowest to highest priority:
//! 1. Built-in defaults ([`EngineConfig::default`])
//! 2. A TOML file (`parloop.toml` in the working directory, or an explicit path)
//! 3. `PARLOOP_`-prefixed environment variables, e.g. `PARLOOP_DEFAULT_THREADS=4`

use anyhow::Result;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Repository-level config file looked up by [`EngineConfig::load`]
pub const CONFIG_FILE: &str = "parloop.toml";

/// Environment variable prefix
pub const ENV_PREFIX: &str = "PARLOOP_";

/// Configuration shared by every loop plan
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Thread count given to new plans (0 = auto, 1 = sequential)
    pub default_threads: i32,

    /// Whether new counted plans use balanced partitioning
    pub balanced: bool,

    /// Name prefix for dedicated worker threads (`<prefix>-<n>`)
    pub worker_name_prefix: String,

    /// Stack size in bytes for dedicated worker threads (None = platform default)
    pub worker_stack_size: Option<usize>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            default_threads: 0,
            balanced: false,
            worker_name_prefix: "parloop-worker".to_string(),
            worker_stack_size: None,
        }
    }
}

impl EngineConfig {
    /// Load defaults, then `parloop.toml` if present, then the environment
    pub fn load() -> Result<Self> {
        Self::load_from(None)
    }

    /// Load with an explicit config file in place of `parloop.toml`
    pub fn load_from(custom_config: Option<&Path>) -> Result<Self> {
        let mut figment = Figment::from(Serialized::defaults(EngineConfig::default()));

        figment = match custom_config {
            Some(path) => figment.merge(Toml::file(path)),
            None => figment.merge(Toml::file(CONFIG_FILE)),
        };

        // Environment variables always have highest priority
        figment = figment.merge(Env::prefixed(ENV_PREFIX));

        let config: EngineConfig = figment.extract()?;
        tracing::debug!(?config, "Engine configuration loaded");
        Ok(config)
    }
}
