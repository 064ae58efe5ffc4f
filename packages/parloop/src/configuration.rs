//! Global engine configuration
//!
//! This provides a process-wide configuration that can be initialized once
//! (typically at program startup) and then read by every plan and dispatcher.

use crate::config::EngineConfig;
use std::sync::{Arc, LazyLock, RwLock};

/// Container for the global configuration
struct ConfigContainer {
    config: Option<Arc<EngineConfig>>,
}

/// Global engine configuration
static ENGINE_CONFIG: LazyLock<RwLock<ConfigContainer>> =
    LazyLock::new(|| RwLock::new(ConfigContainer { config: None }));

/// Initialize the global engine configuration
///
/// Plans created afterwards pick up its defaults. Calling it again replaces
/// the previous configuration.
///
/// # Example
/// ```
/// use parloop::{EngineConfig, configuration};
///
/// let config = EngineConfig {
///     default_threads: 4,
///     ..EngineConfig::default()
/// };
/// configuration::init_config(config);
/// assert_eq!(configuration::get_config().default_threads, 4);
/// ```
pub fn init_config(config: EngineConfig) {
    if let Ok(mut guard) = ENGINE_CONFIG.write() {
        guard.config = Some(Arc::new(config));
        tracing::info!("Engine configuration initialized");
    } else {
        tracing::error!("Failed to initialize engine configuration - lock poisoned");
    }
}

/// Get the global engine configuration
///
/// Returns the configuration if initialized. Otherwise it is loaded once from
/// `parloop.toml` and the environment, falling back to defaults if that fails.
pub fn get_config() -> Arc<EngineConfig> {
    if let Ok(guard) = ENGINE_CONFIG.read()
        && let Some(ref config) = guard.config
    {
        return config.clone();
    }

    let loaded = match EngineConfig::load() {
        Ok(config) => config,
        Err(err) => {
            tracing::warn!("Invalid engine configuration, using defaults: {}", err);
            EngineConfig::default()
        }
    };

    match ENGINE_CONFIG.write() {
        Ok(mut guard) => guard
            .config
            .get_or_insert_with(|| Arc::new(loaded))
            .clone(),
        Err(_) => Arc::new(loaded),
    }
}

/// Check if configuration has been initialized
pub fn is_initialized() -> bool {
    if let Ok(guard) = ENGINE_CONFIG.read() {
        guard.config.is_some()
    } else {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_config_initializes_lazily() {
        let config = get_config();
        assert!(is_initialized());
        assert!(Arc::ptr_eq(&config, &get_config()));
    }
}
