//! Tracing / logging initialisation helpers.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Log level per component.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    /// Global default level: "trace" | "debug" | "info" | "warn" | "error"
    #[serde(default = "default_level")]
    pub level: String,
    /// Override per component: crate name → level
    #[serde(default)]
    pub components: HashMap<String, String>,
    /// Emit JSON structured logs instead of human-readable text
    #[serde(default)]
    pub json: bool,
}

fn default_level() -> String {
    "info".to_string()
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
            components: HashMap::new(),
            json: false,
        }
    }
}

impl LogConfig {
    /// Debug output for the client crates, `info` for everything else.
    pub fn verbose() -> Self {
        let components = ["clover-core", "clover-http", "clover-ws"]
            .into_iter()
            .map(|c| (c.to_string(), "debug".to_string()))
            .collect();
        Self {
            components,
            ..Self::default()
        }
    }

    /// The `EnvFilter` directive string, e.g. `"info,clover_ws=debug"`.
    pub fn directives(&self) -> String {
        let mut components: Vec<_> = self.components.iter().collect();
        components.sort();
        let mut directives = self.level.clone();
        for (component, level) in components {
            directives.push_str(&format!(",{}={}", component.replace('-', "_"), level));
        }
        directives
    }
}

/// Install a global subscriber built from `config`.
///
/// Fails if a global subscriber is already set.
pub fn init_tracing(config: &LogConfig) -> Result<(), tracing_subscriber::util::TryInitError> {
    let filter = EnvFilter::try_new(config.directives()).unwrap_or_else(|_| EnvFilter::new("info"));

    if config.json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .try_init()
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer())
            .try_init()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn directives_normalise_crate_names() {
        let cfg = LogConfig::verbose();
        assert_eq!(
            cfg.directives(),
            "info,clover_core=debug,clover_http=debug,clover_ws=debug"
        );
    }

    #[test]
    fn second_init_fails_instead_of_panicking() {
        let cfg = LogConfig::default();
        let _ = init_tracing(&cfg);
        assert!(init_tracing(&cfg).is_err());
    }
}
