//! Configuration management for spinup.
//!
//! This module defines the structure of the `spinup.toml` configuration file
//! and provides functionality to load and validate it before any service
//! is launched.

use std::collections::HashSet;
use std::path::Path;

use anyhow::{bail, Context, Result};
use serde::Deserialize;

/// Top-level configuration structure corresponding to `spinup.toml`.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Exit non-zero when any service exits with failure.
    pub fail_on_error: Option<bool>,
    /// Grace period before force-killing services after an interrupt (ms).
    pub kill_after_ms: Option<u64>,
    /// Declared services, in launch order.
    #[serde(rename = "service", default)]
    pub services: Vec<ServiceConfig>,
}

/// Declaration of a single service.
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceConfig {
    /// Unique name, used to tag the service's output lines.
    pub name: String,
    /// Working directory its commands run in.
    pub path: String,
    /// Startup commands, each run only if the previous one succeeded.
    pub startup: Vec<String>,
    /// Commands run before the startup sequence when pre-steps are requested.
    #[serde(rename = "pre-startup")]
    pub pre_startup: Option<Vec<String>>,
    /// Cleanup commands run when the run is interrupted.
    pub teardown: Option<Vec<String>>,
}

/// Loads, parses, and validates the configuration from a file path.
pub fn load_config(path: &Path) -> Result<Config> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config file {}", path.display()))?;
    let config: Config = toml::from_str(&raw)
        .with_context(|| format!("failed to parse config file {}", path.display()))?;
    validate(&config)?;
    Ok(config)
}

fn validate(config: &Config) -> Result<()> {
    let mut seen = HashSet::new();
    for service in &config.services {
        if !seen.insert(service.name.as_str()) {
            bail!("duplicate service name: {}", service.name);
        }
        if service.startup.is_empty() {
            bail!("service {} has no startup commands", service.name);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_full_config() {
        let raw = r#"
fail_on_error = true
kill_after_ms = 5000

[[service]]
name = "web"
path = "apps/web"
startup = ["npm install", "npm run dev"]
pre-startup = ["docker compose up -d"]
teardown = ["docker compose down"]

[[service]]
name = "db"
path = "."
startup = ["postgres -D data"]
"#;
        let config: Config = toml::from_str(raw).unwrap();
        assert_eq!(config.fail_on_error, Some(true));
        assert_eq!(config.kill_after_ms, Some(5000));
        assert_eq!(config.services.len(), 2);
        assert_eq!(config.services[0].name, "web");
        assert_eq!(
            config.services[0].pre_startup.as_deref(),
            Some(["docker compose up -d".to_string()].as_slice())
        );
        assert_eq!(
            config.services[0].teardown.as_deref(),
            Some(["docker compose down".to_string()].as_slice())
        );
        assert_eq!(config.services[1].pre_startup, None);
        assert_eq!(config.services[1].teardown, None);
        assert!(validate(&config).is_ok());
    }

    #[test]
    fn rejects_duplicate_names() {
        let raw = r#"
[[service]]
name = "web"
path = "."
startup = ["true"]

[[service]]
name = "web"
path = "."
startup = ["true"]
"#;
        let config: Config = toml::from_str(raw).unwrap();
        let err = validate(&config).unwrap_err();
        assert!(err.to_string().contains("duplicate service name: web"));
    }

    #[test]
    fn rejects_empty_startup() {
        let raw = r#"
[[service]]
name = "web"
path = "."
startup = []
"#;
        let config: Config = toml::from_str(raw).unwrap();
        let err = validate(&config).unwrap_err();
        assert!(err.to_string().contains("no startup commands"));
    }
}
