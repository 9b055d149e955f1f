//! Data structures for declared and launched services.
//!
//! A `ServiceSpec` is the immutable, validated record for one service; it
//! lives for the whole run. A `LaunchedService` is what the runner keeps
//! after handing a command sequence to the operating system.

use std::path::PathBuf;

use crate::config::ServiceConfig;

/// Specification for a service to be run.
#[derive(Debug, Clone)]
pub struct ServiceSpec {
    /// Unique name, used to tag output lines.
    pub name: String,
    /// Working directory its commands run in.
    pub path: PathBuf,
    /// Ordered startup commands.
    pub startup: Vec<String>,
    /// Commands run before the startup sequence when pre-steps are requested.
    pub pre_startup: Vec<String>,
    /// Cleanup commands run when the run is interrupted.
    pub teardown: Vec<String>,
}

impl ServiceSpec {
    /// Creates a `ServiceSpec` from its configuration record.
    pub fn from_config(config: ServiceConfig) -> Self {
        Self {
            name: config.name,
            path: PathBuf::from(config.path),
            startup: config.startup,
            pre_startup: config.pre_startup.unwrap_or_default(),
            teardown: config.teardown.unwrap_or_default(),
        }
    }

    /// Commands to launch for the startup phase.
    pub fn startup_commands(&self, include_pre_steps: bool) -> Vec<String> {
        if include_pre_steps {
            let mut commands = self.pre_startup.clone();
            commands.extend(self.startup.iter().cloned());
            commands
        } else {
            self.startup.clone()
        }
    }
}

/// A service that has been handed to the operating system.
#[derive(Debug)]
pub struct LaunchedService {
    /// Service name, for shutdown reporting.
    pub name: String,
    /// OS process id of the spawned shell, when known.
    pub pid: Option<u32>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec() -> ServiceSpec {
        ServiceSpec {
            name: "web".into(),
            path: PathBuf::from("apps/web"),
            startup: vec!["npm run dev".into()],
            pre_startup: vec!["npm install".into()],
            teardown: vec!["docker compose down".into()],
        }
    }

    #[test]
    fn startup_commands_without_pre_steps() {
        assert_eq!(spec().startup_commands(false), vec!["npm run dev"]);
    }

    #[test]
    fn startup_commands_with_pre_steps() {
        assert_eq!(
            spec().startup_commands(true),
            vec!["npm install", "npm run dev"]
        );
    }

    #[test]
    fn from_config_defaults_optional_lists() {
        let spec = ServiceSpec::from_config(crate::config::ServiceConfig {
            name: "db".into(),
            path: ".".into(),
            startup: vec!["postgres".into()],
            pre_startup: None,
            teardown: None,
        });
        assert!(spec.pre_startup.is_empty());
        assert!(spec.teardown.is_empty());
    }
}
