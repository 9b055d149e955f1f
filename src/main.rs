//! spinup: a local multi-service process runner.
//!
//! This is the entry point of the application. It parses command-line
//! arguments, loads the service configuration, and hands the selected
//! services to the runner, which multiplexes their pty output into one
//! tagged, colorized stream.

mod color;
mod config;
mod output;
mod runner;
mod select;
mod service;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::builder::styling::{AnsiColor, Effects, Style};
use clap::builder::Styles;
use clap::Parser;

use crate::output::Console;
use crate::runner::{RunSettings, Runner};
use crate::select::RunRequest;
use crate::service::ServiceSpec;

/// Command-line interface definition.
#[derive(Debug, Parser)]
#[command(
    name = "spinup",
    version,
    about = "Concurrent service runner with pty-backed output",
    styles = help_styles()
)]
struct Cli {
    /// Path to spinup.toml configuration file.
    #[arg(long)]
    config: Option<PathBuf>,
    /// Comma-separated list of services to run (e.g. -o web,db).
    #[arg(short = 'o', long)]
    only: Option<String>,
    /// Comma-separated list of services to exclude (e.g. -e worker).
    #[arg(short = 'e', long)]
    except: Option<String>,
    /// Run each service's pre-startup steps before its startup commands.
    #[arg(short = 'p', long)]
    pre: bool,
    /// Exit non-zero if any service exits with failure.
    #[arg(long)]
    fail_on_error: bool,
    /// Force-kill services still running this long after an interrupt (ms).
    #[arg(long)]
    kill_after_ms: Option<u64>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let path = cli.config.clone().unwrap_or_else(default_config_path);
    let config = config::load_config(&path)?;

    let request = RunRequest {
        only: split_names(cli.only.as_deref()),
        except: split_names(cli.except.as_deref()),
        include_pre_steps: cli.pre,
    };
    let settings = RunSettings {
        fail_on_error: cli.fail_on_error || config.fail_on_error.unwrap_or(false),
        kill_after: cli
            .kill_after_ms
            .or(config.kill_after_ms)
            .map(Duration::from_millis),
    };
    let specs: Vec<ServiceSpec> = config
        .services
        .into_iter()
        .map(ServiceSpec::from_config)
        .collect();

    let sink = Arc::new(Console::new());
    let runner = Runner::new(specs, sink, settings);
    runner.run(&request).await
}

fn default_config_path() -> PathBuf {
    PathBuf::from("spinup.toml")
}

fn split_names(value: Option<&str>) -> Vec<String> {
    let Some(raw) = value else {
        return Vec::new();
    };
    raw.split(',')
        .map(|name| name.trim().to_string())
        .filter(|name| !name.is_empty())
        .collect()
}

fn help_styles() -> Styles {
    Styles::styled()
        .header(
            Style::new()
                .fg_color(Some(AnsiColor::Cyan.into()))
                .effects(Effects::BOLD),
        )
        .usage(
            Style::new()
                .fg_color(Some(AnsiColor::Green.into()))
                .effects(Effects::BOLD),
        )
        .literal(Style::new().fg_color(Some(AnsiColor::Yellow.into())))
        .placeholder(Style::new().fg_color(Some(AnsiColor::Magenta.into())))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_names_trims_and_drops_empties() {
        assert_eq!(split_names(Some("web, db ,,worker")), ["web", "db", "worker"]);
        assert!(split_names(None).is_empty());
        assert!(split_names(Some("")).is_empty());
    }

    #[test]
    fn cli_parses_selection_flags() {
        let cli = Cli::parse_from(["spinup", "-o", "web,db", "-p"]);
        assert_eq!(cli.only.as_deref(), Some("web,db"));
        assert!(cli.pre);
        assert!(!cli.fail_on_error);
    }
}
