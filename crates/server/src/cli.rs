//! Command-line interface.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use logwatch_core::Severity;

/// Rule-based log anomaly detector.
#[derive(Parser, Debug)]
#[command(name = "logwatch", version, about)]
pub struct Cli {
    /// Path to the YAML (or .toml) config file.
    #[arg(
        long,
        short,
        global = true,
        env = "LOGWATCH_CONFIG",
        default_value = "config/logwatch.yml"
    )]
    pub config: PathBuf,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Run detection cycles on the configured interval (default).
    Run {
        /// Run a single cycle and exit.
        #[arg(long)]
        once: bool,
    },

    /// Validate the config and rules, then exit.
    CheckConfig {
        /// Also send a probe through every enabled sink.
        #[arg(long)]
        probe_sinks: bool,
    },

    /// Query stored alerts, newest first, one JSON document per line.
    Alerts {
        #[arg(long, default_value_t = 60)]
        since_minutes: i64,

        /// Only alerts raised by this rule id.
        #[arg(long)]
        rule: Option<String>,

        #[arg(long)]
        severity: Option<Severity>,

        #[arg(long, default_value_t = 20)]
        limit: usize,
    },

    /// Show the most recent raw log records, one JSON document per line.
    Logs {
        #[arg(long, default_value_t = 20)]
        limit: usize,

        #[arg(long)]
        log_type: Option<String>,
    },
}

impl Default for Command {
    fn default() -> Self {
        Command::Run { once: false }
    }
}
