use anyhow::Context;
use clap::Parser;

use logwatch_core::Config;
use logwatch_server::cli::{Cli, Command};
use logwatch_server::commands;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    logwatch_core::config::load_dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let config = Config::from_file(&cli.config)
        .with_context(|| format!("failed to load config from {}", cli.config.display()))?;

    match cli.command.unwrap_or_default() {
        Command::Run { once } => commands::run(config, once).await,
        Command::CheckConfig { probe_sinks } => commands::check_config(&config, probe_sinks).await,
        Command::Alerts {
            since_minutes,
            rule,
            severity,
            limit,
        } => commands::alerts(&config, since_minutes, rule, severity, limit).await,
        Command::Logs { limit, log_type } => commands::logs(&config, limit, log_type).await,
    }
}
