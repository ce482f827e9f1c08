//! fleetcoord - multi-agent task coordination engine
//!
//! CLI entry point for running scenarios and inspecting configuration.

use std::fs;
use std::path::{Path, PathBuf};

use clap::Parser;
use eyre::{Context, Result};
use tracing::{debug, info};

use fleetcoord::cli::{Cli, Command, OutputFormat, get_log_path};
use fleetcoord::config::Config;
use fleetcoord::simulate::{self, Scenario};

fn setup_logging(cli_log_level: Option<&str>, config_log_level: Option<&str>) -> Result<()> {
    // Logging isn't initialized yet, so nothing here is traced
    let log_path = get_log_path();
    let log_dir = log_path.parent().map(Path::to_path_buf).unwrap_or_else(|| PathBuf::from("."));

    fs::create_dir_all(&log_dir).context("Failed to create log directory")?;

    // Priority: CLI --log-level > config file > default (INFO)
    let level = match cli_log_level.or(config_log_level) {
        Some(s) => match s.to_uppercase().as_str() {
            "TRACE" => tracing::Level::TRACE,
            "DEBUG" => tracing::Level::DEBUG,
            "INFO" => tracing::Level::INFO,
            "WARN" | "WARNING" => tracing::Level::WARN,
            "ERROR" => tracing::Level::ERROR,
            _ => {
                eprintln!("Warning: Unknown log-level '{}', defaulting to INFO", s);
                tracing::Level::INFO
            }
        },
        None => tracing::Level::INFO,
    };

    let log_file = fs::File::create(&log_path).context("Failed to create log file")?;

    tracing_subscriber::fmt()
        .with_writer(log_file)
        .with_ansi(false)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()))
        .init();

    info!("Logging initialized (level: {:?})", level);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Log level comes from the config file before the full load
    let config_log_level = Config::load_log_level(cli.config.as_ref());
    setup_logging(cli.log_level.as_deref(), config_log_level.as_deref()).context("Failed to setup logging")?;

    let config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;

    debug!(command = ?cli.command, "main: dispatching command");
    match cli.command {
        Some(Command::Simulate {
            scenario,
            ticks,
            format,
        }) => {
            debug!(scenario = %scenario.display(), ticks, %format, "main: matched Simulate command");
            cmd_simulate(&config, &scenario, ticks, format).await
        }
        Some(Command::Config) => {
            debug!("main: matched Config command");
            cmd_config(&config)
        }
        None => {
            debug!("main: no command, printing help");
            use clap::CommandFactory;
            Cli::command().print_help().context("Failed to print help")?;
            println!();
            Ok(())
        }
    }
}

async fn cmd_simulate(config: &Config, path: &Path, ticks: u32, format: OutputFormat) -> Result<()> {
    let scenario = Scenario::load(path).context(format!("Failed to load scenario {}", path.display()))?;
    let result = simulate::run(&config.engine, scenario, ticks).await?;

    match format {
        OutputFormat::Json => println!("{}", simulate::render_json(&result)?),
        OutputFormat::Text => print!("{}", simulate::render_text(&result)),
    }
    Ok(())
}

fn cmd_config(config: &Config) -> Result<()> {
    let yaml = serde_yaml::to_string(config).context("Failed to serialize configuration")?;
    print!("{}", yaml);
    Ok(())
}
