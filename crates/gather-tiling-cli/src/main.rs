//! Gather tiling CLI
//!
//! Plans gather invocations from the command line and prints the selected
//! mode, work split, scratch layout and dispatch key.

use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand};
use tracing::error;

mod commands;
mod config;
mod output;

use commands::PlanCommand;
use config::CliConfig;

/// Gather tiling planner
#[derive(Parser)]
#[command(name = "gather-tiling")]
#[command(about = "Plan scratch tiling for tensor gather kernels")]
#[command(long_about = r#"
Computes the tiling plan for a gather operation: which execution mode the
kernel should run, how the work is split across execution units, how each
unit's scratch memory is laid out, and the dispatch key selecting the kernel
variant.

Examples:
  # Plan a scalar last-axis gather
  gather-tiling plan --x-shape 1,1000 --indices-shape 4000 --axis 1

  # Same problem on a smaller device, as JSON
  gather-tiling plan --x-shape 1,1000 --indices-shape 4000 --axis 1 \
      --units 8 --scratch-bytes 65536 --format json

  # Print the default configuration file
  gather-tiling config default
"#)]
#[command(version)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, value_name = "PATH", global = true)]
    config: Option<std::path::PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, value_name = "LEVEL", global = true)]
    log_level: Option<String>,

    /// Log format (pretty, compact, json)
    #[arg(long, value_name = "FORMAT", global = true)]
    log_format: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Compute a tiling plan
    Plan(PlanCommand),

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Show the effective configuration
    Show,
    /// Print the default configuration
    Default,
}

fn main() {
    let cli = Cli::parse();

    let mut config = match load_configuration(&cli) {
        Ok(config) => config,
        Err(e) => {
            // Logging is configured from this file, so report directly.
            eprintln!("Error: {e:#}");
            std::process::exit(1);
        }
    };
    if let Some(format) = &cli.log_format {
        config.logging.format = format.clone();
    }
    setup_logging(&config, cli.log_level.as_deref());

    let result = match cli.command {
        Some(Commands::Plan(cmd)) => cmd.execute(&config),
        Some(Commands::Config { action }) => handle_config_command(action, &config),
        None => {
            let mut cmd = Cli::command();
            cmd.print_help().map_err(Into::into)
        }
    };

    if let Err(e) = result {
        error!("Command failed: {}", e);

        let mut source = e.source();
        while let Some(err) = source {
            error!("  Caused by: {}", err);
            source = err.source();
        }

        std::process::exit(1);
    }
}

/// Load the configuration file if one was given, defaults otherwise.
fn load_configuration(cli: &Cli) -> Result<CliConfig> {
    match &cli.config {
        Some(path) => CliConfig::load(path),
        None => CliConfig::from_env(),
    }
}

fn setup_logging(config: &CliConfig, log_level_override: Option<&str>) {
    let level = log_level_override.unwrap_or(&config.logging.level);

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);

    match config.logging.format.as_str() {
        "json" => {
            subscriber.json().with_timer(tracing_subscriber::fmt::time::uptime()).init();
        }
        "pretty" => subscriber.pretty().init(),
        _ => subscriber.compact().init(),
    }
}

fn handle_config_command(action: ConfigAction, config: &CliConfig) -> Result<()> {
    match action {
        ConfigAction::Show => println!("{}", config.to_toml()?),
        ConfigAction::Default => println!("{}", CliConfig::default().to_toml()?),
    }
    Ok(())
}
