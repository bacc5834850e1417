mod config_commands;
mod stream_commands;

use std::path::PathBuf;

use {
    clap::{Parser, Subcommand},
    helix_config::HelixConfig,
    tracing::info,
    tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt},
};

#[derive(Parser)]
#[command(name = "helix", about = "helix: stream text into chat messages, edited in place")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    /// Output logs as JSON instead of human-readable.
    #[arg(long, global = true, default_value_t = false)]
    json_logs: bool,

    /// Config file to use instead of the standard locations.
    #[arg(long, global = true, env = "HELIX_CONFIG")]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Stream stdin into a Telegram chat, one cumulative edit per line.
    Stream(stream_commands::StreamArgs),
    /// Configuration inspection.
    Config {
        #[command(subcommand)]
        action: config_commands::ConfigAction,
    },
}

fn init_telemetry(cli: &Cli) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));

    let registry = tracing_subscriber::registry().with(filter);

    // Logs go to stderr; stdout carries command output.
    if cli.json_logs {
        registry
            .with(
                fmt::layer()
                    .json()
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_writer(std::io::stderr),
            )
            .init();
    } else {
        registry
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_thread_ids(false)
                    .with_ansi(true)
                    .with_writer(std::io::stderr),
            )
            .init();
    }
}

fn load_config(cli: &Cli) -> anyhow::Result<HelixConfig> {
    match &cli.config {
        Some(path) => helix_config::load_config(path),
        None => Ok(helix_config::discover_and_load()),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_telemetry(&cli);

    info!(version = env!("CARGO_PKG_VERSION"), "helix starting");

    let config = load_config(&cli)?;
    match cli.command {
        Commands::Stream(args) => stream_commands::handle_stream(&config, args).await,
        Commands::Config { action } => {
            config_commands::handle_config(&config, cli.config.as_deref(), action)
        },
    }
}
