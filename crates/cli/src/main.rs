mod config_commands;

use std::path::PathBuf;

use {
    clap::{Parser, Subcommand},
    tracing::info,
    tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt},
};

#[derive(Parser)]
#[command(name = "therra", about = "Therra: customer-service bot gateway for small businesses")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, global = true, default_value = "info", env = "THERRA_LOG_LEVEL")]
    log_level: String,

    /// Output logs as JSON instead of human-readable.
    #[arg(long, global = true, default_value_t = false, env = "THERRA_JSON_LOGS")]
    json_logs: bool,

    /// Config file (overrides discovery of ./therra.toml and the user config dir).
    #[arg(long, global = true, env = "THERRA_CONFIG")]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the gateway server (default when no subcommand is provided).
    Gateway {
        /// Address to bind to (overrides config value).
        #[arg(long)]
        bind: Option<String>,
        /// Port to listen on (overrides config value).
        #[arg(long)]
        port: Option<u16>,
    },
    /// Print a fresh vault root key (64 hex characters).
    Keygen,
    /// Load and validate the configuration, including the vault key.
    CheckConfig,
}

fn init_telemetry(cli: &Cli) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));

    let registry = tracing_subscriber::registry().with(filter);

    if cli.json_logs {
        registry
            .with(fmt::layer().json().with_target(true).with_thread_ids(false))
            .init();
    } else {
        registry
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_thread_ids(false)
                    .with_ansi(true),
            )
            .init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    // keygen output is meant for piping; keep stdout clean.
    if matches!(cli.command, Some(Commands::Keygen)) {
        println!("{}", therra_vault::generate_root_key());
        return Ok(());
    }

    init_telemetry(&cli);
    info!(version = env!("CARGO_PKG_VERSION"), "therra starting");

    match cli.command {
        None => run_gateway(cli.config, None, None).await,
        Some(Commands::Gateway { bind, port }) => run_gateway(cli.config, bind, port).await,
        Some(Commands::CheckConfig) => config_commands::check_config(cli.config.as_deref()),
        Some(Commands::Keygen) => Ok(()),
    }
}

async fn run_gateway(
    config_path: Option<PathBuf>,
    bind: Option<String>,
    port: Option<u16>,
) -> anyhow::Result<()> {
    let config = therra_config::discover_and_load(config_path.as_deref())?;

    // CLI args override config values
    let bind = bind.unwrap_or_else(|| config.server.bind.clone());
    let port = port.unwrap_or(config.server.port);

    therra_gateway::start_gateway(config, &bind, port).await
}
