//! opstats CLI
//!
//! Command-line interface for the opstats operation analytics service.

use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing::info;

use opstats::api::HttpServer;
use opstats::db::{Database, OperationsRepository};
use opstats::stats::StatsManager;
use opstats::translate::HttpIdTranslator;
use opstats::Config;

/// opstats - Operation usage analytics
#[derive(Parser)]
#[command(name = "opstats")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, global = true, env = "OPSTATS_CONFIG")]
    config: Option<String>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the analytics API server
    Serve {
        /// HTTP API port, overrides the configuration file
        #[arg(long, env = "OPSTATS_HTTP_PORT")]
        http_port: Option<u16>,
    },

    /// Run database migrations
    Migrate,

    /// Show system health status
    Health,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    dotenvy::dotenv().ok();

    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .init();

    let config = match Config::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error loading configuration: {e}");
            return ExitCode::FAILURE;
        }
    };

    let result = match cli.command {
        Commands::Serve { http_port } => run_serve(config, http_port).await,
        Commands::Migrate => run_migrate(config).await,
        Commands::Health => run_health(config).await,
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run_serve(config: Config, http_port: Option<u16>) -> anyhow::Result<()> {
    let port = http_port.unwrap_or(config.server.http_port);
    let addr = format!("{}:{}", config.server.host, port);

    let database = Database::new(&config).await?;
    database.migrate().await?;

    let store = Arc::new(OperationsRepository::new(&database.postgres));
    let translator = Arc::new(HttpIdTranslator::new(&config.translator)?);
    let manager = Arc::new(StatsManager::new(
        store,
        translator,
        config.query.max_attempts,
    ));

    info!("Starting opstats API on {}", addr);
    HttpServer::new(manager).serve(&addr).await?;

    Ok(())
}

async fn run_migrate(config: Config) -> anyhow::Result<()> {
    let database = Database::new(&config).await?;
    database.migrate().await?;
    info!("Migrations applied");
    Ok(())
}

async fn run_health(config: Config) -> anyhow::Result<()> {
    let database = Database::new(&config).await?;
    database.health_check().await?;
    println!("database: ok");
    Ok(())
}
