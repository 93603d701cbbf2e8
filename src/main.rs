use std::sync::Arc;

use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use tutor_bayes::{
    cli::{execute_command, Commands},
    config::{Config, LogFormat, ProgressStoreConfig},
    inference::InferenceClient,
    storage::{HttpProgressStore, ProgressStore, SqliteProgressStore},
};

/// CPD editing and mastery tracking for Bayesian-network tutoring content
#[derive(Parser, Debug)]
#[command(name = "tutor-bayes", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let config = match Config::from_env() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            std::process::exit(1);
        }
    };

    // Initialize logging
    init_logging(&config);

    info!(version = env!("CARGO_PKG_VERSION"), "tutor-bayes starting");

    // Initialize inference client
    let backend = match InferenceClient::new(&config.inference, config.request.clone()) {
        Ok(c) => {
            info!(base_url = %config.inference.base_url, "Inference client initialized");
            c
        }
        Err(e) => {
            error!(error = %e, "Failed to initialize inference client");
            return Err(e.into());
        }
    };

    // Initialize progress store
    let store: Arc<dyn ProgressStore> = match &config.progress {
        ProgressStoreConfig::Sqlite => match SqliteProgressStore::new(&config.database).await {
            Ok(s) => {
                info!(path = %config.database.path.display(), "Database initialized");
                Arc::new(s)
            }
            Err(e) => {
                error!(error = %e, "Failed to initialize database");
                return Err(e.into());
            }
        },
        ProgressStoreConfig::Http { base_url } => {
            match HttpProgressStore::new(
                base_url,
                config.inference.api_token.clone(),
                &config.request,
            ) {
                Ok(s) => {
                    info!(base_url = %base_url, "Remote progress store initialized");
                    Arc::new(s)
                }
                Err(e) => {
                    error!(error = %e, "Failed to initialize remote progress store");
                    return Err(e.into());
                }
            }
        }
    };

    let result = execute_command(cli.command, Arc::new(backend), store).await;

    if result.exit_code == 0 {
        println!("{}", result.message);
    } else {
        eprintln!("{}", result.message);
        std::process::exit(result.exit_code);
    }

    Ok(())
}

/// Initialize tracing/logging
fn init_logging(config: &Config) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.logging.level));

    match config.logging.format {
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer().json().with_writer(std::io::stderr))
                .init();
        }
        LogFormat::Pretty => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer().with_writer(std::io::stderr))
                .init();
        }
    }
}
