mod cli;
mod error;
mod handler;
mod metadata;
mod server;
mod services;
mod soap;
mod types;
mod wsdl;

use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::cli::{Cli, Command};
use crate::error::ServiceError;
use crate::server::{ServerConfig, start_server};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,minisoap::soap=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let command = cli.resolved_command().unwrap_or_else(|e| e.exit());

    match command {
        Command::Start(args) => {
            args.validate().map_err(ServiceError::FromString)?;
            tracing::info!("Starting {} v{}", metadata::PKG_NAME, metadata::PKG_VERSION);

            let shutdown = CancellationToken::new();
            let signal = shutdown.clone();
            tokio::spawn(async move {
                if let Err(e) = tokio::signal::ctrl_c().await {
                    tracing::error!("Failed to listen for shutdown signal: {e}");
                    return;
                }
                tracing::info!("Shutdown signal received");
                signal.cancel();
            });

            start_server(ServerConfig::from(&args), shutdown).await?;
        }
        Command::Wsdl(args) => {
            let app = services::application(&args.namespace);
            println!("{}", app.wsdl(&args.location));
        }
        Command::Version => {
            println!("{} {}", metadata::PKG_NAME, metadata::PKG_VERSION);
        }
    }

    Ok(())
}
