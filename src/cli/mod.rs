use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::{info, warn};

use crate::config::AppConfig;
use crate::database::models::ensure_collections;
use crate::database::{DocumentStore, MemoryStore, PgDocumentStore};
use crate::mail::{Mailer, MemoryMailer, SmtpMailer};
use crate::server::app;
use crate::state::AppState;

#[derive(Parser)]
#[command(name = "restaurant-reviews-api")]
#[command(about = "REST backend for restaurants, reviews and user accounts")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    #[command(about = "Run the HTTP server (default)")]
    Serve {
        #[arg(long, help = "Port to listen on, overrides PORT")]
        port: Option<u16>,
    },

    #[command(about = "Print the effective configuration with secrets redacted")]
    Config,
}

pub async fn run(cli: Cli) -> anyhow::Result<()> {
    let mut config = AppConfig::from_env().context("invalid configuration")?;

    match cli.command.unwrap_or(Commands::Serve { port: None }) {
        Commands::Config => {
            println!("{}", serde_json::to_string_pretty(&config)?);
            Ok(())
        }
        Commands::Serve { port } => {
            if let Some(port) = port {
                config.server.port = port;
            }
            serve(config).await
        }
    }
}

async fn serve(config: AppConfig) -> anyhow::Result<()> {
    info!("Starting Restaurant Reviews API in {:?} mode", config.environment);

    let store: Arc<dyn DocumentStore> = match config.database.url {
        Some(_) => Arc::new(PgDocumentStore::connect(&config.database).await.context("database connection failed")?),
        None => {
            warn!("DATABASE_URL not set; using the in-memory store, data is lost on exit");
            Arc::new(MemoryStore::new())
        }
    };
    ensure_collections(store.as_ref()).await.context("could not prepare collections")?;

    let mailer: Arc<dyn Mailer> = match config.email.host {
        Some(_) => Arc::new(SmtpMailer::new(&config.email).context("invalid mail configuration")?),
        None => {
            warn!("EMAIL_HOST not set; outgoing mail is only logged");
            Arc::new(MemoryMailer::new())
        }
    };

    let bind_addr = format!("0.0.0.0:{}", config.server.port);
    let state = AppState::new(config, store, mailer).context("could not build token service")?;

    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", bind_addr))?;
    info!("Listening on http://{}", bind_addr);

    axum::serve(listener, app(state)).await?;
    Ok(())
}
