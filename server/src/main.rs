mod command;
mod config;
mod listener;
mod model;
mod session;
mod state;

use anyhow::Result;
use clap::Parser;
use command::{CommandDispatcher, Role};
use config::ServerConfig;
use listener::Listener;
use state::ServerState;
use std::path::PathBuf;
use std::sync::atomic::AtomicU64;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// WidgetLink hardware and app server
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// TOML configuration file; built-in defaults are used when omitted
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .init();

    let args = Args::parse();
    let config = match &args.config {
        Some(path) => ServerConfig::load(path)?,
        None => ServerConfig::default(),
    };

    let server = Arc::new(ServerState::from_config(&config));
    info!("Loaded {} users", server.user_count());

    let dispatcher = Arc::new(CommandDispatcher::new(Arc::clone(&server)));
    let connection_ids = Arc::new(AtomicU64::new(0));

    let hardware = Listener::bind(
        &config.hardware_listen,
        Role::Hardware,
        Arc::clone(&dispatcher),
        Arc::clone(&connection_ids),
        config.outbound_queue,
    )
    .await?;
    let app = Listener::bind(
        &config.app_listen,
        Role::App,
        dispatcher,
        connection_ids,
        config.outbound_queue,
    )
    .await?;

    tokio::select! {
        result = hardware.run() => {
            if let Err(e) = &result {
                error!("Hardware listener failed: {}", e);
            }
            result
        }
        result = app.run() => {
            if let Err(e) = &result {
                error!("App listener failed: {}", e);
            }
            result
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Shutting down, {} sessions open", server.sessions.count());
            Ok(())
        }
    }
}
