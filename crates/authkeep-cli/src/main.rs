//! authkeep - command-line front end for the session manager.
//!
//! Each invocation restores the persisted session, runs one command and
//! exits; the session survives between runs through the configured store.

mod commands;

use std::io;
use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use tracing::{debug, info};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use authkeep_core::{BearerAuth, Config, HttpIdentityClient, SessionManager, Transport};

use commands::Command;

/// Initialize the tracing subscriber for logging.
/// The returned guard must stay alive for file logs to be flushed.
fn init_tracing(config: &Config) -> Option<WorkerGuard> {
    // Use RUST_LOG env var to control log level (e.g., RUST_LOG=debug)
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    let (file_layer, guard) = match config.log_file.as_deref().and_then(|p| Some((p, p.file_name()?))) {
        Some((path, file_name)) => {
            let dir = path.parent().unwrap_or_else(|| Path::new("."));
            let appender = tracing_appender::rolling::never(dir, file_name);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            (Some(fmt::layer().with_writer(writer).with_ansi(false)), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(file_layer)
        .with(filter)
        .init();

    guard
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let config = match Config::load() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Warning: failed to load config ({}), using defaults", e);
            Config::default()
        }
    };
    let _log_guard = init_tracing(&config);

    let args: Vec<String> = std::env::args().skip(1).collect();
    let command = match Command::parse(&args) {
        Ok(command) => command,
        Err(e) => {
            eprintln!("Error: {}\n", e);
            commands::print_usage();
            std::process::exit(2);
        }
    };
    if let Command::Help = command {
        commands::print_usage();
        return Ok(());
    }

    debug!(api = %config.api_base_url, storage = ?config.storage, "Configuration loaded");

    let auth = BearerAuth::new();
    let transport = Transport::new(config.api_base_url.clone(), config.request_timeout(), auth.clone())?;
    let client = Arc::new(HttpIdentityClient::new(transport));
    let store = config.open_store()?;
    let manager = SessionManager::restore(client, store, auth).with_logout_timeout(config.logout_timeout());

    info!(state = %manager.state(), "authkeep starting");

    commands::run(command, &manager, config).await
}
