//! `SmartTask` server: JSON-file-backed task REST API with background jobs.
//!
//! # Usage
//!
//! ```bash
//! # Run on default address 0.0.0.0:5000 with ./tasks.json
//! cargo run --bin smarttask-server
//!
//! # Custom address and data file
//! cargo run --bin smarttask-server -- --bind 127.0.0.1:8080 --data-file /tmp/tasks.json
//!
//! # Or via environment variables
//! SMARTTASK_ADDR=127.0.0.1:8080 SMARTTASK_DATA=/tmp/tasks.json cargo run --bin smarttask-server
//! ```

use std::path::Path;
use std::sync::Arc;

use clap::Parser;
use smarttask_server::api::{self, AppState};
use smarttask_server::config::{ServerCliArgs, ServerConfig};
use smarttask_server::jobs::{DueSoonScan, RecurrenceJob};
use smarttask_server::persistence::JsonFile;
use smarttask_server::scheduler::Scheduler;
use smarttask_server::store::TaskStore;
use tokio_util::sync::CancellationToken;
use tracing_appender::non_blocking::WorkerGuard;

#[tokio::main]
async fn main() {
    let cli = ServerCliArgs::parse();

    // Load config from CLI args + config file + env vars + defaults.
    let config = match ServerConfig::load(&cli) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error loading configuration: {e}");
            std::process::exit(1);
        }
    };

    let _log_guard = init_logging(&config.log_level, cli.log_file.as_deref());

    tracing::info!(
        addr = %config.bind_addr,
        data_file = %config.data_file.display(),
        "starting smarttask server"
    );

    let store = Arc::new(TaskStore::open(JsonFile::new(&config.data_file)));
    let state = match AppState::new(Arc::clone(&store)).with_allow_origin(&config.allow_origin) {
        Ok(state) => Arc::new(state),
        Err(e) => {
            tracing::error!(origin = %config.allow_origin, error = %e, "invalid CORS origin");
            std::process::exit(1);
        }
    };

    let shutdown = CancellationToken::new();
    let mut scheduler = Scheduler::with_token(shutdown.child_token());
    if config.scheduler_enabled {
        scheduler.spawn(DueSoonScan::new(Arc::clone(&store)), config.due_soon_interval);
        scheduler.spawn(
            RecurrenceJob::new(Arc::clone(&store)),
            config.recurrence_interval,
        );
    } else {
        tracing::info!("background jobs disabled");
    }

    let handle =
        match api::start_server_with_shutdown(&config.bind_addr, state, shutdown.clone()).await {
            Ok((bound_addr, handle)) => {
                tracing::info!(addr = %bound_addr, "server listening");
                for (method, path) in api::ROUTES {
                    tracing::info!(method, path, "route");
                }
                handle
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to start server");
                std::process::exit(1);
            }
        };

    let signal_token = shutdown.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                tracing::info!("shutdown requested");
                signal_token.cancel();
            }
            Err(e) => tracing::error!(error = %e, "failed to listen for ctrl-c"),
        }
    });

    if let Err(e) = handle.await {
        tracing::error!(error = %e, "server task failed");
    }
    scheduler.shutdown().await;
    tracing::info!("server stopped");
}

/// Initialize logging to stderr, or to `file_path` when given.
///
/// `RUST_LOG` takes precedence over `level`. When logging to a file, the
/// returned [`WorkerGuard`] must be held until shutdown so buffered entries
/// are flushed.
fn init_logging(level: &str, file_path: Option<&Path>) -> Option<WorkerGuard> {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    let Some((log_dir, file_name)) = file_path.and_then(|p| {
        let dir = p
            .parent()
            .filter(|d| !d.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        Some((dir, p.file_name()?))
    }) else {
        tracing_subscriber::fmt().with_env_filter(env_filter).init();
        return None;
    };

    let file_appender = tracing_appender::rolling::never(log_dir, file_name);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::fmt()
        .with_writer(non_blocking)
        .with_env_filter(env_filter)
        .with_ansi(false)
        .init();

    Some(guard)
}
