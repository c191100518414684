//! LineKV server entry point.
//!
//! Parses the port, sets up logging, installs the signal listener and runs
//! the accept loop until a termination signal or an accept failure.

use anyhow::Context;
use linekv::config::{self, Config, Invocation};
use linekv::server::{self, Signals};
use linekv::storage::StorageEngine;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .init();
}

#[tokio::main]
async fn main() {
    let config = match Invocation::from_args(std::env::args().skip(1)) {
        Ok(Invocation::Serve(config)) => config,
        Ok(Invocation::Help) => {
            println!("{}", config::usage());
            return;
        }
        Ok(Invocation::Version) => {
            println!("LineKV version {}", linekv::VERSION);
            return;
        }
        Err(e) => {
            eprintln!("Error: {}\n\n{}", e, config::usage());
            std::process::exit(1);
        }
    };

    init_logging();

    if let Err(e) = serve(config).await {
        error!("{:#}", e);
        std::process::exit(1);
    }
}

async fn serve(config: Config) -> anyhow::Result<()> {
    info!("LineKV v{} starting", linekv::VERSION);

    // One listener for the whole process, installed before any client connects
    let mut signals = Signals::install().context("failed to install signal handlers")?;

    let storage = Arc::new(StorageEngine::new());

    let listener = server::bind(&config.bind_address())
        .await
        .context("startup failed")?;

    let shutdown = async move {
        let signal = signals.recv().await;
        info!(signal, "Got termination signal");
    };

    server::run(listener, storage, shutdown)
        .await
        .context("server stopped")?;

    info!("Server shutdown complete");
    Ok(())
}
