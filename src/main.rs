//! Execution engine CLI - submit a signed transaction and await confirmation
//!
//! Reads a base64 wire transaction from a file, submits it to the configured
//! endpoint and prints the execution result as JSON.

use anyhow::{Context, Result};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use tokio::signal;
use tracing::{error, info, warn};

use tx_execution_engine::config::{LoggingConfig, Settings};
use tx_execution_engine::{
    metrics, CancellationToken, ClientPool, EngineError, ExecutionConfig, Transaction,
};

#[derive(Parser, Debug)]
#[command(name = "execution-engine")]
#[command(about = "Submit a signed transaction and wait for confirmation")]
#[command(version)]
struct Cli {
    /// Network endpoint (overrides the config file)
    #[arg(short, long)]
    endpoint: Option<String>,

    /// File holding the base64-encoded signed wire transaction
    #[arg(short, long)]
    tx_file: PathBuf,

    /// Config file (overrides EXECUTION_ENGINE_CONFIG)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Maximum whole attempts
    #[arg(long)]
    max_retries: Option<u32>,

    /// Seconds to wait for confirmation per attempt
    #[arg(long)]
    max_timeout: Option<u64>,

    /// Confirmation count that satisfies the wait
    #[arg(long)]
    target: Option<u64>,

    /// Accept the confirmation target without finality
    #[arg(long)]
    no_finalized: bool,

    /// Return right after submission
    #[arg(long)]
    skip_confirmation: bool,

    /// Print Prometheus metrics to stderr before exiting
    #[arg(long)]
    print_metrics: bool,
}

impl Cli {
    fn apply_overrides(&self, config: &mut ExecutionConfig) {
        if let Some(max_retries) = self.max_retries {
            config.max_retries = max_retries;
        }
        if let Some(max_timeout) = self.max_timeout {
            config.max_timeout_secs = max_timeout;
        }
        if let Some(target) = self.target {
            config.target_confirmations = target;
        }
        if self.no_finalized {
            config.require_finalized = false;
        }
        if self.skip_confirmation {
            config.skip_confirmation = true;
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let settings = match &cli.config {
        Some(path) => Settings::load_from(path),
        None => Settings::load(),
    };
    let settings = match settings {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("Failed to load configuration: {:#}", e);
            return ExitCode::FAILURE;
        }
    };

    // Initialize logging
    init_logging(&settings.logging);

    info!("Starting execution engine v{}", env!("CARGO_PKG_VERSION"));

    let outcome = run(&cli, settings).await;

    if cli.print_metrics {
        eprint!("{}", metrics::gather_text());
    }

    match outcome {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: &Cli, settings: Settings) -> Result<()> {
    let endpoint = cli
        .endpoint
        .clone()
        .or(settings.endpoint.clone())
        .context("No endpoint given; pass --endpoint or set `endpoint` in the config file")?;

    let mut config = settings.execution.clone();
    cli.apply_overrides(&mut config);

    let encoded = std::fs::read_to_string(&cli.tx_file)
        .with_context(|| format!("Failed to read transaction file: {:?}", cli.tx_file))?;
    let wire = BASE64
        .decode(encoded.trim())
        .context("Transaction file is not valid base64")?;
    let transaction = Transaction::Signed { wire };

    let pool = ClientPool::new(settings.rpc.clone());

    let cancel = CancellationToken::new();
    let shutdown = tokio::spawn({
        let cancel = cancel.clone();
        async move {
            shutdown_signal().await;
            warn!("Shutdown signal received, cancelling execution");
            cancel.cancel();
        }
    });

    let result = pool
        .execute_with_cancel(&endpoint, &transaction, &[], &config, &cancel)
        .await;
    shutdown.abort();

    match result {
        Ok(result) => {
            println!("{}", serde_json::to_string_pretty(&result)?);
            Ok(())
        }
        Err(e @ EngineError::ExecutionFailed { .. }) => {
            Err(anyhow::Error::new(e).context("Transaction was not confirmed"))
        }
        Err(e) => Err(e.into()),
    }
}

fn init_logging(config: &LoggingConfig) {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.filter));

    let registry = tracing_subscriber::registry().with(filter);
    if config.json {
        registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
            .init();
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
