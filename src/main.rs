//! DBM samples CLI application
//!
//! Command-line samples for the DoubleClick Bid Manager API: create and run
//! report queries, wait for reports, and download reports and line items.

use std::error::Error as _;
use std::process;

use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

use dbm_samples::cli::{
    connect, handle_create_and_run_query, handle_download_line_items, handle_get_latest_report,
    handle_list_queries, handle_upload_line_items, spawn_signal_listener, Cli, Commands,
};
use dbm_samples::config::AppConfig;
use dbm_samples::errors::{AppError, Result};

#[tokio::main]
async fn main() {
    let result = run().await;

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        let mut source = e.source();
        while let Some(cause) = source {
            eprintln!("  Caused by: {}", cause);
            source = cause.source();
        }
        process::exit(e.exit_code());
    }
}

/// Main application logic
async fn run() -> Result<()> {
    // Load environment variables from .env file if it exists
    dotenv::dotenv().ok();

    let cli = Cli::parse_args();
    let config = AppConfig::load(cli.global.config.clone()).await?;

    init_logging(&cli, &config);
    info!("DBM samples v{} starting", env!("CARGO_PKG_VERSION"));

    let cancel = CancellationToken::new();
    let _signals = spawn_signal_listener(cancel.clone());

    tokio::select! {
        result = execute(cli, config, cancel.clone()) => result,
        _ = cancel.cancelled() => Err(AppError::Cancelled),
    }
}

/// Authorizes and runs the selected command
async fn execute(cli: Cli, config: AppConfig, cancel: CancellationToken) -> Result<()> {
    let client = connect(&cli.global, &config).await?;

    match cli.command {
        Commands::CreateAndRunQuery(args) => {
            info!("Executing create-and-run-query command");
            handle_create_and_run_query(&client, &args, &config.polling, cancel).await
        }
        Commands::GetLatestReport(args) => {
            info!("Executing get-latest-report command");
            handle_get_latest_report(&client, &args).await
        }
        Commands::ListQueries => {
            info!("Executing list-queries command");
            handle_list_queries(&client).await
        }
        Commands::DownloadLineItems(args) => {
            info!("Executing download-line-items command");
            handle_download_line_items(&client, &args).await
        }
        Commands::UploadLineItems(args) => {
            info!("Executing upload-line-items command");
            handle_upload_line_items(&client, &args).await
        }
    }
}

/// Initialize logging from the verbosity flags and the configured level
fn init_logging(cli: &Cli, config: &AppConfig) {
    let log_level = cli.log_level(&config.logging.level);

    let mut filter = EnvFilter::from_default_env();
    if let Ok(directive) = format!("dbm_samples={}", log_level).parse() {
        filter = filter.add_directive(directive);
    }

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_level(cli.global.very_verbose)
        .with_writer(std::io::stderr)
        .init();

    if cli.global.very_verbose {
        info!("Very verbose logging enabled");
    } else if cli.global.verbose {
        info!("Verbose logging enabled");
    }
}
