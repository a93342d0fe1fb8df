//! Command-line argument parsing for the DBM samples
//!
//! Flags keep the camelCase spelling shared by every Bid Manager sample
//! (`--clientSecretsFile`, `--queryId`, ...), so existing invocations carry
//! over unchanged.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::auth::AuthOptions;

/// DBM samples - DoubleClick Bid Manager API examples
#[derive(Parser, Debug)]
#[command(
    name = "dbm-samples",
    version,
    about = "Command-line samples for the DoubleClick Bid Manager API",
    long_about = "Creates and runs report queries, waits for reports to finish generating, and downloads
reports and line items using the DoubleClick Bid Manager REST API."
)]
pub struct Cli {
    /// Global options
    #[command(flatten)]
    pub global: GlobalArgs,

    /// Subcommands
    #[command(subcommand)]
    pub command: Commands,
}

/// Global arguments available to all subcommands
#[derive(Args, Debug, Clone, Default)]
pub struct GlobalArgs {
    /// OAuth client secrets file for the installed-application flow
    #[arg(long = "clientSecretsFile", global = true, value_name = "FILE")]
    pub client_secrets_file: Option<PathBuf>,

    /// Authorize with a service account instead of a user account
    #[arg(long = "useServiceAccount", global = true)]
    pub use_service_account: bool,

    /// Service account JSON key file
    #[arg(long = "serviceAccountKeyFile", global = true, value_name = "FILE")]
    pub service_account_key_file: Option<PathBuf>,

    /// Scopes to request in addition to the Bid Manager scope
    #[arg(
        long = "additionalScopes",
        global = true,
        value_name = "SCOPE",
        value_delimiter = ','
    )]
    pub additional_scopes: Vec<String>,

    /// Configuration file path
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Very verbose logging (debug level)
    #[arg(long, global = true)]
    pub very_verbose: bool,

    /// Quiet mode - suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,
}

impl GlobalArgs {
    /// Authorization options from the command line alone
    pub fn auth_options(&self) -> AuthOptions {
        AuthOptions {
            use_service_account: self.use_service_account,
            client_secrets_file: self.client_secrets_file.clone(),
            service_account_key_file: self.service_account_key_file.clone(),
            additional_scopes: self.additional_scopes.clone(),
            ..Default::default()
        }
    }
}

/// Available CLI commands
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Create a standard query, run it and download the report
    CreateAndRunQuery(CreateAndRunQueryArgs),

    /// Download the most recent finished report of a query
    GetLatestReport(GetLatestReportArgs),

    /// List the saved queries of the account
    ListQueries,

    /// Download line items as CSV
    DownloadLineItems(DownloadLineItemsArgs),

    /// Upload line items from a CSV file
    UploadLineItems(UploadLineItemsArgs),
}

/// Arguments for the create-and-run-query command
#[derive(Args, Debug, Clone)]
pub struct CreateAndRunQueryArgs {
    /// The title of the query to be created
    #[arg(long)]
    pub title: String,

    /// The advertiser ID to assign as a filter for the query
    #[arg(long = "advertiserIdFilter", value_name = "ID")]
    pub advertiser_id_filter: i64,

    /// Campaign IDs to assign as filters for the query
    #[arg(long = "campaignIdFilters", value_name = "ID", value_delimiter = ',')]
    pub campaign_id_filters: Vec<i64>,

    /// The path to download the resulting report to
    #[arg(long = "outputFile", value_name = "PATH")]
    pub output_file: PathBuf,
}

/// Arguments for the get-latest-report command
#[derive(Args, Debug, Clone)]
pub struct GetLatestReportArgs {
    /// The ID of the query to download the latest report for
    #[arg(long = "queryId", value_name = "ID")]
    pub query_id: i64,

    /// The path to download the resulting report to
    #[arg(long = "outputFile", value_name = "PATH")]
    pub output_file: PathBuf,
}

/// Arguments for the download-line-items command
#[derive(Args, Debug, Clone)]
pub struct DownloadLineItemsArgs {
    /// ADVERTISER_ID, INSERTION_ORDER_ID or LINE_ITEM_ID
    #[arg(long = "filterType", value_name = "TYPE")]
    pub filter_type: String,

    /// IDs of the chosen filter type, comma separated
    #[arg(
        long = "filterIds",
        value_name = "ID",
        value_delimiter = ',',
        required = true
    )]
    pub filter_ids: Vec<i64>,

    /// Where to write the line items CSV
    #[arg(long = "outputFile", value_name = "PATH", default_value = "line_items.csv")]
    pub output_file: PathBuf,
}

/// Arguments for the upload-line-items command
#[derive(Args, Debug, Clone)]
pub struct UploadLineItemsArgs {
    /// Line items CSV file to upload
    #[arg(long = "inputFile", value_name = "PATH")]
    pub input_file: PathBuf,

    /// Validate the upload without applying it
    #[arg(
        long = "dryRun",
        value_name = "BOOL",
        default_value_t = true,
        action = clap::ArgAction::Set
    )]
    pub dry_run: bool,
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Get the logging level from the verbosity flags, falling back to the
    /// configured level when none is given
    pub fn log_level(&self, configured: &str) -> tracing::Level {
        if self.global.quiet {
            tracing::Level::ERROR
        } else if self.global.very_verbose {
            tracing::Level::DEBUG
        } else if self.global.verbose {
            tracing::Level::INFO
        } else {
            configured.parse().unwrap_or(tracing::Level::WARN)
        }
    }
}
