//! Command handlers for the DBM samples CLI
//!
//! This module implements the command handlers that coordinate between CLI
//! arguments and the core application functionality. Handlers take an
//! already-authorized [`BidManagerClient`], so they can be driven against any
//! endpoint.

use std::path::Path;
use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::app::client::write_atomically;
use crate::app::{line_items, queries};
use crate::app::{BidManagerClient, PollOutcome, PollingConfig, ReportJob, ReportPoller};
use crate::auth::Authenticator;
use crate::cli::{
    CreateAndRunQueryArgs, DownloadLineItemsArgs, GetLatestReportArgs, GlobalArgs,
    UploadLineItemsArgs,
};
use crate::config::AppConfig;
use crate::errors::{ApiError, AppError, ConfigError, Result};

/// Authorizes and builds the API client for one run
///
/// Command-line flags take precedence over the `[auth]` section.
pub async fn connect(global: &GlobalArgs, config: &AppConfig) -> Result<BidManagerClient> {
    let options = global.auth_options().merged_with(&config.auth);
    debug!("Requesting scopes: {}", options.scopes().join(" "));

    let authenticator = Authenticator::from_options(&options).await?;
    Ok(BidManagerClient::new(&config.client, authenticator)?)
}

/// Handle the create-and-run-query command
///
/// Creates a one-time standard query, runs it asynchronously, waits for the
/// report and downloads it.
pub async fn handle_create_and_run_query(
    client: &BidManagerClient,
    args: &CreateAndRunQueryArgs,
    polling: &PollingConfig,
    cancel: CancellationToken,
) -> Result<()> {
    let query = queries::standard_query(
        &args.title,
        args.advertiser_id_filter,
        &args.campaign_id_filters,
    );
    let created = client.create_query(&query).await?;
    let query_id = created.query_id.ok_or_else(|| ApiError::UnexpectedResponse {
        endpoint: "queries".to_string(),
        reason: "created query has no queryId".to_string(),
    })?;
    println!("Query {} was created.", query_id);

    let job = client.run_query(query_id).await?;
    println!(
        "Query {} is running, report {} has been created and is currently being generated.",
        job.query_id, job.report_id
    );

    let outcome = wait_for_report(client, job, polling, cancel).await?;
    let finished = finished_report(outcome)?;
    println!("Report {} generated successfully.", finished.report_id);

    println!("Downloading report file.");
    let bytes = client.download_report(&finished, &args.output_file).await?;
    info!("Wrote {} bytes to {}", bytes, args.output_file.display());
    println!(
        "Report {} successfully downloaded at {}.",
        finished.report_id,
        args.output_file.display()
    );
    Ok(())
}

/// Handle the get-latest-report command
///
/// Finding no finished report is not an error.
pub async fn handle_get_latest_report(
    client: &BidManagerClient,
    args: &GetLatestReportArgs,
) -> Result<()> {
    let Some(report) = queries::find_latest_report(client, args.query_id).await? else {
        println!(
            "No reports have been successfully generated for query {}. Exiting.",
            args.query_id
        );
        return Ok(());
    };

    println!("Downloading report {}.", report.report_id);
    client.download_report(&report, &args.output_file).await?;
    println!(
        "Report {} successfully downloaded to {}.",
        report.report_id,
        args.output_file.display()
    );
    Ok(())
}

/// Handle the list-queries command
pub async fn handle_list_queries(client: &BidManagerClient) -> Result<()> {
    let queries = queries::list_all_queries(client).await?;
    if queries.is_empty() {
        println!("No queries found.");
        return Ok(());
    }

    for query in &queries {
        let id = query
            .query_id
            .map(|id| id.to_string())
            .unwrap_or_else(|| "-".to_string());
        println!("{}\t{}", id, query.metadata.title);
    }
    Ok(())
}

/// Handle the download-line-items command
pub async fn handle_download_line_items(
    client: &BidManagerClient,
    args: &DownloadLineItemsArgs,
) -> Result<()> {
    let request = line_items::download_request(&args.filter_type, &args.filter_ids)?;
    let response = client.download_line_items(&request).await?;

    write_atomically(&args.output_file, response.line_items.as_bytes()).await?;
    println!("Download complete.");
    Ok(())
}

/// Handle the upload-line-items command
///
/// Errors reported by the upload status are printed; the command itself
/// still succeeds because the request was processed.
pub async fn handle_upload_line_items(
    client: &BidManagerClient,
    args: &UploadLineItemsArgs,
) -> Result<()> {
    let contents = read_input_file(&args.input_file).await?;
    let request = line_items::upload_request(contents, args.dry_run);
    let response = client.upload_line_items(&request).await?;

    let errors = line_items::upload_errors(&response);
    if errors.is_empty() {
        println!("Upload successful.");
    } else {
        for error in &errors {
            println!("{}", error);
        }
    }
    if args.dry_run {
        println!("Dry run: no line items were changed.");
    }
    Ok(())
}

async fn read_input_file(path: &Path) -> Result<String> {
    tokio::fs::read_to_string(path).await.map_err(|e| {
        AppError::Config(ConfigError::invalid(
            "--inputFile",
            path.display().to_string(),
            e.to_string(),
        ))
    })
}

/// Polls a running report behind a spinner
async fn wait_for_report(
    client: &BidManagerClient,
    job: ReportJob,
    polling: &PollingConfig,
    cancel: CancellationToken,
) -> Result<PollOutcome> {
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg} [{elapsed}]")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["◐", "◓", "◑", "◒"]),
    );
    spinner.set_message(format!("Waiting for report {} to finish...", job.report_id));
    spinner.enable_steady_tick(Duration::from_millis(120));

    let mut polls = 0u32;
    let outcome = ReportPoller::new(polling.policy())
        .with_cancellation(cancel)
        .poll(job, |key| {
            polls += 1;
            spinner.set_message(format!(
                "Waiting for report {} to finish (check {})...",
                key.report_id, polls
            ));
            client.get_report(key)
        })
        .await;

    spinner.finish_and_clear();
    Ok(outcome?)
}

/// Maps every outcome other than a finished report to its error
fn finished_report(outcome: PollOutcome) -> Result<ReportJob> {
    match outcome {
        PollOutcome::Done(job) => Ok(job),
        PollOutcome::Failed(job) => {
            println!("Report {} failed to generate. Exiting.", job.report_id);
            Err(AppError::JobFailed {
                query_id: job.query_id,
                report_id: job.report_id,
            })
        }
        PollOutcome::GaveUp { last, elapsed } => {
            println!("Abandoning report polling. Exiting.");
            Err(AppError::PollingTimeout {
                query_id: last.query_id,
                report_id: last.report_id,
                elapsed,
            })
        }
        PollOutcome::Cancelled { .. } => Err(AppError::Cancelled),
    }
}
