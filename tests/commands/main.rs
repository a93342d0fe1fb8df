//! Integration tests for the command handlers
//!
//! These tests drive each command end to end against a mock Bid Manager
//! server: query creation, report polling, storage download and line items.

use std::time::Duration;

use serde_json::{json, Value};
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{body_partial_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use dbm_samples::app::{BidManagerClient, ClientConfig, PollingConfig};
use dbm_samples::auth::Authenticator;
use dbm_samples::cli::{
    handle_create_and_run_query, handle_download_line_items, handle_get_latest_report,
    handle_list_queries, handle_upload_line_items, CreateAndRunQueryArgs, DownloadLineItemsArgs,
    GetLatestReportArgs, UploadLineItemsArgs,
};
use dbm_samples::errors::AppError;

const REPORT_CSV: &[u8] = b"Advertiser,Impressions\r\nAcme,1024\r\n";

/// Create a client pointed at the mock server with a fixed token
fn client_for(server: &MockServer) -> BidManagerClient {
    BidManagerClient::with_base_urls(
        &ClientConfig::default(),
        Authenticator::Static("test-token".to_string()),
        &format!("{}/v2/", server.uri()),
        &format!("{}/v1.1/", server.uri()),
    )
    .unwrap()
}

/// Polling fast enough for tests
fn fast_polling(max_elapsed: Duration) -> PollingConfig {
    PollingConfig {
        initial_interval: Duration::from_millis(10),
        max_interval: Duration::from_millis(40),
        max_elapsed,
        multiplier: 1.5,
    }
}

fn report(query_id: i64, report_id: i64, state: &str, storage: Option<String>) -> Value {
    let mut metadata = json!({ "status": { "state": state } });
    if let Some(storage) = storage {
        metadata["googleCloudStoragePath"] = json!(storage);
    }
    json!({
        "key": { "queryId": query_id.to_string(), "reportId": report_id.to_string() },
        "metadata": metadata,
    })
}

async fn mount_storage(server: &MockServer) -> String {
    Mock::given(method("GET"))
        .and(path("/storage/report.csv"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(REPORT_CSV))
        .mount(server)
        .await;
    format!("{}/storage/report.csv", server.uri())
}

async fn mount_create_and_run(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/v2/queries"))
        .and(header("authorization", "Bearer test-token"))
        .and(body_partial_json(json!({
            "metadata": { "title": "Weekly", "dataRange": { "range": "LAST_7_DAYS" }, "format": "CSV" },
            "params": {
                "type": "STANDARD",
                "filters": [
                    { "type": "FILTER_ADVERTISER", "value": "1234" },
                    { "type": "FILTER_MEDIA_PLAN", "value": "55" }
                ]
            },
            "schedule": { "frequency": "ONE_TIME" }
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "queryId": "99",
            "metadata": { "title": "Weekly" }
        })))
        .expect(1)
        .mount(server)
        .await;

    Mock::given(method("POST"))
        .and(path("/v2/queries/99:run"))
        .and(query_param("synchronous", "false"))
        .respond_with(ResponseTemplate::new(200).set_body_json(report(99, 500, "QUEUED", None)))
        .expect(1)
        .mount(server)
        .await;
}

fn create_args(output: &TempDir) -> CreateAndRunQueryArgs {
    CreateAndRunQueryArgs {
        title: "Weekly".to_string(),
        advertiser_id_filter: 1234,
        campaign_id_filters: vec![55],
        output_file: output.path().join("report.csv"),
    }
}

#[tokio::test]
async fn test_create_and_run_query_downloads_report() {
    let server = MockServer::start().await;
    let storage = mount_storage(&server).await;
    mount_create_and_run(&server).await;

    // Two RUNNING polls, then DONE
    Mock::given(method("GET"))
        .and(path("/v2/queries/99/reports/500"))
        .respond_with(ResponseTemplate::new(200).set_body_json(report(99, 500, "RUNNING", None)))
        .up_to_n_times(2)
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v2/queries/99/reports/500"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(report(99, 500, "DONE", Some(storage))),
        )
        .expect(1)
        .mount(&server)
        .await;

    let output = TempDir::new().unwrap();
    let args = create_args(&output);
    handle_create_and_run_query(
        &client_for(&server),
        &args,
        &fast_polling(Duration::from_secs(10)),
        CancellationToken::new(),
    )
    .await
    .unwrap();

    let written = tokio::fs::read(&args.output_file).await.unwrap();
    assert_eq!(written, REPORT_CSV);
}

#[tokio::test]
async fn test_create_and_run_query_reports_failed_job() {
    let server = MockServer::start().await;
    mount_create_and_run(&server).await;
    Mock::given(method("GET"))
        .and(path("/v2/queries/99/reports/500"))
        .respond_with(ResponseTemplate::new(200).set_body_json(report(99, 500, "FAILED", None)))
        .expect(1)
        .mount(&server)
        .await;

    let output = TempDir::new().unwrap();
    let args = create_args(&output);
    let error = handle_create_and_run_query(
        &client_for(&server),
        &args,
        &fast_polling(Duration::from_secs(10)),
        CancellationToken::new(),
    )
    .await
    .unwrap_err();

    assert!(matches!(
        error,
        AppError::JobFailed {
            query_id: 99,
            report_id: 500
        }
    ));
    assert_eq!(error.exit_code(), 4);
    assert!(!args.output_file.exists());
}

#[tokio::test]
async fn test_create_and_run_query_gives_up_after_budget() {
    let server = MockServer::start().await;
    mount_create_and_run(&server).await;
    Mock::given(method("GET"))
        .and(path("/v2/queries/99/reports/500"))
        .respond_with(ResponseTemplate::new(200).set_body_json(report(99, 500, "RUNNING", None)))
        .mount(&server)
        .await;

    let output = TempDir::new().unwrap();
    let args = create_args(&output);
    let error = handle_create_and_run_query(
        &client_for(&server),
        &args,
        &fast_polling(Duration::from_millis(50)),
        CancellationToken::new(),
    )
    .await
    .unwrap_err();

    match error {
        AppError::PollingTimeout {
            query_id,
            report_id,
            elapsed,
        } => {
            assert_eq!((query_id, report_id), (99, 500));
            assert!(elapsed <= Duration::from_millis(50));
        }
        other => panic!("Expected PollingTimeout, got {:?}", other),
    }
    assert!(!args.output_file.exists());
}

#[tokio::test]
async fn test_create_and_run_query_cancelled() {
    let server = MockServer::start().await;
    mount_create_and_run(&server).await;
    Mock::given(method("GET"))
        .and(path("/v2/queries/99/reports/500"))
        .respond_with(ResponseTemplate::new(200).set_body_json(report(99, 500, "RUNNING", None)))
        .mount(&server)
        .await;

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(30)).await;
        trigger.cancel();
    });

    let output = TempDir::new().unwrap();
    let polling = PollingConfig {
        initial_interval: Duration::from_secs(30),
        max_interval: Duration::from_secs(60),
        max_elapsed: Duration::from_secs(3600),
        multiplier: 1.5,
    };
    let started = std::time::Instant::now();
    let error = handle_create_and_run_query(&client_for(&server), &create_args(&output), &polling, cancel)
        .await
        .unwrap_err();

    assert!(matches!(error, AppError::Cancelled));
    assert!(started.elapsed() < Duration::from_secs(5));
}

#[tokio::test]
async fn test_get_latest_report_downloads_newest_done() {
    let server = MockServer::start().await;
    let storage = mount_storage(&server).await;

    Mock::given(method("GET"))
        .and(path("/v2/queries/42/reports"))
        .and(query_param("orderBy", "key.reportId desc"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "reports": [
                report(42, 9, "RUNNING", None),
                report(42, 8, "DONE", Some(storage)),
                report(42, 7, "DONE", Some("https://unused.example/old.csv".to_string())),
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let output = TempDir::new().unwrap();
    let args = GetLatestReportArgs {
        query_id: 42,
        output_file: output.path().join("latest.csv"),
    };
    handle_get_latest_report(&client_for(&server), &args)
        .await
        .unwrap();

    assert_eq!(tokio::fs::read(&args.output_file).await.unwrap(), REPORT_CSV);
}

#[tokio::test]
async fn test_get_latest_report_without_finished_report_is_clean() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v2/queries/42/reports"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "reports": [report(42, 9, "FAILED", None)]
        })))
        .mount(&server)
        .await;

    let output = TempDir::new().unwrap();
    let args = GetLatestReportArgs {
        query_id: 42,
        output_file: output.path().join("latest.csv"),
    };
    handle_get_latest_report(&client_for(&server), &args)
        .await
        .unwrap();
    assert!(!args.output_file.exists());
}

#[tokio::test]
async fn test_api_error_surfaces_as_transport_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v2/queries/42/reports"))
        .respond_with(ResponseTemplate::new(403).set_body_string("The caller does not have permission"))
        .mount(&server)
        .await;

    let output = TempDir::new().unwrap();
    let args = GetLatestReportArgs {
        query_id: 42,
        output_file: output.path().join("latest.csv"),
    };
    let error = handle_get_latest_report(&client_for(&server), &args)
        .await
        .unwrap_err();

    assert_eq!(error.exit_code(), 1);
    assert!(error.to_string().contains("does not have permission"));
}

#[tokio::test]
async fn test_list_queries() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v2/queries"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "queries": [
                { "queryId": "1", "metadata": { "title": "First" } },
                { "queryId": "2", "metadata": { "title": "Second" } }
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;

    handle_list_queries(&client_for(&server)).await.unwrap();
}

#[tokio::test]
async fn test_download_line_items_writes_csv() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1.1/lineitems/downloadlineitems"))
        .and(body_partial_json(json!({
            "filterType": "ADVERTISER_ID",
            "filterIds": ["11", "12"],
            "format": "CSV"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "lineItems": "Line Item Id,Name\n1,Prospecting\n"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let output = TempDir::new().unwrap();
    let args = DownloadLineItemsArgs {
        filter_type: "advertiser_id".to_string(),
        filter_ids: vec![11, 12],
        output_file: output.path().join("line_items.csv"),
    };
    handle_download_line_items(&client_for(&server), &args)
        .await
        .unwrap();

    let written = tokio::fs::read_to_string(&args.output_file).await.unwrap();
    assert_eq!(written, "Line Item Id,Name\n1,Prospecting\n");
}

#[tokio::test]
async fn test_download_line_items_rejects_unknown_filter() {
    let server = MockServer::start().await;
    let output = TempDir::new().unwrap();
    let args = DownloadLineItemsArgs {
        filter_type: "CAMPAIGN_ID".to_string(),
        filter_ids: vec![1],
        output_file: output.path().join("line_items.csv"),
    };

    let error = handle_download_line_items(&client_for(&server), &args)
        .await
        .unwrap_err();
    assert_eq!(error.exit_code(), 2);
    assert!(server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_upload_line_items_sends_dry_run() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1.1/lineitems/uploadlineitems"))
        .and(body_partial_json(json!({
            "lineItems": "Line Item Id,Name\n1,Renamed\n",
            "dryRun": true,
            "format": "CSV"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "uploadStatus": {
                "rowStatus": [{ "rowNumber": 1, "changed": true }]
            }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let input = TempDir::new().unwrap();
    let input_file = input.path().join("items.csv");
    tokio::fs::write(&input_file, "Line Item Id,Name\n1,Renamed\n")
        .await
        .unwrap();

    let args = UploadLineItemsArgs {
        input_file,
        dry_run: true,
    };
    handle_upload_line_items(&client_for(&server), &args)
        .await
        .unwrap();
}
