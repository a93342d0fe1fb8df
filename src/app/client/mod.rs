//! REST client for the DoubleClick Bid Manager API
//!
//! The module is organized into specialized components:
//! - `config`: HTTP client configuration and building
//! - `http`: Authorized JSON requests with status mapping
//! - `download`: Report file downloads with atomic writes

use std::path::Path;

use url::Url;

use crate::auth::Authenticator;
use crate::constants::dbm;
use crate::errors::{ApiResult, DownloadError, DownloadResult};

use super::models::{
    DownloadLineItemsRequest, DownloadLineItemsResponse, ListQueriesResponse,
    ListReportsResponse, Query, Report, ReportJob, ReportKey, RunQueryRequest,
    UploadLineItemsRequest, UploadLineItemsResponse,
};

pub mod config;
pub mod download;
pub mod http;

pub use config::ClientConfig;
pub use download::{write_atomically, DownloadHandler};

use http::HttpHandler;

/// Client for the Bid Manager reporting (v2) and line item (v1.1) APIs
#[derive(Debug)]
pub struct BidManagerClient {
    http_handler: HttpHandler,
    base_url: Url,
    line_items_base_url: Url,
}

impl BidManagerClient {
    /// Creates a client against the production endpoints
    ///
    /// # Errors
    ///
    /// Returns `ApiError` if the HTTP client cannot be built
    pub fn new(config: &ClientConfig, authenticator: Authenticator) -> ApiResult<Self> {
        Self::with_base_urls(
            config,
            authenticator,
            dbm::BASE_URL,
            dbm::LINE_ITEMS_BASE_URL,
        )
    }

    /// Creates a client against custom endpoints
    ///
    /// Base URLs are treated as directories: a missing trailing slash is added.
    pub fn with_base_urls(
        config: &ClientConfig,
        authenticator: Authenticator,
        base_url: &str,
        line_items_base_url: &str,
    ) -> ApiResult<Self> {
        let client = config.build_http_client()?;

        Ok(Self {
            http_handler: HttpHandler::new(client, authenticator),
            base_url: directory_url(base_url)?,
            line_items_base_url: directory_url(line_items_base_url)?,
        })
    }

    /// Registers a new query and returns it with its server-assigned id
    pub async fn create_query(&self, query: &Query) -> ApiResult<Query> {
        let url = self.base_url.join("queries")?;
        let created: Query = self.http_handler.post_json(url, &[], query).await?;
        tracing::info!(
            "Created query {:?} titled \"{}\"",
            created.query_id,
            created.metadata.title
        );
        Ok(created)
    }

    /// Starts an asynchronous run of a query, returning the pending report
    pub async fn run_query(&self, query_id: i64) -> ApiResult<ReportJob> {
        let url = self.base_url.join(&format!("queries/{}:run", query_id))?;
        let report: Report = self
            .http_handler
            .post_json(url, &[("synchronous", "false")], &RunQueryRequest::default())
            .await?;
        let job = ReportJob::from(report);
        tracing::info!("Started {} in state {}", job.key(), job.state);
        Ok(job)
    }

    /// Fetches the current status of one report
    pub async fn get_report(&self, key: ReportKey) -> ApiResult<ReportJob> {
        let url = self.base_url.join(&format!(
            "queries/{}/reports/{}",
            key.query_id, key.report_id
        ))?;
        let report: Report = self.http_handler.get_json(url, &[]).await?;
        Ok(ReportJob::from(report))
    }

    /// Lists one page of a query's reports, newest first
    pub async fn list_reports(
        &self,
        query_id: i64,
        page_token: Option<&str>,
    ) -> ApiResult<ListReportsResponse> {
        let url = self.base_url.join(&format!("queries/{}/reports", query_id))?;
        let mut params = vec![("orderBy", dbm::REPORTS_NEWEST_FIRST)];
        if let Some(token) = page_token {
            params.push(("pageToken", token));
        }
        self.http_handler.get_json(url, &params).await
    }

    pub async fn get_query(&self, query_id: i64) -> ApiResult<Query> {
        let url = self.base_url.join(&format!("queries/{}", query_id))?;
        self.http_handler.get_json(url, &[]).await
    }

    /// Lists one page of saved queries
    pub async fn list_queries(&self, page_token: Option<&str>) -> ApiResult<ListQueriesResponse> {
        let url = self.base_url.join("queries")?;
        let params: Vec<(&str, &str)> = page_token
            .map(|token| vec![("pageToken", token)])
            .unwrap_or_default();
        self.http_handler.get_json(url, &params).await
    }

    pub async fn download_line_items(
        &self,
        request: &DownloadLineItemsRequest,
    ) -> ApiResult<DownloadLineItemsResponse> {
        let url = self.line_items_base_url.join("lineitems/downloadlineitems")?;
        self.http_handler.post_json(url, &[], request).await
    }

    pub async fn upload_line_items(
        &self,
        request: &UploadLineItemsRequest,
    ) -> ApiResult<UploadLineItemsResponse> {
        let url = self.line_items_base_url.join("lineitems/uploadlineitems")?;
        self.http_handler.post_json(url, &[], request).await
    }

    /// Downloads a finished report's file to `destination`
    ///
    /// Storage URLs are pre-signed, so no bearer token is attached.
    ///
    /// # Errors
    ///
    /// Returns `DownloadError::MissingStoragePath` if the report has no
    /// storage location, or any error from the download itself
    pub async fn download_report(&self, job: &ReportJob, destination: &Path) -> DownloadResult<u64> {
        let url = job
            .storage_path
            .as_deref()
            .ok_or(DownloadError::MissingStoragePath {
                report_id: job.report_id,
            })?;

        tracing::info!("Downloading {} to {}", job.key(), destination.display());
        DownloadHandler::new(self.http_handler.client())
            .download_to_file(url, destination)
            .await
    }

    /// Base URL of the reporting API
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }
}

fn directory_url(raw: &str) -> ApiResult<Url> {
    if raw.ends_with('/') {
        Ok(Url::parse(raw)?)
    } else {
        Ok(Url::parse(&format!("{}/", raw))?)
    }
}
