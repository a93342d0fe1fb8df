//! Query construction and report lookup
//!
//! Builds the one-time standard query the samples create, and walks a
//! query's report history to find the newest finished report.

use crate::constants::dbm;
use crate::errors::ApiResult;

use super::client::BidManagerClient;
use super::models::{
    DataRange, FilterPair, ListQueriesResponse, ListReportsResponse, Parameters, Query, QueryMetadata, QuerySchedule,
    Report, ReportJob, ReportState,
};

/// Dimensions of the standard report
pub const STANDARD_GROUP_BYS: [&str; 7] = [
    "FILTER_ADVERTISER_NAME",
    "FILTER_ADVERTISER",
    "FILTER_ADVERTISER_CURRENCY",
    "FILTER_INSERTION_ORDER_NAME",
    "FILTER_INSERTION_ORDER",
    "FILTER_LINE_ITEM_NAME",
    "FILTER_LINE_ITEM",
];

/// Metrics of the standard report
pub const STANDARD_METRICS: [&str; 9] = [
    "METRIC_IMPRESSIONS",
    "METRIC_BILLABLE_IMPRESSIONS",
    "METRIC_CLICKS",
    "METRIC_CTR",
    "METRIC_TOTAL_CONVERSIONS",
    "METRIC_LAST_CLICKS",
    "METRIC_LAST_IMPRESSIONS",
    "METRIC_REVENUE_ADVERTISER",
    "METRIC_MEDIA_COST_ADVERTISER",
];

/// Builds a one-time CSV query over the last seven days
///
/// The advertiser filter comes first, followed by one media plan filter per
/// campaign in the order given.
pub fn standard_query(title: &str, advertiser_id: i64, campaign_ids: &[i64]) -> Query {
    let mut filters = vec![FilterPair::new("FILTER_ADVERTISER", advertiser_id.to_string())];
    filters.extend(
        campaign_ids
            .iter()
            .map(|id| FilterPair::new("FILTER_MEDIA_PLAN", id.to_string())),
    );

    Query {
        query_id: None,
        metadata: QueryMetadata {
            title: title.to_string(),
            data_range: Some(DataRange {
                range: "LAST_7_DAYS".to_string(),
            }),
            format: Some("CSV".to_string()),
        },
        params: Parameters {
            report_type: Some("STANDARD".to_string()),
            group_bys: STANDARD_GROUP_BYS.iter().map(|s| s.to_string()).collect(),
            filters,
            metrics: STANDARD_METRICS.iter().map(|s| s.to_string()).collect(),
        },
        schedule: QuerySchedule {
            frequency: Some("ONE_TIME".to_string()),
        },
    }
}

/// Finds the newest `DONE` report of a query
///
/// Reports are listed newest first. Pages are followed until a finished
/// report turns up, the page token runs out, or
/// [`MAX_REPORT_LIST_PAGES`](dbm::MAX_REPORT_LIST_PAGES) pages have been read.
/// Returns `Ok(None)` when nothing finished was found.
pub async fn find_latest_report(
    client: &BidManagerClient,
    query_id: i64,
) -> ApiResult<Option<ReportJob>> {
    let mut page_token: Option<String> = None;

    for page in 1..=dbm::MAX_REPORT_LIST_PAGES {
        let ListReportsResponse {
            reports,
            next_page_token,
        } = client.list_reports(query_id, page_token.as_deref()).await?;
        tracing::debug!(
            "Page {} of reports for query {} has {} entries",
            page,
            query_id,
            reports.len()
        );

        if let Some(job) = first_done(reports) {
            return Ok(Some(job));
        }

        match next_page_token.filter(|token| !token.is_empty()) {
            Some(token) => page_token = Some(token),
            None => return Ok(None),
        }
    }

    tracing::warn!(
        "No finished report in the newest {} pages for query {}",
        dbm::MAX_REPORT_LIST_PAGES,
        query_id
    );
    Ok(None)
}

fn first_done(reports: Vec<Report>) -> Option<ReportJob> {
    reports
        .into_iter()
        .map(ReportJob::from)
        .find(|job| job.state == ReportState::Done)
}

/// Lists every saved query, following page tokens
///
/// Stops early when the server hands back the token it was just given, and
/// never reads more than [`MAX_QUERY_LIST_PAGES`](dbm::MAX_QUERY_LIST_PAGES)
/// pages.
pub async fn list_all_queries(client: &BidManagerClient) -> ApiResult<Vec<Query>> {
    let mut queries = Vec::new();
    let mut page_token: Option<String> = None;

    for _ in 0..dbm::MAX_QUERY_LIST_PAGES {
        let ListQueriesResponse {
            queries: page,
            next_page_token,
        } = client.list_queries(page_token.as_deref()).await?;
        queries.extend(page);

        match next_page_token.filter(|token| !token.is_empty()) {
            Some(token) if page_token.as_deref() == Some(token.as_str()) => {
                tracing::warn!("Query list returned the same page token twice; stopping");
                return Ok(queries);
            }
            Some(token) => page_token = Some(token),
            None => return Ok(queries),
        }
    }

    tracing::warn!(
        "Stopped listing queries after {} pages",
        dbm::MAX_QUERY_LIST_PAGES
    );
    Ok(queries)
}
