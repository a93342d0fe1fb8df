//! Bid Manager API resource models
//!
//! Only the fields the samples read or write are modelled. Google APIs encode
//! int64 values as JSON strings; identifiers here accept either a string or a
//! number and are always written back as strings.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A saved report specification
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Query {
    /// Server-assigned identifier, absent on create requests
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "int64::option"
    )]
    pub query_id: Option<i64>,
    #[serde(default)]
    pub metadata: QueryMetadata,
    #[serde(default)]
    pub params: Parameters,
    #[serde(default)]
    pub schedule: QuerySchedule,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct QueryMetadata {
    #[serde(default)]
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_range: Option<DataRange>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DataRange {
    pub range: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Parameters {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub report_type: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub group_bys: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub filters: Vec<FilterPair>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub metrics: Vec<String>,
}

/// A single `type = value` report filter
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FilterPair {
    #[serde(rename = "type")]
    pub filter_type: String,
    pub value: String,
}

impl FilterPair {
    pub fn new(filter_type: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            filter_type: filter_type.into(),
            value: value.into(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct QuerySchedule {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frequency: Option<String>,
}

/// Body of a `queries.run` request
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunQueryRequest {}

/// Identifies one report generated by a query
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub struct ReportKey {
    #[serde(with = "int64")]
    pub query_id: i64,
    #[serde(with = "int64")]
    pub report_id: i64,
}

impl std::fmt::Display for ReportKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "query {} / report {}", self.query_id, self.report_id)
    }
}

/// One materialized execution of a query
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Report {
    pub key: ReportKey,
    #[serde(default)]
    pub metadata: ReportMetadata,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ReportMetadata {
    #[serde(default)]
    pub status: ReportStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub google_cloud_storage_path: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ReportStatus {
    #[serde(default)]
    pub state: ReportState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finish_time: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
}

/// Lifecycle state of a report
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReportState {
    Queued,
    Running,
    Done,
    Failed,
    #[default]
    #[serde(other, rename = "STATE_UNSPECIFIED")]
    Unspecified,
}

impl ReportState {
    /// `Done` and `Failed` are final; everything else may still change
    pub fn is_terminal(self) -> bool {
        matches!(self, ReportState::Done | ReportState::Failed)
    }
}

impl std::fmt::Display for ReportState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ReportState::Queued => "QUEUED",
            ReportState::Running => "RUNNING",
            ReportState::Done => "DONE",
            ReportState::Failed => "FAILED",
            ReportState::Unspecified => "STATE_UNSPECIFIED",
        };
        f.write_str(name)
    }
}

/// Snapshot of a report's progress as seen by the poller
///
/// Each status fetch produces a new snapshot; snapshots are never updated in
/// place.
#[derive(Debug, Clone, PartialEq)]
pub struct ReportJob {
    pub query_id: i64,
    pub report_id: i64,
    pub state: ReportState,
    /// Download location, only meaningful once the report is `Done`
    pub storage_path: Option<String>,
    pub finish_time: Option<DateTime<Utc>>,
}

impl ReportJob {
    pub fn key(&self) -> ReportKey {
        ReportKey {
            query_id: self.query_id,
            report_id: self.report_id,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }
}

impl From<Report> for ReportJob {
    fn from(report: Report) -> Self {
        let storage_path = match report.metadata.status.state {
            ReportState::Done => report
                .metadata
                .google_cloud_storage_path
                .filter(|path| !path.is_empty()),
            _ => None,
        };

        Self {
            query_id: report.key.query_id,
            report_id: report.key.report_id,
            state: report.metadata.status.state,
            storage_path,
            finish_time: report.metadata.status.finish_time,
        }
    }
}

/// One page of `queries.reports.list`
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListReportsResponse {
    #[serde(default)]
    pub reports: Vec<Report>,
    #[serde(default)]
    pub next_page_token: Option<String>,
}

/// One page of `queries.list`
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListQueriesResponse {
    #[serde(default)]
    pub queries: Vec<Query>,
    #[serde(default)]
    pub next_page_token: Option<String>,
}

/// Body of a `lineitems.downloadlineitems` request
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DownloadLineItemsRequest {
    pub filter_type: String,
    #[serde(with = "int64::vec")]
    pub filter_ids: Vec<i64>,
    pub format: String,
    pub file_spec: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DownloadLineItemsResponse {
    #[serde(default)]
    pub line_items: String,
}

/// Body of a `lineitems.uploadlineitems` request
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UploadLineItemsRequest {
    pub line_items: String,
    pub dry_run: bool,
    pub format: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadLineItemsResponse {
    #[serde(default)]
    pub upload_status: Option<UploadStatus>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadStatus {
    #[serde(default)]
    pub errors: Vec<String>,
    #[serde(default)]
    pub row_status: Vec<RowStatus>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RowStatus {
    #[serde(default)]
    pub row_number: Option<i64>,
    #[serde(default)]
    pub changed: bool,
    #[serde(default)]
    pub errors: Vec<String>,
}

/// Serde adapters for int64 values encoded as JSON strings
pub mod int64 {
    use serde::{Deserialize, Deserializer, Serializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum StringOrNumber {
        String(String),
        Number(i64),
    }

    impl StringOrNumber {
        fn into_i64<E: serde::de::Error>(self) -> Result<i64, E> {
            match self {
                StringOrNumber::Number(n) => Ok(n),
                StringOrNumber::String(s) => s.trim().parse().map_err(E::custom),
            }
        }
    }

    pub fn serialize<S: Serializer>(value: &i64, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(value)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<i64, D::Error> {
        StringOrNumber::deserialize(deserializer)?.into_i64()
    }

    pub mod option {
        use super::StringOrNumber;
        use serde::{Deserialize, Deserializer, Serializer};

        pub fn serialize<S: Serializer>(
            value: &Option<i64>,
            serializer: S,
        ) -> Result<S::Ok, S::Error> {
            match value {
                Some(v) => serializer.collect_str(v),
                None => serializer.serialize_none(),
            }
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(
            deserializer: D,
        ) -> Result<Option<i64>, D::Error> {
            Option::<StringOrNumber>::deserialize(deserializer)?
                .map(StringOrNumber::into_i64)
                .transpose()
        }
    }

    pub mod vec {
        use serde::ser::SerializeSeq;
        use serde::Serializer;

        pub fn serialize<S: Serializer>(values: &[i64], serializer: S) -> Result<S::Ok, S::Error> {
            let mut seq = serializer.serialize_seq(Some(values.len()))?;
            for value in values {
                seq.serialize_element(&value.to_string())?;
            }
            seq.end()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_report_parsing_with_string_ids() {
        // Test that API-style string identifiers and a finished status parse
        let report: Report = serde_json::from_value(json!({
            "key": {"queryId": "1234", "reportId": "5678"},
            "metadata": {
                "status": {
                    "state": "DONE",
                    "finishTime": "2024-03-01T12:00:00Z",
                    "format": "CSV"
                },
                "googleCloudStoragePath": "https://storage.googleapis.com/bucket/report.csv"
            }
        }))
        .unwrap();

        assert_eq!(report.key.query_id, 1234);
        assert_eq!(report.key.report_id, 5678);

        let job = ReportJob::from(report);
        assert_eq!(job.state, ReportState::Done);
        assert!(job.is_terminal());
        assert_eq!(
            job.storage_path.as_deref(),
            Some("https://storage.googleapis.com/bucket/report.csv")
        );
        assert!(job.finish_time.is_some());
    }

    #[test]
    fn test_unknown_state_is_not_terminal() {
        let report: Report = serde_json::from_value(json!({
            "key": {"queryId": 1, "reportId": 2},
            "metadata": {"status": {"state": "SOMETHING_NEW"}}
        }))
        .unwrap();

        assert_eq!(report.metadata.status.state, ReportState::Unspecified);
        assert!(!ReportJob::from(report).is_terminal());
    }

    #[test]
    fn test_storage_path_only_kept_when_done() {
        // A running report with a stale path must not look downloadable
        let report: Report = serde_json::from_value(json!({
            "key": {"queryId": "1", "reportId": "2"},
            "metadata": {
                "status": {"state": "RUNNING"},
                "googleCloudStoragePath": "https://example.com/partial.csv"
            }
        }))
        .unwrap();

        let job = ReportJob::from(report);
        assert_eq!(job.state, ReportState::Running);
        assert!(job.storage_path.is_none());
    }

    #[test]
    fn test_query_serialization_omits_missing_id() {
        let query = Query {
            query_id: None,
            metadata: QueryMetadata {
                title: "Weekly".to_string(),
                data_range: Some(DataRange {
                    range: "LAST_7_DAYS".to_string(),
                }),
                format: Some("CSV".to_string()),
            },
            params: Parameters {
                report_type: Some("STANDARD".to_string()),
                filters: vec![FilterPair::new("FILTER_ADVERTISER", "42")],
                ..Default::default()
            },
            schedule: QuerySchedule {
                frequency: Some("ONE_TIME".to_string()),
            },
        };

        let value = serde_json::to_value(&query).unwrap();
        assert!(value.get("queryId").is_none());
        assert_eq!(value["params"]["type"], "STANDARD");
        assert_eq!(value["params"]["filters"][0]["type"], "FILTER_ADVERTISER");
        assert_eq!(value["metadata"]["dataRange"]["range"], "LAST_7_DAYS");
        assert_eq!(value["schedule"]["frequency"], "ONE_TIME");
    }

    #[test]
    fn test_line_item_request_encodes_ids_as_strings() {
        let request = DownloadLineItemsRequest {
            filter_type: "ADVERTISER_ID".to_string(),
            filter_ids: vec![11, 22],
            format: "CSV".to_string(),
            file_spec: "EWF".to_string(),
        };

        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["filterIds"], json!(["11", "22"]));
        assert_eq!(value["filterType"], "ADVERTISER_ID");
    }

    #[test]
    fn test_empty_report_page_parses() {
        let page: ListReportsResponse = serde_json::from_value(json!({})).unwrap();
        assert!(page.reports.is_empty());
        assert!(page.next_page_token.is_none());
    }
}
