//! Line item download and upload requests

use crate::constants::line_items;
use crate::errors::{ConfigError, ConfigResult};

use super::models::{DownloadLineItemsRequest, UploadLineItemsResponse, UploadLineItemsRequest};

/// Normalizes a filter type argument, accepting any letter case
pub fn parse_filter_type(raw: &str) -> ConfigResult<&'static str> {
    let normalized = raw.trim().to_ascii_uppercase();
    line_items::FILTER_TYPES
        .iter()
        .copied()
        .find(|known| *known == normalized)
        .ok_or_else(|| {
            ConfigError::invalid(
                "--filterType",
                raw,
                format!("Expected one of {}", line_items::FILTER_TYPES.join(", ")),
            )
        })
}

/// Builds a CSV download request for the given filter
pub fn download_request(filter_type: &str, filter_ids: &[i64]) -> ConfigResult<DownloadLineItemsRequest> {
    let filter_type = parse_filter_type(filter_type)?;
    if filter_ids.is_empty() {
        return Err(ConfigError::invalid(
            "--filterIds",
            "",
            "At least one filter id is required",
        ));
    }

    Ok(DownloadLineItemsRequest {
        filter_type: filter_type.to_string(),
        filter_ids: filter_ids.to_vec(),
        format: line_items::FORMAT.to_string(),
        file_spec: line_items::FILE_SPEC.to_string(),
    })
}

pub fn upload_request(line_items: String, dry_run: bool) -> UploadLineItemsRequest {
    UploadLineItemsRequest {
        line_items,
        dry_run,
        format: line_items::FORMAT.to_string(),
    }
}

/// Flattens upload status errors into printable lines
///
/// Row errors are prefixed with their row number. An empty result means the
/// upload was accepted.
pub fn upload_errors(response: &UploadLineItemsResponse) -> Vec<String> {
    let Some(status) = &response.upload_status else {
        return Vec::new();
    };

    let mut errors = status.errors.clone();
    for row in &status.row_status {
        for error in &row.errors {
            match row.row_number {
                Some(number) => errors.push(format!("Row {}: {}", number, error)),
                None => errors.push(error.clone()),
            }
        }
    }
    errors
}
