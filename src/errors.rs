//! Error types for the DBM samples
//!
//! Errors are grouped by concern (configuration, authentication, API transport,
//! storage download) and folded into [`AppError`], which also carries the two
//! polling outcomes that must be reported as failures: a timed-out poll and a
//! report that finished in error. Each variant maps to a process exit code.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Authentication-related errors
#[derive(Error, Debug)]
pub enum AuthError {
    /// Credential file does not exist
    #[error("Credentials file not found: {path}. Pass its location with {flag}")]
    CredentialsFileNotFound { path: PathBuf, flag: &'static str },

    /// Credential file exists but could not be parsed
    #[error("Invalid credentials file {path}: {reason}")]
    InvalidCredentialsFile { path: PathBuf, reason: String },

    /// No home directory to resolve default credential locations against
    #[error("Could not determine the user's home directory")]
    NoHomeDirectory,

    /// Authorization endpoint or redirect URL could not be built
    #[error("Invalid OAuth endpoint URL: {0}")]
    InvalidEndpoint(#[from] url::ParseError),

    /// The consent flow did not yield an authorization code
    #[error("Authorization was not granted: {reason}")]
    AuthorizationDenied { reason: String },

    /// CSRF state returned to the redirect receiver did not match
    #[error("OAuth state mismatch in authorization response")]
    StateMismatch,

    /// Token endpoint rejected the exchange
    #[error("Token exchange failed: {reason}")]
    TokenExchange { reason: String },

    /// Signing the service account assertion failed
    #[error("Failed to sign service account assertion")]
    Signing(#[from] jsonwebtoken::errors::Error),

    /// HTTP request failed during authentication
    #[error("HTTP request failed during authentication")]
    Http(#[from] reqwest::Error),

    /// JSON parsing error in a credential or token cache file
    #[error("JSON parsing error in credentials")]
    Json(#[from] serde_json::Error),

    /// File I/O error during credential loading or token caching
    #[error("Credential storage I/O error")]
    CredentialStorage(#[from] std::io::Error),
}

/// DBM API transport errors
///
/// Any failure to obtain a successful response from the Bid Manager API.
/// The poller never retries these.
#[derive(Error, Debug)]
pub enum ApiError {
    /// HTTP request error
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// API responded with a non-success status
    #[error("API request to {endpoint} failed with HTTP {status}: {body}")]
    Status {
        endpoint: String,
        status: u16,
        body: String,
    },

    /// Response body did not match the expected resource shape
    #[error("Unexpected response from {endpoint}: {reason}")]
    UnexpectedResponse { endpoint: String, reason: String },

    /// Request URL could not be built
    #[error("Invalid API URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// Access token could not be obtained for the request
    #[error(transparent)]
    Auth(#[from] AuthError),
}

/// Storage download errors
#[derive(Error, Debug)]
pub enum DownloadError {
    /// HTTP request error
    #[error("HTTP request failed")]
    Http(#[from] reqwest::Error),

    /// I/O error during file operations
    #[error("File I/O error")]
    Io(#[from] std::io::Error),

    /// Invalid URL provided
    #[error("Invalid URL: {url} - {error}")]
    InvalidUrl { url: String, error: String },

    /// Server returned error status
    #[error("Storage server error: HTTP {status}")]
    ServerError { status: u16 },

    /// Temporary file could not be moved into place
    #[error("Atomic file operation failed: could not rename {temp_path} to {final_path}")]
    AtomicOperationFailed {
        temp_path: PathBuf,
        final_path: PathBuf,
    },

    /// Report finished without a storage location
    #[error("Report {report_id} has no storage path")]
    MissingStoragePath { report_id: i64 },
}

impl DownloadError {
    /// Whether the failure is worth another attempt
    pub fn is_transient(&self) -> bool {
        match self {
            DownloadError::Http(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            DownloadError::ServerError { status } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Configuration file not found
    #[error("Configuration file not found: {path}")]
    NotFound { path: PathBuf },

    /// Invalid configuration format
    #[error("Invalid configuration format: {0}")]
    InvalidFormat(#[from] toml::de::Error),

    /// Configuration file could not be read
    #[error("Failed to read configuration file {path}")]
    Unreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Invalid configuration or argument value
    #[error("Invalid value for {field}: {value}. {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },
}

impl ConfigError {
    /// Shorthand for an invalid value error
    pub fn invalid(
        field: impl Into<String>,
        value: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::InvalidValue {
            field: field.into(),
            value: value.into(),
            reason: reason.into(),
        }
    }
}

/// Top-level application error that can represent any error type
#[derive(Error, Debug)]
pub enum AppError {
    /// Configuration error
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Authentication error
    #[error(transparent)]
    Auth(#[from] AuthError),

    /// API transport error
    #[error(transparent)]
    Api(#[from] ApiError),

    /// Download error
    #[error(transparent)]
    Download(#[from] DownloadError),

    /// The polling budget ran out before the report finished
    #[error(
        "Report {report_id} for query {query_id} is still running after {}; try again later with get-latest-report",
        humantime_elapsed(.elapsed)
    )]
    PollingTimeout {
        query_id: i64,
        report_id: i64,
        elapsed: Duration,
    },

    /// The report itself finished in the FAILED state
    #[error("Report {report_id} for query {query_id} failed to generate")]
    JobFailed { query_id: i64, report_id: i64 },

    /// Interrupted by the user
    #[error("Operation cancelled")]
    Cancelled,
}

fn humantime_elapsed(elapsed: &Duration) -> String {
    let minutes = elapsed.as_secs() / 60;
    if minutes > 0 {
        format!("{} minutes", minutes)
    } else {
        format!("{} seconds", elapsed.as_secs())
    }
}

impl AppError {
    /// Get error category for logging
    pub fn category(&self) -> &'static str {
        match self {
            AppError::Config(_) => "config",
            AppError::Auth(AuthError::Http(_))
            | AppError::Api(ApiError::Auth(AuthError::Http(_))) => "transport",
            AppError::Auth(_) | AppError::Api(ApiError::Auth(_)) => "authentication",
            AppError::Api(_) => "transport",
            AppError::Download(_) => "download",
            AppError::PollingTimeout { .. } => "timeout",
            AppError::JobFailed { .. } => "job",
            AppError::Cancelled => "cancelled",
        }
    }

    /// Process exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            // Token endpoint unreachable: a network failure, not bad credentials
            AppError::Auth(AuthError::Http(_))
            | AppError::Api(ApiError::Auth(AuthError::Http(_))) => 1,
            AppError::Config(_) | AppError::Auth(_) | AppError::Api(ApiError::Auth(_)) => 2,
            AppError::Api(_) | AppError::Download(_) => 1,
            AppError::PollingTimeout { .. } => 3,
            AppError::JobFailed { .. } => 4,
            AppError::Cancelled => 130,
        }
    }
}

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, AppError>;

/// Authentication result type alias
pub type AuthResult<T> = std::result::Result<T, AuthError>;

/// API result type alias
pub type ApiResult<T> = std::result::Result<T, ApiError>;

/// Download result type alias
pub type DownloadResult<T> = std::result::Result<T, DownloadError>;

/// Configuration result type alias
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;
