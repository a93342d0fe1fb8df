//! Application constants for the DBM samples
//!
//! This module centralizes all constants used throughout the application,
//! organized by functional domain.

use std::time::Duration;

/// Environment variable names
pub mod env {
    /// Location of application default credentials
    pub const APPLICATION_CREDENTIALS: &str = "GOOGLE_APPLICATION_CREDENTIALS";
}

/// Authentication and credential-related constants
pub mod auth {
    use super::Duration;

    /// Bid Manager API authorization scope
    pub const DBM_SCOPE: &str = "https://www.googleapis.com/auth/doubleclickbidmanager";

    /// Google authorization endpoint used when a secrets file omits one
    pub const DEFAULT_AUTH_URI: &str = "https://accounts.google.com/o/oauth2/auth";

    /// Google token endpoint used when a credentials file omits one
    pub const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";

    /// Grant type for service account JWT assertions
    pub const JWT_BEARER_GRANT_TYPE: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";

    /// Lifetime requested for service account assertions
    pub const ASSERTION_LIFETIME: Duration = Duration::from_secs(3600);

    /// Refresh access tokens this long before they expire
    pub const TOKEN_EXPIRY_MARGIN: Duration = Duration::from_secs(60);

    /// Assumed token lifetime when the token endpoint omits `expires_in`
    pub const DEFAULT_TOKEN_LIFETIME: Duration = Duration::from_secs(3600);

    /// Default client secrets file name, relative to the home directory
    pub const CLIENT_SECRETS_FILE: &str = "client_secrets.json";

    /// Default service account key file name, relative to the home directory
    pub const SERVICE_ACCOUNT_KEY_FILE: &str = "service_account_key.json";

    /// Token cache directory, relative to the home directory
    pub const TOKEN_CACHE_DIR: &str = ".store/dbm_sample";

    /// Token cache file name inside the cache directory
    pub const TOKEN_CACHE_FILE: &str = "credentials.json";

    /// File permissions for the token cache (Unix only) - owner read/write only
    #[cfg(unix)]
    pub const TOKEN_CACHE_PERMISSIONS: u32 = 0o600;

    /// Total time allowed for one token endpoint request
    pub const TOKEN_REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

    /// Host the loopback redirect receiver binds to
    pub const LOOPBACK_HOST: &str = "127.0.0.1";
}

/// HTTP client configuration constants
pub mod http {
    use super::Duration;

    /// Default user agent for all HTTP requests
    pub const USER_AGENT: &str = concat!("dbm-samples/", env!("CARGO_PKG_VERSION"));

    /// Suffix appended to a configured application name
    pub const APPLICATION_NAME_SUFFIX: &str = "_RustSamples";

    /// Default idle timeout between reads of a response
    pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(180);

    /// Connection establishment timeout
    pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);
}

/// Bid Manager API endpoints
pub mod dbm {
    /// Reporting API (v2) base URL
    pub const BASE_URL: &str = "https://doubleclickbidmanager.googleapis.com/v2/";

    /// Line item API (v1.1) base URL
    pub const LINE_ITEMS_BASE_URL: &str =
        "https://doubleclickbidmanager.googleapis.com/doubleclickbidmanager/v1.1/";

    /// Ordering used to list the newest reports first
    pub const REPORTS_NEWEST_FIRST: &str = "key.reportId desc";

    /// Maximum number of report list pages searched for a finished report
    pub const MAX_REPORT_LIST_PAGES: usize = 10;

    /// Maximum number of query list pages read when listing all queries
    pub const MAX_QUERY_LIST_PAGES: usize = 100;
}

/// Report polling defaults
pub mod polling {
    use super::Duration;

    /// Minimum amount of time between polling requests
    pub const INITIAL_INTERVAL: Duration = Duration::from_millis(5_000);

    /// Maximum amount of time between polling requests
    pub const MAX_INTERVAL: Duration = Duration::from_millis(300_000);

    /// Maximum amount of time to spend polling
    pub const MAX_ELAPSED: Duration = Duration::from_millis(18_000_000);

    /// Growth factor applied to the interval after each poll
    pub const MULTIPLIER: f64 = 1.5;
}

/// Storage download constants
pub mod files {
    use super::Duration;

    /// Initial delay before retrying a transient download failure
    pub const RETRY_INITIAL_INTERVAL: Duration = Duration::from_millis(500);

    /// Give up retrying a download after this long
    pub const RETRY_MAX_ELAPSED: Duration = Duration::from_secs(120);
}

/// Line item constants
pub mod line_items {
    /// Accepted filter types for line item downloads
    pub const FILTER_TYPES: [&str; 3] = ["ADVERTISER_ID", "INSERTION_ORDER_ID", "LINE_ITEM_ID"];

    /// Exchange format for line item files
    pub const FORMAT: &str = "CSV";

    /// File spec requested for downloads
    pub const FILE_SPEC: &str = "EWF";
}

/// Configuration file locations
pub mod config {
    /// Project-local configuration file
    pub const LOCAL_CONFIG_FILE: &str = "./dbm-samples.toml";

    /// Directory name under the user config directory
    pub const CONFIG_DIR_NAME: &str = "dbm-samples";

    /// Configuration file name
    pub const CONFIG_FILE_NAME: &str = "config.toml";
}

// Re-export commonly used constants for convenience
pub use auth::DBM_SCOPE;
pub use http::USER_AGENT;
