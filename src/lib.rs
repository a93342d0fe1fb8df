//! DBM samples library
//!
//! Examples of calling the DoubleClick Bid Manager REST API: authorization,
//! query creation, report polling with exponential backoff, and report and
//! line item downloads.

pub mod app;
pub mod auth;
pub mod cli;
pub mod config;
pub mod constants;
pub mod errors;

// Re-export commonly used types for convenience
pub use errors::{AppError, Result};

#[cfg(test)]
mod tests {
    use super::*;
    use constants::*;

    #[test]
    fn test_constants_accessible() {
        // Test that our constants are accessible
        assert_eq!(DBM_SCOPE, "https://www.googleapis.com/auth/doubleclickbidmanager");
        assert!(USER_AGENT.starts_with("dbm-samples/"));
        assert_eq!(polling::MULTIPLIER, 1.5);
    }

    #[test]
    fn test_error_types() {
        // Test that our error types work correctly
        let auth_error = errors::AuthError::StateMismatch;
        let app_error = AppError::Auth(auth_error);

        assert_eq!(app_error.category(), "authentication");
        assert_eq!(app_error.exit_code(), 2);
    }
}
