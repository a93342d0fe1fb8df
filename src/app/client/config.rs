//! HTTP client configuration and building logic
//!
//! Request options are passed explicitly to the API client constructor; the
//! recognized options are the read timeout, the connect timeout
//! and the application name reported in the user agent.

use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::constants::http;
use crate::errors::ApiResult;

/// Configuration for the Bid Manager HTTP client
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ClientConfig {
    /// Longest wait for the next chunk of a response; a body that keeps
    /// arriving is never cut off
    #[serde(with = "humantime_serde")]
    pub read_timeout: Duration,
    /// Connect timeout
    #[serde(with = "humantime_serde")]
    pub connect_timeout: Duration,
    /// Application name, suggested format "MyCompany-ProductName/1.0"
    pub application_name: Option<String>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            read_timeout: http::DEFAULT_READ_TIMEOUT,
            connect_timeout: http::CONNECT_TIMEOUT,
            application_name: None,
        }
    }
}

impl ClientConfig {
    /// User agent sent with every request
    ///
    /// A configured application name is prefixed (with a sample suffix); a
    /// missing or blank name leaves the bare default user agent.
    pub fn user_agent(&self) -> String {
        match self
            .application_name
            .as_deref()
            .map(str::trim)
            .filter(|name| !name.is_empty())
        {
            Some(name) => format!(
                "{}{} {}",
                name,
                http::APPLICATION_NAME_SUFFIX,
                http::USER_AGENT
            ),
            None => http::USER_AGENT.to_string(),
        }
    }

    /// Builds the HTTP client with the specified configuration
    pub fn build_http_client(&self) -> ApiResult<Client> {
        if self
            .application_name
            .as_deref()
            .map_or(true, |name| name.trim().is_empty())
        {
            warn!("No application name configured; requests use the default user agent");
        }

        let client = Client::builder()
            .read_timeout(self.read_timeout)
            .connect_timeout(self.connect_timeout)
            .user_agent(self.user_agent())
            .build()?;

        Ok(client)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_config_default() {
        let config = ClientConfig::default();
        assert_eq!(config.read_timeout, http::DEFAULT_READ_TIMEOUT);
        assert_eq!(config.connect_timeout, http::CONNECT_TIMEOUT);
        assert!(config.application_name.is_none());
    }

    #[test]
    fn test_blank_application_name_uses_default_agent() {
        let blank = ClientConfig {
            application_name: Some("   ".to_string()),
            ..Default::default()
        };
        assert_eq!(blank.user_agent(), http::USER_AGENT);
        assert_eq!(ClientConfig::default().user_agent(), http::USER_AGENT);
    }

    #[test]
    fn test_application_name_prefixes_agent() {
        let config = ClientConfig {
            application_name: Some("Acme-Reports/1.0".to_string()),
            ..Default::default()
        };
        let agent = config.user_agent();
        assert!(agent.starts_with("Acme-Reports/1.0_RustSamples "));
        assert!(agent.ends_with(http::USER_AGENT));
    }

    #[test]
    fn test_http_client_with_custom_timeouts() {
        let config = ClientConfig {
            read_timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(10),
            ..Default::default()
        };
        assert!(config.build_http_client().is_ok());
    }

    #[test]
    fn test_config_parses_humantime() {
        let config: ClientConfig = toml::from_str(
            r#"
read_timeout = "3m"
connect_timeout = "15s"
application_name = "Acme"
"#,
        )
        .unwrap();
        assert_eq!(config.read_timeout, Duration::from_secs(180));
        assert_eq!(config.connect_timeout, Duration::from_secs(15));
        assert_eq!(config.application_name.as_deref(), Some("Acme"));
    }
}
