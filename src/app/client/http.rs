//! Authorized JSON requests against the Bid Manager API
//!
//! Every call fetches a bearer token from the [`Authenticator`], sends the
//! request and turns non-success statuses into [`ApiError::Status`] with the
//! response body attached. Nothing here retries: callers decide.

use reqwest::{Client, Method};
use serde::de::DeserializeOwned;
use serde::Serialize;
use url::Url;

use crate::auth::Authenticator;
use crate::errors::{ApiError, ApiResult};

/// HTTP operations handler for API calls
#[derive(Debug)]
pub struct HttpHandler {
    client: Client,
    authenticator: Authenticator,
}

impl HttpHandler {
    pub fn new(client: Client, authenticator: Authenticator) -> Self {
        Self {
            client,
            authenticator,
        }
    }

    /// Sends a GET request and decodes the JSON response
    pub async fn get_json<T: DeserializeOwned>(
        &self,
        url: Url,
        query: &[(&str, &str)],
    ) -> ApiResult<T> {
        self.send::<(), T>(Method::GET, url, query, None).await
    }

    /// Sends a POST request with a JSON body and decodes the JSON response
    pub async fn post_json<B: Serialize, T: DeserializeOwned>(
        &self,
        url: Url,
        query: &[(&str, &str)],
        body: &B,
    ) -> ApiResult<T> {
        self.send(Method::POST, url, query, Some(body)).await
    }

    async fn send<B: Serialize, T: DeserializeOwned>(
        &self,
        method: Method,
        url: Url,
        query: &[(&str, &str)],
        body: Option<&B>,
    ) -> ApiResult<T> {
        let token = self.authenticator.access_token().await?;
        let endpoint = url.path().to_string();

        tracing::debug!("{} {}", method, url);

        let mut request = self
            .client
            .request(method, url)
            .bearer_auth(token)
            .query(query);
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await?;
        let status = response.status();

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::warn!("API request to {} failed with HTTP {}", endpoint, status);
            return Err(ApiError::Status {
                endpoint,
                status: status.as_u16(),
                body,
            });
        }

        let bytes = response.bytes().await?;
        serde_json::from_slice(&bytes).map_err(|e| ApiError::UnexpectedResponse {
            endpoint,
            reason: e.to_string(),
        })
    }

    /// Get a reference to the underlying HTTP client
    pub fn client(&self) -> &Client {
        &self.client
    }
}
