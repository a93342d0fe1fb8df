//! In-memory access token caching

use std::future::Future;
use std::time::Duration;

use serde::Deserialize;
use tokio::sync::Mutex;
use tokio::time::Instant;

use crate::constants::auth;
use crate::errors::AuthResult;

/// A bearer token and the instant it stops being valid
#[derive(Clone)]
pub struct AccessToken {
    secret: String,
    expires_at: Instant,
}

impl AccessToken {
    /// `lifetime` defaults to one hour when the token endpoint omits it
    pub fn new(secret: impl Into<String>, lifetime: Option<Duration>) -> Self {
        Self {
            secret: secret.into(),
            expires_at: Instant::now() + lifetime.unwrap_or(auth::DEFAULT_TOKEN_LIFETIME),
        }
    }

    pub fn secret(&self) -> &str {
        &self.secret
    }

    /// Usable for at least the expiry margin
    pub fn is_fresh(&self) -> bool {
        Instant::now() + auth::TOKEN_EXPIRY_MARGIN < self.expires_at
    }
}

impl std::fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccessToken")
            .field("expires_at", &self.expires_at)
            .finish_non_exhaustive()
    }
}

/// Token endpoint success response
#[derive(Debug, Deserialize)]
pub(crate) struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub expires_in: Option<u64>,
}

impl From<TokenResponse> for AccessToken {
    fn from(response: TokenResponse) -> Self {
        AccessToken::new(
            response.access_token,
            response.expires_in.map(Duration::from_secs),
        )
    }
}

/// Holds the current token and refreshes it shortly before expiry
///
/// Concurrent callers wait on the same refresh instead of each hitting the
/// token endpoint.
#[derive(Debug, Default)]
pub struct TokenCache {
    current: Mutex<Option<AccessToken>>,
}

impl TokenCache {
    /// Starts with a token obtained elsewhere (e.g. during consent)
    pub fn with_token(token: AccessToken) -> Self {
        Self {
            current: Mutex::new(Some(token)),
        }
    }

    pub async fn get_or_refresh<F, Fut>(&self, refresh: F) -> AuthResult<String>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = AuthResult<AccessToken>>,
    {
        let mut current = self.current.lock().await;
        if let Some(token) = current.as_ref().filter(|token| token.is_fresh()) {
            return Ok(token.secret().to_string());
        }

        tracing::debug!("Refreshing access token");
        let token = refresh().await?;
        let secret = token.secret().to_string();
        *current = Some(token);
        Ok(secret)
    }
}
