//! Service account authorization via the JWT bearer grant
//!
//! A short-lived RS256 assertion signed with the account's private key is
//! exchanged at the token endpoint for an access token. Setting a subject
//! requests a token on behalf of that user (domain-wide delegation).

use jsonwebtoken::{Algorithm, EncodingKey, Header};
use reqwest::Client;
use serde::Serialize;

use crate::constants::auth;
use crate::errors::{AuthError, AuthResult};

use super::credentials::ServiceAccountKey;
use super::token::{AccessToken, TokenCache, TokenResponse};

#[derive(Debug, Serialize)]
struct Claims<'a> {
    iss: &'a str,
    scope: String,
    aud: &'a str,
    iat: i64,
    exp: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    sub: Option<&'a str>,
}

/// Access tokens for a service account
#[derive(Debug)]
pub struct ServiceAccountAuth {
    key: ServiceAccountKey,
    scopes: Vec<String>,
    subject: Option<String>,
    http: Client,
    cache: TokenCache,
}

impl ServiceAccountAuth {
    /// Blank subjects are treated as "no impersonation"
    pub fn new(
        key: ServiceAccountKey,
        scopes: Vec<String>,
        subject: Option<String>,
        http: Client,
    ) -> Self {
        let subject = subject.filter(|email| !email.trim().is_empty());
        if let Some(email) = &subject {
            tracing::info!("Service account {} acting as {}", key.client_email, email);
        }

        Self {
            key,
            scopes,
            subject,
            http,
            cache: TokenCache::default(),
        }
    }

    pub async fn access_token(&self) -> AuthResult<String> {
        self.cache.get_or_refresh(|| self.fetch_token()).await
    }

    /// Signs an assertion issued at `issued_at` (seconds since the epoch)
    pub fn assertion(&self, issued_at: i64) -> AuthResult<String> {
        let claims = Claims {
            iss: &self.key.client_email,
            scope: self.scopes.join(" "),
            aud: &self.key.token_uri,
            iat: issued_at,
            exp: issued_at + auth::ASSERTION_LIFETIME.as_secs() as i64,
            sub: self.subject.as_deref(),
        };

        let mut header = Header::new(Algorithm::RS256);
        header.kid = self.key.private_key_id.clone();

        let key = EncodingKey::from_rsa_pem(self.key.private_key.as_bytes())?;
        Ok(jsonwebtoken::encode(&header, &claims, &key)?)
    }

    async fn fetch_token(&self) -> AuthResult<AccessToken> {
        let assertion = self.assertion(chrono::Utc::now().timestamp())?;

        let response = self
            .http
            .post(&self.key.token_uri)
            .form(&[
                ("grant_type", auth::JWT_BEARER_GRANT_TYPE),
                ("assertion", assertion.as_str()),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AuthError::TokenExchange {
                reason: format!("HTTP {}: {}", status, body),
            });
        }

        let token: TokenResponse = response.json().await?;
        Ok(token.into())
    }
}
