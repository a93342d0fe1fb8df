//! Authorization for the Bid Manager API
//!
//! Produces bearer tokens from one of three sources, chosen the same way
//! every sample does:
//!
//! - service account mode: a JSON key file, optionally impersonating a user
//! - user mode: application default credentials when
//!   `GOOGLE_APPLICATION_CREDENTIALS` is set, otherwise a client secrets file
//!   plus the interactive consent flow (refresh token cached on disk)
//!
//! # Examples
//!
//! ```rust,no_run
//! use dbm_samples::auth::{AuthOptions, Authenticator};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let authenticator = Authenticator::from_options(&AuthOptions::default()).await?;
//! let token = authenticator.access_token().await?;
//! # Ok(())
//! # }
//! ```

use std::path::PathBuf;
use std::time::Duration;

use reqwest::redirect::Policy;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::constants::auth;
use crate::errors::AuthResult;

pub mod credentials;
pub mod installed;
pub mod service_account;
pub mod token;

pub use credentials::{
    ClientSecrets, CredentialStore, CredentialsFile, ServiceAccountKey, StoredCredential,
};
pub use installed::UserAuth;
pub use service_account::ServiceAccountAuth;

/// `[auth]` configuration section
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AuthConfig {
    pub client_secrets_file: Option<PathBuf>,
    pub service_account_key_file: Option<PathBuf>,
    /// Directory holding the cached refresh token
    pub token_cache_dir: Option<PathBuf>,
    /// User a service account acts on behalf of (domain-wide delegation)
    pub email_to_impersonate: Option<String>,
}

/// Resolved authorization settings for one run
#[derive(Debug, Clone, Default)]
pub struct AuthOptions {
    pub use_service_account: bool,
    pub client_secrets_file: Option<PathBuf>,
    pub service_account_key_file: Option<PathBuf>,
    pub additional_scopes: Vec<String>,
    pub token_cache_dir: Option<PathBuf>,
    pub email_to_impersonate: Option<String>,
}

impl AuthOptions {
    /// Command-line values win over configured ones
    pub fn merged_with(mut self, config: &AuthConfig) -> Self {
        self.client_secrets_file = self
            .client_secrets_file
            .or_else(|| config.client_secrets_file.clone());
        self.service_account_key_file = self
            .service_account_key_file
            .or_else(|| config.service_account_key_file.clone());
        self.token_cache_dir = self.token_cache_dir.or_else(|| config.token_cache_dir.clone());
        self.email_to_impersonate = self
            .email_to_impersonate
            .or_else(|| config.email_to_impersonate.clone());
        self
    }

    /// Requested scopes
    pub fn scopes(&self) -> Vec<String> {
        build_scopes(&self.additional_scopes)
    }
}

/// The Bid Manager scope followed by any additional scopes, without repeats
pub fn build_scopes(additional: &[String]) -> Vec<String> {
    let mut scopes = vec![auth::DBM_SCOPE.to_string()];
    for scope in additional.iter().map(|s| s.trim()).filter(|s| !s.is_empty()) {
        if !scopes.iter().any(|existing| existing == scope) {
            scopes.push(scope.to_string());
        }
    }
    scopes
}

/// Source of bearer tokens for API requests
#[derive(Debug)]
pub enum Authenticator {
    /// A fixed token, e.g. one minted by `gcloud auth print-access-token`
    Static(String),
    ServiceAccount(ServiceAccountAuth),
    User(UserAuth),
}

impl Authenticator {
    /// Builds an authenticator for the configured credential source
    ///
    /// # Errors
    ///
    /// Returns `AuthError` if a credential file is missing or malformed, or
    /// if the consent flow fails
    pub async fn from_options(options: &AuthOptions) -> AuthResult<Self> {
        let scopes = options.scopes();
        let http = token_http_client(auth::TOKEN_REQUEST_TIMEOUT)?;

        if options.use_service_account {
            let path = credentials::resolve_path(
                options.service_account_key_file.as_deref(),
                auth::SERVICE_ACCOUNT_KEY_FILE,
            )?;
            let key = ServiceAccountKey::load(&path)?;
            tracing::info!("Authorizing as service account {}", key.client_email);
            return Ok(Authenticator::ServiceAccount(ServiceAccountAuth::new(
                key,
                scopes,
                options.email_to_impersonate.clone(),
                http,
            )));
        }

        match credentials::application_default_credentials()? {
            Some(CredentialsFile::ServiceAccount(key)) => {
                return Ok(Authenticator::ServiceAccount(ServiceAccountAuth::new(
                    key, scopes, None, http,
                )));
            }
            Some(CredentialsFile::AuthorizedUser(user)) => {
                return Ok(Authenticator::User(UserAuth::from_authorized_user(
                    &user, http,
                )?));
            }
            None => {}
        }

        let path = credentials::resolve_path(
            options.client_secrets_file.as_deref(),
            auth::CLIENT_SECRETS_FILE,
        )?;
        let secrets = ClientSecrets::load(&path)?;
        let store = match &options.token_cache_dir {
            Some(dir) => CredentialStore::in_dir(dir),
            None => CredentialStore::default_location()?,
        };

        Ok(Authenticator::User(
            UserAuth::authorize(&secrets, &scopes, &store, http).await?,
        ))
    }

    /// Returns a currently valid bearer token
    pub async fn access_token(&self) -> AuthResult<String> {
        match self {
            Authenticator::Static(token) => Ok(token.clone()),
            Authenticator::ServiceAccount(auth) => auth.access_token().await,
            Authenticator::User(auth) => auth.access_token().await,
        }
    }
}

/// Client for token endpoint calls; redirects are never followed
fn token_http_client(timeout: Duration) -> AuthResult<Client> {
    Ok(Client::builder()
        .redirect(Policy::none())
        .connect_timeout(crate::constants::http::CONNECT_TIMEOUT.min(timeout))
        .timeout(timeout)
        .user_agent(crate::constants::USER_AGENT)
        .build()?)
}
