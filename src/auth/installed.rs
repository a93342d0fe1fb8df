//! User authorization for installed applications
//!
//! The first run opens the consent page (the URL is printed for the user to
//! visit) and receives the authorization code on a one-shot loopback HTTP
//! listener. The resulting refresh token is cached on disk so later runs go
//! straight to refreshing access tokens.

use oauth2::basic::BasicClient;
use oauth2::{
    AuthType, AuthUrl, AuthorizationCode, ClientId, ClientSecret, CsrfToken, EndpointNotSet,
    EndpointSet, PkceCodeChallenge, RedirectUrl, RefreshToken, Scope, TokenResponse, TokenUrl,
};
use reqwest::Client;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use url::Url;

use crate::constants::auth;
use crate::errors::{AuthError, AuthResult};

use super::credentials::{AuthorizedUser, ClientSecrets, CredentialStore, StoredCredential};
use super::token::{AccessToken, TokenCache};

type OAuthClient = BasicClient<EndpointSet, EndpointNotSet, EndpointNotSet, EndpointNotSet, EndpointSet>;

const MAX_REQUEST_BYTES: usize = 16 * 1024;

const SUCCESS_PAGE: &str = "<html><body><h1>Authorization complete</h1>\
<p>You can close this window and return to the terminal.</p></body></html>";

const FAILURE_PAGE: &str = "<html><body><h1>Authorization failed</h1>\
<p>Return to the terminal for details.</p></body></html>";

/// Access tokens for a user who granted consent
#[derive(Debug)]
pub struct UserAuth {
    client: OAuthClient,
    refresh_token: RefreshToken,
    http: Client,
    cache: TokenCache,
}

impl UserAuth {
    /// Authorizes with a client secrets file
    ///
    /// A cached refresh token for the same client and scopes is reused;
    /// otherwise the interactive consent flow runs and its refresh token is
    /// cached in `store`.
    pub async fn authorize(
        secrets: &ClientSecrets,
        scopes: &[String],
        store: &CredentialStore,
        http: Client,
    ) -> AuthResult<Self> {
        let client = oauth_client(
            &secrets.client_id,
            secrets.client_secret.as_deref(),
            &secrets.auth_uri,
            &secrets.token_uri,
        )?;

        if let Some(stored) = store.load()? {
            if stored.covers(&secrets.client_id, scopes) {
                tracing::info!("Using cached credentials from {}", store.path().display());
                return Ok(Self {
                    client,
                    refresh_token: RefreshToken::new(stored.refresh_token),
                    http,
                    cache: TokenCache::default(),
                });
            }
            tracing::info!("Cached credentials do not cover the requested scopes; re-authorizing");
        }

        let (refresh_token, access_token) = consent_flow(client.clone(), scopes, &http).await?;
        store.save(&StoredCredential {
            client_id: secrets.client_id.clone(),
            refresh_token: refresh_token.secret().to_string(),
            scopes: scopes.to_vec(),
        })?;

        Ok(Self {
            client,
            refresh_token,
            http,
            cache: TokenCache::with_token(access_token),
        })
    }

    /// Uses authorized-user application default credentials
    pub fn from_authorized_user(user: &AuthorizedUser, http: Client) -> AuthResult<Self> {
        let client = oauth_client(
            &user.client_id,
            Some(&user.client_secret),
            auth::DEFAULT_AUTH_URI,
            &user.token_uri,
        )?;

        Ok(Self {
            client,
            refresh_token: RefreshToken::new(user.refresh_token.clone()),
            http,
            cache: TokenCache::default(),
        })
    }

    pub async fn access_token(&self) -> AuthResult<String> {
        self.cache.get_or_refresh(|| self.refresh()).await
    }

    async fn refresh(&self) -> AuthResult<AccessToken> {
        let response = self
            .client
            .exchange_refresh_token(&self.refresh_token)
            .request_async(&self.http)
            .await
            .map_err(|e| AuthError::TokenExchange {
                reason: e.to_string(),
            })?;

        Ok(AccessToken::new(
            response.access_token().secret().clone(),
            response.expires_in(),
        ))
    }
}

fn oauth_client(
    client_id: &str,
    client_secret: Option<&str>,
    auth_uri: &str,
    token_uri: &str,
) -> AuthResult<OAuthClient> {
    let mut client = BasicClient::new(ClientId::new(client_id.to_string()))
        .set_auth_uri(AuthUrl::new(auth_uri.to_string())?)
        .set_token_uri(TokenUrl::new(token_uri.to_string())?)
        .set_auth_type(AuthType::RequestBody);
    if let Some(secret) = client_secret {
        client = client.set_client_secret(ClientSecret::new(secret.to_string()));
    }
    Ok(client)
}

/// Runs the browser consent flow and returns the granted tokens
async fn consent_flow(
    client: OAuthClient,
    scopes: &[String],
    http: &Client,
) -> AuthResult<(RefreshToken, AccessToken)> {
    let listener = TcpListener::bind((auth::LOOPBACK_HOST, 0)).await?;
    let port = listener.local_addr()?.port();
    let client = client.set_redirect_uri(RedirectUrl::new(format!(
        "http://{}:{}",
        auth::LOOPBACK_HOST,
        port
    ))?);

    let (pkce_challenge, pkce_verifier) = PkceCodeChallenge::new_random_sha256();
    let (authorize_url, csrf_state) = client
        .authorize_url(CsrfToken::new_random)
        .add_scopes(scopes.iter().cloned().map(Scope::new))
        .add_extra_param("access_type", "offline")
        .add_extra_param("prompt", "consent")
        .set_pkce_challenge(pkce_challenge)
        .url();

    println!("Please open the following URL in your browser to authorize access:");
    println!();
    println!("  {}", authorize_url);
    println!();
    println!("Waiting for authorization on port {}...", port);

    let code = receive_code(listener, csrf_state.secret()).await?;

    let response = client
        .exchange_code(AuthorizationCode::new(code))
        .set_pkce_verifier(pkce_verifier)
        .request_async(http)
        .await
        .map_err(|e| AuthError::TokenExchange {
            reason: e.to_string(),
        })?;

    let refresh_token = response
        .refresh_token()
        .cloned()
        .ok_or_else(|| AuthError::TokenExchange {
            reason: "no refresh token was issued".to_string(),
        })?;
    let access_token = AccessToken::new(
        response.access_token().secret().clone(),
        response.expires_in(),
    );

    tracing::info!("Authorization granted");
    Ok((refresh_token, access_token))
}

/// Waits for the browser redirect and extracts the authorization code
///
/// Requests without `code` or `error` (a browser asking for a favicon, say)
/// get the failure page and the listener keeps waiting.
pub(crate) async fn receive_code(listener: TcpListener, expected_state: &str) -> AuthResult<String> {
    loop {
        let (mut stream, peer) = listener.accept().await?;
        tracing::debug!("Redirect connection from {}", peer);

        let target = read_request_target(&mut stream).await?;
        let outcome = parse_redirect(&target, expected_state);

        let page = match &outcome {
            Some(Ok(_)) => SUCCESS_PAGE,
            _ => FAILURE_PAGE,
        };
        let reply = format!(
            "HTTP/1.1 200 OK\r\nContent-Type: text/html; charset=utf-8\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
            page.len(),
            page
        );
        stream.write_all(reply.as_bytes()).await?;
        stream.shutdown().await?;

        if let Some(result) = outcome {
            return result;
        }
    }
}

async fn read_request_target(stream: &mut tokio::net::TcpStream) -> AuthResult<String> {
    let mut buffer = Vec::with_capacity(1024);
    let mut chunk = [0u8; 1024];

    while !buffer.windows(4).any(|w| w == b"\r\n\r\n") && buffer.len() < MAX_REQUEST_BYTES {
        let read = stream.read(&mut chunk).await?;
        if read == 0 {
            break;
        }
        buffer.extend_from_slice(&chunk[..read]);
    }

    let request = String::from_utf8_lossy(&buffer);
    let target = request
        .lines()
        .next()
        .and_then(|line| line.split_whitespace().nth(1))
        .unwrap_or("/");
    Ok(target.to_string())
}

/// `None` means the request carried neither a code nor an error
fn parse_redirect(target: &str, expected_state: &str) -> Option<AuthResult<String>> {
    let url = Url::parse("http://localhost").ok()?.join(target).ok()?;

    let mut code = None;
    let mut state = None;
    let mut error = None;
    for (name, value) in url.query_pairs() {
        match name.as_ref() {
            "code" => code = Some(value.into_owned()),
            "state" => state = Some(value.into_owned()),
            "error" => error = Some(value.into_owned()),
            _ => {}
        }
    }

    if let Some(reason) = error {
        return Some(Err(AuthError::AuthorizationDenied { reason }));
    }
    let code = code?;
    if state.as_deref() != Some(expected_state) {
        return Some(Err(AuthError::StateMismatch));
    }
    Some(Ok(code))
}
