//! Credential files and the on-disk token cache
//!
//! Handles the JSON formats Google tools hand out (client secrets, service
//! account keys, authorized-user files) and the refresh-token cache written
//! after a successful consent flow. The cache holds a long-lived secret, so it
//! is written with owner-only permissions.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::constants::auth;
use crate::errors::{AuthError, AuthResult};

/// OAuth client registered for an installed or web application
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ClientSecrets {
    pub client_id: String,
    #[serde(default)]
    pub client_secret: Option<String>,
    #[serde(default = "default_auth_uri")]
    pub auth_uri: String,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

#[derive(Deserialize)]
struct ClientSecretsFile {
    installed: Option<ClientSecrets>,
    web: Option<ClientSecrets>,
}

impl ClientSecrets {
    /// Reads a client secrets file downloaded from the API console
    ///
    /// # Errors
    ///
    /// Returns `AuthError::CredentialsFileNotFound` if the file is missing, or
    /// `AuthError::InvalidCredentialsFile` if it has neither an `installed`
    /// nor a `web` section.
    pub fn load(path: &Path) -> AuthResult<Self> {
        let contents = read_credentials_file(path, "--clientSecretsFile")?;
        Self::parse(path, &contents)
    }

    fn parse(path: &Path, contents: &str) -> AuthResult<Self> {
        let file: ClientSecretsFile = serde_json::from_str(contents).map_err(|e| invalid(path, e))?;
        file.installed.or(file.web).ok_or_else(|| AuthError::InvalidCredentialsFile {
            path: path.to_path_buf(),
            reason: "expected an \"installed\" or \"web\" client".to_string(),
        })
    }
}

/// Private key of a service account
#[derive(Clone, PartialEq, Deserialize)]
pub struct ServiceAccountKey {
    pub client_email: String,
    pub private_key: String,
    #[serde(default)]
    pub private_key_id: Option<String>,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

impl std::fmt::Debug for ServiceAccountKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceAccountKey")
            .field("client_email", &self.client_email)
            .field("private_key_id", &self.private_key_id)
            .field("token_uri", &self.token_uri)
            .finish_non_exhaustive()
    }
}

impl ServiceAccountKey {
    /// Reads a service account JSON key file
    pub fn load(path: &Path) -> AuthResult<Self> {
        let contents = read_credentials_file(path, "--serviceAccountKeyFile")?;
        match serde_json::from_str::<CredentialsFile>(&contents).map_err(|e| invalid(path, e))? {
            CredentialsFile::ServiceAccount(key) => Ok(key),
            CredentialsFile::AuthorizedUser(_) => Err(AuthError::InvalidCredentialsFile {
                path: path.to_path_buf(),
                reason: "expected a service account key, found authorized user credentials"
                    .to_string(),
            }),
        }
    }
}

/// Refreshable credentials of a user, as written by gcloud
#[derive(Clone, PartialEq, Deserialize)]
pub struct AuthorizedUser {
    pub client_id: String,
    pub client_secret: String,
    pub refresh_token: String,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

impl std::fmt::Debug for AuthorizedUser {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthorizedUser")
            .field("client_id", &self.client_id)
            .finish_non_exhaustive()
    }
}

/// Application default credentials, tagged by their `type` field
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CredentialsFile {
    ServiceAccount(ServiceAccountKey),
    AuthorizedUser(AuthorizedUser),
}

impl CredentialsFile {
    pub fn load(path: &Path) -> AuthResult<Self> {
        let contents = read_credentials_file(path, crate::constants::env::APPLICATION_CREDENTIALS)?;
        serde_json::from_str(&contents).map_err(|e| invalid(path, e))
    }
}

/// Loads application default credentials if the environment points at them
///
/// An unset variable means "no default credentials" and yields `Ok(None)`; a
/// variable pointing at a missing or malformed file is an error.
pub fn application_default_credentials() -> AuthResult<Option<CredentialsFile>> {
    match std::env::var_os(crate::constants::env::APPLICATION_CREDENTIALS) {
        Some(path) if !path.is_empty() => {
            let path = PathBuf::from(path);
            tracing::info!("Using application default credentials from {}", path.display());
            CredentialsFile::load(&path).map(Some)
        }
        _ => Ok(None),
    }
}

/// Refresh token persisted after the consent flow
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredCredential {
    pub client_id: String,
    pub refresh_token: String,
    #[serde(default)]
    pub scopes: Vec<String>,
}

impl std::fmt::Debug for StoredCredential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoredCredential")
            .field("client_id", &self.client_id)
            .field("scopes", &self.scopes)
            .finish_non_exhaustive()
    }
}

impl StoredCredential {
    /// Whether this credential was granted to `client_id` for at least `scopes`
    pub fn covers(&self, client_id: &str, scopes: &[String]) -> bool {
        self.client_id == client_id && scopes.iter().all(|scope| self.scopes.contains(scope))
    }
}

/// File-backed store for the user's refresh token
#[derive(Debug, Clone)]
pub struct CredentialStore {
    path: PathBuf,
}

impl CredentialStore {
    /// Store inside `dir`, using the standard cache file name
    pub fn in_dir(dir: &Path) -> Self {
        Self {
            path: dir.join(auth::TOKEN_CACHE_FILE),
        }
    }

    /// Store in the default location under the home directory
    pub fn default_location() -> AuthResult<Self> {
        let home = dirs::home_dir().ok_or(AuthError::NoHomeDirectory)?;
        Ok(Self::in_dir(&home.join(auth::TOKEN_CACHE_DIR)))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads the cached credential, if any
    ///
    /// A corrupt cache is reported and ignored so the consent flow can
    /// replace it.
    pub fn load(&self) -> AuthResult<Option<StoredCredential>> {
        let contents = match std::fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(AuthError::CredentialStorage(e)),
        };

        match serde_json::from_str(&contents) {
            Ok(credential) => Ok(Some(credential)),
            Err(e) => {
                tracing::warn!(
                    "Ignoring unreadable token cache {}: {}",
                    self.path.display(),
                    e
                );
                Ok(None)
            }
        }
    }

    /// Writes the credential with owner-only permissions
    pub fn save(&self, credential: &StoredCredential) -> AuthResult<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let mut options = OpenOptions::new();
        options.write(true).create(true).truncate(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(auth::TOKEN_CACHE_PERMISSIONS);
        }

        let mut file = options.open(&self.path)?;

        // Tighten an existing file created with looser permissions
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mut perms = file.metadata()?.permissions();
            perms.set_mode(auth::TOKEN_CACHE_PERMISSIONS);
            file.set_permissions(perms)?;
        }

        file.write_all(serde_json::to_string_pretty(credential)?.as_bytes())?;
        file.flush()?;

        tracing::info!("Stored refresh token in {}", self.path.display());
        Ok(())
    }
}

/// Resolves a credential path, falling back to `~/<default_file>`
pub fn resolve_path(explicit: Option<&Path>, default_file: &str) -> AuthResult<PathBuf> {
    if let Some(path) = explicit {
        return Ok(path.to_path_buf());
    }
    let home = dirs::home_dir().ok_or(AuthError::NoHomeDirectory)?;
    Ok(home.join(default_file))
}

fn read_credentials_file(path: &Path, flag: &'static str) -> AuthResult<String> {
    match std::fs::read_to_string(path) {
        Ok(contents) => Ok(contents),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            Err(AuthError::CredentialsFileNotFound {
                path: path.to_path_buf(),
                flag,
            })
        }
        Err(e) => Err(AuthError::CredentialStorage(e)),
    }
}

fn invalid(path: &Path, error: serde_json::Error) -> AuthError {
    AuthError::InvalidCredentialsFile {
        path: path.to_path_buf(),
        reason: error.to_string(),
    }
}

fn default_auth_uri() -> String {
    auth::DEFAULT_AUTH_URI.to_string()
}

fn default_token_uri() -> String {
    auth::DEFAULT_TOKEN_URI.to_string()
}
