// BigQuery MCP Gateway - Credentials
// Copyright 2026 Joseph Stone - All Rights Reserved
//
// Key-file validation at startup, credential discovery, and OAuth2 access
// tokens for the BigQuery REST API.
// Discovery order: --key-file, GOOGLE_APPLICATION_CREDENTIALS,
// gcloud application-default file, GCE metadata server.

use crate::error::{ConfigError, WarehouseError};
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

pub const BIGQUERY_SCOPE: &str = "https://www.googleapis.com/auth/bigquery";
const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";
const METADATA_TOKEN_URL: &str =
    "http://metadata.google.internal/computeMetadata/v1/instance/service-accounts/default/token";
const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";
const ASSERTION_LIFETIME_SECS: i64 = 3600;
/// Refresh this long before the token actually expires
const EXPIRY_MARGIN_SECS: i64 = 60;

/// Service account key as downloaded from the cloud console
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceAccountKey {
    pub project_id: String,
    pub client_email: String,
    pub private_key: String,
    #[serde(default)]
    pub token_uri: Option<String>,
}

/// `gcloud auth application-default login` credentials
#[derive(Debug, Clone, Deserialize)]
pub struct AuthorizedUser {
    pub client_id: String,
    pub client_secret: String,
    pub refresh_token: String,
}

/// Where access tokens come from
#[derive(Debug, Clone)]
pub enum Credentials {
    ServiceAccount(ServiceAccountKey),
    AuthorizedUser(AuthorizedUser),
    MetadataServer,
}

#[derive(Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum CredentialsFile {
    ServiceAccount(ServiceAccountKey),
    AuthorizedUser(AuthorizedUser),
}

/// Check a key file the way startup requires: readable, JSON, declares
/// itself a service account, names a project.
pub fn validate_key_file(path: &Path) -> Result<(), ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::KeyFileNotAccessible {
        path: path.to_path_buf(),
        source,
    })?;

    let key: serde_json::Value = serde_json::from_str(&content).map_err(|source| ConfigError::KeyFileNotJson {
        path: path.to_path_buf(),
        source,
    })?;

    if key.get("type").and_then(|v| v.as_str()) != Some("service_account") {
        return Err(ConfigError::InvalidKeyFile {
            path: path.to_path_buf(),
            reason: "type is not service_account",
        });
    }
    let has_project = key
        .get("project_id")
        .and_then(|v| v.as_str())
        .map(|p| !p.is_empty())
        .unwrap_or(false);
    if !has_project {
        return Err(ConfigError::InvalidKeyFile {
            path: path.to_path_buf(),
            reason: "missing project_id",
        });
    }

    Ok(())
}

impl Credentials {
    /// Load credentials from an explicit key file.
    pub fn from_key_file(path: &Path) -> Result<Self, WarehouseError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| WarehouseError::Auth(format!("cannot read {}: {}", path.display(), e)))?;
        Self::from_json(&content).map_err(|e| WarehouseError::Auth(format!("{}: {}", path.display(), e)))
    }

    fn from_json(content: &str) -> Result<Self, serde_json::Error> {
        Ok(match serde_json::from_str::<CredentialsFile>(content)? {
            CredentialsFile::ServiceAccount(key) => Credentials::ServiceAccount(key),
            CredentialsFile::AuthorizedUser(user) => Credentials::AuthorizedUser(user),
        })
    }

    /// Resolve credentials: explicit key file first, then the environment.
    pub fn discover(key_file: Option<&Path>) -> Result<Self, WarehouseError> {
        if let Some(path) = key_file {
            return Self::from_key_file(path);
        }

        if let Ok(path) = std::env::var("GOOGLE_APPLICATION_CREDENTIALS") {
            if !path.is_empty() {
                log::info!("Using GOOGLE_APPLICATION_CREDENTIALS: {}", path);
                return Self::from_key_file(Path::new(&path));
            }
        }

        if let Some(path) = application_default_path().filter(|p| p.exists()) {
            log::info!("Using application default credentials: {:?}", path);
            return Self::from_key_file(&path);
        }

        log::info!("No credentials file found, falling back to metadata server");
        Ok(Credentials::MetadataServer)
    }

    pub fn describe(&self) -> String {
        match self {
            Credentials::ServiceAccount(key) => format!("service account {}", key.client_email),
            Credentials::AuthorizedUser(_) => "application default user".to_string(),
            Credentials::MetadataServer => "metadata server".to_string(),
        }
    }
}

fn application_default_path() -> Option<PathBuf> {
    let home = std::env::var_os("HOME")?;
    Some(PathBuf::from(home).join(".config/gcloud/application_default_credentials.json"))
}

#[derive(Debug, Serialize)]
struct AssertionClaims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    iat: i64,
    exp: i64,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<i64>,
}

#[derive(Debug, Clone)]
struct AccessToken {
    value: String,
    expires_at: DateTime<Utc>,
}

impl AccessToken {
    fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        now + Duration::seconds(EXPIRY_MARGIN_SECS) < self.expires_at
    }
}

/// Build the signed JWT assertion exchanged for a service-account token.
fn sign_assertion(key: &ServiceAccountKey, now: DateTime<Utc>) -> Result<String, WarehouseError> {
    let claims = AssertionClaims {
        iss: &key.client_email,
        scope: BIGQUERY_SCOPE,
        aud: key.token_uri.as_deref().unwrap_or(DEFAULT_TOKEN_URI),
        iat: now.timestamp(),
        exp: now.timestamp() + ASSERTION_LIFETIME_SECS,
    };
    let encoding_key = EncodingKey::from_rsa_pem(key.private_key.as_bytes())
        .map_err(|e| WarehouseError::Auth(format!("invalid private key: {}", e)))?;
    jsonwebtoken::encode(&Header::new(Algorithm::RS256), &claims, &encoding_key)
        .map_err(|e| WarehouseError::Auth(format!("failed to sign assertion: {}", e)))
}

/// Caches one access token and refreshes it shortly before expiry.
pub struct TokenSource {
    credentials: Credentials,
    http: Client,
    cached: Mutex<Option<AccessToken>>,
}

impl TokenSource {
    pub fn new(credentials: Credentials, http: Client) -> Self {
        Self { credentials, http, cached: Mutex::new(None) }
    }

    /// Current bearer token, fetching a new one when needed.
    pub fn bearer(&self) -> Result<String, WarehouseError> {
        let mut cached = self
            .cached
            .lock()
            .map_err(|_| WarehouseError::Auth("token cache poisoned".to_string()))?;

        let now = Utc::now();
        if let Some(token) = cached.as_ref().filter(|t| t.is_fresh(now)) {
            return Ok(token.value.clone());
        }

        let response = self.fetch(now)?;
        let token = AccessToken {
            value: response.access_token,
            expires_at: now + Duration::seconds(response.expires_in.unwrap_or(ASSERTION_LIFETIME_SECS)),
        };
        log::debug!("Fetched access token via {}, expires {}", self.credentials.describe(), token.expires_at);
        let value = token.value.clone();
        *cached = Some(token);
        Ok(value)
    }

    fn fetch(&self, now: DateTime<Utc>) -> Result<TokenResponse, WarehouseError> {
        let resp = match &self.credentials {
            Credentials::ServiceAccount(key) => {
                let assertion = sign_assertion(key, now)?;
                self.http
                    .post(key.token_uri.as_deref().unwrap_or(DEFAULT_TOKEN_URI))
                    .form(&[("grant_type", JWT_BEARER_GRANT), ("assertion", assertion.as_str())])
                    .send()?
            }
            Credentials::AuthorizedUser(user) => self
                .http
                .post(DEFAULT_TOKEN_URI)
                .form(&[
                    ("grant_type", "refresh_token"),
                    ("client_id", user.client_id.as_str()),
                    ("client_secret", user.client_secret.as_str()),
                    ("refresh_token", user.refresh_token.as_str()),
                ])
                .send()?,
            Credentials::MetadataServer => self
                .http
                .get(METADATA_TOKEN_URL)
                .header("Metadata-Flavor", "Google")
                .query(&[("scopes", BIGQUERY_SCOPE)])
                .send()?,
        };

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().unwrap_or_default();
            return Err(WarehouseError::Auth(format!(
                "token endpoint returned HTTP {}: {}",
                status.as_u16(),
                body.trim()
            )));
        }
        resp.json::<TokenResponse>()
            .map_err(|e| WarehouseError::Auth(format!("malformed token response: {}", e)))
    }
}

// ============================================================================
// TESTS
// ============================================================================
