use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use jsonwebtoken::{Algorithm, EncodingKey, Header, encode};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::SheetsError;
use crate::http::{HttpCore, TokenCache};

const SCOPES: &str = "https://www.googleapis.com/auth/spreadsheets https://www.googleapis.com/auth/drive";
const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";
const ASSERTION_LIFETIME_SECS: u64 = 3600;

/// Source of bearer tokens for Google APIs.
#[async_trait]
pub trait TokenSource: Send + Sync {
    async fn access_token(&self) -> Result<String, SheetsError>;
}

/// Pre-issued token, used as-is.
#[derive(Debug, Clone)]
pub struct StaticToken(pub String);

#[async_trait]
impl TokenSource for StaticToken {
    async fn access_token(&self) -> Result<String, SheetsError> {
        Ok(self.0.clone())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServiceAccountKey {
    pub client_email: String,
    pub private_key: String,
    #[serde(default)]
    pub private_key_id: Option<String>,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

fn default_token_uri() -> String {
    "https://oauth2.googleapis.com/token".to_string()
}

impl ServiceAccountKey {
    pub fn from_file(path: &Path) -> Result<Self, SheetsError> {
        let bytes = std::fs::read(path).map_err(|source| SheetsError::KeyRead {
            path: path.to_path_buf(),
            source: Arc::new(source),
        })?;
        serde_json::from_slice(&bytes).map_err(|source| SheetsError::KeyParse {
            path: path.to_path_buf(),
            source: Arc::new(source),
        })
    }

    /// First candidate key file that exists on this machine.
    pub fn discover(candidates: &[PathBuf]) -> Result<Self, SheetsError> {
        let found = candidates
            .iter()
            .find(|path| path.is_file())
            .ok_or_else(|| SheetsError::NoCredentials {
                candidates: candidates.to_vec(),
            })?;
        info!(path = %found.display(), "using service-account key");
        Self::from_file(found)
    }
}

#[derive(Debug, Serialize)]
struct Claims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    iat: u64,
    exp: u64,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default = "default_expires_in")]
    expires_in: u64,
}

fn default_expires_in() -> u64 {
    ASSERTION_LIFETIME_SECS
}

/// Exchanges a signed RS256 assertion for an access token and caches it.
pub struct ServiceAccountAuth {
    key: ServiceAccountKey,
    core: HttpCore,
    cache: TokenCache,
}

impl ServiceAccountAuth {
    pub fn new(key: ServiceAccountKey, core: HttpCore) -> Self {
        Self {
            key,
            core,
            cache: TokenCache::new(),
        }
    }

    fn assertion(&self) -> Result<String, SheetsError> {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs();
        let claims = Claims {
            iss: &self.key.client_email,
            scope: SCOPES,
            aud: &self.key.token_uri,
            iat: now,
            exp: now + ASSERTION_LIFETIME_SECS,
        };
        let mut header = Header::new(Algorithm::RS256);
        header.kid = self.key.private_key_id.clone();
        let signing_key = EncodingKey::from_rsa_pem(self.key.private_key.as_bytes())
            .map_err(|err| SheetsError::Sign(Arc::new(err)))?;
        encode(&header, &claims, &signing_key).map_err(|err| SheetsError::Sign(Arc::new(err)))
    }

    async fn exchange(&self) -> Result<(String, u64), SheetsError> {
        let assertion = self.assertion()?;
        let token_uri = self.key.token_uri.as_str();
        let response: TokenResponse = self
            .core
            .get_json("sheets_token", |http| {
                http.post(token_uri).form(&[
                    ("grant_type", JWT_BEARER_GRANT),
                    ("assertion", assertion.as_str()),
                ])
            })
            .await
            .map_err(SheetsError::from)?;
        debug!(expires_in = response.expires_in, "obtained Sheets access token");
        Ok((response.access_token, response.expires_in))
    }
}

#[async_trait]
impl TokenSource for ServiceAccountAuth {
    async fn access_token(&self) -> Result<String, SheetsError> {
        self.cache.get_or_fetch(|| self.exchange()).await
    }
}
