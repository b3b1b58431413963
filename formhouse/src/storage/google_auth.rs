//! Google service-account OAuth2 (JWT bearer grant).
//!
//! Both the Drive and Firebase adapters authenticate the same way: sign a
//! short-lived JWT with the service account's RSA key and exchange it at the
//! token endpoint for an access token. [`TokenSource`] caches the token and
//! refreshes it shortly before expiry.

use std::path::Path;
use std::time::{Duration, Instant};

use anyhow::Context;
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

const TOKEN_LIFETIME_SECS: u64 = 3600;
// Refresh this long before the token actually expires
const REFRESH_MARGIN_SECS: u64 = 60;

/// Parsed service-account key file (the JSON Google hands out on key
/// creation). Only the fields we use are kept.
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceAccountKey {
    pub client_email: String,
    pub private_key: String,
    #[serde(default)]
    pub project_id: Option<String>,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

fn default_token_uri() -> String {
    "https://oauth2.googleapis.com/token".to_string()
}

impl ServiceAccountKey {
    /// Read and parse a key file. Synchronous on purpose: this runs once
    /// during adapter construction, before the runtime serves traffic.
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read service account key {}", path.display()))?;
        let key: Self = serde_json::from_str(&raw)
            .with_context(|| format!("invalid service account key {}", path.display()))?;
        Ok(key)
    }
}

#[derive(Debug, Serialize)]
struct Claims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    exp: u64,
    iat: u64,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: u64,
}

struct CachedToken {
    token: String,
    obtained_at: Instant,
    ttl: Duration,
}

impl CachedToken {
    fn is_fresh(&self) -> bool {
        let margin = Duration::from_secs(REFRESH_MARGIN_SECS);
        self.obtained_at.elapsed() + margin < self.ttl
    }
}

/// Caching access-token source for one service account and scope.
pub struct TokenSource {
    key: ServiceAccountKey,
    encoding_key: EncodingKey,
    scope: &'static str,
    http: reqwest::Client,
    cached: Mutex<Option<CachedToken>>,
}

impl TokenSource {
    /// Build a token source. Fails if the private key is not valid RSA PEM,
    /// which surfaces bad credential files at startup instead of on the
    /// first submission.
    pub fn new(key: ServiceAccountKey, scope: &'static str, http: reqwest::Client) -> anyhow::Result<Self> {
        let encoding_key = EncodingKey::from_rsa_pem(key.private_key.as_bytes())
            .context("service account private_key is not a valid RSA PEM key")?;
        Ok(Self {
            key,
            encoding_key,
            scope,
            http,
            cached: Mutex::new(None),
        })
    }

    /// Email of the acting service account.
    pub fn actor_email(&self) -> &str {
        &self.key.client_email
    }

    pub fn project_id(&self) -> Option<&str> {
        self.key.project_id.as_deref()
    }

    /// Return a valid access token, fetching a fresh one when the cached
    /// token is absent or close to expiry.
    pub async fn access_token(&self) -> anyhow::Result<String> {
        let mut cached = self.cached.lock().await;
        if let Some(token) = cached.as_ref()
            && token.is_fresh()
        {
            return Ok(token.token.clone());
        }

        let fresh = self.fetch_token().await?;
        let token = fresh.token.clone();
        *cached = Some(fresh);
        Ok(token)
    }

    async fn fetch_token(&self) -> anyhow::Result<CachedToken> {
        let iat = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .context("system clock is before the unix epoch")?
            .as_secs();
        let claims = Claims {
            iss: &self.key.client_email,
            scope: self.scope,
            aud: &self.key.token_uri,
            exp: iat + TOKEN_LIFETIME_SECS,
            iat,
        };
        let assertion = jsonwebtoken::encode(&Header::new(Algorithm::RS256), &claims, &self.encoding_key)
            .context("failed to sign service account assertion")?;

        let response = self
            .http
            .post(&self.key.token_uri)
            .form(&[
                ("grant_type", "urn:ietf:params:oauth:grant-type:jwt-bearer"),
                ("assertion", assertion.as_str()),
            ])
            .send()
            .await
            .context("token endpoint request failed")?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("token endpoint returned {status}: {body}");
        }

        let token: TokenResponse = response.json().await.context("invalid token endpoint response")?;
        tracing::debug!(actor = %self.key.client_email, "Obtained fresh access token");
        Ok(CachedToken {
            token: token.access_token,
            obtained_at: Instant::now(),
            ttl: Duration::from_secs(token.expires_in),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_string_contains, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    // Throwaway 2048-bit RSA key, generated for these tests only.
    const TEST_RSA_PEM: &str = include_str!("../../testdata/test-service-account.pem");

    fn key_with_token_uri(token_uri: &str) -> ServiceAccountKey {
        ServiceAccountKey {
            client_email: "svc@example.iam.gserviceaccount.com".to_string(),
            private_key: TEST_RSA_PEM.to_string(),
            project_id: Some("formhouse-test".to_string()),
            token_uri: token_uri.to_string(),
        }
    }

    #[test]
    fn key_file_defaults_token_uri() {
        let json = serde_json::json!({
            "client_email": "svc@example.iam.gserviceaccount.com",
            "private_key": "pem",
        });
        let key: ServiceAccountKey = serde_json::from_value(json).unwrap();
        assert_eq!(key.token_uri, "https://oauth2.googleapis.com/token");
        assert!(key.project_id.is_none());
    }

    #[test]
    fn invalid_pem_is_rejected_at_construction() {
        let mut key = key_with_token_uri("https://oauth2.googleapis.com/token");
        key.private_key = "not a pem".to_string();
        let result = TokenSource::new(key, "scope", reqwest::Client::new());
        assert!(result.is_err());
    }

    #[test]
    fn cached_token_freshness_respects_margin() {
        let fresh = CachedToken {
            token: "t".to_string(),
            obtained_at: Instant::now(),
            ttl: Duration::from_secs(3600),
        };
        assert!(fresh.is_fresh());

        let nearly_expired = CachedToken {
            token: "t".to_string(),
            obtained_at: Instant::now(),
            ttl: Duration::from_secs(30),
        };
        assert!(!nearly_expired.is_fresh());
    }

    #[tokio::test]
    async fn token_endpoint_error_is_reported() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .and(body_string_contains("jwt-bearer"))
            .respond_with(ResponseTemplate::new(401).set_body_string("invalid_grant"))
            .mount(&server)
            .await;

        let key = key_with_token_uri(&format!("{}/token", server.uri()));
        let source = TokenSource::new(key, "https://www.googleapis.com/auth/drive", reqwest::Client::new()).unwrap();
        let err = source.access_token().await.unwrap_err();
        assert!(err.to_string().contains("401"), "unexpected error: {err:#}");
    }

    #[tokio::test]
    async fn tokens_are_cached_across_calls() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "ya29.test",
                "expires_in": 3600,
                "token_type": "Bearer",
            })))
            .expect(1)
            .mount(&server)
            .await;

        let key = key_with_token_uri(&format!("{}/token", server.uri()));
        let source = TokenSource::new(key, "https://www.googleapis.com/auth/drive", reqwest::Client::new()).unwrap();
        assert_eq!(source.access_token().await.unwrap(), "ya29.test");
        // second call must be served from cache (mock expects one hit)
        assert_eq!(source.access_token().await.unwrap(), "ya29.test");
    }
}
