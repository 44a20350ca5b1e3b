use crate::utils::error::{HubError, Result};
use reqwest::Client;
use serde::Deserialize;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

/// Tokens are refreshed this long before the server-side expiry.
const EXPIRY_MARGIN: Duration = Duration::from_secs(60);
const DEFAULT_EXPIRES_IN: u64 = 3600;

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<u64>,
}

#[derive(Debug, Clone)]
struct CachedToken {
    value: String,
    expires_at: Instant,
}

#[derive(Debug, Clone)]
enum TokenSource {
    Static(String),
    ClientCredentials {
        token_url: String,
        client_id: String,
        client_secret: String,
        scope: Option<String>,
    },
}

/// Bearer token source: a fixed token or an OAuth2 client-credentials grant
/// cached until shortly before it expires.
#[derive(Debug)]
pub struct TokenProvider {
    client: Client,
    source: TokenSource,
    cache: Mutex<Option<CachedToken>>,
}

impl TokenProvider {
    pub fn static_token(token: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            source: TokenSource::Static(token.into()),
            cache: Mutex::new(None),
        }
    }

    pub fn client_credentials(
        client: Client,
        token_url: impl Into<String>,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        scope: Option<String>,
    ) -> Self {
        Self {
            client,
            source: TokenSource::ClientCredentials {
                token_url: token_url.into(),
                client_id: client_id.into(),
                client_secret: client_secret.into(),
                scope,
            },
            cache: Mutex::new(None),
        }
    }

    /// Static token when given, else client credentials when both halves are present.
    pub fn from_parts(
        client: Client,
        access_token: Option<&str>,
        token_url: String,
        client_id: Option<&str>,
        client_secret: Option<&str>,
        scope: Option<String>,
    ) -> Result<Self> {
        if let Some(token) = access_token {
            return Ok(Self::static_token(token));
        }
        match (client_id, client_secret) {
            (Some(id), Some(secret)) => Ok(Self::client_credentials(
                client, token_url, id, secret, scope,
            )),
            _ => Err(HubError::MissingConfigError {
                field: "client_id/client_secret".to_string(),
            }),
        }
    }

    pub async fn token(&self) -> Result<String> {
        let (token_url, client_id, client_secret, scope) = match &self.source {
            TokenSource::Static(token) => return Ok(token.clone()),
            TokenSource::ClientCredentials {
                token_url,
                client_id,
                client_secret,
                scope,
            } => (token_url, client_id, client_secret, scope),
        };

        let mut cache = self.cache.lock().await;
        if let Some(cached) = cache.as_ref() {
            if Instant::now() < cached.expires_at {
                return Ok(cached.value.clone());
            }
        }

        tracing::debug!("🔑 Requesting access token from {}", token_url);

        let mut form = vec![
            ("grant_type", "client_credentials"),
            ("client_id", client_id.as_str()),
            ("client_secret", client_secret.as_str()),
        ];
        if let Some(scope) = scope {
            form.push(("scope", scope.as_str()));
        }

        let response = self.client.post(token_url).form(&form).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(HubError::UpstreamError {
                status: status.as_u16(),
                body: format!("token request failed: {}", body),
            });
        }

        let token: TokenResponse = response.json().await?;
        let lifetime = Duration::from_secs(token.expires_in.unwrap_or(DEFAULT_EXPIRES_IN));
        *cache = Some(CachedToken {
            value: token.access_token.clone(),
            expires_at: Instant::now() + lifetime.saturating_sub(EXPIRY_MARGIN),
        });

        Ok(token.access_token)
    }
}
