// --- File: crates/huddle_gcal/src/oauth.rs ---
//! OAuth2 authorization-code and refresh-token grants against Google.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use hmac::{Hmac, Mac};
use huddle_common::{validation_error, HuddleError, ServiceType};
use huddle_config::GoogleOAuthConfig;
use reqwest::Client as ReqwestClient;
use serde::Deserialize;
use sha2::Sha256;
use thiserror::Error;
use tracing::{debug, warn};

type HmacSha256 = Hmac<Sha256>;

/// How long a consent round trip may take before the signed state expires.
pub const STATE_TTL_MINUTES: i64 = 15;

/// Successful token endpoint response.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TokenGrant {
    pub access_token: String,
    /// Lifetime of `access_token` in seconds.
    pub expires_in: i64,
    /// Only present when the provider rotates or first issues a refresh token.
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub scope: Option<String>,
    #[serde(default)]
    pub token_type: Option<String>,
}

impl TokenGrant {
    /// Absolute expiry of `access_token` when granted at `now`.
    ///
    /// A lifetime that is not positive or does not fit a timestamp is a
    /// malformed response.
    pub fn expiry_after(&self, now: DateTime<Utc>) -> Result<DateTime<Utc>, ProviderError> {
        Some(self.expires_in)
            .filter(|seconds| *seconds > 0)
            .and_then(Duration::try_seconds)
            .and_then(|lifetime| now.checked_add_signed(lifetime))
            .ok_or_else(|| {
                ProviderError::Transport(format!("invalid expires_in: {}", self.expires_in))
            })
    }
}

#[derive(Debug, Deserialize)]
struct TokenErrorBody {
    error: String,
    #[serde(default)]
    error_description: Option<String>,
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProviderError {
    /// The code or refresh token was revoked, expired or never valid.
    #[error("Grant rejected by token endpoint: {0}")]
    InvalidGrant(String),
    #[error("Token endpoint returned {status}: {message}")]
    Status { status: u16, message: String },
    #[error("Token endpoint unreachable: {0}")]
    Transport(String),
}

/// OAuth2 client for one provider.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait OAuthTokenProvider: Send + Sync {
    /// Consent URL the member is redirected to.
    fn authorization_url(&self, state: &str) -> String;

    /// Exchanges an authorization code for the first token pair.
    async fn exchange_code(&self, code: &str) -> Result<TokenGrant, ProviderError>;

    /// Exchanges a refresh token for a new access token.
    async fn refresh(&self, refresh_token: &str) -> Result<TokenGrant, ProviderError>;
}

/// [`OAuthTokenProvider`] for Google's OAuth2 endpoints.
pub struct GoogleOAuthProvider {
    client: ReqwestClient,
    config: GoogleOAuthConfig,
}

impl GoogleOAuthProvider {
    pub fn new(config: GoogleOAuthConfig) -> Self {
        Self::with_client(ReqwestClient::new(), config)
    }

    pub fn with_client(client: ReqwestClient, config: GoogleOAuthConfig) -> Self {
        Self { client, config }
    }

    async fn token_request(&self, params: &[(&str, &str)]) -> Result<TokenGrant, ProviderError> {
        let response = self
            .client
            .post(&self.config.token_url)
            .form(params)
            .send()
            .await
            .map_err(|e| ProviderError::Transport(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            return response
                .json::<TokenGrant>()
                .await
                .map_err(|e| ProviderError::Transport(format!("invalid token response: {e}")));
        }

        let body = response.text().await.unwrap_or_default();
        let parsed = serde_json::from_str::<TokenErrorBody>(&body).ok();
        let status = status.as_u16();

        match parsed {
            Some(err) if matches!(status, 400 | 401) && err.error == "invalid_grant" => {
                Err(ProviderError::InvalidGrant(
                    err.error_description.unwrap_or(err.error),
                ))
            }
            Some(err) => Err(ProviderError::Status {
                status,
                message: err.error_description.unwrap_or(err.error),
            }),
            None => Err(ProviderError::Status {
                status,
                message: body,
            }),
        }
    }
}

#[async_trait]
impl OAuthTokenProvider for GoogleOAuthProvider {
    fn authorization_url(&self, state: &str) -> String {
        let scope = self.config.scopes.join(" ");
        let params = [
            ("client_id", self.config.client_id.as_str()),
            ("redirect_uri", self.config.redirect_uri.as_str()),
            ("response_type", "code"),
            ("scope", scope.as_str()),
            // offline + consent makes Google issue a refresh token every time
            ("access_type", "offline"),
            ("prompt", "consent"),
            ("state", state),
        ];
        match serde_urlencoded::to_string(params) {
            Ok(query) => format!("{}?{}", self.config.auth_url, query),
            Err(e) => {
                warn!("Could not encode authorization URL parameters: {}", e);
                self.config.auth_url.clone()
            }
        }
    }

    async fn exchange_code(&self, code: &str) -> Result<TokenGrant, ProviderError> {
        debug!("Exchanging authorization code");
        self.token_request(&[
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", self.config.redirect_uri.as_str()),
            ("client_id", self.config.client_id.as_str()),
            ("client_secret", self.config.client_secret.as_str()),
        ])
        .await
    }

    async fn refresh(&self, refresh_token: &str) -> Result<TokenGrant, ProviderError> {
        debug!("Refreshing access token");
        self.token_request(&[
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
            ("client_id", self.config.client_id.as_str()),
            ("client_secret", self.config.client_secret.as_str()),
        ])
        .await
    }
}

fn state_signature(payload: &str, secret: &str) -> Result<HmacSha256, HuddleError> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|_| HuddleError::Config("Invalid OAuth state secret".to_string()))?;
    mac.update(payload.as_bytes());
    Ok(mac)
}

/// Signs `{member_id}.{service_type}.{issued_at}` into an opaque state value.
pub fn sign_state(
    member_id: i64,
    service_type: ServiceType,
    issued_at: DateTime<Utc>,
    secret: &str,
) -> Result<String, HuddleError> {
    let payload = format!("{}.{}.{}", member_id, service_type, issued_at.timestamp());
    let signature = hex::encode(state_signature(&payload, secret)?.finalize().into_bytes());
    Ok(format!("{payload}.{signature}"))
}

/// Checks the signature and age of a state produced by [`sign_state`].
pub fn verify_state(
    state: &str,
    secret: &str,
    now: DateTime<Utc>,
) -> Result<(i64, ServiceType), HuddleError> {
    let invalid = || validation_error("Invalid OAuth state");

    let (payload, signature) = state.rsplit_once('.').ok_or_else(invalid)?;
    let signature = hex::decode(signature).map_err(|_| invalid())?;
    state_signature(payload, secret)?
        .verify_slice(&signature)
        .map_err(|_| invalid())?;

    let mut parts = payload.splitn(3, '.');
    let member_id = parts
        .next()
        .and_then(|p| p.parse::<i64>().ok())
        .ok_or_else(invalid)?;
    let service_type = parts
        .next()
        .ok_or_else(invalid)?
        .parse::<ServiceType>()
        .map_err(|_| invalid())?;
    let issued_at = parts
        .next()
        .and_then(|p| p.parse::<i64>().ok())
        .and_then(|ts| DateTime::from_timestamp(ts, 0))
        .ok_or_else(invalid)?;

    if now - issued_at > Duration::minutes(STATE_TTL_MINUTES) {
        return Err(validation_error("OAuth state expired"));
    }
    Ok((member_id, service_type))
}
