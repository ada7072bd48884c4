// --- File: crates/huddle_gcal/src/token.rs ---
//! Access-token lifecycle for members' OAuth2 authorizations.
//!
//! [`TokenRefresher::get_valid_token`] is the only way callers obtain a token:
//! it refreshes inside the safety margin, persists the result in one write and
//! turns revoked grants into [`HuddleError::ReauthorizationRequired`].
//!
//! Callers in the same process are serialized per (member, service type) so an
//! expired record triggers a single provider call. Across processes two
//! refreshes may still race; the store keeps the last write, and a caller whose
//! refresh token was rejected gets `ReauthorizationRequired` even when a
//! concurrent refresh has stored a new token in the meantime.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use chrono::{Duration, Utc};
use huddle_common::{
    external_service_error, validation_error, DomainEvent, HuddleError, Oauth2Authorization,
    ServiceType,
};
use huddle_config::TokenConfig;
use huddle_db::TokenStore;
use huddle_events::EventPublisher;
use tracing::{debug, info, warn};

use crate::oauth::{sign_state, verify_state, OAuthTokenProvider, ProviderError, TokenGrant};

/// Service name reported when the token endpoint itself fails.
pub const GOOGLE_OAUTH: &str = "google_oauth";

type KeyLocks = HashMap<(i64, ServiceType), Arc<tokio::sync::Mutex<()>>>;

pub struct TokenRefresher<S: TokenStore> {
    store: Arc<S>,
    provider: Arc<dyn OAuthTokenProvider>,
    margin: Duration,
    publisher: Option<EventPublisher>,
    state_secret: Option<String>,
    locks: Mutex<KeyLocks>,
}

impl<S: TokenStore> TokenRefresher<S> {
    pub fn new(store: Arc<S>, provider: Arc<dyn OAuthTokenProvider>, config: &TokenConfig) -> Self {
        Self {
            store,
            provider,
            margin: Duration::try_seconds(config.refresh_margin_seconds.max(0))
                .unwrap_or_else(Duration::zero),
            publisher: None,
            state_secret: None,
            locks: Mutex::new(HashMap::new()),
        }
    }

    /// Publishes a reauthorization event whenever a grant turns out revoked.
    pub fn with_publisher(mut self, publisher: EventPublisher) -> Self {
        self.publisher = Some(publisher);
        self
    }

    /// Secret for signing the consent `state`; required by
    /// [`authorization_url`](Self::authorization_url) and [`authorize`](Self::authorize).
    pub fn with_state_secret(mut self, secret: impl Into<String>) -> Self {
        self.state_secret = Some(secret.into());
        self
    }

    pub fn margin(&self) -> Duration {
        self.margin
    }

    /// Returns an authorization whose access token is outside the refresh
    /// window, refreshing and persisting it first if needed.
    ///
    /// # Errors
    ///
    /// * `AuthorizationRequired` when the member never authorized the service
    /// * `ReauthorizationRequired` when the refresh token is missing or revoked;
    ///   the stored record is left untouched
    /// * `ExternalService` when the token endpoint fails or is unreachable
    pub async fn get_valid_token(
        &self,
        member_id: i64,
        service_type: ServiceType,
    ) -> Result<Oauth2Authorization, HuddleError> {
        let current = self.find_required(member_id, service_type).await?;
        if !current.needs_refresh(Utc::now(), self.margin) {
            return Ok(current);
        }

        let lock = self.key_lock(member_id, service_type);
        let result = self.refresh_serialized(&lock, member_id, service_type).await;
        self.release_key_lock(member_id, service_type, lock);
        result
    }

    /// Consent URL for a member, carrying a signed state.
    pub fn authorization_url(
        &self,
        member_id: i64,
        service_type: ServiceType,
    ) -> Result<String, HuddleError> {
        let state = sign_state(member_id, service_type, Utc::now(), self.state_secret()?)?;
        Ok(self.provider.authorization_url(&state))
    }

    /// Completes the consent round trip and stores the member's first token.
    pub async fn authorize(
        &self,
        code: &str,
        state: &str,
    ) -> Result<Oauth2Authorization, HuddleError> {
        let (member_id, service_type) = verify_state(state, self.state_secret()?, Utc::now())?;
        debug!(
            "Exchanging authorization code for member {} ({})",
            member_id, service_type
        );

        let grant = self.provider.exchange_code(code).await.map_err(|e| match e {
            ProviderError::InvalidGrant(reason) => {
                validation_error(format!("Authorization code rejected: {reason}"))
            }
            other => provider_failure(other),
        })?;

        let now = Utc::now();
        let expiry_time = grant.expiry_after(now).map_err(provider_failure)?;
        let authorization = Oauth2Authorization {
            member_id,
            service_type,
            access_token: grant.access_token,
            refresh_token: grant.refresh_token,
            expiry_time,
            scope: grant.scope,
            updated_at: now,
        };
        let saved = self.store.save(&authorization).await?;
        info!("Member {} authorized {}", member_id, service_type);
        Ok(saved)
    }

    async fn refresh_serialized(
        &self,
        lock: &tokio::sync::Mutex<()>,
        member_id: i64,
        service_type: ServiceType,
    ) -> Result<Oauth2Authorization, HuddleError> {
        let _guard = lock.lock().await;

        // Whoever held the lock before us may already have refreshed
        let current = self.find_required(member_id, service_type).await?;
        if !current.needs_refresh(Utc::now(), self.margin) {
            debug!(
                "Token for member {} ({}) was refreshed by a concurrent caller",
                member_id, service_type
            );
            return Ok(current);
        }
        self.refresh(current).await
    }

    async fn refresh(
        &self,
        current: Oauth2Authorization,
    ) -> Result<Oauth2Authorization, HuddleError> {
        let Some(refresh_token) = current.refresh_token.as_deref() else {
            return Err(self.reauthorization_required(&current, "no refresh token stored"));
        };

        info!(
            "Refreshing token for member {} ({}), expired at {}",
            current.member_id, current.service_type, current.expiry_time
        );

        match self.provider.refresh(refresh_token).await {
            Ok(grant) => self.store_refreshed(&current, grant).await,
            Err(ProviderError::InvalidGrant(reason)) => {
                Err(self.reauthorization_required(&current, &reason))
            }
            Err(other) => {
                warn!(
                    "Token refresh for member {} ({}) failed: {}",
                    current.member_id, current.service_type, other
                );
                Err(provider_failure(other))
            }
        }
    }

    async fn store_refreshed(
        &self,
        current: &Oauth2Authorization,
        grant: TokenGrant,
    ) -> Result<Oauth2Authorization, HuddleError> {
        let now = Utc::now();
        let expiry_time = grant.expiry_after(now).map_err(|e| {
            warn!(
                "Discarding refreshed token for member {} ({}): {}",
                current.member_id, current.service_type, e
            );
            provider_failure(e)
        })?;
        let refreshed = Oauth2Authorization {
            member_id: current.member_id,
            service_type: current.service_type,
            access_token: grant.access_token,
            refresh_token: grant.refresh_token.or_else(|| current.refresh_token.clone()),
            expiry_time,
            scope: grant.scope.or_else(|| current.scope.clone()),
            updated_at: now,
        };
        Ok(self.store.save(&refreshed).await?)
    }

    fn reauthorization_required(&self, current: &Oauth2Authorization, reason: &str) -> HuddleError {
        warn!(
            "Member {} must reauthorize {}: {}",
            current.member_id, current.service_type, reason
        );
        if let Some(publisher) = &self.publisher {
            publisher.publish(&DomainEvent::ReauthorizationRequired {
                member_id: current.member_id,
                service_type: current.service_type,
            });
        }
        HuddleError::ReauthorizationRequired {
            member_id: current.member_id,
            service_type: current.service_type,
            reason: reason.to_string(),
        }
    }

    async fn find_required(
        &self,
        member_id: i64,
        service_type: ServiceType,
    ) -> Result<Oauth2Authorization, HuddleError> {
        self.store
            .find(member_id, service_type)
            .await?
            .ok_or(HuddleError::AuthorizationRequired {
                member_id,
                service_type,
            })
    }

    fn state_secret(&self) -> Result<&str, HuddleError> {
        self.state_secret
            .as_deref()
            .ok_or_else(|| HuddleError::Config("OAuth state secret is not configured".to_string()))
    }

    fn key_lock(&self, member_id: i64, service_type: ServiceType) -> Arc<tokio::sync::Mutex<()>> {
        self.locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry((member_id, service_type))
            .or_default()
            .clone()
    }

    fn release_key_lock(
        &self,
        member_id: i64,
        service_type: ServiceType,
        lock: Arc<tokio::sync::Mutex<()>>,
    ) {
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        // Two references left means the map and us: nobody else is waiting
        if Arc::strong_count(&lock) == 2 {
            locks.remove(&(member_id, service_type));
        }
    }
}

fn provider_failure(err: ProviderError) -> HuddleError {
    let status = match &err {
        ProviderError::Status { status, .. } => Some(*status),
        _ => None,
    };
    external_service_error(GOOGLE_OAUTH, status, err)
}
