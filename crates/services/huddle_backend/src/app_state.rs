// --- File: crates/services/huddle_backend/src/app_state.rs ---
use std::sync::Arc;

use huddle_config::AppConfig;
use huddle_db::{DbClient, SqlTokenStore};
use huddle_events::EventPublisher;
use huddle_notifications::NotificationState;

#[cfg(feature = "gcal")]
use huddle_gcal::GcalState;

/// Application state that is shared across all routes.
///
/// Every [`EventPublisher`] clone lives somewhere inside this struct, so the
/// publisher worker drains and stops once the router holding it is dropped.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub db_client: DbClient,
    pub tokens: SqlTokenStore,
    pub publisher: EventPublisher,
    pub notifications: Arc<NotificationState>,

    /// Consent and calendar routes, present when `use_gcal` is set and the
    /// Google section is configured.
    #[cfg(feature = "gcal")]
    pub gcal_state: Option<Arc<GcalState>>,
}

/// Builder for AppState, used by the service factory and by tests that wire
/// their own stores.
pub struct AppStateBuilder {
    config: Arc<AppConfig>,
    db_client: DbClient,
    publisher: EventPublisher,
    notifications: Arc<NotificationState>,

    #[cfg(feature = "gcal")]
    gcal_state: Option<Arc<GcalState>>,
}

impl AppStateBuilder {
    pub fn new(
        config: Arc<AppConfig>,
        db_client: DbClient,
        publisher: EventPublisher,
        notifications: Arc<NotificationState>,
    ) -> Self {
        Self {
            config,
            db_client,
            publisher,
            notifications,
            #[cfg(feature = "gcal")]
            gcal_state: None,
        }
    }

    /// Set the Google Calendar state.
    #[cfg(feature = "gcal")]
    pub fn with_gcal_state(mut self, gcal_state: Option<Arc<GcalState>>) -> Self {
        self.gcal_state = gcal_state;
        self
    }

    pub fn build(self) -> AppState {
        AppState {
            config: self.config,
            tokens: SqlTokenStore::new(self.db_client.clone()),
            db_client: self.db_client,
            publisher: self.publisher,
            notifications: self.notifications,
            #[cfg(feature = "gcal")]
            gcal_state: self.gcal_state,
        }
    }
}

impl AppState {
    pub fn builder(
        config: Arc<AppConfig>,
        db_client: DbClient,
        publisher: EventPublisher,
        notifications: Arc<NotificationState>,
    ) -> AppStateBuilder {
        AppStateBuilder::new(config, db_client, publisher, notifications)
    }
}
