// --- File: crates/services/huddle_backend/src/service_factory.rs ---
//! Wires stores, services and the publisher from the loaded configuration.

use std::sync::Arc;

use huddle_common::{HuddleError, MessageSink};
use huddle_config::AppConfig;
use huddle_db::{init_schemas, DbClient, SqlNotificationRepository};
use huddle_events::{channel, PublisherWorker};
use huddle_notifications::{
    ConnectionRegistry, NotificationSink, NotificationState, NotificationWriter,
};
use tracing::{info, warn};

use crate::app_state::AppState;

#[cfg(feature = "gcal")]
use huddle_events::EventPublisher;
#[cfg(feature = "gcal")]
use huddle_gcal::{
    auth::create_http_client, CalendarSyncService, GcalState, GoogleCalendarProvider,
    GoogleOAuthProvider, TokenRefresher,
};
#[cfg(feature = "gcal")]
use huddle_db::{SqlCalendarRepository, SqlTokenStore};

type Writer = Arc<NotificationWriter<SqlNotificationRepository>>;

/// Connects to the database, creates the schema and builds the shared state.
///
/// The returned worker is not running yet; the caller spawns it.
pub async fn build_app_state(
    config: Arc<AppConfig>,
) -> Result<(AppState, PublisherWorker), HuddleError> {
    let db_client = DbClient::new(&config).await?;
    init_schemas(&db_client).await?;

    let writer: Writer = Arc::new(NotificationWriter::new(
        SqlNotificationRepository::new(db_client.clone()),
        ConnectionRegistry::new(),
    ));
    let sinks = build_sinks(&config, &writer).await?;
    info!("Publisher delivering to {} sink(s)", sinks.len());
    let (publisher, worker) = channel(&config.publisher, sinks);

    #[cfg(feature = "gcal")]
    let gcal_state = build_gcal_state(&config, &db_client, &publisher)?;

    let builder = AppState::builder(
        config,
        db_client,
        publisher,
        Arc::new(NotificationState { writer }),
    );
    #[cfg(feature = "gcal")]
    let builder = builder.with_gcal_state(gcal_state);

    Ok((builder.build(), worker))
}

async fn build_sinks(
    config: &AppConfig,
    writer: &Writer,
) -> Result<Vec<Arc<dyn MessageSink>>, HuddleError> {
    #[allow(unused_mut)] // for the features it needs to be mutable
    let mut sinks: Vec<Arc<dyn MessageSink>> = vec![Arc::new(NotificationSink::new(writer.clone()))];

    if config.use_sqs {
        #[cfg(feature = "sqs")]
        {
            sinks.push(Arc::new(huddle_events::SqsSink::from_config(&config.publisher).await?));
        }
        #[cfg(not(feature = "sqs"))]
        {
            warn!("use_sqs is set but the backend was built without the sqs feature");
        }
    }

    Ok(sinks)
}

#[cfg(feature = "gcal")]
fn build_gcal_state(
    config: &AppConfig,
    db_client: &DbClient,
    publisher: &EventPublisher,
) -> Result<Option<Arc<GcalState>>, HuddleError> {
    if !config.use_gcal {
        info!("Google Calendar routes disabled");
        return Ok(None);
    }
    let Some(google) = config.google.clone() else {
        warn!("use_gcal is set but the [google] section is missing, calendar routes disabled");
        return Ok(None);
    };
    let unresolved = google.unresolved_secrets();
    if !unresolved.is_empty() {
        return Err(HuddleError::Config(format!(
            "google.{} must be set before enabling Google Calendar",
            unresolved.join(" and google.")
        )));
    }

    let state_secret = google.state_secret.clone();
    let tokens = Arc::new(
        TokenRefresher::new(
            Arc::new(SqlTokenStore::new(db_client.clone())),
            Arc::new(GoogleOAuthProvider::new(google)),
            &config.tokens,
        )
        .with_publisher(publisher.clone())
        .with_state_secret(state_secret),
    );

    let calendars = Arc::new(
        CalendarSyncService::new(
            tokens.clone(),
            SqlCalendarRepository::new(db_client.clone()),
            Arc::new(GoogleCalendarProvider::new(create_http_client()?)),
            config.gcal.clone().unwrap_or_default(),
        )
        .with_publisher(publisher.clone()),
    );

    info!(
        "Google Calendar ready (refresh margin {}s)",
        tokens.margin().num_seconds()
    );
    Ok(Some(Arc::new(GcalState { tokens, calendars })))
}
