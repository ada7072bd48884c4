// --- File: crates/services/huddle_backend/src/lib.rs ---

pub mod app_state; // Shared state and its builder
pub mod health; // Health endpoint
pub mod service_factory; // Wiring from configuration

use axum::{routing::get, Router};
use tower_http::trace::TraceLayer;

pub use app_state::{AppState, AppStateBuilder};

/// Builds the full HTTP surface, nested under `/api`.
pub fn app(state: AppState) -> Router {
    let api_router = Router::new()
        .route("/", get(|| async { "Welcome to Huddle API!" }))
        .route("/health", get(health::health_handler))
        .with_state(state.clone());

    #[allow(unused_mut)] // for the features it needs to be mutable
    let mut router =
        api_router.merge(huddle_notifications::routes::routes(state.notifications.clone()));
    #[cfg(feature = "gcal")]
    if let Some(gcal_state) = &state.gcal_state {
        router = router.merge(huddle_gcal::routes::routes(gcal_state.clone()));
    }

    Router::new()
        .nest("/api", router)
        .layer(TraceLayer::new_for_http())
}
