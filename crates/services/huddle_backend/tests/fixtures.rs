//! Shared setup for backend integration tests

#![allow(dead_code)]

use std::sync::Arc;

use axum::body::{to_bytes, Body};
use axum::http::{Method, Request, Response};
use huddle_backend::AppState;
use huddle_config::{AppConfig, PublisherConfig};
use huddle_db::{init_schemas, DbClient, SqlNotificationRepository};
use huddle_events::{channel, PublisherWorker};
use huddle_notifications::{ConnectionRegistry, NotificationState, NotificationWriter};

/// State over an in-memory database, without the calendar routes.
pub async fn state() -> (AppState, PublisherWorker) {
    let db_client = DbClient::from_url("sqlite::memory:")
        .await
        .expect("in-memory database");
    init_schemas(&db_client).await.expect("schema");

    let writer = Arc::new(NotificationWriter::new(
        SqlNotificationRepository::new(db_client.clone()),
        ConnectionRegistry::new(),
    ));
    let (publisher, worker) = channel(&PublisherConfig::default(), Vec::new());
    let state = AppState::builder(
        Arc::new(AppConfig::default()),
        db_client,
        publisher,
        Arc::new(NotificationState { writer }),
    )
    .build();
    (state, worker)
}

pub fn request(method: Method, uri: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::empty())
        .expect("request")
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    serde_json::from_slice(&bytes).expect("json body")
}
