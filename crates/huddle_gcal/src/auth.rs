// File: crates/huddle_gcal/src/auth.rs
use google_calendar3::{
    common::Client as HubClient,
    hyper_rustls::{self, HttpsConnectorBuilder},
    hyper_util::client::legacy::connect::HttpConnector,
    hyper_util::client::legacy::Client,
    CalendarHub,
};

use crate::service::GcalServiceError;

// Type aliases for clarity
type Connector = hyper_rustls::HttpsConnector<HttpConnector>;

pub type HubType = CalendarHub<Connector>;
pub type HttpClient = HubClient<Connector>;

/// Builds the HTTPS client shared by every per-member hub.
pub fn create_http_client() -> Result<HttpClient, GcalServiceError> {
    let https = HttpsConnectorBuilder::new()
        .with_native_roots()
        .map_err(|e| GcalServiceError::Setup(format!("native TLS roots: {e}")))?
        .https_or_http()
        .enable_http1()
        .build();

    Ok(Client::builder(hyper_util::rt::TokioExecutor::new()).build(https))
}

/// Calendar hub acting as one member, authenticated with their access token.
pub fn create_calendar_hub(client: &HttpClient, access_token: &str) -> HubType {
    CalendarHub::new(client.clone(), access_token.to_string())
}
