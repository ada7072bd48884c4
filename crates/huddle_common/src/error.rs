use serde::Serialize;
use std::fmt;
use thiserror::Error;

use crate::models::ServiceType;

/// One rejected item of a batch operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ItemFailure {
    pub item: String,
    pub reason: String,
}

/// The base error type for all Huddle errors.
///
/// Crate-local errors (`DbError`, provider errors) convert into this type so
/// that services and handlers share one taxonomy.
#[derive(Error, Debug)]
pub enum HuddleError {
    /// No stored token: the member must start the OAuth flow.
    #[error("Authorization required for member {member_id} ({service_type})")]
    AuthorizationRequired {
        member_id: i64,
        service_type: ServiceType,
    },

    /// The refresh token is invalid or revoked: the member must re-consent.
    #[error("Reauthorization required for member {member_id} ({service_type}): {reason}")]
    ReauthorizationRequired {
        member_id: i64,
        service_type: ServiceType,
        reason: String,
    },

    /// A provider call failed. `status` carries the provider status when known.
    #[error("External service error: {service} - {message}")]
    ExternalService {
        service: String,
        status: Option<u16>,
        message: String,
    },

    /// A batch operation partially succeeded.
    #[error("Partial failure: {} succeeded, {} failed", succeeded.len(), failed.len())]
    PartialFailure {
        succeeded: Vec<String>,
        failed: Vec<ItemFailure>,
    },

    #[error("Calendar not found: {0}")]
    CalendarNotFound(i64),

    #[error("Notification {notification_id} not found for receiver {receiver_id}")]
    NotificationNotFound {
        notification_id: i64,
        receiver_id: i64,
    },

    /// Error occurred during validation
    #[error("Validation error: {0}")]
    Validation(String),

    /// Error occurred due to a conflict (e.g., resource already exists)
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Error occurred during database operation
    #[error("Database error: {0}")]
    Database(String),

    /// Error occurred due to missing or invalid configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// Error occurred due to an internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

/// A trait for converting errors to HTTP status codes.
pub trait HttpStatusCode {
    /// Returns the HTTP status code for this error.
    fn status_code(&self) -> u16;
}

impl HttpStatusCode for HuddleError {
    fn status_code(&self) -> u16 {
        match self {
            HuddleError::AuthorizationRequired { .. } => 401,
            HuddleError::ReauthorizationRequired { .. } => 401,
            HuddleError::ExternalService { .. } => 502,
            HuddleError::PartialFailure { .. } => 207,
            HuddleError::CalendarNotFound(_) => 404,
            HuddleError::NotificationNotFound { .. } => 404,
            HuddleError::Validation(_) => 400,
            HuddleError::Conflict(_) => 409,
            HuddleError::Database(_) => 500,
            HuddleError::Config(_) => 500,
            HuddleError::Internal(_) => 500,
        }
    }
}

impl From<serde_json::Error> for HuddleError {
    fn from(err: serde_json::Error) -> Self {
        HuddleError::Internal(format!("serialization failed: {err}"))
    }
}

// Utility functions for error handling
pub fn validation_error<T: fmt::Display>(message: T) -> HuddleError {
    HuddleError::Validation(message.to_string())
}

pub fn conflict<T: fmt::Display>(message: T) -> HuddleError {
    HuddleError::Conflict(message.to_string())
}

pub fn external_service_error<T: fmt::Display>(
    service: &str,
    status: Option<u16>,
    message: T,
) -> HuddleError {
    HuddleError::ExternalService {
        service: service.to_string(),
        status,
        message: message.to_string(),
    }
}
