// --- File: crates/huddle_common/src/services.rs ---
//! Service abstractions shared across crates.
//!
//! The publisher worker only knows [`MessageSink`]; the notification writer,
//! the SQS queue and test doubles plug in behind it.

use std::future::Future;
use std::pin::Pin;

use crate::error::HuddleError;
use crate::models::PublishMessageRequest;

/// Type alias for a boxed future that returns a Result
pub type BoxFuture<'a, T, E> = Pin<Box<dyn Future<Output = Result<T, E>> + Send + 'a>>;

/// A downstream consumer of published messages.
///
/// Delivery is at-least-once: implementations must tolerate seeing the same
/// `message_id` more than once.
pub trait MessageSink: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &str;

    /// Deliver one message.
    fn deliver<'a>(&'a self, message: &'a PublishMessageRequest) -> BoxFuture<'a, (), HuddleError>;
}
