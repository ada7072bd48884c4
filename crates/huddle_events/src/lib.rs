//! Fire-and-forget publishing of domain events.
//!
//! [`EventPublisher`] is the cheap, cloneable handle request handlers hold.
//! [`PublisherWorker`] is the background task that delivers every message to
//! the registered [`MessageSink`](huddle_common::MessageSink)s.

pub mod publisher;
#[cfg(feature = "sqs")]
pub mod sqs;

pub use publisher::{channel, EventPublisher, PublisherWorker, RetryPolicy};
#[cfg(feature = "sqs")]
pub use sqs::SqsSink;
