//! Amazon SQS sink.
//!
//! Publishes the JSON envelope as the message body. FIFO queues (URL ending
//! in `.fifo`) are grouped by message type and deduplicated by message id.

use aws_sdk_sqs::error::DisplayErrorContext;
use aws_sdk_sqs::Client;
use huddle_common::{external_service_error, BoxFuture, HuddleError, MessageSink, PublishMessageRequest};
use huddle_config::PublisherConfig;
use tracing::{debug, info};

pub struct SqsSink {
    client: Client,
    queue_url: String,
    fifo: bool,
}

impl SqsSink {
    pub fn new(client: Client, queue_url: String) -> Self {
        let fifo = queue_url.ends_with(".fifo");
        Self {
            client,
            queue_url,
            fifo,
        }
    }

    /// Builds a client from the default AWS credential chain.
    pub async fn from_config(config: &PublisherConfig) -> Result<Self, HuddleError> {
        let queue_url = config.queue_url.clone().ok_or_else(|| {
            HuddleError::Config("publisher.queue_url is required for the SQS sink".to_string())
        })?;

        let mut loader = aws_config::defaults(aws_config::BehaviorVersion::latest());
        if let Some(region) = &config.region {
            loader = loader.region(aws_config::Region::new(region.clone()));
        }
        let sdk_config = loader.load().await;

        info!("SQS sink publishing to {}", queue_url);
        Ok(Self::new(Client::new(&sdk_config), queue_url))
    }
}

impl MessageSink for SqsSink {
    fn name(&self) -> &str {
        "sqs"
    }

    fn deliver<'a>(&'a self, message: &'a PublishMessageRequest) -> BoxFuture<'a, (), HuddleError> {
        Box::pin(async move {
            let body = serde_json::to_string(message)?;

            let mut request = self
                .client
                .send_message()
                .queue_url(&self.queue_url)
                .message_body(body);
            if self.fifo {
                request = request
                    .message_group_id(&message.message_type)
                    .message_deduplication_id(message.message_id.to_string());
            }

            let output = request
                .send()
                .await
                .map_err(|e| external_service_error("sqs", None, DisplayErrorContext(&e)))?;

            debug!(
                "SQS accepted message {} as {:?}",
                message.message_id,
                output.message_id()
            );
            Ok(())
        })
    }
}
