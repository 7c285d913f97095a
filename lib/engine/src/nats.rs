//! NATS JetStream transport for step invocations.
//!
//! Step invocations travel through a work-queue stream, so each message
//! is delivered to exactly one worker and acked away once processed.

use crate::envelope::Envelope;
use crate::queue::{QueueError, StepInvocation, StepQueue};
use async_nats::jetstream;
use async_trait::async_trait;

/// Stream name for step invocations.
const STEPS_STREAM_NAME: &str = "DARKROOM_STEPS";

/// Subject step invocations are published to.
const STEPS_SUBJECT: &str = "darkroom.steps.invoke";

/// Durable consumer name used by workers.
pub const STEPS_CONSUMER_NAME: &str = "darkroom-step-worker";

/// Configuration for the NATS step queue.
#[derive(Debug, Clone)]
pub struct NatsConfig {
    /// NATS server URL.
    pub url: String,
    /// Stream name override (defaults to DARKROOM_STEPS).
    pub steps_stream_name: Option<String>,
}

impl NatsConfig {
    /// Creates a new config with the given NATS URL.
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            steps_stream_name: None,
        }
    }

    fn steps_stream(&self) -> &str {
        self.steps_stream_name
            .as_deref()
            .unwrap_or(STEPS_STREAM_NAME)
    }
}

/// NATS JetStream-backed step queue.
pub struct NatsStepQueue {
    jetstream: jetstream::Context,
    config: NatsConfig,
}

impl NatsStepQueue {
    /// Connects to NATS and ensures the steps stream exists.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection or stream setup fails.
    pub async fn new(config: NatsConfig) -> Result<Self, QueueError> {
        let client = async_nats::connect(&config.url).await.map_err(|e| {
            QueueError::ConnectionFailed {
                message: e.to_string(),
            }
        })?;

        let jetstream = jetstream::new(client);
        Self::ensure_stream(&jetstream, &config).await?;

        Ok(Self { jetstream, config })
    }

    /// Wraps an existing JetStream context, ensuring the stream exists.
    ///
    /// # Errors
    ///
    /// Returns an error if the stream setup fails.
    pub async fn from_jetstream(
        jetstream: jetstream::Context,
        config: NatsConfig,
    ) -> Result<Self, QueueError> {
        Self::ensure_stream(&jetstream, &config).await?;
        Ok(Self { jetstream, config })
    }

    async fn ensure_stream(
        jetstream: &jetstream::Context,
        config: &NatsConfig,
    ) -> Result<(), QueueError> {
        let stream_config = jetstream::stream::Config {
            name: config.steps_stream().to_string(),
            subjects: vec![STEPS_SUBJECT.to_string()],
            storage: jetstream::stream::StorageType::File,
            retention: jetstream::stream::RetentionPolicy::WorkQueue,
            ..Default::default()
        };

        jetstream
            .get_or_create_stream(stream_config)
            .await
            .map_err(|e| QueueError::ConnectionFailed {
                message: format!("failed to create steps stream: {e}"),
            })?;

        Ok(())
    }

    /// Returns a durable pull consumer for worker loops.
    ///
    /// # Errors
    ///
    /// Returns an error if the stream or consumer cannot be reached.
    pub async fn consumer(
        &self,
    ) -> Result<jetstream::consumer::Consumer<jetstream::consumer::pull::Config>, QueueError> {
        let stream = self
            .jetstream
            .get_stream(self.config.steps_stream())
            .await
            .map_err(|e| QueueError::ConnectionFailed {
                message: format!("failed to get steps stream: {e}"),
            })?;

        stream
            .get_or_create_consumer(
                STEPS_CONSUMER_NAME,
                jetstream::consumer::pull::Config {
                    durable_name: Some(STEPS_CONSUMER_NAME.to_string()),
                    ..Default::default()
                },
            )
            .await
            .map_err(|e| QueueError::ConnectionFailed {
                message: format!("failed to create steps consumer: {e}"),
            })
    }
}

#[async_trait]
impl StepQueue for NatsStepQueue {
    async fn publish(&self, invocation: Envelope<StepInvocation>) -> Result<(), QueueError> {
        let bytes = invocation
            .to_json_bytes()
            .map_err(|e| QueueError::PublishFailed {
                message: format!("failed to serialize invocation: {e}"),
            })?;

        self.jetstream
            .publish(STEPS_SUBJECT, bytes.into())
            .await
            .map_err(|e| QueueError::PublishFailed {
                message: e.to_string(),
            })?
            .await
            .map_err(|e| QueueError::PublishFailed {
                message: e.to_string(),
            })?;

        Ok(())
    }
}
