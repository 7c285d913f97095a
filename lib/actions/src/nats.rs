//! NATS-backed providers.
//!
//! The workflow worker performs no side effect itself; it publishes
//! domain commands that the studio's service processes pick up. Each
//! provider trait maps to one command subject on a durable stream.

use crate::error::ProviderError;
use crate::providers::{AdminNotifier, CalendarService, EmailSender, NewCalendarEvent, GalleryService};
use async_nats::jetstream;
use async_trait::async_trait;
use darkroom_engine::envelope::Envelope;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// Stream name for domain commands.
const COMMANDS_STREAM_NAME: &str = "DARKROOM_COMMANDS";

const EMAIL_SUBJECT: &str = "darkroom.commands.email.send";
const GALLERY_STATUS_SUBJECT: &str = "darkroom.commands.gallery.set_status";
const GALLERY_CREATE_SUBJECT: &str = "darkroom.commands.gallery.create";
const CALENDAR_SUBJECT: &str = "darkroom.commands.calendar.create_event";
const OPS_NOTIFY_SUBJECT: &str = "darkroom.ops.notify";

/// A side-effect command published for the studio services.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DomainCommand {
    SendEmail {
        template_key: String,
        to: String,
        payload: JsonValue,
    },
    SetGalleryStatus {
        gallery_id: String,
        new_status: String,
    },
    CreateGallery {
        name: String,
    },
    CreateCalendarEvent(NewCalendarEvent),
    NotifyOperators {
        message: String,
    },
}

/// Publishes domain commands over NATS JetStream.
pub struct NatsCommandPublisher {
    jetstream: jetstream::Context,
}

impl NatsCommandPublisher {
    /// Wraps a JetStream context, ensuring the commands stream exists.
    ///
    /// # Errors
    ///
    /// Returns an error if the stream setup fails.
    pub async fn new(jetstream: jetstream::Context) -> Result<Self, ProviderError> {
        let stream_config = jetstream::stream::Config {
            name: COMMANDS_STREAM_NAME.to_string(),
            subjects: vec![
                "darkroom.commands.>".to_string(),
                OPS_NOTIFY_SUBJECT.to_string(),
            ],
            storage: jetstream::stream::StorageType::File,
            retention: jetstream::stream::RetentionPolicy::WorkQueue,
            ..Default::default()
        };

        jetstream
            .get_or_create_stream(stream_config)
            .await
            .map_err(|e| ProviderError::DeliveryFailed {
                reason: format!("failed to create commands stream: {e}"),
            })?;

        Ok(Self { jetstream })
    }

    async fn publish(
        &self,
        subject: &'static str,
        command: DomainCommand,
    ) -> Result<(), ProviderError> {
        let bytes = Envelope::new(command).to_json_bytes().map_err(|e| {
            ProviderError::DeliveryFailed {
                reason: format!("failed to serialize command: {e}"),
            }
        })?;

        self.jetstream
            .publish(subject, bytes.into())
            .await
            .map_err(|e| ProviderError::DeliveryFailed {
                reason: e.to_string(),
            })?
            .await
            .map_err(|e| ProviderError::DeliveryFailed {
                reason: e.to_string(),
            })?;

        Ok(())
    }
}

#[async_trait]
impl EmailSender for NatsCommandPublisher {
    async fn send_template(
        &self,
        template_key: &str,
        to: &str,
        payload: &JsonValue,
    ) -> Result<(), ProviderError> {
        self.publish(
            EMAIL_SUBJECT,
            DomainCommand::SendEmail {
                template_key: template_key.to_string(),
                to: to.to_string(),
                payload: payload.clone(),
            },
        )
        .await
    }
}

#[async_trait]
impl GalleryService for NatsCommandPublisher {
    async fn set_status(&self, gallery_id: &str, new_status: &str) -> Result<(), ProviderError> {
        self.publish(
            GALLERY_STATUS_SUBJECT,
            DomainCommand::SetGalleryStatus {
                gallery_id: gallery_id.to_string(),
                new_status: new_status.to_string(),
            },
        )
        .await
    }

    async fn create(&self, name: &str) -> Result<(), ProviderError> {
        self.publish(
            GALLERY_CREATE_SUBJECT,
            DomainCommand::CreateGallery {
                name: name.to_string(),
            },
        )
        .await
    }
}

#[async_trait]
impl CalendarService for NatsCommandPublisher {
    async fn create_event(&self, event: NewCalendarEvent) -> Result<(), ProviderError> {
        self.publish(CALENDAR_SUBJECT, DomainCommand::CreateCalendarEvent(event))
            .await
    }
}

#[async_trait]
impl AdminNotifier for NatsCommandPublisher {
    async fn notify(&self, message: &str) -> Result<(), ProviderError> {
        self.publish(
            OPS_NOTIFY_SUBJECT,
            DomainCommand::NotifyOperators {
                message: message.to_string(),
            },
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_serde_is_tagged() {
        let command = DomainCommand::SetGalleryStatus {
            gallery_id: "gal_1".to_string(),
            new_status: "delivered".to_string(),
        };
        let json = serde_json::to_value(&command).expect("serialize");
        assert_eq!(json["type"], "set_gallery_status");
        let parsed: DomainCommand = serde_json::from_value(json).expect("deserialize");
        assert_eq!(parsed, command);
    }
}
