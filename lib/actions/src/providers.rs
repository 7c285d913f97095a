//! Provider traits for action side effects.
//!
//! The dispatcher talks to these seams; the worker binary wires in the
//! NATS-backed implementations from [`crate::nats`].

use crate::error::ProviderError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// A calendar event an action wants created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewCalendarEvent {
    pub title: String,
    pub description: String,
    pub duration_minutes: u32,
}

/// Sends templated emails.
#[async_trait]
pub trait EmailSender: Send + Sync {
    /// Sends the template to one address, with the payload as template
    /// context.
    async fn send_template(
        &self,
        template_key: &str,
        to: &str,
        payload: &JsonValue,
    ) -> Result<(), ProviderError>;
}

/// Gallery lifecycle operations.
#[async_trait]
pub trait GalleryService: Send + Sync {
    /// Moves a gallery to a new status.
    async fn set_status(&self, gallery_id: &str, new_status: &str) -> Result<(), ProviderError>;

    /// Creates a new gallery.
    async fn create(&self, name: &str) -> Result<(), ProviderError>;
}

/// Calendar operations.
#[async_trait]
pub trait CalendarService: Send + Sync {
    async fn create_event(&self, event: NewCalendarEvent) -> Result<(), ProviderError>;
}

/// Delivers messages to the studio operators.
#[async_trait]
pub trait AdminNotifier: Send + Sync {
    async fn notify(&self, message: &str) -> Result<(), ProviderError>;
}
