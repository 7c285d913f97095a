//! Domain event intake.
//!
//! Studio services publish domain events (`booking.created`,
//! `gallery.delivered`, ...) to the events stream; the worker feeds them
//! to the trigger dispatcher.

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// Stream name for domain events.
pub const EVENTS_STREAM_NAME: &str = "DARKROOM_EVENTS";

/// Subject domain events are published under.
pub const EVENTS_SUBJECT: &str = "darkroom.events.>";

/// Durable consumer name for the trigger dispatcher.
pub const EVENTS_CONSUMER_NAME: &str = "darkroom-trigger-dispatcher";

/// A domain event as carried on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DomainEvent {
    /// The event name, e.g. `booking.created`.
    pub event: String,
    /// Event payload handed to runs as their trigger payload.
    #[serde(default)]
    pub payload: JsonValue,
    /// When set, matched workflows run without side effects or delays.
    #[serde(default)]
    pub dry_run: bool,
}
