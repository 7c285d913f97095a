//! Error types for the actions crate.

use std::fmt;

/// Errors from action providers (email, galleries, calendar, webhooks).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderError {
    /// The payload lacks a field the action needs.
    MissingField { field: String },
    /// The downstream service rejected or never received the request.
    DeliveryFailed { reason: String },
    /// A webhook endpoint answered with a non-success status.
    WebhookStatus { url: String, status: u16 },
}

impl fmt::Display for ProviderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingField { field } => {
                write!(f, "payload is missing required field '{field}'")
            }
            Self::DeliveryFailed { reason } => {
                write!(f, "delivery failed: {reason}")
            }
            Self::WebhookStatus { url, status } => {
                write!(f, "webhook {url} answered with status {status}")
            }
        }
    }
}

impl std::error::Error for ProviderError {}
