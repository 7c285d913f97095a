//! Recipient resolution for email actions.
//!
//! Selectors map onto conventional payload fields produced by the
//! studio's domain events. Resolution never fails: a selector that
//! finds no usable addresses resolves to an empty list and the action
//! quietly sends nothing.

use darkroom_engine::node::RecipientSelector;
use serde_json::Value as JsonValue;

/// Resolves a selector to concrete email addresses.
#[must_use]
pub fn resolve(
    selector: &RecipientSelector,
    payload: &JsonValue,
    admin_email: &str,
) -> Vec<String> {
    match selector {
        RecipientSelector::GalleryContact => field_addresses(payload, "email"),
        RecipientSelector::BookingContact => field_addresses(payload, "contact_email"),
        RecipientSelector::LinkedClients => field_addresses(payload, "client_emails"),
        RecipientSelector::Requester => field_addresses(payload, "requester_email"),
        RecipientSelector::Admin => clean(vec![admin_email.to_string()]),
        RecipientSelector::Custom { list } => {
            clean(list.split(',').map(str::to_string).collect())
        }
    }
}

/// Reads a payload field as either a single address or an array of
/// addresses.
fn field_addresses(payload: &JsonValue, field: &str) -> Vec<String> {
    let addresses = match payload.get(field) {
        Some(JsonValue::String(s)) => vec![s.clone()],
        Some(JsonValue::Array(items)) => items
            .iter()
            .filter_map(|item| item.as_str().map(str::to_string))
            .collect(),
        _ => Vec::new(),
    };
    clean(addresses)
}

fn clean(addresses: Vec<String>) -> Vec<String> {
    addresses
        .into_iter()
        .map(|a| a.trim().to_string())
        .filter(|a| !a.is_empty())
        .collect()
}
