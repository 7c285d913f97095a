//! Workflow node types and configurations.
//!
//! Nodes are the building blocks of workflows. Each node has:
//! - A unique ID within the workflow
//! - A kind (Trigger, Action, Delay, Condition, End)
//! - Configuration specific to its kind

use crate::condition::ConditionConfig;
use serde::{Deserialize, Serialize};
use ulid::Ulid;

/// A unique identifier for a node within a workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(Ulid);

impl NodeId {
    /// Creates a new random node ID.
    #[must_use]
    pub fn new() -> Self {
        Self(Ulid::new())
    }

    /// Creates a node ID from a ULID.
    #[must_use]
    pub const fn from_ulid(ulid: Ulid) -> Self {
        Self(ulid)
    }
}

impl Default for NodeId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "node_{}", self.0)
    }
}

impl std::str::FromStr for NodeId {
    type Err = ulid::DecodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let raw = s.strip_prefix("node_").unwrap_or(s);
        Ok(Self(Ulid::from_string(raw)?))
    }
}

/// The kind of a workflow node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    /// Entry point that starts a run when its event fires.
    Trigger,
    /// Performs a side effect (email, webhook, domain command).
    Action,
    /// Suspends the run for a wall-clock duration.
    Delay,
    /// Evaluates a predicate against the trigger payload and branches.
    Condition,
    /// Terminal node; the run succeeds on reaching it.
    End,
    /// A node type this engine version does not recognize.
    Unknown,
}

impl NodeKind {
    /// Returns the snake_case name used in traces and logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Trigger => "trigger",
            Self::Action => "action",
            Self::Delay => "delay",
            Self::Condition => "condition",
            Self::End => "end",
            Self::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for NodeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// HTTP methods supported by webhook actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    Get,
    #[default]
    Post,
    Put,
    Patch,
    Delete,
}

impl HttpMethod {
    /// GET requests never carry a body.
    #[must_use]
    pub const fn allows_body(self) -> bool {
        !matches!(self, Self::Get)
    }
}

impl std::fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Patch => "PATCH",
            Self::Delete => "DELETE",
        };
        f.write_str(name)
    }
}

/// Selects which addresses an email action is delivered to.
///
/// Resolution happens against the run's trigger payload at dispatch time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RecipientSelector {
    /// The `email` field of the payload.
    GalleryContact,
    /// The `contact_email` field of the payload.
    BookingContact,
    /// The `client_emails` field of the payload (array or single address).
    LinkedClients,
    /// The `requester_email` field of the payload.
    Requester,
    /// The studio's configured admin address.
    Admin,
    /// A fixed comma-separated list of addresses.
    Custom { list: String },
}

/// Configuration for action nodes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ActionConfig {
    /// Send a templated email to resolved recipients.
    SendEmail {
        /// Key of the email template to render.
        template_key: String,
        /// Who receives the email.
        recipients: RecipientSelector,
    },
    /// Deliver the payload (or a templated body) to an external URL.
    SendWebhook {
        url: String,
        #[serde(default)]
        method: HttpMethod,
        /// Optional body template; when absent the raw payload is sent.
        #[serde(default)]
        body: Option<String>,
    },
    /// Move a gallery to a new status.
    UpdateGalleryStatus { new_status: String },
    /// Create a calendar event, with templated title and description.
    CreateCalendarEvent {
        title: String,
        description: String,
        duration_minutes: u32,
    },
    /// Create a new gallery with a templated name.
    CreateGallery { name: String },
    /// Send a templated message to the studio operators.
    NotifyAdmin { message: String },
}

impl ActionConfig {
    /// Returns the snake_case action name used in traces and logs.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::SendEmail { .. } => "send_email",
            Self::SendWebhook { .. } => "send_webhook",
            Self::UpdateGalleryStatus { .. } => "update_gallery_status",
            Self::CreateCalendarEvent { .. } => "create_calendar_event",
            Self::CreateGallery { .. } => "create_gallery",
            Self::NotifyAdmin { .. } => "notify_admin",
        }
    }
}

/// Units for delay durations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum DelayUnit {
    Minutes,
    #[default]
    Hours,
    Days,
}

/// Configuration for delay nodes.
///
/// An unconfigured delay defaults to one hour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DelayConfig {
    #[serde(default = "default_delay_value")]
    pub value: u32,
    #[serde(default)]
    pub unit: DelayUnit,
}

const fn default_delay_value() -> u32 {
    1
}

impl Default for DelayConfig {
    fn default() -> Self {
        Self {
            value: default_delay_value(),
            unit: DelayUnit::default(),
        }
    }
}

impl DelayConfig {
    /// Returns the configured delay as a duration.
    #[must_use]
    pub fn duration(&self) -> chrono::Duration {
        let value = i64::from(self.value);
        match self.unit {
            DelayUnit::Minutes => chrono::Duration::minutes(value),
            DelayUnit::Hours => chrono::Duration::hours(value),
            DelayUnit::Days => chrono::Duration::days(value),
        }
    }
}

/// Node configuration, tagged by node kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum NodeConfig {
    /// Entry point; carries no configuration of its own. The matching
    /// event name lives on the workflow definition.
    Trigger,
    /// A side-effecting action.
    Action(ActionConfig),
    /// A wall-clock delay.
    Delay(#[serde(default)] DelayConfig),
    /// A payload predicate that branches on true/false edges.
    Condition(ConditionConfig),
    /// Terminal node.
    End,
    /// A node type saved by a newer builder. Deserializes cleanly so
    /// the rest of the definition stays readable; executing it fails
    /// the run with a descriptive error.
    #[serde(other, skip_serializing)]
    Unknown,
}

impl NodeConfig {
    /// Returns the kind this configuration belongs to.
    #[must_use]
    pub const fn kind(&self) -> NodeKind {
        match self {
            Self::Trigger => NodeKind::Trigger,
            Self::Action(_) => NodeKind::Action,
            Self::Delay(_) => NodeKind::Delay,
            Self::Condition(_) => NodeKind::Condition,
            Self::End => NodeKind::End,
            Self::Unknown => NodeKind::Unknown,
        }
    }
}

/// A node in a workflow graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    /// Unique ID within the workflow.
    pub id: NodeId,
    /// Human-readable name shown in the builder.
    pub name: String,
    /// Kind-specific configuration.
    pub config: NodeConfig,
}

impl Node {
    /// Creates a new node with a fresh ID.
    #[must_use]
    pub fn new(name: impl Into<String>, config: NodeConfig) -> Self {
        Self {
            id: NodeId::new(),
            name: name.into(),
            config,
        }
    }

    /// Returns the node's kind.
    #[must_use]
    pub const fn kind(&self) -> NodeKind {
        self.config.kind()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::condition::ConditionOperator;
    use serde_json::json;

    #[test]
    fn node_id_display_roundtrip() {
        let id = NodeId::new();
        let shown = id.to_string();
        assert!(shown.starts_with("node_"));
        let parsed: NodeId = shown.parse().expect("parse");
        assert_eq!(parsed, id);
    }

    #[test]
    fn node_config_kind_matches_variant() {
        assert_eq!(NodeConfig::Trigger.kind(), NodeKind::Trigger);
        assert_eq!(NodeConfig::End.kind(), NodeKind::End);
        assert_eq!(
            NodeConfig::Delay(DelayConfig::default()).kind(),
            NodeKind::Delay
        );
    }

    #[test]
    fn delay_config_defaults_to_one_hour() {
        let config: DelayConfig = serde_json::from_value(json!({})).expect("deserialize");
        assert_eq!(config.value, 1);
        assert_eq!(config.unit, DelayUnit::Hours);
        assert_eq!(config.duration(), chrono::Duration::hours(1));
    }

    #[test]
    fn delay_duration_math() {
        let config = DelayConfig {
            value: 2,
            unit: DelayUnit::Hours,
        };
        assert_eq!(config.duration().num_milliseconds(), 7_200_000);

        let config = DelayConfig {
            value: 3,
            unit: DelayUnit::Days,
        };
        assert_eq!(config.duration(), chrono::Duration::days(3));
    }

    #[test]
    fn action_config_tagged_serde() {
        let config = ActionConfig::SendEmail {
            template_key: "booking_confirmed".to_string(),
            recipients: RecipientSelector::BookingContact,
        };
        let json = serde_json::to_value(&config).expect("serialize");
        assert_eq!(json["action"], "send_email");
        assert_eq!(json["recipients"]["type"], "booking_contact");

        let parsed: ActionConfig = serde_json::from_value(json).expect("deserialize");
        assert_eq!(parsed, config);
    }

    #[test]
    fn unrecognized_node_type_deserializes_as_unknown() {
        let node: Node = serde_json::from_value(json!({
            "id": NodeId::new(),
            "name": "Enrich with AI",
            "config": {"type": "ai_enrich", "model": "large"},
        }))
        .expect("newer node types must still deserialize");
        assert_eq!(node.config, NodeConfig::Unknown);
        assert_eq!(node.kind(), NodeKind::Unknown);
    }

    #[test]
    fn webhook_method_defaults_to_post() {
        let config: ActionConfig = serde_json::from_value(json!({
            "action": "send_webhook",
            "url": "https://example.com/hook",
        }))
        .expect("deserialize");
        let ActionConfig::SendWebhook { method, body, .. } = config else {
            panic!("expected webhook config");
        };
        assert_eq!(method, HttpMethod::Post);
        assert!(body.is_none());
    }

    #[test]
    fn node_config_serde_roundtrip() {
        let node = Node::new(
            "Check booking type",
            NodeConfig::Condition(ConditionConfig {
                field: "booking.type".to_string(),
                operator: ConditionOperator::Equals,
                value: json!("wedding"),
            }),
        );
        let json = serde_json::to_string(&node).expect("serialize");
        let parsed: Node = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(parsed, node);
    }
}
