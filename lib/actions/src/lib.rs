//! Action dispatch for darkroom workflows.
//!
//! This crate provides:
//!
//! - **StudioActionDispatcher**: the production [`ActionDispatcher`]
//!   behind the engine's action nodes
//! - **Provider traits**: email, gallery, calendar, and operator
//!   notification seams
//! - **NATS providers**: implementations that publish domain commands
//!   for the studio services
//! - **Template substitution**: flat `{fieldName}` rendering against
//!   trigger payloads
//!
//! [`ActionDispatcher`]: darkroom_engine::action::ActionDispatcher

pub mod dispatcher;
pub mod error;
pub mod nats;
pub mod providers;
pub mod recipient;
pub mod template;
pub mod webhook;

pub use dispatcher::StudioActionDispatcher;
pub use error::ProviderError;
pub use nats::NatsCommandPublisher;
pub use webhook::HttpWebhookTransport;
