//! The action dispatch seam.
//!
//! The executor hands action node configs to an `ActionDispatcher` and
//! never touches SMTP, HTTP, or domain services itself. The production
//! dispatcher lives in the `darkroom-actions` crate.

use crate::node::ActionConfig;
use async_trait::async_trait;
use serde_json::Value as JsonValue;
use std::fmt;
use std::sync::Mutex;

/// An action dispatch failure, carried into the run's error message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionDispatchError {
    /// The action name, e.g. `send_email`.
    pub action: &'static str,
    pub message: String,
}

impl ActionDispatchError {
    #[must_use]
    pub fn new(action: &'static str, message: impl Into<String>) -> Self {
        Self {
            action,
            message: message.into(),
        }
    }
}

impl fmt::Display for ActionDispatchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.action, self.message)
    }
}

impl std::error::Error for ActionDispatchError {}

/// Performs the side effect an action node describes.
#[async_trait]
pub trait ActionDispatcher: Send + Sync {
    /// Dispatches one action against a run's trigger payload.
    async fn dispatch(
        &self,
        action: &ActionConfig,
        payload: &JsonValue,
    ) -> Result<(), ActionDispatchError>;
}

/// A dispatcher that records actions instead of performing them.
///
/// Can be configured to fail, for exercising failure paths.
#[derive(Default)]
pub struct RecordingDispatcher {
    dispatched: Mutex<Vec<(String, JsonValue)>>,
    /// If set, all dispatches fail with this message.
    pub fail_with: Option<String>,
}

impl RecordingDispatcher {
    /// Creates a dispatcher where every action succeeds.
    #[must_use]
    pub fn succeeding() -> Self {
        Self::default()
    }

    /// Creates a dispatcher where every action fails.
    #[must_use]
    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            dispatched: Mutex::new(Vec::new()),
            fail_with: Some(message.into()),
        }
    }

    /// Returns the recorded (action kind, payload) pairs.
    #[must_use]
    pub fn dispatched(&self) -> Vec<(String, JsonValue)> {
        self.dispatched.lock().unwrap().clone()
    }
}

#[async_trait]
impl ActionDispatcher for RecordingDispatcher {
    async fn dispatch(
        &self,
        action: &ActionConfig,
        payload: &JsonValue,
    ) -> Result<(), ActionDispatchError> {
        if let Some(message) = &self.fail_with {
            return Err(ActionDispatchError::new(action.kind(), message.clone()));
        }
        self.dispatched
            .lock()
            .unwrap()
            .push((action.kind().to_string(), payload.clone()));
        Ok(())
    }
}
