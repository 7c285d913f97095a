//! The production action dispatcher.

use crate::error::ProviderError;
use crate::providers::{AdminNotifier, CalendarService, EmailSender, GalleryService, NewCalendarEvent};
use crate::recipient;
use crate::template;
use crate::webhook::WebhookTransport;
use async_trait::async_trait;
use darkroom_engine::action::{ActionDispatchError, ActionDispatcher};
use darkroom_engine::node::{ActionConfig, HttpMethod};
use serde_json::Value as JsonValue;
use std::sync::Arc;

/// Dispatches action nodes to the studio's providers.
///
/// Templated fields (`{fieldName}`) are rendered against the run's
/// trigger payload before delivery.
pub struct StudioActionDispatcher {
    email: Arc<dyn EmailSender>,
    galleries: Arc<dyn GalleryService>,
    calendar: Arc<dyn CalendarService>,
    notifier: Arc<dyn AdminNotifier>,
    webhooks: Arc<dyn WebhookTransport>,
    admin_email: String,
}

impl StudioActionDispatcher {
    #[must_use]
    pub fn new(
        email: Arc<dyn EmailSender>,
        galleries: Arc<dyn GalleryService>,
        calendar: Arc<dyn CalendarService>,
        notifier: Arc<dyn AdminNotifier>,
        webhooks: Arc<dyn WebhookTransport>,
        admin_email: impl Into<String>,
    ) -> Self {
        Self {
            email,
            galleries,
            calendar,
            notifier,
            webhooks,
            admin_email: admin_email.into(),
        }
    }

    async fn perform(
        &self,
        action: &ActionConfig,
        payload: &JsonValue,
    ) -> Result<(), ProviderError> {
        match action {
            ActionConfig::SendEmail {
                template_key,
                recipients,
            } => {
                let addresses = recipient::resolve(recipients, payload, &self.admin_email);
                if addresses.is_empty() {
                    // An empty recipient list is not a failure; the
                    // event simply named nobody to notify.
                    tracing::debug!(template_key, "no recipients resolved, skipping email");
                    return Ok(());
                }
                for address in addresses {
                    self.email
                        .send_template(template_key, &address, payload)
                        .await?;
                }
                Ok(())
            }
            ActionConfig::SendWebhook { url, method, body } => {
                let url = template::render(url, payload);
                let body = if method.allows_body() {
                    match body {
                        Some(template) => Some(template::render(template, payload)),
                        None => Some(payload.to_string()),
                    }
                } else {
                    None
                };
                self.webhooks.deliver(*method, &url, body).await
            }
            ActionConfig::UpdateGalleryStatus { new_status } => {
                let gallery_id = payload
                    .get("gallery_id")
                    .and_then(JsonValue::as_str)
                    .ok_or_else(|| ProviderError::MissingField {
                        field: "gallery_id".to_string(),
                    })?;
                self.galleries.set_status(gallery_id, new_status).await
            }
            ActionConfig::CreateCalendarEvent {
                title,
                description,
                duration_minutes,
            } => {
                self.calendar
                    .create_event(NewCalendarEvent {
                        title: template::render(title, payload),
                        description: template::render(description, payload),
                        duration_minutes: *duration_minutes,
                    })
                    .await
            }
            ActionConfig::CreateGallery { name } => {
                self.galleries.create(&template::render(name, payload)).await
            }
            ActionConfig::NotifyAdmin { message } => {
                self.notifier.notify(&template::render(message, payload)).await
            }
        }
    }
}

#[async_trait]
impl ActionDispatcher for StudioActionDispatcher {
    async fn dispatch(
        &self,
        action: &ActionConfig,
        payload: &JsonValue,
    ) -> Result<(), ActionDispatchError> {
        self.perform(action, payload)
            .await
            .map_err(|e| ActionDispatchError::new(action.kind(), e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use darkroom_engine::node::RecipientSelector;
    use serde_json::json;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recording {
        emails: Mutex<Vec<(String, String)>>,
        gallery_statuses: Mutex<Vec<(String, String)>>,
        galleries_created: Mutex<Vec<String>>,
        events: Mutex<Vec<NewCalendarEvent>>,
        notices: Mutex<Vec<String>>,
        webhooks: Mutex<Vec<(HttpMethod, String, Option<String>)>>,
        fail_email: bool,
    }

    #[async_trait]
    impl EmailSender for Recording {
        async fn send_template(
            &self,
            template_key: &str,
            to: &str,
            _payload: &JsonValue,
        ) -> Result<(), ProviderError> {
            if self.fail_email {
                return Err(ProviderError::DeliveryFailed {
                    reason: "smtp unreachable".to_string(),
                });
            }
            self.emails
                .lock()
                .unwrap()
                .push((template_key.to_string(), to.to_string()));
            Ok(())
        }
    }

    #[async_trait]
    impl GalleryService for Recording {
        async fn set_status(&self, gallery_id: &str, new_status: &str) -> Result<(), ProviderError> {
            self.gallery_statuses
                .lock()
                .unwrap()
                .push((gallery_id.to_string(), new_status.to_string()));
            Ok(())
        }

        async fn create(&self, name: &str) -> Result<(), ProviderError> {
            self.galleries_created.lock().unwrap().push(name.to_string());
            Ok(())
        }
    }

    #[async_trait]
    impl CalendarService for Recording {
        async fn create_event(&self, event: NewCalendarEvent) -> Result<(), ProviderError> {
            self.events.lock().unwrap().push(event);
            Ok(())
        }
    }

    #[async_trait]
    impl AdminNotifier for Recording {
        async fn notify(&self, message: &str) -> Result<(), ProviderError> {
            self.notices.lock().unwrap().push(message.to_string());
            Ok(())
        }
    }

    #[async_trait]
    impl WebhookTransport for Recording {
        async fn deliver(
            &self,
            method: HttpMethod,
            url: &str,
            body: Option<String>,
        ) -> Result<(), ProviderError> {
            self.webhooks
                .lock()
                .unwrap()
                .push((method, url.to_string(), body));
            Ok(())
        }
    }

    fn dispatcher(recording: Arc<Recording>) -> StudioActionDispatcher {
        StudioActionDispatcher::new(
            recording.clone(),
            recording.clone(),
            recording.clone(),
            recording.clone(),
            recording,
            "studio@example.com",
        )
    }

    #[tokio::test]
    async fn send_email_delivers_one_per_recipient() {
        let recording = Arc::new(Recording::default());
        let dispatcher = dispatcher(recording.clone());

        let action = ActionConfig::SendEmail {
            template_key: "gallery_ready".to_string(),
            recipients: RecipientSelector::LinkedClients,
        };
        let payload = json!({"client_emails": ["a@example.com", "b@example.com"]});
        dispatcher.dispatch(&action, &payload).await.expect("dispatch");

        let emails = recording.emails.lock().unwrap().clone();
        assert_eq!(
            emails,
            vec![
                ("gallery_ready".to_string(), "a@example.com".to_string()),
                ("gallery_ready".to_string(), "b@example.com".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn send_email_with_no_recipients_succeeds_quietly() {
        let recording = Arc::new(Recording::default());
        let dispatcher = dispatcher(recording.clone());

        let action = ActionConfig::SendEmail {
            template_key: "gallery_ready".to_string(),
            recipients: RecipientSelector::GalleryContact,
        };
        dispatcher.dispatch(&action, &json!({})).await.expect("dispatch");
        assert!(recording.emails.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn provider_failure_surfaces_as_dispatch_error() {
        let recording = Arc::new(Recording {
            fail_email: true,
            ..Recording::default()
        });
        let dispatcher = dispatcher(recording);

        let action = ActionConfig::SendEmail {
            template_key: "gallery_ready".to_string(),
            recipients: RecipientSelector::Admin,
        };
        let error = dispatcher
            .dispatch(&action, &json!({}))
            .await
            .expect_err("must fail");
        assert_eq!(error.action, "send_email");
        assert!(error.message.contains("smtp unreachable"));
    }

    #[tokio::test]
    async fn webhook_post_sends_raw_payload_by_default() {
        let recording = Arc::new(Recording::default());
        let dispatcher = dispatcher(recording.clone());

        let payload = json!({"booking_id": "bk_1"});
        let action = ActionConfig::SendWebhook {
            url: "https://hooks.example.com/{booking_id}".to_string(),
            method: HttpMethod::Post,
            body: None,
        };
        dispatcher.dispatch(&action, &payload).await.expect("dispatch");

        let webhooks = recording.webhooks.lock().unwrap().clone();
        assert_eq!(webhooks.len(), 1);
        let (method, url, body) = &webhooks[0];
        assert_eq!(*method, HttpMethod::Post);
        assert_eq!(url, "https://hooks.example.com/bk_1");
        assert_eq!(body.as_deref(), Some(payload.to_string().as_str()));
    }

    #[tokio::test]
    async fn webhook_get_omits_body_and_custom_body_is_templated() {
        let recording = Arc::new(Recording::default());
        let dispatcher = dispatcher(recording.clone());

        let action = ActionConfig::SendWebhook {
            url: "https://hooks.example.com/ping".to_string(),
            method: HttpMethod::Get,
            body: Some(r#"{"name": "{name}"}"#.to_string()),
        };
        dispatcher.dispatch(&action, &json!({"name": "Ada"})).await.expect("get");

        let action = ActionConfig::SendWebhook {
            url: "https://hooks.example.com/ping".to_string(),
            method: HttpMethod::Put,
            body: Some(r#"{"name": "{name}"}"#.to_string()),
        };
        dispatcher.dispatch(&action, &json!({"name": "Ada"})).await.expect("put");

        let webhooks = recording.webhooks.lock().unwrap().clone();
        assert_eq!(webhooks[0].2, None);
        assert_eq!(webhooks[1].2.as_deref(), Some(r#"{"name": "Ada"}"#));
    }

    #[tokio::test]
    async fn update_gallery_status_requires_gallery_id() {
        let recording = Arc::new(Recording::default());
        let dispatcher = dispatcher(recording.clone());

        let action = ActionConfig::UpdateGalleryStatus {
            new_status: "delivered".to_string(),
        };

        dispatcher
            .dispatch(&action, &json!({"gallery_id": "gal_9"}))
            .await
            .expect("dispatch");
        assert_eq!(
            recording.gallery_statuses.lock().unwrap().clone(),
            vec![("gal_9".to_string(), "delivered".to_string())]
        );

        let error = dispatcher
            .dispatch(&action, &json!({}))
            .await
            .expect_err("missing gallery_id");
        assert!(error.message.contains("gallery_id"));
    }

    #[tokio::test]
    async fn calendar_and_notify_render_templates() {
        let recording = Arc::new(Recording::default());
        let dispatcher = dispatcher(recording.clone());

        let payload = json!({"client_name": "Ada", "shoot_type": "portrait"});
        dispatcher
            .dispatch(
                &ActionConfig::CreateCalendarEvent {
                    title: "{shoot_type} shoot: {client_name}".to_string(),
                    description: "Prep for {client_name}".to_string(),
                    duration_minutes: 90,
                },
                &payload,
            )
            .await
            .expect("calendar");
        dispatcher
            .dispatch(
                &ActionConfig::NotifyAdmin {
                    message: "New {shoot_type} booking from {client_name}".to_string(),
                },
                &payload,
            )
            .await
            .expect("notify");

        let events = recording.events.lock().unwrap().clone();
        assert_eq!(events[0].title, "portrait shoot: Ada");
        assert_eq!(events[0].duration_minutes, 90);
        assert_eq!(
            recording.notices.lock().unwrap().clone(),
            vec!["New portrait booking from Ada".to_string()]
        );
    }
}
