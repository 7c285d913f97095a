//! The darkroom workflow worker.
//!
//! One process runs the whole engine loop: it consumes domain events
//! and turns them into runs, consumes step invocations and executes
//! them, and sweeps due continuations back onto the step queue.

mod config;
mod db;
mod events;

use async_nats::jetstream;
use chrono::Utc;
use config::WorkerConfig;
use darkroom_actions::{HttpWebhookTransport, NatsCommandPublisher, StudioActionDispatcher};
use darkroom_engine::envelope::Envelope;
use darkroom_engine::error::EngineError;
use darkroom_engine::executor::StepExecutor;
use darkroom_engine::dispatcher::TriggerDispatcher;
use darkroom_engine::nats::{NatsConfig, NatsStepQueue};
use darkroom_engine::queue::{StepInvocation, StepQueue};
use darkroom_engine::store::{DefinitionStore, StateStore};
use darkroom_scheduler::Resumer;
use db::{PgDefinitionStore, PgStateStore};
use events::DomainEvent;
use futures::StreamExt;
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration from environment
    let config = WorkerConfig::from_env().expect("failed to load configuration");
    tracing::info!("Loaded configuration");

    // Create database connection pool
    let db_pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&config.database_url)
        .await
        .expect("failed to connect to database");

    // Run migrations
    tracing::info!("Running database migrations...");
    sqlx::migrate!("./migrations")
        .run(&db_pool)
        .await
        .expect("failed to run migrations");

    // Connect to NATS
    let nats_client = async_nats::connect(&config.nats.url)
        .await
        .expect("failed to connect to NATS");
    let js = jetstream::new(nats_client);

    let nats_steps =
        NatsStepQueue::from_jetstream(js.clone(), NatsConfig::new(config.nats.url.clone()))
            .await
            .expect("failed to set up step queue");
    let steps_consumer = nats_steps
        .consumer()
        .await
        .expect("failed to create steps consumer");
    let step_queue: Arc<dyn StepQueue> = Arc::new(nats_steps);
    let commands = Arc::new(
        NatsCommandPublisher::new(js.clone())
            .await
            .expect("failed to set up command publisher"),
    );

    let definitions: Arc<dyn DefinitionStore> =
        Arc::new(PgDefinitionStore::new(db_pool.clone()));
    let state: Arc<dyn StateStore> = Arc::new(PgStateStore::new(db_pool.clone()));

    let actions = Arc::new(StudioActionDispatcher::new(
        commands.clone(),
        commands.clone(),
        commands.clone(),
        commands,
        Arc::new(HttpWebhookTransport::default()),
        config.actions.admin_email.clone(),
    ));

    let trigger_dispatcher = Arc::new(TriggerDispatcher::new(
        definitions.clone(),
        state.clone(),
        step_queue.clone(),
    ));
    let executor = Arc::new(StepExecutor::new(
        definitions,
        state.clone(),
        step_queue.clone(),
        actions,
    ));
    let resumer = Arc::new(Resumer::new(state, step_queue.clone()));

    // Domain event intake
    let events_stream = js
        .get_or_create_stream(jetstream::stream::Config {
            name: events::EVENTS_STREAM_NAME.to_string(),
            subjects: vec![events::EVENTS_SUBJECT.to_string()],
            storage: jetstream::stream::StorageType::File,
            retention: jetstream::stream::RetentionPolicy::WorkQueue,
            ..Default::default()
        })
        .await
        .expect("failed to create events stream");
    let events_consumer = events_stream
        .get_or_create_consumer(
            events::EVENTS_CONSUMER_NAME,
            jetstream::consumer::pull::Config {
                durable_name: Some(events::EVENTS_CONSUMER_NAME.to_string()),
                ..Default::default()
            },
        )
        .await
        .expect("failed to create events consumer");

    tokio::spawn(async move {
        let mut messages = events_consumer
            .messages()
            .await
            .expect("failed to subscribe to events");
        while let Some(message) = messages.next().await {
            let message = match message {
                Ok(message) => message,
                Err(error) => {
                    tracing::warn!(%error, "event stream error");
                    continue;
                }
            };

            let requeue = match Envelope::<DomainEvent>::from_json_bytes(&message.payload) {
                Ok(envelope) => {
                    let event = envelope.into_payload();
                    match trigger_dispatcher
                        .dispatch(&event.event, &event.payload, event.dry_run)
                        .await
                    {
                        Ok(report) => {
                            tracing::debug!(
                                event = %report.event,
                                matched = report.matched,
                                started = report.started_runs().len(),
                                "event dispatched"
                            );
                            false
                        }
                        // Dispatch only errors when the definition store
                        // is unreachable; no run was started yet.
                        Err(error) => {
                            tracing::warn!(
                                event = %event.event,
                                %error,
                                "event dispatch failed, requeueing"
                            );
                            true
                        }
                    }
                }
                Err(error) => {
                    tracing::warn!(%error, "undecodable event message");
                    false
                }
            };

            acknowledge(&message, requeue).await;
        }
    });

    // Step execution
    tokio::spawn({
        let executor = executor.clone();
        async move {
            let mut messages = steps_consumer
                .messages()
                .await
                .expect("failed to subscribe to steps");
            while let Some(message) = messages.next().await {
                let message = match message {
                    Ok(message) => message,
                    Err(error) => {
                        tracing::warn!(%error, "step stream error");
                        continue;
                    }
                };

                let requeue = match Envelope::<StepInvocation>::from_json_bytes(&message.payload) {
                    Ok(envelope) => {
                        let invocation = envelope.into_payload();
                        match executor.execute_step(invocation).await {
                            Ok(outcome) => {
                                tracing::debug!(
                                    run_id = %outcome.run_id,
                                    node_kind = %outcome.node_kind,
                                    run_status = %outcome.run_status,
                                    "step executed"
                                );
                                false
                            }
                            Err(
                                error @ (EngineError::StaleInvocation { .. }
                                | EngineError::RunNotResumable { .. }),
                            ) => {
                                // Redeliveries of already-processed steps.
                                tracing::debug!(%error, "discarding stale invocation");
                                false
                            }
                            Err(error) if requeue_on(&error) => {
                                tracing::warn!(%error, "step hit a backend failure, requeueing");
                                true
                            }
                            Err(error) => {
                                tracing::warn!(%error, "step execution failed");
                                false
                            }
                        }
                    }
                    Err(error) => {
                        tracing::warn!(%error, "undecodable step message");
                        false
                    }
                };

                acknowledge(&message, requeue).await;
            }
        }
    });

    // Continuation sweeper
    let sweep_interval = config.scheduler.sweep_interval_seconds;
    tokio::spawn(async move {
        let mut interval =
            tokio::time::interval(std::time::Duration::from_secs(sweep_interval));
        loop {
            interval.tick().await;
            match resumer.resume_due(Utc::now()).await {
                Ok(report) if report.due > 0 => {
                    tracing::info!(
                        due = report.due,
                        resumed = report.resumed,
                        failed = report.failed,
                        "continuation sweep"
                    );
                }
                Ok(_) => {}
                Err(error) => tracing::warn!(%error, "continuation sweep failed"),
            }
        }
    });

    tracing::info!("Worker started");
    tokio::signal::ctrl_c()
        .await
        .expect("failed to listen for shutdown signal");
    tracing::info!("Shutting down");
}

/// A step whose store or queue failed never executed, so JetStream's
/// redelivery is safe. Every other error is either already recorded on
/// the run or a stale duplicate the executor discards.
const fn requeue_on(error: &EngineError) -> bool {
    matches!(error, EngineError::Store(_) | EngineError::Queue(_))
}

/// Acks a message, or NAKs it for redelivery.
async fn acknowledge(message: &async_nats::jetstream::Message, requeue: bool) {
    let result = if requeue {
        message.ack_with(jetstream::AckKind::Nak(None)).await
    } else {
        message.ack().await
    };
    if let Err(error) = result {
        tracing::warn!(%error, "failed to acknowledge message");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use darkroom_core::RunId;
    use darkroom_engine::action::ActionDispatchError;
    use darkroom_engine::node::NodeId;
    use darkroom_engine::queue::QueueError;
    use darkroom_engine::run::RunStatus;
    use darkroom_engine::store::StoreError;

    #[test]
    fn only_backend_failures_requeue() {
        assert!(requeue_on(&EngineError::Store(StoreError::Backend {
            message: "connection refused".to_string(),
        })));
        assert!(requeue_on(&EngineError::Store(StoreError::VersionConflict {
            run_id: RunId::new(),
        })));
        assert!(requeue_on(&EngineError::Queue(QueueError::PublishFailed {
            message: "stream offline".to_string(),
        })));

        // Already recorded on the run, or discardable duplicates.
        assert!(!requeue_on(&EngineError::ActionFailed {
            node_id: NodeId::new(),
            source: ActionDispatchError::new("send_email", "smtp unreachable"),
        }));
        assert!(!requeue_on(&EngineError::StaleInvocation {
            run_id: RunId::new(),
            node_id: NodeId::new(),
        }));
        assert!(!requeue_on(&EngineError::RunNotResumable {
            run_id: RunId::new(),
            status: RunStatus::Succeeded,
        }));
        assert!(!requeue_on(&EngineError::RunNotFound { run_id: RunId::new() }));
    }
}
