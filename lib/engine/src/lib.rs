//! Workflow automation engine for darkroom.
//!
//! Studio owners build automations as node graphs: a trigger node that
//! matches a domain event, and downstream action, condition, delay, and
//! end nodes connected by labeled edges. This crate holds the graph
//! model, the trigger dispatcher that starts runs, and the step
//! executor that walks one node per queued invocation.
//!
//! Storage and side effects sit behind traits ([`store::DefinitionStore`],
//! [`store::StateStore`], [`queue::StepQueue`], [`action::ActionDispatcher`]);
//! the worker binary wires in Postgres, NATS JetStream, and the
//! `darkroom-actions` dispatcher.

pub mod action;
pub mod condition;
pub mod continuation;
pub mod definition;
pub mod dispatcher;
pub mod edge;
pub mod envelope;
pub mod error;
pub mod executor;
pub mod graph;
pub mod memory;
pub mod nats;
pub mod node;
pub mod queue;
pub mod run;
pub mod store;

pub use definition::WorkflowDefinition;
pub use dispatcher::{DispatchReport, TriggerDispatcher};
pub use executor::{StepExecutor, StepOutcome};
pub use graph::WorkflowGraph;
pub use run::{Run, RunStatus};
