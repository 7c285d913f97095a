//! Core domain types and utilities for the darkroom platform.
//!
//! This crate provides the foundational identifier types and error
//! handling shared by the darkroom workflow automation engine.

pub mod error;
pub mod id;

pub use error::Result;
pub use id::{ContinuationId, RunId, WorkflowId};
