//! Continuation scheduling for darkroom workflow runs.
//!
//! Runs suspended at delay nodes leave behind pending continuation
//! records. The [`resumer::Resumer`] sweeps those records and turns due
//! ones back into step invocations. How often the sweep happens is the
//! caller's business; the worker binary drives it from a timer.

pub mod resumer;

pub use resumer::{ResumeReport, Resumer};
