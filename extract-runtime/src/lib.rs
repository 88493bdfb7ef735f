//! The Orchestrator (C5): wires C1-C4 together for one invocation.
//!
//! This crate has two binaries: `src/main.rs` (a local CLI run) and
//! `src/bin/lambda.rs` (a `lambda_runtime::service_fn` wrapper), both of
//! which build a [`RunContext`] and call [`run_once`].

pub mod context;
pub mod logging;
pub mod orchestrator;

pub use context::RunContext;
pub use orchestrator::run_once;
