//! # overseer-core
//!
//! The mission execution runtime for OVERSEER agents.
//!
//! This crate provides:
//! - The trait seams (`Planner`, `ToolExecutor`, `ActionGate`,
//!   `ApprovalCallback`, `AuditSink`, `Evaluator`)
//! - The `AgentRuntime` that drives them in the correct trust order
//! - Loading of mission definition files
//!
//! ## Usage
//!
//! ```rust,ignore
//! use overseer_core::{AgentRuntime, traits::{Planner, ToolExecutor, ActionGate, Evaluator}};
//!
//! let runtime = AgentRuntime::new(tools, Box::new(validator), Box::new(evaluator));
//! let outcome = runtime.run(&mission, context, &mut planner)?;
//! ```

pub mod loader;
pub mod runtime;
pub mod traits;

pub use runtime::{AgentRuntime, RunFault};
