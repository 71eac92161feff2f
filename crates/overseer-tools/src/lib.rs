//! # overseer-tools
//!
//! The tool layer for the OVERSEER runtime.
//!
//! This crate provides [`registry::ToolRegistry`], which implements the
//! [`ToolExecutor`](overseer_core::traits::ToolExecutor) trait. Every call is
//! validated against the tool's JSON Schema before its handler runs.
//!
//! ## Quick start
//!
//! ```rust,ignore
//! use overseer_tools::{ToolDefinition, ToolRegistry};
//!
//! let mut registry = ToolRegistry::new();
//! registry.register(ToolDefinition::new(
//!     "list_docs",
//!     "List documents under a prefix",
//!     json!({ "type": "object", "properties": { "prefix": { "type": "string" } } }),
//!     RiskLevel::Safe,
//!     |args, _ctx| Ok(json!(["a.md", "b.md"]).into()),
//! )?)?;
//! ```

pub mod registry;
pub mod schema;

pub use registry::{HandlerError, HandlerOutput, ToolDefinition, ToolHandler, ToolRegistry};
pub use schema::ArgumentSchema;
