//! # overseer-policy
//!
//! Risk gating for the OVERSEER runtime.
//!
//! ## Overview
//!
//! [`SafetyValidator`] implements the
//! [`ActionGate`](overseer_core::traits::ActionGate) trait. Each tool carries
//! a static risk level, optionally overridden by a TOML [`RiskPolicy`]. Safe
//! calls pass unconditionally; everything else is routed to an approval
//! callback, and with no callback installed it is denied. Every decision is
//! appended to an audit sink.
//!
//! [`ApprovalGate`] provides the callback flavors: auto-approve,
//! interactive (operator prompt) and scripted.
//!
//! ## Quick start
//!
//! ```rust,ignore
//! use overseer_policy::{ApprovalGate, RiskPolicy, SafetyValidator};
//!
//! let validator = SafetyValidator::new(audit)
//!     .with_policy(RiskPolicy::from_file(Path::new("risk.toml"))?)
//!     .with_callback(ApprovalGate::stdio());
//! // Pass `Box::new(validator)` to `overseer_core::AgentRuntime::new(...)`.
//! ```
//!
//! ## Rule matching
//!
//! Each rule names a `tool` pattern: an exact name, `"*"`, or a namespace
//! prefix such as `"kb.*"`. Rules apply in declaration order; the first
//! match wins.

pub mod gate;
pub mod rule;
pub mod validator;

pub use gate::{ApprovalGate, InteractiveApprover, ScriptedApprover};
pub use rule::{RiskPolicy, RiskRule};
pub use validator::SafetyValidator;
