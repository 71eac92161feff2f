//! # overseer-contracts
//!
//! Shared types, schemas, and contracts for the OVERSEER agent runtime.
//!
//! Every crate in the workspace imports from here. No business logic lives in
//! this crate, only data definitions, small accessors, and the error type.

pub mod approval;
pub mod error;
pub mod execution;
pub mod mission;
pub mod thought;
pub mod tool;
