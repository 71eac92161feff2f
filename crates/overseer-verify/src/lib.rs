//! # overseer-verify
//!
//! Evaluators that render the final verdict on a mission run.
//!
//! [`StepOutcomeEvaluator`] is the default: it judges a run by its final
//! step. [`CriteriaEvaluator`] additionally requires each of the mission's
//! success criteria to be evidenced, through a registered check or a
//! substring match.

pub mod criteria;
pub mod outcome;

pub use criteria::{CriteriaEvaluator, CriterionCheck};
pub use outcome::StepOutcomeEvaluator;
