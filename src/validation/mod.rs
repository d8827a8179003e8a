//! Position validation: checking a model's claim against ground truth.

pub mod validator;
pub mod verdict;

pub use validator::{PositionValidator, DEFAULT_ACCEPTANCE_THRESHOLD};
pub use verdict::{Discrepancy, DiscrepancyKind, ValidationVerdict};
