//! Grounding resolution: the bounded extract-validate-retry loop.

pub mod controller;

pub use controller::{
    AttemptOutcome, Resolution, ResolveState, RetryController, RetryStats, DEFAULT_MAX_ATTEMPTS,
};
