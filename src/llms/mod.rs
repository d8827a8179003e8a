//! Generative model access.
//!
//! - [`base_llm`] - the [`GenerativeModel`] capability, request/response types
//!   and the timeout wrapper every pipeline call goes through
//! - [`providers`] - concrete HTTP providers

pub mod base_llm;
pub mod providers;

#[cfg(test)]
pub(crate) mod testing;

pub use base_llm::{
    complete_with_timeout, Completion, CompletionRequest, GenerativeModel, LlmError,
};
pub use providers::AnthropicCompletion;
