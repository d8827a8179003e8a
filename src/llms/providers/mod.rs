//! Generative model providers.
//!
//! | Provider | Module |
//! |----------|--------|
//! | Anthropic | [`anthropic`] |

pub mod anthropic;

pub use anthropic::AnthropicCompletion;
