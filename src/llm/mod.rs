//! Text generation provider abstraction.
//!
//! The query pipeline only needs "prompt in, text out"; any service speaking
//! the OpenAI chat completions API can back it.

mod openai;
mod provider;
mod types;

pub use openai::{ApiKeySource, OpenAIProvider};
pub use provider::{CompletionOptions, LlmError, LlmProvider};
pub use types::{CompletionResponse, FinishReason, Message, MessageRole, TokenUsage};
