//! Language-model provider abstractions.
//!
//! The pipelines only see the narrow [`EmbeddingProvider`] and
//! [`ChatProvider`] capabilities; `OpenAiCompatProvider` implements both
//! against any OpenAI-compatible HTTP API.

mod openai;
mod provider;
mod types;

pub use openai::OpenAiCompatProvider;
pub use provider::{ChatProvider, EmbeddingProvider};
pub use types::{ChatMessage, ChatRequest};
