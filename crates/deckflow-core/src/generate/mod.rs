//! Outline and content generation.
//!
//! Work nodes talk to a [`DeckProducer`] through [`ProducerService`], which
//! adds timing and structured logging around any implementation. The bundled
//! [`OpenAiProducer`] speaks the OpenAI chat-completions protocol, which also
//! covers compatible vendors such as DeepSeek.

mod openai;
mod prompt;
mod service;

pub use openai::{OpenAiConfig, OpenAiProducer};
pub use service::ProducerService;

use crate::Result;
use crate::types::{Deck, Outline};

/// Collaborator that turns a prompt into an outline and an outline into slides.
///
/// Implementations are constructed once at startup and shared between
/// workers, so they must be cheap to call concurrently.
#[async_trait::async_trait]
pub trait DeckProducer: Send + Sync {
    /// Produces a structured outline for the prompt.
    async fn produce_outline(&self, prompt: &str) -> Result<Outline>;

    /// Expands an outline into a titled deck of slides.
    async fn produce_content(&self, outline: &Outline, prompt: &str) -> Result<Deck>;

    /// Short identifier used in logs.
    fn producer_name(&self) -> &str;
}
