//! Producer service wrapper with observability.

use std::sync::Arc;
use std::time::Instant;

use super::DeckProducer;
use crate::types::{Deck, Outline};
use crate::{Result, TRACING_TARGET_GENERATE};

/// Producer wrapper with observability.
///
/// The inner producer is wrapped in `Arc` for cheap cloning.
#[derive(Clone)]
pub struct ProducerService {
    inner: Arc<dyn DeckProducer>,
}

impl std::fmt::Debug for ProducerService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProducerService")
            .field("producer", &self.inner.producer_name())
            .finish()
    }
}

impl ProducerService {
    /// Creates a new producer service.
    pub fn new<P>(producer: P) -> Self
    where
        P: DeckProducer + 'static,
    {
        Self {
            inner: Arc::new(producer),
        }
    }

    /// Creates a producer service from a shared producer.
    pub fn from_arc(producer: Arc<dyn DeckProducer>) -> Self {
        Self { inner: producer }
    }

    /// Produces an outline for the prompt.
    pub async fn produce_outline(&self, prompt: &str) -> Result<Outline> {
        let start = Instant::now();

        tracing::debug!(
            target: TRACING_TARGET_GENERATE,
            producer = self.inner.producer_name(),
            prompt_len = prompt.len(),
            "Producing outline"
        );

        let result = self.inner.produce_outline(prompt).await;
        let elapsed = start.elapsed();

        match &result {
            Ok(outline) => tracing::debug!(
                target: TRACING_TARGET_GENERATE,
                sections = outline.outline_items.len(),
                elapsed_ms = elapsed.as_millis(),
                "Outline produced"
            ),
            Err(error) => tracing::error!(
                target: TRACING_TARGET_GENERATE,
                error = %error,
                elapsed_ms = elapsed.as_millis(),
                "Outline production failed"
            ),
        }

        result
    }

    /// Expands an outline into slides.
    pub async fn produce_content(&self, outline: &Outline, prompt: &str) -> Result<Deck> {
        let start = Instant::now();

        tracing::debug!(
            target: TRACING_TARGET_GENERATE,
            producer = self.inner.producer_name(),
            main_topic = %outline.main_topic,
            "Producing content"
        );

        let result = self.inner.produce_content(outline, prompt).await;
        let elapsed = start.elapsed();

        match &result {
            Ok(deck) => tracing::debug!(
                target: TRACING_TARGET_GENERATE,
                slides = deck.slides.len(),
                elapsed_ms = elapsed.as_millis(),
                "Content produced"
            ),
            Err(error) => tracing::error!(
                target: TRACING_TARGET_GENERATE,
                error = %error,
                elapsed_ms = elapsed.as_millis(),
                "Content production failed"
            ),
        }

        result
    }

    /// Returns the name of the wrapped producer.
    pub fn producer_name(&self) -> &str {
        self.inner.producer_name()
    }
}
