//! Deterministic collaborators for tests and local development.
//!
//! # Feature Flag
//!
//! This module is only available when the `test-utils` feature is enabled:
//!
//! ```toml
//! [dev-dependencies]
//! deckflow-core = { version = "...", features = ["test-utils"] }
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use deckflow_core::mock::{MockProducer, MockRenderer};
//!
//! // Succeeds with a generated outline and deck.
//! let producer = MockProducer::default();
//!
//! // Fails the content stage.
//! let producer = MockProducer::default().fail_content("model overloaded");
//!
//! // Panics inside the renderer.
//! let renderer = MockRenderer::default().panicking();
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

#[cfg(feature = "config")]
use clap::Args;
use serde::{Deserialize, Serialize};

use crate::generate::DeckProducer;
use crate::render::{PRESENTATION_EXTENSION, RenderedDocument, Renderer, filename_stem};
use crate::types::{Deck, Outline, OutlineItem, Slide};
use crate::{Error, ErrorKind, Result};

/// Configuration for the mock producer.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "config", derive(Args))]
pub struct MockConfig {
    /// Artificial latency added to every producer call, in milliseconds.
    #[cfg_attr(
        feature = "config",
        arg(long = "mock-delay-ms", env = "MOCK_DELAY_MS", default_value = "0")
    )]
    #[serde(default)]
    pub mock_delay_ms: u64,

    /// Number of outline sections, and therefore body slides, to produce.
    #[cfg_attr(
        feature = "config",
        arg(long = "mock-sections", env = "MOCK_SECTIONS", default_value = "3")
    )]
    #[serde(default = "default_sections")]
    pub mock_sections: usize,
}

fn default_sections() -> usize {
    3
}

impl Default for MockConfig {
    fn default() -> Self {
        Self {
            mock_delay_ms: 0,
            mock_sections: default_sections(),
        }
    }
}

impl MockConfig {
    /// Returns the configured latency.
    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.mock_delay_ms)
    }
}

/// Injected misbehaviour of a mock call.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Fault {
    Fail(String),
    Panic,
}

impl Fault {
    fn trigger(&self, call: &str) -> Result<()> {
        match self {
            Self::Fail(message) => Err(Error::new(ErrorKind::ExternalError)
                .with_message(format!("{call}: {message}"))),
            Self::Panic => panic!("mock {call} panicked"),
        }
    }
}

/// Producer returning an outline and deck derived from the prompt.
#[derive(Debug, Clone, Default)]
pub struct MockProducer {
    config: MockConfig,
    outline_fault: Option<Fault>,
    content_fault: Option<Fault>,
    calls: Arc<AtomicUsize>,
}

impl MockProducer {
    /// Creates a new mock producer with the given configuration.
    pub fn new(config: MockConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    /// Makes `produce_outline` return an error.
    pub fn fail_outline(mut self, message: impl Into<String>) -> Self {
        self.outline_fault = Some(Fault::Fail(message.into()));
        self
    }

    /// Makes `produce_content` return an error.
    pub fn fail_content(mut self, message: impl Into<String>) -> Self {
        self.content_fault = Some(Fault::Fail(message.into()));
        self
    }

    /// Makes `produce_content` panic.
    pub fn panic_content(mut self) -> Self {
        self.content_fault = Some(Fault::Panic);
        self
    }

    /// Sets the latency added to every call.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.config.mock_delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// Returns how many producer calls were made, across all clones.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    async fn enter(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let delay = self.config.delay();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
    }
}

#[async_trait::async_trait]
impl DeckProducer for MockProducer {
    async fn produce_outline(&self, prompt: &str) -> Result<Outline> {
        self.enter().await;
        if let Some(fault) = &self.outline_fault {
            fault.trigger("produce_outline")?;
        }

        let topic = prompt.trim();
        let outline_items = (1..=self.config.mock_sections.max(1))
            .map(|section| OutlineItem {
                sub_topic: format!("{topic}: part {section}"),
                topic1: format!("First point of part {section}"),
                topic2: format!("Second point of part {section}"),
            })
            .collect();

        Ok(Outline {
            main_topic: topic.to_owned(),
            outline_items,
            summary_topic: format!("Summary of {topic}"),
        })
    }

    async fn produce_content(&self, outline: &Outline, _prompt: &str) -> Result<Deck> {
        self.enter().await;
        if let Some(fault) = &self.content_fault {
            fault.trigger("produce_content")?;
        }

        let mut slides = Vec::with_capacity(outline.outline_items.len() + 2);
        slides.push(Slide::title(&outline.main_topic, "Generated presentation"));
        slides.extend(outline.outline_items.iter().map(|item| {
            Slide::content(&item.sub_topic, vec![item.topic1.clone(), item.topic2.clone()])
        }));
        slides.push(Slide::content(
            &outline.summary_topic,
            outline
                .outline_items
                .iter()
                .map(|item| item.sub_topic.clone())
                .collect::<Vec<_>>(),
        ));

        Ok(Deck::new(&outline.main_topic, slides))
    }

    fn producer_name(&self) -> &str {
        "mock"
    }
}

/// Renderer producing a small deterministic buffer instead of a real package.
#[derive(Debug, Clone, Default)]
pub struct MockRenderer {
    fault: Option<Fault>,
}

impl MockRenderer {
    /// Creates a new mock renderer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes `render` return an error.
    pub fn failing(mut self, message: impl Into<String>) -> Self {
        self.fault = Some(Fault::Fail(message.into()));
        self
    }

    /// Makes `render` panic.
    pub fn panicking(mut self) -> Self {
        self.fault = Some(Fault::Panic);
        self
    }
}

impl Renderer for MockRenderer {
    fn render(&self, title: &str, slides: &[Slide]) -> Result<RenderedDocument> {
        if let Some(fault) = &self.fault {
            fault.trigger("render")?;
        }

        Ok(RenderedDocument {
            buffer: format!("mock:{title}:{}", slides.len()).into_bytes().into(),
            filename: format!("{}.{PRESENTATION_EXTENSION}", filename_stem(title)),
        })
    }

    fn renderer_name(&self) -> &str {
        "mock"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn produces_outline_and_deck() -> Result<()> {
        let producer = MockProducer::new(MockConfig {
            mock_sections: 2,
            ..MockConfig::default()
        });

        let outline = producer.produce_outline("Rust adoption").await?;
        assert_eq!(outline.main_topic, "Rust adoption");
        assert_eq!(outline.outline_items.len(), 2);

        let deck = producer.produce_content(&outline, "Rust adoption").await?;
        assert_eq!(deck.title, "Rust adoption");
        assert_eq!(deck.slides.len(), 4);
        assert_eq!(producer.calls(), 2);
        Ok(())
    }

    #[tokio::test]
    async fn injected_failure_names_the_call() {
        let producer = MockProducer::default().fail_content("overloaded");
        let outline = producer.produce_outline("x").await.unwrap();
        let error = producer.produce_content(&outline, "x").await.unwrap_err();
        assert_eq!(error.kind(), ErrorKind::ExternalError);
        assert!(error.to_string().contains("produce_content: overloaded"));
    }

    #[test]
    fn renderer_is_deterministic() {
        let document = MockRenderer::new().render("My deck", &[Slide::default()]).unwrap();
        assert_eq!(document.filename, "My_deck.pptx");
        assert_eq!(&document.buffer[..], b"mock:My deck:1");
    }

    #[test]
    #[should_panic(expected = "mock render panicked")]
    fn renderer_can_panic() {
        let _ = MockRenderer::new().panicking().render("t", &[]);
    }
}
