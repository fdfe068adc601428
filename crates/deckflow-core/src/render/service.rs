//! Renderer service wrapper with observability.

use std::sync::Arc;
use std::time::Instant;

use super::{RenderedDocument, Renderer};
use crate::types::Slide;
use crate::{Result, TRACING_TARGET_RENDER};

/// Renderer wrapper with observability.
///
/// Cheap to clone; clones share the inner renderer.
#[derive(Clone)]
pub struct RenderService {
    inner: Arc<dyn Renderer>,
}

impl std::fmt::Debug for RenderService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenderService")
            .field("renderer", &self.inner.renderer_name())
            .finish()
    }
}

impl RenderService {
    /// Creates a new render service.
    pub fn new<R>(renderer: R) -> Self
    where
        R: Renderer + 'static,
    {
        Self {
            inner: Arc::new(renderer),
        }
    }

    /// Creates a render service from a shared renderer.
    pub fn from_arc(renderer: Arc<dyn Renderer>) -> Self {
        Self { inner: renderer }
    }

    /// Renders the slides. Blocking.
    pub fn render(&self, title: &str, slides: &[Slide]) -> Result<RenderedDocument> {
        let start = Instant::now();
        let result = self.inner.render(title, slides);
        let elapsed = start.elapsed();

        match &result {
            Ok(document) => tracing::debug!(
                target: TRACING_TARGET_RENDER,
                renderer = self.inner.renderer_name(),
                slides = slides.len(),
                filename = %document.filename,
                size_bytes = document.buffer.len(),
                elapsed_ms = elapsed.as_millis(),
                "Document rendered"
            ),
            Err(error) => tracing::error!(
                target: TRACING_TARGET_RENDER,
                renderer = self.inner.renderer_name(),
                error = %error,
                elapsed_ms = elapsed.as_millis(),
                "Document rendering failed"
            ),
        }

        result
    }

    /// Returns the name of the wrapped renderer.
    pub fn renderer_name(&self) -> &str {
        self.inner.renderer_name()
    }
}
