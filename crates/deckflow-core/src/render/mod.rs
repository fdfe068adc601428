//! Document rendering.
//!
//! A [`Renderer`] turns a title and slides into an in-memory document. It
//! never touches the filesystem: persisting the buffer is the export stage's
//! job.

mod pptx;
mod service;

use bytes::Bytes;
pub use pptx::PptxRenderer;
pub use service::RenderService;

use crate::Result;
use crate::types::Slide;

/// Media type of rendered presentations.
pub const PRESENTATION_MEDIA_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.presentationml.presentation";

/// File extension of rendered presentations.
pub const PRESENTATION_EXTENSION: &str = "pptx";

/// Filename stem used when the title yields nothing usable.
const FALLBACK_STEM: &str = "presentation";

/// Upper bound on the byte length of a derived filename stem.
///
/// Leaves room for a task id and extension within the 255-byte name limit
/// of common filesystems.
pub const MAX_STEM_BYTES: usize = 100;

/// In-memory rendering result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedDocument {
    /// Encoded document bytes.
    pub buffer: Bytes,
    /// Suggested filename, without any directory component.
    pub filename: String,
}

/// Collaborator that encodes slides into a binary document.
///
/// Rendering is CPU-bound; callers run it on a blocking thread.
pub trait Renderer: Send + Sync {
    /// Renders the slides under the given title.
    fn render(&self, title: &str, slides: &[Slide]) -> Result<RenderedDocument>;

    /// Short identifier used in logs.
    fn renderer_name(&self) -> &str;
}

/// Derives a filesystem-safe filename stem from a presentation title.
///
/// Spaces become underscores; path separators, reserved and control
/// characters are dropped. The result is cut on a character boundary to at
/// most [`MAX_STEM_BYTES`] bytes.
pub fn filename_stem(title: &str) -> String {
    let stem: String = title
        .trim()
        .chars()
        .filter_map(|c| match c {
            ' ' => Some('_'),
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => None,
            c if c.is_control() => None,
            c => Some(c),
        })
        .collect();

    let mut end = stem.len().min(MAX_STEM_BYTES);
    while !stem.is_char_boundary(end) {
        end -= 1;
    }

    let stem = stem[..end].trim_matches('.');
    if stem.is_empty() {
        FALLBACK_STEM.to_owned()
    } else {
        stem.to_owned()
    }
}
