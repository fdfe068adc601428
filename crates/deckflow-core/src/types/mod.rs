//! Domain types exchanged between the work nodes and the public API.

mod contract;
mod deck;
mod outline;
mod slide;
mod stage;

pub use contract::{ContractViolation, TaskResultContract};
pub use deck::Deck;
pub use outline::{Outline, OutlineItem};
pub use slide::{Slide, SlideBody, SlideKind};
pub use stage::{DeckDraft, ExportArtifact, OutlineDraft, StageResult};
