//! Mouth cues: derivation from speech boundaries and timed delivery.

pub mod event;
pub mod renderer;
pub mod scheduler;

pub use event::{MouthEvent, MouthKind, MouthTracker, derive_mouth_events};
pub use renderer::{CollectingRenderer, ConsoleRenderer, LogRenderer, MouthRenderer};
pub use scheduler::MouthScheduler;
