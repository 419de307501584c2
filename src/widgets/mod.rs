//! UI Widgets - headless controls driven by the host's renderer
//!
//! Each widget is self-contained and communicates via EventBus

pub mod scrub;
pub mod seeker;
pub mod seeker_events;

pub use scrub::ScrubBinding;
pub use seeker::{Rgba, Seeker, SeekerColors};
