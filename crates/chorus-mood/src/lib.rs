//! Event-reactive mood and opinion engine: bounded per-call deltas, mood
//! momentum, and periodic self-regulation toward neutral.

pub mod engine;
pub mod error;
pub mod heuristic;
pub mod validate;

pub use engine::EmotionalEngine;
pub use error::{MoodError, MoodResult};
pub use heuristic::{KeywordMoodHeuristic, MoodHeuristic, PolicyMoodHeuristic};
pub use validate::{validate_update, EmotionalStateUpdate, OpinionDelta};
