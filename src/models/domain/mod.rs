pub mod generation;
pub mod item;

pub use generation::{AttemptOutcome, AttemptPhase, GenerationAttempt, RunResult, StopReason};
pub use item::{Item, ItemStatus, SimilarItem};
