//! Playback engine and queue management

pub mod engine;
pub mod queue;
pub mod state;

pub use engine::PlaybackEngine;
pub use queue::TenantQueue;
pub use state::{EnqueueOutcome, QueueEntry, SessionState, SessionStatus, SkipOutcome};
