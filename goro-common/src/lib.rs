//! # Goro Common Library
//!
//! Shared code for the Goro audio services including:
//! - Tenant, channel and user identity types
//! - Track request model shared by the resolver and the playback engine
//! - Signal bus coordinating foreground and ambient playback
//! - Configuration loading
//! - Duration label formatting

pub mod config;
pub mod error;
pub mod events;
pub mod human_time;
pub mod types;

pub use error::{Error, Result};
pub use events::{Signal, SignalBus, SignalKind, SubscriptionId};
pub use types::{ChannelId, ChannelRef, TenantId, TrackRequest, UserId};
