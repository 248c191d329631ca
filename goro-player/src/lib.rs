//! # Goro Player Library (goro-player)
//!
//! Multi-tenant audio playback orchestration.
//!
//! **Purpose:** Resolve user-submitted links into audio streams, keep a FIFO
//! queue and playback session per tenant, and run ambient filler sounds that
//! step aside whenever foreground music plays.
//!
//! **Architecture:** One session worker task per active tenant; foreground and
//! ambient playback coordinate only through the `goro_common` signal bus.

pub mod ambient;
pub mod api;
pub mod error;
pub mod playback;
pub mod resolver;
pub mod voice;

pub use error::{Error, Result};
