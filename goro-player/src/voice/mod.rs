//! Channel-connection and audio-streaming capabilities
//!
//! The playback engine and the ambient controller never talk to a voice
//! transport directly. They go through these traits, implemented by the chat
//! platform integration (or by [`headless`] for standalone runs and tests).
//!
//! Lifecycle notifications (track idle, player error, disconnection) flow back
//! as [`LifecycleEvent`]s over an unbounded channel owned by the consumer.
//! Each play carries a token so late notifications for a replaced track can be
//! told apart from the current one.

pub mod headless;

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::BoxStream;
use goro_common::types::ChannelRef;
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;
use tokio::sync::mpsc;

/// Byte stream produced by a remote provider
pub type ByteStream = BoxStream<'static, std::io::Result<Bytes>>;

/// Something a player can play
pub enum AudioSource {
    /// Remote stream; `origin` is the link it came from
    Stream { origin: String, stream: ByteStream },
    /// Local file
    File(PathBuf),
}

impl AudioSource {
    pub fn stream(origin: impl Into<String>, stream: ByteStream) -> Self {
        AudioSource::Stream {
            origin: origin.into(),
            stream,
        }
    }

    /// Human-readable description for logs
    pub fn describe(&self) -> String {
        match self {
            AudioSource::Stream { origin, .. } => origin.clone(),
            AudioSource::File(path) => path.display().to_string(),
        }
    }
}

impl fmt::Debug for AudioSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AudioSource::Stream { origin, .. } => f
                .debug_struct("Stream")
                .field("origin", origin)
                .finish_non_exhaustive(),
            AudioSource::File(path) => f.debug_tuple("File").field(path).finish(),
        }
    }
}

/// Voice capability errors
#[derive(Debug, Error)]
pub enum VoiceError {
    #[error("Failed to connect to channel {channel}: {reason}")]
    ConnectFailed { channel: ChannelRef, reason: String },

    #[error("Player error: {0}")]
    PlayerFailed(String),

    #[error("Connection lost")]
    ConnectionLost,
}

impl VoiceError {
    /// Stable machine-readable tag
    pub fn error_tag(&self) -> &'static str {
        match self {
            VoiceError::ConnectFailed { .. } => "connect_failed",
            VoiceError::PlayerFailed(_) => "player_failed",
            VoiceError::ConnectionLost => "connection_lost",
        }
    }
}

/// Notification from a player or a connection
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LifecycleEvent {
    /// The play identified by `token` reached its end
    Idle { token: u64 },
    /// The play identified by `token` failed mid-stream
    Error { token: u64, reason: String },
    /// The channel connection identified by `connection` dropped
    Disconnected { connection: u64 },
}

/// Handed to [`AudioPlayer::play`]; reports how that one play ended
#[derive(Debug, Clone)]
pub struct PlayerNotifier {
    token: u64,
    tx: mpsc::UnboundedSender<LifecycleEvent>,
}

impl PlayerNotifier {
    pub fn new(token: u64, tx: mpsc::UnboundedSender<LifecycleEvent>) -> Self {
        Self { token, tx }
    }

    pub fn token(&self) -> u64 {
        self.token
    }

    /// Playback finished normally
    pub fn idle(&self) {
        // Receiver gone means the session was torn down
        let _ = self.tx.send(LifecycleEvent::Idle { token: self.token });
    }

    /// Playback failed
    pub fn error(&self, reason: impl Into<String>) {
        let _ = self.tx.send(LifecycleEvent::Error {
            token: self.token,
            reason: reason.into(),
        });
    }
}

/// Handed to [`ChannelConnector::connect`]; reports disconnection
#[derive(Debug, Clone)]
pub struct DisconnectNotifier {
    connection: u64,
    tx: mpsc::UnboundedSender<LifecycleEvent>,
}

impl DisconnectNotifier {
    pub fn new(connection: u64, tx: mpsc::UnboundedSender<LifecycleEvent>) -> Self {
        Self { connection, tx }
    }

    pub fn connection(&self) -> u64 {
        self.connection
    }

    pub fn disconnected(&self) {
        let _ = self.tx.send(LifecycleEvent::Disconnected {
            connection: self.connection,
        });
    }
}

/// Acquires exclusive connections to audio channels
#[async_trait]
pub trait ChannelConnector: Send + Sync {
    async fn connect(
        &self,
        channel: ChannelRef,
        on_disconnect: DisconnectNotifier,
    ) -> Result<Box<dyn VoiceConnection>, VoiceError>;
}

/// A live channel connection
pub trait VoiceConnection: Send + Sync {
    fn channel(&self) -> ChannelRef;

    /// Release the connection; further use is a no-op
    fn destroy(&mut self);
}

/// Creates players bound to a connection
pub trait AudioBackend: Send + Sync {
    fn create_player(
        &self,
        connection: &dyn VoiceConnection,
    ) -> Result<Box<dyn AudioPlayer>, VoiceError>;
}

/// Plays one source at a time into its connection
///
/// Starting a new play replaces the current one without an idle notification
/// for the replaced play.
pub trait AudioPlayer: Send {
    fn play(&mut self, source: AudioSource, notifier: PlayerNotifier) -> Result<(), VoiceError>;

    /// Returns `false` if nothing was playing
    fn pause(&mut self) -> bool;

    /// Returns `false` if nothing was paused
    fn resume(&mut self) -> bool;

    /// Stop the current play without notifying
    fn stop(&mut self);
}
