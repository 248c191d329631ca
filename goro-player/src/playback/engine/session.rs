//! Per-tenant session worker
//!
//! State machine:
//!
//! ```text
//!  Idle --enqueue--> Connecting --source ready--> Playing <--pause/resume--> Paused
//!   ^                    |                          |                         |
//!   +---- queue exhausted / stop / connect failure / connection lost ---------+
//! ```
//!
//! A track ending (finished, failed or skipped) moves the session back to
//! `Connecting` until the next head is ready.
//!
//! Resolution runs in a spawned task and reports back through the mailbox as
//! `SessionCommand::Resolved`. Every head attempt gets a fresh token; results
//! and player notifications carrying an older token are discarded.

use goro_common::events::SignalKind;
use goro_common::types::{ChannelRef, TrackRequest};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info, warn};

use crate::error::ControlError;
use crate::playback::queue::TenantQueue;
use crate::playback::state::{EnqueueOutcome, QueueEntry, SessionState, SessionStatus, SkipOutcome};
use crate::resolver::ResolveError;
use crate::voice::{
    AudioPlayer, AudioSource, DisconnectNotifier, LifecycleEvent, PlayerNotifier, VoiceConnection,
    VoiceError,
};

use super::EngineShared;

/// Messages handled by a session worker
pub(crate) enum SessionCommand {
    Enqueue {
        track: TrackRequest,
        reply: oneshot::Sender<EnqueueOutcome>,
    },
    Pause {
        reply: oneshot::Sender<Result<SessionState, ControlError>>,
    },
    Resume {
        reply: oneshot::Sender<Result<SessionState, ControlError>>,
    },
    Skip {
        reply: oneshot::Sender<Result<SkipOutcome, ControlError>>,
    },
    Stop {
        reply: oneshot::Sender<usize>,
    },
    Shuffle {
        reply: oneshot::Sender<Result<usize, ControlError>>,
    },
    Snapshot {
        reply: oneshot::Sender<Vec<QueueEntry>>,
    },
    Status {
        reply: oneshot::Sender<SessionStatus>,
    },
    /// Outcome of resolving the head for attempt `token`
    Resolved {
        token: u64,
        result: Result<AudioSource, ResolveError>,
    },
}

/// Why the head left the queue
#[derive(Debug, Clone, Copy)]
enum TrackEnd {
    Finished,
    Failed,
    Skipped,
}

enum Step {
    Command(SessionCommand),
    Lifecycle(LifecycleEvent),
}

pub(crate) struct SessionWorker {
    shared: Arc<EngineShared>,
    channel: ChannelRef,
    generation: u64,
    queue: TenantQueue,
    state: SessionState,
    connection: Option<Box<dyn VoiceConnection>>,
    player: Option<Box<dyn AudioPlayer>>,
    /// Current head attempt
    token: u64,
    /// Current connection
    connection_id: u64,
    /// `playback-started` already published for this session
    announced: bool,
    commands_tx: mpsc::UnboundedSender<SessionCommand>,
    lifecycle_tx: mpsc::UnboundedSender<LifecycleEvent>,
    lifecycle_rx: mpsc::UnboundedReceiver<LifecycleEvent>,
}

impl SessionWorker {
    pub(crate) fn new(
        shared: Arc<EngineShared>,
        channel: ChannelRef,
        generation: u64,
        commands_tx: mpsc::UnboundedSender<SessionCommand>,
    ) -> Self {
        let (lifecycle_tx, lifecycle_rx) = mpsc::unbounded_channel();
        Self {
            shared,
            channel,
            generation,
            queue: TenantQueue::new(channel.tenant),
            state: SessionState::Idle,
            connection: None,
            player: None,
            token: 0,
            connection_id: 0,
            announced: false,
            commands_tx,
            lifecycle_tx,
            lifecycle_rx,
        }
    }

    pub(crate) async fn run(mut self, mut commands: mpsc::UnboundedReceiver<SessionCommand>) {
        let tenant = self.channel.tenant;
        let mut pending: Option<SessionCommand> = None;

        loop {
            let step = match pending.take() {
                Some(cmd) => Step::Command(cmd),
                None => tokio::select! {
                    Some(cmd) = commands.recv() => Step::Command(cmd),
                    Some(event) = self.lifecycle_rx.recv() => Step::Lifecycle(event),
                    else => break,
                },
            };

            match step {
                Step::Command(cmd) => self.handle_command(cmd).await,
                Step::Lifecycle(event) => self.handle_lifecycle(event).await,
            }

            if self.state == SessionState::Idle {
                match self.shared.retire(tenant, self.generation, &mut commands) {
                    Some(cmd) => pending = Some(cmd),
                    None => break,
                }
            }
        }

        // Mailbox may still hold stale resolver results
        self.teardown("worker exit");
    }

    async fn handle_command(&mut self, cmd: SessionCommand) {
        match cmd {
            SessionCommand::Enqueue { track, reply } => {
                let start = self.state == SessionState::Idle;
                let position = self.queue.enqueue(track.clone());
                info!(
                    tenant = %self.channel.tenant,
                    position,
                    title = %track.title,
                    requested_by = %track.requested_by,
                    "Track enqueued"
                );
                let _ = reply.send(EnqueueOutcome {
                    position,
                    started: start,
                    track,
                });
                if start {
                    self.begin_head().await;
                }
            }
            SessionCommand::Pause { reply } => {
                let _ = reply.send(self.pause());
            }
            SessionCommand::Resume { reply } => {
                let _ = reply.send(self.resume());
            }
            SessionCommand::Skip { reply } => {
                let result = self.skip().await;
                let _ = reply.send(result);
            }
            SessionCommand::Stop { reply } => {
                let dropped = self.teardown("stop requested");
                let _ = reply.send(dropped);
            }
            SessionCommand::Shuffle { reply } => {
                let _ = reply.send(self.shuffle());
            }
            SessionCommand::Snapshot { reply } => {
                let _ = reply.send(self.queue.snapshot());
            }
            SessionCommand::Status { reply } => {
                let _ = reply.send(self.status());
            }
            SessionCommand::Resolved { token, result } => self.on_resolved(token, result).await,
        }
    }

    async fn handle_lifecycle(&mut self, event: LifecycleEvent) {
        match event {
            LifecycleEvent::Idle { token } if self.is_current_play(token) => {
                self.advance(TrackEnd::Finished).await;
            }
            LifecycleEvent::Error { token, reason } if self.is_current_play(token) => {
                warn!(tenant = %self.channel.tenant, "Player error: {}", reason);
                self.advance(TrackEnd::Failed).await;
            }
            LifecycleEvent::Disconnected { connection }
                if connection == self.connection_id && self.connection.is_some() =>
            {
                warn!(tenant = %self.channel.tenant, channel = %self.channel.channel, "Voice connection lost");
                self.teardown("connection lost");
            }
            stale => debug!(tenant = %self.channel.tenant, event = ?stale, "Ignoring stale lifecycle event"),
        }
    }

    fn is_current_play(&self, token: u64) -> bool {
        token == self.token && self.state.is_streaming()
    }

    /// Connect if needed, then resolve the head
    ///
    /// Tears the session down when the queue is empty or the connection
    /// cannot be established.
    async fn begin_head(&mut self) {
        let Some(head) = self.queue.peek_head() else {
            self.teardown("queue exhausted");
            return;
        };
        let link = head.source_link.clone();

        if self.connection.is_none() {
            self.state = SessionState::Connecting;
            self.connection_id += 1;
            let notifier = DisconnectNotifier::new(self.connection_id, self.lifecycle_tx.clone());
            info!(tenant = %self.channel.tenant, channel = %self.channel.channel, "Connecting to channel");

            match self.shared.connector.connect(self.channel, notifier).await {
                Ok(connection) => self.connection = Some(connection),
                Err(e) => {
                    error!(tenant = %self.channel.tenant, "{}", e);
                    self.teardown("connect failed");
                    return;
                }
            }
        }

        self.token += 1;
        let token = self.token;
        let source = Arc::clone(&self.shared.source);
        let commands = self.commands_tx.clone();
        debug!(tenant = %self.channel.tenant, token, link = %link, "Resolving head");

        tokio::spawn(async move {
            let result = source.resolve(&link).await;
            // Worker gone means the session ended meanwhile
            let _ = commands.send(SessionCommand::Resolved { token, result });
        });
    }

    async fn on_resolved(&mut self, token: u64, result: Result<AudioSource, ResolveError>) {
        if token != self.token || self.state == SessionState::Idle {
            debug!(tenant = %self.channel.tenant, token, "Discarding stale resolution");
            return;
        }

        let source = match result {
            Ok(source) => source,
            Err(e) => {
                let title = self.queue.peek_head().map(|t| t.title.clone()).unwrap_or_default();
                warn!(tenant = %self.channel.tenant, title = %title, error = e.error_tag(), "Dropping track: {}", e);
                self.advance(TrackEnd::Failed).await;
                return;
            }
        };

        if let Err(e) = self.start_player(token, source) {
            warn!(tenant = %self.channel.tenant, "Could not start playback: {}", e);
            self.advance(TrackEnd::Failed).await;
            return;
        }

        self.state = SessionState::Playing;
        if let Some(track) = self.queue.peek_head() {
            info!(
                tenant = %self.channel.tenant,
                title = %track.title,
                duration = %track.duration_label,
                "Now playing"
            );
        }
        if !self.announced {
            self.announced = true;
            self.shared
                .signals
                .publish_for(SignalKind::PlaybackStarted, self.channel.tenant);
        }
    }

    /// Play `source` on the session player, creating it on first use
    fn start_player(&mut self, token: u64, source: AudioSource) -> Result<(), VoiceError> {
        if self.player.is_none() {
            let connection = self
                .connection
                .as_deref()
                .ok_or(VoiceError::ConnectionLost)?;
            self.player = Some(self.shared.backend.create_player(connection)?);
        }

        let notifier = PlayerNotifier::new(token, self.lifecycle_tx.clone());
        match self.player.as_mut() {
            Some(player) => player.play(source, notifier),
            None => Err(VoiceError::PlayerFailed("no player".to_string())),
        }
    }

    /// Drop the head and start the next track (or end the session)
    ///
    /// Nothing streams until the next head resolves, so the session reports
    /// `Connecting` meanwhile and pause/resume are refused.
    async fn advance(&mut self, reason: TrackEnd) {
        if let Some(track) = self.queue.remove_head() {
            debug!(tenant = %self.channel.tenant, title = %track.title, reason = ?reason, "Track ended");
        }
        self.state = SessionState::Connecting;
        self.begin_head().await;
    }

    fn pause(&mut self) -> Result<SessionState, ControlError> {
        match self.state {
            SessionState::Playing => {
                if let Some(player) = self.player.as_mut() {
                    player.pause();
                }
                self.state = SessionState::Paused;
                info!(tenant = %self.channel.tenant, "Paused");
                Ok(self.state)
            }
            SessionState::Paused => Ok(self.state),
            _ => Err(ControlError::NotConnected),
        }
    }

    fn resume(&mut self) -> Result<SessionState, ControlError> {
        match self.state {
            SessionState::Paused => {
                if let Some(player) = self.player.as_mut() {
                    player.resume();
                }
                self.state = SessionState::Playing;
                info!(tenant = %self.channel.tenant, "Resumed");
                Ok(self.state)
            }
            SessionState::Playing => Ok(self.state),
            _ => Err(ControlError::NotConnected),
        }
    }

    async fn skip(&mut self) -> Result<SkipOutcome, ControlError> {
        if self.state == SessionState::Idle {
            return Err(ControlError::NotConnected);
        }
        let Some(skipped) = self.queue.peek_head().cloned() else {
            return Err(ControlError::QueueEmpty);
        };

        if let Some(player) = self.player.as_mut() {
            player.stop();
        }
        info!(tenant = %self.channel.tenant, title = %skipped.title, "Skipping track");

        // begin_head bumps the token, so the stopped play and any in-flight
        // resolution of the skipped track are both stale from here on
        self.advance(TrackEnd::Skipped).await;

        Ok(SkipOutcome {
            skipped,
            next: self.queue.peek_head().cloned(),
            remaining: self.queue.len(),
        })
    }

    fn shuffle(&mut self) -> Result<usize, ControlError> {
        if self.state == SessionState::Idle {
            return Err(ControlError::NotConnected);
        }
        if self.queue.is_empty() {
            return Err(ControlError::QueueEmpty);
        }
        self.queue.shuffle_rest(&mut rand::thread_rng());
        info!(tenant = %self.channel.tenant, len = self.queue.len(), "Queue shuffled");
        Ok(self.queue.len())
    }

    fn status(&self) -> SessionStatus {
        SessionStatus {
            tenant: self.channel.tenant,
            state: self.state,
            channel: (self.state != SessionState::Idle).then_some(self.channel),
            current: self.queue.peek_head().cloned(),
            queue_len: self.queue.len(),
        }
    }

    /// Release everything and return to `Idle`
    ///
    /// Publishes `playback-stopped` exactly once per non-idle session. Returns
    /// how many queued tracks were discarded.
    fn teardown(&mut self, reason: &str) -> usize {
        self.token += 1;
        if let Some(mut player) = self.player.take() {
            player.stop();
        }
        if let Some(mut connection) = self.connection.take() {
            connection.destroy();
        }
        let dropped = self.queue.clear();

        let was_active = self.state != SessionState::Idle;
        self.state = SessionState::Idle;
        self.announced = false;

        if was_active {
            info!(tenant = %self.channel.tenant, reason, dropped, "Session ended");
            self.shared
                .signals
                .publish_for(SignalKind::PlaybackStopped, self.channel.tenant);
        }
        dropped
    }
}
