//! One ambient session: join, idle, play, repeat

use goro_common::config::AmbientConfig;
use goro_common::human_time::describe_wait;
use goro_common::types::ChannelRef;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio::time::{sleep, Duration};
use tracing::{debug, info, warn};

use crate::voice::{
    AudioBackend, AudioPlayer, AudioSource, ChannelConnector, DisconnectNotifier, LifecycleEvent,
    PlayerNotifier, VoiceConnection,
};

use super::sounds::{pick_sound, random_between, scan_sounds};

/// Ambient sessions use a single connection each
const CONNECTION_ID: u64 = 1;

/// How a wait ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Wake {
    Ready,
    Gone,
}

/// How a sound ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SoundEnd {
    Finished,
    Failed,
    TimedOut,
    Suspended,
    Gone,
}

pub(super) struct AmbientSession {
    pub(super) channel: ChannelRef,
    pub(super) config: Arc<AmbientConfig>,
    pub(super) connector: Arc<dyn ChannelConnector>,
    pub(super) backend: Arc<dyn AudioBackend>,
    pub(super) listeners: watch::Receiver<usize>,
    pub(super) suspended: watch::Receiver<bool>,
}

impl AmbientSession {
    pub(super) async fn run(mut self) {
        let tenant = self.channel.tenant;

        if *self.listeners.borrow() == 1 {
            let (min, max) = self.config.join_delay_range();
            let delay = random_between(min, max, &mut rand::thread_rng());
            debug!(tenant = %tenant, delay_ms = delay.as_millis() as u64, "Listener alone, delaying join");
            tokio::select! {
                _ = sleep(delay) => {}
                _ = until(&mut self.listeners, |n| *n == 0) => {}
            }
        }
        if *self.listeners.borrow() == 0 {
            debug!(tenant = %tenant, "Channel emptied before join");
            return;
        }

        let (lifecycle_tx, mut lifecycle) = mpsc::unbounded_channel();
        let notifier = DisconnectNotifier::new(CONNECTION_ID, lifecycle_tx.clone());
        let mut connection = match self.connector.connect(self.channel, notifier).await {
            Ok(connection) => connection,
            Err(e) => {
                warn!(tenant = %tenant, "Ambient join failed: {}", e);
                return;
            }
        };
        info!(tenant = %tenant, channel = %self.channel.channel, "Ambient session joined");

        sleep(Duration::from_millis(self.config.settle_ms)).await;

        let mut player: Option<Box<dyn AudioPlayer>> = None;
        let mut token = 0;

        loop {
            if self.wait_until_ready(&mut lifecycle).await == Wake::Gone {
                break;
            }

            let (min, max) = self.config.idle_range();
            let idle = random_between(min, max, &mut rand::thread_rng());
            info!(tenant = %tenant, "Next ambient sound in {}", describe_wait(idle));

            let emptied = tokio::select! {
                _ = sleep(idle) => false,
                _ = until(&mut self.listeners, |n| *n == 0) => true,
                _ = wait_disconnect(&mut lifecycle) => true,
            };
            if emptied {
                break;
            }
            // Foreground may have started or listeners left during the window
            if !self.is_ready() {
                continue;
            }

            token += 1;
            match self
                .play_one(connection.as_ref(), &mut player, token, &lifecycle_tx, &mut lifecycle)
                .await
            {
                SoundEnd::Gone => break,
                end => debug!(tenant = %tenant, end = ?end, "Ambient sound ended"),
            }
        }

        if let Some(mut player) = player.take() {
            player.stop();
        }
        connection.destroy();
        info!(tenant = %tenant, channel = %self.channel.channel, "Ambient session left");
    }

    fn is_ready(&self) -> bool {
        !*self.suspended.borrow() && *self.listeners.borrow() >= self.config.min_listeners
    }

    /// Block until unsuspended with enough listeners
    async fn wait_until_ready(&mut self, lifecycle: &mut mpsc::UnboundedReceiver<LifecycleEvent>) -> Wake {
        loop {
            if *self.listeners.borrow() == 0 {
                return Wake::Gone;
            }
            if self.is_ready() {
                return Wake::Ready;
            }
            if *self.suspended.borrow() {
                debug!(tenant = %self.channel.tenant, "Ambient suspended by foreground playback");
            }

            tokio::select! {
                changed = self.listeners.changed() => if changed.is_err() { return Wake::Gone },
                changed = self.suspended.changed() => if changed.is_err() { return Wake::Gone },
                _ = wait_disconnect(lifecycle) => return Wake::Gone,
            }
        }
    }

    async fn play_one(
        &mut self,
        connection: &dyn VoiceConnection,
        player: &mut Option<Box<dyn AudioPlayer>>,
        token: u64,
        lifecycle_tx: &mpsc::UnboundedSender<LifecycleEvent>,
        lifecycle: &mut mpsc::UnboundedReceiver<LifecycleEvent>,
    ) -> SoundEnd {
        let tenant = self.channel.tenant;

        let sounds = match scan_sounds(&self.config.sounds_folder, &self.config.sound_extensions) {
            Ok(sounds) => sounds,
            Err(e) => {
                warn!(tenant = %tenant, folder = %self.config.sounds_folder.display(), "Cannot read sounds folder: {}", e);
                return SoundEnd::Failed;
            }
        };
        let Some(sound) = pick_sound(&sounds, &mut rand::thread_rng()) else {
            warn!(tenant = %tenant, folder = %self.config.sounds_folder.display(), "No ambient sounds available");
            return SoundEnd::Failed;
        };

        if player.is_none() {
            match self.backend.create_player(connection) {
                Ok(created) => *player = Some(created),
                Err(e) => {
                    warn!(tenant = %tenant, "Ambient player unavailable: {}", e);
                    return SoundEnd::Failed;
                }
            }
        }
        let Some(active) = player.as_mut() else {
            return SoundEnd::Failed;
        };

        info!(tenant = %tenant, sound = %sound.display(), "Playing ambient sound");
        if let Err(e) = active.play(AudioSource::File(sound), PlayerNotifier::new(token, lifecycle_tx.clone())) {
            warn!(tenant = %tenant, "Ambient sound failed to start: {}", e);
            return SoundEnd::Failed;
        }

        let end = tokio::select! {
            end = wait_sound_end(lifecycle, token) => end,
            _ = sleep(Duration::from_millis(self.config.max_sound_ms)) => SoundEnd::TimedOut,
            true = until(&mut self.suspended, |s| *s) => SoundEnd::Suspended,
            _ = until(&mut self.listeners, |n| *n == 0) => SoundEnd::Gone,
        };

        match end {
            SoundEnd::Finished | SoundEnd::Failed => {}
            SoundEnd::Suspended => {
                info!(tenant = %tenant, "Foreground playback started, cutting ambient sound");
                active.stop();
            }
            SoundEnd::TimedOut | SoundEnd::Gone => active.stop(),
        }
        end
    }
}

/// Resolves once `pred` holds; `false` if the sender went away first
async fn until<T>(rx: &mut watch::Receiver<T>, pred: impl Fn(&T) -> bool) -> bool {
    loop {
        if pred(&rx.borrow_and_update()) {
            return true;
        }
        if rx.changed().await.is_err() {
            return false;
        }
    }
}

/// Resolves when the connection reports a disconnect
async fn wait_disconnect(lifecycle: &mut mpsc::UnboundedReceiver<LifecycleEvent>) {
    while let Some(event) = lifecycle.recv().await {
        if matches!(event, LifecycleEvent::Disconnected { .. }) {
            return;
        }
    }
    // Sender is owned by the session itself, so this is unreachable in practice
    std::future::pending::<()>().await
}

/// Resolves when play `token` ends or the connection drops
async fn wait_sound_end(lifecycle: &mut mpsc::UnboundedReceiver<LifecycleEvent>, token: u64) -> SoundEnd {
    while let Some(event) = lifecycle.recv().await {
        match event {
            LifecycleEvent::Idle { token: t } if t == token => return SoundEnd::Finished,
            LifecycleEvent::Error { token: t, reason } if t == token => {
                warn!("Ambient sound error: {}", reason);
                return SoundEnd::Failed;
            }
            LifecycleEvent::Disconnected { .. } => return SoundEnd::Gone,
            _ => {}
        }
    }
    SoundEnd::Gone
}
