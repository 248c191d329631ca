//! Headless capability implementation
//!
//! Lets the service run without a voice transport: connections only log, and
//! players consume their source to the end (draining remote streams, checking
//! local files) before reporting idle. Useful for dry runs of the queue and
//! signal logic against real links.

use async_trait::async_trait;
use futures::StreamExt;
use goro_common::types::ChannelRef;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::{
    AudioBackend, AudioPlayer, AudioSource, ChannelConnector, DisconnectNotifier, PlayerNotifier,
    VoiceConnection, VoiceError,
};

/// Connector whose connections exist only in the log
#[derive(Debug, Default, Clone)]
pub struct LoopbackConnector;

#[async_trait]
impl ChannelConnector for LoopbackConnector {
    async fn connect(
        &self,
        channel: ChannelRef,
        _on_disconnect: DisconnectNotifier,
    ) -> Result<Box<dyn VoiceConnection>, VoiceError> {
        info!(channel = %channel, "Loopback connection opened");
        Ok(Box::new(LoopbackConnection {
            channel,
            destroyed: false,
        }))
    }
}

struct LoopbackConnection {
    channel: ChannelRef,
    destroyed: bool,
}

impl VoiceConnection for LoopbackConnection {
    fn channel(&self) -> ChannelRef {
        self.channel
    }

    fn destroy(&mut self) {
        if !self.destroyed {
            self.destroyed = true;
            info!(channel = %self.channel, "Loopback connection destroyed");
        }
    }
}

impl Drop for LoopbackConnection {
    fn drop(&mut self) {
        self.destroy();
    }
}

/// Backend producing [`DrainPlayer`]s
#[derive(Debug, Default, Clone)]
pub struct HeadlessBackend;

impl AudioBackend for HeadlessBackend {
    fn create_player(
        &self,
        connection: &dyn VoiceConnection,
    ) -> Result<Box<dyn AudioPlayer>, VoiceError> {
        Ok(Box::new(DrainPlayer::new(connection.channel())))
    }
}

/// Player that consumes its source instead of rendering it
pub struct DrainPlayer {
    channel: ChannelRef,
    task: Option<JoinHandle<()>>,
    paused: watch::Sender<bool>,
}

impl DrainPlayer {
    pub fn new(channel: ChannelRef) -> Self {
        let (paused, _) = watch::channel(false);
        Self {
            channel,
            task: None,
            paused,
        }
    }

    fn is_active(&self) -> bool {
        self.task.as_ref().is_some_and(|t| !t.is_finished())
    }
}

impl AudioPlayer for DrainPlayer {
    fn play(&mut self, source: AudioSource, notifier: PlayerNotifier) -> Result<(), VoiceError> {
        self.stop();
        self.paused.send_replace(false);

        let channel = self.channel;
        let mut paused = self.paused.subscribe();
        debug!(channel = %channel, source = %source.describe(), "Draining source");

        self.task = Some(tokio::spawn(async move {
            let outcome = match source {
                AudioSource::Stream { origin, mut stream } => {
                    let mut total = 0usize;
                    let mut failure = None;
                    while let Some(chunk) = stream.next().await {
                        while *paused.borrow_and_update() {
                            if paused.changed().await.is_err() {
                                return;
                            }
                        }
                        match chunk {
                            Ok(bytes) => total += bytes.len(),
                            Err(e) => {
                                failure = Some(e.to_string());
                                break;
                            }
                        }
                    }
                    debug!(channel = %channel, origin = %origin, bytes = total, "Stream drained");
                    failure
                }
                AudioSource::File(path) => match tokio::fs::metadata(&path).await {
                    Ok(meta) if meta.is_file() => None,
                    Ok(_) => Some(format!("{} is not a file", path.display())),
                    Err(e) => Some(format!("{}: {}", path.display(), e)),
                },
            };

            match outcome {
                None => notifier.idle(),
                Some(reason) => {
                    warn!(channel = %channel, "Headless playback failed: {}", reason);
                    notifier.error(reason);
                }
            }
        }));

        Ok(())
    }

    fn pause(&mut self) -> bool {
        if !self.is_active() || *self.paused.borrow() {
            return false;
        }
        self.paused.send_replace(true);
        true
    }

    fn resume(&mut self) -> bool {
        if !self.is_active() || !*self.paused.borrow() {
            return false;
        }
        self.paused.send_replace(false);
        true
    }

    fn stop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

impl Drop for DrainPlayer {
    fn drop(&mut self) {
        self.stop();
    }
}
