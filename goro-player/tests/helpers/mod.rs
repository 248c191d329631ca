//! Test doubles shared by the goro-player integration tests
//!
//! - `MockVoice`: connector + backend recording every call, with hooks to end
//!   the current play or drop the connection
//! - `ScriptedSource`: `TrackSource` answering per link from a script
//! - `SignalRecorder`: captures bus traffic
//! - `Harness`: engine wired to all of the above

#![allow(dead_code)]

use async_trait::async_trait;
use bytes::Bytes;
use goro_common::events::{SignalBus, SignalKind};
use goro_common::types::{ChannelId, ChannelRef, TenantId, TrackRequest, UserId};
use goro_player::playback::{PlaybackEngine, SessionState};
use goro_player::resolver::{ResolveError, TrackSource};
use goro_player::voice::{
    AudioBackend, AudioPlayer, AudioSource, ChannelConnector, DisconnectNotifier, PlayerNotifier,
    VoiceConnection, VoiceError,
};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

// ============================================================================
// Fixtures
// ============================================================================

pub fn channel(tenant: u64) -> ChannelRef {
    ChannelRef::new(TenantId::new(tenant), ChannelId::new(tenant * 100))
}

pub fn track(link: &str) -> TrackRequest {
    let title = link.rsplit('/').next().unwrap_or(link).to_string();
    TrackRequest::new(link, title, "unknown", UserId::new(42))
}

/// Poll `cond` every 5ms (virtual time under `start_paused`) for up to 10s
pub async fn wait_until(what: &str, mut cond: impl FnMut() -> bool) {
    for _ in 0..2000 {
        if cond() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("Timed out waiting for {}", what);
}

pub async fn wait_for_state(engine: &PlaybackEngine, tenant: TenantId, state: SessionState) {
    for _ in 0..2000 {
        if engine.status(tenant).await.state == state {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!(
        "Timed out waiting for tenant {} to reach {}, last {:?}",
        tenant,
        state,
        engine.status(tenant).await
    );
}

// ============================================================================
// Voice doubles
// ============================================================================

#[derive(Default)]
struct VoiceLog {
    connects: Vec<ChannelRef>,
    destroys: usize,
    players_created: usize,
    plays: Vec<String>,
    pauses: usize,
    resumes: usize,
    stops: usize,
    current: Option<PlayerNotifier>,
    history: Vec<PlayerNotifier>,
    disconnects: Vec<DisconnectNotifier>,
    fail_connect: bool,
}

/// Connector and backend in one; clones share the same log
#[derive(Clone, Default)]
pub struct MockVoice {
    log: Arc<Mutex<VoiceLog>>,
}

impl MockVoice {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn connector(&self) -> Arc<dyn ChannelConnector> {
        Arc::new(self.clone())
    }

    pub fn backend(&self) -> Arc<dyn AudioBackend> {
        Arc::new(self.clone())
    }

    fn log(&self) -> std::sync::MutexGuard<'_, VoiceLog> {
        self.log.lock().unwrap()
    }

    pub fn fail_connects(&self, fail: bool) {
        self.log().fail_connect = fail;
    }

    pub fn connects(&self) -> Vec<ChannelRef> {
        self.log().connects.clone()
    }

    pub fn destroys(&self) -> usize {
        self.log().destroys
    }

    pub fn players_created(&self) -> usize {
        self.log().players_created
    }

    /// Descriptions of every source handed to a player, in order
    pub fn plays(&self) -> Vec<String> {
        self.log().plays.clone()
    }

    pub fn pauses(&self) -> usize {
        self.log().pauses
    }

    pub fn resumes(&self) -> usize {
        self.log().resumes
    }

    pub fn stops(&self) -> usize {
        self.log().stops
    }

    pub fn is_playing(&self) -> bool {
        self.log().current.is_some()
    }

    /// End the current play normally; `false` if nothing is playing
    pub fn finish_current(&self) -> bool {
        match self.log().current.take() {
            Some(notifier) => {
                notifier.idle();
                true
            }
            None => false,
        }
    }

    /// End the current play with an error; `false` if nothing is playing
    pub fn fail_current(&self, reason: &str) -> bool {
        match self.log().current.take() {
            Some(notifier) => {
                notifier.error(reason);
                true
            }
            None => false,
        }
    }

    /// Fire an idle notification for the `index`-th play, current or not
    pub fn replay_idle(&self, index: usize) {
        let notifier = self.log().history.get(index).cloned();
        if let Some(notifier) = notifier {
            notifier.idle();
        }
    }

    /// Report the most recent connection as lost
    pub fn drop_connection(&self) {
        let notifier = self.log().disconnects.last().cloned();
        if let Some(notifier) = notifier {
            notifier.disconnected();
        }
    }
}

#[async_trait]
impl ChannelConnector for MockVoice {
    async fn connect(
        &self,
        channel: ChannelRef,
        on_disconnect: DisconnectNotifier,
    ) -> Result<Box<dyn VoiceConnection>, VoiceError> {
        let mut log = self.log();
        if log.fail_connect {
            return Err(VoiceError::ConnectFailed {
                channel,
                reason: "refused by test".to_string(),
            });
        }
        log.connects.push(channel);
        log.disconnects.push(on_disconnect);
        Ok(Box::new(MockConnection {
            channel,
            log: Arc::clone(&self.log),
            destroyed: false,
        }))
    }
}

impl AudioBackend for MockVoice {
    fn create_player(&self, _connection: &dyn VoiceConnection) -> Result<Box<dyn AudioPlayer>, VoiceError> {
        self.log().players_created += 1;
        Ok(Box::new(MockPlayer {
            log: Arc::clone(&self.log),
        }))
    }
}

struct MockConnection {
    channel: ChannelRef,
    log: Arc<Mutex<VoiceLog>>,
    destroyed: bool,
}

impl VoiceConnection for MockConnection {
    fn channel(&self) -> ChannelRef {
        self.channel
    }

    fn destroy(&mut self) {
        if !self.destroyed {
            self.destroyed = true;
            self.log.lock().unwrap().destroys += 1;
        }
    }
}

struct MockPlayer {
    log: Arc<Mutex<VoiceLog>>,
}

impl AudioPlayer for MockPlayer {
    fn play(&mut self, source: AudioSource, notifier: PlayerNotifier) -> Result<(), VoiceError> {
        let mut log = self.log.lock().unwrap();
        log.plays.push(source.describe());
        log.history.push(notifier.clone());
        log.current = Some(notifier);
        Ok(())
    }

    fn pause(&mut self) -> bool {
        self.log.lock().unwrap().pauses += 1;
        true
    }

    fn resume(&mut self) -> bool {
        self.log.lock().unwrap().resumes += 1;
        true
    }

    fn stop(&mut self) {
        let mut log = self.log.lock().unwrap();
        log.stops += 1;
        log.current = None;
    }
}

// ============================================================================
// Scripted track source
// ============================================================================

/// What a scripted link resolves to
#[derive(Debug, Clone)]
pub enum Outcome {
    Play,
    Fail(ResolveError),
    /// Never resolves
    Hang,
}

/// Links without a script resolve to a playable empty stream
#[derive(Default)]
pub struct ScriptedSource {
    scripts: Mutex<HashMap<String, (Duration, Outcome)>>,
    calls: Mutex<Vec<String>>,
}

impl ScriptedSource {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn script(&self, link: &str, outcome: Outcome) {
        self.script_delayed(link, Duration::ZERO, outcome);
    }

    pub fn script_delayed(&self, link: &str, delay: Duration, outcome: Outcome) {
        self.scripts.lock().unwrap().insert(link.to_string(), (delay, outcome));
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl TrackSource for ScriptedSource {
    async fn resolve(&self, link: &str) -> Result<AudioSource, ResolveError> {
        self.calls.lock().unwrap().push(link.to_string());
        let (delay, outcome) = self
            .scripts
            .lock()
            .unwrap()
            .get(link)
            .cloned()
            .unwrap_or((Duration::ZERO, Outcome::Play));

        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        match outcome {
            Outcome::Play => Ok(AudioSource::stream(
                link,
                Box::pin(futures::stream::empty::<std::io::Result<Bytes>>()),
            )),
            Outcome::Fail(e) => Err(e),
            Outcome::Hang => std::future::pending().await,
        }
    }
}

// ============================================================================
// Signal recorder
// ============================================================================

#[derive(Clone)]
pub struct SignalRecorder {
    seen: Arc<Mutex<Vec<(SignalKind, TenantId)>>>,
}

impl SignalRecorder {
    pub fn attach(bus: &SignalBus) -> Self {
        let seen = Arc::new(Mutex::new(Vec::new()));
        for kind in [SignalKind::PlaybackStarted, SignalKind::PlaybackStopped] {
            let seen = Arc::clone(&seen);
            bus.subscribe(kind, move |signal| {
                seen.lock().unwrap().push((signal.kind, signal.tenant));
            });
        }
        Self { seen }
    }

    pub fn events(&self) -> Vec<(SignalKind, TenantId)> {
        self.seen.lock().unwrap().clone()
    }

    pub fn count(&self, kind: SignalKind, tenant: TenantId) -> usize {
        self.events().iter().filter(|(k, t)| *k == kind && *t == tenant).count()
    }
}

// ============================================================================
// Engine harness
// ============================================================================

pub struct Harness {
    pub engine: PlaybackEngine,
    pub voice: MockVoice,
    pub source: Arc<ScriptedSource>,
    pub signals: SignalBus,
    pub recorder: SignalRecorder,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_source(ScriptedSource::new())
    }

    pub fn with_source(source: Arc<ScriptedSource>) -> Self {
        let voice = MockVoice::new();
        let signals = SignalBus::new();
        let recorder = SignalRecorder::attach(&signals);
        let engine = PlaybackEngine::new(
            source.clone(),
            voice.connector(),
            voice.backend(),
            signals.clone(),
        );
        Self {
            engine,
            voice,
            source,
            signals,
            recorder,
        }
    }
}
