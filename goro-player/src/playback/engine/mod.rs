//! Multi-tenant playback engine
//!
//! **Module Structure:**
//! - `mod.rs`: `PlaybackEngine` handle, session registry, public operations
//! - `session.rs`: per-tenant session worker (queue + state machine)
//!
//! Each tenant with a live session owns exactly one worker task. All queue and
//! state mutation for that tenant happens inside its worker, in mailbox order,
//! so operations on one tenant are serialized while tenants run independently.
//!
//! A worker retires once its session is back to `Idle` and its mailbox is
//! empty. Retirement and command delivery both happen under the registry lock,
//! so a command is never sent to a worker that has already decided to exit.

mod session;

use goro_common::events::SignalBus;
use goro_common::types::{ChannelRef, TenantId, TrackRequest};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::error::ControlError;
use crate::resolver::TrackSource;
use crate::voice::{AudioBackend, ChannelConnector};

use super::state::{EnqueueOutcome, QueueEntry, SessionState, SessionStatus, SkipOutcome};
use session::{SessionCommand, SessionWorker};

/// Handle to the playback engine; cheap to clone
#[derive(Clone)]
pub struct PlaybackEngine {
    shared: Arc<EngineShared>,
}

/// Collaborators shared by every session worker
pub(crate) struct EngineShared {
    pub(crate) source: Arc<dyn TrackSource>,
    pub(crate) connector: Arc<dyn ChannelConnector>,
    pub(crate) backend: Arc<dyn AudioBackend>,
    pub(crate) signals: SignalBus,
    registry: Mutex<Registry>,
}

#[derive(Default)]
struct Registry {
    sessions: HashMap<TenantId, SessionHandle>,
    next_generation: u64,
    shutting_down: bool,
}

struct SessionHandle {
    generation: u64,
    commands: mpsc::UnboundedSender<SessionCommand>,
    task: Option<JoinHandle<()>>,
}

impl EngineShared {
    fn registry(&self) -> MutexGuard<'_, Registry> {
        // Registry holds plain data; a panicked holder leaves it consistent
        self.registry.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Called by a worker whose session went idle
    ///
    /// Returns the next queued command if one arrived in the meantime, or
    /// `None` once the worker has been removed from the registry and must exit.
    pub(crate) fn retire(
        &self,
        tenant: TenantId,
        generation: u64,
        commands: &mut mpsc::UnboundedReceiver<SessionCommand>,
    ) -> Option<SessionCommand> {
        let mut registry = self.registry();
        if let Ok(cmd) = commands.try_recv() {
            return Some(cmd);
        }
        if registry
            .sessions
            .get(&tenant)
            .is_some_and(|handle| handle.generation == generation)
        {
            registry.sessions.remove(&tenant);
            debug!(tenant = %tenant, generation, "Session worker retired");
        }
        None
    }
}

impl PlaybackEngine {
    /// Create an engine; sessions are spawned on demand
    pub fn new(
        source: Arc<dyn TrackSource>,
        connector: Arc<dyn ChannelConnector>,
        backend: Arc<dyn AudioBackend>,
        signals: SignalBus,
    ) -> Self {
        Self {
            shared: Arc::new(EngineShared {
                source,
                connector,
                backend,
                signals,
                registry: Mutex::new(Registry::default()),
            }),
        }
    }

    /// Bus the engine publishes `playback-started` / `playback-stopped` on
    pub fn signals(&self) -> &SignalBus {
        &self.shared.signals
    }

    /// Append a track to the tenant's queue, starting a session if idle
    ///
    /// `channel` is only used when a new session is created; an existing
    /// session keeps the channel it connected to.
    pub async fn enqueue(
        &self,
        channel: ChannelRef,
        track: TrackRequest,
    ) -> Result<EnqueueOutcome, ControlError> {
        let (reply, rx) = oneshot::channel();
        {
            let mut registry = self.shared.registry();
            if registry.shutting_down {
                return Err(ControlError::EngineShutdown);
            }

            let tenant = channel.tenant;
            let commands = match registry.sessions.get(&tenant) {
                Some(handle) => handle.commands.clone(),
                None => self.spawn_session(&mut registry, channel),
            };
            commands
                .send(SessionCommand::Enqueue { track, reply })
                .map_err(|_| ControlError::EngineShutdown)?;
        }
        rx.await.map_err(|_| ControlError::EngineShutdown)
    }

    /// Pause the current track; pausing while paused is a no-op
    pub async fn pause(&self, tenant: TenantId) -> Result<SessionState, ControlError> {
        self.request(tenant, |reply| SessionCommand::Pause { reply })
            .await
            .unwrap_or(Err(ControlError::NotConnected))
    }

    /// Resume the current track; resuming while playing is a no-op
    pub async fn resume(&self, tenant: TenantId) -> Result<SessionState, ControlError> {
        self.request(tenant, |reply| SessionCommand::Resume { reply })
            .await
            .unwrap_or(Err(ControlError::NotConnected))
    }

    /// End the current track now and move to the next one
    pub async fn skip(&self, tenant: TenantId) -> Result<SkipOutcome, ControlError> {
        self.request(tenant, |reply| SessionCommand::Skip { reply })
            .await
            .unwrap_or(Err(ControlError::NotConnected))
    }

    /// Clear the queue and end the session
    ///
    /// Stopping an idle tenant succeeds and discards nothing. Returns how many
    /// tracks were dropped.
    pub async fn stop(&self, tenant: TenantId) -> usize {
        self.request(tenant, |reply| SessionCommand::Stop { reply })
            .await
            .unwrap_or(0)
    }

    /// Shuffle everything after the current track; returns the queue length
    pub async fn shuffle(&self, tenant: TenantId) -> Result<usize, ControlError> {
        self.request(tenant, |reply| SessionCommand::Shuffle { reply })
            .await
            .unwrap_or(Err(ControlError::NotConnected))
    }

    /// Current queue, head first; empty for idle tenants
    pub async fn queue(&self, tenant: TenantId) -> Vec<QueueEntry> {
        self.request(tenant, |reply| SessionCommand::Snapshot { reply })
            .await
            .unwrap_or_default()
    }

    pub async fn status(&self, tenant: TenantId) -> SessionStatus {
        self.request(tenant, |reply| SessionCommand::Status { reply })
            .await
            .unwrap_or_else(|| SessionStatus::idle(tenant))
    }

    /// Tenants with a live session worker
    pub fn active_tenants(&self) -> Vec<TenantId> {
        let mut tenants: Vec<TenantId> = self.shared.registry().sessions.keys().copied().collect();
        tenants.sort();
        tenants
    }

    /// Stop every session and wait for the workers to exit
    ///
    /// Further enqueues fail with [`ControlError::EngineShutdown`].
    pub async fn shutdown(&self) {
        let tasks: Vec<JoinHandle<()>> = {
            let mut registry = self.shared.registry();
            registry.shutting_down = true;
            registry
                .sessions
                .values_mut()
                .filter_map(|handle| {
                    let (reply, _) = oneshot::channel();
                    let _ = handle.commands.send(SessionCommand::Stop { reply });
                    handle.task.take()
                })
                .collect()
        };

        info!(sessions = tasks.len(), "Shutting down playback engine");
        for task in tasks {
            let _ = task.await;
        }
    }

    /// Deliver a command to an existing session and await its reply
    ///
    /// `None` means the tenant has no session.
    async fn request<T>(
        &self,
        tenant: TenantId,
        make: impl FnOnce(oneshot::Sender<T>) -> SessionCommand,
    ) -> Option<T> {
        let (reply, rx) = oneshot::channel();
        {
            let registry = self.shared.registry();
            let handle = registry.sessions.get(&tenant)?;
            handle.commands.send(make(reply)).ok()?;
        }
        rx.await.ok()
    }

    fn spawn_session(
        &self,
        registry: &mut Registry,
        channel: ChannelRef,
    ) -> mpsc::UnboundedSender<SessionCommand> {
        registry.next_generation += 1;
        let generation = registry.next_generation;

        let (tx, rx) = mpsc::unbounded_channel();
        let worker = SessionWorker::new(Arc::clone(&self.shared), channel, generation, tx.clone());
        let task = tokio::spawn(worker.run(rx));

        debug!(tenant = %channel.tenant, channel = %channel.channel, generation, "Spawned session worker");
        registry.sessions.insert(
            channel.tenant,
            SessionHandle {
                generation,
                commands: tx.clone(),
                task: Some(task),
            },
        );
        tx
    }
}

impl std::fmt::Debug for PlaybackEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlaybackEngine")
            .field("active_tenants", &self.active_tenants())
            .finish_non_exhaustive()
    }
}
