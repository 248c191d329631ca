//! Ambient controller
//!
//! Plays short filler sounds into occupied channels during idle windows. Each
//! tenant has at most one ambient session, driven by occupancy reports from the
//! chat layer ([`AmbientController::occupancy_changed`]).
//!
//! Foreground playback suspends the tenant's ambient session through the
//! signal bus: `playback-started` sets the tenant's suspension flag,
//! `playback-stopped` clears it. Sessions wait on that flag and never look at
//! the playback engine.

mod session;
pub mod sounds;

use goro_common::config::AmbientConfig;
use goro_common::events::{Signal, SignalBus, SignalKind, SubscriptionId};
use goro_common::types::{ChannelRef, TenantId};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::voice::{AudioBackend, ChannelConnector};

use session::AmbientSession;

/// Handle to the ambient controller; cheap to clone
#[derive(Clone)]
pub struct AmbientController {
    inner: Arc<ControllerInner>,
}

struct ControllerInner {
    config: Arc<AmbientConfig>,
    connector: Arc<dyn ChannelConnector>,
    backend: Arc<dyn AudioBackend>,
    signals: SignalBus,
    subscriptions: Mutex<Vec<(SignalKind, SubscriptionId)>>,
    registry: Mutex<Registry>,
}

#[derive(Default)]
struct Registry {
    tenants: HashMap<TenantId, TenantAmbient>,
    shutting_down: bool,
}

impl Registry {
    /// Forget tenants with neither a live session nor a suspension
    fn prune(&mut self) {
        self.tenants.retain(|_, entry| entry.is_needed());
    }
}

/// Per-tenant ambient bookkeeping
struct TenantAmbient {
    suspended: watch::Sender<bool>,
    session: Option<SessionHandle>,
}

struct SessionHandle {
    channel: ChannelRef,
    listeners: watch::Sender<usize>,
    task: Option<JoinHandle<()>>,
}

impl SessionHandle {
    fn is_live(&self) -> bool {
        self.task.as_ref().is_some_and(|task| !task.is_finished())
    }
}

impl TenantAmbient {
    fn new() -> Self {
        let (suspended, _) = watch::channel(false);
        Self {
            suspended,
            session: None,
        }
    }

    fn is_needed(&self) -> bool {
        *self.suspended.borrow() || self.session.as_ref().is_some_and(SessionHandle::is_live)
    }
}

impl ControllerInner {
    fn registry(&self) -> MutexGuard<'_, Registry> {
        self.registry.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn set_suspended(&self, signal: &Signal, suspended: bool) {
        let mut registry = self.registry();
        let entry = registry.tenants.entry(signal.tenant).or_insert_with(TenantAmbient::new);
        let previous = entry.suspended.send_replace(suspended);
        if previous != suspended {
            debug!(tenant = %signal.tenant, signal = %signal.kind, suspended, "Ambient suspension changed");
        }
        registry.prune();
    }
}

impl AmbientController {
    /// Create a controller and subscribe it to the playback signals
    pub fn new(
        config: AmbientConfig,
        connector: Arc<dyn ChannelConnector>,
        backend: Arc<dyn AudioBackend>,
        signals: SignalBus,
    ) -> Self {
        let inner = Arc::new(ControllerInner {
            config: Arc::new(config),
            connector,
            backend,
            signals: signals.clone(),
            subscriptions: Mutex::new(Vec::new()),
            registry: Mutex::new(Registry::default()),
        });

        // Handlers hold a weak reference; the bus outlives the controller
        let mut subscriptions = Vec::with_capacity(2);
        for (kind, suspended) in [
            (SignalKind::PlaybackStarted, true),
            (SignalKind::PlaybackStopped, false),
        ] {
            let weak: Weak<ControllerInner> = Arc::downgrade(&inner);
            let id = signals.subscribe(kind, move |signal| {
                if let Some(inner) = weak.upgrade() {
                    inner.set_suspended(signal, suspended);
                }
            });
            subscriptions.push((kind, id));
        }
        *inner
            .subscriptions
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = subscriptions;

        Self { inner }
    }

    pub fn config(&self) -> &AmbientConfig {
        &self.inner.config
    }

    /// Whether foreground playback currently suspends the tenant
    pub fn is_suspended(&self, tenant: TenantId) -> bool {
        self.inner
            .registry()
            .tenants
            .get(&tenant)
            .map(|entry| *entry.suspended.borrow())
            .unwrap_or(false)
    }

    /// Report the number of non-controller participants in a channel
    ///
    /// Starts a session when someone is present and none is running, updates
    /// the running session for the same channel, and lets it tear itself down
    /// once the count reaches zero. Reports for other channels of a tenant
    /// with a live session are ignored.
    pub fn occupancy_changed(&self, channel: ChannelRef, listeners: usize) {
        if !self.inner.config.enabled {
            return;
        }

        let mut registry = self.inner.registry();
        if registry.shutting_down {
            debug!(tenant = %channel.tenant, "Ambient controller shut down, ignoring occupancy");
            return;
        }
        registry.prune();

        let entry = registry.tenants.entry(channel.tenant).or_insert_with(TenantAmbient::new);

        if let Some(handle) = entry.session.as_ref().filter(|h| h.is_live()) {
            if handle.channel == channel {
                handle.listeners.send_replace(listeners);
                debug!(tenant = %channel.tenant, listeners, "Ambient occupancy updated");
            } else {
                debug!(
                    tenant = %channel.tenant,
                    channel = %channel.channel,
                    active = %handle.channel.channel,
                    "Ignoring occupancy for another channel"
                );
            }
            return;
        }

        if listeners == 0 {
            entry.session = None;
            registry.prune();
            return;
        }

        let (listeners_tx, listeners_rx) = watch::channel(listeners);
        let session = AmbientSession {
            channel,
            config: Arc::clone(&self.inner.config),
            connector: Arc::clone(&self.inner.connector),
            backend: Arc::clone(&self.inner.backend),
            listeners: listeners_rx,
            suspended: entry.suspended.subscribe(),
        };
        info!(tenant = %channel.tenant, channel = %channel.channel, listeners, "Starting ambient session");

        entry.session = Some(SessionHandle {
            channel,
            listeners: listeners_tx,
            task: Some(tokio::spawn(session.run())),
        });
    }

    /// Channels with a running ambient session
    pub fn active_channels(&self) -> Vec<ChannelRef> {
        let mut channels: Vec<ChannelRef> = self
            .inner
            .registry()
            .tenants
            .values()
            .filter_map(|entry| entry.session.as_ref())
            .filter(|handle| handle.is_live())
            .map(|handle| handle.channel)
            .collect();
        channels.sort_by_key(|c| (c.tenant, c.channel));
        channels
    }

    /// Tenants currently tracked (live session or suspended)
    pub fn tracked_tenants(&self) -> usize {
        let mut registry = self.inner.registry();
        registry.prune();
        registry.tenants.len()
    }

    /// End every session and detach from the signal bus
    ///
    /// Later occupancy reports are ignored.
    pub async fn shutdown(&self) {
        let subscriptions = std::mem::take(
            &mut *self
                .inner
                .subscriptions
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner()),
        );
        for (kind, id) in subscriptions {
            self.inner.signals.unsubscribe(kind, id);
        }

        let tasks: Vec<JoinHandle<()>> = {
            let mut registry = self.inner.registry();
            registry.shutting_down = true;
            let tasks = registry
                .tenants
                .values_mut()
                .filter_map(|entry| entry.session.take())
                .filter_map(|mut handle| {
                    handle.listeners.send_replace(0);
                    handle.task.take()
                })
                .collect();
            registry.tenants.clear();
            tasks
        };

        info!(sessions = tasks.len(), "Shutting down ambient controller");
        for task in tasks {
            let _ = task.await;
        }
    }
}

impl std::fmt::Debug for AmbientController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AmbientController")
            .field("active_channels", &self.active_channels())
            .finish_non_exhaustive()
    }
}
