//! Signal bus for foreground/ambient playback coordination
//!
//! Provides the two named playback signals and the process-wide bus that
//! delivers them.
//!
//! # Delivery model
//!
//! - Handlers registered with [`SignalBus::subscribe`] are invoked synchronously
//!   inside [`SignalBus::publish`], in subscription order.
//! - No buffering: a handler registered after a publish never observes it.
//! - Signals of different kinds carry no ordering guarantee relative to each other.
//! - [`SignalBus::watch`] additionally exposes a tokio broadcast receiver for
//!   async observers (e.g. SSE clients). Lagging receivers lose old signals.

mod signal_types;

pub use signal_types::{Signal, SignalKind};

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::broadcast;
use tracing::debug;

use crate::types::TenantId;

/// Capacity of the async tap; synchronous handlers are unaffected by it
const TAP_CAPACITY: usize = 100;

/// Handle identifying one registration on the bus
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Handler = Arc<dyn Fn(&Signal) + Send + Sync>;

struct Subscriber {
    id: SubscriptionId,
    handler: Handler,
    once: bool,
}

struct BusInner {
    next_id: AtomicU64,
    subscribers: Mutex<HashMap<SignalKind, Vec<Subscriber>>>,
    tap: broadcast::Sender<Signal>,
}

/// Process-wide publish/subscribe channel for playback signals
///
/// Cloning is cheap; all clones share the same subscriber table.
///
/// # Examples
///
/// ```
/// use goro_common::events::{SignalBus, SignalKind};
/// use goro_common::types::TenantId;
/// use std::sync::atomic::{AtomicUsize, Ordering};
/// use std::sync::Arc;
///
/// let bus = SignalBus::new();
/// let seen = Arc::new(AtomicUsize::new(0));
///
/// let counter = Arc::clone(&seen);
/// bus.subscribe(SignalKind::PlaybackStarted, move |_| {
///     counter.fetch_add(1, Ordering::SeqCst);
/// });
///
/// bus.publish_for(SignalKind::PlaybackStarted, TenantId::new(1));
/// assert_eq!(seen.load(Ordering::SeqCst), 1);
/// ```
#[derive(Clone)]
pub struct SignalBus {
    inner: Arc<BusInner>,
}

impl SignalBus {
    pub fn new() -> Self {
        let (tap, _) = broadcast::channel(TAP_CAPACITY);
        Self {
            inner: Arc::new(BusInner {
                next_id: AtomicU64::new(1),
                subscribers: Mutex::new(HashMap::new()),
                tap,
            }),
        }
    }

    /// Register a handler for every future signal of `kind`
    pub fn subscribe<F>(&self, kind: SignalKind, handler: F) -> SubscriptionId
    where
        F: Fn(&Signal) + Send + Sync + 'static,
    {
        self.register(kind, Arc::new(handler), false)
    }

    /// Register a handler that is removed after its first delivery
    pub fn once<F>(&self, kind: SignalKind, handler: F) -> SubscriptionId
    where
        F: Fn(&Signal) + Send + Sync + 'static,
    {
        self.register(kind, Arc::new(handler), true)
    }

    /// Remove one registration
    ///
    /// Returns `false` if the registration was already gone (unsubscribed, or a
    /// one-shot handler that has fired).
    pub fn unsubscribe(&self, kind: SignalKind, id: SubscriptionId) -> bool {
        let mut table = self.table();
        let Some(list) = table.get_mut(&kind) else {
            return false;
        };

        match list.iter().position(|s| s.id == id) {
            Some(index) => {
                list.remove(index);
                true
            }
            None => false,
        }
    }

    /// Deliver a signal to every current subscriber of its kind
    ///
    /// Handlers run on the caller's task, in subscription order, outside the
    /// table lock so a handler may itself subscribe or publish.
    ///
    /// Returns the number of handlers invoked.
    pub fn publish(&self, signal: Signal) -> usize {
        let handlers: Vec<Handler> = {
            let mut table = self.table();
            match table.get_mut(&signal.kind) {
                Some(list) => {
                    let handlers = list.iter().map(|s| Arc::clone(&s.handler)).collect();
                    list.retain(|s| !s.once);
                    handlers
                }
                None => Vec::new(),
            }
        };

        debug!(
            signal = signal.kind.name(),
            tenant = %signal.tenant,
            handlers = handlers.len(),
            "Publishing signal"
        );

        for handler in &handlers {
            handler(&signal);
        }

        // No async observers is fine
        let _ = self.inner.tap.send(signal);

        handlers.len()
    }

    /// Convenience wrapper stamping a new signal with the current time
    pub fn publish_for(&self, kind: SignalKind, tenant: TenantId) -> usize {
        self.publish(Signal::now(kind, tenant))
    }

    /// Async view of all signals published after this call
    pub fn watch(&self) -> broadcast::Receiver<Signal> {
        self.inner.tap.subscribe()
    }

    /// Number of handlers currently registered for `kind`
    pub fn subscriber_count(&self, kind: SignalKind) -> usize {
        self.table().get(&kind).map(Vec::len).unwrap_or(0)
    }

    fn register(&self, kind: SignalKind, handler: Handler, once: bool) -> SubscriptionId {
        let id = SubscriptionId(self.inner.next_id.fetch_add(1, Ordering::Relaxed));
        self.table()
            .entry(kind)
            .or_default()
            .push(Subscriber { id, handler, once });
        id
    }

    fn table(&self) -> MutexGuard<'_, HashMap<SignalKind, Vec<Subscriber>>> {
        // Handlers never run under this lock, so a poisoned table is still consistent
        self.inner
            .subscribers
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Default for SignalBus {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for SignalBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignalBus")
            .field("started_subscribers", &self.subscriber_count(SignalKind::PlaybackStarted))
            .field("stopped_subscribers", &self.subscriber_count(SignalKind::PlaybackStopped))
            .finish()
    }
}

// ========================================
// Tests
// ========================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    fn recorder(bus: &SignalBus, kind: SignalKind, label: &'static str, log: &Arc<Mutex<Vec<String>>>) -> SubscriptionId {
        let log = Arc::clone(log);
        bus.subscribe(kind, move |signal| {
            log.lock().unwrap().push(format!("{}:{}", label, signal.kind.name()));
        })
    }

    #[test]
    fn test_delivery_preserves_subscribe_order() {
        let bus = SignalBus::new();
        let log = Arc::new(Mutex::new(Vec::new()));

        recorder(&bus, SignalKind::PlaybackStarted, "a", &log);
        recorder(&bus, SignalKind::PlaybackStarted, "b", &log);
        recorder(&bus, SignalKind::PlaybackStarted, "c", &log);

        assert_eq!(bus.publish_for(SignalKind::PlaybackStarted, TenantId::new(1)), 3);
        assert_eq!(
            *log.lock().unwrap(),
            vec!["a:playback-started", "b:playback-started", "c:playback-started"]
        );
    }

    #[test]
    fn test_kinds_are_isolated() {
        let bus = SignalBus::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        recorder(&bus, SignalKind::PlaybackStopped, "stop", &log);

        assert_eq!(bus.publish_for(SignalKind::PlaybackStarted, TenantId::new(1)), 0);
        assert!(log.lock().unwrap().is_empty());
    }

    #[test]
    fn test_late_subscriber_misses_earlier_publish() {
        let bus = SignalBus::new();
        bus.publish_for(SignalKind::PlaybackStarted, TenantId::new(1));

        let log = Arc::new(Mutex::new(Vec::new()));
        recorder(&bus, SignalKind::PlaybackStarted, "late", &log);
        assert!(log.lock().unwrap().is_empty());
    }

    #[test]
    fn test_unsubscribe_removes_exactly_one_registration() {
        let bus = SignalBus::new();
        let log = Arc::new(Mutex::new(Vec::new()));

        let first = recorder(&bus, SignalKind::PlaybackStopped, "first", &log);
        recorder(&bus, SignalKind::PlaybackStopped, "second", &log);

        assert!(bus.unsubscribe(SignalKind::PlaybackStopped, first));
        assert!(!bus.unsubscribe(SignalKind::PlaybackStopped, first));
        assert_eq!(bus.subscriber_count(SignalKind::PlaybackStopped), 1);

        bus.publish_for(SignalKind::PlaybackStopped, TenantId::new(9));
        assert_eq!(*log.lock().unwrap(), vec!["second:playback-stopped"]);
    }

    #[test]
    fn test_once_handler_fires_a_single_time() {
        let bus = SignalBus::new();
        let count = Arc::new(AtomicUsize::new(0));

        let counter = Arc::clone(&count);
        let id = bus.once(SignalKind::PlaybackStopped, move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        bus.publish_for(SignalKind::PlaybackStopped, TenantId::new(1));
        bus.publish_for(SignalKind::PlaybackStopped, TenantId::new(1));

        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert!(!bus.unsubscribe(SignalKind::PlaybackStopped, id));
    }

    #[test]
    fn test_handler_may_publish_reentrantly() {
        let bus = SignalBus::new();
        let count = Arc::new(AtomicUsize::new(0));

        let inner_bus = bus.clone();
        bus.subscribe(SignalKind::PlaybackStarted, move |signal| {
            inner_bus.publish_for(SignalKind::PlaybackStopped, signal.tenant);
        });
        let counter = Arc::clone(&count);
        bus.subscribe(SignalKind::PlaybackStopped, move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        bus.publish_for(SignalKind::PlaybackStarted, TenantId::new(3));
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_watch_receives_published_signals() {
        let bus = SignalBus::new();
        let mut rx = bus.watch();

        bus.publish_for(SignalKind::PlaybackStarted, TenantId::new(5));

        let received = rx.recv().await.unwrap();
        assert_eq!(received.kind, SignalKind::PlaybackStarted);
        assert_eq!(received.tenant, TenantId::new(5));
    }
}
