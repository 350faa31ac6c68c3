//! Process-wide signal for unrecoverable authentication failure.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use tokio::sync::broadcast;

/// Name of the failure signal, for shells that route events by name.
pub const AUTH_FAILURE_EVENT: &str = "auth-failure";

const CHANNEL_CAPACITY: usize = 16;

/// Emitted once per failed renewal cycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AuthFailure {
    /// Renewal cycle that failed.
    pub cycle: u64,
}

impl AuthFailure {
    pub fn name(&self) -> &'static str {
        AUTH_FAILURE_EVENT
    }
}

/// Handle returned by [`FailureNotifier::subscribe`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Handler = Arc<dyn Fn(&AuthFailure) + Send + Sync>;

struct Inner {
    handlers: RwLock<Vec<(SubscriptionId, Handler)>>,
    sender: broadcast::Sender<AuthFailure>,
    next_id: AtomicU64,
    emitted: AtomicU64,
}

/// Publish/subscribe channel between the client and the application shell.
///
/// Cloning yields another handle to the same channel. Handlers run
/// synchronously on the emitting task; async consumers use [`listen`].
///
/// [`listen`]: FailureNotifier::listen
#[derive(Clone)]
pub struct FailureNotifier {
    inner: Arc<Inner>,
}

impl FailureNotifier {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self {
            inner: Arc::new(Inner {
                handlers: RwLock::new(Vec::new()),
                sender,
                next_id: AtomicU64::new(0),
                emitted: AtomicU64::new(0),
            }),
        }
    }

    /// Register a handler, typically one that clears local state and
    /// navigates to a login surface.
    pub fn subscribe<F>(&self, handler: F) -> SubscriptionId
    where
        F: Fn(&AuthFailure) + Send + Sync + 'static,
    {
        let id = SubscriptionId(self.inner.next_id.fetch_add(1, Ordering::Relaxed));
        self.inner
            .handlers
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .push((id, Arc::new(handler)));
        id
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut handlers = self.inner.handlers.write().unwrap_or_else(|e| e.into_inner());
        let before = handlers.len();
        handlers.retain(|(existing, _)| *existing != id);
        handlers.len() != before
    }

    /// Receive failures asynchronously.
    pub fn listen(&self) -> broadcast::Receiver<AuthFailure> {
        self.inner.sender.subscribe()
    }

    pub fn emit(&self, event: AuthFailure) {
        self.inner.emitted.fetch_add(1, Ordering::Relaxed);

        // Handlers may subscribe or unsubscribe, so call them outside the lock.
        let handlers: Vec<Handler> = self
            .inner
            .handlers
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .map(|(_, handler)| Arc::clone(handler))
            .collect();

        tracing::warn!(
            event = AUTH_FAILURE_EVENT,
            cycle = event.cycle,
            handlers = handlers.len(),
            "Emitting authentication failure"
        );

        for handler in handlers {
            handler(&event);
        }

        // No listeners is fine.
        let _ = self.inner.sender.send(event);
    }

    /// Number of events emitted over the notifier's lifetime.
    pub fn emitted(&self) -> u64 {
        self.inner.emitted.load(Ordering::Relaxed)
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner
            .handlers
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .len()
    }
}

impl Default for FailureNotifier {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for FailureNotifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FailureNotifier")
            .field("subscribers", &self.subscriber_count())
            .field("emitted", &self.emitted())
            .finish()
    }
}
