//! Single-flight credential renewal.
//!
//! [`RefreshCoordinator`] is the only owner of the renewal state machine:
//!
//! ```text
//! Idle --(first caller)--> Refreshing --(renewal settles)--> Idle
//! ```
//!
//! The first caller to arrive while `Idle` becomes the leader and performs the
//! one renewal call. Callers arriving while `Refreshing` are parked on a FIFO
//! queue of oneshot channels and never start a renewal of their own. When the
//! renewal settles, the store is updated, the state returns to `Idle` and the
//! whole queue is taken in one critical section, then every parked caller
//! receives the same outcome in arrival order.
//!
//! The check-and-transition runs under a `std::sync::Mutex` that is never held
//! across an `.await`, so the guarantee holds on the multi-threaded runtime.

use std::collections::VecDeque;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use tokio::sync::oneshot;
use tracing::Instrument;

use super::{AccessToken, AuthFailure, CredentialStore, FailureNotifier, RefreshError, Renewer};
use crate::observability::{AuthMetrics, refresh_span};

/// Upper bound on one renewal call.
pub const DEFAULT_REFRESH_TIMEOUT: Duration = Duration::from_secs(30);

type Outcome = std::result::Result<AccessToken, RefreshError>;
type Waiter = oneshot::Sender<Outcome>;

enum RefreshState {
    Idle,
    Refreshing {
        cycle: u64,
        waiters: VecDeque<Waiter>,
    },
}

enum Role {
    Leader(u64),
    Follower(oneshot::Receiver<Outcome>),
}

pub struct RefreshCoordinator {
    state: Mutex<RefreshState>,
    cycles: AtomicU64,
    store: Arc<CredentialStore>,
    renewer: Arc<dyn Renewer>,
    notifier: FailureNotifier,
    timeout: Duration,
    metrics: Arc<AuthMetrics>,
}

impl RefreshCoordinator {
    pub fn new(
        store: Arc<CredentialStore>,
        renewer: Arc<dyn Renewer>,
        notifier: FailureNotifier,
    ) -> Self {
        Self {
            state: Mutex::new(RefreshState::Idle),
            cycles: AtomicU64::new(0),
            store,
            renewer,
            notifier,
            timeout: DEFAULT_REFRESH_TIMEOUT,
            metrics: Arc::new(AuthMetrics::new()),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_metrics(mut self, metrics: Arc<AuthMetrics>) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn is_refreshing(&self) -> bool {
        matches!(*self.lock_state(), RefreshState::Refreshing { .. })
    }

    /// Callers currently parked behind the in-flight renewal.
    pub fn queued(&self) -> usize {
        match &*self.lock_state() {
            RefreshState::Refreshing { waiters, .. } => waiters.len(),
            RefreshState::Idle => 0,
        }
    }

    /// Renewal cycles started so far.
    pub fn cycles(&self) -> u64 {
        self.cycles.load(Ordering::Relaxed)
    }

    /// Obtain a renewed credential, sharing any renewal already in flight.
    ///
    /// Always renews when called while idle, even if the store was updated
    /// since the rejection that prompted the call.
    pub async fn ensure_fresh_credential(&self) -> Outcome {
        match self.join() {
            Role::Leader(cycle) => self.lead(cycle).await,
            Role::Follower(rx) => rx.await.unwrap_or(Err(RefreshError::Abandoned)),
        }
    }

    fn lock_state(&self) -> MutexGuard<'_, RefreshState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn join(&self) -> Role {
        let mut state = self.lock_state();
        match &mut *state {
            RefreshState::Refreshing { cycle, waiters } => {
                let (tx, rx) = oneshot::channel();
                waiters.push_back(tx);
                self.metrics.callers_queued.inc();
                self.metrics.waiting.inc();
                tracing::debug!(
                    cycle = *cycle,
                    position = waiters.len(),
                    "Renewal in flight, queuing caller"
                );
                Role::Follower(rx)
            }
            RefreshState::Idle => {
                let cycle = self.cycles.fetch_add(1, Ordering::Relaxed) + 1;
                *state = RefreshState::Refreshing {
                    cycle,
                    waiters: VecDeque::new(),
                };
                self.metrics.renewals_started.inc();
                Role::Leader(cycle)
            }
        }
    }

    async fn lead(&self, cycle: u64) -> Outcome {
        let span = refresh_span(cycle);
        let mut guard = CycleGuard {
            coordinator: self,
            cycle,
            armed: true,
        };
        let started = Instant::now();

        let outcome = async {
            tracing::info!(renewer = self.renewer.name(), "Renewing access credential");
            match tokio::time::timeout(self.timeout, self.renewer.renew()).await {
                Ok(outcome) => outcome,
                Err(_) => Err(RefreshError::Timeout(self.timeout)),
            }
        }
        .instrument(span.clone())
        .await;

        guard.disarm();
        span.record("latency_ms", started.elapsed().as_millis() as u64);
        span.record("outcome", if outcome.is_ok() { "success" } else { "failure" });
        let outcome = span.in_scope(|| self.settle(cycle, outcome));

        // Persist after the state lock is released and the queue is flushed.
        self.store.flush().instrument(span).await;
        outcome
    }

    fn settle(&self, cycle: u64, outcome: Outcome) -> Outcome {
        let waiters = {
            let mut state = self.lock_state();

            // Memory first, so anyone entering after the transition to Idle
            // already reads the outcome of this cycle. Storage is written by
            // the leader once this lock is released.
            match &outcome {
                Ok(token) => self.store.stage(Some(token.clone())),
                Err(e) if e.forces_logout() => self.store.stage(None),
                Err(_) => {}
            }

            match std::mem::replace(&mut *state, RefreshState::Idle) {
                RefreshState::Refreshing { waiters, .. } => waiters,
                RefreshState::Idle => VecDeque::new(),
            }
        };
        self.metrics.waiting.set(0);

        let queued = waiters.len();
        for waiter in waiters {
            // A closed receiver is a caller that was cancelled while parked.
            let _ = waiter.send(outcome.clone());
        }

        match &outcome {
            Ok(_) => {
                self.metrics.renewals_succeeded.inc();
                tracing::info!(cycle, queued, "Access credential renewed");
            }
            Err(e) => {
                self.metrics.renewals_failed.inc();
                tracing::warn!(cycle, queued, error = %e, "Access credential renewal failed");
                if e.forces_logout() {
                    self.metrics.logouts_signalled.inc();
                    self.notifier.emit(AuthFailure { cycle });
                }
            }
        }

        outcome
    }
}

impl fmt::Debug for RefreshCoordinator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RefreshCoordinator")
            .field("renewer", &self.renewer.name())
            .field("refreshing", &self.is_refreshing())
            .field("queued", &self.queued())
            .field("cycles", &self.cycles())
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// Returns the machine to `Idle` if the leading future is dropped or unwinds
/// before the renewal settles.
struct CycleGuard<'a> {
    coordinator: &'a RefreshCoordinator,
    cycle: u64,
    armed: bool,
}

impl CycleGuard<'_> {
    fn disarm(&mut self) {
        self.armed = false;
    }
}

impl Drop for CycleGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            tracing::warn!(cycle = self.cycle, "Renewal dropped before settling");
            let _ = self
                .coordinator
                .settle(self.cycle, Err(RefreshError::Abandoned));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::AtomicUsize;
    use tokio::sync::Semaphore;

    use crate::auth::{CredentialStorage, MemoryStorage};

    struct ScriptedRenewer {
        calls: AtomicUsize,
        gate: Semaphore,
        outcomes: Mutex<VecDeque<Outcome>>,
    }

    impl ScriptedRenewer {
        /// Every call blocks until `release` is called.
        fn gated(outcomes: Vec<Outcome>) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                gate: Semaphore::new(0),
                outcomes: Mutex::new(outcomes.into()),
            }
        }

        fn open(outcomes: Vec<Outcome>) -> Self {
            let renewer = Self::gated(outcomes);
            renewer.gate.add_permits(64);
            renewer
        }

        fn release(&self) {
            self.gate.add_permits(1);
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Renewer for ScriptedRenewer {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn renew(&self) -> Outcome {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let permit = self
                .gate
                .acquire()
                .await
                .map_err(|_| RefreshError::Abandoned)?;
            permit.forget();
            self.outcomes
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(RefreshError::Network("script exhausted".into())))
        }
    }

    struct Harness {
        coordinator: Arc<RefreshCoordinator>,
        renewer: Arc<ScriptedRenewer>,
        store: Arc<CredentialStore>,
        notifier: FailureNotifier,
    }

    fn harness(renewer: ScriptedRenewer) -> Harness {
        let renewer = Arc::new(renewer);
        let store = Arc::new(CredentialStore::in_memory());
        store.stage(Some(token("T1")));
        let notifier = FailureNotifier::new();
        let coordinator = Arc::new(RefreshCoordinator::new(
            Arc::clone(&store),
            renewer.clone(),
            notifier.clone(),
        ));
        Harness {
            coordinator,
            renewer,
            store,
            notifier,
        }
    }

    fn token(value: &str) -> AccessToken {
        AccessToken::new(value)
    }

    async fn wait_until(mut condition: impl FnMut() -> bool) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while !condition() {
                tokio::task::yield_now().await;
            }
        })
        .await
        .expect("condition not reached in time");
    }

    fn spawn_caller(
        coordinator: &Arc<RefreshCoordinator>,
    ) -> tokio::task::JoinHandle<Outcome> {
        let coordinator = Arc::clone(coordinator);
        tokio::spawn(async move { coordinator.ensure_fresh_credential().await })
    }

    #[tokio::test]
    async fn test_concurrent_callers_share_one_renewal() {
        let h = harness(ScriptedRenewer::gated(vec![Ok(token("T2"))]));

        let callers: Vec<_> = (0..5).map(|_| spawn_caller(&h.coordinator)).collect();
        wait_until(|| h.coordinator.queued() == 4).await;
        assert_eq!(h.renewer.calls(), 1);

        h.renewer.release();
        for caller in callers {
            assert_eq!(caller.await.unwrap().unwrap(), token("T2"));
        }

        assert_eq!(h.renewer.calls(), 1);
        assert_eq!(h.store.get(), Some(token("T2")));
        assert!(!h.coordinator.is_refreshing());
        assert_eq!(h.coordinator.queued(), 0);
        assert_eq!(h.notifier.emitted(), 0);
    }

    #[tokio::test]
    async fn test_queued_callers_resolve_in_arrival_order() {
        let h = harness(ScriptedRenewer::gated(vec![Ok(token("T2"))]));
        let order = Arc::new(Mutex::new(Vec::new()));

        let leader = spawn_caller(&h.coordinator);
        wait_until(|| h.coordinator.is_refreshing()).await;

        let mut followers = Vec::new();
        for label in ["A", "B", "C"] {
            let coordinator = Arc::clone(&h.coordinator);
            let order = Arc::clone(&order);
            let expected = h.coordinator.queued() + 1;
            followers.push(tokio::spawn(async move {
                let outcome = coordinator.ensure_fresh_credential().await;
                order.lock().unwrap().push(label);
                outcome
            }));
            wait_until(|| h.coordinator.queued() == expected).await;
        }

        h.renewer.release();
        for follower in followers {
            assert!(follower.await.unwrap().is_ok());
        }
        assert!(leader.await.unwrap().is_ok());

        assert_eq!(*order.lock().unwrap(), vec!["A", "B", "C"]);
    }

    #[tokio::test]
    async fn test_failure_rejects_everyone_and_signals_once() {
        let h = harness(ScriptedRenewer::gated(vec![Err(RefreshError::Rejected {
            status: 500,
            body: "down".into(),
        })]));
        let signals = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&signals);
        h.notifier.subscribe(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        let callers: Vec<_> = (0..4).map(|_| spawn_caller(&h.coordinator)).collect();
        wait_until(|| h.coordinator.queued() == 3).await;
        h.renewer.release();

        for caller in callers {
            let err = caller.await.unwrap().unwrap_err();
            assert_eq!(err.status_code(), Some(500));
        }

        assert!(h.store.get().is_none());
        assert_eq!(signals.load(Ordering::SeqCst), 1);
        assert_eq!(h.notifier.emitted(), 1);
        assert!(!h.coordinator.is_refreshing());
    }

    #[tokio::test]
    async fn test_stuck_renewal_times_out_as_failure() {
        let renewer = ScriptedRenewer::gated(vec![Ok(token("never"))]);
        let h = harness(renewer);
        let coordinator = Arc::new(
            RefreshCoordinator::new(
                Arc::clone(&h.store),
                h.renewer.clone(),
                h.notifier.clone(),
            )
            .with_timeout(Duration::from_millis(50)),
        );

        let follower = {
            let leader = spawn_caller(&coordinator);
            wait_until(|| coordinator.is_refreshing()).await;
            let follower = spawn_caller(&coordinator);
            wait_until(|| coordinator.queued() == 1).await;
            assert_eq!(
                leader.await.unwrap().unwrap_err(),
                RefreshError::Timeout(Duration::from_millis(50))
            );
            follower
        };

        assert!(matches!(
            follower.await.unwrap(),
            Err(RefreshError::Timeout(_))
        ));
        assert!(h.store.get().is_none());
        assert_eq!(h.notifier.emitted(), 1);
        assert!(!coordinator.is_refreshing());
    }

    #[tokio::test]
    async fn test_machine_is_reusable_and_renews_despite_newer_credential() {
        let h = harness(ScriptedRenewer::open(vec![
            Ok(token("T2")),
            Ok(token("T4")),
        ]));

        assert_eq!(
            h.coordinator.ensure_fresh_credential().await.unwrap(),
            token("T2")
        );

        // Another code path stores a newer credential; a later call still renews.
        h.store.set(Some(token("T3"))).await;
        assert_eq!(
            h.coordinator.ensure_fresh_credential().await.unwrap(),
            token("T4")
        );

        assert_eq!(h.renewer.calls(), 2);
        assert_eq!(h.coordinator.cycles(), 2);
        assert_eq!(h.store.get(), Some(token("T4")));
    }

    #[tokio::test]
    async fn test_dropped_leader_releases_queue() {
        let h = harness(ScriptedRenewer::gated(vec![Ok(token("T2"))]));

        let leader = spawn_caller(&h.coordinator);
        wait_until(|| h.coordinator.is_refreshing()).await;
        let follower = spawn_caller(&h.coordinator);
        wait_until(|| h.coordinator.queued() == 1).await;

        leader.abort();

        assert_eq!(follower.await.unwrap(), Err(RefreshError::Abandoned));
        assert!(!h.coordinator.is_refreshing());
        assert_eq!(h.store.get(), Some(token("T1")));
        assert_eq!(h.notifier.emitted(), 0);
    }

    #[tokio::test]
    async fn test_cancelled_follower_does_not_block_others() {
        let h = harness(ScriptedRenewer::gated(vec![Ok(token("T2"))]));

        let leader = spawn_caller(&h.coordinator);
        wait_until(|| h.coordinator.is_refreshing()).await;
        let cancelled = spawn_caller(&h.coordinator);
        wait_until(|| h.coordinator.queued() == 1).await;
        let survivor = spawn_caller(&h.coordinator);
        wait_until(|| h.coordinator.queued() == 2).await;

        cancelled.abort();
        h.renewer.release();

        assert_eq!(survivor.await.unwrap().unwrap(), token("T2"));
        assert_eq!(leader.await.unwrap().unwrap(), token("T2"));
    }

    #[tokio::test]
    async fn test_metrics_track_cycle() {
        let h = harness(ScriptedRenewer::gated(vec![Ok(token("T2"))]));
        let metrics = Arc::new(AuthMetrics::new());
        let coordinator = Arc::new(
            RefreshCoordinator::new(
                Arc::clone(&h.store),
                h.renewer.clone(),
                h.notifier.clone(),
            )
            .with_metrics(Arc::clone(&metrics)),
        );

        let callers: Vec<_> = (0..3).map(|_| spawn_caller(&coordinator)).collect();
        wait_until(|| coordinator.queued() == 2).await;
        assert_eq!(metrics.snapshot().waiting, 2);
        h.renewer.release();
        for caller in callers {
            caller.await.unwrap().unwrap();
        }

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.renewals_started, 1);
        assert_eq!(snapshot.renewals_succeeded, 1);
        assert_eq!(snapshot.callers_queued, 2);
        assert_eq!(snapshot.waiting, 0);
    }

    /// Storage whose saves wait on a gate.
    struct GatedStorage {
        inner: MemoryStorage,
        saving: tokio::sync::Notify,
        gate: Semaphore,
    }

    #[async_trait]
    impl CredentialStorage for GatedStorage {
        fn name(&self) -> &str {
            "gated"
        }

        async fn load(&self) -> crate::Result<Option<AccessToken>> {
            self.inner.load().await
        }

        async fn save(&self, token: &AccessToken) -> crate::Result<()> {
            self.saving.notify_one();
            let _permit = self.gate.acquire().await;
            self.inner.save(token).await
        }

        async fn clear(&self) -> crate::Result<()> {
            self.inner.clear().await
        }
    }

    #[tokio::test]
    async fn test_persistence_runs_outside_state_lock() {
        let storage = Arc::new(GatedStorage {
            inner: MemoryStorage::with_token("T1"),
            saving: tokio::sync::Notify::new(),
            gate: Semaphore::new(0),
        });
        let store = Arc::new(
            CredentialStore::load(Arc::clone(&storage) as Arc<dyn CredentialStorage>).await,
        );
        let renewer = Arc::new(ScriptedRenewer::open(vec![
            Ok(token("T2")),
            Ok(token("T3")),
        ]));
        let coordinator = Arc::new(RefreshCoordinator::new(
            Arc::clone(&store),
            renewer.clone(),
            FailureNotifier::new(),
        ));

        let leader = spawn_caller(&coordinator);
        storage.saving.notified().await;

        // The cycle is settled and visible while the save is still pending.
        assert!(!coordinator.is_refreshing());
        assert_eq!(store.get(), Some(token("T2")));
        assert_eq!(storage.inner.current(), Some(token("T1")));

        // A new cycle can start without waiting on storage.
        let next = spawn_caller(&coordinator);
        wait_until(|| renewer.calls() == 2).await;

        storage.gate.add_permits(2);
        assert_eq!(leader.await.unwrap().unwrap(), token("T2"));
        assert_eq!(next.await.unwrap().unwrap(), token("T3"));
        assert_eq!(storage.inner.current(), Some(token("T3")));
    }
}
