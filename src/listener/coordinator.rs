//! Restart coordination for one listener.

use std::sync::Arc;

use tokio::sync::{mpsc, oneshot, watch, Mutex};

use super::{ListenerKind, ListenerState, ManagedListener};

struct RestartRequest {
    flushed: Option<oneshot::Receiver<()>>,
}

struct Shared {
    kind: ListenerKind,
    current: Mutex<Option<Arc<dyn ManagedListener>>>,
    state: watch::Sender<ListenerState>,
}

/// Serializes restarts of one listener.
///
/// Restart requests are queued to a dedicated lifecycle task which, for each
/// request:
///
/// 1. moves the state to [`ListenerState::PendingShutdown`],
/// 2. waits until the response that triggered the restart was flushed,
/// 3. takes the current listener under the lock and shuts it down gracefully,
/// 4. moves the state to [`ListenerState::Closed`].
///
/// Every state change is broadcast to all subscribers. A supervisor waiting
/// for `Closed` re-arms a fresh listener with [`ListenerCoordinator::arm`].
#[derive(Clone)]
pub struct ListenerCoordinator {
    shared: Arc<Shared>,
    requests: mpsc::UnboundedSender<RestartRequest>,
}

impl ListenerCoordinator {
    /// Creates the coordinator and spawns its lifecycle task.
    ///
    /// The task ends once every clone of the coordinator is dropped.
    pub fn spawn(kind: ListenerKind) -> Self {
        let (state, _) = watch::channel(ListenerState::Idle);
        let shared = Arc::new(Shared {
            kind,
            current: Mutex::new(None),
            state,
        });
        let (requests, rx) = mpsc::unbounded_channel();
        tokio::spawn(run_lifecycle(Arc::clone(&shared), rx));
        Self { shared, requests }
    }

    /// Kind of listener this coordinator manages.
    pub fn kind(&self) -> ListenerKind {
        self.shared.kind
    }

    /// Installs a freshly bound listener and marks the coordinator idle.
    pub async fn arm(&self, listener: Arc<dyn ManagedListener>) {
        *self.shared.current.lock().await = Some(listener);
        self.shared.state.send_replace(ListenerState::Idle);
    }

    /// Marks the coordinator idle with nothing bound (e.g. HTTPS disabled).
    pub async fn disarm(&self) {
        *self.shared.current.lock().await = None;
        self.shared.state.send_replace(ListenerState::Idle);
    }

    /// Whether a listener is currently installed and serving.
    pub async fn is_bound(&self) -> bool {
        match self.shared.current.lock().await.as_ref() {
            Some(listener) => listener.is_bound(),
            None => false,
        }
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ListenerState {
        *self.shared.state.borrow()
    }

    /// Subscribes to lifecycle state changes.
    pub fn subscribe(&self) -> watch::Receiver<ListenerState> {
        self.shared.state.subscribe()
    }

    /// Requests a restart.
    ///
    /// `flushed` resolves once the triggering response was written; pass
    /// `None` when the restart does not close the connection it was requested on.
    pub fn request_restart(&self, flushed: Option<oneshot::Receiver<()>>) {
        if self.requests.send(RestartRequest { flushed }).is_err() {
            log::error!(
                "{} listener lifecycle task is gone, restart dropped",
                self.shared.kind
            );
        }
    }

    /// Shuts the current listener down without scheduling a restart.
    pub async fn shutdown_now(&self) {
        let listener = self.shared.current.lock().await.take();
        if let Some(listener) = listener {
            if let Err(e) = listener.shutdown().await {
                log::warn!("{} listener shutdown failed: {e}", self.shared.kind);
            }
        }
        self.shared.state.send_replace(ListenerState::Closed);
    }
}

async fn run_lifecycle(shared: Arc<Shared>, mut requests: mpsc::UnboundedReceiver<RestartRequest>) {
    while let Some(request) = requests.recv().await {
        shared.state.send_replace(ListenerState::PendingShutdown);

        if let Some(flushed) = request.flushed {
            if flushed.await.is_err() {
                log::debug!(
                    "{} listener restart: triggering response dropped before flush",
                    shared.kind
                );
            }
        }

        let listener = shared.current.lock().await.take();
        if let Some(listener) = listener {
            log::info!("Shutting down {} listener for restart", shared.kind);
            if let Err(e) = listener.shutdown().await {
                log::error!("{} listener shutdown failed: {e}", shared.kind);
            }
        }

        shared.state.send_replace(ListenerState::Closed);
    }
    log::debug!("{} listener lifecycle task finished", shared.kind);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error_handling::ListenerError;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::time::Duration;

    #[derive(Default)]
    struct FakeListener {
        shutdowns: AtomicUsize,
        closed: AtomicBool,
        fail: bool,
    }

    #[async_trait]
    impl ManagedListener for FakeListener {
        fn is_bound(&self) -> bool {
            !self.closed.load(Ordering::SeqCst)
        }

        async fn shutdown(&self) -> Result<(), ListenerError> {
            self.shutdowns.fetch_add(1, Ordering::SeqCst);
            self.closed.store(true, Ordering::SeqCst);
            if self.fail {
                Err(ListenerError::Serve("boom".to_string()))
            } else {
                Ok(())
            }
        }
    }

    async fn wait_for(rx: &mut watch::Receiver<ListenerState>, wanted: ListenerState) {
        tokio::time::timeout(Duration::from_secs(5), rx.wait_for(|s| *s == wanted))
            .await
            .expect("state change timed out")
            .unwrap();
    }

    #[tokio::test]
    async fn test_restart_waits_for_flush_ack() {
        let coordinator = ListenerCoordinator::spawn(ListenerKind::Https);
        let listener = Arc::new(FakeListener::default());
        coordinator.arm(listener.clone()).await;
        assert!(coordinator.is_bound().await);

        let mut states = coordinator.subscribe();
        let (ack, flushed) = oneshot::channel();
        coordinator.request_restart(Some(flushed));

        wait_for(&mut states, ListenerState::PendingShutdown).await;
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(listener.shutdowns.load(Ordering::SeqCst), 0);
        assert_eq!(coordinator.state(), ListenerState::PendingShutdown);

        ack.send(()).unwrap();
        wait_for(&mut states, ListenerState::Closed).await;
        assert_eq!(listener.shutdowns.load(Ordering::SeqCst), 1);
        assert!(!coordinator.is_bound().await);
    }

    #[tokio::test]
    async fn test_dropped_ack_still_restarts() {
        let coordinator = ListenerCoordinator::spawn(ListenerKind::Https);
        let listener = Arc::new(FakeListener::default());
        coordinator.arm(listener.clone()).await;

        let mut states = coordinator.subscribe();
        let (ack, flushed) = oneshot::channel::<()>();
        coordinator.request_restart(Some(flushed));
        drop(ack);

        wait_for(&mut states, ListenerState::Closed).await;
        assert_eq!(listener.shutdowns.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_shutdown_failure_is_not_fatal() {
        let coordinator = ListenerCoordinator::spawn(ListenerKind::Control);
        let failing = Arc::new(FakeListener {
            fail: true,
            ..Default::default()
        });
        coordinator.arm(failing.clone()).await;

        let mut states = coordinator.subscribe();
        coordinator.request_restart(None);
        wait_for(&mut states, ListenerState::Closed).await;

        // Re-armed listeners restart normally afterwards
        let next = Arc::new(FakeListener::default());
        coordinator.arm(next.clone()).await;
        assert_eq!(coordinator.state(), ListenerState::Idle);
        coordinator.request_restart(None);
        wait_for(&mut states, ListenerState::Closed).await;
        assert_eq!(next.shutdowns.load(Ordering::SeqCst), 1);
        assert_eq!(failing.shutdowns.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_restart_without_listener_closes() {
        let coordinator = ListenerCoordinator::spawn(ListenerKind::Https);
        let mut states = coordinator.subscribe();
        coordinator.request_restart(None);
        wait_for(&mut states, ListenerState::Closed).await;
        assert!(!coordinator.is_bound().await);
    }
}
