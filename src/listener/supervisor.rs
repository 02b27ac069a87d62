//! Supervisor loop that keeps a listener armed.

use std::future::Future;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use super::{ListenerCoordinator, ListenerState, ManagedListener};
use crate::error_handling::ListenerError;

/// Keeps re-arming the coordinator's listener until `cancel` fires.
///
/// `bind` is called with the settings current at that moment; returning
/// `Ok(None)` means nothing should be served (for instance HTTPS is disabled).
/// A bind failure is logged and the loop waits for the next restart request,
/// which is how new settings reach a listener that could not start.
pub async fn supervise<F, Fut>(coordinator: ListenerCoordinator, cancel: CancellationToken, mut bind: F)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<Option<Arc<dyn ManagedListener>>, ListenerError>>,
{
    let kind = coordinator.kind();
    let mut states = coordinator.subscribe();

    loop {
        match bind().await {
            Ok(Some(listener)) => coordinator.arm(listener).await,
            Ok(None) => {
                log::info!("{kind} listener is disabled");
                coordinator.disarm().await;
            }
            Err(e) => {
                log::error!("{kind} listener failed to start: {e}");
                coordinator.disarm().await;
            }
        }

        tokio::select! {
            _ = cancel.cancelled() => {
                coordinator.shutdown_now().await;
                break;
            }
            // The watch guard must not outlive this branch
            closed = async { states.wait_for(|state| *state == ListenerState::Closed).await.is_err() } => {
                if closed {
                    break;
                }
            }
        }
        log::info!("Re-arming {kind} listener with current settings");
    }
}
