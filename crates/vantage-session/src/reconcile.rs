//! Keeps the registry in step with lifecycle notifications

use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::JoinHandle;
use vantage_events::BusMessage;

use crate::registry::SessionRegistry;

/// Reload the registry on every notification.
///
/// The notification payload is never applied directly; a reload is
/// idempotent, so duplicated or reordered notifications converge on the
/// backend's state. Ends when the bus goes away.
pub fn spawn_reconciler(
    registry: SessionRegistry,
    mut messages: broadcast::Receiver<BusMessage>,
    reload_attempts: u32,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            match messages.recv().await {
                Ok(BusMessage::Lifecycle(event)) => {
                    tracing::debug!(
                        kind = %event.kind,
                        session_id = %event.session_id,
                        "Reconciling after notification"
                    );
                }
                Ok(BusMessage::Reconnected) => {
                    tracing::info!("Event bus reconnected, reloading sessions");
                }
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "Missed lifecycle notifications, reloading sessions");
                }
                Err(RecvError::Closed) => break,
            }

            if let Err(e) = registry.reload_with_retry(reload_attempts).await {
                tracing::warn!(error = %e, "Session reload failed");
            }
        }

        tracing::debug!("Reconciler stopped");
    })
}
