//! In-flight operation tracking and acknowledgment correlation
//!
//! Every outgoing operation that expects an acknowledgment (telemetry,
//! reported-property pushes, method responses) registers here and gets a
//! correlation id to attach to the wire payload. Acknowledgments are matched
//! strictly by id, never by arrival order. A transition out of `Connected`
//! fails every pending entry promptly, and a registration landing after that
//! sweep resolves immediately, so no caller waits past a disconnect.

use crate::connection::{ConnectionManager, ConnectionState, StatusEvent};
use crate::error::{ClientError, ClientResult};
use crate::transport::CorrelationId;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::Mutex as StdMutex;
use std::time::Instant;
use tokio::sync::{broadcast, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Kind of outgoing operation awaiting acknowledgment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationKind {
    Telemetry,
    ReportedPropertyUpdate,
    MethodResponse,
}

/// Terminal result delivered to the caller of a registered operation
pub type DeliveryResult = ClientResult<()>;

struct PendingOperation {
    kind: OperationKind,
    created_at: Instant,
    sink: oneshot::Sender<DeliveryResult>,
}

/// Tracks outgoing operations awaiting acknowledgment
pub struct DeliveryRegistry {
    manager: Arc<ConnectionManager>,
    pending: StdMutex<HashMap<CorrelationId, PendingOperation>>,
}

impl DeliveryRegistry {
    pub fn new(manager: Arc<ConnectionManager>) -> Self {
        Self {
            manager,
            pending: StdMutex::new(HashMap::new()),
        }
    }

    /// Register an outgoing operation. Returns the correlation id to attach
    /// to the wire payload and the receiver that resolves exactly once, with
    /// either the real acknowledgment or a disconnect-induced failure.
    ///
    /// The connection state is re-read under the pending lock: the state
    /// leaves `Connected` before the disconnect sweep runs, so an entry can
    /// never be inserted after the sweep and then sit unresolved.
    pub fn register(&self, kind: OperationKind) -> (CorrelationId, oneshot::Receiver<DeliveryResult>) {
        let (sink, completion) = oneshot::channel();
        let id = CorrelationId::new();
        {
            let mut pending = self.pending.lock().unwrap();
            if self.manager.state() == ConnectionState::Connected {
                pending.insert(
                    id,
                    PendingOperation {
                        kind,
                        created_at: Instant::now(),
                        sink,
                    },
                );
                debug!(%id, ?kind, "registered pending operation");
                return (id, completion);
            }
        }
        debug!(%id, ?kind, "registration while not connected, failing immediately");
        let _ = sink.send(Err(ClientError::connection_dropped(
            "connection lost before operation was dispatched",
        )));
        (id, completion)
    }

    /// Resolve the operation matching `id`. Unmatched ids (duplicate or
    /// stale acks) are logged and discarded, never treated as fatal.
    pub fn resolve(&self, id: CorrelationId, result: DeliveryResult) {
        let operation = self.pending.lock().unwrap().remove(&id);
        match operation {
            Some(operation) => {
                debug!(
                    %id,
                    kind = ?operation.kind,
                    elapsed = ?operation.created_at.elapsed(),
                    "resolving pending operation"
                );
                if operation.sink.send(result).is_err() {
                    debug!(%id, "completion receiver dropped before resolution");
                }
            }
            None => {
                debug!(%id, "acknowledgment with no matching pending operation, discarding");
            }
        }
    }

    /// Fail every pending operation with `error` and clear the registry
    pub fn fail_all(&self, error: ClientError) {
        let drained: Vec<(CorrelationId, PendingOperation)> =
            self.pending.lock().unwrap().drain().collect();
        if drained.is_empty() {
            return;
        }
        warn!(
            count = drained.len(),
            %error,
            "failing all pending operations"
        );
        for (id, operation) in drained {
            debug!(%id, kind = ?operation.kind, "failing pending operation");
            let _ = operation.sink.send(Err(error.clone()));
        }
    }

    pub fn pending_count(&self) -> usize {
        self.pending.lock().unwrap().len()
    }

    /// Spawn the watcher that fails pending operations on any transition out
    /// of `Connected`
    pub fn spawn_status_watcher(
        registry: Arc<Self>,
        mut status_rx: broadcast::Receiver<StatusEvent>,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            loop {
                match status_rx.recv().await {
                    Ok(event) => {
                        if event.state != ConnectionState::Connected {
                            registry.fail_all(ClientError::connection_dropped(
                                "connection lost with operation in flight",
                            ));
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        // missed transitions may include one out of Connected
                        warn!(skipped, "status watcher lagged, failing pending operations");
                        registry.fail_all(ClientError::connection_dropped(
                            "connection status lost with operation in flight",
                        ));
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::retry::{ExponentialBackoff, RetryController};
    use crate::testing::mocks::{CountingCredential, MockTransport};
    use std::time::Duration;

    async fn connected_registry() -> (DeliveryRegistry, Arc<ConnectionManager>) {
        let retry = RetryController::new(
            Box::new(ExponentialBackoff::with_seed(
                Duration::from_millis(1),
                Duration::from_millis(10),
                1,
            )),
            Duration::from_secs(1),
        );
        let manager = ConnectionManager::new(
            Box::new(MockTransport::new()),
            Arc::new(CountingCredential::new("hub.test", "device-1")),
            retry,
            false,
        );
        manager.connect().await.unwrap();
        (DeliveryRegistry::new(manager.clone()), manager)
    }

    #[tokio::test]
    async fn test_register_and_resolve_round_trip() {
        let (registry, _manager) = connected_registry().await;
        let (id, completion) = registry.register(OperationKind::Telemetry);
        assert_eq!(registry.pending_count(), 1);

        registry.resolve(id, Ok(()));
        assert_eq!(registry.pending_count(), 0);
        assert_eq!(completion.await.unwrap(), Ok(()));
    }

    #[tokio::test]
    async fn test_duplicate_resolve_is_noop() {
        let (registry, _manager) = connected_registry().await;
        let (id, completion) = registry.register(OperationKind::MethodResponse);

        registry.resolve(id, Ok(()));
        // duplicate ack: logged and discarded, no double completion
        registry.resolve(id, Err(ClientError::service_fault("dup")));
        assert_eq!(completion.await.unwrap(), Ok(()));
    }

    #[tokio::test]
    async fn test_unmatched_resolve_is_discarded() {
        let (registry, _manager) = connected_registry().await;
        registry.resolve(CorrelationId::new(), Ok(()));
        assert_eq!(registry.pending_count(), 0);
    }

    #[tokio::test]
    async fn test_fail_all_resolves_everything() {
        let (registry, _manager) = connected_registry().await;
        let (_, first) = registry.register(OperationKind::Telemetry);
        let (_, second) = registry.register(OperationKind::ReportedPropertyUpdate);

        registry.fail_all(ClientError::connection_dropped("socket closed"));
        assert_eq!(registry.pending_count(), 0);
        assert!(matches!(
            first.await.unwrap(),
            Err(ClientError::ConnectionDropped { .. })
        ));
        assert!(matches!(
            second.await.unwrap(),
            Err(ClientError::ConnectionDropped { .. })
        ));
    }

    #[tokio::test]
    async fn test_resolve_after_fail_all_is_noop() {
        let (registry, _manager) = connected_registry().await;
        let (id, completion) = registry.register(OperationKind::Telemetry);

        registry.fail_all(ClientError::connection_dropped("gone"));
        registry.resolve(id, Ok(()));
        assert!(completion.await.unwrap().is_err());
    }

    #[tokio::test]
    async fn test_register_after_disconnect_fails_immediately() {
        let (registry, manager) = connected_registry().await;
        manager.disconnect().await;

        // the disconnect sweep has nothing to sweep yet; a registration
        // landing afterwards must not sit unresolved
        let (_, completion) = registry.register(OperationKind::Telemetry);
        assert_eq!(registry.pending_count(), 0);
        let result = tokio::time::timeout(Duration::from_millis(500), completion)
            .await
            .expect("late registration left unresolved")
            .unwrap();
        assert!(matches!(result, Err(ClientError::ConnectionDropped { .. })));
    }

    #[tokio::test]
    async fn test_register_while_never_connected_fails_immediately() {
        let retry = RetryController::new(
            Box::new(ExponentialBackoff::with_seed(
                Duration::from_millis(1),
                Duration::from_millis(10),
                1,
            )),
            Duration::from_secs(1),
        );
        let manager = ConnectionManager::new(
            Box::new(MockTransport::new()),
            Arc::new(CountingCredential::new("hub.test", "device-1")),
            retry,
            false,
        );
        let registry = DeliveryRegistry::new(manager);

        let (_, completion) = registry.register(OperationKind::Telemetry);
        assert_eq!(registry.pending_count(), 0);
        assert!(completion.await.unwrap().is_err());
    }

    #[tokio::test]
    async fn test_out_of_order_resolution_matches_by_id() {
        let (registry, _manager) = connected_registry().await;
        let (first_id, first) = registry.register(OperationKind::Telemetry);
        let (second_id, second) = registry.register(OperationKind::Telemetry);

        // acks arrive in reverse order
        registry.resolve(second_id, Err(ClientError::service_fault("throttled")));
        registry.resolve(first_id, Ok(()));

        assert_eq!(first.await.unwrap(), Ok(()));
        assert!(second.await.unwrap().is_err());
    }
}
