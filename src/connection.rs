//! Connection state machine and reconnection supervisor
//!
//! [`ConnectionManager`] owns the transport handle exclusively and drives
//! every connect/disconnect. Unexpected losses feed a connect-with-retry
//! cycle governed by the [`RetryController`](crate::retry::RetryController);
//! an explicit `disconnect()` cancels any scheduled retry and always wins
//! the race against an in-flight reconnect attempt.

use crate::error::{ClientError, ClientResult};
use crate::retry::{RetryController, RetryDecision};
use crate::transport::{Category, CorrelationId, Credential, Transport};
use bytes::Bytes;
use std::sync::Arc;
use std::sync::Mutex as StdMutex;
use tokio::sync::{broadcast, watch, Mutex};
use tracing::{debug, info, warn};

/// Connection state for the client session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// No session; the resting state
    Disconnected,
    /// A connect attempt (or retry wait) is in progress
    Connecting,
    /// Open, authenticated session with the hub
    Connected,
    /// Explicit teardown in progress
    Disconnecting,
}

/// Why a status transition happened
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusReason {
    /// Caller invoked `connect()` or `disconnect()`
    ClientRequest,
    /// Transport confirmed an authenticated session
    Established,
    /// An attempt failed; another is scheduled after a backoff delay
    RetryScheduled,
    /// The transport reported an unexpected loss
    ConnectionLost,
    /// The retry controller gave up
    RetriesExhausted,
}

/// One status transition, published to every observer
#[derive(Debug, Clone)]
pub struct StatusEvent {
    pub state: ConnectionState,
    pub reason: StatusReason,
}

struct StateCell {
    state: ConnectionState,
    last_disconnect_reason: Option<ClientError>,
}

/// The connection state machine.
///
/// All state mutation happens through this type; collaborators observe it
/// through the status broadcast rather than holding back-references.
pub struct ConnectionManager {
    transport: Mutex<Box<dyn Transport>>,
    credential: Arc<dyn Credential>,
    retry: Mutex<RetryController>,
    state: StdMutex<StateCell>,
    status_tx: broadcast::Sender<StatusEvent>,
    // true = disconnect requested; doubles as the retry-wait cancellation signal
    disconnect_tx: watch::Sender<bool>,
    auto_reconnect: bool,
}

impl ConnectionManager {
    pub fn new(
        transport: Box<dyn Transport>,
        credential: Arc<dyn Credential>,
        retry: RetryController,
        auto_reconnect: bool,
    ) -> Arc<Self> {
        let (status_tx, _) = broadcast::channel(32);
        let (disconnect_tx, _) = watch::channel(false);
        Arc::new(Self {
            transport: Mutex::new(transport),
            credential,
            retry: Mutex::new(retry),
            state: StdMutex::new(StateCell {
                state: ConnectionState::Disconnected,
                last_disconnect_reason: None,
            }),
            status_tx,
            disconnect_tx,
            auto_reconnect,
        })
    }

    /// Current connection state, read at the instant of the call
    pub fn state(&self) -> ConnectionState {
        self.state.lock().unwrap().state
    }

    /// Reason recorded for the most recent drop, if any
    pub fn last_disconnect_reason(&self) -> Option<ClientError> {
        self.state.lock().unwrap().last_disconnect_reason.clone()
    }

    /// Subscribe to status transitions. Every transition is published with
    /// its reason, not just terminal ones.
    pub fn subscribe_status(&self) -> broadcast::Receiver<StatusEvent> {
        self.status_tx.subscribe()
    }

    fn transition(&self, state: ConnectionState, reason: StatusReason) {
        let previous = {
            let mut cell = self.state.lock().unwrap();
            let previous = cell.state;
            cell.state = state;
            previous
        };
        if previous != state {
            info!(?previous, current = ?state, ?reason, "connection state changed");
        }
        let _ = self.status_tx.send(StatusEvent { state, reason });
    }

    /// Connect to the hub, retrying transient failures under backoff.
    ///
    /// Valid only from `Disconnected`. Suspends the caller until the cycle
    /// reaches a terminal outcome: `Connected`, or the last underlying error
    /// once the retry controller gives up. Internal retries are invisible to
    /// other callers except through status events.
    pub async fn connect(self: &Arc<Self>) -> ClientResult<()> {
        {
            let mut cell = self.state.lock().unwrap();
            if cell.state != ConnectionState::Disconnected {
                return Err(ClientError::client_fault(format!(
                    "connect is only valid while disconnected (current state: {:?})",
                    cell.state
                )));
            }
            cell.state = ConnectionState::Connecting;
        }
        let _ = self.status_tx.send(StatusEvent {
            state: ConnectionState::Connecting,
            reason: StatusReason::ClientRequest,
        });
        self.disconnect_tx.send_replace(false);
        // a user-initiated connect starts a fresh retry series
        self.retry.lock().await.reset();
        self.run_connect_cycle().await
    }

    /// Tear down the session. Idempotent; a call while already disconnected
    /// is a no-op. Cancels any pending retry immediately.
    pub async fn disconnect(&self) {
        self.disconnect_tx.send_replace(true);

        let current = self.state.lock().unwrap().state;
        if current == ConnectionState::Disconnected {
            debug!("disconnect requested while already disconnected, ignoring");
            return;
        }

        self.transition(ConnectionState::Disconnecting, StatusReason::ClientRequest);
        self.transport.lock().await.disconnect().await;
        self.transition(ConnectionState::Disconnected, StatusReason::ClientRequest);
    }

    /// Transport-invoked notification of an unexpected session drop.
    ///
    /// Ignored unless currently `Connected`. When auto-reconnect is enabled
    /// the same connect-with-retry cycle resumes in the background, with the
    /// retry series continuing from its existing attempt count.
    pub async fn handle_connection_lost(self: &Arc<Self>, error: ClientError) {
        {
            let mut cell = self.state.lock().unwrap();
            if cell.state != ConnectionState::Connected {
                debug!(%error, state = ?cell.state, "connection-lost event while not connected, ignoring");
                return;
            }
            cell.state = ConnectionState::Disconnected;
            cell.last_disconnect_reason = Some(error.clone());
        }
        warn!(%error, "connection lost");
        let _ = self.status_tx.send(StatusEvent {
            state: ConnectionState::Disconnected,
            reason: StatusReason::ConnectionLost,
        });

        if !self.auto_reconnect {
            info!("auto-reconnect disabled, staying disconnected");
            return;
        }

        let manager = Arc::clone(self);
        tokio::spawn(async move {
            {
                let mut cell = manager.state.lock().unwrap();
                // a racing explicit connect() may already own the cycle
                if cell.state != ConnectionState::Disconnected {
                    return;
                }
                cell.state = ConnectionState::Connecting;
            }
            let _ = manager.status_tx.send(StatusEvent {
                state: ConnectionState::Connecting,
                reason: StatusReason::ConnectionLost,
            });
            match manager.run_connect_cycle().await {
                Ok(()) => info!("reconnected after connection loss"),
                Err(error) => warn!(%error, "reconnect attempt ended without a session"),
            }
        });
    }

    /// Drive connect attempts until success, give-up, or cancellation.
    /// Caller must have already transitioned to `Connecting`.
    async fn run_connect_cycle(self: &Arc<Self>) -> ClientResult<()> {
        let mut disconnect_rx = self.disconnect_tx.subscribe();
        loop {
            if *disconnect_rx.borrow() {
                self.transition(ConnectionState::Disconnected, StatusReason::ClientRequest);
                return Err(ClientError::cancelled("disconnect requested during connect"));
            }

            let attempt_result = match self.credential.current_parameters().await {
                Ok(params) => {
                    debug!(hostname = %params.hostname, identity = %params.identity, "attempting transport connect");
                    self.transport.lock().await.connect(&params).await
                }
                Err(error) => Err(error),
            };

            match attempt_result {
                Ok(()) => {
                    if *disconnect_rx.borrow() {
                        // disconnect() raced the attempt and wins; it owns teardown
                        return Err(ClientError::cancelled(
                            "disconnect requested during connect",
                        ));
                    }
                    self.retry.lock().await.reset();
                    self.transition(ConnectionState::Connected, StatusReason::Established);
                    return Ok(());
                }
                Err(error) => {
                    let decision = self.retry.lock().await.should_retry(&error);
                    match decision {
                        RetryDecision::GiveUp => {
                            self.transition(
                                ConnectionState::Disconnected,
                                StatusReason::RetriesExhausted,
                            );
                            return Err(error);
                        }
                        RetryDecision::Retry(delay) => {
                            warn!(%error, ?delay, "connect attempt failed, retrying");
                            self.transition(
                                ConnectionState::Connecting,
                                StatusReason::RetryScheduled,
                            );
                            tokio::select! {
                                _ = tokio::time::sleep(delay) => {}
                                _ = disconnect_rx.wait_for(|requested| *requested) => {
                                    self.transition(
                                        ConnectionState::Disconnected,
                                        StatusReason::ClientRequest,
                                    );
                                    return Err(ClientError::cancelled(
                                        "disconnect requested during retry wait",
                                    ));
                                }
                            }
                        }
                    }
                }
            }
        }
    }

    /// Publish through the exclusively-owned transport handle
    pub async fn publish(
        &self,
        topic: &str,
        payload: Bytes,
        id: CorrelationId,
    ) -> ClientResult<()> {
        self.transport.lock().await.publish(topic, payload, id).await
    }

    /// Subscribe a receive category through the transport handle
    pub async fn subscribe(&self, category: Category) -> ClientResult<()> {
        self.transport.lock().await.subscribe(category).await
    }

    /// Unsubscribe a receive category through the transport handle
    pub async fn unsubscribe(&self, category: Category) -> ClientResult<()> {
        self.transport.lock().await.unsubscribe(category).await
    }
}
