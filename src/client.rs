//! Device client facade
//!
//! Wires the connection manager, delivery registry, and receive dispatcher
//! together: one task pumps transport events into the right component, and
//! two watchers react to status transitions (failing in-flight operations,
//! force-stopping receive queues). Callers get guarded send operations that
//! resolve exactly once, and per-category receive lifecycles.

use crate::config::ClientConfig;
use crate::connection::{ConnectionManager, ConnectionState, StatusEvent};
use crate::dispatch::ReceiveDispatcher;
use crate::error::{ClientError, ClientResult};
use crate::gate::OperationGate;
use crate::registry::{DeliveryRegistry, OperationKind};
use crate::retry::{ExponentialBackoff, RetryController};
use crate::topic::TopicBuilder;
use crate::transport::{Category, Credential, InboundItem, Transport, TransportEvent};
use bytes::Bytes;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tracing::debug;

/// Device client for a hub session.
///
/// One instance per logical session; instances are independent, each with
/// its own retry series and state machine.
pub struct DeviceClient {
    manager: Arc<ConnectionManager>,
    gate: OperationGate,
    registry: Arc<DeliveryRegistry>,
    dispatcher: Arc<ReceiveDispatcher>,
    topics: TopicBuilder,
    twin_request_seq: AtomicU64,
    pump_handle: JoinHandle<()>,
    watcher_handles: Vec<JoinHandle<()>>,
}

impl DeviceClient {
    pub fn new(
        mut transport: Box<dyn Transport>,
        credential: Arc<dyn Credential>,
        config: ClientConfig,
    ) -> ClientResult<Self> {
        config.validate().map_err(|e| ClientError::MalformedConfig {
            message: e.to_string(),
        })?;
        let conn = &config.connection;

        let (event_tx, event_rx) = mpsc::channel(64);
        transport.set_event_sender(event_tx);

        let retry = RetryController::new(
            Box::new(ExponentialBackoff::new(
                conn.initial_backoff(),
                conn.max_backoff(),
            )),
            conn.retry_ceiling(),
        );
        let manager = ConnectionManager::new(transport, credential, retry, conn.auto_reconnect);
        let gate = OperationGate::new(manager.clone());
        let registry = Arc::new(DeliveryRegistry::new(manager.clone()));
        let dispatcher = Arc::new(ReceiveDispatcher::new(
            manager.clone(),
            OperationGate::new(manager.clone()),
            conn.receive_queue_capacity,
        ));

        let watcher_handles = vec![
            DeliveryRegistry::spawn_status_watcher(registry.clone(), manager.subscribe_status()),
            ReceiveDispatcher::spawn_status_watcher(dispatcher.clone(), manager.subscribe_status()),
        ];
        let pump_handle = Self::spawn_event_pump(
            event_rx,
            manager.clone(),
            registry.clone(),
            dispatcher.clone(),
        );

        Ok(Self {
            manager,
            gate,
            registry,
            dispatcher,
            topics: TopicBuilder::new(&config.device.device_id, config.device.module_id.as_deref()),
            twin_request_seq: AtomicU64::new(1),
            pump_handle,
            watcher_handles,
        })
    }

    fn spawn_event_pump(
        mut event_rx: mpsc::Receiver<TransportEvent>,
        manager: Arc<ConnectionManager>,
        registry: Arc<DeliveryRegistry>,
        dispatcher: Arc<ReceiveDispatcher>,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            while let Some(event) = event_rx.recv().await {
                match event {
                    TransportEvent::ConnectionLost(error) => {
                        manager.handle_connection_lost(error).await;
                    }
                    TransportEvent::Acknowledged { id, result } => {
                        registry.resolve(id, result);
                    }
                    TransportEvent::ItemArrived(item) => {
                        dispatcher.push(item);
                    }
                }
            }
            debug!("transport event channel closed, pump exiting");
        })
    }

    /// Connect to the hub; suspends until connected or terminal failure
    pub async fn connect(&self) -> ClientResult<()> {
        self.manager.connect().await
    }

    /// Disconnect from the hub; idempotent
    pub async fn disconnect(&self) {
        self.manager.disconnect().await
    }

    pub fn state(&self) -> ConnectionState {
        self.manager.state()
    }

    /// Observe every connection status transition
    pub fn subscribe_status(&self) -> broadcast::Receiver<StatusEvent> {
        self.manager.subscribe_status()
    }

    /// Send a telemetry message; resolves when the hub acknowledges it or
    /// the connection drops
    pub async fn send_telemetry(&self, payload: Bytes) -> ClientResult<()> {
        let topic = self.topics.telemetry_publish();
        self.deliver(OperationKind::Telemetry, &topic, payload).await
    }

    /// Push a reported-property patch to the device twin
    pub async fn update_reported_properties(&self, patch: &serde_json::Value) -> ClientResult<()> {
        let request_id = self.twin_request_seq.fetch_add(1, Ordering::SeqCst);
        let topic = self
            .topics
            .reported_properties_publish(&request_id.to_string());
        let payload = serde_json::to_vec(patch)
            .map(Bytes::from)
            .map_err(|e| ClientError::client_fault(format!("unserializable twin patch: {e}")))?;
        self.deliver(OperationKind::ReportedPropertyUpdate, &topic, payload)
            .await
    }

    /// Respond to a direct-method request previously received via
    /// [`Category::MethodRequests`]
    pub async fn respond_to_method(
        &self,
        request_id: &str,
        status: i32,
        payload: Bytes,
    ) -> ClientResult<()> {
        let topic = self.topics.method_response_publish(request_id, status);
        self.deliver(OperationKind::MethodResponse, &topic, payload)
            .await
    }

    /// Gate, register, publish, await the single delivery resolution
    async fn deliver(
        &self,
        kind: OperationKind,
        topic: &str,
        payload: Bytes,
    ) -> ClientResult<()> {
        self.gate.check()?;
        let (id, completion) = self.registry.register(kind);
        if let Err(error) = self.manager.publish(topic, payload, id).await {
            // resolve through the registry so the entry cannot leak
            self.registry.resolve(id, Err(error));
        }
        match completion.await {
            Ok(result) => result,
            Err(_) => Err(ClientError::connection_dropped(
                "delivery registry dropped completion",
            )),
        }
    }

    /// Begin receiving a category
    pub async fn start_receiving(&self, category: Category) -> ClientResult<()> {
        self.dispatcher.start(category).await
    }

    /// Stop receiving a category and discard queued items
    pub async fn stop_receiving(&self, category: Category) -> ClientResult<()> {
        self.dispatcher.stop(category).await
    }

    /// Pull the next inbound item for a category. `Ok(None)` means the
    /// category was stopped; an error means the connection dropped.
    pub async fn recv(&self, category: Category) -> ClientResult<Option<InboundItem>> {
        self.dispatcher.recv(category).await
    }

    /// Items dropped from a full receive queue since the category started
    pub fn dropped_count(&self, category: Category) -> u64 {
        self.dispatcher.dropped_count(category)
    }

    pub fn pending_operation_count(&self) -> usize {
        self.registry.pending_count()
    }
}

impl Drop for DeviceClient {
    fn drop(&mut self) {
        self.pump_handle.abort();
        for handle in &self.watcher_handles {
            handle.abort();
        }
    }
}
