//! Mock Transport and Credential implementations
//!
//! `MockTransport` records every call and lets tests script the outcome of
//! successive connect attempts and inject transport events (loss, acks,
//! inbound items) as a real broker session would.

use crate::error::{ClientError, ClientResult};
use crate::transport::{
    Category, ConnectionParams, CorrelationId, Credential, InboundItem, Transport, TransportEvent,
};
use bytes::Bytes;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

type PublishRecord = (String, Bytes, CorrelationId);

#[derive(Default)]
struct Shared {
    connect_results: Mutex<VecDeque<ClientResult<()>>>,
    connect_attempts: AtomicU32,
    disconnect_count: AtomicU32,
    published: Mutex<Vec<PublishRecord>>,
    subscribed: Mutex<Vec<Category>>,
    unsubscribed: Mutex<Vec<Category>>,
    event_tx: Mutex<Option<mpsc::Sender<TransportEvent>>>,
    auto_ack: AtomicBool,
}

/// Mock transport for testing
#[derive(Default)]
pub struct MockTransport {
    shared: Arc<Shared>,
}

/// Handle retained by tests after the transport is boxed away
#[derive(Clone)]
pub struct MockTransportHandle {
    shared: Arc<Shared>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Script the outcomes of successive connect attempts. Once the script
    /// is exhausted further attempts succeed.
    pub fn script_connect_results(&self, results: Vec<ClientResult<()>>) {
        *self.shared.connect_results.lock().unwrap() = results.into();
    }

    /// Acknowledge every publish immediately with success
    pub fn enable_auto_ack(&self) {
        self.shared.auto_ack.store(true, Ordering::SeqCst);
    }

    pub fn handle(&self) -> MockTransportHandle {
        MockTransportHandle {
            shared: self.shared.clone(),
        }
    }
}

impl MockTransportHandle {
    pub fn connect_attempts(&self) -> u32 {
        self.shared.connect_attempts.load(Ordering::SeqCst)
    }

    pub fn disconnect_count(&self) -> u32 {
        self.shared.disconnect_count.load(Ordering::SeqCst)
    }

    pub fn published(&self) -> Vec<PublishRecord> {
        self.shared.published.lock().unwrap().clone()
    }

    pub fn subscribed(&self) -> Vec<Category> {
        self.shared.subscribed.lock().unwrap().clone()
    }

    pub fn unsubscribed(&self) -> Vec<Category> {
        self.shared.unsubscribed.lock().unwrap().clone()
    }

    fn sender(&self) -> Option<mpsc::Sender<TransportEvent>> {
        self.shared.event_tx.lock().unwrap().clone()
    }

    /// Inject a transport event, as the broker-facing I/O task would
    pub async fn emit(&self, event: TransportEvent) {
        let sender = self.sender().expect("event sender not installed");
        sender.send(event).await.expect("event channel closed");
    }

    pub async fn emit_connection_lost(&self, error: ClientError) {
        self.emit(TransportEvent::ConnectionLost(error)).await;
    }

    pub async fn emit_ack(&self, id: CorrelationId, result: ClientResult<()>) {
        self.emit(TransportEvent::Acknowledged { id, result }).await;
    }

    pub async fn emit_item(&self, category: Category, payload: &str) {
        self.emit(TransportEvent::ItemArrived(InboundItem {
            category,
            payload: Bytes::from(payload.to_string()),
            request_id: None,
        }))
        .await;
    }
}

#[async_trait::async_trait]
impl Transport for MockTransport {
    async fn connect(&mut self, _params: &ConnectionParams) -> ClientResult<()> {
        self.shared.connect_attempts.fetch_add(1, Ordering::SeqCst);
        self.shared
            .connect_results
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Ok(()))
    }

    async fn disconnect(&mut self) {
        self.shared.disconnect_count.fetch_add(1, Ordering::SeqCst);
    }

    async fn publish(&self, topic: &str, payload: Bytes, id: CorrelationId) -> ClientResult<()> {
        self.shared
            .published
            .lock()
            .unwrap()
            .push((topic.to_string(), payload, id));
        if self.shared.auto_ack.load(Ordering::SeqCst) {
            if let Some(sender) = self.shared.event_tx.lock().unwrap().clone() {
                let _ = sender.try_send(TransportEvent::Acknowledged { id, result: Ok(()) });
            }
        }
        Ok(())
    }

    async fn subscribe(&self, category: Category) -> ClientResult<()> {
        self.shared.subscribed.lock().unwrap().push(category);
        Ok(())
    }

    async fn unsubscribe(&self, category: Category) -> ClientResult<()> {
        self.shared.unsubscribed.lock().unwrap().push(category);
        Ok(())
    }

    fn set_event_sender(&mut self, sender: mpsc::Sender<TransportEvent>) {
        *self.shared.event_tx.lock().unwrap() = Some(sender);
    }
}

/// Credential that counts how many times parameters were produced,
/// verifying the engine re-fetches on every attempt
pub struct CountingCredential {
    params: ConnectionParams,
    fetches: AtomicU32,
}

impl CountingCredential {
    pub fn new(hostname: &str, identity: &str) -> Self {
        Self {
            params: ConnectionParams {
                hostname: hostname.to_string(),
                identity: identity.to_string(),
                proof: "mock-proof".to_string(),
            },
            fetches: AtomicU32::new(0),
        }
    }

    pub fn fetch_count(&self) -> u32 {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl Credential for CountingCredential {
    async fn current_parameters(&self) -> ClientResult<ConnectionParams> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        Ok(self.params.clone())
    }
}
