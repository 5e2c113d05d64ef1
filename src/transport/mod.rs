//! Transport and credential seams
//!
//! The engine never touches wire-level MQTT/AMQP encoding or the TLS
//! handshake. A [`Transport`] implementation supplies connect / publish /
//! subscribe / disconnect primitives and pushes [`TransportEvent`]s
//! (connection loss, acknowledgments, arriving items) into the engine's
//! event channel. A [`Credential`] produces fresh connection parameters on
//! demand; the engine re-fetches them on every connect attempt and never
//! caches them beyond a single attempt.

use crate::error::{ClientError, ClientResult};
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::mpsc;
use uuid::Uuid;

/// Opaque token correlating an outgoing operation with its acknowledgment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CorrelationId(Uuid);

impl CorrelationId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for CorrelationId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Distinct inbound data kinds, each with its own subscription lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    /// Cloud-to-device messages
    Messages,
    /// Direct-method invocation requests
    MethodRequests,
    /// Twin desired-property patches
    TwinPatches,
    /// Routed input messages (module clients)
    InputMessages,
}

impl Category {
    pub const ALL: [Category; 4] = [
        Category::Messages,
        Category::MethodRequests,
        Category::TwinPatches,
        Category::InputMessages,
    ];
}

/// One inbound item delivered by the transport
#[derive(Debug, Clone, PartialEq)]
pub struct InboundItem {
    pub category: Category,
    pub payload: Bytes,
    /// Request identifier for items that expect a response (direct methods)
    pub request_id: Option<String>,
}

/// Events pushed by the transport into the engine
#[derive(Debug)]
pub enum TransportEvent {
    /// The authenticated session dropped unexpectedly
    ConnectionLost(ClientError),
    /// Acknowledgment for a previously published operation
    Acknowledged {
        id: CorrelationId,
        result: ClientResult<()>,
    },
    /// An inbound item arrived on a subscribed category
    ItemArrived(InboundItem),
}

/// Parameters for a single connect attempt
#[derive(Debug, Clone, PartialEq)]
pub struct ConnectionParams {
    /// Hub hostname to connect to
    pub hostname: String,
    /// Device (or device/module) identity
    pub identity: String,
    /// Proof of possession: a signed token or certificate reference,
    /// opaque to the engine
    pub proof: String,
}

/// Wire transport collaborator.
///
/// Implementations own the socket; the engine owns the lifecycle. Events are
/// delivered through the sender installed with
/// [`Transport::set_event_sender`], from the transport's own I/O task.
#[async_trait::async_trait]
pub trait Transport: Send + Sync {
    /// Open an authenticated session with the given parameters
    async fn connect(&mut self, params: &ConnectionParams) -> ClientResult<()>;

    /// Tear down the session unconditionally
    async fn disconnect(&mut self);

    /// Publish a payload; the acknowledgment arrives later as
    /// [`TransportEvent::Acknowledged`] carrying the same id
    async fn publish(&self, topic: &str, payload: Bytes, id: CorrelationId) -> ClientResult<()>;

    /// Issue the subscription for a receive category
    async fn subscribe(&self, category: Category) -> ClientResult<()>;

    /// Remove the subscription for a receive category
    async fn unsubscribe(&self, category: Category) -> ClientResult<()>;

    /// Install the channel the transport pushes events into
    fn set_event_sender(&mut self, sender: mpsc::Sender<TransportEvent>);
}

/// Credential collaborator, re-invoked fresh on every connect attempt
#[async_trait::async_trait]
pub trait Credential: Send + Sync {
    async fn current_parameters(&self) -> ClientResult<ConnectionParams>;
}

/// Credential backed by a static secret (connection-string style)
///
/// ```
/// use hublink::{Credential, StaticCredential};
/// # tokio_test::block_on(async {
/// let credential = StaticCredential::new("hub.example.net", "device-1", "sas-token");
/// let params = credential.current_parameters().await.unwrap();
/// assert_eq!(params.hostname, "hub.example.net");
/// # });
/// ```
pub struct StaticCredential {
    params: ConnectionParams,
}

impl StaticCredential {
    pub fn new(hostname: &str, identity: &str, proof: &str) -> Self {
        Self {
            params: ConnectionParams {
                hostname: hostname.to_string(),
                identity: identity.to_string(),
                proof: proof.to_string(),
            },
        }
    }
}

#[async_trait::async_trait]
impl Credential for StaticCredential {
    async fn current_parameters(&self) -> ClientResult<ConnectionParams> {
        Ok(self.params.clone())
    }
}
