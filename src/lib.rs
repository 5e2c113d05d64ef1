//! hublink - device-side connection and delivery lifecycle engine
//!
//! Maintains a long-lived, authenticated session with a cloud message broker
//! (an IoT hub) over an MQTT-style transport and arbitrates all outgoing and
//! incoming traffic against the session's current state.
//!
//! # Overview
//!
//! - A connection state machine with automatic reconnection under
//!   exponential backoff with jitter, bounded by a retry ceiling
//! - Static classification of failures into recoverable and fatal
//! - Correlation-id tracking for every outgoing operation, with prompt
//!   failure of in-flight work on disconnect
//! - Per-category inbound queues (cloud-to-device messages, direct methods,
//!   twin patches, module inputs) with explicit start/stop lifecycles and
//!   drop-oldest backpressure
//!
//! Wire-level MQTT/AMQP encoding and credential construction live behind the
//! [`transport::Transport`] and [`transport::Credential`] seams.
//!
//! # Quick start
//!
//! ```no_run
//! use hublink::{Category, ClientConfig, DeviceClient, StaticCredential};
//! use bytes::Bytes;
//! use std::sync::Arc;
//!
//! # async fn run(transport: Box<dyn hublink::Transport>) -> hublink::ClientResult<()> {
//! let credential = Arc::new(StaticCredential::new(
//!     "myhub.example.net",
//!     "thermostat-042",
//!     "SharedAccessSignature sr=...",
//! ));
//! let client = DeviceClient::new(transport, credential, ClientConfig::new("thermostat-042"))?;
//!
//! client.connect().await?;
//! client.send_telemetry(Bytes::from(r#"{"temperature": 21.5}"#)).await?;
//!
//! client.start_receiving(Category::Messages).await?;
//! while let Some(message) = client.recv(Category::Messages).await? {
//!     println!("received {} bytes", message.payload.len());
//! }
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod config;
pub mod connection;
pub mod dispatch;
pub mod error;
pub mod gate;
pub mod observability;
pub mod registry;
pub mod retry;
pub mod testing;
pub mod topic;
pub mod transport;

pub use client::DeviceClient;
pub use config::{ClientConfig, ConfigError, ConnectionSection, DeviceSection};
pub use connection::{ConnectionManager, ConnectionState, StatusEvent, StatusReason};
pub use dispatch::ReceiveDispatcher;
pub use error::{classify, ClientError, ClientResult, ErrorClass};
pub use gate::OperationGate;
pub use registry::{DeliveryRegistry, DeliveryResult, OperationKind};
pub use retry::{
    BackoffPolicy, ExponentialBackoff, FixedIntervalBackoff, RetryController, RetryDecision,
};
pub use topic::TopicBuilder;
pub use transport::{
    Category, ConnectionParams, CorrelationId, Credential, InboundItem, StaticCredential,
    Transport, TransportEvent,
};
