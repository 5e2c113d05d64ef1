//! Shared helpers for integration tests

use hublink::testing::mocks::{CountingCredential, MockTransport, MockTransportHandle};
use hublink::{ClientConfig, DeviceClient};
use std::sync::Arc;

/// Config with millisecond-scale backoff so retry tests run fast
#[allow(dead_code)]
pub fn fast_config() -> ClientConfig {
    let mut config = ClientConfig::new("test-device");
    config.connection.initial_backoff_ms = 1;
    config.connection.max_backoff_ms = 10;
    config.connection.retry_ceiling_ms = 5_000;
    config
}

#[allow(dead_code)]
pub fn client_with(
    transport: MockTransport,
    config: ClientConfig,
) -> (Arc<DeviceClient>, MockTransportHandle) {
    let handle = transport.handle();
    let credential = Arc::new(CountingCredential::new("hub.test", "test-device"));
    let client = DeviceClient::new(Box::new(transport), credential, config)
        .expect("client construction failed");
    (Arc::new(client), handle)
}
