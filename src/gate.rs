//! Connected-state guard for outgoing calls
//!
//! Every outgoing send, receive start/stop, and pending-operation
//! registration passes through [`OperationGate::check`]. The state is read
//! at the instant of the call, never cached; a call landing in a
//! Connecting/Disconnecting window is rejected, not queued.

use crate::connection::{ConnectionManager, ConnectionState};
use crate::error::{ClientError, ClientResult};
use std::sync::Arc;

pub struct OperationGate {
    manager: Arc<ConnectionManager>,
}

impl OperationGate {
    pub fn new(manager: Arc<ConnectionManager>) -> Self {
        Self { manager }
    }

    /// Proceed only while the session is `Connected`
    pub fn check(&self) -> ClientResult<()> {
        let state = self.manager.state();
        if state == ConnectionState::Connected {
            Ok(())
        } else {
            Err(ClientError::NotConnected { state })
        }
    }
}
