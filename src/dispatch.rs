//! Inbound delivery queues, one per receive category
//!
//! Each category (cloud-to-device messages, method requests, twin patches,
//! module input messages) has an independent start/stop subscription
//! lifecycle and a bounded FIFO. When a queue is full the oldest unconsumed
//! item is dropped so the newest telemetry/commands stay live. Consumers
//! pull with [`ReceiveDispatcher::recv`], which suspends until data arrives,
//! the category is stopped, or the connection drops.

use crate::connection::{ConnectionManager, ConnectionState, StatusEvent};
use crate::error::{ClientError, ClientResult};
use crate::gate::OperationGate;
use crate::transport::{Category, InboundItem};
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::sync::Mutex as StdMutex;
use tokio::sync::{broadcast, Notify};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

struct ChannelInner {
    active: bool,
    queue: VecDeque<InboundItem>,
    dropped: u64,
    fault: Option<ClientError>,
}

struct Channel {
    inner: StdMutex<ChannelInner>,
    notify: Notify,
}

impl Channel {
    fn new() -> Self {
        Self {
            inner: StdMutex::new(ChannelInner {
                active: false,
                queue: VecDeque::new(),
                dropped: 0,
                fault: None,
            }),
            notify: Notify::new(),
        }
    }
}

/// Per-category subscription lifecycle and bounded delivery queues
pub struct ReceiveDispatcher {
    manager: Arc<ConnectionManager>,
    gate: OperationGate,
    capacity: usize,
    channels: HashMap<Category, Channel>,
}

impl ReceiveDispatcher {
    pub fn new(manager: Arc<ConnectionManager>, gate: OperationGate, capacity: usize) -> Self {
        let channels = Category::ALL
            .into_iter()
            .map(|category| (category, Channel::new()))
            .collect();
        Self {
            manager,
            gate,
            capacity,
            channels,
        }
    }

    fn channel(&self, category: Category) -> &Channel {
        // all four categories are inserted at construction
        &self.channels[&category]
    }

    /// Begin delivery for a category: subscribe at the transport and start
    /// enqueuing arriving items
    pub async fn start(&self, category: Category) -> ClientResult<()> {
        self.gate.check()?;
        self.manager.subscribe(category).await?;
        let mut inner = self.channel(category).inner.lock().unwrap();
        inner.active = true;
        inner.fault = None;
        info!(?category, "receive started");
        Ok(())
    }

    /// End delivery for a category: unsubscribe, discard queued items, and
    /// wake pending pulls (their sequence ends cleanly)
    pub async fn stop(&self, category: Category) -> ClientResult<()> {
        self.gate.check()?;
        self.manager.unsubscribe(category).await?;
        let channel = self.channel(category);
        {
            let mut inner = channel.inner.lock().unwrap();
            inner.active = false;
            inner.queue.clear();
        }
        channel.notify.notify_waiters();
        info!(?category, "receive stopped");
        Ok(())
    }

    /// Enqueue an arriving item. Called from the transport event pump;
    /// items for inactive categories are discarded.
    pub fn push(&self, item: InboundItem) {
        let channel = self.channel(item.category);
        {
            let mut inner = channel.inner.lock().unwrap();
            if !inner.active {
                debug!(category = ?item.category, "item for inactive category, discarding");
                return;
            }
            if inner.queue.len() >= self.capacity {
                inner.queue.pop_front();
                inner.dropped += 1;
                warn!(
                    category = ?item.category,
                    dropped_total = inner.dropped,
                    "receive queue full, dropped oldest item"
                );
            }
            inner.queue.push_back(item);
        }
        channel.notify.notify_waiters();
    }

    /// Pull the next item for a category.
    ///
    /// Suspends until one of: an item is available (`Ok(Some)`), the
    /// category was stopped (`Ok(None)`), or the connection dropped while
    /// the category was active (`Err`, delivered once).
    pub async fn recv(&self, category: Category) -> ClientResult<Option<InboundItem>> {
        let channel = self.channel(category);
        loop {
            let notified = channel.notify.notified();
            tokio::pin!(notified);
            // register for notify_waiters before inspecting the queue; a
            // push or stop landing after the check must not be missed
            notified.as_mut().enable();
            {
                let mut inner = channel.inner.lock().unwrap();
                if let Some(item) = inner.queue.pop_front() {
                    return Ok(Some(item));
                }
                if let Some(fault) = inner.fault.take() {
                    return Err(fault);
                }
                if !inner.active {
                    return Ok(None);
                }
            }
            notified.await;
        }
    }

    /// Items dropped from a full queue since `start`
    pub fn dropped_count(&self, category: Category) -> u64 {
        self.channel(category).inner.lock().unwrap().dropped
    }

    pub fn is_active(&self, category: Category) -> bool {
        self.channel(category).inner.lock().unwrap().active
    }

    /// Forcibly stop every active category after a connection loss. The
    /// client must call `start` again after a reconnect; subscriptions are
    /// never silently resurrected.
    pub fn force_stop_all(&self, error: &ClientError) {
        for (category, channel) in &self.channels {
            let was_active = {
                let mut inner = channel.inner.lock().unwrap();
                if !inner.active {
                    continue;
                }
                inner.active = false;
                inner.queue.clear();
                inner.fault = Some(error.clone());
                true
            };
            if was_active {
                debug!(?category, "receive forcibly stopped");
                channel.notify.notify_waiters();
            }
        }
    }

    /// Spawn the watcher that forces all categories inactive on any
    /// transition out of `Connected`
    pub fn spawn_status_watcher(
        dispatcher: Arc<Self>,
        mut status_rx: broadcast::Receiver<StatusEvent>,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            loop {
                match status_rx.recv().await {
                    Ok(event) => {
                        if event.state != ConnectionState::Connected {
                            dispatcher.force_stop_all(&ClientError::connection_dropped(
                                "connection lost while receiving",
                            ));
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(skipped, "dispatcher status watcher lagged, stopping receives");
                        dispatcher.force_stop_all(&ClientError::connection_dropped(
                            "connection status lost while receiving",
                        ));
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        })
    }
}
