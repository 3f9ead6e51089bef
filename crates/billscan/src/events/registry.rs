use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use log::debug;
use thiserror::Error;
use tokio::sync::mpsc;

/// The listener is gone and should be dropped from the registry.
#[derive(Error, Debug)]
#[error("listener closed")]
pub struct ListenerClosed;

/// Receiver of raw JSON event payloads.
pub trait EventListener: Send + Sync {
    fn deliver(&self, payload: &str) -> Result<(), ListenerClosed>;
}

/// Listener forwarding payloads into an unbounded tokio channel.
pub struct ChannelListener {
    tx: mpsc::UnboundedSender<String>,
}

impl ChannelListener {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<String>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl EventListener for ChannelListener {
    fn deliver(&self, payload: &str) -> Result<(), ListenerClosed> {
        self.tx.send(payload.to_string()).map_err(|_| ListenerClosed)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

/// Live listeners keyed by connection id.
#[derive(Default)]
pub struct ConnectionRegistry {
    next_id: AtomicU64,
    listeners: RwLock<HashMap<ListenerId, Arc<dyn EventListener>>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn connect(&self, listener: Arc<dyn EventListener>) -> ListenerId {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.listeners
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(id, listener);
        debug!("Listener {:?} connected", id);
        id
    }

    /// Returns `false` when `id` was not connected.
    pub fn disconnect(&self, id: ListenerId) -> bool {
        self.listeners
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&id)
            .is_some()
    }

    pub fn len(&self) -> usize {
        self.listeners.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Sends `payload` to every listener once. Listeners that fail are
    /// evicted. Returns the number of successful deliveries.
    pub fn broadcast(&self, payload: &str) -> usize {
        let snapshot: Vec<(ListenerId, Arc<dyn EventListener>)> = self
            .listeners
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .map(|(id, l)| (*id, Arc::clone(l)))
            .collect();

        let mut dead = Vec::new();
        let mut delivered = 0;
        for (id, listener) in snapshot {
            match listener.deliver(payload) {
                Ok(()) => delivered += 1,
                Err(_) => dead.push(id),
            }
        }

        if !dead.is_empty() {
            let mut listeners = self.listeners.write().unwrap_or_else(|e| e.into_inner());
            for id in dead {
                listeners.remove(&id);
                debug!("Evicted listener {:?}", id);
            }
        }

        delivered
    }
}
