//! Per-reference notifications that a fresh URL is available.
//!
//! The storage layer publishes here after re-signing a URL; every preview
//! of the same reference is subscribed and swaps its source without
//! resolving again.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::broadcast;

const CHANNEL_CAPACITY: usize = 8;

#[derive(Debug, Clone, Default)]
pub struct RefreshBus {
    channels: Arc<Mutex<HashMap<String, broadcast::Sender<String>>>>,
}

impl RefreshBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, reference: &str) -> broadcast::Receiver<String> {
        let mut channels = self.channels.lock();
        prune(&mut channels);
        channels
            .entry(reference.to_string())
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0)
            .subscribe()
    }

    /// Returns how many subscribers received the URL.
    pub fn publish(&self, reference: &str, url: &str) -> usize {
        let mut channels = self.channels.lock();
        let Some(tx) = channels.get(reference) else {
            return 0;
        };
        match tx.send(url.to_string()) {
            Ok(n) => {
                tracing::debug!(%reference, receivers = n, "published refreshed url");
                n
            }
            Err(_) => {
                // Everyone unsubscribed.
                channels.remove(reference);
                0
            }
        }
    }

    /// Topics that still have a subscriber.
    pub fn topics(&self) -> usize {
        let mut channels = self.channels.lock();
        prune(&mut channels);
        channels.len()
    }
}

fn prune(channels: &mut HashMap<String, broadcast::Sender<String>>) {
    channels.retain(|_, tx| tx.receiver_count() > 0);
}
