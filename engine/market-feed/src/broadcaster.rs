//! Snapshot broadcasting to connected subscribers

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::{watch, RwLock};
use tracing::debug;

use crate::error::Result;
use crate::instrument::Instrument;
use crate::store::PriceStore;

/// Message type tag for full instrument snapshots
pub const SNAPSHOT_MESSAGE_TYPE: &str = "instrument-snapshot";

/// Identifier assigned to each subscriber on registration
pub type SubscriberId = u64;

/// Wire message pushed to subscribers
#[derive(Debug, Serialize)]
pub struct FeedMessage<'a> {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub data: &'a [Instrument],
}

impl<'a> FeedMessage<'a> {
    /// Build a snapshot message over the given instruments
    pub fn snapshot(data: &'a [Instrument]) -> Self {
        Self { kind: SNAPSHOT_MESSAGE_TYPE, data }
    }

    /// Serialize to the JSON text sent over the socket
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Receiving half of a subscription.
///
/// Holds at most one pending snapshot: a newer broadcast overwrites one the
/// peer has not read yet.
#[derive(Debug)]
pub struct SnapshotReceiver {
    rx: watch::Receiver<Arc<str>>,
    primed: bool,
}

impl SnapshotReceiver {
    fn new(rx: watch::Receiver<Arc<str>>) -> Self {
        Self { rx, primed: false }
    }

    /// Wait for the next unseen snapshot; `None` once the broadcaster dropped this subscriber
    pub async fn recv(&mut self) -> Option<Arc<str>> {
        if !self.primed {
            self.primed = true;
        } else if self.rx.changed().await.is_err() {
            return None;
        }
        Some(self.rx.borrow_and_update().clone())
    }

    /// Take the pending snapshot without waiting
    pub fn try_recv(&mut self) -> Option<Arc<str>> {
        if !self.primed {
            self.primed = true;
        } else if !self.rx.has_changed().unwrap_or(false) {
            return None;
        }
        Some(self.rx.borrow_and_update().clone())
    }
}

/// Quote broadcaster that fans snapshots out to connected clients.
///
/// Delivery is at-most-once and latest-value-wins: each subscriber owns a
/// single-slot `watch` channel, so a slow socket never holds up the others
/// and never builds a backlog. A subscriber whose receiver is gone is
/// dropped on the next broadcast.
pub struct QuoteBroadcaster {
    /// Connected subscribers (id -> outbound slot)
    subscribers: Arc<RwLock<HashMap<SubscriberId, watch::Sender<Arc<str>>>>>,

    next_id: AtomicU64,
}

impl Default for QuoteBroadcaster {
    fn default() -> Self {
        Self::new()
    }
}

impl QuoteBroadcaster {
    /// Create a new broadcaster with no subscribers
    pub fn new() -> Self {
        Self { subscribers: Arc::new(RwLock::new(HashMap::new())), next_id: AtomicU64::new(1) }
    }

    /// Register a subscriber primed with the store's current snapshot.
    ///
    /// The snapshot is read while the registry is write-locked, so a tick
    /// committed after that read is broadcast to this subscriber too.
    pub async fn subscribe(&self, store: &PriceStore) -> Result<(SubscriberId, SnapshotReceiver)> {
        let mut subscribers = self.subscribers.write().await;

        let payload = FeedMessage::snapshot(&store.snapshot().await).to_json()?;
        let (tx, rx) = watch::channel(Arc::<str>::from(payload));

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        subscribers.insert(id, tx);
        debug!("Subscriber {} registered ({} connected)", id, subscribers.len());

        Ok((id, SnapshotReceiver::new(rx)))
    }

    /// Remove a subscriber
    pub async fn unsubscribe(&self, id: SubscriberId) {
        let mut subscribers = self.subscribers.write().await;
        if subscribers.remove(&id).is_some() {
            debug!("Subscriber {} removed ({} connected)", id, subscribers.len());
        }
    }

    /// Send a snapshot to every open subscriber.
    ///
    /// Returns the number of subscribers the snapshot was handed to.
    pub async fn broadcast(&self, instruments: &[Instrument]) -> Result<usize> {
        let payload: Arc<str> = Arc::from(FeedMessage::snapshot(instruments).to_json()?);

        let mut failed = Vec::new();
        let delivered = {
            let subscribers = self.subscribers.read().await;
            let mut delivered = 0;
            for (id, sender) in subscribers.iter() {
                if sender.send(payload.clone()).is_ok() {
                    delivered += 1;
                } else {
                    failed.push(*id);
                }
            }
            delivered
        };

        if !failed.is_empty() {
            let mut subscribers = self.subscribers.write().await;
            for id in failed {
                subscribers.remove(&id);
                debug!("Dropped closed subscriber {}", id);
            }
        }

        Ok(delivered)
    }

    /// Number of registered subscribers
    pub async fn subscriber_count(&self) -> usize {
        self.subscribers.read().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::defaults::default_instruments;

    fn parse(text: &str) -> serde_json::Value {
        serde_json::from_str(text).unwrap()
    }

    #[tokio::test]
    async fn test_subscribe_sends_snapshot_first() {
        let broadcaster = QuoteBroadcaster::new();
        let store = PriceStore::with_instruments(default_instruments());

        let (_id, mut rx) = broadcaster.subscribe(&store).await.unwrap();
        let value = parse(&rx.recv().await.unwrap());

        assert_eq!(value["type"], SNAPSHOT_MESSAGE_TYPE);
        assert_eq!(value["data"].as_array().unwrap().len(), 8);
        assert_eq!(broadcaster.subscriber_count().await, 1);
        assert!(rx.try_recv().is_none());
    }

    #[tokio::test]
    async fn test_broadcast_reaches_all_open_subscribers() {
        let broadcaster = QuoteBroadcaster::new();
        let instruments = default_instruments();
        let store = PriceStore::with_instruments(instruments.clone());

        let (_a, mut rx_a) = broadcaster.subscribe(&store).await.unwrap();
        let (_b, mut rx_b) = broadcaster.subscribe(&store).await.unwrap();
        rx_a.recv().await.unwrap();
        rx_b.recv().await.unwrap();

        let delivered = broadcaster.broadcast(&instruments[..1]).await.unwrap();
        assert_eq!(delivered, 2);

        for rx in [&mut rx_a, &mut rx_b] {
            let value = parse(&rx.recv().await.unwrap());
            assert_eq!(value["data"].as_array().unwrap().len(), 1);
        }
    }

    #[tokio::test]
    async fn test_idle_subscriber_holds_only_latest_snapshot() {
        let broadcaster = QuoteBroadcaster::new();
        let instruments = default_instruments();
        let store = PriceStore::with_instruments(instruments.clone());

        let (_id, mut rx) = broadcaster.subscribe(&store).await.unwrap();
        for round in 0..100 {
            let len = round % instruments.len() + 1;
            broadcaster.broadcast(&instruments[..len]).await.unwrap();
        }

        let mut pending = Vec::new();
        while let Some(text) = rx.try_recv() {
            pending.push(text);
        }

        assert_eq!(pending.len(), 1);
        let last_len = 99 % instruments.len() + 1;
        assert_eq!(parse(&pending[0])["data"].as_array().unwrap().len(), last_len);
    }

    #[tokio::test]
    async fn test_snapshot_taken_at_registration() {
        let broadcaster = QuoteBroadcaster::new();
        let store = PriceStore::with_instruments(default_instruments());
        let mut moved = store.get(1).await.unwrap();
        moved.bid = rust_decimal::Decimal::ONE;
        store.commit(vec![moved]).await;

        let (_id, mut rx) = broadcaster.subscribe(&store).await.unwrap();
        let value = parse(&rx.recv().await.unwrap());

        assert_eq!(value["data"][0]["bid"], "1");
    }

    #[tokio::test]
    async fn test_closed_subscriber_is_dropped_without_affecting_others() {
        let broadcaster = QuoteBroadcaster::new();
        let instruments = default_instruments();
        let store = PriceStore::with_instruments(instruments.clone());

        let (_gone, rx_gone) = broadcaster.subscribe(&store).await.unwrap();
        let (_live, mut rx_live) = broadcaster.subscribe(&store).await.unwrap();
        drop(rx_gone);

        let delivered = broadcaster.broadcast(&instruments).await.unwrap();

        assert_eq!(delivered, 1);
        assert_eq!(broadcaster.subscriber_count().await, 1);
        rx_live.recv().await.unwrap();
        assert!(rx_live.try_recv().is_none());
    }

    #[tokio::test]
    async fn test_unsubscribe_ends_receiver() {
        let broadcaster = QuoteBroadcaster::new();
        let (id, mut rx) = broadcaster.subscribe(&PriceStore::new()).await.unwrap();
        rx.recv().await.unwrap();

        broadcaster.unsubscribe(id).await;
        broadcaster.unsubscribe(id).await;

        assert_eq!(broadcaster.subscriber_count().await, 0);
        assert_eq!(broadcaster.broadcast(&[]).await.unwrap(), 0);
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_subscriber_ids_are_unique() {
        let broadcaster = QuoteBroadcaster::new();
        let store = PriceStore::new();
        let (a, _rx_a) = broadcaster.subscribe(&store).await.unwrap();
        let (b, _rx_b) = broadcaster.subscribe(&store).await.unwrap();

        assert_ne!(a, b);
    }
}
