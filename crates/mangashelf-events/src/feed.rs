//! Observable collection snapshots.
//!
//! # Design
//! - Every published change carries the full post-change snapshot, so a
//!   subscriber never has to reconstruct state from deltas.
//! - Each subscriber owns an unbounded channel: events arrive in publish order
//!   and are never coalesced.
//! - Subscribing replays the current snapshot immediately.
//! - Dropping a [`Subscription`] unregisters it.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender, error::TryRecvError};

/// What happened to the collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    /// The collection was (re)loaded from persistence.
    Loaded,
    /// A new entity was appended.
    Added {
        /// Identifier of the new entity.
        id: u64,
    },
    /// An existing entity was replaced.
    Updated {
        /// Identifier of the replaced entity.
        id: u64,
    },
    /// An entity was removed.
    Removed {
        /// Identifier of the removed entity.
        id: u64,
    },
}

/// Change notification delivered to subscribers.
#[derive(Debug)]
pub struct CollectionChange<T> {
    /// Kind of mutation.
    pub kind: ChangeKind,
    /// Full collection after the mutation was applied.
    pub snapshot: Arc<Vec<T>>,
}

impl<T> Clone for CollectionChange<T> {
    fn clone(&self) -> Self {
        Self {
            kind: self.kind,
            snapshot: Arc::clone(&self.snapshot),
        }
    }
}

struct FeedState<T> {
    snapshot: Arc<Vec<T>>,
    subscribers: Vec<(u64, UnboundedSender<CollectionChange<T>>)>,
    next_subscriber: u64,
}

/// Publisher side of a collection notification channel.
pub struct CollectionFeed<T> {
    state: Arc<Mutex<FeedState<T>>>,
}

impl<T> Clone for CollectionFeed<T> {
    fn clone(&self) -> Self {
        Self {
            state: Arc::clone(&self.state),
        }
    }
}

impl<T> Default for CollectionFeed<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> CollectionFeed<T> {
    /// Create a feed with an empty snapshot and no subscribers.
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(FeedState {
                snapshot: Arc::new(Vec::new()),
                subscribers: Vec::new(),
                next_subscriber: 1,
            })),
        }
    }

    /// Record a new snapshot and notify every live subscriber in order.
    pub fn publish(&self, kind: ChangeKind, snapshot: Vec<T>) {
        let mut state = self.lock();
        let snapshot = Arc::new(snapshot);
        state.snapshot = Arc::clone(&snapshot);
        let change = CollectionChange { kind, snapshot };
        state
            .subscribers
            .retain(|(_, sender)| sender.send(change.clone()).is_ok());
    }

    /// Snapshot as of the last publish.
    #[must_use]
    pub fn snapshot(&self) -> Arc<Vec<T>> {
        Arc::clone(&self.lock().snapshot)
    }

    /// Register a subscriber. The returned handle already holds the current
    /// snapshot.
    #[must_use]
    pub fn subscribe(&self) -> Subscription<T> {
        let (sender, receiver) = mpsc::unbounded_channel();
        let mut state = self.lock();
        let id = state.next_subscriber;
        state.next_subscriber = state.next_subscriber.saturating_add(1);
        state.subscribers.push((id, sender));
        Subscription {
            id,
            current: Arc::clone(&state.snapshot),
            receiver,
            feed: Arc::downgrade(&self.state),
        }
    }

    /// Number of registered subscribers.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.lock().subscribers.len()
    }

    fn lock(&self) -> MutexGuard<'_, FeedState<T>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Subscriber handle returned by [`CollectionFeed::subscribe`].
pub struct Subscription<T> {
    id: u64,
    current: Arc<Vec<T>>,
    receiver: UnboundedReceiver<CollectionChange<T>>,
    feed: Weak<Mutex<FeedState<T>>>,
}

impl<T> Subscription<T> {
    /// Latest snapshot this subscriber has observed.
    #[must_use]
    pub fn current(&self) -> &[T] {
        &self.current
    }

    /// Wait for the next change. Returns `None` once the feed is gone.
    pub async fn next(&mut self) -> Option<CollectionChange<T>> {
        let change = self.receiver.recv().await?;
        self.current = Arc::clone(&change.snapshot);
        Some(change)
    }

    /// Take the next change if one is already queued.
    pub fn try_next(&mut self) -> Option<CollectionChange<T>> {
        match self.receiver.try_recv() {
            Ok(change) => {
                self.current = Arc::clone(&change.snapshot);
                Some(change)
            }
            Err(TryRecvError::Empty | TryRecvError::Disconnected) => None,
        }
    }

    /// Stop receiving changes.
    pub fn unsubscribe(self) {}
}

impl<T> Drop for Subscription<T> {
    fn drop(&mut self) {
        if let Some(state) = self.feed.upgrade() {
            let mut state = state.lock().unwrap_or_else(PoisonError::into_inner);
            state.subscribers.retain(|(id, _)| *id != self.id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subscribe_replays_current_snapshot() {
        let feed = CollectionFeed::new();
        feed.publish(ChangeKind::Loaded, vec!["a", "b"]);
        let subscription = feed.subscribe();
        assert_eq!(subscription.current(), &["a", "b"]);
    }

    #[tokio::test]
    async fn changes_arrive_in_publish_order_without_coalescing() {
        let feed = CollectionFeed::new();
        let mut subscription = feed.subscribe();
        feed.publish(ChangeKind::Added { id: 1 }, vec![1]);
        feed.publish(ChangeKind::Added { id: 2 }, vec![1, 2]);
        feed.publish(ChangeKind::Removed { id: 1 }, vec![2]);

        let mut kinds = Vec::new();
        while let Some(change) = subscription.try_next() {
            kinds.push(change.kind);
        }
        assert_eq!(
            kinds,
            vec![
                ChangeKind::Added { id: 1 },
                ChangeKind::Added { id: 2 },
                ChangeKind::Removed { id: 1 },
            ]
        );
        assert_eq!(subscription.current(), &[2]);
    }

    #[test]
    fn dropping_subscription_unregisters_it() {
        let feed: CollectionFeed<u8> = CollectionFeed::new();
        let first = feed.subscribe();
        let second = feed.subscribe();
        assert_eq!(feed.subscriber_count(), 2);
        first.unsubscribe();
        assert_eq!(feed.subscriber_count(), 1);
        drop(second);
        assert_eq!(feed.subscriber_count(), 0);
        feed.publish(ChangeKind::Loaded, vec![1]);
        assert_eq!(feed.snapshot().as_slice(), &[1]);
    }
}
