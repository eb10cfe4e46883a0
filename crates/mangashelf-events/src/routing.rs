//! Lifecycle event bus with replay.
//!
//! # Design
//! - `tokio::broadcast` fans out to live subscribers; overflow drops the
//!   oldest events instead of blocking publishers.
//! - A bounded replay ring lets a subscriber resume after a known id.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::Utc;
use tokio::sync::broadcast::{self, Sender};
use tokio_stream::StreamExt;
use tokio_stream::wrappers::BroadcastStream;

use crate::payloads::{DEFAULT_REPLAY_CAPACITY, Event, EventEnvelope, EventId};

/// Shared event bus built on top of `tokio::broadcast`.
#[derive(Clone)]
pub struct EventBus {
    sender: Sender<EventEnvelope>,
    replay: Arc<Mutex<VecDeque<EventEnvelope>>>,
    replay_capacity: usize,
    next_id: Arc<Mutex<EventId>>,
}

impl EventBus {
    /// Construct a bus with a custom replay capacity (clamped to at least one).
    #[must_use]
    pub fn with_capacity(replay_capacity: usize) -> Self {
        let replay_capacity = replay_capacity.max(1);
        let (sender, _) = broadcast::channel(replay_capacity);
        Self {
            sender,
            replay: Arc::new(Mutex::new(VecDeque::with_capacity(replay_capacity))),
            replay_capacity,
            next_id: Arc::new(Mutex::new(1)),
        }
    }

    /// Construct a bus with the default replay capacity.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_REPLAY_CAPACITY)
    }

    /// Subscribe to the bus. When `last_event_id` is provided, buffered events
    /// newer than it are yielded before live traffic.
    #[must_use]
    pub fn subscribe(&self, last_event_id: Option<EventId>) -> EventStream {
        let receiver = self.sender.subscribe();
        let backlog: VecDeque<EventEnvelope> = last_event_id
            .map(|id| self.backlog_since(id).into_iter().collect())
            .unwrap_or_default();
        EventStream {
            replayed_until: backlog.back().map(|env| env.id),
            backlog,
            inner: BroadcastStream::new(receiver),
        }
    }

    /// Publish a new event to all subscribers and return its id.
    pub fn publish(&self, event: Event) -> EventId {
        let mut next = self.next_id.lock().unwrap_or_else(PoisonError::into_inner);
        let id = *next;
        *next = next.saturating_add(1);

        let envelope = EventEnvelope {
            id,
            timestamp: Utc::now(),
            event,
        };
        {
            let mut replay = self.lock_replay();
            if replay.len() == self.replay_capacity {
                let _ = replay.pop_front();
            }
            replay.push_back(envelope.clone());
        }
        let _ = self.sender.send(envelope);
        drop(next);
        id
    }

    /// Last event id observed in the replay buffer.
    #[must_use]
    pub fn last_event_id(&self) -> Option<EventId> {
        self.lock_replay().back().map(|env| env.id)
    }

    /// Collect a backlog of events emitted after the specified id.
    #[must_use]
    pub fn backlog_since(&self, id: EventId) -> Vec<EventEnvelope> {
        let replay = self.lock_replay();
        replay.iter().filter(|env| env.id > id).cloned().collect()
    }

    fn lock_replay(&self) -> MutexGuard<'_, VecDeque<EventEnvelope>> {
        self.replay.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

/// Subscriber handle yielding replayed events first, then live events.
pub struct EventStream {
    backlog: VecDeque<EventEnvelope>,
    replayed_until: Option<EventId>,
    inner: BroadcastStream<EventEnvelope>,
}

impl EventStream {
    /// Receive the next event. Lagged gaps are skipped; `None` once the bus
    /// has been dropped.
    pub async fn next(&mut self) -> Option<EventEnvelope> {
        if let Some(envelope) = self.backlog.pop_front() {
            return Some(envelope);
        }
        while let Some(item) = self.inner.next().await {
            let Ok(envelope) = item else {
                continue;
            };
            // Events published between subscribe and backlog capture arrive twice.
            if self.replayed_until.is_some_and(|until| envelope.id <= until) {
                continue;
            }
            return Some(envelope);
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::time::timeout;

    fn progress(cur: usize) -> Event {
        Event::DownloadProgress {
            gallery: "Test Manga".into(),
            cur,
            total: 9,
        }
    }

    #[tokio::test]
    async fn publish_and_replay_from_id() {
        let bus = EventBus::with_capacity(4);
        let first = bus.publish(progress(3));
        let second = bus.publish(Event::QueueIdle);

        assert_eq!(bus.last_event_id(), Some(second));
        let backlog = bus.backlog_since(first);
        assert_eq!(backlog.len(), 1);
        assert_eq!(backlog[0].id, second);
    }

    #[tokio::test]
    async fn replay_ring_drops_oldest_when_full() {
        let bus = EventBus::with_capacity(2);
        for cur in [3, 6, 9] {
            let _ = bus.publish(progress(cur));
        }
        let backlog = bus.backlog_since(0);
        assert_eq!(backlog.len(), 2);
        assert_eq!(backlog[0].id, 2);
    }

    #[tokio::test]
    async fn subscriber_receives_backlog_then_live_events() {
        let bus = EventBus::new();
        let first = bus.publish(progress(3));
        let second = bus.publish(progress(6));
        let mut stream = bus.subscribe(Some(first));
        let third = bus.publish(progress(9));

        let replayed = timeout(Duration::from_secs(1), stream.next())
            .await
            .expect("replayed event")
            .expect("stream open");
        assert_eq!(replayed.id, second);

        let live = timeout(Duration::from_secs(1), stream.next())
            .await
            .expect("live event")
            .expect("stream open");
        assert_eq!(live.id, third);
        assert!(matches!(live.event, Event::DownloadProgress { cur: 9, .. }));
    }
}
