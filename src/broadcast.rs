//! Topic-based event fan-out to spectators.
//!
//! Each topic is a `tokio::sync::broadcast` channel with a bounded
//! per-subscriber buffer. Publishing never blocks: a subscriber that stops
//! draining loses its oldest unread events, and the next receive surfaces
//! a [`Note::Resync`] marker telling it to fetch a fresh snapshot instead
//! of trusting its replayed view.
//!
//! The broadcaster is generic over the event type; the coordinator runs
//! one instance for the dashboard topic and one for the per-match topics.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use tokio::sync::broadcast;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::{Stream, StreamExt};

/// Capacity of every subscriber buffer, in events.
pub const SUBSCRIBER_BUFFER: usize = 64;

/// What a subscriber receives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Note<E> {
    /// A published event.
    Event(E),
    /// Events were dropped because the subscriber lagged; it should fetch
    /// a fresh snapshot before consuming further events.
    Resync,
}

/// Topic registry and publishing side.
pub struct Broadcaster<E> {
    topics: Mutex<HashMap<String, broadcast::Sender<E>>>,
}

impl<E: Clone + Send + 'static> Default for Broadcaster<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: Clone + Send + 'static> Broadcaster<E> {
    /// An empty registry.
    pub fn new() -> Broadcaster<E> {
        Broadcaster {
            topics: Mutex::new(HashMap::new()),
        }
    }

    /// Publishes to a topic and returns how many subscribers got the event.
    ///
    /// A topic nobody listens to swallows the event; its channel is pruned
    /// so abandoned topics do not accumulate.
    pub fn publish(&self, topic: &str, event: E) -> usize {
        let mut topics = self.topics.lock().expect("poisoned");
        match topics.get(topic) {
            Some(tx) => match tx.send(event) {
                Ok(n) => n,
                Err(_) => {
                    topics.remove(topic);
                    0
                }
            },
            None => 0,
        }
    }

    /// Subscribes to a topic, delivering `initial` before live events.
    ///
    /// The initial events are the subscriber's private snapshot; they are
    /// not rebroadcast to anyone else.
    pub fn subscribe(&self, topic: &str, initial: Vec<E>) -> Subscription<E> {
        let rx = self.receiver(topic);
        Subscription {
            pending: initial.into_iter().map(Note::Event).collect(),
            _guard: None,
            rx,
        }
    }

    /// Like [`Broadcaster::subscribe`], but announces subscriber-count
    /// changes on the topic itself.
    ///
    /// `on_count` builds the announcement event from the current count; it
    /// is published right away and again when the subscription is dropped.
    pub fn subscribe_counted(
        &self,
        topic: &str,
        initial: Vec<E>,
        on_count: Arc<dyn Fn(usize) -> E + Send + Sync>,
    ) -> Subscription<E> {
        let rx = self.receiver(topic);
        let tx = {
            let topics = self.topics.lock().expect("poisoned");
            topics.get(topic).cloned()
        };
        let guard = tx.map(|tx| {
            let _ = tx.send(on_count(tx.receiver_count()));
            CountGuard { tx, on_count }
        });
        Subscription {
            pending: initial.into_iter().map(Note::Event).collect(),
            _guard: guard,
            rx,
        }
    }

    /// Live subscriber count of a topic.
    pub fn receiver_count(&self, topic: &str) -> usize {
        let topics = self.topics.lock().expect("poisoned");
        topics.get(topic).map(|tx| tx.receiver_count()).unwrap_or(0)
    }

    /// Drops every topic; active subscriptions end their streams.
    pub fn clear(&self) {
        self.topics.lock().expect("poisoned").clear();
    }

    fn receiver(&self, topic: &str) -> broadcast::Receiver<E> {
        let mut topics = self.topics.lock().expect("poisoned");
        topics
            .entry(topic.to_owned())
            .or_insert_with(|| broadcast::channel(SUBSCRIBER_BUFFER).0)
            .subscribe()
    }
}

struct CountGuard<E> {
    tx: broadcast::Sender<E>,
    on_count: Arc<dyn Fn(usize) -> E + Send + Sync>,
}

impl<E> Drop for CountGuard<E> {
    fn drop(&mut self) {
        // The dropping subscriber's receiver is still registered here.
        let remaining = self.tx.receiver_count().saturating_sub(1);
        let _ = self.tx.send((self.on_count)(remaining));
    }
}

/// Receiving side of one subscriber.
pub struct Subscription<E> {
    pending: VecDeque<Note<E>>,
    // Declared before `rx` so the count announcement still sees this
    // receiver registered.
    _guard: Option<CountGuard<E>>,
    rx: broadcast::Receiver<E>,
}

impl<E: Clone + Send + 'static> Subscription<E> {
    /// Next note, or `None` once the topic is gone.
    pub async fn recv(&mut self) -> Option<Note<E>> {
        if let Some(note) = self.pending.pop_front() {
            return Some(note);
        }
        match self.rx.recv().await {
            Ok(event) => Some(Note::Event(event)),
            Err(broadcast::error::RecvError::Lagged(_)) => Some(Note::Resync),
            Err(broadcast::error::RecvError::Closed) => None,
        }
    }

    /// Consumes the subscription into a `Stream` of notes.
    pub fn into_stream(self) -> impl Stream<Item = Note<E>> {
        let Subscription {
            pending,
            _guard,
            rx,
        } = self;
        let live = BroadcastStream::new(rx).map(move |item| {
            let _hold = &_guard;
            match item {
                Ok(event) => Note::Event(event),
                Err(BroadcastStreamRecvError::Lagged(_)) => Note::Resync,
            }
        });
        tokio_stream::iter(pending).chain(live)
    }
}

#[cfg(test)]
mod broadcast_tests {
    use super::*;

    #[tokio::test]
    async fn initial_events_are_delivered_before_live_ones() {
        let hub: Broadcaster<u32> = Broadcaster::new();
        let mut sub = hub.subscribe("t", vec![1, 2]);
        hub.publish("t", 3);
        assert_eq!(sub.recv().await, Some(Note::Event(1)));
        assert_eq!(sub.recv().await, Some(Note::Event(2)));
        assert_eq!(sub.recv().await, Some(Note::Event(3)));
    }

    #[tokio::test]
    async fn lagging_subscriber_gets_a_resync_marker() {
        let hub: Broadcaster<usize> = Broadcaster::new();
        let mut sub = hub.subscribe("t", vec![]);
        for i in 0..SUBSCRIBER_BUFFER + 10 {
            hub.publish("t", i);
        }
        assert_eq!(sub.recv().await, Some(Note::Resync));
        // The oldest retained event follows the marker.
        assert_eq!(sub.recv().await, Some(Note::Event(10)));
    }

    #[tokio::test]
    async fn publishing_without_subscribers_does_not_block_or_fail() {
        let hub: Broadcaster<u32> = Broadcaster::new();
        assert_eq!(hub.publish("nobody", 7), 0);
    }

    #[tokio::test]
    async fn topics_are_isolated() {
        let hub: Broadcaster<u32> = Broadcaster::new();
        let mut left = hub.subscribe("left", vec![]);
        let _right = hub.subscribe("right", vec![]);
        hub.publish("right", 9);
        hub.publish("left", 1);
        assert_eq!(left.recv().await, Some(Note::Event(1)));
    }

    #[tokio::test]
    async fn clear_ends_active_subscriptions() {
        let hub: Broadcaster<u32> = Broadcaster::new();
        let mut sub = hub.subscribe("t", vec![]);
        hub.clear();
        assert_eq!(sub.recv().await, None);
    }

    #[tokio::test]
    async fn counted_subscriptions_announce_joins_and_leaves() {
        let hub: Broadcaster<usize> = Broadcaster::new();
        let mut watcher = hub.subscribe("t", vec![]);
        let counted = hub.subscribe_counted("t", vec![], Arc::new(|n| n + 100));
        assert_eq!(watcher.recv().await, Some(Note::Event(102)));
        drop(counted);
        assert_eq!(watcher.recv().await, Some(Note::Event(101)));
    }

    #[tokio::test]
    async fn stream_view_yields_pending_then_live() {
        let hub: Broadcaster<u32> = Broadcaster::new();
        let sub = hub.subscribe("t", vec![5]);
        hub.publish("t", 6);
        hub.clear();
        let notes: Vec<Note<u32>> = sub.into_stream().collect().await;
        assert_eq!(notes, vec![Note::Event(5), Note::Event(6)]);
    }
}
