// Event System for the Setup Scanner
// Pub/sub bus for detector output: synchronous callbacks plus a tokio broadcast channel

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::sync::Arc;
use tokio::sync::broadcast;
use parking_lot::RwLock;
use uuid::Uuid;

// ============================================================================
// Event Priority
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EventPriority {
    Critical = 1,  // Composite setup alerts
    High = 2,      // Compression edges, MA crosses
    Medium = 3,    // MA touches, magnet updates
    Low = 4,       // Flat-run ratings
    Info = 5,      // Snapshots (MA values, compression distance)
}

impl fmt::Display for EventPriority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

// ============================================================================
// Event
// ============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct Event {
    pub event_type: String,
    pub timestamp: i64,
    pub data: HashMap<String, serde_json::Value>,
    pub source: String,
    pub priority: EventPriority,
    pub event_id: String,
}

impl Event {
    pub fn new(
        event_type: String,
        timestamp: i64,
        data: HashMap<String, serde_json::Value>,
        source: String,
        priority: EventPriority,
    ) -> Self {
        Self {
            event_type,
            timestamp,
            data,
            source,
            priority,
            event_id: Uuid::new_v4().to_string(),
        }
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Event(type={}, source={}, priority={:?}, id={})",
            self.event_type,
            self.source,
            self.priority,
            &self.event_id[..8]
        )
    }
}

// ============================================================================
// Event Bus
// ============================================================================

type EventCallback = Arc<dyn Fn(Event) + Send + Sync>;

pub struct EventBus {
    tx: broadcast::Sender<Event>,
    subscribers: RwLock<HashMap<String, Vec<EventCallback>>>,
    wildcard_subscribers: RwLock<Vec<EventCallback>>,
    event_history: RwLock<VecDeque<Event>>,
    max_history: usize,
    stats: RwLock<EventBusStats>,
}

#[derive(Debug, Clone, Default)]
struct EventBusStats {
    total_published: u64,
    total_delivered: u64,
    channel_misses: u64,
}

impl EventBus {
    pub fn new() -> Self {
        Self::with_capacity(10_000, 1_000)
    }

    /// `channel_capacity` bounds the broadcast channel, `max_history` the replay buffer
    pub fn with_capacity(channel_capacity: usize, max_history: usize) -> Self {
        let (tx, _rx) = broadcast::channel(channel_capacity.max(1));

        Self {
            tx,
            subscribers: RwLock::new(HashMap::new()),
            wildcard_subscribers: RwLock::new(Vec::new()),
            event_history: RwLock::new(VecDeque::with_capacity(max_history.min(10_000))),
            max_history,
            stats: RwLock::new(EventBusStats::default()),
        }
    }

    /// Subscribe to events by type, or "*" for all events
    pub fn subscribe<F>(&self, event_type: &str, callback: F)
    where
        F: Fn(Event) + Send + Sync + 'static,
    {
        let callback = Arc::new(callback);

        if event_type == "*" {
            self.wildcard_subscribers.write().push(callback);
        } else {
            self.subscribers
                .write()
                .entry(event_type.to_string())
                .or_default()
                .push(callback);
        }

        tracing::debug!(event_type = %event_type, "Subscribed to events");
    }

    /// Publish event to all subscribers
    pub fn publish(&self, event: Event) {
        self.stats.write().total_published += 1;

        if self.max_history > 0 {
            let mut history = self.event_history.write();
            history.push_back(event.clone());
            if history.len() > self.max_history {
                history.pop_front();
            }
        }

        // No receivers is not an error for a broadcast channel
        if self.tx.send(event.clone()).is_err() {
            self.stats.write().channel_misses += 1;
        }

        // Callbacks are cloned out so a subscriber may publish re-entrantly
        let direct: Vec<EventCallback> = self
            .subscribers
            .read()
            .get(&event.event_type)
            .cloned()
            .unwrap_or_default();
        let wildcard: Vec<EventCallback> = self.wildcard_subscribers.read().clone();

        for callback in direct.iter().chain(wildcard.iter()) {
            callback(event.clone());
        }
        self.stats.write().total_delivered += (direct.len() + wildcard.len()) as u64;
    }

    /// Get a receiver for all events (broadcast channel)
    pub fn subscribe_channel(&self) -> broadcast::Receiver<Event> {
        self.tx.subscribe()
    }

    /// Most recent events first
    pub fn get_recent_events(&self, event_type: Option<&str>, limit: Option<usize>) -> Vec<Event> {
        let history = self.event_history.read();
        let limit = limit.unwrap_or(100);

        history
            .iter()
            .rev()
            .filter(|e| event_type.map_or(true, |et| e.event_type == et))
            .take(limit)
            .cloned()
            .collect()
    }

    pub fn get_stats(&self) -> EventBusStatsSnapshot {
        let stats = self.stats.read();
        let subscribers = self.subscribers.read();
        let wildcard = self.wildcard_subscribers.read();

        EventBusStatsSnapshot {
            total_published: stats.total_published,
            total_delivered: stats.total_delivered,
            channel_misses: stats.channel_misses,
            subscriber_count: subscribers.values().map(Vec::len).sum::<usize>() + wildcard.len(),
            event_types: subscribers.keys().cloned().collect(),
            history_size: self.event_history.read().len(),
        }
    }

    pub fn clear_history(&self) {
        self.event_history.write().clear();
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

/// Snapshot of event bus statistics
#[derive(Debug, Clone)]
pub struct EventBusStatsSnapshot {
    pub total_published: u64,
    pub total_delivered: u64,
    pub channel_misses: u64,
    pub subscriber_count: usize,
    pub event_types: Vec<String>,
    pub history_size: usize,
}
