//! Host-wide event bus.
//!
//! Events are routed by exact `type` string. Handlers registered with
//! [`EventBus::on`] run synchronously inside [`EventBus::emit`], in
//! registration order; every emitted event is also copied to a broadcast
//! tap for observers that want the whole stream.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::broadcast;

/// Capacity of the observer tap; slow observers lag rather than block emit
const TAP_CAPACITY: usize = 1024;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PanelEvent {
    #[serde(rename = "type")]
    pub event_type: String,
    /// Panel id (or other emitter) that produced the event
    pub source: String,
    /// Milliseconds since the Unix epoch
    pub timestamp: u64,
    #[serde(default)]
    pub payload: Value,
}

impl PanelEvent {
    pub fn new(event_type: impl Into<String>, source: impl Into<String>, payload: Value) -> Self {
        Self {
            event_type: event_type.into(),
            source: source.into(),
            timestamp: epoch_millis(),
            payload,
        }
    }
}

pub fn epoch_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}

pub type HandlerId = u64;

type Handler = Arc<dyn Fn(&PanelEvent) + Send + Sync>;

#[derive(Default)]
struct Registry {
    next_id: HandlerId,
    handlers: BTreeMap<String, Vec<(HandlerId, Handler)>>,
}

impl Registry {
    fn remove(&mut self, event_type: &str, id: HandlerId) -> bool {
        let Some(list) = self.handlers.get_mut(event_type) else {
            return false;
        };
        let before = list.len();
        list.retain(|(hid, _)| *hid != id);
        let removed = list.len() != before;
        if list.is_empty() {
            self.handlers.remove(event_type);
        }
        removed
    }
}

fn lock(registry: &Mutex<Registry>) -> MutexGuard<'_, Registry> {
    registry.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Clone)]
pub struct EventBus {
    registry: Arc<Mutex<Registry>>,
    tap: broadcast::Sender<PanelEvent>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBus {
    pub fn new() -> Self {
        let (tap, _) = broadcast::channel(TAP_CAPACITY);
        Self {
            registry: Arc::new(Mutex::new(Registry::default())),
            tap,
        }
    }

    /// Deliver `event` to every handler registered for its type, then to
    /// the tap.
    pub fn emit(&self, event: PanelEvent) {
        // Snapshot the handlers so they may (un)subscribe or emit re-entrantly
        let handlers: Vec<Handler> = lock(&self.registry)
            .handlers
            .get(&event.event_type)
            .map(|list| list.iter().map(|(_, h)| h.clone()).collect())
            .unwrap_or_default();

        for handler in handlers {
            handler(&event);
        }

        let _ = self.tap.send(event);
    }

    /// Register `handler` for `event_type`. The handler stays registered
    /// until the returned [`Subscription`] is dropped or unsubscribed.
    pub fn on<F>(&self, event_type: &str, handler: F) -> Subscription
    where
        F: Fn(&PanelEvent) + Send + Sync + 'static,
    {
        let mut registry = lock(&self.registry);
        registry.next_id += 1;
        let id = registry.next_id;
        registry
            .handlers
            .entry(event_type.to_string())
            .or_default()
            .push((id, Arc::new(handler)));

        Subscription {
            registry: Arc::downgrade(&self.registry),
            event_type: event_type.to_string(),
            id,
            active: true,
        }
    }

    /// Remove a handler by id. Returns false if it was not registered.
    pub fn off(&self, event_type: &str, id: HandlerId) -> bool {
        lock(&self.registry).remove(event_type, id)
    }

    /// Receive a copy of every event emitted from now on
    pub fn subscribe_all(&self) -> broadcast::Receiver<PanelEvent> {
        self.tap.subscribe()
    }

    pub fn handler_count(&self, event_type: &str) -> usize {
        lock(&self.registry)
            .handlers
            .get(event_type)
            .map(Vec::len)
            .unwrap_or(0)
    }

    /// Total number of registered handlers across all event types
    pub fn total_handlers(&self) -> usize {
        lock(&self.registry).handlers.values().map(Vec::len).sum()
    }
}

/// Registration guard returned by [`EventBus::on`]; dropping it unsubscribes
pub struct Subscription {
    registry: Weak<Mutex<Registry>>,
    event_type: String,
    id: HandlerId,
    active: bool,
}

impl Subscription {
    pub fn id(&self) -> HandlerId {
        self.id
    }

    pub fn event_type(&self) -> &str {
        &self.event_type
    }

    pub fn unsubscribe(mut self) {
        self.release();
    }

    fn release(&mut self) {
        if !self.active {
            return;
        }
        self.active = false;
        if let Some(registry) = self.registry.upgrade() {
            lock(&registry).remove(&self.event_type, self.id);
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.release();
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("event_type", &self.event_type)
            .field("id", &self.id)
            .field("active", &self.active)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counter(bus: &EventBus, event_type: &str) -> (Arc<AtomicUsize>, Subscription) {
        let count = Arc::new(AtomicUsize::new(0));
        let seen = count.clone();
        let sub = bus.on(event_type, move |_| {
            seen.fetch_add(1, Ordering::SeqCst);
        });
        (count, sub)
    }

    #[test]
    fn test_routes_by_exact_type() {
        let bus = EventBus::new();
        let (count, _sub) = counter(&bus, "local-projects:filter");

        bus.emit(PanelEvent::new("local-projects:filter", "test", Value::Null));
        bus.emit(PanelEvent::new("local-projects:Filter", "test", Value::Null));
        bus.emit(PanelEvent::new("workspaces:filter", "test", Value::Null));

        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_drop_unsubscribes() {
        let bus = EventBus::new();
        let (count, sub) = counter(&bus, "a:b");
        assert_eq!(bus.handler_count("a:b"), 1);

        drop(sub);
        assert_eq!(bus.handler_count("a:b"), 0);
        bus.emit(PanelEvent::new("a:b", "test", Value::Null));
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_off_by_id() {
        let bus = EventBus::new();
        let (_count, sub) = counter(&bus, "a:b");
        assert!(bus.off("a:b", sub.id()));
        assert!(!bus.off("a:b", sub.id()));
        // releasing an already removed handler is harmless
        sub.unsubscribe();
        assert_eq!(bus.total_handlers(), 0);
    }

    #[test]
    fn test_tap_sees_every_event() {
        let bus = EventBus::new();
        let mut tap = bus.subscribe_all();
        bus.emit(PanelEvent::new("x:y", "src", serde_json::json!({ "n": 1 })));

        let event = tap.try_recv().unwrap();
        assert_eq!(event.event_type, "x:y");
        assert_eq!(event.source, "src");
        assert_eq!(event.payload["n"], 1);
        assert!(event.timestamp > 0);
    }

    #[test]
    fn test_event_wire_shape() {
        let event = PanelEvent {
            event_type: "github-starred:filter".into(),
            source: "tool-call".into(),
            timestamp: 1,
            payload: serde_json::json!({ "filter": "beta" }),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "github-starred:filter");
        assert_eq!(json["payload"]["filter"], "beta");
    }
}
