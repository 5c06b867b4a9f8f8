// SPDX-License-Identifier: MIT OR Apache-2.0
//! Deferred event bus connecting the graph model to its observers.
//!
//! Graph mutations never call observers directly. They publish a
//! [`GraphEvent`] onto one of two FIFO queues, and observers only run when
//! [`EventBus::flush`] is called: every immediate event first, then every
//! deferred event, each in publish order.
//!
//! Events published while a flush is running are queued for the *next*
//! flush, so a handler can never starve the caller by feeding itself.

use crate::node::BaseType;
use indexmap::IndexMap;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use uuid::Uuid;

/// Type tag of a [`GraphEvent`], used as the subscription key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventKind {
    /// A node was registered in the graph
    NodeCreated,
    /// An input port was added to a node
    InputPortAdded,
    /// An output port was added to a node
    OutputPortAdded,
    /// Two ports were connected
    PortConnected,
    /// Every node was dropped
    NodesCleared,
    /// The selection changed in a view
    NodesSelected,
    /// A view asked the model to connect two ports
    ConnectRequested,
}

impl EventKind {
    /// Stable tag used in logs
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NodeCreated => "node_create",
            Self::InputPortAdded => "node_addInputPort",
            Self::OutputPortAdded => "node_addOutputPort",
            Self::PortConnected => "port_connect",
            Self::NodesCleared => "node_clear",
            Self::NodesSelected => "node_select",
            Self::ConnectRequested => "port_connect_request",
        }
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An event published by the graph model or one of its views.
///
/// Events carry names rather than references, so observers resolve them
/// against their own structures and may legitimately find nothing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum GraphEvent {
    /// A node was registered
    NodeCreated {
        /// Node name
        name: String,
        /// Kind the node was instantiated from
        kind: String,
        /// Base type of the kind
        base_type: BaseType,
    },
    /// An input port was added
    InputPortAdded {
        /// Owning node
        node: String,
        /// Port name
        port: String,
    },
    /// An output port was added
    OutputPortAdded {
        /// Owning node
        node: String,
        /// Port name
        port: String,
    },
    /// Two ports were connected; `from_node.port_out` feeds `to_node.port_in`
    PortConnected {
        /// Node owning the output port
        from_node: String,
        /// Node owning the input port
        to_node: String,
        /// Input port name
        port_in: String,
        /// Output port name
        port_out: String,
    },
    /// All nodes were dropped
    NodesCleared,
    /// Selection changed
    NodesSelected {
        /// Selected node names
        names: Vec<String>,
    },
    /// Request to connect `from_node.port_out` to `to_node.port_in`
    ConnectRequested {
        /// Node owning the output port
        from_node: String,
        /// Node owning the input port
        to_node: String,
        /// Input port name
        port_in: String,
        /// Output port name
        port_out: String,
    },
}

impl GraphEvent {
    /// The subscription key of this event
    pub fn kind(&self) -> EventKind {
        match self {
            Self::NodeCreated { .. } => EventKind::NodeCreated,
            Self::InputPortAdded { .. } => EventKind::InputPortAdded,
            Self::OutputPortAdded { .. } => EventKind::OutputPortAdded,
            Self::PortConnected { .. } => EventKind::PortConnected,
            Self::NodesCleared => EventKind::NodesCleared,
            Self::NodesSelected { .. } => EventKind::NodesSelected,
            Self::ConnectRequested { .. } => EventKind::ConnectRequested,
        }
    }
}

/// Which queue an event is appended to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Delivery {
    /// Delivered in the first half of a flush
    #[default]
    Immediate,
    /// Delivered after every immediate event of the same flush
    Deferred,
}

/// Opaque handle returned by [`EventBus::subscribe`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(Uuid);

impl SubscriptionId {
    fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

/// Counters describing what a single flush did
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FlushStats {
    /// Events that reached at least one handler
    pub delivered: usize,
    /// Events dropped because nobody subscribed to their kind
    pub dropped: usize,
    /// Total handler invocations
    pub handler_calls: usize,
}

/// Number of events waiting in each queue
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PendingEvents {
    /// Immediate queue length
    pub immediate: usize,
    /// Deferred queue length
    pub deferred: usize,
}

impl PendingEvents {
    /// Whether both queues are empty
    pub fn is_empty(&self) -> bool {
        self.immediate == 0 && self.deferred == 0
    }

    /// Total queued events
    pub fn total(&self) -> usize {
        self.immediate + self.deferred
    }
}

type Handler = Box<dyn FnMut(&GraphEvent) + Send>;

#[derive(Default)]
struct Queues {
    immediate: VecDeque<GraphEvent>,
    deferred: VecDeque<GraphEvent>,
}

#[derive(Default)]
struct HandlerTable {
    by_kind: IndexMap<EventKind, IndexMap<SubscriptionId, Handler>>,
}

impl HandlerTable {
    fn remove(&mut self, id: SubscriptionId) -> bool {
        self.by_kind
            .values_mut()
            .any(|handlers| handlers.shift_remove(&id).is_some())
    }

    fn merge(&mut self, other: HandlerTable) {
        for (kind, handlers) in other.by_kind {
            self.by_kind.entry(kind).or_default().extend(handlers);
        }
    }
}

#[derive(Default)]
struct BusInner {
    queues: Mutex<Queues>,
    handlers: Mutex<HandlerTable>,
    in_flight: Mutex<Vec<SubscriptionId>>,
    removed_while_flushing: Mutex<Vec<SubscriptionId>>,
    flushing: AtomicBool,
}

/// Handlers taken out for one flush.
///
/// Dropping the guard puts them back, also when a handler panics, so the
/// bus stays usable afterwards.
struct FlushGuard<'a> {
    inner: &'a BusInner,
    table: HandlerTable,
}

impl Drop for FlushGuard<'_> {
    fn drop(&mut self) {
        let mut table = std::mem::take(&mut self.table);
        {
            let mut handlers = self.inner.handlers.lock();
            table.merge(std::mem::take(&mut *handlers));
            for id in self.inner.removed_while_flushing.lock().drain(..) {
                table.remove(id);
            }
            *handlers = table;
        }
        self.inner.in_flight.lock().clear();
        self.inner.flushing.store(false, Ordering::Release);
    }
}

/// Shared handle to a deferred event queue.
///
/// Cloning is cheap and every clone talks to the same queues; separate
/// [`EventBus::new`] calls give fully independent buses.
#[derive(Clone, Default)]
pub struct EventBus {
    inner: Arc<BusInner>,
}

impl EventBus {
    /// Create a new bus with empty queues and no subscribers
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an event to the requested queue. Never dispatches.
    pub fn publish(&self, event: GraphEvent, delivery: Delivery) {
        tracing::debug!(kind = %event.kind(), ?delivery, "queue event");
        let mut queues = self.inner.queues.lock();
        match delivery {
            Delivery::Immediate => queues.immediate.push_back(event),
            Delivery::Deferred => queues.deferred.push_back(event),
        }
    }

    /// Append to the immediate queue
    pub fn publish_immediate(&self, event: GraphEvent) {
        self.publish(event, Delivery::Immediate);
    }

    /// Append to the deferred queue
    pub fn publish_deferred(&self, event: GraphEvent) {
        self.publish(event, Delivery::Deferred);
    }

    /// Register a handler for one event kind.
    ///
    /// Handlers added while a flush is running take effect once it returns.
    pub fn subscribe<F>(&self, kind: EventKind, handler: F) -> SubscriptionId
    where
        F: FnMut(&GraphEvent) + Send + 'static,
    {
        let id = SubscriptionId::new();
        self.inner
            .handlers
            .lock()
            .by_kind
            .entry(kind)
            .or_default()
            .insert(id, Box::new(handler));
        id
    }

    /// Remove a handler. Returns `false` for unknown handles.
    ///
    /// During a flush the removal is applied once the flush returns.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        if self.inner.handlers.lock().remove(id) {
            return true;
        }
        let mut in_flight = self.inner.in_flight.lock();
        let Some(index) = in_flight.iter().position(|known| *known == id) else {
            return false;
        };
        in_flight.swap_remove(index);
        self.inner.removed_while_flushing.lock().push(id);
        true
    }

    /// Number of handlers registered for `kind`
    pub fn subscriber_count(&self, kind: EventKind) -> usize {
        self.inner
            .handlers
            .lock()
            .by_kind
            .get(&kind)
            .map_or(0, IndexMap::len)
    }

    /// Events waiting for the next flush
    pub fn pending(&self) -> PendingEvents {
        let queues = self.inner.queues.lock();
        PendingEvents {
            immediate: queues.immediate.len(),
            deferred: queues.deferred.len(),
        }
    }

    /// Deliver everything queued so far, immediate queue first.
    ///
    /// Both queues are empty when the call starts dispatching; whatever the
    /// handlers publish stays queued for the next flush. A flush started from
    /// inside a handler does nothing. If a handler panics, the events after
    /// it in this flush are lost but every subscription is kept.
    pub fn flush(&self) -> FlushStats {
        if self.inner.flushing.swap(true, Ordering::AcqRel) {
            tracing::warn!("flush called from inside an event handler; ignored");
            return FlushStats::default();
        }

        let Queues { immediate, deferred } = std::mem::take(&mut *self.inner.queues.lock());
        let mut guard = FlushGuard {
            inner: &self.inner,
            table: std::mem::take(&mut *self.inner.handlers.lock()),
        };
        *self.inner.in_flight.lock() = guard
            .table
            .by_kind
            .values()
            .flat_map(|handlers| handlers.keys().copied())
            .collect();
        let mut stats = FlushStats::default();

        for event in immediate.iter().chain(deferred.iter()) {
            let kind = event.kind();
            match guard.table.by_kind.get_mut(&kind) {
                Some(handlers) if !handlers.is_empty() => {
                    tracing::trace!(%kind, handlers = handlers.len(), "process event");
                    for handler in handlers.values_mut() {
                        handler(event);
                        stats.handler_calls += 1;
                    }
                    stats.delivered += 1;
                }
                _ => {
                    tracing::warn!(%kind, "no handlers registered for event");
                    stats.dropped += 1;
                }
            }
        }

        drop(guard);
        stats
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let pending = self.pending();
        f.debug_struct("EventBus")
            .field("immediate", &pending.immediate)
            .field("deferred", &pending.deferred)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn port_event(from: &str) -> GraphEvent {
        GraphEvent::PortConnected {
            from_node: from.to_string(),
            to_node: "b".to_string(),
            port_in: "in".to_string(),
            port_out: "out".to_string(),
        }
    }

    fn recorder(bus: &EventBus, kind: EventKind) -> Arc<Mutex<Vec<GraphEvent>>> {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        bus.subscribe(kind, move |event| sink.lock().push(event.clone()));
        seen
    }

    #[test]
    fn test_publish_does_not_dispatch() {
        let bus = EventBus::new();
        let seen = recorder(&bus, EventKind::NodesCleared);

        bus.publish_immediate(GraphEvent::NodesCleared);
        assert!(seen.lock().is_empty());
        assert_eq!(bus.pending().immediate, 1);

        bus.flush();
        assert_eq!(seen.lock().len(), 1);
    }

    #[test]
    fn test_immediate_before_deferred_in_publish_order() {
        let bus = EventBus::new();
        let order = Arc::new(Mutex::new(Vec::new()));
        for kind in [EventKind::PortConnected, EventKind::NodesCleared] {
            let sink = Arc::clone(&order);
            bus.subscribe(kind, move |event| {
                let label = match event {
                    GraphEvent::PortConnected { from_node, .. } => from_node.clone(),
                    _ => "clear".to_string(),
                };
                sink.lock().push(label);
            });
        }

        bus.publish_deferred(port_event("d1"));
        bus.publish_immediate(port_event("i1"));
        bus.publish_deferred(port_event("d2"));
        bus.publish_immediate(GraphEvent::NodesCleared);

        let stats = bus.flush();
        assert_eq!(stats.delivered, 4);
        assert_eq!(*order.lock(), vec!["i1", "clear", "d1", "d2"]);
        assert!(bus.pending().is_empty());
    }

    #[test]
    fn test_events_published_during_flush_wait_for_next_flush() {
        let bus = EventBus::new();
        let seen = recorder(&bus, EventKind::NodesCleared);
        let republish = bus.clone();
        bus.subscribe(EventKind::NodesSelected, move |_| {
            republish.publish_immediate(GraphEvent::NodesCleared);
        });

        bus.publish_immediate(GraphEvent::NodesSelected { names: vec![] });
        bus.flush();
        assert!(seen.lock().is_empty());
        assert_eq!(bus.pending().immediate, 1);

        bus.flush();
        assert_eq!(seen.lock().len(), 1);
        assert!(bus.pending().is_empty());
    }

    #[test]
    fn test_event_without_handler_is_dropped() {
        let bus = EventBus::new();
        bus.publish_immediate(GraphEvent::NodesCleared);
        let stats = bus.flush();
        assert_eq!(stats.dropped, 1);
        assert_eq!(stats.delivered, 0);
        assert!(bus.pending().is_empty());
    }

    #[test]
    fn test_every_event_delivered_once_to_every_handler() {
        let bus = EventBus::new();
        let first = recorder(&bus, EventKind::PortConnected);
        let second = recorder(&bus, EventKind::PortConnected);

        bus.publish_deferred(port_event("a"));
        bus.publish_deferred(port_event("c"));
        let stats = bus.flush();
        bus.flush();

        assert_eq!(stats.handler_calls, 4);
        assert_eq!(first.lock().len(), 2);
        assert_eq!(*first.lock(), *second.lock());
    }

    #[test]
    fn test_unsubscribe() {
        let bus = EventBus::new();
        let count = Arc::new(Mutex::new(0));
        let sink = Arc::clone(&count);
        let id = bus.subscribe(EventKind::NodesCleared, move |_| *sink.lock() += 1);
        assert_eq!(bus.subscriber_count(EventKind::NodesCleared), 1);

        assert!(bus.unsubscribe(id));
        assert!(!bus.unsubscribe(id));
        bus.publish_immediate(GraphEvent::NodesCleared);
        let stats = bus.flush();

        assert_eq!(*count.lock(), 0);
        assert_eq!(stats.dropped, 1);
    }

    #[test]
    fn test_subscribe_during_flush_applies_afterwards() {
        let bus = EventBus::new();
        let late = Arc::new(Mutex::new(0));
        let registrar = bus.clone();
        let late_sink = Arc::clone(&late);
        bus.subscribe(EventKind::NodesSelected, move |_| {
            let sink = Arc::clone(&late_sink);
            registrar.subscribe(EventKind::NodesCleared, move |_| *sink.lock() += 1);
        });

        bus.publish_immediate(GraphEvent::NodesSelected { names: vec![] });
        bus.publish_deferred(GraphEvent::NodesCleared);
        bus.flush();
        assert_eq!(*late.lock(), 0);
        assert_eq!(bus.subscriber_count(EventKind::NodesCleared), 1);
        assert_eq!(bus.subscriber_count(EventKind::NodesSelected), 1);

        bus.publish_immediate(GraphEvent::NodesCleared);
        bus.flush();
        assert_eq!(*late.lock(), 1);
    }

    #[test]
    fn test_nested_flush_is_ignored() {
        let bus = EventBus::new();
        let inner = bus.clone();
        let nested = Arc::new(Mutex::new(None));
        let sink = Arc::clone(&nested);
        bus.subscribe(EventKind::NodesCleared, move |_| {
            *sink.lock() = Some(inner.flush());
        });

        bus.publish_immediate(GraphEvent::NodesCleared);
        bus.flush();
        assert_eq!(*nested.lock(), Some(FlushStats::default()));
    }

    #[test]
    fn test_unsubscribe_during_flush() {
        let bus = EventBus::new();
        let count = Arc::new(Mutex::new(0));
        let sink = Arc::clone(&count);
        let target = bus.subscribe(EventKind::NodesCleared, move |_| *sink.lock() += 1);

        let results = Arc::new(Mutex::new(Vec::new()));
        let results_sink = Arc::clone(&results);
        let remover = bus.clone();
        bus.subscribe(EventKind::NodesSelected, move |_| {
            let mut results = results_sink.lock();
            results.push(remover.unsubscribe(target));
            results.push(remover.unsubscribe(target));
            results.push(remover.unsubscribe(SubscriptionId::new()));
        });

        bus.publish_immediate(GraphEvent::NodesSelected { names: vec![] });
        bus.flush();
        assert_eq!(*results.lock(), vec![true, false, false]);
        assert_eq!(bus.subscriber_count(EventKind::NodesCleared), 0);

        bus.publish_immediate(GraphEvent::NodesCleared);
        bus.flush();
        assert_eq!(*count.lock(), 0);
    }

    #[test]
    fn test_panicking_handler_keeps_bus_usable() {
        let bus = EventBus::new();
        let seen = recorder(&bus, EventKind::NodesCleared);
        let mut first = true;
        bus.subscribe(EventKind::NodesSelected, move |_| {
            if std::mem::take(&mut first) {
                panic!("handler failure");
            }
        });

        bus.publish_immediate(GraphEvent::NodesSelected { names: vec![] });
        let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| bus.flush()));
        assert!(outcome.is_err());
        assert_eq!(bus.subscriber_count(EventKind::NodesCleared), 1);
        assert_eq!(bus.subscriber_count(EventKind::NodesSelected), 1);

        bus.publish_immediate(GraphEvent::NodesSelected { names: vec![] });
        bus.publish_immediate(GraphEvent::NodesCleared);
        let stats = bus.flush();
        assert_eq!(stats.delivered, 2);
        assert_eq!(seen.lock().len(), 1);
    }

    #[test]
    fn test_independent_buses() {
        let a = EventBus::new();
        let b = EventBus::new();
        a.publish_immediate(GraphEvent::NodesCleared);
        assert_eq!(a.pending().total(), 1);
        assert!(b.pending().is_empty());
    }
}
