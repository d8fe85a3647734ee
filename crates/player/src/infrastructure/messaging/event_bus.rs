//! Event Bus for frames pushed by the backend.
//!
//! Handlers are registered per [`MessageKind`]. Dispatch is synchronous: every
//! handler for the frame's kind runs, in registration order, before
//! `dispatch` returns. A handler that fails or panics is logged and skipped.

use std::collections::BTreeMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use rulehaunt_shared::{InboundFrame, MessageKind};

/// Callback invoked for each frame of a kind
pub type FrameHandler = Arc<dyn Fn(&InboundFrame) -> anyhow::Result<()> + Send + Sync>;

/// Token returned by [`EventBus::subscribe`], used to unsubscribe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

/// Keyed handler registry.
///
/// Cloning shares the registry.
#[derive(Clone, Default)]
pub struct EventBus {
    subscribers: Arc<RwLock<BTreeMap<MessageKind, Vec<(SubscriptionId, FrameHandler)>>>>,
    next_id: Arc<AtomicU64>,
}

impl EventBus {
    /// Create a new EventBus with no subscribers.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` for frames of `kind`.
    pub fn subscribe<F>(&self, kind: MessageKind, handler: F) -> SubscriptionId
    where
        F: Fn(&InboundFrame) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.subscribers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(kind)
            .or_default()
            .push((id, Arc::new(handler)));
        id
    }

    /// Remove one handler. Returns whether it was registered.
    pub fn unsubscribe(&self, kind: MessageKind, id: SubscriptionId) -> bool {
        let mut subscribers = self
            .subscribers
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let Some(handlers) = subscribers.get_mut(&kind) else {
            return false;
        };
        let before = handlers.len();
        handlers.retain(|(existing, _)| *existing != id);
        let removed = handlers.len() != before;
        if handlers.is_empty() {
            subscribers.remove(&kind);
        }
        removed
    }

    /// Invoke every handler registered for the frame's kind.
    ///
    /// Returns the number of handlers that completed successfully.
    pub fn dispatch(&self, frame: &InboundFrame) -> usize {
        let kind = frame.kind();
        // Snapshot so handlers may subscribe/unsubscribe without deadlocking.
        let handlers: Vec<(SubscriptionId, FrameHandler)> = self
            .subscribers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&kind)
            .cloned()
            .unwrap_or_default();

        if handlers.is_empty() {
            tracing::trace!(kind = %kind, "No handlers registered");
            return 0;
        }

        let mut succeeded = 0;
        for (id, handler) in handlers {
            match catch_unwind(AssertUnwindSafe(|| handler(frame))) {
                Ok(Ok(())) => succeeded += 1,
                Ok(Err(e)) => {
                    tracing::warn!(kind = %kind, subscription = ?id, error = %e, "Frame handler failed");
                }
                Err(_) => {
                    tracing::error!(kind = %kind, subscription = ?id, "Frame handler panicked");
                }
            }
        }
        succeeded
    }

    /// Number of handlers registered for `kind`.
    pub fn subscriber_count(&self, kind: MessageKind) -> usize {
        self.subscribers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&kind)
            .map_or(0, Vec::len)
    }

    /// Total number of handlers across all kinds.
    pub fn total_subscribers(&self) -> usize {
        self.subscribers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .map(Vec::len)
            .sum()
    }

    /// Clear all subscribers.
    pub fn clear(&self) {
        self.subscribers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicU32;
    use std::sync::Mutex;

    use rulehaunt_domain::GameEvent;
    use rulehaunt_shared::InboundMessage;

    fn event_frame() -> InboundFrame {
        InboundFrame::new(InboundMessage::Event(GameEvent::new("npc_action")))
    }

    #[test]
    fn test_subscribe_and_dispatch() {
        let bus = EventBus::new();
        let count = Arc::new(AtomicU32::new(0));

        let count_clone = Arc::clone(&count);
        bus.subscribe(MessageKind::Event, move |_frame| {
            count_clone.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });

        assert_eq!(bus.subscriber_count(MessageKind::Event), 1);

        bus.dispatch(&event_frame());
        bus.dispatch(&event_frame());

        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn dispatch_only_reaches_matching_kind() {
        let bus = EventBus::new();
        let count = Arc::new(AtomicU32::new(0));

        let count_clone = Arc::clone(&count);
        bus.subscribe(MessageKind::Npc, move |_frame| {
            count_clone.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });

        assert_eq!(bus.dispatch(&event_frame()), 0);
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn handlers_run_in_registration_order() {
        let bus = EventBus::new();
        let order = Arc::new(Mutex::new(Vec::new()));

        for label in ["first", "second", "third"] {
            let order = Arc::clone(&order);
            bus.subscribe(MessageKind::Event, move |_frame| {
                order.lock().expect("lock").push(label);
                Ok(())
            });
        }

        bus.dispatch(&event_frame());
        assert_eq!(*order.lock().expect("lock"), vec!["first", "second", "third"]);
    }

    #[test]
    fn failing_handler_does_not_block_later_handlers() {
        let bus = EventBus::new();
        let count = Arc::new(AtomicU32::new(0));

        bus.subscribe(MessageKind::Event, |_frame| anyhow::bail!("bad payload"));
        bus.subscribe(MessageKind::Event, |_frame| panic!("handler bug"));
        let count_clone = Arc::clone(&count);
        bus.subscribe(MessageKind::Event, move |_frame| {
            count_clone.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });

        assert_eq!(bus.dispatch(&event_frame()), 1);
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn unsubscribe_removes_only_that_handler() {
        let bus = EventBus::new();
        let first = bus.subscribe(MessageKind::Event, |_frame| Ok(()));
        let _second = bus.subscribe(MessageKind::Event, |_frame| Ok(()));

        assert!(bus.unsubscribe(MessageKind::Event, first));
        assert!(!bus.unsubscribe(MessageKind::Event, first));
        assert!(!bus.unsubscribe(MessageKind::Npc, first));
        assert_eq!(bus.subscriber_count(MessageKind::Event), 1);

        bus.clear();
        assert_eq!(bus.total_subscribers(), 0);
    }
}
