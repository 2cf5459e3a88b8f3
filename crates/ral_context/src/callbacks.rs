//! Callback Bus
//!
//! Typed publish/subscribe channel for [`ContextEvent`]s. Handlers run on the
//! publishing thread, outside the bus lock, so a handler may subscribe,
//! unsubscribe or query the context without deadlocking.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;
use ral_core::{ContextEvent, EventPayload};
use rustc_hash::FxHashMap;
use smallvec::SmallVec;

/// Token returned by [`CallbackBus::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

pub type EventHandler = Arc<dyn Fn(&EventPayload<'_>) + Send + Sync + 'static>;

type HandlerList = SmallVec<[(SubscriptionId, EventHandler); 2]>;

#[derive(Default)]
pub struct CallbackBus {
    handlers: RwLock<FxHashMap<ContextEvent, HandlerList>>,
    next_id: AtomicU64,
}

impl CallbackBus {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// [Write] Registers `handler` for `event`. Handlers for one event run in
    /// subscription order.
    pub fn subscribe<F>(&self, event: ContextEvent, handler: F) -> SubscriptionId
    where
        F: Fn(&EventPayload<'_>) + Send + Sync + 'static,
    {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.handlers
            .write()
            .entry(event)
            .or_default()
            .push((id, Arc::new(handler)));
        id
    }

    /// [Write] Removes a subscription. Returns `false` if it was unknown.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut handlers = self.handlers.write();
        let mut found = false;
        handlers.retain(|_, list| {
            if let Some(pos) = list.iter().position(|(sub, _)| *sub == id) {
                list.remove(pos);
                found = true;
            }
            !list.is_empty()
        });
        found
    }

    /// [Read] Invokes every handler subscribed to `payload.event`.
    pub fn publish(&self, payload: &EventPayload<'_>) {
        let snapshot: HandlerList = match self.handlers.read().get(&payload.event) {
            Some(list) => list.clone(),
            None => return,
        };
        for (_, handler) in &snapshot {
            handler(payload);
        }
    }

    #[must_use]
    pub fn subscriber_count(&self, event: ContextEvent) -> usize {
        self.handlers.read().get(&event).map_or(0, SmallVec::len)
    }
}

impl std::fmt::Debug for CallbackBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let handlers = self.handlers.read();
        f.debug_struct("CallbackBus")
            .field("events", &handlers.len())
            .field(
                "subscriptions",
                &handlers.values().map(SmallVec::len).sum::<usize>(),
            )
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use ral_core::{ObjectHandle, ObjectKind};

    #[test]
    fn publish_reaches_only_matching_subscribers() {
        let bus = CallbackBus::new();
        let seen = Arc::new(Mutex::new(Vec::new()));

        let s = Arc::clone(&seen);
        bus.subscribe(ContextEvent::Created(ObjectKind::Buffer), move |payload| {
            s.lock().push(payload.handles.len());
        });

        let handles = [ObjectHandle::default(); 3];
        bus.publish(&EventPayload::objects(
            ContextEvent::Created(ObjectKind::Buffer),
            &handles,
        ));
        bus.publish(&EventPayload::objects(
            ContextEvent::Created(ObjectKind::Shader),
            &handles,
        ));

        assert_eq!(*seen.lock(), vec![3]);
    }

    #[test]
    fn unsubscribe_stops_delivery() {
        let bus = CallbackBus::new();
        let hits = Arc::new(AtomicU64::new(0));

        let h = Arc::clone(&hits);
        let id = bus.subscribe(ContextEvent::ContextAboutToRelease, move |_| {
            h.fetch_add(1, Ordering::SeqCst);
        });
        bus.publish(&EventPayload::context(ContextEvent::ContextAboutToRelease));

        assert!(bus.unsubscribe(id));
        assert!(!bus.unsubscribe(id));
        bus.publish(&EventPayload::context(ContextEvent::ContextAboutToRelease));

        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert_eq!(bus.subscriber_count(ContextEvent::ContextAboutToRelease), 0);
    }

    #[test]
    fn handlers_may_resubscribe_while_publishing() {
        let bus = Arc::new(CallbackBus::new());
        let b = Arc::clone(&bus);
        bus.subscribe(ContextEvent::ContextAboutToRelease, move |_| {
            b.subscribe(ContextEvent::ContextAboutToRelease, |_| {});
        });

        bus.publish(&EventPayload::context(ContextEvent::ContextAboutToRelease));
        assert_eq!(bus.subscriber_count(ContextEvent::ContextAboutToRelease), 2);
    }
}
