/********************************************************************************
 * Copyright (c) 2026 Contributors to the Eclipse Foundation
 *
 * See the NOTICE file(s) distributed with this work for additional
 * information regarding copyright ownership.
 *
 * This program and the accompanying materials are made available under the
 * terms of the Apache License Version 2.0 which is available at
 * https://www.apache.org/licenses/LICENSE-2.0
 *
 * SPDX-License-Identifier: Apache-2.0
 ********************************************************************************/

//! Subscription registry shared by caller threads and the reader thread.

use crate::handler::MessageHandler;
use crate::observability::events;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

const COMPONENT: &str = "subscription_registry";

struct Subscription {
    subject: String,
    handler: Arc<dyn MessageHandler>,
    delivered: u64,
    max_messages: Option<u64>,
}

struct RegistryState {
    next_sid: u64,
    subscriptions: HashMap<u64, Subscription>,
}

/// Maps subscription ids to handlers and owns id allocation.
///
/// The lock is held only for map access; handlers are always invoked by the
/// caller after the lock is released.
pub(crate) struct SubscriptionRegistry {
    state: Mutex<RegistryState>,
}

impl SubscriptionRegistry {
    pub(crate) fn new() -> Self {
        Self {
            state: Mutex::new(RegistryState {
                next_sid: 1,
                subscriptions: HashMap::new(),
            }),
        }
    }

    /// Stores `handler` under the next id. Ids start at 1 and are never reused.
    pub(crate) fn add(&self, subject: &str, handler: Arc<dyn MessageHandler>) -> u64 {
        let mut state = self.state.lock();
        let sid = state.next_sid;
        state.next_sid += 1;
        state.subscriptions.insert(
            sid,
            Subscription {
                subject: subject.to_string(),
                handler,
                delivered: 0,
                max_messages: None,
            },
        );
        drop(state);

        debug!(
            event = events::SUBSCRIPTION_ADDED,
            component = COMPONENT,
            sid,
            subject,
            "subscription added"
        );
        sid
    }

    /// Removes `sid`; unknown ids are ignored. Returns whether an entry existed.
    pub(crate) fn remove(&self, sid: u64) -> bool {
        let removed = self.state.lock().subscriptions.remove(&sid);
        if let Some(subscription) = removed.as_ref() {
            debug!(
                event = events::SUBSCRIPTION_REMOVED,
                component = COMPONENT,
                sid,
                subject = subscription.subject.as_str(),
                "subscription removed"
            );
        }
        removed.is_some()
    }

    /// Bounds `sid` to `max_messages` deliveries in total.
    ///
    /// The entry is dropped right away when that many were already delivered.
    pub(crate) fn limit(&self, sid: u64, max_messages: u64) {
        let mut state = self.state.lock();
        let exhausted = match state.subscriptions.get_mut(&sid) {
            Some(subscription) => {
                subscription.max_messages = Some(max_messages);
                subscription.delivered >= max_messages
            }
            None => false,
        };
        if exhausted {
            state.subscriptions.remove(&sid);
            drop(state);
            debug!(
                event = events::SUBSCRIPTION_AUTO_REMOVED,
                component = COMPONENT,
                sid,
                max_messages,
                "subscription already reached its delivery bound"
            );
        }
    }

    /// Returns the handler for one delivery on `sid` and counts it.
    ///
    /// A bounded subscription is removed when this delivery is its last one.
    pub(crate) fn lookup(&self, sid: u64) -> Option<Arc<dyn MessageHandler>> {
        let mut state = self.state.lock();
        let subscription = state.subscriptions.get_mut(&sid)?;
        subscription.delivered += 1;
        let handler = subscription.handler.clone();
        let exhausted = subscription
            .max_messages
            .is_some_and(|max| subscription.delivered >= max);

        if exhausted {
            state.subscriptions.remove(&sid);
            drop(state);
            debug!(
                event = events::SUBSCRIPTION_AUTO_REMOVED,
                component = COMPONENT,
                sid,
                "subscription reached its delivery bound"
            );
        }
        Some(handler)
    }

    pub(crate) fn contains(&self, sid: u64) -> bool {
        self.state.lock().subscriptions.contains_key(&sid)
    }

    pub(crate) fn len(&self) -> usize {
        self.state.lock().subscriptions.len()
    }

    /// Empties the registry and hands back the handlers that were live.
    pub(crate) fn drain(&self) -> Vec<Arc<dyn MessageHandler>> {
        self.state
            .lock()
            .subscriptions
            .drain()
            .map(|(_, subscription)| subscription.handler)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::SubscriptionRegistry;
    use crate::handler::{Message, MessageHandler};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[derive(Default)]
    struct CountingHandler {
        received: AtomicUsize,
        closed: AtomicUsize,
    }

    impl MessageHandler for CountingHandler {
        fn on_message(&self, _message: Message) {
            self.received.fetch_add(1, Ordering::Relaxed);
        }

        fn on_connection_closed(&self) {
            self.closed.fetch_add(1, Ordering::Relaxed);
        }
    }

    fn noop() -> Arc<dyn MessageHandler> {
        Arc::new(|_message: Message| {})
    }

    #[test]
    fn ids_start_at_one_and_are_never_reused() {
        let registry = SubscriptionRegistry::new();
        let first = registry.add("a", noop());
        let second = registry.add("b", noop());
        assert_eq!((first, second), (1, 2));

        assert!(registry.remove(second));
        let third = registry.add("c", noop());
        assert_eq!(third, 3);
    }

    #[test]
    fn remove_is_idempotent() {
        let registry = SubscriptionRegistry::new();
        let sid = registry.add("a", noop());

        assert!(registry.remove(sid));
        assert!(!registry.remove(sid));
        assert!(!registry.remove(42));
        assert_eq!(registry.len(), 0);
    }

    #[test]
    fn lookup_unknown_sid_is_none() {
        let registry = SubscriptionRegistry::new();
        assert!(registry.lookup(7).is_none());
    }

    #[test]
    fn bounded_subscription_is_removed_after_last_delivery() {
        let registry = SubscriptionRegistry::new();
        let sid = registry.add("a", noop());
        registry.limit(sid, 2);

        assert!(registry.lookup(sid).is_some());
        assert!(registry.contains(sid));
        assert!(registry.lookup(sid).is_some());
        assert!(!registry.contains(sid));
        assert!(registry.lookup(sid).is_none());
    }

    #[test]
    fn bound_counts_deliveries_made_before_the_limit() {
        let registry = SubscriptionRegistry::new();
        let sid = registry.add("a", noop());
        registry.lookup(sid);
        registry.lookup(sid);

        registry.limit(sid, 2);
        assert!(!registry.contains(sid));
    }

    #[test]
    fn drain_returns_live_handlers() {
        let registry = SubscriptionRegistry::new();
        let handler = Arc::new(CountingHandler::default());
        registry.add("a", handler.clone());
        registry.add("b", handler.clone());

        for drained in registry.drain() {
            drained.on_connection_closed();
        }
        assert_eq!(handler.closed.load(Ordering::Relaxed), 2);
        assert_eq!(registry.len(), 0);
    }

    #[test]
    fn lookup_returns_the_stored_handler() {
        let registry = SubscriptionRegistry::new();
        let handler = Arc::new(CountingHandler::default());
        let sid = registry.add("a", handler.clone());

        registry.lookup(sid).unwrap().on_message(Message {
            subject: "a".to_string(),
            sid,
            reply_to: None,
            payload: Vec::new(),
        });
        assert_eq!(handler.received.load(Ordering::Relaxed), 1);
    }
}
