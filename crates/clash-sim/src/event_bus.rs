//! Observer list for combat events.
//!
//! Replaces single-slot callbacks: any number of listeners may subscribe,
//! and every emitted event is also kept in a log until drained.

use std::fmt;

use clash_core::events::CombatEvent;

type Subscriber = Box<dyn FnMut(&CombatEvent)>;

/// Handle returned by `subscribe`, used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriberId(u64);

#[derive(Default)]
pub struct EventBus {
    subscribers: Vec<(SubscriberId, Subscriber)>,
    next_id: u64,
    log: Vec<CombatEvent>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&mut self, subscriber: impl FnMut(&CombatEvent) + 'static) -> SubscriberId {
        let id = SubscriberId(self.next_id);
        self.next_id += 1;
        self.subscribers.push((id, Box::new(subscriber)));
        id
    }

    pub fn unsubscribe(&mut self, id: SubscriberId) -> bool {
        let before = self.subscribers.len();
        self.subscribers.retain(|(sid, _)| *sid != id);
        self.subscribers.len() != before
    }

    /// Deliver to every subscriber in subscription order, then log.
    pub fn emit(&mut self, event: CombatEvent) {
        for (_, subscriber) in &mut self.subscribers {
            subscriber(&event);
        }
        self.log.push(event);
    }

    /// Take every event logged since the last drain.
    pub fn drain(&mut self) -> Vec<CombatEvent> {
        std::mem::take(&mut self.log)
    }

    pub fn events(&self) -> &[CombatEvent] {
        &self.log
    }

    pub fn len(&self) -> usize {
        self.log.len()
    }

    pub fn is_empty(&self) -> bool {
        self.log.is_empty()
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("subscribers", &self.subscribers.len())
            .field("logged", &self.log.len())
            .finish()
    }
}
