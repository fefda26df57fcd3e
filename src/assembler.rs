//! Per-block event assembly.
//!
//! Grammars do not emit events themselves; they append hits into an
//! [`EventMap`] keyed by event number. Bundles are created on first touch
//! and extended on every later touch, which merges contributions from
//! multiple blocks and multiple ROCs. Draining the map at the end of a
//! block yields the ordered list of [`PhysicsEvent`]s.

use indexmap::IndexMap;

use crate::types::{EventHits, PhysicsEvent};

/// Order-preserving map from event number to the event's hit bundle.
#[derive(Debug, Default)]
pub struct EventMap {
    events: IndexMap<u64, EventHits>,
}

impl EventMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// The bundle for `event_number`, created empty if this is the first
    /// touch.
    pub fn bundle(&mut self, event_number: u64) -> &mut EventHits {
        self.events.entry(event_number).or_default()
    }

    /// Bundle lookup without creation.
    pub fn get(&self, event_number: u64) -> Option<&EventHits> {
        self.events.get(&event_number)
    }

    /// Number of distinct event numbers touched so far.
    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Drains the map into physics events ordered by ascending event number.
    pub fn into_events(mut self) -> Vec<PhysicsEvent> {
        self.events.sort_unstable_keys();
        self.events
            .into_iter()
            .map(|(event_number, hits)| PhysicsEvent { event_number, hits })
            .collect()
    }
}
