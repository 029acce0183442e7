//! Reorder Buffer (§4.2): releases events in strict ascending sequence-id
//! order regardless of arrival order, stalling at the first gap.

use std::collections::BTreeMap;

use crate::event::Event;

pub struct ReorderBuffer {
    pending: BTreeMap<u64, Event>,
    next_expected: u64,
}

impl ReorderBuffer {
    pub fn new(first_sequence_id: u64) -> Self {
        ReorderBuffer {
            pending: BTreeMap::new(),
            next_expected: first_sequence_id,
        }
    }

    /// The next sequence id the buffer is waiting to drain.
    pub fn next_expected(&self) -> u64 {
        self.next_expected
    }

    /// Insert an event under its sequence-id. Stale ids (< next_expected)
    /// are dropped; duplicates replace the earlier entry.
    pub fn offer(&mut self, event: Event) {
        if event.sequence_id < self.next_expected {
            return;
        }
        self.pending.insert(event.sequence_id, event);
    }

    /// Remove and return every event now in order, advancing
    /// `next_expected` past each one. Stops at the first gap.
    pub fn drain(&mut self) -> Vec<Event> {
        let mut out = Vec::new();
        while let Some(event) = self.pending.remove(&self.next_expected) {
            self.next_expected += 1;
            out.push(event);
        }
        out
    }

    #[cfg(test)]
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }
}
