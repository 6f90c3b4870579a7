//! Expiry schedule.
//!
//! A min-heap of `(expires_at, id)` polled by the sweep, plus the set of live
//! timers. Cancelling drops the id from the live set; its heap entry is
//! discarded lazily when it surfaces. Each id fires or is cancelled at most
//! once.

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};

use chrono::{DateTime, Utc};

use crate::approval::types::RequestId;

#[derive(Debug, Default)]
pub struct ExpirySchedule {
    heap: BinaryHeap<Reverse<(DateTime<Utc>, RequestId)>>,
    live: HashMap<RequestId, DateTime<Utc>>,
}

impl ExpirySchedule {
    pub fn new() -> Self {
        Self::default()
    }

    /// Arm a timer. Re-arming an id replaces its deadline.
    pub fn schedule(&mut self, id: RequestId, at: DateTime<Utc>) {
        self.live.insert(id, at);
        self.heap.push(Reverse((at, id)));
    }

    /// Disarm a timer. Returns false if it already fired or was cancelled.
    pub fn cancel(&mut self, id: &RequestId) -> bool {
        self.live.remove(id).is_some()
    }

    pub fn is_scheduled(&self, id: &RequestId) -> bool {
        self.live.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.live.len()
    }

    pub fn is_empty(&self) -> bool {
        self.live.is_empty()
    }

    /// Fire every live timer due at `now`, earliest first.
    pub fn pop_due(&mut self, now: DateTime<Utc>) -> Vec<RequestId> {
        let mut due = Vec::new();
        while let Some(Reverse((at, id))) = self.heap.peek().copied() {
            if at > now {
                break;
            }
            self.heap.pop();
            // Skip stale entries: cancelled, or re-armed with another deadline.
            if self.live.get(&id) == Some(&at) {
                self.live.remove(&id);
                due.push(id);
            }
        }
        self.compact();
        due
    }

    fn compact(&mut self) {
        if self.heap.len() > 64 && self.heap.len() > self.live.len() * 4 {
            let live = &self.live;
            self.heap.retain(|Reverse((at, id))| live.get(id) == Some(at));
        }
    }
}
