//! Virtual-clock timer queue.
//!
//! Every delay in the gate (the beam tick, settle delays, cooldowns) is an
//! entry here.  The queue never looks at the wall clock: the caller moves it
//! forward with [`TimerQueue::fire_next`] / [`TimerQueue::advance_clock`], so
//! tests can step through seconds of scheduled behaviour instantly.

use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;
use std::time::Duration;

struct Entry<T> {
    due:  Duration,
    seq:  u64,
    item: T,
}

// Ordered by due time, then by scheduling order.
impl<T> PartialEq for Entry<T> {
    fn eq(&self, other: &Self) -> bool { self.due == other.due && self.seq == other.seq }
}
impl<T> Eq for Entry<T> {}
impl<T> PartialOrd for Entry<T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> { Some(self.cmp(other)) }
}
impl<T> Ord for Entry<T> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.due.cmp(&other.due).then(self.seq.cmp(&other.seq))
    }
}

pub struct TimerQueue<T> {
    now:      Duration,
    next_seq: u64,
    heap:     BinaryHeap<Reverse<Entry<T>>>,
}

impl<T> Default for TimerQueue<T> {
    fn default() -> Self {
        TimerQueue { now: Duration::ZERO, next_seq: 0, heap: BinaryHeap::new() }
    }
}

impl<T> TimerQueue<T> {
    pub fn new() -> Self { Self::default() }

    /// Current virtual time.
    pub fn now(&self) -> Duration { self.now }

    /// Fire `item` once, `after` from now.
    pub fn schedule(&mut self, after: Duration, item: T) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.heap.push(Reverse(Entry { due: self.now + after, seq, item }));
    }

    /// Drop every pending timer.
    pub fn clear(&mut self) { self.heap.clear(); }

    /// Pop the earliest timer due at or before `until`, moving the clock to
    /// its due time.  Anything scheduled while handling it is relative to
    /// that instant, not to `until`.
    pub fn fire_next(&mut self, until: Duration) -> Option<T> {
        match self.heap.peek() {
            Some(Reverse(e)) if e.due <= until => {}
            _ => return None,
        }
        let Reverse(entry) = self.heap.pop()?;
        self.now = self.now.max(entry.due);
        Some(entry.item)
    }

    /// Move the clock forward to `until` (never backwards).
    pub fn advance_clock(&mut self, until: Duration) {
        self.now = self.now.max(until);
    }
}
