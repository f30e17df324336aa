//! Time-ordered buffer that holds entries back until their release time.
//!
//! Every entry is scheduled as `enqueue time + constant delay`, so release
//! times only ever grow from front to back and a plain FIFO pop-while-due is
//! the same as popping in release order.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

#[derive(Debug)]
struct Entry<T> {
    release_at: Instant,
    payload: T,
}

/// FIFO queue releasing entries once their scheduled instant has passed.
///
/// A queue has exactly one owner. Producers on other tasks hand entries to
/// the owner through a channel instead of touching the queue directly.
#[derive(Debug)]
pub struct DelayQueue<T> {
    entries: VecDeque<Entry<T>>,
}

impl<T> DelayQueue<T> {
    pub fn new() -> Self {
        Self {
            entries: VecDeque::new(),
        }
    }

    /// Schedules `payload` for release `delay` from now.
    pub fn schedule(&mut self, payload: T, delay: Duration) {
        self.schedule_at(payload, Instant::now() + delay);
    }

    /// Schedules `payload` for release at an explicit instant.
    ///
    /// Callers keep release times non-decreasing. An entry scheduled earlier
    /// than the current back is clamped up to it so the queue never reorders.
    pub fn schedule_at(&mut self, payload: T, release_at: Instant) {
        let release_at = match self.entries.back() {
            Some(last) if last.release_at > release_at => last.release_at,
            _ => release_at,
        };
        self.entries.push_back(Entry {
            release_at,
            payload,
        });
    }

    /// Pops every entry whose release time is at or before `now`.
    ///
    /// Stops at the first entry that is not yet due.
    pub fn drain(&mut self, now: Instant) -> Vec<T> {
        let mut due = Vec::new();
        while let Some(front) = self.entries.front() {
            if front.release_at > now {
                break;
            }
            if let Some(entry) = self.entries.pop_front() {
                due.push(entry.payload);
            }
        }
        due
    }

    /// Release time of the front entry, if any.
    pub fn next_release(&self) -> Option<Instant> {
        self.entries.front().map(|entry| entry.release_at)
    }

    /// Drops every pending entry.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Drops pending entries the predicate rejects, keeping order.
    pub fn retain<F: FnMut(&T) -> bool>(&mut self, mut keep: F) {
        self.entries.retain(|entry| keep(&entry.payload));
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<T> Default for DelayQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}
