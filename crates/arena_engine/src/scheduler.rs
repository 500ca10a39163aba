//! Timer scheduler for the authority thread.
//!
//! The scheduler never runs anything itself. Owners register a task value
//! with a due time and get back a [`TimerId`]; the tick loop pops due tasks
//! and dispatches them on the same thread that owns all engine state. A
//! one-shot timer fires once; a repeating timer re-arms at a fixed interval.
//! Cancelling a [`TimerId`] guarantees its task is never returned again.

use std::collections::HashMap;
use std::time::Duration;

use arena_core::Timestamp;

/// Cancellation token for a scheduled task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerId(u64);

impl std::fmt::Display for TimerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Timer({})", self.0)
    }
}

#[derive(Debug)]
struct Entry<T> {
    due: Timestamp,
    interval: Option<Duration>,
    task: T,
}

/// Pending timers keyed by token.
#[derive(Debug)]
pub struct Scheduler<T> {
    next_id: u64,
    timers: HashMap<TimerId, Entry<T>>,
}

impl<T: Clone> Scheduler<T> {
    /// Create an empty scheduler.
    #[must_use]
    pub fn new() -> Self {
        Self {
            next_id: 1,
            timers: HashMap::new(),
        }
    }

    fn allocate(&mut self) -> TimerId {
        let id = TimerId(self.next_id);
        self.next_id += 1;
        id
    }

    /// Schedule `task` to fire once at `due`.
    pub fn schedule_at(&mut self, due: Timestamp, task: T) -> TimerId {
        let id = self.allocate();
        self.timers.insert(
            id,
            Entry {
                due,
                interval: None,
                task,
            },
        );
        id
    }

    /// Schedule `task` to fire once, `delay` after `now`.
    pub fn schedule_after(&mut self, now: Timestamp, delay: Duration, task: T) -> TimerId {
        self.schedule_at(now.after(delay), task)
    }

    /// Schedule `task` to fire every `interval`, first at `now + interval`.
    ///
    /// Intervals shorter than one millisecond are clamped to one millisecond.
    pub fn schedule_repeating(&mut self, now: Timestamp, interval: Duration, task: T) -> TimerId {
        let interval = interval.max(Duration::from_millis(1));
        let id = self.allocate();
        self.timers.insert(
            id,
            Entry {
                due: now.after(interval),
                interval: Some(interval),
                task,
            },
        );
        id
    }

    /// Cancel a timer. Returns `true` if it was still pending.
    pub fn cancel(&mut self, id: TimerId) -> bool {
        self.timers.remove(&id).is_some()
    }

    /// Returns `true` if the timer is still pending.
    #[must_use]
    pub fn is_pending(&self, id: TimerId) -> bool {
        self.timers.contains_key(&id)
    }

    /// Returns the due time of a pending timer.
    #[must_use]
    pub fn due_at(&self, id: TimerId) -> Option<Timestamp> {
        self.timers.get(&id).map(|entry| entry.due)
    }

    /// Returns the number of pending timers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.timers.len()
    }

    /// Returns `true` if no timers are pending.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.timers.is_empty()
    }

    /// Pop the earliest task due at or before `now`.
    ///
    /// Ties are broken by scheduling order. A one-shot timer is removed; a
    /// repeating timer is re-armed one interval later (skipping beats missed
    /// while the loop was stalled).
    pub fn pop_due(&mut self, now: Timestamp) -> Option<(TimerId, T)> {
        let id = self
            .timers
            .iter()
            .filter(|(_, entry)| entry.due <= now)
            .min_by_key(|(id, entry)| (entry.due, **id))
            .map(|(id, _)| *id)?;

        let entry = self.timers.get_mut(&id)?;
        match entry.interval {
            Some(interval) => {
                let mut next = entry.due.after(interval);
                if next <= now {
                    next = now.after(interval);
                }
                entry.due = next;
                Some((id, entry.task.clone()))
            }
            None => self.timers.remove(&id).map(|entry| (id, entry.task)),
        }
    }
}

impl<T: Clone> Default for Scheduler<T> {
    fn default() -> Self {
        Self::new()
    }
}
