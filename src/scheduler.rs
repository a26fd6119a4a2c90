//! Virtual-clock timer queue
//!
//! Every delayed transition ("after N ms, move on") is a scheduled entry in a
//! session-owned `Scheduler`. Time is supplied by the caller, so tests can
//! jump the clock instead of sleeping. Tearing a session down is one
//! `cancel_all`.

/// Handle for cancelling one scheduled entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerHandle(u64);

#[derive(Debug, Clone)]
struct Pending<T> {
    id: u64,
    at_ms: u64,
    payload: T,
}

/// A timer that came due
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fired<T> {
    pub handle: TimerHandle,
    /// Scheduled fire time (not the time it was observed)
    pub at_ms: u64,
    pub payload: T,
}

#[derive(Debug, Clone)]
pub struct Scheduler<T> {
    pending: Vec<Pending<T>>,
    next_id: u64,
}

impl<T> Default for Scheduler<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Scheduler<T> {
    pub fn new() -> Self {
        Self {
            pending: Vec::new(),
            next_id: 1,
        }
    }

    /// Schedule `payload` to fire at absolute time `at_ms`
    pub fn schedule(&mut self, at_ms: u64, payload: T) -> TimerHandle {
        let id = self.next_id;
        self.next_id += 1;
        self.pending.push(Pending { id, at_ms, payload });
        TimerHandle(id)
    }

    /// Cancel one entry. Returns false if it already fired or was cancelled.
    pub fn cancel(&mut self, handle: TimerHandle) -> bool {
        let before = self.pending.len();
        self.pending.retain(|p| p.id != handle.0);
        self.pending.len() != before
    }

    /// Cancel everything, returning how many entries were dropped
    pub fn cancel_all(&mut self) -> usize {
        let n = self.pending.len();
        self.pending.clear();
        n
    }

    /// Remove and return the earliest entry due at or before `now_ms`.
    ///
    /// Ties fire in scheduling order.
    pub fn pop_due(&mut self, now_ms: u64) -> Option<Fired<T>> {
        let index = self
            .pending
            .iter()
            .enumerate()
            .filter(|(_, p)| p.at_ms <= now_ms)
            .min_by_key(|(_, p)| (p.at_ms, p.id))
            .map(|(i, _)| i)?;
        let p = self.pending.swap_remove(index);
        Some(Fired {
            handle: TimerHandle(p.id),
            at_ms: p.at_ms,
            payload: p.payload,
        })
    }

    /// Earliest scheduled time, if anything is pending
    pub fn next_deadline(&self) -> Option<u64> {
        self.pending.iter().map(|p| p.at_ms).min()
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn contains(&self, handle: TimerHandle) -> bool {
        self.pending.iter().any(|p| p.id == handle.0)
    }
}
