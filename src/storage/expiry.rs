//! Lazy Expiry Timer
//!
//! Both engines attach time-to-live counters to their entries through the same
//! [`ExpiryTimer`]. There is no background task: every contract operation
//! starts with [`ExpiryTimer::tick`], which drains the elapsed time from every
//! counter and hands the entries that ran out back to the engine for removal.
//!
//! ## Consequences
//!
//! - A store that is never called never expires anything.
//! - An expired entry is gone by the time the operation that noticed it does
//!   its own work, so callers never observe a stale entry.
//!
//! ## Identity
//!
//! The timer is generic over the identity it tracks. The hash table uses the
//! record key (slot positions move on every resize), the tree uses its arena
//! node id (stable for the lifetime of the node).
//!
//! ## Clocks
//!
//! Production code uses [`Clock::System`]. Tests use a [`ManualClock`] and
//! move time forward explicitly instead of sleeping.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::trace;

/// A clock that only moves when told to.
///
/// Clones share the same offset, so a test can keep one handle and give
/// another to an engine.
#[derive(Debug, Clone)]
pub struct ManualClock {
    base: Instant,
    offset_ms: Arc<AtomicU64>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            base: Instant::now(),
            offset_ms: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Moves the clock forward.
    pub fn advance(&self, by: Duration) {
        self.offset_ms
            .fetch_add(by.as_millis() as u64, Ordering::Relaxed);
    }

    fn now(&self) -> Instant {
        self.base + Duration::from_millis(self.offset_ms.load(Ordering::Relaxed))
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

/// Time source for an [`ExpiryTimer`].
#[derive(Debug, Clone, Default)]
pub enum Clock {
    /// The monotonic system clock.
    #[default]
    System,
    /// A test clock.
    Manual(ManualClock),
}

impl Clock {
    pub fn now(&self) -> Instant {
        match self {
            Clock::System => Instant::now(),
            Clock::Manual(clock) => clock.now(),
        }
    }
}

/// Remaining-lifetime counters for the expiring entries of one engine.
#[derive(Debug)]
pub struct ExpiryTimer<I> {
    /// Tracked entries and their remaining lifetime
    entries: Vec<(I, Duration)>,

    /// When the counters were last drained
    last_tick: Instant,

    clock: Clock,
}

impl<I: PartialEq> ExpiryTimer<I> {
    pub fn new(clock: Clock) -> Self {
        let last_tick = clock.now();
        Self {
            entries: Vec::new(),
            last_tick,
            clock,
        }
    }

    /// Starts a countdown of `seconds` for `id`.
    ///
    /// A lifetime of zero means "never expires" and is not tracked. Returns
    /// whether a counter was registered.
    pub fn track(&mut self, id: I, seconds: u64) -> bool {
        if seconds == 0 {
            return false;
        }
        self.track_for(id, Duration::from_secs(seconds))
    }

    /// Like [`track`](Self::track), with sub-second precision.
    pub fn track_for(&mut self, id: I, lifetime: Duration) -> bool {
        if lifetime.is_zero() {
            return false;
        }
        self.forget(&id);
        self.entries.push((id, lifetime));
        true
    }

    /// Drains the time elapsed since the previous tick from every counter.
    ///
    /// Each entry whose counter reaches zero stops being tracked and is passed
    /// to `evict`. Returns the number of evicted entries.
    pub fn tick<F>(&mut self, mut evict: F) -> usize
    where
        F: FnMut(I),
    {
        let now = self.clock.now();
        let elapsed = now.saturating_duration_since(self.last_tick);
        self.last_tick = now;

        if self.entries.is_empty() || elapsed.is_zero() {
            return 0;
        }

        let mut expired = Vec::new();
        let mut i = 0;
        while i < self.entries.len() {
            let left = self.entries[i].1.saturating_sub(elapsed);
            if left.is_zero() {
                expired.push(self.entries.remove(i).0);
            } else {
                self.entries[i].1 = left;
                i += 1;
            }
        }

        let count = expired.len();
        for id in expired {
            evict(id);
        }

        if count > 0 {
            trace!(
                expired = count,
                tracked = self.entries.len(),
                elapsed_ms = elapsed.as_millis() as u64,
                "Expired entries reaped"
            );
        }

        count
    }

    /// Whole seconds left for `id`, rounded up; `0` when `id` is not tracked.
    ///
    /// `0` therefore means both "no such entry" and "never expires". Check
    /// liveness separately when the difference matters.
    pub fn remaining(&self, id: &I) -> u64 {
        self.remaining_for(id)
            .map(|left| {
                let secs = left.as_secs();
                if left.subsec_nanos() > 0 {
                    secs + 1
                } else {
                    secs
                }
            })
            .unwrap_or(0)
    }

    /// Exact lifetime left for `id`, if tracked.
    pub fn remaining_for(&self, id: &I) -> Option<Duration> {
        self.entries
            .iter()
            .find(|(tracked, _)| tracked == id)
            .map(|(_, left)| *left)
    }

    /// Stops tracking `id`, returning what was left of its lifetime.
    pub fn forget(&mut self, id: &I) -> Option<Duration> {
        let pos = self.entries.iter().position(|(tracked, _)| tracked == id)?;
        Some(self.entries.remove(pos).1)
    }

    /// Drops every counter.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Number of tracked entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manual_timer() -> (ManualClock, ExpiryTimer<&'static str>) {
        let clock = ManualClock::new();
        let timer = ExpiryTimer::new(Clock::Manual(clock.clone()));
        (clock, timer)
    }

    #[test]
    fn test_zero_lifetime_not_tracked() {
        let (_, mut timer) = manual_timer();

        assert!(!timer.track("immortal", 0));
        assert!(timer.is_empty());
        assert_eq!(timer.remaining(&"immortal"), 0);
    }

    #[test]
    fn test_tick_evicts_due_entries() {
        let (clock, mut timer) = manual_timer();
        timer.track("short", 1);
        timer.track("long", 10);

        clock.advance(Duration::from_millis(1500));

        let mut evicted = Vec::new();
        assert_eq!(timer.tick(|id| evicted.push(id)), 1);
        assert_eq!(evicted, vec!["short"]);
        assert_eq!(timer.len(), 1);
        assert_eq!(timer.remaining(&"long"), 9);
    }

    #[test]
    fn test_sub_second_ticks_accumulate() {
        let (clock, mut timer) = manual_timer();
        timer.track("key", 1);

        for _ in 0..3 {
            clock.advance(Duration::from_millis(300));
            assert_eq!(timer.tick(|_| {}), 0);
            assert_eq!(timer.remaining(&"key"), 1);
        }

        clock.advance(Duration::from_millis(100));
        assert_eq!(timer.tick(|_| {}), 1);
        assert_eq!(timer.remaining(&"key"), 0);
    }

    #[test]
    fn test_remaining_is_non_increasing() {
        let (clock, mut timer) = manual_timer();
        timer.track("key", 5);

        let mut last = timer.remaining(&"key");
        assert_eq!(last, 5);
        for _ in 0..4 {
            clock.advance(Duration::from_secs(1));
            timer.tick(|_| {});
            let now = timer.remaining(&"key");
            assert!(now <= last);
            last = now;
        }
        assert_eq!(last, 1);
    }

    #[test]
    fn test_forget_returns_remaining() {
        let (clock, mut timer) = manual_timer();
        timer.track("key", 10);
        clock.advance(Duration::from_secs(4));
        timer.tick(|_| {});

        assert_eq!(timer.forget(&"key"), Some(Duration::from_secs(6)));
        assert_eq!(timer.forget(&"key"), None);
        assert!(timer.is_empty());
    }

    #[test]
    fn test_retrack_replaces_counter() {
        let (_, mut timer) = manual_timer();
        timer.track("key", 10);
        timer.track("key", 3);

        assert_eq!(timer.len(), 1);
        assert_eq!(timer.remaining(&"key"), 3);
    }

    #[test]
    fn test_system_clock_tick() {
        let mut timer = ExpiryTimer::new(Clock::System);
        timer.track_for("key", Duration::from_millis(20));

        std::thread::sleep(Duration::from_millis(50));

        assert_eq!(timer.tick(|_| {}), 1);
        assert!(timer.is_empty());
    }
}
