//! Open-Addressed Hash Table Engine
//!
//! Records live directly in a slot array. Collisions are resolved with double
//! hashing: the home slot and the probe step come from the same polynomial
//! hash evaluated with two different multipliers.
//!
//! ```text
//!   capacity = 8, key "bob": home = 3, step = 5
//!
//!   ┌───┬───┬───┬───┬───┬───┬───┬───┐
//!   │   │ † │   │ A │   │   │   │   │     † = tombstone
//!   └───┴───┴───┴───┴───┴───┴───┴───┘
//!     0   1   2   3   4   5   6   7
//!
//!   probe: 3 (A, taken) -> 0 (empty, stop)
//! ```
//!
//! ## Capacity Policy
//!
//! - Capacity starts at [`INITIAL_CAPACITY`], is always a power of two and
//!   never shrinks.
//! - **Resize**: an insert that would push the live count above half the
//!   capacity doubles the capacity first.
//! - **Rehash**: once tombstones outnumber live entries the table is rebuilt
//!   at the same capacity, dropping every tombstone.
//!
//! ## Tombstones
//!
//! Deleting a record leaves a tombstone instead of an empty slot. A lookup
//! must walk past it: stopping there would hide every key that was inserted
//! further along the same probe sequence. Inserts reuse the first tombstone
//! they meet.

use crate::error::Result;
use crate::storage::dump;
use crate::storage::expiry::{Clock, ExpiryTimer};
use crate::storage::record::{Record, RecordFilter, RecordPatch};
use crate::storage::{EngineKind, KeyValueStore};
use std::path::Path;
use tracing::{debug, warn};

/// Starting number of slots.
pub const INITIAL_CAPACITY: usize = 8;

#[derive(Debug, Clone, Default)]
enum Slot {
    #[default]
    Empty,
    Live(Record),
    Tombstone,
}

/// Outcome of walking a probe sequence.
enum Probe {
    /// The key is live in this slot
    Found(usize),
    /// The key is absent; this is where it would go
    Vacant(usize),
    /// Every probed slot is taken by another key
    Exhausted,
}

/// Point-in-time counters for a [`HashTableStore`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HashTableStats {
    pub live: usize,
    pub tombstones: usize,
    pub capacity: usize,
    pub expiring: usize,
    pub resizes: u64,
    pub rehashes: u64,
}

/// The slot array and its bookkeeping, without expiry.
#[derive(Debug)]
struct Table {
    slots: Vec<Slot>,
    live: usize,
    tombstones: usize,
    resizes: u64,
    rehashes: u64,
}

impl Table {
    fn with_capacity(capacity: usize) -> Self {
        Self {
            slots: vec![Slot::Empty; capacity],
            live: 0,
            tombstones: 0,
            resizes: 0,
            rehashes: 0,
        }
    }

    #[inline]
    fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Horner's scheme over the key bytes, reduced modulo the capacity at
    /// every step.
    fn horner(key: &str, multiplier: usize, capacity: usize) -> usize {
        let (k, m) = (multiplier as u64, capacity as u64);
        key.bytes()
            .fold(0u64, |acc, byte| (k * acc + byte as u64) % m) as usize
    }

    fn home(&self, key: &str) -> usize {
        let capacity = self.capacity();
        Self::horner(key, capacity - 1, capacity)
    }

    /// Always odd, hence coprime with the power-of-two capacity: the probe
    /// sequence visits every slot before repeating.
    fn step(&self, key: &str) -> usize {
        let capacity = self.capacity();
        (2 * Self::horner(key, capacity + 1, capacity) + 1) % capacity
    }

    fn probe(&self, key: &str) -> Probe {
        let capacity = self.capacity();
        let step = self.step(key);
        let mut slot = self.home(key);
        let mut first_tombstone = None;

        for _ in 0..capacity {
            match &self.slots[slot] {
                Slot::Empty => return Probe::Vacant(first_tombstone.unwrap_or(slot)),
                Slot::Live(record) if record.key == key => return Probe::Found(slot),
                Slot::Live(_) => {}
                Slot::Tombstone => {
                    first_tombstone.get_or_insert(slot);
                }
            }
            slot = (slot + step) % capacity;
        }

        first_tombstone.map_or(Probe::Exhausted, Probe::Vacant)
    }

    fn find(&self, key: &str) -> Option<usize> {
        match self.probe(key) {
            Probe::Found(slot) => Some(slot),
            _ => None,
        }
    }

    fn get(&self, key: &str) -> Option<&Record> {
        self.find(key).and_then(|slot| match &self.slots[slot] {
            Slot::Live(record) => Some(record),
            _ => None,
        })
    }

    fn get_mut(&mut self, key: &str) -> Option<&mut Record> {
        let slot = self.find(key)?;
        match &mut self.slots[slot] {
            Slot::Live(record) => Some(record),
            _ => None,
        }
    }

    /// Places a record whose key is known to be absent.
    fn place(&mut self, record: Record) {
        let slot = loop {
            match self.probe(&record.key) {
                Probe::Vacant(slot) => break slot,
                Probe::Found(slot) => {
                    self.slots[slot] = Slot::Live(record);
                    return;
                }
                // Unreachable while the load factor holds.
                Probe::Exhausted => self.resize(self.capacity() * 2),
            }
        };

        if matches!(self.slots[slot], Slot::Tombstone) {
            self.tombstones -= 1;
        }
        self.slots[slot] = Slot::Live(record);
        self.live += 1;
    }

    fn remove(&mut self, key: &str) -> Option<Record> {
        let slot = self.find(key)?;
        match std::mem::replace(&mut self.slots[slot], Slot::Tombstone) {
            Slot::Live(record) => {
                self.live -= 1;
                self.tombstones += 1;
                Some(record)
            }
            other => {
                self.slots[slot] = other;
                None
            }
        }
    }

    /// Rebuilds the slot array at `capacity`, keeping only live records.
    fn rebuild(&mut self, capacity: usize) {
        let old = std::mem::replace(&mut self.slots, vec![Slot::Empty; capacity]);
        self.live = 0;
        self.tombstones = 0;

        for slot in old {
            if let Slot::Live(record) = slot {
                self.place(record);
            }
        }
    }

    fn resize(&mut self, capacity: usize) {
        let from = self.capacity();
        self.rebuild(capacity);
        self.resizes += 1;
        debug!(from, to = capacity, live = self.live, "Hash table resized");
    }

    fn rehash(&mut self) {
        let purged = self.tombstones;
        self.rebuild(self.capacity());
        self.rehashes += 1;
        debug!(
            capacity = self.capacity(),
            purged, "Hash table rehashed to purge tombstones"
        );
    }

    /// Live records in slot order.
    fn records(&self) -> impl Iterator<Item = &Record> {
        self.slots.iter().filter_map(|slot| match slot {
            Slot::Live(record) => Some(record),
            _ => None,
        })
    }
}

/// Hash table engine with lazy expiry.
///
/// # Example
///
/// ```
/// use twinkv::storage::{HashTableStore, KeyValueStore, Record};
///
/// let mut store = HashTableStore::new();
/// store.set(Record::new("k1", "Smith", "John", 1990, "Paris", 150), None).unwrap();
///
/// assert!(store.exists("k1"));
/// assert_eq!(store.get("k1").map(|r| r.city.as_str()), Some("Paris"));
/// ```
#[derive(Debug)]
pub struct HashTableStore {
    table: Table,
    timer: ExpiryTimer<String>,
}

impl Default for HashTableStore {
    fn default() -> Self {
        Self::new()
    }
}

impl HashTableStore {
    /// Creates an empty table on the system clock.
    pub fn new() -> Self {
        Self::with_clock(Clock::System)
    }

    /// Creates an empty table whose expiry runs on `clock`.
    pub fn with_clock(clock: Clock) -> Self {
        Self {
            table: Table::with_capacity(INITIAL_CAPACITY),
            timer: ExpiryTimer::new(clock),
        }
    }

    /// Current number of slots.
    pub fn capacity(&self) -> usize {
        self.table.capacity()
    }

    /// Current number of tombstoned slots.
    pub fn tombstones(&self) -> usize {
        self.table.tombstones
    }

    pub fn stats(&self) -> HashTableStats {
        HashTableStats {
            live: self.table.live,
            tombstones: self.table.tombstones,
            capacity: self.table.capacity(),
            expiring: self.timer.len(),
            resizes: self.table.resizes,
            rehashes: self.table.rehashes,
        }
    }

    /// Reaps expired records.
    fn tick(&mut self) {
        let table = &mut self.table;
        self.timer.tick(|key| {
            table.remove(&key);
        });
    }

    /// Inserts a record known to be absent, honoring the load factor.
    fn insert(&mut self, record: Record, lifetime: Option<std::time::Duration>) {
        if self.table.live + 1 > self.table.capacity() / 2 {
            self.table.resize(self.table.capacity() * 2);
        }

        let key = record.key.clone();
        self.table.place(record);
        if let Some(lifetime) = lifetime {
            self.timer.track_for(key, lifetime);
        }
    }

    fn load(&mut self, path: &Path) -> Result<usize> {
        let records = dump::read_records(path)?;

        let wanted = (2 * (self.table.live + records.len())).next_power_of_two();
        if wanted > self.table.capacity() {
            self.table.resize(wanted);
        }

        let count = records.len();
        for record in records {
            self.set(record, None)?;
        }
        Ok(count)
    }
}

impl KeyValueStore for HashTableStore {
    fn kind(&self) -> EngineKind {
        EngineKind::HashTable
    }

    fn set(&mut self, record: Record, ttl: Option<u64>) -> Result<bool> {
        self.tick();

        if self.table.tombstones > self.table.live {
            self.table.rehash();
        }
        if self.table.find(&record.key).is_some() {
            return Ok(false);
        }

        let lifetime = ttl
            .filter(|secs| *secs > 0)
            .map(std::time::Duration::from_secs);
        self.insert(record, lifetime);
        Ok(true)
    }

    fn get(&mut self, key: &str) -> Option<&Record> {
        self.tick();
        self.table.get(key)
    }

    fn exists(&mut self, key: &str) -> bool {
        self.tick();
        self.table.find(key).is_some()
    }

    fn del(&mut self, key: &str) -> bool {
        self.tick();
        match self.table.remove(key) {
            Some(_) => {
                self.timer.forget(&key.to_string());
                true
            }
            None => false,
        }
    }

    fn update(&mut self, key: &str, patch: &RecordPatch) -> bool {
        self.tick();
        match self.table.get_mut(key) {
            Some(record) => {
                record.apply(patch);
                true
            }
            None => false,
        }
    }

    fn keys(&mut self) -> Vec<String> {
        self.tick();
        self.table.records().map(|r| r.key.clone()).collect()
    }

    fn rename(&mut self, old: &str, new: &str) -> Result<bool> {
        self.tick();
        if self.table.find(old).is_none() {
            return Ok(false);
        }
        if old == new {
            return Ok(true);
        }

        if self.table.remove(new).is_some() {
            self.timer.forget(&new.to_string());
        }
        let lifetime = self.timer.forget(&old.to_string());
        let Some(mut record) = self.table.remove(old) else {
            return Ok(false);
        };

        record.key = new.to_string();
        self.insert(record, lifetime);
        Ok(true)
    }

    fn ttl(&mut self, key: &str) -> u64 {
        self.tick();
        self.timer.remaining(&key.to_string())
    }

    fn find(&mut self, filter: &RecordFilter) -> Vec<String> {
        self.tick();
        self.table
            .records()
            .filter(|r| filter.matches(r))
            .map(|r| r.key.clone())
            .collect()
    }

    fn show_all(&mut self) -> Vec<&Record> {
        self.tick();
        self.table.records().collect()
    }

    fn upload(&mut self, path: &Path) -> usize {
        self.tick();
        match self.load(path) {
            Ok(count) => {
                debug!(path = %path.display(), records = count, "Upload complete");
                count
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Upload failed");
                0
            }
        }
    }

    fn export(&mut self, path: &Path) -> usize {
        self.tick();
        match dump::write_records(path, self.table.records()) {
            Ok(count) => count,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Export failed");
                0
            }
        }
    }

    fn count(&mut self) -> usize {
        self.tick();
        self.table.live
    }

    fn len(&self) -> usize {
        self.table.live
    }
}
