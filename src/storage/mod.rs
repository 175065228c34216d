//! Storage Engine Module
//!
//! Two interchangeable engines behind one contract, [`KeyValueStore`]:
//!
//! ```text
//!                 ┌───────────────────────────┐
//!                 │   dyn KeyValueStore       │
//!                 └─────────────┬─────────────┘
//!             ┌─────────────────┴─────────────────┐
//!  ┌──────────┴──────────┐             ┌──────────┴──────────┐
//!  │   HashTableStore    │             │      TreeStore      │
//!  │ double hashing,     │             │ AVL arena, ordered  │
//!  │ tombstones, resize  │             │ cursor, node limit  │
//!  └──────────┬──────────┘             └──────────┬──────────┘
//!             │   ExpiryTimer<String>             │   ExpiryTimer<NodeId>
//!             └─────────────────┬─────────────────┘
//!                        dump (flat text)
//! ```
//!
//! ## Features
//!
//! - **Lazy Expiry**: every operation reaps expired entries before doing its
//!   own work; there is no background task
//! - **First Writer Wins**: `set` on a live key is a no-op
//! - **Flat Dumps**: `upload` and `export` share one text format
//!
//! The engines are single-threaded structures. Callers that need sharing wrap
//! one in a lock themselves.
//!
//! ## Example
//!
//! ```
//! use twinkv::storage::{open, EngineKind, KeyValueStore, Record, RecordFilter};
//!
//! let mut store = open(EngineKind::Tree);
//!
//! store.set(Record::new("k1", "Smith", "John", 1990, "Paris", 150), None).unwrap();
//! store.set(Record::new("k2", "Doe", "Jane", 1985, "Rome", 20), Some(60)).unwrap();
//!
//! assert!(store.exists("k1"));
//! assert_eq!(store.ttl("k2"), 60);
//! assert_eq!(store.find(&RecordFilter::any().last_name("Smith")), vec!["k1"]);
//! ```

pub mod dump;
pub mod expiry;
pub mod hash_table;
pub mod record;
pub mod tree;

use crate::error::Result;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

// Re-export commonly used types
pub use expiry::{Clock, ExpiryTimer, ManualClock};
pub use hash_table::{HashTableStats, HashTableStore};
pub use record::{Record, RecordFilter, RecordPatch};
pub use tree::{Cursor, NodeId, TreeStore};

/// Which engine backs a store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EngineKind {
    HashTable,
    Tree,
}

impl EngineKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EngineKind::HashTable => "hash table",
            EngineKind::Tree => "self-balancing binary search tree",
        }
    }
}

impl fmt::Display for EngineKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when an engine name is not recognised.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown engine '{0}' (expected hash or tree)")]
pub struct UnknownEngine(pub String);

impl FromStr for EngineKind {
    type Err = UnknownEngine;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "1" | "hash" | "hashtable" | "hash_table" => Ok(EngineKind::HashTable),
            "2" | "tree" | "avl" => Ok(EngineKind::Tree),
            _ => Err(UnknownEngine(s.to_string())),
        }
    }
}

/// The operation set both engines implement identically.
///
/// Every method that takes `&mut self` reaps expired entries first. Misses
/// are reported as `None`, `false` or `0`, never as errors.
pub trait KeyValueStore: Send {
    /// Which engine this is.
    fn kind(&self) -> EngineKind;

    /// Inserts `record`, optionally expiring after `ttl` seconds.
    ///
    /// Returns `Ok(false)` without touching anything if the key is already
    /// live. A `ttl` of `Some(0)` means the same as `None`.
    fn set(&mut self, record: Record, ttl: Option<u64>) -> Result<bool>;

    fn get(&mut self, key: &str) -> Option<&Record>;

    fn exists(&mut self, key: &str) -> bool;

    /// Removes the entry and its expiry counter. Returns whether it existed.
    fn del(&mut self, key: &str) -> bool;

    /// Applies the set fields of `patch`. Returns whether the key was live.
    fn update(&mut self, key: &str, patch: &RecordPatch) -> bool;

    /// Every live key, in engine traversal order.
    fn keys(&mut self) -> Vec<String>;

    /// Moves the record under `old` to `new`, keeping what is left of its
    /// lifetime.
    ///
    /// A live record under `new` is replaced. This is the one place first
    /// writer wins does not hold: the renamed record always lands.
    ///
    /// Returns `Ok(false)` if `old` is not live.
    fn rename(&mut self, old: &str, new: &str) -> Result<bool>;

    /// Whole seconds until `key` expires.
    ///
    /// `0` both for keys that never expire and for keys that are not live;
    /// use [`exists`](Self::exists) to tell them apart.
    fn ttl(&mut self, key: &str) -> u64;

    /// Keys of every record matched by `filter`, in traversal order.
    fn find(&mut self, filter: &RecordFilter) -> Vec<String>;

    /// Every live record, in traversal order.
    fn show_all(&mut self) -> Vec<&Record>;

    /// Loads records from a dump file. Keys already live are kept.
    ///
    /// Returns the number of records read from the file, `0` if it could not
    /// be read.
    fn upload(&mut self, path: &Path) -> usize;

    /// Writes every live record to a dump file. Returns the number written,
    /// `0` if the file could not be written.
    fn export(&mut self, path: &Path) -> usize;

    /// Number of live entries, after reaping what has expired.
    fn count(&mut self) -> usize;

    /// Number of entries, counting any that expired since the last call.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Creates an empty store of the given kind.
pub fn open(kind: EngineKind) -> Box<dyn KeyValueStore> {
    match kind {
        EngineKind::HashTable => Box::new(HashTableStore::new()),
        EngineKind::Tree => Box::new(TreeStore::new()),
    }
}
