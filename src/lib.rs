//! # twinkv - A Key-Value Store with Two Engines
//!
//! twinkv stores person records under string keys in one of two
//! interchangeable in-memory engines and drives them from a Redis-like
//! command shell.
//!
//! ## Features
//!
//! - **Hash Table Engine**: open addressing with double hashing, tombstones,
//!   load-factor driven resize and same-size rehash
//! - **Tree Engine**: AVL-balanced binary search tree in an arena, with an
//!   ordered cursor
//! - **TTL Support**: per-record lifetimes, reaped lazily on every operation
//! - **Dump Files**: one-shot text import and export shared by both engines
//! - **Shell**: async line protocol over any reader and writer
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                               twinkv                                    │
//! │                                                                         │
//! │  ┌─────────────┐    ┌─────────────┐    ┌─────────────┐                  │
//! │  │ stdin/stdout│───>│  Session    │───>│  Command    │                  │
//! │  │             │    │  (lines)    │    │  Handler    │                  │
//! │  └─────────────┘    └─────────────┘    └──────┬──────┘                  │
//! │                                               │                         │
//! │                                               ▼                         │
//! │                       ┌─────────────────────────────────────────────┐   │
//! │                       │           dyn KeyValueStore                 │   │
//! │                       │  ┌──────────────────┐ ┌──────────────────┐  │   │
//! │                       │  │ HashTableStore   │ │ TreeStore        │  │   │
//! │                       │  └────────┬─────────┘ └────────┬─────────┘  │   │
//! │                       │           └──── ExpiryTimer ───┘            │   │
//! │                       └─────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```
//! use twinkv::storage::{open, EngineKind, KeyValueStore, Record};
//!
//! let mut store = open(EngineKind::HashTable);
//!
//! store.set(Record::new("k1", "Smith", "John", 1990, "Paris", 150), Some(60)).unwrap();
//! assert_eq!(store.get("k1").map(|r| r.city.as_str()), Some("Paris"));
//! assert_eq!(store.ttl("k1"), 60);
//!
//! assert!(store.rename("k1", "k2").unwrap());
//! assert!(!store.exists("k1"));
//! ```
//!
//! ## Module Overview
//!
//! - [`storage`]: the engines, their shared contract and the dump format
//! - [`protocol`]: line parser and reply rendering for the shell
//! - [`commands`]: command dispatch onto the contract
//! - [`session`]: the async read-execute-reply loop
//! - [`error`]: storage error type
//!
//! ## Design Highlights
//!
//! ### One Contract
//!
//! Callers hold a `Box<dyn KeyValueStore>` and never learn which engine is
//! behind it. Both engines pass the same contract tests.
//!
//! ### Lazy Expiry
//!
//! There is no sweeper task. Each operation first drains the time elapsed
//! since the previous one from every TTL counter and removes what ran out,
//! so an expired record is never observed.

pub mod commands;
pub mod error;
pub mod protocol;
pub mod session;
pub mod storage;

// Re-export commonly used types for convenience
pub use commands::CommandHandler;
pub use error::{Result, StoreError};
pub use protocol::{Reply, Style};
pub use session::{run_session, Session, SessionStats};
pub use storage::{open, EngineKind, HashTableStore, KeyValueStore, Record, TreeStore};

/// Version of twinkv
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
