//! Command Handler Module
//!
//! The command processing layer of the shell. It receives tokenized lines,
//! validates their arguments, runs them against the selected engine and
//! returns a reply to render.
//!
//! ## Architecture
//!
//! ```text
//!   Input line
//!       │
//!       ▼
//! ┌─────────────────┐
//! │  Line Parser    │  (protocol module)
//! └────────┬────────┘
//!          │
//!          ▼
//! ┌─────────────────┐
//! │ CommandHandler  │  (this module)
//! │                 │
//! │  - Dispatch     │
//! │  - Validate     │
//! │  - Execute      │
//! └────────┬────────┘
//!          │
//!          ▼
//! ┌─────────────────┐
//! │ KeyValueStore   │  (storage module)
//! └─────────────────┘
//! ```

pub mod handler;

// Re-export the main command handler
pub use handler::{CommandError, CommandHandler};
