//! Shell Session Module
//!
//! Connects an input stream of command lines to a [`CommandHandler`] and
//! writes the rendered replies to an output stream. The binary runs one
//! session over stdin and stdout; tests run sessions over byte slices and
//! mock streams.
//!
//! ## Architecture
//!
//! ```text
//!  stdin / &[u8] / mock
//!          │
//!          ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                       Session                               │
//! │                                                             │
//! │  ┌─────────────┐    ┌─────────────┐    ┌─────────────┐      │
//! │  │ Read bytes  │───>│ Split lines │───>│ Execute cmd │      │
//! │  └─────────────┘    └─────────────┘    └─────────────┘      │
//! │                                               │             │
//! │                                               ▼             │
//! │                                      ┌─────────────┐        │
//! │                                      │ Write reply │        │
//! │                                      └─────────────┘        │
//! └─────────────────────────────────────────────────────────────┘
//!          │
//!          ▼
//!  stdout / Vec<u8> / mock
//! ```
//!
//! ## Example
//!
//! ```
//! use twinkv::commands::CommandHandler;
//! use twinkv::protocol::Style;
//! use twinkv::session::run_session;
//! use twinkv::storage::{open, EngineKind};
//!
//! # tokio_test::block_on(async {
//! let handler = CommandHandler::new(open(EngineKind::Tree));
//! let mut out = Vec::new();
//!
//! run_session(&b"PING\n"[..], &mut out, handler, Style::plain()).await.unwrap();
//! assert_eq!(out, b"> PONG\n");
//! # });
//! ```
//!
//! [`CommandHandler`]: crate::commands::CommandHandler

pub mod handler;

// Re-export commonly used types
pub use handler::{run_session, Session, SessionError, SessionStats};
