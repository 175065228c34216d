//! Shell Line Protocol
//!
//! The text protocol spoken between a terminal (or a script piped into
//! stdin) and the command handler.
//!
//! ## Modules
//!
//! - `parser`: splits incoming bytes into lines and lines into tokens
//! - `reply`: the `Reply` enum and its rendering
//! - `style`: optional ANSI coloring of replies
//!
//! ## Example
//!
//! ```
//! use twinkv::protocol::{parse_line, Reply, Style};
//!
//! let (tokens, consumed) = parse_line(b"GET k1\n").unwrap().unwrap();
//! assert_eq!(tokens, vec!["GET", "k1"]);
//! assert_eq!(consumed, 7);
//!
//! let out = Reply::Null.render(&Style::plain());
//! assert_eq!(&out[..], b"> (null)\n");
//! ```

pub mod parser;
pub mod reply;
pub mod style;

// Re-export commonly used types for convenience
pub use parser::{parse_final, parse_line, tokenize, ParseError, ParseResult};
pub use reply::Reply;
pub use style::{Style, Tone};
