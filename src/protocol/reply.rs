//! Shell Replies
//!
//! Every command produces one [`Reply`]. Rendering turns it into the lines
//! the shell prints, each status line prefixed with `> `:
//!
//! ```text
//! > OK                      Ok
//! > (null)                  Null
//! > true                    Bool
//! > 12                      Integer
//! > inf                     Ttl(None)
//! > k1  Smith  John ...     Record
//! 1) k1                     Keys
//! 2) k2
//! > №  | Last Name | ...    Table
//! > 1  "Smith"  "John" ...
//! > ERROR: ...              Error
//! ```
//!
//! Key lists are not prefixed, so they can be copied straight into the next
//! command.

use crate::protocol::style::{Style, Tone};
use crate::storage::Record;
use bytes::{BufMut, Bytes, BytesMut};

/// Status line prefix.
pub const PROMPT: &[u8] = b"> ";

/// Column header printed above SHOWALL rows.
pub const TABLE_HEADER: &str = "№  | Last Name | First Name | Year | City | Number of coins |";

/// The result of one shell command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    Ok,
    Pong,
    /// Absent key
    Null,
    Bool(bool),
    Integer(i64),
    /// Remaining lifetime; `None` for a key that never expires
    Ttl(Option<u64>),
    Record(Record),
    Keys(Vec<String>),
    Table(Vec<Record>),
    Error(String),
    /// Ends the session. Renders as nothing.
    Quit,
}

impl Reply {
    pub fn error(msg: impl Into<String>) -> Self {
        Reply::Error(msg.into())
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Reply::Error(_))
    }

    pub fn is_quit(&self) -> bool {
        matches!(self, Reply::Quit)
    }

    /// Renders the reply into a fresh buffer.
    pub fn render(&self, style: &Style) -> Bytes {
        let mut buf = BytesMut::with_capacity(64);
        self.render_into(style, &mut buf);
        buf.freeze()
    }

    /// Renders the reply into an existing buffer.
    pub fn render_into(&self, style: &Style, buf: &mut BytesMut) {
        match self {
            Reply::Ok => line(buf, style, Tone::Success, "OK"),
            Reply::Pong => line(buf, style, Tone::Success, "PONG"),
            Reply::Null => line(buf, style, Tone::Failure, "(null)"),
            Reply::Bool(true) => line(buf, style, Tone::Success, "true"),
            Reply::Bool(false) => line(buf, style, Tone::Failure, "false"),
            Reply::Integer(n) => line(buf, style, Tone::Plain, &n.to_string()),
            Reply::Ttl(None) => line(buf, style, Tone::Success, "inf"),
            Reply::Ttl(Some(secs)) => line(buf, style, Tone::Failure, &secs.to_string()),
            Reply::Record(record) => line(buf, style, Tone::Plain, &record.to_string()),
            Reply::Keys(keys) if keys.is_empty() => {
                line(buf, style, Tone::Plain, "(empty list)")
            }
            Reply::Keys(keys) => {
                for (i, key) in keys.iter().enumerate() {
                    buf.put_slice(format!("{}) {}\n", i + 1, key).as_bytes());
                }
            }
            Reply::Table(records) => {
                line(buf, style, Tone::Header, TABLE_HEADER);
                for (i, r) in records.iter().enumerate() {
                    let row = format!(
                        "{}\t\"{}\"\t\"{}\"\t{}\t\"{}\"\t{}",
                        i + 1,
                        r.last_name,
                        r.first_name,
                        r.year_of_birth,
                        r.city,
                        r.coins
                    );
                    line(buf, style, Tone::Plain, &row);
                }
            }
            Reply::Error(msg) => line(buf, style, Tone::Failure, &format!("ERROR: {msg}")),
            Reply::Quit => {}
        }
    }
}

fn line(buf: &mut BytesMut, style: &Style, tone: Tone, text: &str) {
    buf.put_slice(PROMPT);
    style.write(buf, tone, text);
    buf.put_u8(b'\n');
}
