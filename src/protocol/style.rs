//! Terminal styling for replies.
//!
//! [`Style`] holds no state beyond whether color is on; it wraps text in ANSI
//! escape sequences when asked to and passes it through otherwise.

use bytes::{BufMut, BytesMut};

/// ANSI sequence that resets every attribute.
pub const RESET: &str = "\x1b[0m";

/// How a piece of reply text should look.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tone {
    Plain,
    /// Green
    Success,
    /// Red
    Failure,
    /// Underlined
    Header,
}

impl Tone {
    fn code(self) -> &'static str {
        match self {
            Tone::Plain => "",
            Tone::Success => "\x1b[32m",
            Tone::Failure => "\x1b[31m",
            Tone::Header => "\x1b[4m",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Style {
    color: bool,
}

impl Default for Style {
    fn default() -> Self {
        Self::colored()
    }
}

impl Style {
    pub fn colored() -> Self {
        Self { color: true }
    }

    pub fn plain() -> Self {
        Self { color: false }
    }

    pub fn is_colored(&self) -> bool {
        self.color
    }

    /// Appends `text` to `buf` in the given tone.
    pub fn write(&self, buf: &mut BytesMut, tone: Tone, text: &str) {
        if !self.color || tone == Tone::Plain {
            buf.put_slice(text.as_bytes());
            return;
        }
        buf.put_slice(tone.code().as_bytes());
        buf.put_slice(text.as_bytes());
        buf.put_slice(RESET.as_bytes());
    }
}
