//! Line Protocol Parser
//!
//! The shell speaks a plain line protocol: one command per line, tokens
//! separated by any run of whitespace, `\n` or `\r\n` terminated.
//!
//! ## How the Parser Works
//!
//! [`parse_line`] looks at the front of a buffer and returns either:
//! - `Ok(Some((tokens, consumed)))` - a complete line, `consumed` bytes used
//! - `Ok(None)` - no newline yet, wait for more data
//! - `Err(ParseError)` - the line cannot be accepted
//!
//! A blank line yields an empty token list; callers skip it. At end of input
//! the caller hands whatever is left to [`parse_final`].

use thiserror::Error;

/// Errors that can occur while splitting input into lines.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ParseError {
    /// The line is not valid UTF-8
    #[error("invalid UTF-8: {0}")]
    InvalidUtf8(String),

    /// No newline within the size limit
    #[error("line too long: {size} bytes (max: {max})")]
    LineTooLong { size: usize, max: usize },
}

/// Result type for parsing operations.
pub type ParseResult<T> = Result<T, ParseError>;

/// Longest accepted line, terminator excluded.
pub const MAX_LINE_SIZE: usize = 64 * 1024;

/// Splits the first complete line off `buf`.
pub fn parse_line(buf: &[u8]) -> ParseResult<Option<(Vec<String>, usize)>> {
    match buf.iter().position(|&b| b == b'\n') {
        Some(pos) if pos > MAX_LINE_SIZE => Err(ParseError::LineTooLong {
            size: pos,
            max: MAX_LINE_SIZE,
        }),
        Some(pos) => Ok(Some((tokens(&buf[..pos])?, pos + 1))),
        None if buf.len() > MAX_LINE_SIZE => Err(ParseError::LineTooLong {
            size: buf.len(),
            max: MAX_LINE_SIZE,
        }),
        None => Ok(None),
    }
}

/// Tokenizes an unterminated trailing line.
pub fn parse_final(buf: &[u8]) -> ParseResult<Vec<String>> {
    if buf.len() > MAX_LINE_SIZE {
        return Err(ParseError::LineTooLong {
            size: buf.len(),
            max: MAX_LINE_SIZE,
        });
    }
    tokens(buf)
}

/// Splits a line into whitespace-separated tokens.
pub fn tokenize(line: &str) -> Vec<String> {
    line.split_whitespace().map(str::to_string).collect()
}

fn tokens(line: &[u8]) -> ParseResult<Vec<String>> {
    let text = std::str::from_utf8(line).map_err(|e| ParseError::InvalidUtf8(e.to_string()))?;
    Ok(tokenize(text))
}
