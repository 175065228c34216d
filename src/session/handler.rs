//! Session Handler Module
//!
//! Runs the read-execute-reply loop of one shell session over any pair of
//! async streams.
//!
//! ## Session Lifecycle
//!
//! ```text
//! 1. Session created around a CommandHandler
//!        │
//!        ▼
//! 2. ┌──────────────────────────────┐
//!    │      Main Loop               │
//!    │                              │
//!    │  ┌─────────────────────────┐ │
//!    │  │ Read bytes from input   │ │
//!    │  └───────────┬─────────────┘ │
//!    │              ▼               │
//!    │  ┌─────────────────────────┐ │
//!    │  │ Split complete lines    │ │
//!    │  └───────────┬─────────────┘ │
//!    │              ▼               │
//!    │  ┌─────────────────────────┐ │
//!    │  │ Execute, render reply   │ │
//!    │  └───────────┬─────────────┘ │
//!    │              ▼               │
//!    │         [Loop back]          │
//!    └──────────────────────────────┘
//!        │
//!        ▼
//! 3. QUIT, or end of input (a trailing unterminated line still runs)
//! ```
//!
//! ## Buffer Management
//!
//! Input accumulates in a `BytesMut`. A single read may hold half a line or
//! several lines when commands are piped in from a file. A line longer than
//! `MAX_LINE_SIZE` is answered with one error and discarded up to its newline,
//! so the buffer never grows past the limit.

use crate::commands::CommandHandler;
use crate::protocol::{parse_final, parse_line, ParseError, Reply, Style};
use bytes::BytesMut;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufWriter};
use tracing::{debug, info, trace, warn};

/// Initial buffer capacity
const INITIAL_BUFFER_SIZE: usize = 4096;

/// Counters for one session.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SessionStats {
    /// Non-blank lines read
    pub lines_read: u64,
    /// Commands executed, failed ones included
    pub commands_processed: u64,
    /// Commands that replied with an error
    pub errors: u64,
    pub bytes_read: u64,
    pub bytes_written: u64,
}

/// Whether the loop keeps going after a line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    Continue,
    Quit,
}

/// Drives one shell session.
pub struct Session<R, W> {
    /// Command input
    reader: R,

    /// Reply output
    writer: BufWriter<W>,

    /// Bytes read but not yet executed
    buffer: BytesMut,

    command_handler: CommandHandler,

    style: Style,

    stats: SessionStats,

    /// Inside an oversized line whose newline has not arrived yet
    discarding: bool,
}

impl<R, W> Session<R, W>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    pub fn new(reader: R, writer: W, command_handler: CommandHandler, style: Style) -> Self {
        Self {
            reader,
            writer: BufWriter::new(writer),
            buffer: BytesMut::with_capacity(INITIAL_BUFFER_SIZE),
            command_handler,
            style,
            stats: SessionStats::default(),
            discarding: false,
        }
    }

    /// Runs until QUIT or end of input and returns the session counters.
    pub async fn run(mut self) -> Result<SessionStats, SessionError> {
        info!(engine = %self.command_handler.kind(), "Session started");

        let result = self.main_loop().await;

        match &result {
            Ok(()) => debug!(
                commands = self.stats.commands_processed,
                errors = self.stats.errors,
                "Session ended"
            ),
            Err(e) => warn!(error = %e, "Session aborted"),
        }

        result.map(|()| self.stats)
    }

    /// The main read-execute-reply loop.
    async fn main_loop(&mut self) -> Result<(), SessionError> {
        loop {
            while let Some(tokens) = self.try_parse_line().await? {
                if self.execute(tokens).await? == Flow::Quit {
                    return Ok(());
                }
            }

            if self.read_more_data().await? == 0 {
                return self.finish().await;
            }
        }
    }

    /// Executes whatever is left in the buffer at end of input.
    async fn finish(&mut self) -> Result<(), SessionError> {
        let rest = self.buffer.split();
        if self.discarding || rest.is_empty() {
            return Ok(());
        }

        match parse_final(&rest) {
            Ok(tokens) => {
                self.execute(tokens).await?;
            }
            Err(e) => self.reject(&e).await?,
        }
        Ok(())
    }

    /// Splits the next complete line off the buffer.
    ///
    /// A line that is not valid UTF-8 or is too long is answered with an
    /// error and dropped.
    async fn try_parse_line(&mut self) -> Result<Option<Vec<String>>, SessionError> {
        loop {
            if self.discarding && !self.skip_line() {
                return Ok(None);
            }

            match parse_line(&self.buffer) {
                Ok(Some((tokens, consumed))) => {
                    let _ = self.buffer.split_to(consumed);
                    trace!(consumed, remaining = self.buffer.len(), "Parsed line");
                    return Ok(Some(tokens));
                }
                Ok(None) => return Ok(None),
                Err(e) => {
                    debug!(error = %e, "Dropping line");
                    self.skip_line();
                    self.reject(&e).await?;
                }
            }
        }
    }

    /// Drops the buffer through the next newline. Without one the whole
    /// buffer goes and the rest of the line is dropped as it arrives.
    fn skip_line(&mut self) -> bool {
        match self.buffer.iter().position(|&b| b == b'\n') {
            Some(pos) => {
                let _ = self.buffer.split_to(pos + 1);
                self.discarding = false;
                true
            }
            None => {
                self.buffer.clear();
                self.discarding = true;
                false
            }
        }
    }

    async fn execute(&mut self, tokens: Vec<String>) -> Result<Flow, SessionError> {
        if tokens.is_empty() {
            return Ok(Flow::Continue);
        }
        self.stats.lines_read += 1;

        let reply = self.command_handler.execute(&tokens);
        self.stats.commands_processed += 1;

        if reply.is_quit() {
            return Ok(Flow::Quit);
        }
        if reply.is_error() {
            self.stats.errors += 1;
        }

        self.send_reply(&reply).await?;
        Ok(Flow::Continue)
    }

    async fn reject(&mut self, e: &ParseError) -> Result<(), SessionError> {
        self.stats.lines_read += 1;
        self.stats.errors += 1;
        self.send_reply(&Reply::error(format!("unreadable line: {e}")))
            .await
    }

    /// Reads more input into the buffer. Returns the number of bytes read.
    async fn read_more_data(&mut self) -> Result<usize, SessionError> {
        if self.buffer.capacity() - self.buffer.len() < 1024 {
            self.buffer.reserve(INITIAL_BUFFER_SIZE);
        }

        let n = self.reader.read_buf(&mut self.buffer).await?;
        self.stats.bytes_read += n as u64;
        trace!(bytes = n, "Read data");
        Ok(n)
    }

    async fn send_reply(&mut self, reply: &Reply) -> Result<(), SessionError> {
        let bytes = reply.render(&self.style);
        self.writer.write_all(&bytes).await?;
        self.writer.flush().await?;
        self.stats.bytes_written += bytes.len() as u64;
        Ok(())
    }
}

/// Errors that end a session early.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// Reading input or writing replies failed
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Runs a session to completion.
///
/// Convenience wrapper that builds a [`Session`] and runs it.
pub async fn run_session<R, W>(
    reader: R,
    writer: W,
    command_handler: CommandHandler,
    style: Style,
) -> Result<SessionStats, SessionError>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    Session::new(reader, writer, command_handler, style).run().await
}
