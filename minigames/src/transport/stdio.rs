//! Stdio transport.
//!
//! Implements [`Transport`] as NDJSON over stdin/stdout. Reader and writer
//! are generic so tests can drive the transport with in-memory pipes.

use std::str::FromStr;

use tokio::io::{
    AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader, BufWriter, Stdin, Stdout,
};
use tokio::sync::Mutex;

use crate::error::TransportError;
use crate::observability::metrics;

use super::wire::{Inbound, Outbound, decode_inbound};
use super::{DEFAULT_MAX_MESSAGE_SIZE, DEFAULT_STDIO_BUFFER_SIZE, Result, Transport};

/// Configuration for the stdio transport.
///
/// | Variable | Default |
/// |----------|---------|
/// | `MINIGAMES_MAX_MESSAGE_SIZE` | 1 MB |
/// | `MINIGAMES_STDIO_BUFFER_SIZE` | 64 KB |
#[derive(Debug, Clone, Copy)]
pub struct StdioConfig {
    /// Maximum inbound line size in bytes.
    pub max_message_size: usize,
    /// Read/write buffer size in bytes.
    pub buffer_size: usize,
}

impl StdioConfig {
    /// Loads configuration from environment variables with defaults.
    #[must_use]
    pub fn from_env() -> Self {
        Self {
            max_message_size: env_or("MINIGAMES_MAX_MESSAGE_SIZE", DEFAULT_MAX_MESSAGE_SIZE),
            buffer_size: env_or("MINIGAMES_STDIO_BUFFER_SIZE", DEFAULT_STDIO_BUFFER_SIZE),
        }
    }
}

impl Default for StdioConfig {
    fn default() -> Self {
        Self {
            max_message_size: DEFAULT_MAX_MESSAGE_SIZE,
            buffer_size: DEFAULT_STDIO_BUFFER_SIZE,
        }
    }
}

/// NDJSON transport.
///
/// Separate async mutexes for reader and writer allow a concurrent read
/// and write; the async mutex is needed because locks are held across
/// `.await`.
///
/// Line handling:
/// - last line without `\n` is still delivered before EOF
/// - blank lines are skipped
/// - oversized, non-UTF-8 and undecodable lines are logged and skipped
pub struct StdioTransport<R = Stdin, W = Stdout> {
    reader: Mutex<BufReader<R>>,
    writer: Mutex<BufWriter<W>>,
    config: StdioConfig,
}

impl StdioTransport {
    /// Transport over the process's stdin/stdout, configured from the
    /// environment.
    #[must_use]
    pub fn new() -> Self {
        Self::with_io(tokio::io::stdin(), tokio::io::stdout(), StdioConfig::from_env())
    }
}

impl Default for StdioTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl<R, W> StdioTransport<R, W>
where
    R: AsyncRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    /// Transport over arbitrary streams.
    pub fn with_io(reader: R, writer: W, config: StdioConfig) -> Self {
        Self {
            reader: Mutex::new(BufReader::with_capacity(config.buffer_size, reader)),
            writer: Mutex::new(BufWriter::with_capacity(config.buffer_size, writer)),
            config,
        }
    }

    /// Reads one line capped at `max_message_size`.
    ///
    /// Returns `Ok(None)` at EOF. An overflowing line is drained and
    /// reported with its full length.
    #[allow(clippy::significant_drop_tightening)]
    async fn read_bounded_line(&self) -> Result<Option<Line>> {
        let mut reader = self.reader.lock().await;
        let read_limit = self.config.max_message_size + 1;
        let mut buf: Vec<u8> = Vec::with_capacity(read_limit.min(DEFAULT_STDIO_BUFFER_SIZE));
        let mut overflowed = false;
        let mut total = 0usize;

        loop {
            let available = reader.fill_buf().await?;
            if available.is_empty() {
                if buf.is_empty() && !overflowed {
                    return Ok(None);
                }
                break;
            }

            let (chunk_len, found_newline) = available
                .iter()
                .position(|&b| b == b'\n')
                .map_or((available.len(), false), |pos| (pos, true));

            total += chunk_len;
            if !overflowed {
                let remaining = read_limit.saturating_sub(buf.len());
                let copy_len = chunk_len.min(remaining);
                buf.extend_from_slice(&available[..copy_len]);
                overflowed = chunk_len > remaining;
            }

            let consumed = if found_newline { chunk_len + 1 } else { chunk_len };
            reader.consume(consumed);
            if found_newline {
                break;
            }
        }

        if overflowed || buf.len() > self.config.max_message_size {
            return Ok(Some(Line::TooLarge(total)));
        }
        Ok(Some(Line::Complete(buf)))
    }
}

/// One framed inbound line.
enum Line {
    Complete(Vec<u8>),
    TooLarge(usize),
}

impl<R, W> std::fmt::Debug for StdioTransport<R, W> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StdioTransport")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

#[async_trait::async_trait]
impl<R, W> Transport for StdioTransport<R, W>
where
    R: AsyncRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    async fn send_message(&self, message: &Outbound) -> Result<()> {
        let serialized = serde_json::to_string(message)?;
        let mut writer = self.writer.lock().await;
        writer.write_all(serialized.as_bytes()).await?;
        writer.write_all(b"\n").await?;
        writer.flush().await?;
        drop(writer);
        Ok(())
    }

    async fn receive_message(&self) -> Result<Option<Inbound>> {
        loop {
            let Some(line) = self.read_bounded_line().await? else {
                return Ok(None);
            };
            let bytes = match line {
                Line::Complete(bytes) => bytes,
                Line::TooLarge(size) => {
                    let error = TransportError::MessageTooLarge {
                        size,
                        limit: self.config.max_message_size,
                    };
                    tracing::warn!(%error, "skipping inbound line");
                    metrics::record_error("transport");
                    continue;
                }
            };

            let Ok(text) = std::str::from_utf8(&bytes) else {
                tracing::warn!("invalid UTF-8 in inbound line, skipping");
                metrics::record_error("transport");
                continue;
            };
            let trimmed = text.trim();
            if trimmed.is_empty() {
                continue;
            }

            match decode_inbound(trimmed) {
                Ok(inbound) => return Ok(Some(inbound)),
                Err(e) => {
                    tracing::warn!(
                        error = %e,
                        line = %sanitize_for_log(trimmed, 200),
                        "undecodable inbound line, skipping"
                    );
                    metrics::record_error("decode");
                }
            }
        }
    }

    async fn close(&self) -> Result<()> {
        let mut writer = self.writer.lock().await;
        writer.flush().await?;
        writer.shutdown().await?;
        drop(writer);
        Ok(())
    }
}

/// Truncates and replaces control characters in untrusted input before
/// logging.
fn sanitize_for_log(input: &str, max_len: usize) -> String {
    input
        .chars()
        .take(max_len)
        .map(|c| {
            if c.is_control() && c != '\t' {
                '\u{FFFD}'
            } else {
                c
            }
        })
        .collect()
}

/// Reads an environment variable, parsing it to `T`, or returns the default.
fn env_or<T: FromStr>(name: &str, default: T) -> T {
    match std::env::var(name) {
        Ok(v) => v.parse().unwrap_or_else(|_| {
            tracing::warn!(name, value = %v, "invalid env var value, using default");
            default
        }),
        Err(_) => default,
    }
}
