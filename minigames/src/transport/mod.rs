//! Transport abstraction layer.
//!
//! Provides the [`Transport`] trait the host uses to talk to the platform
//! adapter, and the NDJSON stdio implementation.

pub mod stdio;
pub mod wire;

pub use stdio::{StdioConfig, StdioTransport};
pub use wire::{Command, Inbound, Outbound, decode_inbound};

use crate::error::TransportError;

/// Result type alias for transport operations.
pub type Result<T> = std::result::Result<T, TransportError>;

/// Default maximum inbound line size in bytes (1 MB).
pub const DEFAULT_MAX_MESSAGE_SIZE: usize = 1024 * 1024;

/// Default buffer size for the stdio transport (64 KB).
pub const DEFAULT_STDIO_BUFFER_SIZE: usize = 64 * 1024;

/// Async transport for wire messages.
///
/// Uses `&self` with interior mutability so one transport can be shared by
/// the reader task and the outbound writer task.
#[async_trait::async_trait]
pub trait Transport: Send + Sync {
    /// Sends one outbound message with framing.
    async fn send_message(&self, message: &Outbound) -> Result<()>;

    /// Receives the next inbound message.
    ///
    /// Returns `Ok(None)` on EOF. Malformed lines are logged and skipped,
    /// never surfaced as errors.
    async fn receive_message(&self) -> Result<Option<Inbound>>;

    /// Flushes and closes the outbound side.
    async fn close(&self) -> Result<()> {
        Ok(())
    }
}
