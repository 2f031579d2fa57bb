//! Transport trait for instrument communication.
//!
//! The [`Transport`] trait abstracts over the physical link to an
//! instrument. Implementations exist for raw TCP sockets (`scpilib-transport`)
//! and mock transports for testing (`scpilib-test-harness`). A VISA or GPIB
//! backend plugs in by implementing the same four methods.
//!
//! The dispatch core in `scpilib-io` operates on a `Transport` rather than a
//! socket, so command framing and response decoding are testable without an
//! instrument on the bench.

use async_trait::async_trait;
use std::time::Duration;

use crate::error::Result;

/// Asynchronous byte-level transport to an instrument.
///
/// Implementations handle buffering and error recovery at the physical
/// layer. Message framing (terminators, binary blocks) is handled by the
/// dispatch core that consumes this trait.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send raw bytes to the instrument.
    ///
    /// Implementations should not return until all bytes have been handed
    /// to the underlying link.
    async fn send(&mut self, data: &[u8]) -> Result<()>;

    /// Receive bytes from the instrument into the provided buffer.
    ///
    /// Returns the number of bytes actually read. Waits up to `timeout`
    /// for data to arrive; returns [`Error::Timeout`](crate::error::Error::Timeout)
    /// if nothing arrives within the deadline.
    async fn receive(&mut self, buf: &mut [u8], timeout: Duration) -> Result<usize>;

    /// Close the transport connection.
    ///
    /// After `close()`, subsequent `send()` and `receive()` calls should
    /// return [`Error::NotConnected`](crate::error::Error::NotConnected).
    async fn close(&mut self) -> Result<()>;

    /// Check whether the transport is currently connected.
    fn is_connected(&self) -> bool;
}
