//! Transport trait for modem communication.
//!
//! The [`Transport`] trait abstracts over the physical link to a modem.
//! The serial implementation lives in `voxmodem-transport`; a scripted
//! mock lives in `voxmodem-test-harness`.
//!
//! The AT command channel and the audio bridge both operate on a
//! `Transport` rather than directly on a serial port. Line splitting and
//! fixed-size chunk reads are layered on top by `voxmodem-at`.

use async_trait::async_trait;
use std::time::Duration;

use crate::error::Result;

/// Asynchronous byte-level transport to a modem.
///
/// The link carries both the line-oriented AT control channel and raw
/// voice samples, with nothing but the modem's current mode to tell them
/// apart. Implementations must not reorder or drop bytes.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send raw bytes to the modem.
    ///
    /// Implementations should block until all bytes have been written to
    /// the underlying transport.
    async fn send(&mut self, data: &[u8]) -> Result<()>;

    /// Receive bytes from the modem into the provided buffer.
    ///
    /// Returns the number of bytes actually read. Will wait up to `timeout`
    /// for data to arrive; returns [`Error::Timeout`](crate::error::Error::Timeout)
    /// if nothing is received within the deadline.
    async fn receive(&mut self, buf: &mut [u8], timeout: Duration) -> Result<usize>;

    /// Close the transport connection.
    ///
    /// After calling `close()`, subsequent `send()` and `receive()` calls
    /// should return [`Error::NotConnected`](crate::error::Error::NotConnected).
    async fn close(&mut self) -> Result<()>;

    /// Check whether the transport is currently connected.
    fn is_connected(&self) -> bool;
}
