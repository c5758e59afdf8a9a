//! voxmodem-test-harness: Test utilities and mock transports for voxmodem.
//!
//! This crate provides [`MockTransport`] for deterministic unit testing of
//! the AT command engine and the modem driver without a modem attached.

pub mod mock_serial;

pub use mock_serial::MockTransport;
