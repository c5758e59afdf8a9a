//! Transport implementations for voxmodem.
//!
//! This crate provides [`SerialTransport`], the concrete implementation of
//! the [`Transport`](voxmodem_core::Transport) trait from `voxmodem-core`
//! for USB CDC-ACM and RS-232 modems.

pub mod serial;

pub use serial::{
    DataBits, FlowControl, Parity, SerialConfig, SerialTransport, StopBits, DEFAULT_BAUD_RATE,
};
