//! Mock transport for deterministic testing of the AT engine and modem driver.
//!
//! [`MockTransport`] implements the [`Transport`] trait with two scripted
//! data sources:
//!
//! - **exchanges** ([`expect`](MockTransport::expect)): when the code under
//!   test sends exactly `request`, the following receives return `response`
//!   (typically the echoed command plus a result line);
//! - **inbound segments** ([`push_inbound`](MockTransport::push_inbound)):
//!   unsolicited data such as `RING` lines or voice samples, delivered in
//!   order once no exchange response is pending.
//!
//! When nothing is available, `receive()` sleeps for the requested timeout
//! and then returns [`Error::Timeout`], like a real serial port. Tests that
//! hit this path should run with a paused clock
//! (`#[tokio::test(start_paused = true)]`).
//!
//! # Example
//!
//! ```
//! use voxmodem_test_harness::MockTransport;
//!
//! let mut mock = MockTransport::new();
//! mock.expect(b"ATA\r", b"ATA\r\r\nOK\r\n");
//! mock.push_inbound(b"RING\r\n");
//! ```

use async_trait::async_trait;
use std::collections::VecDeque;
use std::time::Duration;

use voxmodem_core::error::{Error, Result};
use voxmodem_core::transport::Transport;

/// A pre-loaded request/response pair for the mock transport.
#[derive(Debug, Clone)]
struct Expectation {
    /// The exact bytes we expect to be sent.
    request: Vec<u8>,
    /// The bytes to return once the matching request is received.
    response: Vec<u8>,
}

/// A mock [`Transport`] for testing without a modem attached.
///
/// Expectations are consumed in order. A `send()` that does not match the
/// next expectation, or arrives with none left, fails with
/// [`Error::Protocol`].
#[derive(Debug)]
pub struct MockTransport {
    /// Ordered queue of expected request/response pairs.
    expectations: VecDeque<Expectation>,
    /// Unsolicited data, one segment per `receive()` at most.
    inbound: VecDeque<Vec<u8>>,
    /// The response data pending for the next `receive()` call.
    pending_response: Option<Vec<u8>>,
    /// Cursor into the pending response.
    response_cursor: usize,
    /// Whether the transport is "connected".
    connected: bool,
    /// Log of all bytes sent through this transport.
    sent_log: Vec<Vec<u8>>,
}

impl MockTransport {
    /// Create a new mock transport in the connected state.
    pub fn new() -> Self {
        MockTransport {
            expectations: VecDeque::new(),
            inbound: VecDeque::new(),
            pending_response: None,
            response_cursor: 0,
            connected: true,
            sent_log: Vec::new(),
        }
    }

    /// Add an expected request/response pair.
    ///
    /// When `send()` is called with data matching `request`, subsequent
    /// `receive()` calls return `response` before any inbound segment.
    pub fn expect(&mut self, request: &[u8], response: &[u8]) {
        self.expectations.push_back(Expectation {
            request: request.to_vec(),
            response: response.to_vec(),
        });
    }

    /// Expect the AT command `cmd` and answer with its echo and `result`.
    ///
    /// Shorthand for `expect(b"cmd\r", b"cmd\r\r\nresult\r\n")`.
    pub fn expect_at(&mut self, cmd: &str, result: &str) {
        let request = format!("{cmd}\r");
        let response = format!("{cmd}\r\r\n{result}\r\n");
        self.expect(request.as_bytes(), response.as_bytes());
    }

    /// Expect a raw write that the modem does not answer (voice samples).
    pub fn expect_write(&mut self, data: &[u8]) {
        self.expect(data, b"");
    }

    /// Queue unsolicited inbound data.
    ///
    /// Each segment is delivered by its own `receive()` call (split further
    /// if the caller's buffer is smaller), which lets tests control exactly
    /// how data is chunked on the wire.
    pub fn push_inbound(&mut self, data: &[u8]) {
        self.inbound.push_back(data.to_vec());
    }

    /// Return all data that has been sent through this transport.
    ///
    /// Each element is the byte slice from one `send()` call.
    pub fn sent_data(&self) -> &[Vec<u8>] {
        &self.sent_log
    }

    /// Count how many `send()` calls carried exactly `data`.
    pub fn sent_count(&self, data: &[u8]) -> usize {
        self.sent_log.iter().filter(|d| d.as_slice() == data).count()
    }

    /// Return the number of expectations that have not yet been consumed.
    pub fn remaining_expectations(&self) -> usize {
        self.expectations.len()
    }

    /// Return the number of inbound segments not yet delivered.
    pub fn remaining_inbound(&self) -> usize {
        self.inbound.len()
    }

    /// Set the connected state of the mock transport.
    ///
    /// When set to `false`, subsequent `send()` and `receive()` calls will
    /// return [`Error::NotConnected`].
    pub fn set_connected(&mut self, connected: bool) {
        self.connected = connected;
    }
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn send(&mut self, data: &[u8]) -> Result<()> {
        if !self.connected {
            return Err(Error::NotConnected);
        }

        self.sent_log.push(data.to_vec());

        if let Some(expectation) = self.expectations.pop_front() {
            if data != expectation.request.as_slice() {
                return Err(Error::Protocol(format!(
                    "unexpected send data: expected {:?}, got {:?}",
                    String::from_utf8_lossy(&expectation.request),
                    String::from_utf8_lossy(data)
                )));
            }
            if !expectation.response.is_empty() {
                self.pending_response = Some(expectation.response);
                self.response_cursor = 0;
            }
            Ok(())
        } else {
            Err(Error::Protocol(
                "no more expectations in mock transport".into(),
            ))
        }
    }

    async fn receive(&mut self, buf: &mut [u8], timeout: Duration) -> Result<usize> {
        if !self.connected {
            return Err(Error::NotConnected);
        }

        if let Some(ref response) = self.pending_response {
            let remaining = &response[self.response_cursor..];
            let n = remaining.len().min(buf.len());
            buf[..n].copy_from_slice(&remaining[..n]);
            self.response_cursor += n;
            if self.response_cursor >= response.len() {
                self.pending_response = None;
                self.response_cursor = 0;
            }
            return Ok(n);
        }

        if let Some(mut segment) = self.inbound.pop_front() {
            let n = segment.len().min(buf.len());
            buf[..n].copy_from_slice(&segment[..n]);
            if n < segment.len() {
                segment.drain(..n);
                self.inbound.push_front(segment);
            }
            return Ok(n);
        }

        tokio::time::sleep(timeout).await;
        Err(Error::Timeout)
    }

    async fn close(&mut self) -> Result<()> {
        self.connected = false;
        self.pending_response = None;
        self.response_cursor = 0;
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn mock_transport_basic_exchange() {
        let mut mock = MockTransport::new();
        mock.expect_at("ATE1", "OK");

        mock.send(b"ATE1\r").await.unwrap();

        let mut buf = [0u8; 64];
        let n = mock
            .receive(&mut buf, Duration::from_millis(100))
            .await
            .unwrap();
        assert_eq!(&buf[..n], b"ATE1\r\r\nOK\r\n");
    }

    #[tokio::test]
    async fn mock_transport_tracks_sent_data() {
        let mut mock = MockTransport::new();
        mock.expect_at("AT", "OK");
        mock.expect_write(&[0x80; 4]);

        mock.send(b"AT\r").await.unwrap();
        mock.send(&[0x80; 4]).await.unwrap();

        assert_eq!(mock.sent_data().len(), 2);
        assert_eq!(mock.sent_data()[0], b"AT\r");
        assert_eq!(mock.sent_count(&[0x80; 4]), 1);
    }

    #[tokio::test]
    async fn mock_transport_wrong_data_errors() {
        let mut mock = MockTransport::new();
        mock.expect_at("ATA", "OK");

        let result = mock.send(b"ATH\r").await;
        assert!(matches!(result.unwrap_err(), Error::Protocol(_)));
    }

    #[tokio::test]
    async fn mock_transport_no_expectations_errors() {
        let mut mock = MockTransport::new();
        let result = mock.send(b"AT\r").await;
        assert!(matches!(result.unwrap_err(), Error::Protocol(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn mock_transport_receive_without_data_times_out_after_deadline() {
        let mut mock = MockTransport::new();
        let mut buf = [0u8; 64];

        let start = tokio::time::Instant::now();
        let result = mock.receive(&mut buf, Duration::from_secs(3)).await;
        assert!(matches!(result.unwrap_err(), Error::Timeout));
        assert!(start.elapsed() >= Duration::from_secs(3));
    }

    #[tokio::test]
    async fn mock_transport_response_before_inbound() {
        let mut mock = MockTransport::new();
        mock.push_inbound(&[0x7F; 3]);
        mock.expect_at("AT+VRX", "CONNECT");

        mock.send(b"AT+VRX\r").await.unwrap();

        let mut buf = [0u8; 64];
        let n = mock.receive(&mut buf, Duration::from_millis(10)).await.unwrap();
        assert_eq!(&buf[..n], b"AT+VRX\r\r\nCONNECT\r\n");
        let n = mock.receive(&mut buf, Duration::from_millis(10)).await.unwrap();
        assert_eq!(&buf[..n], &[0x7F; 3]);
        assert_eq!(mock.remaining_inbound(), 0);
    }

    #[tokio::test]
    async fn mock_transport_splits_large_inbound_segment() {
        let mut mock = MockTransport::new();
        mock.push_inbound(&[1, 2, 3, 4, 5]);

        let mut buf = [0u8; 2];
        let n = mock.receive(&mut buf, Duration::from_millis(10)).await.unwrap();
        assert_eq!(&buf[..n], &[1, 2]);
        let n = mock.receive(&mut buf, Duration::from_millis(10)).await.unwrap();
        assert_eq!(&buf[..n], &[3, 4]);
        let n = mock.receive(&mut buf, Duration::from_millis(10)).await.unwrap();
        assert_eq!(&buf[..n], &[5]);
    }

    #[tokio::test]
    async fn mock_transport_disconnect() {
        let mut mock = MockTransport::new();
        assert!(mock.is_connected());

        mock.close().await.unwrap();
        assert!(!mock.is_connected());

        let result = mock.send(b"AT\r").await;
        assert!(matches!(result.unwrap_err(), Error::NotConnected));
        let mut buf = [0u8; 8];
        let result = mock.receive(&mut buf, Duration::from_millis(10)).await;
        assert!(matches!(result.unwrap_err(), Error::NotConnected));
    }

    #[tokio::test]
    async fn mock_transport_remaining_expectations() {
        let mut mock = MockTransport::new();
        mock.expect_at("AT", "OK");
        mock.expect_at("ATI1", "OK");
        assert_eq!(mock.remaining_expectations(), 2);

        mock.send(b"AT\r").await.unwrap();
        assert_eq!(mock.remaining_expectations(), 1);
    }
}
