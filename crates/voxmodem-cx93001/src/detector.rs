//! In-band end-of-call detection.
//!
//! While receiving voice the modem reports line events inside the sample
//! stream as a DLE (0x10) byte followed by an event code. Three of them end
//! a recording:
//!
//! | Bytes       | Event                       |
//! |-------------|-----------------------------|
//! | `10 73` (s) | silence detected (`AT+VSD`) |
//! | `10 62` (b) | busy tone                   |
//! | `10 03`     | end of transmission (ETX)   |
//!
//! Detection is a plain substring search over each chunk. It does not
//! decode DLE escaping, so a sample pair that happens to look like a
//! marker also ends the call.

use voxmodem_core::TerminationCause;

/// Data link escape.
pub const DLE: u8 = 0x10;
/// End of text, the code for end of transmission.
pub const ETX: u8 = 0x03;

/// An end-of-call marker found in the voice stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EndMarker {
    /// `DLE s`
    Silence,
    /// `DLE b`
    Busy,
    /// `DLE ETX`
    EndOfTransmission,
}

impl EndMarker {
    /// The marker introduced by `code` after a DLE, if any.
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            b's' => Some(EndMarker::Silence),
            b'b' => Some(EndMarker::Busy),
            ETX => Some(EndMarker::EndOfTransmission),
            _ => None,
        }
    }

    /// The byte following DLE.
    pub fn code(self) -> u8 {
        match self {
            EndMarker::Silence => b's',
            EndMarker::Busy => b'b',
            EndMarker::EndOfTransmission => ETX,
        }
    }

    /// How the call ended.
    pub fn cause(self) -> TerminationCause {
        match self {
            EndMarker::Silence => TerminationCause::SilenceTimeout,
            EndMarker::Busy => TerminationCause::Busy,
            EndMarker::EndOfTransmission => TerminationCause::HangupByPeer,
        }
    }
}

/// First end marker in `data`, if any.
pub fn find_marker(data: &[u8]) -> Option<EndMarker> {
    data.windows(2)
        .find(|w| w[0] == DLE && EndMarker::from_code(w[1]).is_some())
        .and_then(|w| EndMarker::from_code(w[1]))
}

/// Whether `data` contains any end marker.
///
/// # Example
///
/// ```
/// use voxmodem_cx93001::detector::detects_end;
///
/// assert!(detects_end(&[0x80, 0x10, 0x03]));
/// assert!(!detects_end(&[0x80, 0x80, 0x10]));
/// ```
pub fn detects_end(data: &[u8]) -> bool {
    find_marker(data).is_some()
}

/// Chunk-by-chunk marker scanner.
///
/// Without lookback each chunk is scanned on its own, so a marker whose
/// DLE ends one chunk and whose code starts the next is missed. With
/// lookback the scanner remembers a trailing DLE and checks it against
/// the first byte of the following chunk.
#[derive(Debug, Clone, Default)]
pub struct MarkerScanner {
    lookback: bool,
    trailing_dle: bool,
}

impl MarkerScanner {
    /// Create a scanner, optionally joining markers split across chunks.
    pub fn new(lookback: bool) -> Self {
        MarkerScanner {
            lookback,
            trailing_dle: false,
        }
    }

    /// Scan the next chunk of the stream.
    pub fn scan(&mut self, chunk: &[u8]) -> Option<EndMarker> {
        if self.lookback && self.trailing_dle {
            if let Some(marker) = chunk.first().and_then(|&b| EndMarker::from_code(b)) {
                self.trailing_dle = false;
                return Some(marker);
            }
        }
        let found = find_marker(chunk);
        if !chunk.is_empty() {
            self.trailing_dle = chunk.last() == Some(&DLE);
        }
        found
    }
}
