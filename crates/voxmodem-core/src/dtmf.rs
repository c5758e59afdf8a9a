//! DTMF tone sequences.
//!
//! A [`DtmfSequence`] holds only symbols the modem's `AT+VTS` command
//! accepts: digits `0`-`9`, `*`, `#` and the extended tones `A`-`D`.

use std::fmt;
use std::str::FromStr;

/// An ordered, validated sequence of DTMF tone symbols.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DtmfSequence(Vec<char>);

impl DtmfSequence {
    /// Whether `c` is a tone symbol the modem recognises.
    pub fn is_valid_symbol(c: char) -> bool {
        matches!(c, '0'..='9' | '*' | '#' | 'A'..='D')
    }

    /// The tone symbols in playback order.
    pub fn symbols(&self) -> &[char] {
        &self.0
    }

    /// Number of tones.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Always `false` for a parsed sequence; kept for API symmetry with `len`.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Symbols joined with commas, as the `AT+VTS` parameter list expects.
    pub fn comma_joined(&self) -> String {
        let mut out = String::with_capacity(self.0.len() * 2);
        for (i, c) in self.0.iter().enumerate() {
            if i > 0 {
                out.push(',');
            }
            out.push(*c);
        }
        out
    }
}

impl fmt::Display for DtmfSequence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for c in &self.0 {
            write!(f, "{c}")?;
        }
        Ok(())
    }
}

/// Error returned when a string cannot be parsed into a [`DtmfSequence`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseDtmfError {
    /// The input contained no symbols.
    Empty,
    /// The input contained a symbol the modem cannot play.
    InvalidSymbol {
        /// The offending character.
        symbol: char,
        /// Its character position in the input.
        position: usize,
    },
}

impl fmt::Display for ParseDtmfError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseDtmfError::Empty => write!(f, "empty DTMF sequence"),
            ParseDtmfError::InvalidSymbol { symbol, position } => {
                write!(f, "invalid DTMF symbol {symbol:?} at position {position}")
            }
        }
    }
}

impl std::error::Error for ParseDtmfError {}

impl From<ParseDtmfError> for crate::error::Error {
    fn from(e: ParseDtmfError) -> Self {
        crate::error::Error::InvalidParameter(e.to_string())
    }
}

impl FromStr for DtmfSequence {
    type Err = ParseDtmfError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let mut symbols = Vec::with_capacity(s.len());
        for (position, c) in s.chars().enumerate() {
            let symbol = c.to_ascii_uppercase();
            if !Self::is_valid_symbol(symbol) {
                return Err(ParseDtmfError::InvalidSymbol {
                    symbol: c,
                    position,
                });
            }
            symbols.push(symbol);
        }
        if symbols.is_empty() {
            return Err(ParseDtmfError::Empty);
        }
        Ok(DtmfSequence(symbols))
    }
}
