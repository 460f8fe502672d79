//! Helpers for `\0`-separated text bodies and pin addressing

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Separator between fields of a text body
pub const BODY_SEPARATOR: char = '\0';

/// Split a body into at most two parts; the second keeps any further separators
pub fn split2(body: &str) -> Vec<&str> {
    body.splitn(2, BODY_SEPARATOR).collect()
}

/// Split a body into at most three parts; the third keeps any further separators
pub fn split3(body: &str) -> Vec<&str> {
    body.splitn(3, BODY_SEPARATOR).collect()
}

/// Errors from strict pin parsing
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PinParseError {
    #[error("Pin field is empty")]
    Empty,

    #[error("Pin must be decimal digits only: {0:?}")]
    NotDecimal(String),

    #[error("Pin out of range 0-255: {0}")]
    OutOfRange(String),
}

/// Parse a pin number: decimal digits only, no sign or whitespace, 0-255
pub fn parse_pin(field: &str) -> Result<u8, PinParseError> {
    if field.is_empty() {
        return Err(PinParseError::Empty);
    }
    if !field.bytes().all(|b| b.is_ascii_digit()) {
        return Err(PinParseError::NotDecimal(field.to_string()));
    }
    field
        .parse::<u8>()
        .map_err(|_| PinParseError::OutOfRange(field.to_string()))
}

/// Kind of pin a widget or command addresses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PinType {
    Digital,
    Analog,
    Virtual,
}

impl PinType {
    /// Single-character form used on the wire
    pub fn as_char(self) -> char {
        match self {
            PinType::Digital => 'd',
            PinType::Analog => 'a',
            PinType::Virtual => 'v',
        }
    }
}

impl fmt::Display for PinType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_char())
    }
}
