//! Forward-only reader over a loaded instruction stream.

use crate::logging::{log, LogCategory, LogLevel};

/// Bits of one byte, most significant first
pub type BitPattern = [u8; 8];

/// Marker returned when the cursor has run past the last byte
///
/// This is how every session ends normally, so it carries no data and is
/// not an error type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Exhausted;

/// Cursor over an immutable byte stream
#[derive(Debug, Clone)]
pub struct ByteCursor {
    bytes: Vec<u8>,
    position: usize,
}

impl ByteCursor {
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            bytes: bytes.into(),
            position: 0,
        }
    }

    /// Return the byte under the cursor and advance past it
    pub fn next_byte(&mut self) -> Result<u8, Exhausted> {
        let byte = *self.bytes.get(self.position).ok_or(Exhausted)?;
        log(LogCategory::Bytes, LogLevel::Trace, || {
            format!("{:04X}: 0x{:02X} 0b{:08b}", self.position, byte, byte)
        });
        self.position += 1;
        Ok(byte)
    }

    /// Read two bytes as a little-endian word
    pub fn next_word(&mut self) -> Result<u16, Exhausted> {
        let low = self.next_byte()? as u16;
        let high = self.next_byte()? as u16;
        Ok((high << 8) | low)
    }

    pub fn position(&self) -> usize {
        self.position
    }

    pub fn is_exhausted(&self) -> bool {
        self.position >= self.bytes.len()
    }

    /// Bytes consumed in `start..position`
    pub fn consumed_since(&self, start: usize) -> &[u8] {
        &self.bytes[start.min(self.position)..self.position]
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Split a byte into its bits, most significant first
pub fn to_bits(byte: u8) -> BitPattern {
    let mut bits = [0u8; 8];
    for (i, bit) in bits.iter_mut().enumerate() {
        *bit = (byte >> (7 - i)) & 1;
    }
    bits
}
