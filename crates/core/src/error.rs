//! Fatal decode conditions.
//!
//! Running off the end of the stream is not listed here: it is the normal way
//! a session finishes.

use thiserror::Error;

use crate::cursor::BitPattern;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    /// Leading byte matched none of the instruction templates
    #[error("Couldn't parse byte {bits:?}")]
    UnrecognizedEncoding { offset: usize, bits: BitPattern },
    /// Template matched but selected an unmapped mnemonic
    #[error("Couldn't resolve mnemonic for byte {bits:?}")]
    UnresolvedMnemonic { offset: usize, bits: BitPattern },
}

impl DecodeError {
    /// Stream offset of the offending opcode byte
    pub fn offset(&self) -> usize {
        match self {
            DecodeError::UnrecognizedEncoding { offset, .. }
            | DecodeError::UnresolvedMnemonic { offset, .. } => *offset,
        }
    }

    pub fn bits(&self) -> BitPattern {
        match self {
            DecodeError::UnrecognizedEncoding { bits, .. }
            | DecodeError::UnresolvedMnemonic { bits, .. } => *bits,
        }
    }
}
