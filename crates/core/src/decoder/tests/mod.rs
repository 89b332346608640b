//! Tests for the instruction decoder
//!
//! Split by template family:
//! - `tests_mov`: register/memory and immediate moves
//! - `tests_arith`: add/adc/sub/cmp in all three encodings
//! - `tests_jumps`: conditional jumps and the loop family
//! - `tests_addressing`: mod/rm memory operands and displacements
//! - `tests_termination`: end of stream and unrecognized encodings

mod tests_addressing;

use crate::decoder::Decoder;
use crate::instruction::Instruction;

/// Decode exactly one instruction from `bytes`
fn decode_one(bytes: &[u8]) -> Instruction {
    Decoder::new(bytes)
        .decode_next()
        .expect("decode failed")
        .expect("stream exhausted")
}

/// Text of the single instruction in `bytes`
fn text_of(bytes: &[u8]) -> String {
    decode_one(bytes).text().expect("unresolved mnemonic")
}
