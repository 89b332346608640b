//! Template-driven decoder for the supported 8086 subset
//!
//! The opcode byte is matched against fixed bit templates in priority order:
//!
//! | Template       | Family                                   |
//! |----------------|------------------------------------------|
//! | `0111 jjjj`    | conditional jump                         |
//! | `1110 00oo`    | loopnz / loopz / loop / jcxz             |
//! | `00aa a10w`    | add/adc/sub/cmp accumulator, immediate   |
//! | `1000 00sw`    | add/adc/sub/cmp r/m, immediate           |
//! | `00aa a0dw`    | add/sub/cmp r/m with register            |
//! | `1000 10dw`    | mov r/m to/from register                 |
//! | `1011 wrrr`    | mov immediate to register                |
//!
//! Anything else is an unrecognized encoding and halts decoding for good.
//! Running out of bytes, even halfway through an instruction, ends decoding
//! cleanly instead.

use crate::cursor::{to_bits, ByteCursor, Exhausted};
use crate::error::DecodeError;
use crate::instruction::{ArithOp, BaseExpr, Instruction, MemoryRef, Mnemonic, Operand, Register, Width};
use crate::logging::{log, LogCategory, LogLevel};

#[cfg(test)]
mod tests;

/// Why a single decode attempt stopped
enum Halt {
    Exhausted,
    Failed(DecodeError),
}

impl From<Exhausted> for Halt {
    fn from(_: Exhausted) -> Self {
        Halt::Exhausted
    }
}

impl From<DecodeError> for Halt {
    fn from(err: DecodeError) -> Self {
        Halt::Failed(err)
    }
}

/// Decoder over one byte stream
///
/// Iterating yields decoded instructions until the stream is exhausted
/// (`None`) or an encoding fails to match (`Some(Err(..))`, after which the
/// iterator is fused).
#[derive(Debug, Clone)]
pub struct Decoder {
    cursor: ByteCursor,
    halted: bool,
}

impl Decoder {
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            cursor: ByteCursor::new(bytes),
            halted: false,
        }
    }

    pub fn position(&self) -> usize {
        self.cursor.position()
    }

    pub fn is_halted(&self) -> bool {
        self.halted
    }

    /// Decode the instruction at the cursor
    ///
    /// `Ok(None)` means the stream ran out, which is the normal end.
    pub fn decode_next(&mut self) -> Result<Option<Instruction>, DecodeError> {
        if self.halted {
            return Ok(None);
        }
        match self.decode() {
            Ok(instr) => {
                log(LogCategory::Decode, LogLevel::Trace, || {
                    format!(
                        "{:04X}: {:02X?} -> {}",
                        instr.offset,
                        instr.bytes,
                        instr.text().unwrap_or_else(|| "<unresolved>".to_string())
                    )
                });
                Ok(Some(instr))
            }
            Err(Halt::Exhausted) => {
                self.halted = true;
                log(LogCategory::Decode, LogLevel::Debug, || {
                    format!("end of stream at offset {:04X}", self.cursor.position())
                });
                Ok(None)
            }
            Err(Halt::Failed(err)) => {
                self.halted = true;
                log(LogCategory::Decode, LogLevel::Error, || {
                    format!("{:04X}: {}", err.offset(), err)
                });
                Err(err)
            }
        }
    }

    fn decode(&mut self) -> Result<Instruction, Halt> {
        let offset = self.cursor.position();
        let opcode = self.cursor.next_byte()?;

        let (mnemonic, dst, src, width) = match opcode {
            // 0111 jjjj: conditional jump
            op if op & 0xF0 == 0x70 => {
                let rel = self.cursor.next_byte()?;
                (Mnemonic::conditional_jump(op), Operand::Relative(rel), None, Width::Byte)
            }
            // 1110 00oo: loop family
            op if op & 0xFC == 0xE0 => {
                let rel = self.cursor.next_byte()?;
                (Some(Mnemonic::loop_family(op)), Operand::Relative(rel), None, Width::Byte)
            }
            // 00aa a10w: immediate to accumulator
            op if op & 0xC6 == 0x04 => {
                let width = Width::from_w_bit(op);
                let arith = ArithOp::from_immediate_code(op >> 3);
                let imm = self.immediate(width)?;
                (
                    Some(Mnemonic::Arith(arith)),
                    Operand::Register(Register::from_index(0, width)),
                    Some(Operand::Immediate(imm)),
                    width,
                )
            }
            // 1000 00sw: immediate to register/memory
            op if op & 0xFC == 0x80 => {
                let width = Width::from_w_bit(op);
                let sign_extend = (op >> 1) & 1 == 1;
                let modrm = self.cursor.next_byte()?;
                let arith = ArithOp::from_immediate_code(modrm >> 2);
                let (modbits, _, rm) = decode_modrm(modrm);
                let dst = self.register_or_memory(modbits, rm, width)?;
                let imm = self.sign_extended_immediate(width, sign_extend)?;
                (Some(Mnemonic::Arith(arith)), dst, Some(Operand::Immediate(imm)), width)
            }
            // 00aa a0dw: register/memory with register
            op if op & 0xC4 == 0x00 => {
                let arith = ArithOp::from_register_code(op >> 3);
                let (dst, src, width) = self.register_with_modrm(op)?;
                (Some(Mnemonic::Arith(arith)), dst, Some(src), width)
            }
            // 1000 10dw: mov register/memory to/from register
            op if op & 0xFC == 0x88 => {
                let (dst, src, width) = self.register_with_modrm(op)?;
                (Some(Mnemonic::Mov), dst, Some(src), width)
            }
            // 1011 wrrr: mov immediate to register
            op if op & 0xF0 == 0xB0 => {
                let width = Width::from_w_bit(op >> 3);
                let reg = Register::from_index(op, width);
                let imm = self.immediate(width)?;
                (Some(Mnemonic::Mov), Operand::Register(reg), Some(Operand::Immediate(imm)), width)
            }
            op => {
                return Err(Halt::Failed(DecodeError::UnrecognizedEncoding {
                    offset,
                    bits: to_bits(op),
                }))
            }
        };

        Ok(Instruction {
            offset,
            mnemonic,
            dst,
            src,
            width,
            bytes: self.cursor.consumed_since(offset).to_vec(),
        })
    }

    /// Shared `d`/`w` + mod/rm handling; returns (dst, src, width)
    fn register_with_modrm(&mut self, op: u8) -> Result<(Operand, Operand, Width), Exhausted> {
        let width = Width::from_w_bit(op);
        let reg_is_dst = (op >> 1) & 1 == 1;
        let modrm = self.cursor.next_byte()?;
        let (modbits, reg, rm) = decode_modrm(modrm);
        let reg = Operand::Register(Register::from_index(reg, width));
        let rm = self.register_or_memory(modbits, rm, width)?;
        if reg_is_dst {
            Ok((reg, rm, width))
        } else {
            Ok((rm, reg, width))
        }
    }

    /// Resolve `mod`/`rm` to an operand, reading any displacement bytes
    fn register_or_memory(&mut self, modbits: u8, rm: u8, width: Width) -> Result<Operand, Exhausted> {
        let displacement = match modbits {
            0b11 => return Ok(Operand::Register(Register::from_index(rm, width))),
            // rm=110 would be a direct address here; it stays a plain [BP]
            0b00 => 0,
            0b01 => self.cursor.next_byte()? as i8 as i16,
            _ => self.cursor.next_word()? as i16,
        };
        Ok(Operand::Memory(MemoryRef {
            base: BaseExpr::from_rm(rm),
            displacement,
        }))
    }

    /// Immediate whose size follows `w` alone
    fn immediate(&mut self, width: Width) -> Result<i16, Exhausted> {
        match width {
            Width::Byte => Ok(self.cursor.next_byte()? as i8 as i16),
            Width::Word => Ok(self.cursor.next_word()? as i16),
        }
    }

    /// Immediate that is a single sign-extended byte unless `w=1, s=0`
    fn sign_extended_immediate(&mut self, width: Width, sign_extend: bool) -> Result<i16, Exhausted> {
        if width == Width::Word && !sign_extend {
            Ok(self.cursor.next_word()? as i16)
        } else {
            Ok(self.cursor.next_byte()? as i8 as i16)
        }
    }
}

impl Iterator for Decoder {
    type Item = Result<Instruction, DecodeError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.decode_next().transpose()
    }
}

/// Split a ModR/M byte into (mod, reg, rm)
#[inline]
pub fn decode_modrm(modrm: u8) -> (u8, u8, u8) {
    let modbits = (modrm >> 6) & 0x03; // Bits 7-6
    let reg = (modrm >> 3) & 0x07; // Bits 5-3
    let rm = modrm & 0x07; // Bits 2-0
    (modbits, reg, rm)
}

/// Decode a whole stream into listing lines, stopping at the first failure
pub fn disassemble(bytes: &[u8]) -> Result<Vec<String>, DecodeError> {
    let mut lines = Vec::new();
    for instr in Decoder::new(bytes) {
        let instr = instr?;
        let text = instr.text().ok_or(DecodeError::UnresolvedMnemonic {
            offset: instr.offset,
            bits: to_bits(instr.opcode()),
        })?;
        lines.push(text);
    }
    Ok(lines)
}
