//! Decoded instruction model shared by the text emitter and the register machine.

use std::fmt;

use serde::{Deserialize, Serialize};

/// General purpose register, 8-bit halves and 16-bit words
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Register {
    Al,
    Cl,
    Dl,
    Bl,
    Ah,
    Ch,
    Dh,
    Bh,
    Ax,
    Cx,
    Dx,
    Bx,
    Sp,
    Bp,
    Si,
    Di,
}

impl Register {
    const BYTE_TABLE: [Register; 8] = [
        Register::Al,
        Register::Cl,
        Register::Dl,
        Register::Bl,
        Register::Ah,
        Register::Ch,
        Register::Dh,
        Register::Bh,
    ];

    const WORD_TABLE: [Register; 8] = [
        Register::Ax,
        Register::Cx,
        Register::Dx,
        Register::Bx,
        Register::Sp,
        Register::Bp,
        Register::Si,
        Register::Di,
    ];

    /// Look up a 3-bit register field; only the low three bits of `index` are used
    pub fn from_index(index: u8, width: Width) -> Self {
        let index = (index & 0b111) as usize;
        match width {
            Width::Byte => Self::BYTE_TABLE[index],
            Width::Word => Self::WORD_TABLE[index],
        }
    }

    pub fn width(self) -> Width {
        match self {
            Register::Al
            | Register::Cl
            | Register::Dl
            | Register::Bl
            | Register::Ah
            | Register::Ch
            | Register::Dh
            | Register::Bh => Width::Byte,
            _ => Width::Word,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Register::Al => "AL",
            Register::Cl => "CL",
            Register::Dl => "DL",
            Register::Bl => "BL",
            Register::Ah => "AH",
            Register::Ch => "CH",
            Register::Dh => "DH",
            Register::Bh => "BH",
            Register::Ax => "AX",
            Register::Cx => "CX",
            Register::Dx => "DX",
            Register::Bx => "BX",
            Register::Sp => "SP",
            Register::Bp => "BP",
            Register::Si => "SI",
            Register::Di => "DI",
        }
    }
}

impl fmt::Display for Register {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Operand width selected by the `w` bit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Width {
    Byte,
    Word,
}

impl Width {
    pub fn from_w_bit(w: u8) -> Self {
        if w & 1 == 1 {
            Width::Word
        } else {
            Width::Byte
        }
    }

    /// Size in bytes (1 or 2)
    pub fn bytes(self) -> u8 {
        match self {
            Width::Byte => 1,
            Width::Word => 2,
        }
    }
}

/// Base expression of a memory operand, indexed by the `rm` field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BaseExpr {
    BxSi,
    BxDi,
    BpSi,
    BpDi,
    Si,
    Di,
    Bp,
    Bx,
}

impl BaseExpr {
    pub fn from_rm(rm: u8) -> Self {
        match rm & 0b111 {
            0b000 => BaseExpr::BxSi,
            0b001 => BaseExpr::BxDi,
            0b010 => BaseExpr::BpSi,
            0b011 => BaseExpr::BpDi,
            0b100 => BaseExpr::Si,
            0b101 => BaseExpr::Di,
            0b110 => BaseExpr::Bp,
            _ => BaseExpr::Bx,
        }
    }

    fn text(self) -> &'static str {
        match self {
            BaseExpr::BxSi => "BX + SI",
            BaseExpr::BxDi => "BX + DI",
            BaseExpr::BpSi => "BP + SI",
            BaseExpr::BpDi => "BP + DI",
            BaseExpr::Si => "SI",
            BaseExpr::Di => "DI",
            BaseExpr::Bp => "BP",
            BaseExpr::Bx => "BX",
        }
    }
}

/// Memory reference: base expression plus signed displacement
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryRef {
    pub base: BaseExpr,
    pub displacement: i16,
}

impl fmt::Display for MemoryRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.displacement == 0 {
            write!(f, "[{}]", self.base.text())
        } else {
            write!(f, "[{} + {}]", self.base.text(), self.displacement)
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operand {
    Register(Register),
    Memory(MemoryRef),
    /// Immediate, already sign-extended to 16 bits
    Immediate(i16),
    /// Raw jump/loop offset byte
    Relative(u8),
}

impl Operand {
    pub fn as_register(&self) -> Option<Register> {
        match self {
            Operand::Register(reg) => Some(*reg),
            _ => None,
        }
    }
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operand::Register(reg) => write!(f, "{}", reg),
            Operand::Memory(mem) => write!(f, "{}", mem),
            Operand::Immediate(value) => write!(f, "{}", value),
            // The offset is shown as its raw byte, sign not applied
            Operand::Relative(offset) => write!(f, "0x{:02X}", offset),
        }
    }
}

/// Arithmetic family shared by the accumulator, mod/rm and immediate forms
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArithOp {
    Add,
    Adc,
    Sub,
    Cmp,
}

impl ArithOp {
    /// Selector decode for the immediate forms; unknown codes fall back to add
    pub fn from_immediate_code(code: u8) -> Self {
        match code & 0b111 {
            0b010 => ArithOp::Adc,
            0b101 => ArithOp::Sub,
            0b111 => ArithOp::Cmp,
            _ => ArithOp::Add,
        }
    }

    /// Selector decode for the reg/mem form; adc is never produced here
    pub fn from_register_code(code: u8) -> Self {
        match code & 0b111 {
            0b101 => ArithOp::Sub,
            0b111 => ArithOp::Cmp,
            _ => ArithOp::Add,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mnemonic {
    Mov,
    Arith(ArithOp),
    Jo,
    Jno,
    Jb,
    Jnb,
    Jl,
    Jne,
    Jbe,
    Jnbe,
    Js,
    Jns,
    Jp,
    Jnp,
    Jle,
    Jnl,
    Jnle,
    Loopnz,
    Loopz,
    Loop,
    Jcxz,
}

impl Mnemonic {
    /// Conditional jump for the low nibble of a `0111 jjjj` opcode
    ///
    /// Nibble 0b1110 has no entry and yields `None`.
    pub fn conditional_jump(code: u8) -> Option<Self> {
        let mnemonic = match code & 0x0F {
            0b0000 => Mnemonic::Jo,
            0b0001 => Mnemonic::Jno,
            0b0010 => Mnemonic::Jb,
            0b0011 => Mnemonic::Jnb,
            0b0100 => Mnemonic::Jl,
            0b0101 => Mnemonic::Jne,
            0b0110 => Mnemonic::Jbe,
            0b0111 => Mnemonic::Jnbe,
            0b1000 => Mnemonic::Js,
            0b1001 => Mnemonic::Jns,
            0b1010 => Mnemonic::Jp,
            0b1011 => Mnemonic::Jnp,
            0b1100 => Mnemonic::Jle,
            0b1101 => Mnemonic::Jnl,
            0b1111 => Mnemonic::Jnle,
            _ => return None,
        };
        Some(mnemonic)
    }

    pub fn loop_family(code: u8) -> Self {
        match code & 0b11 {
            0b00 => Mnemonic::Loopnz,
            0b01 => Mnemonic::Loopz,
            0b10 => Mnemonic::Loop,
            _ => Mnemonic::Jcxz,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Mnemonic::Mov => "mov",
            Mnemonic::Arith(ArithOp::Add) => "add",
            Mnemonic::Arith(ArithOp::Adc) => "adc",
            Mnemonic::Arith(ArithOp::Sub) => "sub",
            Mnemonic::Arith(ArithOp::Cmp) => "cmp",
            Mnemonic::Jo => "jo",
            Mnemonic::Jno => "jno",
            Mnemonic::Jb => "jb",
            Mnemonic::Jnb => "jnb",
            Mnemonic::Jl => "jl",
            Mnemonic::Jne => "jne",
            Mnemonic::Jbe => "jbe",
            Mnemonic::Jnbe => "jnbe",
            Mnemonic::Js => "js",
            Mnemonic::Jns => "jns",
            Mnemonic::Jp => "jp",
            Mnemonic::Jnp => "jnp",
            Mnemonic::Jle => "jle",
            Mnemonic::Jnl => "jnl",
            Mnemonic::Jnle => "jnle",
            Mnemonic::Loopnz => "loopnz",
            Mnemonic::Loopz => "loopz",
            Mnemonic::Loop => "loop",
            Mnemonic::Jcxz => "jcxz",
        }
    }
}

impl fmt::Display for Mnemonic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One decoded instruction
///
/// Jumps and loops carry their offset in `dst` and have no `src`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Instruction {
    /// Stream offset of the opcode byte
    pub offset: usize,
    /// `None` when the opcode selects an unmapped table entry
    pub mnemonic: Option<Mnemonic>,
    pub dst: Operand,
    pub src: Option<Operand>,
    pub width: Width,
    /// Raw bytes consumed, opcode first
    pub bytes: Vec<u8>,
}

impl Instruction {
    pub fn opcode(&self) -> u8 {
        self.bytes.first().copied().unwrap_or_default()
    }

    /// Number of bytes consumed from the stream
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Assembly text, or `None` if the mnemonic never resolved
    pub fn text(&self) -> Option<String> {
        let mnemonic = self.mnemonic?;
        Some(match &self.src {
            Some(src) => format!("{} {}, {}", mnemonic, self.dst, src),
            None => format!("{} {}", mnemonic, self.dst),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_table_is_total() {
        for index in 0..8u8 {
            assert_eq!(Register::from_index(index, Width::Byte).width(), Width::Byte);
            assert_eq!(Register::from_index(index, Width::Word).width(), Width::Word);
        }
        assert_eq!(Register::from_index(0b100, Width::Byte), Register::Ah);
        assert_eq!(Register::from_index(0b100, Width::Word), Register::Sp);
        assert_eq!(Register::from_index(0b111, Width::Byte), Register::Bh);
        assert_eq!(Register::from_index(0b111, Width::Word), Register::Di);
    }

    #[test]
    fn test_register_index_ignores_high_bits() {
        assert_eq!(Register::from_index(0b1000_0011, Width::Word), Register::Bx);
    }

    #[test]
    fn test_memory_ref_omits_zero_displacement() {
        let mem = MemoryRef {
            base: BaseExpr::BxSi,
            displacement: 0,
        };
        assert_eq!(mem.to_string(), "[BX + SI]");
    }

    #[test]
    fn test_memory_ref_renders_signed_displacement() {
        let mem = MemoryRef {
            base: BaseExpr::Bp,
            displacement: 4,
        };
        assert_eq!(mem.to_string(), "[BP + 4]");

        let mem = MemoryRef {
            base: BaseExpr::Di,
            displacement: -37,
        };
        assert_eq!(mem.to_string(), "[DI + -37]");
    }

    #[test]
    fn test_relative_operand_is_raw_hex() {
        assert_eq!(Operand::Relative(0xFC).to_string(), "0xFC");
        assert_eq!(Operand::Relative(0x02).to_string(), "0x02");
    }

    #[test]
    fn test_selector_defaults_differ_between_tables() {
        assert_eq!(ArithOp::from_immediate_code(0b010), ArithOp::Adc);
        assert_eq!(ArithOp::from_register_code(0b010), ArithOp::Add);
        assert_eq!(ArithOp::from_immediate_code(0b001), ArithOp::Add);
        assert_eq!(ArithOp::from_register_code(0b101), ArithOp::Sub);
        assert_eq!(ArithOp::from_register_code(0b111), ArithOp::Cmp);
    }

    #[test]
    fn test_unmapped_jump_nibble() {
        assert_eq!(Mnemonic::conditional_jump(0x7E), None);
        assert_eq!(Mnemonic::conditional_jump(0x75), Some(Mnemonic::Jne));
        assert_eq!(Mnemonic::conditional_jump(0x7F), Some(Mnemonic::Jnle));
    }

    #[test]
    fn test_text_without_mnemonic() {
        let instr = Instruction {
            offset: 0,
            mnemonic: None,
            dst: Operand::Relative(0x05),
            src: None,
            width: Width::Byte,
            bytes: vec![0x7E, 0x05],
        };
        assert_eq!(instr.text(), None);
    }
}
