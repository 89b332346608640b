//! Register bank and flag word of the simulated CPU
//!
//! AX..DX are stored as words; their byte halves are views onto those words,
//! so a write through either view is visible through the other.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::instruction::Register;

// Flag bit positions in the FLAGS word
pub const FLAG_CF: u16 = 0x0001; // Carry Flag
pub const FLAG_PF: u16 = 0x0004; // Parity Flag
pub const FLAG_AF: u16 = 0x0010; // Auxiliary Carry Flag
pub const FLAG_ZF: u16 = 0x0040; // Zero Flag
pub const FLAG_SF: u16 = 0x0080; // Sign Flag
pub const FLAG_OF: u16 = 0x0800; // Overflow Flag

/// Flags in dump order, with their display names
const FLAG_NAMES: [(&str, u16); 6] = [
    ("CF", FLAG_CF),
    ("AF", FLAG_AF),
    ("SF", FLAG_SF),
    ("ZF", FLAG_ZF),
    ("PF", FLAG_PF),
    ("OF", FLAG_OF),
];

/// Zero-initialized register state for one simulation run
///
/// Only CF and ZF are ever written by the machine; AF, SF, PF and OF are
/// carried in the word but have no update rule.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterBank {
    pub ax: u16,
    pub bx: u16,
    pub cx: u16,
    pub dx: u16,
    pub sp: u16,
    pub bp: u16,
    pub si: u16,
    pub di: u16,
    pub flags: u16,
}

impl RegisterBank {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reset every register and flag to zero
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Read a register; byte registers come back zero-extended
    pub fn get(&self, reg: Register) -> u16 {
        match reg {
            Register::Al => self.ax & 0xFF,
            Register::Cl => self.cx & 0xFF,
            Register::Dl => self.dx & 0xFF,
            Register::Bl => self.bx & 0xFF,
            Register::Ah => self.ax >> 8,
            Register::Ch => self.cx >> 8,
            Register::Dh => self.dx >> 8,
            Register::Bh => self.bx >> 8,
            Register::Ax => self.ax,
            Register::Cx => self.cx,
            Register::Dx => self.dx,
            Register::Bx => self.bx,
            Register::Sp => self.sp,
            Register::Bp => self.bp,
            Register::Si => self.si,
            Register::Di => self.di,
        }
    }

    /// Write a register; byte registers keep only the low 8 bits of `val`
    pub fn set(&mut self, reg: Register, val: u16) {
        let low = val & 0xFF;
        match reg {
            Register::Al => self.ax = (self.ax & 0xFF00) | low,
            Register::Cl => self.cx = (self.cx & 0xFF00) | low,
            Register::Dl => self.dx = (self.dx & 0xFF00) | low,
            Register::Bl => self.bx = (self.bx & 0xFF00) | low,
            Register::Ah => self.ax = (self.ax & 0x00FF) | (low << 8),
            Register::Ch => self.cx = (self.cx & 0x00FF) | (low << 8),
            Register::Dh => self.dx = (self.dx & 0x00FF) | (low << 8),
            Register::Bh => self.bx = (self.bx & 0x00FF) | (low << 8),
            Register::Ax => self.ax = val,
            Register::Cx => self.cx = val,
            Register::Dx => self.dx = val,
            Register::Bx => self.bx = val,
            Register::Sp => self.sp = val,
            Register::Bp => self.bp = val,
            Register::Si => self.si = val,
            Register::Di => self.di = val,
        }
    }

    #[inline]
    pub fn set_flag(&mut self, flag: u16, value: bool) {
        if value {
            self.flags |= flag;
        } else {
            self.flags &= !flag;
        }
    }

    #[inline]
    pub fn get_flag(&self, flag: u16) -> bool {
        (self.flags & flag) != 0
    }
}

fn set_or_unset(value: bool) -> &'static str {
    if value {
        "set"
    } else {
        "unset"
    }
}

impl fmt::Display for RegisterBank {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Registers(")?;
        for reg in [
            Register::Ax,
            Register::Bx,
            Register::Cx,
            Register::Dx,
            Register::Sp,
            Register::Bp,
            Register::Si,
            Register::Di,
        ] {
            writeln!(f, "    {} = 0x{:04X},", reg, self.get(reg))?;
        }
        writeln!(f, ")")?;
        writeln!(f)?;
        writeln!(f, "Flags(")?;
        for (name, flag) in FLAG_NAMES {
            writeln!(f, "    {} = {}", name, set_or_unset(self.get_flag(flag)))?;
        }
        write!(f, ")")
    }
}
