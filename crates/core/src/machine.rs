//! Register/flag machine
//!
//! Applies decoded instructions to a [`RegisterBank`]. Only register
//! destinations are executed; memory operands and control flow are decoded
//! and listed but leave the state alone.

use crate::instruction::{ArithOp, Instruction, Mnemonic, Operand, Register, Width};
use crate::logging::{log, LogCategory, LogLevel};
use crate::registers::{RegisterBank, FLAG_CF, FLAG_ZF};

/// Why an instruction was left unexecuted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Jumps and loops are listed but never taken
    ControlFlow,
    /// An operand refers to memory
    MemoryOperand,
    /// Mnemonic never resolved
    Unresolved,
}

/// Effect of executing one instruction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecOutcome {
    Moved { dst: Register, value: u16 },
    Arithmetic { dst: Register, carry: bool, zero: bool },
    Skipped(SkipReason),
}

impl ExecOutcome {
    /// Flag annotation appended to the listing line, if any
    pub fn annotation(&self) -> Option<String> {
        match self {
            ExecOutcome::Arithmetic { carry, zero, .. } => Some(format!(
                " | CF {} | ZF {}",
                if *carry { "set" } else { "unset" },
                if *zero { "set" } else { "unset" }
            )),
            _ => None,
        }
    }
}

fn width_mask(width: Width) -> u16 {
    match width {
        Width::Byte => 0x00FF,
        Width::Word => 0xFFFF,
    }
}

/// Simulated CPU state plus the execution rules for the supported subset
#[derive(Debug, Clone, Default)]
pub struct Machine {
    registers: RegisterBank,
    executed: u64,
}

impl Machine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_registers(registers: RegisterBank) -> Self {
        Self {
            registers,
            executed: 0,
        }
    }

    pub fn registers(&self) -> &RegisterBank {
        &self.registers
    }

    pub fn registers_mut(&mut self) -> &mut RegisterBank {
        &mut self.registers
    }

    /// Number of instructions that changed state
    pub fn executed(&self) -> u64 {
        self.executed
    }

    pub fn reset(&mut self) {
        self.registers.reset();
        self.executed = 0;
    }

    /// Execute one decoded instruction
    pub fn execute(&mut self, instr: &Instruction) -> ExecOutcome {
        let outcome = self.apply(instr);
        match outcome {
            ExecOutcome::Skipped(reason) => {
                log(LogCategory::Exec, LogLevel::Debug, || {
                    format!("{:04X}: skipped ({:?})", instr.offset, reason)
                });
            }
            _ => {
                self.executed += 1;
                log(LogCategory::Exec, LogLevel::Trace, || {
                    format!("{:04X}: {:?}", instr.offset, outcome)
                });
            }
        }
        outcome
    }

    fn apply(&mut self, instr: &Instruction) -> ExecOutcome {
        let Some(mnemonic) = instr.mnemonic else {
            return ExecOutcome::Skipped(SkipReason::Unresolved);
        };
        let op = match mnemonic {
            Mnemonic::Mov => None,
            Mnemonic::Arith(op) => Some(op),
            _ => return ExecOutcome::Skipped(SkipReason::ControlFlow),
        };
        let (Some(dst), Some(src)) = (instr.dst.as_register(), self.source_value(instr.src)) else {
            return ExecOutcome::Skipped(SkipReason::MemoryOperand);
        };

        let mask = width_mask(dst.width());
        let src = src & mask;
        match op {
            None => {
                self.registers.set(dst, src);
                ExecOutcome::Moved { dst, value: src }
            }
            Some(op) => {
                let carry = self.arithmetic(op, dst, src, mask);
                let zero = self.registers.get(dst) == 0;
                self.registers.set_flag(FLAG_CF, carry);
                self.registers.set_flag(FLAG_ZF, zero);
                ExecOutcome::Arithmetic { dst, carry, zero }
            }
        }
    }

    /// Apply an arithmetic op to `dst` and return the new carry flag
    ///
    /// Carry follows the listing's rule rather than true unsigned overflow:
    /// add/adc compare the source with the result, sub/cmp compare it with
    /// the destination before the operation. adc ignores the incoming carry.
    fn arithmetic(&mut self, op: ArithOp, dst: Register, src: u16, mask: u16) -> bool {
        let before = self.registers.get(dst);
        match op {
            ArithOp::Add | ArithOp::Adc => {
                let result = before.wrapping_add(src) & mask;
                self.registers.set(dst, result);
                src < result
            }
            ArithOp::Sub => {
                let result = before.wrapping_sub(src) & mask;
                self.registers.set(dst, result);
                src < before
            }
            ArithOp::Cmp => src < before,
        }
    }

    fn source_value(&self, src: Option<Operand>) -> Option<u16> {
        match src? {
            Operand::Register(reg) => Some(self.registers.get(reg)),
            Operand::Immediate(value) => Some(value as u16),
            Operand::Memory(_) | Operand::Relative(_) => None,
        }
    }
}
