//! Decoding session: one pass over one binary
//!
//! A [`Session`] owns the decoder and, when simulating, the machine. Each
//! [`Session::step`] decodes one instruction, renders its listing line and
//! executes it before the next byte is read.

use serde_json::{json, Value};

use crate::cursor::to_bits;
use crate::decoder::Decoder;
use crate::error::DecodeError;
use crate::instruction::Instruction;
use crate::machine::{ExecOutcome, Machine};
use crate::registers::RegisterBank;

/// Header line of every listing
pub const LISTING_HEADER: &str = "bits 16";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionConfig {
    /// Execute instructions and annotate flag changes
    pub simulate: bool,
    /// Emit each consumed byte ahead of its instruction line
    pub show_bytes: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            simulate: true,
            show_bytes: false,
        }
    }
}

/// How a session ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Termination {
    /// Every byte was consumed (or the last instruction ran out of bytes)
    Exhausted,
    /// Decoding stopped on a fatal encoding
    Failed(DecodeError),
}

impl Termination {
    pub fn is_success(&self) -> bool {
        matches!(self, Termination::Exhausted)
    }
}

/// Result of one decode/execute step
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Step {
    pub instruction: Instruction,
    /// Listing lines for this instruction (byte dump first, if enabled)
    pub lines: Vec<String>,
    pub outcome: Option<ExecOutcome>,
}

/// Full output of a finished session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Listing {
    pub lines: Vec<String>,
    pub termination: Termination,
}

impl Listing {
    /// Listing text: header, one line per instruction, and the failure report
    /// if decoding stopped early
    pub fn render(&self) -> String {
        let mut out = String::from(LISTING_HEADER);
        out.push('\n');
        for line in &self.lines {
            out.push_str(line);
            out.push('\n');
        }
        if let Termination::Failed(err) = &self.termination {
            out.push_str(&err.to_string());
            out.push('\n');
        }
        out
    }
}

pub struct Session {
    decoder: Decoder,
    machine: Machine,
    config: SessionConfig,
    decoded: u64,
    termination: Option<Termination>,
}

impl Session {
    pub fn new(bytes: impl Into<Vec<u8>>, config: SessionConfig) -> Self {
        Self {
            decoder: Decoder::new(bytes),
            machine: Machine::new(),
            config,
            decoded: 0,
            termination: None,
        }
    }

    pub fn config(&self) -> SessionConfig {
        self.config
    }

    pub fn registers(&self) -> &RegisterBank {
        self.machine.registers()
    }

    /// Instructions decoded and emitted so far
    pub fn decoded(&self) -> u64 {
        self.decoded
    }

    /// `None` until the session has ended
    pub fn termination(&self) -> Option<&Termination> {
        self.termination.as_ref()
    }

    /// Decode, render and (optionally) execute the next instruction
    ///
    /// Returns `Ok(None)` once the stream is exhausted. An error ends the
    /// session; later calls return `Ok(None)`.
    pub fn step(&mut self) -> Result<Option<Step>, DecodeError> {
        if self.termination.is_some() {
            return Ok(None);
        }
        let instruction = match self.decoder.decode_next() {
            Ok(Some(instruction)) => instruction,
            Ok(None) => {
                self.termination = Some(Termination::Exhausted);
                return Ok(None);
            }
            Err(err) => {
                self.termination = Some(Termination::Failed(err.clone()));
                return Err(err);
            }
        };

        let Some(mut text) = instruction.text() else {
            let err = DecodeError::UnresolvedMnemonic {
                offset: instruction.offset,
                bits: to_bits(instruction.opcode()),
            };
            self.termination = Some(Termination::Failed(err.clone()));
            return Err(err);
        };

        let outcome = self
            .config
            .simulate
            .then(|| self.machine.execute(&instruction));
        if let Some(annotation) = outcome.as_ref().and_then(ExecOutcome::annotation) {
            text.push_str(&annotation);
        }

        let mut lines = Vec::new();
        if self.config.show_bytes {
            lines.extend(
                instruction
                    .bytes
                    .iter()
                    .map(|byte| format!("; 0x{:02X} 0b{:08b}", byte, byte)),
            );
        }
        lines.push(text);
        self.decoded += 1;

        Ok(Some(Step {
            instruction,
            lines,
            outcome,
        }))
    }

    /// Run to the end of the stream or the first fatal encoding
    pub fn run(&mut self) -> Listing {
        let mut lines = Vec::new();
        loop {
            match self.step() {
                Ok(Some(step)) => lines.extend(step.lines),
                Ok(None) | Err(_) => break,
            }
        }
        Listing {
            lines,
            termination: self
                .termination
                .clone()
                .unwrap_or(Termination::Exhausted),
        }
    }

    /// JSON snapshot of the session for debugging
    pub fn save_state(&self) -> Value {
        let termination = match &self.termination {
            None => Value::Null,
            Some(Termination::Exhausted) => json!("exhausted"),
            Some(Termination::Failed(err)) => json!({
                "error": err.to_string(),
                "offset": err.offset(),
            }),
        };
        json!({
            "version": 1,
            "registers": self.machine.registers(),
            "instructions": self.decoded,
            "executed": self.machine.executed(),
            "position": self.decoder.position(),
            "termination": termination,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instruction::Register;
    use crate::registers::FLAG_ZF;

    #[test]
    fn test_mov_scenario() {
        let mut session = Session::new(vec![0xB0, 0x05], SessionConfig::default());
        let listing = session.run();
        assert_eq!(listing.lines, vec!["mov AL, 5".to_string()]);
        assert!(listing.termination.is_success());
        assert_eq!(session.registers().get(Register::Al), 5);
        assert!(!session.registers().get_flag(FLAG_ZF));
    }

    #[test]
    fn test_cmp_scenario_annotates_flags() {
        let mut session = Session::new(vec![0x3C, 0x00], SessionConfig::default());
        let listing = session.run();
        assert_eq!(listing.lines, vec!["cmp AL, 0 | CF unset | ZF set".to_string()]);
        assert!(session.registers().get_flag(FLAG_ZF));
    }

    #[test]
    fn test_without_simulation_no_annotations() {
        let config = SessionConfig {
            simulate: false,
            show_bytes: false,
        };
        let mut session = Session::new(vec![0x3C, 0x00], config);
        let listing = session.run();
        assert_eq!(listing.lines, vec!["cmp AL, 0".to_string()]);
        assert_eq!(session.registers(), &RegisterBank::new());
    }

    #[test]
    fn test_show_bytes_precedes_instruction() {
        let config = SessionConfig {
            simulate: false,
            show_bytes: true,
        };
        let mut session = Session::new(vec![0xB0, 0x05], config);
        let listing = session.run();
        assert_eq!(
            listing.lines,
            vec![
                "; 0xB0 0b10110000".to_string(),
                "; 0x05 0b00000101".to_string(),
                "mov AL, 5".to_string()
            ]
        );
    }

    #[test]
    fn test_step_after_end_returns_none() {
        let mut session = Session::new(vec![0xB0, 0x05], SessionConfig::default());
        assert!(session.step().unwrap().is_some());
        assert!(session.step().unwrap().is_none());
        assert!(session.step().unwrap().is_none());
        assert_eq!(session.termination(), Some(&Termination::Exhausted));
        assert_eq!(session.decoded(), 1);
    }

    #[test]
    fn test_failure_keeps_prior_state() {
        let mut session = Session::new(vec![0xB0, 0x05, 0x0F, 0xB0, 0x09], SessionConfig::default());
        let listing = session.run();
        assert_eq!(listing.lines.len(), 1);
        assert!(matches!(
            listing.termination,
            Termination::Failed(DecodeError::UnrecognizedEncoding { offset: 2, .. })
        ));
        assert_eq!(session.registers().get(Register::Al), 5);
        assert!(listing
            .render()
            .ends_with("mov AL, 5\nCouldn't parse byte [0, 0, 0, 0, 1, 1, 1, 1]\n"));
    }

    #[test]
    fn test_unmapped_jump_fails_on_emit() {
        let mut session = Session::new(vec![0x7E, 0x05], SessionConfig::default());
        let err = session.step().unwrap_err();
        assert!(matches!(err, DecodeError::UnresolvedMnemonic { offset: 0, .. }));
        assert!(session.step().unwrap().is_none());
    }

    #[test]
    fn test_truncated_instruction_ends_cleanly() {
        let mut session = Session::new(vec![0x89], SessionConfig::default());
        let listing = session.run();
        assert!(listing.lines.is_empty());
        assert_eq!(listing.termination, Termination::Exhausted);
        assert_eq!(listing.render(), "bits 16\n");
    }

    #[test]
    fn test_save_state() {
        let mut session = Session::new(vec![0xB8, 0x01, 0x00], SessionConfig::default());
        session.run();
        let state = session.save_state();
        assert_eq!(state["version"], 1);
        assert_eq!(state["registers"]["ax"], 1);
        assert_eq!(state["instructions"], 1);
        assert_eq!(state["position"], 3);
        assert_eq!(state["termination"], "exhausted");
    }
}
