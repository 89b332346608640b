//! 8086 subset decoder and register simulator.
//!
//! Bytes flow through a [`cursor::ByteCursor`] into the template matcher in
//! [`decoder`], which yields [`instruction::Instruction`] values. A
//! [`session::Session`] renders each one as a listing line and, when
//! simulating, applies it to the [`registers::RegisterBank`] through the
//! [`machine::Machine`].

pub mod cursor;
pub mod decoder;
pub mod error;
pub mod instruction;
pub mod logging;
pub mod machine;
pub mod registers;
pub mod session;

pub use decoder::{disassemble, Decoder};
pub use error::DecodeError;
pub use instruction::{Instruction, Mnemonic, Operand, Register, Width};
pub use registers::RegisterBank;
pub use session::{Listing, Session, SessionConfig, Termination};
