//! Tests for mod/rm memory operands and displacement handling

use super::{decode_one, text_of};
use crate::instruction::{BaseExpr, MemoryRef, Operand};

#[test]
fn test_base_expressions_without_displacement() {
    assert_eq!(text_of(&[0x8B, 0x00]), "mov AX, [BX + SI]");
    assert_eq!(text_of(&[0x8B, 0x01]), "mov AX, [BX + DI]");
    assert_eq!(text_of(&[0x8B, 0x02]), "mov AX, [BP + SI]");
    assert_eq!(text_of(&[0x8B, 0x03]), "mov AX, [BP + DI]");
    assert_eq!(text_of(&[0x8B, 0x04]), "mov AX, [SI]");
    assert_eq!(text_of(&[0x8B, 0x05]), "mov AX, [DI]");
    assert_eq!(text_of(&[0x8B, 0x07]), "mov AX, [BX]");
}

#[test]
fn test_mod_00_rm_110_reads_no_displacement() {
    // Direct addressing is not resolved: the operand stays [BP]
    let instr = decode_one(&[0x8B, 0x06, 0x90]);
    assert_eq!(instr.len(), 2);
    assert_eq!(instr.text().as_deref(), Some("mov AX, [BP]"));
}

#[test]
fn test_zero_displacement_is_omitted() {
    let instr = decode_one(&[0x89, 0x56, 0x00]);
    assert_eq!(instr.len(), 3);
    assert_eq!(instr.text().as_deref(), Some("mov [BP], DX"));

    let instr = decode_one(&[0x8B, 0x86, 0x00, 0x00]);
    assert_eq!(instr.len(), 4);
    assert_eq!(instr.text().as_deref(), Some("mov AX, [BP]"));
}

#[test]
fn test_displacement_8bit_is_signed() {
    let instr = decode_one(&[0x8B, 0x57, 0xE0]);
    assert_eq!(
        instr.src,
        Some(Operand::Memory(MemoryRef {
            base: BaseExpr::Bx,
            displacement: -32,
        }))
    );
    assert_eq!(instr.text().as_deref(), Some("mov DX, [BX + -32]"));
}

#[test]
fn test_displacement_16bit_little_endian() {
    assert_eq!(text_of(&[0x8A, 0x80, 0x87, 0x13]), "mov AL, [BX + SI + 4999]");
    assert_eq!(text_of(&[0x8B, 0x84, 0xF0, 0xFF]), "mov AX, [SI + -16]");
}
