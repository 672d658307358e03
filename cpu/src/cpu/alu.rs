//! # Barrel shifter and adder
//!
//! Pure functions shared by the ARM and Thumb handlers. Nothing in here touches
//! the CPU state: callers decide whether the flags are committed.
//!
//! The shifter has two personalities. When the amount comes from the
//! instruction a 5-bit zero encodes a special case:
//!
//! ```text
//! LSL #0  -> operand unchanged, C unchanged
//! LSR #0  -> LSR #32: result 0, C = bit 31
//! ASR #0  -> ASR #32: result all sign bits, C = bit 31
//! ROR #0  -> RRX: (C << 31) | (Rm >> 1), C = bit 0
//! ```
//!
//! When the amount is the bottom byte of a register, zero really means no
//! shift and amounts of 32 or more are meaningful.

use crate::bitwise::Bits;
use crate::cpu::flags::ShiftKind;

/// Outcome of an ALU or shifter operation.
///
/// `sign`/`zero` are only filled by the adder. Shifter results carry just
/// `result` and `carry`.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ArithmeticOpResult {
    pub result: u32,
    pub carry: bool,
    pub overflow: bool,
    pub sign: bool,
    pub zero: bool,
}

/// Shift with the amount taken from the instruction (0-31).
#[must_use]
pub fn shift_by_immediate(kind: ShiftKind, amount: u32, rm: u32, carry: bool) -> ArithmeticOpResult {
    let amount = amount & 0x1F;
    match (kind, amount) {
        (ShiftKind::Lsl, 0) => ArithmeticOpResult {
            result: rm,
            carry,
            ..Default::default()
        },
        (ShiftKind::Lsr | ShiftKind::Asr, 0) => shift_by_register(kind, 32, rm, carry),
        (ShiftKind::Ror, 0) => ArithmeticOpResult {
            result: (u32::from(carry) << 31) | (rm >> 1),
            carry: rm.get_bit(0),
            ..Default::default()
        },
        _ => shift_by_register(kind, amount, rm, carry),
    }
}

/// Shift with the amount taken from the bottom byte of a register.
#[must_use]
pub fn shift_by_register(kind: ShiftKind, amount: u32, rm: u32, carry: bool) -> ArithmeticOpResult {
    let amount = amount & 0xFF;
    if amount == 0 {
        return ArithmeticOpResult {
            result: rm,
            carry,
            ..Default::default()
        };
    }

    let (result, carry) = match kind {
        ShiftKind::Lsl => match amount {
            1..=31 => (rm << amount, rm.get_bit((32 - amount) as u8)),
            32 => (0, rm.get_bit(0)),
            _ => (0, false),
        },
        ShiftKind::Lsr => match amount {
            1..=31 => (rm >> amount, rm.get_bit((amount - 1) as u8)),
            32 => (0, rm.get_bit(31)),
            _ => (0, false),
        },
        ShiftKind::Asr => match amount {
            1..=31 => (
                ((rm as i32) >> amount) as u32,
                rm.get_bit((amount - 1) as u8),
            ),
            _ => (((rm as i32) >> 31) as u32, rm.get_bit(31)),
        },
        ShiftKind::Ror => match amount % 32 {
            0 => (rm, rm.get_bit(31)),
            rotation => (rm.rotate_right(rotation), rm.get_bit((rotation - 1) as u8)),
        },
    };

    ArithmeticOpResult {
        result,
        carry,
        ..Default::default()
    }
}

/// `first_op + second_op + carry_in` with all four flags.
#[must_use]
pub fn add_with_carry(first_op: u32, second_op: u32, carry_in: bool) -> ArithmeticOpResult {
    let wide = u64::from(first_op) + u64::from(second_op) + u64::from(carry_in);
    let result = wide as u32;

    // Signed overflow happens when both operands have the same sign and the
    // result's sign is different.
    let overflow = (!(first_op ^ second_op) & (first_op ^ result)).get_bit(31);

    ArithmeticOpResult {
        result,
        carry: wide > u64::from(u32::MAX),
        overflow,
        sign: result.get_bit(31),
        zero: result == 0,
    }
}

#[must_use]
pub fn add_inner_op(first_op: u32, second_op: u32) -> ArithmeticOpResult {
    add_with_carry(first_op, second_op, false)
}

/// `first_op - second_op`. Carry is set when no borrow happened.
#[must_use]
pub fn sub_inner_op(first_op: u32, second_op: u32) -> ArithmeticOpResult {
    add_with_carry(first_op, !second_op, true)
}

/// `first_op - second_op - !carry_in`.
#[must_use]
pub fn sub_with_carry(first_op: u32, second_op: u32, carry_in: bool) -> ArithmeticOpResult {
    add_with_carry(first_op, !second_op, carry_in)
}
