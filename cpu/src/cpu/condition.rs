//! # Conditional execution
//!
//! Every ARM instruction carries a condition in bits 31-28. The core checks it
//! against the CPSR flags before running the handler: a failing condition turns
//! the instruction into a one cycle no-op.
//!
//! ```text
//! ┌──────┬────┬──────────────────────────┬──────────────────┐
//! │ Code │    │ Meaning                  │ Flags            │
//! ├──────┼────┼──────────────────────────┼──────────────────┤
//! │ 0000 │ EQ │ equal                    │ Z=1              │
//! │ 0001 │ NE │ not equal                │ Z=0              │
//! │ 0010 │ CS │ unsigned higher or same  │ C=1              │
//! │ 0011 │ CC │ unsigned lower           │ C=0              │
//! │ 0100 │ MI │ negative                 │ N=1              │
//! │ 0101 │ PL │ positive or zero         │ N=0              │
//! │ 0110 │ VS │ overflow                 │ V=1              │
//! │ 0111 │ VC │ no overflow              │ V=0              │
//! │ 1000 │ HI │ unsigned higher          │ C=1 and Z=0      │
//! │ 1001 │ LS │ unsigned lower or same   │ C=0 or Z=1       │
//! │ 1010 │ GE │ signed greater or equal  │ N=V              │
//! │ 1011 │ LT │ signed less than         │ N!=V             │
//! │ 1100 │ GT │ signed greater than      │ Z=0 and N=V      │
//! │ 1101 │ LE │ signed less or equal     │ Z=1 or N!=V      │
//! │ 1110 │ AL │ always                   │ -                │
//! │ 1111 │ NV │ reserved, never executes │ -                │
//! └──────┴────┴──────────────────────────┴──────────────────┘
//! ```
//!
//! In Thumb state only the conditional branch (format 16) has a condition
//! field, everything else behaves as `AL`.
//!
//! The evaluation itself lives in [`Psr::can_execute`](super::psr::Psr::can_execute).

use serde::{Deserialize, Serialize};

#[derive(Debug, Eq, PartialEq, Copy, Clone, Serialize, Deserialize)]
pub enum Condition {
    /// Equal (Z=1)
    EQ = 0x0,

    /// Not equal (Z=0)
    NE = 0x1,

    /// Carry set, also known as HS (C=1)
    CS = 0x2,

    /// Carry clear, also known as LO (C=0)
    CC = 0x3,

    /// Negative (N=1)
    MI = 0x4,

    /// Positive or zero (N=0)
    PL = 0x5,

    /// Overflow (V=1)
    VS = 0x6,

    /// No overflow (V=0)
    VC = 0x7,

    /// Unsigned higher (C=1 AND Z=0)
    HI = 0x8,

    /// Unsigned lower or same (C=0 OR Z=1)
    LS = 0x9,

    /// Signed greater or equal (N=V)
    GE = 0xA,

    /// Signed less than (N!=V)
    LT = 0xB,

    /// Signed greater than (Z=0 AND N=V)
    GT = 0xC,

    /// Signed less than or equal (Z=1 OR N!=V)
    LE = 0xD,

    /// Always
    AL = 0xE,

    /// Reserved on ARMv4, the instruction is skipped.
    NV = 0xF,
}

impl From<u8> for Condition {
    /// Only the low nibble is looked at.
    fn from(item: u8) -> Self {
        match item & 0xF {
            0x0 => Self::EQ,
            0x1 => Self::NE,
            0x2 => Self::CS,
            0x3 => Self::CC,
            0x4 => Self::MI,
            0x5 => Self::PL,
            0x6 => Self::VS,
            0x7 => Self::VC,
            0x8 => Self::HI,
            0x9 => Self::LS,
            0xA => Self::GE,
            0xB => Self::LT,
            0xC => Self::GT,
            0xD => Self::LE,
            0xE => Self::AL,
            _ => Self::NV,
        }
    }
}

impl From<u32> for Condition {
    /// Extracts the condition of an ARM opcode (bits 31-28).
    fn from(op_code: u32) -> Self {
        Self::from((op_code >> 28) as u8)
    }
}

impl std::fmt::Display for Condition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EQ => f.write_str("EQ"),
            Self::NE => f.write_str("NE"),
            Self::CS => f.write_str("CS"),
            Self::CC => f.write_str("CC"),
            Self::MI => f.write_str("MI"),
            Self::PL => f.write_str("PL"),
            Self::VS => f.write_str("VS"),
            Self::VC => f.write_str("VC"),
            Self::HI => f.write_str("HI"),
            Self::LS => f.write_str("LS"),
            Self::GE => f.write_str("GE"),
            Self::LT => f.write_str("LT"),
            Self::GT => f.write_str("GT"),
            Self::LE => f.write_str("LE"),
            Self::AL => Ok(()),
            Self::NV => f.write_str("NV"),
        }
    }
}
