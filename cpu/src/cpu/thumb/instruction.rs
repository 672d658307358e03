//! # Thumb instruction classification
//!
//! Thumb opcodes are classified from bits 15-6, a 10-bit key. Register
//! numbers and most immediates live below bit 6, the few that reach into the
//! key (like `Rd` of format 3) are still read from the opcode at execution
//! time.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │  Format 1:  000 xx          Move shifted register           │
//! │  Format 2:  00011           Add/subtract                    │
//! │  Format 3:  001 xx          Move/compare/add/subtract imm   │
//! │  Format 4:  010000          ALU operations                  │
//! │  Format 5:  010001          Hi register operations / BX     │
//! │  Format 6:  01001           PC-relative load                │
//! │  Format 7:  0101 xx0        Load/store with register offset │
//! │  Format 8:  0101 xx1        Load/store sign-extended        │
//! │  Format 9:  011 xx          Load/store with immediate offset│
//! │  Format 10: 1000 x          Load/store halfword             │
//! │  Format 11: 1001 x          SP-relative load/store          │
//! │  Format 12: 1010 x          Load address                    │
//! │  Format 13: 10110000        Add offset to stack pointer     │
//! │  Format 14: 1011 x10x       Push/pop registers              │
//! │  Format 15: 1100 x          Multiple load/store             │
//! │  Format 16: 1101 xxxx       Conditional branch              │
//! │  Format 17: 11011111        Software interrupt              │
//! │  Format 18: 11100           Unconditional branch            │
//! │  Format 19: 1111 x          Long branch with link           │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! `10111110` is the breakpoint. Everything else (`1101 1110`, `11101`, the
//! unused `1011` patterns) is undefined.
//!
//! ## Long Branch (BL)
//!
//! BL spans ±4MB and takes two 16-bit instructions, each executed on its own:
//!
//! ```text
//! First:  1111 0xxx xxxx xxxx  ; LR = PC + (offset_hi << 12)
//! Second: 1111 1xxx xxxx xxxx  ; PC = LR + (offset_lo << 1), LR = next | 1
//! ```

use serde::{Deserialize, Serialize};

use crate::bitwise::Bits;
use crate::cpu::condition::Condition;
use crate::cpu::flags::{LoadStoreKind, OperandKind, ReadWriteKind, ShiftKind};
use crate::cpu::thumb::alu_instructions::{
    ThumbHighRegisterOperation, ThumbImmediateOperation, ThumbModeAluInstruction,
};

/// Number of entries in the Thumb decode table.
pub const THUMB_KEY_COUNT: usize = 1024;

/// Builds the decode key of an opcode: bits 15-6.
#[must_use]
pub const fn thumb_key(op_code: u16) -> usize {
    (op_code >> 6) as usize
}

/// A Thumb instruction with every field that is fixed by its decode key.
#[derive(Debug, PartialEq, Eq, Copy, Clone, Serialize, Deserialize)]
pub enum ThumbInstruction {
    MoveShiftedRegister {
        shift_operation: ShiftKind,
    },
    AddSubtract {
        operand_kind: OperandKind,
        subtract: bool,
    },
    MoveCompareAddSubtractImm {
        operation: ThumbImmediateOperation,
    },
    AluOp {
        alu_operation: ThumbModeAluInstruction,
    },
    HiRegisterOpBx {
        register_operation: ThumbHighRegisterOperation,
    },
    PcRelativeLoad,
    LoadStoreRegisterOffset {
        load_store: LoadStoreKind,
        byte_word: ReadWriteKind,
    },
    LoadStoreSignExtByteHalfword {
        h: bool,
        sign_extend: bool,
    },
    LoadStoreImmOffset {
        load_store: LoadStoreKind,
        byte_word: ReadWriteKind,
    },
    LoadStoreHalfword {
        load_store: LoadStoreKind,
    },
    SpRelativeLoadStore {
        load_store: LoadStoreKind,
    },
    LoadAddress {
        sp: bool,
    },
    AddOffsetSp {
        negative: bool,
    },
    PushPopReg {
        load_store: LoadStoreKind,
        pc_lr: bool,
    },
    MultipleLoadStore {
        load_store: LoadStoreKind,
    },
    CondBranch {
        condition: Condition,
    },
    SoftwareInterrupt,
    UncondBranch,
    LongBranchLink {
        high: bool,
    },
    Breakpoint,
    Undefined,
}

impl ThumbInstruction {
    /// Classifies a decode key (see [`thumb_key`]).
    #[must_use]
    pub fn from_key(key: usize) -> Self {
        debug_assert!(key < THUMB_KEY_COUNT, "Thumb key out of range: {key:#X}");
        let key = key as u16;

        // Opcode bit `n`, only 15-6 are part of the key.
        let bit = |n: u8| -> bool {
            debug_assert!(n >= 6, "bit {n} is not part of the Thumb decode key");
            key.get_bit(n - 6)
        };
        // Opcode bits `lo..=hi` shifted down.
        let bits = |lo: u8, hi: u8| -> u16 { key.get_bits((lo - 6)..=(hi - 6)) };

        match bits(13, 15) {
            0b000 if bits(11, 12) == 0b11 => Self::AddSubtract {
                operand_kind: bit(10).into(),
                subtract: bit(9),
            },
            0b000 => Self::MoveShiftedRegister {
                shift_operation: bits(11, 12).into(),
            },
            0b001 => Self::MoveCompareAddSubtractImm {
                operation: bits(11, 12).into(),
            },
            0b010 => match bits(10, 12) {
                0b000 => Self::AluOp {
                    alu_operation: bits(6, 9).into(),
                },
                0b001 => Self::HiRegisterOpBx {
                    register_operation: bits(8, 9).into(),
                },
                0b010 | 0b011 => Self::PcRelativeLoad,
                _ if !bit(9) => Self::LoadStoreRegisterOffset {
                    load_store: bit(11).into(),
                    byte_word: bit(10).into(),
                },
                _ => Self::LoadStoreSignExtByteHalfword {
                    h: bit(11),
                    sign_extend: bit(10),
                },
            },
            0b011 => Self::LoadStoreImmOffset {
                load_store: bit(11).into(),
                byte_word: bit(12).into(),
            },
            0b100 if !bit(12) => Self::LoadStoreHalfword {
                load_store: bit(11).into(),
            },
            0b100 => Self::SpRelativeLoadStore {
                load_store: bit(11).into(),
            },
            0b101 if !bit(12) => Self::LoadAddress { sp: bit(11) },
            0b101 => match bits(8, 11) {
                0b0000 => Self::AddOffsetSp { negative: bit(7) },
                0b0100 | 0b0101 | 0b1100 | 0b1101 => Self::PushPopReg {
                    load_store: bit(11).into(),
                    pc_lr: bit(8),
                },
                0b1110 => Self::Breakpoint,
                _ => Self::Undefined,
            },
            0b110 if !bit(12) => Self::MultipleLoadStore {
                load_store: bit(11).into(),
            },
            0b110 => match bits(8, 11) {
                0b1111 => Self::SoftwareInterrupt,
                0b1110 => Self::Undefined,
                condition => Self::CondBranch {
                    condition: Condition::from(condition as u8),
                },
            },
            _ if !bit(12) => {
                if bit(11) {
                    Self::Undefined
                } else {
                    Self::UncondBranch
                }
            }
            _ => Self::LongBranchLink { high: bit(11) },
        }
    }

    /// Name of the instruction format, used in traces.
    #[must_use]
    pub const fn family(&self) -> &'static str {
        match self {
            Self::MoveShiftedRegister { .. } => "move_shifted_register",
            Self::AddSubtract { .. } => "add_subtract",
            Self::MoveCompareAddSubtractImm { .. } => "move_compare_add_subtract_imm",
            Self::AluOp { .. } => "alu_op",
            Self::HiRegisterOpBx { .. } => "hi_register_op_bx",
            Self::PcRelativeLoad => "pc_relative_load",
            Self::LoadStoreRegisterOffset { .. } => "load_store_register_offset",
            Self::LoadStoreSignExtByteHalfword { .. } => "load_store_sign_ext_byte_halfword",
            Self::LoadStoreImmOffset { .. } => "load_store_imm_offset",
            Self::LoadStoreHalfword { .. } => "load_store_halfword",
            Self::SpRelativeLoadStore { .. } => "sp_relative_load_store",
            Self::LoadAddress { .. } => "load_address",
            Self::AddOffsetSp { .. } => "add_offset_sp",
            Self::PushPopReg { .. } => "push_pop_reg",
            Self::MultipleLoadStore { .. } => "multiple_load_store",
            Self::CondBranch { .. } => "cond_branch",
            Self::SoftwareInterrupt => "software_interrupt",
            Self::UncondBranch => "uncond_branch",
            Self::LongBranchLink { .. } => "long_branch_link",
            Self::Breakpoint => "breakpoint",
            Self::Undefined => "undefined",
        }
    }
}

impl std::fmt::Display for ThumbInstruction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let load = |kind: LoadStoreKind| match kind {
            LoadStoreKind::Load => "LDR",
            LoadStoreKind::Store => "STR",
        };
        let byte = |kind: ReadWriteKind| match kind {
            ReadWriteKind::Word => "",
            ReadWriteKind::Byte => "B",
        };

        match *self {
            Self::MoveShiftedRegister { shift_operation } => write!(f, "{shift_operation}"),
            Self::AddSubtract {
                operand_kind,
                subtract,
            } => {
                let name = if subtract { "SUB" } else { "ADD" };
                match operand_kind {
                    OperandKind::Immediate => write!(f, "{name} #imm"),
                    OperandKind::Register => write!(f, "{name} Rn"),
                }
            }
            Self::MoveCompareAddSubtractImm { operation } => {
                let name = match operation {
                    ThumbImmediateOperation::Mov => "MOV",
                    ThumbImmediateOperation::Cmp => "CMP",
                    ThumbImmediateOperation::Add => "ADD",
                    ThumbImmediateOperation::Sub => "SUB",
                };
                write!(f, "{name} #imm")
            }
            Self::AluOp { alu_operation } => write!(f, "{alu_operation}"),
            Self::HiRegisterOpBx { register_operation } => write!(f, "{register_operation}"),
            Self::PcRelativeLoad => f.write_str("LDR [PC]"),
            Self::LoadStoreRegisterOffset {
                load_store,
                byte_word,
            } => write!(f, "{}{} [Rb, Ro]", load(load_store), byte(byte_word)),
            Self::LoadStoreSignExtByteHalfword { h, sign_extend } => f.write_str(
                match (sign_extend, h) {
                    (false, false) => "STRH",
                    (false, true) => "LDRH",
                    (true, false) => "LDSB",
                    (true, true) => "LDSH",
                },
            ),
            Self::LoadStoreImmOffset {
                load_store,
                byte_word,
            } => write!(f, "{}{} #imm", load(load_store), byte(byte_word)),
            Self::LoadStoreHalfword { load_store } => write!(f, "{}H #imm", load(load_store)),
            Self::SpRelativeLoadStore { load_store } => write!(f, "{} [SP]", load(load_store)),
            Self::LoadAddress { sp } => f.write_str(if sp { "ADD SP" } else { "ADD PC" }),
            Self::AddOffsetSp { negative } => {
                f.write_str(if negative { "SUB SP" } else { "ADD SP" })
            }
            Self::PushPopReg { load_store, pc_lr } => {
                let name = match load_store {
                    LoadStoreKind::Load => "POP",
                    LoadStoreKind::Store => "PUSH",
                };
                let extra = match (load_store, pc_lr) {
                    (_, false) => "",
                    (LoadStoreKind::Load, true) => " +PC",
                    (LoadStoreKind::Store, true) => " +LR",
                };
                write!(f, "{name}{extra}")
            }
            Self::MultipleLoadStore { load_store } => f.write_str(match load_store {
                LoadStoreKind::Load => "LDMIA",
                LoadStoreKind::Store => "STMIA",
            }),
            Self::CondBranch { condition } => write!(f, "B{condition}"),
            Self::SoftwareInterrupt => f.write_str("SWI"),
            Self::UncondBranch => f.write_str("B"),
            Self::LongBranchLink { high } => {
                f.write_str(if high { "BL (offset lo)" } else { "BL (offset hi)" })
            }
            Self::Breakpoint => f.write_str("BKPT"),
            Self::Undefined => f.write_str("UND"),
        }
    }
}
