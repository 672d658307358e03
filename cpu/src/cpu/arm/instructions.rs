//! # ARM instruction classification
//!
//! Instructions are classified from a 12-bit key made of bits 27-20 and 7-4
//! of the opcode. Those are the only bits that select *what* an instruction
//! does: everything else is a register number or an immediate, read by the
//! handler at execution time.
//!
//! ```text
//!  31  28 27      20 19   16 15   12 11    8 7      4 3    0
//! ┌──────┬──────────┬───────┬───────┬───────┬────────┬──────┐
//! │ cond │ key 11-4 │  Rn   │  Rd   │  Rs   │key 3-0 │  Rm  │
//! └──────┴──────────┴───────┴───────┴───────┴────────┴──────┘
//! ```
//!
//! ## Classification priority
//!
//! Several encodings overlap. The most specific pattern wins:
//!
//! 1. Branch and Exchange (BX), Breakpoint (BKPT)
//! 2. Multiply, Multiply Long, Single Data Swap (bits 7-4 = `1001`)
//! 3. Halfword Data Transfer (bits 7 and 4 set)
//! 4. PSR transfer (MRS/MSR, the test opcodes without S)
//! 5. Data Processing
//! 6. Single Data Transfer, Block Data Transfer, Branch
//! 7. Software Interrupt
//!
//! Coprocessor encodings and everything left over are undefined: the ARM7TDMI
//! in a GBA has no coprocessor to answer, so they trap.

use serde::{Deserialize, Serialize};

use crate::bitwise::Bits;
use crate::cpu::arm::alu_instruction::{AluOperand, ArmModeAluInstruction, PsrKind};
use crate::cpu::flags::{
    HalfwordTransferKind, Indexing, LoadStoreKind, Offsetting, OperandKind, ReadWriteKind,
    ShiftKind,
};

/// Number of entries in the ARM decode table.
pub const ARM_KEY_COUNT: usize = 4096;

/// Builds the decode key of an opcode: bits 27-20 followed by bits 7-4.
#[must_use]
pub const fn arm_key(op_code: u32) -> usize {
    (((op_code >> 16) & 0xFF0) | ((op_code >> 4) & 0xF)) as usize
}

/// Offset of a single data transfer.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub enum SingleDataTransferOffset {
    /// 12-bit unsigned immediate.
    Immediate,

    /// Rm shifted by a 5-bit immediate amount.
    Register(ShiftKind),
}

/// An ARM instruction with every field that is fixed by its decode key.
///
/// | Variant                | Example Instructions      |
/// |------------------------|---------------------------|
/// | `DataProcessing`       | AND, ADD, CMP, MOV        |
/// | `Multiply`             | MUL, MLA                  |
/// | `MultiplyLong`         | UMULL, SMLAL              |
/// | `PsrTransfer*`         | MRS, MSR                  |
/// | `SingleDataSwap`       | SWP, SWPB                 |
/// | `BranchAndExchange`    | BX                        |
/// | `HalfwordDataTransfer` | LDRH, STRH, LDRSB, LDRSH  |
/// | `SingleDataTransfer`   | LDR, STR, LDRB, STRB      |
/// | `BlockDataTransfer`    | LDM, STM                  |
/// | `Branch`               | B, BL                     |
/// | `SoftwareInterrupt`    | SWI                       |
/// | `Breakpoint`           | BKPT                      |
/// | `Undefined`            | -                         |
#[derive(Debug, PartialEq, Eq, Copy, Clone, Serialize, Deserialize)]
pub enum ArmInstruction {
    DataProcessing {
        alu_instruction: ArmModeAluInstruction,
        set_conditions: bool,
        operand: AluOperand,
    },
    Multiply {
        accumulate: bool,
        set_conditions: bool,
    },
    MultiplyLong {
        signed: bool,
        accumulate: bool,
        set_conditions: bool,
    },
    PsrTransferMrs {
        psr_kind: PsrKind,
    },
    PsrTransferMsr {
        psr_kind: PsrKind,
        operand_kind: OperandKind,
    },
    SingleDataSwap {
        quantity: ReadWriteKind,
    },
    BranchAndExchange,
    HalfwordDataTransfer {
        indexing: Indexing,
        offsetting: Offsetting,
        offset_kind: OperandKind,
        write_back: bool,
        load_store: LoadStoreKind,
        transfer_kind: HalfwordTransferKind,
    },
    SingleDataTransfer {
        indexing: Indexing,
        offsetting: Offsetting,
        quantity: ReadWriteKind,
        write_back: bool,
        load_store: LoadStoreKind,
        offset: SingleDataTransferOffset,
    },
    BlockDataTransfer {
        indexing: Indexing,
        offsetting: Offsetting,
        load_psr: bool,
        write_back: bool,
        load_store: LoadStoreKind,
    },
    Branch {
        link: bool,
    },
    SoftwareInterrupt,
    Breakpoint,
    Undefined,
}

impl ArmInstruction {
    /// Classifies a decode key (see [`arm_key`]).
    #[must_use]
    #[allow(clippy::too_many_lines)]
    pub fn from_key(key: usize) -> Self {
        debug_assert!(key < ARM_KEY_COUNT, "ARM key out of range: {key:#X}");
        let key = key as u32;
        // Bits 27-20 of the opcode.
        let high = key >> 4;
        // Bits 7-4 of the opcode.
        let low = key & 0xF;

        // Opcode bit `n` (only 27-20 and 7-4 are meaningful here).
        let bit = |n: u8| -> bool {
            match n {
                20..=27 => high.get_bit(n - 20),
                4..=7 => low.get_bit(n - 4),
                _ => unreachable!("bit {n} is not part of the ARM decode key"),
            }
        };

        if high == 0b0001_0010 && low == 0b0001 {
            Self::BranchAndExchange
        } else if high == 0b0001_0010 && low == 0b0111 {
            Self::Breakpoint
        } else if high & 0b1111_1100 == 0 && low == 0b1001 {
            Self::Multiply {
                accumulate: bit(21),
                set_conditions: bit(20),
            }
        } else if high & 0b1111_1000 == 0b0000_1000 && low == 0b1001 {
            Self::MultiplyLong {
                signed: bit(22),
                accumulate: bit(21),
                set_conditions: bit(20),
            }
        } else if high & 0b1111_1011 == 0b0001_0000 && low == 0b1001 {
            Self::SingleDataSwap {
                quantity: bit(22).into(),
            }
        } else if high & 0b1110_0000 == 0 && low & 0b1001 == 0b1001 {
            let load_store = LoadStoreKind::from(bit(20));
            match HalfwordTransferKind::from_sh(low.get_bits(1..=2)) {
                // Signed stores are the ARMv5 doubleword transfers.
                Some(HalfwordTransferKind::SignedByte | HalfwordTransferKind::SignedHalfwords)
                    if load_store == LoadStoreKind::Store =>
                {
                    Self::Undefined
                }
                Some(transfer_kind) => Self::HalfwordDataTransfer {
                    indexing: bit(24).into(),
                    offsetting: bit(23).into(),
                    offset_kind: bit(22).into(),
                    write_back: bit(21),
                    load_store,
                    transfer_kind,
                },
                // SH = 00 with bits 7-4 = 1001 is multiply/swap, whatever
                // did not match above is unallocated.
                None => Self::Undefined,
            }
        } else if high & 0b1111_1011 == 0b0001_0000 && low == 0 {
            Self::PsrTransferMrs {
                psr_kind: bit(22).into(),
            }
        } else if high & 0b1111_1011 == 0b0001_0010 && low == 0 {
            Self::PsrTransferMsr {
                psr_kind: bit(22).into(),
                operand_kind: OperandKind::Register,
            }
        } else if high & 0b1111_1011 == 0b0011_0010 {
            Self::PsrTransferMsr {
                psr_kind: bit(22).into(),
                operand_kind: OperandKind::Immediate,
            }
        } else if high & 0b1100_0000 == 0 {
            let alu_instruction = ArmModeAluInstruction::from(high.get_bits(1..=4));
            let set_conditions = bit(20);

            // The test opcodes without S are the PSR/misc space, whatever is
            // still here is unallocated on ARMv4T.
            if alu_instruction.is_test() && !set_conditions {
                return Self::Undefined;
            }

            let operand = if bit(25) {
                AluOperand::Immediate
            } else if !bit(4) {
                AluOperand::ShiftByImmediate(low.get_bits(1..=2).into())
            } else if !bit(7) {
                AluOperand::ShiftByRegister(low.get_bits(1..=2).into())
            } else {
                return Self::Undefined;
            };

            Self::DataProcessing {
                alu_instruction,
                set_conditions,
                operand,
            }
        } else if high & 0b1100_0000 == 0b0100_0000 {
            let offset = if bit(25) {
                // Register offsets with bit 4 set are the media space.
                if bit(4) {
                    return Self::Undefined;
                }
                SingleDataTransferOffset::Register(low.get_bits(1..=2).into())
            } else {
                SingleDataTransferOffset::Immediate
            };

            Self::SingleDataTransfer {
                indexing: bit(24).into(),
                offsetting: bit(23).into(),
                quantity: bit(22).into(),
                write_back: bit(21),
                load_store: bit(20).into(),
                offset,
            }
        } else if high & 0b1110_0000 == 0b1000_0000 {
            Self::BlockDataTransfer {
                indexing: bit(24).into(),
                offsetting: bit(23).into(),
                load_psr: bit(22),
                write_back: bit(21),
                load_store: bit(20).into(),
            }
        } else if high & 0b1110_0000 == 0b1010_0000 {
            Self::Branch { link: bit(24) }
        } else if high & 0b1111_0000 == 0b1111_0000 {
            Self::SoftwareInterrupt
        } else {
            Self::Undefined
        }
    }

    /// Name of the instruction family, used in traces.
    #[must_use]
    pub const fn family(&self) -> &'static str {
        match self {
            Self::DataProcessing { .. } => "data_processing",
            Self::Multiply { .. } => "multiply",
            Self::MultiplyLong { .. } => "multiply_long",
            Self::PsrTransferMrs { .. } => "mrs",
            Self::PsrTransferMsr { .. } => "msr",
            Self::SingleDataSwap { .. } => "single_data_swap",
            Self::BranchAndExchange => "branch_and_exchange",
            Self::HalfwordDataTransfer { .. } => "halfword_data_transfer",
            Self::SingleDataTransfer { .. } => "single_data_transfer",
            Self::BlockDataTransfer { .. } => "block_data_transfer",
            Self::Branch { .. } => "branch",
            Self::SoftwareInterrupt => "software_interrupt",
            Self::Breakpoint => "breakpoint",
            Self::Undefined => "undefined",
        }
    }
}

/// Mnemonic with the operand form, registers and immediates are left out.
impl std::fmt::Display for ArmInstruction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = |set: bool| if set { "S" } else { "" };
        let load = |kind: LoadStoreKind| match kind {
            LoadStoreKind::Load => "LDR",
            LoadStoreKind::Store => "STR",
        };

        match *self {
            Self::DataProcessing {
                alu_instruction,
                set_conditions,
                operand,
            } => write!(f, "{alu_instruction}{} {operand}", s(set_conditions)),
            Self::Multiply {
                accumulate,
                set_conditions,
            } => {
                let name = if accumulate { "MLA" } else { "MUL" };
                write!(f, "{name}{}", s(set_conditions))
            }
            Self::MultiplyLong {
                signed,
                accumulate,
                set_conditions,
            } => {
                let sign = if signed { "S" } else { "U" };
                let name = if accumulate { "MLAL" } else { "MULL" };
                write!(f, "{sign}{name}{}", s(set_conditions))
            }
            Self::PsrTransferMrs { psr_kind } => write!(f, "MRS {psr_kind}"),
            Self::PsrTransferMsr {
                psr_kind,
                operand_kind,
            } => match operand_kind {
                OperandKind::Immediate => write!(f, "MSR {psr_kind}, #imm"),
                OperandKind::Register => write!(f, "MSR {psr_kind}, Rm"),
            },
            Self::SingleDataSwap { quantity } => match quantity {
                ReadWriteKind::Word => f.write_str("SWP"),
                ReadWriteKind::Byte => f.write_str("SWPB"),
            },
            Self::BranchAndExchange => f.write_str("BX"),
            Self::HalfwordDataTransfer {
                load_store,
                transfer_kind,
                ..
            } => write!(f, "{}{transfer_kind}", load(load_store)),
            Self::SingleDataTransfer {
                load_store,
                quantity,
                offset,
                ..
            } => {
                let byte = if quantity == ReadWriteKind::Byte { "B" } else { "" };
                match offset {
                    SingleDataTransferOffset::Immediate => {
                        write!(f, "{}{byte} #imm", load(load_store))
                    }
                    SingleDataTransferOffset::Register(kind) => {
                        write!(f, "{}{byte} Rm, {kind} #imm", load(load_store))
                    }
                }
            }
            Self::BlockDataTransfer {
                indexing,
                offsetting,
                load_psr,
                load_store,
                ..
            } => {
                let name = match load_store {
                    LoadStoreKind::Load => "LDM",
                    LoadStoreKind::Store => "STM",
                };
                let direction = match offsetting {
                    Offsetting::Up => "I",
                    Offsetting::Down => "D",
                };
                let when = match indexing {
                    Indexing::Pre => "B",
                    Indexing::Post => "A",
                };
                write!(f, "{name}{direction}{when}{}", if load_psr { "^" } else { "" })
            }
            Self::Branch { link } => f.write_str(if link { "BL" } else { "B" }),
            Self::SoftwareInterrupt => f.write_str("SWI"),
            Self::Breakpoint => f.write_str("BKPT"),
            Self::Undefined => f.write_str("UND"),
        }
    }
}
