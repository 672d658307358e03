//! # Register numbers
//!
//! - **R0-R12**: General purpose
//! - **R13 (SP)**: Stack pointer (by convention)
//! - **R14 (LR)**: Link register (return address)
//! - **R15 (PC)**: Program counter (+8 ARM, +4 Thumb due to pipeline)
//!
//! For the storage behind them see [`register_bank`](super::register_bank).

/// Stack Pointer register index.
pub const REG_SP: usize = 0xD;

/// Link Register index (return address for subroutines).
pub const REG_LR: usize = 0xE;

/// Program Counter register index.
pub const REG_PROGRAM_COUNTER: usize = 0xF;

/// Assembler name of a register, used in trace output.
#[must_use]
pub fn register_name(reg: usize) -> String {
    match reg {
        REG_SP => "SP".to_owned(),
        REG_LR => "LR".to_owned(),
        REG_PROGRAM_COUNTER => "PC".to_owned(),
        _ => format!("R{reg}"),
    }
}
