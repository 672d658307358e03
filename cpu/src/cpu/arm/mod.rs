//! # ARM instruction set (32-bit)
//!
//! Every instruction carries a condition in bits 31-28, checked before the
//! handler runs.
//!
//! ```text
//! 31-28   27-25   24-0
//! [Cond] [Format] [Instruction-specific]
//! ```
//!
//! ## Submodules
//!
//! - [`instructions`] - Classification from the decode key
//! - [`operations`] - Execution
//! - [`alu_instruction`] - Data processing opcodes and operands

pub mod alu_instruction;

#[allow(clippy::cast_possible_truncation)]
#[allow(clippy::similar_names)]
pub mod instructions;

#[allow(clippy::cast_possible_truncation)]
#[allow(clippy::cast_sign_loss)]
#[allow(clippy::cast_possible_wrap)]
#[allow(clippy::cast_lossless)]
#[allow(clippy::similar_names)]
pub mod operations;
