//! # Thumb instruction set (16-bit)
//!
//! A compressed subset of ARM: no condition field outside of conditional
//! branches, mostly R0-R7 only, two-operand forms.
//!
//! - [`instruction`] - Classification of the 19 formats
//! - [`operations`] - Execution
//! - [`alu_instructions`] - Opcodes of the ALU formats

pub mod alu_instructions;

#[allow(clippy::cast_possible_truncation)]
#[allow(clippy::cast_possible_wrap)]
#[allow(clippy::cast_lossless)]
pub mod instruction;

#[allow(clippy::cast_possible_truncation)]
#[allow(clippy::cast_sign_loss)]
#[allow(clippy::cast_possible_wrap)]
#[allow(clippy::cast_lossless)]
#[allow(clippy::missing_panics_doc)]
pub mod operations;
