//! Decode tables built once, the first time an instruction is executed.
//!
//! Each slot holds the instruction for its key with every static field already
//! resolved, so dispatching is one index plus one `match`.

use once_cell::sync::Lazy;

use crate::cpu::arm::instructions::{ARM_KEY_COUNT, ArmInstruction, arm_key};
use crate::cpu::thumb::instruction::{THUMB_KEY_COUNT, ThumbInstruction, thumb_key};

static ARM_TABLE: Lazy<Vec<ArmInstruction>> = Lazy::new(|| {
    let table = (0..ARM_KEY_COUNT)
        .map(ArmInstruction::from_key)
        .collect::<Vec<_>>();
    tracing::debug!("built ARM decode table ({} entries)", table.len());
    table
});

static THUMB_TABLE: Lazy<Vec<ThumbInstruction>> = Lazy::new(|| {
    let table = (0..THUMB_KEY_COUNT)
        .map(ThumbInstruction::from_key)
        .collect::<Vec<_>>();
    tracing::debug!("built Thumb decode table ({} entries)", table.len());
    table
});

/// Looks up the ARM instruction for `op_code`.
#[must_use]
pub fn decode_arm(op_code: u32) -> ArmInstruction {
    ARM_TABLE[arm_key(op_code)]
}

/// Looks up the Thumb instruction for `op_code`.
#[must_use]
pub fn decode_thumb(op_code: u16) -> ThumbInstruction {
    THUMB_TABLE[thumb_key(op_code)]
}

/// Forces both tables to be built now instead of on the first step.
pub fn warm_up() {
    Lazy::force(&ARM_TABLE);
    Lazy::force(&THUMB_TABLE);
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rand::Rng;

    /// Mask/pattern classifier over full opcodes, written independently from
    /// the key based one. First match wins.
    const ARM_PATTERNS: &[(u32, u32, &str)] = &[
        (0x0FFF_FFF0, 0x012F_FF10, "branch_and_exchange"),
        (0x0FF0_00F0, 0x0120_0070, "breakpoint"),
        (0x0FC0_00F0, 0x0000_0090, "multiply"),
        (0x0F80_00F0, 0x0080_0090, "multiply_long"),
        (0x0FB0_0FF0, 0x0100_0090, "single_data_swap"),
        (0x0E00_00F0, 0x0000_00B0, "halfword_data_transfer"),
        (0x0E10_00D0, 0x0010_00D0, "halfword_data_transfer"),
        (0x0FBF_0FFF, 0x010F_0000, "mrs"),
        (0x0FB0_FFF0, 0x0120_F000, "msr"),
        (0x0FB0_F000, 0x0320_F000, "msr"),
        (0x0E00_0010, 0x0000_0000, "data_processing"),
        (0x0E00_0090, 0x0000_0010, "data_processing"),
        (0x0E00_0000, 0x0200_0000, "data_processing"),
        (0x0E00_0000, 0x0400_0000, "single_data_transfer"),
        (0x0E00_0010, 0x0600_0000, "single_data_transfer"),
        (0x0E00_0000, 0x0800_0000, "block_data_transfer"),
        (0x0E00_0000, 0x0A00_0000, "branch"),
        (0x0F00_0000, 0x0F00_0000, "software_interrupt"),
    ];

    fn classify_arm(op_code: u32) -> &'static str {
        // The test opcodes without S never reach data processing.
        let test_without_s = op_code & 0x0D90_0000 == 0x0100_0000;
        ARM_PATTERNS
            .iter()
            .find(|(mask, pattern, family)| {
                op_code & mask == *pattern && !(*family == "data_processing" && test_without_s)
            })
            .map_or("undefined", |(_, _, family)| family)
    }

    const THUMB_PATTERNS: &[(u16, u16, &str)] = &[
        (0xF800, 0x1800, "add_subtract"),
        (0xE000, 0x0000, "move_shifted_register"),
        (0xE000, 0x2000, "move_compare_add_subtract_imm"),
        (0xFC00, 0x4000, "alu_op"),
        (0xFC00, 0x4400, "hi_register_op_bx"),
        (0xF800, 0x4800, "pc_relative_load"),
        (0xF200, 0x5000, "load_store_register_offset"),
        (0xF200, 0x5200, "load_store_sign_ext_byte_halfword"),
        (0xE000, 0x6000, "load_store_imm_offset"),
        (0xF000, 0x8000, "load_store_halfword"),
        (0xF000, 0x9000, "sp_relative_load_store"),
        (0xF000, 0xA000, "load_address"),
        (0xFF00, 0xB000, "add_offset_sp"),
        (0xF600, 0xB400, "push_pop_reg"),
        (0xFF00, 0xBE00, "breakpoint"),
        (0xF000, 0xC000, "multiple_load_store"),
        (0xFF00, 0xDF00, "software_interrupt"),
        (0xFF00, 0xDE00, "undefined"),
        (0xF000, 0xD000, "cond_branch"),
        (0xF800, 0xE000, "uncond_branch"),
        (0xF000, 0xF000, "long_branch_link"),
    ];

    fn classify_thumb(op_code: u16) -> &'static str {
        THUMB_PATTERNS
            .iter()
            .find(|(mask, pattern, _)| op_code & mask == *pattern)
            .map_or("undefined", |(_, _, family)| family)
    }

    /// Turns a key back into an opcode. Rn and Rd are all ones, Rs and Rm
    /// are zero, the values MRS/MSR/SWP require.
    fn arm_op_code_from_key(key: usize) -> u32 {
        let key = key as u32;
        0xE00F_F000 | ((key & 0xFF0) << 16) | ((key & 0xF) << 4)
    }

    #[test]
    fn arm_table_is_total_and_matches_patterns() {
        for key in 0..ARM_KEY_COUNT {
            let op_code = arm_op_code_from_key(key);
            assert_eq!(arm_key(op_code), key);

            // BX wants all ones in Rs as well.
            let expected = match classify_arm(op_code | 0xF00) {
                "branch_and_exchange" => "branch_and_exchange",
                _ => classify_arm(op_code),
            };

            assert_eq!(
                decode_arm(op_code).family(),
                expected,
                "key {key:#05X}, op_code {op_code:#010X}"
            );
        }
    }

    #[test]
    fn thumb_table_is_total_and_matches_patterns() {
        let mut rng = rand::thread_rng();
        for key in 0..THUMB_KEY_COUNT {
            let op_code = ((key as u16) << 6) | rng.gen_range(0..0x40);
            assert_eq!(thumb_key(op_code), key);

            assert_eq!(
                decode_thumb(op_code).family(),
                classify_thumb(op_code),
                "key {key:#05X}, op_code {op_code:#06X}"
            );
        }
    }

    #[test]
    fn same_key_same_instruction() {
        // Only register fields differ.
        assert_eq!(decode_arm(0xE081_0002), decode_arm(0x1089_7F0E));
        assert_eq!(decode_thumb(0x1888), decode_thumb(0x18BF));
    }
}
