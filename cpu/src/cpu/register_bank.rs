//! # Physical register storage
//!
//! The ARM7TDMI has 37 physical registers but only 16 (plus CPSR and maybe a
//! SPSR) are visible at once. Which physical copy a register number refers to
//! depends on the current mode:
//!
//! ```text
//!            usr/sys   fiq       irq       svc       abt       und
//! R0-R7      ─────────────────── shared ───────────────────────────
//! R8-R12     high[0]   high[1]   ───────────── high[0] ────────────
//! R13-R14    sp_lr[0]  sp_lr[1]  sp_lr[2]  sp_lr[3]  sp_lr[4]  sp_lr[5]
//! R15        ─────────────────── shared ───────────────────────────
//! SPSR       -         spsr[0]   spsr[1]   spsr[2]   spsr[3]   spsr[4]
//! ```
//!
//! Switching modes never moves values around, it only changes the
//! [`BankIndex`] used to look them up.

use serde::{Deserialize, Serialize};

use crate::cpu::cpu_modes::{BANK_COUNT, BankIndex};
use crate::cpu::psr::Psr;
use crate::cpu::registers::{REG_LR, REG_PROGRAM_COUNTER, REG_SP};

#[derive(Debug, Default, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RegisterBank {
    /// R0-R7, never banked.
    low: [u32; 8],

    /// R8-R12, slot 1 is FIQ's own copy.
    high: [[u32; 5]; 2],

    /// R13 and R14 of each bank.
    sp_lr: [[u32; 2]; BANK_COUNT],

    /// R15.
    program_counter: u32,

    /// One SPSR per exception mode.
    spsr: [Psr; BANK_COUNT - 1],
}

impl RegisterBank {
    /// Reads register `reg` (0-15) as seen from `bank`.
    #[must_use]
    pub fn register(&self, reg: usize, bank: BankIndex) -> u32 {
        match reg {
            0..=7 => self.low[reg],
            8..=12 => self.high[Self::high_slot(bank)][reg - 8],
            REG_SP | REG_LR => self.sp_lr[bank as usize][reg - REG_SP],
            REG_PROGRAM_COUNTER => self.program_counter,
            _ => panic!("Invalid register index: {reg} (0x{reg:X})"),
        }
    }

    /// Writes register `reg` (0-15) as seen from `bank`.
    pub fn set_register(&mut self, reg: usize, bank: BankIndex, value: u32) {
        match reg {
            0..=7 => self.low[reg] = value,
            8..=12 => self.high[Self::high_slot(bank)][reg - 8] = value,
            REG_SP | REG_LR => self.sp_lr[bank as usize][reg - REG_SP] = value,
            REG_PROGRAM_COUNTER => self.program_counter = value,
            _ => panic!("Invalid register index: {reg} (0x{reg:X})"),
        }
    }

    #[must_use]
    pub const fn program_counter(&self) -> u32 {
        self.program_counter
    }

    pub const fn set_program_counter(&mut self, new_value: u32) {
        self.program_counter = new_value;
    }

    pub const fn advance_program_counter(&mut self, bytes: u32) {
        self.program_counter = self.program_counter.wrapping_add(bytes);
    }

    /// SPSR of an exception bank, `None` for User/System.
    #[must_use]
    pub fn spsr(&self, bank: BankIndex) -> Option<Psr> {
        Self::spsr_slot(bank).map(|slot| self.spsr[slot])
    }

    /// Mutable SPSR of an exception bank, `None` for User/System.
    pub fn spsr_mut(&mut self, bank: BankIndex) -> Option<&mut Psr> {
        Self::spsr_slot(bank).map(|slot| &mut self.spsr[slot])
    }

    /// Snapshot of the 16 registers visible from `bank`.
    #[must_use]
    pub fn visible(&self, bank: BankIndex) -> [u32; 16] {
        std::array::from_fn(|reg| self.register(reg, bank))
    }

    const fn high_slot(bank: BankIndex) -> usize {
        match bank {
            BankIndex::Fiq => 1,
            _ => 0,
        }
    }

    const fn spsr_slot(bank: BankIndex) -> Option<usize> {
        match bank {
            BankIndex::User => None,
            other => Some(other as usize - 1),
        }
    }
}
