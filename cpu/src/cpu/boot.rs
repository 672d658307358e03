//! Cold start parameters.
//!
//! Running the BIOS leaves the cpu in Supervisor mode at address 0. Skipping
//! it (direct boot) means emulating the state the BIOS hands over to the
//! cartridge: System mode, stacks set up, PC at the start of ROM.

use serde::{Deserialize, Serialize};

use crate::cpu::cpu_modes::Mode;

/// Start of the cartridge ROM.
pub const ROM_START: u32 = 0x0800_0000;

/// Stack pointers installed before the first instruction.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StackPointers {
    /// SP of User and System mode.
    pub user: u32,
    pub irq: u32,
    pub supervisor: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BootConfig {
    /// Either [`Mode::System`] or [`Mode::Supervisor`].
    pub initial_mode: Mode,
    pub entry_point: u32,
    pub stack_pointers: StackPointers,
}

impl BootConfig {
    /// Start from the reset vector, letting the BIOS do the setup.
    #[must_use]
    pub fn bios() -> Self {
        Self {
            initial_mode: Mode::Supervisor,
            entry_point: 0,
            stack_pointers: StackPointers::default(),
        }
    }

    /// Start straight from ROM with the state the BIOS would leave behind.
    #[must_use]
    pub fn direct_boot() -> Self {
        Self {
            initial_mode: Mode::System,
            entry_point: ROM_START,
            stack_pointers: StackPointers {
                user: 0x0300_7F00,
                irq: 0x0300_7FA0,
                supervisor: 0x0300_7FE0,
            },
        }
    }
}

impl Default for BootConfig {
    fn default() -> Self {
        Self::direct_boot()
    }
}
