//! ARM7TDMI core of a handheld console emulator.
//!
//! The core owns its registers and talks to the rest of the machine through
//! a [`Bus`](bus::Bus). A host drives it one instruction at a time:
//!
//! ```
//! use tdmi_cpu::bus::FlatMemory;
//! use tdmi_cpu::cpu::arm7tdmi::Arm7tdmi;
//! use tdmi_cpu::cpu::boot::BootConfig;
//!
//! let mut memory = FlatMemory::new(0x100);
//! // MOV R0, #5 ; ADD R0, R0, R0
//! memory.load_words(0, &[0xE3A0_0005, 0xE080_0000]);
//!
//! let config = BootConfig {
//!     entry_point: 0,
//!     ..BootConfig::default()
//! };
//! let mut cpu = Arm7tdmi::with_config(memory, &config);
//! cpu.step();
//! cpu.step();
//!
//! assert_eq!(cpu.register(0), 10);
//! ```

#[allow(clippy::cast_possible_truncation)]
#[allow(clippy::cast_sign_loss)]
#[allow(clippy::cast_possible_wrap)]
mod bitwise;

#[allow(clippy::cast_lossless)]
#[allow(clippy::cast_possible_truncation)]
pub mod bus;
pub mod cpu;
pub mod interrupt_control;
