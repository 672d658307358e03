//! # The ARM7TDMI core
//!
//! ## Prefetch model
//!
//! The real cpu has a three stage pipeline (fetch, decode, execute). Only its
//! visible effect is modelled: R15 always reads two instructions ahead of the
//! one executing.
//!
//! ```text
//!              ARM        Thumb
//! executing    A          A
//! prefetch[1]  A + 4      A + 2
//! R15          A + 8      A + 4
//! ```
//!
//! [`Arm7tdmi::step`] works in this order:
//!
//! 1. FIQ then IRQ check, entering the exception if one is due
//! 2. take `prefetch[0]`, check its condition, run the handler
//! 3. act on the handler's [`FetchKind`]: shift the prefetch and fetch one
//!    word, or refill both slots from the new R15 after a branch.

use serde::{Deserialize, Serialize};

use crate::bitwise::Bits;
use crate::bus::{Bus, CycleKind};
use crate::cpu::boot::BootConfig;
use crate::cpu::cpu_modes::{BankIndex, Mode};
use crate::cpu::fetch::FetchKind;
use crate::cpu::psr::{CpuState, Psr, PsrFieldMask};
use crate::cpu::register_bank::RegisterBank;
use crate::cpu::registers::{REG_LR, REG_SP};
use crate::interrupt_control::InterruptControl;

/// Exceptions the core can enter, in decreasing priority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Exception {
    Reset,
    DataAbort,
    Fiq,
    Irq,
    PrefetchAbort,
    Undefined,
    SoftwareInterrupt,
}

impl Exception {
    #[must_use]
    pub const fn vector(self) -> u32 {
        match self {
            Self::Reset => 0x00,
            Self::Undefined => 0x04,
            Self::SoftwareInterrupt => 0x08,
            Self::PrefetchAbort => 0x0C,
            Self::DataAbort => 0x10,
            Self::Irq => 0x18,
            Self::Fiq => 0x1C,
        }
    }

    #[must_use]
    pub const fn mode(self) -> Mode {
        match self {
            Self::Reset | Self::SoftwareInterrupt => Mode::Supervisor,
            Self::Undefined => Mode::Undefined,
            Self::PrefetchAbort | Self::DataAbort => Mode::Abort,
            Self::Irq => Mode::Irq,
            Self::Fiq => Mode::Fiq,
        }
    }
}

/// Everything needed to resume the core, minus the bus.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CpuSnapshot {
    pub cpsr: Psr,
    pub registers: RegisterBank,
    pub prefetch: [u32; 2],
    pub fiq_pending: bool,
    pub interrupt_control: InterruptControl,
}

pub struct Arm7tdmi<B: Bus> {
    pub bus: B,

    /// IE/IF/IME, polled before every step.
    pub interrupt_control: InterruptControl,

    pub cpsr: Psr,

    pub(crate) registers: RegisterBank,

    /// Opcodes fetched ahead of execution. `prefetch[0]` runs next.
    prefetch: [u32; 2],

    fiq_pending: bool,
}

impl<B: Bus> Arm7tdmi<B> {
    /// Creates a core booted with [`BootConfig::default`] (direct boot).
    pub fn new(bus: B) -> Self {
        Self::with_config(bus, &BootConfig::default())
    }

    /// Creates a core and boots it.
    ///
    /// # Panics
    ///
    /// If `config.initial_mode` is neither System nor Supervisor.
    pub fn with_config(bus: B, config: &BootConfig) -> Self {
        let mut cpu = Self {
            bus,
            interrupt_control: InterruptControl::default(),
            cpsr: Psr::default(),
            registers: RegisterBank::default(),
            prefetch: [0; 2],
            fiq_pending: false,
        };

        cpu.boot(config);

        cpu
    }

    /// Cold start: ARM state, initial mode, stacks, PC at the entry point and
    /// two priming fetches.
    ///
    /// # Panics
    ///
    /// If `config.initial_mode` is neither System nor Supervisor.
    pub fn boot(&mut self, config: &BootConfig) {
        assert!(
            matches!(config.initial_mode, Mode::System | Mode::Supervisor),
            "cpu can only boot in System or Supervisor mode, got {}",
            config.initial_mode
        );

        self.registers = RegisterBank::default();
        self.cpsr = Psr::from(config.initial_mode);
        self.cpsr.set_cpu_state(CpuState::Arm);
        self.fiq_pending = false;

        // Coming out of reset both interrupt lines are masked.
        if config.initial_mode == Mode::Supervisor {
            self.cpsr.set_irq_disable(true);
            self.cpsr.set_fiq_disable(true);
        }

        let stacks = config.stack_pointers;
        self.registers
            .set_register(REG_SP, BankIndex::User, stacks.user);
        self.registers.set_register(REG_SP, BankIndex::Irq, stacks.irq);
        self.registers
            .set_register(REG_SP, BankIndex::Supervisor, stacks.supervisor);

        self.registers.set_program_counter(config.entry_point);
        self.flush_pipeline();

        tracing::debug!(
            "booted in {} mode at 0x{:08X}",
            config.initial_mode,
            config.entry_point
        );
    }

    /// Runs one instruction, or enters a pending interrupt instead.
    ///
    /// Returns how the next instruction was fetched, [`FetchKind::None`] when
    /// an exception was entered.
    pub fn step(&mut self) -> FetchKind {
        if self.fiq_pending && !self.cpsr.fiq_disable() {
            self.fiq_pending = false;
            let return_address = self.instruction_address().wrapping_add(4);
            self.enter_exception(Exception::Fiq, return_address);

            return FetchKind::None;
        }

        if !self.cpsr.irq_disable() && self.interrupt_control.should_interrupt() {
            let return_address = self.instruction_address().wrapping_add(4);
            self.enter_exception(Exception::Irq, return_address);

            return FetchKind::None;
        }

        let op_code = self.prefetch[0];
        let fetch_kind = match self.cpsr.cpu_state() {
            CpuState::Arm => self.execute_arm(op_code),
            CpuState::Thumb => self.execute_thumb(op_code as u16),
        };

        self.advance_pipeline(fetch_kind);

        fetch_kind
    }

    /// Asserts the FIQ line. It is taken on the next step if CPSR.F is clear.
    pub fn raise_fiq(&mut self) {
        self.fiq_pending = true;
    }

    fn advance_pipeline(&mut self, fetch_kind: FetchKind) {
        match fetch_kind {
            FetchKind::Sequential | FetchKind::NonSequential => {
                let pc = self.registers.program_counter();
                let kind = fetch_kind.cycle_kind().unwrap_or(CycleKind::Sequential);
                self.prefetch[0] = self.prefetch[1];
                self.prefetch[1] = self.fetch_op_code(pc, kind);
                self.registers
                    .advance_program_counter(self.cpsr.cpu_state().instruction_size());
            }
            FetchKind::Branch => self.flush_pipeline(),
            FetchKind::None => {}
        }
    }

    /// Refills the prefetch from R15, aligned to the current state.
    pub fn flush_pipeline(&mut self) {
        let size = self.cpsr.cpu_state().instruction_size();
        let pc = self.registers.program_counter() & !(size - 1);

        self.prefetch[0] = self.fetch_op_code(pc, CycleKind::NonSequential);
        self.prefetch[1] = self.fetch_op_code(pc.wrapping_add(size), CycleKind::Sequential);
        self.registers
            .set_program_counter(pc.wrapping_add(2 * size));
    }

    fn fetch_op_code(&mut self, address: u32, kind: CycleKind) -> u32 {
        match self.cpsr.cpu_state() {
            CpuState::Arm => self.bus.read_32(address & !0b11, kind),
            CpuState::Thumb => u32::from(self.bus.read_16(address & !0b1, kind)),
        }
    }

    /// Saves CPSR in the SPSR of the exception mode, switches mode, stores
    /// the return address in the new LR and jumps to the vector in ARM state
    /// with IRQs masked.
    pub fn enter_exception(&mut self, exception: Exception, return_address: u32) {
        tracing::debug!(
            "{exception:?} exception from {} mode, vector 0x{:02X}, return to 0x{return_address:08X}",
            self.cpsr.mode(),
            exception.vector()
        );

        self.switch_to_mode(exception.mode());
        self.set_register(REG_LR, return_address);

        self.cpsr.set_cpu_state(CpuState::Arm);
        self.cpsr.set_irq_disable(true);
        if matches!(exception, Exception::Reset | Exception::Fiq) {
            self.cpsr.set_fiq_disable(true);
        }

        self.registers.set_program_counter(exception.vector());
        self.flush_pipeline();
    }

    /// Enters `mode`. If it owns a SPSR the current CPSR is saved there first.
    ///
    /// Registers are rebound by the mode change alone, nothing is copied.
    pub fn switch_to_mode(&mut self, mode: Mode) {
        if let Some(spsr) = self.registers.spsr_mut(mode.bank()) {
            *spsr = self.cpsr;
        }

        tracing::debug!("mode switch {} -> {mode}", self.cpsr.mode());
        self.cpsr.set_mode(mode);
    }

    /// Copies the SPSR of the current mode into CPSR (exception return).
    pub fn restore_cpsr_from_spsr(&mut self) {
        let Some(spsr) = self.spsr() else {
            tracing::warn!(
                "no SPSR to restore in {} mode, CPSR left untouched",
                self.cpsr.mode()
            );
            return;
        };

        let mut cpsr = spsr;
        if Mode::try_from(spsr.mode_bits()).is_err() {
            tracing::debug!(
                "SPSR holds invalid mode bits 0b{:05b}, keeping {} mode",
                spsr.mode_bits(),
                self.cpsr.mode()
            );
            cpsr.set_mode(self.cpsr.mode());
        }

        self.cpsr = cpsr;
    }

    /// MSR to CPSR. User mode can only touch the flags, the T bit is never
    /// changed and invalid mode bits leave the mode alone.
    pub(crate) fn write_cpsr(&mut self, value: u32, fields: PsrFieldMask) {
        let mut bit_mask = fields.bit_mask();
        if !self.cpsr.mode().is_privileged() {
            bit_mask &= PsrFieldMask::FLAGS.bit_mask();
        }

        let mut new_cpsr = self.cpsr;
        new_cpsr.masked_write(value, bit_mask);

        if new_cpsr.state_bit() != self.cpsr.state_bit() {
            tracing::debug!("MSR tried to change the T bit, ignored");
            new_cpsr.set_state_bit(self.cpsr.state_bit());
        }

        if new_cpsr.mode_bits() != self.cpsr.mode_bits() {
            match Mode::try_from(new_cpsr.mode_bits()) {
                Ok(mode) => tracing::debug!("MSR mode switch {} -> {mode}", self.cpsr.mode()),
                Err(e) => {
                    tracing::debug!("MSR ignored mode change: {e}");
                    new_cpsr.set_mode(self.cpsr.mode());
                }
            }
        }

        self.cpsr = new_cpsr;
    }

    /// Register `reg` as seen from the current mode.
    #[must_use]
    pub fn register(&self, reg: usize) -> u32 {
        self.registers.register(reg, self.cpsr.mode().bank())
    }

    pub fn set_register(&mut self, reg: usize, value: u32) {
        self.registers
            .set_register(reg, self.cpsr.mode().bank(), value);
    }

    /// Register `reg` as seen from User mode, whatever the current mode.
    #[must_use]
    pub fn user_register(&self, reg: usize) -> u32 {
        self.registers.register(reg, BankIndex::User)
    }

    pub fn set_user_register(&mut self, reg: usize, value: u32) {
        self.registers.set_register(reg, BankIndex::User, value);
    }

    /// SPSR of the current mode, `None` in User and System mode.
    #[must_use]
    pub fn spsr(&self) -> Option<Psr> {
        self.registers.spsr(self.cpsr.mode().bank())
    }

    /// Raw R15, two instructions ahead of the one executing.
    #[must_use]
    pub const fn program_counter(&self) -> u32 {
        self.registers.program_counter()
    }

    /// Address of the instruction executing (inside a handler) or about to
    /// execute (between steps).
    #[must_use]
    pub fn instruction_address(&self) -> u32 {
        let size = self.cpsr.cpu_state().instruction_size();
        self.registers
            .program_counter()
            .wrapping_sub(2 * size)
    }

    /// Opcode that the next step executes.
    #[must_use]
    pub const fn next_op_code(&self) -> u32 {
        self.prefetch[0]
    }

    /// The 16 registers visible from the current mode.
    #[must_use]
    pub fn registers(&self) -> [u32; 16] {
        self.registers.visible(self.cpsr.mode().bank())
    }

    #[must_use]
    pub const fn register_bank(&self) -> &RegisterBank {
        &self.registers
    }

    #[must_use]
    pub fn snapshot(&self) -> CpuSnapshot {
        CpuSnapshot {
            cpsr: self.cpsr,
            registers: self.registers.clone(),
            prefetch: self.prefetch,
            fiq_pending: self.fiq_pending,
            interrupt_control: self.interrupt_control.clone(),
        }
    }

    pub fn restore_snapshot(&mut self, snapshot: CpuSnapshot) {
        self.cpsr = snapshot.cpsr;
        self.registers = snapshot.registers;
        self.prefetch = snapshot.prefetch;
        self.fiq_pending = snapshot.fiq_pending;
        self.interrupt_control = snapshot.interrupt_control;
    }

    /// Value stored when R15 is the source of a store: one instruction
    /// further than a normal read.
    pub(crate) fn stored_program_counter(&self) -> u32 {
        self.registers
            .program_counter()
            .wrapping_add(self.cpsr.cpu_state().instruction_size())
    }

    /// `cycles` internal cycles without bus activity.
    pub(crate) fn idle(&mut self, cycles: u32) {
        for _ in 0..cycles {
            self.bus.idle();
        }
    }

    /// Word load, misaligned addresses rotate the aligned word.
    pub(crate) fn read_word_rotated(&mut self, address: u32, kind: CycleKind) -> u32 {
        let value = self.bus.read_32(address & !0b11, kind);
        value.rotate_right((address & 0b11) * 8)
    }

    /// Halfword load, an odd address rotates the aligned halfword by 8.
    pub(crate) fn read_halfword_rotated(&mut self, address: u32, kind: CycleKind) -> u32 {
        let value = u32::from(self.bus.read_16(address & !0b1, kind));
        value.rotate_right((address & 0b1) * 8)
    }

    pub(crate) fn read_signed_byte(&mut self, address: u32, kind: CycleKind) -> u32 {
        u32::from(self.bus.read_8(address, kind)).sign_extended(8)
    }

    /// Signed halfword load, an odd address degrades to a signed byte load.
    pub(crate) fn read_signed_halfword(&mut self, address: u32, kind: CycleKind) -> u32 {
        if address.get_bit(0) {
            return self.read_signed_byte(address, kind);
        }

        u32::from(self.bus.read_16(address, kind)).sign_extended(16)
    }

    pub(crate) fn write_word(&mut self, address: u32, value: u32, kind: CycleKind) {
        self.bus.write_32(address & !0b11, value, kind);
    }

    pub(crate) fn write_halfword(&mut self, address: u32, value: u32, kind: CycleKind) {
        self.bus.write_16(address & !0b1, value as u16, kind);
    }
}
