//! Status words: the live CPSR and the SPSR saved by every exception mode.
//!
//! ```text
//!  31 30 29 28 27         8  7  6  5  4     0
//! +--+--+--+--+------------+--+--+--+--------+
//! |N |Z |C |V |   unused   |I |F |T |  mode  |
//! +--+--+--+--+------------+--+--+--+--------+
//! ```
//!
//! N/Z/C/V feed [`Condition`] evaluation, I and F mask IRQ and FIQ, T selects
//! the Thumb decoder. Bits 8..=27 are not implemented on this core, status
//! writes leave them untouched.

use serde::{Deserialize, Serialize};

use crate::bitwise::Bits;
use crate::cpu::alu::ArithmeticOpResult;
use crate::cpu::{condition::Condition, cpu_modes::Mode};

/// Bits of a PSR that exist on the ARM7TDMI. MSR never touches the others.
const IMPLEMENTED_BITS: u32 = 0xF000_00FF;

/// A raw status word with typed accessors.
///
/// ```
/// use tdmi_cpu::cpu::psr::Psr;
///
/// let mut cpsr = Psr::default();
/// cpsr.set_carry_flag(true);
///
/// assert!(cpsr.carry_flag());
/// assert_eq!(u32::from(cpsr), 1 << 29);
/// ```
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Psr(u32);

impl Psr {
    /// Evaluates a condition field against N, Z, C and V.
    ///
    /// `NV` is reserved on ARMv4 and simply never passes.
    #[must_use]
    pub fn can_execute(self, cond: Condition) -> bool {
        use Condition::{AL, CC, CS, EQ, GE, GT, HI, LE, LS, LT, MI, NE, NV, PL, VC, VS};
        match cond {
            EQ => self.zero_flag(),
            NE => !self.zero_flag(),
            CS => self.carry_flag(),
            CC => !self.carry_flag(),
            MI => self.sign_flag(),
            PL => !self.sign_flag(),
            VS => self.overflow_flag(),
            VC => !self.overflow_flag(),
            HI => self.carry_flag() && !self.zero_flag(),
            LS => !self.carry_flag() || self.zero_flag(),
            GE => self.sign_flag() == self.overflow_flag(),
            LT => self.sign_flag() != self.overflow_flag(),
            GT => !self.zero_flag() && (self.sign_flag() == self.overflow_flag()),
            LE => self.zero_flag() || (self.sign_flag() != self.overflow_flag()),
            AL => true,
            NV => false,
        }
    }

    /// N => Bit 31, (0=Not Signed, 1=Signed)
    #[must_use]
    pub fn sign_flag(self) -> bool {
        self.0.get_bit(31)
    }

    /// Z => Bit 30, (0=Not Zero, 1=Zero)
    #[must_use]
    pub fn zero_flag(self) -> bool {
        self.0.get_bit(30)
    }

    /// C => Bit 29, (0=Borrow/No Carry, 1=Carry/No Borrow)
    #[must_use]
    pub fn carry_flag(self) -> bool {
        self.0.get_bit(29)
    }

    /// V => Bit 28, (0=No Overflow, 1=Overflow)
    #[must_use]
    pub fn overflow_flag(self) -> bool {
        self.0.get_bit(28)
    }

    /// I => Bit 7, (0=Enable, 1=Disable)
    #[must_use]
    pub fn irq_disable(self) -> bool {
        self.0.get_bit(7)
    }

    /// F => Bit 6, (0=Enable, 1=Disable)
    #[must_use]
    pub fn fiq_disable(self) -> bool {
        self.0.get_bit(6)
    }

    /// T => Bit 5, (0=ARM, 1=THUMB)
    #[must_use]
    pub fn state_bit(self) -> bool {
        self.0.get_bit(5)
    }

    #[must_use]
    pub const fn mode_bits(self) -> u32 {
        self.0 & 0b11111
    }

    /// M4-M0 => Bits 4-0
    ///
    /// SPSRs can be loaded with garbage by software (the BIOS writes 0 in
    /// some paths). Invalid encodings are reported as Supervisor.
    #[must_use]
    pub fn mode(self) -> Mode {
        let mode_bits = self.mode_bits();
        Mode::try_from(mode_bits).unwrap_or_else(|_| {
            tracing::debug!(
                "invalid mode bits 0b{mode_bits:05b} in PSR=0x{:08X}, defaulting to Supervisor",
                self.0
            );
            Mode::Supervisor
        })
    }

    pub fn set_sign_flag(&mut self, value: bool) {
        self.0.set_bit(31, value);
    }

    pub fn set_zero_flag(&mut self, value: bool) {
        self.0.set_bit(30, value);
    }

    pub fn set_carry_flag(&mut self, value: bool) {
        self.0.set_bit(29, value);
    }

    pub fn set_overflow_flag(&mut self, value: bool) {
        self.0.set_bit(28, value);
    }

    /// Sets N, Z, C and V from an arithmetic result.
    pub fn set_flags(&mut self, op_result: &ArithmeticOpResult) {
        self.set_sign_flag(op_result.sign);
        self.set_zero_flag(op_result.zero);
        self.set_carry_flag(op_result.carry);
        self.set_overflow_flag(op_result.overflow);
    }

    /// Sets N and Z from `result`, leaving C and V alone.
    pub fn set_nz(&mut self, result: u32) {
        self.set_sign_flag(result.get_bit(31));
        self.set_zero_flag(result == 0);
    }

    pub fn set_irq_disable(&mut self, value: bool) {
        self.0.set_bit(7, value);
    }

    pub fn set_fiq_disable(&mut self, value: bool) {
        self.0.set_bit(6, value);
    }

    /// Only meant for exception entry and branch-exchange.
    pub fn set_state_bit(&mut self, value: bool) {
        self.0.set_bit(5, value);
    }

    /// The Mode Bits M4-M0 contain the current operating mode.
    pub const fn set_mode(&mut self, m: Mode) {
        self.0 &= !0b11111;
        self.0 |= m as u32;
    }

    /// Writes `value` into the bits selected by `mask`. Unimplemented bits are
    /// never touched.
    pub const fn masked_write(&mut self, value: u32, mask: u32) {
        let mask = mask & IMPLEMENTED_BITS;
        self.0 = (self.0 & !mask) | (value & mask);
    }

    #[must_use]
    pub fn cpu_state(self) -> CpuState {
        self.state_bit().into()
    }

    pub fn set_cpu_state(&mut self, state: CpuState) {
        self.set_state_bit(state.into());
    }
}

impl From<Mode> for Psr {
    fn from(m: Mode) -> Self {
        let mut s = Self(0);

        s.set_mode(m);

        s
    }
}

impl From<u32> for Psr {
    fn from(raw: u32) -> Self {
        Self(raw)
    }
}

impl From<Psr> for u32 {
    fn from(p: Psr) -> Self {
        p.0
    }
}

/// The 4-bit field mask of MSR (`c`, `x`, `s`, `f` from bit 0 to 3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PsrFieldMask(u8);

impl PsrFieldMask {
    pub const ALL: Self = Self(0b1111);
    pub const FLAGS: Self = Self(0b1000);

    #[must_use]
    pub const fn new(fields: u8) -> Self {
        Self(fields & 0b1111)
    }

    #[must_use]
    pub const fn control(self) -> bool {
        self.0 & 0b0001 != 0
    }

    /// Expands the field selection into a bit mask over the 32-bit word.
    #[must_use]
    pub const fn bit_mask(self) -> u32 {
        let mut mask = 0;
        let mut field = 0;
        while field < 4 {
            if self.0 & (1 << field) != 0 {
                mask |= 0xFF << (field * 8);
            }
            field += 1;
        }

        mask
    }
}

impl std::fmt::Display for PsrFieldMask {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for (bit, name) in [(3, 'f'), (2, 's'), (1, 'x'), (0, 'c')] {
            if self.0 & (1 << bit) != 0 {
                write!(f, "{name}")?;
            }
        }

        Ok(())
    }
}

/// The CPU execution state (ARM or Thumb).
///
/// Controlled by the T bit (bit 5) in CPSR. Switch via `BX Rn`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CpuState {
    /// Thumb: 16-bit instructions. See `thumb` module.
    Thumb,
    /// ARM: 32-bit instructions. See `arm` module.
    Arm,
}

impl CpuState {
    /// Size in bytes of one instruction in this state.
    #[must_use]
    pub const fn instruction_size(self) -> u32 {
        match self {
            Self::Arm => 4,
            Self::Thumb => 2,
        }
    }
}

impl From<CpuState> for bool {
    fn from(state: CpuState) -> Self {
        match state {
            CpuState::Arm => false,
            CpuState::Thumb => true,
        }
    }
}

impl From<bool> for CpuState {
    fn from(state: bool) -> Self {
        if state { Self::Thumb } else { Self::Arm }
    }
}
