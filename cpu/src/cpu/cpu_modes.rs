//! # Operating modes
//!
//! ```text
//! ┌────────────┬───────┬────────────────────────────┐
//! │ Mode       │ M4-M0 │ Banked registers           │
//! ├────────────┼───────┼────────────────────────────┤
//! │ User       │ 10000 │ -                          │
//! │ FIQ        │ 10001 │ R8-R14, SPSR_fiq           │
//! │ IRQ        │ 10010 │ R13-R14, SPSR_irq          │
//! │ Supervisor │ 10011 │ R13-R14, SPSR_svc          │
//! │ Abort      │ 10111 │ R13-R14, SPSR_abt          │
//! │ Undefined  │ 11011 │ R13-R14, SPSR_und          │
//! │ System     │ 11111 │ - (shares User registers)  │
//! └────────────┴───────┴────────────────────────────┘
//! ```

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Mode {
    /// The normal ARM program execution state.
    User = 0b10000,

    /// Designed to support a data transfer or channel process.
    Fiq = 0b10001,

    /// Used for general-purpose interrupt handling.
    Irq = 0b10010,

    /// Protected mode for the operating system
    Supervisor = 0b10011,

    /// Entered after a data or instruction prefetch abort.
    Abort = 0b10111,

    /// Entered when an undefined instruction is executed
    Undefined = 0b11011,

    /// A privileged user mode for the operating system.
    System = 0b11111,
}

/// Which physical copy of a banked register a mode sees.
///
/// User and System share slot 0. The other slots double as the index of the
/// mode's SPSR (minus one).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BankIndex {
    User = 0,
    Fiq = 1,
    Irq = 2,
    Supervisor = 3,
    Abort = 4,
    Undefined = 5,
}

pub const BANK_COUNT: usize = 6;

impl Mode {
    #[must_use]
    pub const fn bank(self) -> BankIndex {
        match self {
            Self::User | Self::System => BankIndex::User,
            Self::Fiq => BankIndex::Fiq,
            Self::Irq => BankIndex::Irq,
            Self::Supervisor => BankIndex::Supervisor,
            Self::Abort => BankIndex::Abort,
            Self::Undefined => BankIndex::Undefined,
        }
    }

    /// Every mode except User may change the control bits of CPSR.
    #[must_use]
    pub const fn is_privileged(self) -> bool {
        !matches!(self, Self::User)
    }
}

impl From<Mode> for u32 {
    fn from(m: Mode) -> Self {
        m as Self
    }
}

impl TryFrom<u32> for Mode {
    type Error = String;

    fn try_from(n: u32) -> Result<Self, Self::Error> {
        match n {
            0b10000 => Ok(Self::User),
            0b10001 => Ok(Self::Fiq),
            0b10010 => Ok(Self::Irq),
            0b10011 => Ok(Self::Supervisor),
            0b10111 => Ok(Self::Abort),
            0b11011 => Ok(Self::Undefined),
            0b11111 => Ok(Self::System),
            _ => Err(format!("Unexpected value for Mode: 0b{n:05b}")),
        }
    }
}

impl std::fmt::Display for Mode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::User => f.write_str("usr"),
            Self::Fiq => f.write_str("fiq"),
            Self::Irq => f.write_str("irq"),
            Self::Supervisor => f.write_str("svc"),
            Self::Abort => f.write_str("abt"),
            Self::Undefined => f.write_str("und"),
            Self::System => f.write_str("sys"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn round_trip_raw_bits() {
        for mode in [
            Mode::User,
            Mode::Fiq,
            Mode::Irq,
            Mode::Supervisor,
            Mode::Abort,
            Mode::Undefined,
            Mode::System,
        ] {
            assert_eq!(Mode::try_from(u32::from(mode)), Ok(mode));
        }
    }

    #[test]
    fn invalid_mode_bits() {
        assert!(Mode::try_from(0).is_err());
        assert!(Mode::try_from(0b10100).is_err());
    }

    #[test]
    fn user_and_system_share_bank() {
        assert_eq!(Mode::User.bank(), Mode::System.bank());
        assert!(Mode::System.is_privileged());
        assert!(!Mode::User.is_privileged());
    }
}
