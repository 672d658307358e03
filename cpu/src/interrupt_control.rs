//! Interrupt request latch polled by the core before every step.
//!
//! Peripherals (timers, DMA, the video unit...) live outside the core. They
//! either write `IF` directly through the bus or call
//! [`InterruptControl::queue_interrupt`].

use serde::{Deserialize, Serialize};

/// Interrupt sources, numbered after their bit in `IE`/`IF`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InterruptKind {
    VBlank = 0,
    HBlank = 1,
    VCount = 2,
    Timer0 = 3,
    Timer1 = 4,
    Timer2 = 5,
    Timer3 = 6,
    Serial = 7,
    Dma0 = 8,
    Dma1 = 9,
    Dma2 = 10,
    Dma3 = 11,
    Keypad = 12,
    GamePak = 13,
}

impl InterruptKind {
    #[must_use]
    pub const fn mask(self) -> u16 {
        1 << self as u16
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterruptControl {
    /// Interrupt Enable (IE), one bit per [`InterruptKind`].
    pub interrupt_enable: u16,

    /// Interrupt Request Flags (IF), bits are set when interrupts are requested,
    /// cleared by writing 1 to the corresponding bit.
    pub interrupt_request: u16,

    /// Interrupt Master Enable (IME), only bit 0 is meaningful.
    pub interrupt_master_enable: u16,
}

impl InterruptControl {
    /// Latches a request for `kind`.
    pub fn queue_interrupt(&mut self, kind: InterruptKind) {
        self.interrupt_request |= kind.mask();
    }

    /// Acknowledges the requests whose bit is set in `value` (write-1-to-clear).
    pub fn acknowledge(&mut self, value: u16) {
        self.interrupt_request &= !value;
    }

    #[must_use]
    pub const fn master_enabled(&self) -> bool {
        self.interrupt_master_enable & 1 == 1
    }

    /// At least one enabled source is requesting, ignoring IME and CPSR.I.
    #[must_use]
    pub const fn has_pending(&self) -> bool {
        self.interrupt_enable & self.interrupt_request & 0x3FFF != 0
    }

    /// The cpu must take the IRQ exception if IME is set and something
    /// enabled is pending. CPSR.I is checked by the cpu itself.
    #[must_use]
    pub const fn should_interrupt(&self) -> bool {
        self.master_enabled() && self.has_pending()
    }
}
