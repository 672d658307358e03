//! # Memory access contract
//!
//! The core never decodes addresses itself. Every fetch, load and store goes
//! through a [`Bus`] together with a [`CycleKind`] describing the access so the
//! bus can charge the right amount of wait states.
//!
//! Addresses are passed through untouched: forcing alignment and rotating
//! misaligned loads is done by the instruction handlers.

use serde::{Deserialize, Serialize};

/// How an access relates to the previous one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CycleKind {
    /// Address follows the previous access (burst).
    Sequential,

    /// Address is unrelated to the previous access.
    NonSequential,

    /// No memory is touched, the cpu is busy internally.
    ///
    /// The core never passes it to a read or write, internal cycles are
    /// reported through [`Bus::idle`] instead. Implementations use it to
    /// account those cycles alongside the other two kinds.
    Internal,
}

/// Memory interface consumed by the core.
///
/// Implementations are free to return any value for unmapped regions
/// (open bus). The core treats whatever comes back as the read result.
pub trait Bus {
    fn read_8(&mut self, address: u32, kind: CycleKind) -> u8;

    fn read_16(&mut self, address: u32, kind: CycleKind) -> u16;

    fn read_32(&mut self, address: u32, kind: CycleKind) -> u32;

    fn write_8(&mut self, address: u32, value: u8, kind: CycleKind);

    fn write_16(&mut self, address: u32, value: u16, kind: CycleKind);

    fn write_32(&mut self, address: u32, value: u32, kind: CycleKind);

    /// One [`CycleKind::Internal`] cycle elapsed without a bus access.
    fn idle(&mut self) {}
}

/// Flat little-endian memory starting at address 0.
///
/// Halfword and word accesses are force-aligned the way the console bus does.
/// Reads outside the buffer return 0 and writes outside are dropped.
#[derive(Clone, Serialize, Deserialize)]
pub struct FlatMemory {
    data: Vec<u8>,

    /// Number of accesses of each kind, handy to check timing hints.
    pub sequential_accesses: u64,
    pub non_sequential_accesses: u64,
    pub internal_cycles: u64,
}

impl FlatMemory {
    #[must_use]
    pub fn new(size: usize) -> Self {
        Self {
            data: vec![0; size],
            sequential_accesses: 0,
            non_sequential_accesses: 0,
            internal_cycles: 0,
        }
    }

    /// Copies `bytes` at `address`, growing the buffer if needed.
    pub fn load(&mut self, address: u32, bytes: &[u8]) {
        let start = address as usize;
        let end = start + bytes.len();
        if end > self.data.len() {
            self.data.resize(end, 0);
        }

        self.data[start..end].copy_from_slice(bytes);
    }

    /// Writes a sequence of words starting at `address`.
    pub fn load_words(&mut self, address: u32, words: &[u32]) {
        let bytes = words
            .iter()
            .flat_map(|w| w.to_le_bytes())
            .collect::<Vec<u8>>();
        self.load(address, &bytes);
    }

    /// Writes a sequence of halfwords starting at `address`.
    pub fn load_halfwords(&mut self, address: u32, halfwords: &[u16]) {
        let bytes = halfwords
            .iter()
            .flat_map(|h| h.to_le_bytes())
            .collect::<Vec<u8>>();
        self.load(address, &bytes);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    fn byte(&self, address: u32) -> u8 {
        self.data.get(address as usize).copied().unwrap_or(0)
    }

    fn set_byte(&mut self, address: u32, value: u8) {
        if let Some(b) = self.data.get_mut(address as usize) {
            *b = value;
        } else {
            tracing::trace!("dropping write of 0x{value:02X} at unmapped 0x{address:08X}");
        }
    }

    fn count(&mut self, kind: CycleKind) {
        match kind {
            CycleKind::Sequential => self.sequential_accesses += 1,
            CycleKind::NonSequential => self.non_sequential_accesses += 1,
            CycleKind::Internal => self.internal_cycles += 1,
        }
    }
}

impl Bus for FlatMemory {
    fn read_8(&mut self, address: u32, kind: CycleKind) -> u8 {
        self.count(kind);
        self.byte(address)
    }

    fn read_16(&mut self, address: u32, kind: CycleKind) -> u16 {
        self.count(kind);
        let address = address & !0b1;
        u16::from_le_bytes([self.byte(address), self.byte(address.wrapping_add(1))])
    }

    fn read_32(&mut self, address: u32, kind: CycleKind) -> u32 {
        self.count(kind);
        let address = address & !0b11;
        u32::from_le_bytes([
            self.byte(address),
            self.byte(address.wrapping_add(1)),
            self.byte(address.wrapping_add(2)),
            self.byte(address.wrapping_add(3)),
        ])
    }

    fn write_8(&mut self, address: u32, value: u8, kind: CycleKind) {
        self.count(kind);
        self.set_byte(address, value);
    }

    fn write_16(&mut self, address: u32, value: u16, kind: CycleKind) {
        self.count(kind);
        let address = address & !0b1;
        for (i, b) in value.to_le_bytes().into_iter().enumerate() {
            self.set_byte(address.wrapping_add(i as u32), b);
        }
    }

    fn write_32(&mut self, address: u32, value: u32, kind: CycleKind) {
        self.count(kind);
        let address = address & !0b11;
        for (i, b) in value.to_le_bytes().into_iter().enumerate() {
            self.set_byte(address.wrapping_add(i as u32), b);
        }
    }

    fn idle(&mut self) {
        self.count(CycleKind::Internal);
    }
}
