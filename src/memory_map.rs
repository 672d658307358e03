//! Minimal console memory map for running raw binaries.
//!
//! Only plain memory is modelled: the low 16MB (BIOS area), external and
//! internal work RAM (mirrored) and the cartridge ROM window. Anything else
//! reads as 0 and ignores writes.

use tdmi_cpu::bus::{Bus, CycleKind, FlatMemory};

const EWRAM_SIZE: usize = 0x4_0000;
const IWRAM_SIZE: usize = 0x8000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Region {
    Low,
    ExternalRam,
    InternalRam,
    Rom,
}

impl Region {
    /// Region holding `address` and the offset inside it.
    const fn of(address: u32) -> Option<(Self, u32)> {
        match address >> 24 {
            0x00 => Some((Self::Low, address & 0x00FF_FFFF)),
            0x02 => Some((Self::ExternalRam, address & (EWRAM_SIZE as u32 - 1))),
            0x03 => Some((Self::InternalRam, address & (IWRAM_SIZE as u32 - 1))),
            0x08..=0x0D => Some((Self::Rom, address & 0x01FF_FFFF)),
            _ => None,
        }
    }
}

pub struct MemoryMap {
    low: FlatMemory,
    external_ram: FlatMemory,
    internal_ram: FlatMemory,
    rom: FlatMemory,
}

impl MemoryMap {
    pub fn new() -> Self {
        Self {
            low: FlatMemory::new(0x4000),
            external_ram: FlatMemory::new(EWRAM_SIZE),
            internal_ram: FlatMemory::new(IWRAM_SIZE),
            rom: FlatMemory::new(0),
        }
    }

    /// Copies `bytes` at `address`.
    pub fn load(&mut self, address: u32, bytes: &[u8]) -> Result<(), String> {
        let (region, offset) = Region::of(address)
            .ok_or_else(|| format!("cannot load a binary at unmapped address 0x{address:08X}"))?;

        self.memory(region).load(offset, bytes);
        tracing::debug!(
            "loaded {} bytes at 0x{address:08X} ({region:?})",
            bytes.len()
        );

        Ok(())
    }

    const fn memory(&mut self, region: Region) -> &mut FlatMemory {
        match region {
            Region::Low => &mut self.low,
            Region::ExternalRam => &mut self.external_ram,
            Region::InternalRam => &mut self.internal_ram,
            Region::Rom => &mut self.rom,
        }
    }

    /// ROM is read only.
    fn writable(address: u32) -> Option<(Region, u32)> {
        match Region::of(address) {
            Some((Region::Rom, _)) => {
                tracing::trace!("write to ROM at 0x{address:08X} dropped");
                None
            }
            other => other,
        }
    }

    /// Total bus accesses `(sequential, non sequential, internal)`.
    pub fn access_counts(&self) -> (u64, u64, u64) {
        [&self.low, &self.external_ram, &self.internal_ram, &self.rom]
            .iter()
            .fold((0, 0, 0), |(s, n, i), m| {
                (
                    s + m.sequential_accesses,
                    n + m.non_sequential_accesses,
                    i + m.internal_cycles,
                )
            })
    }
}

impl Default for MemoryMap {
    fn default() -> Self {
        Self::new()
    }
}

impl Bus for MemoryMap {
    fn read_8(&mut self, address: u32, kind: CycleKind) -> u8 {
        Region::of(address).map_or(0, |(region, offset)| self.memory(region).read_8(offset, kind))
    }

    fn read_16(&mut self, address: u32, kind: CycleKind) -> u16 {
        Region::of(address).map_or(0, |(region, offset)| self.memory(region).read_16(offset, kind))
    }

    fn read_32(&mut self, address: u32, kind: CycleKind) -> u32 {
        Region::of(address).map_or(0, |(region, offset)| self.memory(region).read_32(offset, kind))
    }

    fn write_8(&mut self, address: u32, value: u8, kind: CycleKind) {
        if let Some((region, offset)) = Self::writable(address) {
            self.memory(region).write_8(offset, value, kind);
        }
    }

    fn write_16(&mut self, address: u32, value: u16, kind: CycleKind) {
        if let Some((region, offset)) = Self::writable(address) {
            self.memory(region).write_16(offset, value, kind);
        }
    }

    fn write_32(&mut self, address: u32, value: u32, kind: CycleKind) {
        if let Some((region, offset)) = Self::writable(address) {
            self.memory(region).write_32(offset, value, kind);
        }
    }

    fn idle(&mut self) {
        self.low.idle();
    }
}
