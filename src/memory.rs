//! Named memory regions making up an MCU's address space.

use serde::Serialize;

/// A single named, absolutely-addressed region (e.g. `FLASH`, `SRAM`).
///
/// Only `Serialize` is derived, not `Deserialize`: fields are `&'static`
/// catalog data (see [`crate::mcu::catalog`]), which a generic deserializer
/// cannot populate without leaking memory. Callers that want a dump of a
/// detected map (for logging or a report) can serialize it; nothing builds
/// one back from untrusted input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MemoryRegion {
    pub name: &'static str,
    pub address: u32,
    pub size: u32,
}

/// An ordered set of [`MemoryRegion`]s with unique names.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MemoryMap {
    regions: &'static [MemoryRegion],
}

impl MemoryMap {
    pub const fn new(regions: &'static [MemoryRegion]) -> Self {
        Self { regions }
    }

    /// Size in bytes of the named region, or `0` if no such region exists.
    pub fn get_size(&self, name: &str) -> u32 {
        self.regions.iter().find(|r| r.name == name).map(|r| r.size).unwrap_or(0)
    }

    /// Base address of the named region, if it exists.
    pub fn get_address(&self, name: &str) -> Option<u32> {
        self.regions.iter().find(|r| r.name == name).map(|r| r.address)
    }

    pub fn regions(&self) -> &'static [MemoryRegion] {
        self.regions
    }
}

#[cfg(test)]
mod test {
    use super::*;

    const REGIONS: &[MemoryRegion] = &[
        MemoryRegion { name: "FLASH", address: 0x0800_0000, size: 65536 },
        MemoryRegion { name: "SRAM", address: 0x2000_0000, size: 20480 },
    ];

    #[test]
    fn get_size_returns_matching_region() {
        let map = MemoryMap::new(REGIONS);
        assert_eq!(map.get_size("FLASH"), 65536);
        assert_eq!(map.get_size("SRAM"), 20480);
    }

    #[test]
    fn get_size_returns_zero_for_unknown_region() {
        let map = MemoryMap::new(REGIONS);
        assert_eq!(map.get_size("OPTIONS"), 0);
    }

    #[test]
    fn get_address_returns_none_for_unknown_region() {
        let map = MemoryMap::new(REGIONS);
        assert_eq!(map.get_address("OPTIONS"), None);
    }
}
