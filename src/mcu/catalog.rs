//! Static STM32F1 device catalog.
//!
//! Grounded on `original_source/swd/devices/stm32.py`'s `_IDCODE_REG`/
//! `_FLASH_SIZE_REG`/`_MCUS` family-constant pattern, with STM32F103
//! reference-manual addresses, and on the flat `const` array idiom from
//! `probe-rs/src/config/registry.rs`'s `GENERIC_TARGETS`. Unlike that
//! registry this catalog is never extended at runtime: it is compiled in
//! and immutable (SPEC_FULL.md §4.5.1).
//!
//! Part names keep the upstream convention of a literal `x` at the
//! package-size position (e.g. `STM32F103x8` covers the C8/R8/V8/T8
//! packages, which share one die and one flash size) — this is what the
//! name-canonicalization rule in [`super::identify`] is matching
//! against.

use super::McuSpec;
use crate::memory::{MemoryMap, MemoryRegion};

/// Name prefix passed to [`super::identify`] as `family_prefix` for this
/// catalog; also the display family name surfaced via `DetectedMcu::family_name`.
pub const STM32F1_FAMILY_PREFIX: &str = "STM32";

/// DBGMCU_IDCODE, common to the whole STM32F1 family.
pub const STM32F1_IDCODE_REG: u32 = 0xE004_2000;

/// F_SIZE, common to the whole STM32F1 family.
pub const STM32F1_FLASH_SIZE_REG: u32 = 0x1FFF_F7E0;

const MEDIUM_DENSITY_SRAM: MemoryRegion = MemoryRegion { name: "SRAM", address: 0x2000_0000, size: 20 * 1024 };
const MEDIUM_DENSITY_SYSTEM: MemoryRegion =
    MemoryRegion { name: "SYSTEM", address: 0x1FFF_F000, size: 2 * 1024 };
const OPTIONS: MemoryRegion = MemoryRegion { name: "OPTIONS", address: 0x1FFF_F800, size: 16 };

const F103X8_REGIONS: &[MemoryRegion] = &[
    MemoryRegion { name: "FLASH", address: 0x0800_0000, size: 64 * 1024 },
    MEDIUM_DENSITY_SRAM,
    MEDIUM_DENSITY_SYSTEM,
    OPTIONS,
];

const F103XB_REGIONS: &[MemoryRegion] = &[
    MemoryRegion { name: "FLASH", address: 0x0800_0000, size: 128 * 1024 },
    MEDIUM_DENSITY_SRAM,
    MEDIUM_DENSITY_SYSTEM,
    OPTIONS,
];

const F103XE_REGIONS: &[MemoryRegion] = &[
    MemoryRegion { name: "FLASH", address: 0x0800_0000, size: 512 * 1024 },
    MemoryRegion { name: "SRAM", address: 0x2000_0000, size: 64 * 1024 },
    MEDIUM_DENSITY_SYSTEM,
    OPTIONS,
];

/// Low- and medium-density STM32F101/F102/F103 parts (DEV_ID `0x410`) plus
/// high-density STM32F103xE (DEV_ID `0x414`).
pub const STM32F1_MCUS: &[McuSpec] = &[
    McuSpec {
        part_name: "STM32F103x8",
        dev_id: 0x410,
        flash_size_reg: None,
        svd_file: Some("STM32F103xx.svd"),
        memory_map: MemoryMap::new(F103X8_REGIONS),
    },
    McuSpec {
        part_name: "STM32F103xB",
        dev_id: 0x410,
        flash_size_reg: None,
        svd_file: Some("STM32F103xx.svd"),
        memory_map: MemoryMap::new(F103XB_REGIONS),
    },
    McuSpec {
        part_name: "STM32F103xE",
        dev_id: 0x414,
        flash_size_reg: None,
        svd_file: Some("STM32F103xx.svd"),
        memory_map: MemoryMap::new(F103XE_REGIONS),
    },
];
