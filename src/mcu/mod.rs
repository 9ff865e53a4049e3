//! MCU identifier (C5): narrows a static device catalog down to the part(s)
//! actually attached, from DEV_ID and a flash-size register read.

pub mod catalog;

use serde::Serialize;

use crate::error::StlinkError;
use crate::memory::MemoryMap;
use crate::session::ProbeSession;
use crate::transport::Transport;

/// One catalog entry: a concrete (or package-generic) STM32 part.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct McuSpec {
    pub part_name: &'static str,
    /// 12-bit DEV_ID this part reports in DBGMCU_IDCODE.
    pub dev_id: u16,
    /// Per-part flash-size register address, used only when the family
    /// does not have a single shared one (`None` here means "ask the
    /// family constant").
    pub flash_size_reg: Option<u32>,
    pub svd_file: Option<&'static str>,
    pub memory_map: MemoryMap,
}

/// Result of a successful identification: one or more candidates that all
/// agree on `dev_id` and flash size but could not be narrowed further.
#[derive(Debug, Clone, Serialize)]
pub struct DetectedMcu {
    candidates: Vec<McuSpec>,
    flash_size_bytes: u32,
    family_name: &'static str,
}

impl DetectedMcu {
    /// Display name: every surviving candidate's part name, joined by `" / "`.
    pub fn name(&self) -> String {
        self.candidates.iter().map(|c| c.part_name).collect::<Vec<_>>().join(" / ")
    }

    pub fn flash_size_bytes(&self) -> u32 {
        self.flash_size_bytes
    }

    /// The MCU family this result was identified against (e.g. `"STM32"`),
    /// as supplied by the caller to [`identify`].
    pub fn family_name(&self) -> &'static str {
        self.family_name
    }

    /// The memory map, if exactly one candidate remains. Ambiguity is only
    /// raised here, lazily, not at identification time.
    pub fn memory_regions(&self) -> Result<&MemoryMap, StlinkError> {
        match self.candidates.as_slice() {
            [one] => Ok(&one.memory_map),
            _ => Err(StlinkError::MemoryMapAmbiguous),
        }
    }

    /// Loads the SVD file agreed on by every remaining candidate, via a
    /// caller-supplied loader. Ambiguity (distinct `svd_file`s across
    /// candidates) is raised lazily, same as `memory_regions`.
    pub fn load_svd(
        &self,
        loader: impl FnOnce(&str) -> std::io::Result<Vec<u8>>,
    ) -> Result<Option<Vec<u8>>, StlinkError> {
        let files: std::collections::HashSet<&str> =
            self.candidates.iter().filter_map(|c| c.svd_file).collect();
        match files.len() {
            0 => Ok(None),
            1 => {
                let file = files.into_iter().next().unwrap();
                let bytes = loader(file).map_err(|e| {
                    StlinkError::Transport(crate::error::TransportError::Usb(Box::new(e)))
                })?;
                Ok(Some(bytes))
            }
            _ => Err(StlinkError::SvdAmbiguous),
        }
    }
}

/// Canonicalizes a caller-supplied expected part name: upper-cases it and,
/// if it matches the family prefix and is longer than 9 characters, replaces
/// the package-size code at index 9 with `x` (the upstream STM32 datasheet
/// convention for "any package"). Names outside the family are still
/// upper-cased and returned — they simply won't match any candidate's
/// `part_name`, which is what drives `McuNotMatch` when every expected name
/// is foreign. This is a documented family-specific quirk, not a bug — see
/// `SPEC_FULL.md` §9.
fn canonicalize_expected_name(name: &str, family_prefix: &str) -> String {
    let upper = name.to_uppercase();
    if upper.starts_with(family_prefix) && upper.len() > 9 {
        let mut chars: Vec<char> = upper.chars().collect();
        chars[9] = 'x';
        chars.into_iter().collect()
    } else {
        upper
    }
}

/// Runs the full identification pipeline against `catalog` and returns the
/// narrowed-down result.
///
/// `family_idcode_reg` and `family_flash_size_reg` are the family-level
/// register addresses (`None` for `family_flash_size_reg` means every
/// candidate must agree on its own `flash_size_reg` instead).
#[tracing::instrument(skip(session, catalog))]
pub fn identify<T: Transport>(
    session: &mut ProbeSession<T>,
    catalog: &'static [McuSpec],
    family_prefix: &'static str,
    family_idcode_reg: u32,
    family_flash_size_reg: Option<u32>,
    expected_mcus: Option<&[&str]>,
) -> Result<DetectedMcu, StlinkError> {
    let idcode = session.get_mem32(family_idcode_reg)?;
    let dev_id = (idcode & 0x0FFF) as u16;
    tracing::debug!(dev_id, "read DEV_ID");

    let mut candidates: Vec<McuSpec> =
        catalog.iter().filter(|spec| spec.dev_id == dev_id).cloned().collect();
    if candidates.is_empty() {
        return Err(StlinkError::UnknownMcuDetected { dev_id, flash_size_bytes: None });
    }

    let flash_size_reg_addr = match family_flash_size_reg {
        Some(addr) => addr,
        None => {
            let mut regs = candidates.iter().map(|c| c.flash_size_reg);
            let first = regs.next().flatten();
            if regs.any(|r| r != first) {
                return Err(StlinkError::CatalogConflict);
            }
            first.ok_or(StlinkError::CatalogConflict)?
        }
    };

    let flash_size_bytes = session.read_mem16(flash_size_reg_addr, 2).map(|bytes| {
        u16::from_le_bytes([bytes[0], bytes[1]]) as u32 * 1024
    })?;
    tracing::debug!(flash_size_bytes, "read flash size");

    candidates.retain(|c| c.memory_map.get_size("FLASH") == flash_size_bytes);
    if candidates.is_empty() {
        return Err(StlinkError::UnknownMcuDetected {
            dev_id,
            flash_size_bytes: Some(flash_size_bytes),
        });
    }

    if let Some(expected) = expected_mcus {
        let fixed: std::collections::HashSet<String> =
            expected.iter().map(|n| canonicalize_expected_name(n, family_prefix)).collect();
        let matched: Vec<McuSpec> = candidates
            .iter()
            .filter(|c| fixed.iter().any(|f| c.part_name.starts_with(f.as_str())))
            .cloned()
            .collect();
        if matched.is_empty() {
            return Err(StlinkError::McuNotMatch {
                detected: candidates.iter().map(|c| c.part_name.to_string()).collect(),
                expected: expected.iter().map(|s| s.to_string()).collect(),
            });
        }
        candidates = matched;
    }

    Ok(DetectedMcu { candidates, flash_size_bytes, family_name: family_prefix })
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn canonicalize_replaces_package_code_at_index_9() {
        let fixed = canonicalize_expected_name("STM32F103C8", "STM32");
        assert_eq!(fixed, "STM32F103x8");
    }

    #[test]
    fn canonicalize_short_names_are_left_alone() {
        let fixed = canonicalize_expected_name("stm32f1", "STM32");
        assert_eq!(fixed, "STM32F1");
    }

    #[test]
    fn canonicalize_leaves_names_outside_the_family_upper_cased_only() {
        assert_eq!(canonicalize_expected_name("NRF52840", "STM32"), "NRF52840");
    }

    #[test]
    fn name_joins_multiple_candidates_with_slash() {
        let detected = DetectedMcu {
            candidates: vec![
                McuSpec {
                    part_name: "STM32F103x8",
                    dev_id: 0x410,
                    flash_size_reg: None,
                    svd_file: None,
                    memory_map: MemoryMap::new(&[]),
                },
                McuSpec {
                    part_name: "STM32F102x8",
                    dev_id: 0x410,
                    flash_size_reg: None,
                    svd_file: None,
                    memory_map: MemoryMap::new(&[]),
                },
            ],
            flash_size_bytes: 65536,
            family_name: "STM32",
        };
        assert_eq!(detected.name(), "STM32F103x8 / STM32F102x8");
    }

    #[test]
    fn memory_regions_is_ambiguous_with_multiple_candidates() {
        let spec = McuSpec {
            part_name: "STM32F103x8",
            dev_id: 0x410,
            flash_size_reg: None,
            svd_file: None,
            memory_map: MemoryMap::new(&[]),
        };
        let detected = DetectedMcu {
            candidates: vec![spec.clone(), spec],
            flash_size_bytes: 65536,
            family_name: "STM32",
        };
        assert!(matches!(detected.memory_regions(), Err(StlinkError::MemoryMapAmbiguous)));
    }
}
