//! `ProbeVersion`: the value produced by the version handshake in
//! [`crate::session`].

use std::fmt;

/// API level implied by the hardware generation and firmware version,
/// gating which command groups are available.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiLevel {
    V1,
    V2,
    V3,
}

/// Immutable result of the version handshake (`GET_VERSION` [+
/// `GET_VERSION_EX` on V3]).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeVersion {
    pub generation: crate::transport::Generation,
    pub stlink_major: u8,
    pub jtag_minor: u8,
    pub swim_minor: Option<u8>,
    pub mass_minor: Option<u8>,
    pub bridge_minor: Option<u8>,
    pub api_level: ApiLevel,
}

impl ProbeVersion {
    pub fn supports_swd_frequency_set(&self) -> bool {
        self.jtag_minor >= crate::constants::MIN_JTAG_FOR_SWD_FREQ
    }

    pub fn supports_mem16(&self) -> bool {
        matches!(self.api_level, ApiLevel::V3) || self.jtag_minor >= crate::constants::MIN_JTAG_FOR_MEM16
    }
}

impl fmt::Display for ProbeVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ST-Link/{} V{}", self.generation, self.stlink_major)?;
        write!(f, "J{}", self.jtag_minor)?;
        if let Some(s) = self.swim_minor {
            write!(f, "S{}", s)?;
        }
        if let Some(m) = self.mass_minor {
            write!(f, "M{}", m)?;
        }
        if let Some(b) = self.bridge_minor {
            write!(f, "B{}", b)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::transport::Generation;

    #[test]
    fn displays_canonical_string_for_v2_1() {
        let v = ProbeVersion {
            generation: Generation::V2_1,
            stlink_major: 2,
            jtag_minor: 13,
            swim_minor: None,
            mass_minor: Some(32),
            bridge_minor: None,
            api_level: ApiLevel::V2,
        };
        assert_eq!(v.to_string(), "ST-Link/V2-1 V2J13M32");
    }

    #[test]
    fn old_jtag_firmware_does_not_support_frequency_set() {
        let v = ProbeVersion {
            generation: Generation::V2,
            stlink_major: 2,
            jtag_minor: 21,
            swim_minor: Some(0),
            mass_minor: None,
            bridge_minor: None,
            api_level: ApiLevel::V1,
        };
        assert!(!v.supports_swd_frequency_set());
    }
}
