//! Probe session (C3) and target access API (C4): everything that talks to
//! an attached ST-Link over a [`Transport`].

use scroll::{Pread, LE};

use crate::constants::commands;
use crate::error::StlinkError;
use crate::transport::{Generation, Transport};
use crate::version::{ApiLevel, ProbeVersion};

fn u32le(buf: &[u8], offset: usize) -> u32 {
    buf.pread_with::<u32>(offset, LE).expect("fixed-size protocol buffer")
}

/// A live connection to one ST-Link probe, after the version handshake,
/// mode reset, optional frequency negotiation and SWD entry have all
/// completed. Strictly synchronous: only one `xfer` is ever in flight, and
/// `ProbeSession` does no internal locking — wrap it in a mutex for
/// multi-threaded use.
#[derive(Debug)]
pub struct ProbeSession<T: Transport> {
    transport: T,
    version: ProbeVersion,
}

impl<T: Transport> ProbeSession<T> {
    /// Opens a session: reads the firmware version, exits whatever mode the
    /// probe is currently in, optionally negotiates an SWD frequency, then
    /// enters debug+SWD mode. Fails atomically — no partial session is ever
    /// returned.
    #[tracing::instrument(skip(transport))]
    pub fn new(mut transport: T, requested_hz: Option<u32>) -> Result<Self, StlinkError> {
        let version = Self::read_version(&mut transport)?;
        tracing::debug!(%version, "read probe version");

        Self::leave_state(&mut transport)?;

        let mut session = Self { transport, version };
        if let Some(hz) = requested_hz {
            session.set_swd_frequency(hz)?;
        }
        session.enter_debug_swd()?;

        Ok(session)
    }

    pub fn version(&self) -> &ProbeVersion {
        &self.version
    }

    #[tracing::instrument(skip(transport))]
    fn read_version(transport: &mut T) -> Result<ProbeVersion, StlinkError> {
        let rx = transport.xfer(&[commands::GET_VERSION, 0x80], None, Some(6))?;
        let raw = u16::from_be_bytes([rx[0], rx[1]]);
        let stlink_major = ((raw >> 12) & 0xF) as u8;

        if stlink_major == 3 {
            let ex = transport.xfer(&[commands::GET_VERSION_EX, 0x80], None, Some(16))?;
            return Ok(ProbeVersion {
                generation: transport.generation(),
                stlink_major,
                jtag_minor: ex[2],
                swim_minor: Some(ex[1]),
                mass_minor: Some(ex[3]),
                bridge_minor: Some(ex[4]),
                api_level: ApiLevel::V3,
            });
        }

        let jtag_minor = ((raw >> 6) & 0x3F) as u8;
        let api_level = if jtag_minor <= 11 { ApiLevel::V1 } else { ApiLevel::V2 };
        let low6 = (raw & 0x3F) as u8;
        let (swim_minor, mass_minor) = match transport.generation() {
            Generation::V2 => (Some(low6), None),
            _ => (None, Some(low6)),
        };

        Ok(ProbeVersion {
            generation: transport.generation(),
            stlink_major,
            jtag_minor,
            swim_minor,
            mass_minor,
            bridge_minor: None,
            api_level,
        })
    }

    #[tracing::instrument(skip(transport))]
    fn leave_state(transport: &mut T) -> Result<(), StlinkError> {
        let rx = transport.xfer(&[commands::GET_CURRENT_MODE], None, Some(2))?;
        match rx[0] {
            commands::mode::DFU => {
                tracing::debug!("leaving DFU mode");
                transport.xfer(&[commands::DFU_COMMAND, commands::DFU_EXIT], None, None)?;
            }
            commands::mode::DEBUG => {
                tracing::debug!("leaving DEBUG mode");
                transport.xfer(&[commands::DEBUG_COMMAND, commands::DEBUG_EXIT], None, None)?;
            }
            commands::mode::SWIM => {
                tracing::debug!("leaving SWIM mode");
                transport.xfer(&[commands::SWIM_COMMAND, commands::SWIM_EXIT], None, None)?;
            }
            other => tracing::debug!(mode = other, "probe already in a neutral mode"),
        }
        Ok(())
    }

    #[tracing::instrument(skip(self))]
    fn set_swd_frequency(&mut self, hz: u32) -> Result<(), StlinkError> {
        match self.version.generation {
            Generation::V3 => self.set_swd_frequency_v3(hz),
            _ => self.set_swd_frequency_v2(hz),
        }
    }

    fn set_swd_frequency_v2(&mut self, hz: u32) -> Result<(), StlinkError> {
        if !self.version.supports_swd_frequency_set() {
            return Err(StlinkError::OutdatedFirmware {
                current: self.version.to_string(),
                minimum: "J22",
            });
        }
        let step = crate::constants::V2_SWD_FREQUENCIES
            .iter()
            .find(|row| row.hz <= hz)
            .ok_or(StlinkError::FrequencyTooLow)?;

        let rx = self.transport.xfer(
            &[commands::DEBUG_COMMAND, commands::SWD_SET_FREQ, step.opcode],
            None,
            Some(2),
        )?;
        if rx[0] != 0x80 {
            return Err(StlinkError::FrequencySetFailed);
        }
        tracing::debug!(hz = step.hz, "SWD frequency set (V2)");
        Ok(())
    }

    fn set_swd_frequency_v3(&mut self, hz: u32) -> Result<(), StlinkError> {
        let rx = self.transport.xfer(
            &[commands::DEBUG_COMMAND, commands::GET_COM_FREQ, 0x00],
            None,
            Some(52),
        )?;
        // `rx[8]` is probe-reported and not trustworthy on its own: cap it to
        // how many whole 4-byte entries actually fit after offset 12, so a
        // probe claiming more entries than the 52-byte reply can hold can't
        // walk `u32le` past the end of `rx` (pyswd just truncates the same way).
        let max_entries = (rx.len() - 12) / 4;
        let count = (rx[8] as usize).min(max_entries);
        let requested_khz = hz / 1000;
        let selected_khz = (0..count)
            .map(|i| u32le(&rx, 12 + 4 * i))
            .find(|khz| requested_khz >= *khz)
            .ok_or(StlinkError::FrequencyTooLow)?;

        let mut tx = vec![commands::DEBUG_COMMAND, commands::SET_COM_FREQ, 0x00, 0x00];
        tx.extend_from_slice(&selected_khz.to_le_bytes());
        let rx = self.transport.xfer(&tx, None, Some(2))?;
        if rx[0] != 0x80 {
            return Err(StlinkError::FrequencySetFailed);
        }
        tracing::debug!(khz = selected_khz, "SWD frequency set (V3)");
        Ok(())
    }

    /// Enters debug+SWD mode. The 2-byte response is read (to keep the
    /// transport's framing intact) but its status is never checked.
    fn enter_debug_swd(&mut self) -> Result<(), StlinkError> {
        self.transport.xfer(
            &[commands::DEBUG_COMMAND, commands::ENTER, commands::ENTER_SWD],
            None,
            Some(2),
        )?;
        Ok(())
    }

    /// Target supply voltage in volts, or `None` if the probe reports a
    /// zero reference (division by zero avoided, not an error).
    pub fn get_target_voltage(&mut self) -> Result<Option<f32>, StlinkError> {
        let rx = self.transport.xfer(&[commands::GET_TARGET_VOLTAGE], None, Some(8))?;
        let a0 = u32le(&rx, 0);
        let a1 = u32le(&rx, 4);
        if a0 == 0 {
            return Ok(None);
        }
        let volts = 2.0 * a1 as f32 * 1.2 / a0 as f32;
        Ok(Some((volts * 100.0).round() / 100.0))
    }

    /// Reads IDCODE via `READ_IDCODES`. Fails with [`StlinkError::NoIdcode`]
    /// if the target reports zero (disconnected/unpowered).
    pub fn get_idcode(&mut self) -> Result<u32, StlinkError> {
        let rx = self
            .transport
            .xfer(&[commands::DEBUG_COMMAND, commands::READ_IDCODES], None, Some(12))?;
        let idcode = u32le(&rx, 4);
        if idcode == 0 {
            return Err(StlinkError::NoIdcode);
        }
        Ok(idcode)
    }

    pub fn get_reg(&mut self, register: u8) -> Result<u32, StlinkError> {
        let rx = self
            .transport
            .xfer(&[commands::DEBUG_COMMAND, commands::READREG, register], None, Some(8))?;
        Ok(u32le(&rx, 4))
    }

    pub fn set_reg(&mut self, register: u8, value: u32) -> Result<(), StlinkError> {
        let tx = [commands::DEBUG_COMMAND, commands::WRITEREG, register]
            .into_iter()
            .chain(value.to_le_bytes())
            .collect::<Vec<_>>();
        self.transport.xfer(&tx, None, Some(2))?;
        Ok(())
    }

    pub fn get_reg_all(&mut self) -> Result<Vec<u32>, StlinkError> {
        let rx = self
            .transport
            .xfer(&[commands::DEBUG_COMMAND, commands::READALLREGS], None, Some(88))?;
        Ok((0..21).map(|i| u32le(&rx, 4 + 4 * i)).collect())
    }

    fn require_aligned(address: u32, width: u32) -> Result<(), StlinkError> {
        if address % width != 0 {
            return Err(StlinkError::AlignmentError(width as usize));
        }
        Ok(())
    }

    pub fn get_mem32(&mut self, address: u32) -> Result<u32, StlinkError> {
        Self::require_aligned(address, 4)?;
        let tx = [commands::DEBUG_COMMAND, commands::READDEBUGREG]
            .into_iter()
            .chain(address.to_le_bytes())
            .collect::<Vec<_>>();
        let rx = self.transport.xfer(&tx, None, Some(8))?;
        Ok(u32le(&rx, 4))
    }

    pub fn set_mem32(&mut self, address: u32, value: u32) -> Result<(), StlinkError> {
        Self::require_aligned(address, 4)?;
        let tx = [commands::DEBUG_COMMAND, commands::WRITEDEBUGREG]
            .into_iter()
            .chain(address.to_le_bytes())
            .chain(value.to_le_bytes())
            .collect::<Vec<_>>();
        self.transport.xfer(&tx, None, Some(2))?;
        Ok(())
    }

    pub fn read_mem8(&mut self, address: u32, length: usize) -> Result<Vec<u8>, StlinkError> {
        if length > crate::constants::MAX_8BIT_TRANSFER {
            return Err(StlinkError::TransferTooLarge(length, crate::constants::MAX_8BIT_TRANSFER));
        }
        let tx = [commands::DEBUG_COMMAND, commands::READMEM_8BIT]
            .into_iter()
            .chain(address.to_le_bytes())
            .chain((length as u32).to_le_bytes())
            .collect::<Vec<_>>();
        self.transport.xfer(&tx, None, Some(length))
    }

    pub fn write_mem8(&mut self, address: u32, data: &[u8]) -> Result<(), StlinkError> {
        if data.len() > crate::constants::MAX_8BIT_TRANSFER {
            return Err(StlinkError::TransferTooLarge(data.len(), crate::constants::MAX_8BIT_TRANSFER));
        }
        let tx = [commands::DEBUG_COMMAND, commands::WRITEMEM_8BIT]
            .into_iter()
            .chain(address.to_le_bytes())
            .chain((data.len() as u32).to_le_bytes())
            .collect::<Vec<_>>();
        self.transport.xfer(&tx, Some(data), None)?;
        Ok(())
    }

    fn require_mem16_supported(&self) -> Result<(), StlinkError> {
        if self.version.api_level == ApiLevel::V1 || !self.version.supports_mem16() {
            return Err(StlinkError::OutdatedFirmware {
                current: self.version.to_string(),
                minimum: "J29",
            });
        }
        Ok(())
    }

    pub fn read_mem16(&mut self, address: u32, length: usize) -> Result<Vec<u8>, StlinkError> {
        self.require_mem16_supported()?;
        Self::require_aligned(address, 2)?;
        if length % 2 != 0 {
            return Err(StlinkError::AlignmentError(2));
        }
        let max = self.transport.maximum_transfer_size();
        if length > max {
            return Err(StlinkError::TransferTooLarge(length, max));
        }
        let tx = [commands::DEBUG_COMMAND, commands::READMEM_16BIT]
            .into_iter()
            .chain(address.to_le_bytes())
            .chain((length as u32).to_le_bytes())
            .collect::<Vec<_>>();
        self.transport.xfer(&tx, None, Some(length))
    }

    pub fn write_mem16(&mut self, address: u32, data: &[u8]) -> Result<(), StlinkError> {
        self.require_mem16_supported()?;
        Self::require_aligned(address, 2)?;
        if data.len() % 2 != 0 {
            return Err(StlinkError::AlignmentError(2));
        }
        let max = self.transport.maximum_transfer_size();
        if data.len() > max {
            return Err(StlinkError::TransferTooLarge(data.len(), max));
        }
        let tx = [commands::DEBUG_COMMAND, commands::WRITEMEM_16BIT]
            .into_iter()
            .chain(address.to_le_bytes())
            .chain((data.len() as u32).to_le_bytes())
            .collect::<Vec<_>>();
        self.transport.xfer(&tx, Some(data), None)?;
        Ok(())
    }

    pub fn read_mem32(&mut self, address: u32, length: usize) -> Result<Vec<u8>, StlinkError> {
        Self::require_aligned(address, 4)?;
        if length % 4 != 0 {
            return Err(StlinkError::AlignmentError(4));
        }
        let max = self.transport.maximum_transfer_size();
        if length > max {
            return Err(StlinkError::TransferTooLarge(length, max));
        }
        let tx = [commands::DEBUG_COMMAND, commands::READMEM_32BIT]
            .into_iter()
            .chain(address.to_le_bytes())
            .chain((length as u32).to_le_bytes())
            .collect::<Vec<_>>();
        self.transport.xfer(&tx, None, Some(length))
    }

    pub fn write_mem32(&mut self, address: u32, data: &[u8]) -> Result<(), StlinkError> {
        Self::require_aligned(address, 4)?;
        if data.len() % 4 != 0 {
            return Err(StlinkError::AlignmentError(4));
        }
        let max = self.transport.maximum_transfer_size();
        if data.len() > max {
            return Err(StlinkError::TransferTooLarge(data.len(), max));
        }
        let tx = [commands::DEBUG_COMMAND, commands::WRITEMEM_32BIT]
            .into_iter()
            .chain(address.to_le_bytes())
            .chain((data.len() as u32).to_le_bytes())
            .collect::<Vec<_>>();
        self.transport.xfer(&tx, Some(data), None)?;
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::transport::MockTransport;

    #[test]
    fn version_handshake_v2_1_api2() {
        let mut t = MockTransport::new(Generation::V2_1);
        // ver = 0x2360 => major=2, jtag=(0x2360>>6)&0x3F=13, low6=0x2360&0x3F=32
        t.push_response(vec![0x23, 0x60, 0, 0, 0, 0]);
        t.push_response(vec![commands::mode::MASS, 0]); // already idle, nothing to exit
        t.push_response(vec![0, 0]); // enter_debug_swd response
        let session = ProbeSession::new(t, None).unwrap();
        assert_eq!(session.version().stlink_major, 2);
        assert_eq!(session.version().jtag_minor, 13);
        assert_eq!(session.version().mass_minor, Some(32));
        assert_eq!(session.version().to_string(), "ST-Link/V2-1 V2J13M32");
    }

    #[test]
    fn mode_exit_from_debug_sends_debug_exit_command() {
        let mut t = MockTransport::new(Generation::V2_1);
        t.push_response(vec![0x23, 0x60, 0, 0, 0, 0]);
        t.push_response(vec![commands::mode::DEBUG, 0]);
        t.push_response(vec![]); // DEBUG_EXIT fire-and-forget, no rx
        t.push_response(vec![0, 0]); // enter_debug_swd
        let _session = ProbeSession::new(t, None).unwrap();
    }

    #[test]
    fn frequency_v2_requesting_1mhz_picks_950khz_row() {
        // raw = (2 << 12) | (22 << 6) = 0x2000 | 0x0580 = 0x2580; jtag = 22.
        let mut t = MockTransport::new(Generation::V2_1);
        t.push_response(vec![0x25, 0x80, 0, 0, 0, 0]);
        t.push_response(vec![commands::mode::MASS, 0]);
        t.push_response(vec![0x80, 0]); // freq set ok
        t.push_response(vec![0, 0]); // enter_debug_swd
        let session = ProbeSession::new(t, Some(1_000_000)).unwrap();
        assert_eq!(session.version().jtag_minor, 22);
    }

    #[test]
    fn frequency_v2_requesting_10khz_is_too_low() {
        let mut t = MockTransport::new(Generation::V2_1);
        t.push_response(vec![0x25, 0x80, 0, 0, 0, 0]);
        t.push_response(vec![commands::mode::MASS, 0]);
        let err = ProbeSession::new(t, Some(10_000)).unwrap_err();
        assert!(matches!(err, StlinkError::FrequencyTooLow));
    }

    #[test]
    fn idcode_zero_fails() {
        let mut t = MockTransport::new(Generation::V2_1);
        t.push_response(vec![0x25, 0x80, 0, 0, 0, 0]);
        t.push_response(vec![commands::mode::MASS, 0]);
        t.push_response(vec![0, 0]);
        let mut session = ProbeSession::new(t, None).unwrap();
        session.transport.push_response(vec![0u8; 12]);
        let err = session.get_idcode().unwrap_err();
        assert!(matches!(err, StlinkError::NoIdcode));
    }

    #[test]
    fn mem32_rejects_unaligned_address_before_any_wire_io() {
        let mut t = MockTransport::new(Generation::V2_1);
        t.push_response(vec![0x25, 0x80, 0, 0, 0, 0]);
        t.push_response(vec![commands::mode::MASS, 0]);
        t.push_response(vec![0, 0]);
        let mut session = ProbeSession::new(t, None).unwrap();
        let calls_before = session.transport.calls.len();
        let err = session.get_mem32(2).unwrap_err();
        assert!(matches!(err, StlinkError::AlignmentError(4)));
        assert_eq!(session.transport.calls.len(), calls_before);
    }

    #[test]
    fn mem8_rejects_oversized_transfer() {
        let mut t = MockTransport::new(Generation::V2_1);
        t.push_response(vec![0x25, 0x80, 0, 0, 0, 0]);
        t.push_response(vec![commands::mode::MASS, 0]);
        t.push_response(vec![0, 0]);
        let mut session = ProbeSession::new(t, None).unwrap();
        let err = session.read_mem8(0x2000_0000, 65).unwrap_err();
        assert!(matches!(err, StlinkError::TransferTooLarge(65, 64)));
    }
}
