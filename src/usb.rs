//! Real, `rusb`-backed USB transport (C8, ambient; feature `usb`).
//!
//! Grounded on the teacher's `probe/stlink/usb_interface.rs` (VID/PID ->
//! endpoint table, command-phase/data-phase bulk transfer split) and
//! `probe/stlink/tools.rs` (device enumeration, serial-number reading with
//! its length-based hex-encoding fallback). Unlike the teacher this crate's
//! `DeviceHandle` does not need `rental`'s self-referential trick: `rusb`
//! hands back a `DeviceHandle<Context>` that is independent of the `Device`
//! used to open it, so a plain struct holds it directly.

use std::collections::HashMap;
use std::time::Duration;

use rusb::UsbContext;

use crate::error::TransportError;
use crate::transport::{Generation, Transport};

/// The ST-Link USB command packet is always padded to this length before
/// the OUT-endpoint write, regardless of the logical command's length.
const CMD_LEN: usize = 16;

/// ST-Link vendor ID.
pub const USB_VID: u16 = 0x0483;

const TIMEOUT: Duration = Duration::from_millis(1000);

/// One row of the VID/PID -> (generation, endpoints) table.
#[derive(Debug, Clone, Copy)]
struct StlinkUsbInfo {
    generation: Generation,
    ep_out: u8,
    ep_in: u8,
}

fn pid_ep_map() -> HashMap<u16, StlinkUsbInfo> {
    let mut m = HashMap::new();
    m.insert(0x3748, StlinkUsbInfo { generation: Generation::V2, ep_out: 0x02, ep_in: 0x81 });
    m.insert(0x374b, StlinkUsbInfo { generation: Generation::V2_1, ep_out: 0x01, ep_in: 0x81 });
    m.insert(0x374a, StlinkUsbInfo { generation: Generation::V2_1, ep_out: 0x01, ep_in: 0x81 }); // Audio
    m.insert(0x3742, StlinkUsbInfo { generation: Generation::V2_1, ep_out: 0x01, ep_in: 0x81 }); // No MSD
    m.insert(0x374e, StlinkUsbInfo { generation: Generation::V3, ep_out: 0x01, ep_in: 0x81 });
    m.insert(0x374f, StlinkUsbInfo { generation: Generation::V3, ep_out: 0x01, ep_in: 0x81 }); // Bridge
    m.insert(0x3753, StlinkUsbInfo { generation: Generation::V3, ep_out: 0x01, ep_in: 0x81 }); // 2VCP
    m
}

/// An enumerated ST-Link, not yet opened.
///
/// Grounded on the teacher's `probe::DebugProbeInfo`, trimmed to the fields
/// this crate's consumers actually need (no HID/factory plumbing — that
/// belongs to probe-rs's multi-probe abstraction, out of scope here).
#[derive(Debug, Clone)]
pub struct DebugProbeInfo {
    pub identifier: String,
    pub vendor_id: u16,
    pub product_id: u16,
    pub serial_number: Option<String>,
}

impl std::fmt::Display for DebugProbeInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} (VID: {:04x}, PID: {:04x}", self.identifier, self.vendor_id, self.product_id)?;
        if let Some(sn) = &self.serial_number {
            write!(f, ", Serial: {sn}")?;
        }
        write!(f, ")")
    }
}

fn is_stlink_device<T: UsbContext>(device: &rusb::Device<T>, map: &HashMap<u16, StlinkUsbInfo>) -> bool {
    device
        .device_descriptor()
        .map(|d| d.vendor_id() == USB_VID && map.contains_key(&d.product_id()))
        .unwrap_or(false)
}

/// Reads a device's serial number, hex-encoding it if it looks like a raw
/// binary string rather than a printable one (observed on older V2 probes).
fn read_serial_number<T: UsbContext>(
    device: &rusb::Device<T>,
    descriptor: &rusb::DeviceDescriptor,
) -> Result<String, rusb::Error> {
    let handle = device.open()?;
    let language =
        handle.read_languages(TIMEOUT)?.into_iter().next().ok_or(rusb::Error::BadDescriptor)?;
    let sn = handle.read_serial_number_string(language, descriptor, TIMEOUT)?;
    Ok(if sn.len() < 24 {
        sn.as_bytes().iter().map(|b| format!("{b:02X}")).collect()
    } else {
        sn
    })
}

/// Enumerates every attached ST-Link without opening any of them.
#[tracing::instrument]
pub fn list_probes() -> Vec<DebugProbeInfo> {
    let map = pid_ep_map();
    let Ok(context) = rusb::Context::new() else {
        tracing::warn!("failed to create a libusb context");
        return Vec::new();
    };
    let Ok(devices) = context.devices() else {
        return Vec::new();
    };

    devices
        .iter()
        .filter(|d| is_stlink_device(d, &map))
        .filter_map(|device| {
            let descriptor = device.device_descriptor().ok()?;
            let info = map[&descriptor.product_id()];
            let serial_number = match read_serial_number(&device, &descriptor) {
                Ok(sn) => Some(sn),
                Err(e) => {
                    tracing::debug!(
                        vid = descriptor.vendor_id(),
                        pid = descriptor.product_id(),
                        error = %e,
                        "failed to read serial number, probably a missing driver"
                    );
                    None
                }
            };
            Some(DebugProbeInfo {
                identifier: format!("ST-Link/{}", info.generation),
                vendor_id: descriptor.vendor_id(),
                product_id: descriptor.product_id(),
                serial_number,
            })
        })
        .collect()
}

/// A [`Transport`] backed by a real, opened ST-Link USB device.
pub struct RusbTransport {
    handle: rusb::DeviceHandle<rusb::Context>,
    info: StlinkUsbInfo,
}

impl RusbTransport {
    /// Opens the first attached ST-Link matching `probe`'s VID/PID, or any
    /// attached ST-Link if `probe` is `None`.
    #[tracing::instrument(skip(probe))]
    pub fn open(probe: Option<&DebugProbeInfo>) -> Result<Self, TransportError> {
        let map = pid_ep_map();
        let context = rusb::Context::new().map_err(rusb_err)?;
        let device = context
            .devices()
            .map_err(rusb_err)?
            .iter()
            .find(|d| {
                d.device_descriptor().is_ok_and(|desc| {
                    let matches_map = is_stlink_device(d, &map);
                    let matches_probe = probe
                        .map(|p| desc.vendor_id() == p.vendor_id && desc.product_id() == p.product_id)
                        .unwrap_or(true);
                    matches_map && matches_probe
                })
            })
            .ok_or(TransportError::ProbeNotFound)?;

        let descriptor = device.device_descriptor().map_err(rusb_err)?;
        let info = map[&descriptor.product_id()];

        let handle = device.open().map_err(rusb_err)?;
        handle.claim_interface(0).map_err(rusb_err)?;

        tracing::debug!(generation = %info.generation, "opened ST-Link device");
        Ok(Self { handle, info })
    }
}

impl Transport for RusbTransport {
    #[tracing::instrument(skip(self, tx, data))]
    fn xfer(
        &mut self,
        tx: &[u8],
        data: Option<&[u8]>,
        rx_length: Option<usize>,
    ) -> Result<Vec<u8>, TransportError> {
        let mut cmd = tx.to_vec();
        cmd.resize(CMD_LEN, 0);

        tracing::trace!(?cmd, "writing command packet");
        let written = self.handle.write_bulk(self.info.ep_out, &cmd, TIMEOUT).map_err(rusb_err)?;
        if written != CMD_LEN {
            return Err(TransportError::ShortRead { expected: CMD_LEN, actual: written });
        }

        if let Some(data) = data {
            let written =
                self.handle.write_bulk(self.info.ep_out, data, TIMEOUT).map_err(rusb_err)?;
            if written != data.len() {
                return Err(TransportError::ShortRead { expected: data.len(), actual: written });
            }
        }

        if let Some(len) = rx_length {
            let mut buf = vec![0u8; len];
            let read = self.handle.read_bulk(self.info.ep_in, &mut buf, TIMEOUT).map_err(rusb_err)?;
            if read != len {
                return Err(TransportError::ShortRead { expected: len, actual: read });
            }
            return Ok(buf);
        }

        Ok(Vec::new())
    }

    fn maximum_transfer_size(&self) -> usize {
        crate::constants::DEFAULT_MAX_TRANSFER
    }

    fn generation(&self) -> Generation {
        self.info.generation
    }
}

impl Drop for RusbTransport {
    fn drop(&mut self) {
        let _ = self.handle.release_interface(0);
    }
}

fn rusb_err(e: rusb::Error) -> TransportError {
    TransportError::Usb(Box::new(e))
}
