//! Error taxonomy for the ST-Link protocol core.

use thiserror::Error;

/// Everything that can go wrong while talking to an ST-Link probe or
/// identifying the attached MCU.
#[derive(Debug, Error, docsplay::Display)]
pub enum StlinkError {
    /// USB transport failure.
    Transport(#[from] TransportError),

    /// Firmware is too old: have `{current}`, need at least `{minimum}`.
    OutdatedFirmware {
        /// The version string read from the probe.
        current: String,
        /// The minimum required version string.
        minimum: &'static str,
    },

    /// Requested SWD frequency is below every frequency step the probe supports.
    FrequencyTooLow,

    /// Probe rejected the frequency-set command.
    FrequencySetFailed,

    /// No IDCODE was read back; the target is likely disconnected or unpowered.
    NoIdcode,

    /// Address or length is not aligned to {0} bytes.
    AlignmentError(usize),

    /// Transfer of {0} bytes exceeds the {1}-byte limit for this operation.
    TransferTooLarge(usize, usize),

    /// No catalog entry matches dev_id 0x{dev_id:03x} (flash size {flash_size_bytes:?}).
    UnknownMcuDetected {
        /// 12-bit DEV_ID read from DBGMCU_IDCODE.
        dev_id: u16,
        /// Flash size in bytes, once known; `None` before that stage.
        flash_size_bytes: Option<u32>,
    },

    /// None of the detected candidates {detected:?} match the expected names {expected:?}.
    McuNotMatch {
        /// Part names that survived dev_id/flash-size filtering.
        detected: Vec<String>,
        /// Part names the caller expected.
        expected: Vec<String>,
    },

    /// More than one MCU candidate remains; the memory map is ambiguous.
    MemoryMapAmbiguous,

    /// More than one MCU candidate remains; the SVD file is ambiguous.
    SvdAmbiguous,

    /// Remaining candidates disagree on a family-level constant that must be unanimous.
    CatalogConflict,
}

/// USB/transport-level failures, independent of the ST-Link command protocol.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The underlying USB stack reported an error.
    #[error("USB error: {0}")]
    Usb(#[from] Box<dyn std::error::Error + Send + Sync>),

    /// The transport returned fewer bytes than the command expected.
    #[error("short read: expected {expected} bytes, got {actual}")]
    ShortRead {
        /// Bytes the caller asked for.
        expected: usize,
        /// Bytes actually returned.
        actual: usize,
    },

    /// No matching ST-Link device was found during enumeration.
    #[error("no ST-Link device found")]
    ProbeNotFound,
}
