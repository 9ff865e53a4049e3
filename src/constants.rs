//! Wire-protocol constants: command opcodes and the V2 static frequency table.

/// Command opcode bytes, grouped the way the probe's command tree is grouped.
pub mod commands {
    /// Top-level command, no group prefix.
    pub const GET_VERSION: u8 = 0xF1;
    pub const GET_CURRENT_MODE: u8 = 0xF5;
    pub const GET_TARGET_VOLTAGE: u8 = 0xF7;
    pub const GET_VERSION_EX: u8 = 0xFB;

    /// Mode identifiers returned by `GET_CURRENT_MODE`.
    pub mod mode {
        pub const DFU: u8 = 0x00;
        pub const MASS: u8 = 0x01;
        pub const DEBUG: u8 = 0x02;
        pub const SWIM: u8 = 0x03;
        pub const BOOTLOADER: u8 = 0x04;
    }

    /// Group prefixes, sent as the first byte of a group command.
    pub const DFU_COMMAND: u8 = 0xF3;
    pub const SWIM_COMMAND: u8 = 0xF4;
    pub const DEBUG_COMMAND: u8 = 0xF2;

    /// Mode-exit opcodes, sent as the second byte after the matching group prefix.
    pub const DFU_EXIT: u8 = 0x07;
    pub const SWIM_EXIT: u8 = 0x01;
    pub const DEBUG_EXIT: u8 = 0x21;

    /// Debug-group bulk memory opcodes.
    pub const READMEM_32BIT: u8 = 0x07;
    pub const WRITEMEM_32BIT: u8 = 0x08;
    pub const READMEM_8BIT: u8 = 0x0C;
    pub const WRITEMEM_8BIT: u8 = 0x0D;
    pub const ENTER_SWD: u8 = 0xA3;

    /// APIv2 opcodes.
    pub const ENTER: u8 = 0x30;
    pub const READ_IDCODES: u8 = 0x31;
    pub const WRITEDEBUGREG: u8 = 0x35;
    pub const READDEBUGREG: u8 = 0x36;
    pub const READREG: u8 = 0x33;
    pub const WRITEREG: u8 = 0x34;
    pub const READALLREGS: u8 = 0x3A;
    pub const SWD_SET_FREQ: u8 = 0x43;
    pub const READMEM_16BIT: u8 = 0x47;
    pub const WRITEMEM_16BIT: u8 = 0x48;

    /// APIv3 opcodes.
    pub const SET_COM_FREQ: u8 = 0x61;
    pub const GET_COM_FREQ: u8 = 0x62;
}

/// A requested-frequency-to-opcode row in the V2 static frequency table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SwdFrequencyStep {
    pub hz: u32,
    pub opcode: u8,
}

/// The V2 SWD frequency table, in descending order of `hz`. V3 probes
/// discover their own table at runtime via `GET_COM_FREQ` instead.
pub const V2_SWD_FREQUENCIES: &[SwdFrequencyStep] = &[
    SwdFrequencyStep { hz: 4_000_000, opcode: 0 },
    SwdFrequencyStep { hz: 1_800_000, opcode: 1 },
    SwdFrequencyStep { hz: 1_200_000, opcode: 2 },
    SwdFrequencyStep { hz: 950_000, opcode: 3 },
    SwdFrequencyStep { hz: 480_000, opcode: 7 },
    SwdFrequencyStep { hz: 240_000, opcode: 15 },
    SwdFrequencyStep { hz: 125_000, opcode: 31 },
    SwdFrequencyStep { hz: 100_000, opcode: 40 },
    SwdFrequencyStep { hz: 50_000, opcode: 79 },
    SwdFrequencyStep { hz: 25_000, opcode: 158 },
];

/// Minimum firmware that supports setting the V2 SWD frequency at all.
pub const MIN_JTAG_FOR_SWD_FREQ: u8 = 22;

/// Minimum firmware that supports 16-bit memory access.
pub const MIN_JTAG_FOR_MEM16: u8 = 29;

/// Per-request byte cap for 8-bit memory operations (USB packet limit).
pub const MAX_8BIT_TRANSFER: usize = 64;

/// Default per-request byte cap for 16/32-bit memory operations.
pub const DEFAULT_MAX_TRANSFER: usize = 1024;

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn frequency_table_is_descending() {
        for pair in V2_SWD_FREQUENCIES.windows(2) {
            assert!(pair[0].hz > pair[1].hz);
        }
    }

    #[test]
    fn frequency_table_first_row_is_4mhz() {
        assert_eq!(V2_SWD_FREQUENCIES[0].hz, 4_000_000);
        assert_eq!(V2_SWD_FREQUENCIES[0].opcode, 0);
    }

    #[test]
    fn frequency_table_last_row_is_25khz() {
        let last = V2_SWD_FREQUENCIES.last().unwrap();
        assert_eq!(last.hz, 25_000);
        assert_eq!(last.opcode, 158);
    }
}
