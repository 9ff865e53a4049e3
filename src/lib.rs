//! Host-side protocol core for ST-Link/V2 and V3 debug probes.
//!
//! This crate speaks the ST-Link's command-multiplexed USB protocol over
//! anything implementing [`Transport`](transport::Transport) — a real
//! `rusb`-backed device (behind the `usb` feature) or a test double — and
//! exposes a [`ProbeSession`](session::ProbeSession) for memory/register
//! access plus an STM32 [MCU identifier](mcu) built on top of it.
//!
//! ```no_run
//! use stlink_core::mcu::{catalog, identify};
//! use stlink_core::session::ProbeSession;
//!
//! # #[cfg(feature = "usb")]
//! # fn run() -> Result<(), stlink_core::error::StlinkError> {
//! let transport = stlink_core::usb::RusbTransport::open(None)?;
//! let mut session = ProbeSession::new(transport, Some(4_000_000))?;
//! let mcu = identify(
//!     &mut session,
//!     catalog::STM32F1_MCUS,
//!     catalog::STM32F1_FAMILY_PREFIX,
//!     catalog::STM32F1_IDCODE_REG,
//!     Some(catalog::STM32F1_FLASH_SIZE_REG),
//!     None,
//! )?;
//! println!("{} ({} bytes flash)", mcu.name(), mcu.flash_size_bytes());
//! # Ok(())
//! # }
//! ```

pub mod codec;
pub mod constants;
pub mod error;
pub mod mcu;
pub mod memory;
pub mod session;
pub mod transport;
#[cfg(feature = "usb")]
pub mod usb;
pub mod version;

pub use crate::error::StlinkError;
pub use crate::mcu::{identify, DetectedMcu, McuSpec};
pub use crate::session::ProbeSession;
pub use crate::transport::{Generation, Transport};
pub use crate::version::ProbeVersion;
