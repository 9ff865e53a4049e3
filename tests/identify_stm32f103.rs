//! End-to-end identification of an STM32F103C8 over a scripted transport,
//! covering the full handshake -> identify -> memory-map pipeline in one
//! pass (spec scenario: "Identify STM32F103C8").

use stlink_core::mcu::catalog;
use stlink_core::session::ProbeSession;
use stlink_core::transport::{Generation, MockTransport};

/// Queues the three responses every `ProbeSession::new(_, None)` consumes:
/// version handshake, mode-exit probe, and the (discarded) enter-SWD ack.
fn scripted_handshake() -> MockTransport {
    let mut t = MockTransport::new(Generation::V2_1);
    // ver = 0x2740 => major=2, jtag=29, mass=0. identify() reads flash size
    // through read_mem16, which is gated on jtag>=29.
    t.push_response(vec![0x27, 0x40, 0, 0, 0, 0]);
    // Already in a neutral mode (MASS), no exit command needed.
    t.push_response(vec![stlink_core::constants::commands::mode::MASS, 0]);
    // enter_debug_swd response (discarded).
    t.push_response(vec![0, 0]);
    t
}

#[test]
fn identifies_stm32f103c8_by_dev_id_and_flash_size() {
    let mut t = scripted_handshake();
    // get_mem32(IDCODE_REG) -> 0x20036410, dev_id = 0x410.
    t.push_response(vec![0, 0, 0, 0, 0x10, 0x64, 0x03, 0x20]);
    // read_mem16(F_SIZE, 2) -> 64 (kB).
    t.push_response(vec![64, 0]);

    let mut session = ProbeSession::new(t, None).expect("session should open");
    let mcu = stlink_core::mcu::identify(
        &mut session,
        catalog::STM32F1_MCUS,
        catalog::STM32F1_FAMILY_PREFIX,
        catalog::STM32F1_IDCODE_REG,
        Some(catalog::STM32F1_FLASH_SIZE_REG),
        Some(&["STM32F103C8"]),
    )
    .expect("identification should succeed");

    assert_eq!(mcu.flash_size_bytes(), 65536);
    assert_eq!(mcu.family_name(), "STM32");
    assert!(mcu.name().starts_with("STM32F103"));
    let regions = mcu.memory_regions().expect("single candidate, no ambiguity");
    assert_eq!(regions.get_size("FLASH"), 65536);
}

#[test]
fn unmatched_expected_name_fails_with_candidates_surfaced() {
    let mut t = scripted_handshake();
    t.push_response(vec![0, 0, 0, 0, 0x10, 0x64, 0x03, 0x20]);
    t.push_response(vec![64, 0]);

    let mut session = ProbeSession::new(t, None).expect("session should open");
    let err = stlink_core::mcu::identify(
        &mut session,
        catalog::STM32F1_MCUS,
        catalog::STM32F1_FAMILY_PREFIX,
        catalog::STM32F1_IDCODE_REG,
        Some(catalog::STM32F1_FLASH_SIZE_REG),
        Some(&["NRF52840"]),
    )
    .unwrap_err();

    assert!(matches!(err, stlink_core::StlinkError::McuNotMatch { .. }));
}

#[test]
fn unknown_dev_id_fails_identification() {
    let mut t = scripted_handshake();
    // dev_id = 0xFFF, not present in the STM32F1 catalog.
    t.push_response(vec![0, 0, 0, 0, 0xFF, 0x0F, 0, 0]);

    let mut session = ProbeSession::new(t, None).expect("session should open");
    let err = stlink_core::mcu::identify(
        &mut session,
        catalog::STM32F1_MCUS,
        catalog::STM32F1_FAMILY_PREFIX,
        catalog::STM32F1_IDCODE_REG,
        Some(catalog::STM32F1_FLASH_SIZE_REG),
        None,
    )
    .unwrap_err();

    assert!(matches!(
        err,
        stlink_core::StlinkError::UnknownMcuDetected { dev_id: 0xFFF, flash_size_bytes: None }
    ));
}
