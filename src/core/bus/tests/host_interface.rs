// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 itsakeyfut

use super::super::*;
use super::*;
use crate::core::device::{KEYBOARD_ID, NET_CLOCK_ID};

#[test]
fn test_power_on_layout() {
    let bus = default_bus();

    assert_eq!(bus.read(0xFEC0 + pcb::MAX_DCB as u16).unwrap(), 2);
    assert_eq!(bus.read(0xFEC1).unwrap(), 0xC0);
    assert_eq!(bus.read(0xFEC2).unwrap(), 0xFE);

    let kbd = bus.dcb_address(0, 0);
    assert_eq!(kbd, 0xFEC4);
    assert_eq!(bus.read(kbd + dcb::DEV_NUM as u16).unwrap(), KEYBOARD_ID);
    assert_eq!(bus.read(kbd + dcb::MAXL_LO as u16).unwrap(), 1);
    assert_eq!(bus.read(kbd + dcb::DEV_TYPE as u16).unwrap(), device_type::CHARACTER);
    assert_eq!(bus.read(kbd + dcb::RETRY_LO as u16).unwrap(), 16);

    let clk = bus.dcb_address(1, 0);
    assert_eq!(clk, 0xFED9);
    assert_eq!(bus.read(clk + dcb::NODE_TYPE as u16).unwrap(), NET_CLOCK_ID);
}

#[test]
fn test_window_bounds() {
    let bus = default_bus();
    let last = 0xFEC0 + bus.store().window_size() as u16 - 1;

    assert!(bus.contains(0xFEC0));
    assert!(bus.contains(last));
    assert!(!bus.contains(last + 1));
    assert!(!bus.contains(0xFEBF));
    assert!(matches!(
        bus.read(0xFEBF),
        Err(AdamNetError::AddressOutOfRange { address: 0xFEBF })
    ));
}

#[test]
fn test_plain_write_does_not_dispatch() {
    let mut bus = default_bus();
    let addr = bus.dcb_address(1, dcb::BUF_LEN_LO);

    assert_eq!(bus.write(addr, 0x00).unwrap(), None);
    assert!(bus.response_frame(NET_CLOCK_ID).is_none());
}

#[test]
fn test_command_write_dispatches() {
    let mut bus = default_bus();
    let addr = bus.dcb_address(1, dcb::CMD_STAT);

    assert_eq!(
        bus.write(addr, cmd::STATUS).unwrap(),
        Some(Dispatch::Posted(rsp::STATUS))
    );
    assert_eq!(bus.read(addr).unwrap(), rsp::STATUS);
}

#[test]
fn test_command_to_unbound_slot_is_nack() {
    let mut bus = default_bus();
    let addr = bus.dcb_address(5, dcb::CMD_STAT);

    assert_eq!(
        bus.write(addr, cmd::STATUS).unwrap(),
        Some(Dispatch::Posted(rsp::NACK))
    );
    assert_eq!(bus.read(addr).unwrap(), rsp::NACK);
}

#[test]
fn test_reads_are_pure() {
    let bus = default_bus();
    bus.push_key(0x41);
    let before: Vec<u8> = (0..bus.store().window_size() as u16)
        .map(|i| bus.read8(0xFEC0 + i))
        .collect();

    let after: Vec<u8> = (0..bus.store().window_size() as u16)
        .map(|i| bus.read8(0xFEC0 + i))
        .collect();

    assert_eq!(before, after);
    assert_eq!(bus.keyboard().unwrap().len(), 1);
}

#[test]
fn test_write8_dispatches() {
    let mut bus = default_bus();
    let addr = bus.dcb_address(0, dcb::CMD_STAT);

    bus.write8(addr, cmd::STATUS);

    assert_eq!(bus.read8(addr), rsp::STATUS);
}

#[test]
#[cfg(debug_assertions)]
#[should_panic(expected = "read8")]
fn test_read8_outside_window_asserts() {
    let bus = default_bus();
    bus.read8(0x0000);
}

#[test]
fn test_field_access_errors() {
    let mut bus = default_bus();

    assert!(matches!(
        bus.read_field(BlockRef::Pcb, pcb::SIZE),
        Err(AdamNetError::OutOfRange { .. })
    ));
    assert!(matches!(
        bus.read_field(BlockRef::Dcb(KEYBOARD_ID), dcb::SIZE),
        Err(AdamNetError::OutOfRange { .. })
    ));
    assert!(matches!(
        bus.read_field(BlockRef::Dcb(0x08), dcb::CMD_STAT),
        Err(AdamNetError::OutOfRange { .. })
    ));
    assert!(matches!(
        bus.write_field(BlockRef::Dcb(0x08), dcb::CMD_STAT, 1),
        Err(AdamNetError::OutOfRange { .. })
    ));
}

#[test]
fn test_reset_is_idempotent() {
    let mut bus = default_bus();
    command(&mut bus, NET_CLOCK_ID, cmd::STATUS);

    bus.reset();
    assert!(bus.store().is_zeroed());
    assert_eq!(bus.registry().records().count(), 0);
    assert!(bus.response_frame(NET_CLOCK_ID).is_none());

    bus.reset();
    assert!(bus.store().is_zeroed());
    assert_eq!(bus.state(), PcbState::Idle);

    // Attached but unannounced devices look absent
    assert_eq!(
        command(&mut bus, NET_CLOCK_ID, cmd::STATUS),
        Dispatch::Posted(rsp::NACK)
    );
    assert!(bus.registry().is_attached(NET_CLOCK_ID));
}

#[test]
fn test_announce_errors() {
    let config = BusConfig {
        max_dcbs: 1,
        ..BusConfig::default()
    };
    let bus = AdamNet::from_config(&config).unwrap();

    // Only the keyboard fits
    assert!(bus.registry().lookup(KEYBOARD_ID).is_ok());
    assert!(bus.registry().lookup(NET_CLOCK_ID).is_err());

    let mut bus = bus;
    assert!(matches!(
        bus.announce(NET_CLOCK_ID, 1, false),
        Err(AdamNetError::NoFreeDcb(NET_CLOCK_ID))
    ));
    assert!(matches!(
        bus.announce(0x08, 256, true),
        Err(AdamNetError::UnknownDevice(0x08))
    ));
}

#[test]
fn test_zero_retry_count_rejected() {
    let config = BusConfig {
        retry_count: 0,
        ..BusConfig::default()
    };
    assert!(matches!(
        AdamNet::new(&config),
        Err(AdamNetError::Config(_))
    ));
}
