// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 itsakeyfut

//! Device tests
//!
//! - `context`: handler-side DCB access rules
//! - `keyboard`: key queue and keyboard command handling
//! - `netclock`: network clock / adapter command handling


use super::*;

/// Run one command against a device on a scratch DCB
///
/// Returns the DCB bytes after the call and what the handler produced.
pub(super) fn run(
    device: &mut dyn PeripheralDevice,
    command: u8,
    additional_code: u8,
) -> (DcbBytes, Outcome) {
    let mut block: DcbBytes = [0; dcb::SIZE];
    block[dcb::CMD_STAT] = command;
    block[dcb::ADD_CODE] = additional_code;
    let snapshot = Dcb::from_bytes(&block);
    let caps = device.capabilities();

    let mut ctx = DeviceContext::new(device.device_id(), caps.message_size, &mut block);
    device.handle(command, &snapshot, &mut ctx);
    let outcome = ctx.finish();
    (block, outcome)
}
