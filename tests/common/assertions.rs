// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 itsakeyfut
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Custom assertions for bus testing

use adamnet::core::control_block::{dcb, pcb};
use adamnet::core::{AdamNet, BlockRef};

/// Assert the byte in a device's command/status field
#[allow(dead_code)]
pub fn assert_posted(bus: &AdamNet, device_id: u8, expected: u8) {
    let actual = bus
        .read_field(BlockRef::Dcb(device_id), dcb::CMD_STAT)
        .expect("device not announced");
    assert_eq!(
        actual, expected,
        "Device 0x{:02X} status mismatch: expected 0x{:02X}, got 0x{:02X}",
        device_id, expected, actual
    );
}

/// Assert the PCB command/status byte
#[allow(dead_code)]
pub fn assert_pcb_status(bus: &AdamNet, expected: u8) {
    let actual = bus.read_field(BlockRef::Pcb, pcb::CMD_STAT).unwrap();
    assert_eq!(
        actual, expected,
        "PCB status mismatch: expected 0x{:02X}, got 0x{:02X}",
        expected, actual
    );
}

/// Assert a device's announced parameters
#[allow(dead_code)]
pub fn assert_announced(bus: &AdamNet, device_id: u8, message_size: u16, is_block: bool) {
    let record = bus
        .registry()
        .lookup(device_id)
        .unwrap_or_else(|e| panic!("Device 0x{:02X}: {}", device_id, e));
    assert_eq!(
        (record.message_size, record.is_block),
        (message_size, is_block),
        "Device 0x{:02X} announced parameters mismatch",
        device_id
    );
}

/// Assert every control-block byte is zero
#[allow(dead_code)]
pub fn assert_zeroed(bus: &AdamNet) {
    assert!(bus.store().is_zeroed(), "control blocks not zeroed");
}
