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

//! Test fixtures for common bus scenarios

use adamnet::core::config::BusConfig;
use adamnet::core::control_block::dcb;
use adamnet::core::device::netclock::NetDevice;
use adamnet::core::device::{cmd, KEYBOARD_ID};
use adamnet::core::{AdamNet, BlockRef, BusMessage, Dispatch};

/// Bus with the default devices, powered on
#[allow(dead_code)]
pub fn create_default_bus() -> AdamNet {
    AdamNet::from_config(&BusConfig::default()).expect("default config is valid")
}

/// Bus holding only the network clock, powered on
#[allow(dead_code)]
pub fn create_clock_bus() -> AdamNet {
    let mut bus = AdamNet::new(&BusConfig::default()).expect("default config is valid");
    bus.attach(Box::new(NetDevice::clock()));
    bus.power_on();
    bus
}

/// Bus with custom settings and the configured devices attached
#[allow(dead_code)]
pub fn create_bus_with(config: BusConfig) -> AdamNet {
    AdamNet::from_config(&config).expect("Failed to build bus")
}

/// Send a device command
#[allow(dead_code)]
pub fn send(bus: &mut AdamNet, device_id: u8, command: u8) -> Dispatch {
    bus.dispatch(BusMessage::Device { device_id, command })
}

/// Send a PCB command
#[allow(dead_code)]
pub fn send_pcb(bus: &mut AdamNet, command: u8) -> Dispatch {
    bus.dispatch(BusMessage::Pcb { command })
}

/// Set the transaction code a device will echo back
#[allow(dead_code)]
pub fn set_tx_code(bus: &mut AdamNet, device_id: u8, tx_code: u8) {
    bus.write_field(BlockRef::Dcb(device_id), dcb::ADD_CODE, tx_code)
        .expect("Failed to write ADD_CODE");
}

/// Read one key the way the host does: Receive through memory, then Ack
#[allow(dead_code)]
pub fn host_receive_key(bus: &mut AdamNet) -> Option<u8> {
    let slot = bus.registry().lookup(KEYBOARD_ID).ok()?.slot as usize;
    let command = bus.dcb_address(slot, dcb::CMD_STAT);

    bus.write(bus.dcb_address(slot, dcb::BUF_LEN_LO), 1)
        .expect("Failed to write buffer length");
    let posted = bus.write(command, cmd::RECEIVE).expect("Failed to write command");
    if posted != Some(Dispatch::Posted(0xB0)) {
        return None;
    }
    let key = bus
        .response_frame(KEYBOARD_ID)
        .and_then(|frame| frame.payload())
        .and_then(|payload| payload.first().copied());
    bus.write(command, cmd::ACK).expect("Failed to write Ack");
    key
}
