// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 itsakeyfut

//! Bus dispatcher tests
//!
//! - `pcb_state`: PCB state machine and window relocation
//! - `dispatch`: device command routing and response posting
//! - `retry`: retry accounting and unresponsive devices
//! - `host_interface`: memory-mapped access and reset

mod host_interface;
mod retry;

use std::cell::Cell;
use std::rc::Rc;

use super::*;
use crate::core::control_block::Dcb;
use crate::core::device::Capabilities;

/// Device id used by [`Scripted`]
pub(super) const SCRIPTED_ID: u8 = 0x04;

/// Device that answers every command with a fixed response
pub(super) struct Scripted {
    caps: Capabilities,
    reply: Option<Response>,
    calls: Rc<Cell<usize>>,
}

impl Scripted {
    /// Returns the device and a counter of handler calls
    pub(super) fn new(message_size: u16, reply: Option<Response>) -> (Self, Rc<Cell<usize>>) {
        let calls = Rc::new(Cell::new(0));
        (
            Self {
                caps: Capabilities {
                    message_size,
                    is_block: false,
                },
                reply,
                calls: Rc::clone(&calls),
            },
            calls,
        )
    }
}

impl PeripheralDevice for Scripted {
    fn device_id(&self) -> u8 {
        SCRIPTED_ID
    }

    fn name(&self) -> &'static str {
        "scripted"
    }

    fn capabilities(&self) -> Capabilities {
        self.caps
    }

    fn handle(&mut self, _command: u8, _dcb: &Dcb, ctx: &mut DeviceContext<'_>) {
        self.calls.set(self.calls.get() + 1);
        if let Some(reply) = &self.reply {
            ctx.respond(reply.clone());
        }
    }
}

/// Default bus: keyboard in slot 0, network clock in slot 1
pub(super) fn default_bus() -> AdamNet {
    AdamNet::from_config(&BusConfig::default()).unwrap()
}

/// Bus holding only a scripted device, with three retries
pub(super) fn scripted_bus(
    message_size: u16,
    reply: Option<Response>,
) -> (AdamNet, Rc<Cell<usize>>) {
    let config = BusConfig {
        retry_count: 3,
        ..BusConfig::default()
    };
    let mut bus = AdamNet::new(&config).unwrap();
    let (device, calls) = Scripted::new(message_size, reply);
    bus.attach(Box::new(device));
    bus.power_on();
    (bus, calls)
}

/// Send a device command
pub(super) fn command(bus: &mut AdamNet, device_id: u8, command: u8) -> Dispatch {
    bus.dispatch(BusMessage::Device { device_id, command })
}

/// Send a PCB command
pub(super) fn pcb_command(bus: &mut AdamNet, command: u8) -> Dispatch {
    bus.dispatch(BusMessage::Pcb { command })
}

/// Retry count field of a device's DCB
pub(super) fn retries(bus: &AdamNet, device_id: u8) -> u16 {
    let lo = bus.read_field(BlockRef::Dcb(device_id), dcb::RETRY_LO).unwrap();
    let hi = bus.read_field(BlockRef::Dcb(device_id), dcb::RETRY_HI).unwrap();
    u16::from_le_bytes([lo, hi])
}
