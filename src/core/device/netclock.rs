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

//! Virtual network devices
//!
//! Two character devices sharing one command contract around a latched status
//! byte: the network clock and the network adapter. They differ only in that
//! the adapter re-announces itself on `Status` as well as on `SoftReset`.
//!
//! ```text
//! Code | Action
//! -----|-------------------------------------------------------------
//! 0x00 | Clear latch, re-announce, post Status
//! 0x01 | Latch 0x80, post Status (adapter: also re-announce)
//! 0x02 | SoftReset: re-announce (size 1, character), latch 0x80, post Status
//! 0x03 | Write: post Ack (tx code from DCB additional code), latch 0x80
//! 0x04 | Read: post latched byte
//! 0x05 | Post Cancel
//! 0xFF | Post latched byte
//! ```

use super::{
    cmd, Capabilities, DeviceContext, DeviceState, PeripheralDevice, NET_ADAPTER_ID, NET_CLOCK_ID,
};
use crate::core::control_block::{dcb, Dcb};
use crate::core::error::{AdamNetError, Result};
use crate::core::frame::{rsp, Response};

/// Latch value before the first status exchange
pub const STATUS_UNSET: u8 = 0x00;

/// Which network device this is
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetVariant {
    Clock,
    Adapter,
}

/// Network clock / network adapter
pub struct NetDevice {
    variant: NetVariant,
    device_id: u8,
    /// Response code posted on the next status read
    latched: u8,
}

impl NetDevice {
    /// Network clock at its well-known id
    pub fn clock() -> Self {
        Self::new(NetVariant::Clock, NET_CLOCK_ID)
    }

    /// Network adapter at its well-known id
    pub fn adapter() -> Self {
        Self::new(NetVariant::Adapter, NET_ADAPTER_ID)
    }

    /// Device of the given variant at an arbitrary id
    pub fn new(variant: NetVariant, device_id: u8) -> Self {
        Self {
            variant,
            device_id,
            latched: STATUS_UNSET,
        }
    }

    /// Current latched status byte
    pub fn latched(&self) -> u8 {
        self.latched
    }

    fn post_latched(&self, ctx: &mut DeviceContext<'_>) {
        if let Err(e) = ctx.set_field(dcb::CMD_STAT, self.latched) {
            log::error!("{}: failed to post status: {}", self.name(), e);
        }
    }

    fn status(&self, dcb: &Dcb) -> Response {
        Response::Status {
            tx_code: dcb.additional_code,
            status: self.latched,
        }
    }
}

impl PeripheralDevice for NetDevice {
    fn device_id(&self) -> u8 {
        self.device_id
    }

    fn name(&self) -> &'static str {
        match self.variant {
            NetVariant::Clock => "netclock",
            NetVariant::Adapter => "netadapter",
        }
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::CHARACTER
    }

    fn handle(&mut self, command: u8, dcb: &Dcb, ctx: &mut DeviceContext<'_>) {
        if command != cmd::POLL {
            log::debug!("{}: 0x{:02X}:0x{:02X}", self.name(), self.device_id, command);
        }

        match command {
            cmd::POLL => self.post_latched(ctx),
            cmd::RESET => {
                self.latched = STATUS_UNSET;
                ctx.announce(self.capabilities());
                ctx.respond(self.status(dcb));
            }
            cmd::STATUS => {
                if self.variant == NetVariant::Adapter {
                    ctx.announce(self.capabilities());
                }
                self.latched = rsp::STATUS;
                ctx.respond(self.status(dcb));
            }
            cmd::SOFT_RESET => {
                ctx.announce(self.capabilities());
                self.latched = rsp::STATUS;
                ctx.respond(self.status(dcb));
            }
            cmd::WRITE => {
                ctx.respond(Response::Ack(dcb.additional_code));
                self.latched = rsp::STATUS;
            }
            cmd::READ => self.post_latched(ctx),
            cmd::CANCEL => ctx.respond(Response::Cancel),
            _ => log::trace!("{}: unsupported command 0x{:02X}", self.name(), command),
        }
    }

    fn reset(&mut self) {
        self.latched = STATUS_UNSET;
    }

    fn save_state(&self) -> DeviceState {
        DeviceState::NetClock {
            latched: self.latched,
        }
    }

    fn accepts_state(&self, state: &DeviceState) -> bool {
        matches!(state, DeviceState::NetClock { .. })
    }

    fn restore_state(&mut self, state: &DeviceState) -> Result<()> {
        match state {
            DeviceState::NetClock { latched } => {
                self.latched = *latched;
                Ok(())
            }
            other => Err(AdamNetError::SaveState(format!(
                "{} cannot restore {:?}",
                self.name(),
                other
            ))),
        }
    }
}
