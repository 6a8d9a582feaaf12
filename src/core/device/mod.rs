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

//! AdamNet devices
//!
//! Every device plugged into the bus implements [`PeripheralDevice`]. The
//! dispatcher hands the device the raw command byte, a decoded copy of its
//! DCB, and a [`DeviceContext`] scoped to that one DCB. The context is the
//! only way a handler can post a response or re-announce itself.
//!
//! ## Command Codes
//!
//! ```text
//! Code | Bus meaning | Character-device family meaning
//! -----|-------------|--------------------------------
//! 0x00 | Reset       |
//! 0x01 | Status      |
//! 0x02 | Ack         | SoftReset
//! 0x03 | Clear       | Write
//! 0x04 | Receive     | Read
//! 0x05 | Cancel      |
//! 0x06 | Send        |
//! 0x07 | Nack        |
//! 0xFF | Poll (passive status refresh)
//! ```
//!
//! The dispatcher never interprets codes 0x02-0x04; each device decides.

pub mod keyboard;
pub mod netclock;

use serde::{Deserialize, Serialize};

use crate::core::control_block::{dcb, DcbBytes, Dcb};
use crate::core::error::{AdamNetError, Result};
use crate::core::frame::{Frame, Response};

/// DCB command codes
pub mod cmd {
    pub const RESET: u8 = 0x00;
    pub const STATUS: u8 = 0x01;
    pub const ACK: u8 = 0x02;
    pub const CLEAR: u8 = 0x03;
    pub const RECEIVE: u8 = 0x04;
    pub const CANCEL: u8 = 0x05;
    pub const SEND: u8 = 0x06;
    pub const NACK: u8 = 0x07;

    pub const SOFT_RESET: u8 = 0x02;
    pub const WRITE: u8 = 0x03;
    pub const READ: u8 = 0x04;

    /// Passive status poll
    pub const POLL: u8 = 0xFF;

    /// Commands that move data through the DCB buffer
    #[inline]
    pub fn is_transfer(command: u8) -> bool {
        command == RECEIVE || command == SEND
    }
}

/// Keyboard
pub const KEYBOARD_ID: u8 = 0x01;
/// Printer
pub const PRINTER_ID: u8 = 0x02;
/// First disk drive (drives are 0x04-0x07)
pub const DISK_ID: u8 = 0x04;
/// Data pack tape drive
pub const TAPE_ID: u8 = 0x08;
/// Network clock
pub const NET_CLOCK_ID: u8 = 0x0E;
/// Network adapter
pub const NET_ADAPTER_ID: u8 = 0x0F;

/// What a device announces about itself
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capabilities {
    pub message_size: u16,
    pub is_block: bool,
}

impl Capabilities {
    /// Single-character device
    pub const CHARACTER: Capabilities = Capabilities {
        message_size: 1,
        is_block: false,
    };
}

/// Device-owned state carried in bus snapshots
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, bincode::Encode, bincode::Decode)]
pub enum DeviceState {
    /// Queued key codes and the last key sent but not yet acknowledged
    Keyboard {
        keys: Vec<u32>,
        unacknowledged: Option<u8>,
    },
    /// Latched status register
    NetClock { latched: u8 },
    /// Device has no state of its own
    None,
}

/// A device on the bus
///
/// Handlers must not block. A handler posts at most one response per call;
/// if it posts none, the dispatcher posts `Nack` on its behalf.
pub trait PeripheralDevice {
    /// AdamNet device id
    fn device_id(&self) -> u8;

    /// Human-readable name for logs
    fn name(&self) -> &'static str;

    /// Capabilities announced at power-on
    fn capabilities(&self) -> Capabilities;

    /// Handle one command
    ///
    /// # Arguments
    ///
    /// * `command` - Raw command byte as written by the host
    /// * `dcb` - Copy of the device's DCB taken before the call
    /// * `ctx` - Accessor for the device's own DCB
    fn handle(&mut self, command: u8, dcb: &Dcb, ctx: &mut DeviceContext<'_>);

    /// Return to power-on state
    fn reset(&mut self) {}

    /// Capture device-owned state
    fn save_state(&self) -> DeviceState {
        DeviceState::None
    }

    /// True if `state` is the kind this device saves
    ///
    /// Checked for every device before a snapshot restore changes anything.
    fn accepts_state(&self, state: &DeviceState) -> bool {
        matches!(state, DeviceState::None)
    }

    /// Restore device-owned state
    fn restore_state(&mut self, _state: &DeviceState) -> Result<()> {
        Ok(())
    }
}

/// What a handler produced
pub(crate) struct Outcome {
    pub posted: Option<u8>,
    pub frame: Option<Frame>,
    pub announcement: Option<Capabilities>,
}

/// Handler-side accessor for one DCB
///
/// Writes go straight into the device's own DCB. Device type, node type and
/// the retry counter belong to the dispatcher and are rejected.
pub struct DeviceContext<'a> {
    device_id: u8,
    message_size: u16,
    block: &'a mut DcbBytes,
    posted: Option<u8>,
    frame: Option<Frame>,
    announcement: Option<Capabilities>,
}

impl<'a> DeviceContext<'a> {
    pub(crate) fn new(device_id: u8, message_size: u16, block: &'a mut DcbBytes) -> Self {
        Self {
            device_id,
            message_size,
            block,
            posted: None,
            frame: None,
            announcement: None,
        }
    }

    /// Id of the device this context belongs to
    #[inline]
    pub fn device_id(&self) -> u8 {
        self.device_id
    }

    /// Announced message size
    #[inline]
    pub fn message_size(&self) -> u16 {
        self.message_size
    }

    /// Write one field of the device's own DCB
    ///
    /// Writing the command/status offset posts a response.
    ///
    /// # Errors
    ///
    /// - `OutOfRange` for an offset past the DCB
    /// - `ReadOnlyField` for device type, node type or retry count
    pub fn set_field(&mut self, offset: usize, value: u8) -> Result<()> {
        match offset {
            dcb::DEV_TYPE | dcb::NODE_TYPE | dcb::RETRY_LO | dcb::RETRY_HI => {
                return Err(AdamNetError::ReadOnlyField { offset });
            }
            o if o >= dcb::SIZE => {
                return Err(AdamNetError::OutOfRange {
                    block: "DCB",
                    offset,
                    size: dcb::SIZE,
                });
            }
            _ => {}
        }

        self.block[offset] = value;
        if offset == dcb::CMD_STAT {
            self.mark_posted(value);
            self.frame = None;
        }
        Ok(())
    }

    /// Post a framed response
    pub fn respond(&mut self, response: Response) {
        let frame = response.encode(self.message_size);
        let code = frame.code();
        self.block[dcb::CMD_STAT] = code;
        self.mark_posted(code);
        self.frame = Some(frame);
    }

    /// Re-announce the device once the handler returns
    pub fn announce(&mut self, capabilities: Capabilities) {
        self.announcement = Some(capabilities);
    }

    /// Response byte posted so far
    pub fn posted(&self) -> Option<u8> {
        self.posted
    }

    fn mark_posted(&mut self, code: u8) {
        if let Some(previous) = self.posted {
            log::warn!(
                "AdamNet: device 0x{:02X} posted twice (0x{:02X} then 0x{:02X}), keeping last",
                self.device_id,
                previous,
                code
            );
        }
        self.posted = Some(code);
    }

    pub(crate) fn finish(self) -> Outcome {
        Outcome {
            posted: self.posted,
            frame: self.frame,
            announcement: self.announcement,
        }
    }
}

#[cfg(test)]
mod tests;
