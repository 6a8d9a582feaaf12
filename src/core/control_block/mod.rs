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

//! AdamNet control blocks
//!
//! The host talks to AdamNet through a window of memory holding one
//! Peripheral Control Block (PCB) followed by an array of Device Control
//! Blocks (DCBs).
//!
//! ## Memory Layout
//!
//! ```text
//! pcb_address + 0x00  PCB   (4 bytes)
//! pcb_address + 0x04  DCB 0 (21 bytes)
//! pcb_address + 0x19  DCB 1 (21 bytes)
//! ...
//! ```
//!
//! ## PCB Fields
//!
//! ```text
//! Offset | Field
//! -------|---------------------------
//! 0      | Command / status
//! 1-2    | Base address (lo, hi)
//! 3      | Max DCB count
//! ```
//!
//! ## DCB Fields
//!
//! ```text
//! Offset | Field
//! -------|---------------------------
//! 0      | Command / status
//! 1-2    | Buffer address (lo, hi)
//! 3-4    | Buffer length (lo, hi)
//! 5-8    | Sector / record number (LE)
//! 9      | Device number
//! 10-13  | Reserved
//! 14-15  | Retry count (lo, hi)
//! 16     | Additional code
//! 17-18  | Max length (lo, hi)
//! 19     | Device type
//! 20     | Node type
//! ```
//!
//! The store is a plain byte container. It has no notion of commands; the
//! dispatcher in [`crate::core::bus`] is the only code that turns a write to a
//! command offset into a protocol event.

use crate::core::error::{AdamNetError, Result};

/// PCB field offsets
pub mod pcb {
    pub const CMD_STAT: usize = 0;
    pub const BA_LO: usize = 1;
    pub const BA_HI: usize = 2;
    pub const MAX_DCB: usize = 3;
    /// PCB size in bytes
    pub const SIZE: usize = 4;
}

/// DCB field offsets
pub mod dcb {
    pub const CMD_STAT: usize = 0;
    pub const BA_LO: usize = 1;
    pub const BA_HI: usize = 2;
    pub const BUF_LEN_LO: usize = 3;
    pub const BUF_LEN_HI: usize = 4;
    pub const SEC_NUM_0: usize = 5;
    pub const SEC_NUM_1: usize = 6;
    pub const SEC_NUM_2: usize = 7;
    pub const SEC_NUM_3: usize = 8;
    pub const DEV_NUM: usize = 9;
    pub const RETRY_LO: usize = 14;
    pub const RETRY_HI: usize = 15;
    pub const ADD_CODE: usize = 16;
    pub const MAXL_LO: usize = 17;
    pub const MAXL_HI: usize = 18;
    pub const DEV_TYPE: usize = 19;
    pub const NODE_TYPE: usize = 20;
    /// DCB size in bytes
    pub const SIZE: usize = 21;
}

/// Device type byte values
pub mod device_type {
    pub const CHARACTER: u8 = 0x00;
    pub const BLOCK: u8 = 0x01;
}

/// Raw bytes of one DCB
pub type DcbBytes = [u8; dcb::SIZE];

/// Location of a host address inside the control-block window
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Location {
    /// PCB field at the given offset
    Pcb(usize),
    /// DCB slot and field offset
    Dcb { slot: usize, offset: usize },
}

/// Decoded view of a DCB
///
/// Handlers receive this copy instead of the live bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Dcb {
    pub command: u8,
    pub buffer_address: u16,
    pub buffer_length: u16,
    pub sector: u32,
    pub device_number: u8,
    pub retry_count: u16,
    pub additional_code: u8,
    pub max_length: u16,
    pub device_type: u8,
    pub node_type: u8,
}

impl Dcb {
    /// Decode a DCB from its raw bytes
    pub fn from_bytes(bytes: &DcbBytes) -> Self {
        Self {
            command: bytes[dcb::CMD_STAT],
            buffer_address: word(bytes, dcb::BA_LO),
            buffer_length: word(bytes, dcb::BUF_LEN_LO),
            sector: u32::from_le_bytes([
                bytes[dcb::SEC_NUM_0],
                bytes[dcb::SEC_NUM_1],
                bytes[dcb::SEC_NUM_2],
                bytes[dcb::SEC_NUM_3],
            ]),
            device_number: bytes[dcb::DEV_NUM],
            retry_count: word(bytes, dcb::RETRY_LO),
            additional_code: bytes[dcb::ADD_CODE],
            max_length: word(bytes, dcb::MAXL_LO),
            device_type: bytes[dcb::DEV_TYPE],
            node_type: bytes[dcb::NODE_TYPE],
        }
    }

    /// True for a block device (disk, tape)
    #[inline]
    pub fn is_block(&self) -> bool {
        self.device_type == device_type::BLOCK
    }
}

#[inline]
fn word(bytes: &[u8], lo: usize) -> u16 {
    u16::from_le_bytes([bytes[lo], bytes[lo + 1]])
}

/// Write a little-endian word into two consecutive fields
#[inline]
pub fn put_word(bytes: &mut [u8], lo: usize, value: u16) {
    let [l, h] = value.to_le_bytes();
    bytes[lo] = l;
    bytes[lo + 1] = h;
}

/// Control-Block Store
///
/// Owns the PCB and a fixed number of DCB slots. Slots are bound to devices
/// by the registry; the store itself only range-checks and stores bytes.
pub struct ControlBlockStore {
    /// Peripheral Control Block
    pcb: [u8; pcb::SIZE],

    /// Device Control Blocks, one per slot
    dcbs: Vec<DcbBytes>,
}

impl ControlBlockStore {
    /// Create a zeroed store with `slots` DCBs
    pub fn new(slots: usize) -> Self {
        Self {
            pcb: [0; pcb::SIZE],
            dcbs: vec![[0; dcb::SIZE]; slots],
        }
    }

    /// Number of DCB slots
    #[inline]
    pub fn slot_count(&self) -> usize {
        self.dcbs.len()
    }

    /// Size in bytes of the whole window (PCB + all DCBs)
    #[inline]
    pub fn window_size(&self) -> usize {
        pcb::SIZE + self.dcbs.len() * dcb::SIZE
    }

    /// Zero the PCB and every DCB
    pub fn reset(&mut self) {
        self.pcb = [0; pcb::SIZE];
        for block in &mut self.dcbs {
            *block = [0; dcb::SIZE];
        }
    }

    /// Map a host address to a field
    ///
    /// # Arguments
    ///
    /// * `base` - Window base (PCB address)
    /// * `address` - Host address
    ///
    /// # Returns
    ///
    /// `None` if the address is outside the window
    pub fn locate(&self, base: u16, address: u16) -> Option<Location> {
        let delta = address.checked_sub(base)? as usize;
        if delta < pcb::SIZE {
            return Some(Location::Pcb(delta));
        }
        let rel = delta - pcb::SIZE;
        let slot = rel / dcb::SIZE;
        if slot >= self.dcbs.len() {
            return None;
        }
        Some(Location::Dcb {
            slot,
            offset: rel % dcb::SIZE,
        })
    }

    /// Read a PCB field
    pub fn pcb(&self, offset: usize) -> Result<u8> {
        self.pcb
            .get(offset)
            .copied()
            .ok_or(AdamNetError::OutOfRange {
                block: "PCB",
                offset,
                size: pcb::SIZE,
            })
    }

    /// Write a PCB field
    pub fn set_pcb(&mut self, offset: usize, value: u8) -> Result<()> {
        let field = self.pcb.get_mut(offset).ok_or(AdamNetError::OutOfRange {
            block: "PCB",
            offset,
            size: pcb::SIZE,
        })?;
        *field = value;
        Ok(())
    }

    /// PCB base-address field
    pub fn pcb_base_address(&self) -> u16 {
        word(&self.pcb, pcb::BA_LO)
    }

    /// Raw PCB bytes
    pub fn pcb_bytes(&self) -> &[u8; pcb::SIZE] {
        &self.pcb
    }

    /// Read a DCB field
    pub fn dcb(&self, slot: usize, offset: usize) -> Result<u8> {
        self.dcb_bytes(slot)?
            .get(offset)
            .copied()
            .ok_or(AdamNetError::OutOfRange {
                block: "DCB",
                offset,
                size: dcb::SIZE,
            })
    }

    /// Write a DCB field
    pub fn set_dcb(&mut self, slot: usize, offset: usize, value: u8) -> Result<()> {
        let field = self
            .dcb_bytes_mut(slot)?
            .get_mut(offset)
            .ok_or(AdamNetError::OutOfRange {
                block: "DCB",
                offset,
                size: dcb::SIZE,
            })?;
        *field = value;
        Ok(())
    }

    /// Raw bytes of a DCB slot
    pub fn dcb_bytes(&self, slot: usize) -> Result<&DcbBytes> {
        let slots = self.dcbs.len();
        self.dcbs.get(slot).ok_or(AdamNetError::OutOfRange {
            block: "DCB slot",
            offset: slot,
            size: slots,
        })
    }

    /// Mutable raw bytes of a DCB slot
    pub fn dcb_bytes_mut(&mut self, slot: usize) -> Result<&mut DcbBytes> {
        let slots = self.dcbs.len();
        self.dcbs.get_mut(slot).ok_or(AdamNetError::OutOfRange {
            block: "DCB slot",
            offset: slot,
            size: slots,
        })
    }

    /// Decoded snapshot of a DCB slot
    pub fn snapshot(&self, slot: usize) -> Result<Dcb> {
        self.dcb_bytes(slot).map(Dcb::from_bytes)
    }

    /// Replace every byte of the store
    ///
    /// Used when restoring a snapshot. The DCB count must match.
    pub fn load(&mut self, pcb_bytes: [u8; pcb::SIZE], dcbs: &[Vec<u8>]) -> Result<()> {
        if dcbs.len() != self.dcbs.len() {
            return Err(AdamNetError::SaveState(format!(
                "DCB count mismatch: expected {}, got {}",
                self.dcbs.len(),
                dcbs.len()
            )));
        }
        for (slot, bytes) in dcbs.iter().enumerate() {
            if bytes.len() != dcb::SIZE {
                return Err(AdamNetError::SaveState(format!(
                    "DCB {} has {} bytes (expected {})",
                    slot,
                    bytes.len(),
                    dcb::SIZE
                )));
            }
        }
        self.pcb = pcb_bytes;
        for (block, bytes) in self.dcbs.iter_mut().zip(dcbs) {
            block.copy_from_slice(bytes);
        }
        Ok(())
    }

    /// True if every byte in the store is zero
    pub fn is_zeroed(&self) -> bool {
        self.pcb.iter().all(|&b| b == 0) && self.dcbs.iter().flatten().all(|&b| b == 0)
    }
}

#[cfg(test)]
mod tests;
