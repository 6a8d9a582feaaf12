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

//! Device Registry
//!
//! Devices are *attached* once at startup (the hardware that is plugged in)
//! and *announced* every time they power on or reset. Only announced devices
//! can be addressed; an attached but unannounced device looks exactly like an
//! absent one to the dispatcher.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::core::device::PeripheralDevice;
use crate::core::error::{AdamNetError, Result};

/// Device Registration Record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, bincode::Encode, bincode::Decode)]
pub struct DeviceRecord {
    /// AdamNet device id
    pub device_id: u8,
    /// Maximum message size in bytes
    pub message_size: u16,
    /// Block device (disk, tape) rather than character device
    pub is_block: bool,
    /// DCB slot bound to this device
    pub slot: u8,
    /// Retry count exhausted; commands short-circuit to NACK
    pub unresponsive: bool,
}

/// Registry of attached and announced devices
pub struct DeviceRegistry {
    /// Attached handlers by device id
    handlers: BTreeMap<u8, Box<dyn PeripheralDevice>>,

    /// Announced devices by device id
    records: BTreeMap<u8, DeviceRecord>,

    /// Device id bound to each DCB slot
    slots: Vec<Option<u8>>,
}

impl DeviceRegistry {
    /// Create an empty registry with `slots` DCB slots
    pub fn new(slots: usize) -> Self {
        Self {
            handlers: BTreeMap::new(),
            records: BTreeMap::new(),
            slots: vec![None; slots],
        }
    }

    /// Plug a device handler into the bus
    ///
    /// Replaces any handler already attached under the same id.
    pub fn attach(&mut self, device: Box<dyn PeripheralDevice>) {
        let id = device.device_id();
        log::debug!("AdamNet: attached {} as device 0x{:02X}", device.name(), id);
        if self.handlers.insert(id, device).is_some() {
            log::warn!("AdamNet: device 0x{:02X} replaced", id);
        }
    }

    /// True if a handler is attached under `device_id`
    pub fn is_attached(&self, device_id: u8) -> bool {
        self.handlers.contains_key(&device_id)
    }

    /// Attached device ids in ascending order
    pub fn attached_ids(&self) -> Vec<u8> {
        self.handlers.keys().copied().collect()
    }

    /// Register or re-register a device's capabilities
    ///
    /// A re-announce keeps the device's DCB slot and clears the unresponsive
    /// mark. A first announce binds the lowest free slot.
    ///
    /// # Errors
    ///
    /// - `UnknownDevice` if no handler is attached under `device_id`
    /// - `NoFreeDcb` if every slot is bound to another device
    pub fn announce(
        &mut self,
        device_id: u8,
        message_size: u16,
        is_block: bool,
    ) -> Result<DeviceRecord> {
        if !self.is_attached(device_id) {
            return Err(AdamNetError::UnknownDevice(device_id));
        }

        let slot = match self.records.get(&device_id) {
            Some(record) => record.slot as usize,
            None => self
                .slots
                .iter()
                .position(Option::is_none)
                .ok_or(AdamNetError::NoFreeDcb(device_id))?,
        };
        self.slots[slot] = Some(device_id);

        let record = DeviceRecord {
            device_id,
            message_size,
            is_block,
            slot: slot as u8,
            unresponsive: false,
        };
        self.records.insert(device_id, record);

        log::debug!(
            "AdamNet: device 0x{:02X} announced (slot {}, size {}, {})",
            device_id,
            slot,
            message_size,
            if is_block { "block" } else { "character" }
        );

        Ok(record)
    }

    /// Look up an announced device
    ///
    /// # Errors
    ///
    /// `UnknownDevice` if the device has not announced itself
    pub fn lookup(&self, device_id: u8) -> Result<&DeviceRecord> {
        self.records
            .get(&device_id)
            .ok_or(AdamNetError::UnknownDevice(device_id))
    }

    /// Look up an announced device together with its handler
    pub fn lookup_mut(
        &mut self,
        device_id: u8,
    ) -> Result<(&mut DeviceRecord, &mut dyn PeripheralDevice)> {
        let record = self
            .records
            .get_mut(&device_id)
            .ok_or(AdamNetError::UnknownDevice(device_id))?;
        let handler = self
            .handlers
            .get_mut(&device_id)
            .ok_or(AdamNetError::UnknownDevice(device_id))?;
        Ok((record, handler.as_mut()))
    }

    /// Device id bound to a DCB slot
    pub fn device_at(&self, slot: usize) -> Option<u8> {
        self.slots.get(slot).copied().flatten()
    }

    /// Mark a device unresponsive
    pub fn mark_unresponsive(&mut self, device_id: u8) {
        if let Some(record) = self.records.get_mut(&device_id) {
            record.unresponsive = true;
        }
    }

    /// Number of DCB slots in use (highest bound slot + 1)
    pub fn dcb_count(&self) -> usize {
        self.slots
            .iter()
            .rposition(Option::is_some)
            .map_or(0, |slot| slot + 1)
    }

    /// Announced records in device id order
    pub fn records(&self) -> impl Iterator<Item = &DeviceRecord> {
        self.records.values()
    }

    /// Forget every announcement and free every slot
    ///
    /// Attached handlers stay plugged in.
    pub fn unregister_all(&mut self) {
        self.records.clear();
        self.slots.iter_mut().for_each(|slot| *slot = None);
    }

    /// Attached handler by id
    pub fn handler(&self, device_id: u8) -> Option<&dyn PeripheralDevice> {
        self.handlers.get(&device_id).map(|h| h.as_ref())
    }

    /// Mutable attached handler by id
    pub fn handler_mut(&mut self, device_id: u8) -> Option<&mut (dyn PeripheralDevice + 'static)> {
        self.handlers.get_mut(&device_id).map(|h| h.as_mut())
    }

    /// Iterate over every attached handler
    pub fn handlers_mut(&mut self) -> impl Iterator<Item = &mut Box<dyn PeripheralDevice>> {
        self.handlers.values_mut()
    }

    /// Check that `records` could replace the announced records
    ///
    /// # Errors
    ///
    /// `SaveState` if a record names a detached device, an invalid slot, or a
    /// slot or device id already used by another record
    pub fn check_records(&self, records: &[DeviceRecord]) -> Result<()> {
        let mut slots = vec![None; self.slots.len()];
        let mut seen = BTreeMap::new();
        for record in records {
            if !self.is_attached(record.device_id) {
                return Err(AdamNetError::SaveState(format!(
                    "snapshot names detached device 0x{:02X}",
                    record.device_id
                )));
            }
            let Some(bound) = slots.get_mut(record.slot as usize) else {
                return Err(AdamNetError::SaveState(format!(
                    "slot {} out of range for device 0x{:02X}",
                    record.slot, record.device_id
                )));
            };
            if let Some(other) = bound.replace(record.device_id) {
                return Err(AdamNetError::SaveState(format!(
                    "slot {} bound to both 0x{:02X} and 0x{:02X}",
                    record.slot, other, record.device_id
                )));
            }
            if seen.insert(record.device_id, record.slot).is_some() {
                return Err(AdamNetError::SaveState(format!(
                    "device 0x{:02X} recorded twice",
                    record.device_id
                )));
            }
        }
        Ok(())
    }

    /// Replace the announced records (snapshot restore)
    ///
    /// Nothing changes if the records fail [`DeviceRegistry::check_records`].
    pub fn restore_records(&mut self, records: &[DeviceRecord]) -> Result<()> {
        self.check_records(records)?;

        self.unregister_all();
        for record in records {
            self.slots[record.slot as usize] = Some(record.device_id);
            self.records.insert(record.device_id, *record);
        }
        Ok(())
    }
}
