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

//! AdamNet bus dispatcher
//!
//! The host CPU drives the bus purely through memory writes into the
//! control-block window. A write to a command/status byte is the edge trigger:
//! it is turned into a [`BusMessage`] and dispatched synchronously, so the
//! response is already posted when the write returns.
//!
//! ## PCB States
//!
//! ```text
//! From   | Legal next states
//! -------|-------------------
//! Idle   | Idle, Sync1
//! Sync1  | Sync2
//! Sync2  | SNA, Wait
//! SNA    | Idle
//! Wait   | Idle
//! Reset  | Idle
//! (any)  | Reset
//! ```
//!
//! A legal PCB command is answered with `0x80 | command` in the PCB status
//! byte. SNA moves the window to the PCB base-address field.
//! DCB commands are only accepted in `Idle`.
//!
//! ## Dispatch Order
//!
//! 1. Device not announced: `Nack`, whatever the PCB state
//! 2. PCB not accepting: ignored, nothing posted
//! 3. Device unresponsive: `Nack` (retry count untouched)
//! 4. Receive/Send with buffer length over max length: `Nack`
//! 5. Handler call; no post becomes `Nack`
//! 6. Data frame over max length becomes `Nack`
//!
//! Every `Nack`-class post decrements the DCB retry count. At zero the device
//! is marked unresponsive until it is re-announced or the bus is reset.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::core::config::BusConfig;
use crate::core::control_block::{dcb, device_type, pcb, put_word, ControlBlockStore, Location};
use crate::core::device::keyboard::{KeyboardDevice, KeyboardHandle, OverflowPolicy};
use crate::core::device::netclock::NetDevice;
use crate::core::device::{cmd, DeviceContext, PeripheralDevice};
use crate::core::error::{AdamNetError, Result};
use crate::core::frame::{rsp, Frame, Response, ResponseKind};
use crate::core::registry::{DeviceRecord, DeviceRegistry};

/// PCB command codes
pub mod pcb_cmd {
    pub const IDLE: u8 = 0x00;
    pub const SYNC1: u8 = 0x01;
    pub const SYNC2: u8 = 0x02;
    pub const SNA: u8 = 0x03;
    pub const RESET: u8 = 0x04;
    pub const WAIT: u8 = 0x05;
}

/// PCB state machine
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, bincode::Encode, bincode::Decode,
)]
pub enum PcbState {
    #[default]
    Idle,
    Sync1,
    Sync2,
    Sna,
    Wait,
    Reset,
}

impl PcbState {
    /// State requested by a PCB command byte
    pub fn from_command(command: u8) -> Option<Self> {
        match command {
            pcb_cmd::IDLE => Some(PcbState::Idle),
            pcb_cmd::SYNC1 => Some(PcbState::Sync1),
            pcb_cmd::SYNC2 => Some(PcbState::Sync2),
            pcb_cmd::SNA => Some(PcbState::Sna),
            pcb_cmd::RESET => Some(PcbState::Reset),
            pcb_cmd::WAIT => Some(PcbState::Wait),
            _ => None,
        }
    }

    /// Command byte that requests this state
    pub fn command(self) -> u8 {
        match self {
            PcbState::Idle => pcb_cmd::IDLE,
            PcbState::Sync1 => pcb_cmd::SYNC1,
            PcbState::Sync2 => pcb_cmd::SYNC2,
            PcbState::Sna => pcb_cmd::SNA,
            PcbState::Reset => pcb_cmd::RESET,
            PcbState::Wait => pcb_cmd::WAIT,
        }
    }

    /// True if DCB commands are processed in this state
    #[inline]
    pub fn accepts_dcb_commands(self) -> bool {
        self == PcbState::Idle
    }

    /// True if `next` is a legal successor of `self`
    pub fn can_transition(self, next: PcbState) -> bool {
        use PcbState::*;
        matches!(
            (self, next),
            (_, Reset)
                | (Idle, Idle)
                | (Idle, Sync1)
                | (Sync1, Sync2)
                | (Sync2, Sna)
                | (Sync2, Wait)
                | (Sna, Idle)
                | (Wait, Idle)
                | (Reset, Idle)
        )
    }
}

/// A command for the dispatcher
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BusMessage {
    /// Command written to the PCB
    Pcb { command: u8 },
    /// Command written to a device's DCB
    Device { device_id: u8, command: u8 },
}

/// Result of a dispatch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    /// A response byte was posted
    Posted(u8),
    /// The command was dropped without a response
    Ignored,
}

/// Control block addressed by field accessors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockRef {
    Pcb,
    /// DCB of an announced device
    Dcb(u8),
}

/// AdamNet bus
///
/// Owns the control-block store, the device registry and every attached
/// device. The host side sees it as a window of memory.
pub struct AdamNet {
    pub(crate) store: ControlBlockStore,
    pub(crate) registry: DeviceRegistry,
    pub(crate) state: PcbState,

    /// Current window base
    pub(crate) pcb_address: u16,
    /// Window base restored by `reset`
    default_pcb_address: u16,

    /// Retry count written into each DCB on announce
    retry_count: u16,

    /// Last encoded frame per device
    pub(crate) frames: BTreeMap<u8, Frame>,

    /// Input side of the attached keyboard
    keyboard: Option<KeyboardHandle>,
}

impl AdamNet {
    /// Create a bus with no devices attached
    ///
    /// # Errors
    ///
    /// `Config` if the configuration fails validation
    pub fn new(config: &BusConfig) -> Result<Self> {
        config.validate()?;
        let slots = config.max_dcbs as usize;
        Ok(Self {
            store: ControlBlockStore::new(slots),
            registry: DeviceRegistry::new(slots),
            state: PcbState::Idle,
            pcb_address: config.pcb_address,
            default_pcb_address: config.pcb_address,
            retry_count: config.retry_count,
            frames: BTreeMap::new(),
            keyboard: None,
        })
    }

    /// Create a bus with the configured devices attached and powered on
    pub fn from_config(config: &BusConfig) -> Result<Self> {
        let mut bus = Self::new(config)?;

        if config.devices.keyboard {
            bus.attach_keyboard(KeyboardDevice::new(
                config.keyboard.capacity,
                config.keyboard.overflow,
            ));
        }
        if config.devices.net_clock {
            bus.attach(Box::new(NetDevice::clock()));
        }
        if config.devices.net_adapter {
            bus.attach(Box::new(NetDevice::adapter()));
        }

        bus.power_on();
        Ok(bus)
    }

    /// Plug a device into the bus
    ///
    /// The device is not addressable until it is announced.
    pub fn attach(&mut self, device: Box<dyn PeripheralDevice>) {
        self.registry.attach(device);
    }

    /// Plug in a keyboard and keep its input handle
    pub fn attach_keyboard(&mut self, keyboard: KeyboardDevice) -> KeyboardHandle {
        let handle = keyboard.input();
        self.keyboard = Some(handle.clone());
        self.attach(Box::new(keyboard));
        handle
    }

    /// Full bus reset
    ///
    /// Every device is unregistered and every control-block byte is zero
    /// afterwards. Attached devices return to their power-on state.
    pub fn reset(&mut self) {
        log::debug!("AdamNet: reset");
        self.store.reset();
        self.registry.unregister_all();
        for handler in self.registry.handlers_mut() {
            handler.reset();
        }
        self.frames.clear();
        self.state = PcbState::Idle;
        self.pcb_address = self.default_pcb_address;
    }

    /// Reset, then announce every attached device
    pub fn power_on(&mut self) {
        self.reset();

        let [lo, hi] = self.pcb_address.to_le_bytes();
        self.write_pcb(pcb::BA_LO, lo);
        self.write_pcb(pcb::BA_HI, hi);

        for id in self.registry.attached_ids() {
            let caps = match self.registry.handler(id) {
                Some(handler) => handler.capabilities(),
                None => continue,
            };
            if let Err(e) = self.announce(id, caps.message_size, caps.is_block) {
                log::warn!("AdamNet: power-on announce of 0x{:02X} failed: {}", id, e);
            }
        }
        log::info!(
            "AdamNet: powered on at 0x{:04X} with {} device(s)",
            self.pcb_address,
            self.registry.records().count()
        );
    }

    /// Register or re-register a device's capabilities
    ///
    /// Writes the device's identity, max length and retry count into its DCB
    /// and updates the PCB DCB count.
    ///
    /// # Errors
    ///
    /// - `UnknownDevice` if no device is attached under `device_id`
    /// - `NoFreeDcb` if all DCB slots are taken
    pub fn announce(
        &mut self,
        device_id: u8,
        message_size: u16,
        is_block: bool,
    ) -> Result<DeviceRecord> {
        let record = self.registry.announce(device_id, message_size, is_block)?;

        let block = self.store.dcb_bytes_mut(record.slot as usize)?;
        block[dcb::DEV_NUM] = device_id;
        put_word(block, dcb::MAXL_LO, message_size);
        put_word(block, dcb::RETRY_LO, self.retry_count);
        block[dcb::DEV_TYPE] = if is_block {
            device_type::BLOCK
        } else {
            device_type::CHARACTER
        };
        block[dcb::NODE_TYPE] = device_id;

        let count = self.registry.dcb_count() as u8;
        self.store.set_pcb(pcb::MAX_DCB, count)?;

        Ok(record)
    }

    // Field access

    /// Read one field of the PCB or of a device's DCB
    ///
    /// # Errors
    ///
    /// `OutOfRange` if the offset exceeds the block or the device is not
    /// announced
    pub fn read_field(&self, block: BlockRef, offset: usize) -> Result<u8> {
        match block {
            BlockRef::Pcb => self.store.pcb(offset),
            BlockRef::Dcb(device_id) => {
                let slot = self.slot_of(device_id, offset)?;
                self.store.dcb(slot, offset)
            }
        }
    }

    /// Write one field of the PCB or of a device's DCB
    ///
    /// Writing a command/status offset dispatches the command before
    /// returning.
    ///
    /// # Returns
    ///
    /// The dispatch result for command writes, `None` for plain field writes
    pub fn write_field(
        &mut self,
        block: BlockRef,
        offset: usize,
        value: u8,
    ) -> Result<Option<Dispatch>> {
        match block {
            BlockRef::Pcb => {
                self.store.set_pcb(offset, value)?;
                if offset == pcb::CMD_STAT {
                    return Ok(Some(self.dispatch(BusMessage::Pcb { command: value })));
                }
            }
            BlockRef::Dcb(device_id) => {
                let slot = self.slot_of(device_id, offset)?;
                self.store.set_dcb(slot, offset, value)?;
                if offset == dcb::CMD_STAT {
                    return Ok(Some(self.dispatch(BusMessage::Device {
                        device_id,
                        command: value,
                    })));
                }
            }
        }
        Ok(None)
    }

    fn slot_of(&self, device_id: u8, offset: usize) -> Result<usize> {
        self.registry
            .lookup(device_id)
            .map(|record| record.slot as usize)
            .map_err(|_| AdamNetError::OutOfRange {
                block: "DCB of unannounced device",
                offset,
                size: dcb::SIZE,
            })
    }

    // Host memory interface

    /// True if `address` falls inside the control-block window
    pub fn contains(&self, address: u16) -> bool {
        self.store.locate(self.pcb_address, address).is_some()
    }

    /// Host read
    ///
    /// Reads never trigger device activity.
    pub fn read(&self, address: u16) -> Result<u8> {
        match self.store.locate(self.pcb_address, address) {
            Some(Location::Pcb(offset)) => self.store.pcb(offset),
            Some(Location::Dcb { slot, offset }) => self.store.dcb(slot, offset),
            None => Err(AdamNetError::AddressOutOfRange { address }),
        }
    }

    /// Host write
    ///
    /// # Returns
    ///
    /// The dispatch result when the write hit a command/status byte
    pub fn write(&mut self, address: u16, value: u8) -> Result<Option<Dispatch>> {
        match self.store.locate(self.pcb_address, address) {
            Some(Location::Pcb(offset)) => self.write_field(BlockRef::Pcb, offset, value),
            Some(Location::Dcb { slot, offset }) => {
                self.store.set_dcb(slot, offset, value)?;
                if offset != dcb::CMD_STAT {
                    return Ok(None);
                }
                let posted = match self.registry.device_at(slot) {
                    Some(device_id) => self.dispatch(BusMessage::Device {
                        device_id,
                        command: value,
                    }),
                    None => {
                        log::trace!("AdamNet: command 0x{:02X} to unbound DCB {}", value, slot);
                        self.store.set_dcb(slot, dcb::CMD_STAT, rsp::NACK)?;
                        Dispatch::Posted(rsp::NACK)
                    }
                };
                Ok(Some(posted))
            }
            None => Err(AdamNetError::AddressOutOfRange { address }),
        }
    }

    /// CPU-side read
    ///
    /// An address outside the window is a bug in the caller: it asserts in
    /// debug builds and reads as zero in release builds.
    #[inline]
    pub fn read8(&self, address: u16) -> u8 {
        match self.read(address) {
            Ok(value) => value,
            Err(e) => {
                debug_assert!(false, "AdamNet read8: {}", e);
                0
            }
        }
    }

    /// CPU-side write
    ///
    /// See [`AdamNet::read8`] for out-of-window behavior.
    #[inline]
    pub fn write8(&mut self, address: u16, value: u8) {
        if let Err(e) = self.write(address, value) {
            debug_assert!(false, "AdamNet write8: {}", e);
        }
    }

    // Dispatcher

    /// Process one command
    pub fn dispatch(&mut self, message: BusMessage) -> Dispatch {
        match message {
            BusMessage::Pcb { command } => self.dispatch_pcb(command),
            BusMessage::Device { device_id, command } => self.dispatch_device(device_id, command),
        }
    }

    fn dispatch_pcb(&mut self, command: u8) -> Dispatch {
        let Some(next) = PcbState::from_command(command) else {
            log::warn!("AdamNet: unknown PCB command 0x{:02X} ignored", command);
            return Dispatch::Ignored;
        };
        if !self.state.can_transition(next) {
            log::warn!(
                "AdamNet: illegal PCB transition {:?} -> {:?} ignored",
                self.state,
                next
            );
            return Dispatch::Ignored;
        }

        match next {
            PcbState::Reset => self.power_on(),
            PcbState::Sna => {
                let address = self.store.pcb_base_address();
                let end = address as usize + self.store.window_size();
                if end > 0x1_0000 {
                    log::warn!(
                        "AdamNet: SNA to 0x{:04X} would run past 0xFFFF, ignored",
                        address
                    );
                    return Dispatch::Ignored;
                }
                log::debug!(
                    "AdamNet: window moved 0x{:04X} -> 0x{:04X}",
                    self.pcb_address,
                    address
                );
                self.pcb_address = address;
            }
            _ => {}
        }

        log::debug!("AdamNet: PCB {:?} -> {:?}", self.state, next);
        self.state = next;

        let posted = rsp::STATUS | command;
        self.write_pcb(pcb::CMD_STAT, posted);
        Dispatch::Posted(posted)
    }

    fn dispatch_device(&mut self, device_id: u8, command: u8) -> Dispatch {
        let record = match self.registry.lookup(device_id) {
            Ok(record) => *record,
            Err(e) => {
                log::trace!("AdamNet: {}, command 0x{:02X} -> NACK", e, command);
                return Dispatch::Posted(rsp::NACK);
            }
        };
        let slot = record.slot as usize;

        if !self.state.accepts_dcb_commands() {
            log::trace!(
                "AdamNet: 0x{:02X}:0x{:02X} ignored in PCB state {:?}",
                device_id,
                command,
                self.state
            );
            return Dispatch::Ignored;
        }

        if record.unresponsive {
            log::trace!(
                "AdamNet: {}",
                AdamNetError::DeviceUnresponsive(device_id)
            );
            return self.post_nack(device_id, slot, false);
        }

        let snapshot = match self.store.snapshot(slot) {
            Ok(snapshot) => snapshot,
            Err(e) => {
                log::error!("AdamNet: device 0x{:02X}: {}", device_id, e);
                return Dispatch::Ignored;
            }
        };

        if cmd::is_transfer(command) && snapshot.buffer_length > snapshot.max_length {
            log::debug!(
                "AdamNet: 0x{:02X} buffer length {} exceeds max {}",
                device_id,
                snapshot.buffer_length,
                snapshot.max_length
            );
            return self.post_nack(device_id, slot, true);
        }

        log::trace!("AdamNet: dispatch 0x{:02X}:0x{:02X}", device_id, command);

        let outcome = {
            let Ok((record, handler)) = self.registry.lookup_mut(device_id) else {
                return Dispatch::Posted(rsp::NACK);
            };
            let block = match self.store.dcb_bytes_mut(slot) {
                Ok(block) => block,
                Err(_) => return Dispatch::Ignored,
            };
            let mut ctx = DeviceContext::new(device_id, record.message_size, block);
            handler.handle(command, &snapshot, &mut ctx);
            ctx.finish()
        };

        if let Some(caps) = outcome.announcement {
            if let Err(e) = self.announce(device_id, caps.message_size, caps.is_block) {
                log::warn!("AdamNet: re-announce of 0x{:02X} failed: {}", device_id, e);
            }
        }

        let Some(code) = outcome.posted else {
            log::trace!("AdamNet: 0x{:02X} posted nothing -> NACK", device_id);
            return self.post_nack(device_id, slot, true);
        };

        match outcome.frame {
            Some(frame) => {
                if let Some(payload) = frame.payload() {
                    if payload.len() > snapshot.max_length as usize {
                        log::warn!(
                            "AdamNet: 0x{:02X} data frame of {} bytes exceeds max {}",
                            device_id,
                            payload.len(),
                            snapshot.max_length
                        );
                        return self.post_nack(device_id, slot, true);
                    }
                    let len = payload.len() as u16;
                    if let Ok(block) = self.store.dcb_bytes_mut(slot) {
                        put_word(block, dcb::BUF_LEN_LO, len);
                    }
                }
                self.frames.insert(device_id, frame);
            }
            None => {
                self.frames.remove(&device_id);
            }
        }

        if ResponseKind::of(code) == ResponseKind::Nack {
            self.consume_retry(device_id, slot);
        }
        Dispatch::Posted(code)
    }

    /// Post `Nack` into a device's DCB
    fn post_nack(&mut self, device_id: u8, slot: usize, count_retry: bool) -> Dispatch {
        let message_size = self
            .registry
            .lookup(device_id)
            .map_or(0, |record| record.message_size);
        if let Err(e) = self.store.set_dcb(slot, dcb::CMD_STAT, rsp::NACK) {
            log::error!("AdamNet: cannot post NACK for 0x{:02X}: {}", device_id, e);
        }
        self.frames
            .insert(device_id, Response::Nack.encode(message_size));
        if count_retry {
            self.consume_retry(device_id, slot);
        }
        Dispatch::Posted(rsp::NACK)
    }

    /// Decrement the DCB retry count, marking the device unresponsive at zero
    fn consume_retry(&mut self, device_id: u8, slot: usize) {
        let Ok(block) = self.store.dcb_bytes_mut(slot) else {
            return;
        };
        let retries = u16::from_le_bytes([block[dcb::RETRY_LO], block[dcb::RETRY_HI]]);
        let remaining = retries.saturating_sub(1);
        put_word(block, dcb::RETRY_LO, remaining);

        if remaining == 0 {
            log::warn!(
                "AdamNet: device 0x{:02X} retries exhausted, marking unresponsive",
                device_id
            );
            self.registry.mark_unresponsive(device_id);
        }
    }

    fn write_pcb(&mut self, offset: usize, value: u8) {
        if let Err(e) = self.store.set_pcb(offset, value) {
            log::error!("AdamNet: {}", e);
        }
    }

    /// Send the passive poll to every responsive device
    ///
    /// # Returns
    ///
    /// `(device_id, posted byte)` for every device polled
    pub fn poll(&mut self) -> Vec<(u8, u8)> {
        if !self.state.accepts_dcb_commands() {
            return Vec::new();
        }

        let ids: Vec<u8> = self
            .registry
            .records()
            .filter(|record| !record.unresponsive)
            .map(|record| record.device_id)
            .collect();

        ids.into_iter()
            .filter_map(|device_id| {
                match self.dispatch(BusMessage::Device {
                    device_id,
                    command: cmd::POLL,
                }) {
                    Dispatch::Posted(code) => Some((device_id, code)),
                    Dispatch::Ignored => None,
                }
            })
            .collect()
    }

    /// Queue a key event on the attached keyboard
    ///
    /// # Returns
    ///
    /// `false` if the key was dropped or no keyboard is attached
    pub fn push_key(&self, key: u32) -> bool {
        let Some(keyboard) = &self.keyboard else {
            log::warn!("AdamNet: no keyboard attached, key 0x{:08X} dropped", key);
            return false;
        };
        match keyboard.push(key) {
            None => true,
            Some(_) => keyboard.policy() == OverflowPolicy::DropOldest,
        }
    }

    // Accessors

    /// Current PCB state
    pub fn state(&self) -> PcbState {
        self.state
    }

    /// Current window base
    pub fn pcb_address(&self) -> u16 {
        self.pcb_address
    }

    pub fn store(&self) -> &ControlBlockStore {
        &self.store
    }

    pub fn registry(&self) -> &DeviceRegistry {
        &self.registry
    }

    /// Last frame posted by a device
    pub fn response_frame(&self, device_id: u8) -> Option<&Frame> {
        self.frames.get(&device_id)
    }

    /// Input handle of the attached keyboard
    pub fn keyboard(&self) -> Option<KeyboardHandle> {
        self.keyboard.clone()
    }

    /// Host address of a DCB field
    pub fn dcb_address(&self, slot: usize, offset: usize) -> u16 {
        (self.pcb_address as usize + pcb::SIZE + slot * dcb::SIZE + offset) as u16
    }
}

#[cfg(test)]
mod tests;
