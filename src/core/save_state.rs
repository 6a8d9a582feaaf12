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

//! Bus snapshots
//!
//! A snapshot captures everything needed to put a bus back where it was:
//! - Metadata (timestamp, label, frame count)
//! - PCB and DCB bytes
//! - PCB state and window address
//! - Registry records (slot bindings, unresponsive marks)
//! - Device-owned state (keyboard queue, network latch)
//!
//! Last response frames are not saved; the host re-reads status after a
//! restore.
//!
//! # Version Compatibility
//!
//! Snapshots carry a version number. Loading a snapshot with a different
//! version fails.
//!
//! # Example
//!
//! ```no_run
//! use adamnet::core::config::BusConfig;
//! use adamnet::core::save_state::{BusState, StateSave};
//! use adamnet::core::AdamNet;
//!
//! let mut bus = AdamNet::from_config(&BusConfig::default()).unwrap();
//! bus.to_state().save_to_file("bus.state").unwrap();
//!
//! let state = BusState::load_from_file("bus.state").unwrap();
//! bus.restore_from_state(&state).unwrap();
//! ```

use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;

use bincode::{config, Decode, Encode};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core::bus::{AdamNet, PcbState};
use crate::core::control_block::{dcb, pcb};
use crate::core::device::DeviceState;
use crate::core::error::{AdamNetError, Result};
use crate::core::registry::DeviceRecord;

/// Snapshot format version
///
/// Bump whenever the layout of [`BusState`] changes.
pub const SAVE_STATE_VERSION: u32 = 1;

/// Complete bus snapshot
#[derive(Debug, Clone, Serialize, Deserialize, Encode, Decode)]
pub struct BusState {
    /// Version number for compatibility checking
    pub version: u32,

    pub metadata: StateMetadata,

    /// PCB bytes
    pub pcb: [u8; pcb::SIZE],

    /// DCB bytes, one entry per slot
    pub dcbs: Vec<Vec<u8>>,

    pub pcb_state: PcbState,

    /// Window base at save time
    pub pcb_address: u16,

    /// Announced devices
    pub records: Vec<DeviceRecord>,

    /// Device-owned state of every attached device
    pub devices: Vec<DeviceSnapshot>,
}

/// Snapshot metadata
#[derive(Debug, Clone, Serialize, Deserialize, Encode, Decode)]
#[bincode(encode_bounds = "", decode_bounds = "")]
pub struct StateMetadata {
    /// When the snapshot was taken
    #[bincode(with_serde)]
    pub timestamp: DateTime<Utc>,

    /// Free-form label
    pub label: String,

    /// Host frame count at save time
    pub frame_count: u64,
}

/// State of one attached device
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Encode, Decode)]
pub struct DeviceSnapshot {
    pub device_id: u8,
    pub state: DeviceState,
}

impl BusState {
    /// Capture a bus
    pub fn from_bus(bus: &AdamNet) -> Self {
        let store = bus.store();
        let dcbs = (0..store.slot_count())
            .filter_map(|slot| store.dcb_bytes(slot).ok())
            .map(|bytes| bytes.to_vec())
            .collect();

        let registry = bus.registry();
        let devices = registry
            .attached_ids()
            .into_iter()
            .filter_map(|device_id| {
                registry.handler(device_id).map(|handler| DeviceSnapshot {
                    device_id,
                    state: handler.save_state(),
                })
            })
            .collect();

        Self {
            version: SAVE_STATE_VERSION,
            metadata: StateMetadata {
                timestamp: Utc::now(),
                label: String::new(),
                frame_count: 0,
            },
            pcb: *store.pcb_bytes(),
            dcbs,
            pcb_state: bus.state(),
            pcb_address: bus.pcb_address(),
            records: registry.records().copied().collect(),
            devices,
        }
    }

    /// Set label and frame count
    pub fn with_metadata(mut self, label: impl Into<String>, frame_count: u64) -> Self {
        self.metadata.label = label.into();
        self.metadata.frame_count = frame_count;
        self
    }

    /// Write the snapshot to a file
    ///
    /// # Errors
    ///
    /// - `Io` if the file cannot be created or written
    /// - `SaveState` if encoding fails
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let config = config::standard();
        let encoded = bincode::encode_to_vec(self, config)
            .map_err(|e| AdamNetError::SaveState(e.to_string()))?;
        let mut file = File::create(path.as_ref())?;
        file.write_all(&encoded)?;
        log::debug!(
            "Saved bus state ({} bytes) to {}",
            encoded.len(),
            path.as_ref().display()
        );
        Ok(())
    }

    /// Read a snapshot from a file
    ///
    /// # Errors
    ///
    /// - `Io` if the file cannot be read
    /// - `SaveState` if decoding fails or the version does not match
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut file = File::open(path)?;
        let mut buffer = Vec::new();
        file.read_to_end(&mut buffer)?;

        let config = config::standard();
        let (state, _): (BusState, usize) = bincode::decode_from_slice(&buffer, config)
            .map_err(|e| AdamNetError::SaveState(e.to_string()))?;

        if state.version != SAVE_STATE_VERSION {
            return Err(AdamNetError::SaveState(format!(
                "Incompatible save state version: expected {}, got {}",
                SAVE_STATE_VERSION, state.version
            )));
        }

        Ok(state)
    }
}

/// Components that can be saved and restored
pub trait StateSave {
    /// The state type for this component
    type State: Serialize + for<'de> Deserialize<'de>;

    /// Capture this component
    fn to_state(&self) -> Self::State;

    /// Restore this component
    fn restore_from_state(&mut self, state: &Self::State) -> Result<()>;
}

impl StateSave for AdamNet {
    type State = BusState;

    fn to_state(&self) -> BusState {
        BusState::from_bus(self)
    }

    fn restore_from_state(&mut self, state: &BusState) -> Result<()> {
        if state.version != SAVE_STATE_VERSION {
            return Err(AdamNetError::SaveState(format!(
                "Incompatible save state version: expected {}, got {}",
                SAVE_STATE_VERSION, state.version
            )));
        }
        if state.dcbs.len() != self.store.slot_count() {
            return Err(AdamNetError::SaveState(format!(
                "snapshot has {} DCBs, bus has {}",
                state.dcbs.len(),
                self.store.slot_count()
            )));
        }
        if let Some(bad) = state.dcbs.iter().position(|bytes| bytes.len() != dcb::SIZE) {
            return Err(AdamNetError::SaveState(format!(
                "DCB {} has {} bytes",
                bad,
                state.dcbs[bad].len()
            )));
        }
        for snapshot in &state.devices {
            let Some(handler) = self.registry.handler(snapshot.device_id) else {
                return Err(AdamNetError::SaveState(format!(
                    "snapshot names detached device 0x{:02X}",
                    snapshot.device_id
                )));
            };
            if !handler.accepts_state(&snapshot.state) {
                return Err(AdamNetError::SaveState(format!(
                    "{} (0x{:02X}) cannot restore {:?}",
                    handler.name(),
                    snapshot.device_id,
                    snapshot.state
                )));
            }
        }
        self.registry.check_records(&state.records)?;
        let end = state.pcb_address as usize + self.store.window_size();
        if end > 0x1_0000 {
            return Err(AdamNetError::SaveState(format!(
                "window at 0x{:04X} runs past 0xFFFF",
                state.pcb_address
            )));
        }

        // Everything below is checked above
        self.registry.restore_records(&state.records)?;
        self.store.load(state.pcb, &state.dcbs)?;
        for snapshot in &state.devices {
            if let Some(handler) = self.registry.handler_mut(snapshot.device_id) {
                handler.restore_state(&snapshot.state)?;
            }
        }
        self.frames.clear();
        self.state = state.pcb_state;
        self.pcb_address = state.pcb_address;

        log::info!(
            "Restored bus state from {} ({} device(s))",
            state.metadata.timestamp,
            state.records.len()
        );
        Ok(())
    }
}
