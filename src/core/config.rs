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

//! Bus configuration
//!
//! Every field has a hardware default, so an empty file is a valid
//! configuration.
//!
//! ```toml
//! pcb_address = 0xFEC0
//! max_dcbs = 15
//! retry_count = 16
//!
//! [keyboard]
//! capacity = 16
//! overflow = "drop-newest"
//!
//! [devices]
//! keyboard = true
//! net_clock = true
//! net_adapter = false
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::core::control_block::{dcb, pcb};
use crate::core::device::keyboard::{OverflowPolicy, DEFAULT_CAPACITY};
use crate::core::error::{AdamNetError, Result};

/// Default PCB address in host memory
pub const DEFAULT_PCB_ADDRESS: u16 = 0xFEC0;

/// Maximum number of DCBs the PCB can describe
pub const MAX_DCBS: u8 = 15;

/// Default retry count written into each DCB on announce
pub const DEFAULT_RETRY_COUNT: u16 = 16;

/// Bus configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BusConfig {
    /// Host address of the PCB (window base)
    pub pcb_address: u16,
    /// Number of DCB slots (1-15)
    pub max_dcbs: u8,
    /// Retries before a device is marked unresponsive (at least 1)
    pub retry_count: u16,
    pub keyboard: KeyboardConfig,
    pub devices: DeviceConfig,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            pcb_address: DEFAULT_PCB_ADDRESS,
            max_dcbs: MAX_DCBS,
            retry_count: DEFAULT_RETRY_COUNT,
            keyboard: KeyboardConfig::default(),
            devices: DeviceConfig::default(),
        }
    }
}

/// Keyboard queue settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct KeyboardConfig {
    pub capacity: usize,
    pub overflow: OverflowPolicy,
}

impl Default for KeyboardConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CAPACITY,
            overflow: OverflowPolicy::default(),
        }
    }
}

/// Devices plugged in at startup
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DeviceConfig {
    pub keyboard: bool,
    pub net_clock: bool,
    pub net_adapter: bool,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            keyboard: true,
            net_clock: true,
            net_adapter: false,
        }
    }
}

impl BusConfig {
    /// Parse and validate a TOML document
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: BusConfig =
            toml::from_str(text).map_err(|e| AdamNetError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a TOML file
    ///
    /// # Errors
    ///
    /// `Io` if the file cannot be read, `Config` if it does not parse or
    /// fails validation
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        let config = Self::from_toml_str(&text)?;
        log::info!("Loaded bus configuration from {}", path.display());
        Ok(config)
    }

    /// Serialize to TOML
    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string(self).map_err(|e| AdamNetError::Config(e.to_string()))
    }

    /// Size in bytes of the control-block window
    pub fn window_size(&self) -> usize {
        pcb::SIZE + self.max_dcbs as usize * dcb::SIZE
    }

    /// Check ranges
    pub fn validate(&self) -> Result<()> {
        if !(1..=MAX_DCBS).contains(&self.max_dcbs) {
            return Err(AdamNetError::Config(format!(
                "max_dcbs must be 1-{}, got {}",
                MAX_DCBS, self.max_dcbs
            )));
        }
        if self.retry_count == 0 {
            return Err(AdamNetError::Config(
                "retry_count must be at least 1".to_string(),
            ));
        }
        if self.keyboard.capacity == 0 {
            return Err(AdamNetError::Config(
                "keyboard capacity must be at least 1".to_string(),
            ));
        }
        let end = self.pcb_address as usize + self.window_size();
        if end > 0x1_0000 {
            return Err(AdamNetError::Config(format!(
                "control-block window 0x{:04X}+{} runs past 0xFFFF",
                self.pcb_address,
                self.window_size()
            )));
        }
        Ok(())
    }
}
