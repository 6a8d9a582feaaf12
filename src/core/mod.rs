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

//! Core bus components
//!
//! - Control-block store (PCB and DCBs)
//! - Device registry
//! - Bus dispatcher
//! - Devices (keyboard, network clock)
//! - Response frames
//! - Snapshots and configuration

pub mod bus;
pub mod config;
pub mod control_block;
pub mod device;
pub mod error;
pub mod frame;
pub mod keys;
pub mod netplay;
pub mod registry;
pub mod save_state;

// Re-export commonly used types
pub use bus::{AdamNet, BlockRef, BusMessage, Dispatch, PcbState};
pub use config::BusConfig;
pub use device::keyboard::KeyboardHandle;
pub use device::PeripheralDevice;
pub use error::{AdamNetError, Result};
pub use frame::{Frame, Response};
