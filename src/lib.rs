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

//! AdamNet peripheral bus emulation
//!
//! This library emulates the peripheral network of the Coleco ADAM: the
//! control blocks the host CPU reads and writes, the dispatcher that turns
//! command writes into device activity, and the reference devices
//! (keyboard, network clock, network adapter).
//!
//! # Example
//!
//! ```
//! use adamnet::core::config::BusConfig;
//! use adamnet::core::device::{cmd, KEYBOARD_ID};
//! use adamnet::core::{AdamNet, BusMessage, Dispatch};
//!
//! let mut bus = AdamNet::from_config(&BusConfig::default()).unwrap();
//! bus.push_key(u32::from(b'A'));
//!
//! let posted = bus.dispatch(BusMessage::Device {
//!     device_id: KEYBOARD_ID,
//!     command: cmd::RECEIVE,
//! });
//! assert_eq!(posted, Dispatch::Posted(0xB0));
//! ```

pub mod core;
