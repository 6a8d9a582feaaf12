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

/// Bus error types
use thiserror::Error;

/// Result type for bus operations
pub type Result<T> = std::result::Result<T, AdamNetError>;

/// Main error type for the peripheral bus
///
/// Only `OutOfRange`, `ReadOnlyField` and the I/O related variants ever reach a
/// caller. The protocol errors (`UnknownDevice`, `DeviceUnresponsive`,
/// `ChecksumMismatch`) are recovered inside the dispatcher as `Nack` responses;
/// they exist as values so the recovery paths can be logged and tested.
#[derive(Error, Debug)]
pub enum AdamNetError {
    #[error("Address 0x{address:04X} is outside the control-block window")]
    AddressOutOfRange { address: u16 },

    #[error("Offset {offset} out of range for {block} (size {size})")]
    OutOfRange {
        block: &'static str,
        offset: usize,
        size: usize,
    },

    #[error("Unknown device: 0x{0:02X}")]
    UnknownDevice(u8),

    #[error("Device 0x{0:02X} is unresponsive (retry count exhausted)")]
    DeviceUnresponsive(u8),

    #[error("No free DCB slot for device 0x{0:02X}")]
    NoFreeDcb(u8),

    #[error("DCB offset {offset} is read-only for device handlers")]
    ReadOnlyField { offset: usize },

    #[error("Frame error: {0}")]
    Frame(#[from] FrameError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Save state error: {0}")]
    SaveState(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Frame decoding errors
///
/// A receiver that hits any of these treats the response as a `Nack`.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FrameError {
    #[error("Checksum mismatch: expected 0x{expected:02X}, got 0x{got:02X}")]
    ChecksumMismatch { expected: u8, got: u8 },

    #[error("Truncated frame: need {expected} bytes, got {got}")]
    Truncated { expected: usize, got: usize },

    #[error("Empty frame")]
    Empty,

    #[error("Unknown response code: {0:#04x}")]
    UnknownResponse(u8),
}
