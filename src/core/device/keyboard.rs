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

//! ADAM keyboard
//!
//! Key events arrive from the host environment at any time, possibly from an
//! input thread, through a [`KeyboardHandle`]. The bus drains them one key per
//! `Receive` command.
//!
//! ## Command Contract
//!
//! ```text
//! Code | Action
//! -----|----------------------------------------------------
//! 0x00 | Flush queue, re-announce, post Status
//! 0x01 | Post Status (0x01 = key pending, 0x00 = empty)
//! 0x02 | Host accepted the last key, post Ack
//! 0x03 | Flush queue, post Ack
//! 0x04 | Pop one key, post 1-byte data frame (Status if empty)
//! 0x05 | Drop the unacknowledged key, post Cancel
//! 0x06 | Unsupported (input-only device)
//! 0x07 | Resend the unacknowledged key
//! 0xFF | Post Status
//! ```

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::{Deserialize, Serialize};

use super::{cmd, Capabilities, DeviceContext, DeviceState, PeripheralDevice, KEYBOARD_ID};
use crate::core::control_block::Dcb;
use crate::core::error::{AdamNetError, Result};
use crate::core::frame::Response;
use crate::core::keys;

/// Status byte: no key waiting
pub const STATUS_EMPTY: u8 = 0x00;
/// Status byte: at least one key waiting
pub const STATUS_KEY_PENDING: u8 = 0x01;

/// Default queue capacity
pub const DEFAULT_CAPACITY: usize = 16;

/// What happens when a key arrives at a full queue
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OverflowPolicy {
    /// Discard the incoming key
    #[default]
    DropNewest,
    /// Discard the oldest queued key to make room
    DropOldest,
}

/// Bounded FIFO of packed key codes
#[derive(Debug, Clone)]
pub struct KeyQueue {
    keys: VecDeque<u32>,
    capacity: usize,
    policy: OverflowPolicy,
}

impl KeyQueue {
    /// Create an empty queue
    ///
    /// A capacity of zero is raised to one.
    pub fn new(capacity: usize, policy: OverflowPolicy) -> Self {
        let capacity = capacity.max(1);
        Self {
            keys: VecDeque::with_capacity(capacity),
            capacity,
            policy,
        }
    }

    /// Append a key
    ///
    /// # Returns
    ///
    /// The key discarded by the overflow policy, if any
    pub fn push(&mut self, key: u32) -> Option<u32> {
        if self.keys.len() < self.capacity {
            self.keys.push_back(key);
            return None;
        }

        match self.policy {
            OverflowPolicy::DropNewest => Some(key),
            OverflowPolicy::DropOldest => {
                let dropped = self.keys.pop_front();
                self.keys.push_back(key);
                dropped
            }
        }
    }

    /// Remove the oldest key, `None` when empty
    pub fn pop(&mut self) -> Option<u32> {
        self.keys.pop_front()
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn policy(&self) -> OverflowPolicy {
        self.policy
    }

    pub fn clear(&mut self) {
        self.keys.clear();
    }

    /// Queued keys, oldest first
    pub fn contents(&self) -> Vec<u32> {
        self.keys.iter().copied().collect()
    }
}

/// Thread-safe handle to a keyboard queue
///
/// Cloning the handle shares the queue.
#[derive(Debug, Clone)]
pub struct KeyboardHandle {
    queue: Arc<Mutex<KeyQueue>>,
}

impl KeyboardHandle {
    fn new(queue: KeyQueue) -> Self {
        Self {
            queue: Arc::new(Mutex::new(queue)),
        }
    }

    fn lock(&self) -> MutexGuard<'_, KeyQueue> {
        self.queue.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Queue a key event (value + modifier bits)
    ///
    /// Never blocks on the bus; only contends with a dispatch in progress.
    ///
    /// # Returns
    ///
    /// The key discarded by the overflow policy, if any
    pub fn push(&self, key: u32) -> Option<u32> {
        let dropped = self.lock().push(key);
        if let Some(lost) = dropped {
            log::debug!("Keyboard: queue full, dropped key 0x{:08X}", lost);
        }
        dropped
    }

    /// Remove the oldest key
    pub fn pop(&self) -> Option<u32> {
        self.lock().pop()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    pub fn policy(&self) -> OverflowPolicy {
        self.lock().policy()
    }

    /// Queued keys, oldest first
    pub fn contents(&self) -> Vec<u32> {
        self.lock().contents()
    }

    fn replace(&self, keys: &[u32]) {
        let mut queue = self.lock();
        queue.clear();
        for &key in keys {
            queue.push(key);
        }
    }
}

/// Keyboard device
pub struct KeyboardDevice {
    queue: KeyboardHandle,
    /// Last key sent in a data frame, kept until the host acks or cancels
    unacknowledged: Option<u8>,
}

impl KeyboardDevice {
    /// Create a keyboard with an empty queue
    pub fn new(capacity: usize, policy: OverflowPolicy) -> Self {
        Self {
            queue: KeyboardHandle::new(KeyQueue::new(capacity, policy)),
            unacknowledged: None,
        }
    }

    /// Handle for the input side
    pub fn input(&self) -> KeyboardHandle {
        self.queue.clone()
    }

    fn status(&self, dcb: &Dcb) -> Response {
        let status = if self.queue.is_empty() {
            STATUS_EMPTY
        } else {
            STATUS_KEY_PENDING
        };
        Response::Status {
            tx_code: dcb.additional_code,
            status,
        }
    }

    fn empty(dcb: &Dcb) -> Response {
        Response::Status {
            tx_code: dcb.additional_code,
            status: STATUS_EMPTY,
        }
    }
}

impl PeripheralDevice for KeyboardDevice {
    fn device_id(&self) -> u8 {
        KEYBOARD_ID
    }

    fn name(&self) -> &'static str {
        "keyboard"
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::CHARACTER
    }

    fn handle(&mut self, command: u8, dcb: &Dcb, ctx: &mut DeviceContext<'_>) {
        match command {
            cmd::RESET => {
                log::debug!("Keyboard: reset");
                self.queue.clear();
                self.unacknowledged = None;
                ctx.announce(self.capabilities());
                ctx.respond(self.status(dcb));
            }
            cmd::STATUS | cmd::POLL => ctx.respond(self.status(dcb)),
            cmd::ACK => {
                self.unacknowledged = None;
                ctx.respond(Response::Ack(dcb.additional_code));
            }
            cmd::CLEAR => {
                self.queue.clear();
                self.unacknowledged = None;
                ctx.respond(Response::Ack(dcb.additional_code));
            }
            cmd::RECEIVE => match self.queue.pop() {
                Some(key) => {
                    let code = keys::adam_code(key);
                    log::trace!("Keyboard: sending 0x{:02X}", code);
                    self.unacknowledged = Some(code);
                    ctx.respond(Response::Send(vec![code]));
                }
                None => ctx.respond(Self::empty(dcb)),
            },
            cmd::CANCEL => {
                self.unacknowledged = None;
                ctx.respond(Response::Cancel);
            }
            cmd::NACK => match self.unacknowledged {
                Some(code) => ctx.respond(Response::Send(vec![code])),
                None => ctx.respond(Self::empty(dcb)),
            },
            _ => log::trace!("Keyboard: unsupported command 0x{:02X}", command),
        }
    }

    fn reset(&mut self) {
        self.queue.clear();
        self.unacknowledged = None;
    }

    fn save_state(&self) -> DeviceState {
        DeviceState::Keyboard {
            keys: self.queue.contents(),
            unacknowledged: self.unacknowledged,
        }
    }

    fn accepts_state(&self, state: &DeviceState) -> bool {
        matches!(state, DeviceState::Keyboard { .. })
    }

    fn restore_state(&mut self, state: &DeviceState) -> Result<()> {
        match state {
            DeviceState::Keyboard {
                keys,
                unacknowledged,
            } => {
                self.queue.replace(keys);
                self.unacknowledged = *unacknowledged;
                Ok(())
            }
            other => Err(AdamNetError::SaveState(format!(
                "keyboard cannot restore {:?}",
                other
            ))),
        }
    }
}
