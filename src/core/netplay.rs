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

//! Two-player control exchange
//!
//! Each frame both machines trade their local joystick state. The server is
//! player one (low 16 bits), the client player two (high 16 bits). An
//! exchange never blocks: with no fresh value from the peer the local state
//! is used as-is.
//!
//! At most one value is in flight per direction. While the peer has not
//! picked up the previous value, newer ones are dropped.

use std::sync::mpsc::{self, Receiver, SyncSender, TryRecvError, TrySendError};

/// Side of a two-player session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncRole {
    Server,
    Client,
}

/// Combine local and remote joystick state into one word
///
/// Only the low 16 bits of each side are used.
pub fn merge_controls(local: u32, remote: u32, role: SyncRole) -> u32 {
    let (player1, player2) = match role {
        SyncRole::Server => (local, remote),
        SyncRole::Client => (remote, local),
    };
    (player1 & 0xFFFF) | ((player2 & 0xFFFF) << 16)
}

/// Transport for per-frame control state
pub trait ControlExchange {
    /// Which side this end plays
    fn role(&self) -> SyncRole;

    /// Publish `local` and return the peer's latest state, if any
    ///
    /// Must return immediately.
    fn exchange(&mut self, local: u32) -> Option<u32>;
}

/// Merged control word for this frame
///
/// Falls back to `local` unchanged when the peer has nothing new.
pub fn exchange_controls(local: u32, link: &mut dyn ControlExchange) -> u32 {
    match link.exchange(local) {
        Some(remote) => merge_controls(local, remote, link.role()),
        None => local,
    }
}

/// In-process exchange over a pair of channels
pub struct ChannelExchange {
    role: SyncRole,
    tx: SyncSender<u32>,
    rx: Receiver<u32>,
    connected: bool,
}

impl ChannelExchange {
    /// Connected server and client ends
    pub fn pair() -> (Self, Self) {
        let (to_client, from_server) = mpsc::sync_channel(1);
        let (to_server, from_client) = mpsc::sync_channel(1);
        (
            Self {
                role: SyncRole::Server,
                tx: to_client,
                rx: from_client,
                connected: true,
            },
            Self {
                role: SyncRole::Client,
                tx: to_server,
                rx: from_server,
                connected: true,
            },
        )
    }

    /// False once the peer end has been dropped
    pub fn is_connected(&self) -> bool {
        self.connected
    }
}

impl ControlExchange for ChannelExchange {
    fn role(&self) -> SyncRole {
        self.role
    }

    fn exchange(&mut self, local: u32) -> Option<u32> {
        if !self.connected {
            return None;
        }
        match self.tx.try_send(local) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                log::trace!("Netplay: peer behind, 0x{:08X} dropped", local);
            }
            Err(TrySendError::Disconnected(_)) => {
                log::debug!("Netplay: peer gone");
                self.connected = false;
                return None;
            }
        }

        // Drain to the most recent value
        let mut latest = None;
        loop {
            match self.rx.try_recv() {
                Ok(value) => latest = Some(value),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    self.connected = false;
                    break;
                }
            }
        }
        latest
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_merge_server_is_player_one() {
        assert_eq!(
            merge_controls(0x1234, 0xABCD, SyncRole::Server),
            0xABCD_1234
        );
        assert_eq!(
            merge_controls(0x1234, 0xABCD, SyncRole::Client),
            0x1234_ABCD
        );
    }

    #[test]
    fn test_merge_masks_high_bits() {
        assert_eq!(
            merge_controls(0xFFFF_0001, 0xFFFF_0002, SyncRole::Server),
            0x0002_0001
        );
    }

    #[test]
    fn test_no_peer_value_keeps_local() {
        let (mut server, _client) = ChannelExchange::pair();
        assert_eq!(exchange_controls(0x0042, &mut server), 0x0042);
    }

    #[test]
    fn test_both_sides_agree() {
        let (mut server, mut client) = ChannelExchange::pair();

        // First exchange only publishes; peer has sent nothing yet
        assert_eq!(server.exchange(0x0001), None);

        let client_word = exchange_controls(0x0002, &mut client);
        let server_word = exchange_controls(0x0001, &mut server);

        assert_eq!(client_word, 0x0002_0001);
        assert_eq!(server_word, 0x0002_0001);
    }

    #[test]
    fn test_stalled_peer_stays_bounded() {
        let (mut server, mut client) = ChannelExchange::pair();
        for value in 1..=1000 {
            client.exchange(value);
        }

        // Only the first unread value was buffered
        assert_eq!(server.exchange(0), Some(1));
        assert_eq!(server.exchange(0), None);
        assert!(client.is_connected());

        // Room again once the peer catches up
        client.exchange(7);
        assert_eq!(server.exchange(0), Some(7));
    }

    #[test]
    fn test_disconnected_peer() {
        let (mut server, client) = ChannelExchange::pair();
        drop(client);

        assert_eq!(exchange_controls(0x7, &mut server), 0x7);
        assert!(!server.is_connected());
    }
}
