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

//! AdamNet response frames
//!
//! ## Wire Format
//!
//! ```text
//! Status: [0x8n][size hi][size lo][tx code][status][checksum]
//! Data:   [0xB0][size hi][size lo][data ...][checksum]
//! Ack:    [0x9n]
//! Cancel: [0xA0]
//! Nack:   [0xC0]
//! ```
//!
//! The checksum is the XOR of the body (size field through payload).
//! Any frame that fails to decode is treated as a `Nack` by the receiver.

use crate::core::error::FrameError;

/// Response codes (high nibble of the posted byte)
pub mod rsp {
    pub const STATUS: u8 = 0x80;
    pub const ACK: u8 = 0x90;
    pub const CANCEL: u8 = 0xA0;
    pub const SEND: u8 = 0xB0;
    pub const NACK: u8 = 0xC0;
    /// Mask selecting the response class
    pub const CLASS_MASK: u8 = 0xF0;
}

/// Response class of a posted byte
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseKind {
    Status,
    Ack,
    Cancel,
    Send,
    Nack,
    /// Anything else (e.g. an unset status latch)
    Other,
}

impl ResponseKind {
    /// Classify a response byte by its high nibble
    pub fn of(code: u8) -> Self {
        match code & rsp::CLASS_MASK {
            rsp::STATUS => ResponseKind::Status,
            rsp::ACK => ResponseKind::Ack,
            rsp::CANCEL => ResponseKind::Cancel,
            rsp::SEND => ResponseKind::Send,
            rsp::NACK => ResponseKind::Nack,
            _ => ResponseKind::Other,
        }
    }
}

/// A device response
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    /// Status frame
    Status { tx_code: u8, status: u8 },
    /// Acknowledge, transaction code in the low nibble
    Ack(u8),
    /// Cancel
    Cancel,
    /// Data frame
    Send(Vec<u8>),
    /// Negative acknowledge
    Nack,
}

impl Response {
    /// Byte posted into the DCB command/status field
    pub fn code(&self) -> u8 {
        match self {
            Response::Status { .. } => rsp::STATUS,
            Response::Ack(tx) => rsp::ACK | (tx & 0x0F),
            Response::Cancel => rsp::CANCEL,
            Response::Send(_) => rsp::SEND,
            Response::Nack => rsp::NACK,
        }
    }

    /// Encode the response into a wire frame
    ///
    /// # Arguments
    ///
    /// * `message_size` - Announced message size of the device (status frames only)
    pub fn encode(&self, message_size: u16) -> Frame {
        let mut bytes = vec![self.code()];
        match self {
            Response::Status { tx_code, status } => {
                bytes.extend_from_slice(&message_size.to_be_bytes());
                bytes.push(*tx_code);
                bytes.push(*status);
                bytes.push(checksum(&bytes[1..]));
            }
            Response::Send(data) => {
                bytes.extend_from_slice(&(data.len() as u16).to_be_bytes());
                bytes.extend_from_slice(data);
                bytes.push(checksum(&bytes[1..]));
            }
            Response::Ack(_) | Response::Cancel | Response::Nack => {}
        }
        Frame { bytes }
    }

    /// Decode a frame as seen by the receiver
    ///
    /// Checksum failures and malformed frames collapse to `Nack`.
    pub fn from_wire(bytes: &[u8]) -> Self {
        match Frame::decode(bytes) {
            Ok(response) => response,
            Err(e) => {
                log::debug!("AdamNet: rejecting frame ({}), treating as NACK", e);
                Response::Nack
            }
        }
    }
}

/// XOR checksum over a frame body
#[inline]
pub fn checksum(body: &[u8]) -> u8 {
    body.iter().fold(0, |acc, &b| acc ^ b)
}

/// An encoded response frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    bytes: Vec<u8>,
}

impl Frame {
    /// Raw frame bytes
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Response code (first byte)
    pub fn code(&self) -> u8 {
        self.bytes[0]
    }

    /// Frame body (size field through payload), empty for single-byte frames
    pub fn body(&self) -> &[u8] {
        if self.bytes.len() > 2 {
            &self.bytes[1..self.bytes.len() - 1]
        } else {
            &[]
        }
    }

    /// Data payload of a data frame
    pub fn payload(&self) -> Option<&[u8]> {
        if ResponseKind::of(self.code()) == ResponseKind::Send {
            Some(&self.body()[2..])
        } else {
            None
        }
    }

    /// Decode and verify a frame
    ///
    /// # Errors
    ///
    /// - `Empty` for a zero-length input
    /// - `Truncated` if the size field promises more bytes than present
    /// - `ChecksumMismatch` if the trailing checksum does not match the body
    /// - `UnknownResponse` for a code outside the response classes
    pub fn decode(bytes: &[u8]) -> Result<Response, FrameError> {
        let code = *bytes.first().ok_or(FrameError::Empty)?;

        match ResponseKind::of(code) {
            ResponseKind::Ack => Ok(Response::Ack(code & 0x0F)),
            ResponseKind::Cancel => Ok(Response::Cancel),
            ResponseKind::Nack => Ok(Response::Nack),
            ResponseKind::Status => {
                let body = verified_body(bytes, 4)?;
                Ok(Response::Status {
                    tx_code: body[2],
                    status: body[3],
                })
            }
            ResponseKind::Send => {
                if bytes.len() < 3 {
                    return Err(FrameError::Truncated {
                        expected: 4,
                        got: bytes.len(),
                    });
                }
                let size = u16::from_be_bytes([bytes[1], bytes[2]]) as usize;
                let body = verified_body(bytes, 2 + size)?;
                Ok(Response::Send(body[2..].to_vec()))
            }
            ResponseKind::Other => Err(FrameError::UnknownResponse(code)),
        }
    }
}

/// Check length and checksum, returning the body
fn verified_body(bytes: &[u8], body_len: usize) -> Result<&[u8], FrameError> {
    let expected = body_len + 2;
    if bytes.len() < expected {
        return Err(FrameError::Truncated {
            expected,
            got: bytes.len(),
        });
    }
    let body = &bytes[1..1 + body_len];
    let got = bytes[1 + body_len];
    let computed = checksum(body);
    if computed != got {
        return Err(FrameError::ChecksumMismatch {
            expected: computed,
            got,
        });
    }
    Ok(body)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_response_codes() {
        assert_eq!(Response::Status { tx_code: 0, status: 0 }.code(), 0x80);
        assert_eq!(Response::Ack(0x0B).code(), 0x9B);
        assert_eq!(Response::Ack(0xFB).code(), 0x9B);
        assert_eq!(Response::Cancel.code(), 0xA0);
        assert_eq!(Response::Send(vec![1]).code(), 0xB0);
        assert_eq!(Response::Nack.code(), 0xC0);
    }

    #[test]
    fn test_response_kind() {
        assert_eq!(ResponseKind::of(0x9B), ResponseKind::Ack);
        assert_eq!(ResponseKind::of(0xC0), ResponseKind::Nack);
        assert_eq!(ResponseKind::of(0x00), ResponseKind::Other);
        assert_eq!(ResponseKind::of(0x81), ResponseKind::Status);
    }

    #[test]
    fn test_status_frame_layout() {
        let frame = Response::Status {
            tx_code: 0x0B,
            status: 0x80,
        }
        .encode(0x0001);

        assert_eq!(
            frame.as_bytes(),
            &[0x80, 0x00, 0x01, 0x0B, 0x80, 0x00 ^ 0x01 ^ 0x0B ^ 0x80]
        );
        assert_eq!(frame.body(), &[0x00, 0x01, 0x0B, 0x80]);
        assert_eq!(frame.payload(), None);
    }

    #[test]
    fn test_data_frame_layout() {
        let frame = Response::Send(vec![b'A', b'B']).encode(0);

        assert_eq!(
            frame.as_bytes(),
            &[0xB0, 0x00, 0x02, b'A', b'B', 0x02 ^ b'A' ^ b'B']
        );
        assert_eq!(frame.payload(), Some(&[b'A', b'B'][..]));
    }

    #[test]
    fn test_ack_frames_have_no_payload() {
        assert_eq!(Response::Ack(3).encode(1).as_bytes(), &[0x93]);
        assert_eq!(Response::Cancel.encode(1).as_bytes(), &[0xA0]);
        assert_eq!(Response::Nack.encode(1).as_bytes(), &[0xC0]);
    }

    #[test]
    fn test_decode_round_trip() {
        let status = Response::Status {
            tx_code: 2,
            status: 0x41,
        };
        let frame = status.encode(0x0400);
        assert_eq!(Frame::decode(frame.as_bytes()), Ok(status));

        let data = Response::Send(vec![0x0D]);
        assert_eq!(Response::from_wire(data.encode(0).as_bytes()), data);
    }

    #[test]
    fn test_checksum_mismatch_is_nack() {
        let frame = Response::Send(vec![0x41]).encode(0);
        let mut bytes = frame.as_bytes().to_vec();
        bytes[3] ^= 0x01;

        assert!(matches!(
            Frame::decode(&bytes),
            Err(FrameError::ChecksumMismatch { .. })
        ));
        assert_eq!(Response::from_wire(&bytes), Response::Nack);
    }

    #[test]
    fn test_truncated_frames_are_nack() {
        assert_eq!(Frame::decode(&[]), Err(FrameError::Empty));
        assert!(matches!(
            Frame::decode(&[0xB0, 0x00, 0x05, 0x01]),
            Err(FrameError::Truncated { .. })
        ));
        assert!(matches!(
            Frame::decode(&[0x80, 0x00]),
            Err(FrameError::Truncated { .. })
        ));
        assert_eq!(Response::from_wire(&[0xB0]), Response::Nack);
    }

    #[test]
    fn test_unknown_response_code() {
        assert_eq!(
            Frame::decode(&[0x12]),
            Err(FrameError::UnknownResponse(0x12))
        );
    }
}
