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

//! ADAM key codes
//!
//! Key events are packed into a `u32`: the key value in the low bits and
//! [`Modifiers`] in the high bits. The keyboard sends one byte per key, so
//! the modifiers are folded into the byte by [`adam_code`]:
//!
//! ```text
//! Key            | + SHIFT | + CONTROL
//! ---------------|---------|----------
//! F1-F6 (129-134)| +8      |
//! 144-151        | +8      | DEL -> 127
//! Arrows 160-163 |         | +4
//! BS (8)         | 184     |
//! TAB (9)        | 185     |
//! a-z            | A-Z     | 0x01-0x1A
//! ```

use bitflags::bitflags;

bitflags! {
    /// Modifier bits of a packed key event
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Modifiers: u32 {
        const CAPS    = 1 << 27;
        const SHIFT   = 1 << 28;
        const CONTROL = 1 << 29;
        const ALT     = 1 << 30;
        const RELEASE = 1 << 31;
    }
}

/// Bits holding the key value
pub const KEYCODE_MASK: u32 = 0x03FF_FFFF;

pub const KEY_BS: u32 = 8;
pub const KEY_TAB: u32 = 9;
pub const KEY_ENTER: u32 = 13;
pub const KEY_ESC: u32 = 27;
pub const KEY_HOME: u32 = 128;
pub const KEY_F1: u32 = 129;
pub const KEY_F2: u32 = 130;
pub const KEY_F3: u32 = 131;
pub const KEY_F4: u32 = 132;
pub const KEY_F5: u32 = 133;
pub const KEY_F6: u32 = 134;
pub const KEY_WILDCARD: u32 = 144;
pub const KEY_UNDO: u32 = 145;
pub const KEY_MOVE: u32 = 146;
pub const KEY_STORE: u32 = 147;
pub const KEY_INS: u32 = 148;
pub const KEY_PRINT: u32 = 149;
pub const KEY_CLEAR: u32 = 150;
pub const KEY_DEL: u32 = 151;
pub const KEY_UP: u32 = 160;
pub const KEY_RIGHT: u32 = 161;
pub const KEY_DOWN: u32 = 162;
pub const KEY_LEFT: u32 = 163;
pub const KEY_DIAG_NE: u32 = 168;
pub const KEY_DIAG_SE: u32 = 169;
pub const KEY_DIAG_SW: u32 = 170;
pub const KEY_DIAG_NW: u32 = 171;

/// Shifted characters of the US layout
const SHIFTED: &[(u8, u8)] = &[
    (b'1', b'!'),
    (b'2', b'@'),
    (b'3', b'#'),
    (b'4', b'$'),
    (b'5', b'%'),
    (b'6', b'^'),
    (b'7', b'&'),
    (b'8', b'*'),
    (b'9', b'('),
    (b'0', b')'),
    (b'-', b'_'),
    (b'=', b'+'),
    (b'[', b'{'),
    (b']', b'}'),
    (b'\\', b'|'),
    (b';', b':'),
    (b'\'', b'"'),
    (b'`', b'~'),
    (b',', b'<'),
    (b'.', b'>'),
    (b'/', b'?'),
];

/// Pack a key value and modifiers into one event
#[inline]
pub fn pack(code: u32, modifiers: Modifiers) -> u32 {
    (code & KEYCODE_MASK) | modifiers.bits()
}

/// Split a packed event into key value and modifiers
#[inline]
pub fn split(key: u32) -> (u32, Modifiers) {
    (key & KEYCODE_MASK, Modifiers::from_bits_truncate(key))
}

/// Byte the keyboard sends for a packed key event
pub fn adam_code(key: u32) -> u8 {
    let (code, mods) = split(key);
    let shift = mods.contains(Modifiers::SHIFT);
    let control = mods.contains(Modifiers::CONTROL);

    let folded = match code {
        KEY_F1..=KEY_F6 if shift => code + 8,
        KEY_DEL if control => 127,
        KEY_WILDCARD..=KEY_DEL if shift => code + 8,
        KEY_UP..=KEY_LEFT if control => code + 4,
        KEY_BS if shift => 184,
        KEY_TAB if shift => 185,
        0x61..=0x7A => {
            if control {
                code & 0x1F
            } else if shift != mods.contains(Modifiers::CAPS) {
                code - 0x20
            } else {
                code
            }
        }
        0x41..=0x5A if control => code & 0x1F,
        0x20..=0x7E if shift => shifted(code as u8).map_or(code, u32::from),
        _ => code,
    };

    (folded & 0xFF) as u8
}

fn shifted(c: u8) -> Option<u8> {
    SHIFTED
        .iter()
        .find(|(plain, _)| *plain == c)
        .map(|(_, shifted)| *shifted)
}

/// Packed events for a string of ASCII text
///
/// Newlines become `KEY_ENTER`; characters outside printable ASCII are
/// skipped.
pub fn text_to_keys(text: &str) -> Vec<u32> {
    text.bytes()
        .filter_map(|b| match b {
            b'\n' => Some(KEY_ENTER),
            b'\t' => Some(KEY_TAB),
            0x20..=0x7E => Some(u32::from(b)),
            _ => None,
        })
        .collect()
}
