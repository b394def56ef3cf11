// SPDX-FileCopyrightText: The usbh-midi authors
// SPDX-License-Identifier: MPL-2.0

//! USB-MIDI event packets
//!
//! Each event packet consists of 4 bytes. The first byte carries the
//! cable number in the high nibble and the code index in the low nibble,
//! followed by up to 3 bytes of MIDI payload that are padded with zeros.

use derive_more::{Deref, From, Into};
use strum::{EnumCount, EnumIter, FromRepr};

/// Size of an event packet in bytes.
pub const PACKET_SIZE: usize = 4;

/// Maximum number of MIDI bytes carried by a single event packet.
pub const MAX_PAYLOAD_SIZE: usize = PACKET_SIZE - 1;

/// Cable numbers are 4 bits wide.
pub const MAX_CABLES: u8 = 16;

pub const MAX_DATA_VALUE: u8 = 0x7f;

pub const STATUS_SYSEX_START: u8 = 0xf0;
pub const STATUS_TIME_CODE_QUARTER_FRAME: u8 = 0xf1;
pub const STATUS_SONG_POSITION_POINTER: u8 = 0xf2;
pub const STATUS_SONG_SELECT: u8 = 0xf3;
pub const STATUS_TUNE_REQUEST: u8 = 0xf6;
pub const STATUS_SYSEX_END: u8 = 0xf7;

/// Timing clock, the lowest real-time status.
pub const STATUS_TIMING_CLOCK: u8 = 0xf8;

/// Code index number (CIN)
///
/// Covers all 16 values of the low nibble of the packet header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, FromRepr, EnumIter, EnumCount)]
#[repr(u8)]
pub enum CodeIndex {
    /// Reserved for future extensions
    Misc = 0x0,
    /// Reserved for future cable events
    CableEvent = 0x1,
    /// Two-byte System Common message
    SystemCommon2 = 0x2,
    /// Three-byte System Common message
    SystemCommon3 = 0x3,
    /// SysEx starts or continues
    SysExStart = 0x4,
    /// Single-byte System Common message or SysEx ends with the following single byte
    SystemCommon1 = 0x5,
    /// SysEx ends with the following two bytes
    SysExEnd2 = 0x6,
    /// SysEx ends with the following three bytes
    SysExEnd3 = 0x7,
    NoteOff = 0x8,
    NoteOn = 0x9,
    PolyKeyPress = 0xa,
    ControlChange = 0xb,
    ProgramChange = 0xc,
    ChannelPressure = 0xd,
    PitchBendChange = 0xe,
    /// Single byte, unparsed
    SingleByte = 0xf,
}

impl CodeIndex {
    /// Decode the low nibble of a packet header.
    #[must_use]
    pub const fn from_nibble(nibble: u8) -> Self {
        match Self::from_repr(nibble & 0x0f) {
            Some(code_index) => code_index,
            // All 16 values are covered
            None => unreachable!(),
        }
    }

    /// The code index that terminates a SysEx after `num_bytes`.
    #[must_use]
    pub const fn sysex_end(num_bytes: usize) -> Option<Self> {
        match num_bytes {
            1 => Some(Self::SystemCommon1),
            2 => Some(Self::SysExEnd2),
            3 => Some(Self::SysExEnd3),
            _ => None,
        }
    }
}

/// Classification of a MIDI byte in the status position.
///
/// The lengths include the status byte itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    /// Data byte in the range `0x00..=0x7f`
    Data,

    /// Channel Voice message
    ChannelVoice { code_index: CodeIndex, len: u8 },

    /// Start of a System Exclusive message
    SysExStart,

    /// System Common message other than SysEx end
    SystemCommon { code_index: CodeIndex, len: u8 },

    /// End of a System Exclusive message
    SysExEnd,

    /// Undefined System Common status
    Undefined,

    /// System Real-Time message, always a single byte
    RealTime,
}

impl Status {
    #[must_use]
    pub const fn classify(byte: u8) -> Self {
        match byte {
            0x00..=MAX_DATA_VALUE => Self::Data,
            0x80..=0xef => {
                let code_index = CodeIndex::from_nibble(byte >> 4);
                let len = match code_index {
                    CodeIndex::ProgramChange | CodeIndex::ChannelPressure => 2,
                    _ => 3,
                };
                Self::ChannelVoice { code_index, len }
            }
            STATUS_SYSEX_START => Self::SysExStart,
            STATUS_TIME_CODE_QUARTER_FRAME | STATUS_SONG_SELECT => Self::SystemCommon {
                code_index: CodeIndex::SystemCommon2,
                len: 2,
            },
            STATUS_SONG_POSITION_POINTER => Self::SystemCommon {
                code_index: CodeIndex::SystemCommon3,
                len: 3,
            },
            STATUS_TUNE_REQUEST => Self::SystemCommon {
                code_index: CodeIndex::SystemCommon1,
                len: 1,
            },
            STATUS_SYSEX_END => Self::SysExEnd,
            0xf4 | 0xf5 => Self::Undefined,
            STATUS_TIMING_CLOCK..=0xff => Self::RealTime,
        }
    }

    /// Length of the complete message including the status byte.
    ///
    /// Unknown for data bytes, undefined status bytes, and SysEx.
    #[must_use]
    pub const fn message_len(self) -> Option<u8> {
        match self {
            Self::ChannelVoice { len, .. } | Self::SystemCommon { len, .. } => Some(len),
            Self::SysExEnd | Self::RealTime => Some(1),
            Self::Data | Self::SysExStart | Self::Undefined => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Deref, From, Into)]
pub struct EventPacket([u8; PACKET_SIZE]);

impl EventPacket {
    /// Assemble a packet from its parts.
    ///
    /// Payload bytes beyond [`MAX_PAYLOAD_SIZE`] are ignored. The `cable`
    /// must be less than [`MAX_CABLES`].
    #[must_use]
    pub fn new(cable: u8, code_index: CodeIndex, payload: &[u8]) -> Self {
        debug_assert!(cable < MAX_CABLES);
        let mut bytes = [0; PACKET_SIZE];
        bytes[0] = header(cable, code_index);
        let len = payload.len().min(MAX_PAYLOAD_SIZE);
        bytes[1..=len].copy_from_slice(&payload[..len]);
        Self(bytes)
    }

    #[must_use]
    pub const fn from_bytes(bytes: [u8; PACKET_SIZE]) -> Self {
        Self(bytes)
    }

    #[must_use]
    pub const fn cable(&self) -> u8 {
        self.0[0] >> 4
    }

    /// The code index as declared by the sender.
    ///
    /// Many devices fill in this field incorrectly.
    #[must_use]
    pub const fn code_index(&self) -> CodeIndex {
        CodeIndex::from_nibble(self.0[0])
    }

    /// The first payload byte
    #[must_use]
    pub const fn status(&self) -> u8 {
        self.0[1]
    }

    #[must_use]
    pub const fn payload(&self) -> &[u8] {
        let [_, payload @ ..] = &self.0;
        payload
    }

    /// Some devices send all-zero packets when they have nothing to report.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0 == [0; PACKET_SIZE]
    }

    #[must_use]
    pub const fn to_bytes(self) -> [u8; PACKET_SIZE] {
        self.0
    }
}

#[must_use]
pub(crate) const fn header(cable: u8, code_index: CodeIndex) -> u8 {
    (cable << 4) | code_index as u8
}
