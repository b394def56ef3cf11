// SPDX-FileCopyrightText: The usbh-midi authors
// SPDX-License-Identifier: MPL-2.0

use derive_more::{From, Into};

use crate::{
    packet::{
        EventPacket, Status, MAX_CABLES, MAX_DATA_VALUE, MAX_PAYLOAD_SIZE, STATUS_SYSEX_END,
        STATUS_SYSEX_START,
    },
    queue::PacketQueue,
};

/// Cables with a SysEx in progress, one bit per cable.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, From, Into)]
pub struct SysExCables(u16);

impl SysExCables {
    #[must_use]
    pub const fn contains(self, cable: u8) -> bool {
        debug_assert!(cable < MAX_CABLES);
        self.0 & (1 << cable) != 0
    }

    pub fn insert(&mut self, cable: u8) {
        debug_assert!(cable < MAX_CABLES);
        self.0 |= 1 << cable;
    }

    pub fn remove(&mut self, cable: u8) {
        debug_assert!(cable < MAX_CABLES);
        self.0 &= !(1 << cable);
    }

    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub fn clear(&mut self) {
        self.0 = 0;
    }
}

/// The bytes of one or more consecutive packets of a single cable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Decoded {
    pub cable: u8,

    /// Number of bytes written into the output buffer
    pub len: usize,
}

/// Unpacks event packets into a raw MIDI byte stream.
///
/// The code index of received packets is ignored, because many devices
/// fill it in incorrectly. The number of valid payload bytes is derived
/// from the status byte instead.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StreamDecoder {
    sysex: SysExCables,
}

impl StreamDecoder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub const fn sysex_cables(&self) -> SysExCables {
        self.sysex
    }

    pub fn reset(&mut self) {
        self.sysex.clear();
    }

    /// Decode the packets at the front of the queue.
    ///
    /// Consecutive packets are decoded as long as they belong to the same
    /// cable and their contents fit into `output`, which must have room
    /// for at least [`MAX_PAYLOAD_SIZE`] bytes. Packets for cables
    /// `num_cables` and above are consumed without producing output.
    ///
    /// Returns `None` if the queue contains no complete packet.
    pub fn decode(
        &mut self,
        queue: &mut PacketQueue,
        num_cables: u8,
        output: &mut [u8],
    ) -> Option<Decoded> {
        if output.len() < MAX_PAYLOAD_SIZE {
            log::warn!(
                "Output buffer too small for decoding: {len} bytes",
                len = output.len()
            );
            return None;
        }
        let cable = queue.peek_packet()?.cable();
        let mut len = 0;
        while let Some(packet) = queue.peek_packet() {
            if packet.cable() != cable {
                break;
            }
            let (content_len, sysex) = if cable < num_cables {
                unpack(packet, self.sysex.contains(cable))
            } else {
                log::warn!(
                    "Dropping MIDI IN packet {packet:02x?} for unknown cable {cable}",
                    packet = *packet
                );
                (0, false)
            };
            let Some(content) = output.get_mut(len..len + content_len) else {
                break;
            };
            let popped = queue.pop_packet();
            debug_assert_eq!(Some(packet), popped);
            log::trace!("Dequeued MIDI IN packet {packet:02x?}", packet = *packet);
            content.copy_from_slice(&packet.payload()[..content_len]);
            len += content_len;
            if cable < num_cables {
                if sysex {
                    self.sysex.insert(cable);
                } else {
                    self.sysex.remove(cable);
                }
            }
        }
        Some(Decoded { cable, len })
    }
}

/// Determine the number of valid payload bytes.
///
/// Returns the number of bytes and whether a SysEx is still in
/// progress afterwards.
fn unpack(packet: EventPacket, sysex_in_progress: bool) -> (usize, bool) {
    let status = packet.status();
    match Status::classify(status) {
        Status::Data | Status::SysExStart => {
            if !sysex_in_progress && status != STATUS_SYSEX_START {
                // Stray data bytes outside of a SysEx
                return (0, false);
            }
            let mut len = 1;
            for &byte in &packet.payload()[1..] {
                if byte <= MAX_DATA_VALUE {
                    len += 1;
                } else if byte == STATUS_SYSEX_END {
                    return (len + 1, false);
                } else {
                    break;
                }
            }
            (len, true)
        }
        Status::ChannelVoice { len, .. } => (usize::from(len), false),
        Status::SysExEnd => (1, false),
        Status::SystemCommon { len, .. } => (usize::from(len), sysex_in_progress),
        Status::Undefined => (0, sysex_in_progress),
        // Real-time messages may be interleaved with SysEx
        Status::RealTime => (1, sysex_in_progress),
    }
}
