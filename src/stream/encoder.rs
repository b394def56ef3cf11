// SPDX-FileCopyrightText: The usbh-midi authors
// SPDX-License-Identifier: MPL-2.0

use crate::{
    packet::{
        header, CodeIndex, EventPacket, Status, MAX_CABLES, PACKET_SIZE, STATUS_SYSEX_END,
        STATUS_TIMING_CLOCK,
    },
    queue::PacketQueue,
};

/// Packs a raw MIDI byte stream into event packets.
///
/// Keeps the partially filled packet between invocations, i.e. the
/// bytes of a message may be fed one at a time. All bytes of a message
/// must be written for the same cable.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StreamEncoder {
    /// Retains the header of the last packet after it has been queued
    /// for detecting SysEx continuation.
    buffer: [u8; PACKET_SIZE],
    index: usize,
    total: usize,
}

impl StreamEncoder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// No packet is in progress.
    #[must_use]
    pub const fn is_idle(&self) -> bool {
        self.index == 0
    }

    /// The last started packet has been a SysEx start or continuation.
    #[must_use]
    pub const fn is_sysex_in_progress(&self) -> bool {
        matches!(
            CodeIndex::from_nibble(self.buffer[0]),
            CodeIndex::SysExStart
        )
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Encode the bytes of `input` into the queue.
    ///
    /// Stops when running out of either input or free space in the queue.
    /// Returns the number of bytes consumed. The remaining bytes must
    /// be submitted again later. Nothing is consumed for cable numbers
    /// that do not fit into the packet header.
    pub fn encode(&mut self, cable: u8, input: &[u8], queue: &mut PacketQueue) -> usize {
        if cable >= MAX_CABLES {
            log::warn!("Cannot encode MIDI bytes for invalid cable {cable}");
            return 0;
        }
        let mut consumed = 0;
        while consumed < input.len() && queue.has_room_for_packet() {
            let byte = input[consumed];
            consumed += 1;
            if byte >= STATUS_TIMING_CLOCK {
                // Real-time messages bypass the buffered packet
                let packet = EventPacket::new(cable, CodeIndex::SingleByte, &[byte]);
                if !push_packet(queue, packet) {
                    return consumed;
                }
                continue;
            }
            if self.is_idle() {
                self.start_packet(cable, byte);
            } else {
                self.continue_packet(byte);
            }
            if self.index >= 2 && self.index == self.total {
                self.buffer[self.total..].fill(0);
                let packet = EventPacket::from_bytes(self.buffer);
                self.index = 0;
                self.total = 0;
                if !push_packet(queue, packet) {
                    return consumed;
                }
            }
        }
        consumed
    }

    fn start_packet(&mut self, cable: u8, status: u8) {
        let (code_index, total) = if self.is_sysex_in_progress() {
            if status == STATUS_SYSEX_END {
                (CodeIndex::SystemCommon1, 2)
            } else {
                (CodeIndex::SysExStart, PACKET_SIZE)
            }
        } else {
            match Status::classify(status) {
                Status::ChannelVoice { code_index, len }
                | Status::SystemCommon { code_index, len } => (code_index, usize::from(len) + 1),
                Status::SysExStart => (CodeIndex::SysExStart, PACKET_SIZE),
                Status::SysExEnd => (CodeIndex::SystemCommon1, 2),
                Status::Data | Status::Undefined | Status::RealTime => (CodeIndex::SingleByte, 2),
            }
        };
        self.buffer = [header(cable, code_index), status, 0, 0];
        self.index = 2;
        self.total = total;
    }

    fn continue_packet(&mut self, byte: u8) {
        debug_assert!(self.index < PACKET_SIZE);
        self.buffer[self.index] = byte;
        self.index += 1;
        if !self.is_sysex_in_progress() || byte != STATUS_SYSEX_END {
            return;
        }
        if let Some(code_index) = CodeIndex::sysex_end(self.index - 1) {
            self.buffer[0] = (self.buffer[0] & 0xf0) | code_index as u8;
            self.total = self.index;
        }
    }
}

fn push_packet(queue: &mut PacketQueue, packet: EventPacket) -> bool {
    log::trace!("Queueing MIDI OUT packet {packet:02x?}", packet = *packet);
    if queue.push_packet(packet).is_ok() {
        return true;
    }
    // The free space has been checked in advance
    log::error!("Failed to queue MIDI OUT packet {packet:02x?}", packet = *packet);
    debug_assert!(false, "queue overflow");
    false
}
