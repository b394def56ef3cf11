// SPDX-FileCopyrightText: The usbh-midi authors
// SPDX-License-Identifier: MPL-2.0

use std::collections::VecDeque;

use thiserror::Error;

use crate::packet::{EventPacket, PACKET_SIZE};

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error("queue full")]
pub struct QueueFull;

/// Bounded byte FIFO between the codec and the transport.
///
/// Event packets are written as a whole or not at all.
#[derive(Debug, Clone)]
pub struct PacketQueue {
    bytes: VecDeque<u8>,
    capacity: usize,
}

impl PacketQueue {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            bytes: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Free space in bytes
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.capacity - self.bytes.len()
    }

    #[must_use]
    pub fn has_room_for_packet(&self) -> bool {
        self.remaining() >= PACKET_SIZE
    }

    pub fn push_packet(&mut self, packet: EventPacket) -> Result<(), QueueFull> {
        if !self.has_room_for_packet() {
            return Err(QueueFull);
        }
        self.bytes.extend(packet.to_bytes());
        Ok(())
    }

    /// Peek at the first byte, i.e. the header of the next packet.
    #[must_use]
    pub fn peek(&self) -> Option<u8> {
        self.bytes.front().copied()
    }

    /// Peek at the next complete packet.
    #[must_use]
    pub fn peek_packet(&self) -> Option<EventPacket> {
        if self.bytes.len() < PACKET_SIZE {
            return None;
        }
        let mut bytes = [0; PACKET_SIZE];
        for (dst, src) in bytes.iter_mut().zip(&self.bytes) {
            *dst = *src;
        }
        Some(EventPacket::from_bytes(bytes))
    }

    /// Remove the next complete packet.
    pub fn pop_packet(&mut self) -> Option<EventPacket> {
        let packet = self.peek_packet()?;
        self.bytes.drain(..PACKET_SIZE);
        Some(packet)
    }

    /// Move as many bytes as fit into `buf`.
    ///
    /// Returns the number of bytes moved.
    pub fn read_into(&mut self, buf: &mut [u8]) -> usize {
        let count = buf.len().min(self.bytes.len());
        for (dst, src) in buf.iter_mut().zip(self.bytes.drain(..count)) {
            *dst = src;
        }
        count
    }

    pub fn clear(&mut self) {
        self.bytes.clear();
    }
}
