// SPDX-FileCopyrightText: The usbh-midi authors
// SPDX-License-Identifier: MPL-2.0

//! Non-blocking transfer scheduling
//!
//! The bulk endpoints of low-speed devices share a single hardware pipe
//! with the control endpoints on many host controllers. A transfer is
//! only started when none of the other endpoints of the device is busy.

use crate::{
    descriptor::MidiEndpoint,
    packet::{EventPacket, PACKET_SIZE},
    session::Session,
    transport::{DeviceAddress, EndpointAddress, HostTransport, Submission},
};

fn is_control_idle<T>(transport: &T, device: DeviceAddress) -> bool
where
    T: HostTransport + ?Sized,
{
    !transport.is_busy(device, EndpointAddress::CONTROL_OUT)
        && !transport.is_busy(device, EndpointAddress::CONTROL_IN)
}

/// Request the next inbound transfer.
pub(crate) fn poll_input<T>(
    transport: &mut T,
    device: DeviceAddress,
    session: &Session,
) -> Submission
where
    T: HostTransport + ?Sized,
{
    let Some(rx) = session.rx() else {
        log::debug!("Device {device} has no MIDI IN endpoint");
        return Submission::Rejected;
    };
    if !is_control_idle(transport, device) {
        return Submission::NotReady;
    }
    if let Some(tx) = session.tx() {
        if transport.is_busy(device, tx.address()) {
            return Submission::NotReady;
        }
    }
    let endpoint = rx.address();
    if transport.is_busy(device, endpoint) {
        // The host controller might be retrying a NAK'd request forever
        // and thereby block the shared pipe
        transport.clear_in_on_nak(device, endpoint);
        return Submission::NotReady;
    }
    log::trace!("Polling MIDI IN endpoint {endpoint} of device {device}");
    match transport.submit_in(device, endpoint, usize::from(rx.max_packet_size)) {
        Ok(()) => Submission::Submitted,
        Err(err) => {
            log::error!("Failed to poll MIDI IN endpoint {endpoint} of device {device}: {err}");
            Submission::Rejected
        }
    }
}

/// Submit the next chunk of queued output if all endpoints are idle.
///
/// Returns the number of bytes submitted.
pub(crate) fn flush_output<T>(
    transport: &mut T,
    device: DeviceAddress,
    session: &mut Session,
) -> usize
where
    T: HostTransport + ?Sized,
{
    let Some(tx) = session.tx() else {
        return 0;
    };
    if session.tx_queue.is_empty() {
        return 0;
    }
    if !is_control_idle(transport, device) || transport.is_busy(device, tx.address()) {
        return 0;
    }
    if let Some(rx) = session.rx() {
        if transport.is_busy(device, rx.address()) {
            return 0;
        }
    }
    write_flush(transport, device, session)
}

/// Submit up to one max packet of queued output.
///
/// Returns the number of bytes submitted.
fn write_flush<T>(transport: &mut T, device: DeviceAddress, session: &mut Session) -> usize
where
    T: HostTransport + ?Sized,
{
    let Some(endpoint) = session.tx().map(MidiEndpoint::address) else {
        return 0;
    };
    if session.tx_queue.is_empty() {
        return 0;
    }
    if !transport.claim(device, endpoint) {
        // The previous transfer has not completed yet
        return 0;
    }
    let Session {
        tx_queue, tx_buffer, ..
    } = session;
    let count = tx_queue.read_into(tx_buffer);
    if count == 0 {
        transport.release(device, endpoint);
        return 0;
    }
    log::trace!("Sending {count} bytes to MIDI OUT endpoint {endpoint} of device {device}");
    if let Err(err) = transport.submit_out(device, endpoint, &tx_buffer[..count]) {
        log::error!(
            "Failed to send {count} bytes to MIDI OUT endpoint {endpoint} of device {device}: {err}"
        );
        transport.release(device, endpoint);
        return 0;
    }
    count
}

/// Continue sending after an outbound transfer has completed.
///
/// A transfer that ends exactly on a packet boundary is terminated
/// by a zero-length packet.
pub(crate) fn complete_output<T>(
    transport: &mut T,
    device: DeviceAddress,
    session: &mut Session,
    xferred_bytes: usize,
) where
    T: HostTransport + ?Sized,
{
    let Some(tx) = session.tx().copied() else {
        return;
    };
    if write_flush(transport, device, session) > 0 || !session.tx_queue.is_empty() {
        return;
    }
    let max_packet_size = usize::from(tx.max_packet_size);
    if xferred_bytes == 0 || xferred_bytes % max_packet_size != 0 {
        return;
    }
    let endpoint = tx.address();
    if !transport.claim(device, endpoint) {
        return;
    }
    log::trace!("Sending zero-length packet to MIDI OUT endpoint {endpoint} of device {device}");
    if let Err(err) = transport.submit_out(device, endpoint, &[]) {
        log::error!(
            "Failed to send zero-length packet to MIDI OUT endpoint {endpoint} of device {device}: {err}"
        );
        transport.release(device, endpoint);
    }
}

/// Queue the packets of a completed inbound transfer.
///
/// All-zero packets and trailing bytes of an incomplete packet are
/// ignored. Returns the number of packets queued.
pub(crate) fn complete_input(
    device: DeviceAddress,
    session: &mut Session,
    xferred_bytes: usize,
) -> usize {
    let Session {
        rx_queue, rx_buffer, ..
    } = session;
    let len = xferred_bytes.min(rx_buffer.len());
    if len < xferred_bytes {
        log::warn!(
            "Received {xferred_bytes} bytes from device {device} exceed the buffer size {len}"
        );
    }
    let mut packets_queued = 0;
    for chunk in rx_buffer[..len].chunks_exact(PACKET_SIZE) {
        let mut bytes = [0; PACKET_SIZE];
        bytes.copy_from_slice(chunk);
        let packet = EventPacket::from_bytes(bytes);
        if packet.is_empty() {
            continue;
        }
        if rx_queue.push_packet(packet).is_err() {
            log::warn!(
                "Dropping MIDI IN packet {packet:02x?} from device {device}: queue full",
                packet = *packet
            );
            continue;
        }
        log::trace!(
            "Queued MIDI IN packet {packet:02x?} from device {device}",
            packet = *packet
        );
        packets_queued += 1;
    }
    packets_queued
}
