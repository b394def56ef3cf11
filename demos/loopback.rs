// SPDX-FileCopyrightText: The usbh-midi authors
// SPDX-License-Identifier: MPL-2.0

//! Drives a simulated USB-MIDI device that echoes everything it receives.

use std::collections::VecDeque;

use usbh_midi::{
    descriptor::EndpointDescriptor, Config, Decoded, DeviceAddress, EndpointAddress,
    HostTransport, MidiHost, MidiHostHandler, MountInfo, TransferResult, TransportError,
};

const DEVICE: DeviceAddress = DeviceAddress::new(1);

const EP_OUT: EndpointAddress = EndpointAddress::new(0x01);

const EP_IN: EndpointAddress = EndpointAddress::new(0x81);

const DESCRIPTORS: &[u8] = &[
    9, 0x04, 0, 0, 0, 0x01, 0x01, 0, 0, // audio control interface
    9, 0x24, 0x01, 0x00, 0x01, 0x09, 0x00, 0x01, 0x01, // AC header
    9, 0x04, 1, 0, 2, 0x01, 0x03, 0, 0, // MIDI streaming interface
    7, 0x24, 0x01, 0x00, 0x01, 0x25, 0x00, // MS header
    6, 0x24, 0x02, 0x01, 0x01, 0, // embedded IN jack
    9, 0x24, 0x03, 0x01, 0x02, 0x01, 0x01, 0x01, 0, // embedded OUT jack
    9, 0x05, 0x01, 0x02, 0x10, 0x00, 0, 0, 0, // bulk OUT endpoint
    5, 0x25, 0x01, 1, 0x01, // MS endpoint
    9, 0x05, 0x81, 0x02, 0x10, 0x00, 0, 0, 0, // bulk IN endpoint
    5, 0x25, 0x01, 1, 0x02, // MS endpoint
];

/// Host stack with a single attached device that loops back all packets.
#[derive(Debug, Default)]
struct Loopback {
    out_claimed: bool,
    out_pending: Option<Vec<u8>>,
    in_pending: Option<usize>,
    echo: VecDeque<u8>,
}

impl HostTransport for Loopback {
    fn open_endpoint(
        &mut self,
        device: DeviceAddress,
        endpoint: &EndpointDescriptor,
    ) -> Result<(), TransportError> {
        log::info!(
            "Opening endpoint {address} of device {device}: max packet size = {max_packet_size}",
            address = endpoint.address,
            max_packet_size = endpoint.max_packet_size,
        );
        Ok(())
    }

    fn close_endpoint(&mut self, device: DeviceAddress, endpoint: EndpointAddress) {
        log::info!("Closing endpoint {endpoint} of device {device}");
    }

    fn force_last_buffer(&mut self, _device: DeviceAddress, _endpoint: EndpointAddress) {}

    fn clear_in_on_nak(&mut self, _device: DeviceAddress, _endpoint: EndpointAddress) {}

    fn is_busy(&self, _device: DeviceAddress, endpoint: EndpointAddress) -> bool {
        match endpoint {
            EP_OUT => self.out_pending.is_some(),
            EP_IN => self.in_pending.is_some(),
            _ => false,
        }
    }

    fn claim(&mut self, device: DeviceAddress, endpoint: EndpointAddress) -> bool {
        if endpoint != EP_OUT || self.out_claimed || self.is_busy(device, endpoint) {
            return false;
        }
        self.out_claimed = true;
        true
    }

    fn release(&mut self, _device: DeviceAddress, _endpoint: EndpointAddress) {
        self.out_claimed = false;
    }

    fn submit_out(
        &mut self,
        _device: DeviceAddress,
        endpoint: EndpointAddress,
        data: &[u8],
    ) -> Result<(), TransportError> {
        if !self.out_claimed {
            return Err(TransportError::Submit(endpoint));
        }
        self.out_claimed = false;
        self.out_pending = Some(data.to_vec());
        Ok(())
    }

    fn submit_in(
        &mut self,
        _device: DeviceAddress,
        endpoint: EndpointAddress,
        len: usize,
    ) -> Result<(), TransportError> {
        if self.in_pending.is_some() {
            return Err(TransportError::Busy(endpoint));
        }
        self.in_pending = Some(len);
        Ok(())
    }
}

#[derive(Debug, Default)]
struct LogEvents;

impl MidiHostHandler for LogEvents {
    fn mounted(&mut self, info: &MountInfo) {
        log::info!("Mounted {info:?}");
    }

    fn unmounted(&mut self, device: DeviceAddress) {
        log::info!("Unmounted device {device}");
    }

    fn received(&mut self, device: DeviceAddress, packets_queued: usize) {
        log::debug!("Received {packets_queued} packet(s) from device {device}");
    }
}

fn main() {
    pretty_env_logger::init();

    match run() {
        Ok(()) => (),
        Err(err) => log::error!("{err}"),
    }
}

fn run() -> anyhow::Result<()> {
    let mut host = MidiHost::new(Config::default(), Loopback::default(), LogEvents)?;
    host.init();
    host.open(DEVICE, DESCRIPTORS)?;
    host.set_config(DEVICE);

    let mut output = vec![
        0x90, 0x3c, 0x64, // note on
        0xf0, 0x7e, 0x7f, 0x06, 0x01, // identity request
    ];
    // Clock ticks may interrupt the SysEx
    output.push(0xf8);
    output.push(0xf7);
    output.extend_from_slice(&[0x80, 0x3c, 0x00]);

    let mut pending = output.as_slice();
    let mut received = Vec::with_capacity(output.len());
    let mut buffer = [0; 32];
    for _ in 0..100 {
        if !pending.is_empty() {
            let consumed = host.stream_write(DEVICE, 0, pending);
            pending = &pending[consumed..];
        }
        host.stream_flush(DEVICE);
        if let Some(data) = host.transport_mut().out_pending.take() {
            host.transport_mut().echo.extend(&data);
            host.transfer_complete(DEVICE, EP_OUT, TransferResult::Success, data.len());
        }

        host.read_poll(DEVICE);
        if let Some(len) = host.transport_mut().in_pending.take() {
            let transport = host.transport_mut();
            let len = len.min(transport.echo.len());
            let data = transport.echo.drain(..len).collect::<Vec<_>>();
            let Some(receive_buffer) = host.receive_buffer_mut(DEVICE) else {
                anyhow::bail!("no receive buffer");
            };
            receive_buffer[..data.len()].copy_from_slice(&data);
            host.transfer_complete(DEVICE, EP_IN, TransferResult::Success, data.len());
        }
        while let Some(Decoded { cable, len }) = host.stream_read(DEVICE, &mut buffer) {
            let bytes = &buffer[..len];
            log::info!("Received {bytes:02x?} on cable {cable}");
            received.extend_from_slice(bytes);
        }

        if pending.is_empty() && received.len() == output.len() {
            break;
        }
    }
    host.shutdown();

    anyhow::ensure!(
        received.len() == output.len(),
        "received only {num_received} of {num_sent} bytes",
        num_received = received.len(),
        num_sent = output.len(),
    );
    log::info!("Looped back {num_bytes} bytes", num_bytes = received.len());
    Ok(())
}
