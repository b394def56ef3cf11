// SPDX-FileCopyrightText: The usbh-midi authors
// SPDX-License-Identifier: MPL-2.0

use crate::{
    config::Config,
    descriptor::{MidiEndpoint, MidiInterface},
    queue::PacketQueue,
    stream::{StreamDecoder, StreamEncoder},
    transport::DeviceAddress,
};

/// Per-device state of an opened MIDI streaming interface.
///
/// Either all fields are cleared or the session is bound to a device
/// with at least one usable endpoint.
#[derive(Debug)]
pub(crate) struct Session {
    device: Option<DeviceAddress>,
    interface: Option<MidiInterface>,
    configured: bool,
    pub(crate) encoder: StreamEncoder,
    pub(crate) decoder: StreamDecoder,
    pub(crate) rx_queue: PacketQueue,
    pub(crate) tx_queue: PacketQueue,
    /// Filled by the host stack before an IN transfer completes
    pub(crate) rx_buffer: Vec<u8>,
    pub(crate) tx_buffer: Vec<u8>,
}

impl Session {
    pub(crate) fn new(config: &Config) -> Self {
        Self {
            device: None,
            interface: None,
            configured: false,
            encoder: StreamEncoder::new(),
            decoder: StreamDecoder::new(),
            rx_queue: PacketQueue::new(config.rx_queue_size),
            tx_queue: PacketQueue::new(config.tx_queue_size),
            rx_buffer: Vec::new(),
            tx_buffer: Vec::new(),
        }
    }

    pub(crate) const fn device(&self) -> Option<DeviceAddress> {
        self.device
    }

    pub(crate) fn rx(&self) -> Option<&MidiEndpoint> {
        self.interface.as_ref()?.rx.as_ref()
    }

    pub(crate) fn tx(&self) -> Option<&MidiEndpoint> {
        self.interface.as_ref()?.tx.as_ref()
    }

    pub(crate) fn num_rx_cables(&self) -> u8 {
        self.interface
            .as_ref()
            .map_or(0, MidiInterface::num_rx_cables)
    }

    pub(crate) fn num_tx_cables(&self) -> u8 {
        self.interface
            .as_ref()
            .map_or(0, MidiInterface::num_tx_cables)
    }

    pub(crate) const fn is_configured(&self) -> bool {
        self.configured
    }

    pub(crate) fn set_configured(&mut self) {
        debug_assert!(self.device.is_some());
        self.configured = true;
    }

    /// Bind the session to an enumerated device.
    pub(crate) fn open(&mut self, device: DeviceAddress, interface: MidiInterface) {
        debug_assert!(self.device.is_none());
        self.clear();
        let buffer_len = |endpoint: Option<MidiEndpoint>| {
            endpoint.map_or(0, |endpoint| usize::from(endpoint.max_packet_size))
        };
        self.rx_buffer = vec![0; buffer_len(interface.rx)];
        self.tx_buffer = vec![0; buffer_len(interface.tx)];
        self.device = Some(device);
        self.interface = Some(interface);
    }

    /// Reset all fields including any in-flight codec state.
    pub(crate) fn clear(&mut self) {
        let Self {
            device,
            interface,
            configured,
            encoder,
            decoder,
            rx_queue,
            tx_queue,
            rx_buffer,
            tx_buffer,
        } = self;
        *device = None;
        *interface = None;
        *configured = false;
        encoder.reset();
        decoder.reset();
        rx_queue.clear();
        tx_queue.clear();
        rx_buffer.clear();
        tx_buffer.clear();
    }
}

/// Fixed number of session slots, indexed by the device address.
#[derive(Debug)]
pub(crate) struct SessionTable {
    sessions: Vec<Session>,
}

impl SessionTable {
    pub(crate) fn new(config: &Config) -> Self {
        let sessions = (0..config.max_devices)
            .map(|_| Session::new(config))
            .collect();
        Self { sessions }
    }

    fn slot_index(&self, device: DeviceAddress) -> Option<usize> {
        let index = usize::from(device.value());
        if index == 0 || index > self.sessions.len() {
            return None;
        }
        Some(index - 1)
    }

    /// The slot reserved for the device, regardless of whether it is in use.
    pub(crate) fn slot_mut(&mut self, device: DeviceAddress) -> Option<&mut Session> {
        let index = self.slot_index(device)?;
        self.sessions.get_mut(index)
    }

    /// The session of an opened device.
    pub(crate) fn get(&self, device: DeviceAddress) -> Option<&Session> {
        let index = self.slot_index(device)?;
        self.sessions
            .get(index)
            .filter(|session| session.device == Some(device))
    }

    /// The session of an opened device.
    pub(crate) fn get_mut(&mut self, device: DeviceAddress) -> Option<&mut Session> {
        let index = self.slot_index(device)?;
        self.sessions
            .get_mut(index)
            .filter(|session| session.device == Some(device))
    }

    /// Addresses of all opened devices.
    pub(crate) fn devices(&self) -> impl Iterator<Item = DeviceAddress> + '_ {
        self.sessions.iter().filter_map(Session::device)
    }

    pub(crate) fn clear(&mut self) {
        for session in &mut self.sessions {
            session.clear();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{descriptor::EndpointDescriptor, transport::EndpointAddress};

    fn interface() -> MidiInterface {
        let endpoint = |address, num_cables| MidiEndpoint {
            descriptor: EndpointDescriptor {
                address: EndpointAddress::new(address),
                attributes: 0x02,
                max_packet_size: 64,
                interval: 0,
            },
            max_packet_size: 32,
            num_cables,
        };
        MidiInterface {
            interface_number: 1,
            rx: Some(endpoint(0x81, 2)),
            tx: Some(endpoint(0x02, 1)),
        }
    }

    #[test]
    fn validate_device_address() {
        let mut table = SessionTable::new(&Config {
            max_devices: 2,
            ..Default::default()
        });
        assert!(table.slot_mut(DeviceAddress::new(0)).is_none());
        assert!(table.slot_mut(DeviceAddress::new(1)).is_some());
        assert!(table.slot_mut(DeviceAddress::new(2)).is_some());
        assert!(table.slot_mut(DeviceAddress::new(3)).is_none());
        // Slots that are not in use are hidden
        assert!(table.get(DeviceAddress::new(1)).is_none());
    }

    #[test]
    fn open_and_clear() {
        let mut table = SessionTable::new(&Config::default());
        let device = DeviceAddress::new(2);
        table.slot_mut(device).unwrap().open(device, interface());
        assert_eq!(vec![device], table.devices().collect::<Vec<_>>());

        let session = table.get_mut(device).unwrap();
        assert!(!session.is_configured());
        session.set_configured();
        assert!(session.is_configured());
        assert_eq!(2, session.num_rx_cables());
        assert_eq!(1, session.num_tx_cables());
        assert_eq!(32, session.rx_buffer.len());
        assert_eq!(32, session.tx_buffer.len());
        session.encoder.encode(0, &[0x90, 0x40], &mut session.tx_queue);
        assert!(!session.encoder.is_idle());

        session.clear();
        assert!(session.device().is_none());
        assert!(!session.is_configured());
        assert_eq!(0, session.num_rx_cables());
        assert!(session.encoder.is_idle());
        assert!(session.rx_buffer.is_empty());
        assert!(table.get(device).is_none());
        assert_eq!(0, table.devices().count());
    }
}
