// SPDX-FileCopyrightText: The usbh-midi authors
// SPDX-License-Identifier: MPL-2.0

use std::ops::{Deref, DerefMut};

use thiserror::Error;

use crate::{
    config::{Config, ConfigError},
    descriptor::{parse_midi_interface, EnumerationError, MidiEndpoint, MidiInterface},
    scheduler,
    session::{Session, SessionTable},
    stream::{Decoded, StreamDecoder},
    transport::{
        DeviceAddress, EndpointAddress, HostTransport, Submission, TransferResult, TransportError,
    },
};

#[derive(Debug, Error)]
pub enum OpenError {
    #[error("invalid device address {0}")]
    InvalidDevice(DeviceAddress),

    #[error("device {0} is already open")]
    AlreadyOpen(DeviceAddress),

    #[error(transparent)]
    Enumeration(#[from] EnumerationError),

    #[error(transparent)]
    Transport(#[from] TransportError),
}

/// Topology of a newly opened device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MountInfo {
    pub device: DeviceAddress,
    pub interface_number: u8,
    pub rx_endpoint: Option<EndpointAddress>,
    pub tx_endpoint: Option<EndpointAddress>,
    pub num_rx_cables: u8,
    pub num_tx_cables: u8,
}

impl MountInfo {
    fn new(device: DeviceAddress, interface: &MidiInterface) -> Self {
        Self {
            device,
            interface_number: interface.interface_number,
            rx_endpoint: interface.rx.map(|endpoint| endpoint.address()),
            tx_endpoint: interface.tx.map(|endpoint| endpoint.address()),
            num_rx_cables: interface.num_rx_cables(),
            num_tx_cables: interface.num_tx_cables(),
        }
    }
}

/// Application callbacks
///
/// All callbacks are invoked synchronously from within the driver
/// lifecycle calls of [`MidiHost`] and must not block.
pub trait MidiHostHandler {
    fn mounted(&mut self, _info: &MountInfo) {}

    /// Invoked before the session is cleared.
    fn unmounted(&mut self, _device: DeviceAddress) {}

    /// Invoked after an inbound transfer with data has completed.
    ///
    /// The received packets are available through
    /// [`MidiHost::stream_read()`].
    fn received(&mut self, _device: DeviceAddress, _packets_queued: usize) {}

    /// Invoked after an outbound transfer has completed.
    fn sent(&mut self, _device: DeviceAddress) {}
}

impl<D> MidiHostHandler for D
where
    D: DerefMut,
    <D as Deref>::Target: MidiHostHandler,
{
    fn mounted(&mut self, info: &MountInfo) {
        self.deref_mut().mounted(info);
    }

    fn unmounted(&mut self, device: DeviceAddress) {
        self.deref_mut().unmounted(device);
    }

    fn received(&mut self, device: DeviceAddress, packets_queued: usize) {
        self.deref_mut().received(device, packets_queued);
    }

    fn sent(&mut self, device: DeviceAddress) {
        self.deref_mut().sent(device);
    }
}

/// Handler that ignores all notifications.
#[derive(Debug, Clone, Copy, Default)]
pub struct IgnoreEvents;

impl MidiHostHandler for IgnoreEvents {}

/// USB-MIDI host class driver instance
///
/// Owns the sessions of all MIDI devices that are attached to a single
/// host controller. Neither of the operations blocks, all of them either
/// complete immediately or report that they should be retried later.
///
/// Callers that share an instance between the completion context of the
/// host stack and the application must serialize the access.
#[derive(Debug)]
pub struct MidiHost<T, H> {
    config: Config,
    transport: T,
    handler: H,
    sessions: SessionTable,
    #[cfg(feature = "shared-sysex-tracking")]
    shared_decoder: StreamDecoder,
}

impl<T, H> MidiHost<T, H>
where
    T: HostTransport,
    H: MidiHostHandler,
{
    pub fn new(config: Config, transport: T, handler: H) -> Result<Self, ConfigError> {
        config.validate()?;
        let sessions = SessionTable::new(&config);
        Ok(Self {
            config,
            transport,
            handler,
            sessions,
            #[cfg(feature = "shared-sysex-tracking")]
            shared_decoder: StreamDecoder::new(),
        })
    }

    #[must_use]
    pub const fn config(&self) -> &Config {
        &self.config
    }

    #[must_use]
    pub const fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    #[must_use]
    pub const fn handler(&self) -> &H {
        &self.handler
    }

    pub fn handler_mut(&mut self) -> &mut H {
        &mut self.handler
    }

    #[must_use]
    pub fn into_parts(self) -> (T, H) {
        let Self {
            transport, handler, ..
        } = self;
        (transport, handler)
    }

    /// Reset all sessions without notifying the handler.
    pub fn init(&mut self) {
        log::debug!(
            "Initializing {max_devices} MIDI host sessions",
            max_devices = self.config.max_devices
        );
        self.sessions.clear();
        #[cfg(feature = "shared-sysex-tracking")]
        self.shared_decoder.reset();
    }

    /// Close all open devices.
    pub fn shutdown(&mut self) {
        let devices = self.sessions.devices().collect::<Vec<_>>();
        for device in devices {
            self.close(device);
        }
    }

    /// Enumerate and open the MIDI streaming interface of a device.
    ///
    /// `descriptors` starts with the interface descriptor of the candidate
    /// interface and may extend until the end of the configuration
    /// descriptor. On failure all endpoints that have already been opened
    /// are closed again and the session stays unused.
    pub fn open(
        &mut self,
        device: DeviceAddress,
        descriptors: &[u8],
    ) -> Result<MountInfo, OpenError> {
        let Some(session) = self.sessions.slot_mut(device) else {
            return Err(OpenError::InvalidDevice(device));
        };
        if session.device().is_some() {
            return Err(OpenError::AlreadyOpen(device));
        }
        let interface = parse_midi_interface(descriptors, &self.config)?;
        if let Some(rx) = &interface.rx {
            self.transport.open_endpoint(device, &rx.descriptor)?;
        }
        if let Some(tx) = &interface.tx {
            if let Err(err) = self.transport.open_endpoint(device, &tx.descriptor) {
                if let Some(rx) = &interface.rx {
                    self.transport.close_endpoint(device, rx.address());
                }
                return Err(err.into());
            }
        }
        if let Some(rx) = &interface.rx {
            // Some devices always fill the requested length
            self.transport.force_last_buffer(device, rx.address());
            // Some devices NAK the first IN request after enumeration
            self.transport.clear_in_on_nak(device, rx.address());
        }
        session.open(device, interface);
        let info = MountInfo::new(device, &interface);
        log::info!(
            "Mounted MIDI device {device}: interface {interface_number}, {num_rx_cables} IN \
             cable(s), {num_tx_cables} OUT cable(s)",
            interface_number = info.interface_number,
            num_rx_cables = info.num_rx_cables,
            num_tx_cables = info.num_tx_cables,
        );
        self.handler.mounted(&info);
        Ok(info)
    }

    /// Mark an opened device as configured.
    ///
    /// Returns `false` if the device has not been opened.
    pub fn set_config(&mut self, device: DeviceAddress) -> bool {
        let Some(session) = self.sessions.get_mut(device) else {
            log::warn!("Cannot configure unknown MIDI device {device}");
            return false;
        };
        session.set_configured();
        log::debug!("Configured MIDI device {device}");
        true
    }

    /// Detach a device and clear its session.
    pub fn close(&mut self, device: DeviceAddress) {
        if self.sessions.get(device).is_none() {
            log::debug!("Ignoring close of unknown MIDI device {device}");
            return;
        }
        self.handler.unmounted(device);
        if let Some(session) = self.sessions.get_mut(device) {
            session.clear();
        }
        log::info!("Unmounted MIDI device {device}");
    }

    /// Buffer for the data of the pending IN transfer.
    ///
    /// The host stack stores the received bytes here before reporting
    /// the completion with [`Self::transfer_complete()`].
    pub fn receive_buffer_mut(&mut self, device: DeviceAddress) -> Option<&mut [u8]> {
        let session = self.sessions.get_mut(device)?;
        session.rx()?;
        Some(session.rx_buffer.as_mut_slice())
    }

    /// Handle the completion of a transfer on one of the bulk endpoints.
    pub fn transfer_complete(
        &mut self,
        device: DeviceAddress,
        endpoint: EndpointAddress,
        result: TransferResult,
        xferred_bytes: usize,
    ) {
        let Some(session) = self.sessions.get_mut(device) else {
            log::warn!("Transfer on endpoint {endpoint} of unknown MIDI device {device}");
            return;
        };
        if session.rx().map(MidiEndpoint::address) == Some(endpoint) {
            if result != TransferResult::Success {
                log::warn!(
                    "Receiving from MIDI IN endpoint {endpoint} of device {device} failed: \
                     {result}"
                );
                return;
            }
            if xferred_bytes == 0 {
                return;
            }
            let packets_queued = scheduler::complete_input(device, session, xferred_bytes);
            self.handler.received(device, packets_queued);
        } else if session.tx().map(MidiEndpoint::address) == Some(endpoint) {
            if result != TransferResult::Success {
                log::warn!(
                    "Sending to MIDI OUT endpoint {endpoint} of device {device} failed: {result}"
                );
            }
            scheduler::complete_output(&mut self.transport, device, session, xferred_bytes);
            self.handler.sent(device);
        } else {
            log::warn!("Transfer on unknown endpoint {endpoint} of MIDI device {device}");
        }
    }

    #[must_use]
    pub fn is_configured(&self, device: DeviceAddress) -> bool {
        self.sessions
            .get(device)
            .is_some_and(Session::is_configured)
    }

    /// Number of cables from device to host.
    #[must_use]
    pub fn num_rx_cables(&self, device: DeviceAddress) -> u8 {
        self.sessions
            .get(device)
            .map_or(0, Session::num_rx_cables)
    }

    /// Number of cables from host to device.
    #[must_use]
    pub fn num_tx_cables(&self, device: DeviceAddress) -> u8 {
        self.sessions
            .get(device)
            .map_or(0, Session::num_tx_cables)
    }

    /// Queue MIDI bytes for sending on a cable.
    ///
    /// Returns the number of bytes consumed. The remaining bytes must be
    /// written again after the queue has been flushed.
    pub fn stream_write(&mut self, device: DeviceAddress, cable: u8, bytes: &[u8]) -> usize {
        let Some(session) = self.sessions.get_mut(device) else {
            return 0;
        };
        if cable >= session.num_tx_cables() {
            log::debug!("Cannot write to unknown cable {cable} of MIDI device {device}");
            return 0;
        }
        session
            .encoder
            .encode(cable, bytes, &mut session.tx_queue)
    }

    /// Try to send queued output.
    ///
    /// Returns the number of bytes submitted.
    pub fn stream_flush(&mut self, device: DeviceAddress) -> usize {
        let Some(session) = self.sessions.get_mut(device) else {
            return 0;
        };
        scheduler::flush_output(&mut self.transport, device, session)
    }

    /// Try to request input from the device.
    pub fn read_poll(&mut self, device: DeviceAddress) -> Submission {
        let Some(session) = self.sessions.get(device) else {
            return Submission::Rejected;
        };
        scheduler::poll_input(&mut self.transport, device, session)
    }

    /// Read the received MIDI bytes of the next cable.
    ///
    /// Returns `None` if nothing has been received.
    pub fn stream_read(&mut self, device: DeviceAddress, output: &mut [u8]) -> Option<Decoded> {
        let session = self.sessions.get_mut(device)?;
        let num_cables = session.num_rx_cables();
        #[cfg(feature = "shared-sysex-tracking")]
        let decoder = &mut self.shared_decoder;
        #[cfg(not(feature = "shared-sysex-tracking"))]
        let decoder = &mut session.decoder;
        decoder.decode(&mut session.rx_queue, num_cables, output)
    }

    /// The SysEx state of a device's input.
    #[cfg(not(feature = "shared-sysex-tracking"))]
    #[must_use]
    pub fn rx_decoder(&self, device: DeviceAddress) -> Option<&StreamDecoder> {
        self.sessions.get(device).map(|session| &session.decoder)
    }

    /// The SysEx state of all inputs.
    #[cfg(feature = "shared-sysex-tracking")]
    #[must_use]
    pub fn rx_decoder(&self, device: DeviceAddress) -> Option<&StreamDecoder> {
        self.sessions.get(device).map(|_| &self.shared_decoder)
    }
}
