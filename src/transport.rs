// SPDX-FileCopyrightText: The usbh-midi authors
// SPDX-License-Identifier: MPL-2.0

//! Seam to the host controller stack
//!
//! Opening endpoints, submitting transfers, and tracking their busy
//! state is not done by this crate. The host stack provides these
//! services by implementing [`HostTransport`].

use derive_more::{Display, From, Into};
use thiserror::Error;

use crate::descriptor::EndpointDescriptor;

/// Address of an attached device, starting at 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Display, From, Into)]
pub struct DeviceAddress(u8);

impl DeviceAddress {
    #[must_use]
    pub const fn new(address: u8) -> Self {
        Self(address)
    }

    #[must_use]
    pub const fn value(self) -> u8 {
        self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum Direction {
    /// Host to device
    #[display("OUT")]
    Out,

    /// Device to host
    #[display("IN")]
    In,
}

/// Endpoint address including the direction bit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, From, Into)]
#[display("{:#04x}", _0)]
pub struct EndpointAddress(u8);

impl EndpointAddress {
    const DIRECTION_IN_BIT: u8 = 0x80;

    /// Default control pipe, host to device
    pub const CONTROL_OUT: Self = Self(0x00);

    /// Default control pipe, device to host
    pub const CONTROL_IN: Self = Self(Self::DIRECTION_IN_BIT);

    #[must_use]
    pub const fn new(address: u8) -> Self {
        Self(address)
    }

    #[must_use]
    pub const fn value(self) -> u8 {
        self.0
    }

    #[must_use]
    pub const fn number(self) -> u8 {
        self.0 & 0x0f
    }

    #[must_use]
    pub const fn direction(self) -> Direction {
        if self.0 & Self::DIRECTION_IN_BIT == 0 {
            Direction::Out
        } else {
            Direction::In
        }
    }
}

/// Outcome of a completed transfer as reported by the host stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum TransferResult {
    #[display("success")]
    Success,
    #[display("failed")]
    Failed,
    #[display("stalled")]
    Stalled,
    #[display("timeout")]
    Timeout,
}

/// Outcome of an attempt to start a transfer without blocking.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Submission {
    /// A transfer has been submitted.
    Submitted,

    /// Some endpoint is busy. Try again later.
    NotReady,

    /// No transfer is possible, e.g. the device or endpoint
    /// does not exist or the host stack refused the request.
    Rejected,
}

impl Submission {
    #[must_use]
    pub const fn is_submitted(self) -> bool {
        matches!(self, Self::Submitted)
    }
}

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("endpoint {0} is busy")]
    Busy(EndpointAddress),

    #[error("failed to open endpoint {0}")]
    Open(EndpointAddress),

    #[error("failed to submit transfer on endpoint {0}")]
    Submit(EndpointAddress),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Endpoint and transfer services of the host stack.
///
/// All operations must return immediately.
pub trait HostTransport {
    fn open_endpoint(
        &mut self,
        device: DeviceAddress,
        endpoint: &EndpointDescriptor,
    ) -> Result<(), TransportError>;

    /// Close an endpoint that has been opened before.
    fn close_endpoint(&mut self, device: DeviceAddress, endpoint: EndpointAddress);

    /// Treat every completed transfer on the endpoint as the last one.
    ///
    /// Required for devices that always fill the requested length and
    /// would otherwise never complete a transfer.
    fn force_last_buffer(&mut self, device: DeviceAddress, endpoint: EndpointAddress);

    /// Abandon a pending IN transfer that has been NAK'd instead of
    /// retrying it forever.
    fn clear_in_on_nak(&mut self, device: DeviceAddress, endpoint: EndpointAddress);

    #[must_use]
    fn is_busy(&self, device: DeviceAddress, endpoint: EndpointAddress) -> bool;

    /// Reserve an idle endpoint for a subsequent submission.
    ///
    /// Returns `false` if the endpoint is busy or already claimed.
    fn claim(&mut self, device: DeviceAddress, endpoint: EndpointAddress) -> bool;

    /// Give up a claim without submitting a transfer.
    fn release(&mut self, device: DeviceAddress, endpoint: EndpointAddress);

    /// Submit a transfer on a claimed OUT endpoint.
    ///
    /// An empty `data` slice submits a zero-length packet.
    fn submit_out(
        &mut self,
        device: DeviceAddress,
        endpoint: EndpointAddress,
        data: &[u8],
    ) -> Result<(), TransportError>;

    /// Request up to `len` bytes from an IN endpoint.
    ///
    /// The received bytes are stored into the buffer returned by
    /// [`MidiHost::receive_buffer_mut()`](crate::MidiHost::receive_buffer_mut)
    /// before the completion is reported.
    fn submit_in(
        &mut self,
        device: DeviceAddress,
        endpoint: EndpointAddress,
        len: usize,
    ) -> Result<(), TransportError>;
}
