// SPDX-FileCopyrightText: The usbh-midi authors
// SPDX-License-Identifier: MPL-2.0

use std::collections::HashSet;

use crate::{
    descriptor::EndpointDescriptor,
    transport::{DeviceAddress, EndpointAddress, HostTransport, TransportError},
};

type Endpoint = (DeviceAddress, EndpointAddress);

/// Records all requests and simulates the busy state of endpoints.
#[derive(Debug, Default)]
pub(crate) struct MockTransport {
    pub(crate) opened: Vec<Endpoint>,
    pub(crate) forced_last_buffer: Vec<Endpoint>,
    pub(crate) cleared_in_on_nak: Vec<Endpoint>,
    pub(crate) sent: Vec<(DeviceAddress, EndpointAddress, Vec<u8>)>,
    pub(crate) requested: Vec<(DeviceAddress, EndpointAddress, usize)>,
    pub(crate) busy: HashSet<Endpoint>,
    pub(crate) claimed: HashSet<Endpoint>,
    pub(crate) reject_open: bool,
    pub(crate) reject_open_endpoint: Option<EndpointAddress>,
    pub(crate) reject_submit: bool,
}

impl MockTransport {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn set_busy(&mut self, device: DeviceAddress, endpoint: EndpointAddress) {
        self.busy.insert((device, endpoint));
    }

    /// Finish the pending transfer on the endpoint.
    pub(crate) fn complete(&mut self, device: DeviceAddress, endpoint: EndpointAddress) {
        assert!(self.busy.remove(&(device, endpoint)));
    }

    /// Payloads of all submitted OUT transfers.
    pub(crate) fn sent_data(&self) -> Vec<Vec<u8>> {
        self.sent.iter().map(|(_, _, data)| data.clone()).collect()
    }
}

impl HostTransport for MockTransport {
    fn open_endpoint(
        &mut self,
        device: DeviceAddress,
        endpoint: &EndpointDescriptor,
    ) -> Result<(), TransportError> {
        if self.reject_open || self.reject_open_endpoint == Some(endpoint.address) {
            return Err(TransportError::Open(endpoint.address));
        }
        self.opened.push((device, endpoint.address));
        Ok(())
    }

    fn close_endpoint(&mut self, device: DeviceAddress, endpoint: EndpointAddress) {
        let len = self.opened.len();
        self.opened.retain(|&opened| opened != (device, endpoint));
        assert_eq!(len, self.opened.len() + 1, "endpoint {endpoint} not opened");
    }

    fn force_last_buffer(&mut self, device: DeviceAddress, endpoint: EndpointAddress) {
        self.forced_last_buffer.push((device, endpoint));
    }

    fn clear_in_on_nak(&mut self, device: DeviceAddress, endpoint: EndpointAddress) {
        self.cleared_in_on_nak.push((device, endpoint));
    }

    fn is_busy(&self, device: DeviceAddress, endpoint: EndpointAddress) -> bool {
        self.busy.contains(&(device, endpoint))
    }

    fn claim(&mut self, device: DeviceAddress, endpoint: EndpointAddress) -> bool {
        !self.is_busy(device, endpoint) && self.claimed.insert((device, endpoint))
    }

    fn release(&mut self, device: DeviceAddress, endpoint: EndpointAddress) {
        assert!(self.claimed.remove(&(device, endpoint)));
    }

    fn submit_out(
        &mut self,
        device: DeviceAddress,
        endpoint: EndpointAddress,
        data: &[u8],
    ) -> Result<(), TransportError> {
        assert!(
            self.claimed.contains(&(device, endpoint)),
            "endpoint {endpoint} not claimed"
        );
        if self.reject_submit {
            return Err(TransportError::Submit(endpoint));
        }
        self.claimed.remove(&(device, endpoint));
        self.busy.insert((device, endpoint));
        self.sent.push((device, endpoint, data.to_vec()));
        Ok(())
    }

    fn submit_in(
        &mut self,
        device: DeviceAddress,
        endpoint: EndpointAddress,
        len: usize,
    ) -> Result<(), TransportError> {
        if self.reject_submit {
            return Err(TransportError::Submit(endpoint));
        }
        if !self.busy.insert((device, endpoint)) {
            return Err(TransportError::Busy(endpoint));
        }
        self.requested.push((device, endpoint, len));
        Ok(())
    }
}
