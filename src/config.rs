// SPDX-FileCopyrightText: The usbh-midi authors
// SPDX-License-Identifier: MPL-2.0

//! Static limits of a driver instance

use thiserror::Error;

use crate::packet::PACKET_SIZE;

/// Number of device slots if not configured otherwise.
pub const DEFAULT_MAX_DEVICES: usize = 4;

/// Size of the incoming and outgoing byte queues of each session.
pub const DEFAULT_QUEUE_SIZE: usize = 64;

/// Ceiling for the negotiated max packet size of bulk endpoints.
pub const DEFAULT_ENDPOINT_BUFFER_SIZE: u16 = 64;

/// USB device addresses are 7 bits wide and 0 is reserved.
pub const MAX_DEVICE_ADDRESS: usize = 127;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("max devices must be in the range 1..={MAX_DEVICE_ADDRESS}: {0}")]
    MaxDevices(usize),

    #[error("{name} must hold at least one event packet: {size}")]
    QueueSize { name: &'static str, size: usize },

    #[error("{name} must hold at least one event packet: {size}")]
    EndpointBufferSize { name: &'static str, size: u16 },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Number of session slots
    ///
    /// Device addresses `1..=max_devices` are accepted.
    pub max_devices: usize,

    /// Capacity of the incoming queue in bytes
    pub rx_queue_size: usize,

    /// Capacity of the outgoing queue in bytes
    pub tx_queue_size: usize,

    /// Upper bound for the max packet size of the IN endpoint
    pub rx_endpoint_buffer_size: u16,

    /// Upper bound for the max packet size of the OUT endpoint
    pub tx_endpoint_buffer_size: u16,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_devices: DEFAULT_MAX_DEVICES,
            rx_queue_size: DEFAULT_QUEUE_SIZE,
            tx_queue_size: DEFAULT_QUEUE_SIZE,
            rx_endpoint_buffer_size: DEFAULT_ENDPOINT_BUFFER_SIZE,
            tx_endpoint_buffer_size: DEFAULT_ENDPOINT_BUFFER_SIZE,
        }
    }
}

impl Config {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let Self {
            max_devices,
            rx_queue_size,
            tx_queue_size,
            rx_endpoint_buffer_size,
            tx_endpoint_buffer_size,
        } = *self;
        if !(1..=MAX_DEVICE_ADDRESS).contains(&max_devices) {
            return Err(ConfigError::MaxDevices(max_devices));
        }
        for (name, size) in [
            ("rx_queue_size", rx_queue_size),
            ("tx_queue_size", tx_queue_size),
        ] {
            if size < PACKET_SIZE {
                return Err(ConfigError::QueueSize { name, size });
            }
        }
        for (name, size) in [
            ("rx_endpoint_buffer_size", rx_endpoint_buffer_size),
            ("tx_endpoint_buffer_size", tx_endpoint_buffer_size),
        ] {
            if usize::from(size) < PACKET_SIZE {
                return Err(ConfigError::EndpointBufferSize { name, size });
            }
        }
        Ok(())
    }
}
