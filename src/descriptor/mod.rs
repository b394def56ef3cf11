// SPDX-FileCopyrightText: The usbh-midi authors
// SPDX-License-Identifier: MPL-2.0

//! Enumeration of USB-MIDI interfaces
//!
//! Only the MIDI streaming interface is evaluated. A preceding audio
//! control interface is skipped and audio streaming interfaces are not
//! supported. Jack and element descriptors are accepted but ignored,
//! the number of cables per direction is taken from the class-specific
//! endpoint descriptors.

use enum_as_inner::EnumAsInner;
use strum::FromRepr;
use thiserror::Error;

use crate::{
    config::Config,
    packet::MAX_CABLES,
    transport::{Direction, EndpointAddress},
};

mod iter;
pub use self::iter::{DescriptorIter, RawDescriptor};

pub const DESC_TYPE_INTERFACE: u8 = 0x04;
pub const DESC_TYPE_ENDPOINT: u8 = 0x05;
pub const DESC_TYPE_INTERFACE_ASSOCIATION: u8 = 0x0b;
pub const DESC_TYPE_CS_INTERFACE: u8 = 0x24;
pub const DESC_TYPE_CS_ENDPOINT: u8 = 0x25;

pub const CLASS_AUDIO: u8 = 0x01;

pub const SUBCLASS_AUDIO_CONTROL: u8 = 0x01;
pub const SUBCLASS_AUDIO_STREAMING: u8 = 0x02;
pub const SUBCLASS_MIDI_STREAMING: u8 = 0x03;

/// Subtype of the class-specific MS endpoint descriptor
pub const MS_GENERAL: u8 = 0x01;

const INTERFACE_DESC_LEN: usize = 9;
const ENDPOINT_DESC_LEN: usize = 7;
const MS_ENDPOINT_DESC_MIN_LEN: usize = 4;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EnumerationError {
    #[error("invalid descriptor length {length} at offset {offset}")]
    InvalidLength { offset: usize, length: usize },

    #[error("descriptor at offset {offset} with length {length} exceeds the remaining {available} bytes")]
    Truncated {
        offset: usize,
        length: usize,
        available: usize,
    },

    #[error("descriptor {descriptor_type:#04x} is too short: {length} bytes")]
    TooShort { descriptor_type: u8, length: usize },

    #[error("no interface descriptor")]
    NoInterface,

    #[error("not an audio class interface: class {class:#04x}")]
    NotAudioClass { class: u8 },

    #[error("no MIDI streaming interface found")]
    NoMidiStreamingInterface,

    #[error("not a MIDI streaming interface: subclass {subclass:#04x}")]
    NotMidiStreaming { subclass: u8 },

    #[error("unexpected descriptor {descriptor_type:#04x} (subtype {subtype:?})")]
    UnexpectedDescriptor {
        descriptor_type: u8,
        subtype: Option<u8>,
    },

    #[error("unknown class-specific interface descriptor subtype {subtype:#04x}")]
    UnknownInterfaceSubtype { subtype: u8 },

    #[error("duplicate {direction} endpoint {address}")]
    DuplicateEndpoint {
        direction: Direction,
        address: EndpointAddress,
    },

    #[error("class-specific endpoint descriptor without preceding endpoint descriptor")]
    OrphanClassEndpoint,

    #[error("duplicate class-specific descriptor for {direction} endpoint")]
    DuplicateClassEndpoint { direction: Direction },

    #[error("too many embedded jacks for {direction} endpoint: {num_cables}")]
    TooManyCables { direction: Direction, num_cables: u8 },

    #[error("invalid max packet size of endpoint {address}: {max_packet_size}")]
    InvalidMaxPacketSize {
        address: EndpointAddress,
        max_packet_size: u16,
    },

    #[error("neither an IN nor an OUT endpoint with embedded jacks")]
    NoUsableEndpoint,
}

/// Standard interface descriptor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InterfaceDescriptor {
    pub interface_number: u8,
    pub alternate_setting: u8,
    pub num_endpoints: u8,
    pub interface_class: u8,
    pub interface_subclass: u8,
    pub interface_protocol: u8,
}

impl InterfaceDescriptor {
    #[must_use]
    pub const fn is_audio(&self) -> bool {
        self.interface_class == CLASS_AUDIO
    }

    #[must_use]
    pub const fn is_midi_streaming(&self) -> bool {
        self.is_audio() && self.interface_subclass == SUBCLASS_MIDI_STREAMING
    }
}

/// Standard endpoint descriptor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EndpointDescriptor {
    pub address: EndpointAddress,
    pub attributes: u8,
    pub max_packet_size: u16,
    pub interval: u8,
}

/// Subtypes of class-specific MS interface descriptors
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromRepr)]
#[repr(u8)]
pub enum MsInterfaceSubtype {
    Header = 0x01,
    InJack = 0x02,
    OutJack = 0x03,
    Element = 0x04,
}

/// Class-specific MS bulk data endpoint descriptor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MsEndpointDescriptor {
    /// IDs of the embedded jacks, one per cable
    pub jack_ids: Vec<u8>,
}

impl MsEndpointDescriptor {
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn num_cables(&self) -> u8 {
        // Bounded by `bLength`
        self.jack_ids.len() as u8
    }
}

/// Decoded descriptor record.
#[derive(Debug, Clone, PartialEq, Eq, EnumAsInner)]
pub enum Descriptor {
    Interface(InterfaceDescriptor),
    Endpoint(EndpointDescriptor),
    MsInterface(MsInterfaceSubtype),
    MsEndpoint(MsEndpointDescriptor),
    /// Groups the interfaces of a function in composite devices
    InterfaceAssociation,
    Other(u8),
}

impl Descriptor {
    /// Starts the descriptors of another interface or function.
    #[must_use]
    pub const fn is_interface_boundary(&self) -> bool {
        matches!(self, Self::Interface(_) | Self::InterfaceAssociation)
    }
}

impl<'a> TryFrom<RawDescriptor<'a>> for Descriptor {
    type Error = EnumerationError;

    fn try_from(raw: RawDescriptor<'a>) -> Result<Self, Self::Error> {
        let descriptor_type = raw.descriptor_type();
        let too_short = || EnumerationError::TooShort {
            descriptor_type,
            length: raw.len(),
        };
        match descriptor_type {
            DESC_TYPE_INTERFACE => {
                let &[_, _, interface_number, alternate_setting, num_endpoints, interface_class, interface_subclass, interface_protocol, ..] =
                    raw.bytes()
                else {
                    return Err(too_short());
                };
                debug_assert!(raw.len() >= INTERFACE_DESC_LEN);
                Ok(Self::Interface(InterfaceDescriptor {
                    interface_number,
                    alternate_setting,
                    num_endpoints,
                    interface_class,
                    interface_subclass,
                    interface_protocol,
                }))
            }
            DESC_TYPE_ENDPOINT => {
                let &[_, _, address, attributes, max_packet_size_lo, max_packet_size_hi, interval, ..] =
                    raw.bytes()
                else {
                    return Err(too_short());
                };
                debug_assert!(raw.len() >= ENDPOINT_DESC_LEN);
                Ok(Self::Endpoint(EndpointDescriptor {
                    address: EndpointAddress::new(address),
                    attributes,
                    max_packet_size: u16::from_le_bytes([max_packet_size_lo, max_packet_size_hi]),
                    interval,
                }))
            }
            DESC_TYPE_CS_INTERFACE => {
                let subtype = raw.subtype().ok_or_else(too_short)?;
                MsInterfaceSubtype::from_repr(subtype)
                    .map(Self::MsInterface)
                    .ok_or(EnumerationError::UnknownInterfaceSubtype { subtype })
            }
            DESC_TYPE_CS_ENDPOINT => {
                let &[_, _, subtype, num_jacks, ref jack_ids @ ..] = raw.bytes() else {
                    return Err(too_short());
                };
                debug_assert!(raw.len() >= MS_ENDPOINT_DESC_MIN_LEN);
                if subtype != MS_GENERAL {
                    return Err(EnumerationError::UnexpectedDescriptor {
                        descriptor_type,
                        subtype: Some(subtype),
                    });
                }
                // Some devices report fewer jack IDs than announced
                let num_jacks = usize::from(num_jacks);
                let jack_ids = if jack_ids.len() < num_jacks {
                    log::debug!(
                        "Class-specific endpoint descriptor announces {num_jacks} jacks but \
                         contains only {num_ids} IDs",
                        num_ids = jack_ids.len()
                    );
                    let mut padded = jack_ids.to_vec();
                    padded.resize(num_jacks, 0);
                    padded
                } else {
                    jack_ids[..num_jacks].to_vec()
                };
                Ok(Self::MsEndpoint(MsEndpointDescriptor { jack_ids }))
            }
            DESC_TYPE_INTERFACE_ASSOCIATION => Ok(Self::InterfaceAssociation),
            _ => Ok(Self::Other(descriptor_type)),
        }
    }
}

/// A bulk endpoint of a MIDI streaming interface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MidiEndpoint {
    pub descriptor: EndpointDescriptor,

    /// Negotiated max packet size, limited by the buffer size
    pub max_packet_size: u16,

    /// Number of embedded jacks, i.e. virtual cables
    pub num_cables: u8,
}

impl MidiEndpoint {
    #[must_use]
    pub const fn address(&self) -> EndpointAddress {
        self.descriptor.address
    }
}

/// Topology of a MIDI streaming interface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MidiInterface {
    pub interface_number: u8,

    /// Device to host
    pub rx: Option<MidiEndpoint>,

    /// Host to device
    pub tx: Option<MidiEndpoint>,
}

impl MidiInterface {
    #[must_use]
    pub fn num_rx_cables(&self) -> u8 {
        self.rx.map_or(0, |endpoint| endpoint.num_cables)
    }

    #[must_use]
    pub fn num_tx_cables(&self) -> u8 {
        self.tx.map_or(0, |endpoint| endpoint.num_cables)
    }
}

#[derive(Debug, Default)]
struct EndpointSlot {
    endpoint: Option<EndpointDescriptor>,
    max_packet_size: u16,
    num_cables: Option<u8>,
}

impl EndpointSlot {
    fn into_midi_endpoint(self) -> Option<MidiEndpoint> {
        let Self {
            endpoint,
            max_packet_size,
            num_cables,
        } = self;
        let descriptor = endpoint?;
        let num_cables = num_cables.unwrap_or(0);
        if num_cables == 0 {
            log::debug!(
                "Ignoring endpoint {address} without embedded jacks",
                address = descriptor.address
            );
            return None;
        }
        Some(MidiEndpoint {
            descriptor,
            max_packet_size,
            num_cables,
        })
    }
}

/// Parse the descriptors of a MIDI streaming interface.
///
/// The `block` starts with an interface descriptor. If this is an audio
/// control interface then the subsequent MIDI streaming interface is
/// located first. The block may extend until the end of the configuration
/// descriptor, parsing stops at the next interface or interface
/// association descriptor after the MIDI streaming interface.
pub fn parse_midi_interface(
    block: &[u8],
    config: &Config,
) -> Result<MidiInterface, EnumerationError> {
    let mut iter = DescriptorIter::new(block);
    let first = iter.next().ok_or(EnumerationError::NoInterface)??;
    let Descriptor::Interface(mut interface) = Descriptor::try_from(first)? else {
        return Err(EnumerationError::NoInterface);
    };
    if !interface.is_audio() {
        return Err(EnumerationError::NotAudioClass {
            class: interface.interface_class,
        });
    }
    if interface.interface_subclass == SUBCLASS_AUDIO_CONTROL {
        log::debug!(
            "Skipping audio control interface {interface_number}",
            interface_number = interface.interface_number
        );
        interface = find_midi_streaming_interface(&mut iter)?;
    }
    if interface.interface_subclass != SUBCLASS_MIDI_STREAMING {
        return Err(EnumerationError::NotMidiStreaming {
            subclass: interface.interface_subclass,
        });
    }
    log::debug!(
        "Parsing MIDI streaming interface {interface_number}",
        interface_number = interface.interface_number
    );

    // The interface header or an endpoint must follow
    if let Some(next) = iter.peek() {
        let next = next?;
        let descriptor = Descriptor::try_from(next)?;
        if !matches!(
            descriptor,
            Descriptor::MsInterface(MsInterfaceSubtype::Header) | Descriptor::Endpoint(_)
        ) {
            return Err(EnumerationError::UnexpectedDescriptor {
                descriptor_type: next.descriptor_type(),
                subtype: next.subtype(),
            });
        }
    }

    let mut rx = EndpointSlot::default();
    let mut tx = EndpointSlot::default();
    // The class-specific endpoint descriptor refers to the directly preceding endpoint
    let mut prev_direction = None;
    for raw in iter {
        let raw = raw?;
        let descriptor = Descriptor::try_from(raw)?;
        if descriptor.is_interface_boundary() {
            log::debug!(
                "Finished MIDI streaming interface at offset {offset}",
                offset = raw.offset()
            );
            break;
        }
        if let Some(subtype) = descriptor.as_ms_interface() {
            log::debug!("Found class-specific interface descriptor {subtype:?}");
            prev_direction = None;
            continue;
        }
        if let Some(endpoint) = descriptor.as_endpoint() {
            let direction = endpoint.address.direction();
            log::debug!(
                "Found {direction} endpoint {address}",
                address = endpoint.address
            );
            let (slot, ceiling) = match direction {
                Direction::In => (&mut rx, config.rx_endpoint_buffer_size),
                Direction::Out => (&mut tx, config.tx_endpoint_buffer_size),
            };
            if slot.endpoint.is_some() {
                return Err(EnumerationError::DuplicateEndpoint {
                    direction,
                    address: endpoint.address,
                });
            }
            if endpoint.max_packet_size == 0 {
                return Err(EnumerationError::InvalidMaxPacketSize {
                    address: endpoint.address,
                    max_packet_size: endpoint.max_packet_size,
                });
            }
            slot.endpoint = Some(*endpoint);
            slot.max_packet_size = endpoint.max_packet_size.min(ceiling);
            prev_direction = Some(direction);
            continue;
        }
        if let Some(ms_endpoint) = descriptor.as_ms_endpoint() {
            let Some(direction) = prev_direction.take() else {
                return Err(EnumerationError::OrphanClassEndpoint);
            };
            let num_cables = ms_endpoint.num_cables();
            log::debug!("Found {num_cables} embedded jack(s) for {direction} endpoint");
            if num_cables > MAX_CABLES {
                return Err(EnumerationError::TooManyCables {
                    direction,
                    num_cables,
                });
            }
            let slot = match direction {
                Direction::In => &mut rx,
                Direction::Out => &mut tx,
            };
            if slot.num_cables.is_some() {
                return Err(EnumerationError::DuplicateClassEndpoint { direction });
            }
            slot.num_cables = Some(num_cables);
            continue;
        }
        return Err(EnumerationError::UnexpectedDescriptor {
            descriptor_type: raw.descriptor_type(),
            subtype: raw.subtype(),
        });
    }

    let interface = MidiInterface {
        interface_number: interface.interface_number,
        rx: rx.into_midi_endpoint(),
        tx: tx.into_midi_endpoint(),
    };
    if interface.rx.is_none() && interface.tx.is_none() {
        return Err(EnumerationError::NoUsableEndpoint);
    }
    log::debug!("Parsed MIDI streaming interface: {interface:?}");
    Ok(interface)
}

fn find_midi_streaming_interface(
    iter: &mut DescriptorIter<'_>,
) -> Result<InterfaceDescriptor, EnumerationError> {
    for raw in iter {
        let raw = raw?;
        if raw.descriptor_type() != DESC_TYPE_INTERFACE {
            continue;
        }
        let Descriptor::Interface(interface) = Descriptor::try_from(raw)? else {
            continue;
        };
        if interface.is_midi_streaming() {
            return Ok(interface);
        }
        log::debug!(
            "Skipping interface {interface_number} (class {class:#04x}, subclass {subclass:#04x})",
            interface_number = interface.interface_number,
            class = interface.interface_class,
            subclass = interface.interface_subclass,
        );
    }
    Err(EnumerationError::NoMidiStreamingInterface)
}

#[cfg(test)]
mod tests;
