// SPDX-FileCopyrightText: The usbh-midi authors
// SPDX-License-Identifier: MPL-2.0

#![allow(rustdoc::invalid_rust_codeblocks)]
#![doc = include_str!("../README.md")]
#![warn(rust_2018_idioms)]
#![warn(rust_2021_compatibility)]
#![warn(missing_debug_implementations)]
//#![warn(missing_docs)] // FIXME
#![warn(unreachable_pub)]
#![warn(unsafe_code)]
#![warn(clippy::pedantic)]
#![warn(clippy::clone_on_ref_ptr)]
#![warn(rustdoc::broken_intra_doc_links)]
// Repetitions of module/type names occur frequently when using many
// modules for keeping the size of the source files handy. Often
// types have the same name as their parent module.
#![allow(clippy::module_name_repetitions)]
// Repeating the type name in `..Default::default()` expressions
// is not needed since the context is obvious.
#![allow(clippy::default_trait_access)]

pub mod config;
pub use self::config::{Config, ConfigError};

pub mod descriptor;
pub use self::descriptor::{EnumerationError, MidiEndpoint, MidiInterface};

mod host;
pub use self::host::{IgnoreEvents, MidiHost, MidiHostHandler, MountInfo, OpenError};

#[cfg(test)]
mod mock;

pub mod packet;
pub use self::packet::{CodeIndex, EventPacket, Status};

mod queue;
pub use self::queue::{PacketQueue, QueueFull};

mod scheduler;

mod session;

pub mod stream;
pub use self::stream::{Decoded, StreamDecoder, StreamEncoder, SysExCables};

pub mod transport;
pub use self::transport::{
    DeviceAddress, Direction, EndpointAddress, HostTransport, Submission, TransferResult,
    TransportError,
};
