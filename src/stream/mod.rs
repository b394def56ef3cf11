// SPDX-FileCopyrightText: The usbh-midi authors
// SPDX-License-Identifier: MPL-2.0

//! Conversion between raw MIDI byte streams and event packets

mod decoder;
pub use self::decoder::{Decoded, StreamDecoder, SysExCables};

mod encoder;
pub use self::encoder::StreamEncoder;
