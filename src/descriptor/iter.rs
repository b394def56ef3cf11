// SPDX-FileCopyrightText: The usbh-midi authors
// SPDX-License-Identifier: MPL-2.0

use std::iter::FusedIterator;

use super::EnumerationError;

/// A single, undecoded descriptor record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawDescriptor<'a> {
    offset: usize,
    bytes: &'a [u8],
}

impl<'a> RawDescriptor<'a> {
    /// Byte offset within the enclosing block
    #[must_use]
    pub const fn offset(&self) -> usize {
        self.offset
    }

    /// Value of `bLength`
    #[must_use]
    pub const fn len(&self) -> usize {
        self.bytes.len()
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Value of `bDescriptorType`
    #[must_use]
    pub const fn descriptor_type(&self) -> u8 {
        self.bytes[1]
    }

    /// Value of `bDescriptorSubtype` for class-specific descriptors
    #[must_use]
    pub fn subtype(&self) -> Option<u8> {
        self.bytes.get(2).copied()
    }

    /// All bytes following `bLength` and `bDescriptorType`
    #[must_use]
    pub fn payload(&self) -> &'a [u8] {
        &self.bytes[2..]
    }

    /// The whole record including the header
    #[must_use]
    pub const fn bytes(&self) -> &'a [u8] {
        self.bytes
    }
}

/// Walks a block of concatenated descriptors.
///
/// Never reads beyond the end of the block. Yields an error and then
/// stops if a record is malformed.
#[derive(Debug, Clone)]
pub struct DescriptorIter<'a> {
    block: &'a [u8],
    offset: usize,
}

impl<'a> DescriptorIter<'a> {
    #[must_use]
    pub const fn new(block: &'a [u8]) -> Self {
        Self { block, offset: 0 }
    }

    /// Number of bytes that have been consumed.
    #[must_use]
    pub const fn consumed(&self) -> usize {
        self.offset
    }

    /// Peek at the next record without consuming it.
    #[must_use]
    pub fn peek(&self) -> Option<Result<RawDescriptor<'a>, EnumerationError>> {
        self.clone().next()
    }
}

impl<'a> Iterator for DescriptorIter<'a> {
    type Item = Result<RawDescriptor<'a>, EnumerationError>;

    fn next(&mut self) -> Option<Self::Item> {
        let offset = self.offset;
        let remaining = &self.block[offset..];
        let &length = remaining.first()?;
        let length = usize::from(length);
        // Stop after the first error
        self.offset = self.block.len();
        if length < 2 {
            return Some(Err(EnumerationError::InvalidLength { offset, length }));
        }
        let Some(bytes) = remaining.get(..length) else {
            return Some(Err(EnumerationError::Truncated {
                offset,
                length,
                available: remaining.len(),
            }));
        };
        self.offset = offset + length;
        debug_assert!(self.offset <= self.block.len());
        Some(Ok(RawDescriptor { offset, bytes }))
    }
}

impl FusedIterator for DescriptorIter<'_> {}
