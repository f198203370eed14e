//! # #Blob Heap
//!
//! Length-prefixed raw byte sequences (signatures, constants, marshalling
//! descriptors, public keys) deduplicated by content. The empty blob is the
//! reserved offset 0 and is never physically stored.

use std::collections::HashMap;

use crate::{file::BufferWriter, Error, Result};

/// The #Blob heap builder.
pub struct BlobHeap {
    buffer: BufferWriter,
    lookup: HashMap<Vec<u8>, u32>,
    frozen: bool,
}

impl BlobHeap {
    /// Creates an empty heap holding only the reserved leading 0x00 byte.
    #[must_use]
    pub fn new() -> Self {
        let mut buffer = BufferWriter::new();
        buffer.write_u8(0);
        BlobHeap {
            buffer,
            lookup: HashMap::new(),
            frozen: false,
        }
    }

    /// Interns a blob and returns its heap offset; empty blobs map to 0.
    ///
    /// # Errors
    ///
    /// Returns [`Error::PhaseViolation`] after the heap is frozen.
    pub fn intern(&mut self, bytes: &[u8]) -> Result<u32> {
        if self.frozen {
            return Err(Error::PhaseViolation(
                "blob heap is frozen, no new blobs may be interned",
            ));
        }
        if bytes.is_empty() {
            return Ok(0);
        }
        if let Some(offset) = self.lookup.get(bytes) {
            return Ok(*offset);
        }

        #[allow(clippy::cast_possible_truncation)]
        let offset = self.buffer.position() as u32;
        #[allow(clippy::cast_possible_truncation)]
        self.buffer.write_compressed_u32(bytes.len() as u32)?;
        self.buffer.write_bytes(bytes);
        self.lookup.insert(bytes.to_vec(), offset);
        Ok(offset)
    }

    /// Marks the heap immutable.
    pub fn freeze(&mut self) {
        self.frozen = true;
    }

    /// The heap bytes, without trailing alignment.
    #[must_use]
    pub fn data(&self) -> &[u8] {
        self.buffer.as_slice()
    }

    /// Unaligned byte size of the heap.
    #[must_use]
    pub fn size(&self) -> usize {
        self.buffer.position()
    }
}

impl Default for BlobHeap {
    fn default() -> Self {
        BlobHeap::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_blob_is_offset_zero() {
        let mut heap = BlobHeap::new();
        assert_eq!(heap.intern(&[]).unwrap(), 0);
        assert_eq!(heap.data(), &[0x00]);
    }

    #[test]
    fn test_blob_layout_and_dedup() {
        let mut heap = BlobHeap::new();
        let first = heap.intern(&[0x06, 0x08]).unwrap();
        let second = heap.intern(&[0x06, 0x08]).unwrap();
        assert_eq!(first, 1);
        assert_eq!(first, second);
        assert_eq!(heap.data(), &[0x00, 0x02, 0x06, 0x08]);
    }

    #[test]
    fn test_distinct_blobs_get_distinct_offsets() {
        let mut heap = BlobHeap::new();
        let a = heap.intern(&[0x01]).unwrap();
        let b = heap.intern(&[0x02]).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_intern_after_freeze_is_phase_violation() {
        let mut heap = BlobHeap::new();
        heap.freeze();
        assert!(matches!(
            heap.intern(&[0x01]),
            Err(Error::PhaseViolation(_))
        ));
    }
}
