//! # #GUID Heap
//!
//! A flat array of 16-byte records indexed 1-based. The zero GUID always maps to
//! index 0 without storage.

use std::collections::HashMap;

use uguid::Guid;

use crate::{Error, Result};

/// The #GUID heap builder.
pub struct GuidHeap {
    data: Vec<u8>,
    lookup: HashMap<Guid, u32>,
    frozen: bool,
}

impl GuidHeap {
    /// Creates an empty heap.
    #[must_use]
    pub fn new() -> Self {
        GuidHeap {
            data: Vec::new(),
            lookup: HashMap::new(),
            frozen: false,
        }
    }

    /// Interns a GUID and returns its 1-based index; [`Guid::ZERO`] maps to 0.
    ///
    /// # Errors
    ///
    /// Returns [`Error::PhaseViolation`] after the heap is frozen.
    pub fn intern(&mut self, guid: Guid) -> Result<u32> {
        if self.frozen {
            return Err(Error::PhaseViolation(
                "GUID heap is frozen, no new GUIDs may be interned",
            ));
        }
        if guid == Guid::ZERO {
            return Ok(0);
        }
        if let Some(index) = self.lookup.get(&guid) {
            return Ok(*index);
        }

        self.data.extend_from_slice(&guid.to_bytes());
        #[allow(clippy::cast_possible_truncation)]
        let index = (self.data.len() / 16) as u32;
        self.lookup.insert(guid, index);
        Ok(index)
    }

    /// Marks the heap immutable.
    pub fn freeze(&mut self) {
        self.frozen = true;
    }

    /// The heap bytes; always a multiple of 16.
    #[must_use]
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Byte size of the heap.
    #[must_use]
    pub fn size(&self) -> usize {
        self.data.len()
    }
}

impl Default for GuidHeap {
    fn default() -> Self {
        GuidHeap::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_guid_maps_to_zero() {
        let mut heap = GuidHeap::new();
        assert_eq!(heap.intern(Guid::ZERO).unwrap(), 0);
        assert_eq!(heap.size(), 0);
    }

    #[test]
    fn test_indices_are_one_based() {
        let mut heap = GuidHeap::new();
        let first = heap
            .intern(Guid::from_bytes([1; 16]))
            .unwrap();
        let second = heap
            .intern(Guid::from_bytes([2; 16]))
            .unwrap();
        assert_eq!(first, 1);
        assert_eq!(second, 2);
        assert_eq!(heap.size(), 32);
    }

    #[test]
    fn test_intern_deduplicates() {
        let mut heap = GuidHeap::new();
        let guid = Guid::from_bytes([7; 16]);
        assert_eq!(heap.intern(guid).unwrap(), heap.intern(guid).unwrap());
        assert_eq!(heap.size(), 16);
    }
}
