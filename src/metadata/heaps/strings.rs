//! # #Strings Heap
//!
//! Identifier strings interned through a two-stage scheme: during the open phase
//! every distinct string gets a cheap *virtual* index; at freeze time all strings
//! are sorted by reversed-lexicographic byte order (ties broken longer-first) so
//! that a string which is an exact suffix of its sorted predecessor folds into
//! the predecessor's bytes instead of being stored again. Only the freeze step
//! produces real heap offsets; table serialization resolves virtual indices
//! through the frozen map.

use std::cmp::Ordering;
use std::collections::HashMap;

use crate::{Error, Result};

/// Byte limit for identifier names; longer names get an advisory diagnostic.
pub const NAME_LENGTH_LIMIT: usize = 1023;
/// Byte limit for file path strings.
pub const PATH_LENGTH_LIMIT: usize = 259;

/// A provisional index handed out during the open phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StringIndex(pub u32);

impl StringIndex {
    /// The empty string, real offset 0 in every generation.
    pub const EMPTY: StringIndex = StringIndex(0);
}

struct FrozenStrings {
    /// Virtual index -> real heap offset
    real_offsets: Vec<u32>,
    data: Vec<u8>,
}

/// The #Strings heap builder.
pub struct StringHeap {
    /// Virtual index 0 is the empty string; entries start at virtual index 1
    entries: Vec<String>,
    lookup: HashMap<String, StringIndex>,
    frozen: Option<FrozenStrings>,
}

impl StringHeap {
    /// Creates an empty, open string heap.
    #[must_use]
    pub fn new() -> Self {
        StringHeap {
            entries: Vec::new(),
            lookup: HashMap::new(),
            frozen: None,
        }
    }

    /// Interns a string and returns its virtual index.
    ///
    /// # Errors
    ///
    /// Returns [`Error::PhaseViolation`] after the heap is frozen.
    pub fn intern(&mut self, value: &str) -> Result<StringIndex> {
        if self.frozen.is_some() {
            return Err(Error::PhaseViolation(
                "string heap is frozen, no new strings may be interned",
            ));
        }
        if value.is_empty() {
            return Ok(StringIndex::EMPTY);
        }
        if let Some(index) = self.lookup.get(value) {
            return Ok(*index);
        }

        #[allow(clippy::cast_possible_truncation)]
        let index = StringIndex(self.entries.len() as u32 + 1);
        self.entries.push(value.to_string());
        self.lookup.insert(value.to_string(), index);
        Ok(index)
    }

    /// Interns an identifier name, flagging names over [`NAME_LENGTH_LIMIT`]
    /// UTF-8 bytes. The oversized name is still interned; the flag is advisory.
    ///
    /// # Errors
    ///
    /// Returns [`Error::PhaseViolation`] after the heap is frozen.
    pub fn intern_name_checked(&mut self, value: &str) -> Result<(StringIndex, bool)> {
        let index = self.intern(value)?;
        Ok((index, value.len() > NAME_LENGTH_LIMIT))
    }

    /// Interns a path string, flagging paths over [`PATH_LENGTH_LIMIT`] bytes.
    ///
    /// # Errors
    ///
    /// Returns [`Error::PhaseViolation`] after the heap is frozen.
    pub fn intern_path_checked(&mut self, value: &str) -> Result<(StringIndex, bool)> {
        let index = self.intern(value)?;
        Ok((index, value.len() > PATH_LENGTH_LIMIT))
    }

    /// Sorts, folds and lays out the heap; after this no interning is possible
    /// and virtual indices become resolvable.
    pub fn freeze(&mut self) {
        if self.frozen.is_some() {
            return;
        }

        // Sort virtual indices by reversed byte order so every string directly
        // follows the strings it is a suffix of; ties put the longer first.
        let mut order: Vec<u32> = (0..self.entries.len() as u32).collect();
        order.sort_by(|a, b| suffix_order(&self.entries[*a as usize], &self.entries[*b as usize]));

        let mut data = vec![0u8];
        let mut real_offsets = vec![0u32; self.entries.len() + 1];
        let mut previous: Option<(&str, u32)> = None;

        for virtual_index in order {
            let value = self.entries[virtual_index as usize].as_str();
            let offset = match previous {
                Some((prev, prev_offset)) if prev.ends_with(value) => {
                    #[allow(clippy::cast_possible_truncation)]
                    let delta = (prev.len() - value.len()) as u32;
                    prev_offset + delta
                }
                _ => {
                    #[allow(clippy::cast_possible_truncation)]
                    let offset = data.len() as u32;
                    data.extend_from_slice(value.as_bytes());
                    data.push(0);
                    previous = Some((value, offset));
                    offset
                }
            };
            real_offsets[virtual_index as usize + 1] = offset;
        }

        self.frozen = Some(FrozenStrings { real_offsets, data });
    }

    /// Resolves a virtual index to its real heap offset.
    ///
    /// # Errors
    ///
    /// Returns [`Error::PhaseViolation`] before the heap is frozen.
    pub fn resolve(&self, index: StringIndex) -> Result<u32> {
        let frozen = self.frozen.as_ref().ok_or(Error::PhaseViolation(
            "string heap must be frozen before virtual indices are resolved",
        ))?;
        frozen
            .real_offsets
            .get(index.0 as usize)
            .copied()
            .ok_or(Error::OutOfBounds)
    }

    /// The frozen heap bytes, without trailing alignment.
    ///
    /// # Errors
    ///
    /// Returns [`Error::PhaseViolation`] before the heap is frozen.
    pub fn data(&self) -> Result<&[u8]> {
        self.frozen
            .as_ref()
            .map(|frozen| frozen.data.as_slice())
            .ok_or(Error::PhaseViolation(
                "string heap must be frozen before its bytes are read",
            ))
    }

    /// Unaligned byte size of the frozen heap; 0 while still open.
    #[must_use]
    pub fn size(&self) -> usize {
        self.frozen.as_ref().map_or(0, |frozen| frozen.data.len())
    }
}

impl Default for StringHeap {
    fn default() -> Self {
        StringHeap::new()
    }
}

fn suffix_order(a: &str, b: &str) -> Ordering {
    let mut a_iter = a.bytes().rev();
    let mut b_iter = b.bytes().rev();
    loop {
        match (a_iter.next(), b_iter.next()) {
            (Some(x), Some(y)) => match x.cmp(&y) {
                Ordering::Equal => {}
                other => return other,
            },
            // One is a suffix of the other: the longer string first.
            (Some(_), None) => return Ordering::Less,
            (None, Some(_)) => return Ordering::Greater,
            (None, None) => return Ordering::Equal,
        }
    }
}
