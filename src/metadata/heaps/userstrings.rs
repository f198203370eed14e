//! # #US Heap
//!
//! User strings referenced by IL `ldstr` operands. Unlike #Strings, entries are
//! written eagerly (no folding) as UTF-16 blobs: a compressed length counting the
//! UTF-16 bytes plus one marker byte, the little-endian code units, then the
//! marker itself. The marker is 1 when any code unit needs non-trivial handling
//! and 0 otherwise; consumers treat it as a fast-path hint.

use std::collections::HashMap;

use widestring::U16String;

use crate::metadata::token::Token;
use crate::{file::BufferWriter, Error, Result};

/// The #US heap builder.
pub struct UserStringHeap {
    buffer: BufferWriter,
    lookup: HashMap<String, Token>,
    frozen: bool,
}

impl UserStringHeap {
    /// Creates an empty heap holding only the reserved leading 0x00 byte.
    #[must_use]
    pub fn new() -> Self {
        let mut buffer = BufferWriter::new();
        buffer.write_u8(0);
        UserStringHeap {
            buffer,
            lookup: HashMap::new(),
            frozen: false,
        }
    }

    /// Interns a user string and returns its 0x70-tagged token.
    ///
    /// # Errors
    ///
    /// Returns [`Error::PhaseViolation`] after the heap is frozen.
    pub fn intern(&mut self, value: &str) -> Result<Token> {
        if self.frozen {
            return Err(Error::PhaseViolation(
                "user-string heap is frozen, no new strings may be interned",
            ));
        }
        if let Some(token) = self.lookup.get(value) {
            return Ok(*token);
        }

        #[allow(clippy::cast_possible_truncation)]
        let offset = self.buffer.position() as u32;
        let units = U16String::from_str(value);

        #[allow(clippy::cast_possible_truncation)]
        self.buffer
            .write_compressed_u32(units.len() as u32 * 2 + 1)?;
        let mut marker = 0u8;
        for unit in units.as_slice() {
            self.buffer.write_u16(*unit);
            if requires_handling(*unit) {
                marker = 1;
            }
        }
        self.buffer.write_u8(marker);

        let token = Token::user_string(offset);
        self.lookup.insert(value.to_string(), token);
        Ok(token)
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

impl Default for UserStringHeap {
    fn default() -> Self {
        UserStringHeap::new()
    }
}

/// Whether a UTF-16 unit forces the "complex" marker: anything at or beyond
/// 0x7F, or one of the control units runtimes special-case.
fn requires_handling(unit: u16) -> bool {
    unit >= 0x7F
        || matches!(unit, 0x01..=0x08 | 0x0E..=0x1F | 0x27 | 0x2D)
}
