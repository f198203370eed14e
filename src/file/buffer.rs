//! Append-style output buffer for heap and stream serialization.
//!
//! Heaps, IL streams and the final metadata image are produced by appending.
//! [`BufferWriter`] wraps a growable `Vec<u8>` with the primitives the ECMA-335
//! format needs: little-endian integers, compressed unsigned/signed integers
//! (ECMA-335 II.23.2) and 4-byte alignment padding.

use crate::{Error::OutOfBounds, Result};

/// Growable little-endian output buffer.
///
/// All heap builders and the method body encoder write through this type; the final
/// assembler concatenates the resulting byte vectors. Positions handed out by
/// [`BufferWriter::position`] remain valid because the buffer is append-only.
#[derive(Debug, Default)]
pub struct BufferWriter {
    data: Vec<u8>,
}

impl BufferWriter {
    /// Creates an empty buffer.
    #[must_use]
    pub fn new() -> Self {
        BufferWriter { data: Vec::new() }
    }

    /// Current length of the buffer, which is also the offset of the next write.
    #[must_use]
    pub fn position(&self) -> usize {
        self.data.len()
    }

    /// Returns the written bytes.
    #[must_use]
    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    /// Consumes the writer and returns the underlying byte vector.
    #[must_use]
    pub fn into_vec(self) -> Vec<u8> {
        self.data
    }

    /// Appends a single byte.
    pub fn write_u8(&mut self, value: u8) {
        self.data.push(value);
    }

    /// Appends a `u16` in little-endian order.
    pub fn write_u16(&mut self, value: u16) {
        self.data.extend_from_slice(&value.to_le_bytes());
    }

    /// Appends a `u32` in little-endian order.
    pub fn write_u32(&mut self, value: u32) {
        self.data.extend_from_slice(&value.to_le_bytes());
    }

    /// Appends a `u64` in little-endian order.
    pub fn write_u64(&mut self, value: u64) {
        self.data.extend_from_slice(&value.to_le_bytes());
    }

    /// Appends raw bytes.
    pub fn write_bytes(&mut self, bytes: &[u8]) {
        self.data.extend_from_slice(bytes);
    }

    /// Appends either 2 or 4 little-endian bytes depending on `is_large`.
    ///
    /// This mirrors the dynamic index width used throughout table serialization;
    /// the value is truncated to `u16` in the small case.
    pub fn write_dyn(&mut self, value: u32, is_large: bool) {
        if is_large {
            self.write_u32(value);
        } else {
            #[allow(clippy::cast_possible_truncation)]
            self.write_u16(value as u16);
        }
    }

    /// Appends an unsigned integer in the compressed encoding of ECMA-335 II.23.2.
    ///
    /// Values < 0x80 take one byte, values < 0x4000 take two (high bit set), and
    /// everything up to 0x1FFF_FFFF takes four (top two bits set).
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::OutOfBounds`] if the value exceeds the maximum
    /// compressible value 0x1FFF_FFFF.
    pub fn write_compressed_u32(&mut self, value: u32) -> Result<()> {
        match value {
            0..=0x7F => self.write_u8(value as u8),
            0x80..=0x3FFF => {
                self.write_u8(0x80 | (value >> 8) as u8);
                self.write_u8((value & 0xFF) as u8);
            }
            0x4000..=0x1FFF_FFFF => {
                self.write_u8(0xC0 | (value >> 24) as u8);
                self.write_u8(((value >> 16) & 0xFF) as u8);
                self.write_u8(((value >> 8) & 0xFF) as u8);
                self.write_u8((value & 0xFF) as u8);
            }
            _ => return Err(OutOfBounds),
        }
        Ok(())
    }

    /// Appends a signed integer in the compressed encoding of ECMA-335 II.23.2.
    ///
    /// The sign bit is rotated into the lowest bit before the unsigned encoding is
    /// applied, as the format requires for array lower bounds.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::OutOfBounds`] if the value is outside the
    /// compressible range -2^28..2^28.
    pub fn write_compressed_i32(&mut self, value: i32) -> Result<()> {
        #[allow(clippy::cast_sign_loss)]
        let rotated = ((value << 1) as u32) | u32::from(value < 0);

        // The width is chosen from the original magnitude; the rotated value is
        // masked to that width.
        match value {
            -0x40..=0x3F => self.write_u8((rotated & 0x7F) as u8),
            -0x2000..=0x1FFF => {
                let v = rotated & 0x3FFF;
                self.write_u8(0x80 | (v >> 8) as u8);
                self.write_u8((v & 0xFF) as u8);
            }
            -0x1000_0000..=0x0FFF_FFFF => {
                let v = rotated & 0x1FFF_FFFF;
                self.write_u8(0xC0 | (v >> 24) as u8);
                self.write_u8(((v >> 16) & 0xFF) as u8);
                self.write_u8(((v >> 8) & 0xFF) as u8);
                self.write_u8((v & 0xFF) as u8);
            }
            _ => return Err(OutOfBounds),
        }
        Ok(())
    }

    /// Pads the buffer with `fill` bytes until its length is a multiple of `alignment`.
    pub fn align(&mut self, alignment: usize, fill: u8) {
        while self.data.len() % alignment != 0 {
            self.data.push(fill);
        }
    }
}
