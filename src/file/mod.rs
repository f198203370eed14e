//! Low-level binary output infrastructure for metadata emission.
//!
//! Every later pipeline stage writes through [`BufferWriter`], an append-style
//! growable buffer with the little-endian, compressed-integer and alignment
//! primitives the ECMA-335 format requires.

pub(crate) mod buffer;

pub use buffer::BufferWriter;
