//! # Physical Stream Layout
//!
//! Serializes the metadata root, the stream header directory and the five (or
//! six) streams into one contiguous byte region (ECMA-335 II.24.2). The tables
//! stream is `#~` for a full generation and `#-` for deltas; a minimal delta
//! additionally carries the empty `#JTD` marker stream last.

use bitflags::bitflags;
use strum::IntoEnumIterator;

use crate::file::BufferWriter;
use crate::metadata::heaps::{aligned_size, MetadataHeaps};
use crate::metadata::model::GenerationKind;
use crate::metadata::tables::{TableId, TableInfo, TableSet};
use crate::Result;

/// Metadata root signature, "BSJB" little-endian.
const METADATA_SIGNATURE: u32 = 0x424A_5342;

/// Version string field: "v4.0.30319" null-terminated, padded to 4 bytes.
const VERSION_FIELD: &[u8; 12] = b"v4.0.30319\0\0";

/// Fixed byte size of the metadata root up to the stream count.
const ROOT_SIZE: usize = 32;

bitflags! {
    /// Heap-size byte of the tables stream header (ECMA-335 II.24.2.6).
    struct HeapFlags: u8 {
        /// #Strings indices are 4 bytes
        const LARGE_STRINGS = 0x01;
        /// #GUID indices are 4 bytes
        const LARGE_GUIDS = 0x02;
        /// #Blob indices are 4 bytes
        const LARGE_BLOBS = 0x04;
        /// Delta generation, heaps hold only new content
        const DELTA_PADDING = 0x20;
    }
}

/// Serializes the tables stream: header, row counts for present tables, rows.
fn tables_stream(tables: &TableSet, info: &TableInfo, kind: GenerationKind) -> Vec<u8> {
    let mut buffer = BufferWriter::new();
    buffer.write_u32(0);
    buffer.write_u8(2);
    buffer.write_u8(0);

    let mut flags = HeapFlags::from_bits_truncate(info.heap_size_flags());
    if kind != GenerationKind::Full {
        flags |= HeapFlags::DELTA_PADDING;
    }
    buffer.write_u8(flags.bits());
    buffer.write_u8(1);

    buffer.write_u64(info.valid_mask());
    buffer.write_u64(info.sorted_mask());
    for table in TableId::iter() {
        let rows = info.rows(table);
        if rows > 0 {
            buffer.write_u32(rows);
        }
    }

    tables.serialize(&mut buffer, info);
    buffer.align(4, 0);
    buffer.into_vec()
}

/// Byte width of one stream header entry for the given name.
fn header_size(name: &str) -> usize {
    8 + aligned_size(name.len() + 1)
}

/// Writes the metadata root, stream directory and all stream bodies.
///
/// # Errors
///
/// Returns [`crate::Error::PhaseViolation`] if the heaps are not frozen.
#[allow(clippy::cast_possible_truncation)]
pub(crate) fn write_streams(
    buffer: &mut BufferWriter,
    tables: &TableSet,
    info: &TableInfo,
    heaps: &MetadataHeaps,
    kind: GenerationKind,
) -> Result<()> {
    let tables_data = tables_stream(tables, info, kind);
    let strings = heaps.strings.data()?;

    let tables_name = if kind == GenerationKind::Full { "#~" } else { "#-" };
    let mut streams: Vec<(&'static str, &[u8])> = vec![
        (tables_name, tables_data.as_slice()),
        ("#Strings", strings),
        ("#US", heaps.user_strings.data()),
        ("#GUID", heaps.guids.data()),
        ("#Blob", heaps.blobs.data()),
    ];
    if kind == GenerationKind::MinimalDelta {
        // The presence marker for minimal deltas; always empty, always last.
        streams.push(("#JTD", &[]));
    }

    buffer.write_u32(METADATA_SIGNATURE);
    buffer.write_u16(1);
    buffer.write_u16(1);
    buffer.write_u32(0);
    buffer.write_u32(VERSION_FIELD.len() as u32);
    buffer.write_bytes(VERSION_FIELD);
    buffer.write_u16(0);
    buffer.write_u16(streams.len() as u16);

    let directory_size: usize = streams
        .iter()
        .map(|(name, _)| header_size(name))
        .sum();
    let mut offset = ROOT_SIZE + directory_size;

    for (name, data) in &streams {
        let size = aligned_size(data.len());
        buffer.write_u32(offset as u32);
        buffer.write_u32(size as u32);
        buffer.write_bytes(name.as_bytes());
        buffer.write_u8(0);
        buffer.align(4, 0);
        offset += size;
    }

    for (_, data) in &streams {
        buffer.write_bytes(data);
        buffer.align(4, 0);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::tables::TABLE_COUNT;

    fn frozen_heaps() -> MetadataHeaps {
        let mut heaps = MetadataHeaps::new();
        heaps.freeze();
        heaps
    }

    #[test]
    fn test_tables_stream_header_layout() {
        let info = TableInfo::new(&[0u32; TABLE_COUNT], 0, 0, 0);
        let data = tables_stream(&TableSet::default(), &info, GenerationKind::Full);

        // Reserved u32, versions, flags byte, reserved byte, two masks.
        assert_eq!(data.len(), 24);
        assert_eq!(&data[..4], &[0, 0, 0, 0]);
        assert_eq!(data[4], 2);
        assert_eq!(data[5], 0);
        assert_eq!(data[6], 0);
        assert_eq!(data[7], 1);
        assert_eq!(&data[8..16], &0u64.to_le_bytes());
    }

    #[test]
    fn test_delta_flag_in_tables_header() {
        let info = TableInfo::new(&[0u32; TABLE_COUNT], 0, 0, 0);
        let data = tables_stream(&TableSet::default(), &info, GenerationKind::MinimalDelta);
        assert_eq!(data[6], 0x20);
    }

    #[test]
    fn test_root_signature_and_version() {
        let info = TableInfo::new(&[0u32; TABLE_COUNT], 0, 0, 0);
        let mut buffer = BufferWriter::new();
        write_streams(
            &mut buffer,
            &TableSet::default(),
            &info,
            &frozen_heaps(),
            GenerationKind::Full,
        )
        .unwrap();
        let data = buffer.as_slice();

        assert_eq!(&data[..4], b"BSJB");
        assert_eq!(&data[4..8], &[1, 0, 1, 0]);
        assert_eq!(&data[12..16], &12u32.to_le_bytes());
        assert_eq!(&data[16..28], b"v4.0.30319\0\0");
        // Flags 0, five streams.
        assert_eq!(&data[28..32], &[0, 0, 5, 0]);
    }

    #[test]
    fn test_stream_directory_offsets_chain() {
        let info = TableInfo::new(&[0u32; TABLE_COUNT], 0, 0, 0);
        let mut buffer = BufferWriter::new();
        write_streams(
            &mut buffer,
            &TableSet::default(),
            &info,
            &frozen_heaps(),
            GenerationKind::Full,
        )
        .unwrap();
        let data = buffer.as_slice();

        // Directory: "#~" 12, "#Strings" 20, "#US" 12, "#GUID" 16, "#Blob" 16.
        let directory_size = 12 + 20 + 12 + 16 + 16;
        let first_offset = u32::from_le_bytes(data[32..36].try_into().unwrap());
        assert_eq!(first_offset as usize, ROOT_SIZE + directory_size);
        assert_eq!(&data[40..43], b"#~\0");

        // The #Strings header follows the padded "#~" name.
        let second_offset = u32::from_le_bytes(data[44..48].try_into().unwrap());
        let tables_size = u32::from_le_bytes(data[36..40].try_into().unwrap());
        assert_eq!(second_offset, first_offset + tables_size);
        assert_eq!(&data[52..61], b"#Strings\0");
    }

    #[test]
    fn test_minimal_delta_appends_jtd_marker() {
        let info = TableInfo::new(&[0u32; TABLE_COUNT], 0, 0, 0);
        let mut buffer = BufferWriter::new();
        write_streams(
            &mut buffer,
            &TableSet::default(),
            &info,
            &frozen_heaps(),
            GenerationKind::MinimalDelta,
        )
        .unwrap();
        let data = buffer.as_slice();

        // Six streams, "#-" tables stream, "#JTD" present with size 0.
        assert_eq!(&data[28..32], &[0, 0, 6, 0]);
        assert_eq!(&data[40..43], b"#-\0");
        let jtd = data
            .windows(5)
            .position(|window| window == b"#JTD\0")
            .unwrap();
        let jtd_size = u32::from_le_bytes(data[jtd - 4..jtd].try_into().unwrap());
        assert_eq!(jtd_size, 0);
    }
}
