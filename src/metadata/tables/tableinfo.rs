//! Row counts and index width selection for table serialization.
//!
//! Plain table indices, coded indices and heap indices are 2 bytes in small images
//! and 4 bytes in large ones. The decision is global and made exactly once, after
//! every row count and heap size is final; [`TableInfo`] is the frozen result every
//! row serializer consults.

use strum::{EnumCount, IntoEnumIterator};

use crate::metadata::tables::{CodedIndexType, TableId};

/// Number of distinct table ids (0x00..=0x2C).
pub const TABLE_COUNT: usize = TableId::GenericParamConstraint as usize + 1;

/// Holds information about the size that reference index fields have
#[derive(Clone, Copy, Default, PartialEq, Debug)]
pub struct TableRowInfo {
    /// The count of rows in this table
    pub rows: u32,
    /// If the count is > `u16::MAX`, the indexes of other tables into this table will be 4 bytes instead of 2
    pub is_large: bool,
}

impl TableRowInfo {
    /// Creates a new `TableRowInfo` instance with the given row count.
    #[must_use]
    pub fn new(rows: u32) -> Self {
        Self {
            rows,
            is_large: rows > u32::from(u16::MAX),
        }
    }
}

/// `TableInfo` holds the final row counts and index field widths of one generation.
///
/// Built by the table builder once all rows are populated and the heaps are frozen;
/// after that point it is immutable and shared by every row serializer.
#[derive(Clone)]
pub struct TableInfo {
    rows: Vec<TableRowInfo>,
    coded_index_bits: Vec<u8>,
    is_large_index_str: bool,
    is_large_index_guid: bool,
    is_large_index_blob: bool,
}

impl TableInfo {
    /// Builds a new `TableInfo` from final row counts and heap sizes.
    ///
    /// # Arguments
    ///
    /// * `row_counts` - Row count per table, indexed by [`TableId`] discriminant
    /// * `string_heap_size` - Final byte size of the #Strings heap
    /// * `guid_heap_size` - Final byte size of the #GUID heap
    /// * `blob_heap_size` - Final byte size of the #Blob heap
    #[must_use]
    pub fn new(
        row_counts: &[u32; TABLE_COUNT],
        string_heap_size: usize,
        guid_heap_size: usize,
        blob_heap_size: usize,
    ) -> Self {
        let rows = row_counts
            .iter()
            .map(|count| TableRowInfo::new(*count))
            .collect();

        let mut info = TableInfo {
            rows,
            coded_index_bits: vec![0; CodedIndexType::COUNT],
            is_large_index_str: string_heap_size > u16::MAX as usize,
            is_large_index_guid: guid_heap_size / 16 > u16::MAX as usize,
            is_large_index_blob: blob_heap_size > u16::MAX as usize,
        };

        for ci_type in CodedIndexType::iter() {
            let tag_bits = ci_type.tag_bits();
            let max_rows = ci_type
                .tables()
                .iter()
                .map(|table| info.rows[*table as usize].rows)
                .max()
                .unwrap_or(0);

            // 2 bytes iff every referenced table's row count fits 16 - tag bits.
            let fits_small = max_rows < (1u32 << (16 - tag_bits));
            info.coded_index_bits[ci_type as usize] = if fits_small {
                16
            } else {
                32
            };
        }

        info
    }

    /// Row count of the given table.
    #[must_use]
    pub fn rows(&self, table: TableId) -> u32 {
        self.rows[table as usize].rows
    }

    /// Whether plain indices into the given table are 4 bytes wide.
    #[must_use]
    pub fn is_large(&self, table: TableId) -> bool {
        self.rows[table as usize].is_large
    }

    /// Byte width (2 or 4) of plain indices into the given table.
    #[must_use]
    pub fn table_index_size(&self, table: TableId) -> u32 {
        if self.is_large(table) {
            4
        } else {
            2
        }
    }

    /// Whether coded indices of the given family are 4 bytes wide.
    #[must_use]
    pub fn is_coded_index_large(&self, ci_type: CodedIndexType) -> bool {
        self.coded_index_bits[ci_type as usize] > 16
    }

    /// Byte width (2 or 4) of coded indices of the given family.
    #[must_use]
    pub fn coded_index_size(&self, ci_type: CodedIndexType) -> u32 {
        if self.is_coded_index_large(ci_type) {
            4
        } else {
            2
        }
    }

    /// Whether #Strings heap indices are 4 bytes wide.
    #[must_use]
    pub fn is_large_str(&self) -> bool {
        self.is_large_index_str
    }

    /// Whether #GUID heap indices are 4 bytes wide.
    #[must_use]
    pub fn is_large_guid(&self) -> bool {
        self.is_large_index_guid
    }

    /// Whether #Blob heap indices are 4 bytes wide.
    #[must_use]
    pub fn is_large_blob(&self) -> bool {
        self.is_large_index_blob
    }

    /// Byte width (2 or 4) of #Strings heap indices.
    #[must_use]
    pub fn str_index_size(&self) -> u32 {
        if self.is_large_index_str {
            4
        } else {
            2
        }
    }

    /// Byte width (2 or 4) of #GUID heap indices.
    #[must_use]
    pub fn guid_index_size(&self) -> u32 {
        if self.is_large_index_guid {
            4
        } else {
            2
        }
    }

    /// Byte width (2 or 4) of #Blob heap indices.
    #[must_use]
    pub fn blob_index_size(&self) -> u32 {
        if self.is_large_index_blob {
            4
        } else {
            2
        }
    }

    /// The heap-size flags byte of the tables-stream header.
    ///
    /// Bit 0x01 marks large #Strings indices, 0x02 large #GUID, 0x04 large #Blob.
    #[must_use]
    pub fn heap_size_flags(&self) -> u8 {
        let mut flags = 0;
        if self.is_large_index_str {
            flags |= 0x01;
        }
        if self.is_large_index_guid {
            flags |= 0x02;
        }
        if self.is_large_index_blob {
            flags |= 0x04;
        }
        flags
    }

    /// Bitmask of tables with at least one row.
    #[must_use]
    pub fn valid_mask(&self) -> u64 {
        let mut mask = 0u64;
        for table in TableId::iter() {
            if self.rows(table) > 0 {
                mask |= 1 << table.token_tag();
            }
        }
        mask
    }

    /// Bitmask of tables the format requires to be sorted.
    ///
    /// Derived from [`TableId::is_sorted`]; the bit pattern is pinned against the
    /// canonical constant by a unit test.
    #[must_use]
    pub fn sorted_mask(&self) -> u64 {
        let mut mask = 0u64;
        for table in TableId::iter() {
            if table.is_sorted() {
                mask |= 1 << table.token_tag();
            }
        }
        mask
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn counts(pairs: &[(TableId, u32)]) -> [u32; TABLE_COUNT] {
        let mut row_counts = [0u32; TABLE_COUNT];
        for (table, count) in pairs {
            row_counts[*table as usize] = *count;
        }
        row_counts
    }

    #[test]
    fn test_small_image_widths() {
        let info = TableInfo::new(
            &counts(&[(TableId::TypeDef, 10), (TableId::MethodDef, 100)]),
            100,
            32,
            100,
        );

        assert!(!info.is_large(TableId::TypeDef));
        assert_eq!(info.table_index_size(TableId::MethodDef), 2);
        assert_eq!(info.coded_index_size(CodedIndexType::TypeDefOrRef), 2);
        assert_eq!(info.heap_size_flags(), 0);
    }

    #[test]
    fn test_coded_index_width_accounts_for_tag_bits() {
        // TypeDefOrRef has 2 tag bits: 2 bytes iff max rows < 2^14.
        let info = TableInfo::new(&counts(&[(TableId::TypeDef, (1 << 14) - 1)]), 0, 0, 0);
        assert_eq!(info.coded_index_size(CodedIndexType::TypeDefOrRef), 2);

        let info = TableInfo::new(&counts(&[(TableId::TypeDef, 1 << 14)]), 0, 0, 0);
        assert_eq!(info.coded_index_size(CodedIndexType::TypeDefOrRef), 4);

        // Plain indices into the same table stay 2 bytes until 2^16.
        assert_eq!(info.table_index_size(TableId::TypeDef), 2);
    }

    #[test]
    fn test_width_follows_any_family_member() {
        // A single large table widens every family containing it.
        let info = TableInfo::new(&counts(&[(TableId::Param, 1 << 15)]), 0, 0, 0);
        assert_eq!(info.coded_index_size(CodedIndexType::HasConstant), 4);
        assert_eq!(info.coded_index_size(CodedIndexType::HasFieldMarshal), 4);
        assert_eq!(info.coded_index_size(CodedIndexType::TypeDefOrRef), 2);
    }

    #[test]
    fn test_heap_size_flags() {
        let info = TableInfo::new(&counts(&[]), 0x1_0000, 16 * 0x1_0001, 0x1_0000);
        assert_eq!(info.heap_size_flags(), 0x07);
        assert_eq!(info.str_index_size(), 4);
        assert_eq!(info.guid_index_size(), 4);
        assert_eq!(info.blob_index_size(), 4);
    }

    #[test]
    fn test_valid_mask() {
        let info = TableInfo::new(
            &counts(&[(TableId::Module, 1), (TableId::TypeDef, 2)]),
            0,
            0,
            0,
        );
        assert_eq!(info.valid_mask(), (1 << 0x00) | (1 << 0x02));
    }
}
