//! # Coded Index Encoding
//!
//! Coded indices pack a small table-selector tag and a 1-based row number into one
//! integer: the tag occupies the low bits (2-5 depending on the family) and the row
//! is shifted above it. This module defines every coded-index family of the
//! compressed metadata stream and the packing function used by table serialization.
//!
//! ## References
//!
//! - [ECMA-335 Standard](https://ecma-international.org/wp-content/uploads/ECMA-335_6th_edition_june_2012.pdf) - Section II.24.2.6

use strum::{EnumCount, EnumIter};

use crate::{metadata::tables::TableId, Result};

/// Represents all coded index families emitted into the compressed metadata stream.
///
/// Each variant corresponds to a specific set of tables that can be encoded
/// together; the position of a table within [`CodedIndexType::tables`] is its tag
/// value.
#[derive(Debug, Hash, Eq, PartialEq, Clone, Copy, EnumIter, EnumCount)]
#[repr(usize)]
pub enum CodedIndexType {
    /// References `TypeDef`, `TypeRef`, or `TypeSpec` tables.
    TypeDefOrRef,

    /// References `Field`, `Param`, or `Property` tables.
    HasConstant,

    /// References any entity that can have custom attributes attached.
    HasCustomAttribute,

    /// References `Field` or `Param` tables.
    HasFieldMarshal,

    /// References `TypeDef`, `MethodDef`, or `Assembly` tables.
    HasDeclSecurity,

    /// References `TypeDef`, `TypeRef`, `ModuleRef`, `MethodDef`, or `TypeSpec` tables.
    MemberRefParent,

    /// References `Event` or `Property` tables.
    HasSemantics,

    /// References `MethodDef` or `MemberRef` tables.
    MethodDefOrRef,

    /// References `Field` or `MethodDef` tables.
    MemberForwarded,

    /// References `File`, `AssemblyRef`, or `ExportedType` tables.
    Implementation,

    /// References `MethodDef` or `MemberRef` tables (attribute constructors).
    ///
    /// Tags 0, 1 and 4 are defined but unused by the format; this emitter only
    /// ever produces tags 2 (`MethodDef`) and 3 (`MemberRef`).
    CustomAttributeType,

    /// References `Module`, `ModuleRef`, `AssemblyRef`, or `TypeRef` tables.
    ResolutionScope,

    /// References `TypeDef` or `MethodDef` tables.
    TypeOrMethodDef,
}

impl CodedIndexType {
    /// Returns the array of table IDs that can be referenced by this coded index type.
    ///
    /// The order of tables in the returned slice corresponds to the encoded tag
    /// values (0, 1, 2, ...).
    #[must_use]
    pub fn tables(&self) -> &'static [TableId] {
        match self {
            CodedIndexType::TypeDefOrRef => {
                &[TableId::TypeDef, TableId::TypeRef, TableId::TypeSpec]
            }
            CodedIndexType::HasConstant => &[TableId::Field, TableId::Param, TableId::Property],
            CodedIndexType::HasCustomAttribute => &[
                TableId::MethodDef,
                TableId::Field,
                TableId::TypeRef,
                TableId::TypeDef,
                TableId::Param,
                TableId::InterfaceImpl,
                TableId::MemberRef,
                TableId::Module,
                TableId::DeclSecurity, // In the standard PDF, this is wrongly labeled as 'Permission' (although no such table exists)
                TableId::Property,
                TableId::Event,
                TableId::StandAloneSig,
                TableId::ModuleRef,
                TableId::TypeSpec,
                TableId::Assembly,
                TableId::AssemblyRef,
                TableId::File,
                TableId::ExportedType,
                TableId::ManifestResource,
                TableId::GenericParam,
                TableId::GenericParamConstraint,
                TableId::MethodSpec,
            ],
            CodedIndexType::HasFieldMarshal => &[TableId::Field, TableId::Param],
            CodedIndexType::HasDeclSecurity => {
                &[TableId::TypeDef, TableId::MethodDef, TableId::Assembly]
            }
            CodedIndexType::MemberRefParent => &[
                TableId::TypeDef,
                TableId::TypeRef,
                TableId::ModuleRef,
                TableId::MethodDef,
                TableId::TypeSpec,
            ],
            CodedIndexType::HasSemantics => &[TableId::Event, TableId::Property],
            CodedIndexType::MethodDefOrRef => &[TableId::MethodDef, TableId::MemberRef],
            CodedIndexType::MemberForwarded => &[TableId::Field, TableId::MethodDef],
            CodedIndexType::Implementation => {
                &[TableId::File, TableId::AssemblyRef, TableId::ExportedType]
            }
            CodedIndexType::CustomAttributeType => &[
                TableId::MethodDef,
                TableId::MethodDef,
                TableId::MethodDef,
                TableId::MemberRef,
                TableId::MemberRef,
            ],
            CodedIndexType::ResolutionScope => &[
                TableId::Module,
                TableId::ModuleRef,
                TableId::AssemblyRef,
                TableId::TypeRef,
            ],
            CodedIndexType::TypeOrMethodDef => &[TableId::TypeDef, TableId::MethodDef],
        }
    }

    /// Number of low bits occupied by the tag for this family.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn tag_bits(&self) -> u8 {
        let count = self.tables().len() as u32;
        (32 - (count - 1).leading_zeros()) as u8
    }
}

/// A coded index value ready to be written into a table row.
///
/// Packs a 1-based row (or 0 for a null reference) and a table tag into one
/// integer per the family's bit layout. The null reference of a family is tag 0
/// with row 0.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CodedIndex(pub u32);

impl CodedIndex {
    /// Encodes `(table, row)` for the given coded-index family.
    ///
    /// # Arguments
    ///
    /// * `ci_type` - The coded-index family the target field belongs to
    /// * `table` - The metadata table being referenced
    /// * `row` - The 1-based row within that table (0 encodes a null reference)
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Unexpected`] if `table` is not a member of the
    /// family — a contract violation by the table builder, not user input.
    pub fn encode(ci_type: CodedIndexType, table: TableId, row: u32) -> Result<Self> {
        let tables = ci_type.tables();
        // CustomAttributeType aliases MethodDef/MemberRef across several tags; the
        // emitted tags are the canonical 2 and 3, so search from the back half.
        let tag = match ci_type {
            CodedIndexType::CustomAttributeType => match table {
                TableId::MethodDef => 2,
                TableId::MemberRef => 3,
                _ => {
                    return Err(unexpected_error!(
                        "Table {:?} is not valid for CustomAttributeType",
                        table
                    ))
                }
            },
            _ => tables
                .iter()
                .position(|candidate| *candidate == table)
                .ok_or_else(|| {
                    unexpected_error!("Table {:?} is not valid for {:?}", table, ci_type)
                })? as u32,
        };

        Ok(CodedIndex((row << ci_type.tag_bits()) | tag))
    }

    /// The null coded index (tag 0, row 0).
    #[must_use]
    pub fn null() -> Self {
        CodedIndex(0)
    }
}
