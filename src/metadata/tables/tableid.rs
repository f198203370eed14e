//! # Metadata Table Identifiers
//!
//! This module defines the [`TableId`] enumeration covering every table of the
//! compressed metadata stream, together with the token tag and valid/sorted bitmask
//! positions derived from it.
//!
//! ## References
//!
//! - [ECMA-335 Standard](https://ecma-international.org/wp-content/uploads/ECMA-335_6th_edition_june_2012.pdf) - Partition II, Section 22

use strum::{EnumCount, EnumIter};

/// Identifies one metadata table.
///
/// The discriminant is simultaneously the token tag (high byte of metadata tokens
/// referencing the table) and the bit position of the table in the tables-stream
/// valid and sorted masks.
#[derive(Debug, Hash, Eq, PartialEq, Clone, Copy, PartialOrd, Ord, EnumIter, EnumCount)]
#[repr(u8)]
pub enum TableId {
    /// Module definition table (exactly one row)
    Module = 0x00,
    /// References to types defined in other modules
    TypeRef = 0x01,
    /// Type definitions of this module
    TypeDef = 0x02,
    /// Field pointer indirection (uncompressed streams only)
    FieldPtr = 0x03,
    /// Field definitions
    Field = 0x04,
    /// Method pointer indirection (uncompressed streams only)
    MethodPtr = 0x05,
    /// Method definitions
    MethodDef = 0x06,
    /// Param pointer indirection (uncompressed streams only)
    ParamPtr = 0x07,
    /// Parameter definitions
    Param = 0x08,
    /// Interface implementations per type
    InterfaceImpl = 0x09,
    /// References to members of other types/modules
    MemberRef = 0x0A,
    /// Compile-time constant values for fields, params and properties
    Constant = 0x0B,
    /// Custom attribute applications
    CustomAttribute = 0x0C,
    /// Marshalling descriptors for fields and parameters
    FieldMarshal = 0x0D,
    /// Declarative security attributes
    DeclSecurity = 0x0E,
    /// Explicit class packing and size
    ClassLayout = 0x0F,
    /// Explicit field offsets
    FieldLayout = 0x10,
    /// Stand-alone signatures (locals, calli)
    StandAloneSig = 0x11,
    /// First event per type
    EventMap = 0x12,
    /// Event pointer indirection (uncompressed streams only)
    EventPtr = 0x13,
    /// Event definitions
    Event = 0x14,
    /// First property per type
    PropertyMap = 0x15,
    /// Property pointer indirection (uncompressed streams only)
    PropertyPtr = 0x16,
    /// Property definitions
    Property = 0x17,
    /// Association of getter/setter/other methods with events and properties
    MethodSemantics = 0x18,
    /// Explicit method overrides
    MethodImpl = 0x19,
    /// References to other modules of this assembly
    ModuleRef = 0x1A,
    /// Type specifications (instantiated/constructed types)
    TypeSpec = 0x1B,
    /// P/Invoke mappings
    ImplMap = 0x1C,
    /// Field data RVAs
    FieldRva = 0x1D,
    /// Edit-and-continue log (delta generations)
    EncLog = 0x1E,
    /// Edit-and-continue token map (delta generations)
    EncMap = 0x1F,
    /// Assembly manifest (at most one row)
    Assembly = 0x20,
    /// Assembly processor (unused, kept for mask completeness)
    AssemblyProcessor = 0x21,
    /// Assembly OS (unused, kept for mask completeness)
    AssemblyOs = 0x22,
    /// References to other assemblies
    AssemblyRef = 0x23,
    /// Assembly ref processor (unused)
    AssemblyRefProcessor = 0x24,
    /// Assembly ref OS (unused)
    AssemblyRefOs = 0x25,
    /// Files of a multi-module assembly
    File = 0x26,
    /// Types exported from other modules/assemblies
    ExportedType = 0x27,
    /// Manifest resources
    ManifestResource = 0x28,
    /// Nesting relation between types
    NestedClass = 0x29,
    /// Generic parameter definitions
    GenericParam = 0x2A,
    /// Generic method instantiations
    MethodSpec = 0x2B,
    /// Constraints on generic parameters
    GenericParamConstraint = 0x2C,
}

impl TableId {
    /// The token tag (high byte of metadata tokens) for this table.
    #[must_use]
    pub fn token_tag(self) -> u8 {
        self as u8
    }

    /// Whether the format requires this table to be sorted by its key column.
    ///
    /// The sorted-tables bitmask of the tables-stream header is derived from this
    /// predicate rather than hard-coded; the resulting pattern is pinned by a unit
    /// test against the canonical value so output stays compatible.
    #[must_use]
    pub fn is_sorted(self) -> bool {
        matches!(
            self,
            TableId::InterfaceImpl
                | TableId::Constant
                | TableId::CustomAttribute
                | TableId::FieldMarshal
                | TableId::DeclSecurity
                | TableId::ClassLayout
                | TableId::FieldLayout
                | TableId::MethodSemantics
                | TableId::MethodImpl
                | TableId::ImplMap
                | TableId::FieldRva
                | TableId::NestedClass
                | TableId::GenericParam
                | TableId::GenericParamConstraint
        )
    }
}
