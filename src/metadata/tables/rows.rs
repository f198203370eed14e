//! # Table Row Serialization
//!
//! One plain struct per emitted table, holding fully resolved values: heap
//! offsets, coded indices and row numbers, never object-model handles. Each row
//! implements [`RowWritable`] and serializes itself against the frozen
//! [`TableInfo`] widths. Columns appear in the order the format prescribes.

use crate::file::BufferWriter;
use crate::metadata::tables::{CodedIndex, CodedIndexType, TableId, TableInfo};

/// Serialization of one table row against frozen index widths.
pub trait RowWritable {
    /// Appends this row's columns to `buffer` using the widths in `info`.
    fn write_row(&self, buffer: &mut BufferWriter, info: &TableInfo);
}

fn write_str(buffer: &mut BufferWriter, info: &TableInfo, offset: u32) {
    buffer.write_dyn(offset, info.is_large_str());
}

fn write_guid(buffer: &mut BufferWriter, info: &TableInfo, index: u32) {
    buffer.write_dyn(index, info.is_large_guid());
}

fn write_blob(buffer: &mut BufferWriter, info: &TableInfo, offset: u32) {
    buffer.write_dyn(offset, info.is_large_blob());
}

fn write_index(buffer: &mut BufferWriter, info: &TableInfo, table: TableId, row: u32) {
    buffer.write_dyn(row, info.is_large(table));
}

fn write_coded(
    buffer: &mut BufferWriter,
    info: &TableInfo,
    ci_type: CodedIndexType,
    value: CodedIndex,
) {
    buffer.write_dyn(value.0, info.is_coded_index_large(ci_type));
}

/// Module table row (0x00).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleRow {
    /// Generation number; 0 for a baseline, incremented per delta
    pub generation: u16,
    /// Module name (#Strings)
    pub name: u32,
    /// Module version id (#GUID, 1-based)
    pub mvid: u32,
    /// Edit-and-continue id (#GUID); 0 for baselines
    pub enc_id: u32,
    /// Edit-and-continue base id (#GUID); 0 for baselines
    pub enc_base_id: u32,
}

impl RowWritable for ModuleRow {
    fn write_row(&self, buffer: &mut BufferWriter, info: &TableInfo) {
        buffer.write_u16(self.generation);
        write_str(buffer, info, self.name);
        write_guid(buffer, info, self.mvid);
        write_guid(buffer, info, self.enc_id);
        write_guid(buffer, info, self.enc_base_id);
    }
}

/// TypeRef table row (0x01).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeRefRow {
    /// Where the type is defined (ResolutionScope coded index)
    pub resolution_scope: CodedIndex,
    /// Type name (#Strings)
    pub name: u32,
    /// Type namespace (#Strings)
    pub namespace: u32,
}

impl RowWritable for TypeRefRow {
    fn write_row(&self, buffer: &mut BufferWriter, info: &TableInfo) {
        write_coded(
            buffer,
            info,
            CodedIndexType::ResolutionScope,
            self.resolution_scope,
        );
        write_str(buffer, info, self.name);
        write_str(buffer, info, self.namespace);
    }
}

/// TypeDef table row (0x02).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeDefRow {
    /// Type attributes bitmask
    pub flags: u32,
    /// Type name (#Strings)
    pub name: u32,
    /// Type namespace (#Strings)
    pub namespace: u32,
    /// Base type (TypeDefOrRef coded index, null for interfaces/`Object`)
    pub extends: CodedIndex,
    /// First owned row in the Field table (1-based, run ends at next type's start)
    pub field_list: u32,
    /// First owned row in the MethodDef table
    pub method_list: u32,
}

impl RowWritable for TypeDefRow {
    fn write_row(&self, buffer: &mut BufferWriter, info: &TableInfo) {
        buffer.write_u32(self.flags);
        write_str(buffer, info, self.name);
        write_str(buffer, info, self.namespace);
        write_coded(buffer, info, CodedIndexType::TypeDefOrRef, self.extends);
        write_index(buffer, info, TableId::Field, self.field_list);
        write_index(buffer, info, TableId::MethodDef, self.method_list);
    }
}

/// Field table row (0x04).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldRow {
    /// Field attributes bitmask
    pub flags: u16,
    /// Field name (#Strings)
    pub name: u32,
    /// Field signature (#Blob)
    pub signature: u32,
}

impl RowWritable for FieldRow {
    fn write_row(&self, buffer: &mut BufferWriter, info: &TableInfo) {
        buffer.write_u16(self.flags);
        write_str(buffer, info, self.name);
        write_blob(buffer, info, self.signature);
    }
}

/// MethodDef table row (0x06).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodDefRow {
    /// Relative virtual address of the method body; 0 for abstract/extern
    pub rva: u32,
    /// Implementation attributes bitmask
    pub impl_flags: u16,
    /// Method attributes bitmask
    pub flags: u16,
    /// Method name (#Strings)
    pub name: u32,
    /// Method signature (#Blob)
    pub signature: u32,
    /// First owned row in the Param table
    pub param_list: u32,
}

impl RowWritable for MethodDefRow {
    fn write_row(&self, buffer: &mut BufferWriter, info: &TableInfo) {
        buffer.write_u32(self.rva);
        buffer.write_u16(self.impl_flags);
        buffer.write_u16(self.flags);
        write_str(buffer, info, self.name);
        write_blob(buffer, info, self.signature);
        write_index(buffer, info, TableId::Param, self.param_list);
    }
}

/// Param table row (0x08).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParamRow {
    /// Parameter attributes bitmask
    pub flags: u16,
    /// 1-based position; 0 for the return value
    pub sequence: u16,
    /// Parameter name (#Strings)
    pub name: u32,
}

impl RowWritable for ParamRow {
    fn write_row(&self, buffer: &mut BufferWriter, info: &TableInfo) {
        buffer.write_u16(self.flags);
        buffer.write_u16(self.sequence);
        write_str(buffer, info, self.name);
    }
}

/// InterfaceImpl table row (0x09).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterfaceImplRow {
    /// Implementing type (TypeDef row)
    pub class: u32,
    /// Implemented interface (TypeDefOrRef coded index)
    pub interface: CodedIndex,
}

impl RowWritable for InterfaceImplRow {
    fn write_row(&self, buffer: &mut BufferWriter, info: &TableInfo) {
        write_index(buffer, info, TableId::TypeDef, self.class);
        write_coded(buffer, info, CodedIndexType::TypeDefOrRef, self.interface);
    }
}

/// MemberRef table row (0x0A).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemberRefRow {
    /// Declaring scope (MemberRefParent coded index)
    pub class: CodedIndex,
    /// Member name (#Strings)
    pub name: u32,
    /// Member signature (#Blob)
    pub signature: u32,
}

impl RowWritable for MemberRefRow {
    fn write_row(&self, buffer: &mut BufferWriter, info: &TableInfo) {
        write_coded(buffer, info, CodedIndexType::MemberRefParent, self.class);
        write_str(buffer, info, self.name);
        write_blob(buffer, info, self.signature);
    }
}

/// Constant table row (0x0B).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConstantRow {
    /// Element type of the constant value
    pub type_code: u8,
    /// Owner of the constant (HasConstant coded index)
    pub parent: CodedIndex,
    /// Constant value (#Blob)
    pub value: u32,
}

impl RowWritable for ConstantRow {
    fn write_row(&self, buffer: &mut BufferWriter, info: &TableInfo) {
        buffer.write_u8(self.type_code);
        buffer.write_u8(0); // reserved padding byte
        write_coded(buffer, info, CodedIndexType::HasConstant, self.parent);
        write_blob(buffer, info, self.value);
    }
}

/// CustomAttribute table row (0x0C).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CustomAttributeRow {
    /// Attributed entity (HasCustomAttribute coded index)
    pub parent: CodedIndex,
    /// Attribute constructor (CustomAttributeType coded index)
    pub constructor: CodedIndex,
    /// Serialized attribute arguments (#Blob)
    pub value: u32,
}

impl RowWritable for CustomAttributeRow {
    fn write_row(&self, buffer: &mut BufferWriter, info: &TableInfo) {
        write_coded(buffer, info, CodedIndexType::HasCustomAttribute, self.parent);
        write_coded(
            buffer,
            info,
            CodedIndexType::CustomAttributeType,
            self.constructor,
        );
        write_blob(buffer, info, self.value);
    }
}

/// FieldMarshal table row (0x0D).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldMarshalRow {
    /// Marshalled field or parameter (HasFieldMarshal coded index)
    pub parent: CodedIndex,
    /// Native type descriptor (#Blob)
    pub native_type: u32,
}

impl RowWritable for FieldMarshalRow {
    fn write_row(&self, buffer: &mut BufferWriter, info: &TableInfo) {
        write_coded(buffer, info, CodedIndexType::HasFieldMarshal, self.parent);
        write_blob(buffer, info, self.native_type);
    }
}

/// DeclSecurity table row (0x0E).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeclSecurityRow {
    /// Security action code
    pub action: u16,
    /// Secured entity (HasDeclSecurity coded index)
    pub parent: CodedIndex,
    /// Permission set (#Blob)
    pub permission_set: u32,
}

impl RowWritable for DeclSecurityRow {
    fn write_row(&self, buffer: &mut BufferWriter, info: &TableInfo) {
        buffer.write_u16(self.action);
        write_coded(buffer, info, CodedIndexType::HasDeclSecurity, self.parent);
        write_blob(buffer, info, self.permission_set);
    }
}

/// ClassLayout table row (0x0F).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassLayoutRow {
    /// Field packing alignment
    pub packing_size: u16,
    /// Explicit type byte size; 0 when unspecified
    pub class_size: u32,
    /// Laid-out type (TypeDef row)
    pub parent: u32,
}

impl RowWritable for ClassLayoutRow {
    fn write_row(&self, buffer: &mut BufferWriter, info: &TableInfo) {
        buffer.write_u16(self.packing_size);
        buffer.write_u32(self.class_size);
        write_index(buffer, info, TableId::TypeDef, self.parent);
    }
}

/// FieldLayout table row (0x10).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldLayoutRow {
    /// Byte offset of the field within its type
    pub offset: u32,
    /// Laid-out field (Field row)
    pub field: u32,
}

impl RowWritable for FieldLayoutRow {
    fn write_row(&self, buffer: &mut BufferWriter, info: &TableInfo) {
        buffer.write_u32(self.offset);
        write_index(buffer, info, TableId::Field, self.field);
    }
}

/// StandAloneSig table row (0x11).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StandAloneSigRow {
    /// Local-variable or stand-alone method signature (#Blob)
    pub signature: u32,
}

impl RowWritable for StandAloneSigRow {
    fn write_row(&self, buffer: &mut BufferWriter, info: &TableInfo) {
        write_blob(buffer, info, self.signature);
    }
}

/// EventMap table row (0x12).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventMapRow {
    /// Owning type (TypeDef row)
    pub parent: u32,
    /// First owned row in the Event table
    pub event_list: u32,
}

impl RowWritable for EventMapRow {
    fn write_row(&self, buffer: &mut BufferWriter, info: &TableInfo) {
        write_index(buffer, info, TableId::TypeDef, self.parent);
        write_index(buffer, info, TableId::Event, self.event_list);
    }
}

/// Event table row (0x14).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventRow {
    /// Event attributes bitmask
    pub flags: u16,
    /// Event name (#Strings)
    pub name: u32,
    /// Delegate type of the event (TypeDefOrRef coded index)
    pub event_type: CodedIndex,
}

impl RowWritable for EventRow {
    fn write_row(&self, buffer: &mut BufferWriter, info: &TableInfo) {
        buffer.write_u16(self.flags);
        write_str(buffer, info, self.name);
        write_coded(buffer, info, CodedIndexType::TypeDefOrRef, self.event_type);
    }
}

/// PropertyMap table row (0x15).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertyMapRow {
    /// Owning type (TypeDef row)
    pub parent: u32,
    /// First owned row in the Property table
    pub property_list: u32,
}

impl RowWritable for PropertyMapRow {
    fn write_row(&self, buffer: &mut BufferWriter, info: &TableInfo) {
        write_index(buffer, info, TableId::TypeDef, self.parent);
        write_index(buffer, info, TableId::Property, self.property_list);
    }
}

/// Property table row (0x17).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertyRow {
    /// Property attributes bitmask
    pub flags: u16,
    /// Property name (#Strings)
    pub name: u32,
    /// Property signature (#Blob)
    pub signature: u32,
}

impl RowWritable for PropertyRow {
    fn write_row(&self, buffer: &mut BufferWriter, info: &TableInfo) {
        buffer.write_u16(self.flags);
        write_str(buffer, info, self.name);
        write_blob(buffer, info, self.signature);
    }
}

/// MethodSemantics table row (0x18).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodSemanticsRow {
    /// Role bitmask (getter, setter, adder, remover, raiser, other)
    pub semantics: u16,
    /// Accessor method (MethodDef row)
    pub method: u32,
    /// Owning event or property (HasSemantics coded index)
    pub association: CodedIndex,
}

impl RowWritable for MethodSemanticsRow {
    fn write_row(&self, buffer: &mut BufferWriter, info: &TableInfo) {
        buffer.write_u16(self.semantics);
        write_index(buffer, info, TableId::MethodDef, self.method);
        write_coded(buffer, info, CodedIndexType::HasSemantics, self.association);
    }
}

/// MethodImpl table row (0x19).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodImplRow {
    /// Type providing the override (TypeDef row)
    pub class: u32,
    /// Implementing method (MethodDefOrRef coded index)
    pub method_body: CodedIndex,
    /// Overridden declaration (MethodDefOrRef coded index)
    pub method_declaration: CodedIndex,
}

impl RowWritable for MethodImplRow {
    fn write_row(&self, buffer: &mut BufferWriter, info: &TableInfo) {
        write_index(buffer, info, TableId::TypeDef, self.class);
        write_coded(buffer, info, CodedIndexType::MethodDefOrRef, self.method_body);
        write_coded(
            buffer,
            info,
            CodedIndexType::MethodDefOrRef,
            self.method_declaration,
        );
    }
}

/// ModuleRef table row (0x1A).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleRefRow {
    /// Referenced module name (#Strings)
    pub name: u32,
}

impl RowWritable for ModuleRefRow {
    fn write_row(&self, buffer: &mut BufferWriter, info: &TableInfo) {
        write_str(buffer, info, self.name);
    }
}

/// TypeSpec table row (0x1B).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeSpecRow {
    /// Type signature (#Blob)
    pub signature: u32,
}

impl RowWritable for TypeSpecRow {
    fn write_row(&self, buffer: &mut BufferWriter, info: &TableInfo) {
        write_blob(buffer, info, self.signature);
    }
}

/// ImplMap table row (0x1C).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImplMapRow {
    /// P/Invoke attributes bitmask
    pub flags: u16,
    /// Forwarded method (MemberForwarded coded index)
    pub member_forwarded: CodedIndex,
    /// Entry point name in the target module (#Strings)
    pub import_name: u32,
    /// Target module (ModuleRef row)
    pub import_scope: u32,
}

impl RowWritable for ImplMapRow {
    fn write_row(&self, buffer: &mut BufferWriter, info: &TableInfo) {
        buffer.write_u16(self.flags);
        write_coded(
            buffer,
            info,
            CodedIndexType::MemberForwarded,
            self.member_forwarded,
        );
        write_str(buffer, info, self.import_name);
        write_index(buffer, info, TableId::ModuleRef, self.import_scope);
    }
}

/// FieldRva table row (0x1D).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldRvaRow {
    /// Relative virtual address of the mapped data
    pub rva: u32,
    /// Mapped field (Field row)
    pub field: u32,
}

impl RowWritable for FieldRvaRow {
    fn write_row(&self, buffer: &mut BufferWriter, info: &TableInfo) {
        buffer.write_u32(self.rva);
        write_index(buffer, info, TableId::Field, self.field);
    }
}

/// EncLog table row (0x1E), delta generations only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncLogRow {
    /// Token of the changed row
    pub token: u32,
    /// Edit operation code
    pub func_code: u32,
}

impl RowWritable for EncLogRow {
    fn write_row(&self, buffer: &mut BufferWriter, _info: &TableInfo) {
        buffer.write_u32(self.token);
        buffer.write_u32(self.func_code);
    }
}

/// EncMap table row (0x1F), delta generations only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncMapRow {
    /// Token present in this delta
    pub token: u32,
}

impl RowWritable for EncMapRow {
    fn write_row(&self, buffer: &mut BufferWriter, _info: &TableInfo) {
        buffer.write_u32(self.token);
    }
}

/// Assembly table row (0x20).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssemblyRow {
    /// Hash algorithm id (0x8004 = SHA-1)
    pub hash_algorithm: u32,
    /// Major version
    pub major_version: u16,
    /// Minor version
    pub minor_version: u16,
    /// Build number
    pub build_number: u16,
    /// Revision number
    pub revision_number: u16,
    /// Assembly attributes bitmask
    pub flags: u32,
    /// Full public key (#Blob); 0 when unsigned
    pub public_key: u32,
    /// Simple assembly name (#Strings)
    pub name: u32,
    /// Culture name (#Strings); 0 for neutral
    pub culture: u32,
}

impl RowWritable for AssemblyRow {
    fn write_row(&self, buffer: &mut BufferWriter, info: &TableInfo) {
        buffer.write_u32(self.hash_algorithm);
        buffer.write_u16(self.major_version);
        buffer.write_u16(self.minor_version);
        buffer.write_u16(self.build_number);
        buffer.write_u16(self.revision_number);
        buffer.write_u32(self.flags);
        write_blob(buffer, info, self.public_key);
        write_str(buffer, info, self.name);
        write_str(buffer, info, self.culture);
    }
}

/// AssemblyRef table row (0x23).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssemblyRefRow {
    /// Major version
    pub major_version: u16,
    /// Minor version
    pub minor_version: u16,
    /// Build number
    pub build_number: u16,
    /// Revision number
    pub revision_number: u16,
    /// Assembly attributes bitmask
    pub flags: u32,
    /// Public key or its 8-byte token (#Blob)
    pub public_key_or_token: u32,
    /// Simple assembly name (#Strings)
    pub name: u32,
    /// Culture name (#Strings); 0 for neutral
    pub culture: u32,
    /// Hash of the referenced assembly (#Blob); usually 0
    pub hash_value: u32,
}

impl RowWritable for AssemblyRefRow {
    fn write_row(&self, buffer: &mut BufferWriter, info: &TableInfo) {
        buffer.write_u16(self.major_version);
        buffer.write_u16(self.minor_version);
        buffer.write_u16(self.build_number);
        buffer.write_u16(self.revision_number);
        buffer.write_u32(self.flags);
        write_blob(buffer, info, self.public_key_or_token);
        write_str(buffer, info, self.name);
        write_str(buffer, info, self.culture);
        write_blob(buffer, info, self.hash_value);
    }
}

/// File table row (0x26).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileRow {
    /// File attributes (0 = contains metadata, 1 = resource only)
    pub flags: u32,
    /// File name (#Strings)
    pub name: u32,
    /// Hash of the file contents (#Blob)
    pub hash_value: u32,
}

impl RowWritable for FileRow {
    fn write_row(&self, buffer: &mut BufferWriter, info: &TableInfo) {
        buffer.write_u32(self.flags);
        write_str(buffer, info, self.name);
        write_blob(buffer, info, self.hash_value);
    }
}

/// ExportedType table row (0x27).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportedTypeRow {
    /// Type attributes bitmask, including the forwarder bit
    pub flags: u32,
    /// TypeDef token hint in the target module; 0 when unknown
    pub type_def_id: u32,
    /// Type name (#Strings)
    pub name: u32,
    /// Type namespace (#Strings)
    pub namespace: u32,
    /// Target scope or enclosing exported type (Implementation coded index)
    pub implementation: CodedIndex,
}

impl RowWritable for ExportedTypeRow {
    fn write_row(&self, buffer: &mut BufferWriter, info: &TableInfo) {
        buffer.write_u32(self.flags);
        buffer.write_u32(self.type_def_id);
        write_str(buffer, info, self.name);
        write_str(buffer, info, self.namespace);
        write_coded(
            buffer,
            info,
            CodedIndexType::Implementation,
            self.implementation,
        );
    }
}

/// ManifestResource table row (0x28).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestResourceRow {
    /// Byte offset within the resource data block
    pub offset: u32,
    /// Visibility bitmask (1 public, 2 private)
    pub flags: u32,
    /// Resource name (#Strings)
    pub name: u32,
    /// External location (Implementation coded index); null for embedded
    pub implementation: CodedIndex,
}

impl RowWritable for ManifestResourceRow {
    fn write_row(&self, buffer: &mut BufferWriter, info: &TableInfo) {
        buffer.write_u32(self.offset);
        buffer.write_u32(self.flags);
        write_str(buffer, info, self.name);
        write_coded(
            buffer,
            info,
            CodedIndexType::Implementation,
            self.implementation,
        );
    }
}

/// NestedClass table row (0x29).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NestedClassRow {
    /// Nested type (TypeDef row)
    pub nested_class: u32,
    /// Enclosing type (TypeDef row)
    pub enclosing_class: u32,
}

impl RowWritable for NestedClassRow {
    fn write_row(&self, buffer: &mut BufferWriter, info: &TableInfo) {
        write_index(buffer, info, TableId::TypeDef, self.nested_class);
        write_index(buffer, info, TableId::TypeDef, self.enclosing_class);
    }
}

/// GenericParam table row (0x2A).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenericParamRow {
    /// 0-based position within the owner's parameter list
    pub number: u16,
    /// Variance and constraint attributes bitmask
    pub flags: u16,
    /// Owning type or method (TypeOrMethodDef coded index)
    pub owner: CodedIndex,
    /// Parameter name (#Strings)
    pub name: u32,
}

impl RowWritable for GenericParamRow {
    fn write_row(&self, buffer: &mut BufferWriter, info: &TableInfo) {
        buffer.write_u16(self.number);
        buffer.write_u16(self.flags);
        write_coded(buffer, info, CodedIndexType::TypeOrMethodDef, self.owner);
        write_str(buffer, info, self.name);
    }
}

/// MethodSpec table row (0x2B).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodSpecRow {
    /// Instantiated generic method (MethodDefOrRef coded index)
    pub method: CodedIndex,
    /// Instantiation signature (#Blob)
    pub instantiation: u32,
}

impl RowWritable for MethodSpecRow {
    fn write_row(&self, buffer: &mut BufferWriter, info: &TableInfo) {
        write_coded(buffer, info, CodedIndexType::MethodDefOrRef, self.method);
        write_blob(buffer, info, self.instantiation);
    }
}

/// GenericParamConstraint table row (0x2C).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenericParamConstraintRow {
    /// Constrained parameter (GenericParam row)
    pub owner: u32,
    /// Constraint type (TypeDefOrRef coded index)
    pub constraint: CodedIndex,
}

impl RowWritable for GenericParamConstraintRow {
    fn write_row(&self, buffer: &mut BufferWriter, info: &TableInfo) {
        write_index(buffer, info, TableId::GenericParam, self.owner);
        write_coded(buffer, info, CodedIndexType::TypeDefOrRef, self.constraint);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::tables::TABLE_COUNT;

    fn small_info() -> TableInfo {
        TableInfo::new(&[10; TABLE_COUNT], 100, 32, 100)
    }

    #[test]
    fn test_module_row_small_widths() {
        let row = ModuleRow {
            generation: 0,
            name: 0x0001,
            mvid: 1,
            enc_id: 0,
            enc_base_id: 0,
        };
        let mut buffer = BufferWriter::new();
        row.write_row(&mut buffer, &small_info());
        // u16 generation + 2-byte string index + three 2-byte guid indices
        assert_eq!(
            buffer.as_slice(),
            &[0x00, 0x00, 0x01, 0x00, 0x01, 0x00, 0x00, 0x00, 0x00, 0x00]
        );
    }

    #[test]
    fn test_typedef_row_widths_follow_info() {
        let row = TypeDefRow {
            flags: 0x0010_0001,
            name: 2,
            namespace: 0,
            extends: CodedIndex::null(),
            field_list: 1,
            method_list: 1,
        };

        let mut small = BufferWriter::new();
        row.write_row(&mut small, &small_info());
        assert_eq!(small.position(), 4 + 2 + 2 + 2 + 2 + 2);

        let mut counts = [10u32; TABLE_COUNT];
        counts[TableId::Field as usize] = 0x1_0000;
        let info = TableInfo::new(&counts, 0x1_0000, 32, 100);
        let mut large = BufferWriter::new();
        row.write_row(&mut large, &info);
        // 4-byte string indices and a 4-byte field list
        assert_eq!(large.position(), 4 + 4 + 4 + 2 + 4 + 2);
    }

    #[test]
    fn test_constant_row_pads_reserved_byte() {
        let row = ConstantRow {
            type_code: 0x08,
            parent: CodedIndex(0x0004),
            value: 0x0005,
        };
        let mut buffer = BufferWriter::new();
        row.write_row(&mut buffer, &small_info());
        assert_eq!(buffer.as_slice(), &[0x08, 0x00, 0x04, 0x00, 0x05, 0x00]);
    }
}
