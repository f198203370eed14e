//! # Table Population
//!
//! [`TableBuilder`] replays the closed row indices against the object model and
//! produces a [`TableSet`]: one vector of fully resolved row structs per table,
//! in the canonical population order. Tables the format requires to be sorted
//! (Constant, CustomAttribute, FieldMarshal, DeclSecurity, MethodSemantics,
//! InterfaceImpl) are collected first and stably sorted by their coded parent;
//! the remaining sorted tables come out ordered for free because the definition
//! walk assigns ascending rows.
//!
//! Name columns hold *virtual* string indices until the heaps freeze;
//! [`TableSet::resolve_strings`] rewrites them to real #Strings offsets before
//! serialization.

use std::collections::HashMap;

use strum::IntoEnumIterator;
use widestring::U16String;

use crate::file::BufferWriter;
use crate::metadata::body::EncodedBody;
use crate::metadata::emit::EmitDiagnostic;
use crate::metadata::heaps::{MetadataHeaps, StringHeap, StringIndex, NAME_LENGTH_LIMIT, PATH_LENGTH_LIMIT};
use crate::metadata::index::{
    GenericParamOwner, GenericParamSource, MemberRefKey, ReferenceIndexer, TypeRefKey,
};
use crate::metadata::model::{
    ConstantValue, CustomAttributeData, ExportScope, ExportedTypeData, GenerationKind,
    MethodHandle, ResolutionScope, ResourceLocation,
};
use crate::metadata::signatures::{element_type, AttributeEncoder, SignatureEncoder};
use crate::metadata::tables::{
    AssemblyRefRow, AssemblyRow, ClassLayoutRow, CodedIndex, CodedIndexType, ConstantRow,
    CustomAttributeRow, DeclSecurityRow, EncLogRow, EncMapRow, EventMapRow, EventRow,
    ExportedTypeRow, FieldLayoutRow, FieldMarshalRow, FieldRow, FieldRvaRow, FileRow,
    GenericParamConstraintRow, GenericParamRow, ImplMapRow, InterfaceImplRow, ManifestResourceRow,
    MemberRefRow, MethodDefRow, MethodImplRow, MethodSemanticsRow, MethodSpecRow, ModuleRefRow,
    ModuleRow, NestedClassRow, ParamRow, PropertyMapRow, PropertyRow, RowWritable,
    StandAloneSigRow, TableId, TableInfo, TypeDefRow, TypeRefRow, TypeSpecRow, TABLE_COUNT,
};
use crate::metadata::token::Token;
use crate::{Error, Result};

/// MethodSemantics accessor codes (ECMA-335 II.22.28).
const SEMANTICS_SETTER: u16 = 0x0001;
const SEMANTICS_GETTER: u16 = 0x0002;
const SEMANTICS_ADD_ON: u16 = 0x0008;
const SEMANTICS_REMOVE_ON: u16 = 0x0010;
const SEMANTICS_FIRE: u16 = 0x0020;

/// ExportedType flags (ECMA-335 II.23.1.15).
const EXPORTED_PUBLIC: u32 = 0x0000_0001;
const EXPORTED_NESTED_PUBLIC: u32 = 0x0000_0002;
const EXPORTED_FORWARDER: u32 = 0x0020_0000;

/// File table flags (ECMA-335 II.23.1.6).
const FILE_CONTAINS_NO_METADATA: u32 = 0x0000_0001;

/// ManifestResource flags (ECMA-335 II.23.1.9).
const RESOURCE_PUBLIC: u32 = 0x0000_0001;
const RESOURCE_PRIVATE: u32 = 0x0000_0002;

/// Every populated table of one generation.
#[derive(Default)]
pub struct TableSet {
    /// Module (0x00); exactly one row
    pub modules: Vec<ModuleRow>,
    /// TypeRef (0x01)
    pub type_refs: Vec<TypeRefRow>,
    /// TypeDef (0x02)
    pub type_defs: Vec<TypeDefRow>,
    /// Field (0x04)
    pub fields: Vec<FieldRow>,
    /// MethodDef (0x06)
    pub methods: Vec<MethodDefRow>,
    /// Param (0x08)
    pub params: Vec<ParamRow>,
    /// InterfaceImpl (0x09)
    pub interface_impls: Vec<InterfaceImplRow>,
    /// MemberRef (0x0A)
    pub member_refs: Vec<MemberRefRow>,
    /// Constant (0x0B)
    pub constants: Vec<ConstantRow>,
    /// CustomAttribute (0x0C)
    pub custom_attributes: Vec<CustomAttributeRow>,
    /// FieldMarshal (0x0D)
    pub field_marshals: Vec<FieldMarshalRow>,
    /// DeclSecurity (0x0E)
    pub decl_security: Vec<DeclSecurityRow>,
    /// ClassLayout (0x0F)
    pub class_layouts: Vec<ClassLayoutRow>,
    /// FieldLayout (0x10)
    pub field_layouts: Vec<FieldLayoutRow>,
    /// StandAloneSig (0x11)
    pub standalone_sigs: Vec<StandAloneSigRow>,
    /// EventMap (0x12)
    pub event_maps: Vec<EventMapRow>,
    /// Event (0x14)
    pub events: Vec<EventRow>,
    /// PropertyMap (0x15)
    pub property_maps: Vec<PropertyMapRow>,
    /// Property (0x17)
    pub properties: Vec<PropertyRow>,
    /// MethodSemantics (0x18)
    pub method_semantics: Vec<MethodSemanticsRow>,
    /// MethodImpl (0x19)
    pub method_impls: Vec<MethodImplRow>,
    /// ModuleRef (0x1A)
    pub module_refs: Vec<ModuleRefRow>,
    /// TypeSpec (0x1B)
    pub type_specs: Vec<TypeSpecRow>,
    /// ImplMap (0x1C)
    pub impl_maps: Vec<ImplMapRow>,
    /// FieldRva (0x1D)
    pub field_rvas: Vec<FieldRvaRow>,
    /// EncLog (0x1E); delta generations only
    pub enc_logs: Vec<EncLogRow>,
    /// EncMap (0x1F); delta generations only
    pub enc_maps: Vec<EncMapRow>,
    /// Assembly (0x20); at most one row
    pub assembly: Vec<AssemblyRow>,
    /// AssemblyRef (0x23)
    pub assembly_refs: Vec<AssemblyRefRow>,
    /// File (0x26)
    pub files: Vec<FileRow>,
    /// ExportedType (0x27)
    pub exported_types: Vec<ExportedTypeRow>,
    /// ManifestResource (0x28)
    pub resources: Vec<ManifestResourceRow>,
    /// NestedClass (0x29)
    pub nested_classes: Vec<NestedClassRow>,
    /// GenericParam (0x2A)
    pub generic_params: Vec<GenericParamRow>,
    /// MethodSpec (0x2B)
    pub method_specs: Vec<MethodSpecRow>,
    /// GenericParamConstraint (0x2C)
    pub generic_param_constraints: Vec<GenericParamConstraintRow>,
}

impl TableSet {
    /// Final row count per table, indexed by [`TableId`] discriminant.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn row_counts(&self) -> [u32; TABLE_COUNT] {
        let mut counts = [0u32; TABLE_COUNT];
        counts[TableId::Module as usize] = self.modules.len() as u32;
        counts[TableId::TypeRef as usize] = self.type_refs.len() as u32;
        counts[TableId::TypeDef as usize] = self.type_defs.len() as u32;
        counts[TableId::Field as usize] = self.fields.len() as u32;
        counts[TableId::MethodDef as usize] = self.methods.len() as u32;
        counts[TableId::Param as usize] = self.params.len() as u32;
        counts[TableId::InterfaceImpl as usize] = self.interface_impls.len() as u32;
        counts[TableId::MemberRef as usize] = self.member_refs.len() as u32;
        counts[TableId::Constant as usize] = self.constants.len() as u32;
        counts[TableId::CustomAttribute as usize] = self.custom_attributes.len() as u32;
        counts[TableId::FieldMarshal as usize] = self.field_marshals.len() as u32;
        counts[TableId::DeclSecurity as usize] = self.decl_security.len() as u32;
        counts[TableId::ClassLayout as usize] = self.class_layouts.len() as u32;
        counts[TableId::FieldLayout as usize] = self.field_layouts.len() as u32;
        counts[TableId::StandAloneSig as usize] = self.standalone_sigs.len() as u32;
        counts[TableId::EventMap as usize] = self.event_maps.len() as u32;
        counts[TableId::Event as usize] = self.events.len() as u32;
        counts[TableId::PropertyMap as usize] = self.property_maps.len() as u32;
        counts[TableId::Property as usize] = self.properties.len() as u32;
        counts[TableId::MethodSemantics as usize] = self.method_semantics.len() as u32;
        counts[TableId::MethodImpl as usize] = self.method_impls.len() as u32;
        counts[TableId::ModuleRef as usize] = self.module_refs.len() as u32;
        counts[TableId::TypeSpec as usize] = self.type_specs.len() as u32;
        counts[TableId::ImplMap as usize] = self.impl_maps.len() as u32;
        counts[TableId::FieldRva as usize] = self.field_rvas.len() as u32;
        counts[TableId::EncLog as usize] = self.enc_logs.len() as u32;
        counts[TableId::EncMap as usize] = self.enc_maps.len() as u32;
        counts[TableId::Assembly as usize] = self.assembly.len() as u32;
        counts[TableId::AssemblyRef as usize] = self.assembly_refs.len() as u32;
        counts[TableId::File as usize] = self.files.len() as u32;
        counts[TableId::ExportedType as usize] = self.exported_types.len() as u32;
        counts[TableId::ManifestResource as usize] = self.resources.len() as u32;
        counts[TableId::NestedClass as usize] = self.nested_classes.len() as u32;
        counts[TableId::GenericParam as usize] = self.generic_params.len() as u32;
        counts[TableId::MethodSpec as usize] = self.method_specs.len() as u32;
        counts[TableId::GenericParamConstraint as usize] =
            self.generic_param_constraints.len() as u32;
        counts
    }

    /// Rewrites every name column from its virtual string index to the real
    /// #Strings offset.
    ///
    /// # Errors
    ///
    /// Returns [`Error::PhaseViolation`] if the string heap is not frozen yet.
    pub fn resolve_strings(&mut self, strings: &StringHeap) -> Result<()> {
        fn fix(strings: &StringHeap, value: &mut u32) -> Result<()> {
            *value = strings.resolve(StringIndex(*value))?;
            Ok(())
        }

        for row in &mut self.modules {
            fix(strings, &mut row.name)?;
        }
        for row in &mut self.type_refs {
            fix(strings, &mut row.name)?;
            fix(strings, &mut row.namespace)?;
        }
        for row in &mut self.type_defs {
            fix(strings, &mut row.name)?;
            fix(strings, &mut row.namespace)?;
        }
        for row in &mut self.fields {
            fix(strings, &mut row.name)?;
        }
        for row in &mut self.methods {
            fix(strings, &mut row.name)?;
        }
        for row in &mut self.params {
            fix(strings, &mut row.name)?;
        }
        for row in &mut self.member_refs {
            fix(strings, &mut row.name)?;
        }
        for row in &mut self.events {
            fix(strings, &mut row.name)?;
        }
        for row in &mut self.properties {
            fix(strings, &mut row.name)?;
        }
        for row in &mut self.module_refs {
            fix(strings, &mut row.name)?;
        }
        for row in &mut self.impl_maps {
            fix(strings, &mut row.import_name)?;
        }
        for row in &mut self.assembly {
            fix(strings, &mut row.name)?;
            fix(strings, &mut row.culture)?;
        }
        for row in &mut self.assembly_refs {
            fix(strings, &mut row.name)?;
            fix(strings, &mut row.culture)?;
        }
        for row in &mut self.files {
            fix(strings, &mut row.name)?;
        }
        for row in &mut self.exported_types {
            fix(strings, &mut row.name)?;
            fix(strings, &mut row.namespace)?;
        }
        for row in &mut self.resources {
            fix(strings, &mut row.name)?;
        }
        for row in &mut self.generic_params {
            fix(strings, &mut row.name)?;
        }
        Ok(())
    }

    /// Serializes every table's rows in table-id order against frozen widths.
    pub fn serialize(&self, buffer: &mut BufferWriter, info: &TableInfo) {
        fn write_all<R: RowWritable>(rows: &[R], buffer: &mut BufferWriter, info: &TableInfo) {
            for row in rows {
                row.write_row(buffer, info);
            }
        }

        write_all(&self.modules, buffer, info);
        write_all(&self.type_refs, buffer, info);
        write_all(&self.type_defs, buffer, info);
        write_all(&self.fields, buffer, info);
        write_all(&self.methods, buffer, info);
        write_all(&self.params, buffer, info);
        write_all(&self.interface_impls, buffer, info);
        write_all(&self.member_refs, buffer, info);
        write_all(&self.constants, buffer, info);
        write_all(&self.custom_attributes, buffer, info);
        write_all(&self.field_marshals, buffer, info);
        write_all(&self.decl_security, buffer, info);
        write_all(&self.class_layouts, buffer, info);
        write_all(&self.field_layouts, buffer, info);
        write_all(&self.standalone_sigs, buffer, info);
        write_all(&self.event_maps, buffer, info);
        write_all(&self.events, buffer, info);
        write_all(&self.property_maps, buffer, info);
        write_all(&self.properties, buffer, info);
        write_all(&self.method_semantics, buffer, info);
        write_all(&self.method_impls, buffer, info);
        write_all(&self.module_refs, buffer, info);
        write_all(&self.type_specs, buffer, info);
        write_all(&self.impl_maps, buffer, info);
        write_all(&self.field_rvas, buffer, info);
        write_all(&self.enc_logs, buffer, info);
        write_all(&self.enc_maps, buffer, info);
        write_all(&self.assembly, buffer, info);
        write_all(&self.assembly_refs, buffer, info);
        write_all(&self.files, buffer, info);
        write_all(&self.exported_types, buffer, info);
        write_all(&self.resources, buffer, info);
        write_all(&self.nested_classes, buffer, info);
        write_all(&self.generic_params, buffer, info);
        write_all(&self.method_specs, buffer, info);
        write_all(&self.generic_param_constraints, buffer, info);
    }
}

/// Populates every table from the model, replaying the closed row indices.
pub struct TableBuilder<'a, 'm> {
    indexer: &'a mut ReferenceIndexer<'m>,
    heaps: &'a mut MetadataHeaps,
    bodies: &'a HashMap<MethodHandle, EncodedBody>,
    tables: TableSet,
    diagnostics: Vec<EmitDiagnostic>,
    /// (parent coded, type code, value blob) awaiting the parent sort
    pending_constants: Vec<(u32, u8, u32)>,
    /// (parent coded, descriptor blob)
    pending_marshals: Vec<(u32, u32)>,
    /// (parent coded, action, permission-set blob)
    pending_security: Vec<(u32, u16, u32)>,
    /// (association coded, semantics, method row)
    pending_semantics: Vec<(u32, u16, u32)>,
    /// (parent coded, constructor coded, value blob)
    pending_attributes: Vec<(u32, CodedIndex, u32)>,
}

impl<'a, 'm> TableBuilder<'a, 'm> {
    /// Creates a builder over closed indices, open heaps and the encoded bodies.
    pub fn new(
        indexer: &'a mut ReferenceIndexer<'m>,
        heaps: &'a mut MetadataHeaps,
        bodies: &'a HashMap<MethodHandle, EncodedBody>,
    ) -> Self {
        TableBuilder {
            indexer,
            heaps,
            bodies,
            tables: TableSet::default(),
            diagnostics: Vec::new(),
            pending_constants: Vec::new(),
            pending_marshals: Vec::new(),
            pending_security: Vec::new(),
            pending_semantics: Vec::new(),
            pending_attributes: Vec::new(),
        }
    }

    /// Fills every table and returns the set plus the advisory diagnostics.
    ///
    /// Embedded resource bytes are appended to `resources`, mapped field data to
    /// `mapped_field_data`; row columns reference offsets into those buffers.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ResourceAcquisition`] when an embedded resource source
    /// fails to load; propagates heap and contract failures otherwise.
    pub fn populate(
        mut self,
        mapped_field_data: &mut Vec<u8>,
        resources: &mut Vec<u8>,
    ) -> Result<(TableSet, Vec<EmitDiagnostic>)> {
        self.populate_generic_params()?;
        self.populate_module()?;
        self.populate_type_refs()?;
        self.populate_type_defs()?;
        self.populate_fields(mapped_field_data)?;
        self.populate_methods()?;
        self.populate_params()?;
        self.populate_member_refs()?;
        self.populate_events_and_properties()?;
        self.populate_standalone_sigs();
        self.populate_module_refs()?;
        self.populate_type_specs()?;
        self.populate_method_specs()?;
        self.populate_assembly()?;
        self.populate_assembly_refs()?;
        self.populate_files()?;
        self.populate_exported_types()?;
        self.populate_resources(resources)?;
        self.collect_module_level_attributes()?;
        self.materialize_sorted_tables();
        self.populate_enc_tables();
        Ok((self.tables, self.diagnostics))
    }

    fn intern_name(&mut self, value: &str) -> Result<u32> {
        let (index, over) = self.heaps.strings.intern_name_checked(value)?;
        if over {
            self.diagnostics.push(EmitDiagnostic::NameTooLong {
                name: value.to_string(),
                limit: NAME_LENGTH_LIMIT,
            });
        }
        Ok(index.0)
    }

    fn intern_namespace(&mut self, value: &str) -> Result<u32> {
        let (index, over) = self.heaps.strings.intern_name_checked(value)?;
        if over {
            self.diagnostics.push(EmitDiagnostic::NamespaceTooLong {
                namespace: value.to_string(),
                limit: NAME_LENGTH_LIMIT,
            });
        }
        Ok(index.0)
    }

    fn intern_path(&mut self, value: &str) -> Result<u32> {
        let (index, over) = self.heaps.strings.intern_path_checked(value)?;
        if over {
            self.diagnostics.push(EmitDiagnostic::PathTooLong {
                path: value.to_string(),
                limit: PATH_LENGTH_LIMIT,
            });
        }
        Ok(index.0)
    }

    fn add_attribute(&mut self, parent: CodedIndex, attribute: &CustomAttributeData) -> Result<()> {
        let constructor = self.indexer.custom_attribute_type_coded(&attribute.constructor)?;
        let mut blob = BufferWriter::new();
        AttributeEncoder::new(self.indexer.module).encode_value(&mut blob, &attribute.value)?;
        let value = self.heaps.blobs.intern(blob.as_slice())?;
        self.pending_attributes.push((parent.0, constructor, value));
        Ok(())
    }

    fn add_constant(&mut self, parent: CodedIndex, constant: &ConstantValue) -> Result<()> {
        let (type_code, bytes) = constant_blob(constant);
        let value = self.heaps.blobs.intern(&bytes)?;
        self.pending_constants.push((parent.0, type_code, value));
        Ok(())
    }

    /// Sorts the consolidated generic-parameter walk by owner, assigns rows, and
    /// emits the parameter, constraint and attribute records.
    fn populate_generic_params(&mut self) -> Result<()> {
        let module = self.indexer.module;

        let mut keyed = Vec::with_capacity(self.indexer.generic_params.len());
        for entry in self.indexer.generic_params.clone() {
            let owner = match entry.owner {
                GenericParamOwner::Type(handle) => CodedIndex::encode(
                    CodedIndexType::TypeOrMethodDef,
                    TableId::TypeDef,
                    self.indexer.type_rows.row(handle)?,
                )?,
                GenericParamOwner::Method(handle) => CodedIndex::encode(
                    CodedIndexType::TypeOrMethodDef,
                    TableId::MethodDef,
                    self.indexer.method_rows.row(handle)?,
                )?,
            };
            keyed.push((owner.0, entry));
        }
        keyed.sort_by_key(|(owner, entry)| (*owner, entry.number));

        for (position, (owner, entry)) in keyed.into_iter().enumerate() {
            #[allow(clippy::cast_possible_truncation)]
            let row = position as u32 + 1;
            let data = match entry.source {
                GenericParamSource::Type(handle, index) => {
                    &module.types[handle.0].generic_params[index]
                }
                GenericParamSource::Method(handle, index) => {
                    &module.methods[handle.0].generic_params[index]
                }
            };
            let name = self.intern_name(&data.name)?;
            self.tables.generic_params.push(GenericParamRow {
                number: entry.number,
                flags: data.flags,
                owner: CodedIndex(owner),
                name,
            });

            // Constraints repeat on re-declared (inherited) parameters; the
            // attributes belong only to the declaring owner's row.
            for constraint in &data.constraints {
                let coded = self.indexer.type_def_or_ref_coded(constraint)?;
                self.tables
                    .generic_param_constraints
                    .push(GenericParamConstraintRow {
                        owner: row,
                        constraint: coded,
                    });
            }

            let declared_here = match (entry.owner, entry.source) {
                (GenericParamOwner::Type(owner), GenericParamSource::Type(defining, _)) => {
                    owner == defining
                }
                _ => true,
            };
            if declared_here {
                let parent = CodedIndex::encode(
                    CodedIndexType::HasCustomAttribute,
                    TableId::GenericParam,
                    row,
                )?;
                for attribute in &data.custom_attributes {
                    self.add_attribute(parent, attribute)?;
                }
            }
        }
        Ok(())
    }

    fn populate_module(&mut self) -> Result<()> {
        let module = self.indexer.module;
        let name = self.intern_path(&module.name)?;
        let mvid = self.heaps.guids.intern(module.mvid)?;
        let enc_id = self.heaps.guids.intern(module.enc_id)?;
        let enc_base_id = self.heaps.guids.intern(module.enc_base_id)?;
        self.tables.modules.push(ModuleRow {
            generation: module.generation,
            name,
            mvid,
            enc_id,
            enc_base_id,
        });
        Ok(())
    }

    fn populate_type_refs(&mut self) -> Result<()> {
        let module = self.indexer.module;
        for key in self.indexer.type_refs.in_order().to_vec() {
            let row = match key {
                TypeRefKey::Handle(handle) => {
                    let data = &module.type_refs[handle.0];
                    let resolution_scope = match data.scope {
                        ResolutionScope::Assembly(assembly) => CodedIndex::encode(
                            CodedIndexType::ResolutionScope,
                            TableId::AssemblyRef,
                            self.indexer.assembly_refs.get_or_add(&assembly)?,
                        )?,
                        ResolutionScope::Module(module_ref) => CodedIndex::encode(
                            CodedIndexType::ResolutionScope,
                            TableId::ModuleRef,
                            self.indexer.module_refs.get_or_add(&module_ref)?,
                        )?,
                        ResolutionScope::CurrentModule => {
                            CodedIndex::encode(CodedIndexType::ResolutionScope, TableId::Module, 1)?
                        }
                        ResolutionScope::Nested(enclosing) => CodedIndex::encode(
                            CodedIndexType::ResolutionScope,
                            TableId::TypeRef,
                            self.indexer.type_ref_row(enclosing)?,
                        )?,
                    };
                    let name = self.intern_name(&data.name)?;
                    let namespace = self.intern_namespace(&data.namespace)?;
                    TypeRefRow {
                        resolution_scope,
                        name,
                        namespace,
                    }
                }
                TypeRefKey::AttributePlaceholder { name, scope } => {
                    let resolution_scope = CodedIndex::encode(
                        CodedIndexType::ResolutionScope,
                        TableId::AssemblyRef,
                        self.indexer.assembly_refs.get_or_add(&scope)?,
                    )?;
                    let name = self.intern_name(name)?;
                    let namespace = self.intern_namespace("System.Runtime.CompilerServices")?;
                    TypeRefRow {
                        resolution_scope,
                        name,
                        namespace,
                    }
                }
            };
            self.tables.type_refs.push(row);
        }
        Ok(())
    }

    fn populate_type_defs(&mut self) -> Result<()> {
        let module = self.indexer.module;
        let mut interface_impls = Vec::new();

        for handle in self.indexer.type_walk.clone() {
            let data = &module.types[handle.0];
            let row = self.indexer.type_rows.row(handle)?;

            let extends = match &data.extends {
                Some(base) => self.indexer.type_def_or_ref_coded(base)?,
                None => CodedIndex::null(),
            };
            let name = self.intern_name(&data.name)?;
            let namespace = self.intern_namespace(&data.namespace)?;
            self.tables.type_defs.push(TypeDefRow {
                flags: data.flags,
                name,
                namespace,
                extends,
                field_list: self.indexer.first_field_row[&handle],
                method_list: self.indexer.first_method_row[&handle],
            });

            if let Some(layout) = &data.layout {
                self.tables.class_layouts.push(ClassLayoutRow {
                    packing_size: layout.packing_size,
                    class_size: layout.class_size,
                    parent: row,
                });
            }

            for interface in &data.interfaces {
                let coded = self.indexer.type_def_or_ref_coded(interface)?;
                interface_impls.push((row, coded));
            }

            for method_impl in &data.method_impls {
                let method_body = self.indexer.method_def_or_ref_coded(&method_impl.body)?;
                let method_declaration = self
                    .indexer
                    .method_def_or_ref_coded(&method_impl.declaration)?;
                self.tables.method_impls.push(MethodImplRow {
                    class: row,
                    method_body,
                    method_declaration,
                });
            }

            if let Some(enclosing) = data.enclosing {
                self.tables.nested_classes.push(NestedClassRow {
                    nested_class: row,
                    enclosing_class: self.indexer.type_rows.row(enclosing)?,
                });
            }

            let attribute_parent =
                CodedIndex::encode(CodedIndexType::HasCustomAttribute, TableId::TypeDef, row)?;
            for attribute in &data.custom_attributes {
                self.add_attribute(attribute_parent, attribute)?;
            }

            let security_parent =
                CodedIndex::encode(CodedIndexType::HasDeclSecurity, TableId::TypeDef, row)?;
            for security in &data.security {
                let permission_set = self.heaps.blobs.intern(&security.permission_set)?;
                self.pending_security
                    .push((security_parent.0, security.action, permission_set));
            }
        }

        interface_impls.sort_by_key(|(class, interface)| (*class, interface.0));
        for (class, interface) in interface_impls {
            self.tables
                .interface_impls
                .push(InterfaceImplRow { class, interface });
        }
        Ok(())
    }

    fn populate_fields(&mut self, mapped_field_data: &mut Vec<u8>) -> Result<()> {
        let module = self.indexer.module;
        for (position, field) in self.indexer.field_rows.in_order().to_vec().into_iter().enumerate()
        {
            #[allow(clippy::cast_possible_truncation)]
            let row = position as u32 + 1;
            let data = &module.fields[field.0];

            let mut blob = BufferWriter::new();
            SignatureEncoder::new(&mut *self.indexer).encode_field(&mut blob, &data.field_type)?;
            let signature = self.heaps.blobs.intern(blob.as_slice())?;
            let name = self.intern_name(&data.name)?;
            self.tables.fields.push(FieldRow {
                flags: data.flags,
                name,
                signature,
            });

            if let Some(offset) = data.layout_offset {
                self.tables
                    .field_layouts
                    .push(FieldLayoutRow { offset, field: row });
            }

            if let Some(bytes) = &data.mapped_data {
                // Mapped data is 8-aligned; the row's RVA column holds the offset
                // within the mapped-data buffer until the container relocates it.
                while mapped_field_data.len() % 8 != 0 {
                    mapped_field_data.push(0);
                }
                #[allow(clippy::cast_possible_truncation)]
                let rva = mapped_field_data.len() as u32;
                mapped_field_data.extend_from_slice(bytes);
                self.tables.field_rvas.push(FieldRvaRow { rva, field: row });
            }

            if let Some(constant) = &data.constant {
                let parent =
                    CodedIndex::encode(CodedIndexType::HasConstant, TableId::Field, row)?;
                self.add_constant(parent, constant)?;
            }

            if let Some(descriptor) = &data.marshalling {
                let parent =
                    CodedIndex::encode(CodedIndexType::HasFieldMarshal, TableId::Field, row)?;
                let native_type = self.heaps.blobs.intern(descriptor)?;
                self.pending_marshals.push((parent.0, native_type));
            }

            let attribute_parent =
                CodedIndex::encode(CodedIndexType::HasCustomAttribute, TableId::Field, row)?;
            for attribute in &data.custom_attributes {
                self.add_attribute(attribute_parent, attribute)?;
            }
        }
        Ok(())
    }

    fn populate_methods(&mut self) -> Result<()> {
        let module = self.indexer.module;
        for (position, method) in self
            .indexer
            .method_rows
            .in_order()
            .to_vec()
            .into_iter()
            .enumerate()
        {
            #[allow(clippy::cast_possible_truncation)]
            let row = position as u32 + 1;
            let data = &module.methods[method.0];

            let mut blob = BufferWriter::new();
            SignatureEncoder::new(&mut *self.indexer).encode_method(&mut blob, &data.signature)?;
            let signature = self.heaps.blobs.intern(blob.as_slice())?;
            let name = self.intern_name(&data.name)?;
            // Bodiless methods carry RVA 0; encoded bodies carry their offset in
            // the body stream (the container adds the section base).
            let rva = self.bodies.get(&method).map_or(0, |body| body.offset);
            self.tables.methods.push(MethodDefRow {
                rva,
                impl_flags: data.impl_flags,
                flags: data.flags,
                name,
                signature,
                param_list: self.indexer.first_param_row[&method],
            });

            if let Some(pinvoke) = &data.pinvoke {
                let member_forwarded =
                    CodedIndex::encode(CodedIndexType::MemberForwarded, TableId::MethodDef, row)?;
                let import_name = self.intern_name(&pinvoke.entry_point)?;
                let import_scope = self.indexer.module_refs.get_or_add(&pinvoke.module)?;
                self.tables.impl_maps.push(ImplMapRow {
                    flags: pinvoke.flags,
                    member_forwarded,
                    import_name,
                    import_scope,
                });
            }

            let attribute_parent =
                CodedIndex::encode(CodedIndexType::HasCustomAttribute, TableId::MethodDef, row)?;
            for attribute in &data.custom_attributes {
                self.add_attribute(attribute_parent, attribute)?;
            }

            let security_parent =
                CodedIndex::encode(CodedIndexType::HasDeclSecurity, TableId::MethodDef, row)?;
            for security in &data.security {
                let permission_set = self.heaps.blobs.intern(&security.permission_set)?;
                self.pending_security
                    .push((security_parent.0, security.action, permission_set));
            }
        }
        Ok(())
    }

    fn populate_params(&mut self) -> Result<()> {
        let module = self.indexer.module;
        for (position, (method, index)) in self
            .indexer
            .param_rows
            .in_order()
            .to_vec()
            .into_iter()
            .enumerate()
        {
            #[allow(clippy::cast_possible_truncation)]
            let row = position as u32 + 1;
            let data = &module.methods[method.0].params[index];

            let name = self.intern_name(&data.name)?;
            self.tables.params.push(ParamRow {
                flags: data.flags,
                sequence: data.sequence,
                name,
            });

            if let Some(constant) = &data.constant {
                let parent =
                    CodedIndex::encode(CodedIndexType::HasConstant, TableId::Param, row)?;
                self.add_constant(parent, constant)?;
            }

            if let Some(descriptor) = &data.marshalling {
                let parent =
                    CodedIndex::encode(CodedIndexType::HasFieldMarshal, TableId::Param, row)?;
                let native_type = self.heaps.blobs.intern(descriptor)?;
                self.pending_marshals.push((parent.0, native_type));
            }

            let attribute_parent =
                CodedIndex::encode(CodedIndexType::HasCustomAttribute, TableId::Param, row)?;
            for attribute in &data.custom_attributes {
                self.add_attribute(attribute_parent, attribute)?;
            }
        }
        Ok(())
    }

    fn populate_member_refs(&mut self) -> Result<()> {
        for key in self.indexer.member_refs.in_order().to_vec() {
            let row = match key {
                MemberRefKey::Field(data) => {
                    let class = self.indexer.member_ref_parent_coded(&data.parent)?;
                    let mut blob = BufferWriter::new();
                    SignatureEncoder::new(&mut *self.indexer)
                        .encode_field(&mut blob, &data.field_type)?;
                    let signature = self.heaps.blobs.intern(blob.as_slice())?;
                    let name = self.intern_name(&data.name)?;
                    MemberRefRow {
                        class,
                        name,
                        signature,
                    }
                }
                MemberRefKey::Method(data) => {
                    let class = self.indexer.member_ref_parent_coded(&data.parent)?;
                    let mut blob = BufferWriter::new();
                    SignatureEncoder::new(&mut *self.indexer)
                        .encode_method(&mut blob, &data.signature)?;
                    let signature = self.heaps.blobs.intern(blob.as_slice())?;
                    let name = self.intern_name(&data.name)?;
                    MemberRefRow {
                        class,
                        name,
                        signature,
                    }
                }
            };
            self.tables.member_refs.push(row);
        }
        Ok(())
    }

    fn populate_events_and_properties(&mut self) -> Result<()> {
        let module = self.indexer.module;
        for handle in self.indexer.type_walk.clone() {
            let data = &module.types[handle.0];
            let type_row = self.indexer.type_rows.row(handle)?;

            if !data.events.is_empty() {
                self.tables.event_maps.push(EventMapRow {
                    parent: type_row,
                    event_list: self.indexer.event_rows.row((handle, 0))?,
                });
            }
            for (index, event) in data.events.iter().enumerate() {
                let row = self.indexer.event_rows.row((handle, index))?;
                let event_type = self.indexer.type_def_or_ref_coded(&event.event_type)?;
                let name = self.intern_name(&event.name)?;
                self.tables.events.push(EventRow {
                    flags: event.flags,
                    name,
                    event_type,
                });

                let association =
                    CodedIndex::encode(CodedIndexType::HasSemantics, TableId::Event, row)?;
                self.pending_semantics.push((
                    association.0,
                    SEMANTICS_ADD_ON,
                    self.indexer.method_rows.row(event.adder)?,
                ));
                self.pending_semantics.push((
                    association.0,
                    SEMANTICS_REMOVE_ON,
                    self.indexer.method_rows.row(event.remover)?,
                ));
                if let Some(raiser) = event.raiser {
                    self.pending_semantics.push((
                        association.0,
                        SEMANTICS_FIRE,
                        self.indexer.method_rows.row(raiser)?,
                    ));
                }

                let attribute_parent =
                    CodedIndex::encode(CodedIndexType::HasCustomAttribute, TableId::Event, row)?;
                for attribute in &event.custom_attributes {
                    self.add_attribute(attribute_parent, attribute)?;
                }
            }

            if !data.properties.is_empty() {
                self.tables.property_maps.push(PropertyMapRow {
                    parent: type_row,
                    property_list: self.indexer.property_rows.row((handle, 0))?,
                });
            }
            for (index, property) in data.properties.iter().enumerate() {
                let row = self.indexer.property_rows.row((handle, index))?;
                let mut blob = BufferWriter::new();
                SignatureEncoder::new(&mut *self.indexer)
                    .encode_property(&mut blob, &property.signature)?;
                let signature = self.heaps.blobs.intern(blob.as_slice())?;
                let name = self.intern_name(&property.name)?;
                self.tables.properties.push(PropertyRow {
                    flags: property.flags,
                    name,
                    signature,
                });

                let association =
                    CodedIndex::encode(CodedIndexType::HasSemantics, TableId::Property, row)?;
                if let Some(getter) = property.getter {
                    self.pending_semantics.push((
                        association.0,
                        SEMANTICS_GETTER,
                        self.indexer.method_rows.row(getter)?,
                    ));
                }
                if let Some(setter) = property.setter {
                    self.pending_semantics.push((
                        association.0,
                        SEMANTICS_SETTER,
                        self.indexer.method_rows.row(setter)?,
                    ));
                }

                if let Some(constant) = &property.constant {
                    let parent =
                        CodedIndex::encode(CodedIndexType::HasConstant, TableId::Property, row)?;
                    self.add_constant(parent, constant)?;
                }

                let attribute_parent = CodedIndex::encode(
                    CodedIndexType::HasCustomAttribute,
                    TableId::Property,
                    row,
                )?;
                for attribute in &property.custom_attributes {
                    self.add_attribute(attribute_parent, attribute)?;
                }
            }
        }
        Ok(())
    }

    fn populate_standalone_sigs(&mut self) {
        for signature in self.indexer.standalone_sigs.in_order() {
            self.tables.standalone_sigs.push(StandAloneSigRow {
                signature: *signature,
            });
        }
    }

    fn populate_module_refs(&mut self) -> Result<()> {
        let module = self.indexer.module;
        for handle in self.indexer.module_refs.in_order().to_vec() {
            let name = self.intern_name(&module.module_refs[handle.0])?;
            self.tables.module_refs.push(ModuleRefRow { name });
        }
        Ok(())
    }

    fn populate_type_specs(&mut self) -> Result<()> {
        for sig in self.indexer.type_specs.in_order().to_vec() {
            let mut blob = BufferWriter::new();
            SignatureEncoder::new(&mut *self.indexer).encode_type(&mut blob, &sig)?;
            let signature = self.heaps.blobs.intern(blob.as_slice())?;
            self.tables.type_specs.push(TypeSpecRow { signature });
        }
        Ok(())
    }

    fn populate_method_specs(&mut self) -> Result<()> {
        for inst in self.indexer.method_specs.in_order().to_vec() {
            let method = self.indexer.method_def_or_ref_coded(&inst.method)?;
            let mut blob = BufferWriter::new();
            SignatureEncoder::new(&mut *self.indexer)
                .encode_method_spec(&mut blob, &inst.type_arguments)?;
            let instantiation = self.heaps.blobs.intern(blob.as_slice())?;
            self.tables.method_specs.push(MethodSpecRow {
                method,
                instantiation,
            });
        }
        Ok(())
    }

    fn populate_assembly(&mut self) -> Result<()> {
        let module = self.indexer.module;
        let Some(assembly) = &module.assembly else {
            return Ok(());
        };

        let public_key = self.heaps.blobs.intern(&assembly.public_key)?;
        let name = self.intern_name(&assembly.name)?;
        let culture = self.heaps.strings.intern(&assembly.culture)?.0;
        let (major, minor, build, revision) = assembly.version;
        self.tables.assembly.push(AssemblyRow {
            hash_algorithm: assembly.hash_algorithm,
            major_version: major,
            minor_version: minor,
            build_number: build,
            revision_number: revision,
            flags: assembly.flags,
            public_key,
            name,
            culture,
        });

        let security_parent =
            CodedIndex::encode(CodedIndexType::HasDeclSecurity, TableId::Assembly, 1)?;
        for security in &assembly.security {
            let permission_set = self.heaps.blobs.intern(&security.permission_set)?;
            self.pending_security
                .push((security_parent.0, security.action, permission_set));
        }
        Ok(())
    }

    fn populate_assembly_refs(&mut self) -> Result<()> {
        let module = self.indexer.module;
        for handle in self.indexer.assembly_refs.in_order().to_vec() {
            let data = &module.assembly_refs[handle.0];
            let public_key_or_token = self.heaps.blobs.intern(&data.public_key_or_token)?;
            let hash_value = self.heaps.blobs.intern(&data.hash_value)?;
            let name = self.intern_name(&data.name)?;
            let culture = self.heaps.strings.intern(&data.culture)?.0;
            let (major, minor, build, revision) = data.version;
            self.tables.assembly_refs.push(AssemblyRefRow {
                major_version: major,
                minor_version: minor,
                build_number: build,
                revision_number: revision,
                flags: data.flags,
                public_key_or_token,
                name,
                culture,
                hash_value,
            });
        }
        Ok(())
    }

    fn populate_files(&mut self) -> Result<()> {
        let module = self.indexer.module;
        for data in &module.files {
            let flags = if data.contains_metadata {
                0
            } else {
                FILE_CONTAINS_NO_METADATA
            };
            let hash_value = self.heaps.blobs.intern(&data.hash_value)?;
            let name = self.intern_path(&data.name)?;
            self.tables.files.push(FileRow {
                flags,
                name,
                hash_value,
            });
        }
        Ok(())
    }

    fn populate_exported_types(&mut self) -> Result<()> {
        let module = self.indexer.module;
        for export in &module.exported_types {
            self.add_exported_type(export, None, false)?;
        }
        Ok(())
    }

    /// Adds one exported type and recursively its nested exports; a parent row
    /// always precedes its children so the Implementation coded index is valid.
    fn add_exported_type(
        &mut self,
        export: &ExportedTypeData,
        parent_row: Option<u32>,
        ancestor_forwarder: bool,
    ) -> Result<()> {
        #[allow(clippy::cast_possible_truncation)]
        let row = self.tables.exported_types.len() as u32 + 1;

        let (flags, implementation, forwarder) = match parent_row {
            None => match export.scope {
                ExportScope::File(file) => {
                    #[allow(clippy::cast_possible_truncation)]
                    let file_row = file.0 as u32 + 1;
                    let implementation = CodedIndex::encode(
                        CodedIndexType::Implementation,
                        TableId::File,
                        file_row,
                    )?;
                    (EXPORTED_PUBLIC, implementation, false)
                }
                ExportScope::Assembly(assembly) => {
                    let implementation = CodedIndex::encode(
                        CodedIndexType::Implementation,
                        TableId::AssemblyRef,
                        self.indexer.assembly_refs.get_or_add(&assembly)?,
                    )?;
                    (EXPORTED_FORWARDER, implementation, true)
                }
            },
            Some(parent) => {
                let implementation = CodedIndex::encode(
                    CodedIndexType::Implementation,
                    TableId::ExportedType,
                    parent,
                )?;
                if ancestor_forwarder {
                    // Nested types under a forwarder stay forwarders themselves.
                    (EXPORTED_FORWARDER, implementation, true)
                } else {
                    (EXPORTED_NESTED_PUBLIC, implementation, false)
                }
            }
        };

        let name = self.intern_name(&export.name)?;
        let namespace = self.intern_namespace(&export.namespace)?;
        self.tables.exported_types.push(ExportedTypeRow {
            flags,
            type_def_id: if forwarder { 0 } else { export.type_def_id },
            name,
            namespace,
            implementation,
        });

        for nested in &export.nested {
            self.add_exported_type(nested, Some(row), forwarder)?;
        }
        Ok(())
    }

    fn populate_resources(&mut self, resources: &mut Vec<u8>) -> Result<()> {
        let module = self.indexer.module;
        for resource in &module.resources {
            let (offset, implementation) = match &resource.location {
                ResourceLocation::Embedded(source) => {
                    let bytes = source.load().map_err(|cause| Error::ResourceAcquisition {
                        resource: resource.name.clone(),
                        cause,
                    })?;
                    while resources.len() % 8 != 0 {
                        resources.push(0);
                    }
                    #[allow(clippy::cast_possible_truncation)]
                    let offset = resources.len() as u32;
                    let length = u32::try_from(bytes.len()).map_err(|_| {
                        unexpected_error!(
                            "Resource {} exceeds the 4 GiB length limit",
                            resource.name
                        )
                    })?;
                    resources.extend_from_slice(&length.to_le_bytes());
                    resources.extend_from_slice(&bytes);
                    (offset, CodedIndex::null())
                }
                ResourceLocation::File(file, offset) => {
                    #[allow(clippy::cast_possible_truncation)]
                    let file_row = file.0 as u32 + 1;
                    let implementation = CodedIndex::encode(
                        CodedIndexType::Implementation,
                        TableId::File,
                        file_row,
                    )?;
                    (*offset, implementation)
                }
                ResourceLocation::Assembly(assembly) => {
                    let implementation = CodedIndex::encode(
                        CodedIndexType::Implementation,
                        TableId::AssemblyRef,
                        self.indexer.assembly_refs.get_or_add(assembly)?,
                    )?;
                    (0, implementation)
                }
            };

            let flags = if resource.is_public {
                RESOURCE_PUBLIC
            } else {
                RESOURCE_PRIVATE
            };
            let name = self.intern_name(&resource.name)?;
            self.tables.resources.push(ManifestResourceRow {
                offset,
                flags,
                name,
                implementation,
            });
        }
        Ok(())
    }

    fn collect_module_level_attributes(&mut self) -> Result<()> {
        let module = self.indexer.module;

        if let Some(assembly) = &module.assembly {
            let parent =
                CodedIndex::encode(CodedIndexType::HasCustomAttribute, TableId::Assembly, 1)?;
            for attribute in &assembly.custom_attributes {
                self.add_attribute(parent, attribute)?;
            }
        }

        // Netmodule assembly-level attributes: the placeholder TypeRef rows were
        // interned during reference discovery, so this only looks them up.
        for attribute in &module.assembly_attributes {
            let row = self
                .indexer
                .attribute_placeholder_row(attribute.is_security, attribute.allow_multiple)?;
            let parent =
                CodedIndex::encode(CodedIndexType::HasCustomAttribute, TableId::TypeRef, row)?;
            self.add_attribute(parent, attribute)?;
        }

        let parent = CodedIndex::encode(CodedIndexType::HasCustomAttribute, TableId::Module, 1)?;
        for attribute in &module.custom_attributes {
            self.add_attribute(parent, attribute)?;
        }
        Ok(())
    }

    /// Stably sorts the parent-keyed tables and materializes their rows; same-
    /// parent entries keep their collection order. Entries collected from a
    /// single walk pass usually arrive sorted already, so the sort is skipped
    /// when a linear scan confirms the order.
    fn materialize_sorted_tables(&mut self) {
        sort_pending(&mut self.pending_constants, |(parent, _, _)| *parent);
        for (parent, type_code, value) in self.pending_constants.drain(..) {
            self.tables.constants.push(ConstantRow {
                type_code,
                parent: CodedIndex(parent),
                value,
            });
        }

        sort_pending(&mut self.pending_marshals, |(parent, _)| *parent);
        for (parent, native_type) in self.pending_marshals.drain(..) {
            self.tables.field_marshals.push(FieldMarshalRow {
                parent: CodedIndex(parent),
                native_type,
            });
        }

        sort_pending(&mut self.pending_security, |(parent, _, _)| *parent);
        for (parent, action, permission_set) in self.pending_security.drain(..) {
            self.tables.decl_security.push(DeclSecurityRow {
                action,
                parent: CodedIndex(parent),
                permission_set,
            });
        }

        sort_pending(&mut self.pending_semantics, |(association, _, _)| {
            *association
        });
        for (association, semantics, method) in self.pending_semantics.drain(..) {
            self.tables.method_semantics.push(MethodSemanticsRow {
                semantics,
                method,
                association: CodedIndex(association),
            });
        }

        sort_pending(&mut self.pending_attributes, |(parent, _, _)| *parent);
        for (parent, constructor, value) in self.pending_attributes.drain(..) {
            self.tables.custom_attributes.push(CustomAttributeRow {
                parent: CodedIndex(parent),
                constructor,
                value,
            });
        }
    }

    /// Logs every populated row into the EnC tables of an uncompressed delta.
    fn populate_enc_tables(&mut self) {
        if self.indexer.module.generation_kind != GenerationKind::UncompressedDelta {
            return;
        }
        let counts = self.tables.row_counts();
        for table in TableId::iter() {
            if matches!(table, TableId::EncLog | TableId::EncMap) {
                continue;
            }
            for row in 1..=counts[table as usize] {
                let token = Token::from_table_row(table, row).value();
                self.tables.enc_logs.push(EncLogRow {
                    token,
                    func_code: 0,
                });
                self.tables.enc_maps.push(EncMapRow { token });
            }
        }
    }
}

/// Stably sorts `pending` by `key`, skipping the sort when a linear scan finds
/// the entries already in order.
fn sort_pending<T, K: Ord>(pending: &mut [T], key: impl Fn(&T) -> K + Copy) {
    let sorted = pending
        .windows(2)
        .all(|pair| key(&pair[0]) <= key(&pair[1]));
    if !sorted {
        pending.sort_by_key(key);
    }
}

/// Type code and value bytes of one Constant row blob.
fn constant_blob(value: &ConstantValue) -> (u8, Vec<u8>) {
    match value {
        ConstantValue::Boolean(v) => (element_type::BOOLEAN, vec![u8::from(*v)]),
        ConstantValue::Char(v) => (element_type::CHAR, v.to_le_bytes().to_vec()),
        ConstantValue::I1(v) => (element_type::I1, v.to_le_bytes().to_vec()),
        ConstantValue::U1(v) => (element_type::U1, v.to_le_bytes().to_vec()),
        ConstantValue::I2(v) => (element_type::I2, v.to_le_bytes().to_vec()),
        ConstantValue::U2(v) => (element_type::U2, v.to_le_bytes().to_vec()),
        ConstantValue::I4(v) => (element_type::I4, v.to_le_bytes().to_vec()),
        ConstantValue::U4(v) => (element_type::U4, v.to_le_bytes().to_vec()),
        ConstantValue::I8(v) => (element_type::I8, v.to_le_bytes().to_vec()),
        ConstantValue::U8(v) => (element_type::U8, v.to_le_bytes().to_vec()),
        ConstantValue::R4(v) => (element_type::R4, v.to_le_bytes().to_vec()),
        ConstantValue::R8(v) => (element_type::R8, v.to_le_bytes().to_vec()),
        ConstantValue::String(Some(v)) => {
            let units = U16String::from_str(v);
            let mut bytes = Vec::with_capacity(units.len() * 2);
            for unit in units.as_slice() {
                bytes.extend_from_slice(&unit.to_le_bytes());
            }
            (element_type::STRING, bytes)
        }
        // Null strings and null references both use the CLASS code with a
        // 4-byte zero value.
        ConstantValue::String(None) | ConstantValue::Null => {
            (element_type::CLASS, vec![0u8; 4])
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::model::{
        ClassLayoutData, FieldData, FileData, MethodData, ModuleData, TypeDefData,
    };
    use crate::metadata::signatures::{MethodSignature, TypeSig};
    use uguid::Guid;

    fn populate(module: &ModuleData) -> (TableSet, Vec<EmitDiagnostic>) {
        let mut indexer = ReferenceIndexer::new(module);
        indexer.create_indices().unwrap();
        indexer.close();
        let mut heaps = MetadataHeaps::new();
        let bodies = HashMap::new();
        let builder = TableBuilder::new(&mut indexer, &mut heaps, &bodies);
        let mut mapped = Vec::new();
        let mut resources = Vec::new();
        builder.populate(&mut mapped, &mut resources).unwrap()
    }

    #[test]
    fn test_single_type_with_members() {
        let mut module = ModuleData::new("demo.dll", Guid::ZERO);
        let ty = module.add_type(TypeDefData::new("N", "C", 0x0010_0001));
        module.add_field(ty, FieldData::new("F", 0x0006, TypeSig::I4));
        module.add_method(
            ty,
            MethodData::new("M", 0x0086, MethodSignature::instance_void()),
        );

        let (tables, diagnostics) = populate(&module);
        assert!(diagnostics.is_empty());
        assert_eq!(tables.modules.len(), 1);
        assert_eq!(tables.type_defs.len(), 1);
        assert_eq!(tables.fields.len(), 1);
        assert_eq!(tables.methods.len(), 1);
        assert!(tables.params.is_empty());

        let type_def = &tables.type_defs[0];
        assert_eq!(type_def.field_list, 1);
        assert_eq!(type_def.method_list, 1);
        assert_eq!(type_def.extends, CodedIndex::null());
    }

    #[test]
    fn test_nested_class_and_layout_rows() {
        let mut module = ModuleData::new("demo.dll", Guid::ZERO);
        let mut outer = TypeDefData::new("N", "Outer", 0);
        outer.layout = Some(ClassLayoutData {
            packing_size: 4,
            class_size: 16,
        });
        let outer = module.add_type(outer);
        module.add_nested_type(outer, TypeDefData::new("", "Inner", 0x0000_0002));

        let (tables, _) = populate(&module);
        assert_eq!(tables.nested_classes.len(), 1);
        assert_eq!(tables.nested_classes[0].nested_class, 2);
        assert_eq!(tables.nested_classes[0].enclosing_class, 1);
        assert_eq!(tables.class_layouts.len(), 1);
        assert_eq!(tables.class_layouts[0].parent, 1);
    }

    #[test]
    fn test_constants_sorted_by_coded_parent() {
        let mut module = ModuleData::new("demo.dll", Guid::ZERO);
        let ty = module.add_type(TypeDefData::new("N", "C", 0));
        // Three fields; constants attached out of numeric coded order.
        let mut f1 = FieldData::new("A", 0x8056, TypeSig::I4);
        f1.constant = Some(ConstantValue::I4(1));
        let mut f2 = FieldData::new("B", 0x8056, TypeSig::I4);
        f2.constant = Some(ConstantValue::I4(2));
        module.add_field(ty, f1);
        module.add_field(ty, f2);
        let mut m = MethodData::new("M", 0x0086, MethodSignature::instance_void());
        m.params.push(crate::metadata::model::ParamData {
            name: "x".to_string(),
            flags: 0x1000,
            sequence: 1,
            constant: Some(ConstantValue::Boolean(true)),
            marshalling: None,
            custom_attributes: Vec::new(),
        });
        module.add_method(ty, m);

        let (tables, _) = populate(&module);
        assert_eq!(tables.constants.len(), 3);
        let parents: Vec<u32> = tables.constants.iter().map(|c| c.parent.0).collect();
        let mut sorted = parents.clone();
        sorted.sort_unstable();
        assert_eq!(parents, sorted);
        // Field row 1 tag 0 precedes param row 1 tag 1.
        assert_eq!(parents[0], 1 << 2);
        assert_eq!(tables.constants[0].type_code, element_type::I4);
    }

    #[test]
    fn test_sort_pending_skips_sorted_and_stays_stable() {
        // Already in order: the linear scan skips the sort and nothing moves,
        // including equal-key neighbours.
        let mut sorted = vec![(1u32, 'a'), (2, 'b'), (2, 'c'), (5, 'd')];
        sort_pending(&mut sorted, |(key, _)| *key);
        assert_eq!(sorted, vec![(1, 'a'), (2, 'b'), (2, 'c'), (5, 'd')]);

        // Out of order: sorted stably, equal keys keep collection order.
        let mut unsorted = vec![(5u32, 'a'), (2, 'b'), (2, 'c'), (1, 'd')];
        sort_pending(&mut unsorted, |(key, _)| *key);
        assert_eq!(unsorted, vec![(1, 'd'), (2, 'b'), (2, 'c'), (5, 'a')]);
    }

    #[test]
    fn test_null_constant_encoding() {
        let (code, bytes) = constant_blob(&ConstantValue::String(None));
        assert_eq!(code, element_type::CLASS);
        assert_eq!(bytes, vec![0, 0, 0, 0]);

        let (code, bytes) = constant_blob(&ConstantValue::String(Some("ab".to_string())));
        assert_eq!(code, element_type::STRING);
        assert_eq!(bytes, vec![0x61, 0x00, 0x62, 0x00]);
    }

    #[test]
    fn test_embedded_resource_layout() {
        let mut module = ModuleData::new("demo.dll", Guid::ZERO);
        module.resources.push(crate::metadata::model::ManifestResourceData {
            name: "data.bin".to_string(),
            is_public: true,
            location: ResourceLocation::Embedded(Box::new(vec![0xAAu8; 5])),
        });

        let mut indexer = ReferenceIndexer::new(&module);
        indexer.create_indices().unwrap();
        indexer.close();
        let mut heaps = MetadataHeaps::new();
        let bodies = HashMap::new();
        let builder = TableBuilder::new(&mut indexer, &mut heaps, &bodies);
        let mut mapped = Vec::new();
        let mut resources = Vec::new();
        let (tables, _) = builder.populate(&mut mapped, &mut resources).unwrap();

        assert_eq!(tables.resources.len(), 1);
        assert_eq!(tables.resources[0].offset, 0);
        assert_eq!(tables.resources[0].flags, RESOURCE_PUBLIC);
        // u32 length prefix then the payload.
        assert_eq!(&resources[..4], &5u32.to_le_bytes());
        assert_eq!(&resources[4..9], &[0xAA; 5]);
    }

    #[test]
    fn test_forwarder_flags_propagate_to_nested() {
        let mut module = ModuleData::new("demo.dll", Guid::ZERO);
        let target = module.add_assembly_ref(crate::metadata::model::AssemblyRefData {
            name: "Lib".to_string(),
            version: (1, 0, 0, 0),
            flags: 0,
            public_key_or_token: Vec::new(),
            culture: String::new(),
            hash_value: Vec::new(),
        });
        module.exported_types.push(ExportedTypeData {
            name: "Forwarded".to_string(),
            namespace: "N".to_string(),
            scope: ExportScope::Assembly(target),
            type_def_id: 0x0200_0001,
            nested: vec![ExportedTypeData {
                name: "Inner".to_string(),
                namespace: String::new(),
                scope: ExportScope::Assembly(target),
                type_def_id: 0x0200_0002,
                nested: Vec::new(),
            }],
        });

        let (tables, _) = populate(&module);
        assert_eq!(tables.exported_types.len(), 2);
        assert_eq!(tables.exported_types[0].flags, EXPORTED_FORWARDER);
        assert_eq!(tables.exported_types[0].type_def_id, 0);
        assert_eq!(tables.exported_types[1].flags, EXPORTED_FORWARDER);
        // The nested row's implementation points at the parent row.
        assert_eq!(
            tables.exported_types[1].implementation,
            CodedIndex::encode(CodedIndexType::Implementation, TableId::ExportedType, 1)
                .unwrap()
        );
    }

    #[test]
    fn test_file_rows_respect_metadata_flag() {
        let mut module = ModuleData::new("demo.dll", Guid::ZERO);
        module.add_file(FileData {
            name: "other.netmodule".to_string(),
            hash_value: vec![1, 2, 3],
            contains_metadata: true,
        });
        module.add_file(FileData {
            name: "data.bin".to_string(),
            hash_value: vec![4, 5, 6],
            contains_metadata: false,
        });

        let (tables, _) = populate(&module);
        assert_eq!(tables.files[0].flags, 0);
        assert_eq!(tables.files[1].flags, FILE_CONTAINS_NO_METADATA);
    }

    #[test]
    fn test_enc_tables_only_for_uncompressed_delta() {
        let mut module = ModuleData::new("demo.dll", Guid::ZERO);
        module.add_type(TypeDefData::new("N", "C", 0));
        let (tables, _) = populate(&module);
        assert!(tables.enc_logs.is_empty());

        module.generation_kind = GenerationKind::UncompressedDelta;
        module.generation = 1;
        let (tables, _) = populate(&module);
        assert!(!tables.enc_logs.is_empty());
        assert_eq!(tables.enc_logs.len(), tables.enc_maps.len());
        // Module row 1 and TypeDef row 1 tokens are logged.
        let tokens: Vec<u32> = tables.enc_logs.iter().map(|row| row.token).collect();
        assert!(tokens.contains(&0x0000_0001));
        assert!(tokens.contains(&0x0200_0001));
    }
}
