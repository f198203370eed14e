//! # Definition Walk and Reference Discovery
//!
//! [`ReferenceIndexer`] performs the single traversal that pins every row id of
//! a generation. Definitions are walked top-level-first, then breadth-first
//! through nested types, so an enclosing type's row always precedes its nested
//! types' rows; within a type the order is generic parameters, method-impls,
//! events, fields, methods (with their parameters), properties. A second pass
//! interns every reference reachable from signatures, attributes and member
//! lists. Method bodies may still intern references (stand-alone signatures,
//! `ldtoken` targets) afterwards; [`ReferenceIndexer::close`] ends that window.

use std::collections::HashMap;

use crate::metadata::index::{
    DefinitionIndex, HeapOrReferenceIndex, InstanceAndStructuralIndex,
};
use crate::metadata::model::{
    AssemblyRefHandle, CustomAttributeData, FieldHandle, FieldRef, FieldRefData, MemberRefParent,
    MethodHandle, MethodInstantiation, MethodRef, MethodRefData, ModuleData, ModuleRefHandle,
    NamedType, ResolutionScope, TypeDefOrRef, TypeHandle, TypeRefHandle,
};
use crate::metadata::signatures::{MethodSignature, NamedTypeResolver, TypeSig};
use crate::metadata::tables::{CodedIndex, CodedIndexType, TableId};
use crate::metadata::token::Token;
use crate::Result;

/// Key of a TypeRef row: a model reference or a lazily created placeholder
/// parent for module-level assembly attributes.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TypeRefKey {
    /// A type reference from the model
    Handle(TypeRefHandle),
    /// A `System.Runtime.CompilerServices` placeholder type
    AttributePlaceholder {
        /// Placeholder type name
        name: &'static str,
        /// The corelib assembly the placeholder resolves in
        scope: AssemblyRefHandle,
    },
}

/// Structural key of a MemberRef row.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum MemberRefKey {
    /// A field reference
    Field(FieldRefData),
    /// A method reference
    Method(MethodRefData),
}

/// Who declares a generic parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GenericParamOwner {
    /// Declared (or inherited through nesting) by a type
    Type(TypeHandle),
    /// Declared by a method
    Method(MethodHandle),
}

/// Where the parameter's model data lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GenericParamSource {
    /// `module.types[h].generic_params[i]`
    Type(TypeHandle, usize),
    /// `module.methods[h].generic_params[i]`
    Method(MethodHandle, usize),
}

/// One generic parameter in walk order, before the owner sort.
#[derive(Debug, Clone, Copy)]
pub struct GenericParamEntry {
    /// Row owner
    pub owner: GenericParamOwner,
    /// Consolidated 0-based number within the owner
    pub number: u16,
    /// Backing model data
    pub source: GenericParamSource,
}

/// All row indices of one generation, plus the walk bookkeeping the table
/// builder replays.
pub struct ReferenceIndexer<'m> {
    /// The module being emitted
    pub module: &'m ModuleData,
    /// Types in definition walk order
    pub type_walk: Vec<TypeHandle>,
    /// Generic parameters in walk order (sorted by owner at population time)
    pub generic_params: Vec<GenericParamEntry>,
    /// TypeDef rows
    pub type_rows: DefinitionIndex<TypeHandle>,
    /// Field rows
    pub field_rows: DefinitionIndex<FieldHandle>,
    /// MethodDef rows
    pub method_rows: DefinitionIndex<MethodHandle>,
    /// Param rows, keyed by method and parameter position
    pub param_rows: DefinitionIndex<(MethodHandle, usize)>,
    /// Event rows, keyed by type and event position
    pub event_rows: DefinitionIndex<(TypeHandle, usize)>,
    /// Property rows, keyed by type and property position
    pub property_rows: DefinitionIndex<(TypeHandle, usize)>,
    /// TypeDef.FieldList per type
    pub first_field_row: HashMap<TypeHandle, u32>,
    /// TypeDef.MethodList per type
    pub first_method_row: HashMap<TypeHandle, u32>,
    /// MethodDef.ParamList per method
    pub first_param_row: HashMap<MethodHandle, u32>,
    /// TypeRef rows
    pub type_refs: HeapOrReferenceIndex<TypeRefKey>,
    /// TypeSpec rows
    pub type_specs: InstanceAndStructuralIndex<TypeSig>,
    /// MemberRef rows
    pub member_refs: HeapOrReferenceIndex<MemberRefKey>,
    /// MethodSpec rows
    pub method_specs: InstanceAndStructuralIndex<MethodInstantiation>,
    /// AssemblyRef rows
    pub assembly_refs: HeapOrReferenceIndex<AssemblyRefHandle>,
    /// ModuleRef rows
    pub module_refs: HeapOrReferenceIndex<ModuleRefHandle>,
    /// StandAloneSig rows, keyed by signature blob offset
    pub standalone_sigs: HeapOrReferenceIndex<u32>,
}

impl<'m> ReferenceIndexer<'m> {
    /// Creates an empty indexer over `module`.
    #[must_use]
    pub fn new(module: &'m ModuleData) -> Self {
        ReferenceIndexer {
            module,
            type_walk: Vec::new(),
            generic_params: Vec::new(),
            type_rows: DefinitionIndex::new(TableId::TypeDef),
            field_rows: DefinitionIndex::new(TableId::Field),
            method_rows: DefinitionIndex::new(TableId::MethodDef),
            param_rows: DefinitionIndex::new(TableId::Param),
            event_rows: DefinitionIndex::new(TableId::Event),
            property_rows: DefinitionIndex::new(TableId::Property),
            first_field_row: HashMap::new(),
            first_method_row: HashMap::new(),
            first_param_row: HashMap::new(),
            type_refs: HeapOrReferenceIndex::new(TableId::TypeRef),
            type_specs: InstanceAndStructuralIndex::new(TableId::TypeSpec),
            member_refs: HeapOrReferenceIndex::new(TableId::MemberRef),
            method_specs: InstanceAndStructuralIndex::new(TableId::MethodSpec),
            assembly_refs: HeapOrReferenceIndex::new(TableId::AssemblyRef),
            module_refs: HeapOrReferenceIndex::new(TableId::ModuleRef),
            standalone_sigs: HeapOrReferenceIndex::new(TableId::StandAloneSig),
        }
    }

    /// Runs the definition walk and the reference-discovery pass.
    ///
    /// # Errors
    ///
    /// Propagates row overflow and producer contract violations.
    pub fn create_indices(&mut self) -> Result<()> {
        self.walk_definitions()?;
        self.discover_references()
    }

    /// Closes every reference index; method bodies must be encoded before this.
    pub fn close(&mut self) {
        self.type_refs.close();
        self.type_specs.close();
        self.member_refs.close();
        self.method_specs.close();
        self.assembly_refs.close();
        self.module_refs.close();
        self.standalone_sigs.close();
    }

    fn walk_definitions(&mut self) -> Result<()> {
        let mut queue: std::collections::VecDeque<TypeHandle> =
            self.module.top_level_types.iter().copied().collect();

        while let Some(handle) = queue.pop_front() {
            self.index_type(handle)?;
            for nested in &self.module.types[handle.0].nested {
                queue.push_back(*nested);
            }
        }
        Ok(())
    }

    fn index_type(&mut self, handle: TypeHandle) -> Result<()> {
        let module = self.module;
        self.type_walk.push(handle);
        self.type_rows.add(handle)?;

        // Generic parameters, with enclosing containers' parameters first; the
        // walked type re-declares inherited parameters under its own owner.
        let mut number = 0u16;
        for (defining, index) in self.consolidated_generic_params(handle) {
            self.generic_params.push(GenericParamEntry {
                owner: GenericParamOwner::Type(handle),
                number,
                source: GenericParamSource::Type(defining, index),
            });
            number += 1;
        }

        let data = &module.types[handle.0];

        for (index, _) in data.events.iter().enumerate() {
            self.event_rows.add((handle, index))?;
        }

        self.first_field_row
            .insert(handle, self.field_rows.len() + 1);
        for field in &data.fields {
            self.field_rows.add(*field)?;
        }

        self.first_method_row
            .insert(handle, self.method_rows.len() + 1);
        for method in &data.methods {
            self.method_rows.add(*method)?;
            self.first_param_row
                .insert(*method, self.param_rows.len() + 1);
            let method_data = &module.methods[method.0];
            for (index, _) in method_data.params.iter().enumerate() {
                self.param_rows.add((*method, index))?;
            }
            for (index, _) in method_data.generic_params.iter().enumerate() {
                self.generic_params.push(GenericParamEntry {
                    owner: GenericParamOwner::Method(*method),
                    number: u16::try_from(index).map_err(|_| {
                        unexpected_error!("Generic parameter number {} exceeds u16", index)
                    })?,
                    source: GenericParamSource::Method(*method, index),
                });
            }
        }

        for (index, _) in data.properties.iter().enumerate() {
            self.property_rows.add((handle, index))?;
        }
        Ok(())
    }

    /// Enclosing containers' generic parameters first, then the type's own.
    fn consolidated_generic_params(&self, handle: TypeHandle) -> Vec<(TypeHandle, usize)> {
        let mut chain = Vec::new();
        let mut current = Some(handle);
        while let Some(ty) = current {
            chain.push(ty);
            current = self.module.types[ty.0].enclosing;
        }
        chain.reverse();

        let mut params = Vec::new();
        for ty in chain {
            for index in 0..self.module.types[ty.0].generic_params.len() {
                params.push((ty, index));
            }
        }
        params
    }

    fn discover_references(&mut self) -> Result<()> {
        let module = self.module;

        if let Some(assembly) = &module.assembly {
            for attribute in &assembly.custom_attributes {
                self.visit_attribute(attribute)?;
            }
        }
        for attribute in &module.custom_attributes {
            self.visit_attribute(attribute)?;
        }
        // Netmodule assembly-level attributes hang off placeholder TypeRefs;
        // intern those rows now so population after close only looks them up.
        for attribute in &module.assembly_attributes {
            self.attribute_placeholder_row(attribute.is_security, attribute.allow_multiple)?;
            self.visit_attribute(attribute)?;
        }

        for handle in self.type_walk.clone() {
            let data = &module.types[handle.0];

            if let Some(extends) = &data.extends {
                self.visit_type_def_or_ref(extends)?;
            }
            for interface in &data.interfaces {
                self.visit_type_def_or_ref(interface)?;
            }
            for attribute in &data.custom_attributes {
                self.visit_attribute(attribute)?;
            }
            for param in &data.generic_params {
                for constraint in &param.constraints {
                    self.visit_type_def_or_ref(constraint)?;
                }
                for attribute in &param.custom_attributes {
                    self.visit_attribute(attribute)?;
                }
            }
            for method_impl in &data.method_impls {
                self.visit_method_ref(&method_impl.body)?;
                self.visit_method_ref(&method_impl.declaration)?;
            }
            for event in &data.events {
                self.visit_type_def_or_ref(&event.event_type)?;
                for attribute in &event.custom_attributes {
                    self.visit_attribute(attribute)?;
                }
            }
            for field in &data.fields {
                let field_data = &module.fields[field.0];
                self.visit_type_sig(&field_data.field_type)?;
                for attribute in &field_data.custom_attributes {
                    self.visit_attribute(attribute)?;
                }
            }
            for method in &data.methods {
                let method_data = &module.methods[method.0];
                self.visit_method_signature(&method_data.signature)?;
                if let Some(pinvoke) = &method_data.pinvoke {
                    self.module_refs.get_or_add(&pinvoke.module)?;
                }
                for param in &method_data.params {
                    for attribute in &param.custom_attributes {
                        self.visit_attribute(attribute)?;
                    }
                }
                for generic in &method_data.generic_params {
                    for constraint in &generic.constraints {
                        self.visit_type_def_or_ref(constraint)?;
                    }
                    for attribute in &generic.custom_attributes {
                        self.visit_attribute(attribute)?;
                    }
                }
                for attribute in &method_data.custom_attributes {
                    self.visit_attribute(attribute)?;
                }
                if let Some(body) = &method_data.body {
                    for region in &body.exception_regions {
                        if let crate::metadata::model::ExceptionRegionKind::Catch(ty) =
                            &region.kind
                        {
                            self.visit_type_def_or_ref(ty)?;
                        }
                    }
                }
            }
            for property in &data.properties {
                self.visit_method_signature(&property.signature)?;
                for attribute in &property.custom_attributes {
                    self.visit_attribute(attribute)?;
                }
            }
        }

        for export in &module.exported_types {
            if let crate::metadata::model::ExportScope::Assembly(assembly) = export.scope {
                self.assembly_refs.get_or_add(&assembly)?;
            }
        }
        for resource in &module.resources {
            if let crate::metadata::model::ResourceLocation::Assembly(assembly) =
                resource.location
            {
                self.assembly_refs.get_or_add(&assembly)?;
            }
        }
        Ok(())
    }

    /// Row of a model type reference, interning its scope chain on first sight.
    ///
    /// # Errors
    ///
    /// [`Error::PhaseViolation`] for a new reference after close.
    pub fn type_ref_row(&mut self, handle: TypeRefHandle) -> Result<u32> {
        let before = self.type_refs.len();
        let row = self.type_refs.get_or_add(&TypeRefKey::Handle(handle))?;
        if self.type_refs.len() > before {
            match self.module.type_refs[handle.0].scope {
                ResolutionScope::Assembly(assembly) => {
                    self.assembly_refs.get_or_add(&assembly)?;
                }
                ResolutionScope::Module(module_ref) => {
                    self.module_refs.get_or_add(&module_ref)?;
                }
                ResolutionScope::Nested(enclosing) => {
                    self.type_ref_row(enclosing)?;
                }
                ResolutionScope::CurrentModule => {}
            }
        }
        Ok(row)
    }

    /// Row of a TypeSpec for the given constructed type.
    ///
    /// # Errors
    ///
    /// [`Error::PhaseViolation`] for a new spec after close.
    pub fn type_spec_row(&mut self, sig: &TypeSig) -> Result<u32> {
        self.type_specs.get_or_add(sig)
    }

    fn visit_type_def_or_ref(&mut self, ty: &TypeDefOrRef) -> Result<()> {
        match ty {
            TypeDefOrRef::Definition(_) => Ok(()),
            TypeDefOrRef::Reference(handle) => {
                self.type_ref_row(*handle)?;
                Ok(())
            }
            TypeDefOrRef::Specification(sig) => {
                self.visit_type_sig(sig)?;
                self.type_specs.get_or_add(sig)?;
                Ok(())
            }
        }
    }

    fn visit_named_type(&mut self, named: &NamedType) -> Result<()> {
        if let NamedType::Reference(handle) = named {
            self.type_ref_row(*handle)?;
        }
        Ok(())
    }

    fn visit_type_sig(&mut self, sig: &TypeSig) -> Result<()> {
        match sig {
            TypeSig::Class(named) | TypeSig::ValueType(named) => self.visit_named_type(named),
            TypeSig::SzArray(inner)
            | TypeSig::Ptr(inner)
            | TypeSig::ByRef(inner)
            | TypeSig::Pinned(inner) => self.visit_type_sig(inner),
            TypeSig::Array { element, .. } => self.visit_type_sig(element),
            TypeSig::FnPtr(signature) => self.visit_method_signature(signature),
            TypeSig::GenericInst {
                definition, args, ..
            } => {
                self.visit_named_type(definition)?;
                for arg in args {
                    self.visit_type_sig(arg)?;
                }
                Ok(())
            }
            TypeSig::ModReq { modifier, inner } | TypeSig::ModOpt { modifier, inner } => {
                self.visit_named_type(modifier)?;
                self.visit_type_sig(inner)
            }
            _ => Ok(()),
        }
    }

    fn visit_method_signature(&mut self, signature: &MethodSignature) -> Result<()> {
        self.visit_type_sig(&signature.return_type)?;
        for param in &signature.params {
            self.visit_type_sig(param)?;
        }
        for param in &signature.varargs {
            self.visit_type_sig(param)?;
        }
        Ok(())
    }

    /// Row of a member reference, interning it and its parent on first sight.
    ///
    /// # Errors
    ///
    /// [`Error::PhaseViolation`] for a new reference after close.
    pub fn member_ref_row(&mut self, key: &MemberRefKey) -> Result<u32> {
        match key {
            MemberRefKey::Field(data) => {
                self.visit_member_ref_parent(&data.parent)?;
                self.visit_type_sig(&data.field_type)?;
            }
            MemberRefKey::Method(data) => {
                self.visit_member_ref_parent(&data.parent)?;
                self.visit_method_signature(&data.signature)?;
            }
        }
        self.member_refs.get_or_add(key)
    }

    fn visit_member_ref_parent(&mut self, parent: &MemberRefParent) -> Result<()> {
        match parent {
            MemberRefParent::Type(ty) => self.visit_type_def_or_ref(ty),
            MemberRefParent::Module(module_ref) => {
                self.module_refs.get_or_add(module_ref)?;
                Ok(())
            }
            MemberRefParent::Method(_) => Ok(()),
        }
    }

    fn visit_method_ref(&mut self, method: &MethodRef) -> Result<()> {
        match method {
            MethodRef::Definition(_) => Ok(()),
            MethodRef::Reference(data) => {
                self.member_ref_row(&MemberRefKey::Method((**data).clone()))?;
                Ok(())
            }
            MethodRef::Instantiation(inst) => {
                self.method_spec_row(inst)?;
                Ok(())
            }
        }
    }

    /// Row of a MethodSpec, interning the generic method and arguments too.
    ///
    /// # Errors
    ///
    /// [`Error::PhaseViolation`] for a new spec after close.
    pub fn method_spec_row(&mut self, inst: &MethodInstantiation) -> Result<u32> {
        self.visit_method_ref(&inst.method)?;
        for arg in &inst.type_arguments {
            self.visit_type_sig(arg)?;
        }
        self.method_specs.get_or_add(inst)
    }

    fn visit_attribute(&mut self, attribute: &CustomAttributeData) -> Result<()> {
        self.visit_method_ref(&attribute.constructor)?;
        if let crate::metadata::model::AttributeValue::Structured {
            fixed_args,
            named_args,
        } = &attribute.value
        {
            for arg in fixed_args {
                self.visit_attribute_arg(arg)?;
            }
            for named in named_args {
                self.visit_attribute_element_kind(&named.kind)?;
                self.visit_attribute_arg(&named.value)?;
            }
        }
        Ok(())
    }

    fn visit_attribute_arg(
        &mut self,
        arg: &crate::metadata::model::AttributeArg,
    ) -> Result<()> {
        use crate::metadata::model::AttributeArg;
        match arg {
            AttributeArg::Type(Some(named)) | AttributeArg::Enum(named, _) => {
                self.visit_named_type(named)?;
                if let AttributeArg::Enum(_, value) = arg {
                    self.visit_attribute_arg(value)?;
                }
            }
            AttributeArg::Boxed(value) => self.visit_attribute_arg(value)?,
            AttributeArg::Array(Some(elements), kind) => {
                self.visit_attribute_element_kind(kind)?;
                for element in elements {
                    self.visit_attribute_arg(element)?;
                }
            }
            AttributeArg::Array(None, kind) => self.visit_attribute_element_kind(kind)?,
            _ => {}
        }
        Ok(())
    }

    fn visit_attribute_element_kind(
        &mut self,
        kind: &crate::metadata::model::AttributeElementKind,
    ) -> Result<()> {
        if let crate::metadata::model::AttributeElementKind::Enum(named, _) = kind {
            self.visit_named_type(named)?;
        }
        Ok(())
    }

    /// TypeDefOrRef coded index of a type mention.
    ///
    /// # Errors
    ///
    /// Propagates missing-row contract violations.
    pub fn type_def_or_ref_coded(&mut self, ty: &TypeDefOrRef) -> Result<CodedIndex> {
        match ty {
            TypeDefOrRef::Definition(handle) => CodedIndex::encode(
                CodedIndexType::TypeDefOrRef,
                TableId::TypeDef,
                self.type_rows.row(*handle)?,
            ),
            TypeDefOrRef::Reference(handle) => {
                let row = self.type_ref_row(*handle)?;
                CodedIndex::encode(CodedIndexType::TypeDefOrRef, TableId::TypeRef, row)
            }
            TypeDefOrRef::Specification(sig) => {
                let row = self.type_specs.get_or_add(sig)?;
                CodedIndex::encode(CodedIndexType::TypeDefOrRef, TableId::TypeSpec, row)
            }
        }
    }

    /// MethodDefOrRef coded index of a method mention.
    ///
    /// # Errors
    ///
    /// [`Error::Unexpected`] for a method instantiation, which this coded-index
    /// family cannot express.
    pub fn method_def_or_ref_coded(&mut self, method: &MethodRef) -> Result<CodedIndex> {
        match method {
            MethodRef::Definition(handle) => CodedIndex::encode(
                CodedIndexType::MethodDefOrRef,
                TableId::MethodDef,
                self.method_rows.row(*handle)?,
            ),
            MethodRef::Reference(data) => {
                let row = self.member_ref_row(&MemberRefKey::Method((**data).clone()))?;
                CodedIndex::encode(CodedIndexType::MethodDefOrRef, TableId::MemberRef, row)
            }
            MethodRef::Instantiation(_) => Err(unexpected_error!(
                "A method instantiation cannot appear as MethodDefOrRef"
            )),
        }
    }

    /// CustomAttributeType coded index of an attribute constructor.
    ///
    /// # Errors
    ///
    /// [`Error::Unexpected`] for a method instantiation constructor.
    pub fn custom_attribute_type_coded(&mut self, method: &MethodRef) -> Result<CodedIndex> {
        match method {
            MethodRef::Definition(handle) => CodedIndex::encode(
                CodedIndexType::CustomAttributeType,
                TableId::MethodDef,
                self.method_rows.row(*handle)?,
            ),
            MethodRef::Reference(data) => {
                let row = self.member_ref_row(&MemberRefKey::Method((**data).clone()))?;
                CodedIndex::encode(CodedIndexType::CustomAttributeType, TableId::MemberRef, row)
            }
            MethodRef::Instantiation(_) => Err(unexpected_error!(
                "A method instantiation cannot construct a custom attribute"
            )),
        }
    }

    /// MemberRefParent coded index of a member-reference scope.
    ///
    /// # Errors
    ///
    /// Propagates missing-row contract violations.
    pub fn member_ref_parent_coded(&mut self, parent: &MemberRefParent) -> Result<CodedIndex> {
        match parent {
            MemberRefParent::Type(TypeDefOrRef::Definition(handle)) => CodedIndex::encode(
                CodedIndexType::MemberRefParent,
                TableId::TypeDef,
                self.type_rows.row(*handle)?,
            ),
            MemberRefParent::Type(TypeDefOrRef::Reference(handle)) => {
                let row = self.type_ref_row(*handle)?;
                CodedIndex::encode(CodedIndexType::MemberRefParent, TableId::TypeRef, row)
            }
            MemberRefParent::Type(TypeDefOrRef::Specification(sig)) => {
                let row = self.type_specs.get_or_add(sig)?;
                CodedIndex::encode(CodedIndexType::MemberRefParent, TableId::TypeSpec, row)
            }
            MemberRefParent::Module(module_ref) => {
                let row = self.module_refs.get_or_add(module_ref)?;
                CodedIndex::encode(CodedIndexType::MemberRefParent, TableId::ModuleRef, row)
            }
            MemberRefParent::Method(handle) => CodedIndex::encode(
                CodedIndexType::MemberRefParent,
                TableId::MethodDef,
                self.method_rows.row(*handle)?,
            ),
        }
    }

    /// Final metadata token of a type mention.
    ///
    /// # Errors
    ///
    /// Propagates interning and row-lookup failures.
    pub fn token_for_type(&mut self, ty: &TypeDefOrRef) -> Result<Token> {
        match ty {
            TypeDefOrRef::Definition(handle) => Ok(Token::from_table_row(
                TableId::TypeDef,
                self.type_rows.row(*handle)?,
            )),
            TypeDefOrRef::Reference(handle) => {
                let row = self.type_ref_row(*handle)?;
                Ok(Token::from_table_row(TableId::TypeRef, row))
            }
            TypeDefOrRef::Specification(sig) => {
                self.visit_type_sig(sig)?;
                let row = self.type_specs.get_or_add(sig)?;
                Ok(Token::from_table_row(TableId::TypeSpec, row))
            }
        }
    }

    /// Final metadata token of a field mention.
    ///
    /// # Errors
    ///
    /// Propagates interning and row-lookup failures.
    pub fn token_for_field(&mut self, field: &FieldRef) -> Result<Token> {
        match field {
            FieldRef::Definition(handle) => Ok(Token::from_table_row(
                TableId::Field,
                self.field_rows.row(*handle)?,
            )),
            FieldRef::Reference(data) => {
                let row = self.member_ref_row(&MemberRefKey::Field((**data).clone()))?;
                Ok(Token::from_table_row(TableId::MemberRef, row))
            }
        }
    }

    /// Final metadata token of a method mention.
    ///
    /// # Errors
    ///
    /// Propagates interning and row-lookup failures.
    pub fn token_for_method(&mut self, method: &MethodRef) -> Result<Token> {
        match method {
            MethodRef::Definition(handle) => Ok(Token::from_table_row(
                TableId::MethodDef,
                self.method_rows.row(*handle)?,
            )),
            MethodRef::Reference(data) => {
                let row = self.member_ref_row(&MemberRefKey::Method((**data).clone()))?;
                Ok(Token::from_table_row(TableId::MemberRef, row))
            }
            MethodRef::Instantiation(inst) => {
                let row = self.method_spec_row(inst)?;
                Ok(Token::from_table_row(TableId::MethodSpec, row))
            }
        }
    }

    /// StandAloneSig row for an encoded signature blob.
    ///
    /// # Errors
    ///
    /// [`Error::PhaseViolation`] for a new signature after close.
    pub fn standalone_sig_row(&mut self, blob_offset: u32) -> Result<u32> {
        self.standalone_sigs.get_or_add(&blob_offset)
    }

    /// Row of the placeholder TypeRef parenting module-level assembly
    /// attributes, created lazily per (security, allow-multiple) combination.
    ///
    /// # Errors
    ///
    /// [`Error::Unexpected`] when the model declares no corelib reference.
    pub fn attribute_placeholder_row(
        &mut self,
        is_security: bool,
        allow_multiple: bool,
    ) -> Result<u32> {
        let name = match (is_security, allow_multiple) {
            (false, false) => "AssemblyAttributesGoHere",
            (false, true) => "AssemblyAttributesGoHereM",
            (true, false) => "AssemblyAttributesGoHereS",
            (true, true) => "AssemblyAttributesGoHereSM",
        };
        let scope = self.module.corelib.ok_or_else(|| {
            unexpected_error!("Module-level assembly attributes require a corelib reference")
        })?;
        let before = self.assembly_refs.len();
        self.assembly_refs.get_or_add(&scope)?;
        debug_assert!(self.assembly_refs.len() >= before);
        self.type_refs
            .get_or_add(&TypeRefKey::AttributePlaceholder { name, scope })
    }
}

impl NamedTypeResolver for ReferenceIndexer<'_> {
    fn type_code(&mut self, ty: &NamedType) -> Result<u32> {
        match ty {
            NamedType::Definition(handle) => Ok(self.type_rows.row(*handle)? << 2),
            NamedType::Reference(handle) => Ok((self.type_ref_row(*handle)? << 2) | 1),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::model::{FieldData, MethodData, TypeDefData};
    use crate::Error;
    use uguid::Guid;

    fn two_level_module() -> ModuleData {
        let mut module = ModuleData::new("m.dll", Guid::ZERO);
        let outer_a = module.add_type(TypeDefData::new("N", "A", 0));
        let _outer_b = module.add_type(TypeDefData::new("N", "B", 0));
        let inner = module.add_nested_type(outer_a, TypeDefData::new("", "Inner", 0));
        module.add_nested_type(inner, TypeDefData::new("", "Innermost", 0));
        module
    }

    #[test]
    fn test_walk_is_top_level_then_breadth_first() {
        let module = two_level_module();
        let mut indexer = ReferenceIndexer::new(&module);
        indexer.create_indices().unwrap();

        let names: Vec<&str> = indexer
            .type_walk
            .iter()
            .map(|handle| module.types[handle.0].name.as_str())
            .collect();
        assert_eq!(names, vec!["A", "B", "Inner", "Innermost"]);
    }

    #[test]
    fn test_enclosing_row_precedes_nested_rows() {
        let module = two_level_module();
        let mut indexer = ReferenceIndexer::new(&module);
        indexer.create_indices().unwrap();

        for handle in &indexer.type_walk {
            if let Some(enclosing) = module.types[handle.0].enclosing {
                assert!(
                    indexer.type_rows.row(enclosing).unwrap()
                        < indexer.type_rows.row(*handle).unwrap()
                );
            }
        }
    }

    #[test]
    fn test_first_member_rows() {
        let mut module = ModuleData::new("m.dll", Guid::ZERO);
        let empty = module.add_type(TypeDefData::new("N", "Empty", 0));
        let full = module.add_type(TypeDefData::new("N", "Full", 0));
        module.add_field(full, FieldData::new("F", 0x0006, TypeSig::I4));
        module.add_method(
            full,
            MethodData::new("M", 0x0086, MethodSignature::instance_void()),
        );

        let mut indexer = ReferenceIndexer::new(&module);
        indexer.create_indices().unwrap();

        // The empty type points at the next available rows.
        assert_eq!(indexer.first_field_row[&empty], 1);
        assert_eq!(indexer.first_method_row[&empty], 1);
        assert_eq!(indexer.first_field_row[&full], 1);
        assert_eq!(indexer.first_method_row[&full], 1);
        assert_eq!(indexer.field_rows.len(), 1);
        assert_eq!(indexer.method_rows.len(), 1);
    }

    #[test]
    fn test_reference_interning_is_idempotent() {
        let mut module = ModuleData::new("m.dll", Guid::ZERO);
        let corelib = module.add_assembly_ref(crate::metadata::model::AssemblyRefData {
            name: "mscorlib".to_string(),
            version: (4, 0, 0, 0),
            flags: 0,
            public_key_or_token: Vec::new(),
            culture: String::new(),
            hash_value: Vec::new(),
        });
        let object = module.add_type_ref(crate::metadata::model::TypeRefData {
            scope: ResolutionScope::Assembly(corelib),
            namespace: "System".to_string(),
            name: "Object".to_string(),
        });

        let mut indexer = ReferenceIndexer::new(&module);
        indexer.create_indices().unwrap();
        let first = indexer.type_ref_row(object).unwrap();
        let second = indexer.type_ref_row(object).unwrap();
        assert_eq!(first, second);
        assert_eq!(indexer.type_refs.len(), 1);
        // Interning the type ref pulled in its assembly scope.
        assert_eq!(indexer.assembly_refs.len(), 1);
    }

    #[test]
    fn test_close_gates_new_references() {
        let mut module = ModuleData::new("m.dll", Guid::ZERO);
        let corelib = module.add_assembly_ref(crate::metadata::model::AssemblyRefData {
            name: "mscorlib".to_string(),
            version: (4, 0, 0, 0),
            flags: 0,
            public_key_or_token: Vec::new(),
            culture: String::new(),
            hash_value: Vec::new(),
        });
        let late = module.add_type_ref(crate::metadata::model::TypeRefData {
            scope: ResolutionScope::Assembly(corelib),
            namespace: "System".to_string(),
            name: "Late".to_string(),
        });

        let mut indexer = ReferenceIndexer::new(&module);
        indexer.close();
        assert!(matches!(
            indexer.type_ref_row(late),
            Err(Error::PhaseViolation(_))
        ));
    }

    #[test]
    fn test_nested_generic_params_are_consolidated() {
        let mut module = ModuleData::new("m.dll", Guid::ZERO);
        let mut outer = TypeDefData::new("N", "Outer`1", 0);
        outer.generic_params.push(crate::metadata::model::GenericParamData {
            name: "T".to_string(),
            flags: 0,
            constraints: Vec::new(),
            custom_attributes: Vec::new(),
        });
        let outer = module.add_type(outer);
        let mut inner = TypeDefData::new("", "Inner`1", 0);
        inner.generic_params.push(crate::metadata::model::GenericParamData {
            name: "U".to_string(),
            flags: 0,
            constraints: Vec::new(),
            custom_attributes: Vec::new(),
        });
        module.add_nested_type(outer, inner);

        let mut indexer = ReferenceIndexer::new(&module);
        indexer.create_indices().unwrap();

        // Outer declares T; Inner re-declares T as number 0 and U as number 1.
        let inner_params: Vec<(u16, GenericParamSource)> = indexer
            .generic_params
            .iter()
            .filter(|entry| {
                matches!(entry.owner, GenericParamOwner::Type(handle) if handle.0 == 1)
            })
            .map(|entry| (entry.number, entry.source))
            .collect();
        assert_eq!(inner_params.len(), 2);
        assert_eq!(inner_params[0].0, 0);
        assert!(matches!(inner_params[0].1, GenericParamSource::Type(TypeHandle(0), 0)));
        assert_eq!(inner_params[1].0, 1);
        assert!(matches!(inner_params[1].1, GenericParamSource::Type(TypeHandle(1), 0)));
    }
}
