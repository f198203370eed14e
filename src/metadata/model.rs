//! # Input Object Model
//!
//! The read-only module description the emission pipeline consumes. The model is
//! fully owned data: definitions live in flat vectors on [`ModuleData`] and are
//! addressed by typed handles; everything mentioned but not defined here is a
//! closed reference enum ([`NamedType`], [`FieldRef`], [`MethodRef`], ...) carrying
//! exactly the data its coded-index and signature encoding needs.
//!
//! A front end (compiler, assembler, patcher) builds a `ModuleData`, hands it to
//! [`crate::MetadataAssembler`], and never mutates it during emission.

use uguid::Guid;

use crate::metadata::signatures::{MethodSignature, TypeSig};

/// Handle of a type definition within [`ModuleData::types`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TypeHandle(pub usize);

/// Handle of a field definition within [`ModuleData::fields`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FieldHandle(pub usize);

/// Handle of a method definition within [`ModuleData::methods`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MethodHandle(pub usize);

/// Handle of an external type reference within [`ModuleData::type_refs`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TypeRefHandle(pub usize);

/// Handle of an assembly reference within [`ModuleData::assembly_refs`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AssemblyRefHandle(pub usize);

/// Handle of a module reference within [`ModuleData::module_refs`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ModuleRefHandle(pub usize);

/// Handle of a file record within [`ModuleData::files`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FileHandle(pub usize);

/// A placeholder embedded in raw IL operands, resolved to a real token during
/// body encoding. The value is an index into [`ModuleData::pseudo_tokens`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PseudoToken(pub u32);

/// A type named by definition or by external reference (never a constructed type).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum NamedType {
    /// A type defined in this module
    Definition(TypeHandle),
    /// A type defined elsewhere
    Reference(TypeRefHandle),
}

/// Any type mention, including constructed types that land in the TypeSpec table.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TypeDefOrRef {
    /// A type defined in this module
    Definition(TypeHandle),
    /// A plain named type defined elsewhere
    Reference(TypeRefHandle),
    /// A constructed type (generic instantiation, array, pointer, ...)
    Specification(Box<TypeSig>),
}

/// The scope a [`TypeRefData`] resolves in.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ResolutionScope {
    /// Defined in another assembly
    Assembly(AssemblyRefHandle),
    /// Defined in another module of this assembly
    Module(ModuleRefHandle),
    /// Defined somewhere in this module (rare; used by placeholder refs)
    CurrentModule,
    /// Nested inside another type reference
    Nested(TypeRefHandle),
}

/// An external named type.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TypeRefData {
    /// Where the type is defined
    pub scope: ResolutionScope,
    /// Namespace, empty for nested and global types
    pub namespace: String,
    /// Simple name, including any CLS generic-arity mangling
    pub name: String,
}

/// The declaring scope of a member reference.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum MemberRefParent {
    /// A named or constructed type
    Type(TypeDefOrRef),
    /// A global member of another module of this assembly
    Module(ModuleRefHandle),
    /// A varargs call site on a method defined here
    Method(MethodHandle),
}

/// A reference to a field defined outside this module.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FieldRefData {
    /// Declaring scope
    pub parent: MemberRefParent,
    /// Field name
    pub name: String,
    /// Field type
    pub field_type: TypeSig,
}

/// A reference to a method defined outside this module (or a varargs call site).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MethodRefData {
    /// Declaring scope
    pub parent: MemberRefParent,
    /// Method name
    pub name: String,
    /// Call-site signature
    pub signature: MethodSignature,
}

/// A field, by definition or reference.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FieldRef {
    /// Defined in this module
    Definition(FieldHandle),
    /// Defined elsewhere
    Reference(Box<FieldRefData>),
}

/// A method, by definition, reference, or generic instantiation.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum MethodRef {
    /// Defined in this module
    Definition(MethodHandle),
    /// Defined elsewhere
    Reference(Box<MethodRefData>),
    /// A generic method instantiation (MethodSpec row)
    Instantiation(Box<MethodInstantiation>),
}

/// A generic method instantiated with concrete type arguments.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MethodInstantiation {
    /// The uninstantiated generic method
    pub method: MethodRef,
    /// Type arguments, in declaration order
    pub type_arguments: Vec<TypeSig>,
}

/// The target an IL pseudo-token resolves to.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PseudoTarget {
    /// A type operand (`ldtoken`, `box`, `castclass`, ...)
    Type(TypeDefOrRef),
    /// A field operand
    Field(FieldRef),
    /// A method operand
    Method(MethodRef),
    /// A stand-alone signature operand (`calli`)
    Signature(MethodSignature),
    /// A `ldstr` operand; resolves to a #US heap token
    String(String),
}

/// A compile-time constant attached to a field, parameter or property.
#[derive(Debug, Clone, PartialEq)]
pub enum ConstantValue {
    /// `bool` constant
    Boolean(bool),
    /// UTF-16 code unit constant
    Char(u16),
    /// `i8` constant
    I1(i8),
    /// `u8` constant
    U1(u8),
    /// `i16` constant
    I2(i16),
    /// `u16` constant
    U2(u16),
    /// `i32` constant
    I4(i32),
    /// `u32` constant
    U4(u32),
    /// `i64` constant
    I8(i64),
    /// `u64` constant
    U8(u64),
    /// `f32` constant
    R4(f32),
    /// `f64` constant
    R8(f64),
    /// String constant; `None` is the null string
    String(Option<String>),
    /// Null reference constant of any reference type
    Null,
}

/// Explicit layout information for a type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClassLayoutData {
    /// Field packing alignment; 0 for default
    pub packing_size: u16,
    /// Explicit total byte size; 0 when unspecified
    pub class_size: u32,
}

/// An explicit method override.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodImplData {
    /// The implementing method body
    pub body: MethodRef,
    /// The overridden declaration
    pub declaration: MethodRef,
}

/// A generic parameter of a type or method.
#[derive(Debug, Clone, PartialEq)]
pub struct GenericParamData {
    /// Parameter name
    pub name: String,
    /// Variance and special-constraint bitmask
    pub flags: u16,
    /// Type constraints
    pub constraints: Vec<TypeDefOrRef>,
    /// Attributes on the parameter
    pub custom_attributes: Vec<CustomAttributeData>,
}

/// A type definition.
#[derive(Debug, Clone, PartialEq)]
pub struct TypeDefData {
    /// Simple name, including any CLS generic-arity mangling
    pub name: String,
    /// Namespace; empty for nested types
    pub namespace: String,
    /// Type attributes bitmask
    pub flags: u32,
    /// Base type; `None` for interfaces and `System.Object`
    pub extends: Option<TypeDefOrRef>,
    /// Enclosing type for nested types
    pub enclosing: Option<TypeHandle>,
    /// Nested types, in declaration order
    pub nested: Vec<TypeHandle>,
    /// Owned fields, in declaration order
    pub fields: Vec<FieldHandle>,
    /// Owned methods, in declaration order
    pub methods: Vec<MethodHandle>,
    /// Owned events, in declaration order
    pub events: Vec<EventData>,
    /// Owned properties, in declaration order
    pub properties: Vec<PropertyData>,
    /// Generic parameters declared by this type itself
    pub generic_params: Vec<GenericParamData>,
    /// Implemented interfaces
    pub interfaces: Vec<TypeDefOrRef>,
    /// Explicit method overrides
    pub method_impls: Vec<MethodImplData>,
    /// Explicit layout, if any
    pub layout: Option<ClassLayoutData>,
    /// Attributes on the type
    pub custom_attributes: Vec<CustomAttributeData>,
    /// Declarative security attributes (pre-encoded permission sets)
    pub security: Vec<DeclSecurityData>,
}

impl TypeDefData {
    /// A minimal public sealed-less class with the given names.
    #[must_use]
    pub fn new(namespace: &str, name: &str, flags: u32) -> Self {
        TypeDefData {
            name: name.to_string(),
            namespace: namespace.to_string(),
            flags,
            extends: None,
            enclosing: None,
            nested: Vec::new(),
            fields: Vec::new(),
            methods: Vec::new(),
            events: Vec::new(),
            properties: Vec::new(),
            generic_params: Vec::new(),
            interfaces: Vec::new(),
            method_impls: Vec::new(),
            layout: None,
            custom_attributes: Vec::new(),
            security: Vec::new(),
        }
    }
}

/// A field definition.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldData {
    /// Field name
    pub name: String,
    /// Field attributes bitmask
    pub flags: u16,
    /// Field type
    pub field_type: TypeSig,
    /// Compile-time constant, if any
    pub constant: Option<ConstantValue>,
    /// Pre-encoded marshalling descriptor, if any
    pub marshalling: Option<Vec<u8>>,
    /// Explicit byte offset within the type, if any
    pub layout_offset: Option<u32>,
    /// Mapped initial data (FieldRva), if any
    pub mapped_data: Option<Vec<u8>>,
    /// Attributes on the field
    pub custom_attributes: Vec<CustomAttributeData>,
}

impl FieldData {
    /// A plain instance field of the given type.
    #[must_use]
    pub fn new(name: &str, flags: u16, field_type: TypeSig) -> Self {
        FieldData {
            name: name.to_string(),
            flags,
            field_type,
            constant: None,
            marshalling: None,
            layout_offset: None,
            mapped_data: None,
            custom_attributes: Vec::new(),
        }
    }
}

/// A parameter definition (Param table row source).
#[derive(Debug, Clone, PartialEq)]
pub struct ParamData {
    /// Parameter name
    pub name: String,
    /// Parameter attributes bitmask
    pub flags: u16,
    /// 1-based position; 0 for the return value
    pub sequence: u16,
    /// Compile-time default value, if any
    pub constant: Option<ConstantValue>,
    /// Pre-encoded marshalling descriptor, if any
    pub marshalling: Option<Vec<u8>>,
    /// Attributes on the parameter
    pub custom_attributes: Vec<CustomAttributeData>,
}

/// P/Invoke mapping of a method.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PInvokeData {
    /// Mapping attributes bitmask
    pub flags: u16,
    /// Entry point name in the target module
    pub entry_point: String,
    /// Target module
    pub module: ModuleRefHandle,
}

/// One protected region of a method body.
#[derive(Debug, Clone, PartialEq)]
pub struct ExceptionRegionData {
    /// Handler kind
    pub kind: ExceptionRegionKind,
    /// IL offset of the try block
    pub try_offset: u32,
    /// Byte length of the try block
    pub try_length: u32,
    /// IL offset of the handler block
    pub handler_offset: u32,
    /// Byte length of the handler block
    pub handler_length: u32,
}

/// The kind of an exception handler.
#[derive(Debug, Clone, PartialEq)]
pub enum ExceptionRegionKind {
    /// Catch handler for the given exception type
    Catch(TypeDefOrRef),
    /// Filter handler; carries the IL offset of the filter decision block
    Filter(u32),
    /// Finally handler
    Finally,
    /// Fault handler
    Fault,
}

/// A local variable of a method body.
#[derive(Debug, Clone, PartialEq)]
pub struct LocalVariableData {
    /// Variable type, including any `Pinned`/`ByRef` wrapping
    pub var_type: TypeSig,
}

/// An IL method body with unresolved pseudo-tokens.
#[derive(Debug, Clone, PartialEq)]
pub struct MethodBodyData {
    /// Raw IL; token-shaped operands hold [`PseudoToken`] values
    pub il: Vec<u8>,
    /// Maximum evaluation stack depth
    pub max_stack: u16,
    /// Whether locals are zero-initialized
    pub init_locals: bool,
    /// Local variables, in slot order
    pub locals: Vec<LocalVariableData>,
    /// Protected regions
    pub exception_regions: Vec<ExceptionRegionData>,
}

/// A method definition.
#[derive(Debug, Clone, PartialEq)]
pub struct MethodData {
    /// Method name
    pub name: String,
    /// Method attributes bitmask
    pub flags: u16,
    /// Implementation attributes bitmask
    pub impl_flags: u16,
    /// Declared signature
    pub signature: MethodSignature,
    /// Named parameters (need not cover every signature slot)
    pub params: Vec<ParamData>,
    /// Generic parameters declared by this method
    pub generic_params: Vec<GenericParamData>,
    /// IL body; `None` for abstract, extern and P/Invoke methods
    pub body: Option<MethodBodyData>,
    /// P/Invoke mapping, if any
    pub pinvoke: Option<PInvokeData>,
    /// Attributes on the method
    pub custom_attributes: Vec<CustomAttributeData>,
    /// Declarative security attributes
    pub security: Vec<DeclSecurityData>,
    /// Debug information handed to the [`crate::metadata::debug::DebugInfoWriter`]
    pub debug_info: Option<crate::metadata::debug::MethodDebugData>,
}

impl MethodData {
    /// A bodiless method with the given signature.
    #[must_use]
    pub fn new(name: &str, flags: u16, signature: MethodSignature) -> Self {
        MethodData {
            name: name.to_string(),
            flags,
            impl_flags: 0,
            signature,
            params: Vec::new(),
            generic_params: Vec::new(),
            body: None,
            pinvoke: None,
            custom_attributes: Vec::new(),
            security: Vec::new(),
            debug_info: None,
        }
    }
}

/// An event definition.
#[derive(Debug, Clone, PartialEq)]
pub struct EventData {
    /// Event name
    pub name: String,
    /// Event attributes bitmask
    pub flags: u16,
    /// Delegate type of the event
    pub event_type: TypeDefOrRef,
    /// Add accessor
    pub adder: MethodHandle,
    /// Remove accessor
    pub remover: MethodHandle,
    /// Raise accessor, if any
    pub raiser: Option<MethodHandle>,
    /// Attributes on the event
    pub custom_attributes: Vec<CustomAttributeData>,
}

/// A property definition.
#[derive(Debug, Clone, PartialEq)]
pub struct PropertyData {
    /// Property name
    pub name: String,
    /// Property attributes bitmask
    pub flags: u16,
    /// Property signature (return type and indexer parameters)
    pub signature: MethodSignature,
    /// Get accessor, if any
    pub getter: Option<MethodHandle>,
    /// Set accessor, if any
    pub setter: Option<MethodHandle>,
    /// Compile-time default value, if any
    pub constant: Option<ConstantValue>,
    /// Attributes on the property
    pub custom_attributes: Vec<CustomAttributeData>,
}

/// One custom attribute application.
#[derive(Debug, Clone, PartialEq)]
pub struct CustomAttributeData {
    /// Attribute constructor (definition or member reference)
    pub constructor: MethodRef,
    /// Pre-structured argument values, serialized by the attribute encoder
    pub value: AttributeValue,
    /// Whether this is a security-related assembly attribute (affects the
    /// placeholder parent chosen for module-level assembly attributes)
    pub is_security: bool,
    /// Whether the attribute permits multiple applications
    pub allow_multiple: bool,
}

/// The argument payload of a custom attribute.
#[derive(Debug, Clone, PartialEq)]
pub enum AttributeValue {
    /// Structured arguments, serialized into the self-contained blob grammar
    Structured {
        /// Constructor arguments, in signature order
        fixed_args: Vec<AttributeArg>,
        /// Named field/property arguments
        named_args: Vec<NamedAttributeArg>,
    },
    /// A pre-encoded value blob passed through unchanged
    Raw(Vec<u8>),
}

/// One custom-attribute argument value.
#[derive(Debug, Clone, PartialEq)]
pub enum AttributeArg {
    /// `bool` argument
    Boolean(bool),
    /// UTF-16 code unit argument
    Char(u16),
    /// `i8` argument
    I1(i8),
    /// `u8` argument
    U1(u8),
    /// `i16` argument
    I2(i16),
    /// `u16` argument
    U2(u16),
    /// `i32` argument
    I4(i32),
    /// `u32` argument
    U4(u32),
    /// `i64` argument
    I8(i64),
    /// `u64` argument
    U8(u64),
    /// `f32` argument
    R4(f32),
    /// `f64` argument
    R8(f64),
    /// String argument; `None` encodes null
    String(Option<String>),
    /// `System.Type` argument carried as a named type; `None` encodes null
    Type(Option<NamedType>),
    /// Enum value of the given enum type with the given underlying value
    Enum(NamedType, Box<AttributeArg>),
    /// A value boxed as `System.Object`
    Boxed(Box<AttributeArg>),
    /// Array argument with a fixed element shape; `None` encodes null
    Array(Option<Vec<AttributeArg>>, AttributeElementKind),
}

/// The element shape of a custom-attribute array argument.
#[derive(Debug, Clone, PartialEq)]
pub enum AttributeElementKind {
    /// A primitive element written with its single-byte element code
    Primitive(u8),
    /// String elements
    String,
    /// `System.Type` elements
    Type,
    /// Enum elements of the given enum type with the given primitive code
    Enum(NamedType, u8),
    /// Boxed `System.Object` elements
    Boxed,
}

/// A named field/property argument of a custom attribute.
#[derive(Debug, Clone, PartialEq)]
pub struct NamedAttributeArg {
    /// True for a field target, false for a property target
    pub is_field: bool,
    /// Member name
    pub name: String,
    /// Element shape of the member
    pub kind: AttributeElementKind,
    /// Argument value
    pub value: AttributeArg,
}

/// A declarative security attribute with a pre-encoded permission set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeclSecurityData {
    /// Security action code
    pub action: u16,
    /// Pre-encoded permission set blob
    pub permission_set: Vec<u8>,
}

/// The assembly manifest of the module.
#[derive(Debug, Clone, PartialEq)]
pub struct AssemblyData {
    /// Simple assembly name
    pub name: String,
    /// Version (major, minor, build, revision)
    pub version: (u16, u16, u16, u16),
    /// Assembly attributes bitmask
    pub flags: u32,
    /// Full public key; empty when unsigned
    pub public_key: Vec<u8>,
    /// Culture name; empty for neutral
    pub culture: String,
    /// Hash algorithm id (0x8004 = SHA-1)
    pub hash_algorithm: u32,
    /// Assembly-level attributes
    pub custom_attributes: Vec<CustomAttributeData>,
    /// Assembly-level security attributes
    pub security: Vec<DeclSecurityData>,
}

/// A reference to another assembly.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AssemblyRefData {
    /// Simple assembly name
    pub name: String,
    /// Version (major, minor, build, revision)
    pub version: (u16, u16, u16, u16),
    /// Assembly attributes bitmask
    pub flags: u32,
    /// Full public key or its 8-byte token
    pub public_key_or_token: Vec<u8>,
    /// Culture name; empty for neutral
    pub culture: String,
    /// Hash of the referenced assembly; usually empty
    pub hash_value: Vec<u8>,
}

/// A file of a multi-module assembly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileData {
    /// File name (no path)
    pub name: String,
    /// Hash of the file contents
    pub hash_value: Vec<u8>,
    /// Whether the file contains metadata
    pub contains_metadata: bool,
}

/// Where an exported type is actually implemented.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportScope {
    /// Another file of this assembly
    File(FileHandle),
    /// Another assembly (makes the export a forwarder)
    Assembly(AssemblyRefHandle),
}

/// A type exported from another module or forwarded to another assembly.
#[derive(Debug, Clone, PartialEq)]
pub struct ExportedTypeData {
    /// Type name
    pub name: String,
    /// Type namespace; empty for nested exports
    pub namespace: String,
    /// Implementation scope
    pub scope: ExportScope,
    /// TypeDef token hint in the target module; 0 when unknown
    pub type_def_id: u32,
    /// Nested exported types
    pub nested: Vec<ExportedTypeData>,
}

/// Supplies the bytes of an embedded resource when emission reaches it.
pub trait ResourceDataSource {
    /// Produces the resource bytes, or a human-readable cause on failure.
    fn load(&self) -> std::result::Result<Vec<u8>, String>;
}

impl ResourceDataSource for Vec<u8> {
    fn load(&self) -> std::result::Result<Vec<u8>, String> {
        Ok(self.clone())
    }
}

/// Where a manifest resource lives.
pub enum ResourceLocation {
    /// Embedded in this image; the source is pulled during table population
    Embedded(Box<dyn ResourceDataSource>),
    /// Stored in another file of this assembly at the given offset
    File(FileHandle, u32),
    /// Defined in another assembly
    Assembly(AssemblyRefHandle),
}

/// A manifest resource.
pub struct ManifestResourceData {
    /// Resource name
    pub name: String,
    /// Whether the resource is public
    pub is_public: bool,
    /// Backing location
    pub location: ResourceLocation,
}

/// The kind of metadata generation being emitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GenerationKind {
    /// A full baseline image; tables stream is `#~`
    #[default]
    Full,
    /// An edit-and-continue delta; tables stream is `#-` and EnC tables apply
    UncompressedDelta,
    /// A minimal delta; adds the `#JTD` marker stream
    MinimalDelta,
}

/// The complete input of one emission pass.
pub struct ModuleData {
    /// Module file name
    pub name: String,
    /// Module version id; fixed by the caller so output stays deterministic
    pub mvid: Guid,
    /// Generation number; 0 for baselines
    pub generation: u16,
    /// Edit-and-continue ids for delta generations
    pub enc_id: Guid,
    /// Edit-and-continue base id for delta generations
    pub enc_base_id: Guid,
    /// Generation kind
    pub generation_kind: GenerationKind,
    /// Assembly manifest; `None` when emitting a netmodule
    pub assembly: Option<AssemblyData>,
    /// Module-level attributes
    pub custom_attributes: Vec<CustomAttributeData>,
    /// Assembly-level attributes of a netmodule, parented to placeholder
    /// `AssemblyAttributesGoHere` type references; empty when [`Self::assembly`]
    /// is present
    pub assembly_attributes: Vec<CustomAttributeData>,
    /// All type definitions; nesting is expressed via handles
    pub types: Vec<TypeDefData>,
    /// Top-level types, in declaration order
    pub top_level_types: Vec<TypeHandle>,
    /// All field definitions
    pub fields: Vec<FieldData>,
    /// All method definitions
    pub methods: Vec<MethodData>,
    /// External type references
    pub type_refs: Vec<TypeRefData>,
    /// Assembly references
    pub assembly_refs: Vec<AssemblyRefData>,
    /// Module reference names
    pub module_refs: Vec<String>,
    /// Files of a multi-module assembly
    pub files: Vec<FileData>,
    /// Exported and forwarded types
    pub exported_types: Vec<ExportedTypeData>,
    /// Manifest resources
    pub resources: Vec<ManifestResourceData>,
    /// Pseudo-token side table addressed by IL operands
    pub pseudo_tokens: Vec<PseudoTarget>,
    /// The corelib assembly reference, used to scope placeholder type refs
    pub corelib: Option<AssemblyRefHandle>,
}

impl ModuleData {
    /// Creates an empty module with the given name and version id.
    #[must_use]
    pub fn new(name: &str, mvid: Guid) -> Self {
        ModuleData {
            name: name.to_string(),
            mvid,
            generation: 0,
            enc_id: Guid::ZERO,
            enc_base_id: Guid::ZERO,
            generation_kind: GenerationKind::Full,
            assembly: None,
            custom_attributes: Vec::new(),
            assembly_attributes: Vec::new(),
            types: Vec::new(),
            top_level_types: Vec::new(),
            fields: Vec::new(),
            methods: Vec::new(),
            type_refs: Vec::new(),
            assembly_refs: Vec::new(),
            module_refs: Vec::new(),
            files: Vec::new(),
            exported_types: Vec::new(),
            resources: Vec::new(),
            pseudo_tokens: Vec::new(),
            corelib: None,
        }
    }

    /// Adds a top-level type definition.
    pub fn add_type(&mut self, data: TypeDefData) -> TypeHandle {
        let handle = TypeHandle(self.types.len());
        self.types.push(data);
        if self.types[handle.0].enclosing.is_none() {
            self.top_level_types.push(handle);
        }
        handle
    }

    /// Adds a type nested inside `enclosing`.
    pub fn add_nested_type(&mut self, enclosing: TypeHandle, mut data: TypeDefData) -> TypeHandle {
        data.enclosing = Some(enclosing);
        let handle = TypeHandle(self.types.len());
        self.types.push(data);
        self.types[enclosing.0].nested.push(handle);
        handle
    }

    /// Adds a field to `owner`.
    pub fn add_field(&mut self, owner: TypeHandle, data: FieldData) -> FieldHandle {
        let handle = FieldHandle(self.fields.len());
        self.fields.push(data);
        self.types[owner.0].fields.push(handle);
        handle
    }

    /// Adds a method to `owner`.
    pub fn add_method(&mut self, owner: TypeHandle, data: MethodData) -> MethodHandle {
        let handle = MethodHandle(self.methods.len());
        self.methods.push(data);
        self.types[owner.0].methods.push(handle);
        handle
    }

    /// Adds an external type reference.
    pub fn add_type_ref(&mut self, data: TypeRefData) -> TypeRefHandle {
        let handle = TypeRefHandle(self.type_refs.len());
        self.type_refs.push(data);
        handle
    }

    /// Adds an assembly reference.
    pub fn add_assembly_ref(&mut self, data: AssemblyRefData) -> AssemblyRefHandle {
        let handle = AssemblyRefHandle(self.assembly_refs.len());
        self.assembly_refs.push(data);
        handle
    }

    /// Adds a module reference.
    pub fn add_module_ref(&mut self, name: &str) -> ModuleRefHandle {
        let handle = ModuleRefHandle(self.module_refs.len());
        self.module_refs.push(name.to_string());
        handle
    }

    /// Adds a file record.
    pub fn add_file(&mut self, data: FileData) -> FileHandle {
        let handle = FileHandle(self.files.len());
        self.files.push(data);
        handle
    }

    /// Registers a pseudo-token target and returns the placeholder to embed in IL.
    pub fn add_pseudo_token(&mut self, target: PseudoTarget) -> PseudoToken {
        #[allow(clippy::cast_possible_truncation)]
        let token = PseudoToken(self.pseudo_tokens.len() as u32);
        self.pseudo_tokens.push(target);
        token
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_type_tracks_top_level_order() {
        let mut module = ModuleData::new("m.dll", Guid::ZERO);
        let a = module.add_type(TypeDefData::new("N", "A", 0));
        let b = module.add_type(TypeDefData::new("N", "B", 0));
        let nested = module.add_nested_type(a, TypeDefData::new("", "Inner", 0));

        assert_eq!(module.top_level_types, vec![a, b]);
        assert_eq!(module.types[a.0].nested, vec![nested]);
        assert_eq!(module.types[nested.0].enclosing, Some(a));
    }

    #[test]
    fn test_member_handles_append_in_order() {
        let mut module = ModuleData::new("m.dll", Guid::ZERO);
        let ty = module.add_type(TypeDefData::new("N", "C", 0));
        let f = module.add_field(ty, FieldData::new("F", 0x0006, TypeSig::I4));
        let m = module.add_method(ty, MethodData::new("M", 0x0086, MethodSignature::instance_void()));

        assert_eq!(module.types[ty.0].fields, vec![f]);
        assert_eq!(module.types[ty.0].methods, vec![m]);
    }

    #[test]
    fn test_pseudo_tokens_are_sequential() {
        let mut module = ModuleData::new("m.dll", Guid::ZERO);
        let first = module.add_pseudo_token(PseudoTarget::String("hi".to_string()));
        let second = module.add_pseudo_token(PseudoTarget::String("lo".to_string()));
        assert_eq!(first, PseudoToken(0));
        assert_eq!(second, PseudoToken(1));
    }
}
