//! # Signature Grammar
//!
//! The compact binary grammar stored in #Blob heap entries: field, method,
//! property, local-variable and method-instantiation signatures, plus the
//! self-contained custom-attribute value encoding. [`TypeSig`] is the closed
//! type algebra shared by the object model and the encoders.
//!
//! ## References
//!
//! - [ECMA-335 Standard](https://ecma-international.org/wp-content/uploads/ECMA-335_6th_edition_june_2012.pdf) - Partition II, Section 23.2

mod attributes;
mod encoders;

pub use attributes::{serialized_type_name, AttributeEncoder};
pub use encoders::{NamedTypeResolver, SignatureEncoder};

use crate::metadata::model::NamedType;

/// Single-byte element type codes (ECMA-335 II.23.1.16).
pub mod element_type {
    /// `void`
    pub const VOID: u8 = 0x01;
    /// `bool`
    pub const BOOLEAN: u8 = 0x02;
    /// `char`
    pub const CHAR: u8 = 0x03;
    /// `i8`
    pub const I1: u8 = 0x04;
    /// `u8`
    pub const U1: u8 = 0x05;
    /// `i16`
    pub const I2: u8 = 0x06;
    /// `u16`
    pub const U2: u8 = 0x07;
    /// `i32`
    pub const I4: u8 = 0x08;
    /// `u32`
    pub const U4: u8 = 0x09;
    /// `i64`
    pub const I8: u8 = 0x0A;
    /// `u64`
    pub const U8: u8 = 0x0B;
    /// `f32`
    pub const R4: u8 = 0x0C;
    /// `f64`
    pub const R8: u8 = 0x0D;
    /// `System.String`
    pub const STRING: u8 = 0x0E;
    /// Unmanaged pointer
    pub const PTR: u8 = 0x0F;
    /// Managed by-reference
    pub const BYREF: u8 = 0x10;
    /// Value type followed by a TypeDefOrRef code
    pub const VALUETYPE: u8 = 0x11;
    /// Reference type followed by a TypeDefOrRef code
    pub const CLASS: u8 = 0x12;
    /// Generic type parameter by 0-based number
    pub const VAR: u8 = 0x13;
    /// Multi-dimensional array with shape
    pub const ARRAY: u8 = 0x14;
    /// Generic instantiation
    pub const GENERICINST: u8 = 0x15;
    /// `System.TypedReference`
    pub const TYPEDBYREF: u8 = 0x16;
    /// `isize` (native int)
    pub const I: u8 = 0x18;
    /// `usize` (native unsigned int)
    pub const U: u8 = 0x19;
    /// Function pointer followed by a full method signature
    pub const FNPTR: u8 = 0x1B;
    /// `System.Object`
    pub const OBJECT: u8 = 0x1C;
    /// Single-dimensional zero-based array
    pub const SZARRAY: u8 = 0x1D;
    /// Generic method parameter by 0-based number
    pub const MVAR: u8 = 0x1E;
    /// Required custom modifier
    pub const CMOD_REQD: u8 = 0x1F;
    /// Optional custom modifier
    pub const CMOD_OPT: u8 = 0x20;
    /// Sentinel separating fixed and vararg parameters
    pub const SENTINEL: u8 = 0x41;
    /// Pinned local variable
    pub const PINNED: u8 = 0x45;
    /// Custom-attribute only: `System.Type` argument
    pub const TYPE: u8 = 0x50;
    /// Custom-attribute only: value boxed as `System.Object`
    pub const TAGGED_OBJECT: u8 = 0x51;
    /// Custom-attribute only: named argument targets a field
    pub const FIELD: u8 = 0x53;
    /// Custom-attribute only: named argument targets a property
    pub const PROPERTY: u8 = 0x54;
    /// Custom-attribute only: enum argument, followed by a serialized type name
    pub const ENUM: u8 = 0x55;
}

/// Signature header calling-convention bytes and flags (ECMA-335 II.23.2.3).
pub mod calling_convention {
    /// Default managed call
    pub const DEFAULT: u8 = 0x00;
    /// Variable-argument managed call
    pub const VARARG: u8 = 0x05;
    /// Field signature header
    pub const FIELD: u8 = 0x06;
    /// Local-variable signature header
    pub const LOCAL_SIG: u8 = 0x07;
    /// Property signature header
    pub const PROPERTY: u8 = 0x08;
    /// Method-instantiation (MethodSpec) signature header
    pub const GENERIC_INST: u8 = 0x0A;
    /// Flag: the method declares generic parameters
    pub const GENERIC: u8 = 0x10;
    /// Flag: the signature carries a `this` parameter
    pub const HAS_THIS: u8 = 0x20;
    /// Flag: the `this` parameter is explicit in the parameter list
    pub const EXPLICIT_THIS: u8 = 0x40;
}

/// The closed type algebra of signature encoding.
///
/// Named types never carry a constructed shape; constructed types (arrays,
/// pointers, instantiations) wrap their element recursively.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TypeSig {
    /// `void`; only valid as a return or pointer element type
    Void,
    /// `bool`
    Boolean,
    /// `char`
    Char,
    /// `i8`
    I1,
    /// `u8`
    U1,
    /// `i16`
    I2,
    /// `u16`
    U2,
    /// `i32`
    I4,
    /// `u32`
    U4,
    /// `i64`
    I8,
    /// `u64`
    U8,
    /// `f32`
    R4,
    /// `f64`
    R8,
    /// `System.String`
    String,
    /// `System.Object`
    Object,
    /// Native int
    IntPtr,
    /// Native unsigned int
    UIntPtr,
    /// `System.TypedReference`
    TypedReference,
    /// A named reference type
    Class(NamedType),
    /// A named value type
    ValueType(NamedType),
    /// Single-dimensional zero-based array
    SzArray(Box<TypeSig>),
    /// Multi-dimensional array with explicit shape
    Array {
        /// Element type
        element: Box<TypeSig>,
        /// Number of dimensions
        rank: u32,
        /// Known dimension sizes, leading dimensions first
        sizes: Vec<u32>,
        /// Known lower bounds, leading dimensions first
        lo_bounds: Vec<i32>,
    },
    /// Unmanaged pointer
    Ptr(Box<TypeSig>),
    /// Managed by-reference
    ByRef(Box<TypeSig>),
    /// Function pointer
    FnPtr(Box<MethodSignature>),
    /// Generic instantiation of a named type with consolidated type arguments
    /// (enclosing containers' arguments precede the innermost type's own)
    GenericInst {
        /// Whether the instantiated definition is a value type
        is_value_type: bool,
        /// The uninstantiated generic definition
        definition: NamedType,
        /// Consolidated type arguments, outermost container first
        args: Vec<TypeSig>,
    },
    /// Generic type parameter by 0-based number
    Var(u32),
    /// Generic method parameter by 0-based number
    MVar(u32),
    /// Required custom modifier
    ModReq {
        /// Modifier type
        modifier: NamedType,
        /// Modified type
        inner: Box<TypeSig>,
    },
    /// Optional custom modifier
    ModOpt {
        /// Modifier type
        modifier: NamedType,
        /// Modified type
        inner: Box<TypeSig>,
    },
    /// Pinned local variable
    Pinned(Box<TypeSig>),
}

/// A method or property signature.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MethodSignature {
    /// Low calling-convention bits ([`calling_convention::DEFAULT`] or `VARARG`)
    pub calling_convention: u8,
    /// Whether the signature carries a `this` parameter
    pub has_this: bool,
    /// Whether the `this` parameter is explicit in the parameter list
    pub explicit_this: bool,
    /// Number of generic parameters the method declares; 0 for non-generic
    pub generic_param_count: u32,
    /// Return type
    pub return_type: TypeSig,
    /// Fixed parameter types, in order
    pub params: Vec<TypeSig>,
    /// Vararg parameter types after the sentinel; empty for non-vararg calls
    pub varargs: Vec<TypeSig>,
}

impl MethodSignature {
    /// A parameterless instance method returning `void`.
    #[must_use]
    pub fn instance_void() -> Self {
        MethodSignature {
            calling_convention: calling_convention::DEFAULT,
            has_this: true,
            explicit_this: false,
            generic_param_count: 0,
            return_type: TypeSig::Void,
            params: Vec::new(),
            varargs: Vec::new(),
        }
    }

    /// A static method with the given return and parameter types.
    #[must_use]
    pub fn static_method(return_type: TypeSig, params: Vec<TypeSig>) -> Self {
        MethodSignature {
            calling_convention: calling_convention::DEFAULT,
            has_this: false,
            explicit_this: false,
            generic_param_count: 0,
            return_type,
            params,
            varargs: Vec::new(),
        }
    }

    /// The header byte combining calling convention and flags.
    #[must_use]
    pub fn header_byte(&self) -> u8 {
        let mut header = self.calling_convention;
        if self.generic_param_count > 0 {
            header |= calling_convention::GENERIC;
        }
        if self.has_this {
            header |= calling_convention::HAS_THIS;
        }
        if self.explicit_this {
            header |= calling_convention::EXPLICIT_THIS;
        }
        header
    }
}
