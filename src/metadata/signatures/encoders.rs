//! # Signature Encoders
//!
//! Serializes [`TypeSig`] and [`MethodSignature`] values into the compressed
//! blob grammar. Named types are turned into TypeDefOrRefOrSpec-encoded codes
//! through the [`NamedTypeResolver`] seam, so the encoders stay independent of
//! row assignment.

use crate::file::BufferWriter;
use crate::metadata::model::{LocalVariableData, NamedType};
use crate::metadata::signatures::{calling_convention, element_type, MethodSignature, TypeSig};
use crate::Result;

/// Resolves a named type to its TypeDefOrRefOrSpec-encoded value
/// (`(row << 2) | tag`, tag 0 = TypeDef, 1 = TypeRef).
///
/// Implemented by the reference indexer during emission; tests supply a fixed
/// map. Resolution may intern new TypeRef rows, hence `&mut self`.
pub trait NamedTypeResolver {
    /// The encoded value for `ty`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::PhaseViolation`] when resolution happens after
    /// reference indices are closed.
    fn type_code(&mut self, ty: &NamedType) -> Result<u32>;
}

/// Encodes signatures against a [`NamedTypeResolver`].
pub struct SignatureEncoder<'a, R: NamedTypeResolver> {
    resolver: &'a mut R,
}

impl<'a, R: NamedTypeResolver> SignatureEncoder<'a, R> {
    /// Creates an encoder borrowing the given resolver.
    pub fn new(resolver: &'a mut R) -> Self {
        SignatureEncoder { resolver }
    }

    /// Encodes a field signature (header byte 0x06 followed by the field type).
    ///
    /// # Errors
    ///
    /// Propagates resolver failures.
    pub fn encode_field(&mut self, buffer: &mut BufferWriter, field_type: &TypeSig) -> Result<()> {
        buffer.write_u8(calling_convention::FIELD);
        self.encode_type(buffer, field_type)
    }

    /// Encodes a method definition, reference or call-site signature.
    ///
    /// # Errors
    ///
    /// Propagates resolver failures.
    pub fn encode_method(
        &mut self,
        buffer: &mut BufferWriter,
        signature: &MethodSignature,
    ) -> Result<()> {
        buffer.write_u8(signature.header_byte());
        if signature.generic_param_count > 0 {
            buffer.write_compressed_u32(signature.generic_param_count)?;
        }

        let param_count = signature.params.len() + signature.varargs.len();
        buffer.write_compressed_u32(u32::try_from(param_count).map_err(|_| {
            unexpected_error!("Parameter count {} exceeds compressed range", param_count)
        })?)?;
        self.encode_type(buffer, &signature.return_type)?;
        for param in &signature.params {
            self.encode_type(buffer, param)?;
        }
        if !signature.varargs.is_empty() {
            buffer.write_u8(element_type::SENTINEL);
            for param in &signature.varargs {
                self.encode_type(buffer, param)?;
            }
        }
        Ok(())
    }

    /// Encodes a property signature (header 0x08 plus HASTHIS when applicable).
    ///
    /// # Errors
    ///
    /// Propagates resolver failures.
    pub fn encode_property(
        &mut self,
        buffer: &mut BufferWriter,
        signature: &MethodSignature,
    ) -> Result<()> {
        let mut header = calling_convention::PROPERTY;
        if signature.has_this {
            header |= calling_convention::HAS_THIS;
        }
        buffer.write_u8(header);
        buffer.write_compressed_u32(u32::try_from(signature.params.len()).map_err(|_| {
            unexpected_error!(
                "Parameter count {} exceeds compressed range",
                signature.params.len()
            )
        })?)?;
        self.encode_type(buffer, &signature.return_type)?;
        for param in &signature.params {
            self.encode_type(buffer, param)?;
        }
        Ok(())
    }

    /// Encodes a local-variable signature (header 0x07, count, slot types).
    ///
    /// # Errors
    ///
    /// Propagates resolver failures.
    pub fn encode_locals(
        &mut self,
        buffer: &mut BufferWriter,
        locals: &[LocalVariableData],
    ) -> Result<()> {
        buffer.write_u8(calling_convention::LOCAL_SIG);
        buffer.write_compressed_u32(u32::try_from(locals.len()).map_err(|_| {
            unexpected_error!("Local count {} exceeds compressed range", locals.len())
        })?)?;
        for local in locals {
            self.encode_type(buffer, &local.var_type)?;
        }
        Ok(())
    }

    /// Encodes a method-instantiation (MethodSpec) signature.
    ///
    /// # Errors
    ///
    /// Propagates resolver failures.
    pub fn encode_method_spec(
        &mut self,
        buffer: &mut BufferWriter,
        type_arguments: &[TypeSig],
    ) -> Result<()> {
        buffer.write_u8(calling_convention::GENERIC_INST);
        buffer.write_compressed_u32(u32::try_from(type_arguments.len()).map_err(|_| {
            unexpected_error!(
                "Type argument count {} exceeds compressed range",
                type_arguments.len()
            )
        })?)?;
        for arg in type_arguments {
            self.encode_type(buffer, arg)?;
        }
        Ok(())
    }

    /// Encodes one type per the element-type grammar.
    ///
    /// # Errors
    ///
    /// Propagates resolver failures and [`crate::Error::OutOfBounds`] for
    /// values outside the compressed-integer range; `Void` outside
    /// return/pointer position is the caller's contract to avoid.
    pub fn encode_type(&mut self, buffer: &mut BufferWriter, ty: &TypeSig) -> Result<()> {
        match ty {
            TypeSig::Void => buffer.write_u8(element_type::VOID),
            TypeSig::Boolean => buffer.write_u8(element_type::BOOLEAN),
            TypeSig::Char => buffer.write_u8(element_type::CHAR),
            TypeSig::I1 => buffer.write_u8(element_type::I1),
            TypeSig::U1 => buffer.write_u8(element_type::U1),
            TypeSig::I2 => buffer.write_u8(element_type::I2),
            TypeSig::U2 => buffer.write_u8(element_type::U2),
            TypeSig::I4 => buffer.write_u8(element_type::I4),
            TypeSig::U4 => buffer.write_u8(element_type::U4),
            TypeSig::I8 => buffer.write_u8(element_type::I8),
            TypeSig::U8 => buffer.write_u8(element_type::U8),
            TypeSig::R4 => buffer.write_u8(element_type::R4),
            TypeSig::R8 => buffer.write_u8(element_type::R8),
            TypeSig::String => buffer.write_u8(element_type::STRING),
            TypeSig::Object => buffer.write_u8(element_type::OBJECT),
            TypeSig::IntPtr => buffer.write_u8(element_type::I),
            TypeSig::UIntPtr => buffer.write_u8(element_type::U),
            TypeSig::TypedReference => buffer.write_u8(element_type::TYPEDBYREF),
            TypeSig::Class(named) => {
                buffer.write_u8(element_type::CLASS);
                let code = self.resolver.type_code(named)?;
                buffer.write_compressed_u32(code)?;
            }
            TypeSig::ValueType(named) => {
                buffer.write_u8(element_type::VALUETYPE);
                let code = self.resolver.type_code(named)?;
                buffer.write_compressed_u32(code)?;
            }
            TypeSig::SzArray(element) => {
                buffer.write_u8(element_type::SZARRAY);
                self.encode_type(buffer, element)?;
            }
            TypeSig::Array {
                element,
                rank,
                sizes,
                lo_bounds,
            } => {
                buffer.write_u8(element_type::ARRAY);
                self.encode_type(buffer, element)?;
                buffer.write_compressed_u32(*rank)?;
                buffer.write_compressed_u32(u32::try_from(sizes.len()).map_err(|_| {
                    unexpected_error!("Array size count {} exceeds compressed range", sizes.len())
                })?)?;
                for size in sizes {
                    buffer.write_compressed_u32(*size)?;
                }
                buffer.write_compressed_u32(u32::try_from(lo_bounds.len()).map_err(|_| {
                    unexpected_error!(
                        "Array bound count {} exceeds compressed range",
                        lo_bounds.len()
                    )
                })?)?;
                for bound in lo_bounds {
                    buffer.write_compressed_i32(*bound)?;
                }
            }
            TypeSig::Ptr(element) => {
                buffer.write_u8(element_type::PTR);
                self.encode_type(buffer, element)?;
            }
            TypeSig::ByRef(element) => {
                buffer.write_u8(element_type::BYREF);
                self.encode_type(buffer, element)?;
            }
            TypeSig::FnPtr(signature) => {
                buffer.write_u8(element_type::FNPTR);
                self.encode_method(buffer, signature)?;
            }
            TypeSig::GenericInst {
                is_value_type,
                definition,
                args,
            } => {
                buffer.write_u8(element_type::GENERICINST);
                buffer.write_u8(if *is_value_type {
                    element_type::VALUETYPE
                } else {
                    element_type::CLASS
                });
                let code = self.resolver.type_code(definition)?;
                buffer.write_compressed_u32(code)?;
                buffer.write_compressed_u32(u32::try_from(args.len()).map_err(|_| {
                    unexpected_error!(
                        "Type argument count {} exceeds compressed range",
                        args.len()
                    )
                })?)?;
                for arg in args {
                    self.encode_type(buffer, arg)?;
                }
            }
            TypeSig::Var(number) => {
                buffer.write_u8(element_type::VAR);
                buffer.write_compressed_u32(*number)?;
            }
            TypeSig::MVar(number) => {
                buffer.write_u8(element_type::MVAR);
                buffer.write_compressed_u32(*number)?;
            }
            TypeSig::ModReq { modifier, inner } => {
                buffer.write_u8(element_type::CMOD_REQD);
                let code = self.resolver.type_code(modifier)?;
                buffer.write_compressed_u32(code)?;
                self.encode_type(buffer, inner)?;
            }
            TypeSig::ModOpt { modifier, inner } => {
                buffer.write_u8(element_type::CMOD_OPT);
                let code = self.resolver.type_code(modifier)?;
                buffer.write_compressed_u32(code)?;
                self.encode_type(buffer, inner)?;
            }
            TypeSig::Pinned(inner) => {
                buffer.write_u8(element_type::PINNED);
                self.encode_type(buffer, inner)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::model::{TypeHandle, TypeRefHandle};

    struct FixedResolver;

    impl NamedTypeResolver for FixedResolver {
        fn type_code(&mut self, ty: &NamedType) -> Result<u32> {
            Ok(match ty {
                NamedType::Definition(TypeHandle(index)) => {
                    (u32::try_from(*index).unwrap() + 1) << 2
                }
                NamedType::Reference(TypeRefHandle(index)) => {
                    ((u32::try_from(*index).unwrap() + 1) << 2) | 1
                }
            })
        }
    }

    fn encode<F>(f: F) -> Vec<u8>
    where
        F: FnOnce(&mut SignatureEncoder<'_, FixedResolver>, &mut BufferWriter) -> Result<()>,
    {
        let mut resolver = FixedResolver;
        let mut encoder = SignatureEncoder::new(&mut resolver);
        let mut buffer = BufferWriter::new();
        f(&mut encoder, &mut buffer).unwrap();
        buffer.into_vec()
    }

    #[test]
    fn test_field_signature_int32() {
        let bytes = encode(|e, b| e.encode_field(b, &TypeSig::I4));
        assert_eq!(bytes, vec![0x06, 0x08]);
    }

    #[test]
    fn test_instance_void_method() {
        let bytes = encode(|e, b| e.encode_method(b, &MethodSignature::instance_void()));
        // HASTHIS | DEFAULT, 0 params, void return
        assert_eq!(bytes, vec![0x20, 0x00, 0x01]);
    }

    #[test]
    fn test_static_method_with_params() {
        let sig = MethodSignature::static_method(TypeSig::I4, vec![TypeSig::String, TypeSig::I8]);
        let bytes = encode(|e, b| e.encode_method(b, &sig));
        assert_eq!(bytes, vec![0x00, 0x02, 0x08, 0x0E, 0x0A]);
    }

    #[test]
    fn test_generic_method_header_carries_arity() {
        let mut sig = MethodSignature::static_method(TypeSig::MVar(0), vec![]);
        sig.generic_param_count = 1;
        let bytes = encode(|e, b| e.encode_method(b, &sig));
        // GENERIC flag, arity 1, 0 params, MVAR 0 return
        assert_eq!(bytes, vec![0x10, 0x01, 0x00, 0x1E, 0x00]);
    }

    #[test]
    fn test_class_type_uses_resolver_code() {
        let ty = TypeSig::Class(NamedType::Reference(TypeRefHandle(0)));
        let bytes = encode(|e, b| e.encode_type(b, &ty));
        // CLASS, compressed ((1 << 2) | 1)
        assert_eq!(bytes, vec![0x12, 0x05]);
    }

    #[test]
    fn test_generic_instantiation() {
        let ty = TypeSig::GenericInst {
            is_value_type: false,
            definition: NamedType::Reference(TypeRefHandle(0)),
            args: vec![TypeSig::I4, TypeSig::String],
        };
        let bytes = encode(|e, b| e.encode_type(b, &ty));
        assert_eq!(bytes, vec![0x15, 0x12, 0x05, 0x02, 0x08, 0x0E]);
    }

    #[test]
    fn test_pinned_byref_local() {
        let locals = vec![
            LocalVariableData {
                var_type: TypeSig::Pinned(Box::new(TypeSig::I4)),
            },
            LocalVariableData {
                var_type: TypeSig::ByRef(Box::new(TypeSig::I8)),
            },
        ];
        let bytes = encode(|e, b| e.encode_locals(b, &locals));
        assert_eq!(bytes, vec![0x07, 0x02, 0x45, 0x08, 0x10, 0x0A]);
    }

    #[test]
    fn test_array_bound_outside_compressed_range_is_error() {
        let ty = TypeSig::Array {
            element: Box::new(TypeSig::I4),
            rank: 1,
            sizes: vec![],
            lo_bounds: vec![0x1000_0000],
        };
        let mut resolver = FixedResolver;
        let mut encoder = SignatureEncoder::new(&mut resolver);
        let mut buffer = BufferWriter::new();
        assert!(encoder.encode_type(&mut buffer, &ty).is_err());
    }

    #[test]
    fn test_vararg_sentinel() {
        let mut sig = MethodSignature::static_method(TypeSig::Void, vec![TypeSig::I4]);
        sig.calling_convention = calling_convention::VARARG;
        sig.varargs = vec![TypeSig::R8];
        let bytes = encode(|e, b| e.encode_method(b, &sig));
        assert_eq!(bytes, vec![0x05, 0x02, 0x01, 0x08, 0x41, 0x0D]);
    }
}
