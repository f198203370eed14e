//! # Custom-Attribute Value Blobs
//!
//! Attribute argument blobs must be self-contained: they carry no table tokens,
//! so type-valued and enum-valued arguments are written as serialized
//! assembly-qualified names and boxed values carry a self-describing tag byte.
//!
//! ## References
//!
//! - [ECMA-335 Standard](https://ecma-international.org/wp-content/uploads/ECMA-335_6th_edition_june_2012.pdf) - Partition II, Section 23.3

use std::fmt::Write as _;

use crate::file::BufferWriter;
use crate::metadata::model::{
    AttributeArg, AttributeElementKind, AttributeValue, ModuleData, NamedAttributeArg, NamedType,
    ResolutionScope, TypeHandle, TypeRefHandle,
};
use crate::metadata::signatures::element_type;
use crate::Result;

const PROLOG: u16 = 0x0001;
const NULL_ARRAY: u32 = 0xFFFF_FFFF;

/// Produces the reflection-style assembly-qualified display name of a named type.
///
/// Nested types are joined with `+`, namespaces with `.`; for types resolved in
/// another assembly the assembly display name
/// (`Name, Version=a.b.c.d, Culture=..., PublicKeyToken=...`) is appended.
#[must_use]
pub fn serialized_type_name(module: &ModuleData, ty: &NamedType) -> String {
    match ty {
        NamedType::Definition(handle) => definition_full_name(module, *handle),
        NamedType::Reference(handle) => {
            let mut name = reference_full_name(module, *handle);
            if let Some(assembly) = reference_root_assembly(module, *handle) {
                let data = &module.assembly_refs[assembly.0];
                let _ = write!(
                    name,
                    ", {}, Version={}.{}.{}.{}, Culture={}, PublicKeyToken={}",
                    data.name,
                    data.version.0,
                    data.version.1,
                    data.version.2,
                    data.version.3,
                    if data.culture.is_empty() {
                        "neutral"
                    } else {
                        &data.culture
                    },
                    public_key_token(&data.public_key_or_token),
                );
            }
            name
        }
    }
}

fn definition_full_name(module: &ModuleData, handle: TypeHandle) -> String {
    let data = &module.types[handle.0];
    match data.enclosing {
        Some(enclosing) => {
            format!("{}+{}", definition_full_name(module, enclosing), data.name)
        }
        None if data.namespace.is_empty() => data.name.clone(),
        None => format!("{}.{}", data.namespace, data.name),
    }
}

fn reference_full_name(module: &ModuleData, handle: TypeRefHandle) -> String {
    let data = &module.type_refs[handle.0];
    match data.scope {
        ResolutionScope::Nested(enclosing) => {
            format!("{}+{}", reference_full_name(module, enclosing), data.name)
        }
        _ if data.namespace.is_empty() => data.name.clone(),
        _ => format!("{}.{}", data.namespace, data.name),
    }
}

fn reference_root_assembly(
    module: &ModuleData,
    handle: TypeRefHandle,
) -> Option<crate::metadata::model::AssemblyRefHandle> {
    match module.type_refs[handle.0].scope {
        ResolutionScope::Assembly(assembly) => Some(assembly),
        ResolutionScope::Nested(enclosing) => reference_root_assembly(module, enclosing),
        ResolutionScope::Module(_) | ResolutionScope::CurrentModule => None,
    }
}

fn public_key_token(bytes: &[u8]) -> String {
    // An 8-byte value is already a token; anything else reads as unsigned.
    if bytes.len() == 8 {
        bytes.iter().fold(String::new(), |mut acc, byte| {
            let _ = write!(acc, "{byte:02x}");
            acc
        })
    } else {
        "null".to_string()
    }
}

/// Encodes custom-attribute value blobs against the owning module.
pub struct AttributeEncoder<'a> {
    module: &'a ModuleData,
}

impl<'a> AttributeEncoder<'a> {
    /// Creates an encoder for attributes of the given module.
    #[must_use]
    pub fn new(module: &'a ModuleData) -> Self {
        AttributeEncoder { module }
    }

    /// Encodes one attribute value payload.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Unexpected`] on argument shapes outside the
    /// attribute grammar (a producer contract violation) and
    /// [`crate::Error::OutOfBounds`] when a string length exceeds the
    /// compressed-integer range.
    pub fn encode_value(&self, buffer: &mut BufferWriter, value: &AttributeValue) -> Result<()> {
        match value {
            AttributeValue::Raw(bytes) => {
                buffer.write_bytes(bytes);
                Ok(())
            }
            AttributeValue::Structured {
                fixed_args,
                named_args,
            } => {
                buffer.write_u16(PROLOG);
                for arg in fixed_args {
                    self.encode_fixed_arg(buffer, arg)?;
                }
                buffer.write_u16(u16::try_from(named_args.len()).map_err(|_| {
                    unexpected_error!("Named argument count {} exceeds u16", named_args.len())
                })?);
                for named in named_args {
                    self.encode_named_arg(buffer, named)?;
                }
                Ok(())
            }
        }
    }

    fn encode_fixed_arg(&self, buffer: &mut BufferWriter, arg: &AttributeArg) -> Result<()> {
        match arg {
            AttributeArg::Boolean(value) => buffer.write_u8(u8::from(*value)),
            AttributeArg::Char(value) | AttributeArg::U2(value) => buffer.write_u16(*value),
            AttributeArg::I1(value) => buffer.write_u8(*value as u8),
            AttributeArg::U1(value) => buffer.write_u8(*value),
            AttributeArg::I2(value) => buffer.write_u16(*value as u16),
            AttributeArg::I4(value) => buffer.write_u32(*value as u32),
            AttributeArg::U4(value) => buffer.write_u32(*value),
            AttributeArg::I8(value) => buffer.write_u64(*value as u64),
            AttributeArg::U8(value) => buffer.write_u64(*value),
            AttributeArg::R4(value) => buffer.write_u32(value.to_bits()),
            AttributeArg::R8(value) => buffer.write_u64(value.to_bits()),
            AttributeArg::String(value) => write_ser_string(buffer, value.as_deref())?,
            AttributeArg::Type(value) => {
                let name = value
                    .as_ref()
                    .map(|named| serialized_type_name(self.module, named));
                write_ser_string(buffer, name.as_deref())?;
            }
            // The enum's underlying value; its type comes from the constructor
            // signature in fixed position.
            AttributeArg::Enum(_, value) => self.encode_fixed_arg(buffer, value)?,
            AttributeArg::Boxed(value) => {
                self.encode_boxed_descriptor(buffer, value)?;
                self.encode_fixed_arg(buffer, value)?;
            }
            AttributeArg::Array(elements, _) => match elements {
                None => buffer.write_u32(NULL_ARRAY),
                Some(elements) => {
                    buffer.write_u32(u32::try_from(elements.len()).map_err(|_| {
                        unexpected_error!("Array length {} exceeds u32", elements.len())
                    })?);
                    for element in elements {
                        self.encode_fixed_arg(buffer, element)?;
                    }
                }
            },
        }
        Ok(())
    }

    fn encode_boxed_descriptor(&self, buffer: &mut BufferWriter, value: &AttributeArg) -> Result<()> {
        match value {
            AttributeArg::Boolean(_) => buffer.write_u8(element_type::BOOLEAN),
            AttributeArg::Char(_) => buffer.write_u8(element_type::CHAR),
            AttributeArg::I1(_) => buffer.write_u8(element_type::I1),
            AttributeArg::U1(_) => buffer.write_u8(element_type::U1),
            AttributeArg::I2(_) => buffer.write_u8(element_type::I2),
            AttributeArg::U2(_) => buffer.write_u8(element_type::U2),
            AttributeArg::I4(_) => buffer.write_u8(element_type::I4),
            AttributeArg::U4(_) => buffer.write_u8(element_type::U4),
            AttributeArg::I8(_) => buffer.write_u8(element_type::I8),
            AttributeArg::U8(_) => buffer.write_u8(element_type::U8),
            AttributeArg::R4(_) => buffer.write_u8(element_type::R4),
            AttributeArg::R8(_) => buffer.write_u8(element_type::R8),
            AttributeArg::String(_) => buffer.write_u8(element_type::STRING),
            AttributeArg::Type(_) => buffer.write_u8(element_type::TYPE),
            AttributeArg::Enum(ty, _) => {
                buffer.write_u8(element_type::ENUM);
                write_ser_string(buffer, Some(&serialized_type_name(self.module, ty)))?;
            }
            AttributeArg::Array(_, kind) => {
                buffer.write_u8(element_type::SZARRAY);
                self.encode_element_kind(buffer, kind)?;
            }
            AttributeArg::Boxed(_) => {
                return Err(unexpected_error!("Nested boxed attribute argument"));
            }
        }
        Ok(())
    }

    fn encode_element_kind(
        &self,
        buffer: &mut BufferWriter,
        kind: &AttributeElementKind,
    ) -> Result<()> {
        match kind {
            AttributeElementKind::Primitive(code) => buffer.write_u8(*code),
            AttributeElementKind::String => buffer.write_u8(element_type::STRING),
            AttributeElementKind::Type => buffer.write_u8(element_type::TYPE),
            AttributeElementKind::Enum(ty, _) => {
                buffer.write_u8(element_type::ENUM);
                write_ser_string(buffer, Some(&serialized_type_name(self.module, ty)))?;
            }
            AttributeElementKind::Boxed => buffer.write_u8(element_type::TAGGED_OBJECT),
        }
        Ok(())
    }

    fn encode_named_arg(&self, buffer: &mut BufferWriter, named: &NamedAttributeArg) -> Result<()> {
        buffer.write_u8(if named.is_field {
            element_type::FIELD
        } else {
            element_type::PROPERTY
        });
        self.encode_element_kind(buffer, &named.kind)?;
        write_ser_string(buffer, Some(&named.name))?;
        self.encode_fixed_arg(buffer, &named.value)
    }
}

/// Writes a SerString: compressed UTF-8 byte length plus bytes; null is 0xFF.
fn write_ser_string(buffer: &mut BufferWriter, value: Option<&str>) -> Result<()> {
    match value {
        None => buffer.write_u8(0xFF),
        Some(text) => {
            let bytes = text.as_bytes();
            #[allow(clippy::cast_possible_truncation)]
            buffer.write_compressed_u32(bytes.len() as u32)?;
            buffer.write_bytes(bytes);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::model::{AssemblyRefData, TypeRefData};
    use uguid::Guid;

    fn sample_module() -> ModuleData {
        let mut module = ModuleData::new("m.dll", Guid::ZERO);
        let corelib = module.add_assembly_ref(AssemblyRefData {
            name: "mscorlib".to_string(),
            version: (4, 0, 0, 0),
            flags: 0,
            public_key_or_token: vec![0xb7, 0x7a, 0x5c, 0x56, 0x19, 0x34, 0xe0, 0x89],
            culture: String::new(),
            hash_value: Vec::new(),
        });
        module.add_type_ref(TypeRefData {
            scope: ResolutionScope::Assembly(corelib),
            namespace: "System".to_string(),
            name: "AttributeTargets".to_string(),
        });
        module
    }

    #[test]
    fn test_serialized_name_appends_assembly() {
        let module = sample_module();
        let name = serialized_type_name(&module, &NamedType::Reference(TypeRefHandle(0)));
        assert_eq!(
            name,
            "System.AttributeTargets, mscorlib, Version=4.0.0.0, Culture=neutral, \
             PublicKeyToken=b77a5c561934e089"
        );
    }

    #[test]
    fn test_prolog_and_fixed_args() {
        let module = sample_module();
        let encoder = AttributeEncoder::new(&module);
        let mut buffer = BufferWriter::new();
        encoder
            .encode_value(
                &mut buffer,
                &AttributeValue::Structured {
                    fixed_args: vec![AttributeArg::I4(-1), AttributeArg::Boolean(true)],
                    named_args: vec![],
                },
            )
            .unwrap();
        assert_eq!(
            buffer.as_slice(),
            &[0x01, 0x00, 0xFF, 0xFF, 0xFF, 0xFF, 0x01, 0x00, 0x00]
        );
    }

    #[test]
    fn test_null_string_is_ff() {
        let module = sample_module();
        let encoder = AttributeEncoder::new(&module);
        let mut buffer = BufferWriter::new();
        encoder
            .encode_value(
                &mut buffer,
                &AttributeValue::Structured {
                    fixed_args: vec![AttributeArg::String(None)],
                    named_args: vec![],
                },
            )
            .unwrap();
        assert_eq!(buffer.as_slice(), &[0x01, 0x00, 0xFF, 0x00, 0x00]);
    }

    #[test]
    fn test_named_property_argument() {
        let module = sample_module();
        let encoder = AttributeEncoder::new(&module);
        let mut buffer = BufferWriter::new();
        encoder
            .encode_value(
                &mut buffer,
                &AttributeValue::Structured {
                    fixed_args: vec![],
                    named_args: vec![NamedAttributeArg {
                        is_field: false,
                        name: "Inherited".to_string(),
                        kind: AttributeElementKind::Primitive(element_type::BOOLEAN),
                        value: AttributeArg::Boolean(false),
                    }],
                },
            )
            .unwrap();
        assert_eq!(
            buffer.as_slice(),
            &[
                0x01, 0x00, // prolog
                0x01, 0x00, // one named argument
                0x54, 0x02, // property of type bool
                0x09, b'I', b'n', b'h', b'e', b'r', b'i', b't', b'e', b'd', // name
                0x00, // false
            ]
        );
    }

    #[test]
    fn test_boxed_value_carries_tag() {
        let module = sample_module();
        let encoder = AttributeEncoder::new(&module);
        let mut buffer = BufferWriter::new();
        encoder
            .encode_value(
                &mut buffer,
                &AttributeValue::Structured {
                    fixed_args: vec![AttributeArg::Boxed(Box::new(AttributeArg::I4(7)))],
                    named_args: vec![],
                },
            )
            .unwrap();
        assert_eq!(
            buffer.as_slice(),
            &[0x01, 0x00, 0x08, 0x07, 0x00, 0x00, 0x00, 0x00, 0x00]
        );
    }

    #[test]
    fn test_null_array_sentinel() {
        let module = sample_module();
        let encoder = AttributeEncoder::new(&module);
        let mut buffer = BufferWriter::new();
        encoder
            .encode_value(
                &mut buffer,
                &AttributeValue::Structured {
                    fixed_args: vec![AttributeArg::Array(
                        None,
                        AttributeElementKind::Primitive(element_type::I4),
                    )],
                    named_args: vec![],
                },
            )
            .unwrap();
        assert_eq!(buffer.as_slice(), &[0x01, 0x00, 0xFF, 0xFF, 0xFF, 0xFF, 0x00, 0x00]);
    }
}
