//! # Method Body Encoding
//!
//! Serializes IL method bodies into the body stream: selects the tiny or fat
//! header, rewrites pseudo-token operands into final metadata tokens, emits the
//! exception-handler section and deduplicates identical tiny bodies. Pseudo-token
//! resolution is memoized; each placeholder is resolved at most once per
//! generation.
//!
//! ## References
//!
//! - [ECMA-335 Standard](https://ecma-international.org/wp-content/uploads/ECMA-335_6th_edition_june_2012.pdf) - Partition II, Section 25.4

use std::collections::HashMap;

use crate::file::BufferWriter;
use crate::metadata::heaps::MetadataHeaps;
use crate::metadata::index::ReferenceIndexer;
use crate::metadata::model::{
    ExceptionRegionData, ExceptionRegionKind, MethodBodyData, PseudoTarget,
};
use crate::metadata::signatures::SignatureEncoder;
use crate::metadata::tables::TableId;
use crate::metadata::token::Token;
use crate::Result;

/// Tiny header marker in the two low bits of the first byte.
const TINY_FORMAT: u8 = 0x2;
/// Fat header marker plus the header size (3 dwords) in bits 12-15.
const FAT_FORMAT: u16 = 0x3003;
/// Fat header flag: an exception-handler section follows the IL.
const FAT_MORE_SECTIONS: u16 = 0x0008;
/// Fat header flag: zero-initialize locals.
const FAT_INIT_LOCALS: u16 = 0x0010;

/// Exception section kind byte: small format.
const EH_SMALL: u8 = 0x01;
/// Exception section kind byte: fat format.
const EH_FAT: u8 = 0x41;

/// What kind of operand follows an opcode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OperandKind {
    None,
    Byte,
    Word,
    DWord,
    QWord,
    Switch,
    TypeToken,
    FieldToken,
    MethodToken,
    SignatureToken,
    StringToken,
    AnyToken,
}

/// The placement of one encoded body within the body stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncodedBody {
    /// Byte offset of the header within the stream; the container layer turns
    /// this into the MethodDef RVA
    pub offset: u32,
    /// StandAloneSig token of the local-variable signature; null without locals
    pub local_sig_token: Token,
}

/// Encodes every method body of one generation into a single stream.
pub struct MethodBodyEncoder {
    stream: BufferWriter,
    /// Raw (pre-substitution) IL of tiny bodies -> shared stream offset.
    /// Identical raw bodies resolve identically within one generation.
    small_bodies: HashMap<Vec<u8>, u32>,
    resolved: Vec<Option<Token>>,
}

impl MethodBodyEncoder {
    /// Creates an encoder with a memo slot per pseudo-token of the module.
    #[must_use]
    pub fn new(pseudo_token_count: usize) -> Self {
        MethodBodyEncoder {
            stream: BufferWriter::new(),
            small_bodies: HashMap::new(),
            resolved: vec![None; pseudo_token_count],
        }
    }

    /// Encodes one body and returns its stream placement.
    ///
    /// Local-signature and `calli` blobs may still intern stand-alone-signature
    /// rows, so all bodies must be encoded before reference indices close.
    ///
    /// # Errors
    ///
    /// Propagates token resolution failures; unknown opcodes and mismatched
    /// pseudo-token targets are producer contract violations.
    pub fn encode(
        &mut self,
        body: &MethodBodyData,
        indexer: &mut ReferenceIndexer<'_>,
        heaps: &mut MetadataHeaps,
    ) -> Result<EncodedBody> {
        let local_sig_token = if body.locals.is_empty() {
            Token::new(0)
        } else {
            let mut blob = BufferWriter::new();
            SignatureEncoder::new(indexer).encode_locals(&mut blob, &body.locals)?;
            let offset = heaps.blobs.intern(blob.as_slice())?;
            let row = indexer.standalone_sig_row(offset)?;
            Token::from_table_row(TableId::StandAloneSig, row)
        };

        let is_tiny = body.il.len() < 64
            && body.max_stack <= 8
            && body.locals.is_empty()
            && body.exception_regions.is_empty();

        if is_tiny {
            if let Some(offset) = self.small_bodies.get(body.il.as_slice()) {
                return Ok(EncodedBody {
                    offset: *offset,
                    local_sig_token,
                });
            }
        }

        let il = self.substitute_il(&body.il, indexer, heaps)?;

        let offset = if is_tiny {
            #[allow(clippy::cast_possible_truncation)]
            let offset = self.stream.position() as u32;
            self.small_bodies.insert(body.il.clone(), offset);
            #[allow(clippy::cast_possible_truncation)]
            self.stream.write_u8(((il.len() as u8) << 2) | TINY_FORMAT);
            self.stream.write_bytes(&il);
            offset
        } else {
            self.stream.align(4, 0);
            #[allow(clippy::cast_possible_truncation)]
            let offset = self.stream.position() as u32;

            let mut flags = FAT_FORMAT;
            if !body.exception_regions.is_empty() {
                flags |= FAT_MORE_SECTIONS;
            }
            if body.init_locals {
                flags |= FAT_INIT_LOCALS;
            }
            self.stream.write_u16(flags);
            self.stream.write_u16(body.max_stack);
            #[allow(clippy::cast_possible_truncation)]
            self.stream.write_u32(il.len() as u32);
            self.stream.write_u32(local_sig_token.value());
            self.stream.write_bytes(&il);

            if !body.exception_regions.is_empty() {
                self.write_exception_section(&body.exception_regions, indexer)?;
            }
            offset
        };

        Ok(EncodedBody {
            offset,
            local_sig_token,
        })
    }

    /// The encoded body stream.
    #[must_use]
    pub fn stream(&self) -> &[u8] {
        self.stream.as_slice()
    }

    /// Consumes the encoder, returning the body stream.
    #[must_use]
    pub fn into_stream(self) -> Vec<u8> {
        self.stream.into_vec()
    }

    fn substitute_il(
        &mut self,
        il: &[u8],
        indexer: &mut ReferenceIndexer<'_>,
        heaps: &mut MetadataHeaps,
    ) -> Result<Vec<u8>> {
        let mut out = il.to_vec();
        let mut position = 0usize;

        while position < out.len() {
            let opcode = out[position];
            position += 1;
            let kind = if opcode == 0xFE {
                let second = *out.get(position).ok_or_else(|| {
                    unexpected_error!("Truncated two-byte opcode at IL offset {}", position - 1)
                })?;
                position += 1;
                prefixed_operand_kind(second)
                    .ok_or_else(|| unexpected_error!("Unknown opcode 0xFE 0x{:02X}", second))?
            } else {
                operand_kind(opcode)
                    .ok_or_else(|| unexpected_error!("Unknown opcode 0x{:02X}", opcode))?
            };

            match kind {
                OperandKind::None => {}
                OperandKind::Byte => position += 1,
                OperandKind::Word => position += 2,
                OperandKind::DWord => position += 4,
                OperandKind::QWord => position += 8,
                OperandKind::Switch => {
                    let count = read_u32(&out, position)?;
                    position += (count as usize + 1) * 4;
                }
                OperandKind::TypeToken
                | OperandKind::FieldToken
                | OperandKind::MethodToken
                | OperandKind::SignatureToken
                | OperandKind::StringToken
                | OperandKind::AnyToken => {
                    let pseudo = read_u32(&out, position)?;
                    let token = self.resolve_pseudo(pseudo, kind, indexer, heaps)?;
                    out[position..position + 4].copy_from_slice(&token.value().to_le_bytes());
                    position += 4;
                }
            }
        }
        Ok(out)
    }

    fn resolve_pseudo(
        &mut self,
        pseudo: u32,
        kind: OperandKind,
        indexer: &mut ReferenceIndexer<'_>,
        heaps: &mut MetadataHeaps,
    ) -> Result<Token> {
        let index = pseudo as usize;
        let module = indexer.module;
        let target = module
            .pseudo_tokens
            .get(index)
            .ok_or_else(|| unexpected_error!("Pseudo-token {} has no target", pseudo))?;

        if let Some(token) = self.resolved.get(index).copied().flatten() {
            return Ok(token);
        }

        let token = match (kind, target) {
            (OperandKind::StringToken, PseudoTarget::String(value)) => {
                heaps.user_strings.intern(value)?
            }
            (OperandKind::TypeToken | OperandKind::AnyToken, PseudoTarget::Type(ty)) => {
                indexer.token_for_type(ty)?
            }
            (OperandKind::FieldToken | OperandKind::AnyToken, PseudoTarget::Field(field)) => {
                indexer.token_for_field(field)?
            }
            (OperandKind::MethodToken | OperandKind::AnyToken, PseudoTarget::Method(method)) => {
                indexer.token_for_method(method)?
            }
            (OperandKind::SignatureToken, PseudoTarget::Signature(signature)) => {
                let mut blob = BufferWriter::new();
                SignatureEncoder::new(indexer).encode_method(&mut blob, signature)?;
                let offset = heaps.blobs.intern(blob.as_slice())?;
                let row = indexer.standalone_sig_row(offset)?;
                Token::from_table_row(TableId::StandAloneSig, row)
            }
            _ => {
                return Err(unexpected_error!(
                    "Pseudo-token {} target does not match its operand kind {:?}",
                    pseudo,
                    kind
                ))
            }
        };

        self.resolved[index] = Some(token);
        Ok(token)
    }

    fn write_exception_section(
        &mut self,
        regions: &[ExceptionRegionData],
        indexer: &mut ReferenceIndexer<'_>,
    ) -> Result<()> {
        self.stream.align(4, 0);

        // The format choice is global per method: small only when the section
        // size fits a byte and every region fits the narrow fields.
        let small_size = regions.len() * 12 + 4;
        let use_small = small_size <= 0xFF
            && regions.iter().all(|region| {
                region.try_offset <= 0xFFFF
                    && region.handler_offset <= 0xFFFF
                    && region.try_length <= 0xFF
                    && region.handler_length <= 0xFF
            });

        if use_small {
            self.stream.write_u8(EH_SMALL);
            #[allow(clippy::cast_possible_truncation)]
            self.stream.write_u8(small_size as u8);
            self.stream.write_u16(0);
            for region in regions {
                let (flags, extra) = region_flags_and_extra(region, indexer)?;
                #[allow(clippy::cast_possible_truncation)]
                {
                    self.stream.write_u16(flags as u16);
                    self.stream.write_u16(region.try_offset as u16);
                    self.stream.write_u8(region.try_length as u8);
                    self.stream.write_u16(region.handler_offset as u16);
                    self.stream.write_u8(region.handler_length as u8);
                }
                self.stream.write_u32(extra);
            }
        } else {
            let fat_size = regions.len() * 24 + 4;
            self.stream.write_u8(EH_FAT);
            #[allow(clippy::cast_possible_truncation)]
            {
                self.stream.write_u8(fat_size as u8);
                self.stream.write_u16((fat_size >> 8) as u16);
            }
            for region in regions {
                let (flags, extra) = region_flags_and_extra(region, indexer)?;
                self.stream.write_u32(flags);
                self.stream.write_u32(region.try_offset);
                self.stream.write_u32(region.try_length);
                self.stream.write_u32(region.handler_offset);
                self.stream.write_u32(region.handler_length);
                self.stream.write_u32(extra);
            }
        }
        Ok(())
    }
}

fn region_flags_and_extra(
    region: &ExceptionRegionData,
    indexer: &mut ReferenceIndexer<'_>,
) -> Result<(u32, u32)> {
    Ok(match &region.kind {
        ExceptionRegionKind::Catch(ty) => (0x0000, indexer.token_for_type(ty)?.value()),
        ExceptionRegionKind::Filter(decision_offset) => (0x0001, *decision_offset),
        ExceptionRegionKind::Finally => (0x0002, 0),
        ExceptionRegionKind::Fault => (0x0004, 0),
    })
}

fn read_u32(data: &[u8], position: usize) -> Result<u32> {
    let bytes: [u8; 4] = data
        .get(position..position + 4)
        .and_then(|slice| slice.try_into().ok())
        .ok_or_else(|| unexpected_error!("Truncated IL operand at offset {}", position))?;
    Ok(u32::from_le_bytes(bytes))
}

/// Operand kind of a single-byte opcode, `None` for undefined encodings.
#[allow(clippy::match_same_arms)]
fn operand_kind(opcode: u8) -> Option<OperandKind> {
    Some(match opcode {
        0x00..=0x0D => OperandKind::None,
        0x0E..=0x13 => OperandKind::Byte, // ldarg.s .. stloc.s
        0x14..=0x1E => OperandKind::None, // ldnull, ldc.i4.m1 .. ldc.i4.8
        0x1F => OperandKind::Byte,        // ldc.i4.s
        0x20 => OperandKind::DWord,       // ldc.i4
        0x21 => OperandKind::QWord,       // ldc.i8
        0x22 => OperandKind::DWord,       // ldc.r4
        0x23 => OperandKind::QWord,       // ldc.r8
        0x25 | 0x26 => OperandKind::None, // dup, pop
        0x27 | 0x28 => OperandKind::MethodToken, // jmp, call
        0x29 => OperandKind::SignatureToken, // calli
        0x2A => OperandKind::None,        // ret
        0x2B..=0x37 => OperandKind::Byte, // short branches
        0x38..=0x44 => OperandKind::DWord, // long branches
        0x45 => OperandKind::Switch,
        0x46..=0x6E => OperandKind::None, // ldind/stind, arithmetic, conv
        0x6F => OperandKind::MethodToken, // callvirt
        0x70 | 0x71 => OperandKind::TypeToken, // cpobj, ldobj
        0x72 => OperandKind::StringToken, // ldstr
        0x73 => OperandKind::MethodToken, // newobj
        0x74 | 0x75 => OperandKind::TypeToken, // castclass, isinst
        0x76 => OperandKind::None,        // conv.r.un
        0x79 => OperandKind::TypeToken,   // unbox
        0x7A => OperandKind::None,        // throw
        0x7B..=0x80 => OperandKind::FieldToken, // ldfld .. stsfld
        0x81 => OperandKind::TypeToken,   // stobj
        0x82..=0x8B => OperandKind::None, // conv.ovf.*.un
        0x8C | 0x8D => OperandKind::TypeToken, // box, newarr
        0x8E => OperandKind::None,        // ldlen
        0x8F => OperandKind::TypeToken,   // ldelema
        0x90..=0xA2 => OperandKind::None, // ldelem.*, stelem.*
        0xA3 | 0xA4 | 0xA5 => OperandKind::TypeToken, // ldelem, stelem, unbox.any
        0xB3..=0xBA => OperandKind::None, // conv.ovf.*
        0xC2 => OperandKind::TypeToken,   // refanyval
        0xC3 => OperandKind::None,        // ckfinite
        0xC6 => OperandKind::TypeToken,   // mkrefany
        0xD0 => OperandKind::AnyToken,    // ldtoken
        0xD1..=0xD5 => OperandKind::None, // conv.u2 .. conv.ovf.u
        0xD6..=0xDB => OperandKind::None, // add.ovf .. sub.ovf.un
        0xDC => OperandKind::None,        // endfinally
        0xDD => OperandKind::DWord,       // leave
        0xDE => OperandKind::Byte,        // leave.s
        0xDF | 0xE0 => OperandKind::None, // stind.i, conv.u
        _ => return None,
    })
}

/// Operand kind of a 0xFE-prefixed opcode.
#[allow(clippy::match_same_arms)]
fn prefixed_operand_kind(opcode: u8) -> Option<OperandKind> {
    Some(match opcode {
        0x00..=0x05 => OperandKind::None, // arglist, ceq .. clt.un
        0x06 | 0x07 => OperandKind::MethodToken, // ldftn, ldvirtftn
        0x09..=0x0E => OperandKind::Word, // ldarg .. stloc
        0x0F => OperandKind::None,        // localloc
        0x11 => OperandKind::None,        // endfilter
        0x12 => OperandKind::Byte,        // unaligned.
        0x13 | 0x14 => OperandKind::None, // volatile., tail.
        0x15 | 0x16 => OperandKind::TypeToken, // initobj, constrained.
        0x17 | 0x18 => OperandKind::None, // cpblk, initblk
        0x19 => OperandKind::Byte,        // no.
        0x1A => OperandKind::None,        // rethrow
        0x1C => OperandKind::TypeToken,   // sizeof
        0x1D | 0x1E => OperandKind::None, // refanytype, readonly.
        _ => return None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::model::{LocalVariableData, ModuleData};
    use crate::metadata::signatures::TypeSig;
    use uguid::Guid;

    fn body(il: Vec<u8>) -> MethodBodyData {
        MethodBodyData {
            il,
            max_stack: 4,
            init_locals: true,
            locals: Vec::new(),
            exception_regions: Vec::new(),
        }
    }

    #[test]
    fn test_tiny_header_selection() {
        let module = ModuleData::new("m.dll", Guid::ZERO);
        let mut indexer = ReferenceIndexer::new(&module);
        let mut heaps = MetadataHeaps::new();
        let mut encoder = MethodBodyEncoder::new(0);

        // 40 bytes of nops followed by ret would be 41; use 39 nops + ret = 40.
        let mut il = vec![0x00; 39];
        il.push(0x2A);
        let encoded = encoder.encode(&body(il), &mut indexer, &mut heaps).unwrap();

        assert_eq!(encoded.offset, 0);
        assert_eq!(encoder.stream()[0], (40 << 2) | 0x02);
        assert_eq!(encoded.local_sig_token, Token::new(0));
    }

    #[test]
    fn test_fat_header_for_exception_regions() {
        let module = ModuleData::new("m.dll", Guid::ZERO);
        let mut indexer = ReferenceIndexer::new(&module);
        let mut heaps = MetadataHeaps::new();
        let mut encoder = MethodBodyEncoder::new(0);

        let mut data = body(vec![0x00; 40]);
        data.exception_regions.push(ExceptionRegionData {
            kind: ExceptionRegionKind::Finally,
            try_offset: 0,
            try_length: 10,
            handler_offset: 10,
            handler_length: 5,
        });
        encoder.encode(&data, &mut indexer, &mut heaps).unwrap();

        let stream = encoder.stream();
        let flags = u16::from_le_bytes([stream[0], stream[1]]);
        assert_eq!(flags & 0x3, 0x3);
        assert_ne!(flags & FAT_MORE_SECTIONS, 0);
        assert_ne!(flags & FAT_INIT_LOCALS, 0);
        assert_eq!(u16::from_le_bytes([stream[2], stream[3]]), 4); // max stack
        assert_eq!(
            u32::from_le_bytes([stream[4], stream[5], stream[6], stream[7]]),
            40
        );

        // Small EH section: kind byte, size 1*12+4, reserved padding.
        let section = 12 + 40; // header + aligned IL
        assert_eq!(stream[section], EH_SMALL);
        assert_eq!(stream[section + 1], 16);
        // Finally handler flag.
        assert_eq!(
            u16::from_le_bytes([stream[section + 4], stream[section + 5]]),
            0x0002
        );
    }

    #[test]
    fn test_tiny_bodies_deduplicate_on_raw_il() {
        let module = ModuleData::new("m.dll", Guid::ZERO);
        let mut indexer = ReferenceIndexer::new(&module);
        let mut heaps = MetadataHeaps::new();
        let mut encoder = MethodBodyEncoder::new(0);

        let first = encoder
            .encode(&body(vec![0x00, 0x2A]), &mut indexer, &mut heaps)
            .unwrap();
        let second = encoder
            .encode(&body(vec![0x00, 0x2A]), &mut indexer, &mut heaps)
            .unwrap();
        let third = encoder
            .encode(&body(vec![0x2A]), &mut indexer, &mut heaps)
            .unwrap();

        assert_eq!(first.offset, second.offset);
        assert_ne!(first.offset, third.offset);
    }

    #[test]
    fn test_ldstr_operand_resolves_to_user_string_token() {
        let mut module = ModuleData::new("m.dll", Guid::ZERO);
        let pseudo = module.add_pseudo_token(PseudoTarget::String("hello".to_string()));
        let mut indexer = ReferenceIndexer::new(&module);
        let mut heaps = MetadataHeaps::new();
        let mut encoder = MethodBodyEncoder::new(module.pseudo_tokens.len());

        let mut il = vec![0x72];
        il.extend_from_slice(&pseudo.0.to_le_bytes());
        il.push(0x2A);
        encoder.encode(&body(il), &mut indexer, &mut heaps).unwrap();

        let stream = encoder.stream();
        let operand = u32::from_le_bytes([stream[2], stream[3], stream[4], stream[5]]);
        assert_eq!(operand >> 24, 0x70);
        assert_eq!(operand & 0x00FF_FFFF, 1);
    }

    #[test]
    fn test_switch_operand_is_skipped() {
        let mut module = ModuleData::new("m.dll", Guid::ZERO);
        let pseudo = module.add_pseudo_token(PseudoTarget::String("after".to_string()));
        let mut indexer = ReferenceIndexer::new(&module);
        let mut heaps = MetadataHeaps::new();
        let mut encoder = MethodBodyEncoder::new(module.pseudo_tokens.len());

        // switch with 2 targets, then ldstr, then ret.
        let mut il = vec![0x45];
        il.extend_from_slice(&2u32.to_le_bytes());
        il.extend_from_slice(&8u32.to_le_bytes());
        il.extend_from_slice(&16u32.to_le_bytes());
        il.push(0x72);
        il.extend_from_slice(&pseudo.0.to_le_bytes());
        il.push(0x2A);
        encoder.encode(&body(il), &mut indexer, &mut heaps).unwrap();

        let stream = encoder.stream();
        // Switch targets are untouched.
        assert_eq!(
            u32::from_le_bytes([stream[6], stream[7], stream[8], stream[9]]),
            8
        );
        let operand_at = 1 + 13 + 1;
        let operand = u32::from_le_bytes([
            stream[operand_at],
            stream[operand_at + 1],
            stream[operand_at + 2],
            stream[operand_at + 3],
        ]);
        assert_eq!(operand >> 24, 0x70);
    }

    #[test]
    fn test_locals_produce_standalone_sig_token() {
        let module = ModuleData::new("m.dll", Guid::ZERO);
        let mut indexer = ReferenceIndexer::new(&module);
        let mut heaps = MetadataHeaps::new();
        let mut encoder = MethodBodyEncoder::new(0);

        let mut data = body(vec![0x2A]);
        data.locals.push(LocalVariableData {
            var_type: TypeSig::I4,
        });
        let encoded = encoder.encode(&data, &mut indexer, &mut heaps).unwrap();

        assert_eq!(encoded.local_sig_token.table(), 0x11);
        assert_eq!(encoded.local_sig_token.row(), 1);
        // Locals force the fat header even for one-byte IL.
        let stream = encoder.stream();
        let flags = u16::from_le_bytes([stream[0], stream[1]]);
        assert_eq!(flags & 0x3, 0x3);
        assert_eq!(
            u32::from_le_bytes([stream[8], stream[9], stream[10], stream[11]]),
            encoded.local_sig_token.value()
        );
    }

    #[test]
    fn test_unknown_opcode_is_rejected() {
        let module = ModuleData::new("m.dll", Guid::ZERO);
        let mut indexer = ReferenceIndexer::new(&module);
        let mut heaps = MetadataHeaps::new();
        let mut encoder = MethodBodyEncoder::new(0);

        let result = encoder.encode(&body(vec![0xC5]), &mut indexer, &mut heaps);
        assert!(result.is_err());
    }
}
