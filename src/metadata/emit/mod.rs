//! # Metadata Assembly
//!
//! [`MetadataAssembler`] drives the full emission pipeline over one
//! [`ModuleData`] generation: index creation, IL body encoding (with the debug
//! boundary driven per method), table population, heap freezing, string
//! resolution and physical stream serialization. The output lands in a caller
//! supplied [`MetadataBuffers`]; a container format writer places the four
//! regions into an image and relocates the RVA-bearing columns.
//!
//! Emission is all-or-nothing: the first hard error aborts the pass. Advisory
//! conditions (oversized names, dropped debug imports) are collected as
//! [`EmitDiagnostic`] values and returned in the [`EmitSummary`].

mod streams;

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::file::BufferWriter;
use crate::metadata::body::{EncodedBody, MethodBodyEncoder};
use crate::metadata::debug::{
    format_import, DebugInfoWriter, LocalScopeData, NullDebugWriter, DEBUG_STRING_LIMIT,
};
use crate::metadata::heaps::MetadataHeaps;
use crate::metadata::index::ReferenceIndexer;
use crate::metadata::model::{MethodHandle, ModuleData};
use crate::metadata::tables::{TableBuilder, TableId, TableInfo, TABLE_COUNT};
use crate::metadata::token::Token;
use crate::{Error, Result};

/// A shareable cooperative cancellation signal.
///
/// Clones observe the same flag; the assembler polls it between method bodies
/// and aborts with [`Error::Cancelled`] once it is set.
#[derive(Debug, Clone, Default)]
pub struct CancellationFlag(Arc<AtomicBool>);

impl CancellationFlag {
    /// Creates a new, unset flag.
    #[must_use]
    pub fn new() -> Self {
        CancellationFlag(Arc::new(AtomicBool::new(false)))
    }

    /// Requests cancellation; observed by every clone.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    /// Whether cancellation was requested.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Advisory conditions collected during emission.
///
/// None of these abort the pass; the offending value is emitted as-is (or, for
/// debug imports, dropped) and the caller decides how to surface the warning.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EmitDiagnostic {
    /// An identifier name exceeds the metadata name length limit.
    #[error("identifier '{name}' exceeds the {limit}-byte name limit")]
    NameTooLong {
        /// The oversized name
        name: String,
        /// The limit it exceeds, in UTF-8 bytes
        limit: usize,
    },

    /// A namespace string exceeds the metadata name length limit.
    #[error("namespace '{namespace}' exceeds the {limit}-byte limit")]
    NamespaceTooLong {
        /// The oversized namespace
        namespace: String,
        /// The limit it exceeds, in UTF-8 bytes
        limit: usize,
    },

    /// A file path string exceeds the path length limit.
    #[error("path '{path}' exceeds the {limit}-byte limit")]
    PathTooLong {
        /// The oversized path
        path: String,
        /// The limit it exceeds, in UTF-8 bytes
        limit: usize,
    },

    /// A debug import string was dropped for exceeding the boundary limit.
    #[error("debug import string of {length} bytes exceeds the {limit}-byte limit")]
    DebugStringTooLong {
        /// Byte length of the dropped string
        length: usize,
        /// The boundary limit
        limit: usize,
    },
}

/// The four output regions of one emission pass.
///
/// Offsets inside the rows (method RVAs, field RVAs, resource offsets) are
/// relative to the start of the respective buffer; the container writer adds
/// the section bases.
#[derive(Debug, Default)]
pub struct MetadataBuffers {
    /// The metadata root, stream directory and all streams
    pub metadata: Vec<u8>,
    /// Encoded IL method bodies, in MethodDef row order
    pub il: Vec<u8>,
    /// Field mapped data referenced by FieldRva rows, 8-aligned per entry
    pub mapped_field_data: Vec<u8>,
    /// Embedded resource payloads, each length-prefixed and 8-aligned
    pub resources: Vec<u8>,
}

/// What one emission pass produced, beyond the buffers themselves.
#[derive(Debug)]
pub struct EmitSummary {
    /// Advisory diagnostics in the order they were observed
    pub diagnostics: Vec<EmitDiagnostic>,
    /// Body-stream placement of every method that has a body
    pub method_bodies: HashMap<MethodHandle, EncodedBody>,
    /// Final row count per table
    pub row_counts: [u32; TABLE_COUNT],
}

/// Drives one full metadata emission pass over a module.
pub struct MetadataAssembler<'m> {
    module: &'m ModuleData,
    cancel: CancellationFlag,
}

impl<'m> MetadataAssembler<'m> {
    /// Creates an assembler for `module`.
    #[must_use]
    pub fn new(module: &'m ModuleData) -> Self {
        MetadataAssembler {
            module,
            cancel: CancellationFlag::new(),
        }
    }

    /// Creates an assembler that polls `cancel` between method bodies.
    #[must_use]
    pub fn with_cancellation(module: &'m ModuleData, cancel: CancellationFlag) -> Self {
        MetadataAssembler { module, cancel }
    }

    /// Runs the pipeline without debug information output.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Cancelled`] on cooperative cancellation; propagates
    /// heap, table and body encoding failures.
    pub fn assemble(self, buffers: &mut MetadataBuffers) -> Result<EmitSummary> {
        let mut writer = NullDebugWriter;
        self.assemble_with_debug(buffers, &mut writer)
    }

    /// Runs the pipeline, driving `debug` for every method with debug data.
    ///
    /// Per method the calls arrive as `open_method`, `define_sequence_points`,
    /// the scope tree, `define_imports`, optionally `define_async_info`, then
    /// `close_method`. Methods without debug data skip the writer entirely.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Cancelled`] on cooperative cancellation; propagates
    /// debug writer failures and every pipeline error.
    pub fn assemble_with_debug<D: DebugInfoWriter>(
        self,
        buffers: &mut MetadataBuffers,
        debug: &mut D,
    ) -> Result<EmitSummary> {
        let mut indexer = ReferenceIndexer::new(self.module);
        indexer.create_indices()?;

        let mut heaps = MetadataHeaps::new();
        let mut encoder = MethodBodyEncoder::new(self.module.pseudo_tokens.len());
        let mut bodies: HashMap<MethodHandle, EncodedBody> = HashMap::new();
        let mut diagnostics = Vec::new();

        for method in indexer.method_rows.in_order().to_vec() {
            if self.cancel.is_cancelled() {
                return Err(Error::Cancelled);
            }
            let data = &self.module.methods[method.0];

            let encoded = match &data.body {
                Some(body) => {
                    let encoded = encoder.encode(body, &mut indexer, &mut heaps)?;
                    bodies.insert(method, encoded);
                    Some(encoded)
                }
                None => None,
            };

            if let Some(debug_info) = &data.debug_info {
                let row = indexer.method_rows.row(method)?;
                let method_token = Token::from_table_row(TableId::MethodDef, row);
                let local_sig_token = encoded.map_or(Token::new(0), |e| e.local_sig_token);

                debug.open_method(method_token, local_sig_token)?;
                debug.define_sequence_points(&debug_info.sequence_points)?;
                for scope in &debug_info.scopes {
                    write_scope(debug, scope)?;
                }

                let mut imports = Vec::with_capacity(debug_info.imports.len());
                for import in &debug_info.imports {
                    let formatted = format_import(import);
                    if formatted.len() > DEBUG_STRING_LIMIT {
                        diagnostics.push(EmitDiagnostic::DebugStringTooLong {
                            length: formatted.len(),
                            limit: DEBUG_STRING_LIMIT,
                        });
                        continue;
                    }
                    imports.push(formatted);
                }
                debug.define_imports(&imports)?;

                if let Some(async_info) = &debug_info.async_info {
                    debug.define_async_info(async_info)?;
                }
                debug.close_method()?;
            }
        }
        buffers.il = encoder.into_stream();

        // Indices close: later lookups resolve existing rows, new references
        // are contract violations.
        indexer.close();

        let builder = TableBuilder::new(&mut indexer, &mut heaps, &bodies);
        let (mut tables, mut table_diagnostics) =
            builder.populate(&mut buffers.mapped_field_data, &mut buffers.resources)?;
        diagnostics.append(&mut table_diagnostics);

        heaps.freeze();
        tables.resolve_strings(&heaps.strings)?;

        let row_counts = tables.row_counts();
        let info = TableInfo::new(
            &row_counts,
            heaps.strings.size(),
            heaps.guids.size(),
            heaps.blobs.size(),
        );

        let mut buffer = BufferWriter::new();
        streams::write_streams(
            &mut buffer,
            &tables,
            &info,
            &heaps,
            self.module.generation_kind,
        )?;
        buffers.metadata = buffer.into_vec();

        Ok(EmitSummary {
            diagnostics,
            method_bodies: bodies,
            row_counts,
        })
    }
}

fn write_scope<D: DebugInfoWriter>(debug: &mut D, scope: &LocalScopeData) -> Result<()> {
    debug.open_scope(scope.start_offset)?;
    for local in &scope.locals {
        debug.define_local(local.slot, &local.name)?;
    }
    for child in &scope.children {
        write_scope(debug, child)?;
    }
    debug.close_scope(scope.end_offset)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::debug::{
        AsyncMethodInfo, Import, MethodDebugData, ScopeLocal, SequencePoint,
    };
    use crate::metadata::model::{MethodBodyData, MethodData, TypeDefData};
    use crate::metadata::signatures::{MethodSignature, TypeSig};
    use uguid::Guid;

    fn module_with_body() -> ModuleData {
        let mut module = ModuleData::new("demo.dll", Guid::ZERO);
        let ty = module.add_type(TypeDefData::new("N", "C", 0x0010_0001));
        let mut method = MethodData::new("M", 0x0086, MethodSignature::static_method(TypeSig::Void, Vec::new()));
        method.body = Some(MethodBodyData {
            il: vec![0x2A], // ret
            max_stack: 8,
            init_locals: false,
            locals: Vec::new(),
            exception_regions: Vec::new(),
        });
        module.add_method(ty, method);
        module
    }

    #[test]
    fn test_assemble_empty_module() {
        let module = ModuleData::new("demo.dll", Guid::ZERO);
        let mut buffers = MetadataBuffers::default();
        let summary = MetadataAssembler::new(&module).assemble(&mut buffers).unwrap();

        assert!(summary.diagnostics.is_empty());
        assert_eq!(summary.row_counts[TableId::Module as usize], 1);
        assert_eq!(&buffers.metadata[..4], b"BSJB");
        assert!(buffers.il.is_empty());
    }

    #[test]
    fn test_assemble_is_deterministic() {
        let module = module_with_body();
        let mut first = MetadataBuffers::default();
        MetadataAssembler::new(&module).assemble(&mut first).unwrap();
        let mut second = MetadataBuffers::default();
        MetadataAssembler::new(&module).assemble(&mut second).unwrap();

        assert_eq!(first.metadata, second.metadata);
        assert_eq!(first.il, second.il);
    }

    #[test]
    fn test_cancellation_aborts_body_encoding() {
        let module = module_with_body();
        let cancel = CancellationFlag::new();
        cancel.cancel();
        let mut buffers = MetadataBuffers::default();
        let result =
            MetadataAssembler::with_cancellation(&module, cancel).assemble(&mut buffers);
        assert!(matches!(result, Err(Error::Cancelled)));
    }

    /// Records every debug boundary call as a flat trace.
    #[derive(Default)]
    struct TracingWriter {
        trace: Vec<String>,
    }

    impl DebugInfoWriter for TracingWriter {
        fn open_method(&mut self, method_token: Token, local_sig_token: Token) -> Result<()> {
            self.trace.push(format!(
                "open {:08X} {:08X}",
                method_token.value(),
                local_sig_token.value()
            ));
            Ok(())
        }

        fn define_sequence_points(&mut self, points: &[SequencePoint]) -> Result<()> {
            self.trace.push(format!("points {}", points.len()));
            Ok(())
        }

        fn open_scope(&mut self, start_offset: u32) -> Result<()> {
            self.trace.push(format!("scope {start_offset}"));
            Ok(())
        }

        fn define_local(&mut self, slot: u32, name: &str) -> Result<()> {
            self.trace.push(format!("local {slot} {name}"));
            Ok(())
        }

        fn close_scope(&mut self, end_offset: u32) -> Result<()> {
            self.trace.push(format!("end {end_offset}"));
            Ok(())
        }

        fn define_async_info(&mut self, _info: &AsyncMethodInfo) -> Result<()> {
            self.trace.push("async".to_string());
            Ok(())
        }

        fn define_imports(&mut self, imports: &[String]) -> Result<()> {
            self.trace.push(format!("imports {}", imports.join(",")));
            Ok(())
        }

        fn close_method(&mut self) -> Result<()> {
            self.trace.push("close".to_string());
            Ok(())
        }
    }

    #[test]
    fn test_debug_writer_call_order() {
        let mut module = ModuleData::new("demo.dll", Guid::ZERO);
        let ty = module.add_type(TypeDefData::new("N", "C", 0));
        let mut method = MethodData::new("M", 0x0086, MethodSignature::static_method(TypeSig::Void, Vec::new()));
        method.body = Some(MethodBodyData {
            il: vec![0x2A],
            max_stack: 8,
            init_locals: false,
            locals: Vec::new(),
            exception_regions: Vec::new(),
        });
        method.debug_info = Some(MethodDebugData {
            sequence_points: vec![SequencePoint {
                il_offset: 0,
                start_line: 1,
                start_column: 1,
                end_line: 1,
                end_column: 10,
                document: "a.cs".to_string(),
            }],
            scopes: vec![LocalScopeData {
                start_offset: 0,
                end_offset: 1,
                locals: vec![ScopeLocal {
                    slot: 0,
                    name: "x".to_string(),
                }],
                children: Vec::new(),
            }],
            imports: vec![Import::Namespace("System".to_string())],
            async_info: None,
        });
        module.add_method(ty, method);

        let mut buffers = MetadataBuffers::default();
        let mut writer = TracingWriter::default();
        MetadataAssembler::new(&module)
            .assemble_with_debug(&mut buffers, &mut writer)
            .unwrap();

        assert_eq!(
            writer.trace,
            vec![
                "open 06000001 00000000",
                "points 1",
                "scope 0",
                "local 0 x",
                "end 1",
                "imports USystem",
                "close",
            ]
        );
    }

    #[test]
    fn test_oversized_import_is_dropped_with_diagnostic() {
        let mut module = ModuleData::new("demo.dll", Guid::ZERO);
        let ty = module.add_type(TypeDefData::new("N", "C", 0));
        let mut method = MethodData::new("M", 0x0086, MethodSignature::static_method(TypeSig::Void, Vec::new()));
        method.debug_info = Some(MethodDebugData {
            imports: vec![Import::Namespace("n".repeat(DEBUG_STRING_LIMIT + 10))],
            ..MethodDebugData::default()
        });
        module.add_method(ty, method);

        let mut buffers = MetadataBuffers::default();
        let mut writer = TracingWriter::default();
        let summary = MetadataAssembler::new(&module)
            .assemble_with_debug(&mut buffers, &mut writer)
            .unwrap();

        assert!(writer.trace.contains(&"imports ".to_string()));
        assert!(matches!(
            summary.diagnostics.as_slice(),
            [EmitDiagnostic::DebugStringTooLong { .. }]
        ));
    }
}
