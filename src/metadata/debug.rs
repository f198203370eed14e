//! # Debug Information Boundary
//!
//! The emitter does not own any symbol-store binary format. For each method with
//! source locations it calls a [`DebugInfoWriter`] with the method token, the
//! resolved local-signature token, sequence points, the scope tree and the
//! namespace-import strings of the method's context. Platform adapters implement
//! the trait outside this crate; [`NullDebugWriter`] is the no-op implementation
//! the pipeline and its tests run against.
//!
//! Import strings use a fixed textual grammar (`U<ns>`, `A<alias> U<ns>`,
//! `X<alias>`, `Z<alias> <assembly>`, `T<type>`, `A<alias> T<type>`,
//! `E<name> <extern-alias>`). Strings over [`DEBUG_STRING_LIMIT`] bytes are
//! dropped with a warning diagnostic, never an error.

use crate::metadata::token::Token;
use crate::Result;

/// Byte limit for strings handed across the debug boundary.
pub const DEBUG_STRING_LIMIT: usize = 2046;

/// One source location mapping of an IL offset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SequencePoint {
    /// IL offset the mapping starts at
    pub il_offset: u32,
    /// Start line (1-based)
    pub start_line: u32,
    /// Start column (1-based)
    pub start_column: u16,
    /// End line (1-based)
    pub end_line: u32,
    /// End column (1-based)
    pub end_column: u16,
    /// Source document path
    pub document: String,
}

/// One lexical scope of a method, with nested child scopes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalScopeData {
    /// IL offset the scope opens at
    pub start_offset: u32,
    /// IL offset the scope closes at
    pub end_offset: u32,
    /// Named local slots visible in this scope
    pub locals: Vec<ScopeLocal>,
    /// Nested scopes
    pub children: Vec<LocalScopeData>,
}

/// A named local variable slot within a scope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScopeLocal {
    /// Local-signature slot index
    pub slot: u32,
    /// Variable name
    pub name: String,
}

/// Async state-machine metadata of a method.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AsyncMethodInfo {
    /// Token of the kickoff method that started the state machine
    pub kickoff_method: Token,
    /// IL offset of the catch handler, if the method has one
    pub catch_handler_offset: Option<u32>,
    /// (yield offset, resume offset) pairs, one per await
    pub yield_resume_offsets: Vec<(u32, u32)>,
}

/// One namespace-import record of a method's context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Import {
    /// `using Ns;`
    Namespace(String),
    /// `using Alias = Ns;`
    AliasedNamespace {
        /// Alias name
        alias: String,
        /// Target namespace
        namespace: String,
    },
    /// `extern alias A;`
    ExternAlias(String),
    /// An extern-alias-qualified using
    ExternAliasAssembly {
        /// Alias name
        alias: String,
        /// Assembly display name
        assembly: String,
    },
    /// `using static T;` or a type import
    Type(String),
    /// `using Alias = T;`
    AliasedType {
        /// Alias name
        alias: String,
        /// Assembly-qualified type name
        type_name: String,
    },
    /// A named extern-alias mapping
    ExternAliasNamed {
        /// Import name
        name: String,
        /// Extern alias it resolves through
        extern_alias: String,
    },
}

/// Formats one import record in the textual debug-import grammar.
#[must_use]
pub fn format_import(import: &Import) -> String {
    match import {
        Import::Namespace(namespace) => format!("U{namespace}"),
        Import::AliasedNamespace { alias, namespace } => format!("A{alias} U{namespace}"),
        Import::ExternAlias(alias) => format!("X{alias}"),
        Import::ExternAliasAssembly { alias, assembly } => format!("Z{alias} {assembly}"),
        Import::Type(type_name) => format!("T{type_name}"),
        Import::AliasedType { alias, type_name } => format!("A{alias} T{type_name}"),
        Import::ExternAliasNamed { name, extern_alias } => format!("E{name} {extern_alias}"),
    }
}

/// The per-method debug payload carried by the object model.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MethodDebugData {
    /// Source location mappings
    pub sequence_points: Vec<SequencePoint>,
    /// Root lexical scopes
    pub scopes: Vec<LocalScopeData>,
    /// Namespace imports in effect
    pub imports: Vec<Import>,
    /// Async state-machine metadata, if the method is a state-machine MoveNext
    pub async_info: Option<AsyncMethodInfo>,
}

/// The narrow contract the emitter drives per method with debug information.
///
/// Calls arrive in a fixed order: `open_method`, `define_sequence_points`,
/// the scope tree (`open_scope` / `define_local` / `close_scope`, nested),
/// `define_imports`, optionally `define_async_info`, then `close_method`.
pub trait DebugInfoWriter {
    /// Begins the record for one method.
    ///
    /// # Errors
    ///
    /// Adapter-defined; a failure aborts emission.
    fn open_method(&mut self, method_token: Token, local_sig_token: Token) -> Result<()>;

    /// Delivers the sequence points of the open method.
    ///
    /// # Errors
    ///
    /// Adapter-defined; a failure aborts emission.
    fn define_sequence_points(&mut self, points: &[SequencePoint]) -> Result<()>;

    /// Opens a lexical scope at the given IL offset.
    ///
    /// # Errors
    ///
    /// Adapter-defined; a failure aborts emission.
    fn open_scope(&mut self, start_offset: u32) -> Result<()>;

    /// Declares a named local slot in the innermost open scope.
    ///
    /// # Errors
    ///
    /// Adapter-defined; a failure aborts emission.
    fn define_local(&mut self, slot: u32, name: &str) -> Result<()>;

    /// Closes the innermost open scope at the given IL offset.
    ///
    /// # Errors
    ///
    /// Adapter-defined; a failure aborts emission.
    fn close_scope(&mut self, end_offset: u32) -> Result<()>;

    /// Delivers async state-machine metadata for the open method.
    ///
    /// # Errors
    ///
    /// Adapter-defined; a failure aborts emission.
    fn define_async_info(&mut self, info: &AsyncMethodInfo) -> Result<()>;

    /// Delivers the formatted import strings of the open method's context.
    ///
    /// # Errors
    ///
    /// Adapter-defined; a failure aborts emission.
    fn define_imports(&mut self, imports: &[String]) -> Result<()>;

    /// Ends the record for the open method.
    ///
    /// # Errors
    ///
    /// Adapter-defined; a failure aborts emission.
    fn close_method(&mut self) -> Result<()>;
}

/// A [`DebugInfoWriter`] that discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullDebugWriter;

impl DebugInfoWriter for NullDebugWriter {
    fn open_method(&mut self, _method_token: Token, _local_sig_token: Token) -> Result<()> {
        Ok(())
    }

    fn define_sequence_points(&mut self, _points: &[SequencePoint]) -> Result<()> {
        Ok(())
    }

    fn open_scope(&mut self, _start_offset: u32) -> Result<()> {
        Ok(())
    }

    fn define_local(&mut self, _slot: u32, _name: &str) -> Result<()> {
        Ok(())
    }

    fn close_scope(&mut self, _end_offset: u32) -> Result<()> {
        Ok(())
    }

    fn define_async_info(&mut self, _info: &AsyncMethodInfo) -> Result<()> {
        Ok(())
    }

    fn define_imports(&mut self, _imports: &[String]) -> Result<()> {
        Ok(())
    }

    fn close_method(&mut self) -> Result<()> {
        Ok(())
    }
}
