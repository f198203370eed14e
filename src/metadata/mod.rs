//! Emission of ECMA-335 CLI metadata.
//!
//! This module implements the full write-side metadata pipeline. The stages are
//! leaf-first; each consumes the output of the previous one and all mutable
//! per-generation state is owned by the [`emit::MetadataAssembler`]:
//!
//! 1. [`heaps`] - content-addressed #Strings, #US, #Blob and #GUID heaps
//! 2. [`signatures`] - the binary signature grammar stored in the blob heap
//! 3. [`index`] - stable 1-based row ids for definitions, dedup for references
//! 4. [`tables`] - the relational metadata tables, coded indices and widths
//! 5. [`body`] - IL method body encoding with pseudo-token resolution
//! 6. [`emit`] - the orchestrator producing the final metadata stream
//!
//! The read-only input object model lives in [`model`]; the debug-information
//! boundary (sequence points, scopes, imports) is the narrow trait in [`debug`].

pub mod body;
pub mod debug;
pub mod emit;
pub mod heaps;
pub mod index;
pub mod model;
pub mod signatures;
pub mod tables;
pub mod token;
