// Copyright 2025 Johann Kempter
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//
// SPDX-License-Identifier: Apache-2.0

#![doc(html_no_source)]
#![deny(missing_docs)]
#![allow(clippy::too_many_arguments)]

//! # dotforge
//!
//! A cross-platform library for emitting ECMA-335 CLI metadata. Built in pure Rust,
//! `dotforge` is the write-side companion to an analysis framework: it takes an
//! in-memory object model of a compiled module (types, members, signatures, attributes,
//! method bodies) and serializes the four metadata heaps, the relational metadata tables
//! and the IL byte streams with fully resolved tokens into caller-supplied buffers,
//! ready to be placed into a portable-executable image.
//!
//! ## Features
//!
//! - **📦 Complete table emission** - All ECMA-335 metadata tables with required sort
//!   orders, coded indices and 2-vs-4-byte index width selection
//! - **🔁 Deterministic output** - Content-addressed heap interning and suffix-folded
//!   string packing make repeated runs byte-identical
//! - **⚙️ IL finalization** - Pseudo-token rewriting, tiny/fat method headers,
//!   small-body deduplication and exception-handler tables
//! - **🔧 Cross-platform** - No Windows or .NET runtime dependency
//! - **🛡️ Memory safe** - Built in Rust with comprehensive error handling
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use dotforge::prelude::*;
//!
//! let module = ModuleData::new("demo.dll", uguid::Guid::ZERO);
//! let mut buffers = MetadataBuffers::default();
//! let summary = MetadataAssembler::new(&module).assemble(&mut buffers)?;
//! println!("emitted {} bytes of metadata", buffers.metadata.len());
//! # Ok::<(), dotforge::Error>(())
//! ```
//!
//! ## Architecture
//!
//! `dotforge` is organized as a leaf-first pipeline, each stage owned by one module:
//!
//! - [`metadata::heaps`] - Content-addressed #Strings, #US, #Blob and #GUID heaps
//! - [`metadata::signatures`] - The blob-heap binary signature grammar
//! - [`metadata::index`] - Stable 1-based row assignment for definitions and references
//! - [`metadata::tables`] - Table rows, coded indices and width computation
//! - [`metadata::body`] - IL method body encoding and token resolution
//! - [`metadata::emit`] - The assembler driving the full pipeline and the stream header
//!
//! The object model consumed by the pipeline lives in [`metadata::model`] and is
//! traversed read-only; one [`metadata::emit::MetadataAssembler`] owns all mutable
//! per-generation state and enforces the open → indices-closed → streams-closed
//! lifecycle.
//!
//! ### Testing
//!
//! ```bash
//! cargo test
//! cargo test --release  # For performance tests
//! ```

#[macro_use]
pub(crate) mod error;
pub(crate) mod file;

/// Convenient re-exports of the most commonly used types and traits.
///
/// This module provides a curated selection of the most frequently used types
/// from across the dotforge library, allowing for convenient glob imports.
///
/// # Example
///
/// ```rust,no_run
/// use dotforge::prelude::*;
///
/// let module = ModuleData::new("demo.dll", uguid::Guid::ZERO);
/// let mut buffers = MetadataBuffers::default();
/// MetadataAssembler::new(&module).assemble(&mut buffers)?;
/// # Ok::<(), dotforge::Error>(())
/// ```
pub mod prelude;

/// Emission of CIL metadata based on ECMA-335
///
/// This module implements the complete write side of the ECMA-335 metadata system:
/// heaps, tables, signatures, tokens and IL method bodies.
///
/// # Key Types
///
/// - [`metadata::emit::MetadataAssembler`] - Drives the full emission pipeline
/// - [`metadata::model::ModuleData`] - The input object model
/// - [`metadata::token::Token`] - 32-bit metadata tokens
/// - [`metadata::tables::TableId`] - Enumeration of all metadata tables
pub mod metadata;

pub use error::Error;

/// Convenience `Result` type used across the whole crate.
pub type Result<T> = std::result::Result<T, Error>;

pub use metadata::emit::{EmitSummary, MetadataAssembler, MetadataBuffers};
pub use metadata::token::Token;
