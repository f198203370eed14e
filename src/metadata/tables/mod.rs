//! # Metadata Tables
//!
//! Write-side implementation of the relational metadata tables. [`TableId`]
//! enumerates the tables, [`CodedIndex`] packs cross-table references,
//! [`TableInfo`] freezes row counts into index widths, the row structs in
//! [`rows`] serialize themselves against those widths, and [`TableBuilder`]
//! populates everything from the object model in the canonical order.
//!
//! ## References
//!
//! - [ECMA-335 Standard](https://ecma-international.org/wp-content/uploads/ECMA-335_6th_edition_june_2012.pdf) - Partition II, Sections 22 and 24.2.6

mod builder;
mod codedindex;
mod rows;
mod tableid;
mod tableinfo;

pub use builder::{TableBuilder, TableSet};
pub use codedindex::{CodedIndex, CodedIndexType};
pub use rows::*;
pub use tableid::TableId;
pub use tableinfo::{TableInfo, TableRowInfo, TABLE_COUNT};
