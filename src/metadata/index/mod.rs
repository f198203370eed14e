//! # Row Index Assignment
//!
//! Stable 1-based row ids for everything that lands in a metadata table.
//! Definitions use [`DefinitionIndex`] (append-only, never deduplicated);
//! references use [`HeapOrReferenceIndex`] (first-seen-wins by structural key)
//! or [`InstanceAndStructuralIndex`] (an identity map in front of a structural
//! map, promoting structural hits so repeated mentions of the same model node
//! skip the structural comparison).
//!
//! The traversal that fills these indices lives in [`assigner`].

mod assigner;

pub use assigner::{
    GenericParamEntry, GenericParamOwner, GenericParamSource, MemberRefKey, ReferenceIndexer,
    TypeRefKey,
};

use std::collections::HashMap;
use std::hash::Hash;

use crate::metadata::tables::TableId;
use crate::{Error, Result};

/// Rows a table may hold; tokens reserve the high byte for the table tag.
const MAX_ROWS: u32 = 0x00FF_FFFF;

/// Append-only row assignment for definitions.
///
/// Every `add` hands out the next row id; adding the same handle twice is a
/// producer contract violation.
pub struct DefinitionIndex<H: Eq + Hash + Copy> {
    table: TableId,
    rows: HashMap<H, u32>,
    order: Vec<H>,
}

impl<H: Eq + Hash + Copy + std::fmt::Debug> DefinitionIndex<H> {
    /// Creates an empty index for the given table.
    #[must_use]
    pub fn new(table: TableId) -> Self {
        DefinitionIndex {
            table,
            rows: HashMap::new(),
            order: Vec::new(),
        }
    }

    /// Appends a definition and returns its 1-based row id.
    ///
    /// # Errors
    ///
    /// [`Error::TooManyRows`] past the 24-bit row space;
    /// [`Error::Unexpected`] when the handle was already added.
    pub fn add(&mut self, handle: H) -> Result<u32> {
        #[allow(clippy::cast_possible_truncation)]
        let row = self.order.len() as u32 + 1;
        if row > MAX_ROWS {
            return Err(Error::TooManyRows(self.table));
        }
        if self.rows.insert(handle, row).is_some() {
            return Err(unexpected_error!(
                "Definition {:?} indexed twice in {:?}",
                handle,
                self.table
            ));
        }
        self.order.push(handle);
        Ok(row)
    }

    /// The row id previously assigned to `handle`.
    ///
    /// # Errors
    ///
    /// [`Error::Unexpected`] for a handle that was never added.
    pub fn row(&self, handle: H) -> Result<u32> {
        self.rows.get(&handle).copied().ok_or_else(|| {
            unexpected_error!("Definition {:?} was never indexed in {:?}", handle, self.table)
        })
    }

    /// Number of rows assigned so far.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn len(&self) -> u32 {
        self.order.len() as u32
    }

    /// Whether no rows were assigned.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Handles in row order.
    #[must_use]
    pub fn in_order(&self) -> &[H] {
        &self.order
    }
}

/// First-seen-wins row assignment for references, keyed structurally.
pub struct HeapOrReferenceIndex<K: Eq + Hash + Clone> {
    table: TableId,
    rows: HashMap<K, u32>,
    order: Vec<K>,
    closed: bool,
}

impl<K: Eq + Hash + Clone> HeapOrReferenceIndex<K> {
    /// Creates an empty index for the given table.
    #[must_use]
    pub fn new(table: TableId) -> Self {
        HeapOrReferenceIndex {
            table,
            rows: HashMap::new(),
            order: Vec::new(),
            closed: false,
        }
    }

    /// Returns the row of `key`, interning it on first sight.
    ///
    /// # Errors
    ///
    /// [`Error::PhaseViolation`] after [`Self::close`];
    /// [`Error::TooManyRows`] past the 24-bit row space.
    pub fn get_or_add(&mut self, key: &K) -> Result<u32> {
        if let Some(row) = self.rows.get(key) {
            return Ok(*row);
        }
        if self.closed {
            return Err(Error::PhaseViolation(
                "reference indices are closed, no new rows may be added",
            ));
        }
        #[allow(clippy::cast_possible_truncation)]
        let row = self.order.len() as u32 + 1;
        if row > MAX_ROWS {
            return Err(Error::TooManyRows(self.table));
        }
        self.rows.insert(key.clone(), row);
        self.order.push(key.clone());
        Ok(row)
    }

    /// Forbids further interning; lookups keep working.
    pub fn close(&mut self) {
        self.closed = true;
    }

    /// Number of rows assigned so far.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn len(&self) -> u32 {
        self.order.len() as u32
    }

    /// Whether no rows were assigned.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Keys in row order.
    #[must_use]
    pub fn in_order(&self) -> &[K] {
        &self.order
    }
}

/// Two-level reference index: reference identity of the model node first, then
/// structural equality. A structural hit promotes the node into the identity
/// map so later mentions of the same node never re-compare structurally.
///
/// The identity map is keyed on the node's address, so every key passed to
/// [`Self::get_or_add`] must borrow from storage that outlives the index and
/// is not mutated or moved while it is alive (in practice, the [`ModuleData`]
/// owned by the caller for the whole pass). Feeding it a temporary would let
/// a later allocation reuse the address and alias an unrelated entry.
///
/// [`ModuleData`]: crate::metadata::model::ModuleData
pub struct InstanceAndStructuralIndex<K: Eq + Hash + Clone> {
    by_instance: HashMap<usize, u32>,
    structural: HeapOrReferenceIndex<K>,
}

impl<K: Eq + Hash + Clone> InstanceAndStructuralIndex<K> {
    /// Creates an empty index for the given table.
    #[must_use]
    pub fn new(table: TableId) -> Self {
        InstanceAndStructuralIndex {
            by_instance: HashMap::new(),
            structural: HeapOrReferenceIndex::new(table),
        }
    }

    /// Returns the row of the node at `key`, interning it on first sight.
    ///
    /// The instance identity is the node's address, stable because the model is
    /// immutable for the duration of the pass.
    ///
    /// # Errors
    ///
    /// [`Error::PhaseViolation`] after close; [`Error::TooManyRows`] on overflow.
    pub fn get_or_add(&mut self, key: &K) -> Result<u32> {
        let instance = std::ptr::from_ref(key) as usize;
        if let Some(row) = self.by_instance.get(&instance) {
            return Ok(*row);
        }
        let row = self.structural.get_or_add(key)?;
        self.by_instance.insert(instance, row);
        Ok(row)
    }

    /// Forbids further interning; lookups keep working.
    pub fn close(&mut self) {
        self.structural.close();
    }

    /// Number of rows assigned so far.
    #[must_use]
    pub fn len(&self) -> u32 {
        self.structural.len()
    }

    /// Keys in row order.
    #[must_use]
    pub fn in_order(&self) -> &[K] {
        self.structural.in_order()
    }
}
