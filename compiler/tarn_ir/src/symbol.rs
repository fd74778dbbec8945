//! Compiler symbols — variables and labels.
//!
//! Variables are allocated from a [`SymbolTable`] arena; each carries a
//! display name, a span, and attribute flags. Labels are continuation
//! targets introduced during lowering — they have identity only, their
//! parameter lists and bodies live in the lowering stage's side tables.

use bitflags::bitflags;

use crate::{Name, Span};

// ── ID newtypes ─────────────────────────────────────────────────────

/// Variable ID within one compilation session.
///
/// IDs are allocated sequentially starting from 0 by [`SymbolTable`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct VarId(u32);

impl VarId {
    /// Create a new variable ID from a raw index.
    #[inline]
    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    /// Get the raw `u32` value.
    #[inline]
    pub const fn raw(self) -> u32 {
        self.0
    }

    /// Get the index as `usize` (for indexing into `Vec`s).
    #[inline]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

/// Label ID — a named, parameterized continuation target.
///
/// Allocated sequentially by [`SymbolTable`]. Labels never escape the
/// expression they are declared in.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct LabelId(u32);

impl LabelId {
    /// Create a new label ID from a raw index.
    #[inline]
    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    /// Get the raw `u32` value.
    #[inline]
    pub const fn raw(self) -> u32 {
        self.0
    }
}

// ── Symbol attributes ───────────────────────────────────────────────

bitflags! {
    /// Attributes attached to a variable symbol.
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct SymbolFlags: u8 {
        /// Introduced by the compiler; invisible to the user. Only
        /// generated symbols may be merged or inlined away by the
        /// optimizer.
        const GENERATED = 1 << 0;
        /// Known non-null on every path that can read it (e.g. the binder
        /// introduced by type-test narrowing).
        const NON_NULL = 1 << 1;
    }
}

/// Metadata for one variable symbol.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SymbolInfo {
    /// Display name (a hint for generated symbols).
    pub name: Name,
    pub flags: SymbolFlags,
    pub span: Span,
}

// ── Symbol table ────────────────────────────────────────────────────

/// Arena of variable symbols plus the label counter for one session.
///
/// Upstream stages declare user-written binders here; the lowering stage
/// allocates its generated temporaries and labels from the same table so
/// IDs stay unique across the whole construct.
#[derive(Default)]
pub struct SymbolTable {
    vars: Vec<SymbolInfo>,
    next_label: u32,
}

impl SymbolTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a user-written variable.
    pub fn declare(&mut self, name: Name, span: Span) -> VarId {
        self.fresh(name, SymbolFlags::empty(), span)
    }

    /// Allocate a variable with explicit flags.
    ///
    /// # Panics
    /// Panics if more than `u32::MAX` symbols are allocated.
    pub fn fresh(&mut self, name: Name, flags: SymbolFlags, span: Span) -> VarId {
        let raw = u32::try_from(self.vars.len())
            .unwrap_or_else(|_| panic!("symbol table overflow: {} symbols", self.vars.len()));
        self.vars.push(SymbolInfo { name, flags, span });
        VarId::new(raw)
    }

    /// Allocate a compiler-generated temporary.
    pub fn fresh_generated(&mut self, name: Name, span: Span) -> VarId {
        self.fresh(name, SymbolFlags::GENERATED, span)
    }

    /// Allocate a fresh label.
    pub fn fresh_label(&mut self) -> LabelId {
        let label = LabelId::new(self.next_label);
        self.next_label += 1;
        label
    }

    /// Metadata for a variable.
    ///
    /// # Panics
    /// Panics on an ID not allocated by this table.
    #[inline]
    pub fn info(&self, var: VarId) -> &SymbolInfo {
        &self.vars[var.index()]
    }

    /// Whether the variable was introduced by the compiler.
    #[inline]
    pub fn is_generated(&self, var: VarId) -> bool {
        self.info(var).flags.contains(SymbolFlags::GENERATED)
    }

    /// Whether the variable is known non-null.
    #[inline]
    pub fn is_non_null(&self, var: VarId) -> bool {
        self.info(var).flags.contains(SymbolFlags::NON_NULL)
    }

    /// Mark a variable as known non-null.
    pub fn mark_non_null(&mut self, var: VarId) {
        self.vars[var.index()].flags |= SymbolFlags::NON_NULL;
    }

    /// Number of variables allocated so far.
    #[inline]
    pub fn len(&self) -> usize {
        self.vars.len()
    }

    /// Whether no variables have been allocated.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }
}
