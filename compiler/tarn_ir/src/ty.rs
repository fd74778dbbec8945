//! Minimal resolved-type pool for the lowering stages.
//!
//! The match-lowering stage treats types mostly as opaque handles: it needs
//! to know enough to emit instance tests (parent chains, enclosing-instance
//! prefixes), to decide whether a non-null test is required (nullability),
//! and to recognize product shapes for direct field selection. Everything
//! else about typing happens upstream.

use crate::{Expr, Name};

/// Type ID — an index into a [`TypePool`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct TyId(u32);

impl TyId {
    /// Primitive `int` (pre-allocated by [`TypePool::new`]).
    pub const INT: TyId = TyId(0);
    /// Primitive `bool`.
    pub const BOOL: TyId = TyId(1);
    /// Primitive `str`.
    pub const STR: TyId = TyId(2);
    /// Primitive `unit`.
    pub const UNIT: TyId = TyId(3);

    /// Create a new type ID from a raw index.
    #[inline]
    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    /// Get the raw `u32` value.
    #[inline]
    pub const fn raw(self) -> u32 {
        self.0
    }

    /// Get the index as `usize`.
    #[inline]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

/// Metadata for a nominal type.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TypeInfo {
    pub name: Name,
    /// Component types when the type is a product whose accessor fields may
    /// be selected positionally. Empty for non-product types.
    pub fields: Vec<TyId>,
    /// Supertype, if any; instance tests walk this chain.
    pub parent: Option<TyId>,
    /// Whether values of this type may be null at runtime.
    pub nullable: bool,
    /// Enclosing-instance prefix for a non-static inner type. When present,
    /// an instance test additionally compares the value's enclosing
    /// instance against this expression.
    pub outer: Option<Box<Expr>>,
}

/// One resolved type.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TyKind {
    Int,
    Bool,
    Str,
    Unit,
    /// Homogeneous sequence.
    Seq(TyId),
    /// Nominal type declared upstream.
    Named(TypeInfo),
}

/// Pool of resolved types for one compilation session.
///
/// The four primitives are pre-allocated at the fixed IDs on [`TyId`].
pub struct TypePool {
    types: Vec<TyKind>,
}

impl TypePool {
    pub fn new() -> Self {
        Self {
            types: vec![TyKind::Int, TyKind::Bool, TyKind::Str, TyKind::Unit],
        }
    }

    /// Register a type and return its handle.
    ///
    /// # Panics
    /// Panics if more than `u32::MAX` types are registered.
    pub fn add(&mut self, kind: TyKind) -> TyId {
        let raw = u32::try_from(self.types.len())
            .unwrap_or_else(|_| panic!("type pool overflow: {} types", self.types.len()));
        self.types.push(kind);
        TyId::new(raw)
    }

    /// The kind of a type.
    ///
    /// # Panics
    /// Panics on an ID not allocated by this pool.
    #[inline]
    pub fn kind(&self, id: TyId) -> &TyKind {
        &self.types[id.index()]
    }

    /// Whether values of this type may be null at runtime.
    ///
    /// Primitives and sequences are never null; nominal types carry an
    /// explicit flag from upstream typing.
    pub fn is_nullable(&self, id: TyId) -> bool {
        match self.kind(id) {
            TyKind::Named(info) => info.nullable,
            _ => false,
        }
    }

    /// Whether the type is the switchable integer primitive.
    #[inline]
    pub fn is_int(&self, id: TyId) -> bool {
        matches!(self.kind(id), TyKind::Int)
    }

    /// Product arity when the type exposes positionally selectable fields.
    pub fn product_arity(&self, id: TyId) -> Option<usize> {
        match self.kind(id) {
            TyKind::Named(info) if !info.fields.is_empty() => Some(info.fields.len()),
            _ => None,
        }
    }

    /// Enclosing-instance prefix for a non-static inner type.
    pub fn outer_prefix(&self, id: TyId) -> Option<&Expr> {
        match self.kind(id) {
            TyKind::Named(info) => info.outer.as_deref(),
            _ => None,
        }
    }

    /// Nominal subtyping: walk the parent chain of `sub` looking for `sup`.
    ///
    /// Primitives and sequences are subtypes only of themselves.
    pub fn is_subtype(&self, sub: TyId, sup: TyId) -> bool {
        if sub == sup {
            return true;
        }
        let mut current = sub;
        while let TyKind::Named(info) = self.kind(current) {
            match info.parent {
                Some(parent) if parent == sup => return true,
                Some(parent) => current = parent,
                None => return false,
            }
        }
        false
    }
}

impl Default for TypePool {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn named(name: u32, parent: Option<TyId>) -> TyKind {
        TyKind::Named(TypeInfo {
            name: Name::from_raw(name),
            fields: vec![],
            parent,
            nullable: true,
            outer: None,
        })
    }

    #[test]
    fn primitives_preallocated() {
        let pool = TypePool::new();
        assert!(matches!(pool.kind(TyId::INT), TyKind::Int));
        assert!(matches!(pool.kind(TyId::BOOL), TyKind::Bool));
        assert!(matches!(pool.kind(TyId::STR), TyKind::Str));
        assert!(matches!(pool.kind(TyId::UNIT), TyKind::Unit));
        assert!(pool.is_int(TyId::INT));
        assert!(!pool.is_int(TyId::BOOL));
    }

    #[test]
    fn subtype_chain() {
        let mut pool = TypePool::new();
        let base = pool.add(named(1, None));
        let mid = pool.add(named(2, Some(base)));
        let leaf = pool.add(named(3, Some(mid)));
        assert!(pool.is_subtype(leaf, base));
        assert!(pool.is_subtype(leaf, mid));
        assert!(pool.is_subtype(leaf, leaf));
        assert!(!pool.is_subtype(base, leaf));
        assert!(!pool.is_subtype(TyId::INT, base));
    }

    #[test]
    fn nullability() {
        let mut pool = TypePool::new();
        let named_ty = pool.add(named(1, None));
        let seq_ty = pool.add(TyKind::Seq(TyId::INT));
        assert!(pool.is_nullable(named_ty));
        assert!(!pool.is_nullable(TyId::INT));
        assert!(!pool.is_nullable(seq_ty));
    }

    #[test]
    fn product_arity_requires_fields() {
        let mut pool = TypePool::new();
        let pair = pool.add(TyKind::Named(TypeInfo {
            name: Name::from_raw(1),
            fields: vec![TyId::INT, TyId::STR],
            parent: None,
            nullable: false,
            outer: None,
        }));
        let unit_like = pool.add(named(2, None));
        assert_eq!(pool.product_arity(pair), Some(2));
        assert_eq!(pool.product_arity(unit_like), None);
        assert_eq!(pool.product_arity(TyId::INT), None);
    }
}
