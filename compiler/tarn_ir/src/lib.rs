//! Tarn IR — intermediate representation types.
//!
//! This crate contains the data structures shared by the Tarn front-end
//! stages:
//!
//! - [`Span`] for source locations
//! - [`Name`] / [`StringInterner`] for interned identifiers
//! - [`VarId`] / [`LabelId`] / [`SymbolTable`] for compiler symbols
//! - [`TyId`] / [`TypePool`] for resolved types
//! - [`Expr`] / [`Pattern`] / [`MatchExpr`] — typed expression and pattern
//!   trees, including the lowered output forms (conditionals, integer
//!   switches, local bindings, local parameterized procedures)
//!
//! # Design Philosophy
//!
//! - **Intern everything**: strings become `Name(u32)`, types `TyId(u32)`,
//!   symbols `VarId(u32)` — O(1) equality and hashing everywhere.
//! - **Closed sum types**: every consumer matches exhaustively; adding a
//!   node kind breaks every pass at compile time, by intent.
//! - **No shared mutable state**: interner, symbol table, and type pool are
//!   plain single-threaded values owned by one compilation session.
//!
//! Types that contain floats would store them as bits for Hash
//! compatibility; strings are interned `Name`s.

/// Compile-time assertion that a type has a specific size.
///
/// Used to prevent accidental size regressions in frequently-allocated types.
#[macro_export]
macro_rules! static_assert_size {
    ($ty:ty, $size:expr) => {
        const _: [(); $size] = [(); ::std::mem::size_of::<$ty>()];
    };
}

mod expr;
mod interner;
mod name;
mod span;
mod symbol;
mod ty;

pub use expr::{BinOp, Case, Expr, ExtractorShape, Lit, MatchExpr, Pattern};
pub use interner::{InternError, StringInterner};
pub use name::Name;
pub use span::Span;
pub use symbol::{LabelId, SymbolFlags, SymbolInfo, SymbolTable, VarId};
pub use ty::{TyId, TyKind, TypeInfo, TypePool};
