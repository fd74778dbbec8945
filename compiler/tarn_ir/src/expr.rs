//! Typed expression and pattern trees.
//!
//! [`Expr`] covers both the input surface the match stage consumes
//! (scrutinees, guards, case bodies, extractor invocations) and the output
//! forms it produces (conditionals, integer switches, local bindings, local
//! parameterized procedures and calls). [`Pattern`] is the fully resolved
//! pattern tree handed over by upstream typing — no unresolved names, no
//! unchecked shapes.
//!
//! Everything derives `Eq`/`Hash` so the lowering stage can compare
//! expressions structurally; strings are interned [`Name`]s.

use crate::{LabelId, Name, Span, TyId, VarId};

// ── Literals ────────────────────────────────────────────────────────

/// Literal constant.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Lit {
    Int(i64),
    Bool(bool),
    Str(Name),
    Unit,
    /// The null reference.
    Null,
}

/// Binary operator appearing in lowered output.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BinOp {
    /// Structural/value equality.
    Eq,
    /// Structural/value inequality.
    Ne,
    /// Integer `>=`.
    Ge,
    /// Short-circuit conjunction.
    And,
}

// ── Expressions ─────────────────────────────────────────────────────

/// Expression tree.
///
/// Output code produced by the match stage uses only: `If`, `Switch`,
/// `Let`, `LabelDef`/`LabelCall`, `FailMatch`, the test primitives
/// (`IsType`, `OuterEq`, `Binary`, `SeqLen`, `NonEmpty`), the selection
/// primitives (`Select`, `Index`, `Drop`, `Get`, `Cast`), and whatever
/// leaf expressions the source construct already contained.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Expr {
    /// Reference to a bound variable.
    Var(VarId),
    Lit(Lit),
    /// Reference to a module-level definition (extractor, helper).
    Global(Name),
    /// Function application. Extractor invocations and case-body calls both
    /// use this form; the callee is an arbitrary expression.
    Call { fun: Box<Expr>, args: Vec<Expr> },
    /// Product component selection (positional accessor).
    Select { base: Box<Expr>, index: u32 },
    /// Sequence element by position.
    Index { base: Box<Expr>, index: u32 },
    /// Sequence remainder starting at position `count`.
    Drop { base: Box<Expr>, count: u32 },
    /// Sequence length.
    SeqLen(Box<Expr>),
    /// Payload of an optional container.
    Get(Box<Expr>),
    /// Liveness of an optional container.
    NonEmpty(Box<Expr>),
    /// Narrowing of a value whose dynamic type was already tested.
    Cast { value: Box<Expr>, ty: TyId },
    /// Dynamic instance test.
    IsType { value: Box<Expr>, ty: TyId },
    /// Enclosing-instance identity comparison for non-static inner types.
    OuterEq { value: Box<Expr>, outer: Box<Expr> },
    Binary {
        op: BinOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    If {
        cond: Box<Expr>,
        then_branch: Box<Expr>,
        else_branch: Box<Expr>,
    },
    /// Multi-way integer branch. Understood as primitive by the rest of the
    /// pipeline; arm values are distinct.
    Switch {
        scrut: Box<Expr>,
        arms: Vec<(i64, Expr)>,
        default: Box<Expr>,
    },
    /// Local binding, evaluated once before `body`.
    Let {
        var: VarId,
        init: Box<Expr>,
        body: Box<Expr>,
    },
    /// Local parameterized procedure, in scope throughout `cont`.
    LabelDef {
        label: LabelId,
        params: Vec<VarId>,
        body: Box<Expr>,
        cont: Box<Expr>,
    },
    /// Invocation of a local procedure, actuals in parameter order.
    LabelCall { label: LabelId, args: Vec<Expr> },
    /// Raise a match-failure condition carrying the unmatched value.
    FailMatch { value: Box<Expr>, span: Span },
}

impl Expr {
    /// Shorthand for a variable reference.
    #[inline]
    pub fn var(v: VarId) -> Expr {
        Expr::Var(v)
    }

    /// Shorthand for an integer literal.
    #[inline]
    pub fn int(value: i64) -> Expr {
        Expr::Lit(Lit::Int(value))
    }

    /// Whether evaluating this expression is free of observable effects.
    ///
    /// Calls are conservatively impure (extractors may have side effects);
    /// control forms are never classified pure because inlining them would
    /// duplicate arbitrary work.
    pub fn is_pure(&self) -> bool {
        match self {
            Expr::Var(_) | Expr::Lit(_) | Expr::Global(_) => true,
            Expr::Select { base, .. }
            | Expr::Index { base, .. }
            | Expr::Drop { base, .. }
            | Expr::SeqLen(base)
            | Expr::Get(base)
            | Expr::NonEmpty(base) => base.is_pure(),
            Expr::Cast { value, .. } | Expr::IsType { value, .. } => value.is_pure(),
            Expr::OuterEq { value, outer } => value.is_pure() && outer.is_pure(),
            Expr::Binary { lhs, rhs, .. } => lhs.is_pure() && rhs.is_pure(),
            Expr::Call { .. }
            | Expr::If { .. }
            | Expr::Switch { .. }
            | Expr::Let { .. }
            | Expr::LabelDef { .. }
            | Expr::LabelCall { .. }
            | Expr::FailMatch { .. } => false,
        }
    }

    /// Visit every variable reference in the tree, in evaluation order.
    pub fn for_each_var(&self, f: &mut impl FnMut(VarId)) {
        match self {
            Expr::Var(v) => f(*v),
            Expr::Lit(_) | Expr::Global(_) => {}
            Expr::Call { fun, args } => {
                fun.for_each_var(f);
                for arg in args {
                    arg.for_each_var(f);
                }
            }
            Expr::Select { base, .. }
            | Expr::Index { base, .. }
            | Expr::Drop { base, .. }
            | Expr::SeqLen(base)
            | Expr::Get(base)
            | Expr::NonEmpty(base) => base.for_each_var(f),
            Expr::Cast { value, .. } | Expr::IsType { value, .. } => value.for_each_var(f),
            Expr::OuterEq { value, outer } => {
                value.for_each_var(f);
                outer.for_each_var(f);
            }
            Expr::Binary { lhs, rhs, .. } => {
                lhs.for_each_var(f);
                rhs.for_each_var(f);
            }
            Expr::If {
                cond,
                then_branch,
                else_branch,
            } => {
                cond.for_each_var(f);
                then_branch.for_each_var(f);
                else_branch.for_each_var(f);
            }
            Expr::Switch {
                scrut,
                arms,
                default,
            } => {
                scrut.for_each_var(f);
                for (_, arm) in arms {
                    arm.for_each_var(f);
                }
                default.for_each_var(f);
            }
            Expr::Let { init, body, .. } => {
                init.for_each_var(f);
                body.for_each_var(f);
            }
            Expr::LabelDef {
                params, body, cont, ..
            } => {
                for p in params {
                    f(*p);
                }
                body.for_each_var(f);
                cont.for_each_var(f);
            }
            Expr::LabelCall { args, .. } => {
                for arg in args {
                    arg.for_each_var(f);
                }
            }
            Expr::FailMatch { value, .. } => value.for_each_var(f),
        }
    }
}

// ── Patterns ────────────────────────────────────────────────────────

/// Declared result shape of an extractor, supplied by upstream typing.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ExtractorShape {
    /// Declared boolean result: the call itself is the presence test.
    Boolean,
    /// Result is a fixed-arity product exposing components directly.
    Product { arity: u32 },
    /// Result is an optional container around a single payload value.
    Single,
    /// Result is an optional container around a fixed-arity product payload.
    Decomposed { arity: u32 },
    /// Result is an optional container around a sequence payload.
    Sequence,
}

/// Fully resolved pattern tree.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Pattern {
    /// `_` — matches anything, binds nothing.
    Wildcard { span: Span },
    /// `x @ p` (or a plain binder `x`, with a wildcard sub-pattern).
    Bind {
        var: VarId,
        sub: Box<Pattern>,
        span: Span,
    },
    /// `p : T` — dynamic type test plus narrowing.
    Typed {
        sub: Box<Pattern>,
        ty: TyId,
        span: Span,
    },
    /// `p₁ | p₂ | …` — ordered alternatives sharing one success.
    Alt { alts: Vec<Pattern>, span: Span },
    /// Literal or stable-path pattern, compared by structural equality.
    Const { value: Expr, span: Span },
    /// Extractor/destructuring pattern.
    Extract {
        /// The resolved extractor expression.
        fun: Expr,
        /// Implicit argument list applied after the scrutinee, if any.
        implicits: Vec<Expr>,
        /// Sub-patterns for the decomposed components. A trailing
        /// [`Pattern::Rest`] captures the remaining sequence elements.
        args: Vec<Pattern>,
        /// Declared result shape of the extractor.
        shape: ExtractorShape,
        /// Declared result type (drives the non-null test).
        result_ty: TyId,
        /// Upstream metadata: the extractor is a compiler-synthesized
        /// equivalent of direct field access on a known product type.
        direct: bool,
        span: Span,
    },
    /// Trailing variadic capture (`rest @ ..` / bare `..`). Only valid as
    /// the last sub-pattern of a sequence-shaped [`Pattern::Extract`].
    Rest { binder: Option<VarId>, span: Span },
}

impl Pattern {
    pub fn span(&self) -> Span {
        match self {
            Pattern::Wildcard { span }
            | Pattern::Bind { span, .. }
            | Pattern::Typed { span, .. }
            | Pattern::Alt { span, .. }
            | Pattern::Const { span, .. }
            | Pattern::Extract { span, .. }
            | Pattern::Rest { span, .. } => *span,
        }
    }

    /// Conservative, binding-free irrefutability: patterns that provably
    /// cannot fail *and* introduce no bindings. A `Bind` is never
    /// wildcard-like even when its sub-pattern is — the binding must still
    /// be produced. Do not widen this classification without re-deriving
    /// soundness.
    pub fn is_wildcard_like(&self) -> bool {
        match self {
            Pattern::Wildcard { .. } => true,
            Pattern::Rest { binder: None, .. } => true,
            Pattern::Alt { alts, .. } => alts.iter().all(Pattern::is_wildcard_like),
            _ => false,
        }
    }

    /// Whether this is a variadic capture (with or without a binder).
    #[inline]
    pub fn is_variadic(&self) -> bool {
        matches!(self, Pattern::Rest { .. })
    }
}

// ── Match construct ─────────────────────────────────────────────────

/// One case of a match construct.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Case {
    pub pattern: Pattern,
    pub guard: Option<Expr>,
    pub body: Expr,
    pub span: Span,
}

/// A match construct as handed to the lowering stage: scrutinee, expected
/// result type, and an ordered list of guarded cases. Patterns and
/// expressions are fully resolved and typed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MatchExpr {
    pub scrutinee: Expr,
    pub scrutinee_ty: TyId,
    pub result_ty: TyId,
    pub cases: Vec<Case>,
    pub span: Span,
    /// Advisory annotation: this construct is required to compile to a
    /// multi-way branch. Checked post-emission, warning only.
    pub require_switch: bool,
}
