//! Plan — the decision graph between source patterns and emitted code.
//!
//! A [`Plan`] is a tree of decision nodes whose sharing happens through two
//! side tables: variable initializers (keyed by [`VarId`]) and label bodies
//! (keyed by [`LabelId`]). [`Call`](PlanKind::Call) nodes reference labels,
//! so the reachable graph is a DAG even though the owned structure is a
//! tree — labels model shared exit points, never loops.
//!
//! # Identity
//!
//! Every node carries a [`NodeId`] for debugging and structural
//! bookkeeping. Deduplication never uses node identity: tests are compared
//! by their [`TestKey`] — the normalized scrutinee plus the test kind,
//! ignoring continuations — because two independently built nodes may be
//! logically the same test.
//!
//! # Lifecycle
//!
//! The whole Plan and both side tables live inside one [`PlanTables`]
//! value, scoped to lowering a single match construct, and are discarded
//! when lowering returns.

use rustc_hash::FxHashMap;
use smallvec::SmallVec;

use tarn_ir::{Expr, LabelId, Lit, Span, TyId, VarId};

// ── ID newtype ──────────────────────────────────────────────────────

/// Plan node ID, unique within one lowering session.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct NodeId(u32);

impl NodeId {
    /// Create a new node ID from a raw index.
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

// ── Test kinds ──────────────────────────────────────────────────────

/// The kind of a boolean decision point.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Test {
    /// Dynamic instance test against a type.
    Type(TyId),
    /// Structural equality against a literal or stable expression.
    Eq(Expr),
    /// Sequence length comparison: `== len` when `exact`, `>= len` otherwise.
    Length { len: u32, exact: bool },
    /// Optional-container liveness.
    NonEmpty,
    /// Null check.
    NonNull,
    /// The scrutinee expression itself is the boolean condition. Guards may
    /// have effects, so guard tests are never deduplicated.
    Guard,
}

// ── Plan nodes ──────────────────────────────────────────────────────

/// Call argument list: `(formal, actual)` variable pairs.
pub type CallArgs = SmallVec<[(VarId, VarId); 2]>;

/// Label formal-parameter list.
pub type ParamList = SmallVec<[VarId; 2]>;

/// One node of the decision graph.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Plan {
    pub id: NodeId,
    pub kind: PlanKind,
}

/// The node kinds of a [`Plan`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PlanKind {
    /// A boolean decision point.
    Test {
        test: Test,
        scrut: Expr,
        /// Source position of the pattern that produced this test.
        span: Span,
        on_success: Box<Plan>,
        on_failure: Box<Plan>,
    },
    /// Introduces one fresh variable computed once. The defining expression
    /// lives in the initializer table, not in the node, so rewrites can
    /// update it without restructuring the graph.
    Let { var: VarId, body: Box<Plan> },
    /// Declares a named continuation visible throughout `body`. The
    /// continuation's own sub-plan lives in the label table; its formal
    /// parameters (empty until optimization introduces them) in the
    /// parameter table.
    Labelled { label: LabelId, body: Box<Plan> },
    /// Invokes a declared label.
    Call { label: LabelId, args: CallArgs },
    /// Leaf: the final expression to execute.
    Code(Expr),
}

// ── Side tables ─────────────────────────────────────────────────────

/// The Plan side tables plus the node-ID counter for one lowering session.
///
/// Every `Let`/`Labelled` node owns exactly one symbol whose entry here is
/// created exactly once; entries may be rewritten by passes but never
/// duplicated under a different node.
#[derive(Default)]
pub struct PlanTables {
    inits: FxHashMap<VarId, Expr>,
    labels: FxHashMap<LabelId, Plan>,
    params: FxHashMap<LabelId, ParamList>,
    next_node: u32,
}

impl PlanTables {
    pub fn new() -> Self {
        Self::default()
    }

    fn next_id(&mut self) -> NodeId {
        let id = NodeId::new(self.next_node);
        self.next_node += 1;
        id
    }

    // Node constructors

    /// A leaf node.
    pub fn code(&mut self, expr: Expr) -> Plan {
        Plan {
            id: self.next_id(),
            kind: PlanKind::Code(expr),
        }
    }

    /// A test node.
    pub fn test(
        &mut self,
        test: Test,
        scrut: Expr,
        span: Span,
        on_success: Plan,
        on_failure: Plan,
    ) -> Plan {
        Plan {
            id: self.next_id(),
            kind: PlanKind::Test {
                test,
                scrut,
                span,
                on_success: Box::new(on_success),
                on_failure: Box::new(on_failure),
            },
        }
    }

    /// A binding node. The initializer must already be registered via
    /// [`define_var`](Self::define_var).
    pub fn let_plan(&mut self, var: VarId, body: Plan) -> Plan {
        Plan {
            id: self.next_id(),
            kind: PlanKind::Let {
                var,
                body: Box::new(body),
            },
        }
    }

    /// A label declaration node. The label body must already be registered
    /// via [`define_label`](Self::define_label).
    pub fn labelled(&mut self, label: LabelId, body: Plan) -> Plan {
        Plan {
            id: self.next_id(),
            kind: PlanKind::Labelled {
                label,
                body: Box::new(body),
            },
        }
    }

    /// A call node with no arguments (the builder never passes arguments;
    /// parameters appear only through optimization).
    pub fn call(&mut self, label: LabelId) -> Plan {
        self.call_with(label, CallArgs::new())
    }

    /// A call node with explicit `(formal, actual)` pairs.
    pub fn call_with(&mut self, label: LabelId, args: CallArgs) -> Plan {
        Plan {
            id: self.next_id(),
            kind: PlanKind::Call { label, args },
        }
    }

    // Initializer table

    /// Register the defining expression of a variable.
    pub fn define_var(&mut self, var: VarId, init: Expr) {
        debug_assert!(
            !self.inits.contains_key(&var),
            "initializer for {var:?} registered twice"
        );
        self.inits.insert(var, init);
    }

    /// The defining expression of a variable, if registered.
    #[inline]
    pub fn init(&self, var: VarId) -> Option<&Expr> {
        self.inits.get(&var)
    }

    /// Rewrite the defining expression of a variable.
    pub fn set_init(&mut self, var: VarId, init: Expr) {
        self.inits.insert(var, init);
    }

    /// Remove a variable's initializer (when its `Let` is dropped).
    pub fn remove_var(&mut self, var: VarId) -> Option<Expr> {
        self.inits.remove(&var)
    }

    // Label table

    /// Register the sub-plan of a label.
    pub fn define_label(&mut self, label: LabelId, body: Plan) {
        debug_assert!(
            !self.labels.contains_key(&label),
            "label body for {label:?} registered twice"
        );
        self.labels.insert(label, body);
    }

    /// The sub-plan of a label, if registered.
    #[inline]
    pub fn label_body(&self, label: LabelId) -> Option<&Plan> {
        self.labels.get(&label)
    }

    /// Take a label's sub-plan out of the table for rewriting; pair with
    /// [`put_label_body`](Self::put_label_body).
    pub fn take_label_body(&mut self, label: LabelId) -> Option<Plan> {
        self.labels.remove(&label)
    }

    /// Put a (rewritten) label body back.
    pub fn put_label_body(&mut self, label: LabelId, body: Plan) {
        self.labels.insert(label, body);
    }

    // Parameter table

    /// The formal parameters of a label (empty unless optimization
    /// introduced some).
    pub fn label_params(&self, label: LabelId) -> &[VarId] {
        self.params.get(&label).map_or(&[], |p| p.as_slice())
    }

    /// Replace the formal-parameter list of a label.
    pub fn set_label_params(&mut self, label: LabelId, params: ParamList) {
        self.params.insert(label, params);
    }

    // Normalization

    /// Follow generated-alias chains: a variable whose initializer is
    /// exactly another variable reference normalizes to that variable's
    /// root. This is what makes repeated tests on the same fact
    /// syntactically comparable.
    pub fn alias_root(&self, var: VarId) -> VarId {
        let mut current = var;
        while let Some(Expr::Var(next)) = self.inits.get(&current) {
            current = *next;
        }
        current
    }

    /// Rewrite an expression with every variable reference replaced by its
    /// alias root. Produces the canonical form used by [`TestKey`].
    pub fn normalize_expr(&self, expr: &Expr) -> Expr {
        match expr {
            Expr::Var(v) => Expr::Var(self.alias_root(*v)),
            Expr::Lit(_) | Expr::Global(_) => expr.clone(),
            Expr::Call { fun, args } => Expr::Call {
                fun: Box::new(self.normalize_expr(fun)),
                args: args.iter().map(|a| self.normalize_expr(a)).collect(),
            },
            Expr::Select { base, index } => Expr::Select {
                base: Box::new(self.normalize_expr(base)),
                index: *index,
            },
            Expr::Index { base, index } => Expr::Index {
                base: Box::new(self.normalize_expr(base)),
                index: *index,
            },
            Expr::Drop { base, count } => Expr::Drop {
                base: Box::new(self.normalize_expr(base)),
                count: *count,
            },
            Expr::SeqLen(base) => Expr::SeqLen(Box::new(self.normalize_expr(base))),
            Expr::Get(base) => Expr::Get(Box::new(self.normalize_expr(base))),
            Expr::NonEmpty(base) => Expr::NonEmpty(Box::new(self.normalize_expr(base))),
            Expr::Cast { value, ty } => Expr::Cast {
                value: Box::new(self.normalize_expr(value)),
                ty: *ty,
            },
            Expr::IsType { value, ty } => Expr::IsType {
                value: Box::new(self.normalize_expr(value)),
                ty: *ty,
            },
            Expr::OuterEq { value, outer } => Expr::OuterEq {
                value: Box::new(self.normalize_expr(value)),
                outer: Box::new(self.normalize_expr(outer)),
            },
            Expr::Binary { op, lhs, rhs } => Expr::Binary {
                op: *op,
                lhs: Box::new(self.normalize_expr(lhs)),
                rhs: Box::new(self.normalize_expr(rhs)),
            },
            // Control forms never appear as test scrutinees or initializers
            // that need canonicalization; clone as-is.
            Expr::If { .. }
            | Expr::Switch { .. }
            | Expr::Let { .. }
            | Expr::LabelDef { .. }
            | Expr::LabelCall { .. }
            | Expr::FailMatch { .. } => expr.clone(),
        }
    }
}

// ── Expression rewriting ────────────────────────────────────────────

/// Rebuild an expression with every variable reference passed through
/// `subst`; `None` keeps the reference. Used by the merging and inlining
/// passes, which must rewrite expressions held in plan nodes and side
/// tables without restructuring them.
pub fn rewrite_vars(expr: &Expr, subst: &impl Fn(VarId) -> Option<Expr>) -> Expr {
    let go = |e: &Expr| Box::new(rewrite_vars(e, subst));
    match expr {
        Expr::Var(v) => subst(*v).unwrap_or_else(|| expr.clone()),
        Expr::Lit(_) | Expr::Global(_) => expr.clone(),
        Expr::Call { fun, args } => Expr::Call {
            fun: go(fun),
            args: args.iter().map(|a| rewrite_vars(a, subst)).collect(),
        },
        Expr::Select { base, index } => Expr::Select {
            base: go(base),
            index: *index,
        },
        Expr::Index { base, index } => Expr::Index {
            base: go(base),
            index: *index,
        },
        Expr::Drop { base, count } => Expr::Drop {
            base: go(base),
            count: *count,
        },
        Expr::SeqLen(base) => Expr::SeqLen(go(base)),
        Expr::Get(base) => Expr::Get(go(base)),
        Expr::NonEmpty(base) => Expr::NonEmpty(go(base)),
        Expr::Cast { value, ty } => Expr::Cast {
            value: go(value),
            ty: *ty,
        },
        Expr::IsType { value, ty } => Expr::IsType {
            value: go(value),
            ty: *ty,
        },
        Expr::OuterEq { value, outer } => Expr::OuterEq {
            value: go(value),
            outer: go(outer),
        },
        Expr::Binary { op, lhs, rhs } => Expr::Binary {
            op: *op,
            lhs: go(lhs),
            rhs: go(rhs),
        },
        Expr::If {
            cond,
            then_branch,
            else_branch,
        } => Expr::If {
            cond: go(cond),
            then_branch: go(then_branch),
            else_branch: go(else_branch),
        },
        Expr::Switch {
            scrut,
            arms,
            default,
        } => Expr::Switch {
            scrut: go(scrut),
            arms: arms
                .iter()
                .map(|(value, arm)| (*value, rewrite_vars(arm, subst)))
                .collect(),
            default: go(default),
        },
        Expr::Let { var, init, body } => Expr::Let {
            var: *var,
            init: go(init),
            body: go(body),
        },
        Expr::LabelDef {
            label,
            params,
            body,
            cont,
        } => Expr::LabelDef {
            label: *label,
            params: params.clone(),
            body: go(body),
            cont: go(cont),
        },
        Expr::LabelCall { label, args } => Expr::LabelCall {
            label: *label,
            args: args.iter().map(|a| rewrite_vars(a, subst)).collect(),
        },
        Expr::FailMatch { value, span } => Expr::FailMatch {
            value: go(value),
            span: *span,
        },
    }
}

// ── Test keys ───────────────────────────────────────────────────────

/// Canonical comparable key for a test: `(normalized scrutinee, kind)` —
/// never the continuations. Tests without a key (guards, equality against
/// unstable expressions) are never deduplicated.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct TestKey {
    pub scrut: Expr,
    pub kind: TestKeyKind,
}

/// The kind half of a [`TestKey`].
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum TestKeyKind {
    Type(TyId),
    Eq(Expr),
    Length { len: u32, exact: bool },
    NonEmpty,
    NonNull,
}

/// Whether an expression is stable enough to key an equality test:
/// literals, globals, variable references, and selections over those.
/// Anything else is treated like a guard and never deduplicated.
fn is_stable(expr: &Expr) -> bool {
    match expr {
        Expr::Lit(_) | Expr::Global(_) | Expr::Var(_) => true,
        Expr::Select { base, .. } => is_stable(base),
        _ => false,
    }
}

/// Compute the deduplication key for a test, or `None` when the test must
/// never be deduplicated.
pub fn test_key(tables: &PlanTables, test: &Test, scrut: &Expr) -> Option<TestKey> {
    let kind = match test {
        Test::Guard => return None,
        Test::Type(ty) => TestKeyKind::Type(*ty),
        Test::Eq(value) => {
            if !is_stable(value) {
                return None;
            }
            TestKeyKind::Eq(tables.normalize_expr(value))
        }
        Test::Length { len, exact } => TestKeyKind::Length {
            len: *len,
            exact: *exact,
        },
        Test::NonEmpty => TestKeyKind::NonEmpty,
        Test::NonNull => TestKeyKind::NonNull,
    };
    Some(TestKey {
        scrut: tables.normalize_expr(scrut),
        kind,
    })
}

/// The integer literal an equality test compares against, when it is one.
/// Used by switch synthesis.
pub fn int_eq_value(test: &Test) -> Option<i64> {
    match test {
        Test::Eq(Expr::Lit(Lit::Int(value))) => Some(*value),
        _ => None,
    }
}
