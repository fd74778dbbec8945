//! Pass 5 — inline singly-referenced variables.
//!
//! Counts variable references across the whole plan (test scrutinees, leaf
//! code, initializers, and call actuals). A compiler-generated variable
//! referenced at most once, whose initializer is free of observable
//! effects, is inlined at its use and its `Let` dropped. User bindings and
//! effectful initializers (extractor calls) always survive.
//!
//! Label parameters with no references inside their label's body are
//! dropped; call argument lists are pruned to the surviving formals and
//! emitted in a deterministic order (sorted by variable ID) so output does
//! not depend on traversal order.

use rustc_hash::{FxHashMap, FxHashSet};

use tarn_ir::{Expr, VarId};

use crate::optimize::OptCx;
use crate::plan::{rewrite_vars, CallArgs, ParamList, Plan, PlanKind, Test};

pub(crate) fn run(plan: Plan, cx: &mut OptCx) -> Plan {
    let usage = Usage::collect(&plan, cx);
    let mut pass = InlineVars {
        cx,
        usage,
        inline: FxHashMap::default(),
        inlined: 0,
        dropped_params: 0,
    };
    let out = pass.transform(plan);
    tracing::debug!(
        inlined = pass.inlined,
        dropped_params = pass.dropped_params,
        "inlined singly-referenced variables"
    );
    out
}

/// Reference counts plus the set of variables pinned by appearing as a
/// call actual (an argument slot holds a variable, not an expression, so
/// those uses cannot take an inlined initializer).
struct Usage {
    counts: FxHashMap<VarId, usize>,
    pinned: FxHashSet<VarId>,
}

impl Usage {
    fn collect(plan: &Plan, cx: &OptCx) -> Self {
        let mut usage = Usage {
            counts: FxHashMap::default(),
            pinned: FxHashSet::default(),
        };
        usage.walk(plan, cx);
        usage
    }

    fn count(&self, var: VarId) -> usize {
        self.counts.get(&var).copied().unwrap_or(0)
    }

    fn expr(&mut self, expr: &Expr) {
        expr.for_each_var(&mut |v| {
            *self.counts.entry(v).or_insert(0) += 1;
        });
    }

    fn walk(&mut self, plan: &Plan, cx: &OptCx) {
        match &plan.kind {
            PlanKind::Test {
                test,
                scrut,
                on_success,
                on_failure,
                ..
            } => {
                self.expr(scrut);
                if let Test::Eq(value) = test {
                    self.expr(value);
                }
                self.walk(on_success, cx);
                self.walk(on_failure, cx);
            }
            PlanKind::Let { var, body } => {
                if let Some(init) = cx.tables.init(*var) {
                    self.expr(init);
                }
                self.walk(body, cx);
            }
            PlanKind::Labelled { label, body } => {
                if let Some(entry) = cx.tables.label_body(*label) {
                    self.walk(entry, cx);
                }
                self.walk(body, cx);
            }
            PlanKind::Call { args, .. } => {
                for (_, actual) in args {
                    *self.counts.entry(*actual).or_insert(0) += 1;
                    self.pinned.insert(*actual);
                }
            }
            PlanKind::Code(expr) => self.expr(expr),
        }
    }
}

struct InlineVars<'a, 'cx> {
    cx: &'a mut OptCx<'cx>,
    usage: Usage,
    /// Inlined variable → its (fully substituted) initializer.
    inline: FxHashMap<VarId, Expr>,
    inlined: usize,
    dropped_params: usize,
}

impl InlineVars<'_, '_> {
    fn subst_expr(&self, expr: &Expr) -> Expr {
        rewrite_vars(expr, &|v| self.inline.get(&v).cloned())
    }

    fn transform(&mut self, plan: Plan) -> Plan {
        let Plan { id, kind } = plan;
        match kind {
            PlanKind::Let { var, body } => {
                if let Some(init) = self.cx.tables.init(var).cloned() {
                    let init = self.subst_expr(&init);
                    let inlinable = self.cx.syms.is_generated(var)
                        && !self.usage.pinned.contains(&var)
                        && self.usage.count(var) <= 1
                        && init.is_pure();
                    if inlinable {
                        self.cx.tables.remove_var(var);
                        if self.usage.count(var) == 1 {
                            self.inline.insert(var, init);
                        }
                        self.inlined += 1;
                        return self.transform(*body);
                    }
                    self.cx.tables.set_init(var, init);
                }
                let body = self.transform(*body);
                Plan {
                    id,
                    kind: PlanKind::Let {
                        var,
                        body: Box::new(body),
                    },
                }
            }

            PlanKind::Labelled { label, body } => {
                let params = self.cx.tables.label_params(label).to_vec();
                if !params.is_empty() {
                    let mut kept: ParamList = params
                        .iter()
                        .copied()
                        .filter(|p| self.usage.count(*p) > 0)
                        .collect();
                    kept.sort_unstable();
                    self.dropped_params += params.len() - kept.len();
                    self.cx.tables.set_label_params(label, kept);
                }
                if let Some(entry) = self.cx.tables.take_label_body(label) {
                    let entry = self.transform(entry);
                    self.cx.tables.put_label_body(label, entry);
                }
                let body = self.transform(*body);
                Plan {
                    id,
                    kind: PlanKind::Labelled {
                        label,
                        body: Box::new(body),
                    },
                }
            }

            PlanKind::Call { label, args } => {
                // Prune to the surviving formals, in parameter order.
                let params = self.cx.tables.label_params(label);
                let args: CallArgs = params
                    .iter()
                    .filter_map(|formal| {
                        args.iter()
                            .find(|(f, _)| f == formal)
                            .map(|(_, actual)| (*formal, *actual))
                    })
                    .collect();
                Plan {
                    id,
                    kind: PlanKind::Call { label, args },
                }
            }

            PlanKind::Test {
                test,
                scrut,
                span,
                on_success,
                on_failure,
            } => {
                let scrut = self.subst_expr(&scrut);
                let test = match test {
                    Test::Eq(value) => Test::Eq(self.subst_expr(&value)),
                    other => other,
                };
                let on_success = self.transform(*on_success);
                let on_failure = self.transform(*on_failure);
                Plan {
                    id,
                    kind: PlanKind::Test {
                        test,
                        scrut,
                        span,
                        on_success: Box::new(on_success),
                        on_failure: Box::new(on_failure),
                    },
                }
            }

            PlanKind::Code(expr) => Plan {
                id,
                kind: PlanKind::Code(self.subst_expr(&expr)),
            },
        }
    }
}
