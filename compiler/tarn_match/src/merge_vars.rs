//! Pass 4 — merge variables and hoist label parameters.
//!
//! Two bindings whose initializing expressions are structurally identical
//! (compared by normalized value, not by the bound variable) collapse to
//! one: the later binding's uses are rewritten to the earlier variable and
//! its `Let` disappears. Only compiler-generated bindings may be the one
//! collapsed away — user bindings always survive.
//!
//! Labels get parameters here. For each label the pass tracks the bindings
//! visible at its declaration point; a binding visible at *every* call site
//! but absent at the declaration is promoted to a formal parameter, with
//! each call supplying its own actual. That is how a value computed
//! differently along different paths, but needed by shared code, is
//! threaded through safely instead of being captured from one arbitrary
//! caller.
//!
//! Runs in two phases over the plan: the merge/collect walk, then a patch
//! walk that attaches `(formal, actual)` pairs to every call of a label
//! that gained parameters.

use rustc_hash::FxHashMap;

use tarn_ir::{Expr, LabelId, Span, VarId};

use crate::optimize::OptCx;
use crate::plan::{rewrite_vars, CallArgs, NodeId, ParamList, Plan, PlanKind, Test};

/// Visible bindings on the current path: normalized initializer → variable.
type Env = FxHashMap<Expr, VarId>;

pub(crate) fn run(plan: Plan, cx: &mut OptCx) -> Plan {
    let mut pass = MergeVars {
        cx,
        subst: FxHashMap::default(),
        call_envs: FxHashMap::default(),
        label_sites: FxHashMap::default(),
        hoisted_params: FxHashMap::default(),
        merged: 0,
        hoisted: 0,
    };
    let plan = pass.transform(plan, &Env::default());
    let out = pass.patch_calls(plan);
    tracing::debug!(
        merged = pass.merged,
        params = pass.hoisted,
        "merged variables and hoisted label parameters"
    );
    out
}

struct MergeVars<'a, 'cx> {
    cx: &'a mut OptCx<'cx>,
    /// Collapsed variable → surviving variable.
    subst: FxHashMap<VarId, VarId>,
    /// Environment snapshot at every call site, keyed by call node.
    call_envs: FxHashMap<NodeId, Env>,
    /// Call-site environments per label, in traversal order.
    label_sites: FxHashMap<LabelId, Vec<Env>>,
    /// Parameters introduced per label: `(initializer key, formal)`.
    hoisted_params: FxHashMap<LabelId, Vec<(Expr, VarId)>>,
    merged: usize,
    hoisted: usize,
}

impl MergeVars<'_, '_> {
    fn resolve(&self, var: VarId) -> VarId {
        let mut v = var;
        while let Some(&next) = self.subst.get(&v) {
            v = next;
        }
        v
    }

    fn subst_expr(&self, expr: &Expr) -> Expr {
        rewrite_vars(expr, &|v| {
            let root = self.resolve(v);
            (root != v).then(|| Expr::Var(root))
        })
    }

    fn transform(&mut self, plan: Plan, env: &Env) -> Plan {
        let Plan { id, kind } = plan;
        match kind {
            PlanKind::Let { var, body } => {
                let Some(init) = self.cx.tables.init(var).cloned() else {
                    // Formals and other initializer-less vars never own a
                    // Let; nothing to merge.
                    let body = self.transform(*body, env);
                    return Plan {
                        id,
                        kind: PlanKind::Let {
                            var,
                            body: Box::new(body),
                        },
                    };
                };
                let init = self.subst_expr(&init);
                let key = self.cx.tables.normalize_expr(&init);
                if self.cx.syms.is_generated(var) {
                    if let Some(&earlier) = env.get(&key) {
                        self.subst.insert(var, earlier);
                        self.cx.tables.remove_var(var);
                        self.merged += 1;
                        return self.transform(*body, env);
                    }
                }
                self.cx.tables.set_init(var, init);
                let mut extended = env.clone();
                extended.insert(key, var);
                let body = self.transform(*body, &extended);
                Plan {
                    id,
                    kind: PlanKind::Let {
                        var,
                        body: Box::new(body),
                    },
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
                let on_success = self.transform(*on_success, env);
                let on_failure = self.transform(*on_failure, env);
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

            PlanKind::Labelled { label, body } => {
                // The continuation first: it contains every call site.
                let body = self.transform(*body, env);

                let sites = self.label_sites.remove(&label).unwrap_or_default();
                let mut entry_env = env.clone();
                if !sites.is_empty() {
                    let hoisted = self.hoist_params(label, env, &sites);
                    for (key, formal) in &hoisted {
                        entry_env.insert(key.clone(), *formal);
                    }
                    if !hoisted.is_empty() {
                        self.hoisted += hoisted.len();
                        let params: ParamList = hoisted.iter().map(|(_, f)| *f).collect();
                        self.cx.tables.set_label_params(label, params);
                        self.hoisted_params.insert(label, hoisted);
                    }
                }

                if let Some(entry) = self.cx.tables.take_label_body(label) {
                    let entry = self.transform(entry, &entry_env);
                    self.cx.tables.put_label_body(label, entry);
                }
                Plan {
                    id,
                    kind: PlanKind::Labelled {
                        label,
                        body: Box::new(body),
                    },
                }
            }

            PlanKind::Call { label, args } => {
                self.call_envs.insert(id, env.clone());
                self.label_sites.entry(label).or_default().push(env.clone());
                let args: CallArgs = args
                    .into_iter()
                    .map(|(formal, actual)| (formal, self.resolve(actual)))
                    .collect();
                Plan {
                    id,
                    kind: PlanKind::Call { label, args },
                }
            }

            PlanKind::Code(expr) => Plan {
                id,
                kind: PlanKind::Code(self.subst_expr(&expr)),
            },
        }
    }

    /// Bindings visible at every call site but not at the declaration
    /// become formal parameters. Ordered by the first call site's actual
    /// variable so the result does not depend on hash iteration.
    fn hoist_params(&mut self, _label: LabelId, decl_env: &Env, sites: &[Env]) -> Vec<(Expr, VarId)> {
        let first = &sites[0];
        let mut keys: Vec<&Expr> = first
            .keys()
            .filter(|key| !decl_env.contains_key(*key))
            .filter(|key| sites.iter().all(|site| site.contains_key(*key)))
            .collect();
        keys.sort_by_key(|key| first.get(*key).copied());

        let mut hoisted = Vec::with_capacity(keys.len());
        for key in keys {
            let name = self.cx.interner.intern("arg");
            let formal = self.cx.syms.fresh_generated(name, Span::DUMMY);
            hoisted.push((key.clone(), formal));
        }
        hoisted
    }

    /// Second phase: attach `(formal, actual)` pairs to calls of labels
    /// that gained parameters, using each call's environment snapshot.
    fn patch_calls(&mut self, plan: Plan) -> Plan {
        let Plan { id, kind } = plan;
        match kind {
            PlanKind::Call { label, mut args } => {
                if let Some(hoisted) = self.hoisted_params.get(&label) {
                    let env = self.call_envs.get(&id);
                    for (key, formal) in hoisted {
                        let actual = env.and_then(|e| e.get(key)).copied();
                        debug_assert!(
                            actual.is_some(),
                            "hoisted key missing from call-site environment"
                        );
                        if let Some(actual) = actual {
                            args.push((*formal, self.resolve(actual)));
                        }
                    }
                }
                Plan {
                    id,
                    kind: PlanKind::Call { label, args },
                }
            }
            PlanKind::Labelled { label, body } => {
                if let Some(entry) = self.cx.tables.take_label_body(label) {
                    let entry = self.patch_calls(entry);
                    self.cx.tables.put_label_body(label, entry);
                }
                let body = self.patch_calls(*body);
                Plan {
                    id,
                    kind: PlanKind::Labelled {
                        label,
                        body: Box::new(body),
                    },
                }
            }
            PlanKind::Test {
                test,
                scrut,
                span,
                on_success,
                on_failure,
            } => {
                let on_success = self.patch_calls(*on_success);
                let on_failure = self.patch_calls(*on_failure);
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
            PlanKind::Let { var, body } => {
                let body = self.patch_calls(*body);
                Plan {
                    id,
                    kind: PlanKind::Let {
                        var,
                        body: Box::new(body),
                    },
                }
            }
            kind @ PlanKind::Code(_) => Plan { id, kind },
        }
    }
}
