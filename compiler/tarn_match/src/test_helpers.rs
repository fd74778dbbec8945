//! Shared test utilities — the runtime value model and a reference
//! evaluator for emitted expressions. Only compiled in test builds.
//!
//! The evaluator is the behavioral oracle for the whole crate: lowering a
//! construct and evaluating the result must produce the same outcome (and
//! the same number of extractor/guard invocations, observed through the
//! per-global call counters) as direct case-by-case evaluation would.

use std::cell::RefCell;

use rustc_hash::FxHashMap;

use tarn_ir::{BinOp, Expr, LabelId, Lit, Name, TyId, TyKind, TypePool, VarId};

// ── Values ──────────────────────────────────────────────────────────

/// Runtime value for the reference evaluator.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum Value {
    Int(i64),
    Bool(bool),
    Str(Name),
    Unit,
    Null,
    Seq(Vec<Value>),
    /// Optional container, as returned by non-boolean extractors.
    Opt(Option<Box<Value>>),
    /// Instance of a nominal type with positional fields.
    Obj {
        ty: TyId,
        fields: Vec<Value>,
        outer: Option<Box<Value>>,
    },
}

/// Shorthand for an object value without an enclosing instance.
pub(crate) fn obj(ty: TyId, fields: Vec<Value>) -> Value {
    Value::Obj {
        ty,
        fields,
        outer: None,
    }
}

/// Shorthand for a present optional payload.
pub(crate) fn some(value: Value) -> Value {
    Value::Opt(Some(Box::new(value)))
}

/// Shorthand for an absent optional payload.
pub(crate) fn none() -> Value {
    Value::Opt(None)
}

/// The runtime condition raised by the default failure continuation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct MatchFailure(pub Value);

// ── Evaluator ───────────────────────────────────────────────────────

type HostFn = Box<dyn Fn(&[Value]) -> Value>;

/// Tree-walking evaluator over emitted expressions.
///
/// Host globals (extractors, guard helpers) are registered as closures;
/// every invocation is counted so tests can assert call discipline.
pub(crate) struct Evaluator<'a> {
    types: &'a TypePool,
    globals: FxHashMap<Name, HostFn>,
    calls: RefCell<FxHashMap<Name, usize>>,
}

struct Env<'e> {
    vars: FxHashMap<VarId, Value>,
    labels: FxHashMap<LabelId, (&'e [VarId], &'e Expr)>,
}

impl<'a> Evaluator<'a> {
    pub fn new(types: &'a TypePool) -> Self {
        Self {
            types,
            globals: FxHashMap::default(),
            calls: RefCell::new(FxHashMap::default()),
        }
    }

    /// Register a host global.
    pub fn global(&mut self, name: Name, f: impl Fn(&[Value]) -> Value + 'static) {
        self.globals.insert(name, Box::new(f));
    }

    /// Number of invocations of a global since the last reset.
    pub fn call_count(&self, name: Name) -> usize {
        self.calls.borrow().get(&name).copied().unwrap_or(0)
    }

    pub fn reset_counts(&self) {
        self.calls.borrow_mut().clear();
    }

    /// Evaluate an expression with the given variable bindings.
    pub fn eval_with(
        &self,
        expr: &Expr,
        vars: Vec<(VarId, Value)>,
    ) -> Result<Value, MatchFailure> {
        let mut env = Env {
            vars: vars.into_iter().collect(),
            labels: FxHashMap::default(),
        };
        self.eval(expr, &mut env)
    }

    fn apply(&self, name: Name, args: &[Value]) -> Value {
        *self.calls.borrow_mut().entry(name).or_insert(0) += 1;
        let Some(f) = self.globals.get(&name) else {
            panic!("unregistered global {name:?}");
        };
        f(args)
    }

    fn eval<'e>(&self, expr: &'e Expr, env: &mut Env<'e>) -> Result<Value, MatchFailure> {
        match expr {
            Expr::Var(v) => match env.vars.get(v) {
                Some(value) => Ok(value.clone()),
                None => panic!("unbound variable {v:?}"),
            },
            Expr::Lit(lit) => Ok(match lit {
                Lit::Int(v) => Value::Int(*v),
                Lit::Bool(b) => Value::Bool(*b),
                Lit::Str(s) => Value::Str(*s),
                Lit::Unit => Value::Unit,
                Lit::Null => Value::Null,
            }),
            Expr::Global(name) => panic!("bare global {name:?} outside a call"),

            Expr::Call { fun, args } => {
                // Extractor invocations: `g(args)` or `g(first)(rest)` when
                // an implicit list was applied.
                let (name, mut actuals) = match fun.as_ref() {
                    Expr::Global(name) => (*name, Vec::new()),
                    Expr::Call {
                        fun: inner,
                        args: first,
                    } => {
                        let Expr::Global(name) = inner.as_ref() else {
                            panic!("unsupported callee {inner:?}");
                        };
                        let mut evaled = Vec::with_capacity(first.len());
                        for arg in first {
                            evaled.push(self.eval(arg, env)?);
                        }
                        (*name, evaled)
                    }
                    other => panic!("unsupported callee {other:?}"),
                };
                for arg in args {
                    actuals.push(self.eval(arg, env)?);
                }
                Ok(self.apply(name, &actuals))
            }

            Expr::Select { base, index } => match self.eval(base, env)? {
                Value::Obj { fields, .. } => Ok(fields[*index as usize].clone()),
                other => panic!("select from non-object {other:?}"),
            },
            Expr::Index { base, index } => match self.eval(base, env)? {
                Value::Seq(items) => Ok(items[*index as usize].clone()),
                other => panic!("index into non-sequence {other:?}"),
            },
            Expr::Drop { base, count } => match self.eval(base, env)? {
                Value::Seq(items) => Ok(Value::Seq(items[*count as usize..].to_vec())),
                other => panic!("drop from non-sequence {other:?}"),
            },
            Expr::SeqLen(base) => match self.eval(base, env)? {
                Value::Seq(items) => {
                    Ok(Value::Int(i64::try_from(items.len()).unwrap_or(i64::MAX)))
                }
                other => panic!("length of non-sequence {other:?}"),
            },
            Expr::Get(base) => match self.eval(base, env)? {
                Value::Opt(Some(payload)) => Ok(*payload),
                other => panic!("payload of {other:?}"),
            },
            Expr::NonEmpty(base) => Ok(Value::Bool(match self.eval(base, env)? {
                Value::Opt(payload) => payload.is_some(),
                Value::Null => false,
                // Liveness of a non-container value is trivially true.
                _ => true,
            })),

            Expr::Cast { value, .. } => self.eval(value, env),
            Expr::IsType { value, ty } => {
                let value = self.eval(value, env)?;
                Ok(Value::Bool(self.is_instance(&value, *ty)))
            }
            Expr::OuterEq { value, outer } => {
                let value = self.eval(value, env)?;
                let expected = self.eval(outer, env)?;
                let actual = match value {
                    Value::Obj { outer, .. } => outer,
                    _ => None,
                };
                Ok(Value::Bool(
                    actual.is_some_and(|actual| *actual == expected),
                ))
            }

            Expr::Binary { op, lhs, rhs } => {
                let left = self.eval(lhs, env)?;
                match op {
                    BinOp::And => match left {
                        Value::Bool(false) => Ok(Value::Bool(false)),
                        Value::Bool(true) => self.eval(rhs, env),
                        other => panic!("conjunction of non-bool {other:?}"),
                    },
                    BinOp::Eq => {
                        let right = self.eval(rhs, env)?;
                        Ok(Value::Bool(left == right))
                    }
                    BinOp::Ne => {
                        let right = self.eval(rhs, env)?;
                        Ok(Value::Bool(left != right))
                    }
                    BinOp::Ge => {
                        let right = self.eval(rhs, env)?;
                        match (left, right) {
                            (Value::Int(a), Value::Int(b)) => Ok(Value::Bool(a >= b)),
                            (a, b) => panic!("ordering of {a:?} and {b:?}"),
                        }
                    }
                }
            }

            Expr::If {
                cond,
                then_branch,
                else_branch,
            } => match self.eval(cond, env)? {
                Value::Bool(true) => self.eval(then_branch, env),
                Value::Bool(false) => self.eval(else_branch, env),
                other => panic!("non-bool condition {other:?}"),
            },

            Expr::Switch {
                scrut,
                arms,
                default,
            } => {
                let Value::Int(value) = self.eval(scrut, env)? else {
                    panic!("switch on non-integer");
                };
                for (arm_value, arm) in arms {
                    if *arm_value == value {
                        return self.eval(arm, env);
                    }
                }
                self.eval(default, env)
            }

            Expr::Let { var, init, body } => {
                let value = self.eval(init, env)?;
                env.vars.insert(*var, value);
                self.eval(body, env)
            }

            Expr::LabelDef {
                label,
                params,
                body,
                cont,
            } => {
                env.labels.insert(*label, (params.as_slice(), &**body));
                self.eval(cont, env)
            }
            Expr::LabelCall { label, args } => {
                let Some(&(params, body)) = env.labels.get(label) else {
                    panic!("call to undefined {label:?}");
                };
                let mut actuals = Vec::with_capacity(args.len());
                for arg in args {
                    actuals.push(self.eval(arg, env)?);
                }
                for (param, actual) in params.iter().zip(actuals) {
                    env.vars.insert(*param, actual);
                }
                self.eval(body, env)
            }

            Expr::FailMatch { value, .. } => Err(MatchFailure(self.eval(value, env)?)),
        }
    }

    fn is_instance(&self, value: &Value, ty: TyId) -> bool {
        match value {
            Value::Int(_) => ty == TyId::INT,
            Value::Bool(_) => ty == TyId::BOOL,
            Value::Str(_) => ty == TyId::STR,
            Value::Unit => ty == TyId::UNIT,
            Value::Seq(_) => matches!(self.types.kind(ty), TyKind::Seq(_)),
            Value::Obj { ty: actual, .. } => self.types.is_subtype(*actual, ty),
            Value::Null | Value::Opt(_) => false,
        }
    }
}

// ── Expression walking ──────────────────────────────────────────────

/// Pre-order visit of every node in an expression tree.
pub(crate) fn walk_expr(expr: &Expr, f: &mut impl FnMut(&Expr)) {
    f(expr);
    match expr {
        Expr::Var(_) | Expr::Lit(_) | Expr::Global(_) => {}
        Expr::Call { fun, args } => {
            walk_expr(fun, f);
            for arg in args {
                walk_expr(arg, f);
            }
        }
        Expr::Select { base, .. }
        | Expr::Index { base, .. }
        | Expr::Drop { base, .. }
        | Expr::SeqLen(base)
        | Expr::Get(base)
        | Expr::NonEmpty(base) => walk_expr(base, f),
        Expr::Cast { value, .. } | Expr::IsType { value, .. } => walk_expr(value, f),
        Expr::OuterEq { value, outer } => {
            walk_expr(value, f);
            walk_expr(outer, f);
        }
        Expr::Binary { lhs, rhs, .. } => {
            walk_expr(lhs, f);
            walk_expr(rhs, f);
        }
        Expr::If {
            cond,
            then_branch,
            else_branch,
        } => {
            walk_expr(cond, f);
            walk_expr(then_branch, f);
            walk_expr(else_branch, f);
        }
        Expr::Switch {
            scrut,
            arms,
            default,
        } => {
            walk_expr(scrut, f);
            for (_, arm) in arms {
                walk_expr(arm, f);
            }
            walk_expr(default, f);
        }
        Expr::Let { init, body, .. } => {
            walk_expr(init, f);
            walk_expr(body, f);
        }
        Expr::LabelDef { body, cont, .. } => {
            walk_expr(body, f);
            walk_expr(cont, f);
        }
        Expr::LabelCall { args, .. } => {
            for arg in args {
                walk_expr(arg, f);
            }
        }
        Expr::FailMatch { value, .. } => walk_expr(value, f),
    }
}
