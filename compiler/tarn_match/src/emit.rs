//! Emitter — optimized plans back to expressions.
//!
//! Structural on node kind. The one non-local piece is switch synthesis: a
//! run of at least three integer-equality tests on the same (normalized)
//! scrutinee, linked through their failure continuations and terminated by
//! a non-equality default, becomes a single multi-way branch. Shorter runs
//! emit as nested conditionals.
//!
//! Labels fully inlined by optimization never reach the emitter; a label
//! that survives becomes a local parameterized procedure, and calls pass
//! actuals in parameter order.

use rustc_hash::FxHashSet;

use tarn_ir::{BinOp, Expr, Lit, MatchExpr, Pattern, TypePool};

use crate::plan::{int_eq_value, Plan, PlanKind, PlanTables, Test};
use crate::LowerError;

pub(crate) fn emit(
    plan: Plan,
    tables: &mut PlanTables,
    types: &TypePool,
) -> Result<Expr, LowerError> {
    match plan.kind {
        PlanKind::Test { .. } => emit_test(plan, tables, types),

        PlanKind::Let { var, body } => {
            let init = tables
                .remove_var(var)
                .ok_or(LowerError::MissingInitializer { var })?;
            let body = emit(*body, tables, types)?;
            Ok(Expr::Let {
                var,
                init: Box::new(init),
                body: Box::new(body),
            })
        }

        PlanKind::Labelled { label, body } => {
            let entry = tables
                .take_label_body(label)
                .ok_or(LowerError::MissingLabel { label })?;
            let params = tables.label_params(label).to_vec();
            let entry = emit(entry, tables, types)?;
            let cont = emit(*body, tables, types)?;
            Ok(Expr::LabelDef {
                label,
                params,
                body: Box::new(entry),
                cont: Box::new(cont),
            })
        }

        PlanKind::Call { label, args } => {
            let params = tables.label_params(label).to_vec();
            let mut actuals = Vec::with_capacity(params.len());
            for formal in params {
                let actual = args
                    .iter()
                    .find(|(f, _)| *f == formal)
                    .map(|(_, a)| *a)
                    .ok_or(LowerError::MissingCallActual { label, formal })?;
                actuals.push(Expr::var(actual));
            }
            Ok(Expr::LabelCall {
                label,
                args: actuals,
            })
        }

        PlanKind::Code(expr) => Ok(expr),
    }
}

/// Emit a test node, attempting switch synthesis first.
fn emit_test(plan: Plan, tables: &mut PlanTables, types: &TypePool) -> Result<Expr, LowerError> {
    // Collect the chain of same-scrutinee integer-equality tests linked
    // through failure continuations. A repeated literal is unreachable on
    // its path and is dropped (first arm wins).
    let mut arms: Vec<(i64, Plan)> = Vec::new();
    let mut seen: FxHashSet<i64> = FxHashSet::default();
    let mut chain_scrut: Option<(Expr, Expr)> = None; // (raw, normalized)
    let mut current = plan;

    loop {
        let head: Option<(Expr, Expr)> = match &current.kind {
            PlanKind::Test { test, scrut, .. } if int_eq_value(test).is_some() => {
                Some((scrut.clone(), tables.normalize_expr(scrut)))
            }
            _ => None,
        };
        let links = match (&chain_scrut, &head) {
            (_, None) => false,
            (None, Some(_)) => true,
            (Some((_, prev)), Some((_, norm))) => prev == norm,
        };
        if !links {
            break;
        }
        if chain_scrut.is_none() {
            chain_scrut = head;
        }
        let Plan {
            kind:
                PlanKind::Test {
                    test,
                    on_success,
                    on_failure,
                    ..
                },
            ..
        } = current
        else {
            unreachable!("chain link checked above");
        };
        let Some(value) = int_eq_value(&test) else {
            unreachable!("chain link checked above");
        };
        if seen.insert(value) {
            arms.push((value, *on_success));
        }
        current = *on_failure;
    }

    if arms.len() >= 3 {
        let Some((scrut, _)) = chain_scrut else {
            unreachable!("non-empty chain recorded its scrutinee");
        };
        let mut emitted = Vec::with_capacity(arms.len());
        for (value, succ) in arms {
            emitted.push((value, emit(succ, tables, types)?));
        }
        let default = emit(current, tables, types)?;
        return Ok(Expr::Switch {
            scrut: Box::new(scrut),
            arms: emitted,
            default: Box::new(default),
        });
    }

    // Short chain: fold the collected prefix back into conditionals.
    let mut result = if matches!(current.kind, PlanKind::Test { .. }) && arms.is_empty() {
        // The head test itself was not a chain link; emit it directly.
        let Plan {
            kind:
                PlanKind::Test {
                    test,
                    scrut,
                    on_success,
                    on_failure,
                    ..
                },
            ..
        } = current
        else {
            unreachable!("matched above");
        };
        let cond = condition(&test, scrut, types);
        let then_branch = emit(*on_success, tables, types)?;
        let else_branch = emit(*on_failure, tables, types)?;
        Expr::If {
            cond: Box::new(cond),
            then_branch: Box::new(then_branch),
            else_branch: Box::new(else_branch),
        }
    } else {
        emit(current, tables, types)?
    };

    for (value, succ) in arms.into_iter().rev() {
        let Some((scrut, _)) = &chain_scrut else {
            unreachable!("arms imply a recorded scrutinee");
        };
        let cond = condition(&Test::Eq(Expr::int(value)), scrut.clone(), types);
        let then_branch = emit(succ, tables, types)?;
        result = Expr::If {
            cond: Box::new(cond),
            then_branch: Box::new(then_branch),
            else_branch: Box::new(result),
        };
    }
    Ok(result)
}

/// The boolean condition for a test.
fn condition(test: &Test, scrut: Expr, types: &TypePool) -> Expr {
    match test {
        Test::Type(ty) => {
            let check = Expr::IsType {
                value: Box::new(scrut.clone()),
                ty: *ty,
            };
            // Non-static inner types additionally compare the enclosing
            // instance against the static prefix.
            match types.outer_prefix(*ty) {
                Some(prefix) => Expr::Binary {
                    op: BinOp::And,
                    lhs: Box::new(check),
                    rhs: Box::new(Expr::OuterEq {
                        value: Box::new(scrut),
                        outer: Box::new(prefix.clone()),
                    }),
                },
                None => check,
            }
        }
        // Pattern expression first, scrutinee second.
        Test::Eq(value) => Expr::Binary {
            op: BinOp::Eq,
            lhs: Box::new(value.clone()),
            rhs: Box::new(scrut),
        },
        Test::Length { len, exact } => Expr::Binary {
            op: if *exact { BinOp::Eq } else { BinOp::Ge },
            lhs: Box::new(Expr::SeqLen(Box::new(scrut))),
            rhs: Box::new(Expr::int(i64::from(*len))),
        },
        Test::NonEmpty => Expr::NonEmpty(Box::new(scrut)),
        Test::NonNull => Expr::Binary {
            op: BinOp::Ne,
            lhs: Box::new(scrut),
            rhs: Box::new(Expr::Lit(Lit::Null)),
        },
        Test::Guard => scrut,
    }
}

// ── Switch-quality post-check ───────────────────────────────────────

/// For constructs annotated as requiring a switch: compare distinct
/// integer-literal arm counts between source cases and emitted switches.
/// Returns `Some((source, emitted))` when the output shrank — advisory
/// only, the caller downgrades it to a warning.
pub(crate) fn switch_quality(m: &MatchExpr, emitted: &Expr) -> Option<(usize, usize)> {
    let mut source = FxHashSet::default();
    for case in &m.cases {
        pattern_int_literals(&case.pattern, &mut source);
    }
    if source.is_empty() {
        return None;
    }
    let mut output = FxHashSet::default();
    switch_int_literals(emitted, &mut output);
    (output.len() < source.len()).then_some((source.len(), output.len()))
}

fn pattern_int_literals(pattern: &Pattern, out: &mut FxHashSet<i64>) {
    match pattern {
        Pattern::Const {
            value: Expr::Lit(Lit::Int(value)),
            ..
        } => {
            out.insert(*value);
        }
        Pattern::Alt { alts, .. } => {
            for alt in alts {
                pattern_int_literals(alt, out);
            }
        }
        Pattern::Bind { sub, .. } | Pattern::Typed { sub, .. } => pattern_int_literals(sub, out),
        Pattern::Const { .. }
        | Pattern::Wildcard { .. }
        | Pattern::Extract { .. }
        | Pattern::Rest { .. } => {}
    }
}

fn switch_int_literals(expr: &Expr, out: &mut FxHashSet<i64>) {
    match expr {
        Expr::Switch {
            scrut,
            arms,
            default,
        } => {
            switch_int_literals(scrut, out);
            for (value, arm) in arms {
                out.insert(*value);
                switch_int_literals(arm, out);
            }
            switch_int_literals(default, out);
        }
        Expr::Var(_) | Expr::Lit(_) | Expr::Global(_) => {}
        Expr::Call { fun, args } => {
            switch_int_literals(fun, out);
            for arg in args {
                switch_int_literals(arg, out);
            }
        }
        Expr::Select { base, .. }
        | Expr::Index { base, .. }
        | Expr::Drop { base, .. }
        | Expr::SeqLen(base)
        | Expr::Get(base)
        | Expr::NonEmpty(base) => switch_int_literals(base, out),
        Expr::Cast { value, .. } | Expr::IsType { value, .. } => switch_int_literals(value, out),
        Expr::OuterEq { value, outer } => {
            switch_int_literals(value, out);
            switch_int_literals(outer, out);
        }
        Expr::Binary { lhs, rhs, .. } => {
            switch_int_literals(lhs, out);
            switch_int_literals(rhs, out);
        }
        Expr::If {
            cond,
            then_branch,
            else_branch,
        } => {
            switch_int_literals(cond, out);
            switch_int_literals(then_branch, out);
            switch_int_literals(else_branch, out);
        }
        Expr::Let { init, body, .. } => {
            switch_int_literals(init, out);
            switch_int_literals(body, out);
        }
        Expr::LabelDef { body, cont, .. } => {
            switch_int_literals(body, out);
            switch_int_literals(cont, out);
        }
        Expr::LabelCall { args, .. } => {
            for arg in args {
                switch_int_literals(arg, out);
            }
        }
        Expr::FailMatch { value, .. } => switch_int_literals(value, out),
    }
}
