//! Plan construction — match constructs to decision graphs.
//!
//! [`PlanBuilder::build_match`] binds the scrutinee once, then folds the
//! case list right-to-left, threading a failure continuation that starts as
//! "raise match failure carrying the scrutinee" and, for each case, becomes
//! a call to a fresh label wrapping the previous failure continuation.
//!
//! Pattern translation is a structural recursion over pattern shapes; see
//! [`PlanBuilder::build_pattern`]. The failure continuation handed down the
//! recursion is always a label, so materializing it at a use site is a
//! fresh `Call` node — continuations are shared through the label table,
//! never by duplicating sub-plans.
//!
//! The evaluation of the built Plan is observably equivalent to evaluating
//! the cases in order: extractor calls and guards run the same number of
//! times, in the same order, with the same arguments.

use tarn_ir::{
    Case, Expr, ExtractorShape, LabelId, MatchExpr, Name, Pattern, Span, StringInterner,
    SymbolFlags, SymbolTable, TypePool, VarId,
};

use crate::plan::{Plan, PlanTables, Test};
use crate::LowerError;

/// How positional components of a decomposed value are selected.
#[derive(Clone, Copy)]
enum Selector {
    /// Product accessor field.
    Field,
    /// Sequence element by index.
    Element,
}

impl Selector {
    fn hint(self) -> &'static str {
        match self {
            Selector::Field => "field",
            Selector::Element => "elem",
        }
    }
}

/// Builder for the Plan of one match construct.
///
/// Borrows the session state; all fresh symbols, labels, and node IDs come
/// from the borrowed tables so identities stay unique across the construct.
pub(crate) struct PlanBuilder<'a> {
    pub syms: &'a mut SymbolTable,
    pub types: &'a TypePool,
    pub interner: &'a mut StringInterner,
    pub tables: &'a mut PlanTables,
}

impl PlanBuilder<'_> {
    /// Translate a whole match construct into a Plan.
    pub fn build_match(&mut self, m: &MatchExpr) -> Result<Plan, LowerError> {
        let sel = self.fresh_var("sel", m.span);
        if !self.types.is_nullable(m.scrutinee_ty) {
            self.syms.mark_non_null(sel);
        }
        self.tables.define_var(sel, m.scrutinee.clone());

        // Default failure continuation: raise match failure with the
        // scrutinee's value.
        let mut plan = self.tables.code(Expr::FailMatch {
            value: Box::new(Expr::var(sel)),
            span: m.span,
        });

        // Fold cases right-to-left: each case's failure is a label holding
        // everything after it.
        for case in m.cases.iter().rev() {
            let fail = self.syms.fresh_label();
            self.tables.define_label(fail, plan);
            let case_plan = self.build_case(sel, case, fail)?;
            plan = self.tables.labelled(fail, case_plan);
        }

        Ok(self.tables.let_plan(sel, plan))
    }

    /// Translate one case: pattern, then guard (if any), then body.
    fn build_case(&mut self, scrut: VarId, case: &Case, fail: LabelId) -> Result<Plan, LowerError> {
        let body = self.tables.code(case.body.clone());
        let success = match &case.guard {
            Some(guard) => {
                let on_failure = self.tables.call(fail);
                self.tables
                    .test(Test::Guard, guard.clone(), case.span, body, on_failure)
            }
            None => body,
        };
        self.build_pattern(scrut, &case.pattern, success, fail)
    }

    /// Translate one pattern against a bound scrutinee variable.
    ///
    /// `on_success` is consumed; `fail` is the label to call when the
    /// pattern does not match.
    fn build_pattern(
        &mut self,
        scrut: VarId,
        pattern: &Pattern,
        on_success: Plan,
        fail: LabelId,
    ) -> Result<Plan, LowerError> {
        // Conservative irrefutability: only binding-free shapes that
        // provably cannot fail consume nothing.
        if pattern.is_wildcard_like() {
            return Ok(on_success);
        }

        match pattern {
            Pattern::Wildcard { .. } => Ok(on_success),

            Pattern::Bind { var, sub, span: _ } => {
                // The binding wraps the sub-pattern's success continuation:
                // sub-pattern tests run first, then the name is bound as an
                // alias of the scrutinee.
                self.tables.define_var(*var, Expr::var(scrut));
                let bound = self.tables.let_plan(*var, on_success);
                self.build_pattern(scrut, sub, bound, fail)
            }

            Pattern::Typed { sub, ty, span } => {
                let narrowed = self.fresh_var("cast", *span);
                self.syms.mark_non_null(narrowed);
                self.tables.define_var(
                    narrowed,
                    Expr::Cast {
                        value: Box::new(Expr::var(scrut)),
                        ty: *ty,
                    },
                );
                let inner = self.build_pattern(narrowed, sub, on_success, fail)?;
                let cont = self.tables.let_plan(narrowed, inner);
                let on_failure = self.tables.call(fail);
                Ok(self
                    .tables
                    .test(Test::Type(*ty), Expr::var(scrut), *span, cont, on_failure))
            }

            Pattern::Alt { alts, .. } => self.build_alternatives(scrut, alts, on_success, fail),

            Pattern::Const { value, span } => {
                let on_failure = self.tables.call(fail);
                Ok(self.tables.test(
                    Test::Eq(value.clone()),
                    Expr::var(scrut),
                    *span,
                    on_success,
                    on_failure,
                ))
            }

            Pattern::Extract { .. } => self.build_extract(scrut, pattern, on_success, fail),

            // A variadic capture is only meaningful as the trailing
            // sub-pattern of a sequence extractor; anywhere else the
            // upstream stage handed us an inconsistent tree.
            Pattern::Rest { span, .. } => Err(LowerError::VariadicPosition { span: *span }),
        }
    }

    /// Alternatives share one success label, and one failure label per
    /// alternative boundary: trying alternative *i* on failure falls
    /// through to alternative *i + 1* without re-testing anything.
    fn build_alternatives(
        &mut self,
        scrut: VarId,
        alts: &[Pattern],
        on_success: Plan,
        fail: LabelId,
    ) -> Result<Plan, LowerError> {
        let succ = self.syms.fresh_label();
        self.tables.define_label(succ, on_success);

        let mut plan: Option<Plan> = None;
        for alt in alts.iter().rev() {
            let fail_for_alt = match plan.take() {
                // Rightmost alternative falls through to the enclosing
                // failure directly.
                None => fail,
                Some(later) => {
                    let boundary = self.syms.fresh_label();
                    self.tables.define_label(boundary, later);
                    boundary
                }
            };
            let succ_call = self.tables.call(succ);
            let alt_plan = self.build_pattern(scrut, alt, succ_call, fail_for_alt)?;
            plan = Some(if fail_for_alt == fail {
                alt_plan
            } else {
                self.tables.labelled(fail_for_alt, alt_plan)
            });
        }

        // `alts` is non-empty here: an empty alternative list is
        // wildcard-like and was elided by the caller.
        let body = match plan {
            Some(body) => body,
            None => self.tables.call(succ),
        };
        Ok(self.tables.labelled(succ, body))
    }

    /// Extractor/destructuring patterns.
    fn build_extract(
        &mut self,
        scrut: VarId,
        pattern: &Pattern,
        on_success: Plan,
        fail: LabelId,
    ) -> Result<Plan, LowerError> {
        let Pattern::Extract {
            fun,
            implicits,
            args,
            shape,
            result_ty,
            direct,
            span,
        } = pattern
        else {
            return Err(LowerError::ShapeMismatch {
                shape: ExtractorShape::Single,
                args: 0,
                span: pattern.span(),
            });
        };

        // Direct-field bypass: a compiler-synthesized extractor over a
        // known product of matching arity reads accessor fields without
        // calling anything. The `direct` flag is upstream metadata; an
        // arity mismatch just falls back to the ordinary extractor path.
        if *direct
            && !args.iter().any(Pattern::is_variadic)
            && self.types.product_arity(*result_ty) == Some(args.len())
        {
            return self.match_components(scrut, args, Selector::Field, on_success, fail);
        }

        // The invocation: extractor applied to the scrutinee, then to the
        // implicit list when present.
        let mut call = Expr::Call {
            fun: Box::new(fun.clone()),
            args: vec![Expr::var(scrut)],
        };
        if !implicits.is_empty() {
            call = Expr::Call {
                fun: Box::new(call),
                args: implicits.clone(),
            };
        }

        // A boolean extractor's result *is* the test.
        if matches!(shape, ExtractorShape::Boolean) {
            if !args.is_empty() {
                return Err(LowerError::ShapeMismatch {
                    shape: *shape,
                    args: args.len(),
                    span: *span,
                });
            }
            let on_failure = self.tables.call(fail);
            return Ok(self
                .tables
                .test(Test::Guard, call, *span, on_success, on_failure));
        }

        // Bind the result, test it non-null unless proven, test it
        // non-empty, then decompose by declared shape.
        let result = self.fresh_var("unapp", *span);
        if !self.types.is_nullable(*result_ty) {
            self.syms.mark_non_null(result);
        }
        self.tables.define_var(result, call);

        let decomposed = match shape {
            ExtractorShape::Boolean => unreachable!("handled above"),
            ExtractorShape::Product { arity } => {
                self.ensure_arity(*arity, args, *shape, *span)?;
                self.match_components(result, args, Selector::Field, on_success, fail)?
            }
            ExtractorShape::Single => {
                if args.len() != 1 || args[0].is_variadic() {
                    return Err(LowerError::ShapeMismatch {
                        shape: *shape,
                        args: args.len(),
                        span: *span,
                    });
                }
                let payload = self.bind_payload(result, *span);
                let inner = self.build_pattern(payload, &args[0], on_success, fail)?;
                self.tables.let_plan(payload, inner)
            }
            ExtractorShape::Decomposed { arity } => {
                self.ensure_arity(*arity, args, *shape, *span)?;
                let payload = self.bind_payload(result, *span);
                let inner = self.match_components(payload, args, Selector::Field, on_success, fail)?;
                self.tables.let_plan(payload, inner)
            }
            ExtractorShape::Sequence => {
                let payload = self.bind_payload(result, *span);
                let inner = self.match_sequence(payload, args, *span, on_success, fail)?;
                self.tables.let_plan(payload, inner)
            }
        };

        let on_failure = self.tables.call(fail);
        let tested = self
            .tables
            .test(Test::NonEmpty, Expr::var(result), *span, decomposed, on_failure);
        let tested = if self.syms.is_non_null(result) {
            tested
        } else {
            let on_failure = self.tables.call(fail);
            self.tables
                .test(Test::NonNull, Expr::var(result), *span, tested, on_failure)
        };
        Ok(self.tables.let_plan(result, tested))
    }

    /// Sequence decomposition: exact length plus per-index matching, or —
    /// with a trailing variadic capture — a non-exact length floor, fixed
    /// elements by index, and the remainder through a drop-style selection.
    fn match_sequence(
        &mut self,
        payload: VarId,
        args: &[Pattern],
        span: Span,
        on_success: Plan,
        fail: LabelId,
    ) -> Result<Plan, LowerError> {
        let variadic = args.last().is_some_and(Pattern::is_variadic);
        if args.iter().rev().skip(1).any(Pattern::is_variadic) {
            // Only the trailing position may capture the remainder.
            let bad = args
                .iter()
                .rev()
                .skip(1)
                .find(|a| a.is_variadic())
                .map_or(span, Pattern::span);
            return Err(LowerError::VariadicPosition { span: bad });
        }

        if !variadic {
            let len = u32::try_from(args.len()).map_err(|_| LowerError::ShapeMismatch {
                shape: ExtractorShape::Sequence,
                args: args.len(),
                span,
            })?;
            let elems = self.match_components(payload, args, Selector::Element, on_success, fail)?;
            let on_failure = self.tables.call(fail);
            return Ok(self.tables.test(
                Test::Length { len, exact: true },
                Expr::var(payload),
                span,
                elems,
                on_failure,
            ));
        }

        let fixed = args.len() - 1;
        let rest = &args[fixed];

        // A lone variadic matches the whole payload directly: no length
        // test, no drop.
        if fixed == 0 {
            return Ok(self.bind_rest(payload, rest, on_success, 0, /* whole: */ true));
        }

        let rest_plan = self.bind_rest(payload, rest, on_success, fixed, false);
        let elems =
            self.match_components(payload, &args[..fixed], Selector::Element, rest_plan, fail)?;
        let len = u32::try_from(fixed).map_err(|_| LowerError::ShapeMismatch {
            shape: ExtractorShape::Sequence,
            args: args.len(),
            span,
        })?;
        let on_failure = self.tables.call(fail);
        Ok(self.tables.test(
            Test::Length { len, exact: false },
            Expr::var(payload),
            span,
            elems,
            on_failure,
        ))
    }

    /// Bind a variadic capture. `whole` binds the payload itself; otherwise
    /// the remainder past the fixed prefix.
    fn bind_rest(
        &mut self,
        payload: VarId,
        rest: &Pattern,
        on_success: Plan,
        fixed: usize,
        whole: bool,
    ) -> Plan {
        let Pattern::Rest {
            binder: Some(var), ..
        } = rest
        else {
            // An unbound capture consumes nothing.
            return on_success;
        };
        let init = if whole {
            Expr::var(payload)
        } else {
            Expr::Drop {
                base: Box::new(Expr::var(payload)),
                // `fixed` is bounded by the pattern's sub-pattern count.
                count: u32::try_from(fixed).unwrap_or(u32::MAX),
            }
        };
        self.tables.define_var(*var, init);
        self.tables.let_plan(*var, on_success)
    }

    /// Match sub-patterns against positional components of `base`,
    /// left-to-right, each component bound to a fresh variable first.
    fn match_components(
        &mut self,
        base: VarId,
        args: &[Pattern],
        selector: Selector,
        on_success: Plan,
        fail: LabelId,
    ) -> Result<Plan, LowerError> {
        let mut plan = on_success;
        for (i, arg) in args.iter().enumerate().rev() {
            // Bounded by sub-pattern count.
            let index = u32::try_from(i).unwrap_or(u32::MAX);
            let component = self.fresh_var(selector.hint(), arg.span());
            let init = match selector {
                Selector::Field => Expr::Select {
                    base: Box::new(Expr::var(base)),
                    index,
                },
                Selector::Element => Expr::Index {
                    base: Box::new(Expr::var(base)),
                    index,
                },
            };
            self.tables.define_var(component, init);
            let inner = self.build_pattern(component, arg, plan, fail)?;
            plan = self.tables.let_plan(component, inner);
        }
        Ok(plan)
    }

    fn ensure_arity(
        &self,
        arity: u32,
        args: &[Pattern],
        shape: ExtractorShape,
        span: Span,
    ) -> Result<(), LowerError> {
        if arity as usize != args.len() || args.iter().any(Pattern::is_variadic) {
            return Err(LowerError::ShapeMismatch {
                shape,
                args: args.len(),
                span,
            });
        }
        Ok(())
    }

    fn bind_payload(&mut self, result: VarId, span: Span) -> VarId {
        let payload = self.fresh_var("payload", span);
        // The payload of a live optional container is never null.
        self.syms.mark_non_null(payload);
        self.tables
            .define_var(payload, Expr::Get(Box::new(Expr::var(result))));
        payload
    }

    fn fresh_var(&mut self, hint: &str, span: Span) -> VarId {
        let name: Name = self.interner.intern(hint);
        self.syms.fresh(name, SymbolFlags::GENERATED, span)
    }
}
