//! Pattern-match lowering for the Tarn compiler.
//!
//! Lowers a match construct — a scrutinee plus an ordered list of guarded
//! pattern/body cases — into a decision procedure built only from
//! conditionals, multi-way integer branches, local bindings, and local
//! parameterized procedures and calls. The pipeline:
//!
//! 1. **Build** — translate the construct into a decision graph, the
//!    [`Plan`](plan::Plan), with variable initializers and label bodies
//!    held in side tables.
//! 2. **Optimize** — five fixed-order rewrite passes: hoist labels,
//!    eliminate redundant tests, inline singly-referenced labels, merge
//!    variables / hoist label parameters, inline singly-referenced
//!    variables.
//! 3. **Emit** — linearize back into an expression, recognizing runs of
//!    integer-equality tests as a single switch.
//!
//! Optimization preserves observable behavior exactly: extractor calls and
//! guards run the same number of times, in the same order, with the same
//! arguments as direct case-by-case evaluation.
//!
//! # Session model
//!
//! All mutable state — side tables, identity counters, collected problems —
//! lives in one [`MatchLowerer`], scoped to a single construct. Independent
//! constructs may be lowered in parallel by independent sessions with no
//! coordination.
//!
//! # Collaborators
//!
//! Exhaustivity and reachability are external: the host supplies a
//! [`MatchChecker`] and the hook forwards the original construct to it,
//! collecting warnings only. Internal invariant violations (an extractor
//! shape that fits no recognized decomposition, a missing side-table
//! entry) surface as [`LowerError`] and abort the one translation.

mod build;
mod check;
mod emit;
mod hoist_labels;
mod inline_labels;
mod inline_vars;
mod merge_vars;
mod optimize;
pub mod plan;

#[cfg(test)]
mod test_helpers;

use tarn_ir::{Expr, ExtractorShape, LabelId, MatchExpr, Span, StringInterner, SymbolTable,
    TypePool, VarId};

pub use check::{MatchChecker, MatchProblem};

use crate::build::PlanBuilder;
use crate::optimize::OptCx;
use crate::plan::PlanTables;

// ── Errors ──────────────────────────────────────────────────────────

/// Internal invariant violation — a defect in an upstream stage having
/// supplied an inconsistent tree, or a corrupted side table. Fatal to the
/// single translation; never caught locally.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum LowerError {
    /// An extractor's declared shape does not fit its sub-pattern count.
    #[error("extractor shape {shape:?} does not fit {args} sub-patterns at {span}")]
    ShapeMismatch {
        shape: ExtractorShape,
        args: usize,
        span: Span,
    },
    /// A variadic capture outside the trailing position of a sequence
    /// extractor.
    #[error("variadic capture outside a sequence tail at {span}")]
    VariadicPosition { span: Span },
    /// A `Let` node whose variable has no registered initializer.
    #[error("no initializer registered for {var:?}")]
    MissingInitializer { var: VarId },
    /// A `Labelled` node whose label has no registered body.
    #[error("no body registered for {label:?}")]
    MissingLabel { label: LabelId },
    /// A call that supplies no actual for one of the label's parameters.
    #[error("call to {label:?} supplies no actual for parameter {formal:?}")]
    MissingCallActual { label: LabelId, formal: VarId },
}

// ── Configuration ───────────────────────────────────────────────────

/// Lowering configuration.
#[derive(Clone, Copy, Debug)]
pub struct MatchConfig {
    /// Run the optimizer pipeline. Disabling it affects output
    /// compactness, never correctness.
    pub optimize: bool,
}

impl Default for MatchConfig {
    fn default() -> Self {
        Self { optimize: true }
    }
}

// ── Session ─────────────────────────────────────────────────────────

/// Lowering session for one match construct.
///
/// Borrows the symbol table mutably (fresh temporaries and labels are
/// allocated from it) and the type pool immutably. Everything else —
/// side tables, node IDs, collected problems — is private to the session
/// and discarded when it is dropped.
pub struct MatchLowerer<'a> {
    syms: &'a mut SymbolTable,
    types: &'a TypePool,
    interner: &'a mut StringInterner,
    config: MatchConfig,
    problems: Vec<MatchProblem>,
}

impl<'a> MatchLowerer<'a> {
    pub fn new(
        syms: &'a mut SymbolTable,
        types: &'a TypePool,
        interner: &'a mut StringInterner,
        config: MatchConfig,
    ) -> Self {
        Self {
            syms,
            types,
            interner,
            config,
            problems: Vec::new(),
        }
    }

    /// Lower one match construct to an expression of its result type.
    ///
    /// The checker, when supplied and willing (`checkable`), sees the
    /// original construct before translation; its findings land in
    /// [`problems`](Self::problems) and never block the result.
    pub fn lower(
        &mut self,
        m: &MatchExpr,
        checker: Option<&dyn MatchChecker>,
    ) -> Result<Expr, LowerError> {
        check::run_checks(m, checker, &mut self.problems);

        let mut tables = PlanTables::new();
        let plan = PlanBuilder {
            syms: self.syms,
            types: self.types,
            interner: self.interner,
            tables: &mut tables,
        }
        .build_match(m)?;

        let plan = if self.config.optimize {
            let mut cx = OptCx {
                tables: &mut tables,
                syms: self.syms,
                interner: self.interner,
            };
            optimize::run(plan, &mut cx)
        } else {
            plan
        };

        let expr = emit::emit(plan, &mut tables, self.types)?;

        if m.require_switch {
            if let Some((source_arms, emitted_arms)) = emit::switch_quality(m, &expr) {
                self.problems.push(MatchProblem::SwitchQualityRegression {
                    match_span: m.span,
                    source_arms,
                    emitted_arms,
                });
            }
        }

        Ok(expr)
    }

    /// Problems collected so far (checker findings plus emission warnings).
    pub fn problems(&self) -> &[MatchProblem] {
        &self.problems
    }

    /// Drain the collected problems.
    pub fn take_problems(&mut self) -> Vec<MatchProblem> {
        std::mem::take(&mut self.problems)
    }
}
