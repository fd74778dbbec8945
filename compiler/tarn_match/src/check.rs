//! Diagnostics hook — the external exhaustivity/reachability collaborator.
//!
//! The lowering core neither computes nor depends on these analyses; it
//! forwards the *original* match construct (never the Plan) to the
//! checker and collects whatever warnings come back. Checking never blocks
//! or mutates translation.

use tarn_ir::{MatchExpr, Span};

/// External exhaustivity/reachability checker.
///
/// Implemented by the host pipeline. Both checks are skipped whenever
/// [`checkable`](Self::checkable) says the construct is not eligible.
pub trait MatchChecker {
    /// Whether this construct is eligible for checking at all.
    fn checkable(&self, m: &MatchExpr) -> bool;

    /// Report inputs no case covers.
    fn check_exhaustive(&self, m: &MatchExpr) -> Vec<MatchProblem>;

    /// Report cases no input reaches.
    fn check_reachable(&self, m: &MatchExpr) -> Vec<MatchProblem>;
}

/// Non-blocking problem found around one match construct.
///
/// Collected on the lowering session and drained by the caller; none of
/// these affect the translation result.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MatchProblem {
    /// Some input value reaches no case.
    NonExhaustive {
        match_span: Span,
        /// Human-readable descriptions of uncovered shapes.
        missing: Vec<String>,
    },
    /// A case no input can reach.
    UnreachableCase { case_span: Span, case_index: usize },
    /// A construct annotated as requiring a switch compiled to fewer
    /// distinct literal arms than the source had.
    SwitchQualityRegression {
        match_span: Span,
        source_arms: usize,
        emitted_arms: usize,
    },
}

/// Run the external checks, gated by the `checkable` predicate.
pub(crate) fn run_checks(
    m: &MatchExpr,
    checker: Option<&dyn MatchChecker>,
    problems: &mut Vec<MatchProblem>,
) {
    let Some(checker) = checker else { return };
    if !checker.checkable(m) {
        return;
    }
    problems.extend(checker.check_exhaustive(m));
    problems.extend(checker.check_reachable(m));
}
