//! The optimizer pipeline — five passes in fixed order.
//!
//! 1. [`hoist_labels`](crate::hoist_labels) — surface shared continuations
//! 2. [`elim_tests`](crate::elim_tests) — skip tests with known outcomes
//! 3. [`inline_labels`](crate::inline_labels) — inline single-call labels
//! 4. [`merge_vars`](crate::merge_vars) — merge bindings, hoist parameters
//! 5. [`inline_vars`](crate::inline_vars) — inline single-use bindings
//!
//! Every pass is a total, structure-preserving rewrite: a pass that finds
//! no opportunity returns the plan unchanged, and none may change
//! observable behavior. The whole pipeline can be disabled
//! ([`MatchConfig::optimize`](crate::MatchConfig)) without affecting
//! correctness, only output compactness.

use tarn_ir::{StringInterner, SymbolTable};

use crate::plan::{Plan, PlanTables};
use crate::{elim_tests, hoist_labels, inline_labels, inline_vars, merge_vars};

/// Mutable session state shared by the passes.
pub(crate) struct OptCx<'a> {
    pub tables: &'a mut PlanTables,
    pub syms: &'a mut SymbolTable,
    pub interner: &'a mut StringInterner,
}

/// Run the five passes, in order, exactly once each.
pub(crate) fn run(plan: Plan, cx: &mut OptCx) -> Plan {
    let plan = hoist_labels::run(plan, cx);
    let plan = elim_tests::run(plan, cx);
    let plan = inline_labels::run(plan, cx);
    let plan = merge_vars::run(plan, cx);
    inline_vars::run(plan, cx)
}
