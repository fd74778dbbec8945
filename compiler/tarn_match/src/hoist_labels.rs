//! Pass 1 — hoist label definitions.
//!
//! Rewrites `if T then (label L = B in E1) else E2` into
//! `label L = B in (if T then E1 else E2)` (symmetrically for the failure
//! branch), and collapses nested definitions in the label table:
//! `label L1 = (label L2 = B2 in B1) in E` becomes
//! `label L2 = B2 in label L1 = B1 in E`.
//!
//! Surfacing shared continuations as early as possible lets the later
//! passes see maximal sharing. Widening a label's scope is always sound:
//! every call site the label had is still dominated by its declaration.

use tarn_ir::LabelId;

use crate::optimize::OptCx;
use crate::plan::{NodeId, Plan, PlanKind};

pub(crate) fn run(plan: Plan, cx: &mut OptCx) -> Plan {
    let mut hoisted = 0usize;
    let out = hoist(plan, cx, &mut hoisted);
    tracing::debug!(hoisted, "hoisted label definitions");
    out
}

/// Strip leading `Labelled` nodes, remembering them outermost-first.
fn peel(mut plan: Plan, out: &mut Vec<(NodeId, LabelId)>) -> Plan {
    while matches!(plan.kind, PlanKind::Labelled { .. }) {
        let Plan { id, kind } = plan;
        let PlanKind::Labelled { label, body } = kind else {
            unreachable!("matched above");
        };
        out.push((id, label));
        plan = *body;
    }
    plan
}

/// Re-wrap a plan in peeled `Labelled` nodes, preserving relative order.
fn rewrap(mut plan: Plan, wrappers: Vec<(NodeId, LabelId)>) -> Plan {
    for (id, label) in wrappers.into_iter().rev() {
        plan = Plan {
            id,
            kind: PlanKind::Labelled {
                label,
                body: Box::new(plan),
            },
        };
    }
    plan
}

fn hoist(plan: Plan, cx: &mut OptCx, n: &mut usize) -> Plan {
    let Plan { id, kind } = plan;
    match kind {
        PlanKind::Test {
            test,
            scrut,
            span,
            on_success,
            on_failure,
        } => {
            // Children first: hoisting below may surface new Labelled
            // nodes at the top of either branch.
            let on_success = hoist(*on_success, cx, n);
            let on_failure = hoist(*on_failure, cx, n);

            let mut wrappers = Vec::new();
            let on_success = peel(on_success, &mut wrappers);
            let on_failure = peel(on_failure, &mut wrappers);
            *n += wrappers.len();

            let test_node = Plan {
                id,
                kind: PlanKind::Test {
                    test,
                    scrut,
                    span,
                    on_success: Box::new(on_success),
                    on_failure: Box::new(on_failure),
                },
            };
            rewrap(test_node, wrappers)
        }

        PlanKind::Labelled { label, body } => {
            // Collapse nested definitions inside the table entry.
            let mut entry = match cx.tables.take_label_body(label) {
                Some(entry) => hoist(entry, cx, n),
                None => {
                    // Entry already consumed — nothing to collapse.
                    let body = hoist(*body, cx, n);
                    return Plan {
                        id,
                        kind: PlanKind::Labelled {
                            label,
                            body: Box::new(body),
                        },
                    };
                }
            };
            let mut wrappers = Vec::new();
            entry = peel(entry, &mut wrappers);
            *n += wrappers.len();
            cx.tables.put_label_body(label, entry);

            let body = hoist(*body, cx, n);
            let this = Plan {
                id,
                kind: PlanKind::Labelled {
                    label,
                    body: Box::new(body),
                },
            };
            rewrap(this, wrappers)
        }

        PlanKind::Let { var, body } => {
            let body = hoist(*body, cx, n);
            Plan {
                id,
                kind: PlanKind::Let {
                    var,
                    body: Box::new(body),
                },
            }
        }

        kind @ (PlanKind::Call { .. } | PlanKind::Code(_)) => Plan { id, kind },
    }
}
