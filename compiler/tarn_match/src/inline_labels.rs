//! Pass 3 — inline singly-referenced labels.
//!
//! Counts reachable call sites per label, then inlines the body of every
//! label called at most once at its single call site (or drops it outright
//! when never called). Multiply-called labels stay shared.
//!
//! Counting is reachability-based: bodies of labels that are never called
//! do not contribute call counts, so a dead continuation cannot keep
//! another label artificially shared.

use rustc_hash::{FxHashMap, FxHashSet};

use tarn_ir::LabelId;

use crate::optimize::OptCx;
use crate::plan::{Plan, PlanKind};

pub(crate) fn run(plan: Plan, cx: &mut OptCx) -> Plan {
    let counts = count_calls(&plan, cx);
    let mut pass = InlineLabels {
        cx,
        counts,
        inlined: 0,
        dropped: 0,
    };
    let out = pass.transform(plan);
    tracing::debug!(
        inlined = pass.inlined,
        dropped = pass.dropped,
        "inlined singly-referenced labels"
    );
    out
}

/// Reachable call-site counts: the main plan first, then the bodies of
/// called labels via a worklist.
fn count_calls(plan: &Plan, cx: &OptCx) -> FxHashMap<LabelId, usize> {
    let mut counts = FxHashMap::default();
    let mut queue = Vec::new();
    walk(plan, &mut counts, &mut queue);

    let mut visited = FxHashSet::default();
    while let Some(label) = queue.pop() {
        if !visited.insert(label) {
            continue;
        }
        if let Some(body) = cx.tables.label_body(label) {
            walk(body, &mut counts, &mut queue);
        }
    }
    counts
}

fn walk(plan: &Plan, counts: &mut FxHashMap<LabelId, usize>, queue: &mut Vec<LabelId>) {
    match &plan.kind {
        PlanKind::Test {
            on_success,
            on_failure,
            ..
        } => {
            walk(on_success, counts, queue);
            walk(on_failure, counts, queue);
        }
        PlanKind::Let { body, .. } => walk(body, counts, queue),
        // The entry is walked only if some call reaches it.
        PlanKind::Labelled { body, .. } => walk(body, counts, queue),
        PlanKind::Call { label, .. } => {
            *counts.entry(*label).or_insert(0) += 1;
            queue.push(*label);
        }
        PlanKind::Code(_) => {}
    }
}

struct InlineLabels<'a, 'cx> {
    cx: &'a mut OptCx<'cx>,
    counts: FxHashMap<LabelId, usize>,
    inlined: usize,
    dropped: usize,
}

impl InlineLabels<'_, '_> {
    fn count(&self, label: LabelId) -> usize {
        self.counts.get(&label).copied().unwrap_or(0)
    }

    fn transform(&mut self, plan: Plan) -> Plan {
        let Plan { id, kind } = plan;
        match kind {
            PlanKind::Labelled { label, body } => match self.count(label) {
                0 => {
                    // Never called: discard the entry with the declaration.
                    self.cx.tables.take_label_body(label);
                    self.dropped += 1;
                    self.transform(*body)
                }
                1 => {
                    // The declaration disappears; the entry is picked up at
                    // the single call site inside `body`.
                    self.transform(*body)
                }
                _ => {
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
            },

            PlanKind::Call { label, args } => {
                if self.count(label) == 1 {
                    if let Some(entry) = self.cx.tables.take_label_body(label) {
                        debug_assert!(
                            args.is_empty(),
                            "call arguments only appear after parameter hoisting"
                        );
                        self.inlined += 1;
                        return self.transform(entry);
                    }
                }
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

            PlanKind::Let { var, body } => {
                let body = self.transform(*body);
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
