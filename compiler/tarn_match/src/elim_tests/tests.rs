use tarn_ir::{Expr, Name, Span, StringInterner, SymbolTable, VarId};

use super::*;
use crate::plan::PlanTables;

struct Fixture {
    syms: SymbolTable,
    interner: StringInterner,
    tables: PlanTables,
}

impl Fixture {
    fn new() -> Self {
        Self {
            syms: SymbolTable::new(),
            interner: StringInterner::new(),
            tables: PlanTables::new(),
        }
    }

    fn cx(&mut self) -> OptCx<'_> {
        OptCx {
            tables: &mut self.tables,
            syms: &mut self.syms,
            interner: &mut self.interner,
        }
    }

    fn var(&mut self) -> VarId {
        self.syms.fresh_generated(Name::EMPTY, Span::DUMMY)
    }

    fn eq_test(&mut self, scrut: VarId, value: i64, succ: Plan, fail: Plan) -> Plan {
        self.tables.test(
            Test::Eq(Expr::int(value)),
            Expr::var(scrut),
            Span::DUMMY,
            succ,
            fail,
        )
    }

    fn leaf(&mut self, value: i64) -> Plan {
        self.tables.code(Expr::int(value))
    }
}

fn count_tests(plan: &Plan, tables: &PlanTables) -> usize {
    match &plan.kind {
        PlanKind::Test {
            on_success,
            on_failure,
            ..
        } => 1 + count_tests(on_success, tables) + count_tests(on_failure, tables),
        PlanKind::Let { body, .. } => count_tests(body, tables),
        PlanKind::Labelled { label, body } => {
            let entry = tables
                .label_body(*label)
                .map_or(0, |entry| count_tests(entry, tables));
            entry + count_tests(body, tables)
        }
        PlanKind::Call { .. } | PlanKind::Code(_) => 0,
    }
}

#[test]
fn duplicate_test_in_success_branch_collapses_to_its_true_arm() {
    let mut f = Fixture::new();
    let v = f.var();
    let inner_succ = f.leaf(1);
    let inner_fail = f.leaf(2);
    let inner = f.eq_test(v, 0, inner_succ, inner_fail);
    let outer_fail = f.leaf(3);
    let plan = f.eq_test(v, 0, inner, outer_fail);

    let out = run(plan, &mut f.cx());
    let PlanKind::Test {
        on_success,
        on_failure,
        ..
    } = &out.kind
    else {
        panic!("expected outer Test, got {out:?}");
    };
    // The nested identical test is gone: its true arm was taken directly.
    assert_eq!(on_success.kind, PlanKind::Code(Expr::int(1)));
    assert_eq!(on_failure.kind, PlanKind::Code(Expr::int(3)));
}

#[test]
fn duplicate_test_in_failure_branch_collapses_to_its_false_arm() {
    let mut f = Fixture::new();
    let v = f.var();
    let inner_succ = f.leaf(1);
    let inner_fail = f.leaf(2);
    let inner = f.eq_test(v, 0, inner_succ, inner_fail);
    let outer_succ = f.leaf(3);
    let plan = f.eq_test(v, 0, outer_succ, inner);

    let out = run(plan, &mut f.cx());
    let PlanKind::Test { on_failure, .. } = &out.kind else {
        panic!("expected outer Test, got {out:?}");
    };
    assert_eq!(on_failure.kind, PlanKind::Code(Expr::int(2)));
}

#[test]
fn aliases_share_knowledge() {
    let mut f = Fixture::new();
    let root = f.var();
    let alias = f.var();
    f.tables.define_var(alias, Expr::var(root));

    let inner_succ = f.leaf(1);
    let inner_fail = f.leaf(2);
    let inner = f.eq_test(alias, 0, inner_succ, inner_fail);
    let aliased = f.tables.let_plan(alias, inner);
    let outer_fail = f.leaf(3);
    let plan = f.eq_test(root, 0, aliased, outer_fail);

    let out = run(plan, &mut f.cx());
    // Test on the alias collapses under knowledge about the root.
    assert_eq!(count_tests(&out, &f.tables), 1);
}

#[test]
fn guards_are_never_deduplicated() {
    let mut f = Fixture::new();
    let cond = Expr::Global(Name::from_raw(1));
    let inner_succ = f.leaf(1);
    let inner_fail = f.leaf(2);
    let inner = f
        .tables
        .test(Test::Guard, cond.clone(), Span::DUMMY, inner_succ, inner_fail);
    let outer_fail = f.leaf(3);
    let plan = f
        .tables
        .test(Test::Guard, cond, Span::DUMMY, inner, outer_fail);

    let out = run(plan, &mut f.cx());
    assert_eq!(count_tests(&out, &f.tables), 2);
}

#[test]
fn call_chains_compress() {
    let mut f = Fixture::new();
    let inner = f.syms.fresh_label();
    let outer = f.syms.fresh_label();
    let leaf = f.leaf(9);
    f.tables.define_label(inner, leaf);
    let forwarder = f.tables.call(inner);
    f.tables.define_label(outer, forwarder);

    // Labelled(inner, Labelled(outer, Call(outer))) — the call should land
    // on `inner` directly.
    let call = f.tables.call(outer);
    let outer_node = f.tables.labelled(outer, call);
    let plan = f.tables.labelled(inner, outer_node);

    let out = run(plan, &mut f.cx());
    let PlanKind::Labelled { body, .. } = &out.kind else {
        panic!("expected Labelled, got {out:?}");
    };
    let PlanKind::Labelled { body, .. } = &body.kind else {
        panic!("expected inner Labelled, got {body:?}");
    };
    let PlanKind::Call { label, .. } = &body.kind else {
        panic!("expected Call, got {body:?}");
    };
    assert_eq!(*label, inner);
}

#[test]
fn call_resolution_follows_known_tests() {
    let mut f = Fixture::new();
    let v = f.var();
    let target = f.syms.fresh_label();
    let hop = f.syms.fresh_label();

    let leaf = f.leaf(9);
    f.tables.define_label(target, leaf);

    // hop's body: if v == 0 then Call(target) else Code — under a caller
    // that knows v == 0 the call resolves through the test.
    let call_target = f.tables.call(target);
    let other = f.leaf(8);
    let hop_body = f.eq_test(v, 0, call_target, other);
    f.tables.define_label(hop, hop_body);

    let call_hop = f.tables.call(hop);
    let fallthrough = f.leaf(7);
    let tested = f.eq_test(v, 0, call_hop, fallthrough);
    let hop_node = f.tables.labelled(hop, tested);
    let plan = f.tables.labelled(target, hop_node);

    let out = run(plan, &mut f.cx());
    // Find the call in the success branch of the test.
    let PlanKind::Labelled { body, .. } = &out.kind else {
        panic!("expected Labelled, got {out:?}");
    };
    let PlanKind::Labelled { body, .. } = &body.kind else {
        panic!("expected hop Labelled, got {body:?}");
    };
    let PlanKind::Test { on_success, .. } = &body.kind else {
        panic!("expected Test, got {body:?}");
    };
    let PlanKind::Call { label, .. } = &on_success.kind else {
        panic!("expected Call, got {on_success:?}");
    };
    assert_eq!(*label, target);
}

#[test]
fn label_body_uses_only_intersected_knowledge() {
    let mut f = Fixture::new();
    let v = f.var();
    let shared = f.syms.fresh_label();

    // shared's body re-tests v == 0.
    let body_succ = f.leaf(1);
    let body_fail = f.leaf(2);
    let shared_body = f.eq_test(v, 0, body_succ, body_fail);
    f.tables.define_label(shared, shared_body);

    // One caller knows v == 0 (success branch), the other knows nothing
    // useful (it calls from the failure branch of an unrelated test).
    let call_a = f.tables.call(shared);
    let call_b = f.tables.call(shared);
    let cont = f.eq_test(v, 0, call_a, call_b);
    let plan = f.tables.labelled(shared, cont);

    let out = run(plan, &mut f.cx());
    // The intersection is empty for the v == 0 fact (one caller knows it
    // true, the other false), so the body's test must survive.
    let entry = f
        .tables
        .label_body(shared)
        .unwrap_or_else(|| panic!("missing label body"));
    assert!(matches!(entry.kind, PlanKind::Test { .. }));
    drop(out);
}

#[test]
fn label_body_collapses_under_unanimous_knowledge() {
    let mut f = Fixture::new();
    let v = f.var();
    let shared = f.syms.fresh_label();

    let body_succ = f.leaf(1);
    let body_fail = f.leaf(2);
    let shared_body = f.eq_test(v, 0, body_succ, body_fail);
    f.tables.define_label(shared, shared_body);

    // Both call sites sit in the success branch of a v == 0 test.
    let call_a = f.tables.call(shared);
    let call_b = f.tables.call(shared);
    let cond = Expr::Global(Name::from_raw(1));
    let merged = f
        .tables
        .test(Test::Guard, cond, Span::DUMMY, call_a, call_b);
    let outer_fail = f.leaf(3);
    let cont = f.eq_test(v, 0, merged, outer_fail);
    let plan = f.tables.labelled(shared, cont);

    run(plan, &mut f.cx());
    let entry = f
        .tables
        .label_body(shared)
        .unwrap_or_else(|| panic!("missing label body"));
    // Every caller knows v == 0, so the body's re-test collapsed.
    assert_eq!(entry.kind, PlanKind::Code(Expr::int(1)));
}

#[test]
fn fused_extractor_liveness_deduplicates() {
    let mut f = Fixture::new();
    let scrut = f.var();
    let call = Expr::Call {
        fun: Box::new(Expr::Global(Name::from_raw(5))),
        args: vec![Expr::var(scrut)],
    };

    let r1 = f.var();
    let r2 = f.var();
    f.tables.define_var(r1, call.clone());
    f.tables.define_var(r2, call);

    // let r1 = ex(s); if r1.nonEmpty then { let r2 = ex(s); if r2.nonEmpty
    // then A else B } else C — the inner liveness check is the same
    // observable unit and collapses to A.
    let a = f.leaf(1);
    let b = f.leaf(2);
    let inner_test = f
        .tables
        .test(Test::NonEmpty, Expr::var(r2), Span::DUMMY, a, b);
    let inner = f.tables.let_plan(r2, inner_test);
    let c = f.leaf(3);
    let outer_test = f
        .tables
        .test(Test::NonEmpty, Expr::var(r1), Span::DUMMY, inner, c);
    let plan = f.tables.let_plan(r1, outer_test);

    let out = run(plan, &mut f.cx());
    assert_eq!(count_tests(&out, &f.tables), 1);
    // The second binding survives (merging is pass 4's job); only its
    // redundant liveness test is gone.
    let PlanKind::Let { body, .. } = &out.kind else {
        panic!("expected Let, got {out:?}");
    };
    let PlanKind::Test { on_success, .. } = &body.kind else {
        panic!("expected Test, got {body:?}");
    };
    let PlanKind::Let { var, body } = &on_success.kind else {
        panic!("expected inner Let, got {on_success:?}");
    };
    assert_eq!(*var, r2);
    assert_eq!(body.kind, PlanKind::Code(Expr::int(1)));
}

#[test]
fn no_opportunity_returns_plan_unchanged() {
    let mut f = Fixture::new();
    let v = f.var();
    let succ = f.leaf(1);
    let fail = f.leaf(2);
    let plan = f.eq_test(v, 0, succ, fail);
    let before = plan.clone();
    let out = run(plan, &mut f.cx());
    assert_eq!(out, before);
}
