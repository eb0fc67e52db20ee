//! End-to-end tests driving the optimizer over whole plans.

use std::sync::Arc;

use common_config::PlexusConfig;
use common_error::PlexusResult;
use plexus_core::{AttrId, IdSet, RenameMap, Symbol};
use plexus_logical::expr::{AstExpr, Compilers, builtins};
use plexus_logical::ops::ProjectedAttr;
use plexus_logical::{Lang, NodeId, OpKind, Operand, Plan, PlanOp};
use plexus_optimizer::analysis::EqualityChecker;
use plexus_optimizer::*;
use proptest::prelude::*;

fn a(name: &str) -> AttrId {
    AttrId::parse(name)
}

fn calc(plan: &mut Plan, expr: AstExpr) -> NodeId {
    plan.builder(Lang::Sql).calculation(expr).unwrap()
}

fn binary(plan: &mut Plan, func: plexus_logical::expr::FnImpl, l: &str, r: AstExpr) -> NodeId {
    calc(plan, AstExpr::call(func, vec![AstExpr::attr(l), r]))
}

fn count_kind(plan: &Plan, root: NodeId, kind: OpKind) -> usize {
    plan.descendants(root)
        .into_iter()
        .filter(|&n| plan.kind(n) == kind)
        .count()
}

fn people_index(name: &str) -> Arc<dyn Index> {
    Arc::new(EqualityIndex::new(
        name,
        vec![a("p.id")],
        [a("p.id"), a("p.name")].into_iter().collect::<IdSet>(),
    ))
}

/// Where a generated condition reads from.
#[derive(Debug, Clone, Copy)]
enum Side {
    Left,
    Right,
    Both,
}

fn arb_sides() -> impl Strategy<Value = Vec<Side>> {
    prop::collection::vec(
        prop_oneof![Just(Side::Left), Just(Side::Right), Just(Side::Both)],
        1..6,
    )
}

proptest! {
    #[test]
    fn prop_pushdown_reaches_a_fixpoint(sides in arb_sides()) {
        let mut plan = Plan::new();
        let l = plan.builder(Lang::Sql).tuple_source("l", [a("l.a"), a("l.b")]);
        let r = plan.builder(Lang::Sql).tuple_source("r", [a("r.a")]);
        let mut top = plan.builder(Lang::Sql).cartesian_product(l, r);
        for (i, side) in sides.iter().enumerate() {
            let bound = AstExpr::lit(i as i64);
            let cond = match side {
                Side::Left => binary(&mut plan, builtins::gt(), "l.a", bound),
                Side::Right => binary(&mut plan, builtins::lt(), "r.a", bound),
                Side::Both => binary(&mut plan, builtins::eq(), "l.b", AstExpr::attr("r.a")),
            };
            top = plan.builder(Lang::Sql).selection(cond, top);
        }
        plan.set_root(top);
        let schema = plan.schema(top).clone();

        let first = optimize(&mut plan, vec![Box::new(PushdownSelections)]).unwrap();
        let root = first.root;
        plan.validate(root);
        prop_assert_eq!(plan.schema(root), &schema);
        prop_assert_eq!(count_kind(&plan, root, OpKind::Selection), sides.len());

        let mixed = sides.iter().any(|s| matches!(s, Side::Both));
        let expected_top = if mixed { OpKind::Selection } else { OpKind::CartesianProduct };
        prop_assert_eq!(plan.kind(root), expected_top);

        let again = optimize(&mut plan, vec![Box::new(PushdownSelections)]).unwrap();
        prop_assert_eq!(again.rules_applied, 0);
        prop_assert_eq!(again.root, root);
    }
}

#[test]
fn test_merge_never_duplicates_a_calculation() {
    let mut plan = Plan::new();
    let t = plan.builder(Lang::Sql).tuple_source("t", [a("t.a"), a("t.b")]);
    let sum = calc(
        &mut plan,
        AstExpr::call(builtins::add(), vec![AstExpr::attr("t.a"), AstExpr::attr("t.b")]),
    );
    let inner = plan.builder(Lang::Sql).projection(
        vec![ProjectedAttr::new(sum, a("s")), ProjectedAttr::keep(a("t.a"))],
        t,
    );
    let doubled = binary(&mut plan, builtins::add(), "s", AstExpr::attr("s"));
    let outer = plan.builder(Lang::Sql).projection(
        vec![ProjectedAttr::new(doubled, a("d")), ProjectedAttr::new(a("s"), a("again"))],
        inner,
    );
    plan.set_root(outer);

    let result = Optimizer::default().optimize(&mut plan).unwrap();
    let root = result.root;
    plan.validate(root);
    assert_eq!(plan.schema(root).to_string(), "[d, again]");

    let calcs: Vec<NodeId> = plan
        .descendants(root)
        .into_iter()
        .filter(|&n| plan.kind(n) == OpKind::Calculation)
        .collect();
    let eq = EqualityChecker::new();
    for (i, &x) in calcs.iter().enumerate() {
        for &y in &calcs[i + 1..] {
            assert!(!eq.eq(&plan, x, &plan, y), "calculation evaluated twice");
        }
    }
    // The dead `t.a` column is gone from the inner projection.
    let PlanOp::Projection(top) = plan.op(root) else {
        panic!("expected a projection");
    };
    assert_eq!(plan.schema(top.source).to_string(), "[s]");
}

#[test]
fn test_stacked_projections_collapse() {
    let mut plan = Plan::new();
    let t = plan.builder(Lang::Sql).tuple_source("t", [a("t.a"), a("t.b")]);
    let p1 = plan.builder(Lang::Sql).projection(
        vec![ProjectedAttr::new(a("t.a"), a("x")), ProjectedAttr::new(a("t.b"), a("y"))],
        t,
    );
    let p2 = plan
        .builder(Lang::Sql)
        .projection(vec![ProjectedAttr::new(a("y"), a("z")), ProjectedAttr::keep(a("x"))], p1);
    let inc = binary(&mut plan, builtins::add(), "z", AstExpr::lit(1i64));
    let p3 = plan
        .builder(Lang::Sql)
        .projection(vec![ProjectedAttr::new(inc, a("w")), ProjectedAttr::keep(a("x"))], p2);
    plan.set_root(p3);

    let result = Optimizer::default().optimize(&mut plan).unwrap();
    let root = result.root;
    assert_eq!(count_kind(&plan, root, OpKind::Projection), 1);
    assert_eq!(plan.schema(root).to_string(), "[w, x]");
    let PlanOp::Projection(proj) = plan.op(root) else {
        panic!("expected a projection");
    };
    assert_eq!(proj.source, t);
    assert_eq!(proj.attrs[1].expr, Operand::Attr(a("t.a")));
    let PlanOp::Calculation(c) = plan.op(proj.attrs[0].expr.as_node().unwrap()) else {
        panic!("expected a calculation");
    };
    assert_eq!(c.original.as_ref().unwrap().to_string(), "(t.b + 1)");
}

#[test]
fn test_join_indices_round_trip() {
    let mut plan = Plan::new();
    let orders = plan.builder(Lang::Sql).tuple_source("o", [a("o.c")]);
    let people = plan.builder(Lang::Sql).tuple_source("p", [a("p.id"), a("p.name")]);
    let cond = binary(&mut plan, builtins::eq(), "p.id", AstExpr::attr("o.c"));
    let join = plan
        .builder(Lang::Sql)
        .join(orders, people, vec![cond.into()], false, false);
    plan.set_root(join);

    let mut indices = IndexRegistry::new();
    indices.register("p", people_index("p_by_id"));
    let optimizer = Optimizer::new(vec![Box::new(JoinIndices)]).with_indices(indices);
    let result = optimizer.optimize(&mut plan).unwrap();
    assert_eq!(result.rules_applied, 1);

    let ext_c = a("o.c").prefixed(Symbol::Unique(0));
    let mut expected = Plan::new();
    let eo = expected.builder(Lang::Sql).tuple_source("o", [a("o.c")]);
    let ep = expected.builder(Lang::Sql).tuple_source("p", [a("p.id"), a("p.name")]);
    let econd = binary(&mut expected, builtins::eq(), "p.id", AstExpr::Attr(ext_c.clone()));
    let mut b = expected.builder(Lang::Sql);
    let renamed = b.projection(vec![ProjectedAttr::new(a("o.c"), ext_c.clone())], eo);
    let mapping = b.selection(econd, ep);
    let concat = b.projection_concat(mapping, false, renamed);
    let top = b.projection(
        vec![
            ProjectedAttr::new(ext_c, a("o.c")),
            ProjectedAttr::keep(a("p.id")),
            ProjectedAttr::keep(a("p.name")),
        ],
        concat,
    );

    assert!(EqualityChecker::new().eq(&plan, result.root, &expected, top));
}

#[test]
fn test_indexed_join_ends_in_index_scan() {
    let mut plan = Plan::new();
    let orders = plan.builder(Lang::Sql).tuple_source("o", [a("o.c")]);
    let people = plan.builder(Lang::Sql).tuple_source("p", [a("p.id"), a("p.name")]);
    let cond = binary(&mut plan, builtins::eq(), "o.c", AstExpr::attr("p.id"));
    let join = plan
        .builder(Lang::Sql)
        .join(orders, people, vec![cond.into()], true, false);
    plan.set_root(join);

    let mut indices = IndexRegistry::new();
    indices.register("p", people_index("p_by_id"));
    let optimizer = Optimizer::default().with_indices(indices);
    let result = optimizer.optimize(&mut plan).unwrap();
    let root = result.root;
    plan.validate(root);

    assert_eq!(plan.schema(root).to_string(), "[o.c, p.id, p.name]");
    assert_eq!(count_kind(&plan, root, OpKind::Join), 0);
    assert_eq!(count_kind(&plan, root, OpKind::IndexScan), 1);
    let concat = plan
        .descendants(root)
        .into_iter()
        .find(|&n| plan.kind(n) == OpKind::ProjectionConcat)
        .unwrap();
    let PlanOp::ProjectionConcat(pc) = plan.op(concat) else {
        unreachable!()
    };
    // The preserved side of the left join drives the lookup.
    assert!(pc.outer);
}

#[test]
fn test_unnesting_skips_short_circuit_operands() {
    let mut plan = Plan::new();
    let t = plan.builder(Lang::Sql).tuple_source("t", [a("t.ok")]);
    let u = plan.builder(Lang::Sql).tuple_source("u", [a("u.ok")]);
    let sub = plan.builder(Lang::Sql).map_to_item(a("u.ok"), u);
    let either = calc(
        &mut plan,
        AstExpr::call(builtins::or(), vec![AstExpr::attr("t.ok"), AstExpr::Plan(sub)]),
    );
    let sel = plan.builder(Lang::Sql).selection(either, t);
    plan.set_root(sel);
    let before = plan.explain(sel);

    let rules: Vec<Box<dyn OptimizationRule>> = vec![
        Box::new(UnnestSubqueries::calculations()),
        Box::new(UnnestSubqueries::fn_calls()),
    ];
    let result = optimize(&mut plan, rules).unwrap();
    assert_eq!(result.rules_applied, 0);
    assert_eq!(plan.explain(result.root), before);
}

#[test]
fn test_unnesting_keeps_visible_schema() {
    let mut plan = Plan::new();
    let t = plan.builder(Lang::Sql).tuple_source("t", [a("t.a"), a("t.b")]);
    let u = plan.builder(Lang::Sql).tuple_source("u", [a("u.k"), a("u.v")]);
    let matching = binary(&mut plan, builtins::eq(), "u.k", AstExpr::attr("t.b"));
    let filtered = plan.builder(Lang::Sql).selection(matching, u);
    let sub = plan.builder(Lang::Sql).map_to_item(a("u.v"), filtered);
    let cmp = calc(
        &mut plan,
        AstExpr::call(builtins::gt(), vec![AstExpr::attr("t.a"), AstExpr::Plan(sub)]),
    );
    let sel = plan.builder(Lang::Sql).selection(cmp, t);
    plan.set_root(sel);

    let result = Optimizer::default().optimize(&mut plan).unwrap();
    let root = result.root;
    plan.validate(root);
    assert_eq!(plan.schema(root).to_string(), "[t.a, t.b]");
    assert_eq!(count_kind(&plan, root, OpKind::ProjectionConcat), 1);
    assert!(
        plan.descendants(root)
            .into_iter()
            .filter_map(|n| match plan.op(n) {
                PlanOp::Calculation(c) => c.original.clone(),
                _ => None,
            })
            .all(|ast| ast.plans().is_empty())
    );
}

#[test]
fn test_first_matching_index_wins() {
    let mut plan = Plan::new();
    let people = plan.builder(Lang::Sql).tuple_source("p", [a("p.id"), a("p.name")]);
    let cond = binary(&mut plan, builtins::eq(), "p.id", AstExpr::lit(42i64));
    let sel = plan.builder(Lang::Sql).selection(cond, people);
    plan.set_root(sel);

    let mut indices = IndexRegistry::new();
    for name in ["first", "second", "third"] {
        indices.register("p", people_index(name));
    }
    let optimizer = Optimizer::new(vec![Box::new(IndexScans)]).with_indices(indices);
    let result = optimizer.optimize(&mut plan).unwrap();

    let PlanOp::IndexScan(scan) = plan.op(result.root) else {
        panic!("expected an index scan");
    };
    assert_eq!(scan.index, "first");
    assert_eq!(scan.name, "p");
    let PlanOp::Calculation(access) = plan.op(scan.access.as_node().unwrap()) else {
        panic!("expected a calculation");
    };
    assert_eq!(access.original, Some(AstExpr::lit(42i64)));
}

/// Serves only the second candidate it is offered.
struct SecondOnly;

impl Index for SecondOnly {
    fn name(&self) -> &str {
        "second_only"
    }

    fn matches(
        &self,
        _plan: &Plan,
        candidates: &[Operand],
        _renames: Option<&RenameMap>,
    ) -> Option<Vec<usize>> {
        (candidates.len() > 1).then(|| vec![1])
    }

    fn create_accessor(
        &self,
        plan: &mut Plan,
        _compilers: &Compilers,
        lang: Lang,
        _exprs: &[Operand],
    ) -> PlexusResult<Operand> {
        Ok(Operand::Node(plan.builder(lang).literal(true)))
    }
}

#[test]
fn test_unserved_selection_is_reapplied_above_scan() {
    let mut plan = Plan::new();
    let source = plan.builder(Lang::Sql).tuple_source("test", [a("test.source")]);
    let bar = calc(&mut plan, AstExpr::call(builtins::not(), vec![AstExpr::attr("test.source")]));
    let foo = calc(&mut plan, AstExpr::call(builtins::identity(), vec![AstExpr::attr("test.source")]));
    let s_bar = plan.builder(Lang::Sql).selection(bar, source);
    let s_foo = plan.builder(Lang::Sql).selection(foo, s_bar);
    plan.set_root(s_foo);

    let mut indices = IndexRegistry::new();
    indices.register("test", Arc::new(SecondOnly));
    let optimizer = Optimizer::new(vec![Box::new(IndexScans)]).with_indices(indices);
    let result = optimizer.optimize(&mut plan).unwrap();
    let root = result.root;
    plan.validate(root);

    let PlanOp::Selection(top) = plan.op(root) else {
        panic!("expected a selection");
    };
    assert_eq!(top.condition, Operand::Node(foo));
    let PlanOp::IndexScan(scan) = plan.op(top.source) else {
        panic!("expected an index scan");
    };
    assert_eq!(scan.name, "test");
    assert_eq!(scan.index, "second_only");
    assert_eq!(result.rules_applied, 1);
}

#[test]
fn test_optimizer_from_json_config() {
    let config = PlexusConfig::from_json(
        r#"{"optimizer": {"rules": ["PushdownSelections"], "max_passes": 1, "enable_trace": true}}"#,
    )
    .unwrap();
    let optimizer =
        Optimizer::from_config(&config.optimizer, IndexRegistry::new(), Compilers::default());
    assert_eq!(optimizer.rule_names(), ["PushdownSelections"]);

    let mut plan = Plan::new();
    let t = plan.builder(Lang::Sql).tuple_source("t", [a("t.a")]);
    let ordered = plan
        .builder(Lang::Sql)
        .order_by(vec![plexus_logical::ops::Order::desc(a("t.a"))], t);
    let cond = binary(&mut plan, builtins::gt(), "t.a", AstExpr::lit(0i64));
    let sel = plan.builder(Lang::Sql).selection(cond, ordered);
    plan.set_root(sel);

    let result = optimizer.optimize(&mut plan).unwrap();
    assert_eq!(result.passes, 1);
    assert_eq!(result.root, ordered);
    assert_eq!(result.trace.len(), 1);
    assert!(result.format_trace().starts_with("Optimization completed in 1 passes, 1 rules applied"));
}
