//! Integration tests for plan construction and surgery.

use plexus_core::{AttrId, Value};
use plexus_logical::expr::{AstExpr, builtins};
use plexus_logical::ops::ProjectedAttr;
use plexus_logical::{Lang, NodeId, OpKind, Operand, Plan, PlanOp};
use proptest::prelude::*;

fn a(name: &str) -> AttrId {
    AttrId::parse(name)
}

fn gt(plan: &mut Plan, attr: &str, bound: i64) -> NodeId {
    plan.builder(Lang::Sql)
        .calculation(AstExpr::call(
            builtins::gt(),
            vec![AstExpr::attr(attr), AstExpr::lit(bound)],
        ))
        .unwrap()
}

#[test]
fn test_builder_links_children_to_parents() {
    let mut plan = Plan::new();
    let t = plan.builder(Lang::Sql).tuple_source("t", [a("t.a"), a("t.b")]);
    let cond = gt(&mut plan, "t.a", 3);
    let sel = plan.builder(Lang::Sql).selection(cond, t);
    let proj = plan
        .builder(Lang::Sql)
        .projection(vec![ProjectedAttr::new(a("t.b"), a("b"))], sel);
    plan.set_root(proj);

    assert_eq!(plan.parent(t), Some(sel));
    assert_eq!(plan.parent(cond), Some(sel));
    assert_eq!(plan.parent(sel), Some(proj));
    assert_eq!(plan.parent(proj), None);
    assert_eq!(plan.ancestors(t), vec![sel, proj]);
    assert_eq!(plan.descendants(proj), vec![proj, sel, t, cond]);
    assert_eq!(plan.schema(sel).to_string(), "[t.a, t.b]");
    assert_eq!(plan.schema(proj).to_string(), "[b]");
    plan.validate(proj);
}

#[test]
fn test_replace_child_detaches_the_old_node() {
    let mut plan = Plan::new();
    let t = plan.builder(Lang::Sql).tuple_source("t", [a("t.a")]);
    let cond = gt(&mut plan, "t.a", 0);
    let sel = plan.builder(Lang::Sql).selection(cond, t);
    let distinct = plan.builder(Lang::Sql).distinct(None, sel);
    plan.set_root(distinct);

    let u = plan.builder(Lang::Sql).tuple_source("u", [a("t.a")]);
    plan.replace_child(sel, t, u);

    assert_eq!(plan.parent(u), Some(sel));
    assert_eq!(plan.parent(t), None);
    let PlanOp::Selection(s) = plan.op(sel) else {
        panic!("expected a selection");
    };
    assert_eq!(s.source, u);
    plan.validate(distinct);
    assert_eq!(plan.collect_garbage(), 1);
    assert!(!plan.contains(t));
}

#[test]
fn test_replacing_the_root() {
    let mut plan = Plan::new();
    let t = plan.builder(Lang::Sql).tuple_source("t", [a("t.a")]);
    plan.set_root(t);
    let limit = plan.builder(Lang::Sql).limit(0, Some(1), t);

    plan.replace_at(None, t, limit);
    assert_eq!(plan.root(), Some(limit));
    assert_eq!(plan.parent(t), Some(limit));
    plan.validate(limit);
}

#[test]
fn test_nested_plan_references_follow_a_swap() {
    let mut plan = Plan::new();
    let u = plan.builder(Lang::Sql).tuple_source("u", [a("u.x")]);
    let sub = plan.builder(Lang::Sql).map_to_item(a("u.x"), u);
    let calc = plan
        .builder(Lang::Sql)
        .calculation(AstExpr::call(builtins::exists(), vec![AstExpr::Plan(sub)]))
        .unwrap();
    assert_eq!(plan.parent(sub), Some(calc));

    let replacement = plan.clone_subtree(sub);
    assert_eq!(plan.parent(replacement), None);
    assert_eq!(plan.kind(replacement), OpKind::MapToItem);
    assert_ne!(plan.op(replacement).children(), plan.op(sub).children());

    plan.replace_child(calc, sub, replacement);
    let PlanOp::Calculation(c) = plan.op(calc) else {
        panic!("expected a calculation");
    };
    assert_eq!(c.args, vec![Operand::Node(replacement)]);
    assert_eq!(c.original.as_ref().unwrap().plans(), vec![replacement]);
    assert_eq!(plan.parent(replacement), Some(calc));
}

#[test]
fn test_replace_op_relinks_children() {
    let mut plan = Plan::new();
    let t = plan.builder(Lang::Sql).tuple_source("t", [a("t.a"), a("t.b")]);
    let proj = plan
        .builder(Lang::Sql)
        .projection(vec![ProjectedAttr::keep(a("t.a"))], t);
    plan.set_root(proj);
    let other = plan.builder(Lang::Sql).tuple_source("s", [a("s.a")]);

    let old = plan.replace_op(
        proj,
        PlanOp::Projection(plexus_logical::ops::Projection {
            attrs: vec![ProjectedAttr::keep(a("s.a"))],
            source: other,
        }),
    );
    assert_eq!(old.children(), vec![t]);
    assert_eq!(plan.parent(t), None);
    assert_eq!(plan.parent(other), Some(proj));
    assert_eq!(plan.schema(proj).to_string(), "[s.a]");
    plan.validate(proj);
}

#[test]
fn test_fresh_symbols_are_predicted() {
    let mut plan = Plan::new();
    let next = plan.peek_symbol();
    assert_eq!(plan.fresh_symbol(), next);
    assert_ne!(plan.fresh_symbol(), next);
}

#[test]
fn test_compiled_arguments_in_order_of_first_use() {
    let mut plan = Plan::new();
    let expr = AstExpr::call(
        builtins::or(),
        vec![
            AstExpr::call(builtins::gt(), vec![AstExpr::attr("t.b"), AstExpr::attr("t.a")]),
            AstExpr::call(builtins::lt(), vec![AstExpr::attr("t.b"), AstExpr::attr("t.c")]),
        ],
    );
    let calc = plan.builder(Lang::Sql).calculation(expr).unwrap();
    let PlanOp::Calculation(c) = plan.op(calc) else {
        panic!("expected a calculation");
    };

    assert_eq!(
        c.args,
        vec![
            Operand::Attr(a("t.b")),
            Operand::Attr(a("t.a")),
            Operand::Attr(a("t.c"))
        ]
    );
    assert_eq!(c.meta(0).uses, 2);
    assert!(c.meta(0).is_guaranteed());
    assert!(c.meta(1).is_guaranteed());
    assert!(!c.meta(2).is_guaranteed());
    assert!(!c.literal);
    assert_eq!(c.dependencies.len(), 3);

    let yes = c
        .func
        .call(&[Value::Int64(2), Value::Int64(1), Value::Int64(0)]);
    assert_eq!(yes, Value::Bool(true));
    let no = c
        .func
        .call(&[Value::Int64(2), Value::Int64(5), Value::Int64(0)]);
    assert_eq!(no, Value::Bool(false));
}

#[test]
fn test_constant_expressions_are_literal() {
    let mut plan = Plan::new();
    let calc = plan
        .builder(Lang::Sql)
        .calculation(AstExpr::call(
            builtins::add(),
            vec![AstExpr::lit(1i64), AstExpr::lit(2i64)],
        ))
        .unwrap();
    let PlanOp::Calculation(c) = plan.op(calc) else {
        panic!("expected a calculation");
    };
    assert!(c.literal);
    assert!(c.args.is_empty());
    assert_eq!(c.func.call(&[]), Value::Int64(3));
}

proptest! {
    #[test]
    fn prop_selection_chain_keeps_source_schema(bounds in prop::collection::vec(-5i64..5, 0..8)) {
        let mut plan = Plan::new();
        let t = plan.builder(Lang::Sql).tuple_source("t", [a("t.a"), a("t.b")]);
        let mut top = t;
        for bound in &bounds {
            let cond = gt(&mut plan, "t.a", *bound);
            top = plan.builder(Lang::Sql).selection(cond, top);
        }
        plan.set_root(top);
        plan.validate(top);

        prop_assert_eq!(plan.schema(top), plan.schema(t));
        prop_assert_eq!(plan.descendants(top).len(), 1 + 2 * bounds.len());
        prop_assert_eq!(plan.ancestors(t).len(), bounds.len());
        prop_assert_eq!(plan.collect_garbage(), 0);
    }

    #[test]
    fn prop_garbage_is_what_the_root_cannot_reach(depth in 1usize..6) {
        let mut plan = Plan::new();
        let t = plan.builder(Lang::Sql).tuple_source("t", [a("t.a")]);
        let mut top = t;
        for _ in 0..depth {
            top = plan.builder(Lang::Sql).limit(0, Some(10), top);
        }
        plan.set_root(top);

        // Re-rooting at the source strands every limit above it.
        plan.replace_at(None, top, t);
        prop_assert_eq!(plan.root(), Some(t));
        prop_assert_eq!(plan.collect_garbage(), depth);
        prop_assert_eq!(plan.len(), 1);
    }
}
