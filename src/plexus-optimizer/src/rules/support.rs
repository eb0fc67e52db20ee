//! Plan walking helpers shared by the rules.

use plexus_core::AttrId;
use plexus_logical::ops::ProjectedAttr;
use plexus_logical::{Lang, NodeId, OpKind, Operand, Plan, PlanOp};

/// Whether `id` is the topmost node of a run of selections.
pub(crate) fn is_run_top(plan: &Plan, id: NodeId) -> bool {
    plan.parent(id)
        .is_none_or(|p| plan.kind(p) != OpKind::Selection)
}

/// The consecutive selections starting at `top`, top to bottom.
pub(crate) fn selection_run(plan: &Plan, top: NodeId) -> Vec<NodeId> {
    let mut run = Vec::new();
    let mut current = top;
    while let PlanOp::Selection(sel) = plan.op(current) {
        run.push(current);
        current = sel.source;
    }
    run
}

/// The condition of a selection.
pub(crate) fn condition(plan: &Plan, sel: NodeId) -> Operand {
    match plan.op(sel) {
        PlanOp::Selection(sel) => sel.condition.clone(),
        op => panic!("{} is not a selection", op.name()),
    }
}

/// The single source of a unary operator.
pub(crate) fn source_of(plan: &Plan, id: NodeId) -> NodeId {
    plan.op(id)
        .source()
        .unwrap_or_else(|| panic!("{} {id} has no single source", plan.op(id).name()))
}

/// Stack a selection per condition over `source`; the first condition ends
/// up on top. Returns the new top, or `source` when there is nothing to add.
pub(crate) fn stack_selections(
    plan: &mut Plan,
    lang: Lang,
    conditions: Vec<Operand>,
    source: NodeId,
) -> NodeId {
    let mut b = plan.builder(lang);
    conditions
        .into_iter()
        .rev()
        .fold(source, |below, cond| b.selection(cond, below))
}

/// `SELECT id AS id, ...` for every attribute of `id`'s schema.
pub(crate) fn keep_all(plan: &Plan, id: NodeId) -> Vec<ProjectedAttr> {
    plan.schema(id).iter().cloned().map(ProjectedAttr::keep).collect()
}

/// The source name behind a chain of row-preserving operators, for sources
/// an index can be registered on.
pub(crate) fn indexed_source_name(plan: &Plan, id: NodeId) -> Option<&str> {
    let mut current = id;
    loop {
        match plan.op(current) {
            PlanOp::Projection(p) => current = p.source,
            PlanOp::Selection(s) => current = s.source,
            PlanOp::OrderBy(o) => current = o.source,
            _ => return source_name(plan, current),
        }
    }
}

/// The name of `id` when it is a named source: a `TupleSource`, or a
/// `MapFromItem` directly over an `ItemSource`.
pub(crate) fn source_name(plan: &Plan, id: NodeId) -> Option<&str> {
    match plan.op(id) {
        PlanOp::TupleSource(t) => Some(&t.name),
        PlanOp::MapFromItem(m) => match plan.op(m.source) {
            PlanOp::ItemSource(s) => Some(&s.name),
            _ => None,
        },
        _ => None,
    }
}

/// A one-part attribute named by a fresh symbol.
pub(crate) fn fresh_column(plan: &mut Plan) -> AttrId {
    AttrId::name(plan.fresh_symbol())
}
