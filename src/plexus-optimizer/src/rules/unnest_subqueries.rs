//! Scalar subquery unnesting.

use common_error::{PlexusError, PlexusResult};
use log::debug;
use plexus_logical::expr::{AstExpr, Calculation};
use plexus_logical::{NodeId, OpKind, Operand, Plan, PlanOp};

use super::rule::{PatternRule, RuleContext};
use super::support::{fresh_column, keep_all, source_of};

/// Evaluates scalar subqueries once per row through a dependent join.
///
/// A subquery argument of a calculation or function call qualifies when
/// the expression is guaranteed to evaluate it, it is consumed as one
/// value, and it yields items or single-column rows. The expression must
/// sit, through guaranteed expression arguments only, in the condition of
/// a selection or an attribute of a projection. Each qualifying subquery
/// becomes a `ProjectionConcat` under that operator, exposing its value as
/// a fresh column the expression reads instead. Selections are re-projected
/// to their original schema.
///
/// One instance fires on calculations and another on function calls.
pub struct UnnestSubqueries {
    operator: OpKind,
}

pub struct UnnestBindings {
    owner: NodeId,
    candidates: Vec<(usize, NodeId)>,
}

impl UnnestSubqueries {
    /// The instance rewriting subqueries inside calculations.
    pub fn calculations() -> Self {
        Self {
            operator: OpKind::Calculation,
        }
    }

    /// The instance rewriting subqueries inside function calls.
    pub fn fn_calls() -> Self {
        Self {
            operator: OpKind::FnCall,
        }
    }
}

/// Argument positions of `id` guaranteed to be evaluated as single values.
fn guaranteed_args(plan: &Plan, id: NodeId) -> Vec<(usize, &Operand)> {
    match plan.op(id) {
        PlanOp::Calculation(calc) => calc
            .args
            .iter()
            .enumerate()
            .filter(|(i, _)| calc.meta(*i).is_guaranteed() && !calc.meta(*i).accepts_sequence)
            .collect(),
        PlanOp::FnCall(call) if !call.func.accepts_sequence() => call
            .args
            .iter()
            .enumerate()
            .filter(|(i, _)| *i == 0 || !call.func.is_short_circuit())
            .collect(),
        _ => Vec::new(),
    }
}

/// The selection or projection evaluating expression `id` on every row,
/// reached through guaranteed arguments only.
fn owner_of(plan: &Plan, id: NodeId) -> Option<NodeId> {
    let mut current = id;
    loop {
        let parent = plan.parent(current)?;
        match plan.op(parent) {
            PlanOp::Calculation(_) | PlanOp::FnCall(_) => {
                let arg = Operand::Node(current);
                if !guaranteed_args(plan, parent).iter().any(|(_, a)| **a == arg) {
                    return None;
                }
                current = parent;
            }
            PlanOp::Selection(sel) if sel.condition == Operand::Node(current) => {
                return Some(parent);
            }
            PlanOp::Projection(proj) if proj.attrs.iter().any(|a| a.expr == Operand::Node(current)) => {
                return Some(parent);
            }
            _ => return None,
        }
    }
}

fn yields_one_value(plan: &Plan, id: NodeId) -> bool {
    let kind = plan.kind(id);
    kind.produces_items()
        || (kind.produces_tuples() && plan.try_schema(id).is_some_and(|s| s.len() == 1))
}

/// A chain of row mappings over the empty row, already as cheap as a column.
fn is_trivial(plan: &Plan, id: NodeId) -> bool {
    match plan.op(id) {
        PlanOp::MapToItem(m) => is_trivial(plan, m.source),
        PlanOp::Projection(p) => is_trivial(plan, p.source),
        PlanOp::NullSource => true,
        _ => false,
    }
}

/// Whether the subquery yields at least one row whatever its inputs.
fn is_nonempty(plan: &Plan, id: NodeId) -> bool {
    match plan.op(id) {
        PlanOp::MapToItem(m) => is_nonempty(plan, m.source),
        PlanOp::Projection(p) => is_nonempty(plan, p.source),
        PlanOp::OrderBy(o) => is_nonempty(plan, o.source),
        PlanOp::ProjectionIndex(p) => is_nonempty(plan, p.source),
        PlanOp::Distinct(d) => is_nonempty(plan, d.source),
        PlanOp::GroupBy(g) => g.keys.is_empty(),
        PlanOp::NullSource => true,
        _ => false,
    }
}

impl PatternRule for UnnestSubqueries {
    type Bindings = UnnestBindings;

    fn name(&self) -> &'static str {
        "UnnestSubqueries"
    }

    fn description(&self) -> &'static str {
        "Evaluate scalar subqueries through dependent joins"
    }

    fn operator(&self) -> OpKind {
        self.operator
    }

    fn matches(&self, ctx: &RuleContext<'_>, node: NodeId) -> Option<UnnestBindings> {
        let plan = &*ctx.plan;
        if plan.kind(node) != self.operator {
            return None;
        }
        let candidates: Vec<(usize, NodeId)> = guaranteed_args(plan, node)
            .into_iter()
            .filter_map(|(i, arg)| Some((i, arg.as_node()?)))
            .filter(|&(_, sub)| yields_one_value(plan, sub) && !is_trivial(plan, sub))
            .collect();
        if candidates.is_empty() {
            return None;
        }
        let owner = owner_of(plan, node)?;
        Some(UnnestBindings { owner, candidates })
    }

    fn transform(
        &self,
        ctx: &mut RuleContext<'_>,
        node: NodeId,
        bindings: UnnestBindings,
    ) -> PlexusResult<NodeId> {
        let UnnestBindings { owner, candidates } = bindings;
        let lang = ctx.plan.lang(node);
        let visible = match ctx.plan.op(owner) {
            PlanOp::Selection(_) => Some(keep_all(ctx.plan, owner)),
            _ => None,
        };

        let mut columns = Vec::with_capacity(candidates.len());
        for &(_, sub) in &candidates {
            let col = fresh_column(ctx.plan);
            let outer = !is_nonempty(ctx.plan, sub);
            let single = match ctx.plan.try_schema(sub) {
                Some(schema) if !ctx.plan.kind(sub).produces_items() => {
                    Some(schema.attrs()[0].clone())
                }
                _ => None,
            };
            let current = source_of(ctx.plan, owner);

            let mut b = ctx.plan.builder(lang);
            let items = match single {
                Some(attr) => b.map_to_item(attr, sub),
                None => sub,
            };
            let wrapped = b.map_from_item(col.clone(), items);
            let concat = b.projection_concat(wrapped, outer, current);
            ctx.plan.replace_child(owner, current, concat);
            debug!("unnested subquery {sub} of {node} as {col}");
            columns.push(col);
        }

        match ctx.plan.op_mut(node) {
            PlanOp::Calculation(Calculation {
                original: Some(original),
                ..
            }) => {
                let mut ast = original.clone();
                for (&(_, sub), col) in candidates.iter().zip(&columns) {
                    ast.replace_plan(sub, &AstExpr::Attr(col.clone()));
                }
                let params = ctx.compilers.compile(lang, &ast)?;
                ctx.plan
                    .replace_op(node, PlanOp::Calculation(Calculation::from_params(params, Some(ast))));
            }
            PlanOp::Calculation(calc) => {
                for (&(i, _), col) in candidates.iter().zip(&columns) {
                    calc.args[i] = Operand::Attr(col.clone());
                    calc.dependencies.add(col.clone());
                }
            }
            PlanOp::FnCall(call) => {
                for (&(i, _), col) in candidates.iter().zip(&columns) {
                    call.args[i] = Operand::Attr(col.clone());
                }
            }
            op => {
                return Err(PlexusError::internal(format!(
                    "cannot unnest subqueries of {}",
                    op.name()
                )));
            }
        }
        ctx.deps.invalidate_upstream(ctx.plan, node);

        if let Some(visible) = visible {
            let parent = ctx.plan.parent(owner);
            let top = ctx.plan.builder(lang).projection(visible, owner);
            ctx.plan.replace_at(parent, owner, top);
        }
        Ok(node)
    }
}
