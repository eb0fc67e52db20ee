//! Human-readable plan trees.

use common_display::{DisplayTree, TreeNode, truncate_string};

use crate::ops::PlanOp;
use crate::{NodeId, Operand, Plan};

/// Longer expression sources are cut in explain output.
const MAX_EXPR_WIDTH: usize = 80;

struct ExplainNode<'a> {
    plan: &'a Plan,
    id: NodeId,
}

fn operand(o: &Operand) -> String {
    match o {
        Operand::Attr(id) => id.to_string(),
        Operand::Node(id) => id.to_string(),
    }
}

fn join_operands<'o>(ops: impl IntoIterator<Item = &'o Operand>) -> String {
    ops.into_iter().map(operand).collect::<Vec<_>>().join(", ")
}

fn bounds(min: usize, max: Option<usize>) -> String {
    match max {
        Some(max) => format!("{min}..={max}"),
        None => format!("{min}.."),
    }
}

impl TreeNode for ExplainNode<'_> {
    fn name(&self) -> String {
        format!("{} {}", self.plan.op(self.id).name(), self.id)
    }

    fn children(&self) -> Vec<Box<dyn TreeNode + '_>> {
        self.plan
            .op(self.id)
            .children()
            .into_iter()
            .map(|id| {
                Box::new(ExplainNode {
                    plan: self.plan,
                    id,
                }) as Box<dyn TreeNode + '_>
            })
            .collect()
    }

    fn details(&self) -> Option<String> {
        let schema = || self.plan.schema(self.id).to_string();
        let details = match self.plan.op(self.id) {
            PlanOp::TupleSource(op) => format!("{} {}", op.name, schema()),
            PlanOp::ItemSource(op) => op.name.clone(),
            PlanOp::TupleFnSource(op) => format!("{} {}", op.func, schema()),
            PlanOp::ItemFnSource(op) => op.func.to_string(),
            PlanOp::IndexScan(op) => format!(
                "{} via {}, access={} {}",
                op.name,
                op.index,
                operand(&op.access),
                schema()
            ),
            PlanOp::Selection(op) => operand(&op.condition),
            PlanOp::Projection(op) => op
                .attrs
                .iter()
                .map(|a| match &a.expr {
                    Operand::Attr(id) if *id == a.name => id.to_string(),
                    expr => format!("{} AS {}", operand(expr), a.name),
                })
                .collect::<Vec<_>>()
                .join(", "),
            PlanOp::ProjectionConcat(op) if op.outer => "outer".to_string(),
            PlanOp::ProjectionIndex(op) => op.name.to_string(),
            PlanOp::MapToItem(op) => operand(&op.key),
            PlanOp::MapFromItem(op) => op.key.to_string(),
            PlanOp::Join(op) => {
                let mut s = join_operands(&op.conditions);
                if op.left_outer {
                    s.push_str(", left outer");
                }
                if op.right_outer {
                    s.push_str(", right outer");
                }
                s
            }
            PlanOp::OrderBy(op) => op
                .orders
                .iter()
                .map(|o| {
                    format!(
                        "{} {}{}",
                        operand(&o.key),
                        if o.ascending { "asc" } else { "desc" },
                        if o.nulls_first { " nulls first" } else { "" }
                    )
                })
                .collect::<Vec<_>>()
                .join(", "),
            PlanOp::GroupBy(op) => {
                let keys = op.keys.iter().map(|k| k.name.to_string());
                let aggs = op
                    .aggregates
                    .iter()
                    .map(|a| format!("{}({}) AS {}", a.func, join_operands(&a.args), a.name));
                keys.chain(aggs).collect::<Vec<_>>().join(", ")
            }
            PlanOp::Limit(op) => match op.limit {
                Some(limit) => format!("skip={}, limit={limit}", op.skip),
                None => format!("skip={}", op.skip),
            },
            PlanOp::Union(op) | PlanOp::Intersection(op) | PlanOp::Difference(op)
                if op.distinct =>
            {
                "distinct".to_string()
            }
            PlanOp::Distinct(op) => match &op.attrs {
                Some(attrs) => join_operands(attrs),
                None => return None,
            },
            PlanOp::Recursion(op) => bounds(op.min, op.max),
            PlanOp::IndexedRecursion(op) => bounds(op.min, op.max),
            PlanOp::BidirectionalRecursion(op) => bounds(op.min, op.max),
            PlanOp::Quantifier(op) => op.kind.to_string(),
            PlanOp::Calculation(op) => match &op.original {
                Some(original) => truncate_string(&original.to_string(), MAX_EXPR_WIDTH),
                None => format!("{}({})", op.func, join_operands(&op.args)),
            },
            PlanOp::FnCall(op) => format!("{}({})", op.func, join_operands(&op.args)),
            PlanOp::Literal(op) => op.value.to_string(),
            _ => return None,
        };
        Some(details)
    }
}

impl Plan {
    /// Render the subtree rooted at `id`.
    pub fn explain(&self, id: NodeId) -> String {
        DisplayTree::new(&ExplainNode { plan: self, id }).to_string()
    }
}

#[cfg(test)]
mod tests {
    use plexus_core::AttrId;

    use crate::ops::ProjectedAttr;
    use crate::{Lang, Plan};

    #[test]
    fn test_explain_shows_operators_and_details() {
        let mut plan = Plan::new();
        let mut b = plan.builder(Lang::Sql);
        let source = b.tuple_source("orders", [AttrId::parse("o.id"), AttrId::parse("o.total")]);
        let limit = b.limit(5, Some(10), source);
        let proj = b.projection(
            vec![ProjectedAttr::new(AttrId::parse("o.total"), AttrId::parse("total"))],
            limit,
        );

        let out = plan.explain(proj);
        assert!(out.starts_with("Projection"));
        assert!(out.contains("o.total AS total"));
        assert!(out.contains("skip=5, limit=10"));
        assert!(out.contains("orders [o.id, o.total]"));
    }
}
