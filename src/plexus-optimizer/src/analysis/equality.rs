//! Structural equality of plan fragments.

use plexus_logical::expr::AstExpr;
use plexus_logical::ops::{Order, ProjectedAttr};
use plexus_logical::{NodeId, Operand, Plan, PlanOp};

/// Compares subtrees, possibly from two different plans.
///
/// Equality is structural: same operator kinds, same scalar fields and
/// pairwise equal children in order. The one exception is the identity
/// wrapper a front end may put around an attribute: `x` and `id(x)` are
/// equal in either direction.
#[derive(Debug, Default, Clone, Copy)]
pub struct EqualityChecker;

impl EqualityChecker {
    pub fn new() -> Self {
        Self
    }

    /// Whether node `a` of `pa` equals node `b` of `pb`.
    pub fn eq(&self, pa: &Plan, a: NodeId, pb: &Plan, b: NodeId) -> bool {
        use PlanOp::*;

        let attrs_eq = |x: &[ProjectedAttr], y: &[ProjectedAttr]| {
            x.len() == y.len()
                && x.iter()
                    .zip(y)
                    .all(|(p, q)| p.name == q.name && self.eq_operand(pa, &p.expr, pb, &q.expr))
        };
        let operands_eq = |x: &[Operand], y: &[Operand]| {
            x.len() == y.len()
                && x.iter()
                    .zip(y)
                    .all(|(p, q)| self.eq_operand(pa, p, pb, q))
        };
        let opt_eq = |x: &Option<Operand>, y: &Option<Operand>| match (x, y) {
            (Some(p), Some(q)) => self.eq_operand(pa, p, pb, q),
            (None, None) => true,
            _ => false,
        };
        let orders_eq = |x: &[Order], y: &[Order]| {
            x.len() == y.len()
                && x.iter().zip(y).all(|(p, q)| {
                    p.ascending == q.ascending
                        && p.nulls_first == q.nulls_first
                        && self.eq_operand(pa, &p.key, pb, &q.key)
                })
        };
        let node = |x: NodeId, y: NodeId| self.eq(pa, x, pb, y);
        let schema = || match (pa.try_schema(a), pb.try_schema(b)) {
            (Some(x), Some(y)) => x.attrs() == y.attrs(),
            (None, None) => true,
            _ => false,
        };

        match (pa.op(a), pb.op(b)) {
            (TupleSource(x), TupleSource(y)) => x.name == y.name && schema(),
            (ItemSource(x), ItemSource(y)) => x.name == y.name,
            (NullSource, NullSource) => true,
            (TupleFnSource(x), TupleFnSource(y)) => {
                x.func == y.func && operands_eq(&x.args, &y.args) && schema()
            }
            (ItemFnSource(x), ItemFnSource(y)) => x.func == y.func && operands_eq(&x.args, &y.args),
            (IndexScan(x), IndexScan(y)) => {
                x.name == y.name
                    && x.index == y.index
                    && self.eq_operand(pa, &x.access, pb, &y.access)
                    && schema()
            }
            (Selection(x), Selection(y)) => {
                self.eq_operand(pa, &x.condition, pb, &y.condition) && node(x.source, y.source)
            }
            (Projection(x), Projection(y)) => attrs_eq(&x.attrs, &y.attrs) && node(x.source, y.source),
            (ProjectionConcat(x), ProjectionConcat(y)) => {
                x.outer == y.outer && node(x.mapping, y.mapping) && node(x.source, y.source)
            }
            (ProjectionIndex(x), ProjectionIndex(y)) => x.name == y.name && node(x.source, y.source),
            (MapToItem(x), MapToItem(y)) => {
                self.eq_operand(pa, &x.key, pb, &y.key) && node(x.source, y.source)
            }
            (MapFromItem(x), MapFromItem(y)) => x.key == y.key && node(x.source, y.source),
            (CartesianProduct(x), CartesianProduct(y)) => node(x.left, y.left) && node(x.right, y.right),
            (Join(x), Join(y)) => {
                x.left_outer == y.left_outer
                    && x.right_outer == y.right_outer
                    && operands_eq(&x.conditions, &y.conditions)
                    && node(x.left, y.left)
                    && node(x.right, y.right)
            }
            (OrderBy(x), OrderBy(y)) => orders_eq(&x.orders, &y.orders) && node(x.source, y.source),
            (GroupBy(x), GroupBy(y)) => {
                attrs_eq(&x.keys, &y.keys)
                    && x.aggregates.len() == y.aggregates.len()
                    && x.aggregates.iter().zip(&y.aggregates).all(|(p, q)| {
                        p.func == q.func && p.name == q.name && operands_eq(&p.args, &q.args)
                    })
                    && node(x.source, y.source)
            }
            (Limit(x), Limit(y)) => x.skip == y.skip && x.limit == y.limit && node(x.source, y.source),
            (Union(x), Union(y)) | (Intersection(x), Intersection(y)) | (Difference(x), Difference(y)) => {
                x.distinct == y.distinct && node(x.left, y.left) && node(x.right, y.right)
            }
            (Distinct(x), Distinct(y)) => {
                let attrs = match (&x.attrs, &y.attrs) {
                    (Some(p), Some(q)) => operands_eq(p, q),
                    (None, None) => true,
                    _ => false,
                };
                attrs && node(x.source, y.source)
            }
            (Recursion(x), Recursion(y)) => {
                x.min == y.min
                    && x.max == y.max
                    && opt_eq(&x.condition, &y.condition)
                    && node(x.source, y.source)
            }
            (IndexedRecursion(x), IndexedRecursion(y)) => {
                x.min == y.min
                    && x.max == y.max
                    && node(x.mapping, y.mapping)
                    && node(x.source, y.source)
            }
            (BidirectionalRecursion(x), BidirectionalRecursion(y)) => {
                x.min == y.min
                    && x.max == y.max
                    && node(x.mapping, y.mapping)
                    && node(x.target, y.target)
                    && node(x.source, y.source)
            }
            (Quantifier(x), Quantifier(y)) => x.kind == y.kind && node(x.query, y.query),
            (Calculation(x), Calculation(y)) => {
                if x.literal != y.literal || x.args.len() != y.args.len() {
                    return false;
                }
                match (&x.original, &y.original) {
                    (Some(p), Some(q)) => self.ast_eq(pa, p, pb, q),
                    _ => x.func == y.func && operands_eq(&x.args, &y.args),
                }
            }
            (FnCall(x), FnCall(y)) => x.func == y.func && operands_eq(&x.args, &y.args),
            (Literal(x), Literal(y)) => x.value == y.value,
            (Conditional(x), Conditional(y)) => {
                x.whens.len() == y.whens.len()
                    && x.whens.iter().zip(&y.whens).all(|((c1, r1), (c2, r2))| {
                        self.eq_operand(pa, c1, pb, c2) && self.eq_operand(pa, r1, pb, r2)
                    })
                    && opt_eq(&x.default, &y.default)
            }
            _ => false,
        }
    }

    /// Whether two operands are equal, honouring the identity wrapper.
    pub fn eq_operand(&self, pa: &Plan, a: &Operand, pb: &Plan, b: &Operand) -> bool {
        match (a, b) {
            (Operand::Attr(x), Operand::Attr(y)) => x == y,
            (Operand::Node(x), Operand::Node(y)) => self.eq(pa, *x, pb, *y),
            (Operand::Attr(_), Operand::Node(n)) => {
                unwrap_identity(pb, *n).is_some_and(|inner| self.eq_operand(pa, a, pb, inner))
            }
            (Operand::Node(n), Operand::Attr(_)) => {
                unwrap_identity(pa, *n).is_some_and(|inner| self.eq_operand(pa, inner, pb, b))
            }
        }
    }

    fn ast_eq(&self, pa: &Plan, a: &AstExpr, pb: &Plan, b: &AstExpr) -> bool {
        match (a, b) {
            (AstExpr::Attr(x), AstExpr::Attr(y)) => x == y,
            (AstExpr::Literal(x), AstExpr::Literal(y)) => x == y,
            (AstExpr::Plan(x), AstExpr::Plan(y)) => self.eq(pa, *x, pb, *y),
            (AstExpr::Call { func: f, args: x }, AstExpr::Call { func: g, args: y }) if f == g => {
                x.len() == y.len() && x.iter().zip(y).all(|(p, q)| self.ast_eq(pa, p, pb, q))
            }
            (AstExpr::Cond { whens: w1, default: d1 }, AstExpr::Cond { whens: w2, default: d2 }) => {
                w1.len() == w2.len()
                    && w1.iter().zip(w2).all(|((c1, r1), (c2, r2))| {
                        self.ast_eq(pa, c1, pb, c2) && self.ast_eq(pa, r1, pb, r2)
                    })
                    && match (d1, d2) {
                        (Some(p), Some(q)) => self.ast_eq(pa, p, pb, q),
                        (None, None) => true,
                        _ => false,
                    }
            }
            (AstExpr::Call { func, args }, AstExpr::Attr(_)) if func.is_identity() && args.len() == 1 => {
                self.ast_eq(pa, &args[0], pb, b)
            }
            (AstExpr::Attr(_), AstExpr::Call { func, args }) if func.is_identity() && args.len() == 1 => {
                self.ast_eq(pa, a, pb, &args[0])
            }
            _ => false,
        }
    }
}

fn unwrap_identity(plan: &Plan, id: NodeId) -> Option<&Operand> {
    match plan.op(id) {
        PlanOp::FnCall(call) => call.identity_of(),
        _ => None,
    }
}
