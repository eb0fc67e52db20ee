//! Fluent node constructors.

use common_error::PlexusResult;
use plexus_core::{AttrId, Value};

use crate::expr::{
    AstCompiler, AstExpr, Calculation, CalculationParams, Conditional, ExpressionCompiler, FnCall,
    FnImpl, Literal,
};
use crate::ops::{
    AggregateCall, BidirectionalRecursion, CartesianProduct, Distinct, FnSource, GroupBy,
    IndexScan, IndexedRecursion, ItemSource, Join, Limit, MapFromItem, MapToItem, Order, OrderBy,
    PlanOp, ProjectedAttr, Projection, ProjectionConcat, ProjectionIndex, Quantifier,
    QuantifierKind, Recursion, Selection, SetOp, TupleSource,
};
use crate::{Lang, NodeId, Operand, Plan, Schema};

/// Adds nodes tagged with one language to a [`Plan`].
///
/// Every constructor adopts the children it is given and returns the id of
/// the new, detached node.
pub struct PlanBuilder<'a> {
    plan: &'a mut Plan,
    lang: Lang,
}

impl<'a> PlanBuilder<'a> {
    pub(crate) fn new(plan: &'a mut Plan, lang: Lang) -> Self {
        Self { plan, lang }
    }

    fn add(&mut self, op: PlanOp) -> NodeId {
        self.plan.add(self.lang, op)
    }

    /// A named relation with the given attributes.
    pub fn tuple_source(
        &mut self,
        name: impl Into<String>,
        attrs: impl IntoIterator<Item = AttrId>,
    ) -> NodeId {
        let op = PlanOp::TupleSource(TupleSource { name: name.into() });
        self.plan.add_with_schema(self.lang, op, Schema::new(attrs))
    }

    /// A named item collection.
    pub fn item_source(&mut self, name: impl Into<String>) -> NodeId {
        self.add(PlanOp::ItemSource(ItemSource { name: name.into() }))
    }

    /// One empty row.
    pub fn null_source(&mut self) -> NodeId {
        self.add(PlanOp::NullSource)
    }

    /// Rows produced by `func`.
    pub fn tuple_fn_source(
        &mut self,
        func: FnImpl,
        args: Vec<Operand>,
        attrs: impl IntoIterator<Item = AttrId>,
    ) -> NodeId {
        let op = PlanOp::TupleFnSource(FnSource { func, args });
        self.plan.add_with_schema(self.lang, op, Schema::new(attrs))
    }

    /// Items produced by `func`.
    pub fn item_fn_source(&mut self, func: FnImpl, args: Vec<Operand>) -> NodeId {
        self.add(PlanOp::ItemFnSource(FnSource { func, args }))
    }

    /// An index-backed scan of `name` producing `schema`.
    pub fn index_scan(
        &mut self,
        name: impl Into<String>,
        index: impl Into<String>,
        access: impl Into<Operand>,
        schema: Schema,
    ) -> NodeId {
        let op = PlanOp::IndexScan(IndexScan {
            name: name.into(),
            index: index.into(),
            access: access.into(),
        });
        self.plan.add_with_schema(self.lang, op, schema)
    }

    /// `source WHERE condition`.
    pub fn selection(&mut self, condition: impl Into<Operand>, source: NodeId) -> NodeId {
        self.add(PlanOp::Selection(Selection {
            condition: condition.into(),
            source,
        }))
    }

    /// `SELECT attrs FROM source`.
    pub fn projection(&mut self, attrs: Vec<ProjectedAttr>, source: NodeId) -> NodeId {
        self.add(PlanOp::Projection(Projection { attrs, source }))
    }

    /// Dependent join of `source` with `mapping`.
    pub fn projection_concat(&mut self, mapping: NodeId, outer: bool, source: NodeId) -> NodeId {
        self.add(PlanOp::ProjectionConcat(ProjectionConcat {
            mapping,
            outer,
            source,
        }))
    }

    /// Number the rows of `source` into column `name`.
    pub fn projection_index(&mut self, name: AttrId, source: NodeId) -> NodeId {
        self.add(PlanOp::ProjectionIndex(ProjectionIndex { name, source }))
    }

    /// Emit `key` of each row as an item.
    pub fn map_to_item(&mut self, key: impl Into<Operand>, source: NodeId) -> NodeId {
        self.add(PlanOp::MapToItem(MapToItem {
            key: key.into(),
            source,
        }))
    }

    /// Wrap each item into a row with column `key`.
    pub fn map_from_item(&mut self, key: AttrId, source: NodeId) -> NodeId {
        self.add(PlanOp::MapFromItem(MapFromItem { key, source }))
    }

    /// `left × right`.
    pub fn cartesian_product(&mut self, left: NodeId, right: NodeId) -> NodeId {
        self.add(PlanOp::CartesianProduct(CartesianProduct { left, right }))
    }

    /// `left JOIN right ON conditions`.
    pub fn join(
        &mut self,
        left: NodeId,
        right: NodeId,
        conditions: Vec<Operand>,
        left_outer: bool,
        right_outer: bool,
    ) -> NodeId {
        self.add(PlanOp::Join(Join {
            left,
            right,
            conditions,
            left_outer,
            right_outer,
        }))
    }

    /// `ORDER BY orders`.
    pub fn order_by(&mut self, orders: Vec<Order>, source: NodeId) -> NodeId {
        self.add(PlanOp::OrderBy(OrderBy { orders, source }))
    }

    /// `GROUP BY keys` with `aggregates`.
    pub fn group_by(
        &mut self,
        keys: Vec<ProjectedAttr>,
        aggregates: Vec<AggregateCall>,
        source: NodeId,
    ) -> NodeId {
        self.add(PlanOp::GroupBy(GroupBy {
            keys,
            aggregates,
            source,
        }))
    }

    /// `OFFSET skip LIMIT limit`.
    pub fn limit(&mut self, skip: usize, limit: Option<usize>, source: NodeId) -> NodeId {
        self.add(PlanOp::Limit(Limit {
            skip,
            limit,
            source,
        }))
    }

    /// `left UNION right`.
    pub fn union(&mut self, left: NodeId, right: NodeId, distinct: bool) -> NodeId {
        self.add(PlanOp::Union(SetOp {
            left,
            right,
            distinct,
        }))
    }

    /// `left INTERSECT right`.
    pub fn intersection(&mut self, left: NodeId, right: NodeId, distinct: bool) -> NodeId {
        self.add(PlanOp::Intersection(SetOp {
            left,
            right,
            distinct,
        }))
    }

    /// `left EXCEPT right`.
    pub fn difference(&mut self, left: NodeId, right: NodeId, distinct: bool) -> NodeId {
        self.add(PlanOp::Difference(SetOp {
            left,
            right,
            distinct,
        }))
    }

    /// `DISTINCT` over `attrs`, or whole rows.
    pub fn distinct(&mut self, attrs: Option<Vec<Operand>>, source: NodeId) -> NodeId {
        self.add(PlanOp::Distinct(Distinct { attrs, source }))
    }

    /// Repeat `source` between `min` and `max` times.
    pub fn recursion(
        &mut self,
        min: usize,
        max: Option<usize>,
        condition: Option<Operand>,
        source: NodeId,
    ) -> NodeId {
        self.add(PlanOp::Recursion(Recursion {
            min,
            max,
            condition,
            source,
        }))
    }

    /// Recursion with a correlated step.
    pub fn indexed_recursion(
        &mut self,
        min: usize,
        max: Option<usize>,
        mapping: NodeId,
        source: NodeId,
    ) -> NodeId {
        self.add(PlanOp::IndexedRecursion(IndexedRecursion {
            min,
            max,
            mapping,
            source,
        }))
    }

    /// Recursion from both ends.
    pub fn bidirectional_recursion(
        &mut self,
        min: usize,
        max: Option<usize>,
        mapping: NodeId,
        target: NodeId,
        source: NodeId,
    ) -> NodeId {
        self.add(PlanOp::BidirectionalRecursion(BidirectionalRecursion {
            min,
            max,
            mapping,
            target,
            source,
        }))
    }

    /// `ANY` / `ALL` over the items of `query`.
    pub fn quantifier(&mut self, kind: QuantifierKind, query: NodeId) -> NodeId {
        self.add(PlanOp::Quantifier(Quantifier { kind, query }))
    }

    /// Compile `expr` with the default compiler and add the calculation.
    pub fn calculation(&mut self, expr: AstExpr) -> PlexusResult<NodeId> {
        self.calculation_with(&AstCompiler, expr)
    }

    /// Compile `expr` with `compiler` and add the calculation.
    pub fn calculation_with(
        &mut self,
        compiler: &dyn ExpressionCompiler,
        expr: AstExpr,
    ) -> PlexusResult<NodeId> {
        let params = compiler.compile(&expr)?;
        Ok(self.calculation_from(params, Some(expr)))
    }

    /// Add an already compiled calculation.
    pub fn calculation_from(
        &mut self,
        params: CalculationParams,
        original: Option<AstExpr>,
    ) -> NodeId {
        self.add(PlanOp::Calculation(Calculation::from_params(params, original)))
    }

    /// `func(args)`.
    pub fn fn_call(&mut self, func: FnImpl, args: Vec<Operand>) -> NodeId {
        self.add(PlanOp::FnCall(FnCall { func, args }))
    }

    /// A constant.
    pub fn literal(&mut self, value: impl Into<Value>) -> NodeId {
        self.add(PlanOp::Literal(Literal {
            value: value.into(),
        }))
    }

    /// `CASE WHEN ... END`.
    pub fn conditional(&mut self, whens: Vec<(Operand, Operand)>, default: Option<Operand>) -> NodeId {
        self.add(PlanOp::Conditional(Conditional { whens, default }))
    }
}
