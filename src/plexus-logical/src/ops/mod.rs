//! Plan operators.
//!
//! Every node of a [`Plan`](crate::Plan) holds one [`PlanOp`]. Its children
//! fall into three groups, which the analyses treat differently:
//!
//! - *sources*: the rows (or items) the operator draws from; their schemas
//!   form the operator's local row context
//! - *dependents*: correlated subplans evaluated once per source row
//! - *operands*: horizontal expressions evaluated in the local row context

mod item;
mod join;
mod order;
mod project;
mod quantifier;
mod recursion;
mod select;
mod set_op;
mod source;

use std::fmt;

pub use item::{MapFromItem, MapToItem};
pub use join::{CartesianProduct, Join};
pub use order::{AggregateCall, Distinct, GroupBy, Limit, Order, OrderBy};
pub use project::{ProjectedAttr, Projection, ProjectionConcat, ProjectionIndex};
pub use quantifier::{Quantifier, QuantifierKind};
pub use recursion::{BidirectionalRecursion, IndexedRecursion, Recursion};
pub use select::Selection;
pub use set_op::SetOp;
pub use source::{FnSource, IndexScan, ItemSource, TupleSource};

use crate::expr::{Calculation, Conditional, FnCall, Literal};
use crate::{NodeId, Operand};

/// A plan operator.
#[derive(Debug, Clone)]
pub enum PlanOp {
    /// Named relation.
    TupleSource(TupleSource),
    /// Named item collection.
    ItemSource(ItemSource),
    /// A single empty row.
    NullSource,
    /// Rows produced by a function.
    TupleFnSource(FnSource),
    /// Items produced by a function.
    ItemFnSource(FnSource),
    /// Index-backed tuple source.
    IndexScan(IndexScan),
    /// Row filter.
    Selection(Selection),
    /// Row computation.
    Projection(Projection),
    /// Dependent join.
    ProjectionConcat(ProjectionConcat),
    /// Row numbering.
    ProjectionIndex(ProjectionIndex),
    /// Rows to items.
    MapToItem(MapToItem),
    /// Items to rows.
    MapFromItem(MapFromItem),
    /// Cross product.
    CartesianProduct(CartesianProduct),
    /// Conditional join.
    Join(Join),
    /// Sort.
    OrderBy(OrderBy),
    /// Grouping and aggregation.
    GroupBy(GroupBy),
    /// Skip / limit.
    Limit(Limit),
    /// Set union.
    Union(SetOp),
    /// Set intersection.
    Intersection(SetOp),
    /// Set difference.
    Difference(SetOp),
    /// Duplicate elimination.
    Distinct(Distinct),
    /// Fixpoint over a source.
    Recursion(Recursion),
    /// Fixpoint with a correlated step.
    IndexedRecursion(IndexedRecursion),
    /// Two-ended fixpoint.
    BidirectionalRecursion(BidirectionalRecursion),
    /// `ANY` / `ALL` over a subquery.
    Quantifier(Quantifier),
    /// Compiled scalar expression.
    Calculation(Calculation),
    /// Function call.
    FnCall(FnCall),
    /// Constant.
    Literal(Literal),
    /// `CASE` expression.
    Conditional(Conditional),
}

/// Tag of a [`PlanOp`] variant, used to dispatch rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OpKind {
    TupleSource,
    ItemSource,
    NullSource,
    TupleFnSource,
    ItemFnSource,
    IndexScan,
    Selection,
    Projection,
    ProjectionConcat,
    ProjectionIndex,
    MapToItem,
    MapFromItem,
    CartesianProduct,
    Join,
    OrderBy,
    GroupBy,
    Limit,
    Union,
    Intersection,
    Difference,
    Distinct,
    Recursion,
    IndexedRecursion,
    BidirectionalRecursion,
    Quantifier,
    Calculation,
    FnCall,
    Literal,
    Conditional,
}

impl OpKind {
    /// Operator name.
    pub fn name(self) -> &'static str {
        match self {
            Self::TupleSource => "TupleSource",
            Self::ItemSource => "ItemSource",
            Self::NullSource => "NullSource",
            Self::TupleFnSource => "TupleFnSource",
            Self::ItemFnSource => "ItemFnSource",
            Self::IndexScan => "IndexScan",
            Self::Selection => "Selection",
            Self::Projection => "Projection",
            Self::ProjectionConcat => "ProjectionConcat",
            Self::ProjectionIndex => "ProjectionIndex",
            Self::MapToItem => "MapToItem",
            Self::MapFromItem => "MapFromItem",
            Self::CartesianProduct => "CartesianProduct",
            Self::Join => "Join",
            Self::OrderBy => "OrderBy",
            Self::GroupBy => "GroupBy",
            Self::Limit => "Limit",
            Self::Union => "Union",
            Self::Intersection => "Intersection",
            Self::Difference => "Difference",
            Self::Distinct => "Distinct",
            Self::Recursion => "Recursion",
            Self::IndexedRecursion => "IndexedRecursion",
            Self::BidirectionalRecursion => "BidirectionalRecursion",
            Self::Quantifier => "Quantifier",
            Self::Calculation => "Calculation",
            Self::FnCall => "FnCall",
            Self::Literal => "Literal",
            Self::Conditional => "Conditional",
        }
    }

    /// Whether nodes of this kind are scalar expressions.
    pub fn is_expression(self) -> bool {
        matches!(
            self,
            Self::Calculation | Self::FnCall | Self::Literal | Self::Conditional | Self::Quantifier
        )
    }

    /// Whether nodes of this kind produce items rather than rows.
    pub fn produces_items(self) -> bool {
        matches!(self, Self::ItemSource | Self::ItemFnSource | Self::MapToItem)
    }

    /// Whether nodes of this kind produce rows with a schema.
    pub fn produces_tuples(self) -> bool {
        !self.is_expression() && !self.produces_items()
    }
}

impl fmt::Display for OpKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Children of an operator, grouped by role.
#[derive(Debug, Default)]
pub struct OpParts<'a> {
    /// Row or item inputs.
    pub sources: Vec<NodeId>,
    /// Correlated subplans evaluated per source row.
    pub dependents: Vec<NodeId>,
    /// Horizontal expressions.
    pub operands: Vec<&'a Operand>,
}

#[derive(Default)]
pub(crate) struct OpPartsMut<'a> {
    pub(crate) sources: Vec<&'a mut NodeId>,
    pub(crate) dependents: Vec<&'a mut NodeId>,
    pub(crate) operands: Vec<&'a mut Operand>,
}

impl PlanOp {
    /// Tag of this operator.
    pub fn kind(&self) -> OpKind {
        match self {
            Self::TupleSource(_) => OpKind::TupleSource,
            Self::ItemSource(_) => OpKind::ItemSource,
            Self::NullSource => OpKind::NullSource,
            Self::TupleFnSource(_) => OpKind::TupleFnSource,
            Self::ItemFnSource(_) => OpKind::ItemFnSource,
            Self::IndexScan(_) => OpKind::IndexScan,
            Self::Selection(_) => OpKind::Selection,
            Self::Projection(_) => OpKind::Projection,
            Self::ProjectionConcat(_) => OpKind::ProjectionConcat,
            Self::ProjectionIndex(_) => OpKind::ProjectionIndex,
            Self::MapToItem(_) => OpKind::MapToItem,
            Self::MapFromItem(_) => OpKind::MapFromItem,
            Self::CartesianProduct(_) => OpKind::CartesianProduct,
            Self::Join(_) => OpKind::Join,
            Self::OrderBy(_) => OpKind::OrderBy,
            Self::GroupBy(_) => OpKind::GroupBy,
            Self::Limit(_) => OpKind::Limit,
            Self::Union(_) => OpKind::Union,
            Self::Intersection(_) => OpKind::Intersection,
            Self::Difference(_) => OpKind::Difference,
            Self::Distinct(_) => OpKind::Distinct,
            Self::Recursion(_) => OpKind::Recursion,
            Self::IndexedRecursion(_) => OpKind::IndexedRecursion,
            Self::BidirectionalRecursion(_) => OpKind::BidirectionalRecursion,
            Self::Quantifier(_) => OpKind::Quantifier,
            Self::Calculation(_) => OpKind::Calculation,
            Self::FnCall(_) => OpKind::FnCall,
            Self::Literal(_) => OpKind::Literal,
            Self::Conditional(_) => OpKind::Conditional,
        }
    }

    /// Operator name.
    pub fn name(&self) -> &'static str {
        self.kind().name()
    }

    /// Children grouped by role.
    pub fn parts(&self) -> OpParts<'_> {
        let mut parts = OpParts::default();
        match self {
            Self::TupleSource(_) | Self::ItemSource(_) | Self::NullSource | Self::Literal(_) => {}
            Self::TupleFnSource(op) | Self::ItemFnSource(op) => parts.operands.extend(&op.args),
            Self::IndexScan(op) => parts.operands.push(&op.access),
            Self::Selection(op) => {
                parts.sources.push(op.source);
                parts.operands.push(&op.condition);
            }
            Self::Projection(op) => {
                parts.sources.push(op.source);
                parts.operands.extend(op.attrs.iter().map(|a| &a.expr));
            }
            Self::ProjectionConcat(op) => {
                parts.sources.push(op.source);
                parts.dependents.push(op.mapping);
            }
            Self::ProjectionIndex(op) => parts.sources.push(op.source),
            Self::MapToItem(op) => {
                parts.sources.push(op.source);
                parts.operands.push(&op.key);
            }
            Self::MapFromItem(op) => parts.sources.push(op.source),
            Self::CartesianProduct(op) => parts.sources.extend([op.left, op.right]),
            Self::Join(op) => {
                parts.sources.extend([op.left, op.right]);
                parts.operands.extend(&op.conditions);
            }
            Self::OrderBy(op) => {
                parts.sources.push(op.source);
                parts.operands.extend(op.orders.iter().map(|o| &o.key));
            }
            Self::GroupBy(op) => {
                parts.sources.push(op.source);
                parts.operands.extend(op.keys.iter().map(|k| &k.expr));
                parts
                    .operands
                    .extend(op.aggregates.iter().flat_map(|a| a.args.iter()));
            }
            Self::Limit(op) => parts.sources.push(op.source),
            Self::Union(op) | Self::Intersection(op) | Self::Difference(op) => {
                parts.sources.extend([op.left, op.right]);
            }
            Self::Distinct(op) => {
                parts.sources.push(op.source);
                if let Some(attrs) = &op.attrs {
                    parts.operands.extend(attrs);
                }
            }
            Self::Recursion(op) => {
                parts.sources.push(op.source);
                parts.operands.extend(&op.condition);
            }
            Self::IndexedRecursion(op) => {
                parts.sources.push(op.source);
                parts.dependents.push(op.mapping);
            }
            Self::BidirectionalRecursion(op) => {
                parts.sources.push(op.source);
                parts.dependents.extend([op.mapping, op.target]);
            }
            Self::Quantifier(op) => parts.dependents.push(op.query),
            Self::Calculation(op) => parts.operands.extend(&op.args),
            Self::FnCall(op) => parts.operands.extend(&op.args),
            Self::Conditional(op) => {
                for (cond, result) in &op.whens {
                    parts.operands.extend([cond, result]);
                }
                parts.operands.extend(&op.default);
            }
        }
        parts
    }

    pub(crate) fn parts_mut(&mut self) -> OpPartsMut<'_> {
        let mut parts = OpPartsMut::default();
        match self {
            Self::TupleSource(_) | Self::ItemSource(_) | Self::NullSource | Self::Literal(_) => {}
            Self::TupleFnSource(op) | Self::ItemFnSource(op) => {
                parts.operands.extend(op.args.iter_mut());
            }
            Self::IndexScan(op) => parts.operands.push(&mut op.access),
            Self::Selection(op) => {
                parts.sources.push(&mut op.source);
                parts.operands.push(&mut op.condition);
            }
            Self::Projection(op) => {
                parts.sources.push(&mut op.source);
                parts.operands.extend(op.attrs.iter_mut().map(|a| &mut a.expr));
            }
            Self::ProjectionConcat(op) => {
                parts.sources.push(&mut op.source);
                parts.dependents.push(&mut op.mapping);
            }
            Self::ProjectionIndex(op) => parts.sources.push(&mut op.source),
            Self::MapToItem(op) => {
                parts.sources.push(&mut op.source);
                parts.operands.push(&mut op.key);
            }
            Self::MapFromItem(op) => parts.sources.push(&mut op.source),
            Self::CartesianProduct(op) => parts.sources.extend([&mut op.left, &mut op.right]),
            Self::Join(op) => {
                parts.sources.extend([&mut op.left, &mut op.right]);
                parts.operands.extend(op.conditions.iter_mut());
            }
            Self::OrderBy(op) => {
                parts.sources.push(&mut op.source);
                parts.operands.extend(op.orders.iter_mut().map(|o| &mut o.key));
            }
            Self::GroupBy(op) => {
                parts.sources.push(&mut op.source);
                parts.operands.extend(op.keys.iter_mut().map(|k| &mut k.expr));
                parts
                    .operands
                    .extend(op.aggregates.iter_mut().flat_map(|a| a.args.iter_mut()));
            }
            Self::Limit(op) => parts.sources.push(&mut op.source),
            Self::Union(op) | Self::Intersection(op) | Self::Difference(op) => {
                parts.sources.extend([&mut op.left, &mut op.right]);
            }
            Self::Distinct(op) => {
                parts.sources.push(&mut op.source);
                if let Some(attrs) = &mut op.attrs {
                    parts.operands.extend(attrs.iter_mut());
                }
            }
            Self::Recursion(op) => {
                parts.sources.push(&mut op.source);
                parts.operands.extend(op.condition.as_mut());
            }
            Self::IndexedRecursion(op) => {
                parts.sources.push(&mut op.source);
                parts.dependents.push(&mut op.mapping);
            }
            Self::BidirectionalRecursion(op) => {
                parts.sources.push(&mut op.source);
                parts.dependents.extend([&mut op.mapping, &mut op.target]);
            }
            Self::Quantifier(op) => parts.dependents.push(&mut op.query),
            Self::Calculation(op) => parts.operands.extend(op.args.iter_mut()),
            Self::FnCall(op) => parts.operands.extend(op.args.iter_mut()),
            Self::Conditional(op) => {
                for (cond, result) in &mut op.whens {
                    parts.operands.extend([cond, result]);
                }
                parts.operands.extend(op.default.as_mut());
            }
        }
        parts
    }

    /// Row or item inputs.
    pub fn sources(&self) -> Vec<NodeId> {
        self.parts().sources
    }

    /// The single input of a unary operator.
    pub fn source(&self) -> Option<NodeId> {
        match self.sources().as_slice() {
            [only] => Some(*only),
            _ => None,
        }
    }

    /// Horizontal expressions.
    pub fn operands(&self) -> Vec<&Operand> {
        self.parts().operands
    }

    /// Mutable horizontal expressions.
    pub fn operands_mut(&mut self) -> Vec<&mut Operand> {
        self.parts_mut().operands
    }

    /// Every child node: sources, then dependents, then operand nodes.
    pub fn children(&self) -> Vec<NodeId> {
        let parts = self.parts();
        let mut out = parts.sources;
        out.extend(parts.dependents);
        out.extend(parts.operands.into_iter().filter_map(Operand::as_node));
        out
    }

    pub(crate) fn child_slots_mut(&mut self) -> Vec<&mut NodeId> {
        let parts = self.parts_mut();
        let mut out = parts.sources;
        out.extend(parts.dependents);
        out.extend(parts.operands.into_iter().filter_map(|o| match o {
            Operand::Node(id) => Some(id),
            Operand::Attr(_) => None,
        }));
        out
    }
}
