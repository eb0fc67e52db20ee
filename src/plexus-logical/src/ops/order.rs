//! Ordering, grouping and row-count operators.

use plexus_core::AttrId;

use super::ProjectedAttr;
use crate::expr::FnImpl;
use crate::{NodeId, Operand};

/// One sort key.
#[derive(Debug, Clone)]
pub struct Order {
    /// Key expression.
    pub key: Operand,
    /// Ascending order.
    pub ascending: bool,
    /// Nulls sort before everything else.
    pub nulls_first: bool,
}

impl Order {
    /// Ascending, nulls last.
    pub fn asc(key: impl Into<Operand>) -> Self {
        Self {
            key: key.into(),
            ascending: true,
            nulls_first: false,
        }
    }

    /// Descending, nulls first.
    pub fn desc(key: impl Into<Operand>) -> Self {
        Self {
            key: key.into(),
            ascending: false,
            nulls_first: true,
        }
    }
}

/// Sorts rows.
#[derive(Debug, Clone)]
pub struct OrderBy {
    /// Keys, most significant first.
    pub orders: Vec<Order>,
    /// Input rows.
    pub source: NodeId,
}

/// Aggregate function applied per group.
#[derive(Debug, Clone)]
pub struct AggregateCall {
    /// Aggregate implementation, applied to the collected argument values.
    pub func: FnImpl,
    /// Per-row arguments.
    pub args: Vec<Operand>,
    /// Output column.
    pub name: AttrId,
}

/// Groups rows by key columns and aggregates each group.
#[derive(Debug, Clone)]
pub struct GroupBy {
    /// Grouping columns; none means a single group.
    pub keys: Vec<ProjectedAttr>,
    /// Aggregates.
    pub aggregates: Vec<AggregateCall>,
    /// Input rows.
    pub source: NodeId,
}

/// Skips and truncates rows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Limit {
    /// Rows to skip.
    pub skip: usize,
    /// Rows to keep after skipping; unbounded when `None`.
    pub limit: Option<usize>,
    /// Input rows.
    pub source: NodeId,
}

/// Removes duplicate rows.
#[derive(Debug, Clone)]
pub struct Distinct {
    /// Columns compared; the whole row when `None`.
    pub attrs: Option<Vec<Operand>>,
    /// Input rows.
    pub source: NodeId,
}
