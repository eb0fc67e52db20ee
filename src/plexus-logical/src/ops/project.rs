//! Projections and per-row extensions.

use plexus_core::AttrId;

use crate::{NodeId, Operand};

/// One output column of a projection: `expr AS name`.
#[derive(Debug, Clone)]
pub struct ProjectedAttr {
    /// Value of the column.
    pub expr: Operand,
    /// Output name.
    pub name: AttrId,
}

impl ProjectedAttr {
    /// Create `expr AS name`.
    pub fn new(expr: impl Into<Operand>, name: AttrId) -> Self {
        Self {
            expr: expr.into(),
            name,
        }
    }

    /// Pass an attribute through under its own name.
    pub fn keep(id: AttrId) -> Self {
        Self {
            expr: Operand::Attr(id.clone()),
            name: id,
        }
    }

    /// Whether the column just renames (or keeps) an attribute.
    pub fn source_attr(&self) -> Option<&AttrId> {
        self.expr.as_attr()
    }
}

/// Computes a new row from each input row.
#[derive(Debug, Clone)]
pub struct Projection {
    /// Output columns in order.
    pub attrs: Vec<ProjectedAttr>,
    /// Input rows.
    pub source: NodeId,
}

impl Projection {
    /// Column producing `name`.
    pub fn attr(&self, name: &AttrId) -> Option<&ProjectedAttr> {
        self.attrs.iter().find(|a| &a.name == name)
    }
}

/// Dependent join: for each row of `source`, evaluates `mapping` in the
/// context of that row and concatenates every produced row to it.
///
/// With `outer` set, a source row whose mapping yields nothing is kept once,
/// padded with nulls.
#[derive(Debug, Clone)]
pub struct ProjectionConcat {
    /// Correlated subplan.
    pub mapping: NodeId,
    /// Keep unmatched source rows.
    pub outer: bool,
    /// Driving rows.
    pub source: NodeId,
}

/// Appends the row position as a new column.
#[derive(Debug, Clone)]
pub struct ProjectionIndex {
    /// Name of the position column.
    pub name: AttrId,
    /// Input rows.
    pub source: NodeId,
}
