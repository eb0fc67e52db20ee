//! Fixpoint operators used by path queries.

use crate::{NodeId, Operand};

/// Repeats `source` on its own output between `min` and `max` times.
#[derive(Debug, Clone)]
pub struct Recursion {
    /// Minimum depth.
    pub min: usize,
    /// Maximum depth; unbounded when `None`.
    pub max: Option<usize>,
    /// Continue while this holds for the current row.
    pub condition: Option<Operand>,
    /// Seed rows.
    pub source: NodeId,
}

/// Recursion whose step is a correlated subplan evaluated per frontier row.
#[derive(Debug, Clone)]
pub struct IndexedRecursion {
    /// Minimum depth.
    pub min: usize,
    /// Maximum depth; unbounded when `None`.
    pub max: Option<usize>,
    /// Step, evaluated in the context of a frontier row.
    pub mapping: NodeId,
    /// Seed rows.
    pub source: NodeId,
}

/// Recursion expanding from both ends until the frontiers meet.
#[derive(Debug, Clone)]
pub struct BidirectionalRecursion {
    /// Minimum depth.
    pub min: usize,
    /// Maximum depth; unbounded when `None`.
    pub max: Option<usize>,
    /// Forward step.
    pub mapping: NodeId,
    /// Rows the backward search starts from.
    pub target: NodeId,
    /// Seed rows.
    pub source: NodeId,
}
