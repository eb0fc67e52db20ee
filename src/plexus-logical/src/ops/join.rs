//! Binary row combinations.

use crate::{NodeId, Operand};

/// Every pairing of a left row with a right row.
#[derive(Debug, Clone)]
pub struct CartesianProduct {
    /// Left input.
    pub left: NodeId,
    /// Right input.
    pub right: NodeId,
}

/// Pairings satisfying every condition.
#[derive(Debug, Clone)]
pub struct Join {
    /// Left input.
    pub left: NodeId,
    /// Right input.
    pub right: NodeId,
    /// Conjunctive join conditions over the concatenated row.
    pub conditions: Vec<Operand>,
    /// Keep unmatched left rows.
    pub left_outer: bool,
    /// Keep unmatched right rows.
    pub right_outer: bool,
}

impl Join {
    /// Whether either side is preserved.
    pub fn is_outer(&self) -> bool {
        self.left_outer || self.right_outer
    }
}
