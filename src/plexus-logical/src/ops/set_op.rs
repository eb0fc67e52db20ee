//! Set operators.

use crate::NodeId;

/// Operands of `Union`, `Intersection` and `Difference`.
///
/// Both sides produce rows with the same attribute names; the output uses
/// the left side's.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetOp {
    /// Left input.
    pub left: NodeId,
    /// Right input.
    pub right: NodeId,
    /// Set semantics instead of bag semantics.
    pub distinct: bool,
}
