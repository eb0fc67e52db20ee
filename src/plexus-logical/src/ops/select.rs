//! Row filtering.

use crate::{NodeId, Operand};

/// Keeps the rows of `source` for which `condition` is true.
///
/// Shares its schema with `source`.
#[derive(Debug, Clone)]
pub struct Selection {
    /// Predicate evaluated per row.
    pub condition: Operand,
    /// Input rows.
    pub source: NodeId,
}
