//! Quantified subquery predicates.

use std::fmt;

use crate::NodeId;

/// `ANY` or `ALL`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QuantifierKind {
    /// True if some produced item is true.
    Any,
    /// True if every produced item is true.
    All,
}

impl fmt::Display for QuantifierKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Any => write!(f, "any"),
            Self::All => write!(f, "all"),
        }
    }
}

/// A boolean scalar over the items of a subquery.
#[derive(Debug, Clone)]
pub struct Quantifier {
    /// Quantifier.
    pub kind: QuantifierKind,
    /// Item-producing subquery.
    pub query: NodeId,
}
