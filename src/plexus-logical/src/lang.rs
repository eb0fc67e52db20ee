//! Source-language tags carried by every plan node.

use std::fmt;

use serde::{Deserialize, Serialize};

/// The front end a plan node was built by.
///
/// Language-specific collaborators (expression compilers in particular) are
/// chosen by this tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum Lang {
    /// SQL-like relational queries.
    #[default]
    Sql,
    /// Graph pattern queries.
    Cypher,
    /// Tree/XML path queries.
    XQuery,
}

impl fmt::Display for Lang {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sql => write!(f, "sql"),
            Self::Cypher => write!(f, "cypher"),
            Self::XQuery => write!(f, "xquery"),
        }
    }
}
