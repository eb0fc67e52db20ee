//! Qualified attribute identifiers.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Reserved, non-textual name parts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Symbol {
    /// All attributes of the qualifier preceding it (`t.*`), or of everything (`*`).
    All,
    /// The attribute set is not known yet and has to be inferred from the source.
    Infer,
    /// A plan-unique part, used to build namespaces no front end can spell.
    Unique(u64),
}

/// A single part of an attribute identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum IdPart {
    /// A textual name.
    Str(String),
    /// A positional name (tuple index, XML child position).
    Int(i64),
    /// A reserved symbol.
    Sym(Symbol),
}

impl IdPart {
    /// Check whether this part is the given symbol.
    pub fn is_symbol(&self, sym: Symbol) -> bool {
        matches!(self, Self::Sym(s) if *s == sym)
    }
}

impl From<&str> for IdPart {
    fn from(s: &str) -> Self {
        Self::Str(s.to_string())
    }
}

impl From<String> for IdPart {
    fn from(s: String) -> Self {
        Self::Str(s)
    }
}

impl From<i64> for IdPart {
    fn from(i: i64) -> Self {
        Self::Int(i)
    }
}

impl From<Symbol> for IdPart {
    fn from(sym: Symbol) -> Self {
        Self::Sym(sym)
    }
}

impl fmt::Display for IdPart {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Str(s) => write!(f, "{s}"),
            Self::Int(i) => write!(f, "{i}"),
            Self::Sym(Symbol::All) => write!(f, "*"),
            Self::Sym(Symbol::Infer) => write!(f, "?"),
            Self::Sym(Symbol::Unique(n)) => write!(f, "#{n}"),
        }
    }
}

/// Reference to an attribute: an ordered, immutable sequence of parts.
///
/// A one-part identifier is a plain variable or column name, a two-part
/// identifier is the usual `table.column` form. Equality is part-wise.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AttrId {
    parts: Vec<IdPart>,
}

impl AttrId {
    /// Create an identifier from its parts.
    ///
    /// # Panics
    ///
    /// Panics when `parts` is empty; an identifier always names something.
    pub fn new(parts: Vec<IdPart>) -> Self {
        assert!(!parts.is_empty(), "attribute identifier without parts");
        Self { parts }
    }

    /// Create a one-part identifier.
    pub fn name(name: impl Into<IdPart>) -> Self {
        Self::new(vec![name.into()])
    }

    /// Create a `qualifier.name` identifier.
    pub fn qualified(qualifier: impl Into<IdPart>, name: impl Into<IdPart>) -> Self {
        Self::new(vec![qualifier.into(), name.into()])
    }

    /// Parse a dotted identifier.
    ///
    /// Supports formats:
    /// - `"column"` -> one part
    /// - `"table.column"` -> two parts
    /// - `"table.*"` -> all attributes of `table`
    pub fn parse(s: &str) -> Self {
        Self::new(
            s.split('.')
                .map(|part| match part {
                    "*" => IdPart::Sym(Symbol::All),
                    other => IdPart::Str(other.to_string()),
                })
                .collect(),
        )
    }

    /// The `*` identifier.
    pub fn all() -> Self {
        Self::new(vec![IdPart::Sym(Symbol::All)])
    }

    /// The `qualifier.*` identifier.
    pub fn all_of(qualifier: impl Into<IdPart>) -> Self {
        Self::new(vec![qualifier.into(), IdPart::Sym(Symbol::All)])
    }

    /// The deferred-binding identifier for `qualifier`, resolved by schema inference.
    pub fn infer_of(qualifier: impl Into<IdPart>) -> Self {
        Self::new(vec![qualifier.into(), IdPart::Sym(Symbol::Infer)])
    }

    /// Get the parts of this identifier.
    pub fn parts(&self) -> &[IdPart] {
        &self.parts
    }

    /// Number of parts.
    #[allow(clippy::len_without_is_empty)]
    pub fn len(&self) -> usize {
        self.parts.len()
    }

    /// The last part, usually the bare column name.
    pub fn last(&self) -> &IdPart {
        &self.parts[self.parts.len() - 1]
    }

    /// Whether this identifier ends in the `*` symbol.
    pub fn is_all(&self) -> bool {
        self.last().is_symbol(Symbol::All)
    }

    /// Whether this identifier still needs schema inference.
    pub fn needs_inference(&self) -> bool {
        self.parts.iter().any(|p| p.is_symbol(Symbol::Infer))
    }

    /// Whether this identifier contains a reserved symbol anywhere.
    pub fn has_symbol(&self) -> bool {
        self.parts.iter().any(|p| matches!(p, IdPart::Sym(_)))
    }

    /// Return a new identifier with `part` put in front of this one.
    #[must_use]
    pub fn prefixed(&self, part: impl Into<IdPart>) -> Self {
        let mut parts = Vec::with_capacity(self.parts.len() + 1);
        parts.push(part.into());
        parts.extend(self.parts.iter().cloned());
        Self { parts }
    }

    /// Check whether `prefix` is a proper prefix of this identifier.
    pub fn starts_with(&self, prefix: &[IdPart]) -> bool {
        prefix.len() < self.parts.len() && self.parts[..prefix.len()] == *prefix
    }
}

impl From<&str> for AttrId {
    fn from(s: &str) -> Self {
        Self::parse(s)
    }
}

impl fmt::Display for AttrId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, part) in self.parts.iter().enumerate() {
            if i > 0 {
                write!(f, ".")?;
            }
            write!(f, "{part}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse() {
        let plain = AttrId::parse("name");
        assert_eq!(plain.len(), 1);
        assert_eq!(plain, AttrId::name("name"));

        let qualified = AttrId::parse("author.name");
        assert_eq!(qualified, AttrId::qualified("author", "name"));
        assert_eq!(qualified.last(), &IdPart::from("name"));

        let all = AttrId::parse("author.*");
        assert!(all.is_all());
        assert_eq!(all, AttrId::all_of("author"));
    }

    #[test]
    fn test_partwise_equality() {
        assert_ne!(AttrId::qualified("t", "x"), AttrId::name("t.x"));
        assert_ne!(AttrId::name(1i64), AttrId::name("1"));
    }

    #[test]
    fn test_prefixed() {
        let id = AttrId::qualified("t", "c");
        let ext = id.prefixed(Symbol::Unique(3));
        assert_eq!(ext.len(), 3);
        assert!(ext.has_symbol());
        assert_eq!(ext.to_string(), "#3.t.c");
        assert!(ext.starts_with(&[IdPart::Sym(Symbol::Unique(3))]));
    }

    #[test]
    fn test_inference_marker() {
        let id = AttrId::infer_of("person");
        assert!(id.needs_inference());
        assert!(!AttrId::parse("person.name").needs_inference());
    }
}
