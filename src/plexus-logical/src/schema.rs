//! Ordered tuple schemas with an identifier-set mirror.

use std::fmt;

use plexus_core::{AttrId, IdPart, IdSet, Symbol};

/// Output attributes of a tuple-producing node.
///
/// The ordered list and its [`IdSet`] mirror are only mutated together, so
/// they never disagree.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Schema {
    attrs: Vec<AttrId>,
    set: IdSet,
}

impl Schema {
    /// Create a schema from an ordered attribute list.
    pub fn new(attrs: impl IntoIterator<Item = AttrId>) -> Self {
        let attrs: Vec<AttrId> = attrs.into_iter().collect();
        let set = attrs.iter().collect();
        Self { attrs, set }
    }

    /// Concatenate two schemas (left attributes first).
    pub fn concat(left: &Schema, right: &Schema) -> Self {
        Self::new(left.attrs.iter().chain(&right.attrs).cloned())
    }

    /// The ordered attributes.
    pub fn attrs(&self) -> &[AttrId] {
        &self.attrs
    }

    /// The attributes as a set.
    pub fn set(&self) -> &IdSet {
        &self.set
    }

    /// Number of attributes.
    pub fn len(&self) -> usize {
        self.attrs.len()
    }

    /// Whether the schema has no attributes.
    pub fn is_empty(&self) -> bool {
        self.attrs.is_empty()
    }

    /// Whether `id` is provided by this schema (directly or through `t.*`).
    pub fn provides(&self, id: &AttrId) -> bool {
        self.set.covers(id)
    }

    /// Append an attribute.
    pub fn push(&mut self, id: AttrId) {
        self.set.add(id.clone());
        self.attrs.push(id);
    }

    /// Remove every occurrence of an attribute, returning whether it was present.
    pub fn remove(&mut self, id: &AttrId) -> bool {
        let before = self.attrs.len();
        self.attrs.retain(|a| a != id);
        self.set.delete(id);
        before != self.attrs.len()
    }

    /// Replace the whole attribute list.
    pub fn replace(&mut self, attrs: impl IntoIterator<Item = AttrId>) {
        *self = Self::new(attrs);
    }

    /// Whether every attribute is concretely named (no `*`, no pending inference).
    pub fn is_known(&self) -> bool {
        !self.attrs.iter().any(|a| {
            a.parts()
                .iter()
                .any(|p| p.is_symbol(Symbol::All) || p.is_symbol(Symbol::Infer))
        })
    }

    /// Check the list/set mirror invariant.
    pub fn is_consistent(&self) -> bool {
        let rebuilt: IdSet = self.attrs.iter().collect();
        rebuilt == self.set
    }

    /// Position of an attribute in the ordered list.
    pub fn position(&self, id: &AttrId) -> Option<usize> {
        self.attrs.iter().position(|a| a == id)
    }

    /// Iterate the attributes in order.
    pub fn iter(&self) -> impl Iterator<Item = &AttrId> {
        self.attrs.iter()
    }

    /// Prefix every attribute with `part`.
    #[must_use]
    pub fn prefixed(&self, part: &IdPart) -> Self {
        Self::new(self.attrs.iter().map(|a| a.prefixed(part.clone())))
    }
}

impl fmt::Display for Schema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<_> = self.attrs.iter().map(ToString::to_string).collect();
        write!(f, "[{}]", names.join(", "))
    }
}
