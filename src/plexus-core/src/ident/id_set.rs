//! Sets of attribute identifiers.

use std::fmt;

use super::trie::Trie;
use super::AttrId;

/// A trie-backed set of attribute identifiers.
///
/// Besides exact membership ([`IdSet::has`]) the set answers *covering*
/// queries: a set covers `x` when it holds `x` itself or any proper prefix of
/// `x` extended with the `*` symbol, so `{t.*}` covers `t.a`. The set
/// algebra ([`difference`](IdSet::difference), [`restriction`](IdSet::restriction),
/// [`contains_all`](IdSet::contains_all)) is defined in terms of covering,
/// which is what schema comparisons need.
///
/// Every binary operation returns a fresh set and leaves both inputs untouched.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct IdSet {
    trie: Trie<()>,
}

impl IdSet {
    /// Create an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Check exact membership.
    pub fn has(&self, id: &AttrId) -> bool {
        self.trie.get(id.parts()).is_some()
    }

    /// Check whether `id` is a member or falls under a `*` member.
    pub fn covers(&self, id: &AttrId) -> bool {
        self.trie.covers(id.parts())
    }

    /// Add an identifier, returning whether it was newly inserted.
    pub fn add(&mut self, id: AttrId) -> bool {
        self.trie.insert(id.parts(), ()).is_none()
    }

    /// Remove an identifier, returning whether it was present.
    pub fn delete(&mut self, id: &AttrId) -> bool {
        self.trie.remove(id.parts()).is_some()
    }

    /// Add every member of `other` to this set.
    pub fn extend_from(&mut self, other: &IdSet) {
        for id in other.iter() {
            self.add(id);
        }
    }

    /// Members of either set.
    #[must_use]
    pub fn union(&self, other: &IdSet) -> IdSet {
        let mut result = self.clone();
        result.extend_from(other);
        result
    }

    /// Members of this set not covered by `other`.
    #[must_use]
    pub fn difference(&self, other: &IdSet) -> IdSet {
        self.iter().filter(|id| !other.covers(id)).collect()
    }

    /// Members of this set covered by `domain`.
    #[must_use]
    pub fn restriction(&self, domain: &IdSet) -> IdSet {
        self.iter().filter(|id| domain.covers(id)).collect()
    }

    /// Whether every member of `other` is covered by this set.
    pub fn contains_all(&self, other: &IdSet) -> bool {
        other.iter().all(|id| self.covers(&id))
    }

    /// Whether some member of this set is covered by `other`.
    pub fn intersects(&self, other: &IdSet) -> bool {
        self.iter().any(|id| other.covers(&id))
    }

    /// Number of members.
    pub fn len(&self) -> usize {
        self.trie.len()
    }

    /// Whether the set is empty.
    pub fn is_empty(&self) -> bool {
        self.trie.is_empty()
    }

    /// Iterate the members in part order.
    pub fn iter(&self) -> impl Iterator<Item = AttrId> + '_ {
        self.trie.entries().into_iter().map(|(id, ())| id)
    }
}

impl FromIterator<AttrId> for IdSet {
    fn from_iter<I: IntoIterator<Item = AttrId>>(iter: I) -> Self {
        let mut set = Self::new();
        for id in iter {
            set.add(id);
        }
        set
    }
}

impl<'a> FromIterator<&'a AttrId> for IdSet {
    fn from_iter<I: IntoIterator<Item = &'a AttrId>>(iter: I) -> Self {
        iter.into_iter().cloned().collect()
    }
}

impl fmt::Debug for IdSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter().map(|id| id.to_string())).finish()
    }
}

impl fmt::Display for IdSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<_> = self.iter().map(|id| id.to_string()).collect();
        write!(f, "{{{}}}", names.join(", "))
    }
}
