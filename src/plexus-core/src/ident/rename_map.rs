//! Directional identifier substitutions.

use std::fmt;

use super::trie::Trie;
use super::{AttrId, IdSet};

/// An `AttrId -> AttrId` map shaped like an [`IdSet`].
///
/// The map carries no direction of its own: callers build it either
/// old-to-new or new-to-old and must keep track of which.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct RenameMap {
    trie: Trie<AttrId>,
}

impl RenameMap {
    /// Create an empty map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Map `from` to `to`, returning the previous target of `from`.
    pub fn insert(&mut self, from: AttrId, to: AttrId) -> Option<AttrId> {
        self.trie.insert(from.parts(), to)
    }

    /// Look up the target of `id`.
    pub fn get(&self, id: &AttrId) -> Option<&AttrId> {
        self.trie.get(id.parts())
    }

    /// Remove the mapping of `id`.
    pub fn remove(&mut self, id: &AttrId) -> Option<AttrId> {
        self.trie.remove(id.parts())
    }

    /// The target of `id`, or `id` itself when unmapped.
    pub fn apply(&self, id: &AttrId) -> AttrId {
        self.get(id).cloned().unwrap_or_else(|| id.clone())
    }

    /// The mapped-from identifiers.
    pub fn keys(&self) -> IdSet {
        self.iter().map(|(from, _)| from).collect()
    }

    /// The mapped-to identifiers.
    pub fn values(&self) -> IdSet {
        self.iter().map(|(_, to)| to.clone()).collect()
    }

    /// The same substitutions, pointing the other way.
    #[must_use]
    pub fn inverse(&self) -> RenameMap {
        self.iter().map(|(from, to)| (to.clone(), from)).collect()
    }

    /// A copy without the entries whose key is covered by `ids`.
    #[must_use]
    pub fn without(&self, ids: &IdSet) -> RenameMap {
        self.iter()
            .filter(|(from, _)| !ids.covers(from))
            .map(|(from, to)| (from, to.clone()))
            .collect()
    }

    /// Whether the map has no entries.
    pub fn is_empty(&self) -> bool {
        self.trie.is_empty()
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.trie.len()
    }

    /// Iterate `(from, to)` pairs in key order.
    pub fn iter(&self) -> impl Iterator<Item = (AttrId, &AttrId)> + '_ {
        self.trie.entries().into_iter()
    }
}

impl FromIterator<(AttrId, AttrId)> for RenameMap {
    fn from_iter<I: IntoIterator<Item = (AttrId, AttrId)>>(iter: I) -> Self {
        let mut map = Self::new();
        for (from, to) in iter {
            map.insert(from, to);
        }
        map
    }
}

impl fmt::Debug for RenameMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map()
            .entries(self.iter().map(|(from, to)| (from.to_string(), to.to_string())))
            .finish()
    }
}
