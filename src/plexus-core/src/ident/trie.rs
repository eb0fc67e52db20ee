//! Trie keyed by identifier part sequences.

use std::collections::BTreeMap;

use super::{AttrId, IdPart, Symbol};

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Trie<V> {
    value: Option<V>,
    children: BTreeMap<IdPart, Trie<V>>,
}

impl<V> Default for Trie<V> {
    fn default() -> Self {
        Self {
            value: None,
            children: BTreeMap::new(),
        }
    }
}

impl<V> Trie<V> {
    pub(crate) fn get(&self, key: &[IdPart]) -> Option<&V> {
        let mut node = self;
        for part in key {
            node = node.children.get(part)?;
        }
        node.value.as_ref()
    }

    /// Insert `value` under `key`, returning the previous value.
    pub(crate) fn insert(&mut self, key: &[IdPart], value: V) -> Option<V> {
        let mut node = self;
        for part in key {
            node = node.children.entry(part.clone()).or_default();
        }
        node.value.replace(value)
    }

    pub(crate) fn remove(&mut self, key: &[IdPart]) -> Option<V> {
        match key.split_first() {
            None => self.value.take(),
            Some((head, rest)) => {
                let child = self.children.get_mut(head)?;
                let removed = child.remove(rest);
                if child.is_empty() {
                    self.children.remove(head);
                }
                removed
            }
        }
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.value.is_none() && self.children.is_empty()
    }

    /// Whether some stored key covers `key`: equals it, or is a proper
    /// prefix of it extended with the `*` symbol.
    pub(crate) fn covers(&self, key: &[IdPart]) -> bool {
        let all = IdPart::Sym(Symbol::All);
        let mut node = self;
        for part in key {
            if node
                .children
                .get(&all)
                .is_some_and(|star| star.value.is_some())
            {
                return true;
            }
            match node.children.get(part) {
                Some(next) => node = next,
                None => return false,
            }
        }
        node.value.is_some()
    }

    /// All stored entries in key order.
    pub(crate) fn entries(&self) -> Vec<(AttrId, &V)> {
        fn walk<'a, V>(node: &'a Trie<V>, path: &mut Vec<IdPart>, out: &mut Vec<(AttrId, &'a V)>) {
            if let Some(value) = &node.value {
                out.push((AttrId::new(path.clone()), value));
            }
            for (part, child) in &node.children {
                path.push(part.clone());
                walk(child, path, out);
                path.pop();
            }
        }

        let mut out = Vec::new();
        walk(self, &mut Vec::new(), &mut out);
        out
    }

    pub(crate) fn len(&self) -> usize {
        usize::from(self.value.is_some()) + self.children.values().map(Trie::len).sum::<usize>()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(s: &str) -> Vec<IdPart> {
        AttrId::parse(s).parts().to_vec()
    }

    #[test]
    fn test_insert_get_remove() {
        let mut trie = Trie::default();
        assert_eq!(trie.insert(&key("a.b"), 1), None);
        assert_eq!(trie.insert(&key("a.b"), 2), Some(1));
        trie.insert(&key("a"), 3);

        assert_eq!(trie.get(&key("a.b")), Some(&2));
        assert_eq!(trie.get(&key("a")), Some(&3));
        assert_eq!(trie.len(), 2);

        assert_eq!(trie.remove(&key("a.b")), Some(2));
        assert_eq!(trie.get(&key("a.b")), None);
        assert_eq!(trie.remove(&key("a")), Some(3));
        assert!(trie.is_empty());
    }

    #[test]
    fn test_covers_with_star() {
        let mut trie = Trie::default();
        trie.insert(&key("t.*"), ());
        assert!(trie.covers(&key("t.x")));
        assert!(trie.covers(&key("t.*")));
        assert!(!trie.covers(&key("t")));
        assert!(!trie.covers(&key("u.x")));
    }
}
