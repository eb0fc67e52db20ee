//! Attribute identifiers and the trie-backed collections keyed by them.

mod attr_id;
mod id_set;
mod rename_map;
mod trie;

pub use attr_id::{AttrId, IdPart, Symbol};
pub use id_set::IdSet;
pub use rename_map::RenameMap;
