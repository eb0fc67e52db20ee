//! Leaf operators.

use crate::expr::FnImpl;
use crate::Operand;

/// Rows of a named relation (table, graph pattern binding, collection).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TupleSource {
    /// Name under which the adapter and index registry know the source.
    pub name: String,
}

/// Items of a named item collection (XML documents, JSON arrays).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemSource {
    /// Name of the collection.
    pub name: String,
}

/// Rows or items produced by calling a function.
#[derive(Debug, Clone)]
pub struct FnSource {
    /// Producing function.
    pub func: FnImpl,
    /// Arguments, evaluated once per evaluation of the source.
    pub args: Vec<Operand>,
}

/// A tuple source read through an index.
#[derive(Debug, Clone)]
pub struct IndexScan {
    /// Name of the underlying source.
    pub name: String,
    /// Name of the index serving the scan.
    pub index: String,
    /// Accessor expression selecting the index entries.
    pub access: Operand,
}
