//! Conversions between rows and items.

use plexus_core::AttrId;

use crate::{NodeId, Operand};

/// Emits one item per row: the value of `key` in that row.
#[derive(Debug, Clone)]
pub struct MapToItem {
    /// Value emitted for each row.
    pub key: Operand,
    /// Input rows.
    pub source: NodeId,
}

/// Wraps each item of `source` into a one-column row named `key`.
#[derive(Debug, Clone)]
pub struct MapFromItem {
    /// Column receiving the item.
    pub key: AttrId,
    /// Input items.
    pub source: NodeId,
}
