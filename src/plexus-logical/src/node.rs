//! Plan node handles and the node record stored in the arena.

use std::fmt;
use std::hash::{Hash, Hasher};

use plexus_core::AttrId;
use typed_generational_arena::{Index, NonzeroGeneration};

use crate::ops::PlanOp;
use crate::schema::Schema;
use crate::Lang;

pub(crate) type Key = Index<PlanNode, usize, NonzeroGeneration<usize>>;

/// Stable identity of a node inside a [`Plan`](crate::Plan).
///
/// Ids are generational: an id of a removed node never aliases a node
/// inserted later, so it is safe to key caches by it.
#[derive(Clone, Copy)]
pub struct NodeId(pub(crate) Key);

impl NodeId {
    /// Arena slot of this node; unique among live nodes.
    pub fn index(&self) -> usize {
        self.0.arr_idx()
    }
}

impl PartialEq for NodeId {
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0
    }
}

impl Eq for NodeId {}

impl Hash for NodeId {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.arr_idx().hash(state);
    }
}

impl fmt::Debug for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.index())
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.index())
    }
}

/// An expression slot: either a plain attribute reference or a nested node
/// (a scalar expression node or a subquery).
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    /// Reference to an attribute of the row being evaluated (or an outer one).
    Attr(AttrId),
    /// A nested expression or plan node, owned by the node holding the slot.
    Node(NodeId),
}

impl Operand {
    /// The referenced attribute, if this is a plain reference.
    pub fn as_attr(&self) -> Option<&AttrId> {
        match self {
            Self::Attr(id) => Some(id),
            Self::Node(_) => None,
        }
    }

    /// The nested node, if any.
    pub fn as_node(&self) -> Option<NodeId> {
        match self {
            Self::Attr(_) => None,
            Self::Node(id) => Some(*id),
        }
    }
}

impl From<AttrId> for Operand {
    fn from(id: AttrId) -> Self {
        Self::Attr(id)
    }
}

impl From<NodeId> for Operand {
    fn from(id: NodeId) -> Self {
        Self::Node(id)
    }
}

/// Where a node's output schema lives.
#[derive(Debug, Clone, PartialEq)]
pub enum SchemaSlot {
    /// The node produces items (or is a scalar expression) and has no schema.
    None,
    /// The node owns its schema.
    Own(Schema),
    /// The node passes its only source's rows through and shares its schema.
    Linked,
}

/// A node of the plan tree.
#[derive(Debug, Clone)]
pub struct PlanNode {
    /// Language of the front end that built the node.
    pub lang: Lang,
    /// The operator and its operands.
    pub op: PlanOp,
    pub(crate) parent: Option<NodeId>,
    pub(crate) schema: SchemaSlot,
}

impl PlanNode {
    /// The node whose operand or source slot holds this node.
    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    /// How this node's schema is stored.
    pub fn schema_slot(&self) -> &SchemaSlot {
        &self.schema
    }
}
