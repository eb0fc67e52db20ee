//! The plan arena and in-place tree surgery.

use std::collections::{HashMap, HashSet};

use plexus_core::{IdSet, Symbol};
use typed_generational_arena::StandardArena;

use crate::builder::PlanBuilder;
use crate::node::{NodeId, PlanNode, SchemaSlot};
use crate::ops::{OpKind, PlanOp};
use crate::schema::Schema;
use crate::{Lang, Operand};

/// A mutable plan tree stored in an arena.
///
/// Nodes refer to their children by [`NodeId`] and keep a non-owning link
/// to their parent. The tree invariants are:
///
/// 1. every node reachable from the root has exactly one parent, and that
///    parent lists it among its children
/// 2. an owned schema always agrees with its set mirror; a linked schema is
///    its source's schema, so the two are mutated together
///
/// Adding a node *adopts* its children: their parent links move to the new
/// node even while another node's slot still references them. Surgery is
/// finished with [`Plan::replace_at`], which swaps the slot and fixes the
/// links. [`Plan::validate`] checks the invariants.
#[derive(Debug, Clone)]
pub struct Plan {
    nodes: StandardArena<PlanNode>,
    root: Option<NodeId>,
    next_symbol: u64,
}

impl Default for Plan {
    fn default() -> Self {
        Self::new()
    }
}

impl Plan {
    /// Create an empty plan.
    pub fn new() -> Self {
        Self {
            nodes: StandardArena::new(),
            root: None,
            next_symbol: 0,
        }
    }

    /// Fluent constructors tagging nodes with `lang`.
    pub fn builder(&mut self, lang: Lang) -> PlanBuilder<'_> {
        PlanBuilder::new(self, lang)
    }

    /// Add a node, deriving its schema from its children.
    ///
    /// # Panics
    ///
    /// Panics for sources whose schema cannot be derived; use
    /// [`Plan::add_with_schema`] for those.
    pub fn add(&mut self, lang: Lang, op: PlanOp) -> NodeId {
        let slot = self
            .derive_schema(&op)
            .unwrap_or_else(|| panic!("{} needs an explicit schema", op.name()));
        self.insert(lang, op, slot)
    }

    /// Add a node owning the given schema.
    pub fn add_with_schema(&mut self, lang: Lang, op: PlanOp, schema: Schema) -> NodeId {
        self.insert(lang, op, SchemaSlot::Own(schema))
    }

    fn insert(&mut self, lang: Lang, op: PlanOp, schema: SchemaSlot) -> NodeId {
        let children = op.children();
        let id = NodeId(self.nodes.insert(PlanNode {
            lang,
            op,
            parent: None,
            schema,
        }));
        for child in children {
            self.node_mut(child).parent = Some(id);
        }
        id
    }

    fn derive_schema(&self, op: &PlanOp) -> Option<SchemaSlot> {
        let slot = match op {
            PlanOp::TupleSource(_) | PlanOp::TupleFnSource(_) | PlanOp::IndexScan(_) => {
                return None;
            }
            PlanOp::NullSource => SchemaSlot::Own(Schema::default()),
            PlanOp::ItemSource(_)
            | PlanOp::ItemFnSource(_)
            | PlanOp::MapToItem(_)
            | PlanOp::Quantifier(_)
            | PlanOp::Calculation(_)
            | PlanOp::FnCall(_)
            | PlanOp::Literal(_)
            | PlanOp::Conditional(_) => SchemaSlot::None,
            PlanOp::Selection(_)
            | PlanOp::OrderBy(_)
            | PlanOp::Limit(_)
            | PlanOp::Distinct(_)
            | PlanOp::Recursion(_)
            | PlanOp::IndexedRecursion(_)
            | PlanOp::BidirectionalRecursion(_) => SchemaSlot::Linked,
            PlanOp::Projection(p) => {
                SchemaSlot::Own(Schema::new(p.attrs.iter().map(|a| a.name.clone())))
            }
            PlanOp::ProjectionConcat(p) => {
                SchemaSlot::Own(Schema::concat(self.schema(p.source), self.schema(p.mapping)))
            }
            PlanOp::ProjectionIndex(p) => {
                let mut schema = self.schema(p.source).clone();
                schema.push(p.name.clone());
                SchemaSlot::Own(schema)
            }
            PlanOp::MapFromItem(p) => SchemaSlot::Own(Schema::new([p.key.clone()])),
            PlanOp::CartesianProduct(p) => {
                SchemaSlot::Own(Schema::concat(self.schema(p.left), self.schema(p.right)))
            }
            PlanOp::Join(p) => {
                SchemaSlot::Own(Schema::concat(self.schema(p.left), self.schema(p.right)))
            }
            PlanOp::GroupBy(p) => SchemaSlot::Own(Schema::new(
                p.keys
                    .iter()
                    .map(|k| k.name.clone())
                    .chain(p.aggregates.iter().map(|a| a.name.clone())),
            )),
            PlanOp::Union(p) | PlanOp::Intersection(p) | PlanOp::Difference(p) => {
                SchemaSlot::Own(self.schema(p.left).clone())
            }
        };
        Some(slot)
    }

    /// Recompute an owned schema from the node's children.
    ///
    /// Sources keep their schema; linked and schema-less nodes are unaffected.
    pub fn refresh_schema(&mut self, id: NodeId) {
        if !matches!(self.node(id).schema, SchemaSlot::Own(_)) {
            return;
        }
        if let Some(slot) = self.derive_schema(self.op(id)) {
            self.node_mut(id).schema = slot;
        }
    }

    /// Whether `id` refers to a live node.
    pub fn contains(&self, id: NodeId) -> bool {
        self.nodes.contains(id.0)
    }

    /// Number of live nodes, including detached ones.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the arena is empty.
    pub fn is_empty(&self) -> bool {
        self.nodes.len() == 0
    }

    /// The node record.
    ///
    /// # Panics
    ///
    /// Panics on a dangling id.
    pub fn node(&self, id: NodeId) -> &PlanNode {
        self.nodes
            .get(id.0)
            .unwrap_or_else(|| panic!("dangling node id {id}"))
    }

    fn node_mut(&mut self, id: NodeId) -> &mut PlanNode {
        self.nodes
            .get_mut(id.0)
            .unwrap_or_else(|| panic!("dangling node id {id}"))
    }

    /// The operator of a node.
    pub fn op(&self, id: NodeId) -> &PlanOp {
        &self.node(id).op
    }

    /// Mutable operator access.
    ///
    /// Callers may edit attribute references and scalar fields in place, but
    /// must not retarget child slots; use [`Plan::replace_child`] or
    /// [`Plan::replace_op`] for that.
    pub fn op_mut(&mut self, id: NodeId) -> &mut PlanOp {
        &mut self.node_mut(id).op
    }

    /// Operator tag of a node.
    pub fn kind(&self, id: NodeId) -> OpKind {
        self.op(id).kind()
    }

    /// Front-end language of a node.
    pub fn lang(&self, id: NodeId) -> Lang {
        self.node(id).lang
    }

    /// The parent of a node.
    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).parent
    }

    /// The root of the plan.
    pub fn root(&self) -> Option<NodeId> {
        self.root
    }

    /// Make `id` the root.
    ///
    /// # Panics
    ///
    /// Panics if `id` has a parent.
    pub fn set_root(&mut self, id: NodeId) {
        assert!(
            self.parent(id).is_none(),
            "root {id} must not have a parent"
        );
        self.root = Some(id);
    }

    /// The node that stores `id`'s schema, following schema links.
    pub fn schema_owner(&self, id: NodeId) -> Option<NodeId> {
        let mut current = id;
        loop {
            match &self.node(current).schema {
                SchemaSlot::Own(_) => return Some(current),
                SchemaSlot::None => return None,
                SchemaSlot::Linked => current = self.op(current).source()?,
            }
        }
    }

    /// The output schema of `id`, if it produces rows.
    pub fn try_schema(&self, id: NodeId) -> Option<&Schema> {
        let owner = self.schema_owner(id)?;
        match &self.node(owner).schema {
            SchemaSlot::Own(schema) => Some(schema),
            _ => None,
        }
    }

    /// The output schema of `id`.
    ///
    /// # Panics
    ///
    /// Panics if the node does not produce rows.
    pub fn schema(&self, id: NodeId) -> &Schema {
        self.try_schema(id)
            .unwrap_or_else(|| panic!("{} {id} has no schema", self.op(id).name()))
    }

    /// Mutable access to the schema of `id`; through a link this is the
    /// source's schema.
    ///
    /// # Panics
    ///
    /// Panics if the node does not produce rows.
    pub fn schema_mut(&mut self, id: NodeId) -> &mut Schema {
        let owner = self
            .schema_owner(id)
            .unwrap_or_else(|| panic!("{id} has no schema"));
        match &mut self.node_mut(owner).schema {
            SchemaSlot::Own(schema) => schema,
            _ => unreachable!("schema owner without a schema"),
        }
    }

    /// Put `new` into the slot of `parent` that holds `old`; with no parent,
    /// `new` takes over the root if `old` was the root.
    ///
    /// `old` loses its parent link unless it has already been adopted by
    /// another node. Nested plan references in a parent calculation's
    /// original form follow the swap.
    ///
    /// # Panics
    ///
    /// Panics if `parent` has no slot holding `old`.
    pub fn replace_at(&mut self, parent: Option<NodeId>, old: NodeId, new: NodeId) {
        if old == new {
            return;
        }
        match parent {
            Some(p) => {
                let node = self.node_mut(p);
                let mut found = false;
                for slot in node.op.child_slots_mut() {
                    if *slot == old {
                        *slot = new;
                        found = true;
                    }
                }
                assert!(found, "{old} is not a child of {p}");
                if let PlanOp::Calculation(calc) = &mut node.op
                    && let Some(original) = &mut calc.original
                {
                    original.remap_plans(&HashMap::from([(old, new)]));
                }
            }
            None => {
                if self.root == Some(old) {
                    self.root = Some(new);
                }
            }
        }
        if self.parent(old) == parent {
            self.node_mut(old).parent = None;
        }
        self.node_mut(new).parent = parent;
    }

    /// Swap the child `old` of `parent` for `new`.
    pub fn replace_child(&mut self, parent: NodeId, old: NodeId, new: NodeId) {
        self.replace_at(Some(parent), old, new);
    }

    /// Put `new` where `old` is; `old` must still be linked to its parent.
    pub fn replace(&mut self, old: NodeId, new: NodeId) {
        let parent = self.parent(old);
        self.replace_at(parent, old, new);
    }

    /// Replace the operator of `id`, relinking children and re-deriving an
    /// owned schema. Returns the previous operator.
    pub fn replace_op(&mut self, id: NodeId, op: PlanOp) -> PlanOp {
        let new_children = op.children();
        let old = std::mem::replace(&mut self.node_mut(id).op, op);
        for child in old.children() {
            if self.parent(child) == Some(id) {
                self.node_mut(child).parent = None;
            }
        }
        for child in new_children {
            self.node_mut(child).parent = Some(id);
        }
        if let Some(slot) = self.derive_schema(self.op(id)) {
            self.node_mut(id).schema = slot;
        }
        old
    }

    /// Mint a name part no front end can spell.
    pub fn fresh_symbol(&mut self) -> Symbol {
        let symbol = Symbol::Unique(self.next_symbol);
        self.next_symbol += 1;
        symbol
    }

    /// The symbol the next [`Plan::fresh_symbol`] call will return.
    pub fn peek_symbol(&self) -> Symbol {
        Symbol::Unique(self.next_symbol)
    }

    /// Deep-copy the subtree rooted at `id`; the copy is detached.
    pub fn clone_subtree(&mut self, id: NodeId) -> NodeId {
        let node = self.node(id).clone();
        let mut op = node.op;
        let mut copies = HashMap::new();
        for slot in op.child_slots_mut() {
            let copy = self.clone_subtree(*slot);
            copies.insert(*slot, copy);
            *slot = copy;
        }
        if let PlanOp::Calculation(calc) = &mut op
            && let Some(original) = &mut calc.original
        {
            original.remap_plans(&copies);
        }
        self.insert(node.lang, op, node.schema)
    }

    /// Ancestors of `id`, nearest first.
    pub fn ancestors(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut current = self.parent(id);
        while let Some(p) = current {
            out.push(p);
            current = self.parent(p);
        }
        out
    }

    /// `id` and every node below it, in pre-order.
    pub fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack = vec![id];
        while let Some(n) = stack.pop() {
            out.push(n);
            stack.extend(self.op(n).children().into_iter().rev());
        }
        out
    }

    /// Drop every node not reachable from the root, returning how many.
    pub fn collect_garbage(&mut self) -> usize {
        let live: HashSet<NodeId> = match self.root {
            Some(root) => self.descendants(root).into_iter().collect(),
            None => HashSet::new(),
        };
        let dead: Vec<NodeId> = self
            .nodes
            .iter()
            .map(|(key, _)| NodeId(key))
            .filter(|id| !live.contains(id))
            .collect();
        for id in &dead {
            self.nodes.remove(id.0);
        }
        dead.len()
    }

    /// Assert the tree invariants for the subtree rooted at `root`.
    ///
    /// # Panics
    ///
    /// Panics with a description of the first violation found.
    pub fn validate(&self, root: NodeId) {
        let mut seen = HashSet::new();
        self.validate_node(root, &mut seen);
    }

    fn validate_node(&self, id: NodeId, seen: &mut HashSet<NodeId>) {
        assert!(seen.insert(id), "{id} is reachable twice");
        let node = self.node(id);
        match &node.schema {
            SchemaSlot::Own(schema) => assert!(
                schema.is_consistent(),
                "{} {id}: schema and set mirror disagree",
                node.op.name()
            ),
            SchemaSlot::Linked => assert!(
                node.op.source().is_some(),
                "{} {id}: linked schema without a unique source",
                node.op.name()
            ),
            SchemaSlot::None => {}
        }
        if let PlanOp::Calculation(calc) = &node.op {
            let attrs: IdSet = calc.args.iter().filter_map(Operand::as_attr).collect();
            assert_eq!(
                attrs, calc.dependencies,
                "Calculation {id}: dependencies out of sync with arguments"
            );
            if let Some(original) = &calc.original {
                for plan in original.plans() {
                    assert!(
                        calc.args.contains(&Operand::Node(plan)),
                        "Calculation {id}: original form references {plan} which is no argument"
                    );
                }
            }
        }
        for child in node.op.children() {
            assert_eq!(
                self.parent(child),
                Some(id),
                "{child} does not point back to its parent {id}"
            );
            self.validate_node(child, seen);
        }
    }
}

#[cfg(test)]
mod tests {
    use plexus_core::AttrId;

    use super::*;
    use crate::expr::{AstExpr, builtins};
    use crate::ops::ProjectedAttr;

    fn a(name: &str) -> AttrId {
        AttrId::parse(name)
    }

    fn scan_filter(plan: &mut Plan) -> (NodeId, NodeId) {
        let mut b = plan.builder(Lang::Sql);
        let source = b.tuple_source("t", [a("t.a"), a("t.b")]);
        let cond = b
            .calculation(AstExpr::call(
                builtins::gt(),
                vec![AstExpr::attr("t.a"), AstExpr::lit(1i64)],
            ))
            .unwrap();
        let sel = b.selection(cond, source);
        plan.set_root(sel);
        (source, sel)
    }

    #[test]
    fn test_linked_schema_follows_source() {
        let mut plan = Plan::new();
        let (source, sel) = scan_filter(&mut plan);
        assert_eq!(plan.schema(sel), plan.schema(source));
        assert_eq!(plan.schema_owner(sel), Some(source));
        plan.schema_mut(sel).push(a("t.c"));
        assert_eq!(plan.schema(source).len(), 3);
        plan.validate(sel);
    }

    #[test]
    fn test_wrap_with_adoption() {
        let mut plan = Plan::new();
        let (_, sel) = scan_filter(&mut plan);
        let proj = plan
            .builder(Lang::Sql)
            .projection(vec![ProjectedAttr::keep(a("t.b"))], sel);
        assert_eq!(plan.parent(sel), Some(proj));
        plan.replace_at(None, sel, proj);
        assert_eq!(plan.root(), Some(proj));
        plan.validate(proj);
        assert_eq!(plan.schema(proj).to_string(), "[t.b]");
    }

    #[test]
    fn test_replace_child_detaches_old() {
        let mut plan = Plan::new();
        let (source, sel) = scan_filter(&mut plan);
        let other = plan.builder(Lang::Sql).tuple_source("u", [a("t.a"), a("t.b")]);
        plan.replace_child(sel, source, other);
        assert_eq!(plan.parent(source), None);
        assert_eq!(plan.op(sel).source(), Some(other));
        plan.validate(sel);
    }

    #[test]
    fn test_clone_subtree_is_detached_copy() {
        let mut plan = Plan::new();
        let (_, sel) = scan_filter(&mut plan);
        let copy = plan.clone_subtree(sel);
        assert_ne!(copy, sel);
        assert_eq!(plan.parent(copy), None);
        assert_eq!(plan.descendants(copy).len(), plan.descendants(sel).len());
        let shared: HashSet<_> = plan.descendants(sel).into_iter().collect();
        assert!(plan.descendants(copy).iter().all(|n| !shared.contains(n)));
        plan.validate(copy);
    }

    #[test]
    fn test_collect_garbage() {
        let mut plan = Plan::new();
        let (_, _) = scan_filter(&mut plan);
        plan.builder(Lang::Sql).null_source();
        assert_eq!(plan.collect_garbage(), 1);
        assert_eq!(plan.len(), 3);
    }

    #[test]
    fn test_fresh_symbols_are_distinct() {
        let mut plan = Plan::new();
        assert_ne!(plan.fresh_symbol(), plan.fresh_symbol());
    }

    #[test]
    #[should_panic(expected = "does not point back")]
    fn test_validate_catches_stale_parent() {
        let mut plan = Plan::new();
        let (source, sel) = scan_filter(&mut plan);
        // Adopt the source without finishing the surgery.
        plan.builder(Lang::Sql).limit(0, Some(1), source);
        plan.validate(sel);
    }
}
