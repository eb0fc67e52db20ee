//! Transitive dependency analysis.
//!
//! `tdeps(n)` is the set of attribute references the subtree rooted at `n`
//! needs from above itself. It depends only on the contents of that
//! subtree, so a cached entry stays valid while a node is moved around and
//! goes stale exactly when something inside the subtree changes.

use std::cell::RefCell;
use std::collections::HashMap;

use log::trace;
use plexus_core::IdSet;
use plexus_logical::{NodeId, Operand, Plan, PlanOp};

/// Memoized transitive dependencies for one optimizer run.
///
/// Every mutator must follow the invalidation protocol: after changing a
/// node's references or children, drop the entries of that node and of all
/// its ancestors ([`TransitiveDeps::invalidate_upstream`]); after a rename
/// below a node, drop the whole subtree as well
/// ([`TransitiveDeps::invalidate_subtree`]).
#[derive(Debug, Default)]
pub struct TransitiveDeps {
    cache: RefCell<HashMap<NodeId, IdSet>>,
}

impl TransitiveDeps {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// The attribute references the subtree of `id` needs from outside.
    pub fn of(&self, plan: &Plan, id: NodeId) -> IdSet {
        if let Some(hit) = self.cache.borrow().get(&id).cloned() {
            return hit;
        }
        let deps = self.compute(plan, id);
        trace!("tdeps({} {id}) = {deps}", plan.op(id).name());
        self.cache.borrow_mut().insert(id, deps.clone());
        deps
    }

    /// Free references of an operand.
    pub fn of_operand(&self, plan: &Plan, operand: &Operand) -> IdSet {
        match operand {
            Operand::Attr(id) => [id].into_iter().collect(),
            Operand::Node(id) => self.of(plan, *id),
        }
    }

    /// Attributes provided by the sources of `id`: the row context its
    /// horizontal expressions and dependents are evaluated in.
    pub fn local_schema(plan: &Plan, id: NodeId) -> IdSet {
        let mut local = IdSet::new();
        for source in plan.op(id).sources() {
            if let Some(schema) = plan.try_schema(source) {
                local.extend_from(schema.set());
            }
        }
        local
    }

    /// Free references of the expressions and dependents evaluated in the
    /// row context of `id`, before removing what that context provides.
    pub fn horizontal(&self, plan: &Plan, id: NodeId) -> IdSet {
        let parts = plan.op(id).parts();
        let mut free = IdSet::new();
        for operand in parts.operands {
            free.extend_from(&self.of_operand(plan, operand));
        }
        for dependent in parts.dependents {
            free.extend_from(&self.of(plan, dependent));
        }
        free
    }

    fn compute(&self, plan: &Plan, id: NodeId) -> IdSet {
        if let PlanOp::Calculation(calc) = plan.op(id) {
            let mut deps = calc.dependencies.clone();
            for arg in calc.args.iter().filter_map(Operand::as_node) {
                deps.extend_from(&self.of(plan, arg));
            }
            return deps;
        }

        let local = Self::local_schema(plan, id);
        let mut deps = self.horizontal(plan, id).difference(&local);
        for source in plan.op(id).sources() {
            deps.extend_from(&self.of(plan, source));
        }
        deps
    }

    /// Whether an entry for `id` is cached.
    pub fn is_cached(&self, id: NodeId) -> bool {
        self.cache.borrow().contains_key(&id)
    }

    /// Drop every entry.
    pub fn clear_cache(&self) {
        self.cache.borrow_mut().clear();
    }

    /// Drop the entries of `id` and of every ancestor up to the root.
    pub fn invalidate_upstream(&self, plan: &Plan, id: NodeId) {
        let mut cache = self.cache.borrow_mut();
        cache.remove(&id);
        for ancestor in plan.ancestors(id) {
            cache.remove(&ancestor);
        }
    }

    /// Drop the entries of `id` and all its descendants.
    pub fn invalidate_subtree(&self, plan: &Plan, id: NodeId) {
        let mut cache = self.cache.borrow_mut();
        for node in plan.descendants(id) {
            cache.remove(&node);
        }
    }

    /// Drop the entry of `id` alone.
    pub fn invalidate_element(&self, id: NodeId) {
        self.cache.borrow_mut().remove(&id);
    }
}
