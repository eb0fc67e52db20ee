//! Attribute renaming and its safety check.
//!
//! A [`RenameMap`] passed here maps *free* references of an operand (the
//! ones it needs from its evaluation context) to new names. Inside an
//! operator the map is narrowed at every scope boundary: references bound
//! by the operator's own sources are never renamed.

use plexus_core::RenameMap;
use plexus_logical::{NodeId, Operand, Plan, PlanOp};

use super::TransitiveDeps;

/// Performs renames in place and keeps the dependency cache coherent.
pub struct Renamer<'a> {
    deps: &'a TransitiveDeps,
}

impl<'a> Renamer<'a> {
    pub fn new(deps: &'a TransitiveDeps) -> Self {
        Self { deps }
    }

    /// Rename the free references of `operand`.
    ///
    /// Attribute operands are returned renamed; node operands are renamed in
    /// place and returned as they are.
    pub fn rename(&self, plan: &mut Plan, operand: &Operand, renames: &RenameMap) -> Operand {
        match operand {
            Operand::Attr(id) => Operand::Attr(renames.apply(id)),
            Operand::Node(id) => {
                self.rename_node(plan, *id, renames);
                self.deps.invalidate_subtree(plan, *id);
                self.deps.invalidate_upstream(plan, *id);
                Operand::Node(*id)
            }
        }
    }

    fn rename_node(&self, plan: &mut Plan, id: NodeId, renames: &RenameMap) {
        if renames.is_empty() || self.deps.of(plan, id).restriction(&renames.keys()).is_empty() {
            return;
        }

        if let PlanOp::Calculation(calc) = plan.op_mut(id) {
            let mut removed = Vec::new();
            let mut nested = Vec::new();
            for arg in &mut calc.args {
                match arg {
                    Operand::Attr(attr) => {
                        if let Some(to) = renames.get(attr) {
                            removed.push(std::mem::replace(attr, to.clone()));
                        }
                    }
                    Operand::Node(n) => nested.push(*n),
                }
            }
            // Deletions first so that swapped names survive.
            for old in &removed {
                calc.dependencies.delete(old);
            }
            for old in &removed {
                calc.dependencies.add(renames.apply(old));
            }
            if let Some(original) = &mut calc.original {
                original.rename(renames);
            }
            for n in nested {
                self.rename_node(plan, n, renames);
            }
            return;
        }

        let local = TransitiveDeps::local_schema(plan, id);
        let inner = renames.without(&local);
        let mut nested = Vec::new();
        for operand in plan.op_mut(id).operands_mut() {
            match operand {
                Operand::Attr(attr) => {
                    if let Some(to) = inner.get(attr) {
                        *attr = to.clone();
                    }
                }
                Operand::Node(n) => nested.push(*n),
            }
        }
        let parts = plan.op(id).parts();
        let (sources, dependents) = (parts.sources, parts.dependents);
        for n in nested.into_iter().chain(dependents) {
            self.rename_node(plan, n, &inner);
        }
        for source in sources {
            self.rename_node(plan, source, renames);
        }
    }
}

/// Decides whether a rename can be applied without changing meaning.
pub struct RenameChecker<'a> {
    deps: &'a TransitiveDeps,
}

impl<'a> RenameChecker<'a> {
    pub fn new(deps: &'a TransitiveDeps) -> Self {
        Self { deps }
    }

    /// Whether renaming the free references of `operand` is safe.
    ///
    /// A rename is unsafe when a new name would be captured by an operator's
    /// local row context, or when a reference is covered by a `*` schema
    /// (so it may or may not be bound locally) and is also a rename key.
    ///
    /// Each operator's free references are checked against the map narrowed
    /// by its local schema. Narrowing only drops keys the local schema
    /// covers, and a free reference outside the local schema is never such a
    /// key, so its lookup gives the same target as in the full map.
    pub fn can_rename(&self, plan: &Plan, operand: &Operand, renames: &RenameMap) -> bool {
        match operand {
            Operand::Attr(_) => true,
            Operand::Node(id) => self.check_node(plan, *id, renames),
        }
    }

    fn check_node(&self, plan: &Plan, id: NodeId, renames: &RenameMap) -> bool {
        if renames.is_empty() || self.deps.of(plan, id).restriction(&renames.keys()).is_empty() {
            return true;
        }

        let op = plan.op(id);
        if let PlanOp::Calculation(calc) = op {
            return calc
                .args
                .iter()
                .filter_map(Operand::as_node)
                .all(|n| self.check_node(plan, n, renames));
        }

        let local = TransitiveDeps::local_schema(plan, id);
        let inner = renames.without(&local);
        for free in self.deps.horizontal(plan, id).iter() {
            if local.covers(&free) {
                if !local.has(&free) && renames.get(&free).is_some() {
                    return false;
                }
            } else if let Some(to) = inner.get(&free)
                && local.covers(to)
            {
                return false;
            }
        }

        let parts = op.parts();
        let nested = parts.operands.iter().filter_map(|o| o.as_node());
        nested
            .chain(parts.dependents.iter().copied())
            .all(|n| self.check_node(plan, n, &inner))
            && parts
                .sources
                .iter()
                .all(|&s| self.check_node(plan, s, renames))
    }
}
