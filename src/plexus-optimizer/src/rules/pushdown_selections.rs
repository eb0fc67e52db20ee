//! Selection pushdown.

use common_error::PlexusResult;
use plexus_core::{IdSet, RenameMap};
use plexus_logical::{NodeId, OpKind, Operand, PlanOp};

use super::rule::{PatternRule, RuleContext};
use super::support::{condition, is_run_top, selection_run, source_of, stack_selections};

/// Moves a run of selections below the operator underneath it.
///
/// Below `OrderBy` and `Distinct` the whole run moves. Below a set operation
/// with known schemas each condition is copied onto both branches, renamed
/// positionally for the right one. Below a `Projection` a condition moves
/// when every projected name it reads is a plain attribute. Below a product,
/// an inner join or an inner dependent join each condition goes to the side
/// (or sides) providing everything it reads. Conditions that cannot move
/// stay on top, in their original order.
pub struct PushdownSelections;

/// Where the conditions of a run go, in run order.
pub enum Pushdown {
    /// Everything moves below a row-preserving operator.
    Swap { below: NodeId },
    /// Below a set operation.
    SetOp {
        below: NodeId,
        pushed: Vec<usize>,
        right_renames: RenameMap,
    },
    /// Below a projection, renaming projected names to source names.
    Projection {
        below: NodeId,
        pushed: Vec<(usize, RenameMap)>,
    },
    /// Into the sides of a binary operator.
    Sides {
        below: NodeId,
        left: Vec<usize>,
        right: Vec<usize>,
    },
}

pub struct PushdownBindings {
    conditions: Vec<Operand>,
    target: Pushdown,
}

impl PushdownBindings {
    fn pushed_mask(&self) -> Vec<bool> {
        let mut mask = vec![false; self.conditions.len()];
        let mut mark = |i: &usize| mask[*i] = true;
        match &self.target {
            Pushdown::Swap { .. } => return vec![true; self.conditions.len()],
            Pushdown::SetOp { pushed, .. } => pushed.iter().for_each(&mut mark),
            Pushdown::Projection { pushed, .. } => pushed.iter().map(|(i, _)| i).for_each(&mut mark),
            Pushdown::Sides { left, right, .. } => left.iter().chain(right).for_each(&mut mark),
        }
        mask
    }
}

impl PatternRule for PushdownSelections {
    type Bindings = PushdownBindings;

    fn name(&self) -> &'static str {
        "PushdownSelections"
    }

    fn description(&self) -> &'static str {
        "Move selections closer to the sources they filter"
    }

    fn operator(&self) -> OpKind {
        OpKind::Selection
    }

    fn matches(&self, ctx: &RuleContext<'_>, node: NodeId) -> Option<PushdownBindings> {
        let plan = &*ctx.plan;
        if !is_run_top(plan, node) {
            return None;
        }
        let run = selection_run(plan, node);
        let conditions: Vec<Operand> = run.iter().map(|&s| condition(plan, s)).collect();
        let below = source_of(plan, run[run.len() - 1]);
        let free = |cond: &Operand| ctx.deps.of_operand(plan, cond);

        let target = match plan.op(below) {
            PlanOp::OrderBy(_) => Pushdown::Swap { below },
            PlanOp::Distinct(d) => {
                // Keyed duplicate elimination keeps an arbitrary row per key,
                // so only conditions on the keys commute with it.
                if let Some(keys) = &d.attrs {
                    let keys: IdSet = keys.iter().filter_map(Operand::as_attr).collect();
                    let schema = plan.schema(below).set();
                    if !conditions
                        .iter()
                        .all(|c| keys.contains_all(&free(c).restriction(schema)))
                    {
                        return None;
                    }
                }
                Pushdown::Swap { below }
            }
            PlanOp::Union(op) | PlanOp::Intersection(op) | PlanOp::Difference(op) => {
                let (left, right) = (plan.try_schema(op.left)?, plan.try_schema(op.right)?);
                if !left.is_known() || !right.is_known() || left.len() != right.len() {
                    return None;
                }
                let right_renames: RenameMap = left
                    .iter()
                    .zip(right.iter())
                    .filter(|(l, r)| l != r)
                    .map(|(l, r)| (l.clone(), r.clone()))
                    .collect();
                let checker = ctx.rename_checker();
                let pushed = (0..conditions.len())
                    .filter(|&i| checker.can_rename(plan, &conditions[i], &right_renames))
                    .collect();
                Pushdown::SetOp {
                    below,
                    pushed,
                    right_renames,
                }
            }
            PlanOp::Projection(proj) => {
                let names = plan.schema(below).set();
                let inner = plan.schema(proj.source).set();
                let checker = ctx.rename_checker();
                let mut pushed = Vec::new();
                'conds: for (i, cond) in conditions.iter().enumerate() {
                    let reads = free(cond);
                    if reads.difference(names).intersects(inner) {
                        continue;
                    }
                    let mut renames = RenameMap::new();
                    for name in reads.restriction(names).iter() {
                        match proj.attr(&name).and_then(|a| a.source_attr()) {
                            Some(attr) if *attr == name => {}
                            Some(attr) => {
                                renames.insert(name, attr.clone());
                            }
                            None => continue 'conds,
                        }
                    }
                    if checker.can_rename(plan, cond, &renames) {
                        pushed.push((i, renames));
                    }
                }
                Pushdown::Projection { below, pushed }
            }
            PlanOp::CartesianProduct(_) | PlanOp::Join(_) | PlanOp::ProjectionConcat(_) => {
                let (left, right) = match plan.op(below) {
                    PlanOp::CartesianProduct(p) => (p.left, p.right),
                    PlanOp::Join(j) if !j.is_outer() => (j.left, j.right),
                    PlanOp::ProjectionConcat(pc) if !pc.outer => (pc.source, pc.mapping),
                    _ => return None,
                };
                let (ls, rs) = (plan.schema(left).set(), plan.schema(right).set());
                let both = ls.union(rs);
                let (mut to_left, mut to_right) = (Vec::new(), Vec::new());
                for (i, cond) in conditions.iter().enumerate() {
                    let reads = free(cond).restriction(&both);
                    if ls.contains_all(&reads) {
                        to_left.push(i);
                    }
                    if rs.contains_all(&reads) {
                        to_right.push(i);
                    }
                }
                Pushdown::Sides {
                    below,
                    left: to_left,
                    right: to_right,
                }
            }
            _ => return None,
        };

        let bindings = PushdownBindings { conditions, target };
        bindings.pushed_mask().contains(&true).then_some(bindings)
    }

    fn transform(
        &self,
        ctx: &mut RuleContext<'_>,
        node: NodeId,
        bindings: PushdownBindings,
    ) -> PlexusResult<NodeId> {
        let lang = ctx.plan.lang(node);
        let mask = bindings.pushed_mask();
        let stay: Vec<Operand> = bindings
            .conditions
            .iter()
            .zip(&mask)
            .filter(|(_, pushed)| !**pushed)
            .map(|(c, _)| c.clone())
            .collect();
        let pick = |indices: &[usize]| -> Vec<Operand> {
            indices.iter().map(|&i| bindings.conditions[i].clone()).collect()
        };

        let below = match &bindings.target {
            Pushdown::Swap { below } => {
                let inner = source_of(ctx.plan, *below);
                let chain = stack_selections(ctx.plan, lang, bindings.conditions.clone(), inner);
                ctx.plan.replace_child(*below, inner, chain);
                *below
            }
            Pushdown::SetOp {
                below,
                pushed,
                right_renames,
            } => {
                let (left, right) = match ctx.plan.op(*below) {
                    PlanOp::Union(op) | PlanOp::Intersection(op) | PlanOp::Difference(op) => {
                        (op.left, op.right)
                    }
                    op => unreachable!("set operation expected, found {}", op.name()),
                };
                let renamer = ctx.renamer();
                let mut copies = Vec::with_capacity(pushed.len());
                for &i in pushed {
                    let copy = match &bindings.conditions[i] {
                        Operand::Node(n) => Operand::Node(ctx.plan.clone_subtree(*n)),
                        attr => attr.clone(),
                    };
                    copies.push(renamer.rename(ctx.plan, &copy, right_renames));
                }
                let left_chain = stack_selections(ctx.plan, lang, pick(pushed.as_slice()), left);
                let right_chain = stack_selections(ctx.plan, lang, copies, right);
                ctx.plan.replace_child(*below, left, left_chain);
                ctx.plan.replace_child(*below, right, right_chain);
                *below
            }
            Pushdown::Projection { below, pushed } => {
                let inner = source_of(ctx.plan, *below);
                let renamer = ctx.renamer();
                let moved: Vec<Operand> = pushed
                    .iter()
                    .map(|(i, renames)| renamer.rename(ctx.plan, &bindings.conditions[*i], renames))
                    .collect();
                let chain = stack_selections(ctx.plan, lang, moved, inner);
                ctx.plan.replace_child(*below, inner, chain);
                *below
            }
            Pushdown::Sides { below, left, right } => {
                let (l, r) = match ctx.plan.op(*below) {
                    PlanOp::CartesianProduct(p) => (p.left, p.right),
                    PlanOp::Join(j) => (j.left, j.right),
                    PlanOp::ProjectionConcat(pc) => (pc.source, pc.mapping),
                    op => unreachable!("binary operator expected, found {}", op.name()),
                };
                // A condition going both ways is copied for the right side.
                let mut right_conds = Vec::with_capacity(right.len());
                for &i in right {
                    let cond = &bindings.conditions[i];
                    right_conds.push(match cond {
                        Operand::Node(n) if left.contains(&i) => {
                            Operand::Node(ctx.plan.clone_subtree(*n))
                        }
                        other => other.clone(),
                    });
                }
                let left_chain = stack_selections(ctx.plan, lang, pick(left.as_slice()), l);
                let right_chain = stack_selections(ctx.plan, lang, right_conds, r);
                ctx.plan.replace_child(*below, l, left_chain);
                ctx.plan.replace_child(*below, r, right_chain);
                *below
            }
        };

        Ok(stack_selections(ctx.plan, lang, stay, below))
    }
}
