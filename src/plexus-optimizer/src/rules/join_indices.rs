//! Index-backed join rewriting.

use common_error::{PlexusError, PlexusResult};
use log::debug;
use plexus_core::{AttrId, IdSet, RenameMap, Symbol};
use plexus_logical::ops::ProjectedAttr;
use plexus_logical::{NodeId, OpKind, Operand, Plan, PlanOp};

use super::rule::{PatternRule, RuleContext};
use super::support::{indexed_source_name, stack_selections};

/// Turns a join into a dependent join probing an index.
///
/// One side of the join (the indexed side) must read from a named source
/// with registered indices. The other side is re-projected under a fresh
/// namespace, every join condition is renamed to refer to it, and the
/// conditions are applied as selections over the indexed side, matched
/// ones lowest so a later pass can turn them into an index scan. The two
/// are combined with a `ProjectionConcat` and a final projection restores
/// the join's column names and order.
///
/// The right side is tried first. A side whose rows the join preserves
/// cannot be the indexed one.
pub struct JoinIndices;

pub struct JoinIndexBindings {
    indexed: NodeId,
    other: NodeId,
    indexed_is_left: bool,
    outer: bool,
    matched: Vec<usize>,
}

/// `x -> ext.x` for every attribute of `attrs`.
fn external_names<'a>(attrs: impl Iterator<Item = &'a AttrId>, ext: Symbol) -> RenameMap {
    attrs.map(|x| (x.clone(), x.prefixed(ext))).collect()
}

/// Whether some argument of `cond` reads from `side` and nothing else.
/// Conditions without such an argument give an index nothing to look up.
fn has_side_argument(ctx: &RuleContext<'_>, plan: &Plan, cond: &Operand, side: &IdSet) -> bool {
    let only_side = |arg: &Operand| {
        let reads = ctx.deps.of_operand(plan, arg);
        !reads.is_empty() && reads.difference(side).is_empty()
    };
    match cond {
        Operand::Node(id) => match plan.op(*id) {
            PlanOp::Calculation(calc) => calc.args.iter().any(only_side),
            _ => only_side(cond),
        },
        Operand::Attr(_) => only_side(cond),
    }
}

fn attrs_of(plan: &Plan, id: NodeId) -> Vec<AttrId> {
    plan.schema(id).iter().cloned().collect()
}

impl PatternRule for JoinIndices {
    type Bindings = JoinIndexBindings;

    fn name(&self) -> &'static str {
        "JoinIndices"
    }

    fn description(&self) -> &'static str {
        "Rewrite joins over indexed sources into index lookups"
    }

    fn operator(&self) -> OpKind {
        OpKind::Join
    }

    fn matches(&self, ctx: &RuleContext<'_>, node: NodeId) -> Option<JoinIndexBindings> {
        let plan = &*ctx.plan;
        let PlanOp::Join(join) = plan.op(node) else {
            return None;
        };
        if join.conditions.is_empty() {
            return None;
        }

        let checker = ctx.rename_checker();
        for indexed_is_left in [false, true] {
            let (indexed, other, indexed_outer, outer) = if indexed_is_left {
                (join.left, join.right, join.left_outer, join.right_outer)
            } else {
                (join.right, join.left, join.right_outer, join.left_outer)
            };
            if indexed_outer {
                continue;
            }
            let Some(source) = indexed_source_name(plan, indexed) else {
                continue;
            };
            let indices = ctx.indices.get(source);
            if indices.is_empty() {
                continue;
            }
            let (Some(indexed_schema), Some(other_schema)) =
                (plan.try_schema(indexed), plan.try_schema(other))
            else {
                continue;
            };
            if !indexed_schema.is_known() || !other_schema.is_known() {
                continue;
            }

            // The transform mints this very symbol.
            let renames = external_names(other_schema.iter(), plan.peek_symbol());
            if !join
                .conditions
                .iter()
                .all(|c| checker.can_rename(plan, c, &renames))
            {
                continue;
            }

            let positions: Vec<usize> = (0..join.conditions.len())
                .filter(|&i| {
                    has_side_argument(ctx, plan, &join.conditions[i], indexed_schema.set())
                })
                .collect();
            if positions.is_empty() {
                continue;
            }
            let candidates: Vec<Operand> =
                positions.iter().map(|&i| join.conditions[i].clone()).collect();

            for index in indices {
                let Some(found) = index.matches(plan, &candidates, Some(&renames)) else {
                    continue;
                };
                if found.is_empty() {
                    continue;
                }
                debug!("join {node} can use index {} on {source}", index.name());
                return Some(JoinIndexBindings {
                    indexed,
                    other,
                    indexed_is_left,
                    outer,
                    matched: found.into_iter().map(|k| positions[k]).collect(),
                });
            }
        }
        None
    }

    fn transform(
        &self,
        ctx: &mut RuleContext<'_>,
        node: NodeId,
        bindings: JoinIndexBindings,
    ) -> PlexusResult<NodeId> {
        let conditions = match ctx.plan.op(node) {
            PlanOp::Join(join) => join.conditions.clone(),
            op => {
                return Err(PlexusError::internal(format!(
                    "{} {node} is not a join",
                    op.name()
                )));
            }
        };
        let lang = ctx.plan.lang(node);
        let ext = ctx.plan.fresh_symbol();
        let other_attrs = attrs_of(ctx.plan, bindings.other);
        let indexed_attrs = attrs_of(ctx.plan, bindings.indexed);
        let renames = external_names(other_attrs.iter(), ext);

        let external = other_attrs
            .iter()
            .map(|x| ProjectedAttr::new(x.clone(), renames.apply(x)))
            .collect();
        let external = ctx.plan.builder(lang).projection(external, bindings.other);

        let renamer = ctx.renamer();
        let (mut matched, mut unmatched) = (Vec::new(), Vec::new());
        for (i, cond) in conditions.iter().enumerate() {
            let renamed = renamer.rename(ctx.plan, cond, &renames);
            if bindings.matched.contains(&i) {
                matched.push(renamed);
            } else {
                unmatched.push(renamed);
            }
        }
        unmatched.extend(matched);
        let mapping = stack_selections(ctx.plan, lang, unmatched, bindings.indexed);

        let mut b = ctx.plan.builder(lang);
        let concat = b.projection_concat(mapping, bindings.outer, external);

        let restore_other = |x: AttrId| ProjectedAttr::new(renames.apply(&x), x);
        let (left, right): (Vec<_>, Vec<_>) = if bindings.indexed_is_left {
            (
                indexed_attrs.into_iter().map(ProjectedAttr::keep).collect(),
                other_attrs.into_iter().map(restore_other).collect(),
            )
        } else {
            (
                other_attrs.into_iter().map(restore_other).collect(),
                indexed_attrs.into_iter().map(ProjectedAttr::keep).collect(),
            )
        };
        Ok(b.projection(left.into_iter().chain(right).collect(), concat))
    }
}
