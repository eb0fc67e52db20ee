//! Projection merging and dead attribute elimination.

use std::collections::{HashMap, HashSet};

use common_error::{PlexusError, PlexusResult};
use log::debug;
use plexus_core::{AttrId, IdSet, RenameMap};
use plexus_logical::expr::{AstExpr, Calculation};
use plexus_logical::ops::{ProjectedAttr, Projection};
use plexus_logical::{NodeId, OpKind, Operand, Plan, PlanOp};

use super::rule::{PatternRule, RuleContext};
use super::support::source_of;

/// Collapses a projection over a projection into one.
///
/// Plain inner attributes are renamed through. A computed inner attribute
/// is moved into the outer expression that reads it, and into calculations
/// by substituting its source form and recompiling. The merge is refused
/// when it would evaluate a non-constant computation more than once, when a
/// computation has no source form to substitute, or when the outer
/// projection reads a name the inner source would capture. Inner
/// attributes the outer projection never reads are dropped instead.
pub struct MergeProjections;

pub enum MergeBindings {
    Collapse {
        inner: NodeId,
        renames: RenameMap,
        computed: HashMap<AttrId, NodeId>,
    },
    Prune {
        inner: NodeId,
        keep: Vec<ProjectedAttr>,
    },
}

/// The source form a computed attribute contributes when substituted into
/// a calculation.
fn substitution(plan: &Plan, id: NodeId) -> Option<AstExpr> {
    match plan.op(id) {
        PlanOp::Calculation(calc) => calc.original.clone(),
        PlanOp::Literal(lit) => Some(AstExpr::Literal(lit.value.clone())),
        _ => None,
    }
}

fn is_constant(plan: &Plan, id: NodeId) -> bool {
    match plan.op(id) {
        PlanOp::Calculation(calc) => calc.literal,
        PlanOp::Literal(_) => true,
        _ => false,
    }
}

impl MergeProjections {
    fn collapse(
        &self,
        ctx: &RuleContext<'_>,
        outer: &Projection,
        inner_id: NodeId,
        inner: &Projection,
    ) -> Option<MergeBindings> {
        let plan = &*ctx.plan;
        let names = plan.schema(inner_id).set();
        let provided = plan.schema(inner.source).set();

        let mut renames = RenameMap::new();
        let mut computed = HashMap::new();
        for attr in &inner.attrs {
            match &attr.expr {
                Operand::Attr(src) if *src == attr.name => {}
                Operand::Attr(src) => {
                    renames.insert(attr.name.clone(), src.clone());
                }
                Operand::Node(n) => {
                    computed.insert(attr.name.clone(), *n);
                }
            }
        }
        let computed_names: IdSet = computed.keys().collect();

        let checker = ctx.rename_checker();
        let mut uses: HashMap<&AttrId, usize> = HashMap::new();
        for attr in &outer.attrs {
            let reads = ctx.deps.of_operand(plan, &attr.expr);
            if reads.difference(names).intersects(provided) {
                return None;
            }
            let e = match &attr.expr {
                Operand::Attr(id) => {
                    if let Some((name, _)) = computed.get_key_value(id) {
                        *uses.entry(name).or_default() += 1;
                    }
                    continue;
                }
                Operand::Node(e) => *e,
            };
            if !checker.can_rename(plan, &attr.expr, &renames) {
                return None;
            }
            if !reads.intersects(&computed_names) {
                continue;
            }

            // Computed attributes can only be spliced into the top level of
            // a calculation that keeps its source form.
            let PlanOp::Calculation(calc) = plan.op(e) else {
                return None;
            };
            calc.original.as_ref()?;
            if computed_names.iter().any(|n| reads.covers(&n) && !calc.dependencies.has(&n)) {
                return None;
            }
            for (i, arg) in calc.args.iter().enumerate() {
                match arg {
                    Operand::Attr(id) => {
                        if let Some((name, &c)) = computed.get_key_value(id) {
                            substitution(plan, c)?;
                            *uses.entry(name).or_default() += calc.meta(i).uses;
                        }
                    }
                    Operand::Node(sub) => {
                        if ctx.deps.of(plan, *sub).intersects(&computed_names) {
                            return None;
                        }
                    }
                }
            }
        }

        if uses
            .iter()
            .any(|(name, &count)| count > 1 && !is_constant(plan, computed[*name]))
        {
            return None;
        }
        Some(MergeBindings::Collapse {
            inner: inner_id,
            renames,
            computed,
        })
    }

    /// Rewrite one outer expression for evaluation over the inner source.
    fn merge_expr(
        &self,
        ctx: &mut RuleContext<'_>,
        e: NodeId,
        renames: &RenameMap,
        computed: &HashMap<AttrId, NodeId>,
    ) -> PlexusResult<Operand> {
        let renamer = ctx.renamer();
        let reads = ctx.deps.of(ctx.plan, e);
        if !computed.keys().any(|n| reads.covers(n)) {
            return Ok(renamer.rename(ctx.plan, &Operand::Node(e), renames));
        }

        let (nested, mut ast) = match ctx.plan.op(e) {
            PlanOp::Calculation(Calculation {
                args,
                original: Some(original),
                ..
            }) => (
                args.iter().filter_map(Operand::as_node).collect::<Vec<_>>(),
                original.clone(),
            ),
            op => {
                return Err(PlexusError::internal(format!(
                    "cannot substitute into {} {e}",
                    op.name()
                )));
            }
        };
        for sub in nested {
            renamer.rename(ctx.plan, &Operand::Node(sub), renames);
        }

        let mut replacements: HashMap<AttrId, AstExpr> = renames
            .iter()
            .map(|(from, to)| (from, AstExpr::Attr(to.clone())))
            .collect();
        for (name, &c) in computed {
            if let Some(form) = substitution(ctx.plan, c) {
                replacements.insert(name.clone(), form);
            }
        }
        ast.substitute(&replacements);

        let params = ctx.compilers.compile(ctx.plan.lang(e), &ast)?;
        ctx.plan
            .replace_op(e, PlanOp::Calculation(Calculation::from_params(params, Some(ast))));
        ctx.deps.invalidate_upstream(ctx.plan, e);
        Ok(Operand::Node(e))
    }
}

impl PatternRule for MergeProjections {
    type Bindings = MergeBindings;

    fn name(&self) -> &'static str {
        "MergeProjections"
    }

    fn description(&self) -> &'static str {
        "Collapse consecutive projections and drop unused attributes"
    }

    fn operator(&self) -> OpKind {
        OpKind::Projection
    }

    fn matches(&self, ctx: &RuleContext<'_>, node: NodeId) -> Option<MergeBindings> {
        let plan = &*ctx.plan;
        let PlanOp::Projection(outer) = plan.op(node) else {
            return None;
        };
        let inner_id = outer.source;
        let PlanOp::Projection(inner) = plan.op(inner_id) else {
            return None;
        };

        if let Some(bindings) = self.collapse(ctx, outer, inner_id, inner) {
            return Some(bindings);
        }

        let mut used = IdSet::new();
        for attr in &outer.attrs {
            used.extend_from(&ctx.deps.of_operand(plan, &attr.expr));
        }
        // A `*` attribute stays while any reference falls under it.
        let keep: Vec<ProjectedAttr> = inner
            .attrs
            .iter()
            .filter(|attr| {
                let single: IdSet = std::iter::once(&attr.name).collect();
                used.covers(&attr.name) || used.iter().any(|u| single.covers(&u))
            })
            .cloned()
            .collect();
        (keep.len() < inner.attrs.len()).then_some(MergeBindings::Prune {
            inner: inner_id,
            keep,
        })
    }

    fn transform(
        &self,
        ctx: &mut RuleContext<'_>,
        node: NodeId,
        bindings: MergeBindings,
    ) -> PlexusResult<NodeId> {
        match bindings {
            MergeBindings::Prune { inner, keep } => {
                let source = source_of(ctx.plan, inner);
                debug!("dropping unused attributes of projection {inner}");
                ctx.plan
                    .replace_op(inner, PlanOp::Projection(Projection { attrs: keep, source }));
                ctx.deps.invalidate_upstream(ctx.plan, inner);
                Ok(node)
            }
            MergeBindings::Collapse {
                inner,
                renames,
                computed,
            } => {
                let outer_attrs = match ctx.plan.op(node) {
                    PlanOp::Projection(p) => p.attrs.clone(),
                    op => {
                        return Err(PlexusError::internal(format!(
                            "{} {node} is not a projection",
                            op.name()
                        )));
                    }
                };
                let source = source_of(ctx.plan, inner);
                let lang = ctx.plan.lang(node);

                let mut placed = HashSet::new();
                let mut attrs = Vec::with_capacity(outer_attrs.len());
                for attr in outer_attrs {
                    let expr = match &attr.expr {
                        Operand::Attr(id) => match computed.get(id) {
                            Some(&c) if placed.insert(c) => Operand::Node(c),
                            Some(&c) => Operand::Node(ctx.plan.clone_subtree(c)),
                            None => Operand::Attr(renames.apply(id)),
                        },
                        Operand::Node(e) => self.merge_expr(ctx, *e, &renames, &computed)?,
                    };
                    attrs.push(ProjectedAttr::new(expr, attr.name));
                }

                let merged = ctx.plan.builder(lang).projection(attrs, source);
                ctx.deps.invalidate_subtree(ctx.plan, merged);
                Ok(merged)
            }
        }
    }
}
