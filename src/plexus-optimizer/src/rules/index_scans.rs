//! Index scan introduction.

use std::sync::Arc;

use common_error::PlexusResult;
use log::debug;
use plexus_logical::{NodeId, OpKind, Operand};

use super::rule::{PatternRule, RuleContext};
use super::support::{
    condition, is_run_top, selection_run, source_name, source_of, stack_selections,
};
use crate::index::Index;

/// Replaces a named source under a run of selections by an index scan.
///
/// Named sources are the ones indices are registered on: a `TupleSource`,
/// or a `MapFromItem` reading an `ItemSource`.
///
/// The indices registered for the source are asked in registration order
/// and the first one that serves any of the run's conditions wins. Its
/// conditions are folded into the scan's accessor; the rest stay above the
/// scan in their original order.
pub struct IndexScans;

pub struct IndexScanBindings {
    index: Arc<dyn Index>,
    name: String,
    source: NodeId,
    conditions: Vec<Operand>,
    matched: Vec<usize>,
}

impl PatternRule for IndexScans {
    type Bindings = IndexScanBindings;

    fn name(&self) -> &'static str {
        "IndexScans"
    }

    fn description(&self) -> &'static str {
        "Serve selections over an indexed source with an index scan"
    }

    fn operator(&self) -> OpKind {
        OpKind::Selection
    }

    fn matches(&self, ctx: &RuleContext<'_>, node: NodeId) -> Option<IndexScanBindings> {
        let plan = &*ctx.plan;
        if !is_run_top(plan, node) {
            return None;
        }
        let run = selection_run(plan, node);
        let source = source_of(plan, run[run.len() - 1]);
        let name = source_name(plan, source)?;

        let conditions: Vec<Operand> = run.iter().map(|&s| condition(plan, s)).collect();
        ctx.indices.get(name).iter().find_map(|index| {
            let matched = index.matches(plan, &conditions, None)?;
            (!matched.is_empty()).then(|| IndexScanBindings {
                index: Arc::clone(index),
                name: name.to_string(),
                source,
                conditions: conditions.clone(),
                matched,
            })
        })
    }

    fn transform(
        &self,
        ctx: &mut RuleContext<'_>,
        node: NodeId,
        bindings: IndexScanBindings,
    ) -> PlexusResult<NodeId> {
        let lang = ctx.plan.lang(node);
        let name = bindings.name;
        let schema = ctx.plan.schema(bindings.source).clone();

        let (mut matched, mut unmatched) = (Vec::new(), Vec::new());
        for (i, cond) in bindings.conditions.into_iter().enumerate() {
            if bindings.matched.contains(&i) {
                matched.push(cond);
            } else {
                unmatched.push(cond);
            }
        }

        let index = &bindings.index;
        let accessor = index.create_accessor(ctx.plan, ctx.compilers, lang, &matched)?;
        debug!(
            "scanning {name} through {} for {} condition(s)",
            index.name(),
            matched.len()
        );
        let scan = ctx
            .plan
            .builder(lang)
            .index_scan(name, index.name(), accessor, schema);
        Ok(stack_selections(ctx.plan, lang, unmatched, scan))
    }
}

#[cfg(test)]
mod tests {
    use plexus_core::{AttrId, RenameMap};
    use plexus_logical::expr::Compilers;
    use plexus_logical::{Lang, Plan, PlanOp};

    use super::*;
    use crate::analysis::TransitiveDeps;
    use crate::index::IndexRegistry;
    use crate::rules::OptimizationRule;

    /// Serves a fixed set of candidate positions.
    struct FixedIndex {
        name: &'static str,
        serves: Option<Vec<usize>>,
    }

    impl Index for FixedIndex {
        fn name(&self) -> &str {
            self.name
        }

        fn matches(
            &self,
            _plan: &Plan,
            _candidates: &[Operand],
            _renames: Option<&RenameMap>,
        ) -> Option<Vec<usize>> {
            self.serves.clone()
        }

        fn create_accessor(
            &self,
            plan: &mut Plan,
            _compilers: &Compilers,
            lang: Lang,
            exprs: &[Operand],
        ) -> PlexusResult<Operand> {
            Ok(Operand::Node(plan.builder(lang).literal(exprs.len() as i64)))
        }
    }

    fn fixed(name: &'static str, serves: Option<Vec<usize>>) -> Arc<dyn Index> {
        Arc::new(FixedIndex { name, serves })
    }

    fn a(name: &str) -> AttrId {
        AttrId::parse(name)
    }

    fn apply(plan: &mut Plan, indices: &IndexRegistry, node: NodeId) -> Option<NodeId> {
        let deps = TransitiveDeps::new();
        let compilers = Compilers::default();
        let mut ctx = RuleContext::new(plan, &deps, indices, &compilers);
        let parent = ctx.plan.parent(node);
        let result = IndexScans.apply(&mut ctx, node).unwrap();
        if !result.changed {
            return None;
        }
        ctx.plan.replace_at(parent, node, result.node);
        Some(result.node)
    }

    fn filtered(plan: &mut Plan) -> (NodeId, NodeId) {
        let mut b = plan.builder(Lang::Sql);
        let source = b.tuple_source("test", [a("test.x")]);
        let bar = b.selection(a("bar"), source);
        let foo = b.selection(a("foo"), bar);
        (foo, source)
    }

    #[test]
    fn test_unmatched_selection_stays_on_top() {
        let mut plan = Plan::new();
        let (foo, _) = filtered(&mut plan);
        plan.set_root(foo);
        let mut indices = IndexRegistry::new();
        indices.register("test", fixed("by_bar", Some(vec![1])));

        let top = apply(&mut plan, &indices, foo).unwrap();
        assert_eq!(plan.root(), Some(top));
        assert_eq!(condition(&plan, top), Operand::Attr(a("foo")));
        let PlanOp::IndexScan(scan) = plan.op(source_of(&plan, top)) else {
            panic!("expected an index scan");
        };
        assert_eq!(scan.name, "test");
        assert_eq!(scan.index, "by_bar");
        assert_eq!(plan.schema(top).to_string(), "[test.x]");
        plan.validate(top);
    }

    #[test]
    fn test_first_registered_index_wins() {
        let mut plan = Plan::new();
        let (foo, _) = filtered(&mut plan);
        plan.set_root(foo);
        let mut indices = IndexRegistry::new();
        indices.register("test", fixed("none", None));
        indices.register("test", fixed("empty", Some(vec![])));
        for name in ["first", "second", "third"] {
            indices.register("test", fixed(name, Some(vec![0, 1])));
        }

        let top = apply(&mut plan, &indices, foo).unwrap();
        let PlanOp::IndexScan(scan) = plan.op(top) else {
            panic!("expected an index scan");
        };
        assert_eq!(scan.index, "first");
    }

    #[test]
    fn test_item_source_rows_can_be_scanned() {
        let mut plan = Plan::new();
        let mut b = plan.builder(Lang::Sql);
        let items = b.item_source("docs");
        let rows = b.map_from_item(a("d"), items);
        let sel = b.selection(a("ok"), rows);
        plan.set_root(sel);
        let mut indices = IndexRegistry::new();
        indices.register("docs", fixed("docs_by_ok", Some(vec![0])));

        let top = apply(&mut plan, &indices, sel).unwrap();
        let PlanOp::IndexScan(scan) = plan.op(top) else {
            panic!("expected an index scan");
        };
        assert_eq!(scan.name, "docs");
        assert_eq!(scan.index, "docs_by_ok");
        assert_eq!(plan.schema(top).to_string(), "[d]");
        plan.validate(top);
        assert_eq!(plan.collect_garbage(), 3);
    }

    #[test]
    fn test_requires_a_named_source_and_an_index() {
        let mut plan = Plan::new();
        let (foo, source) = filtered(&mut plan);
        plan.set_root(foo);
        assert_eq!(apply(&mut plan, &IndexRegistry::new(), foo), None);

        let mut indices = IndexRegistry::new();
        indices.register("test", fixed("all", Some(vec![0])));
        let bar = plan.parent(source).unwrap();
        // Only the top of a run is considered.
        assert_eq!(apply(&mut plan, &indices, bar), None);
    }
}
