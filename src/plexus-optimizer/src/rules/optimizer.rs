//! The driver that applies rules to a plan until nothing changes.
//!
//! Each pass walks the tree bottom-up. At every node the rules registered
//! for its operator kind are tried in order; when one fires, its result is
//! installed in the node's slot, the new subtree's children are revisited,
//! and the rules are tried again on the result.

use common_config::{OptimizerSettings, RuleKind};
use common_error::{PlexusError, PlexusResult, ensure};
use log::{debug, trace};
use plexus_logical::expr::Compilers;
use plexus_logical::{NodeId, Plan};

use super::rule::{OptimizationRule, OptimizedPlan, RuleContext, RuleTrace};
use super::{IndexScans, JoinIndices, MergeProjections, PushdownSelections, UnnestSubqueries};
use crate::analysis::TransitiveDeps;
use crate::index::IndexRegistry;

/// Rewrites at one node beyond this mean two rules undo each other.
const MAX_REWRITES_PER_NODE: usize = 256;

/// Configuration for the optimizer.
#[derive(Debug, Clone)]
pub struct OptimizerConfig {
    /// Maximum number of whole-plan passes before stopping.
    pub max_passes: usize,
    /// Whether to enable detailed tracing.
    pub enable_trace: bool,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            max_passes: 16,
            enable_trace: false,
        }
    }
}

impl OptimizerConfig {
    /// Create a new config with the given pass limit.
    pub fn with_max_passes(mut self, max: usize) -> Self {
        self.max_passes = max;
        self
    }

    /// Enable or disable tracing.
    pub fn with_trace(mut self, enable: bool) -> Self {
        self.enable_trace = enable;
        self
    }
}

/// Rule-based optimizer over a mutable [`Plan`].
///
/// Every rule's transform removes what its match looked for, so a plan
/// reaches a fixpoint; the pass limit and the per-node rewrite limit only
/// guard against rule sets that undo each other.
pub struct Optimizer {
    /// The rules to apply, in the order they are tried at a node.
    rules: Vec<Box<dyn OptimizationRule>>,
    /// Configuration.
    config: OptimizerConfig,
    indices: IndexRegistry,
    compilers: Compilers,
}

impl Optimizer {
    /// Create a new optimizer with the given rules.
    pub fn new(rules: Vec<Box<dyn OptimizationRule>>) -> Self {
        Self {
            rules,
            config: OptimizerConfig::default(),
            indices: IndexRegistry::new(),
            compilers: Compilers::default(),
        }
    }

    /// Create a new optimizer with custom config.
    pub fn with_config(rules: Vec<Box<dyn OptimizationRule>>, config: OptimizerConfig) -> Self {
        Self {
            config,
            ..Self::new(rules)
        }
    }

    /// Build the rule list named by `settings`.
    pub fn from_config(
        settings: &OptimizerSettings,
        indices: IndexRegistry,
        compilers: Compilers,
    ) -> Self {
        let mut rules: Vec<Box<dyn OptimizationRule>> = Vec::new();
        for kind in &settings.rules {
            match kind {
                RuleKind::UnnestSubqueries => {
                    rules.push(Box::new(UnnestSubqueries::calculations()));
                    rules.push(Box::new(UnnestSubqueries::fn_calls()));
                }
                RuleKind::PushdownSelections => rules.push(Box::new(PushdownSelections)),
                RuleKind::MergeProjections => rules.push(Box::new(MergeProjections)),
                RuleKind::JoinIndices => rules.push(Box::new(JoinIndices)),
                RuleKind::IndexScans => rules.push(Box::new(IndexScans)),
            }
        }
        let config = OptimizerConfig::default()
            .with_max_passes(settings.max_passes)
            .with_trace(settings.enable_trace);
        Self {
            rules,
            config,
            indices,
            compilers,
        }
    }

    /// Use `indices` for the index-aware rules.
    pub fn with_indices(mut self, indices: IndexRegistry) -> Self {
        self.indices = indices;
        self
    }

    /// Use `compilers` to recompile rewritten expressions.
    pub fn with_compilers(mut self, compilers: Compilers) -> Self {
        self.compilers = compilers;
        self
    }

    /// Add a rule to the optimizer.
    pub fn add_rule<R: OptimizationRule + 'static>(&mut self, rule: R) {
        self.rules.push(Box::new(rule));
    }

    /// Names of the rules, in the order they are tried.
    pub fn rule_names(&self) -> Vec<&'static str> {
        self.rules.iter().map(|r| r.name()).collect()
    }

    /// Optimize `plan` in place.
    ///
    /// Nodes left unreachable by the rewrites are dropped at the end, so
    /// ids of replaced nodes must not be used afterwards.
    pub fn optimize(&self, plan: &mut Plan) -> PlexusResult<OptimizedPlan> {
        let root = plan
            .root()
            .ok_or_else(|| PlexusError::internal("cannot optimize a plan without a root"))?;
        let deps = TransitiveDeps::new();
        let mut result = OptimizedPlan::new(root);

        loop {
            if result.passes >= self.config.max_passes {
                debug!(
                    "Optimizer reached max passes ({}), stopping",
                    self.config.max_passes
                );
                break;
            }
            result.passes += 1;

            let Some(root) = plan.root() else {
                return Err(PlexusError::internal("a rewrite detached the plan root"));
            };
            let mut ctx = RuleContext::new(plan, &deps, &self.indices, &self.compilers);
            if !self.visit(&mut ctx, root, &mut result)? {
                debug!("No changes in pass {}, reached fixpoint", result.passes);
                break;
            }
        }

        result.root = plan
            .root()
            .ok_or_else(|| PlexusError::internal("a rewrite detached the plan root"))?;
        let dropped = plan.collect_garbage();
        debug!(
            "Optimization finished after {} passes, {} rules applied, {dropped} nodes dropped",
            result.passes, result.rules_applied
        );
        Ok(result)
    }

    /// Post-order walk rewriting every node of the subtree at `id`.
    fn visit(
        &self,
        ctx: &mut RuleContext<'_>,
        id: NodeId,
        result: &mut OptimizedPlan,
    ) -> PlexusResult<bool> {
        let mut changed = false;
        for child in ctx.plan.op(id).children() {
            changed |= self.visit(ctx, child, result)?;
        }

        let mut current = id;
        let mut rewrites = 0;
        'retry: loop {
            let kind = ctx.plan.kind(current);
            for rule in self.rules.iter().filter(|r| r.operator() == kind) {
                let parent = ctx.plan.parent(current);
                let before = self.config.enable_trace.then(|| ctx.plan.explain(current));
                let applied = rule.apply(ctx, current)?;
                if !applied.changed {
                    trace!("Rule '{}' does not match {current}", rule.name());
                    continue;
                }

                rewrites += 1;
                ensure!(
                    rewrites <= MAX_REWRITES_PER_NODE,
                    InternalError: "rewriting {current} does not converge, last rule: {}",
                    rule.name()
                );
                changed = true;
                result.rules_applied += 1;

                let next = applied.node;
                ctx.plan.replace_at(parent, current, next);
                ctx.deps.invalidate_subtree(ctx.plan, next);
                ctx.deps.invalidate_upstream(ctx.plan, next);
                debug!("Rule '{}' rewrote {current} into {next}", rule.name());

                if let Some(before) = before {
                    result.trace.push(RuleTrace::new(
                        rule.name(),
                        before,
                        ctx.plan.explain(next),
                        true,
                    ));
                }
                #[cfg(debug_assertions)]
                if let Some(root) = ctx.plan.root() {
                    ctx.plan.validate(root);
                }

                if next != current {
                    for child in ctx.plan.op(next).children() {
                        self.visit(ctx, child, result)?;
                    }
                }
                current = next;
                continue 'retry;
            }
            break;
        }
        Ok(changed)
    }
}

impl Default for Optimizer {
    fn default() -> Self {
        Self::from_config(
            &OptimizerSettings::default(),
            IndexRegistry::new(),
            Compilers::default(),
        )
    }
}

#[cfg(test)]
mod tests {
    use plexus_core::AttrId;
    use plexus_logical::expr::{AstExpr, builtins};
    use plexus_logical::ops::ProjectedAttr;
    use plexus_logical::{Lang, OpKind, PlanOp};

    use super::*;
    use crate::rules::PatternRule;

    fn a(name: &str) -> AttrId {
        AttrId::parse(name)
    }

    /// Caps every tuple source with a limit, once.
    struct CapSources;

    impl PatternRule for CapSources {
        type Bindings = ();

        fn name(&self) -> &'static str {
            "CapSources"
        }

        fn operator(&self) -> OpKind {
            OpKind::TupleSource
        }

        fn matches(&self, ctx: &RuleContext<'_>, node: NodeId) -> Option<()> {
            let capped = ctx
                .plan
                .parent(node)
                .is_some_and(|p| ctx.plan.kind(p) == OpKind::Limit);
            (!capped).then_some(())
        }

        fn transform(
            &self,
            ctx: &mut RuleContext<'_>,
            node: NodeId,
            _: (),
        ) -> PlexusResult<NodeId> {
            let lang = ctx.plan.lang(node);
            Ok(ctx.plan.builder(lang).limit(0, Some(1000), node))
        }
    }

    fn filtered_projection(plan: &mut Plan) -> NodeId {
        let t = plan.builder(Lang::Sql).tuple_source("t", [a("t.a"), a("t.b")]);
        let proj = plan.builder(Lang::Sql).projection(
            vec![ProjectedAttr::new(a("t.a"), a("x")), ProjectedAttr::new(a("t.b"), a("y"))],
            t,
        );
        let cond = plan
            .builder(Lang::Sql)
            .calculation(AstExpr::call(builtins::gt(), vec![AstExpr::attr("x"), AstExpr::lit(1i64)]))
            .unwrap();
        let sel = plan.builder(Lang::Sql).selection(cond, proj);
        plan.set_root(sel);
        sel
    }

    #[test]
    fn test_optimizer_fixpoint() {
        let mut plan = Plan::new();
        let root = filtered_projection(&mut plan);
        let result = Optimizer::new(vec![]).optimize(&mut plan).unwrap();
        assert_eq!(result.passes, 1);
        assert_eq!(result.rules_applied, 0);
        assert_eq!(result.root, root);
    }

    #[test]
    fn test_optimizer_requires_root() {
        let mut plan = Plan::new();
        assert!(Optimizer::default().optimize(&mut plan).is_err());
    }

    #[test]
    fn test_rule_applies_once_per_node() {
        let mut plan = Plan::new();
        let root = filtered_projection(&mut plan);
        let optimizer = Optimizer::new(vec![Box::new(CapSources)]);
        let result = optimizer.optimize(&mut plan).unwrap();
        assert_eq!(result.rules_applied, 1);
        assert_eq!(result.root, root);
        assert_eq!(result.passes, 2);
    }

    #[test]
    fn test_default_rules_push_selection_below_projection() {
        let mut plan = Plan::new();
        filtered_projection(&mut plan);
        let config = OptimizerConfig::default().with_trace(true);
        let mut optimizer = Optimizer::with_config(vec![], config);
        optimizer.add_rule(PushdownSelections);
        optimizer.add_rule(MergeProjections);

        let result = optimizer.optimize(&mut plan).unwrap();
        let root = result.root;
        assert_eq!(plan.root(), Some(root));
        let PlanOp::Projection(proj) = plan.op(root) else {
            panic!("expected a projection on top");
        };
        assert_eq!(plan.kind(proj.source), OpKind::Selection);
        assert!(result.rules_applied >= 1);
        assert_eq!(result.trace[0].rule_name, "PushdownSelections");
        assert!(result.format_trace().contains("--- Rule 1 applied: PushdownSelections ---"));
        plan.validate(root);
    }

    #[test]
    fn test_from_config_expands_unnesting() {
        let settings = OptimizerSettings {
            rules: vec![RuleKind::UnnestSubqueries, RuleKind::IndexScans],
            max_passes: 3,
            enable_trace: false,
        };
        let optimizer =
            Optimizer::from_config(&settings, IndexRegistry::new(), Compilers::default());
        assert_eq!(
            optimizer.rule_names(),
            ["UnnestSubqueries", "UnnestSubqueries", "IndexScans"]
        );
        assert_eq!(optimizer.config.max_passes, 3);
        assert_eq!(Optimizer::default().rule_names().len(), 6);
    }
}
