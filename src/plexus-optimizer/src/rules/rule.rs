//! Optimization rule traits and the rewrite context.

use common_display::indent;
use common_error::PlexusResult;
use plexus_logical::expr::Compilers;
use plexus_logical::{NodeId, OpKind, Plan};

use crate::analysis::{EqualityChecker, RenameChecker, Renamer, TransitiveDeps};
use crate::index::IndexRegistry;

/// Everything a rule may read or mutate while rewriting one node.
///
/// The dependency cache is shared by every rule of one optimizer run;
/// whoever mutates the plan must follow its invalidation protocol.
pub struct RuleContext<'a> {
    pub plan: &'a mut Plan,
    pub deps: &'a TransitiveDeps,
    pub indices: &'a IndexRegistry,
    pub compilers: &'a Compilers,
}

impl<'a> RuleContext<'a> {
    pub fn new(
        plan: &'a mut Plan,
        deps: &'a TransitiveDeps,
        indices: &'a IndexRegistry,
        compilers: &'a Compilers,
    ) -> Self {
        Self {
            plan,
            deps,
            indices,
            compilers,
        }
    }

    pub fn renamer(&self) -> Renamer<'a> {
        Renamer::new(self.deps)
    }

    pub fn rename_checker(&self) -> RenameChecker<'a> {
        RenameChecker::new(self.deps)
    }

    pub fn equality(&self) -> EqualityChecker {
        EqualityChecker::new()
    }
}

/// A rewrite bound to one operator kind.
///
/// `matches` inspects the plan without changing it and returns whatever the
/// rewrite needs, or `None` when the rule does not apply. `transform`
/// performs the rewrite and returns the node now standing where the matched
/// node stood. It must leave the matched node's parent slot alone; the
/// driver installs the result there.
///
/// Every rule's `transform` removes the configuration its `matches` looks
/// for, which is what makes the fixpoint terminate.
pub trait PatternRule: Send + Sync {
    /// Data carried from `matches` to `transform`.
    type Bindings;

    /// Get the name of this rule.
    fn name(&self) -> &'static str;

    /// Get a description of what this rule does.
    fn description(&self) -> &'static str {
        "No description available"
    }

    /// The operator kind this rule fires on.
    fn operator(&self) -> OpKind;

    fn matches(&self, ctx: &RuleContext<'_>, node: NodeId) -> Option<Self::Bindings>;

    fn transform(
        &self,
        ctx: &mut RuleContext<'_>,
        node: NodeId,
        bindings: Self::Bindings,
    ) -> PlexusResult<NodeId>;
}

/// Object-safe view of a rule, as held by the optimizer.
pub trait OptimizationRule: Send + Sync {
    /// Get the name of this rule.
    fn name(&self) -> &'static str;

    /// Get a description of what this rule does.
    fn description(&self) -> &'static str;

    /// The operator kind this rule fires on.
    fn operator(&self) -> OpKind;

    /// Match and, on success, transform `node`.
    fn apply(&self, ctx: &mut RuleContext<'_>, node: NodeId) -> PlexusResult<Transformed>;
}

impl<R: PatternRule> OptimizationRule for R {
    fn name(&self) -> &'static str {
        PatternRule::name(self)
    }

    fn description(&self) -> &'static str {
        PatternRule::description(self)
    }

    fn operator(&self) -> OpKind {
        PatternRule::operator(self)
    }

    fn apply(&self, ctx: &mut RuleContext<'_>, node: NodeId) -> PlexusResult<Transformed> {
        match self.matches(ctx, node) {
            Some(bindings) => Ok(Transformed::yes(self.transform(ctx, node, bindings)?)),
            None => Ok(Transformed::no(node)),
        }
    }
}

/// The result of applying an optimization rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transformed {
    /// The node now standing where the matched node stood.
    pub node: NodeId,
    /// Whether the plan was actually changed.
    pub changed: bool,
}

impl Transformed {
    /// Create a new transformed result indicating the plan was changed.
    pub fn yes(node: NodeId) -> Self {
        Self {
            node,
            changed: true,
        }
    }

    /// Create a new transformed result indicating the plan was unchanged.
    pub fn no(node: NodeId) -> Self {
        Self {
            node,
            changed: false,
        }
    }
}

/// A trace entry for a single rule application.
#[derive(Debug, Clone)]
pub struct RuleTrace {
    /// The name of the rule that was applied.
    pub rule_name: String,
    /// The subtree before the rule was applied (as explain string).
    pub before: String,
    /// The subtree after the rule was applied (as explain string).
    pub after: String,
    /// Whether the rule actually changed the plan.
    pub changed: bool,
}

impl RuleTrace {
    /// Create a new trace entry.
    pub fn new(
        rule_name: impl Into<String>,
        before: impl Into<String>,
        after: impl Into<String>,
        changed: bool,
    ) -> Self {
        Self {
            rule_name: rule_name.into(),
            before: before.into(),
            after: after.into(),
            changed,
        }
    }
}

/// The result of optimization with optional trace information.
#[derive(Debug, Clone)]
pub struct OptimizedPlan {
    /// Root of the optimized plan.
    pub root: NodeId,
    /// Number of whole-tree passes performed.
    pub passes: usize,
    /// Number of rule applications that changed the plan.
    pub rules_applied: usize,
    /// Detailed trace of rule applications (if tracing was enabled).
    pub trace: Vec<RuleTrace>,
}

impl OptimizedPlan {
    /// Create a new optimized plan result.
    pub fn new(root: NodeId) -> Self {
        Self {
            root,
            passes: 0,
            rules_applied: 0,
            trace: Vec::new(),
        }
    }

    /// Format the trace as a human-readable string.
    pub fn format_trace(&self) -> String {
        let mut output = String::new();
        output.push_str(&format!(
            "Optimization completed in {} passes, {} rules applied\n",
            self.passes, self.rules_applied
        ));

        if self.trace.is_empty() {
            output.push_str("  (no trace available)\n");
        } else {
            for (i, entry) in self.trace.iter().filter(|t| t.changed).enumerate() {
                output.push_str(&format!(
                    "\n--- Rule {} applied: {} ---\n",
                    i + 1,
                    entry.rule_name
                ));
                output.push_str("Before:\n");
                output.push_str(&indent(&entry.before, "  "));
                output.push_str("\nAfter:\n");
                output.push_str(&indent(&entry.after, "  "));
                output.push('\n');
            }
        }

        output
    }
}

#[cfg(test)]
mod tests {
    use plexus_logical::Lang;

    use super::*;

    #[test]
    fn test_transformed() {
        let mut plan = Plan::new();
        let node = plan.builder(Lang::Sql).null_source();

        let unchanged = Transformed::no(node);
        assert!(!unchanged.changed);

        let changed = Transformed::yes(node);
        assert!(changed.changed);
        assert_eq!(changed.node, node);
    }

    #[test]
    fn test_rule_trace() {
        let trace = RuleTrace::new("TestRule", "before", "after", true);
        assert_eq!(trace.rule_name, "TestRule");
        assert!(trace.changed);
    }

    #[test]
    fn test_format_trace() {
        let mut plan = Plan::new();
        let root = plan.builder(Lang::Sql).null_source();
        let mut result = OptimizedPlan::new(root);
        assert!(result.format_trace().contains("(no trace available)"));

        result.passes = 2;
        result.rules_applied = 1;
        result.trace.push(RuleTrace::new("Swap", "A", "B", true));
        let text = result.format_trace();
        assert!(text.starts_with("Optimization completed in 2 passes, 1 rules applied"));
        assert!(text.contains("--- Rule 1 applied: Swap ---"));
    }
}
