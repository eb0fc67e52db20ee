//! Rule-based optimizer for Plexus logical plans.
//!
//! The optimizer rewrites a [`Plan`] in place until no rule applies. Rules
//! share three analyses: transitive dependencies (which attributes a
//! subtree needs from outside), renaming with its safety check, and
//! structural equality.
//!
//! # Example
//!
//! ```rust
//! use plexus_core::AttrId;
//! use plexus_logical::expr::{AstExpr, builtins};
//! use plexus_logical::ops::ProjectedAttr;
//! use plexus_logical::{Lang, OpKind, Plan};
//! use plexus_optimizer::Optimizer;
//!
//! let mut plan = Plan::new();
//! let mut b = plan.builder(Lang::Sql);
//! let t = b.tuple_source("t", [AttrId::parse("t.a")]);
//! let proj = b.projection(vec![ProjectedAttr::new(AttrId::parse("t.a"), AttrId::parse("x"))], t);
//! let cond = b
//!     .calculation(AstExpr::call(builtins::gt(), vec![AstExpr::attr("x"), AstExpr::lit(1i64)]))
//!     .unwrap();
//! let sel = b.selection(cond, proj);
//! plan.set_root(sel);
//!
//! let result = Optimizer::default().optimize(&mut plan).unwrap();
//! assert_eq!(plan.kind(result.root), OpKind::Projection);
//! ```

pub mod analysis;
pub mod index;
mod rules;

pub use index::{EqualityIndex, Index, IndexRegistry};
pub use rules::{
    IndexScans, JoinIndices, MergeProjections, OptimizationRule, OptimizedPlan, Optimizer,
    OptimizerConfig, PatternRule, PushdownSelections, RuleContext, RuleTrace, Transformed,
    UnnestSubqueries,
};

use common_error::PlexusResult;
use plexus_logical::Plan;

/// Optimize `plan` in place with the given rules and no indices.
pub fn optimize(
    plan: &mut Plan,
    rules: Vec<Box<dyn OptimizationRule>>,
) -> PlexusResult<OptimizedPlan> {
    Optimizer::new(rules).optimize(plan)
}
