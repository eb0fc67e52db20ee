//! Rewrite rules and the driver applying them.
//!
//! Every rule is a match/transform pair bound to one operator kind (see
//! [`PatternRule`]). Matching never mutates the plan; transforming returns
//! the node that takes the matched node's place.
//!
//! # Rules
//!
//! - [`UnnestSubqueries`]: evaluate scalar subqueries through dependent joins
//! - [`PushdownSelections`]: move filters towards the sources
//! - [`MergeProjections`]: fuse stacked projections, or drop dead attributes
//! - [`JoinIndices`]: turn joins over indexed sources into index lookups
//! - [`IndexScans`]: replace filtered sources with index scans

mod index_scans;
mod join_indices;
mod merge_projections;
mod optimizer;
mod pushdown_selections;
mod rule;
mod support;
mod unnest_subqueries;

pub use index_scans::IndexScans;
pub use join_indices::JoinIndices;
pub use merge_projections::MergeProjections;
pub use optimizer::{Optimizer, OptimizerConfig};
pub use pushdown_selections::PushdownSelections;
pub use rule::{
    OptimizationRule, OptimizedPlan, PatternRule, RuleContext, RuleTrace, Transformed,
};
pub use unnest_subqueries::UnnestSubqueries;
