//! Plexus - rule-based optimizer for federated query plans
//!
//! Front ends for SQL-like, graph-pattern and tree-path queries lower into a
//! shared logical plan, which Plexus rewrites in place: subqueries are
//! unnested, selections pushed down, projections merged, and scans and
//! joins over indexed sources turned into index lookups.

#![forbid(unsafe_code)]
#![allow(clippy::module_name_repetitions)]

// Re-export core crates
pub use common_config as config;
pub use common_error as error;
pub use plexus_core as core;
pub use plexus_logical as logical;
pub use plexus_optimizer as optimizer;

use common_config::PlexusConfig;
use common_error::PlexusResult;
use plexus_logical::Plan;
use plexus_logical::expr::Compilers;
use plexus_optimizer::{IndexRegistry, OptimizedPlan, Optimizer};

/// Plexus version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Optimize `plan` with the rules `config` selects, using `indices` for
/// the index-aware ones.
pub fn optimize(
    plan: &mut Plan,
    config: &PlexusConfig,
    indices: IndexRegistry,
) -> PlexusResult<OptimizedPlan> {
    Optimizer::from_config(&config.optimizer, indices, Compilers::default()).optimize(plan)
}
