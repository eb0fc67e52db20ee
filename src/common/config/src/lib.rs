//! Configuration management for Plexus.
//!
//! Selects and orders the rewrite rules the optimizer runs and bounds how
//! long it iterates.

use std::fmt;
use std::path::Path;

use common_error::{PlexusError, PlexusResult};
use serde::{Deserialize, Serialize};

/// Global Plexus configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct PlexusConfig {
    /// Optimizer configuration.
    pub optimizer: OptimizerSettings,
}

impl PlexusConfig {
    /// Parse a configuration from JSON; missing fields take their defaults.
    pub fn from_json(json: &str) -> PlexusResult<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.optimizer.validate()?;
        Ok(config)
    }

    /// Read a JSON configuration file.
    pub fn from_path(path: impl AsRef<Path>) -> PlexusResult<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    /// Serialize to pretty-printed JSON.
    pub fn to_json(&self) -> PlexusResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Optimizer configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OptimizerSettings {
    /// Rules to run, in the order they are tried at each node.
    pub rules: Vec<RuleKind>,
    /// Upper bound on whole-plan passes.
    pub max_passes: usize,
    /// Record before/after plans for every applied rule.
    pub enable_trace: bool,
}

impl OptimizerSettings {
    /// Reject settings the optimizer cannot run with.
    pub fn validate(&self) -> PlexusResult<()> {
        if self.max_passes == 0 {
            return Err(PlexusError::config("max_passes must be at least 1"));
        }
        for (i, rule) in self.rules.iter().enumerate() {
            if self.rules[..i].contains(rule) {
                return Err(PlexusError::config(format!("rule {rule} is listed twice")));
            }
        }
        Ok(())
    }
}

impl Default for OptimizerSettings {
    fn default() -> Self {
        Self {
            rules: RuleKind::default_order().to_vec(),
            max_passes: 16,
            enable_trace: false,
        }
    }
}

/// The rewrite rules the optimizer knows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RuleKind {
    /// Turn guaranteed scalar subqueries into dependent joins.
    UnnestSubqueries,
    /// Move selections towards the sources.
    PushdownSelections,
    /// Fuse stacked projections.
    MergeProjections,
    /// Rewrite joins with an indexable side into index lookups.
    JoinIndices,
    /// Replace filtered sources by index scans.
    IndexScans,
}

impl RuleKind {
    /// Every rule, in the default order.
    pub fn default_order() -> &'static [RuleKind] {
        &[
            RuleKind::UnnestSubqueries,
            RuleKind::PushdownSelections,
            RuleKind::MergeProjections,
            RuleKind::JoinIndices,
            RuleKind::IndexScans,
        ]
    }
}

impl fmt::Display for RuleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}
