//! Analyses the rewrite rules are built on.
//!
//! One implementation of each serves every front-end language: the
//! operator set is closed, so the per-operator behavior is an exhaustive
//! match rather than a per-language table.

mod deps;
mod equality;
mod rename;

pub use deps::TransitiveDeps;
pub use equality::EqualityChecker;
pub use rename::{RenameChecker, Renamer};
