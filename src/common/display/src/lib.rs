//! Display utilities for Plexus.
//!
//! Renders plan trees for `explain` output and optimizer traces.

mod tree;

pub use tree::{DisplayTree, TreeNode};

/// Shorten a label for display, cutting on a character boundary.
pub fn truncate_string(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{kept}...")
    }
}

/// Indent a multi-line string.
pub fn indent(s: &str, prefix: &str) -> String {
    s.lines()
        .map(|line| format!("{prefix}{line}"))
        .collect::<Vec<_>>()
        .join("\n")
}
