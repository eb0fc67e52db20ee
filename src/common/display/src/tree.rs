//! Tree display utilities for query plans.

use std::fmt;

/// A node in a display tree.
///
/// Nodes are usually lightweight views (an arena handle plus a reference to
/// the arena), so labels and children are produced on demand.
pub trait TreeNode {
    /// Get the display name of this node.
    fn name(&self) -> String;

    /// Get child nodes.
    fn children(&self) -> Vec<Box<dyn TreeNode + '_>>;

    /// Get additional details to display.
    fn details(&self) -> Option<String> {
        None
    }
}

/// Helper for displaying tree structures.
pub struct DisplayTree<'a> {
    root: &'a dyn TreeNode,
}

impl<'a> DisplayTree<'a> {
    /// Create a new display tree.
    pub fn new(root: &'a dyn TreeNode) -> Self {
        Self { root }
    }

    fn fmt_label(f: &mut fmt::Formatter<'_>, node: &dyn TreeNode) -> fmt::Result {
        write!(f, "{}", node.name())?;
        if let Some(details) = node.details() {
            write!(f, " ({details})")?;
        }
        writeln!(f)
    }

    fn fmt_node(
        f: &mut fmt::Formatter<'_>,
        node: &dyn TreeNode,
        prefix: &str,
        is_last: bool,
    ) -> fmt::Result {
        let connector = if is_last { "└─ " } else { "├─ " };
        write!(f, "{prefix}{connector}")?;
        Self::fmt_label(f, node)?;

        let children = node.children();
        let child_prefix = format!("{prefix}{}", if is_last { "   " } else { "│  " });
        for (i, child) in children.iter().enumerate() {
            Self::fmt_node(f, child.as_ref(), &child_prefix, i == children.len() - 1)?;
        }
        Ok(())
    }
}

impl fmt::Display for DisplayTree<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        Self::fmt_label(f, self.root)?;

        let children = self.root.children();
        for (i, child) in children.iter().enumerate() {
            Self::fmt_node(f, child.as_ref(), "", i == children.len() - 1)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct TestNode {
        name: &'static str,
        details: Option<&'static str>,
        children: Vec<TestNode>,
    }

    impl TestNode {
        fn leaf(name: &'static str) -> Self {
            Self {
                name,
                details: None,
                children: vec![],
            }
        }
    }

    impl TreeNode for TestNode {
        fn name(&self) -> String {
            self.name.to_string()
        }

        fn children(&self) -> Vec<Box<dyn TreeNode + '_>> {
            self.children
                .iter()
                .map(|c| Box::new(TestNodeRef(c)) as Box<dyn TreeNode + '_>)
                .collect()
        }

        fn details(&self) -> Option<String> {
            self.details.map(str::to_string)
        }
    }

    struct TestNodeRef<'a>(&'a TestNode);

    impl TreeNode for TestNodeRef<'_> {
        fn name(&self) -> String {
            self.0.name()
        }

        fn children(&self) -> Vec<Box<dyn TreeNode + '_>> {
            self.0.children()
        }

        fn details(&self) -> Option<String> {
            self.0.details()
        }
    }

    #[test]
    fn test_display_tree() {
        let tree = TestNode {
            name: "Join",
            details: Some("a = b"),
            children: vec![
                TestNode {
                    name: "Selection",
                    details: None,
                    children: vec![TestNode::leaf("TupleSource")],
                },
                TestNode::leaf("TupleSource"),
            ],
        };

        let output = DisplayTree::new(&tree).to_string();
        let expected = "\
Join (a = b)
├─ Selection
│  └─ TupleSource
└─ TupleSource
";
        assert_eq!(output, expected);
    }
}
