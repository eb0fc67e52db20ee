//! Source-level expression form kept alongside compiled calculations.
//!
//! A [`Calculation`](super::Calculation) only holds a flat argument list and
//! an opaque implementation. Rewrites that substitute into an expression
//! edit this tree instead and hand it back to the expression compiler.

use std::collections::HashMap;
use std::fmt;

use plexus_core::{AttrId, IdSet, RenameMap, Value};

use super::FnImpl;
use crate::NodeId;

/// An uncompiled scalar expression.
#[derive(Debug, Clone, PartialEq)]
pub enum AstExpr {
    /// Attribute reference.
    Attr(AttrId),
    /// Constant.
    Literal(Value),
    /// Function application.
    Call {
        /// Function to apply.
        func: FnImpl,
        /// Arguments in call order.
        args: Vec<AstExpr>,
    },
    /// `CASE WHEN c THEN r ... ELSE d END`.
    Cond {
        /// `(condition, result)` branches, tried in order.
        whens: Vec<(AstExpr, AstExpr)>,
        /// Result when no branch matches.
        default: Option<Box<AstExpr>>,
    },
    /// A nested plan (scalar subquery) living in the plan arena.
    Plan(NodeId),
}

impl AstExpr {
    /// Attribute reference from a dotted name.
    pub fn attr(name: &str) -> Self {
        Self::Attr(AttrId::parse(name))
    }

    /// Constant.
    pub fn lit(value: impl Into<Value>) -> Self {
        Self::Literal(value.into())
    }

    /// Function application.
    pub fn call(func: FnImpl, args: Vec<AstExpr>) -> Self {
        Self::Call { func, args }
    }

    /// Free attribute references.
    pub fn free_attrs(&self) -> IdSet {
        let mut out = IdSet::new();
        self.visit(&mut |e| {
            if let Self::Attr(id) = e {
                out.add(id.clone());
            }
        });
        out
    }

    /// Nested plans in evaluation order.
    pub fn plans(&self) -> Vec<NodeId> {
        let mut out = Vec::new();
        self.visit(&mut |e| {
            if let Self::Plan(id) = e {
                out.push(*id);
            }
        });
        out
    }

    /// Whether the expression depends on neither attributes nor subqueries.
    pub fn is_constant(&self) -> bool {
        let mut constant = true;
        self.visit(&mut |e| {
            if matches!(e, Self::Attr(_) | Self::Plan(_)) {
                constant = false;
            }
        });
        constant
    }

    /// Rename attribute references in place, returning how many changed.
    pub fn rename(&mut self, renames: &RenameMap) -> usize {
        let mut changed = 0;
        self.visit_mut(&mut |e| {
            if let Self::Attr(id) = e
                && let Some(to) = renames.get(id)
            {
                *id = to.clone();
                changed += 1;
            }
        });
        changed
    }

    /// Replace attribute references by expressions, all at once, returning
    /// the count. Replacements are not searched for further references.
    pub fn substitute(&mut self, replacements: &HashMap<AttrId, AstExpr>) -> usize {
        let mut count = 0;
        self.visit_mut(&mut |e| {
            if let Self::Attr(id) = e
                && let Some(replacement) = replacements.get(id)
            {
                *e = replacement.clone();
                count += 1;
            }
        });
        count
    }

    /// Replace a nested plan reference by `replacement`.
    pub fn replace_plan(&mut self, plan: NodeId, replacement: &AstExpr) -> usize {
        let mut count = 0;
        self.visit_mut(&mut |e| {
            if matches!(e, Self::Plan(id) if *id == plan) {
                *e = replacement.clone();
                count += 1;
            }
        });
        count
    }

    /// Point nested plan references at their copies.
    pub fn remap_plans(&mut self, mapping: &HashMap<NodeId, NodeId>) {
        self.visit_mut(&mut |e| {
            if let Self::Plan(id) = e
                && let Some(new_id) = mapping.get(id)
            {
                *id = *new_id;
            }
        });
    }

    fn visit(&self, f: &mut impl FnMut(&AstExpr)) {
        f(self);
        match self {
            Self::Attr(_) | Self::Literal(_) | Self::Plan(_) => {}
            Self::Call { args, .. } => args.iter().for_each(|a| a.visit(f)),
            Self::Cond { whens, default } => {
                for (cond, result) in whens {
                    cond.visit(f);
                    result.visit(f);
                }
                if let Some(d) = default {
                    d.visit(f);
                }
            }
        }
    }

    /// Pre-order mutable walk; a node replaced by `f` is not descended into.
    fn visit_mut(&mut self, f: &mut impl FnMut(&mut AstExpr)) {
        let before = std::mem::discriminant(self);
        f(self);
        if std::mem::discriminant(self) != before {
            return;
        }
        match self {
            Self::Attr(_) | Self::Literal(_) | Self::Plan(_) => {}
            Self::Call { args, .. } => args.iter_mut().for_each(|a| a.visit_mut(f)),
            Self::Cond { whens, default } => {
                for (cond, result) in whens {
                    cond.visit_mut(f);
                    result.visit_mut(f);
                }
                if let Some(d) = default {
                    d.visit_mut(f);
                }
            }
        }
    }
}

fn is_operator_symbol(name: &str) -> bool {
    !name.is_empty() && !name.chars().any(char::is_alphanumeric)
}

impl fmt::Display for AstExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Attr(id) => write!(f, "{id}"),
            Self::Literal(v) => write!(f, "{v}"),
            Self::Call { func, args } if args.len() == 2 && is_operator_symbol(func.name()) => {
                write!(f, "({} {} {})", args[0], func.name(), args[1])
            }
            Self::Call { func, args } => {
                let args: Vec<_> = args.iter().map(ToString::to_string).collect();
                write!(f, "{}({})", func.name(), args.join(", "))
            }
            Self::Cond { whens, default } => {
                write!(f, "CASE")?;
                for (cond, result) in whens {
                    write!(f, " WHEN {cond} THEN {result}")?;
                }
                if let Some(d) = default {
                    write!(f, " ELSE {d}")?;
                }
                write!(f, " END")
            }
            Self::Plan(id) => write!(f, "subquery{id}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::builtins;

    fn sum_ab() -> AstExpr {
        AstExpr::call(builtins::add(), vec![AstExpr::attr("a"), AstExpr::attr("b")])
    }

    #[test]
    fn test_free_attrs_and_display() {
        let e = sum_ab();
        assert_eq!(e.free_attrs().len(), 2);
        assert_eq!(e.to_string(), "(a + b)");
        assert!(!e.is_constant());
        assert!(AstExpr::lit(3i64).is_constant());
    }

    #[test]
    fn test_rename() {
        let mut e = sum_ab();
        let renames: RenameMap = [(AttrId::parse("a"), AttrId::parse("t.a"))]
            .into_iter()
            .collect();
        assert_eq!(e.rename(&renames), 1);
        assert_eq!(e.to_string(), "(t.a + b)");
    }

    #[test]
    fn test_substitute_does_not_recurse_into_replacement() {
        let mut e = sum_ab();
        // a := a * 2 and b := a must not chain into each other.
        let replacements = HashMap::from([
            (
                AttrId::parse("a"),
                AstExpr::call(builtins::mul(), vec![AstExpr::attr("a"), AstExpr::lit(2i64)]),
            ),
            (AttrId::parse("b"), AstExpr::attr("a")),
        ]);
        assert_eq!(e.substitute(&replacements), 2);
        assert_eq!(e.to_string(), "((a * 2) + a)");
    }
}
