//! Uncompiled scalar expression nodes.

use plexus_core::Value;

use super::FnImpl;
use crate::Operand;

/// Direct function application.
#[derive(Debug, Clone)]
pub struct FnCall {
    /// Function to apply.
    pub func: FnImpl,
    /// Arguments in call order.
    pub args: Vec<Operand>,
}

impl FnCall {
    /// Whether this is `id(x)` over a single attribute, returning `x`.
    pub fn identity_of(&self) -> Option<&Operand> {
        match self.args.as_slice() {
            [arg] if self.func.is_identity() => Some(arg),
            _ => None,
        }
    }
}

/// A constant.
#[derive(Debug, Clone)]
pub struct Literal {
    /// The value.
    pub value: Value,
}

/// `CASE WHEN ... THEN ... ELSE ... END`.
#[derive(Debug, Clone)]
pub struct Conditional {
    /// `(condition, result)` pairs, tried in order.
    pub whens: Vec<(Operand, Operand)>,
    /// Result when no condition holds.
    pub default: Option<Operand>,
}
