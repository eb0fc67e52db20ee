//! Scalar expressions.
//!
//! Two forms coexist: plan nodes ([`Calculation`], [`FnCall`], [`Literal`],
//! [`Conditional`]) that live in the plan arena, and the [`AstExpr`] source
//! form a calculation keeps so it can be recompiled after a rewrite.

mod ast;
mod calculation;
mod compiler;
mod func;
mod scalar;

pub use ast::AstExpr;
pub use calculation::{AggregateSite, ArgMeta, Calculation, CalculationParams};
pub use compiler::{AstCompiler, Compilers, ExpressionCompiler};
pub use func::{FnImpl, ScalarFn, builtins};
pub use scalar::{Conditional, FnCall, Literal};
