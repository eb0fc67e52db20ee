//! Compiled scalar expressions.

use plexus_core::IdSet;

use super::{AstExpr, FnImpl};
use crate::Operand;

/// Per-argument facts recorded by the expression compiler.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArgMeta {
    /// How many times the argument occurs in the source expression.
    pub uses: usize,
    /// Every occurrence sits behind a short-circuit or conditional branch,
    /// so the argument is not guaranteed to be evaluated.
    pub maybe_skipped: bool,
    /// The argument is consumed as a whole sequence, not as one scalar.
    pub accepts_sequence: bool,
    /// Paths (child positions from the expression root) of each occurrence.
    pub locations: Vec<Vec<usize>>,
    /// Every occurrence sits inside an aggregate call's arguments, so the
    /// argument is read per grouped row rather than once per evaluation.
    pub aggregated: bool,
}

/// An aggregate call found while compiling an expression.
///
/// Grouping front ends extract these into `GroupBy` aggregates and
/// substitute the aggregate's output column at `path`.
#[derive(Debug, Clone, PartialEq)]
pub struct AggregateSite {
    pub func: FnImpl,
    /// Child positions from the expression root to the call.
    pub path: Vec<usize>,
    /// Indices into the argument list read by the call's operands.
    pub args: Vec<usize>,
}

impl ArgMeta {
    /// Whether evaluating the expression always evaluates this argument.
    pub fn is_guaranteed(&self) -> bool {
        !self.maybe_skipped
    }
}

/// Output of an [`ExpressionCompiler`](super::ExpressionCompiler).
#[derive(Debug, Clone)]
pub struct CalculationParams {
    /// Implementation taking the argument values in order.
    pub func: FnImpl,
    /// Arguments: attribute references or nested plans.
    pub args: Vec<Operand>,
    /// One entry per argument.
    pub arg_meta: Vec<ArgMeta>,
    /// Aggregate calls, outermost first.
    pub aggregates: Vec<AggregateSite>,
    /// The expression references nothing and folds to a constant.
    pub literal: bool,
}

/// A compiled scalar expression with its free-variable set.
#[derive(Debug, Clone)]
pub struct Calculation {
    /// Implementation function.
    pub func: FnImpl,
    /// Arguments in the order `func` expects them.
    pub args: Vec<Operand>,
    /// One entry per argument.
    pub arg_meta: Vec<ArgMeta>,
    /// Aggregate calls in the source expression.
    pub aggregates: Vec<AggregateSite>,
    /// Free attribute references (the attribute arguments).
    pub dependencies: IdSet,
    /// Source form, kept so rewrites can substitute into it and recompile.
    pub original: Option<AstExpr>,
    /// Constant-folded.
    pub literal: bool,
}

impl Calculation {
    /// Build a calculation from compiler output.
    ///
    /// # Panics
    ///
    /// Panics when the compiler returned metadata for a different number of
    /// arguments.
    pub fn from_params(params: CalculationParams, original: Option<AstExpr>) -> Self {
        assert_eq!(
            params.args.len(),
            params.arg_meta.len(),
            "argument metadata does not line up with arguments"
        );
        let dependencies = params.args.iter().filter_map(Operand::as_attr).collect();
        Self {
            func: params.func,
            args: params.args,
            arg_meta: params.arg_meta,
            aggregates: params.aggregates,
            dependencies,
            original,
            literal: params.literal,
        }
    }

    /// Metadata of argument `i`.
    pub fn meta(&self, i: usize) -> &ArgMeta {
        &self.arg_meta[i]
    }
}
