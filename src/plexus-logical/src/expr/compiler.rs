//! Compilation of [`AstExpr`] into [`CalculationParams`].

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use common_error::{PlexusResult, compile_err};
use plexus_core::{AttrId, Value};

use super::{AggregateSite, ArgMeta, AstExpr, CalculationParams, FnImpl};
use crate::{Lang, NodeId, Operand};

/// Turns a source-level expression into a flat, executable calculation.
///
/// Rewrites call this whenever they substitute into a calculation's
/// original form, so the compiled function always matches the source.
pub trait ExpressionCompiler: Send + Sync {
    /// Compile `expr`.
    fn compile(&self, expr: &AstExpr) -> PlexusResult<CalculationParams>;
}

/// Compiler shared by all front ends unless one registers its own.
///
/// Arguments are the distinct attribute references and nested plans of the
/// expression, in order of first occurrence. The implementation interprets
/// the expression tree over the argument values.
#[derive(Debug, Clone, Copy, Default)]
pub struct AstCompiler;

impl ExpressionCompiler for AstCompiler {
    fn compile(&self, expr: &AstExpr) -> PlexusResult<CalculationParams> {
        let mut slots = Slots::default();
        let mut path = Vec::new();
        let body = Arc::new(slots.walk(expr, &mut path, false, false)?);

        let func = FnImpl::new(expr.to_string(), move |args: &[Value]| body.eval(args));
        let args = slots
            .keys
            .into_iter()
            .map(|key| match key {
                SlotKey::Attr(id) => Operand::Attr(id),
                SlotKey::Plan(id) => Operand::Node(id),
            })
            .collect();

        Ok(CalculationParams {
            func,
            args,
            arg_meta: slots.meta,
            aggregates: slots.aggregates,
            literal: expr.is_constant(),
        })
    }
}

#[derive(PartialEq)]
enum SlotKey {
    Attr(AttrId),
    Plan(NodeId),
}

#[derive(Default)]
struct Slots {
    keys: Vec<SlotKey>,
    meta: Vec<ArgMeta>,
    aggregates: Vec<AggregateSite>,
    in_aggregate: bool,
}

impl Slots {
    fn slot(&mut self, key: SlotKey, path: &[usize], skipped: bool, sequence: bool) -> usize {
        if let Some(i) = self.keys.iter().position(|k| *k == key) {
            let meta = &mut self.meta[i];
            meta.uses += 1;
            meta.maybe_skipped &= skipped;
            meta.accepts_sequence &= sequence;
            meta.aggregated &= self.in_aggregate;
            meta.locations.push(path.to_vec());
            return i;
        }
        self.keys.push(key);
        self.meta.push(ArgMeta {
            uses: 1,
            maybe_skipped: skipped,
            accepts_sequence: sequence,
            locations: vec![path.to_vec()],
            aggregated: self.in_aggregate,
        });
        self.keys.len() - 1
    }

    fn walk(
        &mut self,
        expr: &AstExpr,
        path: &mut Vec<usize>,
        skipped: bool,
        sequence: bool,
    ) -> PlexusResult<Compiled> {
        Ok(match expr {
            AstExpr::Attr(id) => {
                Compiled::Slot(self.slot(SlotKey::Attr(id.clone()), path, skipped, sequence))
            }
            AstExpr::Plan(id) => Compiled::Slot(self.slot(SlotKey::Plan(*id), path, skipped, sequence)),
            AstExpr::Literal(v) => Compiled::Const(v.clone()),
            AstExpr::Call { func, args } if func.is_aggregate() => {
                if self.in_aggregate {
                    compile_err!("aggregate nested inside another aggregate: {expr}");
                }
                let site = self.aggregates.len();
                self.aggregates.push(AggregateSite {
                    func: func.clone(),
                    path: path.clone(),
                    args: Vec::new(),
                });
                self.in_aggregate = true;
                let mut compiled = Vec::with_capacity(args.len());
                for (i, arg) in args.iter().enumerate() {
                    path.push(i);
                    compiled.push(self.walk(arg, path, skipped, true)?);
                    path.pop();
                }
                self.in_aggregate = false;
                let read: Vec<usize> = (0..self.keys.len())
                    .filter(|&k| self.meta[k].locations.iter().any(|l| l.starts_with(path)))
                    .collect();
                self.aggregates[site].args = read;
                Compiled::Call(func.clone(), compiled)
            }
            AstExpr::Call { func, args } => {
                let mut compiled = Vec::with_capacity(args.len());
                for (i, arg) in args.iter().enumerate() {
                    path.push(i);
                    let tail = func.is_short_circuit() && i > 0;
                    compiled.push(self.walk(arg, path, skipped || tail, func.accepts_sequence())?);
                    path.pop();
                }
                Compiled::Call(func.clone(), compiled)
            }
            AstExpr::Cond { whens, default } => {
                if whens.is_empty() {
                    compile_err!("conditional expression without branches: {expr}");
                }
                let mut branches = Vec::with_capacity(whens.len());
                for (i, (cond, result)) in whens.iter().enumerate() {
                    path.push(2 * i);
                    let c = self.walk(cond, path, skipped || i > 0, false)?;
                    path.pop();
                    path.push(2 * i + 1);
                    let r = self.walk(result, path, true, false)?;
                    path.pop();
                    branches.push((c, r));
                }
                let default = match default {
                    Some(d) => {
                        path.push(2 * whens.len());
                        let d = self.walk(d, path, true, false)?;
                        path.pop();
                        Some(Box::new(d))
                    }
                    None => None,
                };
                Compiled::Cond(branches, default)
            }
        })
    }
}

enum Compiled {
    Slot(usize),
    Const(Value),
    Call(FnImpl, Vec<Compiled>),
    Cond(Vec<(Compiled, Compiled)>, Option<Box<Compiled>>),
}

impl Compiled {
    fn eval(&self, args: &[Value]) -> Value {
        match self {
            Self::Slot(i) => args.get(*i).cloned().unwrap_or_default(),
            Self::Const(v) => v.clone(),
            Self::Call(func, inner) => {
                let values: Vec<Value> = inner.iter().map(|c| c.eval(args)).collect();
                func.call(&values)
            }
            Self::Cond(branches, default) => branches
                .iter()
                .find(|(cond, _)| cond.eval(args).is_true())
                .map(|(_, result)| result.eval(args))
                .or_else(|| default.as_ref().map(|d| d.eval(args)))
                .unwrap_or_default(),
        }
    }
}

/// Expression compilers by front-end language.
#[derive(Clone)]
pub struct Compilers {
    fallback: Arc<dyn ExpressionCompiler>,
    by_lang: HashMap<Lang, Arc<dyn ExpressionCompiler>>,
}

impl Compilers {
    /// Use `fallback` for every language without a registered compiler.
    pub fn new(fallback: Arc<dyn ExpressionCompiler>) -> Self {
        Self {
            fallback,
            by_lang: HashMap::new(),
        }
    }

    /// Register the compiler for `lang`.
    pub fn register(&mut self, lang: Lang, compiler: Arc<dyn ExpressionCompiler>) {
        self.by_lang.insert(lang, compiler);
    }

    /// The compiler for nodes tagged with `lang`.
    pub fn for_lang(&self, lang: Lang) -> &dyn ExpressionCompiler {
        self.by_lang.get(&lang).unwrap_or(&self.fallback).as_ref()
    }

    /// Compile with the compiler for `lang`.
    pub fn compile(&self, lang: Lang, expr: &AstExpr) -> PlexusResult<CalculationParams> {
        self.for_lang(lang).compile(expr)
    }
}

impl Default for Compilers {
    fn default() -> Self {
        Self::new(Arc::new(AstCompiler))
    }
}

impl fmt::Debug for Compilers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut langs: Vec<_> = self.by_lang.keys().map(ToString::to_string).collect();
        langs.sort();
        f.debug_struct("Compilers").field("registered", &langs).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::builtins;

    fn a_plus_b_times_a() -> AstExpr {
        AstExpr::call(
            builtins::add(),
            vec![
                AstExpr::attr("a"),
                AstExpr::call(builtins::mul(), vec![AstExpr::attr("b"), AstExpr::attr("a")]),
            ],
        )
    }

    #[test]
    fn test_args_in_first_occurrence_order() {
        let params = AstCompiler.compile(&a_plus_b_times_a()).unwrap();
        let names: Vec<_> = params
            .args
            .iter()
            .map(|a| a.as_attr().unwrap().to_string())
            .collect();
        assert_eq!(names, ["a", "b"]);
        assert_eq!(params.arg_meta[0].uses, 2);
        assert_eq!(params.arg_meta[0].locations, vec![vec![0], vec![1, 1]]);
        assert!(!params.literal);
    }

    #[test]
    fn test_compiled_function_evaluates() {
        let params = AstCompiler.compile(&a_plus_b_times_a()).unwrap();
        // a + b * a with a = 2, b = 5
        let out = params.func.call(&[Value::Int64(2), Value::Int64(5)]);
        assert_eq!(out, Value::Int64(12));
        assert_eq!(params.func.name(), "(a + (b * a))");
    }

    #[test]
    fn test_short_circuit_tail_is_maybe_skipped() {
        let expr = AstExpr::call(builtins::or(), vec![AstExpr::attr("x"), AstExpr::attr("y")]);
        let params = AstCompiler.compile(&expr).unwrap();
        assert!(params.arg_meta[0].is_guaranteed());
        assert!(params.arg_meta[1].maybe_skipped);
    }

    #[test]
    fn test_guaranteed_if_any_occurrence_is() {
        // y is skippable inside `or`, but also evaluated directly by `+`.
        let expr = AstExpr::call(
            builtins::add(),
            vec![
                AstExpr::attr("y"),
                AstExpr::call(builtins::or(), vec![AstExpr::attr("x"), AstExpr::attr("y")]),
            ],
        );
        let params = AstCompiler.compile(&expr).unwrap();
        assert!(params.arg_meta[0].is_guaranteed());
    }

    #[test]
    fn test_conditional() {
        let expr = AstExpr::Cond {
            whens: vec![(AstExpr::attr("c"), AstExpr::lit(1i64))],
            default: Some(Box::new(AstExpr::attr("d"))),
        };
        let params = AstCompiler.compile(&expr).unwrap();
        assert!(params.arg_meta[1].maybe_skipped);
        assert_eq!(
            params.func.call(&[Value::Bool(false), Value::Int64(7)]),
            Value::Int64(7)
        );

        let empty = AstExpr::Cond {
            whens: vec![],
            default: None,
        };
        assert!(AstCompiler.compile(&empty).is_err());
    }

    #[test]
    fn test_aggregate_sites() {
        // count(x) + y
        let expr = AstExpr::call(
            builtins::add(),
            vec![
                AstExpr::call(builtins::count(), vec![AstExpr::attr("x")]),
                AstExpr::attr("y"),
            ],
        );
        let params = AstCompiler.compile(&expr).unwrap();
        assert_eq!(params.aggregates.len(), 1);
        assert_eq!(params.aggregates[0].func, builtins::count());
        assert_eq!(params.aggregates[0].path, vec![0]);
        assert_eq!(params.aggregates[0].args, vec![0]);
        assert!(params.arg_meta[0].aggregated);
        assert!(params.arg_meta[0].accepts_sequence);
        assert!(!params.arg_meta[1].aggregated);

        let nested = AstExpr::call(
            builtins::sum(),
            vec![AstExpr::call(builtins::count(), vec![AstExpr::attr("x")])],
        );
        assert!(AstCompiler.compile(&nested).is_err());
    }

    #[test]
    fn test_literal_flag() {
        let params = AstCompiler
            .compile(&AstExpr::call(
                builtins::add(),
                vec![AstExpr::lit(1i64), AstExpr::lit(2i64)],
            ))
            .unwrap();
        assert!(params.literal);
        assert!(params.args.is_empty());
        assert_eq!(params.func.call(&[]), Value::Int64(3));
    }
}
