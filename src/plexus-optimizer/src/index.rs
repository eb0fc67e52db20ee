//! Index interface used by the index-aware rules.
//!
//! Index implementations live with the data adapters; the optimizer only
//! asks an index which conditions it can serve and, for index scans, for
//! an accessor expression computing the lookup key.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use common_error::{PlexusError, PlexusResult, ensure};
use plexus_core::{AttrId, IdSet, RenameMap};
use plexus_logical::expr::{AstExpr, Compilers, builtins};
use plexus_logical::{Lang, Operand, Plan, PlanOp};

/// An index over one named source.
pub trait Index: Send + Sync {
    /// Identifier recorded in the `IndexScan` using this index.
    fn name(&self) -> &str;

    /// Positions of the `candidates` (filter or join conditions) this index
    /// can serve, or `None` when it serves none of them.
    ///
    /// `renames` maps names as they appear in the candidates to the names
    /// they will carry once the rewrite is done.
    ///
    /// Candidates are whole conditions. For a join, each one has at least
    /// one argument reading only the indexed source, and the index decides
    /// which argument is its key.
    fn matches(
        &self,
        plan: &Plan,
        candidates: &[Operand],
        renames: Option<&RenameMap>,
    ) -> Option<Vec<usize>>;

    /// Build the expression computing the lookup key for the matched
    /// conditions `exprs`.
    fn create_accessor(
        &self,
        plan: &mut Plan,
        compilers: &Compilers,
        lang: Lang,
        exprs: &[Operand],
    ) -> PlexusResult<Operand>;
}

/// Indices registered per source name, in registration order.
#[derive(Clone, Default)]
pub struct IndexRegistry {
    indices: HashMap<String, Vec<Arc<dyn Index>>>,
}

impl IndexRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `index` for the source called `source`.
    pub fn register(&mut self, source: impl Into<String>, index: Arc<dyn Index>) {
        self.indices.entry(source.into()).or_default().push(index);
    }

    /// Indices of `source`, first registered first.
    pub fn get(&self, source: &str) -> &[Arc<dyn Index>] {
        self.indices.get(source).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }
}

impl fmt::Debug for IndexRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map()
            .entries(self.indices.iter().map(|(source, indices)| {
                (source, indices.iter().map(|i| i.name()).collect::<Vec<_>>())
            }))
            .finish()
    }
}

/// A hash index answering `key = value` lookups.
///
/// It serves a set of conditions when every key attribute is compared for
/// equality with an expression that reads nothing from the indexed source
/// itself and contains no subquery.
#[derive(Debug, Clone)]
pub struct EqualityIndex {
    name: String,
    keys: Vec<AttrId>,
    source_attrs: IdSet,
}

impl EqualityIndex {
    /// An index `name` on `keys` of a source providing `source_attrs`.
    pub fn new(name: impl Into<String>, keys: Vec<AttrId>, source_attrs: IdSet) -> Self {
        Self {
            name: name.into(),
            keys,
            source_attrs,
        }
    }

    /// Split an equality condition into `(key, value)` for one of the keys.
    fn key_value(&self, plan: &Plan, cond: &Operand) -> Option<(usize, AstExpr)> {
        let (lhs, rhs) = equality_sides(plan, cond)?;
        [(&lhs, &rhs), (&rhs, &lhs)].into_iter().find_map(|(key, value)| match key {
            AstExpr::Attr(id) => {
                let pos = self.keys.iter().position(|k| k == id)?;
                Some((pos, value.clone()))
            }
            _ => None,
        })
    }
}

/// The two sides of an `=` condition, from a calculation's original form or
/// from a plain function call over attributes and literals.
fn equality_sides(plan: &Plan, cond: &Operand) -> Option<(AstExpr, AstExpr)> {
    match plan.op(cond.as_node()?) {
        PlanOp::Calculation(calc) => match calc.original.as_ref()? {
            AstExpr::Call { func, args } if func.name() == builtins::eq().name() => {
                match args.as_slice() {
                    [l, r] => Some((l.clone(), r.clone())),
                    _ => None,
                }
            }
            _ => None,
        },
        PlanOp::FnCall(call) if call.func == builtins::eq() => match call.args.as_slice() {
            [l, r] => Some((operand_ast(plan, l)?, operand_ast(plan, r)?)),
            _ => None,
        },
        _ => None,
    }
}

fn operand_ast(plan: &Plan, operand: &Operand) -> Option<AstExpr> {
    match operand {
        Operand::Attr(id) => Some(AstExpr::Attr(id.clone())),
        Operand::Node(n) => match plan.op(*n) {
            PlanOp::Literal(lit) => Some(AstExpr::Literal(lit.value.clone())),
            _ => None,
        },
    }
}

impl Index for EqualityIndex {
    fn name(&self) -> &str {
        &self.name
    }

    fn matches(
        &self,
        plan: &Plan,
        candidates: &[Operand],
        renames: Option<&RenameMap>,
    ) -> Option<Vec<usize>> {
        let mut chosen: Vec<Option<usize>> = vec![None; self.keys.len()];
        for (i, cond) in candidates.iter().enumerate() {
            let Some((key, mut value)) = self.key_value(plan, cond) else {
                continue;
            };
            if chosen[key].is_some() || !value.plans().is_empty() {
                continue;
            }
            if let Some(renames) = renames {
                value.rename(renames);
            }
            if value.free_attrs().intersects(&self.source_attrs) {
                continue;
            }
            chosen[key] = Some(i);
        }
        chosen.into_iter().collect()
    }

    fn create_accessor(
        &self,
        plan: &mut Plan,
        compilers: &Compilers,
        lang: Lang,
        exprs: &[Operand],
    ) -> PlexusResult<Operand> {
        let mut values: Vec<Option<AstExpr>> = vec![None; self.keys.len()];
        for cond in exprs {
            let (key, value) = self.key_value(plan, cond).ok_or_else(|| {
                PlexusError::invalid_index(format!("{} cannot serve this condition", self.name))
            })?;
            ensure!(value.plans().is_empty(), InvalidIndex: "expression cannot contain subqueries");
            values[key] = Some(value);
        }
        let mut values = values
            .into_iter()
            .collect::<Option<Vec<_>>>()
            .ok_or_else(|| PlexusError::invalid_index(format!("{}: key not covered", self.name)))?;

        let expr = if values.len() == 1 {
            values.remove(0)
        } else {
            AstExpr::call(builtins::array(), values)
        };
        let params = compilers.compile(lang, &expr)?;
        Ok(Operand::Node(plan.builder(lang).calculation_from(params, Some(expr))))
    }
}
