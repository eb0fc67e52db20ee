//! Logical plan IR for Plexus.
//!
//! Every front end (SQL-like, graph pattern, tree path) lowers its queries
//! into the same mutable operator tree, which the optimizer then rewrites in
//! place.
//!
//! # Overview
//!
//! - [`Plan`]: an arena of [`PlanNode`]s addressed by [`NodeId`], with parent
//!   back-links and the surgery primitives rewrites are built from
//! - [`ops`]: the operator kinds ([`PlanOp`]) and their children by role
//! - [`expr`]: scalar expressions, their source form ([`expr::AstExpr`]) and
//!   the expression compiler interface
//! - [`Schema`]: ordered output attributes with a set mirror
//!
//! # Example
//!
//! ```rust
//! use plexus_core::AttrId;
//! use plexus_logical::expr::{AstExpr, builtins};
//! use plexus_logical::{Lang, Plan};
//!
//! let mut plan = Plan::new();
//! let mut b = plan.builder(Lang::Sql);
//! let people = b.tuple_source("people", [AttrId::parse("p.name"), AttrId::parse("p.age")]);
//! let adult = b
//!     .calculation(AstExpr::call(
//!         builtins::gt(),
//!         vec![AstExpr::attr("p.age"), AstExpr::lit(17i64)],
//!     ))
//!     .unwrap();
//! let root = b.selection(adult, people);
//! plan.set_root(root);
//!
//! assert_eq!(plan.schema(root).len(), 2);
//! println!("{}", plan.explain(root));
//! ```

mod builder;
mod explain;
pub mod expr;
mod lang;
mod node;
pub mod ops;
mod plan;
mod schema;

pub use builder::PlanBuilder;
pub use lang::Lang;
pub use node::{NodeId, Operand, PlanNode, SchemaSlot};
pub use ops::{OpKind, PlanOp};
pub use plan::Plan;
pub use schema::Schema;
