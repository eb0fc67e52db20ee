//! Core data model for Plexus.
//!
//! This crate provides the primitives every other Plexus crate is built on:
//! - `AttrId`, a qualified attribute name made of parts
//! - `IdSet` and `RenameMap`, tries keyed by attribute part sequences
//! - `Value`, the scalar value type carried by literals

pub mod ident;
pub mod types;

pub use ident::{AttrId, IdPart, IdSet, RenameMap, Symbol};
pub use types::Value;
