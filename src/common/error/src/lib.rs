//! Error types and result aliases for Plexus.
//!
//! Only the collaborator seams of the optimizer (expression compilation,
//! index construction, configuration loading) produce recoverable errors.
//! Broken plan invariants are programmer errors and panic instead.

mod error;

pub use error::{GenericError, PlexusError, PlexusResult};
