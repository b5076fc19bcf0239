//! Trellis Validator
//!
//! Static checks over a workflow's step tree, run before any graph is built:
//!
//! - declared output shapes are compared against the next step's declared
//!   input shape, carrying the "current" shape through nested branches,
//!   parallel groups, loops and foreach bodies
//! - mapping entries must name a recognized source and earlier steps
//! - step ids must be unique across the whole tree
//! - with a [`HandlerLookup`], every named handler and sub-workflow must exist
//!
//! Mismatches are warnings or errors depending on the [`CompatibilityMode`];
//! structural problems are always errors.
//!
//! [`CompatibilityMode`]: trellis_spec::CompatibilityMode

mod compat;
mod issue;
mod lookup;
mod validator;

pub use compat::check_compatibility;
pub use issue::{SchemaIssue, Severity};
pub use lookup::HandlerLookup;
pub use validator::{Shape, ValidationReport, Validator, validate_mappings};
