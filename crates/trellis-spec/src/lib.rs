//! Trellis Spec
//!
//! The workflow specification model: a tree of typed steps, each carrying
//! declared input/output shapes, plus handler identifiers, mapping tables,
//! and document parsing.
//!
//! Everything in this crate is plain data. Validation lives in
//! `trellis-validator` and graph construction in `trellis-compiler`; neither
//! mutates a [`WorkflowSpec`].

mod error;
mod handler_id;
mod mapping;
mod parse;
mod schema;
mod step;
mod workflow;

pub use error::{HandlerIdError, SpecError};
pub use handler_id::{HandlerId, Namespace};
pub use mapping::{MappingEntry, MappingSource, Mappings, SourceProblem};
pub use parse::parse_workflow;
pub use schema::{Schema, SchemaType, TypeSet};
pub use step::{
  BailStep, BranchArm, BranchStep, ConditionSpec, ForeachStep, LeafStep, LoopKind, LoopStep,
  MapStep, Params, ParallelStep, PauseKind, PauseStep, SleepStep, SleepUntilStep, Step,
  StepSequence, StepView, WorkflowRefStep,
};
pub use workflow::{CompatibilityMode, WorkflowOptions, WorkflowSpec};
