//! Trellis Compiler
//!
//! Turns a validated [`WorkflowSpec`](trellis_spec::WorkflowSpec) into an
//! executable graph for an external runtime.
//!
//! # Architecture
//!
//! ```text
//! WorkflowSpec ──► Validator ──► Compiler ──► GraphBuilder (runtime port)
//!                                   │
//!                                   └─ HandlerRegistry (resolved eagerly)
//! ```
//!
//! Each step becomes an invocable unit that, when the runtime calls it,
//! resolves its parameters against the run's [`ExecutionContext`] and calls
//! its handler. Control constructs map onto the runtime's own primitives
//! (branch, parallel, loop, foreach, map, sleep). Execution, state, and
//! suspend/resume persistence belong to the runtime.
//!
//! [`PlanBuilder`] is a runtime-agnostic builder that records the composition
//! as an inspectable [`PlanGraph`].

mod compiler;
mod context;
mod error;
mod plan;
mod port;
mod unit;

pub use compiler::{Backends, Compiled, Compiler};
pub use context::StaticContext;
pub use error::{CompileError, StepError};
pub use plan::{PlanBuilder, PlanGraph, PlanNode, PlanStep};
pub use port::{GraphBuilder, MapSource, MappingTable, StepDefinition};
pub use unit::{ExecutionContext, Invocable, Predicate, StepOutcome, SuspendRequest};
