//! The runtime boundary.
//!
//! The compiler never executes anything. It drives a [`GraphBuilder`], the
//! runtime's own composition primitives, and hands it invocable units. Any
//! engine that implements this trait can run compiled workflows.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde_json::Value;
use trellis_spec::{LoopKind, Schema};

use crate::unit::{Invocable, Predicate};

/// A schedulable step: metadata plus the unit to invoke.
#[derive(Clone)]
pub struct StepDefinition {
  pub id: String,
  pub description: Option<String>,
  pub input_schema: Option<Schema>,
  pub output_schema: Option<Schema>,
  pub unit: Arc<dyn Invocable>,
}

/// Where a mapped value comes from, in runtime terms.
#[derive(Debug, Clone, PartialEq)]
pub enum MapSource {
  /// Output of a step; `None` selects the whole output.
  Step {
    step_id: String,
    path: Option<String>,
  },
  Init {
    path: Option<String>,
  },
  Context {
    path: Option<String>,
  },
  Literal(Value),
}

/// Output key -> source.
pub type MappingTable = BTreeMap<String, MapSource>;

/// Composition primitives of an execution runtime.
///
/// Graphs are threaded by value: every composition call takes the graph
/// built so far and returns the extended one.
pub trait GraphBuilder {
  type Step: Clone;
  type Graph: Clone;

  fn create_step(&self, definition: StepDefinition) -> Self::Step;

  fn create_graph(&self, id: &str, input: Option<&Schema>, output: Option<&Schema>) -> Self::Graph;

  /// Append a step to run after everything already in the graph.
  fn then(&self, graph: Self::Graph, step: Self::Step) -> Self::Graph;

  /// Run steps concurrently, at most `concurrency` at a time when bounded.
  fn parallel(
    &self,
    graph: Self::Graph,
    id: &str,
    steps: Vec<Self::Step>,
    concurrency: Option<u32>,
  ) -> Self::Graph;

  /// Run the step of the first arm whose predicate holds.
  fn branch(
    &self,
    graph: Self::Graph,
    id: &str,
    arms: Vec<(Arc<dyn Predicate>, Self::Step)>,
  ) -> Self::Graph;

  /// Repeat `body`; the predicate is evaluated after each iteration.
  fn loop_step(
    &self,
    graph: Self::Graph,
    id: &str,
    kind: LoopKind,
    body: Self::Step,
    condition: Arc<dyn Predicate>,
  ) -> Self::Graph;

  fn foreach(&self, graph: Self::Graph, id: &str, body: Self::Step, concurrency: u32) -> Self::Graph;

  fn map(&self, graph: Self::Graph, id: &str, table: MappingTable) -> Self::Graph;

  fn sleep(&self, graph: Self::Graph, id: &str, duration: Duration) -> Self::Graph;

  fn sleep_until(&self, graph: Self::Graph, id: &str, until: DateTime<Utc>) -> Self::Graph;

  /// Copy a committed graph under a new id.
  fn clone_graph(&self, graph: &Self::Graph, id: &str) -> Self::Graph;

  /// Use a graph as a single step of another graph.
  fn nest(&self, graph: Self::Graph) -> Self::Step;

  fn commit(&self, graph: Self::Graph) -> Self::Graph;
}
