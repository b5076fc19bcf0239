//! A runtime-agnostic [`GraphBuilder`].
//!
//! [`PlanBuilder`] records the composition calls as a tree of [`PlanNode`]s.
//! It is used to inspect what a workflow compiles to and as the test double
//! for the compiler; a runtime adapter can also walk the plan to build its
//! own graph.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use trellis_spec::{LoopKind, Schema};

use crate::port::{GraphBuilder, MapSource, MappingTable, StepDefinition};
use crate::unit::{Invocable, Predicate};

#[derive(Clone)]
pub enum PlanStep {
  Unit(StepDefinition),
  Graph(Box<PlanGraph>),
}

impl PlanStep {
  pub fn id(&self) -> &str {
    match self {
      PlanStep::Unit(definition) => &definition.id,
      PlanStep::Graph(graph) => &graph.id,
    }
  }
}

#[derive(Clone)]
pub enum PlanNode {
  Step(PlanStep),
  Parallel {
    id: String,
    steps: Vec<PlanStep>,
    concurrency: Option<u32>,
  },
  Branch {
    id: String,
    arms: Vec<(Arc<dyn Predicate>, PlanStep)>,
  },
  Loop {
    id: String,
    kind: LoopKind,
    body: PlanStep,
    condition: Arc<dyn Predicate>,
  },
  Foreach {
    id: String,
    body: PlanStep,
    concurrency: u32,
  },
  Map {
    id: String,
    table: MappingTable,
  },
  Sleep {
    id: String,
    duration: Duration,
  },
  SleepUntil {
    id: String,
    until: DateTime<Utc>,
  },
}

#[derive(Clone)]
pub struct PlanGraph {
  pub id: String,
  pub input_schema: Option<Schema>,
  pub output_schema: Option<Schema>,
  nodes: Vec<PlanNode>,
  committed: bool,
}

impl PlanGraph {
  pub fn nodes(&self) -> &[PlanNode] {
    &self.nodes
  }

  pub fn is_committed(&self) -> bool {
    self.committed
  }

  /// Number of invocable units, including those in nested graphs.
  pub fn step_count(&self) -> usize {
    self.nodes.iter().map(node_units).sum()
  }

  /// Find a unit by step id anywhere in the plan.
  pub fn find_unit(&self, id: &str) -> Option<Arc<dyn Invocable>> {
    self.nodes.iter().find_map(|node| match node {
      PlanNode::Step(step) => find_in_step(step, id),
      PlanNode::Parallel { steps, .. } => steps.iter().find_map(|s| find_in_step(s, id)),
      PlanNode::Branch { arms, .. } => arms.iter().find_map(|(_, s)| find_in_step(s, id)),
      PlanNode::Loop { body, .. } | PlanNode::Foreach { body, .. } => find_in_step(body, id),
      _ => None,
    })
  }

  /// A one-line outline of the composition, for structural comparison.
  pub fn shape(&self) -> String {
    let nodes: Vec<String> = self.nodes.iter().map(node_shape).collect();
    format!("graph({})[{}]", self.id, nodes.join(", "))
  }
}

impl fmt::Debug for PlanGraph {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.shape())
  }
}

fn node_units(node: &PlanNode) -> usize {
  match node {
    PlanNode::Step(step) => step_units(step),
    PlanNode::Parallel { steps, .. } => steps.iter().map(step_units).sum(),
    PlanNode::Branch { arms, .. } => arms.iter().map(|(_, s)| step_units(s)).sum(),
    PlanNode::Loop { body, .. } | PlanNode::Foreach { body, .. } => step_units(body),
    PlanNode::Map { .. } | PlanNode::Sleep { .. } | PlanNode::SleepUntil { .. } => 0,
  }
}

fn step_units(step: &PlanStep) -> usize {
  match step {
    PlanStep::Unit(_) => 1,
    PlanStep::Graph(graph) => graph.step_count(),
  }
}

fn find_in_step(step: &PlanStep, id: &str) -> Option<Arc<dyn Invocable>> {
  match step {
    PlanStep::Unit(definition) if definition.id == id => Some(definition.unit.clone()),
    PlanStep::Unit(_) => None,
    PlanStep::Graph(graph) => graph.find_unit(id),
  }
}

fn step_shape(step: &PlanStep) -> String {
  match step {
    PlanStep::Unit(definition) => format!("step({})", definition.id),
    PlanStep::Graph(graph) => graph.shape(),
  }
}

fn node_shape(node: &PlanNode) -> String {
  match node {
    PlanNode::Step(step) => step_shape(step),
    PlanNode::Parallel {
      id,
      steps,
      concurrency,
    } => {
      let steps: Vec<String> = steps.iter().map(step_shape).collect();
      match concurrency {
        Some(n) => format!("parallel({};{})[{}]", id, n, steps.join(", ")),
        None => format!("parallel({})[{}]", id, steps.join(", ")),
      }
    }
    PlanNode::Branch { id, arms } => {
      let arms: Vec<String> = arms.iter().map(|(_, s)| step_shape(s)).collect();
      format!("branch({})[{}]", id, arms.join(", "))
    }
    PlanNode::Loop { id, kind, body, .. } => {
      let name = match kind {
        LoopKind::DoWhile => "dowhile",
        LoopKind::DoUntil => "dountil",
      };
      format!("{}({})[{}]", name, id, step_shape(body))
    }
    PlanNode::Foreach {
      id,
      body,
      concurrency,
    } => format!("foreach({};{})[{}]", id, concurrency, step_shape(body)),
    PlanNode::Map { id, table } => {
      let entries: Vec<String> = table
        .iter()
        .map(|(key, source)| format!("{}<-{}", key, source_shape(source)))
        .collect();
      format!("map({}){{{}}}", id, entries.join(", "))
    }
    PlanNode::Sleep { id, duration } => format!("sleep({};{}ms)", id, duration.as_millis()),
    PlanNode::SleepUntil { id, until } => format!("sleepUntil({};{})", id, until.to_rfc3339()),
  }
}

fn source_shape(source: &MapSource) -> String {
  let path = |p: &Option<String>| p.as_deref().map(|p| format!(".{}", p)).unwrap_or_default();
  match source {
    MapSource::Step { step_id, path: p } => format!("step:{}{}", step_id, path(p)),
    MapSource::Init { path: p } => format!("init{}", path(p)),
    MapSource::Context { path: p } => format!("context{}", path(p)),
    MapSource::Literal(value) => format!("literal:{}", value),
  }
}

/// Records composition calls into a [`PlanGraph`].
#[derive(Debug, Clone, Copy, Default)]
pub struct PlanBuilder;

impl PlanBuilder {
  pub fn new() -> Self {
    Self
  }
}

fn push(mut graph: PlanGraph, node: PlanNode) -> PlanGraph {
  graph.nodes.push(node);
  graph
}

impl GraphBuilder for PlanBuilder {
  type Step = PlanStep;
  type Graph = PlanGraph;

  fn create_step(&self, definition: StepDefinition) -> PlanStep {
    PlanStep::Unit(definition)
  }

  fn create_graph(&self, id: &str, input: Option<&Schema>, output: Option<&Schema>) -> PlanGraph {
    PlanGraph {
      id: id.to_string(),
      input_schema: input.cloned(),
      output_schema: output.cloned(),
      nodes: Vec::new(),
      committed: false,
    }
  }

  fn then(&self, graph: PlanGraph, step: PlanStep) -> PlanGraph {
    push(graph, PlanNode::Step(step))
  }

  fn parallel(
    &self,
    graph: PlanGraph,
    id: &str,
    steps: Vec<PlanStep>,
    concurrency: Option<u32>,
  ) -> PlanGraph {
    push(
      graph,
      PlanNode::Parallel {
        id: id.to_string(),
        steps,
        concurrency,
      },
    )
  }

  fn branch(&self, graph: PlanGraph, id: &str, arms: Vec<(Arc<dyn Predicate>, PlanStep)>) -> PlanGraph {
    push(
      graph,
      PlanNode::Branch {
        id: id.to_string(),
        arms,
      },
    )
  }

  fn loop_step(
    &self,
    graph: PlanGraph,
    id: &str,
    kind: LoopKind,
    body: PlanStep,
    condition: Arc<dyn Predicate>,
  ) -> PlanGraph {
    push(
      graph,
      PlanNode::Loop {
        id: id.to_string(),
        kind,
        body,
        condition,
      },
    )
  }

  fn foreach(&self, graph: PlanGraph, id: &str, body: PlanStep, concurrency: u32) -> PlanGraph {
    push(
      graph,
      PlanNode::Foreach {
        id: id.to_string(),
        body,
        concurrency,
      },
    )
  }

  fn map(&self, graph: PlanGraph, id: &str, table: MappingTable) -> PlanGraph {
    push(
      graph,
      PlanNode::Map {
        id: id.to_string(),
        table,
      },
    )
  }

  fn sleep(&self, graph: PlanGraph, id: &str, duration: Duration) -> PlanGraph {
    push(
      graph,
      PlanNode::Sleep {
        id: id.to_string(),
        duration,
      },
    )
  }

  fn sleep_until(&self, graph: PlanGraph, id: &str, until: DateTime<Utc>) -> PlanGraph {
    push(
      graph,
      PlanNode::SleepUntil {
        id: id.to_string(),
        until,
      },
    )
  }

  fn clone_graph(&self, graph: &PlanGraph, id: &str) -> PlanGraph {
    PlanGraph {
      id: id.to_string(),
      ..graph.clone()
    }
  }

  fn nest(&self, graph: PlanGraph) -> PlanStep {
    PlanStep::Graph(Box::new(graph))
  }

  fn commit(&self, mut graph: PlanGraph) -> PlanGraph {
    graph.committed = true;
    graph
  }
}
