use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tracing::{error, info, instrument, warn};
use trellis_registry::HandlerRegistry;
use trellis_spec::{
  CompatibilityMode, ConditionSpec, HandlerId, LeafStep, MappingSource, Mappings, Params, Schema,
  Step, StepView, WorkflowSpec, parse_workflow,
};
use trellis_validator::{HandlerLookup, SchemaIssue, Validator};

use crate::error::CompileError;
use crate::port::{GraphBuilder, MapSource, MappingTable, StepDefinition};
use crate::unit::{BailUnit, ConditionUnit, Invocable, LeafUnit, PauseUnit, Predicate};

/// Backend configuration blocks, carried through untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Backends {
  pub observability: Option<Value>,
  pub memory: Option<Value>,
  pub storage: Option<Value>,
}

/// Result of a successful compile.
#[derive(Debug, Clone)]
pub struct Compiled<G> {
  pub graph: G,
  pub warnings: Vec<SchemaIssue>,
  pub backends: Backends,
}

/// Turns workflow specs into runtime graphs.
///
/// A compiler holds only what it was configured with; each `compile` call is
/// independent, so one compiler may be shared across threads.
pub struct Compiler<B: GraphBuilder> {
  builder: B,
  registry: Arc<HandlerRegistry>,
  subgraphs: HashMap<String, B::Graph>,
  mode: Option<CompatibilityMode>,
}

impl<B: GraphBuilder> Compiler<B> {
  pub fn new(builder: B, registry: Arc<HandlerRegistry>) -> Self {
    Self {
      builder,
      registry,
      subgraphs: HashMap::new(),
      mode: None,
    }
  }

  /// Make a compiled graph available to `workflow` steps under `id`.
  pub fn with_subgraph(mut self, id: impl Into<String>, graph: B::Graph) -> Self {
    self.subgraphs.insert(id.into(), graph);
    self
  }

  /// Override the compatibility mode declared in the document.
  pub fn with_mode(mut self, mode: CompatibilityMode) -> Self {
    self.mode = Some(mode);
    self
  }

  /// Parse a YAML/JSON document, then compile it.
  pub fn compile_str(&self, text: &str) -> Result<Compiled<B::Graph>, CompileError> {
    let spec = parse_workflow(text)?;
    self.compile(&spec)
  }

  /// Validate and build a workflow.
  ///
  /// Every validation issue is collected first; any error aborts before the
  /// graph is built. Handlers are resolved while building, so a compiled
  /// graph never refers to a missing handler.
  #[instrument(name = "compile", skip(self, spec), fields(workflow_id = %spec.id))]
  pub fn compile(&self, spec: &WorkflowSpec) -> Result<Compiled<B::Graph>, CompileError> {
    let mode = self.mode.unwrap_or(spec.mode());
    info!(mode = mode.as_str(), steps = spec.steps.len(), "compile_started");

    let lookup = CompileLookup {
      registry: &self.registry,
      subgraphs: self.subgraphs.keys().map(String::as_str).collect(),
    };
    let report = Validator::new(mode).with_lookup(&lookup).validate(spec);

    if report.has_errors() {
      let issues: Vec<SchemaIssue> = report.errors().cloned().collect();
      let message = issues
        .iter()
        .map(SchemaIssue::to_string)
        .collect::<Vec<_>>()
        .join("\n");
      error!(errors = issues.len(), "compile_failed");
      return Err(CompileError::Validation { message, issues });
    }

    let warnings: Vec<SchemaIssue> = report.warnings().cloned().collect();
    for warning in &warnings {
      warn!(path = %warning.path, message = %warning.message, "compile_warning");
    }

    let graph = self
      .sequence(
        &spec.id,
        spec.input_schema.as_ref(),
        spec.output_schema.as_ref(),
        &spec.steps,
      )
      .inspect_err(|e| error!(error = %e, "compile_failed"))?;

    info!(warnings = warnings.len(), "compile_completed");
    Ok(Compiled {
      graph,
      warnings,
      backends: Backends {
        observability: spec.observability.clone(),
        memory: spec.memory.clone(),
        storage: spec.storage.clone(),
      },
    })
  }

  /// Build and commit a graph running `steps` in order.
  fn sequence(
    &self,
    id: &str,
    input: Option<&Schema>,
    output: Option<&Schema>,
    steps: &[Step],
  ) -> Result<B::Graph, CompileError> {
    let mut graph = self.builder.create_graph(id, input, output);
    for step in steps {
      graph = self.append(graph, step)?;
    }
    Ok(self.builder.commit(graph))
  }

  fn append(&self, graph: B::Graph, step: &Step) -> Result<B::Graph, CompileError> {
    let builder = &self.builder;

    let graph = match step.view() {
      StepView::Leaf(_, _) | StepView::Pause(_, _) | StepView::Bail(_) => {
        let unit = self.unit(step)?;
        builder.then(graph, unit)
      }

      StepView::Branch(branch) => {
        let mut arms = Vec::with_capacity(branch.branches.len());
        for (i, arm) in branch.branches.iter().enumerate() {
          let predicate = self.predicate(&branch.id, &arm.condition)?;
          let arm_id = format!("{}.branches[{}]", branch.id, i);
          let body = self.sequence(&arm_id, None, None, &arm.steps)?;
          arms.push((predicate, builder.nest(body)));
        }
        builder.branch(graph, &branch.id, arms)
      }

      StepView::Parallel(parallel) => {
        let mut members = Vec::with_capacity(parallel.branches.len());
        for (i, member) in parallel.branches.iter().enumerate() {
          let member_id = format!("{}.branches[{}]", parallel.id, i);
          let body = self.sequence(&member_id, None, None, &member.steps)?;
          members.push(builder.nest(body));
        }
        builder.parallel(graph, &parallel.id, members, parallel.concurrency)
      }

      StepView::Foreach(foreach) => {
        let body = self.unit(&foreach.step)?;
        builder.foreach(graph, &foreach.id, body, foreach.concurrency)
      }

      StepView::Loop(kind, body) => {
        let unit = self.unit(&body.step)?;
        let condition = self.predicate(&body.id, &body.condition)?;
        builder.loop_step(graph, &body.id, kind, unit, condition)
      }

      StepView::Map(map) => builder.map(graph, &map.id, mapping_table(&map.mappings)),

      StepView::Sleep(sleep) => {
        builder.sleep(graph, &sleep.id, Duration::from_millis(sleep.duration_ms))
      }

      StepView::SleepUntil(sleep) => builder.sleep_until(graph, &sleep.id, sleep.date),

      StepView::Workflow(reference) => {
        let sub = self
          .subgraphs
          .get(&reference.workflow)
          .ok_or_else(|| CompileError::UndefinedWorkflow {
            step_id: reference.id.clone(),
            workflow: reference.workflow.clone(),
          })?;
        let graph = match &reference.input_mapping {
          Some(mappings) => builder.map(
            graph,
            &format!("{}.input", reference.id),
            mapping_table(mappings),
          ),
          None => graph,
        };
        let nested = builder.clone_graph(sub, &reference.id);
        builder.then(graph, builder.nest(nested))
      }
    };

    Ok(graph)
  }

  /// A single schedulable step for `step`; control constructs are wrapped
  /// in a nested graph.
  fn unit(&self, step: &Step) -> Result<B::Step, CompileError> {
    let unit: Arc<dyn Invocable> = match step.view() {
      StepView::Leaf(_, leaf) => Arc::new(self.leaf_unit(step, leaf)?),
      StepView::Pause(kind, pause) => Arc::new(PauseUnit {
        step_id: pause.id.clone(),
        kind,
        prompt: pause.prompt.clone(),
        reason: pause.reason.clone(),
        timeout_ms: pause.timeout_ms,
        resume_schema: pause.resume_schema.clone(),
        payload: pause.payload.clone(),
      }),
      StepView::Bail(bail) => Arc::new(BailUnit {
        step_id: bail.id.clone(),
        condition: bail.condition.clone(),
        payload: bail.payload.clone(),
      }),
      _ => {
        let graph = self.sequence(
          step.id(),
          step.input_schema(),
          step.output_schema(),
          std::slice::from_ref(step),
        )?;
        return Ok(self.builder.nest(graph));
      }
    };

    let description = match step.view() {
      StepView::Leaf(_, leaf) => leaf.description.clone(),
      StepView::Pause(_, pause) => pause.description.clone(),
      StepView::Bail(bail) => bail.description.clone(),
      _ => None,
    };

    Ok(self.builder.create_step(StepDefinition {
      id: step.id().to_string(),
      description,
      input_schema: step.input_schema().cloned(),
      output_schema: step.output_schema().cloned(),
      unit,
    }))
  }

  fn leaf_unit(&self, step: &Step, leaf: &LeafStep) -> Result<LeafUnit, CompileError> {
    let id = match step.handler_id() {
      Some(Ok(id)) => id,
      Some(Err(source)) => {
        return Err(CompileError::InvalidHandler {
          step_id: leaf.id.clone(),
          source,
        });
      }
      None => {
        return Err(CompileError::MissingHandler {
          step_id: leaf.id.clone(),
        });
      }
    };
    self.bind(&leaf.id, &id, &leaf.params)
  }

  fn predicate(&self, owner: &str, condition: &ConditionSpec) -> Result<Arc<dyn Predicate>, CompileError> {
    let id = match condition.handler_id() {
      Some(Ok(id)) => id,
      Some(Err(source)) => {
        return Err(CompileError::InvalidHandler {
          step_id: owner.to_string(),
          source,
        });
      }
      None => {
        return Err(CompileError::MissingHandler {
          step_id: owner.to_string(),
        });
      }
    };
    let leaf = self.bind(owner, &id, &condition.params)?;
    Ok(Arc::new(ConditionUnit { leaf }))
  }

  fn bind(
    &self,
    step_id: &str,
    id: &HandlerId,
    params: &Params,
  ) -> Result<LeafUnit, CompileError> {
    let handler = self
      .registry
      .resolve_id(id)
      .map_err(|source| CompileError::Registry {
        step_id: step_id.to_string(),
        source,
      })?;
    Ok(LeafUnit {
      step_id: step_id.to_string(),
      handler,
      params: params.clone(),
    })
  }
}

/// Translate mapping entries into the runtime's source vocabulary.
///
/// Validation has already rejected entries without a usable source.
fn mapping_table(mappings: &Mappings) -> MappingTable {
  mappings
    .iter()
    .filter_map(|(key, entry)| {
      let source = match entry.source().ok()? {
        MappingSource::Literal(value) => MapSource::Literal(value),
        MappingSource::Step { step_id, path } => MapSource::Step { step_id, path },
        MappingSource::Init { path } => MapSource::Init { path },
        MappingSource::RequestContext { path } => MapSource::Context { path },
      };
      Some((key.clone(), source))
    })
    .collect()
}

/// Registry plus the compiler's own sub-graphs.
struct CompileLookup<'a> {
  registry: &'a HandlerRegistry,
  subgraphs: HashSet<&'a str>,
}

impl HandlerLookup for CompileLookup<'_> {
  fn has_handler(&self, id: &HandlerId) -> bool {
    self.registry.contains(id)
  }

  fn has_workflow(&self, id: &str) -> bool {
    self.subgraphs.contains(id) || self.registry.has_workflow(id)
  }
}
