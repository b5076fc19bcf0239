use std::collections::HashMap;

use tracing::debug;
use trellis_spec::{
  CompatibilityMode, ConditionSpec, MappingSource, Mappings, Schema, SourceProblem, Step,
  StepView, WorkflowSpec,
};

use crate::compat::check_compatibility;
use crate::issue::{SchemaIssue, Severity};
use crate::lookup::HandlerLookup;

/// The output shape carried forward to the next step.
#[derive(Debug, Clone, PartialEq)]
pub enum Shape {
  Known(Schema),
  /// Statically untrackable; the next consumer is not checked.
  Opaque,
}

impl Shape {
  fn from_declared(schema: Option<&Schema>) -> Self {
    match schema {
      Some(schema) => Shape::Known(schema.clone()),
      None => Shape::Opaque,
    }
  }
}

/// All issues found in one validation pass.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ValidationReport {
  pub issues: Vec<SchemaIssue>,
}

impl ValidationReport {
  pub fn has_errors(&self) -> bool {
    self.issues.iter().any(SchemaIssue::is_error)
  }

  pub fn errors(&self) -> impl Iterator<Item = &SchemaIssue> {
    self.issues.iter().filter(|i| i.is_error())
  }

  pub fn warnings(&self) -> impl Iterator<Item = &SchemaIssue> {
    self.issues.iter().filter(|i| !i.is_error())
  }
}

/// Walks a step tree and reports shape mismatches and structural problems.
///
/// Validation never stops at the first problem; every issue in the tree is
/// collected so callers can report them together.
pub struct Validator<'a> {
  mode: CompatibilityMode,
  lookup: Option<&'a dyn HandlerLookup>,
}

impl<'a> Validator<'a> {
  pub fn new(mode: CompatibilityMode) -> Self {
    Self { mode, lookup: None }
  }

  /// Also check that every named handler and sub-workflow exists.
  pub fn with_lookup(mut self, lookup: &'a dyn HandlerLookup) -> Self {
    self.lookup = Some(lookup);
    self
  }

  pub fn validate(&self, spec: &WorkflowSpec) -> ValidationReport {
    let report = self.validate_steps(&spec.steps, spec.input_schema.as_ref());
    debug!(
      workflow_id = %spec.id,
      mode = %self.mode.as_str(),
      errors = report.errors().count(),
      warnings = report.warnings().count(),
      "validation_completed"
    );
    report
  }

  /// Validate a top-level sequence starting from the workflow input shape.
  pub fn validate_steps(&self, steps: &[Step], input_schema: Option<&Schema>) -> ValidationReport {
    let mut issues = Vec::new();
    if steps.is_empty() {
      issues.push(SchemaIssue::error("steps", "workflow requires at least one step"));
    }
    issues.extend(duplicate_ids(steps));

    let (flow, _) = self.sequence(steps, "steps", Shape::from_declared(input_schema), &[]);
    issues.extend(flow);
    ValidationReport { issues }
  }

  fn sequence(
    &self,
    steps: &[Step],
    base: &str,
    carried: Shape,
    visible: &[String],
  ) -> (Vec<SchemaIssue>, Shape) {
    let mut issues = Vec::new();
    let mut visible = visible.to_vec();
    let mut carried = carried;

    for (i, step) in steps.iter().enumerate() {
      let path = format!("{}[{}]", base, i);
      let (step_issues, output) = self.step(step, &path, &carried, &visible);
      issues.extend(step_issues);
      carried = output;
      visible.push(step.id().to_string());
    }

    (issues, carried)
  }

  fn step(
    &self,
    step: &Step,
    path: &str,
    carried: &Shape,
    visible: &[String],
  ) -> (Vec<SchemaIssue>, Shape) {
    let mut issues = Vec::new();

    if step.id().trim().is_empty() {
      issues.push(SchemaIssue::error(path, "step id must not be empty"));
    }

    issues.extend(self.check_input(carried, step.input_schema(), path));

    let flowed = match step.view() {
      StepView::Leaf(_, _) => {
        issues.extend(self.check_leaf_handler(step, path));
        Shape::Opaque
      }

      StepView::Branch(branch) => {
        if branch.branches.is_empty() {
          issues.push(SchemaIssue::error(path, "branch requires at least one arm"));
        }
        for (i, arm) in branch.branches.iter().enumerate() {
          let arm_path = format!("{}.branches[{}]", path, i);
          issues.extend(self.check_condition(&arm.condition, carried, &arm_path));
          if arm.steps.is_empty() {
            issues.push(SchemaIssue::error(&arm_path, "branch arm requires at least one step"));
          }
          let (nested, _) = self.sequence(
            &arm.steps,
            &format!("{}.steps", arm_path),
            carried.clone(),
            visible,
          );
          issues.extend(nested);
        }
        Shape::Opaque
      }

      StepView::Parallel(parallel) => {
        if parallel.branches.is_empty() {
          issues.push(SchemaIssue::error(path, "parallel requires at least one branch"));
        }
        if parallel.concurrency == Some(0) {
          issues.push(SchemaIssue::error(path, "parallel concurrency must be at least 1"));
        }
        for (i, member) in parallel.branches.iter().enumerate() {
          let member_path = format!("{}.branches[{}]", path, i);
          if member.steps.is_empty() {
            issues.push(SchemaIssue::error(
              &member_path,
              "parallel branch requires at least one step",
            ));
          }
          let (nested, _) = self.sequence(
            &member.steps,
            &format!("{}.steps", member_path),
            carried.clone(),
            visible,
          );
          issues.extend(nested);
        }
        Shape::Opaque
      }

      StepView::Foreach(foreach) => {
        if foreach.concurrency == 0 {
          issues.push(SchemaIssue::error(path, "foreach concurrency must be at least 1"));
        }
        let item = match carried {
          Shape::Known(schema) if schema.declares_type() && !schema.is_array() => {
            issues.push(SchemaIssue::new(
              Severity::for_mode(self.mode),
              path,
              format!(
                "foreach requires an array input, but previous step produces {}",
                schema
                  .non_null_types()
                  .iter()
                  .map(|t| t.as_str())
                  .collect::<Vec<_>>()
                  .join(" | ")
              ),
            ));
            Shape::Opaque
          }
          Shape::Known(schema) => Shape::from_declared(schema.items.as_deref()),
          Shape::Opaque => Shape::Opaque,
        };
        let (nested, body) = self.step(&foreach.step, &format!("{}.step", path), &item, visible);
        issues.extend(nested);
        match body {
          Shape::Known(body) => Shape::Known(Schema::array_of(Some(body))),
          Shape::Opaque => Shape::Known(Schema::array_of(None)),
        }
      }

      StepView::Loop(_, body) => {
        let (nested, output) = self.step(&body.step, &format!("{}.step", path), carried, visible);
        issues.extend(nested);
        issues.extend(self.check_condition(&body.condition, &output, path));
        output
      }

      StepView::Map(map) => {
        issues.extend(validate_mappings(
          &map.mappings,
          &format!("{}.mappings", path),
          visible,
        ));
        Shape::Opaque
      }

      StepView::Sleep(_) | StepView::SleepUntil(_) => carried.clone(),

      StepView::Workflow(workflow) => {
        if workflow.workflow.trim().is_empty() {
          issues.push(SchemaIssue::error(path, "workflow step requires a workflow id"));
        } else if let Some(lookup) = self.lookup {
          if !lookup.has_workflow(&workflow.workflow) {
            issues.push(SchemaIssue::error(
              path,
              format!("sub-workflow '{}' is not registered", workflow.workflow),
            ));
          }
        }
        if let Some(mappings) = &workflow.input_mapping {
          issues.extend(validate_mappings(
            mappings,
            &format!("{}.inputMapping", path),
            visible,
          ));
        }
        Shape::Opaque
      }

      StepView::Pause(_, _) | StepView::Bail(_) => Shape::Opaque,
    };

    // A declared output wins over whatever the step's structure implies.
    let output = match step.output_schema() {
      Some(declared) => Shape::Known(declared.clone()),
      None => flowed,
    };
    (issues, output)
  }

  fn check_input(&self, carried: &Shape, input: Option<&Schema>, path: &str) -> Vec<SchemaIssue> {
    match (carried, input) {
      (Shape::Known(producer), Some(consumer)) => check_compatibility(
        producer,
        consumer,
        &format!("{}.inputSchema", path),
        self.mode,
      ),
      _ => Vec::new(),
    }
  }

  /// Compare the carried shape against a condition's input and check its handler.
  fn check_condition(&self, condition: &ConditionSpec, carried: &Shape, base: &str) -> Vec<SchemaIssue> {
    let path = format!("{}.condition", base);
    let mut issues = self.check_input(carried, condition.input_schema.as_ref(), &path);

    if let Some(lookup) = self.lookup {
      match condition.handler_id() {
        Some(Ok(id)) if !lookup.has_handler(&id) => issues.push(SchemaIssue::error(
          &path,
          format!("condition handler '{}' is not registered", id),
        )),
        Some(Err(e)) => issues.push(SchemaIssue::error(&path, e.to_string())),
        _ => {}
      }
    }
    issues
  }

  fn check_leaf_handler(&self, step: &Step, path: &str) -> Vec<SchemaIssue> {
    let Some(lookup) = self.lookup else {
      return Vec::new();
    };
    match step.handler_id() {
      Some(Ok(id)) if !lookup.has_handler(&id) => vec![SchemaIssue::error(
        path,
        format!("handler '{}' is not registered", id),
      )],
      Some(Err(e)) => vec![SchemaIssue::error(path, e.to_string())],
      _ => Vec::new(),
    }
  }
}

/// Check each mapping entry's source. `visible` holds the ids of steps that
/// run before the mapping in its own or an enclosing scope.
pub fn validate_mappings(mappings: &Mappings, base: &str, visible: &[String]) -> Vec<SchemaIssue> {
  let mut issues = Vec::new();

  for (key, entry) in mappings {
    let path = format!("{}.{}", base, key);
    match entry.source() {
      Ok(MappingSource::Step { step_id, .. }) => {
        if !visible.iter().any(|id| *id == step_id) {
          issues.push(SchemaIssue::error(
            &path,
            format!("unknown step reference '{}'", step_id),
          ));
        }
        if entry.path.is_some() && !entry.has_string_path() {
          issues.push(SchemaIssue::warning(&path, "mapping path should be a string"));
        }
      }
      Ok(MappingSource::Init { .. }) | Ok(MappingSource::RequestContext { .. }) => {
        if !entry.has_string_path() {
          issues.push(SchemaIssue::warning(&path, "mapping entry should declare a string path"));
        }
      }
      Ok(MappingSource::Literal(_)) => {}
      Err(SourceProblem::Unrecognized(source)) => issues.push(SchemaIssue::error(
        &path,
        format!("unrecognized mapping source '{}'", source),
      )),
      Err(SourceProblem::Missing) => {
        issues.push(SchemaIssue::error(&path, "mapping entry declares no source"))
      }
      Err(SourceProblem::MissingStepId) => {
        issues.push(SchemaIssue::error(&path, "step mapping requires a stepId"))
      }
    }
  }

  issues
}

/// One error per repeated id anywhere in the tree, citing the first location.
fn duplicate_ids(steps: &[Step]) -> Vec<SchemaIssue> {
  let mut located = Vec::new();
  collect_ids(steps, "steps", &mut located);

  let mut first_seen: HashMap<&str, &str> = HashMap::new();
  let mut issues = Vec::new();
  for (id, path) in &located {
    if id.is_empty() {
      continue;
    }
    match first_seen.get(id) {
      Some(first) => issues.push(SchemaIssue::error(
        path,
        format!("duplicate step id '{}' (first defined at {})", id, first),
      )),
      None => {
        first_seen.insert(id, path);
      }
    }
  }
  issues
}

fn collect_ids<'a>(steps: &'a [Step], base: &str, out: &mut Vec<(&'a str, String)>) {
  for (i, step) in steps.iter().enumerate() {
    collect_step(step, format!("{}[{}]", base, i), out);
  }
}

fn collect_step<'a>(step: &'a Step, path: String, out: &mut Vec<(&'a str, String)>) {
  out.push((step.id(), path.clone()));
  match step.view() {
    StepView::Branch(branch) => {
      for (i, arm) in branch.branches.iter().enumerate() {
        collect_ids(&arm.steps, &format!("{}.branches[{}].steps", path, i), out);
      }
    }
    StepView::Parallel(parallel) => {
      for (i, member) in parallel.branches.iter().enumerate() {
        collect_ids(&member.steps, &format!("{}.branches[{}].steps", path, i), out);
      }
    }
    StepView::Foreach(foreach) => collect_step(&foreach.step, format!("{}.step", path), out),
    StepView::Loop(_, body) => collect_step(&body.step, format!("{}.step", path), out),
    _ => {}
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn steps(yaml: &str) -> Vec<Step> {
    serde_yaml::from_str(yaml).unwrap()
  }

  #[test]
  fn test_empty_sequence_is_an_error() {
    let report = Validator::new(CompatibilityMode::Warn).validate_steps(&[], None);
    assert!(report.has_errors());
    assert_eq!(report.issues[0].path, "steps");
  }

  #[test]
  fn test_workflow_input_seeds_carried_shape() {
    let steps = steps(
      r#"
- type: call
  id: a
  handler: h
  inputSchema: { type: number }
"#,
    );
    let input: Schema = serde_yaml::from_str("{ type: string }").unwrap();
    let report = Validator::new(CompatibilityMode::Strict).validate_steps(&steps, Some(&input));
    assert_eq!(report.errors().count(), 1);
    assert_eq!(report.issues[0].path, "steps[0].inputSchema");
  }

  #[test]
  fn test_sleep_is_transparent() {
    let steps = steps(
      r#"
- { type: call, id: a, handler: h, outputSchema: { type: string } }
- { type: sleep, id: pause, durationMs: 10 }
- { type: call, id: b, handler: h, inputSchema: { type: number } }
"#,
    );
    let report = Validator::new(CompatibilityMode::Strict).validate_steps(&steps, None);
    assert_eq!(report.errors().count(), 1);
    assert_eq!(report.issues[0].path, "steps[2].inputSchema");
  }

  #[test]
  fn test_map_makes_shape_opaque() {
    let steps = steps(
      r#"
- { type: call, id: a, handler: h, outputSchema: { type: string } }
- type: map
  id: m
  mappings:
    x: { from: step, stepId: a }
- { type: call, id: b, handler: h, inputSchema: { type: number } }
"#,
    );
    let report = Validator::new(CompatibilityMode::Strict).validate_steps(&steps, None);
    assert!(report.issues.is_empty(), "{:?}", report.issues);
  }

  #[test]
  fn test_foreach_output_is_array_of_body_output() {
    let steps = steps(
      r#"
- { type: call, id: list, handler: h, outputSchema: { type: array, items: { type: string } } }
- type: foreach
  id: each
  step: { type: call, id: one, handler: h, inputSchema: { type: string }, outputSchema: { type: number } }
- { type: call, id: sum, handler: h, inputSchema: { type: array, items: { type: number } } }
"#,
    );
    let report = Validator::new(CompatibilityMode::Strict).validate_steps(&steps, None);
    assert!(report.issues.is_empty(), "{:?}", report.issues);
  }

  #[test]
  fn test_loop_condition_checked_against_body_output() {
    let steps = steps(
      r#"
- type: dowhile
  id: poll
  step: { type: call, id: check, handler: h, outputSchema: { type: string } }
  condition: { handler: c, inputSchema: { type: boolean } }
"#,
    );
    let report = Validator::new(CompatibilityMode::Strict).validate_steps(&steps, None);
    assert_eq!(report.errors().count(), 1);
    assert_eq!(report.issues[0].path, "steps[0].condition.inputSchema");
  }

  #[test]
  fn test_nested_ids_are_collected_with_paths() {
    let steps = steps(
      r#"
- type: parallel
  id: fan
  branches:
    - steps: [{ type: call, id: a, handler: h }]
    - steps: [{ type: call, id: a, handler: h }]
"#,
    );
    let issues = duplicate_ids(&steps);
    assert_eq!(issues.len(), 1);
    assert_eq!(issues[0].path, "steps[0].branches[1].steps[0]");
    assert!(issues[0].message.contains("steps[0].branches[0].steps[0]"));
  }

  #[test]
  fn test_mapping_step_reference_must_be_earlier() {
    let mappings: Mappings = serde_yaml::from_str(
      r#"
ok: { from: step, stepId: fetch }
later: { from: step, stepId: after }
cfg: { from: init }
bad: { from: env, path: HOME }
"#,
    )
    .unwrap();
    let issues = validate_mappings(&mappings, "steps[1].mappings", &["fetch".to_string()]);
    let errors: Vec<_> = issues.iter().filter(|i| i.is_error()).collect();
    let warnings: Vec<_> = issues.iter().filter(|i| !i.is_error()).collect();
    assert_eq!(errors.len(), 2);
    assert_eq!(warnings.len(), 1);
    assert_eq!(warnings[0].path, "steps[1].mappings.cfg");
  }
}
