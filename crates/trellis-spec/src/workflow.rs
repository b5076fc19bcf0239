use serde::{Deserialize, Serialize};

use crate::schema::Schema;
use crate::step::Step;

/// How compatibility mismatches are reported.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompatibilityMode {
  /// Mismatches are errors and abort compilation.
  Strict,
  /// Mismatches are surfaced as warnings.
  #[default]
  Warn,
}

impl CompatibilityMode {
  pub fn as_str(&self) -> &'static str {
    match self {
      CompatibilityMode::Strict => "strict",
      CompatibilityMode::Warn => "warn",
    }
  }
}

impl std::str::FromStr for CompatibilityMode {
  type Err = String;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s {
      "strict" => Ok(CompatibilityMode::Strict),
      "warn" => Ok(CompatibilityMode::Warn),
      other => Err(format!("unknown compatibility mode: {}", other)),
    }
  }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowOptions {
  #[serde(default)]
  pub schema_compatibility: CompatibilityMode,
}

/// A workflow document.
///
/// Immutable input to validation and compilation. Backend blocks are opaque
/// and carried through to the compile output unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowSpec {
  pub id: String,

  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub description: Option<String>,

  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub input_schema: Option<Schema>,

  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub output_schema: Option<Schema>,

  #[serde(default)]
  pub options: WorkflowOptions,

  #[serde(default)]
  pub steps: Vec<Step>,

  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub observability: Option<serde_json::Value>,

  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub memory: Option<serde_json::Value>,

  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub storage: Option<serde_json::Value>,
}

impl WorkflowSpec {
  pub fn mode(&self) -> CompatibilityMode {
    self.options.schema_compatibility
  }

  /// Visit every step in the tree, pre-order, including nested bodies.
  pub fn walk<'a>(&'a self, visit: &mut dyn FnMut(&'a Step)) {
    for step in &self.steps {
      walk_step(step, visit);
    }
  }
}

fn walk_step<'a>(step: &'a Step, visit: &mut dyn FnMut(&'a Step)) {
  use crate::step::StepView;

  visit(step);
  match step.view() {
    StepView::Branch(branch) => {
      for arm in &branch.branches {
        for nested in &arm.steps {
          walk_step(nested, visit);
        }
      }
    }
    StepView::Parallel(parallel) => {
      for member in &parallel.branches {
        for nested in &member.steps {
          walk_step(nested, visit);
        }
      }
    }
    StepView::Foreach(foreach) => walk_step(&foreach.step, visit),
    StepView::Loop(_, body) => walk_step(&body.step, visit),
    _ => {}
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_mode_defaults_to_warn() {
    let spec: WorkflowSpec = serde_yaml::from_str("id: w\nsteps: []").unwrap();
    assert_eq!(spec.mode(), CompatibilityMode::Warn);
  }

  #[test]
  fn test_strict_mode_from_options() {
    let yaml = "id: w\noptions: { schemaCompatibility: strict }\nsteps: []";
    let spec: WorkflowSpec = serde_yaml::from_str(yaml).unwrap();
    assert_eq!(spec.mode(), CompatibilityMode::Strict);
  }

  #[test]
  fn test_walk_visits_nested_steps() {
    let yaml = r#"
id: w
steps:
  - type: call
    id: a
    handler: h
  - type: branch
    id: b
    branches:
      - condition: { handler: c }
        steps:
          - { type: call, id: b1, handler: h }
  - type: foreach
    id: f
    step: { type: call, id: f1, handler: h }
"#;
    let spec: WorkflowSpec = serde_yaml::from_str(yaml).unwrap();
    let mut ids = Vec::new();
    spec.walk(&mut |step| ids.push(step.id().to_string()));
    assert_eq!(ids, vec!["a", "b", "b1", "f", "f1"]);
  }

  #[test]
  fn test_backend_blocks_pass_through() {
    let yaml = "id: w\nsteps: []\nstorage: { kind: sqlite, path: ./runs.db }";
    let spec: WorkflowSpec = serde_yaml::from_str(yaml).unwrap();
    assert_eq!(
      spec.storage,
      Some(serde_json::json!({ "kind": "sqlite", "path": "./runs.db" }))
    );
  }
}
