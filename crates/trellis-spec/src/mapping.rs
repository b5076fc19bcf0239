//! Mapping entries used by `map` steps and sub-workflow input remapping.
//!
//! Entries are kept as written so the validator can report unrecognized
//! sources instead of failing the parse; [`MappingEntry::source`] gives the
//! typed view.
//!
//! ```yaml
//! userId: { from: step, stepId: fetch, path: user.id }
//! settings: { from: init, path: settings }
//! tenant: { from: requestContext, path: tenantId }
//! version: { value: 3 }
//! ```

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Output key -> entry.
pub type Mappings = BTreeMap<String, MappingEntry>;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MappingEntry {
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub from: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub step_id: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub path: Option<serde_json::Value>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub value: Option<serde_json::Value>,
}

/// Where a mapped value comes from.
#[derive(Debug, Clone, PartialEq)]
pub enum MappingSource {
  Literal(serde_json::Value),
  /// `path` of `None` selects the whole step output.
  Step {
    step_id: String,
    path: Option<String>,
  },
  Init {
    path: Option<String>,
  },
  RequestContext {
    path: Option<String>,
  },
}

/// Why an entry has no usable source.
#[derive(Debug, Clone, PartialEq)]
pub enum SourceProblem {
  Unrecognized(String),
  Missing,
  MissingStepId,
}

impl MappingEntry {
  /// Typed view of the entry.
  ///
  /// A non-string `path` is treated as absent here; the validator reports it
  /// separately.
  pub fn source(&self) -> Result<MappingSource, SourceProblem> {
    let path = self.string_path();
    match self.from.as_deref() {
      Some("step") => match &self.step_id {
        Some(step_id) if !step_id.is_empty() => Ok(MappingSource::Step {
          step_id: step_id.clone(),
          path,
        }),
        _ => Err(SourceProblem::MissingStepId),
      },
      Some("init") => Ok(MappingSource::Init { path }),
      Some("requestContext") => Ok(MappingSource::RequestContext { path }),
      Some("value") | Some("literal") => Ok(MappingSource::Literal(
        self.value.clone().unwrap_or(serde_json::Value::Null),
      )),
      Some(other) => Err(SourceProblem::Unrecognized(other.to_string())),
      None => match &self.value {
        Some(value) => Ok(MappingSource::Literal(value.clone())),
        None => Err(SourceProblem::Missing),
      },
    }
  }

  /// The declared path when it is a non-empty string other than `"."`.
  pub fn string_path(&self) -> Option<String> {
    match &self.path {
      Some(serde_json::Value::String(p)) if !p.is_empty() && p != "." => Some(p.clone()),
      _ => None,
    }
  }

  /// Whether `path` was given as a string (including `"."`).
  pub fn has_string_path(&self) -> bool {
    matches!(self.path, Some(serde_json::Value::String(_)))
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn entry(yaml: &str) -> MappingEntry {
    serde_yaml::from_str(yaml).unwrap()
  }

  #[test]
  fn test_step_source() {
    let source = entry("{ from: step, stepId: fetch, path: user.id }")
      .source()
      .unwrap();
    assert_eq!(
      source,
      MappingSource::Step {
        step_id: "fetch".to_string(),
        path: Some("user.id".to_string()),
      }
    );
  }

  #[test]
  fn test_dot_path_selects_whole_output() {
    let source = entry("{ from: step, stepId: fetch, path: '.' }")
      .source()
      .unwrap();
    assert_eq!(
      source,
      MappingSource::Step {
        step_id: "fetch".to_string(),
        path: None,
      }
    );
  }

  #[test]
  fn test_literal_without_from() {
    let source = entry("{ value: 3 }").source().unwrap();
    assert_eq!(source, MappingSource::Literal(serde_json::json!(3)));
  }

  #[test]
  fn test_problems() {
    assert_eq!(
      entry("{ from: env, path: HOME }").source(),
      Err(SourceProblem::Unrecognized("env".to_string()))
    );
    assert_eq!(entry("{ path: x }").source(), Err(SourceProblem::Missing));
    assert_eq!(
      entry("{ from: step, path: x }").source(),
      Err(SourceProblem::MissingStepId)
    );
  }

  #[test]
  fn test_non_string_path_is_not_a_string_path() {
    let e = entry("{ from: init, path: 42 }");
    assert!(!e.has_string_path());
    assert_eq!(e.source(), Ok(MappingSource::Init { path: None }));
  }
}
