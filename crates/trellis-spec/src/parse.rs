//! Document parsing.
//!
//! Parsing happens in two passes so the two failure classes stay distinct:
//! the text is first read as an untyped YAML value (syntax errors, reported
//! with line and column), then read again into [`WorkflowSpec`] (shape
//! errors, reported with the field path).

use tracing::debug;

use crate::error::SpecError;
use crate::workflow::WorkflowSpec;

/// Parse a YAML (or JSON) workflow document.
pub fn parse_workflow(text: &str) -> Result<WorkflowSpec, SpecError> {
  serde_yaml::from_str::<serde_yaml::Value>(text).map_err(|e| {
    let (line, column) = e
      .location()
      .map(|loc| (loc.line(), loc.column()))
      .unwrap_or((0, 0));
    SpecError::Parse {
      line,
      column,
      message: strip_location(&e.to_string()),
    }
  })?;

  let spec: WorkflowSpec = serde_yaml::from_str(text).map_err(shape_error)?;

  if spec.id.trim().is_empty() {
    return Err(SpecError::Shape {
      path: "id".to_string(),
      message: "workflow id must not be empty".to_string(),
      line: None,
      column: None,
    });
  }

  debug!(
    workflow_id = %spec.id,
    steps = spec.steps.len(),
    "workflow_parsed"
  );
  Ok(spec)
}

fn shape_error(e: serde_yaml::Error) -> SpecError {
  let location = e.location();
  let full = strip_location(&e.to_string());
  let (path, message) = split_path(&full);
  SpecError::Shape {
    path,
    message,
    line: location.as_ref().map(|l| l.line()),
    column: location.as_ref().map(|l| l.column()),
  }
}

/// serde_yaml appends ` at line L column C`; the location is kept separately.
fn strip_location(message: &str) -> String {
  match message.rfind(" at line ") {
    Some(idx) => message[..idx].to_string(),
    None => message.to_string(),
  }
}

/// serde_yaml prefixes nested failures with `path: `.
fn split_path(message: &str) -> (String, String) {
  if let Some((prefix, rest)) = message.split_once(": ") {
    let looks_like_path = !prefix.is_empty()
      && prefix
        .chars()
        .all(|c| c.is_alphanumeric() || matches!(c, '.' | '[' | ']' | '_' | '$' | '-'));
    if looks_like_path {
      return (prefix.to_string(), rest.to_string());
    }
  }
  (".".to_string(), message.to_string())
}
