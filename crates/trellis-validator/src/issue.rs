use std::fmt;

use serde::Serialize;
use trellis_spec::CompatibilityMode;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
  /// Surfaced to the caller; compilation continues.
  Warning,
  /// Aborts compilation.
  Error,
}

impl Severity {
  /// Severity of a mode-sensitive mismatch.
  pub fn for_mode(mode: CompatibilityMode) -> Self {
    match mode {
      CompatibilityMode::Strict => Severity::Error,
      CompatibilityMode::Warn => Severity::Warning,
    }
  }

  pub fn as_str(&self) -> &'static str {
    match self {
      Severity::Warning => "warning",
      Severity::Error => "error",
    }
  }
}

impl fmt::Display for Severity {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

/// A problem found in the step tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SchemaIssue {
  /// Location in the step tree, e.g. `steps[2].branches[0].steps[1]`.
  pub path: String,
  pub message: String,
  pub severity: Severity,
}

impl SchemaIssue {
  pub fn new(severity: Severity, path: impl Into<String>, message: impl Into<String>) -> Self {
    Self {
      path: path.into(),
      message: message.into(),
      severity,
    }
  }

  pub fn error(path: impl Into<String>, message: impl Into<String>) -> Self {
    Self::new(Severity::Error, path, message)
  }

  pub fn warning(path: impl Into<String>, message: impl Into<String>) -> Self {
    Self::new(Severity::Warning, path, message)
  }

  pub fn is_error(&self) -> bool {
    self.severity == Severity::Error
  }
}

impl fmt::Display for SchemaIssue {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}: {}", self.path, self.message)
  }
}
