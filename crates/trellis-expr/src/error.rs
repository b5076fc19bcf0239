use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ExpressionError {
  /// The path does not exist under the root, or traversal hit a non-mapping.
  #[error("cannot resolve {root}.{path}: path not found")]
  UnresolvedPath { root: String, path: String },

  #[error("unknown expression root '{root}' in '{expression}'")]
  UnknownRoot { root: String, expression: String },

  /// A structured path expression whose value is not a string.
  #[error("path expression '{key}' must be a string, got {found}")]
  NonStringPath { key: String, found: String },

  #[error("empty expression")]
  Empty,
}
