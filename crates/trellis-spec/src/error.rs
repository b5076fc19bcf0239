use thiserror::Error;

#[derive(Debug, Error)]
pub enum SpecError {
  /// The document is not well-formed YAML/JSON.
  #[error("parse error at line {line}, column {column}: {message}")]
  Parse {
    line: usize,
    column: usize,
    message: String,
  },

  /// The document parsed but does not match the workflow model.
  #[error("invalid document at {path}: {message}")]
  Shape {
    path: String,
    message: String,
    line: Option<usize>,
    column: Option<usize>,
  },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HandlerIdError {
  #[error("handler identifier is empty")]
  Empty,

  #[error("handler identifier has no name: {id}")]
  MissingName { id: String },

  #[error("mcp identifier must be mcp.<server>.<tool>: {id}")]
  InvalidMcp { id: String },
}
