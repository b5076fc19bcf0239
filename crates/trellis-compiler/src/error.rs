use thiserror::Error;
use trellis_expr::ExpressionError;
use trellis_registry::{HandlerError, RegistryError};
use trellis_spec::{HandlerIdError, SpecError};
use trellis_validator::SchemaIssue;

#[derive(Debug, Error)]
pub enum CompileError {
  #[error(transparent)]
  Spec(#[from] SpecError),

  /// Validation reported errors; displays one `path: message` line per error.
  #[error("{message}")]
  Validation {
    message: String,
    issues: Vec<SchemaIssue>,
  },

  #[error("step '{step_id}' declares no handler target")]
  MissingHandler { step_id: String },

  #[error("step '{step_id}' has an invalid handler identifier: {source}")]
  InvalidHandler {
    step_id: String,
    source: HandlerIdError,
  },

  #[error("step '{step_id}': {source}")]
  Registry {
    step_id: String,
    source: RegistryError,
  },

  #[error("step '{step_id}' references undefined workflow '{workflow}'")]
  UndefinedWorkflow { step_id: String, workflow: String },
}

/// Failure of a compiled unit at execution time.
#[derive(Debug, Error)]
pub enum StepError {
  #[error("step '{step_id}': {source}")]
  Expression {
    step_id: String,
    source: ExpressionError,
  },

  #[error("step '{step_id}': {source}")]
  Handler {
    step_id: String,
    source: HandlerError,
  },
}

impl StepError {
  pub fn step_id(&self) -> &str {
    match self {
      StepError::Expression { step_id, .. } | StepError::Handler { step_id, .. } => step_id,
    }
  }
}
