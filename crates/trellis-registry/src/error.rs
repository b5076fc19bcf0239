use thiserror::Error;
use trellis_spec::HandlerIdError;

#[derive(Debug, Error)]
pub enum RegistryError {
  /// No entry under the identifier, or no bucket for its namespace.
  #[error("handler not found: {id}")]
  NotFound { id: String },

  #[error(transparent)]
  InvalidId(#[from] HandlerIdError),

  #[error("cannot register '{id}' in namespace '{namespace}': {reason}")]
  InvalidNamespace {
    id: String,
    namespace: String,
    reason: String,
  },
}

/// Failure reported by an invoked handler.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum HandlerError {
  /// The resolved parameters do not fit what the handler expects.
  #[error("invalid input: {message}")]
  InvalidInput { message: String },

  /// A shared-bucket provider does not implement the requested operation.
  #[error("operation not supported: {operation}")]
  Unsupported { operation: String },

  #[error("{message}")]
  Failed { message: String },
}

impl HandlerError {
  pub fn failed(message: impl Into<String>) -> Self {
    HandlerError::Failed {
      message: message.into(),
    }
  }

  pub fn invalid_input(message: impl Into<String>) -> Self {
    HandlerError::InvalidInput {
      message: message.into(),
    }
  }
}
