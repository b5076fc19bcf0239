//! Invocable units handed to the runtime.
//!
//! A unit is built once per step at compile time and invoked by the runtime
//! any number of times. Units resolve their parameters against the context
//! they are given on each call and hold no per-run state.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Value, json};
use tracing::{error, info};
use trellis_expr::{Scope, is_truthy, resolve_params, resolve_value};
use trellis_registry::{Handler, InvocationContext};
use trellis_spec::{Params, PauseKind, Schema};
use uuid::Uuid;

use crate::error::StepError;

/// What the runtime exposes to a unit while it runs.
pub trait ExecutionContext: Scope + Send + Sync {
  /// Data supplied when resuming a suspended step.
  fn resume_data(&self) -> Option<&Value>;
}

/// A pause request returned by `suspend`, `resume` and `humanInput` units.
#[derive(Debug, Clone, PartialEq)]
pub struct SuspendRequest {
  /// Unique per pause; the runtime matches the resume call with it.
  pub correlation_id: String,
  pub step_id: String,
  pub kind: PauseKind,
  pub prompt: Option<Value>,
  pub reason: Option<String>,
  pub timeout_ms: Option<u64>,
  pub resume_schema: Option<Schema>,
  pub payload: Option<Value>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum StepOutcome {
  Complete(Value),
  /// Pause the run until resumed.
  Suspend(SuspendRequest),
  /// Terminate the run early with this payload.
  Bail(Value),
}

impl StepOutcome {
  pub fn into_value(self) -> Option<Value> {
    match self {
      StepOutcome::Complete(value) => Some(value),
      _ => None,
    }
  }
}

#[async_trait]
pub trait Invocable: Send + Sync {
  async fn invoke(&self, ctx: &dyn ExecutionContext) -> Result<StepOutcome, StepError>;
}

/// Condition of a branch arm or loop.
#[async_trait]
pub trait Predicate: Send + Sync {
  async fn evaluate(&self, ctx: &dyn ExecutionContext) -> Result<bool, StepError>;
}

/// Resolves parameters, then calls the handler.
pub(crate) struct LeafUnit {
  pub(crate) step_id: String,
  pub(crate) handler: Arc<dyn Handler>,
  pub(crate) params: Params,
}

impl LeafUnit {
  /// Without declared params the handler receives the step input.
  async fn call(&self, ctx: &dyn ExecutionContext) -> Result<Value, StepError> {
    let params = if self.params.is_empty() {
      ctx.input().clone()
    } else {
      let resolved = resolve_params(&self.params, ctx).map_err(|source| StepError::Expression {
        step_id: self.step_id.clone(),
        source,
      })?;
      Value::Object(resolved)
    };

    let invocation = InvocationContext::new(&self.step_id, ctx.request_context());
    self
      .handler
      .invoke(params, &invocation)
      .await
      .map_err(|source| {
        error!(step_id = %self.step_id, error = %source, "handler_failed");
        StepError::Handler {
          step_id: self.step_id.clone(),
          source,
        }
      })
  }
}

#[async_trait]
impl Invocable for LeafUnit {
  async fn invoke(&self, ctx: &dyn ExecutionContext) -> Result<StepOutcome, StepError> {
    self.call(ctx).await.map(StepOutcome::Complete)
  }
}

/// A handler call judged by truthiness.
pub(crate) struct ConditionUnit {
  pub(crate) leaf: LeafUnit,
}

#[async_trait]
impl Predicate for ConditionUnit {
  async fn evaluate(&self, ctx: &dyn ExecutionContext) -> Result<bool, StepError> {
    let result = self.leaf.call(ctx).await?;
    Ok(is_truthy(&result))
  }
}

pub(crate) struct PauseUnit {
  pub(crate) step_id: String,
  pub(crate) kind: PauseKind,
  pub(crate) prompt: Option<Value>,
  pub(crate) reason: Option<String>,
  pub(crate) timeout_ms: Option<u64>,
  pub(crate) resume_schema: Option<Schema>,
  pub(crate) payload: Option<Value>,
}

impl PauseUnit {
  fn resolve(&self, value: &Option<Value>, ctx: &dyn ExecutionContext) -> Result<Option<Value>, StepError> {
    value
      .as_ref()
      .map(|v| resolve_value(v, ctx))
      .transpose()
      .map_err(|source| StepError::Expression {
        step_id: self.step_id.clone(),
        source,
      })
  }
}

#[async_trait]
impl Invocable for PauseUnit {
  async fn invoke(&self, ctx: &dyn ExecutionContext) -> Result<StepOutcome, StepError> {
    if let Some(data) = ctx.resume_data() {
      info!(step_id = %self.step_id, kind = self.kind.as_str(), "step_resumed");
      return Ok(StepOutcome::Complete(data.clone()));
    }

    let request = SuspendRequest {
      correlation_id: Uuid::new_v4().to_string(),
      step_id: self.step_id.clone(),
      kind: self.kind,
      prompt: self.resolve(&self.prompt, ctx)?,
      reason: self.reason.clone(),
      timeout_ms: self.timeout_ms,
      resume_schema: self.resume_schema.clone(),
      payload: self.resolve(&self.payload, ctx)?,
    };
    info!(
      step_id = %self.step_id,
      kind = self.kind.as_str(),
      correlation_id = %request.correlation_id,
      "step_suspended"
    );
    Ok(StepOutcome::Suspend(request))
  }
}

pub(crate) struct BailUnit {
  pub(crate) step_id: String,
  pub(crate) condition: Option<Value>,
  pub(crate) payload: Option<Value>,
}

#[async_trait]
impl Invocable for BailUnit {
  async fn invoke(&self, ctx: &dyn ExecutionContext) -> Result<StepOutcome, StepError> {
    let expression_error = |source| StepError::Expression {
      step_id: self.step_id.clone(),
      source,
    };

    let Some(condition) = &self.condition else {
      return Ok(StepOutcome::Complete(json!({ "bailed": false })));
    };
    if !is_truthy(&resolve_value(condition, ctx).map_err(expression_error)?) {
      return Ok(StepOutcome::Complete(json!({ "bailed": false })));
    }

    let payload = match &self.payload {
      Some(payload) => resolve_value(payload, ctx).map_err(expression_error)?,
      None => Value::Null,
    };
    info!(step_id = %self.step_id, "step_bailed");
    Ok(StepOutcome::Bail(payload))
  }
}
