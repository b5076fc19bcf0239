//! Handler traits and the adapters that turn agents and tools into handlers.

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, Value};
use trellis_expr::RequestContext;

use crate::error::HandlerError;

/// Ambient information passed to every invocation.
#[derive(Debug, Clone, Copy)]
pub struct InvocationContext<'a> {
  pub step_id: &'a str,
  /// Capability requested from a shared bucket, e.g. `tts` or `listen`.
  pub operation: Option<&'a str>,
  pub request_context: &'a RequestContext,
}

impl<'a> InvocationContext<'a> {
  pub fn new(step_id: &'a str, request_context: &'a RequestContext) -> Self {
    Self {
      step_id,
      operation: None,
      request_context,
    }
  }
}

/// Anything a leaf step can invoke with resolved parameters.
#[async_trait]
pub trait Handler: Send + Sync {
  async fn invoke(&self, params: Value, ctx: &InvocationContext<'_>) -> Result<Value, HandlerError>;
}

/// A language-model agent.
#[async_trait]
pub trait Agent: Send + Sync {
  /// Generate a response. The raw response is returned to the workflow as is.
  async fn generate(&self, prompt: Value, options: Option<Value>) -> Result<Value, HandlerError>;
}

/// A callable tool.
#[async_trait]
pub trait Tool: Send + Sync {
  async fn execute(
    &self,
    input: Map<String, Value>,
    request_context: &RequestContext,
  ) -> Result<Value, HandlerError>;
}

/// Invokes an [`Agent`]; requires a `prompt` parameter.
pub struct AgentHandler {
  agent: Arc<dyn Agent>,
}

impl AgentHandler {
  pub fn new(agent: Arc<dyn Agent>) -> Self {
    Self { agent }
  }
}

#[async_trait]
impl Handler for AgentHandler {
  async fn invoke(&self, params: Value, ctx: &InvocationContext<'_>) -> Result<Value, HandlerError> {
    let Value::Object(mut params) = params else {
      return Err(HandlerError::invalid_input(format!(
        "agent step '{}' requires a parameter object with a prompt",
        ctx.step_id
      )));
    };
    let prompt = match params.remove("prompt") {
      Some(Value::Null) | None => {
        return Err(HandlerError::invalid_input(format!(
          "agent step '{}' requires a prompt",
          ctx.step_id
        )));
      }
      Some(prompt) => prompt,
    };
    let options = params.remove("options");
    self.agent.generate(prompt, options).await
  }
}

/// Invokes a [`Tool`]; requires an object of parameters.
pub struct ToolHandler {
  tool: Arc<dyn Tool>,
}

impl ToolHandler {
  pub fn new(tool: Arc<dyn Tool>) -> Self {
    Self { tool }
  }
}

#[async_trait]
impl Handler for ToolHandler {
  async fn invoke(&self, params: Value, ctx: &InvocationContext<'_>) -> Result<Value, HandlerError> {
    match params {
      Value::Object(input) => self.tool.execute(input, ctx.request_context).await,
      other => Err(HandlerError::invalid_input(format!(
        "tool step '{}' requires an object of parameters, got {}",
        ctx.step_id,
        if other.is_null() { "null" } else { "a non-object value" }
      ))),
    }
  }
}

/// Tags invocations with the capability they were resolved under.
pub(crate) struct OperationHandler {
  pub(crate) operation: &'static str,
  pub(crate) inner: Arc<dyn Handler>,
}

#[async_trait]
impl Handler for OperationHandler {
  async fn invoke(&self, params: Value, ctx: &InvocationContext<'_>) -> Result<Value, HandlerError> {
    let ctx = InvocationContext {
      operation: Some(self.operation),
      ..*ctx
    };
    self.inner.invoke(params, &ctx).await
  }
}

struct FnHandler<F> {
  f: F,
}

#[async_trait]
impl<F, Fut> Handler for FnHandler<F>
where
  F: Fn(Value) -> Fut + Send + Sync,
  Fut: Future<Output = Result<Value, HandlerError>> + Send,
{
  async fn invoke(&self, params: Value, _ctx: &InvocationContext<'_>) -> Result<Value, HandlerError> {
    (self.f)(params).await
  }
}

/// Adapt an async closure over the resolved parameters into a handler.
pub fn handler_fn<F, Fut>(f: F) -> Arc<dyn Handler>
where
  F: Fn(Value) -> Fut + Send + Sync + 'static,
  Fut: Future<Output = Result<Value, HandlerError>> + Send + 'static,
{
  Arc::new(FnHandler { f })
}
