use serde_json::Value;
use trellis_expr::{ExpressionContext, RequestContext, Scope};

use crate::unit::ExecutionContext;

/// A snapshot of run state, used to invoke a unit outside a live runtime.
#[derive(Debug, Clone, Default)]
pub struct StaticContext {
  scope: ExpressionContext,
  resume: Option<Value>,
}

impl StaticContext {
  pub fn new(input: Value) -> Self {
    Self {
      scope: ExpressionContext::new(input),
      resume: None,
    }
  }

  pub fn with_step(mut self, step_id: impl Into<String>, output: Value) -> Self {
    self.scope = self.scope.with_step(step_id, output);
    self
  }

  pub fn with_init(mut self, init: Value) -> Self {
    self.scope = self.scope.with_init(init);
    self
  }

  pub fn with_request_context(mut self, request_context: RequestContext) -> Self {
    self.scope = self.scope.with_request_context(request_context);
    self
  }

  pub fn with_resume(mut self, data: Value) -> Self {
    self.resume = Some(data);
    self
  }
}

impl Scope for StaticContext {
  fn input(&self) -> &Value {
    self.scope.input()
  }

  fn step_output(&self, step_id: &str) -> Option<&Value> {
    self.scope.step_output(step_id)
  }

  fn init_data(&self) -> Option<&Value> {
    self.scope.init_data()
  }

  fn request_context(&self) -> &RequestContext {
    self.scope.request_context()
  }
}

impl ExecutionContext for StaticContext {
  fn resume_data(&self) -> Option<&Value> {
    self.resume.as_ref()
  }
}
