use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Request-scoped key/value context forwarded to tools and expressions.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestContext(BTreeMap<String, Value>);

impl RequestContext {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn get(&self, key: &str) -> Option<&Value> {
    self.0.get(key)
  }

  pub fn set(&mut self, key: impl Into<String>, value: Value) {
    self.0.insert(key.into(), value);
  }

  pub fn with(mut self, key: impl Into<String>, value: Value) -> Self {
    self.set(key, value);
    self
  }

  pub fn is_empty(&self) -> bool {
    self.0.is_empty()
  }

  pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
    self.0.iter()
  }

  pub fn to_value(&self) -> Value {
    Value::Object(self.0.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
  }
}

impl FromIterator<(String, Value)> for RequestContext {
  fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
    Self(iter.into_iter().collect())
  }
}

/// The four roots an expression can read from.
pub trait Scope {
  /// Current workflow (or sub-graph) input.
  fn input(&self) -> &Value;

  /// Output of a previously executed step.
  fn step_output(&self, step_id: &str) -> Option<&Value>;

  /// Workflow initialization data, when the run has any.
  fn init_data(&self) -> Option<&Value>;

  fn request_context(&self) -> &RequestContext;
}

/// Plain-data scope.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExpressionContext {
  pub input: Value,
  pub steps: BTreeMap<String, Value>,
  pub init: Option<Value>,
  pub request_context: RequestContext,
}

impl ExpressionContext {
  pub fn new(input: Value) -> Self {
    Self {
      input,
      ..Self::default()
    }
  }

  pub fn with_step(mut self, step_id: impl Into<String>, output: Value) -> Self {
    self.steps.insert(step_id.into(), output);
    self
  }

  pub fn with_init(mut self, init: Value) -> Self {
    self.init = Some(init);
    self
  }

  pub fn with_request_context(mut self, request_context: RequestContext) -> Self {
    self.request_context = request_context;
    self
  }
}

impl Scope for ExpressionContext {
  fn input(&self) -> &Value {
    &self.input
  }

  fn step_output(&self, step_id: &str) -> Option<&Value> {
    self.steps.get(step_id)
  }

  fn init_data(&self) -> Option<&Value> {
    self.init.as_ref()
  }

  fn request_context(&self) -> &RequestContext {
    &self.request_context
  }
}
