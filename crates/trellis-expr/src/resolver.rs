//! Expression resolution.
//!
//! Two forms are recognized:
//!
//! - inline interpolation inside strings: `"Hello ${input.name}"`, replaced by
//!   the stringified value;
//! - structured path expressions, a single-key mapping replaced by the value at
//!   the path with its original type:
//!
//! ```yaml
//! user: { $path: steps.fetch.user }
//! tier: { $steps: fetch.user.tier }
//! tenant: { $requestContext: tenantId }
//! ```
//!
//! Paths are dot-separated field accesses rooted at `input`, `steps`, `init`
//! or `requestContext`. A missing key is always a failure.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::{Map, Value};
use tracing::trace;

use crate::context::Scope;
use crate::error::ExpressionError;

static PLACEHOLDER: LazyLock<Regex> =
  LazyLock::new(|| Regex::new(r"\$\{([^}]*)\}").expect("placeholder pattern is valid"));

const PATH_KEY: &str = "$path";

/// Resolve every expression in `value`, preserving its shape.
pub fn resolve_value<S: Scope + ?Sized>(value: &Value, scope: &S) -> Result<Value, ExpressionError> {
  match value {
    Value::String(template) => Ok(Value::String(interpolate(template, scope)?)),
    Value::Array(items) => items
      .iter()
      .map(|item| resolve_value(item, scope))
      .collect::<Result<Vec<_>, _>>()
      .map(Value::Array),
    Value::Object(map) => match structured_expression(map) {
      Some((key, path)) => resolve_structured(key, path, scope),
      None => resolve_params(map, scope).map(Value::Object),
    },
    other => Ok(other.clone()),
  }
}

/// Resolve a parameter map entry by entry.
pub fn resolve_params<S: Scope + ?Sized>(
  params: &Map<String, Value>,
  scope: &S,
) -> Result<Map<String, Value>, ExpressionError> {
  let mut resolved = Map::with_capacity(params.len());
  for (key, value) in params {
    resolved.insert(key.clone(), resolve_value(value, scope)?);
  }
  Ok(resolved)
}

/// Replace each `${...}` in `template` with its stringified value.
pub fn interpolate<S: Scope + ?Sized>(template: &str, scope: &S) -> Result<String, ExpressionError> {
  if !template.contains("${") {
    return Ok(template.to_string());
  }

  let mut out = String::with_capacity(template.len());
  let mut last = 0;
  for captures in PLACEHOLDER.captures_iter(template) {
    let (Some(whole), Some(expr)) = (captures.get(0), captures.get(1)) else {
      continue;
    };
    out.push_str(&template[last..whole.start()]);
    let value = resolve_path(expr.as_str(), scope)?;
    out.push_str(&stringify(&value));
    last = whole.end();
  }
  out.push_str(&template[last..]);
  Ok(out)
}

/// Resolve a root-prefixed dotted path such as `steps.fetch.user.id`.
pub fn resolve_path<S: Scope + ?Sized>(expression: &str, scope: &S) -> Result<Value, ExpressionError> {
  let expression = expression.trim();
  if expression.is_empty() {
    return Err(ExpressionError::Empty);
  }
  let (root, path) = expression.split_once('.').unwrap_or((expression, ""));
  resolve_in_root(root, path, expression, scope)
}

/// Render a resolved value for inline interpolation.
///
/// Strings are inserted verbatim, `null` as `null`, everything else as
/// compact JSON.
pub fn stringify(value: &Value) -> String {
  match value {
    Value::String(s) => s.clone(),
    Value::Null => "null".to_string(),
    other => other.to_string(),
  }
}

fn structured_expression(map: &Map<String, Value>) -> Option<(&str, &Value)> {
  if map.len() != 1 {
    return None;
  }
  let (key, value) = map.iter().next()?;
  match key.as_str() {
    PATH_KEY | "$input" | "$steps" | "$init" | "$requestContext" => Some((key.as_str(), value)),
    _ => None,
  }
}

fn resolve_structured<S: Scope + ?Sized>(
  key: &str,
  path: &Value,
  scope: &S,
) -> Result<Value, ExpressionError> {
  let Value::String(path) = path else {
    return Err(ExpressionError::NonStringPath {
      key: key.to_string(),
      found: type_name(path).to_string(),
    });
  };

  if key == PATH_KEY {
    return resolve_path(path, scope);
  }

  let root = &key[1..];
  let path = path.trim();
  let path = if path == "." { "" } else { path };
  let expression = if path.is_empty() {
    root.to_string()
  } else {
    format!("{}.{}", root, path)
  };
  resolve_in_root(root, path, &expression, scope)
}

fn resolve_in_root<S: Scope + ?Sized>(
  root: &str,
  path: &str,
  expression: &str,
  scope: &S,
) -> Result<Value, ExpressionError> {
  let found = match root {
    "input" => walk(scope.input(), path),
    "steps" => {
      let (step_id, rest) = path.split_once('.').unwrap_or((path, ""));
      scope
        .step_output(step_id)
        .filter(|_| !step_id.is_empty())
        .and_then(|output| walk(output, rest))
    }
    "init" => scope.init_data().and_then(|init| walk(init, path)),
    "requestContext" => {
      let context = scope.request_context();
      if path.is_empty() {
        return Ok(context.to_value());
      }
      let (key, rest) = path.split_once('.').unwrap_or((path, ""));
      context.get(key).and_then(|value| walk(value, rest))
    }
    _ => {
      return Err(ExpressionError::UnknownRoot {
        root: root.to_string(),
        expression: expression.to_string(),
      });
    }
  };

  match found {
    Some(value) => Ok(value.clone()),
    None => {
      trace!(root = %root, path = %path, "expression_unresolved");
      Err(ExpressionError::UnresolvedPath {
        root: root.to_string(),
        path: path.to_string(),
      })
    }
  }
}

/// Follow dotted field accesses through nested objects.
fn walk<'a>(start: &'a Value, path: &str) -> Option<&'a Value> {
  if path.is_empty() {
    return Some(start);
  }
  path
    .split('.')
    .try_fold(start, |current, segment| current.as_object()?.get(segment))
}

fn type_name(value: &Value) -> &'static str {
  match value {
    Value::Null => "null",
    Value::Bool(_) => "boolean",
    Value::Number(_) => "number",
    Value::String(_) => "string",
    Value::Array(_) => "array",
    Value::Object(_) => "object",
  }
}

#[cfg(test)]
mod tests {
  use serde_json::json;

  use super::*;
  use crate::context::{ExpressionContext, RequestContext};

  fn context() -> ExpressionContext {
    ExpressionContext::new(json!({ "name": "Ada", "count": 3, "user": { "id": "u1" } }))
      .with_step("a", json!({ "value": "x", "items": [1, 2] }))
      .with_init(json!({ "settings": { "retries": 2 } }))
      .with_request_context(RequestContext::new().with("tenantId", json!("acme")))
  }

  #[test]
  fn test_interpolates_step_output() {
    let ctx = context();
    assert_eq!(interpolate("${steps.a.value}", &ctx).unwrap(), "x");
  }

  #[test]
  fn test_missing_step_key_names_the_path() {
    let ctx = context();
    let err = interpolate("${steps.a.missing}", &ctx).unwrap_err();
    assert_eq!(
      err,
      ExpressionError::UnresolvedPath {
        root: "steps".to_string(),
        path: "a.missing".to_string(),
      }
    );
    assert!(err.to_string().contains("a.missing"));
  }

  #[test]
  fn test_multiple_placeholders_are_resolved_independently() {
    let ctx = context();
    let out = interpolate("${input.name} has ${ input.count } items from ${requestContext.tenantId}", &ctx)
      .unwrap();
    assert_eq!(out, "Ada has 3 items from acme");
  }

  #[test]
  fn test_non_string_values_are_stringified_as_json() {
    let ctx = context();
    assert_eq!(interpolate("${input.user}", &ctx).unwrap(), r#"{"id":"u1"}"#);
    assert_eq!(interpolate("${steps.a.items}", &ctx).unwrap(), "[1,2]");
  }

  #[test]
  fn test_structured_path_keeps_type() {
    let ctx = context();
    assert_eq!(
      resolve_value(&json!({ "$path": "input.count" }), &ctx).unwrap(),
      json!(3)
    );
    assert_eq!(
      resolve_value(&json!({ "$steps": "a.items" }), &ctx).unwrap(),
      json!([1, 2])
    );
    assert_eq!(
      resolve_value(&json!({ "$init": "settings" }), &ctx).unwrap(),
      json!({ "retries": 2 })
    );
  }

  #[test]
  fn test_structured_root_with_dot_selects_whole_root() {
    let ctx = context();
    assert_eq!(
      resolve_value(&json!({ "$requestContext": "." }), &ctx).unwrap(),
      json!({ "tenantId": "acme" })
    );
  }

  #[test]
  fn test_non_string_structured_path_is_distinct_failure() {
    let ctx = context();
    let err = resolve_value(&json!({ "$path": 42 }), &ctx).unwrap_err();
    assert!(matches!(err, ExpressionError::NonStringPath { .. }));
  }

  #[test]
  fn test_unknown_root() {
    let ctx = context();
    let err = resolve_path("env.HOME", &ctx).unwrap_err();
    assert!(matches!(err, ExpressionError::UnknownRoot { ref root, .. } if root == "env"));
  }

  #[test]
  fn test_traversal_into_scalar_fails() {
    let ctx = context();
    assert!(resolve_path("input.name.first", &ctx).is_err());
  }

  #[test]
  fn test_nested_structures_are_resolved_in_place() {
    let ctx = context();
    let params = json!({
      "greeting": "Hi ${input.name}",
      "ids": [{ "$input": "user.id" }, "literal"],
      "nested": { "n": 1, "tenant": "${requestContext.tenantId}" }
    });
    let resolved = resolve_value(&params, &ctx).unwrap();
    assert_eq!(
      resolved,
      json!({
        "greeting": "Hi Ada",
        "ids": ["u1", "literal"],
        "nested": { "n": 1, "tenant": "acme" }
      })
    );
  }

  #[test]
  fn test_multi_key_mapping_is_not_a_path_expression() {
    let ctx = context();
    let value = json!({ "$path": "input.name", "other": true });
    let resolved = resolve_value(&value, &ctx).unwrap();
    assert_eq!(resolved, json!({ "$path": "input.name", "other": true }));
  }

  #[test]
  fn test_missing_init_fails() {
    let ctx = ExpressionContext::new(json!({}));
    assert!(resolve_path("init.settings", &ctx).is_err());
  }
}
