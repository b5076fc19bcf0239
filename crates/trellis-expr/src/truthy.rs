use serde_json::Value;

/// Whether a resolved value counts as `true` for conditions.
///
/// Strings `"false"` and `"0"` are false so an interpolated boolean such as
/// `"${steps.check.done}"` behaves like the boolean itself.
pub fn is_truthy(value: &Value) -> bool {
  match value {
    Value::Null => false,
    Value::Bool(b) => *b,
    Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
    Value::String(s) => {
      let s = s.trim();
      !(s.is_empty() || s == "0" || s.eq_ignore_ascii_case("false"))
    }
    Value::Array(items) => !items.is_empty(),
    Value::Object(map) => !map.is_empty(),
  }
}

#[cfg(test)]
mod tests {
  use serde_json::json;

  use super::*;

  #[test]
  fn test_truthiness() {
    assert!(is_truthy(&json!(true)));
    assert!(!is_truthy(&json!(false)));
    assert!(!is_truthy(&json!(null)));
    assert!(is_truthy(&json!(2)));
    assert!(!is_truthy(&json!(0)));
    assert!(!is_truthy(&json!(0.0)));
    assert!(is_truthy(&json!("yes")));
    assert!(!is_truthy(&json!("")));
    assert!(!is_truthy(&json!("FALSE")));
    assert!(!is_truthy(&json!("0")));
    assert!(!is_truthy(&json!([])));
    assert!(is_truthy(&json!([0])));
    assert!(!is_truthy(&json!({})));
  }
}
