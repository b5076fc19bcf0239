//! Producer/consumer shape compatibility.
//!
//! Rules run in order for one producer output / consumer input pair:
//!
//! 1. consumer types must all be offered by the producer (`integer` satisfies
//!    `number`); a mismatch stops the remaining rules
//! 2. consumer accepts null but producer never declares it: warning
//! 3. consumer enum values must appear in the producer enum, if it has one
//! 4. consumer scalar constraints the producer does not declare: warning
//! 5. object pairs: each consumer-required key missing from producer
//!    properties is a warning
//! 6. array pairs: item shapes are checked with the same rules

use trellis_spec::{CompatibilityMode, Schema, SchemaType};

use crate::issue::{SchemaIssue, Severity};

/// Compare a producer's output shape against a consumer's input shape.
pub fn check_compatibility(
  producer: &Schema,
  consumer: &Schema,
  path: &str,
  mode: CompatibilityMode,
) -> Vec<SchemaIssue> {
  let mut issues = Vec::new();
  let severity = Severity::for_mode(mode);

  // A producer that declares only `null` still offers a type.
  let offered = match producer.non_null_types() {
    types if types.is_empty() => producer.types(),
    types => types,
  };
  let expected = consumer.non_null_types();
  if producer.declares_type() && !expected.is_empty() {
    let missing: Vec<SchemaType> = expected
      .iter()
      .copied()
      .filter(|t| !satisfies(&offered, *t))
      .collect();
    if !missing.is_empty() {
      issues.push(SchemaIssue::new(
        severity,
        path,
        format!(
          "type mismatch: expected {}, previous step produces {}",
          join_types(&expected),
          join_types(&offered)
        ),
      ));
      return issues;
    }
  }

  if consumer.permits_null() && !producer.permits_null() {
    issues.push(SchemaIssue::warning(
      path,
      "input accepts null but previous step never produces it",
    ));
  }

  if let (Some(accepted), Some(produced)) = (&consumer.enum_values, &producer.enum_values) {
    let absent: Vec<String> = accepted
      .iter()
      .filter(|v| !produced.contains(v))
      .map(|v| v.to_string())
      .collect();
    if !absent.is_empty() {
      issues.push(SchemaIssue::new(
        severity,
        path,
        format!(
          "enum values [{}] are not among the values the previous step produces",
          absent.join(", ")
        ),
      ));
    }
  }

  let declared = producer.scalar_constraints();
  let unmatched: Vec<&str> = consumer
    .scalar_constraints()
    .into_iter()
    .filter(|c| !declared.contains(c))
    .collect();
  if !unmatched.is_empty() {
    issues.push(SchemaIssue::warning(
      path,
      format!(
        "input constrains {} but previous step output declares no such constraint",
        unmatched.join(", ")
      ),
    ));
  }

  if consumer.is_object() && producer.is_object() {
    for key in &consumer.required {
      if !producer.properties.contains_key(key) {
        issues.push(SchemaIssue::warning(
          path,
          format!("missing required key '{}' in previous step output", key),
        ));
      }
    }
  }

  if consumer.is_array() && producer.is_array() {
    if let (Some(produced), Some(accepted)) = (&producer.items, &consumer.items) {
      issues.extend(check_compatibility(
        produced,
        accepted,
        &format!("{}[]", path),
        mode,
      ));
    }
  }

  issues
}

fn satisfies(offered: &[SchemaType], expected: SchemaType) -> bool {
  offered.contains(&expected)
    || (expected == SchemaType::Number && offered.contains(&SchemaType::Integer))
}

fn join_types(types: &[SchemaType]) -> String {
  types
    .iter()
    .map(SchemaType::as_str)
    .collect::<Vec<_>>()
    .join(" | ")
}

#[cfg(test)]
mod tests {
  use super::*;

  fn schema(yaml: &str) -> Schema {
    serde_yaml::from_str(yaml).unwrap()
  }

  #[test]
  fn test_matching_shapes_produce_nothing() {
    let producer = schema("{ type: object, properties: { value: { type: number } } }");
    let consumer = schema("{ type: object, properties: { value: { type: number } }, required: [value] }");
    assert!(check_compatibility(&producer, &consumer, "p", CompatibilityMode::Strict).is_empty());
  }

  #[test]
  fn test_type_mismatch_follows_mode_and_short_circuits() {
    let producer = schema("{ type: string }");
    let consumer = schema("{ type: number, minimum: 0 }");

    let warn = check_compatibility(&producer, &consumer, "p", CompatibilityMode::Warn);
    assert_eq!(warn.len(), 1);
    assert_eq!(warn[0].severity, Severity::Warning);

    let strict = check_compatibility(&producer, &consumer, "p", CompatibilityMode::Strict);
    assert_eq!(strict.len(), 1);
    assert_eq!(strict[0].severity, Severity::Error);
    assert!(strict[0].message.contains("type mismatch"));
  }

  #[test]
  fn test_integer_satisfies_number() {
    let producer = schema("{ type: integer }");
    let consumer = schema("{ type: number }");
    assert!(check_compatibility(&producer, &consumer, "p", CompatibilityMode::Strict).is_empty());
  }

  #[test]
  fn test_null_only_producer_is_a_mismatch() {
    let producer = schema("{ type: 'null' }");
    let consumer = schema("{ type: string }");
    let issues = check_compatibility(&producer, &consumer, "p", CompatibilityMode::Strict);
    assert_eq!(issues.len(), 1);
    assert!(issues[0].is_error());
    assert_eq!(
      issues[0].message,
      "type mismatch: expected string, previous step produces null"
    );
  }

  #[test]
  fn test_untyped_producer_skips_type_check() {
    let producer = schema("{ properties: { value: { type: number } } }");
    let consumer = schema("{ type: string }");
    assert!(check_compatibility(&producer, &consumer, "p", CompatibilityMode::Strict).is_empty());
  }

  #[test]
  fn test_nullable_consumer_warns() {
    let producer = schema("{ type: string }");
    let consumer = schema("{ type: [string, 'null'] }");
    let issues = check_compatibility(&producer, &consumer, "p", CompatibilityMode::Strict);
    assert_eq!(issues.len(), 1);
    assert_eq!(issues[0].severity, Severity::Warning);
  }

  #[test]
  fn test_enum_subset() {
    let producer = schema("{ type: string, enum: [a, b] }");
    let consumer = schema("{ type: string, enum: [a, c] }");
    let issues = check_compatibility(&producer, &consumer, "p", CompatibilityMode::Strict);
    assert_eq!(issues.len(), 1);
    assert!(issues[0].is_error());
    assert!(issues[0].message.contains("\"c\""));
  }

  #[test]
  fn test_undeclared_constraints_warn_once() {
    let producer = schema("{ type: string }");
    let consumer = schema("{ type: string, minLength: 1, pattern: '^a' }");
    let issues = check_compatibility(&producer, &consumer, "p", CompatibilityMode::Strict);
    assert_eq!(issues.len(), 1);
    assert_eq!(issues[0].severity, Severity::Warning);
    assert!(issues[0].message.contains("minLength, pattern"));
  }

  #[test]
  fn test_each_missing_required_key_warns() {
    let producer = schema("{ type: object, properties: { result: { type: number } } }");
    let consumer = schema("{ type: object, required: [value, total] }");
    let issues = check_compatibility(&producer, &consumer, "p", CompatibilityMode::Strict);
    assert_eq!(issues.len(), 2);
    assert!(issues.iter().all(|i| i.severity == Severity::Warning));
  }

  #[test]
  fn test_array_items_recurse_with_suffixed_path() {
    let producer = schema("{ type: array, items: { type: string } }");
    let consumer = schema("{ type: array, items: { type: number } }");
    let issues = check_compatibility(&producer, &consumer, "steps[1].inputSchema", CompatibilityMode::Strict);
    assert_eq!(issues.len(), 1);
    assert_eq!(issues[0].path, "steps[1].inputSchema[]");
  }
}
