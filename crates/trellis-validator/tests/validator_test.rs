use serde_json::json;
use trellis_registry::{HandlerRegistry, handler_fn};
use trellis_spec::{CompatibilityMode, WorkflowSpec, parse_workflow};
use trellis_validator::{Severity, Validator};

fn workflow(yaml: &str) -> WorkflowSpec {
  parse_workflow(yaml).unwrap()
}

#[test]
fn test_missing_required_key_is_only_a_warning() {
  let spec = workflow(
    r#"
id: scenario-a
steps:
  - type: call
    id: compute
    handler: compute
    outputSchema:
      type: object
      properties: { result: { type: number } }
  - type: call
    id: consume
    handler: consume
    inputSchema:
      type: object
      properties: { value: { type: number } }
      required: [value]
"#,
  );

  for mode in [CompatibilityMode::Warn, CompatibilityMode::Strict] {
    let report = Validator::new(mode).validate(&spec);
    assert!(!report.has_errors(), "{:?}", report.issues);
    let warnings: Vec<_> = report.warnings().collect();
    assert_eq!(warnings.len(), 1);
    assert!(warnings[0].message.contains("missing required key 'value'"));
    assert_eq!(warnings[0].path, "steps[1].inputSchema");
  }
}

#[test]
fn test_foreach_after_object_in_strict_mode() {
  let spec = workflow(
    r#"
id: scenario-b
options: { schemaCompatibility: strict }
steps:
  - type: call
    id: load
    handler: load
    outputSchema: { type: object }
  - type: foreach
    id: each
    step: { type: call, id: item, handler: process }
"#,
  );

  let report = Validator::new(spec.mode()).validate(&spec);
  let errors: Vec<_> = report.errors().collect();
  assert_eq!(errors.len(), 1);
  assert_eq!(errors[0].path, "steps[1]");
  assert!(errors[0].message.contains("foreach requires an array input"));
}

#[test]
fn test_unknown_step_reference_in_map() {
  let spec = workflow(
    r#"
id: scenario-c
steps:
  - type: call
    id: fetch
    handler: fetch
  - type: map
    id: reshape
    mappings:
      user: { from: step, stepId: missing, path: user }
"#,
  );

  let report = Validator::new(CompatibilityMode::Warn).validate(&spec);
  let errors: Vec<_> = report.errors().collect();
  assert_eq!(errors.len(), 1);
  assert_eq!(errors[0].path, "steps[1].mappings.user");
  assert!(errors[0].message.contains("unknown step reference 'missing'"));
}

#[test]
fn test_duplicate_ids_across_branch_arms() {
  let spec = workflow(
    r#"
id: scenario-e
steps:
  - type: branch
    id: route
    branches:
      - condition: { handler: isVip }
        steps: [{ type: call, id: x, handler: vip }]
      - condition: { handler: isRegular }
        steps: [{ type: call, id: x, handler: regular }]
"#,
  );

  let report = Validator::new(CompatibilityMode::Warn).validate(&spec);
  let errors: Vec<_> = report.errors().collect();
  assert_eq!(errors.len(), 1);
  assert_eq!(errors[0].path, "steps[0].branches[1].steps[0]");
  assert!(errors[0].message.contains("duplicate step id 'x'"));
  assert!(errors[0].message.contains("steps[0].branches[0].steps[0]"));
}

#[test]
fn test_duplicate_inside_loop_body() {
  let spec = workflow(
    r#"
id: dup-loop
steps:
  - { type: call, id: check, handler: h }
  - type: dountil
    id: poll
    step: { type: call, id: check, handler: h }
    condition: { handler: done }
"#,
  );

  let report = Validator::new(CompatibilityMode::Warn).validate(&spec);
  assert_eq!(report.errors().count(), 1);
}

#[test]
fn test_type_mismatch_is_mode_sensitive() {
  let yaml = r#"
id: modes
steps:
  - { type: call, id: a, handler: h, outputSchema: { type: string } }
  - { type: call, id: b, handler: h, inputSchema: { type: number } }
"#;
  let spec = workflow(yaml);

  let warn = Validator::new(CompatibilityMode::Warn).validate(&spec);
  assert_eq!(warn.issues.len(), 1);
  assert_eq!(warn.issues[0].severity, Severity::Warning);

  let strict = Validator::new(CompatibilityMode::Strict).validate(&spec);
  assert_eq!(strict.issues.len(), 1);
  assert_eq!(strict.issues[0].severity, Severity::Error);
  assert_eq!(warn.issues[0].path, strict.issues[0].path);
}

#[test]
fn test_consistent_workflow_has_no_errors() {
  let spec = workflow(
    r#"
id: consistent
inputSchema: { type: object, properties: { userId: { type: string } }, required: [userId] }
steps:
  - type: call
    id: fetch
    handler: users.lookup
    params: { id: "${input.userId}" }
    inputSchema: { type: object, properties: { userId: { type: string } }, required: [userId] }
    outputSchema: { type: object, properties: { name: { type: string }, tier: { type: string } } }
  - type: agent
    id: greet
    agent: writer
    params: { prompt: "Hi ${steps.fetch.name}" }
    inputSchema: { type: object, properties: { name: { type: string } }, required: [name] }
    outputSchema: { type: string }
  - type: branch
    id: route
    branches:
      - condition: { handler: isVip, params: { tier: { $steps: fetch.tier } } }
        steps:
          - { type: call, id: vip, handler: vip, inputSchema: { type: string } }
  - type: sleep
    id: wait
    durationMs: 100
"#,
  );

  let report = Validator::new(CompatibilityMode::Strict).validate(&spec);
  assert!(!report.has_errors(), "{:?}", report.issues);
}

#[test]
fn test_empty_branch_and_parallel_sequences() {
  let spec = workflow(
    r#"
id: empty
steps:
  - type: branch
    id: route
    branches: []
  - type: parallel
    id: fan
    branches:
      - steps: []
"#,
  );

  let report = Validator::new(CompatibilityMode::Warn).validate(&spec);
  let paths: Vec<_> = report.errors().map(|e| e.path.as_str()).collect();
  assert_eq!(paths, vec!["steps[0]", "steps[1].branches[0]"]);
}

#[test]
fn test_handler_existence_requires_lookup() {
  let spec = workflow(
    r#"
id: handlers
steps:
  - { type: call, id: a, handler: known }
  - { type: tool, id: b, tool: search }
  - type: dowhile
    id: loop
    step: { type: call, id: c, handler: known }
    condition: { handler: stillRunning }
  - { type: workflow, id: child, workflow: billing }
"#,
  );

  let unchecked = Validator::new(CompatibilityMode::Warn).validate(&spec);
  assert!(!unchecked.has_errors());

  let mut registry = HandlerRegistry::new();
  registry.register_handler("known", handler_fn(|_| async { Ok(json!(null)) }));
  let checked = Validator::new(CompatibilityMode::Warn)
    .with_lookup(&registry)
    .validate(&spec);
  let paths: Vec<_> = checked.errors().map(|e| e.path.as_str()).collect();
  assert_eq!(paths, vec!["steps[1]", "steps[2].condition", "steps[3]"]);

  registry.register_handler("stillRunning", handler_fn(|_| async { Ok(json!(false)) }));
  registry.register_workflow("billing");
  let checked = Validator::new(CompatibilityMode::Warn)
    .with_lookup(&registry)
    .validate(&spec);
  assert_eq!(checked.errors().count(), 1);
}

#[test]
fn test_control_steps_check_declared_input() {
  let spec = workflow(
    r#"
id: control-inputs
options: { schemaCompatibility: strict }
steps:
  - { type: call, id: a, handler: h, outputSchema: { type: string } }
  - type: workflow
    id: child
    workflow: billing
    inputSchema: { type: number }
  - { type: call, id: b, handler: h, outputSchema: { type: string } }
  - type: dowhile
    id: poll
    inputSchema: { type: number }
    step: { type: call, id: check, handler: h }
    condition: { handler: more }
"#,
  );

  let report = Validator::new(spec.mode()).validate(&spec);
  let paths: Vec<_> = report.errors().map(|e| e.path.as_str()).collect();
  assert_eq!(paths, vec!["steps[1].inputSchema", "steps[3].inputSchema"]);
  assert!(report.issues.iter().all(|i| i.message.starts_with("type mismatch")));
}

#[test]
fn test_declared_output_replaces_opaque_shape() {
  let spec = workflow(
    r#"
id: control-outputs
steps:
  - type: map
    id: reshape
    mappings: { v: { value: 1 } }
    outputSchema: { type: string }
  - { type: call, id: use, handler: h, inputSchema: { type: number } }
  - type: sleep
    id: wait
    durationMs: 10
    inputSchema: { type: boolean }
"#,
  );

  let report = Validator::new(CompatibilityMode::Strict).validate(&spec);
  let paths: Vec<_> = report.errors().map(|e| e.path.as_str()).collect();
  assert_eq!(paths, vec!["steps[1].inputSchema"]);
}
