use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::HandlerIdError;
use crate::handler_id::{HandlerId, Namespace};
use crate::mapping::Mappings;
use crate::schema::Schema;

/// Parameter map of a leaf or condition. Values may be literals or expressions.
pub type Params = serde_json::Map<String, serde_json::Value>;

/// One node of the step tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Step {
  /// Generic handler call; `handler` may name any namespace.
  Call(LeafStep),
  Agent(LeafStep),
  Tool(LeafStep),
  Mcp(LeafStep),
  Network(LeafStep),
  Memory(LeafStep),
  Vector(LeafStep),
  Rag(LeafStep),
  Tts(LeafStep),
  Listen(LeafStep),
  DocumentChunk(LeafStep),
  DocumentMetadata(LeafStep),
  DocumentTransform(LeafStep),
  GraphRag(LeafStep),
  GraphRagQuery(LeafStep),
  Evals(LeafStep),
  Log(LeafStep),
  RequestContext(LeafStep),

  Branch(BranchStep),
  Parallel(ParallelStep),
  Foreach(ForeachStep),
  #[serde(rename = "dowhile")]
  DoWhile(LoopStep),
  #[serde(rename = "dountil")]
  DoUntil(LoopStep),
  Map(MapStep),
  Sleep(SleepStep),
  SleepUntil(SleepUntilStep),
  Workflow(WorkflowRefStep),
  Suspend(PauseStep),
  Resume(PauseStep),
  HumanInput(PauseStep),
  Bail(BailStep),
}

/// A step that invokes a handler.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct LeafStep {
  pub id: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub description: Option<String>,
  /// Handler target. Written as `handler`, `agent`, `tool` or `target`.
  #[serde(
    default,
    alias = "agent",
    alias = "tool",
    alias = "target",
    skip_serializing_if = "Option::is_none"
  )]
  pub handler: Option<String>,
  #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
  pub params: Params,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub input_schema: Option<Schema>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub output_schema: Option<Schema>,
}

/// A handler call that yields a boolean.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ConditionSpec {
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub handler: Option<String>,
  #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
  pub params: Params,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub input_schema: Option<Schema>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub output_schema: Option<Schema>,
}

impl ConditionSpec {
  /// Conditions use the same dotted identifiers as `call` steps.
  pub fn handler_id(&self) -> Option<Result<HandlerId, HandlerIdError>> {
    self.handler.as_deref().map(HandlerId::parse)
  }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BranchArm {
  pub condition: ConditionSpec,
  #[serde(default)]
  pub steps: Vec<Step>,
}

/// First arm whose condition holds runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct BranchStep {
  pub id: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub description: Option<String>,
  #[serde(default)]
  pub branches: Vec<BranchArm>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub input_schema: Option<Schema>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub output_schema: Option<Schema>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StepSequence {
  #[serde(default)]
  pub steps: Vec<Step>,
}

/// Sibling sequences run concurrently.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ParallelStep {
  pub id: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub description: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub concurrency: Option<u32>,
  #[serde(default)]
  pub branches: Vec<StepSequence>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub input_schema: Option<Schema>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub output_schema: Option<Schema>,
}

/// One step template applied to every element of an array input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ForeachStep {
  pub id: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub description: Option<String>,
  #[serde(default = "default_concurrency")]
  pub concurrency: u32,
  pub step: Box<Step>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub input_schema: Option<Schema>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub output_schema: Option<Schema>,
}

fn default_concurrency() -> u32 {
  1
}

/// Body of `dowhile` / `dountil`; the condition runs after each iteration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct LoopStep {
  pub id: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub description: Option<String>,
  pub step: Box<Step>,
  pub condition: ConditionSpec,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub input_schema: Option<Schema>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub output_schema: Option<Schema>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct MapStep {
  pub id: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub description: Option<String>,
  #[serde(default)]
  pub mappings: Mappings,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub input_schema: Option<Schema>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub output_schema: Option<Schema>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct SleepStep {
  pub id: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub description: Option<String>,
  pub duration_ms: u64,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub input_schema: Option<Schema>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub output_schema: Option<Schema>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct SleepUntilStep {
  pub id: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub description: Option<String>,
  pub date: DateTime<Utc>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub input_schema: Option<Schema>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub output_schema: Option<Schema>,
}

/// Reference to another compiled workflow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct WorkflowRefStep {
  pub id: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub description: Option<String>,
  pub workflow: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub input_mapping: Option<Mappings>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub input_schema: Option<Schema>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub output_schema: Option<Schema>,
}

/// `suspend`, `resume` and `humanInput` points.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct PauseStep {
  pub id: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub description: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub prompt: Option<serde_json::Value>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub reason: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub timeout_ms: Option<u64>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub resume_schema: Option<Schema>,
  /// Extra caller metadata, resolved and attached to the pause request.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub payload: Option<serde_json::Value>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub input_schema: Option<Schema>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct BailStep {
  pub id: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub description: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub condition: Option<serde_json::Value>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub payload: Option<serde_json::Value>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub input_schema: Option<Schema>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopKind {
  /// Repeat while the condition holds.
  DoWhile,
  /// Repeat until the condition holds.
  DoUntil,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PauseKind {
  Suspend,
  Resume,
  HumanInput,
}

impl PauseKind {
  pub fn as_str(&self) -> &'static str {
    match self {
      PauseKind::Suspend => "suspend",
      PauseKind::Resume => "resume",
      PauseKind::HumanInput => "humanInput",
    }
  }
}

/// Borrowed view of a [`Step`] with the leaf variants folded together.
///
/// Consumers match on this instead of the serde-facing enum.
#[derive(Debug, Clone)]
pub enum StepView<'a> {
  Leaf(Namespace, &'a LeafStep),
  Branch(&'a BranchStep),
  Parallel(&'a ParallelStep),
  Foreach(&'a ForeachStep),
  Loop(LoopKind, &'a LoopStep),
  Map(&'a MapStep),
  Sleep(&'a SleepStep),
  SleepUntil(&'a SleepUntilStep),
  Workflow(&'a WorkflowRefStep),
  Pause(PauseKind, &'a PauseStep),
  Bail(&'a BailStep),
}

impl Step {
  pub fn view(&self) -> StepView<'_> {
    match self {
      Step::Call(s) => StepView::Leaf(Namespace::Handler, s),
      Step::Agent(s) => StepView::Leaf(Namespace::Agent, s),
      Step::Tool(s) => StepView::Leaf(Namespace::Tool, s),
      Step::Mcp(s) => StepView::Leaf(Namespace::Mcp, s),
      Step::Network(s) => StepView::Leaf(Namespace::Network, s),
      Step::Memory(s) => StepView::Leaf(Namespace::Memory, s),
      Step::Vector(s) => StepView::Leaf(Namespace::Vector, s),
      Step::Rag(s) => StepView::Leaf(Namespace::Rag, s),
      Step::Tts(s) => StepView::Leaf(Namespace::Tts, s),
      Step::Listen(s) => StepView::Leaf(Namespace::Listen, s),
      Step::DocumentChunk(s) => StepView::Leaf(Namespace::DocumentChunk, s),
      Step::DocumentMetadata(s) => StepView::Leaf(Namespace::DocumentMetadata, s),
      Step::DocumentTransform(s) => StepView::Leaf(Namespace::DocumentTransform, s),
      Step::GraphRag(s) => StepView::Leaf(Namespace::GraphRag, s),
      Step::GraphRagQuery(s) => StepView::Leaf(Namespace::GraphRagQuery, s),
      Step::Evals(s) => StepView::Leaf(Namespace::Evals, s),
      Step::Log(s) => StepView::Leaf(Namespace::Log, s),
      Step::RequestContext(s) => StepView::Leaf(Namespace::RequestContext, s),
      Step::Branch(s) => StepView::Branch(s),
      Step::Parallel(s) => StepView::Parallel(s),
      Step::Foreach(s) => StepView::Foreach(s),
      Step::DoWhile(s) => StepView::Loop(LoopKind::DoWhile, s),
      Step::DoUntil(s) => StepView::Loop(LoopKind::DoUntil, s),
      Step::Map(s) => StepView::Map(s),
      Step::Sleep(s) => StepView::Sleep(s),
      Step::SleepUntil(s) => StepView::SleepUntil(s),
      Step::Workflow(s) => StepView::Workflow(s),
      Step::Suspend(s) => StepView::Pause(PauseKind::Suspend, s),
      Step::Resume(s) => StepView::Pause(PauseKind::Resume, s),
      Step::HumanInput(s) => StepView::Pause(PauseKind::HumanInput, s),
      Step::Bail(s) => StepView::Bail(s),
    }
  }

  pub fn id(&self) -> &str {
    match self.view() {
      StepView::Leaf(_, s) => &s.id,
      StepView::Branch(s) => &s.id,
      StepView::Parallel(s) => &s.id,
      StepView::Foreach(s) => &s.id,
      StepView::Loop(_, s) => &s.id,
      StepView::Map(s) => &s.id,
      StepView::Sleep(s) => &s.id,
      StepView::SleepUntil(s) => &s.id,
      StepView::Workflow(s) => &s.id,
      StepView::Pause(_, s) => &s.id,
      StepView::Bail(s) => &s.id,
    }
  }

  /// The `type` tag as written in documents.
  pub fn type_name(&self) -> &'static str {
    match self {
      Step::Call(_) => "call",
      Step::Agent(_) => "agent",
      Step::Tool(_) => "tool",
      Step::Mcp(_) => "mcp",
      Step::Network(_) => "network",
      Step::Memory(_) => "memory",
      Step::Vector(_) => "vector",
      Step::Rag(_) => "rag",
      Step::Tts(_) => "tts",
      Step::Listen(_) => "listen",
      Step::DocumentChunk(_) => "documentChunk",
      Step::DocumentMetadata(_) => "documentMetadata",
      Step::DocumentTransform(_) => "documentTransform",
      Step::GraphRag(_) => "graphRag",
      Step::GraphRagQuery(_) => "graphRagQuery",
      Step::Evals(_) => "evals",
      Step::Log(_) => "log",
      Step::RequestContext(_) => "requestContext",
      Step::Branch(_) => "branch",
      Step::Parallel(_) => "parallel",
      Step::Foreach(_) => "foreach",
      Step::DoWhile(_) => "dowhile",
      Step::DoUntil(_) => "dountil",
      Step::Map(_) => "map",
      Step::Sleep(_) => "sleep",
      Step::SleepUntil(_) => "sleepUntil",
      Step::Workflow(_) => "workflow",
      Step::Suspend(_) => "suspend",
      Step::Resume(_) => "resume",
      Step::HumanInput(_) => "humanInput",
      Step::Bail(_) => "bail",
    }
  }

  /// Declared input shape, if any.
  pub fn input_schema(&self) -> Option<&Schema> {
    match self.view() {
      StepView::Leaf(_, s) => s.input_schema.as_ref(),
      StepView::Branch(s) => s.input_schema.as_ref(),
      StepView::Parallel(s) => s.input_schema.as_ref(),
      StepView::Foreach(s) => s.input_schema.as_ref(),
      StepView::Loop(_, s) => s.input_schema.as_ref(),
      StepView::Map(s) => s.input_schema.as_ref(),
      StepView::Sleep(s) => s.input_schema.as_ref(),
      StepView::SleepUntil(s) => s.input_schema.as_ref(),
      StepView::Workflow(s) => s.input_schema.as_ref(),
      StepView::Pause(_, s) => s.input_schema.as_ref(),
      StepView::Bail(s) => s.input_schema.as_ref(),
    }
  }

  /// Declared output shape, if any. Pause steps declare theirs as `resumeSchema`.
  pub fn output_schema(&self) -> Option<&Schema> {
    match self.view() {
      StepView::Leaf(_, s) => s.output_schema.as_ref(),
      StepView::Branch(s) => s.output_schema.as_ref(),
      StepView::Parallel(s) => s.output_schema.as_ref(),
      StepView::Foreach(s) => s.output_schema.as_ref(),
      StepView::Loop(_, s) => s.output_schema.as_ref(),
      StepView::Map(s) => s.output_schema.as_ref(),
      StepView::Sleep(s) => s.output_schema.as_ref(),
      StepView::SleepUntil(s) => s.output_schema.as_ref(),
      StepView::Workflow(s) => s.output_schema.as_ref(),
      StepView::Pause(_, s) => s.resume_schema.as_ref(),
      StepView::Bail(_) => None,
    }
  }

  /// Resolve the handler this leaf targets.
  ///
  /// `None` when the step is not a leaf or names no target.
  pub fn handler_id(&self) -> Option<Result<HandlerId, HandlerIdError>> {
    match self.view() {
      StepView::Leaf(Namespace::Handler, leaf) => leaf.handler.as_deref().map(HandlerId::parse),
      StepView::Leaf(namespace, leaf) => leaf
        .handler
        .as_deref()
        .map(|target| HandlerId::within(namespace, target)),
      _ => None,
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_parse_leaf_with_aliases() {
    let yaml = r#"
type: agent
id: greet
agent: writer
params:
  prompt: "Hello ${input.name}"
"#;
    let step: Step = serde_yaml::from_str(yaml).unwrap();
    assert_eq!(step.type_name(), "agent");
    assert_eq!(step.id(), "greet");
    let id = step.handler_id().unwrap().unwrap();
    assert_eq!(id.to_string(), "agent.writer");
  }

  #[test]
  fn test_call_step_parses_full_identifier() {
    let yaml = "type: call\nid: a\nhandler: mcp.github.issues.list";
    let step: Step = serde_yaml::from_str(yaml).unwrap();
    let id = step.handler_id().unwrap().unwrap();
    assert_eq!(id.namespace, Namespace::Mcp);
    assert_eq!(id.name, "github.issues.list");
  }

  #[test]
  fn test_leaf_without_target() {
    let step: Step = serde_yaml::from_str("type: tool\nid: a").unwrap();
    assert!(step.handler_id().is_none());
  }

  #[test]
  fn test_loop_variants() {
    let yaml = r#"
type: dountil
id: poll
step: { type: call, id: check, handler: checkStatus }
condition: { handler: isDone }
"#;
    let step: Step = serde_yaml::from_str(yaml).unwrap();
    match step.view() {
      StepView::Loop(kind, body) => {
        assert_eq!(kind, LoopKind::DoUntil);
        assert_eq!(body.step.id(), "check");
      }
      other => panic!("expected loop, got {:?}", other),
    }
  }

  #[test]
  fn test_foreach_defaults_concurrency_to_one() {
    let yaml = "type: foreach\nid: each\nstep: { type: call, id: one, handler: h }";
    let step: Step = serde_yaml::from_str(yaml).unwrap();
    match step {
      Step::Foreach(f) => assert_eq!(f.concurrency, 1),
      other => panic!("expected foreach, got {:?}", other),
    }
  }

  #[test]
  fn test_sleep_until_parses_rfc3339() {
    let yaml = "type: sleepUntil\nid: later\ndate: '2030-01-01T00:00:00Z'";
    let step: Step = serde_yaml::from_str(yaml).unwrap();
    assert_eq!(step.type_name(), "sleepUntil");
  }

  #[test]
  fn test_control_steps_carry_declared_shapes() {
    let yaml = r#"
type: workflow
id: child
workflow: billing
inputSchema: { type: number }
outputSchema: { type: object }
"#;
    let step: Step = serde_yaml::from_str(yaml).unwrap();
    assert!(step.input_schema().unwrap().has_type(crate::SchemaType::Number));
    assert!(step.output_schema().unwrap().is_object());

    let step: Step = serde_yaml::from_str("type: sleep\nid: wait\ndurationMs: 5").unwrap();
    assert!(step.input_schema().is_none());
    assert!(step.output_schema().is_none());
  }

  #[test]
  fn test_pause_output_is_resume_schema() {
    let yaml = "type: resume\nid: r\nresumeSchema: { type: string }";
    let step: Step = serde_yaml::from_str(yaml).unwrap();
    assert!(step.output_schema().unwrap().has_type(crate::SchemaType::String));
  }

  #[test]
  fn test_pause_variants_share_payload() {
    let yaml = "type: humanInput\nid: ask\nprompt: Approve?\ntimeoutMs: 500";
    let step: Step = serde_yaml::from_str(yaml).unwrap();
    match step.view() {
      StepView::Pause(PauseKind::HumanInput, pause) => {
        assert_eq!(pause.timeout_ms, Some(500));
      }
      other => panic!("expected humanInput, got {:?}", other),
    }
  }
}
