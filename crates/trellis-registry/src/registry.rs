use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use tracing::debug;
use trellis_spec::{HandlerId, Namespace};

use crate::error::RegistryError;
use crate::handler::{Agent, AgentHandler, Handler, OperationHandler, Tool, ToolHandler};

type Bucket = HashMap<String, Arc<dyn Handler>>;

/// Namespaced lookup table from handler identifiers to invocable handlers.
///
/// Well-known namespaces have their own buckets; any other namespace lands in
/// a string-keyed custom bucket. Voice (`tts`/`listen`), document
/// (`documentChunk`/`documentMetadata`/`documentTransform`) and graph
/// (`graphRag`/`graphRagQuery`) capabilities share a provider per name, and
/// the resolved handler is told which operation was requested.
#[derive(Clone, Default)]
pub struct HandlerRegistry {
  handlers: Bucket,
  agents: HashMap<String, Arc<dyn Agent>>,
  tools: HashMap<String, Arc<dyn Tool>>,
  /// Keyed by `server.tool`.
  mcp: Bucket,
  networks: Bucket,
  memory: Bucket,
  vectors: Bucket,
  rag: Bucket,
  voice: Bucket,
  documents: Bucket,
  graph_rag: Bucket,
  evals: Bucket,
  loggers: Bucket,
  request_context: Bucket,
  custom: HashMap<String, Bucket>,
  workflows: BTreeSet<String>,
}

impl HandlerRegistry {
  pub fn new() -> Self {
    Self::default()
  }

  /// Register a generic handler under a bare name.
  pub fn register_handler(&mut self, name: impl Into<String>, handler: Arc<dyn Handler>) -> &mut Self {
    self.handlers.insert(name.into(), handler);
    self
  }

  pub fn register_agent(&mut self, name: impl Into<String>, agent: Arc<dyn Agent>) -> &mut Self {
    self.agents.insert(name.into(), agent);
    self
  }

  pub fn register_tool(&mut self, name: impl Into<String>, tool: Arc<dyn Tool>) -> &mut Self {
    self.tools.insert(name.into(), tool);
    self
  }

  pub fn register_mcp(
    &mut self,
    server: &str,
    tool: &str,
    handler: Arc<dyn Handler>,
  ) -> &mut Self {
    self.mcp.insert(format!("{}.{}", server, tool), handler);
    self
  }

  /// Register a handler under a full identifier such as `memory.recall` or
  /// `billing.charge`.
  ///
  /// Agents and tools have typed entry points and are rejected here.
  pub fn register(&mut self, id: &str, handler: Arc<dyn Handler>) -> Result<&mut Self, RegistryError> {
    let parsed = HandlerId::parse(id)?;
    let bucket = match &parsed.namespace {
      Namespace::Agent | Namespace::Tool => {
        return Err(RegistryError::InvalidNamespace {
          id: id.to_string(),
          namespace: parsed.namespace.to_string(),
          reason: "use register_agent or register_tool".to_string(),
        });
      }
      namespace => self.bucket_mut(namespace),
    };
    bucket.insert(parsed.name, handler);
    Ok(self)
  }

  /// Declare a sub-workflow id as available.
  pub fn register_workflow(&mut self, id: impl Into<String>) -> &mut Self {
    self.workflows.insert(id.into());
    self
  }

  pub fn has_workflow(&self, id: &str) -> bool {
    self.workflows.contains(id)
  }

  /// Resolve a dotted or bare identifier.
  pub fn resolve(&self, raw: &str) -> Result<Arc<dyn Handler>, RegistryError> {
    let id = HandlerId::parse(raw)?;
    self.resolve_id(&id)
  }

  /// Resolve a parsed identifier to an invocable handler.
  pub fn resolve_id(&self, id: &HandlerId) -> Result<Arc<dyn Handler>, RegistryError> {
    let not_found = || RegistryError::NotFound { id: id.to_string() };

    let handler: Arc<dyn Handler> = match &id.namespace {
      Namespace::Agent => {
        let agent = self.agents.get(&id.name).ok_or_else(not_found)?;
        Arc::new(AgentHandler::new(agent.clone()))
      }
      Namespace::Tool => {
        let tool = self.tools.get(&id.name).ok_or_else(not_found)?;
        Arc::new(ToolHandler::new(tool.clone()))
      }
      namespace => {
        let handler = self
          .bucket(namespace)
          .and_then(|bucket| bucket.get(&id.name))
          .ok_or_else(not_found)?
          .clone();
        match shared_operation(namespace) {
          Some(operation) => Arc::new(OperationHandler {
            operation,
            inner: handler,
          }),
          None => handler,
        }
      }
    };

    debug!(handler = %id, "handler_resolved");
    Ok(handler)
  }

  /// Whether `id` names a registered entry.
  pub fn contains(&self, id: &HandlerId) -> bool {
    match &id.namespace {
      Namespace::Agent => self.agents.contains_key(&id.name),
      Namespace::Tool => self.tools.contains_key(&id.name),
      namespace => self
        .bucket(namespace)
        .is_some_and(|bucket| bucket.contains_key(&id.name)),
    }
  }

  fn bucket(&self, namespace: &Namespace) -> Option<&Bucket> {
    match namespace {
      Namespace::Handler => Some(&self.handlers),
      Namespace::Mcp => Some(&self.mcp),
      Namespace::Network => Some(&self.networks),
      Namespace::Memory => Some(&self.memory),
      Namespace::Vector => Some(&self.vectors),
      Namespace::Rag => Some(&self.rag),
      Namespace::Tts | Namespace::Listen => Some(&self.voice),
      Namespace::DocumentChunk | Namespace::DocumentMetadata | Namespace::DocumentTransform => {
        Some(&self.documents)
      }
      Namespace::GraphRag | Namespace::GraphRagQuery => Some(&self.graph_rag),
      Namespace::Evals => Some(&self.evals),
      Namespace::Log => Some(&self.loggers),
      Namespace::RequestContext => Some(&self.request_context),
      Namespace::Custom(name) => self.custom.get(name),
      Namespace::Agent | Namespace::Tool => None,
    }
  }

  fn bucket_mut(&mut self, namespace: &Namespace) -> &mut Bucket {
    match namespace {
      Namespace::Handler | Namespace::Agent | Namespace::Tool => &mut self.handlers,
      Namespace::Mcp => &mut self.mcp,
      Namespace::Network => &mut self.networks,
      Namespace::Memory => &mut self.memory,
      Namespace::Vector => &mut self.vectors,
      Namespace::Rag => &mut self.rag,
      Namespace::Tts | Namespace::Listen => &mut self.voice,
      Namespace::DocumentChunk | Namespace::DocumentMetadata | Namespace::DocumentTransform => {
        &mut self.documents
      }
      Namespace::GraphRag | Namespace::GraphRagQuery => &mut self.graph_rag,
      Namespace::Evals => &mut self.evals,
      Namespace::Log => &mut self.loggers,
      Namespace::RequestContext => &mut self.request_context,
      Namespace::Custom(name) => self.custom.entry(name.clone()).or_default(),
    }
  }
}

/// Operation name for namespaces served by a shared bucket.
fn shared_operation(namespace: &Namespace) -> Option<&'static str> {
  match namespace {
    Namespace::Tts => Some("tts"),
    Namespace::Listen => Some("listen"),
    Namespace::DocumentChunk => Some("documentChunk"),
    Namespace::DocumentMetadata => Some("documentMetadata"),
    Namespace::DocumentTransform => Some("documentTransform"),
    Namespace::GraphRag => Some("graphRag"),
    Namespace::GraphRagQuery => Some("graphRagQuery"),
    _ => None,
  }
}
