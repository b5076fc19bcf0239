//! Handler identifiers.
//!
//! A step names its handler with a dotted identifier. The first segment picks
//! the namespace; a bare identifier belongs to the generic handler namespace.
//!
//! ```text
//! fetchUser               -> handler / fetchUser
//! agent.writer            -> agent   / writer
//! mcp.github.issues.list  -> mcp     / github.issues.list
//! billing.charge          -> custom("billing") / charge
//! ```

use std::fmt;

use crate::error::HandlerIdError;

/// Well-known handler namespaces, plus a string-keyed fallback.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Namespace {
  Handler,
  Agent,
  Tool,
  Mcp,
  Network,
  Memory,
  Vector,
  Rag,
  Tts,
  Listen,
  DocumentChunk,
  DocumentMetadata,
  DocumentTransform,
  GraphRag,
  GraphRagQuery,
  Evals,
  Log,
  RequestContext,
  Custom(String),
}

impl Namespace {
  /// Map an identifier prefix to its namespace.
  pub fn from_prefix(prefix: &str) -> Self {
    match prefix {
      "handler" => Namespace::Handler,
      "agent" => Namespace::Agent,
      "tool" => Namespace::Tool,
      "mcp" => Namespace::Mcp,
      "network" => Namespace::Network,
      "memory" => Namespace::Memory,
      "vector" => Namespace::Vector,
      "rag" => Namespace::Rag,
      "tts" => Namespace::Tts,
      "listen" => Namespace::Listen,
      "documentChunk" => Namespace::DocumentChunk,
      "documentMetadata" => Namespace::DocumentMetadata,
      "documentTransform" => Namespace::DocumentTransform,
      "graphRag" => Namespace::GraphRag,
      "graphRagQuery" => Namespace::GraphRagQuery,
      "evals" => Namespace::Evals,
      "log" => Namespace::Log,
      "requestContext" => Namespace::RequestContext,
      other => Namespace::Custom(other.to_string()),
    }
  }

  pub fn as_str(&self) -> &str {
    match self {
      Namespace::Handler => "handler",
      Namespace::Agent => "agent",
      Namespace::Tool => "tool",
      Namespace::Mcp => "mcp",
      Namespace::Network => "network",
      Namespace::Memory => "memory",
      Namespace::Vector => "vector",
      Namespace::Rag => "rag",
      Namespace::Tts => "tts",
      Namespace::Listen => "listen",
      Namespace::DocumentChunk => "documentChunk",
      Namespace::DocumentMetadata => "documentMetadata",
      Namespace::DocumentTransform => "documentTransform",
      Namespace::GraphRag => "graphRag",
      Namespace::GraphRagQuery => "graphRagQuery",
      Namespace::Evals => "evals",
      Namespace::Log => "log",
      Namespace::RequestContext => "requestContext",
      Namespace::Custom(name) => name,
    }
  }
}

impl fmt::Display for Namespace {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

/// A parsed `namespace.name` identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct HandlerId {
  pub namespace: Namespace,
  /// Name within the namespace. For `mcp` this is the `server.tool` key.
  pub name: String,
}

impl HandlerId {
  /// Parse a dotted or bare identifier.
  pub fn parse(raw: &str) -> Result<Self, HandlerIdError> {
    let raw = raw.trim();
    if raw.is_empty() {
      return Err(HandlerIdError::Empty);
    }

    match raw.split_once('.') {
      None => Self::build(Namespace::Handler, raw, raw),
      Some((prefix, rest)) => Self::build(Namespace::from_prefix(prefix), rest, raw),
    }
  }

  /// Interpret `target` as a name inside `namespace`.
  ///
  /// A target already carrying the namespace prefix is accepted unchanged,
  /// so `agent: writer` and `agent: agent.writer` name the same handler.
  pub fn within(namespace: Namespace, target: &str) -> Result<Self, HandlerIdError> {
    let target = target.trim();
    if target.is_empty() {
      return Err(HandlerIdError::Empty);
    }
    let prefix = format!("{}.", namespace.as_str());
    let name = target.strip_prefix(&prefix).unwrap_or(target);
    Self::build(namespace, name, target)
  }

  fn build(namespace: Namespace, name: &str, raw: &str) -> Result<Self, HandlerIdError> {
    if name.is_empty() || name.starts_with('.') || name.ends_with('.') {
      return Err(HandlerIdError::MissingName {
        id: raw.to_string(),
      });
    }
    if namespace == Namespace::Mcp && !name.contains('.') {
      return Err(HandlerIdError::InvalidMcp {
        id: raw.to_string(),
      });
    }
    Ok(Self {
      namespace,
      name: name.to_string(),
    })
  }
}

/// Generic handlers display bare, as they are usually written.
impl fmt::Display for HandlerId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self.namespace {
      Namespace::Handler => f.write_str(&self.name),
      _ => write!(f, "{}.{}", self.namespace, self.name),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_bare_identifier_defaults_to_handler_namespace() {
    let id = HandlerId::parse("fetchUser").unwrap();
    assert_eq!(id.namespace, Namespace::Handler);
    assert_eq!(id.name, "fetchUser");
    assert_eq!(id.to_string(), "fetchUser");
  }

  #[test]
  fn test_agent_and_tool_identifiers() {
    let agent = HandlerId::parse("agent.writer").unwrap();
    assert_eq!(agent.namespace, Namespace::Agent);
    assert_eq!(agent.name, "writer");

    let tool = HandlerId::parse("tool.search.web").unwrap();
    assert_eq!(tool.namespace, Namespace::Tool);
    assert_eq!(tool.name, "search.web");
  }

  #[test]
  fn test_mcp_keeps_dotted_tool_name() {
    let id = HandlerId::parse("mcp.github.issues.list").unwrap();
    assert_eq!(id.namespace, Namespace::Mcp);
    assert_eq!(id.name, "github.issues.list");
  }

  #[test]
  fn test_mcp_without_tool_is_rejected() {
    assert!(matches!(
      HandlerId::parse("mcp.github"),
      Err(HandlerIdError::InvalidMcp { .. })
    ));
  }

  #[test]
  fn test_unknown_prefix_is_custom_namespace() {
    let id = HandlerId::parse("billing.charge").unwrap();
    assert_eq!(id.namespace, Namespace::Custom("billing".to_string()));
    assert_eq!(id.to_string(), "billing.charge");
  }

  #[test]
  fn test_empty_and_dangling_identifiers() {
    assert!(matches!(HandlerId::parse("  "), Err(HandlerIdError::Empty)));
    assert!(matches!(
      HandlerId::parse("agent."),
      Err(HandlerIdError::MissingName { .. })
    ));
  }

  #[test]
  fn test_within_strips_matching_prefix() {
    let plain = HandlerId::within(Namespace::Agent, "writer").unwrap();
    let prefixed = HandlerId::within(Namespace::Agent, "agent.writer").unwrap();
    assert_eq!(plain, prefixed);

    let mcp = HandlerId::within(Namespace::Mcp, "github.issues").unwrap();
    assert_eq!(mcp.to_string(), "mcp.github.issues");
  }
}
