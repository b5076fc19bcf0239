//! Trellis Registry
//!
//! Maps the handler a step names (`fetchUser`, `agent.writer`,
//! `mcp.github.issues.list`, ...) to something the compiled workflow can
//! invoke. The registry only looks things up; it never constructs handlers
//! and performs no I/O.

mod error;
mod handler;
mod registry;

pub use error::{HandlerError, RegistryError};
pub use handler::{Agent, AgentHandler, Handler, InvocationContext, Tool, ToolHandler, handler_fn};
pub use registry::HandlerRegistry;
