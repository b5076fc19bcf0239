//! Trellis Expr
//!
//! Binds runtime values into step parameters. Resolution is synchronous and
//! pure: it reads from a [`Scope`] (workflow input, prior step outputs,
//! initialization data, request context) and never performs I/O.

mod context;
mod error;
mod resolver;
mod truthy;

pub use context::{ExpressionContext, RequestContext, Scope};
pub use error::ExpressionError;
pub use resolver::{interpolate, resolve_params, resolve_path, resolve_value, stringify};
pub use truthy::is_truthy;
