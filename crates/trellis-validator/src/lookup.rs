use trellis_registry::HandlerRegistry;
use trellis_spec::HandlerId;

/// Existence checks the validator runs when handlers are known up front.
pub trait HandlerLookup {
  fn has_handler(&self, id: &HandlerId) -> bool;

  fn has_workflow(&self, id: &str) -> bool;
}

impl HandlerLookup for HandlerRegistry {
  fn has_handler(&self, id: &HandlerId) -> bool {
    self.contains(id)
  }

  fn has_workflow(&self, id: &str) -> bool {
    HandlerRegistry::has_workflow(self, id)
  }
}
