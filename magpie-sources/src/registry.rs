//! Registry mapping module identifiers to source adapters

use std::collections::HashMap;
use std::sync::Arc;

use crate::SourceAdapter;

/// Immutable-after-setup lookup table of available adapters.
///
/// The orchestrator consults the registry for every module a target
/// requests; modules with no registered adapter are reported as skipped
/// rather than failing the run.
#[derive(Clone, Default)]
pub struct AdapterRegistry {
    adapters: HashMap<String, Arc<dyn SourceAdapter>>,
}

impl AdapterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an adapter under its own module identifier. A later
    /// registration for the same module replaces the earlier one.
    pub fn register(&mut self, adapter: Arc<dyn SourceAdapter>) {
        self.adapters.insert(adapter.module().to_string(), adapter);
    }

    pub fn get(&self, module: &str) -> Option<Arc<dyn SourceAdapter>> {
        self.adapters.get(module).cloned()
    }

    pub fn contains(&self, module: &str) -> bool {
        self.adapters.contains_key(module)
    }

    /// Registered module identifiers, sorted for stable display
    pub fn modules(&self) -> Vec<String> {
        let mut names: Vec<String> = self.adapters.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.adapters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.adapters.is_empty()
    }
}

impl std::fmt::Debug for AdapterRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdapterRegistry")
            .field("modules", &self.modules())
            .finish()
    }
}
