//! Chunk assembly
//!
//! A library build produces a single chunk: every module reachable from the
//! entry, plus the externals those modules import.

use super::graph::{ModuleGraph, ModuleId};

/// A chunk is a group of modules that will be bundled together
#[derive(Debug, Clone)]
pub struct Chunk {
    /// Chunk name, substituted for `[name]`
    pub name: String,

    /// Module IDs included in this chunk, entry first
    pub module_ids: Vec<ModuleId>,

    /// External dependencies, in order of first use
    pub externals: Vec<String>,
}

impl Chunk {
    /// Create the entry chunk from the module graph
    pub fn entry(name: String, graph: &ModuleGraph, entry: ModuleId) -> Self {
        let mut module_ids = graph.get_reachable_modules(entry);
        module_ids.sort_unstable();

        Self {
            name,
            module_ids,
            externals: graph.externals().to_vec(),
        }
    }

    /// Check if chunk is empty
    pub fn is_empty(&self) -> bool {
        self.module_ids.is_empty()
    }

    /// Number of modules in chunk
    pub fn len(&self) -> usize {
        self.module_ids.len()
    }

    /// Parameter name bound to the external at `index` inside the bundle
    pub fn external_binding(index: usize) -> String {
        format!("__ext_{}", index)
    }
}
