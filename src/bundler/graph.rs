//! Module graph data structures

use std::collections::{HashMap, HashSet, VecDeque};
use std::path::{Path, PathBuf};

use crate::sourcemap::LineMap;

/// Unique identifier for a module
pub type ModuleId = usize;

/// Types of modules the bundler can handle
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModuleType {
    JavaScript,
    TypeScript,
    Vue,
    Css,
    Json,
    Unknown,
}

impl ModuleType {
    /// Determine module type from file extension
    pub fn from_extension(ext: &str) -> Self {
        match ext.to_lowercase().as_str() {
            "js" | "mjs" | "cjs" => ModuleType::JavaScript,
            "ts" | "mts" | "cts" => ModuleType::TypeScript,
            "vue" => ModuleType::Vue,
            "css" => ModuleType::Css,
            "json" => ModuleType::Json,
            _ => ModuleType::Unknown,
        }
    }

    /// Detect the type of a module id
    ///
    /// Virtual ids carry their type in the query: `X.vue?vue&type=style&index=0&lang.css`
    /// is a stylesheet.
    pub fn detect(id: &str) -> Self {
        let (path, query) = split_query(id);
        if let Some(query) = query {
            if let Some((_, ext)) = query.rsplit_once('.') {
                return Self::from_extension(ext);
            }
        }
        Path::new(path)
            .extension()
            .and_then(|ext| ext.to_str())
            .map(Self::from_extension)
            .unwrap_or(ModuleType::Unknown)
    }
}

/// Split a module id into its file path and query
pub fn split_query(id: &str) -> (&str, Option<&str>) {
    match id.split_once('?') {
        Some((path, query)) => (path, Some(query)),
        None => (id, None),
    }
}

/// Target of an import
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModuleRef {
    /// A module in this graph
    Internal(ModuleId),
    /// A dependency provided by the consumer
    External(String),
}

impl ModuleRef {
    /// Argument passed to the runtime `require`
    pub fn to_require_arg(&self) -> String {
        match self {
            ModuleRef::Internal(id) => id.to_string(),
            ModuleRef::External(name) => crate::utils::js_string(name),
        }
    }
}

/// An import specifier and what it resolved to
#[derive(Debug, Clone)]
pub struct ImportRecord {
    pub specifier: String,
    pub target: ModuleRef,
}

/// A module in the dependency graph
#[derive(Debug, Clone)]
pub struct Module {
    /// Module id: an absolute path, possibly followed by a `?query`
    pub path: PathBuf,

    /// Original source code
    pub source: String,

    /// Module type after the plugin chain
    pub module_type: ModuleType,

    /// Whether this is the entry point
    pub is_entry: bool,

    /// Transformed JavaScript code
    pub code: String,

    /// Generated line -> original line of `source`, if still tracked
    pub map: Option<LineMap>,

    /// Stylesheet contributed by this module
    pub css: Option<String>,

    /// Resolved imports, in source order
    pub imports: Vec<ImportRecord>,
}

impl Module {
    /// Detect module type from path
    pub fn detect_type(path: &Path) -> ModuleType {
        ModuleType::detect(&path.to_string_lossy())
    }

    /// File path without any query
    pub fn file_path(&self) -> PathBuf {
        let id = self.path.to_string_lossy();
        PathBuf::from(split_query(&id).0)
    }

    /// Look up what `specifier` resolved to
    pub fn import_target(&self, specifier: &str) -> Option<&ModuleRef> {
        self.imports
            .iter()
            .find(|record| record.specifier == specifier)
            .map(|record| &record.target)
    }
}

/// The module dependency graph
#[derive(Debug, Default)]
pub struct ModuleGraph {
    /// All modules indexed by their ID
    modules: HashMap<ModuleId, Module>,

    /// Map from path to module ID
    path_to_id: HashMap<PathBuf, ModuleId>,

    /// Dependency edges in import order
    edges: HashMap<ModuleId, Vec<ModuleId>>,

    /// External dependencies in order of first use
    externals: Vec<String>,

    /// Next available module ID
    next_id: ModuleId,
}

impl ModuleGraph {
    /// Create a new empty module graph
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a module to the graph
    pub fn add_module(&mut self, module: Module) -> ModuleId {
        let path = module.path.clone();

        // Check if already exists
        if let Some(&id) = self.path_to_id.get(&path) {
            return id;
        }

        let id = self.next_id;
        self.next_id += 1;

        self.path_to_id.insert(path, id);
        self.modules.insert(id, module);
        self.edges.insert(id, Vec::new());

        id
    }

    /// Add a dependency edge between modules
    pub fn add_dependency(&mut self, from: ModuleId, to: ModuleId) {
        if let Some(deps) = self.edges.get_mut(&from) {
            if !deps.contains(&to) {
                deps.push(to);
            }
        }
    }

    /// Record an external dependency
    pub fn add_external(&mut self, name: &str) {
        if !self.externals.iter().any(|e| e == name) {
            self.externals.push(name.to_string());
        }
    }

    /// External dependencies in order of first use
    pub fn externals(&self) -> &[String] {
        &self.externals
    }

    /// Get module ID from path
    pub fn get_module_id(&self, path: &Path) -> Option<ModuleId> {
        self.path_to_id.get(path).copied()
    }

    /// Get a module by ID
    pub fn get_module(&self, id: ModuleId) -> Option<&Module> {
        self.modules.get(&id)
    }

    /// Get a mutable reference to a module
    pub fn get_module_mut(&mut self, id: ModuleId) -> Option<&mut Module> {
        self.modules.get_mut(&id)
    }

    /// Get all module IDs in discovery order
    pub fn all_module_ids(&self) -> Vec<ModuleId> {
        let mut ids: Vec<ModuleId> = self.modules.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// Get all modules reachable from a given module (BFS)
    pub fn get_reachable_modules(&self, start: ModuleId) -> Vec<ModuleId> {
        let mut visited = HashSet::new();
        let mut result = Vec::new();
        let mut queue = VecDeque::new();

        queue.push_back(start);
        visited.insert(start);

        while let Some(id) = queue.pop_front() {
            result.push(id);

            if let Some(deps) = self.edges.get(&id) {
                for &dep_id in deps {
                    if visited.insert(dep_id) {
                        queue.push_back(dep_id);
                    }
                }
            }
        }

        result
    }

    /// Total number of modules
    pub fn len(&self) -> usize {
        self.modules.len()
    }

    /// Check if graph is empty
    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn module(path: &str, is_entry: bool) -> Module {
        Module {
            path: PathBuf::from(path),
            source: String::new(),
            module_type: Module::detect_type(Path::new(path)),
            is_entry,
            code: String::new(),
            map: None,
            css: None,
            imports: Vec::new(),
        }
    }

    #[test]
    fn test_module_type_detection() {
        assert_eq!(ModuleType::from_extension("js"), ModuleType::JavaScript);
        assert_eq!(ModuleType::from_extension("ts"), ModuleType::TypeScript);
        assert_eq!(ModuleType::from_extension("vue"), ModuleType::Vue);
        assert_eq!(ModuleType::from_extension("css"), ModuleType::Css);
        assert_eq!(ModuleType::from_extension("json"), ModuleType::Json);
        assert_eq!(ModuleType::from_extension("png"), ModuleType::Unknown);
    }

    #[test]
    fn test_virtual_id_type_comes_from_query() {
        assert_eq!(
            ModuleType::detect("/p/src/Paginate.vue?vue&type=style&index=0&lang.css"),
            ModuleType::Css
        );
        assert_eq!(ModuleType::detect("/p/src/Paginate.vue"), ModuleType::Vue);

        let m = module("/p/src/Paginate.vue?vue&type=style&index=0&lang.css", false);
        assert_eq!(m.file_path(), PathBuf::from("/p/src/Paginate.vue"));
    }

    #[test]
    fn test_module_graph_order() {
        let mut graph = ModuleGraph::new();

        let entry = graph.add_module(module("/p/src/index.ts", true));
        let b = graph.add_module(module("/p/src/b.ts", false));
        let a = graph.add_module(module("/p/src/a.ts", false));
        graph.add_dependency(entry, b);
        graph.add_dependency(entry, a);
        graph.add_dependency(entry, b);
        graph.add_external("vue");
        graph.add_external("vue");

        assert_eq!(entry, 0);
        assert_eq!(graph.get_reachable_modules(entry), vec![0, 1, 2]);
        assert_eq!(graph.externals(), ["vue".to_string()]);
        assert_eq!(graph.add_module(module("/p/src/a.ts", false)), a);
        assert_eq!(graph.get_module_id(Path::new("/p/src/b.ts")), Some(b));
    }
}
