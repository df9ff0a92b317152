//! Output format rendering
//!
//! Every format shares the same module registry and runtime; only the
//! wrapper that binds externals and publishes the entry's exports differs.

use std::collections::HashMap;

use anyhow::{anyhow, Result};
use base64::Engine;

use super::chunk::Chunk;
use super::graph::{ModuleGraph, ModuleId, ModuleRef};
use super::link::LinkedModule;
use crate::config::{Config, Format, SourceMapMode};
use crate::error::BuildError;
use crate::sourcemap::{LineMap, SourceMapBuilder};
use crate::utils::{is_js_identifier, js_string, path_to_module_id, property_access, relative_path};

/// A rendered bundle, before any file is written
#[derive(Debug, Clone)]
pub struct RenderedChunk {
    pub code: String,

    /// Source map JSON, when it is written next to the bundle
    pub map: Option<String>,
}

/// Names the entry module exposes, including those pulled in through
/// internal `export *`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntryExports {
    pub names: Vec<String>,

    /// Externals re-exported with `export *`
    pub external_stars: Vec<String>,
}

impl EntryExports {
    /// Collect the export names of `entry`
    pub fn collect(
        graph: &ModuleGraph,
        linked: &HashMap<ModuleId, LinkedModule>,
        entry: ModuleId,
    ) -> Self {
        let mut exports = EntryExports::default();
        let mut visited = Vec::new();
        exports.visit(graph, linked, entry, true, &mut visited);
        exports
    }

    fn visit(
        &mut self,
        graph: &ModuleGraph,
        linked: &HashMap<ModuleId, LinkedModule>,
        id: ModuleId,
        is_entry: bool,
        visited: &mut Vec<ModuleId>,
    ) {
        if visited.contains(&id) {
            return;
        }
        visited.push(id);

        let (module, linked_module) = match (graph.get_module(id), linked.get(&id)) {
            (Some(m), Some(l)) => (m, l),
            _ => return,
        };

        for name in &linked_module.exports {
            // `export *` never forwards a default export
            if (is_entry || name != "default") && !self.names.contains(name) {
                self.names.push(name.clone());
            }
        }

        for specifier in &linked_module.star_exports {
            match module.import_target(specifier) {
                Some(ModuleRef::Internal(dep)) => self.visit(graph, linked, *dep, false, visited),
                Some(ModuleRef::External(name)) => {
                    if !self.external_stars.contains(name) {
                        self.external_stars.push(name.clone());
                    }
                }
                None => {}
            }
        }
    }

    /// The entry only has a default export, which becomes the library value
    pub fn is_default_only(&self) -> bool {
        self.names.len() == 1 && self.names[0] == "default" && self.external_stars.is_empty()
    }
}

/// Renders one chunk in each requested format
pub struct ChunkRenderer<'a> {
    pub config: &'a Config,
    pub graph: &'a ModuleGraph,
    pub chunk: &'a Chunk,
    pub linked: &'a HashMap<ModuleId, LinkedModule>,
    pub exports: &'a EntryExports,
}

/// Lines of generated code with their mappings
struct Output {
    code: String,
    map: SourceMapBuilder,
    sources: HashMap<String, u32>,
}

impl Output {
    fn new(file_name: &str) -> Self {
        Self {
            code: String::new(),
            map: SourceMapBuilder::new(file_name),
            sources: HashMap::new(),
        }
    }

    /// Append unmapped lines
    fn lines(&mut self, text: &str) {
        for line in text.split('\n') {
            self.code.push_str(line);
            self.code.push('\n');
            self.map.push_unmapped(1);
        }
    }

    /// Append a module body, mapping each line through `map`
    fn body(&mut self, code: &str, map: Option<&LineMap>, source: Option<u32>) {
        let code = code.strip_suffix('\n').unwrap_or(code);
        for (index, line) in code.split('\n').enumerate() {
            self.code.push_str(line);
            self.code.push('\n');
            let mapping = match (map, source) {
                (Some(map), Some(source)) => map.lookup(index).map(|l| (source, l)),
                _ => None,
            };
            self.map.push_line(mapping);
        }
    }

    fn source_index(&mut self, name: String, content: &str) -> u32 {
        if let Some(&index) = self.sources.get(&name) {
            return index;
        }
        let index = self.map.add_source(name.clone(), Some(content.to_string()));
        self.sources.insert(name, index);
        index
    }
}

const RUNTIME: &str = r#"var __cache = {};
function __require(id) {
  if (typeof id === "string") {
    if (!(id in __externals)) throw new Error("Cannot find module '" + id + "'");
    return __externals[id];
  }
  var cached = __cache[id];
  if (cached) return cached.exports;
  var module = __cache[id] = { exports: {} };
  __modules[id].call(module.exports, module, module.exports, __require);
  return module.exports;
}
function __export(target, getters) {
  Object.defineProperty(target, "__esModule", { value: true });
  for (var name in getters) Object.defineProperty(target, name, { enumerable: true, get: getters[name] });
}
function __reExport(target, source) {
  Object.keys(source).forEach(function (key) {
    if (key !== "default" && !Object.prototype.hasOwnProperty.call(target, key)) {
      Object.defineProperty(target, key, { enumerable: true, get: function () { return source[key]; } });
    }
  });
}
function __toDefault(m) {
  return m && (m.__esModule || Object.prototype.toString.call(m) === "[object Module]") ? m["default"] : m;
}"#;

impl<'a> ChunkRenderer<'a> {
    /// Render the chunk as `format` into `file_name`
    pub fn render(&self, format: Format, file_name: &str) -> Result<RenderedChunk> {
        let mut out = Output::new(file_name);
        let bindings: Vec<String> = (0..self.chunk.externals.len())
            .map(Chunk::external_binding)
            .collect();

        match format {
            Format::Es => {
                for (binding, dep) in bindings.iter().zip(&self.chunk.externals) {
                    out.lines(&format!("import * as {} from {};", binding, js_string(dep)));
                }
            }
            Format::Cjs => {
                out.lines("\"use strict\";");
                for (binding, dep) in bindings.iter().zip(&self.chunk.externals) {
                    out.lines(&format!("var {} = require({});", binding, js_string(dep)));
                }
            }
            Format::Umd => {
                let globals = self.external_globals(format)?;
                let name = self.library_name()?;
                let deps: Vec<String> = self.chunk.externals.iter().map(|d| js_string(d)).collect();
                let requires: Vec<String> = deps.iter().map(|d| format!("require({})", d)).collect();
                let global_args: Vec<String> = globals.iter().map(|g| global_binding(g)).collect();

                out.lines("(function (global, factory) {");
                out.lines(&format!(
                    "  typeof exports === \"object\" && typeof module !== \"undefined\" ? module.exports = factory({}) :",
                    requires.join(", ")
                ));
                out.lines(&format!(
                    "  typeof define === \"function\" && define.amd ? define([{}], factory) :",
                    deps.join(", ")
                ));
                out.lines(&format!(
                    "  (global = typeof globalThis !== \"undefined\" ? globalThis : global || self, {} = factory({}));",
                    property_access("global", name),
                    global_args.join(", ")
                ));
                out.lines(&format!(
                    "}})(this, (function ({}) {{ \"use strict\";",
                    bindings.join(", ")
                ));
            }
            Format::Iife => {
                // Checked up front so a missing global fails before a name error
                self.external_globals(format)?;
                let name = self.library_name()?;
                out.lines(&format!(
                    "var {} = (function ({}) {{ \"use strict\";",
                    name,
                    bindings.join(", ")
                ));
            }
        }

        self.render_runtime(&mut out, &bindings);
        self.render_modules(&mut out, file_name)?;

        let entry = self
            .chunk
            .module_ids
            .first()
            .copied()
            .ok_or_else(|| anyhow!("chunk '{}' has no modules", self.chunk.name))?;
        out.lines(&format!("var __entry = __require({});", entry));
        let library = if self.exports.is_default_only() {
            "__entry[\"default\"]"
        } else {
            "__entry"
        };

        match format {
            Format::Es => self.render_es_exports(&mut out),
            Format::Cjs => out.lines(&format!("module.exports = {};", library)),
            Format::Umd => {
                out.lines(&format!("return {};", library));
                out.lines("}));");
            }
            Format::Iife => {
                let globals = self.external_globals(format)?;
                let args: Vec<String> = globals.iter().map(|g| g.to_string()).collect();
                out.lines(&format!("return {};", library));
                out.lines(&format!("}})({});", args.join(", ")));
            }
        }

        let map = if self.config.build.sourcemap.is_enabled() {
            Some(out.map.to_json())
        } else {
            None
        };

        Ok(attach_source_map(
            out.code,
            map,
            self.config.build.sourcemap,
            file_name,
        ))
    }

    fn library_name(&self) -> Result<&str> {
        self.config
            .library
            .name
            .as_deref()
            .ok_or_else(|| anyhow::Error::from(BuildError::invalid_config("library.name is required")))
    }

    /// Global variable for every external, in chunk order
    fn external_globals(&self, format: Format) -> Result<Vec<&str>> {
        self.chunk
            .externals
            .iter()
            .map(|dep| {
                self.config.global_for(dep).ok_or_else(|| {
                    anyhow::Error::from(BuildError::MissingGlobal {
                        dependency: dep.clone(),
                        format,
                    })
                })
            })
            .collect()
    }

    fn render_runtime(&self, out: &mut Output, bindings: &[String]) {
        let entries: Vec<String> = self
            .chunk
            .externals
            .iter()
            .zip(bindings)
            .map(|(dep, binding)| format!("{}: {}", js_string(dep), binding))
            .collect();

        if entries.is_empty() {
            out.lines("var __externals = {};");
        } else {
            out.lines(&format!("var __externals = {{ {} }};", entries.join(", ")));
        }
        out.lines(RUNTIME);
    }

    fn render_modules(&self, out: &mut Output, file_name: &str) -> Result<()> {
        let out_dir = self.config.output_dir();
        let map_dir = out_dir
            .join(file_name)
            .parent()
            .map(|p| p.to_path_buf())
            .unwrap_or(out_dir);

        out.lines("var __modules = {");
        for &id in &self.chunk.module_ids {
            let module = self
                .graph
                .get_module(id)
                .ok_or_else(|| anyhow!("module {} missing from graph", id))?;
            let linked = self
                .linked
                .get(&id)
                .ok_or_else(|| anyhow!("module {} was not linked", id))?;

            let source = match &module.map {
                Some(_) if self.config.build.sourcemap.is_enabled() => {
                    let file = module.file_path();
                    let name = relative_path(&map_dir, &file)
                        .unwrap_or_else(|| path_to_module_id(&file));
                    Some(out.source_index(name, &module.source))
                }
                _ => None,
            };

            out.lines(&format!("{}: function (module, exports, require) {{", id));
            out.lines(&format!("  {}", linked.header));
            out.body(&linked.code, module.map.as_ref(), source);
            out.lines("},");
        }
        out.lines("};");

        Ok(())
    }

    fn render_es_exports(&self, out: &mut Output) {
        let mut aliased = 0;
        for name in &self.exports.names {
            if name == "default" {
                continue;
            }
            if is_js_identifier(name) && !name.starts_with("__") {
                out.lines(&format!("export var {} = {};", name, property_access("__entry", name)));
            } else {
                let alias = format!("__export_{}", aliased);
                aliased += 1;
                out.lines(&format!("var {} = {};", alias, property_access("__entry", name)));
                out.lines(&format!("export {{ {} as {} }};", alias, js_string(name)));
            }
        }
        if self.exports.names.iter().any(|n| n == "default") {
            out.lines("export default __entry[\"default\"];");
        }
        for dep in &self.exports.external_stars {
            out.lines(&format!("export * from {};", js_string(dep)));
        }
    }
}

/// `global.Vue`, or `global["x-y"]`, following dotted paths like `a.b`
fn global_binding(global: &str) -> String {
    global
        .split('.')
        .fold("global".to_string(), |acc, part| property_access(&acc, part))
}

/// Append the source map reference the mode asks for
fn attach_source_map(
    mut code: String,
    map: Option<String>,
    mode: SourceMapMode,
    file_name: &str,
) -> RenderedChunk {
    let map = match (mode, map) {
        (SourceMapMode::External, Some(map)) => {
            code.push_str(&format!("//# sourceMappingURL={}.map\n", base_name(file_name)));
            Some(map)
        }
        (SourceMapMode::Inline, Some(map)) => {
            let encoded = base64::engine::general_purpose::STANDARD.encode(map.as_bytes());
            code.push_str(&format!(
                "//# sourceMappingURL=data:application/json;charset=utf-8;base64,{}\n",
                encoded
            ));
            None
        }
        (SourceMapMode::Hidden, Some(map)) => Some(map),
        _ => None,
    };

    RenderedChunk { code, map }
}

fn base_name(file_name: &str) -> &str {
    file_name.rsplit('/').next().unwrap_or(file_name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_global_binding() {
        assert_eq!(global_binding("Vue"), "global.Vue");
        assert_eq!(global_binding("my.lib"), "global.my.lib");
        assert_eq!(global_binding("x-y"), "global[\"x-y\"]");
    }

    #[test]
    fn test_attach_source_map_modes() {
        let map = Some("{}".to_string());

        let external = attach_source_map("a\n".into(), map.clone(), SourceMapMode::External, "lib.es.js");
        assert!(external.code.ends_with("//# sourceMappingURL=lib.es.js.map\n"));
        assert!(external.map.is_some());

        let inline = attach_source_map("a\n".into(), map.clone(), SourceMapMode::Inline, "lib.es.js");
        assert!(inline.code.contains("base64,e30="));
        assert!(inline.map.is_none());

        let hidden = attach_source_map("a\n".into(), map.clone(), SourceMapMode::Hidden, "lib.es.js");
        assert_eq!(hidden.code, "a\n");
        assert!(hidden.map.is_some());

        let disabled = attach_source_map("a\n".into(), None, SourceMapMode::Disabled, "lib.es.js");
        assert!(disabled.map.is_none());
    }

    #[test]
    fn test_default_only_exports() {
        let exports = EntryExports {
            names: vec!["default".to_string()],
            external_stars: Vec::new(),
        };
        assert!(exports.is_default_only());

        let named = EntryExports {
            names: vec!["default".to_string(), "usePages".to_string()],
            external_stars: Vec::new(),
        };
        assert!(!named.is_default_only());
    }
}
