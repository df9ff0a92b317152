//! Vue single-file component plugin
//!
//! Compiles `.vue` files into plain modules. The template is shipped as a
//! string for Vue's runtime compiler, scripts are rewritten in place so
//! their lines keep mapping to the component file, and every `<style>`
//! block becomes a virtual CSS module imported by the component.

mod script;
pub mod sfc;

use std::path::Path;

use anyhow::{bail, Result};
use async_trait::async_trait;
use dashmap::DashMap;
use serde::Deserialize;
use tracing::{debug, warn};

use super::{FileFilter, LoadResult, Plugin, PluginContext, ResolveResult, TransformResult};
use crate::bundler::ModuleType;
use crate::sourcemap::{LineBuilder, LineMap};
use crate::utils::{js_string, path_to_module_id};

use script::{analyze_setup, rewrite_default_export};
use sfc::Block;

/// Options accepted under `[[plugins]] name = "vue"`
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct VueOptions {
    pub include: Vec<String>,
    pub exclude: Vec<String>,
}

impl Default for VueOptions {
    fn default() -> Self {
        Self {
            include: vec!["**/*.vue".to_string()],
            exclude: Vec::new(),
        }
    }
}

/// A compiled component
#[derive(Debug)]
pub struct CompiledComponent {
    pub code: String,
    /// Generated line -> component file line
    pub map: LineMap,
    pub is_typescript: bool,
    /// Virtual style module ids and their CSS
    pub styles: Vec<(String, String)>,
}

/// Compile the component at `id` into an ES module
pub fn compile_component(source: &str, id: &Path) -> Result<CompiledComponent> {
    let descriptor = sfc::parse(source)?;
    let module_id = path_to_module_id(id);
    let file_name = id
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| module_id.clone());

    let is_typescript = match (&descriptor.script, &descriptor.script_setup) {
        (Some(a), Some(b)) if script_is_ts(a)? != script_is_ts(b)? => {
            bail!("<script> and <script setup> must use the same lang")
        }
        (Some(block), _) | (None, Some(block)) => script_is_ts(block)?,
        (None, None) => false,
    };

    let setup = match &descriptor.script_setup {
        Some(block) => Some((block, analyze_setup(block.content)?)),
        None => None,
    };

    let mut out = LineBuilder::new();

    if let Some((block, analysis)) = &setup {
        for import in &analysis.imports {
            out.push_mapped(&import.code, block.line + import.line);
        }
    }

    let binding = if setup.is_some() { "__default__" } else { "__sfc__" };
    match &descriptor.script {
        Some(block) => {
            let (code, found) = rewrite_default_export(block.content, binding)?;
            out.push_mapped(&code, block.line);
            if !found {
                out.push_unmapped(&format!("const {} = {{}};", binding));
            }
        }
        None if setup.is_none() => out.push_unmapped("const __sfc__ = {};"),
        None => {}
    }

    if let Some((block, analysis)) = &setup {
        out.push_unmapped("const __sfc__ = Object.assign({},");
        if descriptor.script.is_some() {
            out.push_unmapped("  __default__,");
        }
        if let Some(options) = &analysis.options {
            out.push_mapped(&format!("  {},", options.code), block.line + options.line);
        }
        out.push_unmapped("  {");
        if !analysis.components.is_empty() {
            out.push_unmapped(&format!("    components: {{ {} }},", analysis.components.join(", ")));
        }
        if let Some(props) = &analysis.props {
            out.push_mapped(&format!("    props: {},", props.code), block.line + props.line);
        }
        if let Some(emits) = &analysis.emits {
            out.push_mapped(&format!("    emits: {},", emits.code), block.line + emits.line);
        }
        out.push_unmapped(&format!(
            "    {}setup(__props, {{ emit: __emit, expose: __expose }}) {{",
            if analysis.is_async { "async " } else { "" }
        ));
        if !analysis.exposes {
            out.push_unmapped("    __expose();");
        }
        out.push_mapped(&analysis.body, block.line);
        out.push_unmapped(&format!("    return {{ {} }};", analysis.bindings.join(", ")));
        out.push_unmapped("    }\n  }\n);");

        let name = file_name.trim_end_matches(".vue");
        out.push_unmapped(&format!("__sfc__.__name = {};", js_string(name)));
    }

    if let Some(template) = &descriptor.template {
        match template.lang() {
            None | Some("html") => {}
            Some(other) => bail!("<template lang=\"{}\"> is not supported", other),
        }
        out.push_unmapped(&format!("__sfc__.template = {};", js_string(template.content.trim())));
    }
    out.push_unmapped(&format!("__sfc__.__file = {};", js_string(&file_name)));

    let mut styles = Vec::new();
    for (index, style) in descriptor.styles.iter().enumerate() {
        match style.lang() {
            None | Some("css") => {}
            Some(other) => bail!("<style lang=\"{}\"> is not supported, only plain CSS", other),
        }
        if style.has_attr("module") {
            bail!("<style module> is not supported");
        }
        if style.has_attr("scoped") {
            warn!("{}: scoped styles are emitted unscoped", file_name);
        }

        let style_id = format!("{}?vue&type=style&index={}&lang.css", module_id, index);
        out.push_unmapped(&format!("import {};", js_string(&style_id)));
        styles.push((style_id, style.content.to_string()));
    }

    out.push_unmapped("export default __sfc__;");

    let (code, map) = out.finish();
    Ok(CompiledComponent {
        code,
        map,
        is_typescript,
        styles,
    })
}

fn script_is_ts(block: &Block) -> Result<bool> {
    match block.lang() {
        None | Some("js") => Ok(false),
        Some("ts") => Ok(true),
        Some(other) => bail!("<script lang=\"{}\"> is not supported", other),
    }
}

/// Compiles `.vue` files and serves their style blocks
pub struct VuePlugin {
    filter: FileFilter,
    styles: DashMap<String, String>,
}

impl VuePlugin {
    pub fn new(options: VueOptions) -> Result<Self> {
        Ok(Self {
            filter: FileFilter::new(&options.include, &options.exclude)?,
            styles: DashMap::new(),
        })
    }
}

#[async_trait]
impl Plugin for VuePlugin {
    fn name(&self) -> &str {
        "vue"
    }

    fn filter(&self) -> Option<&FileFilter> {
        Some(&self.filter)
    }

    async fn build_start(&self, _ctx: &PluginContext) -> Result<()> {
        self.styles.clear();
        Ok(())
    }

    async fn resolve_id(
        &self,
        specifier: &str,
        _importer: Option<&Path>,
        _ctx: &PluginContext,
    ) -> Result<ResolveResult> {
        if self.styles.contains_key(specifier) {
            return Ok(ResolveResult::Resolved(specifier.to_string()));
        }
        Ok(ResolveResult::Skip)
    }

    async fn load(&self, id: &str, _ctx: &PluginContext) -> Result<LoadResult> {
        Ok(match self.styles.get(id) {
            Some(css) => LoadResult::Loaded {
                content: css.clone(),
                loader: Some("css".to_string()),
            },
            None => LoadResult::Skip,
        })
    }

    async fn transform(
        &self,
        code: &str,
        id: &Path,
        module_type: &ModuleType,
        ctx: &PluginContext,
    ) -> Result<TransformResult> {
        if *module_type != ModuleType::Vue {
            return Ok(TransformResult::Skip);
        }

        let compiled = compile_component(code, id)?;
        debug!(
            "compiled {} ({} style block(s))",
            ctx.relative_id(id),
            compiled.styles.len()
        );
        for (style_id, css) in compiled.styles {
            self.styles.insert(style_id, css);
        }

        Ok(TransformResult::Transformed {
            code: compiled.code,
            map: Some(compiled.map),
            module_type: Some(if compiled.is_typescript {
                ModuleType::TypeScript
            } else {
                ModuleType::JavaScript
            }),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    const PAGINATE: &str = r#"<template>
  <ul class="pagination">
    <li v-for="page in pages" :key="page" @click="go(page)">{{ page }}</li>
  </ul>
</template>

<script setup lang="ts">
import { computed } from 'vue'

const props = defineProps({
  total: { type: Number, required: true },
})
const emit = defineEmits(['update:page'])
const pages = computed(() => Array.from({ length: props.total }, (_, i) => i + 1))
function go(page: number) {
  emit('update:page', page)
}
</script>

<style>
.pagination { display: flex; }
</style>
"#;

    fn context() -> PluginContext {
        PluginContext {
            root: PathBuf::from("/project"),
            out_dir: PathBuf::from("/project/dist"),
            src_root: PathBuf::from("/project/src"),
        }
    }

    #[test]
    fn test_compile_script_setup() {
        let compiled = compile_component(PAGINATE, Path::new("/project/src/components/Paginate.vue")).unwrap();

        assert!(compiled.is_typescript);
        assert!(compiled.code.starts_with("import { computed } from 'vue'\n"));
        assert!(compiled.code.contains("const props = __props"));
        assert!(compiled.code.contains("setup(__props, { emit: __emit, expose: __expose }) {"));
        assert!(compiled.code.contains("return { computed, props, emit, pages, go };"));
        assert!(compiled.code.contains("__sfc__.__name = \"Paginate\";"));
        assert!(compiled.code.contains("__sfc__.template = \"<ul class=\\\"pagination\\\">"));
        assert!(compiled.code.contains(
            "import \"/project/src/components/Paginate.vue?vue&type=style&index=0&lang.css\";"
        ));
        assert!(compiled.code.trim_end().ends_with("export default __sfc__;"));

        assert_eq!(compiled.styles.len(), 1);
        assert!(compiled.styles[0].1.contains("display: flex"));

        // The hoisted import maps back to its line in the component file
        assert_eq!(compiled.map.lookup(0), Some(7));
        assert_eq!(compiled.map.len(), compiled.code.matches('\n').count());
    }

    #[test]
    fn test_compile_plain_script() {
        let source = "<template><p>{{ n }}</p></template>\n<script>\nexport default {\n  data: () => ({ n: 1 }),\n}\n</script>\n";
        let compiled = compile_component(source, Path::new("/p/Counter.vue")).unwrap();

        assert!(!compiled.is_typescript);
        assert!(compiled.code.contains("const __sfc__ = {\n  data: () => ({ n: 1 }),\n}"));
        assert!(!compiled.code.contains("setup("));
        assert!(compiled.styles.is_empty());
    }

    #[test]
    fn test_template_only_component() {
        let compiled = compile_component("<template><hr/></template>", Path::new("/p/Rule.vue")).unwrap();
        assert!(compiled.code.starts_with("const __sfc__ = {};\n"));
        assert!(compiled.code.contains("__sfc__.__file = \"Rule.vue\";"));
    }

    #[test]
    fn test_unsupported_langs() {
        assert!(compile_component("<script lang=\"coffee\"></script>", Path::new("/p/A.vue")).is_err());
        assert!(compile_component("<style lang=\"scss\"></style>", Path::new("/p/A.vue")).is_err());
        assert!(compile_component("<template lang=\"pug\"></template>", Path::new("/p/A.vue")).is_err());
    }

    #[tokio::test]
    async fn test_style_blocks_become_virtual_modules() {
        let plugin = VuePlugin::new(VueOptions::default()).unwrap();
        let ctx = context();
        let id = Path::new("/project/src/components/Paginate.vue");

        let result = plugin.transform(PAGINATE, id, &ModuleType::Vue, &ctx).await.unwrap();
        match result {
            TransformResult::Transformed { module_type, map, .. } => {
                assert_eq!(module_type, Some(ModuleType::TypeScript));
                assert!(map.is_some());
            }
            TransformResult::Skip => panic!("component was not compiled"),
        }

        let style_id = "/project/src/components/Paginate.vue?vue&type=style&index=0&lang.css";
        assert_eq!(
            plugin.resolve_id(style_id, Some(id), &ctx).await.unwrap(),
            ResolveResult::Resolved(style_id.to_string())
        );
        match plugin.load(style_id, &ctx).await.unwrap() {
            LoadResult::Loaded { content, loader } => {
                assert!(content.contains(".pagination"));
                assert_eq!(loader.as_deref(), Some("css"));
            }
            LoadResult::Skip => panic!("style block was not served"),
        }

        plugin.build_start(&ctx).await.unwrap();
        assert_eq!(
            plugin.resolve_id(style_id, Some(id), &ctx).await.unwrap(),
            ResolveResult::Skip
        );
    }

    #[tokio::test]
    async fn test_other_modules_pass_through() {
        let plugin = VuePlugin::new(VueOptions::default()).unwrap();
        let result = plugin
            .transform("export {}", Path::new("/project/src/a.ts"), &ModuleType::TypeScript, &context())
            .await
            .unwrap();
        assert!(matches!(result, TransformResult::Skip));
    }
}
