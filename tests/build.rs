//! End-to-end builds of a small pagination component library

use std::fs;
use std::path::Path;

use pretty_assertions::assert_eq;
use tempfile::TempDir;

use libpack_lib::config::{Format, SourceMapMode};
use libpack_lib::{BuildError, BuildOptions, Bundler, Config};

const CONFIG: &str = r#"
[library]
entry = "src/index.ts"
name = "VuePaginate"
file_name = "[name].[format].js"
formats = ["es", "umd"]

[build]
out_dir = "dist"
sourcemap = true

[bundle]
external = ["vue"]

[bundle.globals]
vue = "Vue"

[[plugins]]
name = "vue"

[[plugins]]
name = "typescript"
options = { include = ["src/**/*.ts", "src/**/*.vue"], exclude = ["src/internal/**"], declaration = DECLARATION, declaration_map = DECLARATION }
"#;

const INDEX: &str = r#"import Paginate from './components/Paginate.vue'
import { clamp } from './internal/clamp'

export { Paginate, clamp }
export { pageRange } from './util/pages'
export type { PageRange } from './util/pages'
export default Paginate
"#;

const PAGES: &str = r#"export interface PageRange {
  first: number
  last: number
}

export function pageRange(current: number, total: number, size = 5): PageRange {
  const first = Math.max(1, Math.min(current - Math.floor(size / 2), total - size + 1))
  return { first, last: Math.min(total, first + size - 1) }
}
"#;

const CLAMP: &str = "export const clamp = (n: number, lo: number, hi: number): number => Math.min(hi, Math.max(lo, n))\n";

const PAGINATE: &str = r#"<template>
  <ul class="paginate">
    <li v-for="page in pages" :key="page" @click="select(page)">{{ page }}</li>
  </ul>
</template>

<script setup lang="ts">
import { computed } from 'vue'
import { pageRange } from '../util/pages'

const props = defineProps({
  page: { type: Number, default: 1 },
  total: { type: Number, required: true },
})
const emit = defineEmits(['change'])

const pages = computed(() => {
  const range = pageRange(props.page, props.total)
  const out: number[] = []
  for (let p = range.first; p <= range.last; p++) out.push(p)
  return out
})

function select(page: number): void {
  emit('change', page)
}
</script>

<style>
.paginate { display: flex; }
</style>
"#;

fn project(declaration: bool) -> TempDir {
    let dir = TempDir::new().unwrap();
    let root = dir.path();
    fs::create_dir_all(root.join("src/components")).unwrap();
    fs::create_dir_all(root.join("src/util")).unwrap();
    fs::create_dir_all(root.join("src/internal")).unwrap();
    fs::create_dir_all(root.join("node_modules/vue")).unwrap();

    fs::write(
        root.join("libpack.toml"),
        CONFIG.replace("DECLARATION", if declaration { "true" } else { "false" }),
    )
    .unwrap();
    fs::write(root.join("src/index.ts"), INDEX).unwrap();
    fs::write(root.join("src/util/pages.ts"), PAGES).unwrap();
    fs::write(root.join("src/internal/clamp.ts"), CLAMP).unwrap();
    fs::write(root.join("src/components/Paginate.vue"), PAGINATE).unwrap();

    // Would end up in the bundle if vue were not kept external
    fs::write(
        root.join("node_modules/vue/package.json"),
        r#"{ "name": "vue", "module": "index.mjs" }"#,
    )
    .unwrap();
    fs::write(
        root.join("node_modules/vue/index.mjs"),
        "export const VUE_RUNTIME_MARKER = 1;\nexport function computed(f) { return f; }\n",
    )
    .unwrap();

    dir
}

fn load(root: &Path) -> Config {
    Config::load(root.join("libpack.toml")).unwrap()
}

fn read(root: &Path, file: &str) -> String {
    fs::read_to_string(root.join("dist").join(file))
        .unwrap_or_else(|e| panic!("missing dist/{}: {}", file, e))
}

#[tokio::test]
async fn builds_es_and_umd_bundles() {
    let dir = project(false);
    let bundler = Bundler::new(load(dir.path()), BuildOptions::default()).unwrap();
    let result = bundler.build().await.unwrap();

    let mut names: Vec<_> = result
        .artifacts
        .iter()
        .map(|a| (a.format, a.file_name.clone()))
        .collect();
    names.sort_by_key(|(format, _)| format.as_str());
    assert_eq!(
        names,
        vec![
            (Format::Es, "vue-paginate.es.js".to_string()),
            (Format::Umd, "vue-paginate.umd.js".to_string()),
        ]
    );
    assert_eq!(result.artifacts[0].externals, vec!["vue".to_string()]);

    let es = read(dir.path(), "vue-paginate.es.js");
    let umd = read(dir.path(), "vue-paginate.umd.js");

    for bundle in [&es, &umd] {
        assert!(!bundle.contains("VUE_RUNTIME_MARKER"), "vue was bundled");
        assert!(bundle.contains("pageRange"));
        assert!(bundle.contains("\"Paginate\""));
        assert!(!bundle.contains(": number"), "type annotations survived");
    }

    assert!(es.contains("from \"vue\";"));
    assert!(es.contains("export default"));
    assert!(es.ends_with("//# sourceMappingURL=vue-paginate.es.js.map\n"));

    assert!(umd.contains("global.Vue"));
    assert!(umd.contains("global.VuePaginate"));
    assert!(umd.contains("define.amd"));

    let map: serde_json::Value =
        serde_json::from_str(&read(dir.path(), "vue-paginate.es.js.map")).unwrap();
    assert_eq!(map["version"], 3);
    assert_eq!(map["file"], "vue-paginate.es.js");

    let css = read(dir.path(), "style.css");
    assert!(css.contains(".paginate"));

    // No declarations unless asked for
    assert!(!dir.path().join("dist/index.d.ts").exists());
    assert!(result.assets.iter().all(|a| !a.file_name.ends_with(".d.ts")));
}

/// Code outside the module table: wrapper, registry runtime and entry lookup
fn outside_modules(code: &str) -> String {
    let (before, rest) = code.split_once("var __modules = {").unwrap();
    let start = rest.rfind("var __entry = __require(").unwrap();
    format!("{}{}", before, &rest[start..])
}

/// Plain `require(...)` calls, ignoring the registry's `__require`
fn plain_requires(code: &str) -> usize {
    code.matches("require(").count() - code.matches("__require(").count()
}

fn collapse(code: &str) -> String {
    code.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[tokio::test]
async fn umd_browser_path_uses_only_the_global() {
    let dir = project(false);
    Bundler::new(load(dir.path()), BuildOptions::default())
        .unwrap()
        .build()
        .await
        .unwrap();

    let umd = read(dir.path(), "vue-paginate.umd.js");
    let (header, body) = umd.split_once("\"use strict\";").unwrap();

    let browser = header
        .lines()
        .find(|l| l.contains("globalThis"))
        .expect("browser-global branch");
    assert!(browser.trim_end().ends_with("global.VuePaginate = factory(global.Vue));"));
    assert!(header.contains("define([\"vue\"], factory)"));

    // the CommonJS branch of the header is the only plain require
    assert_eq!(plain_requires(header), 1);
    assert!(header.contains("factory(require(\"vue\"))"));
    let wrapper = outside_modules(body);
    assert_eq!(plain_requires(&wrapper), 0);
    assert!(wrapper.contains("var __externals = { \"vue\": __ext_0 };"));
    assert!(!body.contains("global."));
}

#[tokio::test]
async fn builds_iife_bundle() {
    let dir = project(false);
    fs::write(
        dir.path().join("src/util/list.ts"),
        "export const first = <T,>(xs: T[]): T => xs[0]\nexport const after = (n?: number): number => n! + 1\n",
    )
    .unwrap();
    fs::write(
        dir.path().join("src/index.ts"),
        format!("{}export {{ first, after }} from './util/list'\n", INDEX),
    )
    .unwrap();

    let options = BuildOptions {
        formats: vec![Format::Iife],
        sourcemap: Some(SourceMapMode::Disabled),
        ..Default::default()
    };
    let result = Bundler::new(load(dir.path()), options).unwrap().build().await.unwrap();
    assert_eq!(result.artifacts.len(), 1);
    assert_eq!(result.artifacts[0].format, Format::Iife);

    let iife = read(dir.path(), "vue-paginate.iife.js");
    assert!(iife.starts_with("var VuePaginate = (function (__ext_0) {"));
    assert!(iife.trim_end().ends_with("})(Vue);"));
    let wrapper = outside_modules(&iife);
    assert_eq!(plain_requires(&wrapper), 0);
    assert!(wrapper.contains("var __externals = { \"vue\": __ext_0 };"));
    assert!(!iife.contains("import "));
    assert!(!iife.contains("VUE_RUNTIME_MARKER"));

    let code = collapse(&iife);
    assert!(code.contains("const first = (xs ) => xs[0]"), "generic arrow left in bundle");
    assert!(code.contains("const after = (n ) => n + 1"), "non-null assertion left in bundle");
}

#[tokio::test]
async fn emits_declarations_for_included_sources() {
    let dir = project(true);
    let bundler = Bundler::new(load(dir.path()), BuildOptions::default()).unwrap();
    bundler.build().await.unwrap();

    let index = read(dir.path(), "index.d.ts");
    assert!(index.contains("export { Paginate, clamp }"));
    assert!(index.contains("export default Paginate"));
    assert!(index.ends_with("//# sourceMappingURL=index.d.ts.map\n"));

    let pages = read(dir.path(), "util/pages.d.ts");
    assert!(pages.contains("export interface PageRange"));
    assert!(pages.contains("export declare function pageRange("));
    assert!(pages.contains("size?: number"));

    let component = read(dir.path(), "components/Paginate.vue.d.ts");
    assert!(component.contains("DefineComponent"));

    let map: serde_json::Value =
        serde_json::from_str(&read(dir.path(), "util/pages.d.ts.map")).unwrap();
    assert_eq!(map["sources"][0], "../../src/util/pages.ts");

    // Excluded from the plugin, so no declaration
    assert!(!dir.path().join("dist/internal/clamp.d.ts").exists());
}

#[tokio::test]
async fn command_line_overrides_apply() {
    let dir = project(false);
    let options = BuildOptions {
        outdir: Some("lib".into()),
        formats: vec![Format::Cjs],
        sourcemap: Some(SourceMapMode::Inline),
        minify: true,
    };
    let result = Bundler::new(load(dir.path()), options).unwrap().build().await.unwrap();

    assert_eq!(result.artifacts.len(), 1);
    let cjs = fs::read_to_string(dir.path().join("lib/vue-paginate.cjs.js")).unwrap();
    assert!(cjs.contains("require(\"vue\")"));
    assert!(cjs.contains("//# sourceMappingURL=data:application/json;"));
    assert!(!dir.path().join("lib/vue-paginate.cjs.js.map").exists());
    assert!(!dir.path().join("dist").exists());
}

#[tokio::test]
async fn missing_global_fails_before_writing() {
    let dir = project(false);
    let config = fs::read_to_string(dir.path().join("libpack.toml"))
        .unwrap()
        .replace("[bundle.globals]\nvue = \"Vue\"\n", "")
        .replace("formats = [\"es\", \"umd\"]", "formats = [\"es\"]");
    fs::write(dir.path().join("libpack.toml"), config).unwrap();

    let options = BuildOptions {
        formats: vec![Format::Es, Format::Umd],
        ..Default::default()
    };
    let err = Bundler::new(load(dir.path()), options).err().unwrap();

    match err.downcast_ref::<BuildError>() {
        Some(BuildError::MissingGlobal { dependency, format }) => {
            assert_eq!(dependency, "vue");
            assert_eq!(*format, Format::Umd);
        }
        other => panic!("unexpected error: {:?}", other),
    }
    assert!(!dir.path().join("dist").exists());
}

#[tokio::test]
async fn missing_entry_is_reported() {
    let dir = project(false);
    fs::remove_file(dir.path().join("src/index.ts")).unwrap();

    let err = Config::load(dir.path().join("libpack.toml")).err().unwrap();
    assert!(matches!(
        err.downcast_ref::<BuildError>(),
        Some(BuildError::EntryNotFound(_))
    ));
}

#[tokio::test]
async fn unresolved_import_is_reported() {
    let dir = project(false);
    fs::write(
        dir.path().join("src/index.ts"),
        "import { nope } from './missing'\nexport { nope }\n",
    )
    .unwrap();

    let bundler = Bundler::new(load(dir.path()), BuildOptions::default()).unwrap();
    let err = bundler.build().await.err().unwrap();
    assert!(matches!(
        err.downcast_ref::<BuildError>(),
        Some(BuildError::UnresolvedImport { specifier, .. }) if specifier == "./missing"
    ));
    assert!(!dir.path().join("dist").exists());
}
