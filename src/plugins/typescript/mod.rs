//! TypeScript plugin
//!
//! Strips types from included modules and, when asked, emits `.d.ts`
//! declarations (and their maps) for them at the end of the build.

mod dts;

use std::path::{Path, PathBuf};

use anyhow::{bail, Result};
use async_trait::async_trait;
use dashmap::DashMap;
use serde::Deserialize;
use tracing::{debug, warn};

use super::{AssetKind, EmittedAsset, FileFilter, Plugin, PluginContext, TransformResult};
use crate::bundler::ModuleType;
use crate::sourcemap::{LineMap, SourceMapBuilder};
use crate::transform::lexer::{line_col, Tokens};
use crate::transform::strip_types;
use crate::utils::{path_to_module_id, relative_path};

pub use dts::{emit_declaration, Declaration, COMPONENT_DECLARATION};

/// Options accepted under `[[plugins]] name = "typescript"`
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TypeScriptOptions {
    /// Fail on lexical diagnostics
    pub check: bool,
    pub include: Vec<String>,
    pub exclude: Vec<String>,
    pub source_map: bool,
    pub declaration: bool,
    pub declaration_map: bool,
}

impl Default for TypeScriptOptions {
    fn default() -> Self {
        Self {
            check: true,
            include: vec!["**/*.ts".to_string()],
            exclude: Vec::new(),
            source_map: true,
            declaration: false,
            declaration_map: false,
        }
    }
}

pub struct TypeScriptPlugin {
    options: TypeScriptOptions,
    filter: FileFilter,
    /// Declarations by source file, collected during transforms
    declarations: DashMap<PathBuf, Declaration>,
}

impl TypeScriptPlugin {
    pub fn new(options: TypeScriptOptions) -> Result<Self> {
        if options.declaration_map && !options.declaration {
            warn!("typescript: declaration_map has no effect without declaration");
        }
        Ok(Self {
            filter: FileFilter::new(&options.include, &options.exclude)?,
            options,
            declarations: DashMap::new(),
        })
    }

    /// Output path of the declaration for `source`, relative to the out dir
    fn declaration_file(source: &Path, ctx: &PluginContext) -> String {
        let relative = relative_path(&ctx.src_root, source)
            .filter(|p| !p.starts_with(".."))
            .unwrap_or_else(|| {
                source
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default()
            });

        match relative.strip_suffix(".ts") {
            Some(stem) => format!("{}.d.ts", stem),
            None => format!("{}.d.ts", relative),
        }
    }
}

fn file_part(id: &Path) -> PathBuf {
    let id = id.to_string_lossy();
    PathBuf::from(id.split('?').next().unwrap_or_default())
}

#[async_trait]
impl Plugin for TypeScriptPlugin {
    fn name(&self) -> &str {
        "typescript"
    }

    fn filter(&self) -> Option<&FileFilter> {
        Some(&self.filter)
    }

    async fn build_start(&self, _ctx: &PluginContext) -> Result<()> {
        self.declarations.clear();
        Ok(())
    }

    async fn transform(
        &self,
        code: &str,
        id: &Path,
        module_type: &ModuleType,
        ctx: &PluginContext,
    ) -> Result<TransformResult> {
        let file = file_part(id);
        let is_component = file.extension().map(|e| e == "vue").unwrap_or(false);

        if self.options.declaration && is_component {
            self.declarations.insert(
                file.clone(),
                Declaration {
                    code: COMPONENT_DECLARATION.to_string(),
                    map: LineMap::from_lines(vec![Some(0); COMPONENT_DECLARATION.lines().count()]),
                },
            );
        }

        if *module_type != ModuleType::TypeScript {
            return Ok(TransformResult::Skip);
        }

        if self.options.check {
            let tokens = Tokens::new(code);
            if let Some(diagnostic) = tokens.diagnostics().first() {
                let (line, col) = line_col(code, diagnostic.offset);
                bail!("{}:{}: {}", line, col, diagnostic.message);
            }
        }

        if self.options.declaration && !is_component {
            let declaration = emit_declaration(code)?;
            debug!(
                "declaration for {} ({} lines)",
                ctx.relative_id(id),
                declaration.map.len()
            );
            self.declarations.insert(file, declaration);
        }

        let stripped = strip_types(code)?;
        let map = self.options.source_map.then(|| LineMap::identity(&stripped));
        Ok(TransformResult::Transformed {
            code: stripped,
            map,
            module_type: Some(ModuleType::JavaScript),
        })
    }

    async fn generate_bundle(&self, ctx: &PluginContext) -> Result<Vec<EmittedAsset>> {
        if !self.options.declaration {
            return Ok(Vec::new());
        }

        let mut sources: Vec<PathBuf> = self.declarations.iter().map(|e| e.key().clone()).collect();
        sources.sort();

        let mut assets = Vec::new();
        for source in sources {
            let declaration = match self.declarations.get(&source) {
                Some(declaration) => declaration,
                None => continue,
            };
            let file_name = Self::declaration_file(&source, ctx);
            let mut code = declaration.code.clone();

            if self.options.declaration_map {
                let map_name = format!("{}.map", file_name);
                let base = Path::new(&map_name)
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_else(|| map_name.clone());
                let dts_base = base.trim_end_matches(".map").to_string();

                let map_dir = ctx.out_dir.join(&file_name);
                let map_dir = map_dir.parent().unwrap_or(&ctx.out_dir);
                let source_name =
                    relative_path(map_dir, &source).unwrap_or_else(|| path_to_module_id(&source));

                let mut builder = SourceMapBuilder::new(dts_base);
                let index = builder.add_source(source_name, None);
                for line in 0..declaration.map.len() {
                    builder.push_line(declaration.map.lookup(line).map(|l| (index, l)));
                }

                code.push_str(&format!("//# sourceMappingURL={}\n", base));
                assets.push(EmittedAsset {
                    file_name: map_name,
                    source: builder.to_json(),
                    kind: AssetKind::DeclarationMap,
                });
            }

            assets.push(EmittedAsset {
                file_name,
                source: code,
                kind: AssetKind::Declaration,
            });
        }

        Ok(assets)
    }
}
