//! Plugin system for libpack
//!
//! Provides a Vite/Rollup-style plugin API for extending the bundler.

pub mod typescript;
pub mod vue;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use globset::{GlobBuilder, GlobSet, GlobSetBuilder};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

use crate::bundler::ModuleType;
use crate::config::PluginConfig;
use crate::error::BuildError;
use crate::sourcemap::LineMap;
use crate::utils::path_to_module_id;

pub use typescript::TypeScriptPlugin;
pub use vue::VuePlugin;

/// Plugin hook context
#[derive(Debug, Clone)]
pub struct PluginContext {
    /// Project root directory
    pub root: PathBuf,

    /// Output directory
    pub out_dir: PathBuf,

    /// Directory of the entry module; emitted files mirror the layout below it
    pub src_root: PathBuf,
}

impl PluginContext {
    /// Id of `path` relative to the project root, as matched by filters
    pub fn relative_id(&self, path: &Path) -> String {
        let id = path.to_string_lossy();
        let (file, query) = match id.split_once('?') {
            Some((file, query)) => (file, Some(query)),
            None => (&id[..], None),
        };

        let mut relative = pathdiff::diff_paths(file, &self.root)
            .filter(|p| !p.starts_with(".."))
            .map(|p| path_to_module_id(&p))
            .unwrap_or_else(|| path_to_module_id(Path::new(file)));

        if let Some(query) = query {
            relative.push('?');
            relative.push_str(query);
        }
        relative
    }
}

/// Result of a resolve hook
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolveResult {
    /// Continue to next plugin
    Skip,
    /// Resolved module id
    Resolved(String),
    /// Mark as external (don't bundle)
    External,
}

/// Result of a load hook
pub enum LoadResult {
    /// Continue to next plugin
    Skip,
    /// Loaded content
    Loaded {
        content: String,
        /// Optional loader type (js, css, json, etc.)
        loader: Option<String>,
    },
}

/// Result of a transform hook
pub enum TransformResult {
    /// Continue to next plugin (no transformation)
    Skip,
    /// Transformed code
    Transformed {
        code: String,
        /// Generated line -> input line; `None` drops the module's mapping
        map: Option<LineMap>,
        /// New module type, when the transform changes the language
        module_type: Option<ModuleType>,
    },
}

/// Kind of an emitted file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum AssetKind {
    Bundle,
    SourceMap,
    Stylesheet,
    Declaration,
    DeclarationMap,
    Manifest,
}

/// A file emitted by a plugin during `generate_bundle`
#[derive(Debug, Clone)]
pub struct EmittedAsset {
    /// Path relative to the output directory, with forward slashes
    pub file_name: String,
    pub source: String,
    pub kind: AssetKind,
}

/// Include/exclude filter over root-relative module ids
#[derive(Debug, Clone)]
pub struct FileFilter {
    include: GlobSet,
    exclude: GlobSet,
}

impl FileFilter {
    pub fn new(include: &[String], exclude: &[String]) -> Result<Self> {
        Ok(Self {
            include: build_globset(include)?,
            exclude: build_globset(exclude)?,
        })
    }

    /// Whether a root-relative id passes the filter
    pub fn matches(&self, id: &str) -> bool {
        self.include.is_match(id) && !self.exclude.is_match(id)
    }
}

fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let glob = GlobBuilder::new(pattern.trim_start_matches("./"))
            .literal_separator(true)
            .build()
            .map_err(|e| BuildError::invalid_config(format!("invalid glob '{}': {}", pattern, e)))?;
        builder.add(glob);
    }
    Ok(builder.build()?)
}

/// Plugin trait - implement this to create a libpack plugin
#[async_trait]
pub trait Plugin: Send + Sync {
    /// Plugin name for logging and debugging
    fn name(&self) -> &str;

    /// Ids this plugin's `transform` hook accepts; `None` accepts everything
    fn filter(&self) -> Option<&FileFilter> {
        None
    }

    /// Called when the build starts
    async fn build_start(&self, _ctx: &PluginContext) -> Result<()> {
        Ok(())
    }

    /// Resolve an import specifier to a module id
    /// Return ResolveResult::Skip to let other plugins handle it
    async fn resolve_id(
        &self,
        _specifier: &str,
        _importer: Option<&Path>,
        _ctx: &PluginContext,
    ) -> Result<ResolveResult> {
        Ok(ResolveResult::Skip)
    }

    /// Load the content of a module
    /// Return LoadResult::Skip to let other plugins handle it
    async fn load(&self, _id: &str, _ctx: &PluginContext) -> Result<LoadResult> {
        Ok(LoadResult::Skip)
    }

    /// Transform the code of a module
    /// Return TransformResult::Skip to leave code unchanged
    async fn transform(
        &self,
        _code: &str,
        _id: &Path,
        _module_type: &ModuleType,
        _ctx: &PluginContext,
    ) -> Result<TransformResult> {
        Ok(TransformResult::Skip)
    }

    /// Emit extra files once all modules are transformed
    async fn generate_bundle(&self, _ctx: &PluginContext) -> Result<Vec<EmittedAsset>> {
        Ok(Vec::new())
    }

    /// Called when the build ends
    async fn build_end(&self, _ctx: &PluginContext) -> Result<()> {
        Ok(())
    }
}

/// Output of the transform chain
#[derive(Debug)]
pub struct PluginOutput {
    pub code: String,
    pub map: Option<LineMap>,
    pub module_type: ModuleType,
}

/// Plugin manager
pub struct PluginManager {
    plugins: Vec<Arc<dyn Plugin>>,
    context: PluginContext,
}

impl PluginManager {
    /// Create a new plugin manager
    pub fn new(context: PluginContext) -> Self {
        Self {
            plugins: Vec::new(),
            context,
        }
    }

    /// Register a plugin
    pub fn register(&mut self, plugin: Arc<dyn Plugin>) {
        self.plugins.push(plugin);
    }

    pub fn context(&self) -> &PluginContext {
        &self.context
    }

    /// Run build_start hooks
    pub async fn run_build_start(&self) -> Result<()> {
        for plugin in &self.plugins {
            plugin.build_start(&self.context).await?;
        }
        Ok(())
    }

    /// Run build_end hooks
    pub async fn run_build_end(&self) -> Result<()> {
        for plugin in &self.plugins {
            plugin.build_end(&self.context).await?;
        }
        Ok(())
    }

    /// Run resolve_id hooks
    pub async fn resolve_id(&self, specifier: &str, importer: Option<&Path>) -> Result<ResolveResult> {
        for plugin in &self.plugins {
            match plugin.resolve_id(specifier, importer, &self.context).await? {
                ResolveResult::Skip => continue,
                resolved => return Ok(resolved),
            }
        }
        Ok(ResolveResult::Skip)
    }

    /// Run load hooks
    pub async fn load(&self, id: &str) -> Result<Option<(String, Option<String>)>> {
        for plugin in &self.plugins {
            match plugin.load(id, &self.context).await? {
                LoadResult::Skip => continue,
                LoadResult::Loaded { content, loader } => {
                    return Ok(Some((content, loader)));
                }
            }
        }
        Ok(None)
    }

    /// Run transform hooks in order, skipping plugins whose filter rejects `id`
    pub async fn transform(
        &self,
        code: &str,
        id: &Path,
        module_type: ModuleType,
    ) -> Result<PluginOutput> {
        let relative = self.context.relative_id(id);
        let mut current = PluginOutput {
            code: code.to_string(),
            map: Some(LineMap::identity(code)),
            module_type,
        };

        for plugin in &self.plugins {
            if let Some(filter) = plugin.filter() {
                if !filter.matches(&relative) {
                    continue;
                }
            }

            let result = plugin
                .transform(&current.code, id, &current.module_type, &self.context)
                .await
                .map_err(|e| BuildError::Plugin {
                    plugin: plugin.name().to_string(),
                    id: id.to_path_buf(),
                    message: format!("{:#}", e),
                })?;

            match result {
                TransformResult::Skip => continue,
                TransformResult::Transformed {
                    code,
                    map,
                    module_type,
                } => {
                    debug!("[{}] transformed {}", plugin.name(), relative);
                    current.map = match (map, current.map) {
                        (Some(map), Some(previous)) => Some(map.compose(&previous)),
                        _ => None,
                    };
                    current.code = code;
                    if let Some(module_type) = module_type {
                        current.module_type = module_type;
                    }
                }
            }
        }

        Ok(current)
    }

    /// Run generate_bundle hooks, collecting emitted files
    pub async fn generate_bundle(&self) -> Result<Vec<EmittedAsset>> {
        let mut assets = Vec::new();
        for plugin in &self.plugins {
            let emitted = plugin
                .generate_bundle(&self.context)
                .await
                .with_context(|| format!("[{}] generate_bundle failed", plugin.name()))?;
            assets.extend(emitted);
        }
        Ok(assets)
    }
}

/// Instantiate the plugins named in the configuration, in order
pub fn from_config(configs: &[PluginConfig]) -> Result<Vec<Arc<dyn Plugin>>> {
    configs
        .iter()
        .map(|config| -> Result<Arc<dyn Plugin>> {
            match config.name.as_str() {
                "vue" => Ok(Arc::new(VuePlugin::new(parse_options(config)?)?)),
                "typescript" => Ok(Arc::new(TypeScriptPlugin::new(parse_options(config)?)?)),
                other => Err(BuildError::invalid_config(format!(
                    "unknown plugin '{}', expected \"vue\" or \"typescript\"",
                    other
                ))
                .into()),
            }
        })
        .collect()
}

/// Deserialize a plugin's `options` table
fn parse_options<T: DeserializeOwned + Default>(config: &PluginConfig) -> Result<T> {
    match &config.options {
        None => Ok(T::default()),
        Some(table) => toml::Value::Table(table.clone()).try_into().map_err(|e| {
            anyhow::Error::from(BuildError::invalid_config(format!(
                "options for plugin '{}': {}",
                config.name, e
            )))
        }),
    }
}
