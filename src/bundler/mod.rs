//! Core bundler implementation
//!
//! Handles the module graph, dependency resolution, and bundle generation.

mod chunk;
mod graph;
mod link;
mod render;

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{anyhow, Context, Result};
use parking_lot::RwLock;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::cli::BuildOptions;
use crate::config::{Config, Format};
use crate::error::BuildError;
use crate::plugins::{self, AssetKind, PluginContext, PluginManager, ResolveResult};
use crate::resolver::Resolver;
use crate::transform::{process_css, Transformer};
use crate::utils::{hash_content, is_subpath};

pub use chunk::Chunk;
pub use graph::{split_query, ImportRecord, Module, ModuleGraph, ModuleId, ModuleRef, ModuleType};
pub use link::{link, scan_imports, LinkedModule};
pub use render::{ChunkRenderer, EntryExports, RenderedChunk};

/// Result of a build operation
#[derive(Debug)]
pub struct BuildResult {
    /// One bundle per requested format
    pub artifacts: Vec<OutputArtifact>,

    /// Every other file written: maps, stylesheet, declarations
    pub assets: Vec<WrittenAsset>,

    /// Emitted files, keyed by path relative to the output directory
    pub manifest: BTreeMap<String, ManifestEntry>,

    pub duration: Duration,
}

/// Information about a generated bundle
#[derive(Debug)]
pub struct OutputArtifact {
    pub format: Format,

    /// File name relative to the output directory
    pub file_name: String,

    /// Output file path
    pub output_path: PathBuf,

    /// Bundle size in bytes
    pub size: usize,

    /// Dependencies left for the consumer to provide
    pub externals: Vec<String>,

    /// Source map path (if written)
    pub sourcemap_path: Option<PathBuf>,
}

/// A non-bundle file written by the build
#[derive(Debug)]
pub struct WrittenAsset {
    pub file_name: String,
    pub output_path: PathBuf,
    pub kind: AssetKind,
    pub size: usize,
}

/// One line of `manifest.json`
#[derive(Debug, Clone, Serialize)]
pub struct ManifestEntry {
    pub kind: AssetKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<Format>,
    pub size: usize,
    pub hash: String,
}

/// A file rendered in memory, waiting to be written
struct PendingFile {
    file_name: String,
    source: String,
    kind: AssetKind,
    format: Option<Format>,
}

/// Where an import specifier leads
enum Resolution {
    Module(PathBuf),
    External(String),
}

/// The main bundler
pub struct Bundler {
    /// Project configuration
    config: Arc<Config>,

    /// Module resolver
    resolver: Resolver,

    /// Code transformer
    transformer: Transformer,

    /// Registered plugins
    plugins: PluginManager,

    /// Module graph
    graph: Arc<RwLock<ModuleGraph>>,
}

impl Bundler {
    /// Create a new bundler instance
    pub fn new(mut config: Config, options: BuildOptions) -> Result<Self> {
        config.apply_options(&options)?;
        config.root = fs::canonicalize(&config.root)
            .with_context(|| format!("Failed to resolve project root: {}", config.root.display()))?;

        let config = Arc::new(config);
        let resolver = Resolver::new(config.clone());
        let transformer = Transformer::new(config.clone())?;

        let mut plugins = PluginManager::new(PluginContext {
            root: config.root.clone(),
            out_dir: config.output_dir(),
            src_root: config.source_root(),
        });
        for plugin in plugins::from_config(&config.plugins)? {
            debug!("Registered plugin: {}", plugin.name());
            plugins.register(plugin);
        }

        Ok(Self {
            config,
            resolver,
            transformer,
            plugins,
            graph: Arc::new(RwLock::new(ModuleGraph::new())),
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Build the project
    pub async fn build(&self) -> Result<BuildResult> {
        let start = Instant::now();
        *self.graph.write() = ModuleGraph::new();

        self.plugins.run_build_start().await?;

        // 1. Build the module graph from the entry
        info!("Building module graph...");
        let entry_path = self.config.entry_path();
        let entry = fs::canonicalize(&entry_path)
            .map_err(|_| anyhow::Error::from(BuildError::EntryNotFound(entry_path.clone())))?;
        let entry_id = self.process_module(entry, true).await?;

        // 2. Link every module against the registry
        info!("Linking {} modules...", self.graph.read().len());
        let linked = self.link_modules()?;

        // 3. Render one bundle per format
        info!("Rendering bundles...");
        let mut pending = self.render_bundles(entry_id, &linked)?;

        // 4. Stylesheet and plugin-emitted files
        if let Some(stylesheet) = self.render_stylesheet(entry_id)? {
            pending.push(stylesheet);
        }
        for asset in self.plugins.generate_bundle().await? {
            pending.push(PendingFile {
                file_name: asset.file_name,
                source: asset.source,
                kind: asset.kind,
                format: None,
            });
        }

        let manifest = generate_manifest(&pending);
        if self.config.build.manifest {
            pending.push(PendingFile {
                file_name: "manifest.json".to_string(),
                source: serde_json::to_string_pretty(&manifest)?,
                kind: AssetKind::Manifest,
                format: None,
            });
        }

        // 5. Write everything at once
        info!("Writing {} files...", pending.len());
        let (artifacts, assets) = self.write_files(pending)?;

        self.plugins.run_build_end().await?;

        let duration = start.elapsed();
        debug!("Build completed in {:?}", duration);

        Ok(BuildResult {
            artifacts,
            assets,
            manifest,
            duration,
        })
    }

    /// Process a single module and its dependencies
    ///
    /// Uses Box::pin for async recursion to avoid infinite type size issues
    async fn process_module(&self, path: PathBuf, is_entry: bool) -> Result<ModuleId> {
        // Check if already processed
        {
            let graph = self.graph.read();
            if let Some(id) = graph.get_module_id(&path) {
                return Ok(id);
            }
        }

        let id = path.to_string_lossy().into_owned();
        let (source, loader) = match self.plugins.load(&id).await? {
            Some(loaded) => loaded,
            None => {
                let source = fs::read_to_string(&path)
                    .with_context(|| format!("Failed to read module: {}", path.display()))?;
                (source, None)
            }
        };

        let module_type = match loader {
            Some(loader) => ModuleType::from_extension(&loader),
            None => Module::detect_type(&path),
        };
        debug!("Loaded {} as {:?}", id, module_type);

        // Plugin transforms, then the built-in one
        let output = self.plugins.transform(&source, &path, module_type).await?;
        let transformed = self
            .transformer
            .transform(&output.code, &path, &output.module_type)?;

        let specifiers = if transformed.css.is_some() {
            Vec::new()
        } else {
            scan_imports(&transformed.code)
                .with_context(|| format!("Failed to parse imports of {}", path.display()))?
        };

        let module = Module {
            path: path.clone(),
            source,
            module_type: output.module_type,
            is_entry,
            code: transformed.code,
            map: output.map,
            css: transformed.css,
            imports: Vec::new(),
        };

        // Add to graph before visiting dependencies so cycles terminate
        let module_id = self.graph.write().add_module(module);

        let mut imports = Vec::new();
        for specifier in specifiers {
            let target = match self.resolve_import(&specifier, &path).await? {
                Resolution::External(name) => {
                    self.graph.write().add_external(&name);
                    ModuleRef::External(name)
                }
                Resolution::Module(resolved) => {
                    let dep_id = Box::pin(self.process_module(resolved, false)).await?;
                    self.graph.write().add_dependency(module_id, dep_id);
                    ModuleRef::Internal(dep_id)
                }
            };
            imports.push(ImportRecord { specifier, target });
        }

        if let Some(module) = self.graph.write().get_module_mut(module_id) {
            module.imports = imports;
        }

        Ok(module_id)
    }

    /// Externals, then plugins, then the filesystem
    async fn resolve_import(&self, specifier: &str, importer: &Path) -> Result<Resolution> {
        if self.resolver.is_external(specifier) {
            debug!("External: {}", specifier);
            return Ok(Resolution::External(specifier.to_string()));
        }

        match self.plugins.resolve_id(specifier, Some(importer)).await? {
            ResolveResult::Resolved(id) => return Ok(Resolution::Module(PathBuf::from(id))),
            ResolveResult::External => return Ok(Resolution::External(specifier.to_string())),
            ResolveResult::Skip => {}
        }

        match self.resolver.resolve(specifier, importer)? {
            Some(path) => {
                let canonical = fs::canonicalize(&path)
                    .with_context(|| format!("Failed to resolve module path: {}", path.display()))?;
                Ok(Resolution::Module(canonical))
            }
            None => Err(BuildError::UnresolvedImport {
                specifier: specifier.to_string(),
                importer: importer.to_path_buf(),
            }
            .into()),
        }
    }

    fn link_modules(&self) -> Result<HashMap<ModuleId, LinkedModule>> {
        let graph = self.graph.read();
        let mut linked = HashMap::new();

        for id in graph.all_module_ids() {
            let module = graph
                .get_module(id)
                .ok_or_else(|| anyhow!("module {} missing from graph", id))?;
            let refs: HashMap<String, String> = module
                .imports
                .iter()
                .map(|record| (record.specifier.clone(), record.target.to_require_arg()))
                .collect();

            let linked_module = link(&module.code, &refs)
                .with_context(|| format!("Failed to link {}", module.path.display()))?;
            linked.insert(id, linked_module);
        }

        Ok(linked)
    }

    fn render_bundles(
        &self,
        entry: ModuleId,
        linked: &HashMap<ModuleId, LinkedModule>,
    ) -> Result<Vec<PendingFile>> {
        let graph = self.graph.read();
        let chunk = Chunk::entry(self.config.file_base_name(), &graph, entry);
        let exports = EntryExports::collect(&graph, linked, entry);
        debug!(
            "Chunk '{}': {} modules, externals {:?}",
            chunk.name,
            chunk.len(),
            chunk.externals
        );

        if self.config.build.sourcemap.is_enabled() {
            let unmapped = chunk
                .module_ids
                .iter()
                .filter_map(|&id| graph.get_module(id))
                .filter(|m| m.map.is_none() && m.css.is_none())
                .count();
            if unmapped > 0 {
                warn!(
                    "{} module(s) have no line mapping; their lines are unmapped in the source maps",
                    unmapped
                );
            }
        }

        let renderer = ChunkRenderer {
            config: &self.config,
            graph: &graph,
            chunk: &chunk,
            linked,
            exports: &exports,
        };

        let mut pending = Vec::new();
        for &format in &self.config.library.formats {
            let file_name = self.config.output_file_name(format);
            let rendered = renderer.render(format, &file_name)?;

            if let Some(map) = rendered.map {
                pending.push(PendingFile {
                    file_name: format!("{}.map", file_name),
                    source: map,
                    kind: AssetKind::SourceMap,
                    format: Some(format),
                });
            }
            pending.push(PendingFile {
                file_name,
                source: rendered.code,
                kind: AssetKind::Bundle,
                format: Some(format),
            });
        }

        Ok(pending)
    }

    /// Collect component and imported CSS into one stylesheet
    fn render_stylesheet(&self, entry: ModuleId) -> Result<Option<PendingFile>> {
        let graph = self.graph.read();
        let mut ids = graph.get_reachable_modules(entry);
        ids.sort_unstable();

        let css: Vec<&str> = ids
            .iter()
            .filter_map(|&id| graph.get_module(id))
            .filter_map(|m| m.css.as_deref())
            .collect();
        if css.is_empty() {
            return Ok(None);
        }

        let file_name = self.config.build.css_file_name.clone();
        let source = process_css(&css.join("\n"), &file_name, self.config.build.minify)?;
        Ok(Some(PendingFile {
            file_name,
            source,
            kind: AssetKind::Stylesheet,
            format: None,
        }))
    }

    /// Write all files to disk
    fn write_files(&self, pending: Vec<PendingFile>) -> Result<(Vec<OutputArtifact>, Vec<WrittenAsset>)> {
        let output_dir = self.config.output_dir();

        if self.config.build.empty_out_dir && output_dir.is_dir() {
            if output_dir != self.config.root && is_subpath(&output_dir, &self.config.root) {
                debug!("Emptying {}", output_dir.display());
                fs::remove_dir_all(&output_dir)
                    .with_context(|| format!("Failed to empty {}", output_dir.display()))?;
            } else {
                warn!(
                    "{} is outside the project root; not emptying it",
                    output_dir.display()
                );
            }
        }

        fs::create_dir_all(&output_dir).context("Failed to create output directory")?;

        let externals = self.graph.read().externals().to_vec();
        let mut sourcemaps: HashMap<Format, PathBuf> = HashMap::new();
        let mut artifacts = Vec::new();
        let mut assets = Vec::new();

        for file in pending {
            let output_path = output_dir.join(&file.file_name);
            if let Some(parent) = output_path.parent() {
                fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create {}", parent.display()))?;
            }
            fs::write(&output_path, &file.source)
                .with_context(|| format!("Failed to write {}", output_path.display()))?;

            match (file.kind, file.format) {
                (AssetKind::Bundle, Some(format)) => artifacts.push(OutputArtifact {
                    format,
                    file_name: file.file_name,
                    output_path,
                    size: file.source.len(),
                    externals: externals.clone(),
                    sourcemap_path: sourcemaps.remove(&format),
                }),
                (kind, format) => {
                    if let (AssetKind::SourceMap, Some(format)) = (kind, format) {
                        sourcemaps.insert(format, output_path.clone());
                    }
                    assets.push(WrittenAsset {
                        file_name: file.file_name,
                        output_path,
                        kind,
                        size: file.source.len(),
                    });
                }
            }
        }

        Ok((artifacts, assets))
    }
}

/// Describe every pending file for `manifest.json`
fn generate_manifest(pending: &[PendingFile]) -> BTreeMap<String, ManifestEntry> {
    pending
        .iter()
        .map(|file| {
            (
                file.file_name.clone(),
                ManifestEntry {
                    kind: file.kind,
                    format: file.format,
                    size: file.source.len(),
                    hash: hash_content(file.source.as_bytes()),
                },
            )
        })
        .collect()
}
