//! Configuration handling for libpack
//!
//! Parses, merges and validates libpack.toml files.

mod schema;

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use heck::ToKebabCase;
use serde::{Deserialize, Serialize};

use crate::cli::BuildOptions;
use crate::error::BuildError;
use crate::utils::is_js_identifier;

pub use schema::*;

/// Default config file name
pub const CONFIG_FILE: &str = "libpack.toml";

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Entry, name and output naming
    pub library: LibraryConfig,

    /// Output settings
    #[serde(default)]
    pub build: BuildConfig,

    /// Externalized dependencies and their globals
    #[serde(default)]
    pub bundle: BundleConfig,

    /// Plugin configuration, applied in order
    #[serde(default)]
    pub plugins: Vec<PluginConfig>,

    /// Root directory (computed from config file location)
    #[serde(skip)]
    pub root: PathBuf,
}

impl Config {
    /// Load configuration from a file path
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let canonical_path = if path.is_absolute() {
            path.to_path_buf()
        } else {
            std::env::current_dir()?.join(path)
        };

        let content = fs::read_to_string(&canonical_path)
            .with_context(|| format!("Failed to read config file: {}", canonical_path.display()))?;

        let root = canonical_path
            .parent()
            .map(|p| p.to_path_buf())
            .unwrap_or_else(|| PathBuf::from("."));

        let config = Self::from_toml_str(&content, root)
            .with_context(|| format!("Failed to load {}", canonical_path.display()))?;

        Ok(config)
    }

    /// Parse and validate configuration rooted at `root`
    pub fn from_toml_str(content: &str, root: PathBuf) -> Result<Self> {
        let mut config: Config = toml::from_str(content).context("Failed to parse libpack.toml")?;
        config.root = root;
        config.validate()?;
        Ok(config)
    }

    /// Apply command-line overrides, then re-validate
    pub fn apply_options(&mut self, options: &BuildOptions) -> Result<()> {
        if let Some(outdir) = &options.outdir {
            self.build.out_dir = outdir.display().to_string();
        }
        if !options.formats.is_empty() {
            self.library.formats = options.formats.clone();
        }
        if let Some(sourcemap) = options.sourcemap {
            self.build.sourcemap = sourcemap;
        }
        if options.minify {
            self.build.minify = true;
        }
        self.validate()
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        let entry = self.entry_path();
        if !entry.is_file() {
            return Err(BuildError::EntryNotFound(entry).into());
        }

        let formats = &self.library.formats;
        if formats.is_empty() {
            return Err(BuildError::invalid_config("at least one output format is required").into());
        }

        let mut seen = HashSet::new();
        for format in formats {
            if !seen.insert(format) {
                return Err(BuildError::invalid_config(format!("format '{}' is listed twice", format)).into());
            }
        }

        let template = &self.library.file_name;
        if template.trim().is_empty() {
            return Err(BuildError::invalid_config("library.file_name must not be empty").into());
        }
        if formats.len() > 1 && !template.contains("[format]") {
            return Err(BuildError::invalid_config(format!(
                "library.file_name '{}' must contain [format] when building more than one format",
                template
            ))
            .into());
        }

        for format in formats.iter().filter(|f| f.is_global()) {
            let name = self.library.name.as_deref().unwrap_or("").trim();
            if name.is_empty() {
                return Err(BuildError::invalid_config(format!(
                    "library.name is required for the {} format",
                    format
                ))
                .into());
            }
            if *format == Format::Iife && !is_js_identifier(name) {
                return Err(BuildError::invalid_config(format!(
                    "library.name '{}' is not a valid JavaScript identifier, which the iife format requires",
                    name
                ))
                .into());
            }

            for dependency in &self.bundle.external {
                if !self.bundle.globals.contains_key(dependency) {
                    return Err(BuildError::MissingGlobal {
                        dependency: dependency.clone(),
                        format: *format,
                    }
                    .into());
                }
            }
        }

        for (dependency, global) in &self.bundle.globals {
            if global.trim().is_empty() {
                return Err(BuildError::invalid_config(format!(
                    "global name for '{}' must not be empty",
                    dependency
                ))
                .into());
            }
        }

        Ok(())
    }

    /// Absolute path of the entry module
    pub fn entry_path(&self) -> PathBuf {
        self.root.join(&self.library.entry)
    }

    /// Directory declarations are laid out relative to
    pub fn source_root(&self) -> PathBuf {
        self.entry_path()
            .parent()
            .map(|p| p.to_path_buf())
            .unwrap_or_else(|| self.root.clone())
    }

    /// Get the absolute output directory path
    pub fn output_dir(&self) -> PathBuf {
        self.root.join(&self.build.out_dir)
    }

    /// Whether `specifier` is provided by the consumer
    pub fn is_external(&self, specifier: &str) -> bool {
        self.bundle.external.iter().any(|e| e == specifier)
    }

    /// Global variable mapped to an external
    pub fn global_for(&self, dependency: &str) -> Option<&str> {
        self.bundle.globals.get(dependency).map(|s| s.as_str())
    }

    /// Value substituted for `[name]` in the file name template
    pub fn file_base_name(&self) -> String {
        match self.library.name.as_deref().map(str::trim) {
            Some(name) if !name.is_empty() => name.to_kebab_case(),
            _ => Path::new(&self.library.entry)
                .file_stem()
                .map(|s| s.to_string_lossy().to_string())
                .unwrap_or_else(|| "index".to_string()),
        }
    }

    /// Resolve the output file name for `format`
    pub fn output_file_name(&self, format: Format) -> String {
        self.library
            .file_name
            .replace("[name]", &self.file_base_name())
            .replace("[format]", format.as_str())
    }
}
