//! Code transformation
//!
//! Built-in transforms applied after the plugin chain: TypeScript
//! stripping, JSON and CSS modules, and optional minification. Every
//! transform here preserves line boundaries.

pub mod css;
pub mod lexer;
pub mod minify;
pub mod typescript;

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::debug;

use crate::bundler::ModuleType;
use crate::config::Config;
use crate::error::BuildError;

pub use css::process_css;
pub use minify::minify_js;
pub use typescript::strip_types;

/// Output of the built-in transform
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransformOutput {
    /// JavaScript module code
    pub code: String,

    /// Stylesheet contributed to the bundle's CSS asset
    pub css: Option<String>,
}

impl TransformOutput {
    fn code(code: String) -> Self {
        Self { code, css: None }
    }
}

/// Built-in code transformer
pub struct Transformer {
    /// Project configuration
    config: Arc<Config>,
}

impl Transformer {
    /// Create a new transformer
    pub fn new(config: Arc<Config>) -> Result<Self> {
        Ok(Self { config })
    }

    /// Transform source code based on module type
    pub fn transform(
        &self,
        source: &str,
        path: &Path,
        module_type: &ModuleType,
    ) -> Result<TransformOutput> {
        let output = match module_type {
            ModuleType::JavaScript => TransformOutput::code(source.to_string()),
            ModuleType::TypeScript => self.transform_typescript(source, path)?,
            ModuleType::Css => self.transform_css(source, path),
            ModuleType::Json => self.transform_json(source, path)?,
            ModuleType::Vue | ModuleType::Unknown => {
                return Err(BuildError::UnsupportedModule(path.to_path_buf()).into());
            }
        };

        if self.config.build.minify && output.css.is_none() {
            return Ok(TransformOutput::code(minify_js(&output.code)));
        }

        Ok(output)
    }

    /// Transform TypeScript to JavaScript
    fn transform_typescript(&self, source: &str, path: &Path) -> Result<TransformOutput> {
        debug!("Stripping types: {}", path.display());

        let code = strip_types(source)
            .with_context(|| format!("Failed to strip types from {}", path.display()))?;

        Ok(TransformOutput::code(code))
    }

    /// Collect CSS for the stylesheet asset; the module itself is empty
    fn transform_css(&self, source: &str, path: &Path) -> TransformOutput {
        debug!("Collecting CSS: {}", path.display());

        TransformOutput {
            code: String::new(),
            css: Some(source.to_string()),
        }
    }

    /// Transform JSON to an ES module
    fn transform_json(&self, source: &str, path: &Path) -> Result<TransformOutput> {
        debug!("Transforming JSON: {}", path.display());

        // Validate JSON
        serde_json::from_str::<serde_json::Value>(source)
            .with_context(|| format!("Invalid JSON in {}", path.display()))?;

        Ok(TransformOutput::code(format!("export default {};", source.trim_end())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn transformer(minify: bool) -> (TempDir, Transformer) {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("src")).unwrap();
        fs::write(dir.path().join("src/index.ts"), "export {};").unwrap();
        let mut config = Config::from_toml_str(
            "[library]\nentry = \"src/index.ts\"\nformats = [\"es\"]\n",
            dir.path().to_path_buf(),
        )
        .unwrap();
        config.build.minify = minify;
        (dir, Transformer::new(Arc::new(config)).unwrap())
    }

    #[test]
    fn test_transform_json() {
        let (_dir, transformer) = transformer(false);
        let json = r#"{"key": "value", "num": 42}"#;
        let result = transformer
            .transform(json, Path::new("test.json"), &ModuleType::Json)
            .unwrap();

        assert!(result.code.starts_with("export default {"));
        assert!(result.css.is_none());
        assert!(transformer
            .transform("{oops", Path::new("bad.json"), &ModuleType::Json)
            .is_err());
    }

    #[test]
    fn test_transform_css_is_collected() {
        let (_dir, transformer) = transformer(true);
        let css = "body { color: red; }";
        let result = transformer
            .transform(css, Path::new("test.css"), &ModuleType::Css)
            .unwrap();

        assert_eq!(result.code, "");
        assert_eq!(result.css.as_deref(), Some(css));
    }

    #[test]
    fn test_transform_typescript_then_minify() {
        let (_dir, transformer) = transformer(true);
        let result = transformer
            .transform(
                "export const size: number = 10; // default\n",
                Path::new("a.ts"),
                &ModuleType::TypeScript,
            )
            .unwrap();
        assert_eq!(result.code, "export const size=10;\n");
    }

    #[test]
    fn test_unknown_module_is_rejected() {
        let (_dir, transformer) = transformer(false);
        let err = transformer
            .transform("", &PathBuf::from("logo.png"), &ModuleType::Unknown)
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<BuildError>(),
            Some(BuildError::UnsupportedModule(_))
        ));
    }
}
