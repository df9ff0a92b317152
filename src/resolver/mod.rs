//! Module resolution
//!
//! Handles resolving import specifiers to actual file paths.

use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::debug;

use crate::config::Config;

/// Extensions tried, in order, for extensionless specifiers
const EXTENSIONS: &[&str] = &["ts", "js", "mjs", "vue", "json", "css"];

/// Module resolver
pub struct Resolver {
    /// Project configuration
    config: Arc<Config>,
}

impl Resolver {
    /// Create a new resolver
    pub fn new(config: Arc<Config>) -> Self {
        Self { config }
    }

    /// Whether the specifier is a configured external
    pub fn is_external(&self, specifier: &str) -> bool {
        self.config.is_external(specifier)
    }

    /// Resolve an import specifier to an absolute file path
    pub fn resolve(&self, specifier: &str, from: &Path) -> Result<Option<PathBuf>> {
        debug!("Resolving '{}' from '{}'", specifier, from.display());

        // Virtual ids carry a query after the file name
        let importer = from.to_string_lossy();
        let importer = Path::new(importer.split('?').next().unwrap_or_default());
        let base_dir = importer.parent().unwrap_or(Path::new("."));

        let resolved = if is_path_specifier(specifier) {
            self.resolve_relative(specifier, base_dir)
        } else {
            self.resolve_bare(specifier, base_dir)?
        };

        debug!("Resolved to: {:?}", resolved);

        Ok(resolved)
    }

    /// Resolve a relative or absolute import
    fn resolve_relative(&self, specifier: &str, base_dir: &Path) -> Option<PathBuf> {
        let target = base_dir.join(specifier);

        // Try exact path first
        if target.is_file() {
            return Some(target);
        }

        // Try adding extensions
        for ext in EXTENSIONS {
            let with_ext = append_extension(&target, ext);
            if with_ext.is_file() {
                return Some(with_ext);
            }
        }

        // `./pages.js` written against a `pages.ts` source
        if target.extension().map(|e| e == "js").unwrap_or(false) {
            let ts = target.with_extension("ts");
            if ts.is_file() {
                return Some(ts);
            }
        }

        // Try as directory with index file
        if target.is_dir() {
            for ext in EXTENSIONS {
                let index = target.join(format!("index.{}", ext));
                if index.is_file() {
                    return Some(index);
                }
            }
        }

        None
    }

    /// Resolve a bare import (from node_modules)
    fn resolve_bare(&self, specifier: &str, from: &Path) -> Result<Option<PathBuf>> {
        let mut current = from.to_path_buf();

        // Walk up directory tree looking for node_modules
        loop {
            let node_modules = current.join("node_modules");

            if node_modules.is_dir() {
                if let Some(resolved) = self.resolve_in_node_modules(&node_modules, specifier)? {
                    return Ok(Some(resolved));
                }
            }

            if !current.pop() {
                break;
            }
        }

        Ok(None)
    }

    /// Resolve a module within a node_modules directory
    fn resolve_in_node_modules(&self, node_modules: &Path, specifier: &str) -> Result<Option<PathBuf>> {
        let (package_name, subpath) = split_package(specifier);
        let package_dir = node_modules.join(&package_name);

        if !package_dir.is_dir() {
            return Ok(None);
        }

        if let Some(sub) = subpath {
            return Ok(self.resolve_relative(&sub, &package_dir));
        }

        // Otherwise, look at package.json for module/main entry
        let package_json = package_dir.join("package.json");

        if package_json.is_file() {
            let content = fs::read_to_string(&package_json)
                .with_context(|| format!("Failed to read {}", package_json.display()))?;
            let pkg: serde_json::Value = serde_json::from_str(&content)
                .with_context(|| format!("Failed to parse {}", package_json.display()))?;

            // ES entry first
            if let Some(module) = pkg.get("module").and_then(|v| v.as_str()) {
                let module_path = package_dir.join(module);
                if module_path.is_file() {
                    return Ok(Some(module_path));
                }
            }

            if let Some(main) = pkg.get("main").and_then(|v| v.as_str()) {
                if let Some(resolved) = self.resolve_relative(main, &package_dir) {
                    return Ok(Some(resolved));
                }
            }
        }

        Ok(self.resolve_relative("index.js", &package_dir))
    }
}

fn is_path_specifier(specifier: &str) -> bool {
    specifier.starts_with("./")
        || specifier.starts_with("../")
        || specifier == "."
        || specifier == ".."
        || Path::new(specifier).is_absolute()
}

/// Split `@scope/name/sub` or `name/sub` into package name and subpath
fn split_package(specifier: &str) -> (String, Option<String>) {
    if specifier.starts_with('@') {
        let parts: Vec<&str> = specifier.splitn(3, '/').collect();
        if parts.len() < 2 {
            return (specifier.to_string(), None);
        }
        (format!("{}/{}", parts[0], parts[1]), parts.get(2).map(|s| s.to_string()))
    } else {
        let parts: Vec<&str> = specifier.splitn(2, '/').collect();
        (parts[0].to_string(), parts.get(1).map(|s| s.to_string()))
    }
}

fn append_extension(path: &Path, ext: &str) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(".");
    name.push(ext);
    PathBuf::from(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn project() -> (TempDir, Resolver) {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join("src/components")).unwrap();
        fs::create_dir_all(root.join("src/util")).unwrap();
        fs::write(root.join("src/index.ts"), "").unwrap();
        fs::write(root.join("src/components/Paginate.vue"), "").unwrap();
        fs::write(root.join("src/util/pages.ts"), "").unwrap();
        fs::write(root.join("src/util/index.ts"), "").unwrap();
        fs::write(root.join("src/data.v1.json"), "{}").unwrap();

        let config = Config::from_toml_str(
            "[library]\nentry = \"src/index.ts\"\nformats = [\"es\"]\n[bundle]\nexternal = [\"vue\"]\n",
            root.to_path_buf(),
        )
        .unwrap();
        (dir, Resolver::new(Arc::new(config)))
    }

    #[test]
    fn test_relative_resolution() {
        let (dir, resolver) = project();
        let importer = dir.path().join("src/index.ts");
        let src = dir.path().join("src");

        assert_eq!(
            resolver.resolve("./components/Paginate.vue", &importer).unwrap(),
            Some(src.join("components/Paginate.vue"))
        );
        assert_eq!(
            resolver.resolve("./components/Paginate", &importer).unwrap(),
            Some(src.join("components/Paginate.vue"))
        );
        assert_eq!(resolver.resolve("./util", &importer).unwrap(), Some(src.join("util/index.ts")));
        assert_eq!(
            resolver.resolve("./util/pages.js", &importer).unwrap(),
            Some(src.join("util/pages.ts"))
        );
        assert_eq!(resolver.resolve("./data.v1", &importer).unwrap(), Some(src.join("data.v1.json")));
        assert_eq!(resolver.resolve("./missing", &importer).unwrap(), None);
    }

    #[test]
    fn test_query_on_importer_is_ignored() {
        let (dir, resolver) = project();
        let importer = dir
            .path()
            .join("src/components/Paginate.vue?vue&type=style&index=0&lang.css");
        let resolved = resolver.resolve("../util/pages", &importer).unwrap().unwrap();
        assert_eq!(
            resolved.canonicalize().unwrap(),
            dir.path().join("src/util/pages.ts").canonicalize().unwrap()
        );
    }

    #[test]
    fn test_node_modules_lookup() {
        let (dir, resolver) = project();
        let pkg = dir.path().join("node_modules/pager-core");
        fs::create_dir_all(pkg.join("dist")).unwrap();
        fs::write(
            pkg.join("package.json"),
            r#"{ "main": "dist/index.cjs", "module": "dist/index.mjs" }"#,
        )
        .unwrap();
        fs::write(pkg.join("dist/index.mjs"), "export default 1").unwrap();

        let importer = dir.path().join("src/components/Paginate.vue");
        assert_eq!(
            resolver.resolve("pager-core", &importer).unwrap(),
            Some(pkg.join("dist/index.mjs"))
        );
        assert_eq!(resolver.resolve("not-installed", &importer).unwrap(), None);
        assert!(resolver.is_external("vue"));
        assert!(!resolver.is_external("vue/dist/vue.esm-bundler.js"));
    }

    #[test]
    fn test_split_package() {
        assert_eq!(split_package("vue"), ("vue".to_string(), None));
        assert_eq!(
            split_package("@scope/pkg/sub/file"),
            ("@scope/pkg".to_string(), Some("sub/file".to_string()))
        );
    }
}
