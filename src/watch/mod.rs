//! Watch mode
//!
//! Rebuilds the library whenever a source file under the project root
//! changes. Every rebuild reloads libpack.toml, so config edits apply
//! without restarting.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Result;
use colored::Colorize;
use notify::RecursiveMode;
use notify_debouncer_mini::{new_debouncer, DebounceEventResult};
use tokio::sync::mpsc;
use tracing::{debug, error, info};

use crate::bundler::{BuildResult, Bundler};
use crate::cli::{print_summary, BuildOptions};
use crate::config::Config;
use crate::utils::is_subpath;

const DEBOUNCE: Duration = Duration::from_millis(100);

/// Extensions whose changes trigger a rebuild
const WATCHED_EXTENSIONS: &[&str] = &["ts", "js", "mjs", "vue", "css", "json", "toml"];

/// Build once, then rebuild on every relevant change until interrupted
pub async fn watch(config_path: &str, options: BuildOptions) -> Result<()> {
    let config = Config::load(config_path)?;
    let root = config.root.clone();
    let mut ignored = ignored_dirs(&config, &options);

    rebuild(config_path, &options, &mut ignored).await;

    let (tx, mut rx) = mpsc::unbounded_channel();
    let mut debouncer = new_debouncer(DEBOUNCE, move |result: DebounceEventResult| {
        let _ = tx.send(result);
    })?;
    debouncer.watcher().watch(&root, RecursiveMode::Recursive)?;

    info!("Watching {}", root.display());
    eprintln!("{} Watching for changes...\n", "→".blue());

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                debug!("Interrupted, stopping watcher");
                break;
            }
            event = rx.recv() => match event {
                Some(Ok(events)) => {
                    let mut changed: Vec<PathBuf> = events
                        .into_iter()
                        .map(|e| e.path)
                        .filter(|p| should_rebuild(p, &ignored))
                        .collect();
                    changed.sort();
                    changed.dedup();

                    if changed.is_empty() {
                        continue;
                    }

                    for path in &changed {
                        eprintln!(
                            "  {} File changed: {}",
                            "↻".yellow(),
                            path.display().to_string().dimmed()
                        );
                    }
                    rebuild(config_path, &options, &mut ignored).await;
                }
                Some(Err(e)) => error!("Watch error: {:?}", e),
                None => break,
            }
        }
    }

    Ok(())
}

/// Run one build; failures are reported and the watcher keeps going
async fn rebuild(config_path: &str, options: &BuildOptions, ignored: &mut Vec<PathBuf>) {
    match build_once(config_path, options, ignored).await {
        Ok(result) => print_summary(&result),
        Err(e) => {
            error!("Build failed: {:#}", e);
            eprintln!("{} {:#}\n", "✗".red().bold(), e);
        }
    }
}

async fn build_once(
    config_path: &str,
    options: &BuildOptions,
    ignored: &mut Vec<PathBuf>,
) -> Result<BuildResult> {
    let config = Config::load(config_path)?;
    *ignored = ignored_dirs(&config, options);
    Bundler::new(config, options.clone())?.build().await
}

/// Directories whose contents never trigger a rebuild
fn ignored_dirs(config: &Config, options: &BuildOptions) -> Vec<PathBuf> {
    let out_dir = match &options.outdir {
        Some(dir) => config.root.join(dir),
        None => config.output_dir(),
    };
    vec![out_dir, config.root.join("node_modules")]
}

fn should_rebuild(path: &Path, ignored: &[PathBuf]) -> bool {
    let watched = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|ext| WATCHED_EXTENSIONS.contains(&ext))
        .unwrap_or(false);

    watched && !ignored.iter().any(|dir| path.starts_with(dir) || is_subpath(path, dir))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_should_rebuild() {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join("dist")).unwrap();
        fs::create_dir_all(root.join("src")).unwrap();
        let ignored = vec![root.join("dist"), root.join("node_modules")];

        assert!(should_rebuild(&root.join("src/Paginate.vue"), &ignored));
        assert!(should_rebuild(&root.join("libpack.toml"), &ignored));
        assert!(!should_rebuild(&root.join("src/notes.md"), &ignored));
        assert!(!should_rebuild(&root.join("dist/paginate.es.js"), &ignored));
        assert!(!should_rebuild(&root.join("node_modules/vue/index.js"), &ignored));
    }

    #[test]
    fn test_outdir_override_is_ignored() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("src")).unwrap();
        fs::write(dir.path().join("src/index.ts"), "").unwrap();
        let config = Config::from_toml_str(
            "[library]\nentry = \"src/index.ts\"\nformats = [\"es\"]\n",
            dir.path().to_path_buf(),
        )
        .unwrap();
        let options = BuildOptions {
            outdir: Some(PathBuf::from("lib")),
            ..Default::default()
        };

        let ignored = ignored_dirs(&config, &options);
        assert_eq!(ignored[0], dir.path().join("lib"));
    }
}
