//! Build command implementation

use std::path::PathBuf;

use anyhow::Result;
use clap::Args;
use colored::Colorize;
use tracing::info;

use crate::bundler::{BuildResult, Bundler};
use crate::config::{Config, Format, SourceMapMode};
use crate::utils::{format_duration, format_size};
use crate::watch;

/// Build the library
#[derive(Args, Debug)]
pub struct BuildCommand {
    /// Output directory
    #[arg(short, long)]
    pub outdir: Option<PathBuf>,

    /// Output format; repeat to build several (defaults to library.formats)
    #[arg(short, long = "format", value_enum)]
    pub formats: Vec<Format>,

    /// Source maps: true, false, inline or hidden
    #[arg(long)]
    pub sourcemap: Option<SourceMapMode>,

    /// Enable minification
    #[arg(short, long)]
    pub minify: bool,

    /// Rebuild when sources change
    #[arg(short, long)]
    pub watch: bool,
}

impl BuildCommand {
    pub async fn execute(&self, config_path: &str) -> Result<()> {
        if self.watch {
            return watch::watch(config_path, self.into()).await;
        }

        info!("Loading configuration from {}", config_path);
        let config = Config::load(config_path)?;

        eprintln!("{} Building library...", "→".blue());

        let bundler = Bundler::new(config, self.into())?;
        let result = bundler.build().await?;
        print_summary(&result);

        Ok(())
    }
}

/// Print the written files with their sizes
pub fn print_summary(result: &BuildResult) {
    eprintln!(
        "\n{} Built {} bundle(s) in {}\n",
        "✓".green().bold(),
        result.artifacts.len(),
        format_duration(result.duration)
    );

    for artifact in &result.artifacts {
        eprintln!(
            "  {} {} {} {}",
            "•".dimmed(),
            artifact.output_path.display().to_string().cyan(),
            format_size(artifact.size).dimmed(),
            format!("({})", artifact.format).dimmed()
        );
    }
    for asset in &result.assets {
        eprintln!(
            "  {} {} {}",
            "·".dimmed(),
            asset.output_path.display().to_string().dimmed(),
            format_size(asset.size).dimmed()
        );
    }

    if let Some(artifact) = result.artifacts.first() {
        if !artifact.externals.is_empty() {
            eprintln!("\n  {} {}", "external:".dimmed(), artifact.externals.join(", ").yellow());
        }
    }

    eprintln!();
}

/// Build options derived from command arguments
#[derive(Debug, Clone, Default)]
pub struct BuildOptions {
    pub outdir: Option<PathBuf>,
    /// Replaces library.formats when non-empty
    pub formats: Vec<Format>,
    pub sourcemap: Option<SourceMapMode>,
    pub minify: bool,
}

impl From<&BuildCommand> for BuildOptions {
    fn from(cmd: &BuildCommand) -> Self {
        Self {
            outdir: cmd.outdir.clone(),
            formats: cmd.formats.clone(),
            sourcemap: cmd.sourcemap,
            minify: cmd.minify,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::{Cli, Commands};
    use clap::Parser;

    #[test]
    fn test_build_flags() {
        let cli = Cli::parse_from([
            "libpack", "build", "--format", "es", "-f", "cjs", "--sourcemap", "inline", "--minify",
        ]);
        let cmd = match cli.command {
            Commands::Build(cmd) => cmd,
            other => panic!("unexpected command: {:?}", other),
        };
        let options = BuildOptions::from(&cmd);
        assert_eq!(options.formats, vec![Format::Es, Format::Cjs]);
        assert_eq!(options.sourcemap, Some(SourceMapMode::Inline));
        assert!(options.minify);
        assert!(!cmd.watch);
        assert_eq!(cli.config, "libpack.toml");
    }

    #[test]
    fn test_bad_sourcemap_mode_is_rejected() {
        assert!(Cli::try_parse_from(["libpack", "build", "--sourcemap", "sideways"]).is_err());
    }
}
