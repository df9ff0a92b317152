//! Command-line interface for libpack
//!
//! Provides the main CLI structure using clap with subcommands for:
//! - `build`: Library build, optionally watching for changes
//! - `init`: Library project scaffolding

mod build;
mod init;

use anyhow::Result;
use clap::{Parser, Subcommand};
use colored::Colorize;

pub use build::{print_summary, BuildCommand, BuildOptions};
pub use init::InitCommand;

use crate::config::CONFIG_FILE;

/// libpack - package component libraries as ES, CommonJS, UMD and IIFE bundles
#[derive(Parser, Debug)]
#[command(name = "libpack")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to libpack.toml config file
    #[arg(short, long, global = true, default_value = CONFIG_FILE, env = "LIBPACK_CONFIG")]
    pub config: String,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Build the library
    Build(BuildCommand),

    /// Initialize a new library project
    Init(InitCommand),
}

impl Cli {
    /// Execute the CLI command
    pub async fn execute(&self) -> Result<()> {
        print_banner();

        match &self.command {
            Commands::Build(cmd) => cmd.execute(&self.config).await,
            Commands::Init(cmd) => cmd.execute().await,
        }
    }
}

/// Print the libpack banner
fn print_banner() {
    eprintln!(
        "\n{} {} {}\n",
        "📦".cyan(),
        "libpack".bold().cyan(),
        format!("v{}", env!("CARGO_PKG_VERSION")).dimmed()
    );
}
