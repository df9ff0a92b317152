//! libpack - a library-mode bundler for single-file UI components
//!
//! Packages a component library into ES, CommonJS, UMD and IIFE bundles
//! while leaving framework dependencies external.
//!
//! # Features
//! - Vue single-file components and TypeScript sources
//! - Extracted, optionally minified stylesheet
//! - Source maps, `.d.ts` declarations and declaration maps
//! - Watch mode

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use libpack_lib::Cli;

/// Initialize the logging/tracing system
fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("libpack_lib=debug"))
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("libpack_lib=info"))
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_tracing(cli.verbose);

    cli.execute().await
}
