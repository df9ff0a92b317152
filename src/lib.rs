//! libpack library
//!
//! Core functionality for the libpack build tool: config loading, module
//! graph construction, plugin transforms and bundle rendering.

pub mod bundler;
pub mod cli;
pub mod config;
pub mod error;
pub mod plugins;
pub mod resolver;
pub mod sourcemap;
pub mod transform;
pub mod utils;
pub mod watch;

pub use bundler::{BuildResult, Bundler};
pub use cli::{BuildOptions, Cli};
pub use config::Config;
pub use error::BuildError;
