//! Build error kinds
//!
//! Every variant is fatal to the build invocation. Functions return
//! `anyhow::Result`, so callers that need to branch on the kind use
//! `err.downcast_ref::<BuildError>()`.

use std::path::PathBuf;

use thiserror::Error;

use crate::config::Format;

#[derive(Debug, Error)]
pub enum BuildError {
    // Resolution failures
    #[error("entry module not found: {}", .0.display())]
    EntryNotFound(PathBuf),

    #[error("could not resolve '{specifier}' imported by {}", .importer.display())]
    UnresolvedImport { specifier: String, importer: PathBuf },

    #[error("no loader for {}", .0.display())]
    UnsupportedModule(PathBuf),

    // Configuration failures
    #[error(
        "external dependency '{dependency}' has no global variable name for the {format} build; \
         add it to [bundle.globals]"
    )]
    MissingGlobal { dependency: String, format: Format },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    // Plugin failures
    #[error("[{plugin}] failed to transform {}: {message}", .id.display())]
    Plugin {
        plugin: String,
        id: PathBuf,
        message: String,
    },
}

impl BuildError {
    pub fn invalid_config(message: impl Into<String>) -> Self {
        BuildError::InvalidConfig(message.into())
    }

    /// Whether this error comes from a missing file or module.
    pub fn is_resolution_failure(&self) -> bool {
        matches!(
            self,
            BuildError::EntryNotFound(_)
                | BuildError::UnresolvedImport { .. }
                | BuildError::UnsupportedModule(_)
        )
    }

    /// Whether this error comes from an invalid configuration.
    pub fn is_configuration_failure(&self) -> bool {
        matches!(
            self,
            BuildError::MissingGlobal { .. } | BuildError::InvalidConfig(_)
        )
    }
}
