//! Configuration schema definitions

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Output module format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Format {
    /// ES module
    Es,
    /// CommonJS
    Cjs,
    /// Universal module definition (CommonJS, AMD or browser global)
    Umd,
    /// Immediately-invoked function assigned to a browser global
    Iife,
}

impl Format {
    pub fn as_str(&self) -> &'static str {
        match self {
            Format::Es => "es",
            Format::Cjs => "cjs",
            Format::Umd => "umd",
            Format::Iife => "iife",
        }
    }

    /// Formats that bind externals through global variables
    pub fn is_global(&self) -> bool {
        matches!(self, Format::Umd | Format::Iife)
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Library entry and naming
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LibraryConfig {
    /// Entry module, relative to the project root
    pub entry: String,

    /// Library name, exposed as the global for umd/iife builds
    #[serde(default)]
    pub name: Option<String>,

    /// Output file name template; supports `[name]` and `[format]`
    #[serde(default = "default_file_name")]
    pub file_name: String,

    /// Formats to build
    #[serde(default = "default_formats")]
    pub formats: Vec<Format>,
}

fn default_file_name() -> String {
    "[name].[format].js".to_string()
}

fn default_formats() -> Vec<Format> {
    vec![Format::Es, Format::Umd]
}

/// How source maps are emitted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "RawSourceMapMode", into = "RawSourceMapMode")]
pub enum SourceMapMode {
    #[default]
    Disabled,
    /// Separate `.map` file referenced by a comment
    External,
    /// Base64 data URL appended to the bundle
    Inline,
    /// Separate `.map` file without the reference comment
    Hidden,
}

impl SourceMapMode {
    pub fn is_enabled(&self) -> bool {
        !matches!(self, SourceMapMode::Disabled)
    }
}

impl FromStr for SourceMapMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "false" | "off" => Ok(SourceMapMode::Disabled),
            "true" | "on" | "external" => Ok(SourceMapMode::External),
            "inline" => Ok(SourceMapMode::Inline),
            "hidden" => Ok(SourceMapMode::Hidden),
            other => Err(format!(
                "unknown sourcemap mode '{}', expected true, false, inline or hidden",
                other
            )),
        }
    }
}

#[derive(Clone, Serialize, Deserialize)]
#[serde(untagged)]
enum RawSourceMapMode {
    Flag(bool),
    Mode(String),
}

impl TryFrom<RawSourceMapMode> for SourceMapMode {
    type Error = String;

    fn try_from(raw: RawSourceMapMode) -> Result<Self, Self::Error> {
        match raw {
            RawSourceMapMode::Flag(true) => Ok(SourceMapMode::External),
            RawSourceMapMode::Flag(false) => Ok(SourceMapMode::Disabled),
            RawSourceMapMode::Mode(mode) => mode.parse(),
        }
    }
}

impl From<SourceMapMode> for RawSourceMapMode {
    fn from(mode: SourceMapMode) -> Self {
        match mode {
            SourceMapMode::Disabled => RawSourceMapMode::Flag(false),
            SourceMapMode::External => RawSourceMapMode::Flag(true),
            SourceMapMode::Inline => RawSourceMapMode::Mode("inline".to_string()),
            SourceMapMode::Hidden => RawSourceMapMode::Mode("hidden".to_string()),
        }
    }
}

/// Output configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildConfig {
    /// Output directory
    #[serde(default = "default_out_dir")]
    pub out_dir: String,

    #[serde(default)]
    pub sourcemap: SourceMapMode,

    #[serde(default)]
    pub minify: bool,

    /// Remove the previous contents of `out_dir` before writing
    #[serde(default = "default_true")]
    pub empty_out_dir: bool,

    /// Generate manifest.json
    #[serde(default)]
    pub manifest: bool,

    /// File name of the extracted stylesheet
    #[serde(default = "default_css_file_name")]
    pub css_file_name: String,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            out_dir: default_out_dir(),
            sourcemap: SourceMapMode::default(),
            minify: false,
            empty_out_dir: true,
            manifest: false,
            css_file_name: default_css_file_name(),
        }
    }
}

fn default_out_dir() -> String {
    "dist".to_string()
}

fn default_css_file_name() -> String {
    "style.css".to_string()
}

fn default_true() -> bool {
    true
}

/// Externalized dependencies
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BundleConfig {
    /// Import specifiers the consumer provides; never bundled
    #[serde(default)]
    pub external: Vec<String>,

    /// Global variable for each external, used by umd/iife builds
    #[serde(default)]
    pub globals: BTreeMap<String, String>,
}

/// Plugin configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PluginConfig {
    /// Plugin name/identifier
    pub name: String,

    /// Plugin-specific options
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<toml::Table>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Deserialize)]
    struct Holder {
        #[serde(default)]
        sourcemap: SourceMapMode,
    }

    #[test]
    fn test_sourcemap_mode_accepts_bool_and_string() {
        let on: Holder = toml::from_str("sourcemap = true").unwrap();
        assert_eq!(on.sourcemap, SourceMapMode::External);

        let off: Holder = toml::from_str("sourcemap = false").unwrap();
        assert_eq!(off.sourcemap, SourceMapMode::Disabled);

        let inline: Holder = toml::from_str("sourcemap = \"inline\"").unwrap();
        assert_eq!(inline.sourcemap, SourceMapMode::Inline);

        let missing: Holder = toml::from_str("").unwrap();
        assert_eq!(missing.sourcemap, SourceMapMode::Disabled);

        assert!(toml::from_str::<Holder>("sourcemap = \"sideways\"").is_err());
    }

    #[test]
    fn test_global_formats() {
        assert!(Format::Umd.is_global());
        assert!(Format::Iife.is_global());
        assert!(!Format::Es.is_global());
        assert!(!Format::Cjs.is_global());
        assert_eq!(Format::Umd.to_string(), "umd");
    }
}
