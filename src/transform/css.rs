//! Stylesheet processing via lightningcss

use anyhow::{anyhow, Result};
use lightningcss::stylesheet::{MinifyOptions, ParserOptions, PrinterOptions, StyleSheet};

/// Parse, optionally minify, and print a stylesheet
pub fn process_css(source: &str, filename: &str, minify: bool) -> Result<String> {
    let mut stylesheet = StyleSheet::parse(
        source,
        ParserOptions {
            filename: filename.to_string(),
            ..ParserOptions::default()
        },
    )
    .map_err(|e| anyhow!("Failed to parse CSS in {}: {}", filename, e))?;

    if minify {
        stylesheet
            .minify(MinifyOptions::default())
            .map_err(|e| anyhow!("Failed to minify CSS in {}: {}", filename, e))?;
    }

    let result = stylesheet
        .to_css(PrinterOptions {
            minify,
            ..PrinterOptions::default()
        })
        .map_err(|e| anyhow!("Failed to print CSS for {}: {}", filename, e))?;

    Ok(result.code)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_process_css() {
        let css = ".pagination   { display: flex; }\n.page-item.active { color: red }";
        let out = process_css(css, "style.css", false).unwrap();
        assert!(out.contains(".pagination"));
        assert!(out.contains("display: flex"));

        let min = process_css(css, "style.css", true).unwrap();
        assert!(min.contains(".pagination{display:flex}"));
        assert!(min.len() < out.len());
    }
}
