//! Utility functions and helpers

use std::path::Path;

use sha2::{Digest, Sha256};

/// Generate a hash of the given content
pub fn hash_content(content: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content);
    let result = hasher.finalize();
    hex::encode(&result[..8])
}

/// Check if a path is within a directory
pub fn is_subpath(path: &Path, base: &Path) -> bool {
    let base = match base.canonicalize() {
        Ok(b) => b,
        Err(_) => return false,
    };
    match path.canonicalize() {
        Ok(p) => p.starts_with(&base),
        // Not created yet: compare the lexical form under the canonical base
        Err(_) => path.starts_with(&base),
    }
}

/// Get relative path from base to target, with forward slashes
pub fn relative_path(from: &Path, to: &Path) -> Option<String> {
    pathdiff::diff_paths(to, from).map(|p| path_to_module_id(&p))
}

/// Convert a file path to a module ID
pub fn path_to_module_id(path: &Path) -> String {
    path.display().to_string().replace('\\', "/")
}

/// Whether `name` can be used as a plain JavaScript binding
pub fn is_js_identifier(name: &str) -> bool {
    const RESERVED: &[&str] = &[
        "break", "case", "catch", "class", "const", "continue", "debugger", "default", "delete",
        "do", "else", "export", "extends", "false", "finally", "for", "function", "if", "import",
        "in", "instanceof", "new", "null", "return", "super", "switch", "this", "throw", "true",
        "try", "typeof", "var", "void", "while", "with", "yield", "let", "static", "enum",
        "await",
    ];

    let mut chars = name.chars();
    let first_ok = chars
        .next()
        .map(|c| c == '_' || c == '$' || c.is_alphabetic())
        .unwrap_or(false);

    first_ok
        && chars.all(|c| c == '_' || c == '$' || c.is_alphanumeric())
        && !RESERVED.contains(&name)
}

/// Quote a string as a JavaScript string literal
pub fn js_string(value: &str) -> String {
    // JSON strings are valid JS string literals apart from U+2028/U+2029
    serde_json::to_string(value)
        .unwrap_or_else(|_| format!("\"{}\"", value))
        .replace('\u{2028}', "\\u2028")
        .replace('\u{2029}', "\\u2029")
}

/// Property access on `object`, bracketed when `key` is not an identifier
pub fn property_access(object: &str, key: &str) -> String {
    if is_js_identifier(key) {
        format!("{}.{}", object, key)
    } else {
        format!("{}[{}]", object, js_string(key))
    }
}

/// Format bytes as human-readable size
pub fn format_size(bytes: usize) -> String {
    const KB: usize = 1024;
    const MB: usize = KB * 1024;
    const GB: usize = MB * 1024;

    if bytes >= GB {
        format!("{:.2} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}

/// Format duration as human-readable string
pub fn format_duration(duration: std::time::Duration) -> String {
    let secs = duration.as_secs_f64();

    if secs >= 60.0 {
        let mins = (secs / 60.0).floor() as u64;
        let remaining_secs = secs - (mins as f64 * 60.0);
        format!("{}m {:.2}s", mins, remaining_secs)
    } else if secs >= 1.0 {
        format!("{:.2}s", secs)
    } else {
        format!("{:.0}ms", secs * 1000.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_content() {
        let hash = hash_content(b"hello world");
        assert_eq!(hash.len(), 16);
        assert_eq!(hash, hash_content(b"hello world"));
        assert_ne!(hash, hash_content(b"hello world!"));
    }

    #[test]
    fn test_identifiers() {
        assert!(is_js_identifier("Vue"));
        assert!(is_js_identifier("$store"));
        assert!(is_js_identifier("_private1"));
        assert!(!is_js_identifier("Vue3-Bootstrap-Paginate"));
        assert!(!is_js_identifier("3d"));
        assert!(!is_js_identifier(""));
        assert!(!is_js_identifier("default"));
    }

    #[test]
    fn test_property_access() {
        assert_eq!(property_access("global", "Vue"), "global.Vue");
        assert_eq!(
            property_access("global", "Vue3-Bootstrap-Paginate"),
            "global[\"Vue3-Bootstrap-Paginate\"]"
        );
    }

    #[test]
    fn test_relative_path() {
        assert_eq!(
            relative_path(Path::new("/p/dist/components"), Path::new("/p/src/components/A.vue")),
            Some("../../src/components/A.vue".to_string())
        );
    }

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(512), "512 B");
        assert_eq!(format_size(1024), "1.00 KB");
        assert_eq!(format_size(1536), "1.50 KB");
        assert_eq!(format_size(1048576), "1.00 MB");
    }

    #[test]
    fn test_format_duration() {
        use std::time::Duration;

        assert_eq!(format_duration(Duration::from_millis(500)), "500ms");
        assert_eq!(format_duration(Duration::from_secs_f64(1.5)), "1.50s");
        assert_eq!(format_duration(Duration::from_secs(65)), "1m 5.00s");
    }
}
