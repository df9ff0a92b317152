//! Line-granular source maps
//!
//! Every transform in the pipeline preserves or explicitly tracks line
//! boundaries, so maps are kept as "generated line -> original line" tables
//! and only encoded to the v3 JSON format when an artifact is written.

mod vlq;

use serde::Serialize;

pub use vlq::encode_vlq;

/// Maps each generated line to a line of a single original source (0-based)
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct LineMap {
    lines: Vec<Option<u32>>,
}

impl LineMap {
    /// Map every line of `code` to the same line of its source
    pub fn identity(code: &str) -> Self {
        let count = line_count(code);
        Self {
            lines: (0..count as u32).map(Some).collect(),
        }
    }

    pub fn from_lines(lines: Vec<Option<u32>>) -> Self {
        Self { lines }
    }

    /// Original line for generated `line`
    pub fn lookup(&self, line: usize) -> Option<u32> {
        self.lines.get(line).copied().flatten()
    }

    /// Chain this map (final -> intermediate) onto `earlier` (intermediate -> original)
    pub fn compose(&self, earlier: &LineMap) -> LineMap {
        LineMap {
            lines: self
                .lines
                .iter()
                .map(|line| line.and_then(|l| earlier.lookup(l as usize)))
                .collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}

/// Number of lines in `code`, counting a trailing partial line
pub fn line_count(code: &str) -> usize {
    code.split('\n').count()
}

/// Builds generated code line by line, recording where each line came from
#[derive(Debug, Default)]
pub struct LineBuilder {
    code: String,
    lines: Vec<Option<u32>>,
}

impl LineBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `text`; its k-th line maps to original line `first_line + k`
    pub fn push_mapped(&mut self, text: &str, first_line: u32) {
        for (k, line) in text.split('\n').enumerate() {
            self.push_line(line, Some(first_line + k as u32));
        }
    }

    /// Append `text` with every line unmapped
    pub fn push_unmapped(&mut self, text: &str) {
        for line in text.split('\n') {
            self.push_line(line, None);
        }
    }

    pub fn push_line(&mut self, line: &str, original: Option<u32>) {
        self.code.push_str(line);
        self.code.push('\n');
        self.lines.push(original);
    }

    pub fn finish(self) -> (String, LineMap) {
        (self.code, LineMap::from_lines(self.lines))
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RawSourceMap<'a> {
    version: u8,
    file: &'a str,
    sources: &'a [String],
    sources_content: &'a [Option<String>],
    names: [&'a str; 0],
    mappings: String,
}

/// Accumulates generated lines and encodes a v3 source map
#[derive(Debug, Default)]
pub struct SourceMapBuilder {
    file: String,
    sources: Vec<String>,
    contents: Vec<Option<String>>,
    lines: Vec<Option<(u32, u32)>>,
}

impl SourceMapBuilder {
    pub fn new(file: impl Into<String>) -> Self {
        Self {
            file: file.into(),
            ..Default::default()
        }
    }

    /// Register an original source, returning its index
    pub fn add_source(&mut self, name: impl Into<String>, content: Option<String>) -> u32 {
        self.sources.push(name.into());
        self.contents.push(content);
        (self.sources.len() - 1) as u32
    }

    /// Record the mapping of the next generated line
    pub fn push_line(&mut self, mapping: Option<(u32, u32)>) {
        self.lines.push(mapping);
    }

    /// Record `count` generated lines with no original
    pub fn push_unmapped(&mut self, count: usize) {
        self.lines.extend(std::iter::repeat(None).take(count));
    }

    pub fn line_count(&self) -> usize {
        self.lines.len()
    }

    /// Encode the `mappings` field
    pub fn mappings(&self) -> String {
        let mut out = String::new();
        let mut prev_source: i64 = 0;
        let mut prev_line: i64 = 0;

        for (index, mapping) in self.lines.iter().enumerate() {
            if index > 0 {
                out.push(';');
            }
            if let Some((source, line)) = mapping {
                // generated column, source index, original line, original column
                encode_vlq(0, &mut out);
                encode_vlq(*source as i64 - prev_source, &mut out);
                encode_vlq(*line as i64 - prev_line, &mut out);
                encode_vlq(0, &mut out);
                prev_source = *source as i64;
                prev_line = *line as i64;
            }
        }

        out
    }

    pub fn to_json(&self) -> String {
        let raw = RawSourceMap {
            version: 3,
            file: &self.file,
            sources: &self.sources,
            sources_content: &self.contents,
            names: [],
            mappings: self.mappings(),
        };
        serde_json::to_string(&raw).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_mappings() {
        let mut builder = SourceMapBuilder::new("out.js");
        let src = builder.add_source("a.ts", None);
        for line in 0..3 {
            builder.push_line(Some((src, line)));
        }
        assert_eq!(builder.mappings(), "AAAA;AACA;AACA");
    }

    #[test]
    fn test_unmapped_lines_and_second_source() {
        let mut builder = SourceMapBuilder::new("out.js");
        let a = builder.add_source("a.ts", None);
        let b = builder.add_source("b.ts", None);
        builder.push_unmapped(1);
        builder.push_line(Some((a, 4)));
        builder.push_line(Some((b, 0)));
        assert_eq!(builder.mappings(), ";AAIA;ACJA");
    }

    #[test]
    fn test_json_shape() {
        let mut builder = SourceMapBuilder::new("lib.es.js");
        let src = builder.add_source("../src/index.ts", Some("export {};".to_string()));
        builder.push_line(Some((src, 0)));

        let value: serde_json::Value = serde_json::from_str(&builder.to_json()).unwrap();
        assert_eq!(value["version"], 3);
        assert_eq!(value["file"], "lib.es.js");
        assert_eq!(value["sources"][0], "../src/index.ts");
        assert_eq!(value["sourcesContent"][0], "export {};");
        assert_eq!(value["mappings"], "AAAA");
    }

    #[test]
    fn test_line_builder() {
        let mut builder = LineBuilder::new();
        builder.push_unmapped("// header");
        builder.push_mapped("a\nb", 4);
        let (code, map) = builder.finish();
        assert_eq!(code, "// header\na\nb\n");
        assert_eq!(map.lookup(0), None);
        assert_eq!(map.lookup(1), Some(4));
        assert_eq!(map.lookup(2), Some(5));
    }

    #[test]
    fn test_compose() {
        // final line 0 -> intermediate 1 -> original 7
        let later = LineMap::from_lines(vec![Some(1), None, Some(0)]);
        let earlier = LineMap::from_lines(vec![Some(3), Some(7)]);
        let composed = later.compose(&earlier);
        assert_eq!(composed.lookup(0), Some(7));
        assert_eq!(composed.lookup(1), None);
        assert_eq!(composed.lookup(2), Some(3));
    }

    #[test]
    fn test_identity_counts_trailing_line() {
        let map = LineMap::identity("a\nb\n");
        assert_eq!(map.len(), 3);
        assert_eq!(map.lookup(1), Some(1));
    }
}
