//! Single-file component block parser
//!
//! Splits a `.vue` file into its top-level `<template>`, `<script>` and
//! `<style>` blocks. Block contents are kept as slices of the source so
//! their line numbers can be mapped back.

use anyhow::{bail, Result};
use once_cell::sync::Lazy;
use regex::Regex;

static ATTR_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"([A-Za-z_:@#][\w:.\-]*)(?:\s*=\s*(?:"([^"]*)"|'([^']*)'|([^\s"'>/=]+)))?"#)
        .expect("attribute pattern is valid")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockKind {
    Template,
    Script,
    Style,
}

impl BlockKind {
    fn tag(&self) -> &'static str {
        match self {
            BlockKind::Template => "template",
            BlockKind::Script => "script",
            BlockKind::Style => "style",
        }
    }
}

/// One top-level block of a component file
#[derive(Debug, Clone)]
pub struct Block<'a> {
    pub kind: BlockKind,
    pub attrs: Vec<(String, Option<String>)>,
    pub content: &'a str,
    /// Byte offset of `content` in the file
    pub offset: usize,
    /// Line (0-based) on which `content` starts
    pub line: u32,
}

impl<'a> Block<'a> {
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(n, _)| n == name)
            .and_then(|(_, v)| v.as_deref())
    }

    pub fn has_attr(&self, name: &str) -> bool {
        self.attrs.iter().any(|(n, _)| n == name)
    }

    pub fn lang(&self) -> Option<&str> {
        self.attr("lang")
    }
}

/// Parsed component file
#[derive(Debug, Default)]
pub struct SfcDescriptor<'a> {
    pub template: Option<Block<'a>>,
    pub script: Option<Block<'a>>,
    pub script_setup: Option<Block<'a>>,
    pub styles: Vec<Block<'a>>,
}

/// Split `source` into blocks
pub fn parse(source: &str) -> Result<SfcDescriptor<'_>> {
    let mut descriptor = SfcDescriptor::default();
    let mut pos = 0;

    while let Some(found) = source[pos..].find('<') {
        let start = pos + found;
        let rest = &source[start..];

        if rest.starts_with("<!--") {
            match rest.find("-->") {
                Some(end) => pos = start + end + 3,
                None => bail!("unterminated comment at line {}", line_of(source, start) + 1),
            }
            continue;
        }

        let name_len = rest[1..]
            .find(|c: char| !(c.is_ascii_alphanumeric() || c == '-' || c == '_'))
            .unwrap_or(rest.len() - 1);
        let name = &rest[1..1 + name_len];
        if name.is_empty() {
            pos = start + 1;
            continue;
        }

        let tag_end = match find_closing_angle(source, start + 1 + name_len) {
            Some(end) => end,
            None => bail!("unclosed <{}> tag at line {}", name, line_of(source, start) + 1),
        };
        let raw_attrs = &source[start + 1 + name_len..tag_end];
        let self_closing = raw_attrs.trim_end().ends_with('/');

        let kind = match name {
            "template" => Some(BlockKind::Template),
            "script" => Some(BlockKind::Script),
            "style" => Some(BlockKind::Style),
            _ => None,
        };

        let content_start = tag_end + 1;
        let (content_end, next) = if self_closing {
            (content_start, content_start)
        } else {
            let close = match kind {
                Some(BlockKind::Template) => find_template_end(source, content_start),
                _ => find_close_tag(source, content_start, name),
            };
            match close {
                Some(close) => {
                    let after = source[close..].find('>').map(|p| close + p + 1).unwrap_or(source.len());
                    (close, after)
                }
                None => bail!("missing </{}> for the block at line {}", name, line_of(source, start) + 1),
            }
        };
        pos = next;

        // Custom blocks are ignored
        let kind = match kind {
            Some(kind) => kind,
            None => continue,
        };

        let block = Block {
            kind,
            attrs: parse_attrs(raw_attrs.trim_end_matches('/')),
            content: &source[content_start..content_end],
            offset: content_start,
            line: line_of(source, content_start),
        };

        if block.has_attr("src") {
            bail!("<{} src> imports are not supported", kind.tag());
        }

        match kind {
            BlockKind::Template => {
                if descriptor.template.is_some() {
                    bail!("a component can contain only one <template> block");
                }
                descriptor.template = Some(block);
            }
            BlockKind::Script if block.has_attr("setup") => {
                if descriptor.script_setup.is_some() {
                    bail!("a component can contain only one <script setup> block");
                }
                descriptor.script_setup = Some(block);
            }
            BlockKind::Script => {
                if descriptor.script.is_some() {
                    bail!("a component can contain only one <script> block");
                }
                descriptor.script = Some(block);
            }
            BlockKind::Style => descriptor.styles.push(block),
        }
    }

    Ok(descriptor)
}

fn parse_attrs(raw: &str) -> Vec<(String, Option<String>)> {
    ATTR_REGEX
        .captures_iter(raw)
        .filter_map(|cap| {
            let name = cap.get(1)?.as_str().to_string();
            let value = cap
                .get(2)
                .or_else(|| cap.get(3))
                .or_else(|| cap.get(4))
                .map(|m| m.as_str().to_string());
            Some((name, value))
        })
        .collect()
}

/// Index of the `>` ending a tag, skipping quoted attribute values
fn find_closing_angle(source: &str, from: usize) -> Option<usize> {
    let mut quote: Option<u8> = None;
    for (i, &byte) in source.as_bytes()[from..].iter().enumerate() {
        match (quote, byte) {
            (None, b'"' | b'\'') => quote = Some(byte),
            (Some(q), _) if byte == q => quote = None,
            (None, b'>') => return Some(from + i),
            _ => {}
        }
    }
    None
}

/// Start of `</name` at or after `from`
fn find_close_tag(source: &str, from: usize, name: &str) -> Option<usize> {
    let needle = format!("</{}", name);
    source[from..].find(&needle).map(|p| from + p)
}

/// Start of the `</template` closing the root template, counting nested ones
fn find_template_end(source: &str, from: usize) -> Option<usize> {
    let mut depth = 0usize;
    let mut pos = from;

    while let Some(found) = source[pos..].find("template") {
        let at = pos + found;
        pos = at + "template".len();
        let boundary = source[pos..]
            .chars()
            .next()
            .map(|c| c.is_whitespace() || c == '>' || c == '/')
            .unwrap_or(false);
        if !boundary {
            continue;
        }

        if source[..at].ends_with("</") {
            if depth == 0 {
                return Some(at - 2);
            }
            depth -= 1;
        } else if source[..at].ends_with('<') {
            let self_closing = find_closing_angle(source, pos)
                .map(|end| source[..end].ends_with('/'))
                .unwrap_or(false);
            if !self_closing {
                depth += 1;
            }
        }
    }

    None
}

fn line_of(source: &str, offset: usize) -> u32 {
    source[..offset].matches('\n').count() as u32
}
