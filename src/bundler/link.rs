//! ES module linking
//!
//! Rewrites `import`/`export` syntax into calls against the bundle's module
//! registry. Replacements never add or remove line breaks, so a module's
//! line map stays valid after linking.

use std::collections::HashMap;

use anyhow::{anyhow, bail, Result};

use crate::transform::lexer::{line_col, replace_ranges, TokenKind, Tokens};
use crate::utils::{js_string, property_access};

/// A module after linking
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LinkedModule {
    /// Module body using `require`, `module` and `exports`
    pub code: String,

    /// `__export(...)` call installing the export getters
    pub header: String,

    /// Names this module exports directly
    pub exports: Vec<String>,

    /// Specifiers re-exported through `export * from`
    pub star_exports: Vec<String>,
}

#[derive(Debug, Default)]
struct ImportClause {
    default: Option<String>,
    namespace: Option<String>,
    /// (imported, local)
    named: Vec<(String, String)>,
}

#[derive(Debug)]
enum Item {
    Import {
        start: usize,
        end: usize,
        clause: Option<ImportClause>,
        source: String,
    },
    /// `export` in front of a declaration
    ExportDecl { keyword: usize, names: Vec<String> },
    ExportDefaultExpr { keyword: usize },
    /// `export default function name` or `export default class Name`
    ExportDefaultDecl { keyword: usize, name: String },
    ExportNamed {
        start: usize,
        end: usize,
        /// (local, exported)
        specs: Vec<(String, String)>,
        source: Option<String>,
    },
    ExportAll {
        start: usize,
        end: usize,
        alias: Option<String>,
        source: String,
    },
    /// `import("x")`
    Dynamic { start: usize, end: usize, source: String },
    /// The string argument of `require("x")`
    Require { token: usize, source: String },
}

impl Item {
    fn source(&self) -> Option<&str> {
        match self {
            Item::Import { source, .. }
            | Item::ExportAll { source, .. }
            | Item::Dynamic { source, .. }
            | Item::Require { source, .. } => Some(source),
            Item::ExportNamed { source, .. } => source.as_deref(),
            _ => None,
        }
    }
}

/// Import specifiers used by `code`, in order of first use
pub fn scan_imports(code: &str) -> Result<Vec<String>> {
    let tokens = Tokens::new(code);
    let mut specifiers: Vec<String> = Vec::new();

    for item in parse(&tokens)? {
        if let Some(source) = item.source() {
            if !specifiers.iter().any(|s| s == source) {
                specifiers.push(source.to_string());
            }
        }
    }

    Ok(specifiers)
}

/// Link `code`, mapping each specifier to its `require` argument
pub fn link(code: &str, refs: &HashMap<String, String>) -> Result<LinkedModule> {
    let t = Tokens::new(code);
    let resolve = |specifier: &str| {
        refs.get(specifier)
            .cloned()
            .ok_or_else(|| anyhow!("import '{}' was not resolved", specifier))
    };

    let mut edits: Vec<(usize, usize, String)> = Vec::new();
    let mut exports: Vec<(String, String)> = Vec::new();
    let mut star_exports = Vec::new();
    let mut temp = 0usize;
    let mut next_temp = |prefix: &str| {
        let name = format!("{}_{}", prefix, temp);
        temp += 1;
        name
    };

    for item in parse(&t)? {
        match item {
            Item::Import {
                start,
                end,
                clause,
                source,
            } => {
                let require = format!("require({})", resolve(&source)?);
                let text = match clause {
                    None => format!("{};", require),
                    Some(clause) => import_bindings(clause, &require, &mut next_temp),
                };
                let (s, e) = span(&t, start, end);
                edits.push((s, e, text));
            }
            Item::ExportDecl { keyword, names } => {
                let (s, e) = span(&t, keyword, keyword);
                edits.push((s, e, String::new()));
                exports.extend(names.into_iter().map(|n| (n.clone(), n)));
            }
            Item::ExportDefaultExpr { keyword } => {
                let (s, e) = span(&t, keyword, keyword + 1);
                edits.push((s, e, "var __default =".to_string()));
                exports.push(("default".to_string(), "__default".to_string()));
            }
            Item::ExportDefaultDecl { keyword, name } => {
                let (s, e) = span(&t, keyword, keyword + 1);
                edits.push((s, e, String::new()));
                exports.push(("default".to_string(), name));
            }
            Item::ExportNamed {
                start,
                end,
                specs,
                source,
            } => {
                let (s, e) = span(&t, start, end);
                match source {
                    None => {
                        edits.push((s, e, String::new()));
                        exports.extend(specs.into_iter().map(|(local, exported)| (exported, local)));
                    }
                    Some(source) => {
                        let binding = next_temp("__reexport");
                        edits.push((
                            s,
                            e,
                            format!("var {} = require({});", binding, resolve(&source)?),
                        ));
                        for (local, exported) in specs {
                            exports.push((exported, member(&binding, &local)));
                        }
                    }
                }
            }
            Item::ExportAll {
                start,
                end,
                alias,
                source,
            } => {
                let (s, e) = span(&t, start, end);
                let arg = resolve(&source)?;
                match alias {
                    Some(alias) => {
                        let binding = next_temp("__reexport");
                        edits.push((s, e, format!("var {} = require({});", binding, arg)));
                        exports.push((alias, binding));
                    }
                    None => {
                        edits.push((s, e, format!("__reExport(exports, require({}));", arg)));
                        star_exports.push(source);
                    }
                }
            }
            Item::Dynamic { start, end, source } => {
                let (s, e) = span(&t, start, end);
                edits.push((
                    s,
                    e,
                    format!(
                        "Promise.resolve().then(function () {{ return require({}); }})",
                        resolve(&source)?
                    ),
                ));
            }
            Item::Require { token, source } => {
                let (s, e) = span(&t, token, token);
                edits.push((s, e, resolve(&source)?));
            }
        }
    }

    let mut names: Vec<String> = Vec::new();
    let mut getters = Vec::new();
    for (exported, expr) in exports {
        if names.contains(&exported) {
            bail!("duplicate export '{}'", exported);
        }
        getters.push(format!("{}: function () {{ return {}; }}", js_string(&exported), expr));
        names.push(exported);
    }

    let header = if getters.is_empty() {
        "__export(exports, {});".to_string()
    } else {
        format!("__export(exports, {{ {} }});", getters.join(", "))
    };

    Ok(LinkedModule {
        code: replace_ranges(code, edits),
        header,
        exports: names,
        star_exports,
    })
}

/// `var` declaration binding the names of an import clause
fn import_bindings(
    clause: ImportClause,
    require: &str,
    next_temp: &mut impl FnMut(&str) -> String,
) -> String {
    match clause {
        ImportClause {
            default: Some(local),
            namespace: None,
            named,
        } if named.is_empty() => format!("var {} = __toDefault({});", local, require),
        ImportClause {
            default: None,
            namespace: Some(local),
            named,
        } if named.is_empty() => format!("var {} = {};", local, require),
        ImportClause {
            default: None,
            namespace: None,
            named,
        } if named.is_empty() => format!("{};", require),
        clause => {
            let binding = next_temp("__import");
            let mut decls = vec![format!("{} = {}", binding, require)];
            if let Some(local) = clause.default {
                decls.push(format!("{} = __toDefault({})", local, binding));
            }
            if let Some(local) = clause.namespace {
                decls.push(format!("{} = {}", local, binding));
            }
            for (imported, local) in clause.named {
                decls.push(format!("{} = {}", local, member(&binding, &imported)));
            }
            format!("var {};", decls.join(", "))
        }
    }
}

/// Access export `name` of the module bound to `binding`
fn member(binding: &str, name: &str) -> String {
    if name == "default" {
        format!("__toDefault({})", binding)
    } else {
        property_access(binding, name)
    }
}

/// Byte range covering tokens `from..=to`
fn span(t: &Tokens, from: usize, to: usize) -> (usize, usize) {
    let start = t.get(from).map(|tok| tok.start).unwrap_or(t.src.len());
    let end = t.get(to).map(|tok| tok.end).unwrap_or(start);
    (start, end)
}

fn unquote(literal: &str) -> String {
    if literal.len() >= 2 {
        literal[1..literal.len() - 1].to_string()
    } else {
        literal.to_string()
    }
}

fn after_dot(t: &Tokens, i: usize) -> bool {
    i > 0 && t.is_punct(i - 1, b'.')
}

/// Binding or string name at token `i`
fn name_at(t: &Tokens, i: usize) -> String {
    if t.kind(i) == Some(TokenKind::Str) {
        unquote(t.text(i))
    } else {
        t.text(i).to_string()
    }
}

fn syntax_error(t: &Tokens, i: usize, what: &str) -> anyhow::Error {
    let offset = t.get(i).map(|tok| tok.start).unwrap_or(t.src.len());
    let (line, col) = line_col(t.src, offset);
    anyhow!("{} at {}:{}", what, line, col)
}

fn parse(t: &Tokens) -> Result<Vec<Item>> {
    let mut items = Vec::new();
    let mut i = 0;

    while i < t.len() {
        let top = t.depth(i) == 0 && t.is_statement_start(i);

        if top
            && t.is_ident(i, "import")
            && !t.is_punct(i + 1, b'(')
            && !t.is_punct(i + 1, b'.')
        {
            let (item, end) = parse_import(t, i)?;
            items.push(item);
            i = end + 1;
            continue;
        }

        if top && t.is_ident(i, "export") {
            let (item, next) = parse_export(t, i)?;
            items.push(item);
            i = next;
            continue;
        }

        let string_call = t.is_punct(i + 1, b'(')
            && t.kind(i + 2) == Some(TokenKind::Str)
            && t.is_punct(i + 3, b')')
            && !after_dot(t, i);

        if string_call && t.is_ident(i, "import") {
            items.push(Item::Dynamic {
                start: i,
                end: i + 3,
                source: unquote(t.text(i + 2)),
            });
            i += 4;
            continue;
        }

        if string_call && t.is_ident(i, "require") {
            items.push(Item::Require {
                token: i + 2,
                source: unquote(t.text(i + 2)),
            });
            i += 4;
            continue;
        }

        i += 1;
    }

    Ok(items)
}

fn parse_import(t: &Tokens, i: usize) -> Result<(Item, usize)> {
    let end = t.statement_end(i);
    let mut j = i + 1;

    if t.kind(j) == Some(TokenKind::Str) {
        let item = Item::Import {
            start: i,
            end,
            clause: None,
            source: unquote(t.text(j)),
        };
        return Ok((item, end));
    }

    let mut clause = ImportClause::default();
    if t.kind(j) == Some(TokenKind::Ident) && !t.is_ident(j, "from") {
        clause.default = Some(t.text(j).to_string());
        j += 1;
        if t.is_punct(j, b',') {
            j += 1;
        }
    }

    if t.is_punct(j, b'*') {
        if !t.is_ident(j + 1, "as") || t.kind(j + 2) != Some(TokenKind::Ident) {
            return Err(syntax_error(t, j, "malformed namespace import"));
        }
        clause.namespace = Some(t.text(j + 2).to_string());
        j += 3;
    } else if t.is_punct(j, b'{') {
        let close = t
            .matching(j)
            .ok_or_else(|| syntax_error(t, j, "unclosed import list"))?;
        clause.named = parse_specifiers(t, j, close);
        j = close + 1;
    }

    if !t.is_ident(j, "from") || t.kind(j + 1) != Some(TokenKind::Str) {
        return Err(syntax_error(t, i, "malformed import"));
    }

    let item = Item::Import {
        start: i,
        end,
        clause: Some(clause),
        source: unquote(t.text(j + 1)),
    };
    Ok((item, end))
}

/// Parse `{ a, b as c, "d" as e }` into (first, second) name pairs
fn parse_specifiers(t: &Tokens, open: usize, close: usize) -> Vec<(String, String)> {
    let mut specs = Vec::new();
    let mut j = open + 1;

    while j < close {
        if t.is_punct(j, b',') {
            j += 1;
            continue;
        }
        let first = name_at(t, j);
        if t.is_ident(j + 1, "as") && j + 2 < close {
            specs.push((first, name_at(t, j + 2)));
            j += 3;
        } else {
            specs.push((first.clone(), first));
            j += 1;
        }
    }

    specs
}

/// Parse an `export` statement; returns the item and the token to resume at
fn parse_export(t: &Tokens, i: usize) -> Result<(Item, usize)> {
    let k = i + 1;

    if t.is_ident(k, "default") {
        let mut d = k + 1;
        if t.is_ident(d, "async") && t.is_ident(d + 1, "function") {
            d += 1;
        }
        if t.is_any_ident(d, &["function", "class"]) {
            let mut n = d + 1;
            if t.is_punct(n, b'*') {
                n += 1;
            }
            if t.kind(n) == Some(TokenKind::Ident) && !t.is_ident(n, "extends") {
                let name = t.text(n).to_string();
                return Ok((Item::ExportDefaultDecl { keyword: i, name }, k + 1));
            }
        }
        return Ok((Item::ExportDefaultExpr { keyword: i }, k + 1));
    }

    if t.is_any_ident(k, &["const", "let", "var"]) {
        let names = t.declaration_names(k);
        return Ok((Item::ExportDecl { keyword: i, names }, k));
    }

    let mut d = k;
    if t.is_ident(d, "async") && t.is_ident(d + 1, "function") {
        d += 1;
    }
    if t.is_any_ident(d, &["function", "class"]) {
        let mut n = d + 1;
        if t.is_punct(n, b'*') {
            n += 1;
        }
        if t.kind(n) != Some(TokenKind::Ident) {
            return Err(syntax_error(t, n, "exported declaration needs a name"));
        }
        let names = vec![t.text(n).to_string()];
        return Ok((Item::ExportDecl { keyword: i, names }, k));
    }

    if t.is_punct(k, b'{') {
        let close = t
            .matching(k)
            .ok_or_else(|| syntax_error(t, k, "unclosed export list"))?;
        let specs = parse_specifiers(t, k, close);
        let source = if t.is_ident(close + 1, "from") && t.kind(close + 2) == Some(TokenKind::Str) {
            Some(unquote(t.text(close + 2)))
        } else {
            None
        };
        let end = t.statement_end(i);
        let item = Item::ExportNamed {
            start: i,
            end,
            specs,
            source,
        };
        return Ok((item, end + 1));
    }

    if t.is_punct(k, b'*') {
        let (alias, from) = if t.is_ident(k + 1, "as") {
            (Some(name_at(t, k + 2)), k + 3)
        } else {
            (None, k + 1)
        };
        if !t.is_ident(from, "from") || t.kind(from + 1) != Some(TokenKind::Str) {
            return Err(syntax_error(t, i, "malformed star export"));
        }
        let end = t.statement_end(i);
        let item = Item::ExportAll {
            start: i,
            end,
            alias,
            source: unquote(t.text(from + 1)),
        };
        return Ok((item, end + 1));
    }

    Err(syntax_error(t, i, "unsupported export syntax"))
}
