//! Declaration file emission
//!
//! Walks the top-level statements of a TypeScript module and writes the
//! ambient form of everything it exports. Annotated signatures are copied,
//! unannotated values fall back to literal inference or `any`. Every output
//! line records the source line it came from, for declaration maps.

use std::collections::HashSet;

use anyhow::{bail, Result};

use crate::sourcemap::{LineBuilder, LineMap};
use crate::transform::lexer::{line_col, TokenKind, Tokens};
use crate::transform::typescript::{generic_end, parse_type};

/// Declaration for an external-facing component; components are typed
/// through the framework's `DefineComponent` helper
pub const COMPONENT_DECLARATION: &str = "import type { DefineComponent } from 'vue';\n\
declare const _default: DefineComponent<{}, {}, any>;\n\
export default _default;\n";

const MEMBER_MODIFIERS: &[&str] = &[
    "public", "private", "protected", "static", "readonly", "abstract", "override", "declare",
    "async", "get", "set",
];

const PARAMETER_MODIFIERS: &[&str] = &["public", "private", "protected", "readonly", "override"];

/// An emitted `.d.ts` body
#[derive(Debug)]
pub struct Declaration {
    pub code: String,
    /// Declaration line -> source line
    pub map: LineMap,
}

/// Emit the declaration for a TypeScript module
pub fn emit_declaration(source: &str) -> Result<Declaration> {
    let tokens = Tokens::new(source);
    let mut emitter = Emitter {
        t: &tokens,
        out: LineBuilder::new(),
        referenced: HashSet::new(),
        overloaded: HashSet::new(),
    };
    emitter.collect_referenced();
    emitter.run()?;

    let (code, map) = emitter.out.finish();
    Ok(Declaration { code, map })
}

struct Emitter<'t, 'a> {
    t: &'t Tokens<'a>,
    out: LineBuilder,
    /// Local names re-exported through `export { .. }` or `export default name`
    referenced: HashSet<String>,
    /// Functions declared with overload signatures
    overloaded: HashSet<String>,
}

impl<'t, 'a> Emitter<'t, 'a> {
    fn line(&self, i: usize) -> u32 {
        let offset = self.t.get(i).map(|tok| tok.start).unwrap_or(self.t.src.len());
        (line_col(self.t.src, offset).0 - 1) as u32
    }

    fn collect_referenced(&mut self) {
        let t = self.t;
        for i in 0..t.len() {
            if t.depth(i) != 0 || !t.is_statement_start(i) || !t.is_ident(i, "export") {
                continue;
            }
            if t.is_punct(i + 1, b'{') {
                let close = match t.matching(i + 1) {
                    Some(close) => close,
                    None => continue,
                };
                if t.is_ident(close + 1, "from") {
                    continue;
                }
                let mut j = i + 2;
                while j < close {
                    if t.kind(j) == Some(TokenKind::Ident) && !t.is_ident(j, "type") {
                        self.referenced.insert(t.text(j).to_string());
                    }
                    // skip the exported alias
                    if t.is_ident(j + 1, "as") {
                        j += 2;
                    }
                    while j < close && !t.is_punct(j, b',') {
                        j += 1;
                    }
                    j += 1;
                }
            } else if t.is_ident(i + 1, "default")
                && t.kind(i + 2) == Some(TokenKind::Ident)
                && t.statement_end(i) <= i + 3
            {
                self.referenced.insert(t.text(i + 2).to_string());
            }
        }
    }

    fn run(&mut self) -> Result<()> {
        let t = self.t;
        let mut i = 0;
        while i < t.len() {
            if t.depth(i) != 0 || !t.is_statement_start(i) {
                i += 1;
                continue;
            }
            i = self.statement(i)? + 1;
        }
        Ok(())
    }

    /// Emit the statement starting at `i`; returns its last token
    fn statement(&mut self, i: usize) -> Result<usize> {
        let t = self.t;
        let end = t.statement_end(i);
        let exported = t.is_ident(i, "export");
        let kw = if exported { i + 1 } else { i };

        if t.is_ident(i, "import") && !t.is_punct(i + 1, b'(') && !t.is_punct(i + 1, b'.') {
            // side-effect imports carry no types
            if t.kind(i + 1) != Some(TokenKind::Str) {
                self.copy(i, end);
            }
            return Ok(end);
        }

        if t.is_ident(kw, "enum") || (t.is_ident(kw, "const") && t.is_ident(kw + 1, "enum")) {
            let (line, col) = line_col(t.src, t.get(kw).map(|tok| tok.start).unwrap_or(0));
            bail!("enums are not supported ({}:{})", line, col);
        }

        if exported && t.is_ident(kw, "default") {
            self.default_export(kw + 1, end)?;
            return Ok(end);
        }

        // export { .. } / export * from / export type { .. }
        if exported
            && (t.is_punct(kw, b'{')
                || t.is_punct(kw, b'*')
                || (t.is_ident(kw, "type") && (t.is_punct(kw + 1, b'{') || t.is_punct(kw + 1, b'*'))))
        {
            self.copy(i, end);
            return Ok(end);
        }

        if t.is_any_ident(kw, &["interface", "type", "declare", "namespace", "module"])
            && t.kind(kw + 1) == Some(TokenKind::Ident)
        {
            self.copy(i, end);
            return Ok(end);
        }

        let names = self.declared_names(kw);
        if !exported && !names.iter().any(|name| self.referenced.contains(name)) {
            return Ok(end);
        }
        let prefix = if exported { "export declare " } else { "declare " };

        if t.is_ident(kw, "function") || (t.is_ident(kw, "async") && t.is_ident(kw + 1, "function")) {
            self.function(prefix, kw, end);
        } else if t.is_ident(kw, "class") || (t.is_ident(kw, "abstract") && t.is_ident(kw + 1, "class")) {
            self.class(prefix, kw, end);
        } else if t.is_any_ident(kw, &["const", "let", "var"]) {
            self.variable(prefix, kw, end);
        }

        Ok(end)
    }

    fn declared_names(&self, kw: usize) -> Vec<String> {
        let t = self.t;
        if t.is_any_ident(kw, &["const", "let", "var"]) {
            return t.declaration_names(kw);
        }
        let mut j = kw;
        while t.is_any_ident(j, &["async", "abstract"]) {
            j += 1;
        }
        if t.is_any_ident(j, &["function", "class"]) {
            let mut name = j + 1;
            if t.is_punct(name, b'*') {
                name += 1;
            }
            if t.kind(name) == Some(TokenKind::Ident) {
                return vec![t.text(name).to_string()];
            }
        }
        Vec::new()
    }

    /// Copy tokens `from..=to` verbatim, line for line
    fn copy(&mut self, from: usize, to: usize) {
        let text = self.t.slice(from, to);
        let line = self.line(from);
        self.out.push_mapped(text, line);
    }

    fn emit(&mut self, text: &str, at: usize) {
        let line = self.line(at);
        self.out.push_line(text, Some(line));
    }

    fn default_export(&mut self, from: usize, end: usize) -> Result<()> {
        let t = self.t;
        let export_kw = from.saturating_sub(2);

        if t.is_ident(from, "function") || (t.is_ident(from, "async") && t.is_ident(from + 1, "function")) {
            self.function("export default ", from, end);
        } else if t.is_ident(from, "class") || (t.is_ident(from, "abstract") && t.is_ident(from + 1, "class")) {
            self.class("export default ", from, end);
        } else if t.is_ident(from, "interface") {
            self.copy(export_kw, end);
        } else if t.kind(from) == Some(TokenKind::Ident)
            && (from == end || (from + 1 == end && t.is_punct(end, b';')))
        {
            self.emit(&format!("export default {};", t.text(from)), export_kw);
        } else {
            let last = if t.is_punct(end, b';') { end.saturating_sub(1) } else { end };
            let ty = self
                .value_type(from, last, true)
                .unwrap_or_else(|| "any".to_string());
            self.emit(&format!("declare const _default: {};", ty), export_kw);
            self.emit("export default _default;", export_kw);
        }
        Ok(())
    }

    fn function(&mut self, prefix: &str, kw: usize, end: usize) {
        let t = self.t;
        let is_async = t.is_ident(kw, "async");
        let mut j = if is_async { kw + 2 } else { kw + 1 };
        let is_generator = t.is_punct(j, b'*');
        if is_generator {
            j += 1;
        }

        let name = if t.kind(j) == Some(TokenKind::Ident) {
            j += 1;
            t.text(j - 1)
        } else {
            ""
        };

        let generics = self.generics(&mut j);
        if !t.is_punct(j, b'(') {
            return;
        }
        let close = match t.matching(j) {
            Some(close) => close,
            None => return,
        };
        let params = self.params(j, close);

        let (annotated, body) = self.return_type(close);
        let has_body = t.is_punct(body, b'{') && body <= end;
        if !has_body {
            self.overloaded.insert(name.to_string());
        } else if !name.is_empty() && self.overloaded.contains(name) {
            // the implementation signature is hidden behind its overloads
            return;
        }

        let ret = match annotated {
            Some(ret) => ret,
            None if is_generator => "Generator<any, any, any>".to_string(),
            None => self.inferred_return(body, is_async),
        };
        self.emit(
            &format!("{}function {}{}({}): {};", prefix, name, generics, params, ret),
            kw,
        );
    }

    /// `<T, U>` at `*j`, advancing past it
    fn generics(&self, j: &mut usize) -> String {
        let t = self.t;
        if t.is_punct(*j, b'<') {
            if let Some(end) = generic_end(t, *j) {
                let text = collapse(t.slice(*j, end));
                *j = end + 1;
                return text;
            }
        }
        String::new()
    }

    /// Annotated return type after the parameter list closing at `close`,
    /// and the index of the token following the signature
    fn return_type(&self, close: usize) -> (Option<String>, usize) {
        let t = self.t;
        if t.is_punct(close + 1, b':') {
            if let Some(end) = parse_type(t, close + 2) {
                return (Some(collapse(t.slice(close + 2, end))), end + 1);
            }
        }
        (None, close + 1)
    }

    fn inferred_return(&self, body: usize, is_async: bool) -> String {
        let t = self.t;
        let returns_value = match (t.is_punct(body, b'{'), t.matching(body)) {
            (true, Some(close)) => (body + 1..close).any(|k| {
                t.is_ident(k, "return")
                    && k + 1 < close
                    && !t.is_punct(k + 1, b';')
                    && !t.is_punct(k + 1, b'}')
                    && !t.newline_before(k + 1)
            }),
            _ => true,
        };
        let ret = if returns_value { "any" } else { "void" };
        if is_async {
            format!("Promise<{}>", ret)
        } else {
            ret.to_string()
        }
    }

    /// Index of the next top-level `,` in `from..=limit`, or `limit + 1`
    fn next_comma(&self, mut j: usize, limit: usize) -> usize {
        let t = self.t;
        while j <= limit && !t.is_punct(j, b',') {
            if t.is_opening(j) {
                j = t.matching(j).unwrap_or(limit);
            } else if t.is_punct(j, b'<') && j > 0 && t.kind(j - 1) == Some(TokenKind::Ident) {
                if let Some(end) = generic_end(t, j) {
                    j = end;
                }
            }
            j += 1;
        }
        j
    }

    /// Declared form of the parameter list `open..=close`
    fn params(&self, open: usize, close: usize) -> String {
        let mut parts = Vec::new();
        let mut j = open + 1;
        while j < close {
            let comma = self.next_comma(j, close - 1);
            if comma > j {
                parts.push(self.param(j, comma - 1));
            }
            j = comma + 1;
        }
        parts.join(", ")
    }

    fn param(&self, from: usize, to: usize) -> String {
        let t = self.t;
        let mut k = from;
        while t.is_any_ident(k, PARAMETER_MODIFIERS)
            && k < to
            && (t.kind(k + 1) == Some(TokenKind::Ident) || t.is_opening(k + 1))
        {
            k += 1;
        }

        let name_start = k;
        let is_rest = t.is_punct(k, b'.');
        while t.is_punct(k, b'.') && k < to {
            k += 1;
        }
        let name_end = if t.is_opening(k) {
            t.matching(k).unwrap_or(k)
        } else {
            k
        };
        let name = collapse(t.slice(name_start, name_end));

        let mut j = name_end + 1;
        let mut optional = false;
        if t.is_punct(j, b'?') && j <= to {
            optional = true;
            j += 1;
        }
        let mut ty = None;
        if t.is_punct(j, b':') && j <= to {
            if let Some(end) = parse_type(t, j + 1) {
                if end <= to {
                    ty = Some(collapse(t.slice(j + 1, end)));
                    j = end + 1;
                }
            }
        }
        if t.is_punct(j, b'=') && j < to {
            optional = true;
            if ty.is_none() {
                ty = self.value_type(j + 1, to, false);
            }
        }

        let ty = ty.unwrap_or_else(|| if is_rest { "any[]" } else { "any" }.to_string());
        let mark = if optional && !is_rest { "?" } else { "" };
        format!("{}{}: {}", name, mark, ty)
    }

    /// Type of the expression `from..=to`, when it can be read off the syntax
    fn value_type(&self, from: usize, to: usize, literal: bool) -> Option<String> {
        let t = self.t;
        if from > to {
            return None;
        }

        if from == to {
            let text = t.text(from);
            return match t.kind(from)? {
                TokenKind::Number => Some(if literal { text.to_string() } else { "number".to_string() }),
                TokenKind::Str => Some(if literal { text.to_string() } else { "string".to_string() }),
                TokenKind::Template if !text.contains("${") => Some("string".to_string()),
                TokenKind::Ident if text == "true" || text == "false" => {
                    Some(if literal { text.to_string() } else { "boolean".to_string() })
                }
                _ => None,
            };
        }

        if to == from + 1 && t.is_punct(from, b'-') && t.kind(to) == Some(TokenKind::Number) {
            return Some(if literal { format!("-{}", t.text(to)) } else { "number".to_string() });
        }

        // new Foo(...)
        if t.is_ident(from, "new")
            && t.kind(from + 1) == Some(TokenKind::Ident)
            && t.is_punct(from + 2, b'(')
            && t.matching(from + 2) == Some(to)
        {
            return Some(t.text(from + 1).to_string());
        }

        self.function_type(from, to)
    }

    /// Signature type of an arrow function or function expression
    fn function_type(&self, from: usize, to: usize) -> Option<String> {
        let t = self.t;
        let mut j = from;
        let is_async = t.is_ident(j, "async");
        if is_async {
            j += 1;
        }

        if t.is_ident(j, "function") {
            j += 1;
            if t.is_punct(j, b'*') {
                return None;
            }
            if t.kind(j) == Some(TokenKind::Ident) {
                j += 1;
            }
        } else if t.kind(j) == Some(TokenKind::Ident) && t.is_arrow(j + 1) {
            let ret = if is_async { "Promise<any>" } else { "any" };
            return Some(format!("({}: any) => {}", t.text(j), ret));
        }

        let generics = self.generics(&mut j);
        if !t.is_punct(j, b'(') {
            return None;
        }
        let close = t.matching(j)?;
        if close >= to {
            return None;
        }
        let (annotated, after) = self.return_type(close);
        if !(t.is_arrow(after) || t.is_punct(after, b'{')) {
            return None;
        }

        let ret = annotated.unwrap_or_else(|| {
            if t.is_punct(after, b'{') {
                self.inferred_return(after, is_async)
            } else if is_async {
                "Promise<any>".to_string()
            } else {
                "any".to_string()
            }
        });
        Some(format!("{}({}) => {}", generics, self.params(j, close), ret))
    }

    fn variable(&mut self, prefix: &str, kw: usize, end: usize) {
        let t = self.t;
        let keyword = t.text(kw);
        let is_const = keyword == "const";
        let last = if t.is_punct(end, b';') { end.saturating_sub(1) } else { end };

        let mut declarators = Vec::new();
        let mut j = kw + 1;
        while j <= last {
            let comma = self.next_comma(j, last);

            if t.is_opening(j) {
                let mut names = Vec::new();
                t.pattern_names(j, &mut names);
                declarators.extend(names.into_iter().map(|name| format!("{}: any", name)));
            } else if t.kind(j) == Some(TokenKind::Ident) {
                let name = t.text(j);
                let mut k = j + 1;
                if t.is_punct(k, b'!') {
                    k += 1;
                }
                let mut ty = None;
                if t.is_punct(k, b':') {
                    if let Some(type_end) = parse_type(t, k + 1) {
                        ty = Some(collapse(t.slice(k + 1, type_end)));
                        k = type_end + 1;
                    }
                }
                if ty.is_none() && t.is_punct(k, b'=') && k < comma {
                    ty = self.value_type(k + 1, comma - 1, is_const);
                }
                declarators.push(format!("{}: {}", name, ty.unwrap_or_else(|| "any".to_string())));
            }

            j = comma + 1;
        }

        if !declarators.is_empty() {
            self.emit(&format!("{}{} {};", prefix, keyword, declarators.join(", ")), kw);
        }
    }

    fn class(&mut self, prefix: &str, kw: usize, end: usize) {
        let t = self.t;
        let mut open = kw;
        while open <= end && !t.is_punct(open, b'{') {
            if t.is_punct(open, b'<') {
                if let Some(close) = generic_end(t, open) {
                    open = close;
                }
            } else if t.is_opening(open) {
                open = t.matching(open).unwrap_or(open);
            }
            open += 1;
        }
        let close = match t.matching(open) {
            Some(close) if open <= end => close,
            _ => return,
        };

        let header = collapse(t.slice(kw, open - 1));
        self.emit(&format!("{}{} {{", prefix, header), kw);

        let mut j = open + 1;
        while j < close {
            if t.is_punct(j, b';') {
                j += 1;
                continue;
            }
            let member_end = t.statement_end(j).min(close - 1);
            for line in self.member(j, member_end) {
                self.emit(&format!("    {}", line), j);
            }
            j = member_end + 1;
        }

        self.emit("}", close);
    }

    /// Declared lines for the class member `from..=to`
    fn member(&self, from: usize, to: usize) -> Vec<String> {
        let t = self.t;
        let mut k = from;
        let mut modifiers: Vec<&str> = Vec::new();
        while t.is_any_ident(k, MEMBER_MODIFIERS)
            && k < to
            && (t.kind(k + 1) == Some(TokenKind::Ident)
                || t.kind(k + 1) == Some(TokenKind::Str)
                || t.is_punct(k + 1, b'[')
                || t.is_punct(k + 1, b'*'))
        {
            modifiers.push(t.text(k));
            k += 1;
        }
        if t.is_punct(k, b'*') {
            k += 1;
        }

        // static blocks and private names have no declared form
        if (t.is_ident(k, "static") && t.is_punct(k + 1, b'{')) || t.is_punct(k, b'#') {
            return Vec::new();
        }

        // index signature
        if t.is_punct(k, b'[') && t.kind(k + 1) == Some(TokenKind::Ident) && t.is_punct(k + 2, b':') {
            let text = collapse(t.slice(from, to));
            return vec![if text.ends_with(';') { text } else { format!("{};", text) }];
        }

        let name_end = if t.is_punct(k, b'[') {
            match t.matching(k) {
                Some(close) => close,
                None => return Vec::new(),
            }
        } else {
            k
        };
        let name = t.slice(k, name_end);
        let mut j = name_end + 1;

        let is_private = modifiers.contains(&"private");
        let kept: Vec<&str> = modifiers
            .iter()
            .copied()
            .filter(|m| matches!(*m, "protected" | "static" | "readonly" | "abstract"))
            .collect();
        let lead = if kept.is_empty() {
            String::new()
        } else {
            format!("{} ", kept.join(" "))
        };

        let mut optional = "";
        if t.is_punct(j, b'?') || t.is_punct(j, b'!') {
            if t.is_punct(j, b'?') {
                optional = "?";
            }
            j += 1;
        }

        let generics = self.generics(&mut j);
        if t.is_punct(j, b'(') {
            let close = match t.matching(j) {
                Some(close) => close,
                None => return Vec::new(),
            };

            if name == "constructor" {
                let mut lines = self.parameter_properties(j, close);
                lines.push(format!("constructor({});", self.params(j, close)));
                return lines;
            }
            if is_private {
                return vec![format!("{}private {};", lead, name)];
            }

            let params = self.params(j, close);
            let (annotated, body) = self.return_type(close);
            let is_async = modifiers.contains(&"async");

            if modifiers.contains(&"set") {
                return vec![format!("{}set {}({});", lead, name, params)];
            }
            let ret = annotated.unwrap_or_else(|| self.inferred_return(body, is_async));
            if modifiers.contains(&"get") {
                return vec![format!("{}get {}(): {};", lead, name, ret)];
            }
            return vec![format!("{}{}{}{}({}): {};", lead, name, optional, generics, params, ret)];
        }

        if is_private {
            return vec![format!("{}private {};", lead, name)];
        }

        let mut ty = None;
        if t.is_punct(j, b':') {
            if let Some(end) = parse_type(t, j + 1) {
                ty = Some(collapse(t.slice(j + 1, end)));
                j = end + 1;
            }
        }
        if ty.is_none() && t.is_punct(j, b'=') {
            let last = if t.is_punct(to, b';') { to.saturating_sub(1) } else { to };
            ty = self.value_type(j + 1, last, kept.contains(&"readonly"));
        }
        vec![format!(
            "{}{}{}: {};",
            lead,
            name,
            optional,
            ty.unwrap_or_else(|| "any".to_string())
        )]
    }

    /// Properties declared through constructor parameter modifiers
    fn parameter_properties(&self, open: usize, close: usize) -> Vec<String> {
        let t = self.t;
        let mut lines = Vec::new();
        let mut j = open + 1;
        while j < close {
            let comma = self.next_comma(j, close - 1);
            let mut modifiers = Vec::new();
            let mut k = j;
            while t.is_any_ident(k, PARAMETER_MODIFIERS) && t.kind(k + 1) == Some(TokenKind::Ident) {
                modifiers.push(t.text(k));
                k += 1;
            }
            if !modifiers.is_empty() {
                let name = t.text(k);
                if modifiers.contains(&"private") {
                    lines.push(format!("private {};", name));
                } else {
                    let declared = self.param(k, comma - 1);
                    let lead: Vec<&str> = modifiers
                        .iter()
                        .copied()
                        .filter(|m| matches!(*m, "protected" | "readonly"))
                        .collect();
                    if lead.is_empty() {
                        lines.push(format!("{};", declared));
                    } else {
                        lines.push(format!("{} {};", lead.join(" "), declared));
                    }
                }
            }
            j = comma + 1;
        }
        lines
    }
}

/// Collapse whitespace runs, so multi-line signatures fit on one line
fn collapse(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn dts(source: &str) -> String {
        emit_declaration(source).unwrap().code
    }

    #[test]
    fn test_functions() {
        assert_eq!(
            dts("export function range(start: number, end = 10, ...rest: number[]): number[] {\n  return [];\n}\n"),
            "export declare function range(start: number, end?: number, ...rest: number[]): number[];\n"
        );
        assert_eq!(
            dts("export async function load(url) {\n  await fetch(url)\n}\n"),
            "export declare function load(url: any): Promise<void>;\n"
        );
        assert_eq!(
            dts("export function pick<T>(items: T[], i = 0) { return items[i] }"),
            "export declare function pick<T>(items: T[], i?: number): any;\n"
        );
    }

    #[test]
    fn test_overloads_hide_implementation() {
        let src = "export function f(a: string): string;\nexport function f(a: number): number;\nexport function f(a: any) { return a }\n";
        assert_eq!(
            dts(src),
            "export declare function f(a: string): string;\nexport declare function f(a: number): number;\n"
        );
    }

    #[test]
    fn test_variables() {
        assert_eq!(
            dts("export const PER_PAGE = 10, label: string = 'x';\nexport let current = 1;\n"),
            "export declare const PER_PAGE: 10, label: string;\nexport declare let current: number;\n"
        );
        assert_eq!(
            dts("export const clamp = (n: number, max = 5): number => Math.min(n, max);\n"),
            "export declare const clamp: (n: number, max?: number) => number;\n"
        );
        assert_eq!(
            dts("export const config = { a: 1 };\n"),
            "export declare const config: any;\n"
        );
    }

    #[test]
    fn test_types_imports_and_reexports_are_copied() {
        let src = "import { ref } from 'vue'\nimport './style.css'\nexport interface Page {\n  n: number\n}\ntype Mode = 'a' | 'b'\nexport * from './util'\nexport { default as Paginate } from './components/Paginate.vue'\n";
        assert_eq!(
            dts(src),
            "import { ref } from 'vue'\nexport interface Page {\n  n: number\n}\ntype Mode = 'a' | 'b'\nexport * from './util'\nexport { default as Paginate } from './components/Paginate.vue'\n"
        );
    }

    #[test]
    fn test_local_exports_and_default() {
        let src = "const hidden = 1\nfunction visible(a: number) { return a }\nexport { visible }\nexport default visible\n";
        assert_eq!(
            dts(src),
            "declare function visible(a: number): any;\nexport { visible }\nexport default visible;\n"
        );
        assert_eq!(
            dts("export default { name: 'x' }\n"),
            "declare const _default: any;\nexport default _default;\n"
        );
    }

    #[test]
    fn test_classes() {
        let src = "export class Pager<T> extends Base implements Paged {\n  total = 0\n  private cache = new Map()\n  static readonly size = 10\n  constructor(public items: T[], private owner?: string) {\n    super()\n  }\n  get count(): number { return this.items.length }\n  next(step = 1) {\n    this.total += step\n  }\n}\n";
        assert_eq!(
            dts(src),
            "export declare class Pager<T> extends Base implements Paged {\n    total: number;\n    private cache;\n    static readonly size: 10;\n    items: T[];\n    private owner;\n    constructor(items: T[], owner?: string);\n    get count(): number;\n    next(step?: number): void;\n}\n"
        );
    }

    #[test]
    fn test_lines_map_back_to_source() {
        let decl = emit_declaration("// header\n\nexport const a = 1\n\nexport function b() {}\n").unwrap();
        assert_eq!(decl.map.lookup(0), Some(2));
        assert_eq!(decl.map.lookup(1), Some(4));
    }

    #[test]
    fn test_enums_are_rejected() {
        assert!(emit_declaration("export enum Size { Sm, Lg }").is_err());
    }
}
