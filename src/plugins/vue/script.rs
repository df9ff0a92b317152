//! Script block compilation
//!
//! A plain `<script>` only needs its default export captured. A
//! `<script setup>` block is turned inside out: imports are hoisted to
//! module level, the compiler macros are replaced by the setup arguments
//! and every top-level binding is returned to the template.

use anyhow::{bail, Result};

use crate::transform::lexer::{line_col, replace_ranges, TokenKind, Tokens};

/// Replace the first top-level `export default` with `const <binding> =`.
/// Returns the rewritten code and whether a default export was found.
pub fn rewrite_default_export(content: &str, binding: &str) -> Result<(String, bool)> {
    let t = Tokens::new(content);

    for i in 0..t.len() {
        if t.depth(i) == 0
            && t.is_statement_start(i)
            && t.is_ident(i, "export")
            && t.is_ident(i + 1, "default")
        {
            let start = token_start(&t, i);
            let end = token_end(&t, i + 1);
            let code = replace_ranges(content, vec![(start, end, format!("const {} =", binding))]);
            return Ok((code, true));
        }
    }

    Ok((content.to_string(), false))
}

/// A macro argument with the (0-based) block line it starts on
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MacroArg {
    pub code: String,
    pub line: u32,
}

/// Result of analysing a `<script setup>` block
#[derive(Debug, Default)]
pub struct SetupScript {
    /// Import statements to hoist, with their block line
    pub imports: Vec<MacroArg>,
    /// Block content with imports removed and macros rewritten
    pub body: String,
    /// Top-level names exposed to the template
    pub bindings: Vec<String>,
    /// Imported names registered as components
    pub components: Vec<String>,
    pub props: Option<MacroArg>,
    pub emits: Option<MacroArg>,
    pub options: Option<MacroArg>,
    pub exposes: bool,
    pub is_async: bool,
}

pub fn analyze_setup(content: &str) -> Result<SetupScript> {
    let t = Tokens::new(content);
    let mut setup = SetupScript::default();
    let mut edits: Vec<(usize, usize, String)> = Vec::new();
    let mut i = 0;

    while i < t.len() {
        let top = t.depth(i) == 0 && t.is_statement_start(i);
        let after_dot = i > 0 && t.is_punct(i - 1, b'.');

        if top && t.is_ident(i, "import") && !t.is_punct(i + 1, b'(') && !t.is_punct(i + 1, b'.') {
            let end = t.statement_end(i);
            let start_byte = token_start(&t, i);
            setup.imports.push(MacroArg {
                code: t.slice(i, end).to_string(),
                line: line_of(content, start_byte),
            });

            let mut locals = Vec::new();
            import_bindings(&t, i, end, &mut locals);
            for local in locals {
                if local.starts_with(|c: char| c.is_ascii_uppercase()) {
                    setup.components.push(local.clone());
                }
                push_unique(&mut setup.bindings, local);
            }

            edits.push((start_byte, token_end(&t, end), String::new()));
            i = end + 1;
            continue;
        }

        if top && t.is_ident(i, "export") {
            let (line, _) = line_col(content, token_start(&t, i));
            bail!("<script setup> cannot contain exports (line {})", line);
        }

        if top && t.is_any_ident(i, &["const", "let", "var"]) {
            for name in t.declaration_names(i) {
                push_unique(&mut setup.bindings, name);
            }
        }

        if top {
            let keyword = if t.is_ident(i, "async") && t.is_ident(i + 1, "function") {
                Some(i + 1)
            } else if t.is_any_ident(i, &["function", "class"]) {
                Some(i)
            } else {
                None
            };
            if let Some(kw) = keyword {
                // generator functions
                let name = if t.is_punct(kw + 1, b'*') { kw + 2 } else { kw + 1 };
                if t.kind(name) == Some(TokenKind::Ident) {
                    push_unique(&mut setup.bindings, t.text(name).to_string());
                }
            }
        }

        if t.depth(i) == 0 && t.is_ident(i, "await") {
            setup.is_async = true;
        }

        if t.kind(i) == Some(TokenKind::Ident) && !after_dot {
            let name = t.text(i);
            match name {
                "defineProps" | "defineEmits" | "defineOptions" => {
                    let close = macro_call(&t, i, content)?;
                    let arg = if close > i + 2 {
                        let start_byte = token_start(&t, i + 2);
                        Some(MacroArg {
                            code: t.slice(i + 2, close - 1).to_string(),
                            line: line_of(content, start_byte),
                        })
                    } else {
                        None
                    };

                    let (slot, replacement) = match name {
                        "defineProps" => (&mut setup.props, "__props"),
                        "defineEmits" => (&mut setup.emits, "__emit"),
                        _ => (&mut setup.options, "void 0"),
                    };
                    if slot.is_some() {
                        bail!("{}() can only be called once", name);
                    }
                    *slot = Some(arg.unwrap_or(MacroArg {
                        code: "{}".to_string(),
                        line: line_of(content, token_start(&t, i)),
                    }));

                    edits.push((token_start(&t, i), token_end(&t, close), replacement.to_string()));
                    i = close + 1;
                    continue;
                }
                "defineExpose" => {
                    edits.push((token_start(&t, i), token_end(&t, i), "__expose".to_string()));
                    setup.exposes = true;
                }
                "withDefaults" | "defineModel" | "defineSlots" => {
                    let (line, _) = line_col(content, token_start(&t, i));
                    bail!("{}() is not supported (line {})", name, line);
                }
                _ => {}
            }
        }

        i += 1;
    }

    setup.body = replace_ranges(content, edits);
    Ok(setup)
}

/// Validate the call at `i` and return the index of its closing paren
fn macro_call(t: &Tokens, i: usize, content: &str) -> Result<usize> {
    let (line, _) = line_col(content, token_start(t, i));
    if t.is_punct(i + 1, b'<') {
        bail!("type-only {}<...>() declarations are not supported (line {})", t.text(i), line);
    }
    if !t.is_punct(i + 1, b'(') {
        bail!("{} must be called (line {})", t.text(i), line);
    }
    match t.matching(i + 1) {
        Some(close) => Ok(close),
        None => bail!("unterminated {}() call (line {})", t.text(i), line),
    }
}

/// Local names bound by the import statement spanning `start..=end`.
/// Type-only imports bind nothing.
fn import_bindings(t: &Tokens, start: usize, end: usize, out: &mut Vec<String>) {
    let mut j = start + 1;
    if t.is_ident(j, "type") && !t.is_punct(j + 1, b',') && !t.is_ident(j + 1, "from") {
        return;
    }

    while j <= end {
        if t.kind(j) == Some(TokenKind::Str) || t.is_ident(j, "from") {
            break;
        }
        if t.is_punct(j, b'*') {
            if t.is_ident(j + 1, "as") {
                out.push(t.text(j + 2).to_string());
            }
            j += 3;
            continue;
        }
        if t.is_punct(j, b'{') {
            let close = t.matching(j).unwrap_or(end);
            let mut k = j + 1;
            while k < close {
                let mut e = k;
                while e < close && !t.is_punct(e, b',') {
                    e += 1;
                }
                let type_only = t.is_ident(k, "type")
                    && e >= k + 2
                    && !(e == k + 3 && t.is_ident(k + 1, "as"));
                if e > k && !type_only {
                    out.push(t.text(e - 1).to_string());
                }
                k = e + 1;
            }
            j = close + 1;
            continue;
        }
        if t.kind(j) == Some(TokenKind::Ident) {
            out.push(t.text(j).to_string());
        }
        j += 1;
    }
}

fn push_unique(names: &mut Vec<String>, name: String) {
    if !names.contains(&name) {
        names.push(name);
    }
}

fn token_start(t: &Tokens, i: usize) -> usize {
    t.get(i).map(|tok| tok.start).unwrap_or(t.src.len())
}

fn token_end(t: &Tokens, i: usize) -> usize {
    t.get(i).map(|tok| tok.end).unwrap_or(t.src.len())
}

fn line_of(content: &str, offset: usize) -> u32 {
    content[..offset].matches('\n').count() as u32
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_rewrite_default_export() {
        let (code, found) =
            rewrite_default_export("import x from 'x'\nexport default {\n  name: 'A'\n}\n", "__sfc__").unwrap();
        assert!(found);
        assert_eq!(code, "import x from 'x'\nconst __sfc__ = {\n  name: 'A'\n}\n");

        let (code, found) = rewrite_default_export("const a = { default: 1 }", "__sfc__").unwrap();
        assert!(!found);
        assert_eq!(code, "const a = { default: 1 }");
    }

    #[test]
    fn test_analyze_setup() {
        let src = "\nimport { computed, type PropType } from 'vue'\nimport PageItem from './PageItem.vue'\n\nconst props = defineProps({\n  total: Number,\n})\nconst emit = defineEmits(['change'])\nconst pages = computed(() => props.total)\nfunction go(n) { emit('change', n) }\n";
        let setup = analyze_setup(src).unwrap();

        assert_eq!(setup.imports.len(), 2);
        assert_eq!(setup.imports[0].line, 1);
        assert_eq!(setup.imports[1].code, "import PageItem from './PageItem.vue'");
        assert_eq!(setup.components, vec!["PageItem"]);
        assert_eq!(setup.bindings, vec!["computed", "PageItem", "props", "emit", "pages", "go"]);

        let props = setup.props.unwrap();
        assert_eq!(props.code, "{\n  total: Number,\n}");
        assert_eq!(props.line, 4);
        assert_eq!(setup.emits.unwrap().code, "['change']");

        assert!(setup.body.contains("const props = __props\n"));
        assert!(setup.body.contains("const emit = __emit\n"));
        assert!(!setup.body.contains("import"));
        assert_eq!(setup.body.matches('\n').count(), src.matches('\n').count());
        assert!(!setup.exposes);
        assert!(!setup.is_async);
    }

    #[test]
    fn test_setup_expose_and_await() {
        let setup = analyze_setup("const data = await load()\ndefineExpose({ data })\n").unwrap();
        assert!(setup.is_async);
        assert!(setup.exposes);
        assert!(setup.body.contains("__expose({ data })"));
    }

    #[test]
    fn test_setup_rejections() {
        assert!(analyze_setup("export const a = 1").is_err());
        assert!(analyze_setup("const p = defineProps<{ a: number }>()").is_err());
        assert!(analyze_setup("const p = withDefaults(defineProps({}), {})").is_err());
        assert!(analyze_setup("defineProps({})\ndefineProps({})").is_err());
    }

    #[test]
    fn test_type_imports_bind_nothing() {
        let setup = analyze_setup("import type { Foo } from './types'\nimport * as utils from './utils'\n").unwrap();
        assert_eq!(setup.bindings, vec!["utils"]);
        assert!(setup.components.is_empty());
    }
}
