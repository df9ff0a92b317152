//! Whitespace and comment removal that keeps line boundaries
//!
//! Output lines correspond one-to-one with input lines, so source maps
//! stay valid after minification.

use super::lexer::{TokenKind, Tokens};

/// Minify JavaScript code (line-preserving)
pub fn minify_js(code: &str) -> String {
    let tokens = Tokens::new(code);
    let mut out = String::with_capacity(code.len());
    let mut prev_end = 0;

    for i in 0..tokens.len() {
        let token = match tokens.get(i) {
            Some(t) => *t,
            None => break,
        };
        let gap = &code[prev_end..token.start];
        let newlines = gap.matches('\n').count();

        if newlines > 0 {
            for _ in 0..newlines {
                out.push('\n');
            }
        } else if !gap.is_empty() && i > 0 && needs_space(&tokens, i - 1, i) {
            out.push(' ');
        }

        out.push_str(&code[token.start..token.end]);
        prev_end = token.end;
    }

    // keep trailing line breaks
    let trailing = code[prev_end..].matches('\n').count();
    for _ in 0..trailing {
        out.push('\n');
    }

    out
}

fn needs_space(tokens: &Tokens, prev: usize, next: usize) -> bool {
    let word = |kind| matches!(kind, Some(TokenKind::Ident | TokenKind::Number | TokenKind::Regex));
    let prev_kind = tokens.kind(prev);
    let next_kind = tokens.kind(next);

    if word(prev_kind) && matches!(next_kind, Some(TokenKind::Ident | TokenKind::Number)) {
        return true;
    }
    // `a + +b`, `a - -b`
    if (tokens.is_punct(prev, b'+') && tokens.is_punct(next, b'+'))
        || (tokens.is_punct(prev, b'-') && tokens.is_punct(next, b'-'))
    {
        return true;
    }
    // `1 .toString()`
    prev_kind == Some(TokenKind::Number) && tokens.is_punct(next, b'.')
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_minify_keeps_lines() {
        let src = "// header\nfunction add(a, b) {\n  /* sum\n     it */\n  return a + +b; // done\n}\n";
        let out = minify_js(src);
        assert_eq!(out, "\nfunction add(a,b){\n\n\nreturn a+ +b;\n}\n");
        assert_eq!(out.lines().count(), src.lines().count());
    }

    #[test]
    fn test_minify_keeps_strings() {
        let src = "const s = 'a  //  b';  const t = `x   ${ y }`;";
        assert_eq!(minify_js(src), "const s='a  //  b';const t=`x   ${ y }`;");
    }
}
