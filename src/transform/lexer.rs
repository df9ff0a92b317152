//! Minimal JavaScript/TypeScript tokenizer
//!
//! Good enough to find statement boundaries, bracket pairs and string
//! literals without confusing them with comments, templates or regular
//! expressions. It does not build an AST.

/// Kind of token
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Ident,
    Punct,
    Str,
    Template,
    Regex,
    Number,
}

/// A token as a byte range into the source
#[derive(Debug, Clone, Copy)]
pub struct Token {
    pub kind: TokenKind,
    pub start: usize,
    pub end: usize,
    /// A line break occurs between the previous token and this one
    pub newline_before: bool,
}

/// Lexical problem found while tokenizing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub offset: usize,
    pub message: String,
}

/// Keywords after which `/` starts a regular expression
const REGEX_PRECEDING_KEYWORDS: &[&str] = &[
    "return", "typeof", "instanceof", "in", "of", "new", "delete", "void", "throw", "case", "do",
    "else", "yield", "await",
];

/// Keywords that never end an expression
const NON_VALUE_KEYWORDS: &[&str] = &[
    "return", "typeof", "instanceof", "in", "of", "new", "delete", "void", "throw", "case", "do",
    "else", "yield", "await", "export", "import", "const", "let", "var", "function", "class",
    "extends", "if", "while", "for", "switch",
];

/// Tokenized source with bracket matching
pub struct Tokens<'a> {
    pub src: &'a str,
    tokens: Vec<Token>,
    matching: Vec<Option<usize>>,
    depth: Vec<u32>,
    diagnostics: Vec<Diagnostic>,
}

impl<'a> Tokens<'a> {
    pub fn new(src: &'a str) -> Self {
        let mut lexer = Lexer {
            src: src.as_bytes(),
            tokens: Vec::new(),
            diagnostics: Vec::new(),
        };
        lexer.run();

        let Lexer {
            tokens,
            mut diagnostics,
            ..
        } = lexer;

        let mut matching = vec![None; tokens.len()];
        let mut depth = vec![0u32; tokens.len()];
        let mut stack: Vec<usize> = Vec::new();
        let bytes = src.as_bytes();

        for (i, token) in tokens.iter().enumerate() {
            depth[i] = stack.len() as u32;
            if token.kind != TokenKind::Punct {
                continue;
            }
            match bytes[token.start] {
                b'(' | b'[' | b'{' => stack.push(i),
                close @ (b')' | b']' | b'}') => {
                    let expected = match close {
                        b')' => b'(',
                        b']' => b'[',
                        _ => b'{',
                    };
                    match stack.last() {
                        Some(&open) if bytes[tokens[open].start] == expected => {
                            stack.pop();
                            matching[open] = Some(i);
                            matching[i] = Some(open);
                            depth[i] = stack.len() as u32;
                        }
                        _ => diagnostics.push(Diagnostic {
                            offset: token.start,
                            message: format!("unexpected '{}'", close as char),
                        }),
                    }
                }
                _ => {}
            }
        }

        for open in stack {
            diagnostics.push(Diagnostic {
                offset: tokens[open].start,
                message: format!("unclosed '{}'", bytes[tokens[open].start] as char),
            });
        }

        Self {
            src,
            tokens,
            matching,
            depth,
            diagnostics,
        }
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    pub fn get(&self, i: usize) -> Option<&Token> {
        self.tokens.get(i)
    }

    pub fn kind(&self, i: usize) -> Option<TokenKind> {
        self.tokens.get(i).map(|t| t.kind)
    }

    pub fn text(&self, i: usize) -> &'a str {
        match self.tokens.get(i) {
            Some(t) => &self.src[t.start..t.end],
            None => "",
        }
    }

    /// Source text from the start of token `from` to the end of token `to`
    pub fn slice(&self, from: usize, to: usize) -> &'a str {
        &self.src[self.tokens[from].start..self.tokens[to].end]
    }

    pub fn is_punct(&self, i: usize, c: u8) -> bool {
        self.tokens
            .get(i)
            .map(|t| t.kind == TokenKind::Punct && self.src.as_bytes()[t.start] == c)
            .unwrap_or(false)
    }

    pub fn is_ident(&self, i: usize, name: &str) -> bool {
        self.kind(i) == Some(TokenKind::Ident) && self.text(i) == name
    }

    pub fn is_any_ident(&self, i: usize, names: &[&str]) -> bool {
        self.kind(i) == Some(TokenKind::Ident) && names.contains(&self.text(i))
    }

    pub fn newline_before(&self, i: usize) -> bool {
        self.tokens.get(i).map(|t| t.newline_before).unwrap_or(false)
    }

    /// Index of the bracket paired with the bracket at `i`
    pub fn matching(&self, i: usize) -> Option<usize> {
        self.matching.get(i).copied().flatten()
    }

    /// Bracket nesting depth at token `i`
    pub fn depth(&self, i: usize) -> u32 {
        self.depth.get(i).copied().unwrap_or(0)
    }

    /// Tokens `i` and `j` touch with nothing in between
    pub fn adjacent(&self, i: usize, j: usize) -> bool {
        match (self.tokens.get(i), self.tokens.get(j)) {
            (Some(a), Some(b)) => a.end == b.start,
            _ => false,
        }
    }

    /// `=>` starting at token `i`
    pub fn is_arrow(&self, i: usize) -> bool {
        self.is_punct(i, b'=') && self.is_punct(i + 1, b'>') && self.adjacent(i, i + 1)
    }

    pub fn is_opening(&self, i: usize) -> bool {
        self.is_punct(i, b'(') || self.is_punct(i, b'[') || self.is_punct(i, b'{')
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    /// Whether token `i` can be the last token of an expression
    pub fn ends_expression(&self, i: usize) -> bool {
        match self.kind(i) {
            Some(TokenKind::Ident) => !NON_VALUE_KEYWORDS.contains(&self.text(i)),
            Some(TokenKind::Str | TokenKind::Number | TokenKind::Template | TokenKind::Regex) => true,
            Some(TokenKind::Punct) => {
                self.is_punct(i, b')') || self.is_punct(i, b']') || self.is_punct(i, b'}')
            }
            None => false,
        }
    }

    /// Whether token `i` continues the expression on the previous line
    fn continues_expression(&self, i: usize) -> bool {
        if self.kind(i) == Some(TokenKind::Punct) {
            let c = self.src.as_bytes()[self.tokens[i].start];
            return b".,=+-*/%&|^?:<>".contains(&c);
        }
        self.is_any_ident(i, &["as", "satisfies", "instanceof", "in", "extends"])
    }

    /// Whether token `i` begins a statement
    pub fn is_statement_start(&self, i: usize) -> bool {
        if i == 0 {
            return true;
        }
        let prev = i - 1;
        if self.is_punct(prev, b';') || self.is_punct(prev, b'{') || self.is_punct(prev, b'}') {
            return true;
        }
        if !self.newline_before(i) {
            return false;
        }
        if self.kind(prev) == Some(TokenKind::Punct) {
            let c = self.src.as_bytes()[self.tokens[prev].start];
            return !b"=,([.+-*/%&|^!?:<>".contains(&c);
        }
        true
    }

    /// Index of the last token of the statement starting at `i`,
    /// including a terminating `;`
    pub fn statement_end(&self, i: usize) -> usize {
        let mut j = i;
        loop {
            if self.is_opening(j) {
                match self.matching(j) {
                    Some(close) => j = close,
                    None => return self.len().saturating_sub(1),
                }
            }
            let next = j + 1;
            if next >= self.len() {
                return j;
            }
            if self.is_punct(next, b';') {
                return next;
            }
            if self.newline_before(next)
                && self.ends_expression(j)
                && !self.continues_expression(next)
            {
                return j;
            }
            // A closing bracket belongs to an enclosing construct
            if self.is_punct(next, b')') || self.is_punct(next, b']') || self.is_punct(next, b'}') {
                return j;
            }
            j = next;
        }
    }

    /// Names bound by the `const`/`let`/`var` declaration whose keyword is at `kw`
    pub fn declaration_names(&self, kw: usize) -> Vec<String> {
        let end = self.statement_end(kw);
        let mut names = Vec::new();
        let mut j = kw + 1;

        while j <= end {
            if self.is_opening(j) {
                self.pattern_names(j, &mut names);
                j = self.matching(j).unwrap_or(end) + 1;
            } else if self.kind(j) == Some(TokenKind::Ident) {
                names.push(self.text(j).to_string());
                j += 1;
            } else {
                break;
            }

            // skip the initializer
            while j <= end && !self.is_punct(j, b',') {
                if self.is_opening(j) {
                    j = self.matching(j).unwrap_or(end);
                }
                j += 1;
            }
            j += 1;
        }

        names
    }

    /// Binding names declared by the destructuring pattern opened at `open`
    pub fn pattern_names(&self, open: usize, out: &mut Vec<String>) {
        let close = match self.matching(open) {
            Some(c) => c,
            None => return,
        };
        let is_object = self.is_punct(open, b'{');
        let mut j = open + 1;

        while j < close {
            // one element, up to the next top-level comma
            let mut elem_end = j;
            while elem_end < close && !self.is_punct(elem_end, b',') {
                if self.is_opening(elem_end) {
                    elem_end = self.matching(elem_end).unwrap_or(close);
                }
                elem_end += 1;
            }

            let mut k = j;
            // rest element
            while self.is_punct(k, b'.') && k < elem_end {
                k += 1;
            }
            if k < elem_end {
                // `key: target` in object patterns
                let target = if is_object && self.is_punct(k + 1, b':') && k + 1 < elem_end {
                    k + 2
                } else {
                    k
                };
                if self.is_opening(target) {
                    self.pattern_names(target, out);
                } else if self.kind(target) == Some(TokenKind::Ident) {
                    out.push(self.text(target).to_string());
                }
            }

            j = elem_end + 1;
        }
    }
}

struct Lexer<'s> {
    src: &'s [u8],
    tokens: Vec<Token>,
    diagnostics: Vec<Diagnostic>,
}

fn is_ident_start(c: u8) -> bool {
    c.is_ascii_alphabetic() || c == b'_' || c == b'$' || c == b'#' || c >= 0x80
}

fn is_ident_continue(c: u8) -> bool {
    c.is_ascii_alphanumeric() || c == b'_' || c == b'$' || c >= 0x80
}

impl<'s> Lexer<'s> {
    fn peek(&self, i: usize) -> u8 {
        self.src.get(i).copied().unwrap_or(0)
    }

    fn regex_allowed(&self) -> bool {
        let last = match self.tokens.last() {
            Some(t) => t,
            None => return true,
        };
        match last.kind {
            TokenKind::Punct => !matches!(self.src[last.start], b')' | b']' | b'}'),
            TokenKind::Ident => {
                let text = std::str::from_utf8(&self.src[last.start..last.end]).unwrap_or("");
                REGEX_PRECEDING_KEYWORDS.contains(&text)
            }
            _ => false,
        }
    }

    fn run(&mut self) {
        let len = self.src.len();
        let mut i = 0;
        let mut newline = false;

        while i < len {
            let c = self.src[i];

            if c == b'\n' {
                newline = true;
                i += 1;
                continue;
            }
            if c.is_ascii_whitespace() {
                i += 1;
                continue;
            }
            if c == b'/' && self.peek(i + 1) == b'/' {
                while i < len && self.src[i] != b'\n' {
                    i += 1;
                }
                continue;
            }
            if c == b'/' && self.peek(i + 1) == b'*' {
                match find(self.src, i + 2, b"*/") {
                    Some(end) => {
                        if self.src[i..end].contains(&b'\n') {
                            newline = true;
                        }
                        i = end + 2;
                    }
                    None => {
                        self.diagnostics.push(Diagnostic {
                            offset: i,
                            message: "unterminated comment".to_string(),
                        });
                        i = len;
                    }
                }
                continue;
            }

            let start = i;
            let kind = if c == b'"' || c == b'\'' {
                i = self.skip_string(i);
                TokenKind::Str
            } else if c == b'`' {
                i = self.skip_template(i);
                TokenKind::Template
            } else if is_ident_start(c) {
                i += 1;
                while i < len && is_ident_continue(self.src[i]) {
                    i += 1;
                }
                TokenKind::Ident
            } else if c.is_ascii_digit() || (c == b'.' && self.peek(i + 1).is_ascii_digit()) {
                i += 1;
                while i < len && (is_ident_continue(self.src[i]) || self.src[i] == b'.') {
                    i += 1;
                }
                TokenKind::Number
            } else if c == b'/' && self.regex_allowed() {
                i = self.skip_regex(i);
                TokenKind::Regex
            } else {
                i += 1;
                TokenKind::Punct
            };

            self.tokens.push(Token {
                kind,
                start,
                end: i,
                newline_before: newline,
            });
            newline = false;
        }
    }

    fn skip_string(&mut self, start: usize) -> usize {
        let quote = self.src[start];
        let mut i = start + 1;
        while i < self.src.len() {
            match self.src[i] {
                b'\\' => i += 2,
                b'\n' => break,
                c if c == quote => return i + 1,
                _ => i += 1,
            }
        }
        self.diagnostics.push(Diagnostic {
            offset: start,
            message: "unterminated string literal".to_string(),
        });
        i.min(self.src.len())
    }

    fn skip_template(&mut self, start: usize) -> usize {
        let mut i = start + 1;
        while i < self.src.len() {
            match self.src[i] {
                b'\\' => i += 2,
                b'`' => return i + 1,
                b'$' if self.peek(i + 1) == b'{' => i = self.skip_substitution(i + 2),
                _ => i += 1,
            }
        }
        self.diagnostics.push(Diagnostic {
            offset: start,
            message: "unterminated template literal".to_string(),
        });
        self.src.len()
    }

    /// Skip the code inside `${ ... }`, returning the index after `}`
    fn skip_substitution(&mut self, mut i: usize) -> usize {
        let mut depth = 0usize;
        while i < self.src.len() {
            match self.src[i] {
                b'{' => {
                    depth += 1;
                    i += 1;
                }
                b'}' => {
                    if depth == 0 {
                        return i + 1;
                    }
                    depth -= 1;
                    i += 1;
                }
                b'"' | b'\'' => i = self.skip_string(i),
                b'`' => i = self.skip_template(i),
                b'/' if self.peek(i + 1) == b'/' => {
                    while i < self.src.len() && self.src[i] != b'\n' {
                        i += 1;
                    }
                }
                b'/' if self.peek(i + 1) == b'*' => {
                    i = find(self.src, i + 2, b"*/").map(|e| e + 2).unwrap_or(self.src.len());
                }
                _ => i += 1,
            }
        }
        i
    }

    fn skip_regex(&mut self, start: usize) -> usize {
        let mut i = start + 1;
        let mut in_class = false;
        while i < self.src.len() {
            match self.src[i] {
                b'\\' => i += 2,
                b'[' => {
                    in_class = true;
                    i += 1;
                }
                b']' => {
                    in_class = false;
                    i += 1;
                }
                b'/' if !in_class => {
                    i += 1;
                    while i < self.src.len() && is_ident_continue(self.src[i]) {
                        i += 1;
                    }
                    return i;
                }
                b'\n' => break,
                _ => i += 1,
            }
        }
        self.diagnostics.push(Diagnostic {
            offset: start,
            message: "unterminated regular expression".to_string(),
        });
        i.min(self.src.len())
    }
}

fn find(haystack: &[u8], from: usize, needle: &[u8]) -> Option<usize> {
    if from >= haystack.len() {
        return None;
    }
    haystack[from..]
        .windows(needle.len())
        .position(|w| w == needle)
        .map(|p| p + from)
}

/// Line and column (both 1-based) of a byte offset
pub fn line_col(src: &str, offset: usize) -> (usize, usize) {
    let before = &src[..offset.min(src.len())];
    let line = before.matches('\n').count() + 1;
    let col = before.rfind('\n').map(|p| offset - p).unwrap_or(offset + 1);
    (line, col)
}

/// Replace every non-newline byte in `ranges` with a space
pub fn blank_ranges(src: &str, ranges: &[(usize, usize)]) -> String {
    let mut bytes = src.as_bytes().to_vec();
    for &(start, end) in ranges {
        for b in &mut bytes[start.min(src.len())..end.min(src.len())] {
            if *b != b'\n' && *b != b'\r' {
                *b = b' ';
            }
        }
    }
    // Ranges always cover whole tokens, which start and end on char boundaries
    String::from_utf8(bytes).unwrap_or_else(|e| String::from_utf8_lossy(e.as_bytes()).into_owned())
}

/// Apply `(start, end, replacement)` edits, keeping every line break of
/// the replaced text; overlapping edits after the first are dropped
pub fn replace_ranges(src: &str, mut edits: Vec<(usize, usize, String)>) -> String {
    edits.sort_by_key(|edit| edit.0);

    let mut out = String::with_capacity(src.len());
    let mut pos = 0;
    for (start, end, replacement) in edits {
        if start < pos {
            continue;
        }
        out.push_str(&src[pos..start]);
        out.push_str(&replacement);
        for _ in 0..src[start..end].matches('\n').count() {
            out.push('\n');
        }
        pos = end;
    }
    out.push_str(&src[pos..]);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(src: &str) -> Vec<(TokenKind, String)> {
        let tokens = Tokens::new(src);
        (0..tokens.len())
            .map(|i| (tokens.kind(i).unwrap(), tokens.text(i).to_string()))
            .collect()
    }

    #[test]
    fn test_strings_comments_and_templates() {
        let toks = kinds("a = 'x // y' // trailing\n/* b */ `t ${ '}' } u`");
        assert_eq!(toks[0], (TokenKind::Ident, "a".to_string()));
        assert_eq!(toks[2], (TokenKind::Str, "'x // y'".to_string()));
        assert_eq!(toks[3], (TokenKind::Template, "`t ${ '}' } u`".to_string()));
        assert_eq!(toks.len(), 4);
    }

    #[test]
    fn test_regex_versus_division() {
        let toks = kinds("x = a / b; y = /ab+c/gi.test(s)");
        assert!(toks.contains(&(TokenKind::Punct, "/".to_string())));
        assert!(toks.contains(&(TokenKind::Regex, "/ab+c/gi".to_string())));
    }

    #[test]
    fn test_matching_and_depth() {
        let tokens = Tokens::new("f(a, [b, {c}])");
        assert_eq!(tokens.matching(1), Some(tokens.len() - 1));
        assert_eq!(tokens.depth(2), 1);
        assert!(tokens.diagnostics().is_empty());
    }

    #[test]
    fn test_diagnostics() {
        assert_eq!(Tokens::new("let s = 'abc\n").diagnostics().len(), 1);
        assert_eq!(Tokens::new("f(a").diagnostics().len(), 1);
        assert_eq!(Tokens::new("a)").diagnostics().len(), 1);
        assert_eq!(Tokens::new("/* open").diagnostics().len(), 1);
    }

    #[test]
    fn test_statement_end() {
        let src = "const a = {\n  b: 1\n}\nconst c = 2;\nfoo()\n  .bar()\n";
        let tokens = Tokens::new(src);
        let end = tokens.statement_end(0);
        assert_eq!(tokens.text(end), "}");
        let next = end + 1;
        assert!(tokens.is_statement_start(next));
        let end = tokens.statement_end(next);
        assert_eq!(tokens.text(end), ";");
        let end = tokens.statement_end(end + 1);
        assert_eq!(tokens.text(end), ")");
        assert_eq!(end, tokens.len() - 1);
    }

    #[test]
    fn test_pattern_names() {
        let tokens = Tokens::new("{ a, b: c, d = 1, e: { f }, ...rest }");
        let mut names = Vec::new();
        tokens.pattern_names(0, &mut names);
        assert_eq!(names, vec!["a", "c", "d", "f", "rest"]);

        let tokens = Tokens::new("[x, , [y], ...z]");
        let mut names = Vec::new();
        tokens.pattern_names(0, &mut names);
        assert_eq!(names, vec!["x", "y", "z"]);
    }

    #[test]
    fn test_declaration_names() {
        let tokens = Tokens::new("const a = f(1, 2), { b, c: [d] } = obj, e;\nlet x = 1");
        assert_eq!(tokens.declaration_names(0), vec!["a", "b", "d", "e"]);
    }

    #[test]
    fn test_blank_ranges_keeps_lines() {
        let out = blank_ranges("ab\ncd", &[(1, 4)]);
        assert_eq!(out, "a \n d");
    }

    #[test]
    fn test_replace_ranges_keeps_lines() {
        let out = replace_ranges("a(\n1\n);b", vec![(7, 8, "c".to_string()), (0, 6, "x".to_string())]);
        assert_eq!(out, "x\n\n;c");
    }

    #[test]
    fn test_line_col() {
        assert_eq!(line_col("ab\ncd", 0), (1, 1));
        assert_eq!(line_col("ab\ncd", 4), (2, 2));
    }
}
