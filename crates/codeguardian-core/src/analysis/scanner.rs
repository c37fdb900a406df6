//! Single-pass lexical scan of raw source text
//!
//! The scanner never builds a syntax tree. It walks the text once, skipping
//! comments and string literals, and records:
//! - branching/looping keyword occurrences
//! - brace counts
//! - loop headers found inside another loop body
//! - linear membership calls (`.includes(` and friends) inside loop bodies
//!
//! Loop bodies are tracked through braces (`for (...) { }`), indentation
//! (`for x in xs:` followed by an indented block) and brace-less single
//! statements (`for (...) stmt;`). Work is linear in the input length.

const COMPLEXITY_KEYWORDS: [&[u8]; 5] = [b"if", b"for", b"while", b"switch", b"case"];
const LOOKUP_METHODS: [&[u8]; 4] = [b"includes", b"indexOf", b"lastIndexOf", b"contains"];
const TAB_WIDTH: usize = 4;

/// Raw counts produced by [`scan`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanSummary {
    pub lines: usize,
    pub complexity_keywords: usize,
    pub nested_loops: usize,
    pub lookup_in_loop: bool,
    pub open_braces: usize,
    pub close_braces: usize,
}

/// Scan `source` in one pass
pub fn scan(source: &str) -> ScanSummary {
    let mut scanner = Scanner::default();
    let mut lines = 0;

    for line in source.lines() {
        scanner.scan_line(line.as_bytes());
        lines += 1;
    }

    let mut summary = scanner.summary;
    summary.lines = lines;
    summary.nested_loops = scanner.loops.nested;
    summary
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
enum Mode {
    #[default]
    Code,
    BlockComment,
    TemplateLiteral,
    TripleQuote(u8),
}

#[derive(Default)]
struct Scanner {
    summary: ScanSummary,
    mode: Mode,
    loops: LoopTracker,
    prev_significant: u8,
}

impl Scanner {
    fn scan_line(&mut self, bytes: &[u8]) {
        let indent = indentation(bytes);
        let mut line_started = false;
        let mut line_last: Option<u8> = None;
        let mut i = 0;

        while i < bytes.len() {
            match self.mode {
                Mode::BlockComment => match find(bytes, i, b"*/") {
                    Some(end) => {
                        self.mode = Mode::Code;
                        i = end + 2;
                    }
                    None => i = bytes.len(),
                },
                Mode::TemplateLiteral => match find_unescaped(bytes, i, b'`') {
                    Some(end) => {
                        self.mode = Mode::Code;
                        i = end + 1;
                    }
                    None => i = bytes.len(),
                },
                Mode::TripleQuote(quote) => match find(bytes, i, &[quote, quote, quote]) {
                    Some(end) => {
                        self.mode = Mode::Code;
                        i = end + 3;
                    }
                    None => i = bytes.len(),
                },
                Mode::Code => {
                    let byte = bytes[i];

                    if byte.is_ascii_whitespace() {
                        i += 1;
                        continue;
                    }
                    if bytes[i..].starts_with(b"//") {
                        break;
                    }
                    if bytes[i..].starts_with(b"/*") {
                        self.mode = Mode::BlockComment;
                        i += 2;
                        continue;
                    }
                    if byte == b'#' && is_hash_comment(bytes, i, line_started) {
                        break;
                    }

                    if !line_started {
                        line_started = true;
                        self.loops.line_start(indent);
                    }

                    i = self.scan_token(bytes, i, indent);
                    line_last = Some(self.prev_significant);
                }
            }
        }

        self.loops.end_line(line_last == Some(b':'));
    }

    /// Consume one token starting at `i`, return the index after it
    fn scan_token(&mut self, bytes: &[u8], i: usize, indent: usize) -> usize {
        let byte = bytes[i];

        if byte == b'\''
            && let Some(end) = lifetime_end(bytes, i, self.prev_significant)
        {
            self.prev_significant = b'a';
            self.loops.token();
            return end;
        }

        match byte {
            b'"' | b'\'' => {
                self.prev_significant = b'"';
                self.loops.token();
                if bytes[i..].starts_with(&[byte, byte, byte]) {
                    self.mode = Mode::TripleQuote(byte);
                    return i + 3;
                }
                // An unterminated quote (labels, apostrophes) is a plain character
                match find_unescaped(bytes, i + 1, byte) {
                    Some(end) => end + 1,
                    None => i + 1,
                }
            }
            b'`' => {
                self.prev_significant = b'"';
                self.loops.token();
                self.mode = Mode::TemplateLiteral;
                i + 1
            }
            b'{' => {
                self.summary.open_braces += 1;
                self.prev_significant = byte;
                self.loops.open_brace();
                i + 1
            }
            b'}' => {
                self.summary.close_braces += 1;
                self.prev_significant = byte;
                self.loops.close_brace();
                i + 1
            }
            b'(' | b'[' => {
                self.prev_significant = byte;
                self.loops.open_paren();
                i + 1
            }
            b')' | b']' => {
                self.prev_significant = byte;
                self.loops.close_paren();
                i + 1
            }
            b';' => {
                self.prev_significant = byte;
                self.loops.semicolon();
                i + 1
            }
            b':' => match bytes.get(i + 1).copied() {
                // `:=` and `::` are operators, not the end of a header
                Some(b'=') => {
                    self.prev_significant = b'=';
                    self.loops.token();
                    i + 2
                }
                Some(b':') => {
                    self.prev_significant = b'.';
                    self.loops.token();
                    i + 2
                }
                Some(next) if !next.is_ascii_whitespace() => {
                    self.prev_significant = byte;
                    self.loops.token();
                    i + 1
                }
                _ => {
                    self.prev_significant = byte;
                    self.loops.colon();
                    i + 1
                }
            },
            b'/' if starts_regex(self.prev_significant) => match regex_end(bytes, i) {
                Some(end) => {
                    self.prev_significant = b'"';
                    self.loops.token();
                    ident_end(bytes, end)
                }
                None => {
                    self.prev_significant = byte;
                    self.loops.token();
                    i + 1
                }
            },
            c if is_ident_start(c) => {
                let end = ident_end(bytes, i);
                self.word(&bytes[i..end], bytes, end, indent);
                end
            }
            c if c.is_ascii_digit() => {
                self.prev_significant = b'0';
                self.loops.token();
                ident_end(bytes, i)
            }
            _ => {
                self.prev_significant = byte;
                self.loops.token();
                i + 1
            }
        }
    }

    fn word(&mut self, word: &[u8], bytes: &[u8], end: usize, indent: usize) {
        let is_member = self.prev_significant == b'.';
        self.prev_significant = b'a';

        if is_member {
            if LOOKUP_METHODS.contains(&word)
                && next_significant(bytes, end) == Some(b'(')
                && self.loops.in_loop()
            {
                self.summary.lookup_in_loop = true;
            }
            self.loops.token();
            return;
        }

        if COMPLEXITY_KEYWORDS.contains(&word) {
            self.summary.complexity_keywords += 1;
        }

        match word {
            b"for" | b"while" | b"do" => self.loops.loop_keyword(word == b"do", word == b"while", indent),
            _ => self.loops.token(),
        }
    }
}

/// A loop header seen but whose body has not started yet
#[derive(Debug, Clone, Copy)]
struct PendingLoop {
    paren_depth: usize,
    indent: usize,
    is_do: bool,
    /// Header written as `keyword (...)`
    c_style: bool,
    first_token_seen: bool,
    header_closed: bool,
    body_started: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FrameKind {
    Brace,
    Indent(usize),
}

#[derive(Debug, Clone, Copy)]
struct Frame {
    kind: FrameKind,
    loop_body: bool,
    is_do: bool,
}

#[derive(Default)]
struct LoopTracker {
    frames: Vec<Frame>,
    loop_depth: usize,
    paren_depth: usize,
    pending: Option<PendingLoop>,
    awaiting_do_while: bool,
    nested: usize,
}

impl LoopTracker {
    fn in_loop(&self) -> bool {
        self.loop_depth > 0 || self.pending.is_some_and(|p| p.header_closed)
    }

    fn pending_at_level(&self) -> Option<PendingLoop> {
        self.pending.filter(|p| p.paren_depth == self.paren_depth)
    }

    fn loop_keyword(&mut self, is_do: bool, is_while: bool, indent: usize) {
        if is_while && self.awaiting_do_while {
            // tail of `do { } while (...)`
            self.awaiting_do_while = false;
            self.token();
            return;
        }
        self.awaiting_do_while = false;

        if self.loop_depth > 0 || self.pending.is_some() {
            self.nested += 1;
        }

        self.pending = Some(PendingLoop {
            paren_depth: self.paren_depth,
            indent,
            is_do,
            c_style: is_do,
            first_token_seen: is_do,
            header_closed: is_do,
            body_started: false,
        });
    }

    fn token(&mut self) {
        let depth = self.paren_depth;
        if let Some(p) = self.pending.as_mut() {
            if p.paren_depth == depth {
                p.first_token_seen = true;
                if p.header_closed {
                    p.body_started = true;
                }
            }
        }
    }

    fn open_paren(&mut self) {
        let depth = self.paren_depth;
        if let Some(p) = self.pending.as_mut() {
            if p.paren_depth == depth {
                if !p.first_token_seen {
                    p.c_style = true;
                    p.first_token_seen = true;
                } else if p.header_closed {
                    p.body_started = true;
                }
            }
        }
        self.paren_depth += 1;
    }

    fn close_paren(&mut self) {
        self.paren_depth = self.paren_depth.saturating_sub(1);
        let depth = self.paren_depth;
        if let Some(p) = self.pending.as_mut() {
            if p.paren_depth == depth && p.c_style && !p.header_closed {
                p.header_closed = true;
            }
        }
    }

    fn colon(&mut self) {
        let depth = self.paren_depth;
        if let Some(p) = self.pending.as_mut() {
            if p.paren_depth == depth {
                p.first_token_seen = true;
                p.header_closed = true;
            }
        }
    }

    fn semicolon(&mut self) {
        self.awaiting_do_while = false;
        if let Some(p) = self.pending_at_level() {
            // `;` ends a brace-less body; Go style headers keep theirs
            if p.c_style {
                self.pending = None;
            }
        }
    }

    fn open_brace(&mut self) {
        self.awaiting_do_while = false;

        match self.pending_at_level() {
            // Either the loop's own block or a block opened by its brace-less
            // body (`for (...) if (c) { ... }`); both keep the loop context
            Some(p) => {
                if p.body_started {
                    self.token();
                }
                self.frames.push(Frame {
                    kind: FrameKind::Brace,
                    loop_body: true,
                    is_do: p.is_do && !p.body_started,
                });
                self.loop_depth += 1;
                self.pending = None;
            }
            _ => {
                self.token();
                self.frames.push(Frame {
                    kind: FrameKind::Brace,
                    loop_body: false,
                    is_do: false,
                });
            }
        }
    }

    fn close_brace(&mut self) {
        self.pending = None;
        self.awaiting_do_while = false;

        if !self.frames.iter().any(|f| f.kind == FrameKind::Brace) {
            return;
        }

        while let Some(frame) = self.frames.pop() {
            if frame.loop_body {
                self.loop_depth -= 1;
            }
            if frame.kind == FrameKind::Brace {
                self.awaiting_do_while = frame.is_do;
                break;
            }
        }
    }

    fn line_start(&mut self, indent: usize) {
        while let Some(frame) = self.frames.last() {
            match frame.kind {
                FrameKind::Indent(header_indent) if indent <= header_indent => {
                    if frame.loop_body {
                        self.loop_depth -= 1;
                    }
                    self.frames.pop();
                }
                _ => break,
            }
        }
    }

    fn end_line(&mut self, ends_with_colon: bool) {
        let Some(p) = self.pending_at_level() else {
            return;
        };

        if ends_with_colon {
            self.frames.push(Frame {
                kind: FrameKind::Indent(p.indent),
                loop_body: true,
                is_do: false,
            });
            self.loop_depth += 1;
            self.pending = None;
        } else if p.body_started || !p.c_style {
            self.pending = None;
        }
    }
}

fn indentation(bytes: &[u8]) -> usize {
    bytes
        .iter()
        .take_while(|b| **b == b' ' || **b == b'\t')
        .map(|b| if *b == b'\t' { TAB_WIDTH } else { 1 })
        .sum()
}

fn is_ident_start(byte: u8) -> bool {
    byte.is_ascii_alphabetic() || byte == b'_' || byte == b'$' || byte >= 0x80
}

fn is_ident_continue(byte: u8) -> bool {
    is_ident_start(byte) || byte.is_ascii_digit()
}

fn ident_end(bytes: &[u8], start: usize) -> usize {
    let mut end = start;
    while end < bytes.len() && is_ident_continue(bytes[end]) {
        end += 1;
    }
    end
}

fn next_significant(bytes: &[u8], from: usize) -> Option<u8> {
    bytes[from..].iter().copied().find(|b| !b.is_ascii_whitespace())
}

/// `#` starts a comment at the beginning of a line or after whitespace
/// when followed by a space
fn is_hash_comment(bytes: &[u8], i: usize, line_started: bool) -> bool {
    if !line_started {
        return true;
    }
    let after_space = i > 0 && bytes[i - 1].is_ascii_whitespace();
    let before_space = bytes.get(i + 1).is_none_or(|b| b.is_ascii_whitespace());
    after_space && before_space
}

/// A Rust lifetime (`&'a`, `<'a>`, `T: 'static`) at `i`, returns the index after its name
fn lifetime_end(bytes: &[u8], i: usize, prev: u8) -> Option<usize> {
    let start = i + 1;
    if !bytes.get(start).is_some_and(|b| is_ident_start(*b)) {
        return None;
    }
    let end = ident_end(bytes, start);

    let closes_bound = match bytes.get(end).copied() {
        // a character literal such as 'a'
        Some(b'\'') => return None,
        None => true,
        Some(b) if b.is_ascii_whitespace() => matches!(
            next_significant(bytes, end),
            None | Some(b'+' | b'>' | b',' | b')' | b';')
        ),
        Some(b) => matches!(b, b'>' | b',' | b')' | b';' | b'+'),
    };

    let lifetime = match prev {
        b'&' | b'<' => i > 0 && bytes[i - 1] == prev,
        b',' | b'+' | b':' => closes_bound,
        _ => false,
    };
    lifetime.then_some(end)
}

/// A `/` after one of these opens a regex literal rather than dividing
fn starts_regex(prev: u8) -> bool {
    matches!(
        prev,
        0 | b'(' | b',' | b'=' | b':' | b'[' | b'!' | b'&' | b'|' | b'?' | b'{' | b';' | b'+' | b'-'
            | b'*' | b'%' | b'>' | b'~' | b'^'
    )
}

/// End of the regex literal opened at `i`, past its closing `/`.
/// Slashes inside a `[...]` class do not close it. `None` when the line ends first.
fn regex_end(bytes: &[u8], i: usize) -> Option<usize> {
    let mut in_class = false;
    let mut j = i + 1;
    while j < bytes.len() {
        match bytes[j] {
            b'\\' => j += 2,
            b'[' => {
                in_class = true;
                j += 1;
            }
            b']' => {
                in_class = false;
                j += 1;
            }
            b'/' if !in_class => return Some(j + 1),
            _ => j += 1,
        }
    }
    None
}

fn find(bytes: &[u8], from: usize, needle: &[u8]) -> Option<usize> {
    if needle.is_empty() || from >= bytes.len() {
        return None;
    }
    bytes[from..]
        .windows(needle.len())
        .position(|w| w == needle)
        .map(|pos| from + pos)
}

fn find_unescaped(bytes: &[u8], from: usize, quote: u8) -> Option<usize> {
    let mut j = from;
    while j < bytes.len() {
        match bytes[j] {
            b'\\' => j += 2,
            b if b == quote => return Some(j),
            _ => j += 1,
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_input() {
        assert_eq!(scan(""), ScanSummary::default());
        let blank = scan("   \n\t\n");
        assert_eq!(blank.lines, 2);
        assert_eq!(blank.complexity_keywords, 0);
    }

    #[test]
    fn test_keywords_are_whole_words() {
        let summary = scan("const format = information; forEach(ifx); doThing(while_);");
        assert_eq!(summary.complexity_keywords, 0);
        assert_eq!(summary.nested_loops, 0);
    }

    #[test]
    fn test_keywords_in_comments_and_strings_are_ignored() {
        let code = r#"
// for each item if needed
/* while { */
const s = "for (;;) { if }";
const t = 'if';
"#;
        let summary = scan(code);
        assert_eq!(summary.complexity_keywords, 0);
        assert_eq!(summary.open_braces, 0);
        assert_eq!(summary.close_braces, 0);
    }

    #[test]
    fn test_switch_case_counting() {
        let code = "switch (x) {\n case 1: a(); break;\n case 2: b(); break;\n}";
        let summary = scan(code);
        assert_eq!(summary.complexity_keywords, 3);
    }

    #[test]
    fn test_sequential_loops_are_not_nested() {
        let code = "for (let i = 0; i < n; i++) { a(i); }\nfor (let j = 0; j < n; j++) { b(j); }";
        let summary = scan(code);
        assert_eq!(summary.nested_loops, 0);
        assert_eq!(summary.complexity_keywords, 2);
    }

    #[test]
    fn test_brace_nested_loops() {
        let code = r#"
for (let i = 0; i < n; i++) {
  for (let j = 0; j < n; j++) {
    while (k < j) { k++; }
  }
}
"#;
        assert_eq!(scan(code).nested_loops, 2);
    }

    #[test]
    fn test_allman_style_loops() {
        let code = "for (int i = 0; i < n; i++)\n{\n    for (int j = 0; j < n; j++)\n    {\n        x++;\n    }\n}\n";
        assert_eq!(scan(code).nested_loops, 1);
    }

    #[test]
    fn test_braceless_nested_loop() {
        let code = "for (i = 0; i < n; i++)\n  for (j = 0; j < n; j++)\n    total += i * j;\nfor (k = 0; k < n; k++) x++;";
        assert_eq!(scan(code).nested_loops, 1);
    }

    #[test]
    fn test_braceless_body_ends_at_semicolon() {
        let code = "for (i = 0; i < n; i++) total += i;\nwhile (x > 0) x--;";
        assert_eq!(scan(code).nested_loops, 0);
    }

    #[test]
    fn test_indentation_nested_loops() {
        let code = r#"
def pairs(items):
    for a in items:
        if a:
            for b in items:
                print(a, b)
    for c in items:
        print(c)
"#;
        let summary = scan(code);
        assert_eq!(summary.nested_loops, 1);
        assert_eq!(summary.complexity_keywords, 4);
    }

    #[test]
    fn test_python_one_liner_loop() {
        let code = "for a in items: print(a)\nfor b in items:\n    print(b)\n";
        assert_eq!(scan(code).nested_loops, 0);
    }

    #[test]
    fn test_rust_style_loops() {
        let code = r#"
fn f<'a>(grid: &'a [Vec<u8>]) {
    for row in grid.iter().rev() {
        for cell in row {
            println!("{}", cell);
        }
    }
}
"#;
        let summary = scan(code);
        assert_eq!(summary.nested_loops, 1);
        assert_eq!(summary.open_braces, summary.close_braces);
    }

    #[test]
    fn test_go_short_declaration_loops() {
        let code = "for i := 0; i < n; i++ {\n\tfor j := 0; j < n; j++ {\n\t\tsum += i * j\n\t}\n}";
        let summary = scan(code);
        assert_eq!(summary.nested_loops, 1);
        assert_eq!(summary.open_braces, summary.close_braces);
    }

    #[test]
    fn test_path_separator_keeps_header_open() {
        let code = "for x in std::iter::repeat(1).take(3) {\n    for y in 0..x {\n        total += y;\n    }\n}";
        assert_eq!(scan(code).nested_loops, 1);
    }

    #[test]
    fn test_braceless_body_opening_a_block() {
        let code = "for (i = 0; i < n; i++) if (a[i]) {\n  seen++;\n  for (j = 0; j < n; j++) x++;\n}";
        let summary = scan(code);
        assert_eq!(summary.nested_loops, 1);
        assert_eq!(summary.complexity_keywords, 3);
    }

    #[test]
    fn test_braceless_body_block_tracks_lookups() {
        let code = "for (const x of xs) if (x) {\n  seen++;\n  if (ys.includes(x)) hits++;\n}";
        assert!(scan(code).lookup_in_loop);
    }

    #[test]
    fn test_rust_lifetimes_are_not_strings() {
        let code = r#"
struct View<'a> { items: &'a [u8], count: usize }
fn keep<T: 'static>(value: T) -> Box<dyn Fn() -> T + 'static> {
    let open = '{';
    Box::new(move || value)
}
"#;
        let summary = scan(code);
        assert_eq!(summary.open_braces, 2);
        assert_eq!(summary.close_braces, 2);
    }

    #[test]
    fn test_quoted_text_after_operators_stays_a_string() {
        let code = "const a = cond && 'if {';\nsetTitle(x, 'while {');\nconst b = 'for {';";
        let summary = scan(code);
        assert_eq!(summary.complexity_keywords, 0);
        assert_eq!(summary.open_braces, 0);
    }

    #[test]
    fn test_regex_literals_are_skipped() {
        let code = "const re = /{/;\nconst close = /[/}]+/g;\nif (re.test(s)) { run(); }\nitems.filter(s => /^for\\s/.test(s));";
        let summary = scan(code);
        assert_eq!(summary.open_braces, 1);
        assert_eq!(summary.close_braces, 1);
        assert_eq!(summary.complexity_keywords, 1);
    }

    #[test]
    fn test_division_is_not_a_regex() {
        let code = "const r = (a + b) / 2; if (r) { x = a / b; }";
        let summary = scan(code);
        assert_eq!(summary.open_braces, 1);
        assert_eq!(summary.close_braces, 1);
        assert_eq!(summary.complexity_keywords, 1);
    }

    #[test]
    fn test_do_while_is_one_loop() {
        let code = "do {\n  x++;\n} while (x < 10);\nfor (;;) { break; }";
        assert_eq!(scan(code).nested_loops, 0);
    }

    #[test]
    fn test_loop_inside_callback() {
        let code = "items.forEach(function (item) {\n  for (const k of keys) { use(k); }\n});";
        let summary = scan(code);
        assert_eq!(summary.nested_loops, 0);
        assert_eq!(summary.open_braces, 2);
        assert_eq!(summary.close_braces, 2);
    }

    #[test]
    fn test_lookup_inside_loop() {
        let code = "for (const x of a) {\n  if (b.includes(x)) { hits++; }\n}";
        assert!(scan(code).lookup_in_loop);
    }

    #[test]
    fn test_lookup_outside_loop() {
        let code = "if (b.includes(x)) { hits++; }\nfor (const y of a) { use(y); }";
        assert!(!scan(code).lookup_in_loop);
    }

    #[test]
    fn test_brace_counts() {
        let summary = scan("function f() { if (a) { b(); }");
        assert_eq!(summary.open_braces, 2);
        assert_eq!(summary.close_braces, 1);
    }

    #[test]
    fn test_template_literal_spans_lines() {
        let code = "const html = `\n  <div>{</div>\n  for while\n`;\nconst y = 1;";
        let summary = scan(code);
        assert_eq!(summary.open_braces, 0);
        assert_eq!(summary.complexity_keywords, 0);
    }

    #[test]
    fn test_hash_comments() {
        let code = "# for every key {\nx = 1  # if {\ny = obj.#private";
        let summary = scan(code);
        assert_eq!(summary.complexity_keywords, 0);
        assert_eq!(summary.open_braces, 0);
    }

    #[test]
    fn test_linear_on_large_input() {
        let block = "for (let i = 0; i < n; i++) {\n  for (let j = 0; j < n; j++) { x++; }\n}\n";
        let code = block.repeat(20_000);
        let summary = scan(&code);
        assert_eq!(summary.nested_loops, 20_000);
        assert_eq!(summary.lines, 60_000);
    }
}
