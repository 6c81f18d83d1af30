//! Comment and docstring removal.
//!
//! Walks the token stream once and re-emits every surviving token at its
//! original column, so the stripped text keeps the layout of the input.
//! Comments are dropped, and so is every string token that starts with a
//! triple quote, whether or not it sits in docstring position.

use std::borrow::Cow;

use crate::lexer::{tokenize, Position, SourceSyntaxError, Token, TokenKind};

/// Statements whose header ends with a `:` that opens a suite.
const COMPOUND_KEYWORDS: &[&str] = &[
    "if", "elif", "else", "for", "while", "try", "except", "finally", "with", "def", "class",
    "async", "match", "case",
];

/// Remove comments and triple-quoted strings from Python source.
///
/// A suite left with no statements once its strings are gone receives a
/// `pass` where the first removed string stood, so
/// `def f():\n    """Doc."""\n` becomes `def f():\n    pass\n`.
///
/// # Examples
///
/// ```
/// use sagg::strip::strip;
///
/// let stripped = strip("x = 1  # one\n").unwrap();
/// assert_eq!(stripped, "x = 1\n");
/// ```
pub fn strip(source: &str) -> Result<String, SourceSyntaxError> {
    let tokens = tokenize(source)?;
    let mut emitter = Emitter::new(source);
    for token in &tokens {
        emitter.feed(token);
    }
    Ok(emitter.finish())
}

/// Whether a string token is removed as documentation.
pub fn is_doc_string(text: &str) -> bool {
    text.starts_with("\"\"\"") || text.starts_with("'''")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SuiteKind {
    /// Indented block, closed by its `Dedent`.
    Block,
    /// Statements after a header's `:` on the same line.
    Inline,
}

#[derive(Debug)]
struct Suite {
    kind: SuiteKind,
    has_code: bool,
    placeholder: Option<Placeholder>,
}

/// Where a `pass` goes if the suite ends up empty.
#[derive(Debug)]
struct Placeholder {
    offset: usize,
    padding: String,
}

struct Emitter<'a> {
    source: &'a str,
    line_starts: Vec<usize>,
    out: String,
    last_line: usize,
    last_column: usize,
    depth: usize,
    line_head: Option<&'a str>,
    suites: Vec<Suite>,
    /// Whether the current simple statement has emitted code.
    statement_has_code: bool,
    /// Span of the first string removed from a statement still without code.
    statement_removed: Option<(Position, Position)>,
}

impl<'a> Emitter<'a> {
    fn new(source: &'a str) -> Self {
        Self {
            source,
            line_starts: line_starts(source),
            out: String::with_capacity(source.len()),
            last_line: 0,
            last_column: 0,
            depth: 0,
            line_head: None,
            suites: Vec::new(),
            statement_has_code: false,
            statement_removed: None,
        }
    }

    fn feed(&mut self, token: &Token<'a>) {
        match token.kind {
            TokenKind::Comment | TokenKind::EndMarker => {}
            TokenKind::String if is_doc_string(token.text) => self.remove(token),
            TokenKind::Indent => self.open(SuiteKind::Block),
            TokenKind::Dedent => self.close_block(),
            TokenKind::Newline => {
                self.close_inline();
                self.line_head = None;
                self.end_statement();
                self.write_break(token);
            }
            TokenKind::Nl => self.write_break(token),
            _ => self.write(token),
        }
    }

    fn finish(mut self) -> String {
        while let Some(suite) = self.suites.pop() {
            self.settle(suite);
        }
        self.out
    }

    fn write(&mut self, token: &Token<'a>) {
        // `'''doc'''; x = 1` would otherwise leave a bare `;`.
        if token.kind == TokenKind::Op && token.text == ";" && !self.statement_has_code {
            if let Some((start, end)) = self.statement_removed.take() {
                let padding = self.padding(start);
                self.out.push_str(&padding);
                self.out.push_str("pass");
                self.advance(end);
            }
        }

        let padding = self.padding(token.start);
        self.out.push_str(&padding);
        self.out.push_str(token.text);
        self.advance(token.end);

        if token.kind == TokenKind::LineJoin {
            return;
        }
        if let Some(suite) = self.suites.last_mut() {
            suite.has_code = true;
        }
        self.statement_has_code = true;
        if self.line_head.is_none() {
            self.line_head = Some(token.text);
        }
        if token.kind != TokenKind::Op {
            return;
        }

        match token.text {
            "(" | "[" | "{" => self.depth += 1,
            ")" | "]" | "}" => self.depth = self.depth.saturating_sub(1),
            ":" if self.depth == 0
                && self
                    .line_head
                    .is_some_and(|head| COMPOUND_KEYWORDS.contains(&head)) =>
            {
                self.open(SuiteKind::Inline);
                self.end_statement();
            }
            ";" if self.depth == 0 => self.end_statement(),
            _ => {}
        }
    }

    /// Line breaks carry no padding: nothing trails a removed comment.
    fn write_break(&mut self, token: &Token<'a>) {
        self.out.push_str(token.text);
        self.advance(token.end);
    }

    fn end_statement(&mut self) {
        self.statement_has_code = false;
        self.statement_removed = None;
    }

    fn remove(&mut self, token: &Token<'a>) {
        if !self.statement_has_code && self.statement_removed.is_none() {
            self.statement_removed = Some((token.start, token.end));
        }

        let offset = self.out.len();
        let needs_placeholder = self
            .suites
            .last()
            .is_some_and(|suite| !suite.has_code && suite.placeholder.is_none());
        if needs_placeholder {
            let padding = self.padding(token.start).into_owned();
            if let Some(suite) = self.suites.last_mut() {
                suite.placeholder = Some(Placeholder { offset, padding });
            }
        }
    }

    fn open(&mut self, kind: SuiteKind) {
        self.suites.push(Suite {
            kind,
            has_code: false,
            placeholder: None,
        });
    }

    fn close_inline(&mut self) {
        while self
            .suites
            .last()
            .is_some_and(|suite| suite.kind == SuiteKind::Inline)
        {
            if let Some(suite) = self.suites.pop() {
                self.settle(suite);
            }
        }
    }

    fn close_block(&mut self) {
        self.close_inline();
        if let Some(suite) = self.suites.pop() {
            self.settle(suite);
        }
    }

    fn settle(&mut self, suite: Suite) {
        if suite.has_code {
            return;
        }
        if let Some(placeholder) = suite.placeholder {
            let statement = format!("{}pass", placeholder.padding);
            self.out.insert_str(placeholder.offset, &statement);
        }
    }

    /// Whitespace needed before a token starting at `start`.
    ///
    /// The first token of a line reproduces the line's own indentation when
    /// everything before it is whitespace; other gaps become spaces.
    fn padding(&self, start: Position) -> Cow<'a, str> {
        if start.line > self.last_line {
            if let Some(indent) = self.indentation(start) {
                return Cow::Borrowed(indent);
            }
            return Cow::Owned(" ".repeat(start.column));
        }
        Cow::Owned(" ".repeat(start.column.saturating_sub(self.last_column)))
    }

    fn indentation(&self, start: Position) -> Option<&'a str> {
        let source: &'a str = self.source;
        let line_start = *self.line_starts.get(start.line.checked_sub(1)?)?;
        let rest = &source[line_start..];
        let end = rest
            .char_indices()
            .nth(start.column)
            .map_or(rest.len(), |(i, _)| i);
        let prefix = &rest[..end];
        prefix
            .chars()
            .all(|c| matches!(c, ' ' | '\t' | '\x0c'))
            .then_some(prefix)
    }

    fn advance(&mut self, end: Position) {
        self.last_line = end.line;
        self.last_column = end.column;
    }
}

/// Byte offsets of line starts, using the lexer's line-break rules.
fn line_starts(source: &str) -> Vec<usize> {
    let bytes = source.as_bytes();
    let mut starts = vec![0];
    for (i, &b) in bytes.iter().enumerate() {
        match b {
            b'\n' => starts.push(i + 1),
            b'\r' if bytes.get(i + 1) != Some(&b'\n') => starts.push(i + 1),
            _ => {}
        }
    }
    starts
}
