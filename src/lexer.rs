//! Python tokenizer.
//!
//! Produces positioned tokens following the rules of CPython's `tokenize`
//! module: indentation is tracked per logical line, every string literal is a
//! single token (prefix and delimiters included, even across lines), and line
//! breaks are split into logical [`TokenKind::Newline`] and non-logical
//! [`TokenKind::Nl`] tokens.
//!
//! # Examples
//!
//! ```
//! use sagg::lexer::{tokenize, TokenKind};
//!
//! let tokens = tokenize("x = 1  # one\n").unwrap();
//! let kinds: Vec<_> = tokens.iter().map(|t| t.kind).collect();
//! assert_eq!(
//!     kinds,
//!     [
//!         TokenKind::Name,
//!         TokenKind::Op,
//!         TokenKind::Number,
//!         TokenKind::Comment,
//!         TokenKind::Newline,
//!         TokenKind::EndMarker,
//!     ]
//! );
//! ```

use thiserror::Error;

const TAB_SIZE: usize = 8;

/// Operators, longest first so that a prefix scan finds the longest match.
const OPERATORS: &[&str] = &[
    "**=", "//=", ">>=", "<<=", "...", "!=", "%=", "&=", "**", "*=", "+=", "-=", "->", "//", "/=",
    ":=", "<<", "<=", "==", ">=", ">>", "@=", "^=", "|=", "%", "&", "(", ")", "*", "+", ",", "-",
    ".", "/", ":", ";", "<", "=", ">", "@", "[", "]", "^", "{", "|", "}", "~",
];

const STRING_PREFIXES: &[&str] = &["r", "u", "b", "br", "rb", "f", "fr", "rf", "t", "tr", "rt"];

/// A position in source text.
///
/// Lines are 1-based; columns are 0-based character offsets within the line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Position {
    pub line: usize,
    pub column: usize,
}

impl Position {
    pub fn new(line: usize, column: usize) -> Self {
        Self { line, column }
    }
}

/// Token classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Name,
    Number,
    Op,
    /// A backslash immediately followed by a line break.
    LineJoin,
    String,
    Comment,
    /// End of a logical line.
    Newline,
    /// Line break that does not end a logical line (blank lines,
    /// comment-only lines, breaks inside brackets).
    Nl,
    Indent,
    Dedent,
    EndMarker,
}

/// A token borrowed from the source it was scanned from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Token<'a> {
    pub kind: TokenKind,
    /// Raw lexeme. Empty for `Dedent`, `EndMarker` and the synthetic
    /// `Newline` closing a last line that has no line break.
    pub text: &'a str,
    pub start: Position,
    /// Position just past the token. Line breaks end on their own line.
    pub end: Position,
}

/// Source text that cannot be tokenized.
///
/// `line` and `column` are both 1-based.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message} (line {line}, column {column})")]
pub struct SourceSyntaxError {
    pub message: String,
    pub line: usize,
    pub column: usize,
}

/// Tokenize Python source.
pub fn tokenize(source: &str) -> Result<Vec<Token<'_>>, SourceSyntaxError> {
    let mut lexer = Lexer::new(source);
    lexer.scan_tokens()?;
    Ok(lexer.tokens)
}

struct Lexer<'a> {
    source: &'a str,
    /// Byte offset into `source`.
    pos: usize,
    line: usize,
    column: usize,
    tokens: Vec<Token<'a>>,
    indents: Vec<usize>,
    brackets: Vec<(char, Position)>,
    at_line_start: bool,
    blank_line: bool,
}

impl<'a> Lexer<'a> {
    fn new(source: &'a str) -> Self {
        Self {
            source,
            pos: 0,
            line: 1,
            column: 0,
            tokens: Vec::new(),
            indents: vec![0],
            brackets: Vec::new(),
            at_line_start: true,
            blank_line: false,
        }
    }

    fn scan_tokens(&mut self) -> Result<(), SourceSyntaxError> {
        loop {
            if self.at_line_start {
                self.at_line_start = false;
                if !self.scan_indentation()? {
                    break;
                }
            }

            let Some(ch) = self.peek() else {
                break;
            };

            match ch {
                ' ' | '\t' | '\x0c' => {
                    self.bump();
                }
                '\n' | '\r' => self.scan_line_break(),
                '#' => self.scan_comment(),
                '\\' => self.scan_line_join()?,
                '"' | '\'' => self.scan_string(self.pos, self.position())?,
                c if c.is_ascii_digit() => self.scan_number(),
                '.' if self.peek_nth(1).is_some_and(|c| c.is_ascii_digit()) => self.scan_number(),
                c if is_identifier_start(c) => self.scan_name()?,
                _ => self.scan_operator()?,
            }
        }

        self.finish()
    }

    // --- Layout ---

    /// Measure the indentation of a new logical line and emit
    /// `Indent`/`Dedent` tokens. Returns `false` at end of input.
    fn scan_indentation(&mut self) -> Result<bool, SourceSyntaxError> {
        let line_start = self.pos;
        let mut width = 0;
        while let Some(ch) = self.peek() {
            match ch {
                ' ' => width += 1,
                '\t' => width = (width / TAB_SIZE + 1) * TAB_SIZE,
                '\x0c' => width = 0,
                _ => break,
            }
            self.bump();
        }

        match self.peek() {
            None => return Ok(false),
            Some('#' | '\n' | '\r') => {
                self.blank_line = true;
                return Ok(true);
            }
            Some(_) => self.blank_line = false,
        }

        let current = self.indents.last().copied().unwrap_or(0);
        if width > current {
            self.indents.push(width);
            self.tokens.push(Token {
                kind: TokenKind::Indent,
                text: &self.source[line_start..self.pos],
                start: Position::new(self.line, 0),
                end: self.position(),
            });
            return Ok(true);
        }

        while width < self.indents.last().copied().unwrap_or(0) {
            if !self.indents.contains(&width) {
                return Err(self.error(
                    "unindent does not match any outer indentation level",
                    self.position(),
                ));
            }
            self.indents.pop();
            self.push_empty(TokenKind::Dedent, self.position());
        }

        Ok(true)
    }

    fn scan_line_break(&mut self) {
        let start = self.pos;
        let start_pos = self.position();
        if self.bump() == Some('\r') && self.peek() == Some('\n') {
            self.bump();
        }

        let kind = if self.blank_line || !self.brackets.is_empty() {
            TokenKind::Nl
        } else {
            TokenKind::Newline
        };
        let text = &self.source[start..self.pos];
        self.tokens.push(Token {
            kind,
            text,
            start: start_pos,
            end: Position::new(start_pos.line, start_pos.column + text.len()),
        });

        if self.brackets.is_empty() {
            self.at_line_start = true;
        }
    }

    fn scan_line_join(&mut self) -> Result<(), SourceSyntaxError> {
        let start = self.pos;
        let start_pos = self.position();
        self.bump();

        match self.peek() {
            Some('\n' | '\r') => {
                if self.bump() == Some('\r') && self.peek() == Some('\n') {
                    self.bump();
                }
                let text = &self.source[start..self.pos];
                self.tokens.push(Token {
                    kind: TokenKind::LineJoin,
                    text,
                    start: start_pos,
                    end: Position::new(start_pos.line, start_pos.column + text.len()),
                });
                Ok(())
            }
            None => Err(self.error("unexpected EOF in multi-line statement", start_pos)),
            Some(_) => Err(self.error(
                "unexpected character after line continuation character",
                start_pos,
            )),
        }
    }

    fn finish(&mut self) -> Result<(), SourceSyntaxError> {
        if !self.brackets.is_empty()
            || self
                .tokens
                .last()
                .is_some_and(|t| t.kind == TokenKind::LineJoin)
        {
            return Err(self.error("unexpected EOF in multi-line statement", self.position()));
        }

        // A last line without a line break still ends its logical line.
        if self.tokens.last().is_some_and(|t| {
            !matches!(
                t.kind,
                TokenKind::Newline | TokenKind::Nl | TokenKind::Indent | TokenKind::Dedent
            )
        }) {
            let kind = if self.blank_line {
                TokenKind::Nl
            } else {
                TokenKind::Newline
            };
            self.push_empty(kind, self.position());
        }

        let end = if self.column == 0 {
            Position::new(self.line, 0)
        } else {
            Position::new(self.line + 1, 0)
        };
        while self.indents.len() > 1 {
            self.indents.pop();
            self.push_empty(TokenKind::Dedent, end);
        }
        self.push_empty(TokenKind::EndMarker, end);
        Ok(())
    }

    // --- Tokens ---

    fn scan_comment(&mut self) {
        let start = self.pos;
        let start_pos = self.position();
        while self.peek().is_some_and(|c| c != '\n' && c != '\r') {
            self.bump();
        }
        self.push(TokenKind::Comment, start, start_pos);
    }

    fn scan_name(&mut self) -> Result<(), SourceSyntaxError> {
        let start = self.pos;
        let start_pos = self.position();
        while self.peek().is_some_and(is_identifier_continue) {
            self.bump();
        }

        let word = &self.source[start..self.pos];
        if matches!(self.peek(), Some('"' | '\'')) && is_string_prefix(word) {
            return self.scan_string(start, start_pos);
        }

        self.push(TokenKind::Name, start, start_pos);
        Ok(())
    }

    /// Scan a string literal whose prefix (possibly empty) starts at `start`.
    /// The cursor sits on the opening quote.
    fn scan_string(&mut self, start: usize, start_pos: Position) -> Result<(), SourceSyntaxError> {
        let formatted = self.source[start..self.pos]
            .chars()
            .any(|c| matches!(c, 'f' | 'F' | 't' | 'T'));
        self.scan_string_body(start_pos, formatted)?;
        self.push(TokenKind::String, start, start_pos);
        Ok(())
    }

    fn scan_string_body(
        &mut self,
        start_pos: Position,
        formatted: bool,
    ) -> Result<(), SourceSyntaxError> {
        let Some(quote) = self.bump() else {
            return Err(self.error("unterminated string literal", start_pos));
        };

        let triple = self.peek() == Some(quote) && self.peek_nth(1) == Some(quote);
        if triple {
            self.bump();
            self.bump();
        } else if self.peek() == Some(quote) {
            self.bump();
            return Ok(());
        }

        // Open `{...}` replacement fields of an f-string, innermost last.
        let mut fields: Vec<ReplacementField> = Vec::new();
        loop {
            let Some(ch) = self.peek() else {
                let message = if triple {
                    "unterminated triple-quoted string literal"
                } else {
                    "unterminated string literal"
                };
                return Err(self.error(message, start_pos));
            };

            let in_expression = fields.last().is_some_and(|f| !f.format_spec);
            match ch {
                '\\' => {
                    self.bump();
                    self.bump();
                }
                '\n' | '\r' if !triple && fields.is_empty() => {
                    return Err(self.error("unterminated string literal", start_pos));
                }
                c if c == quote && fields.is_empty() => {
                    if !triple {
                        self.bump();
                        return Ok(());
                    }
                    if self.peek_nth(1) == Some(quote) && self.peek_nth(2) == Some(quote) {
                        self.bump();
                        self.bump();
                        self.bump();
                        return Ok(());
                    }
                    self.bump();
                }
                '{' if formatted && !in_expression => {
                    if fields.is_empty() && self.peek_nth(1) == Some('{') {
                        self.bump();
                    } else {
                        fields.push(ReplacementField::default());
                    }
                    self.bump();
                }
                '}' if formatted && !fields.is_empty() => {
                    match fields.last_mut() {
                        Some(field) if !field.format_spec && field.brackets > 0 => {
                            field.brackets -= 1;
                        }
                        _ => {
                            fields.pop();
                        }
                    }
                    self.bump();
                }
                '(' | '[' | '{' if in_expression => {
                    if let Some(field) = fields.last_mut() {
                        field.brackets += 1;
                    }
                    self.bump();
                }
                ')' | ']' if in_expression => {
                    if let Some(field) = fields.last_mut() {
                        field.brackets = field.brackets.saturating_sub(1);
                    }
                    self.bump();
                }
                // The format spec is literal text apart from nested fields.
                ':' if in_expression => {
                    if let Some(field) = fields.last_mut() {
                        field.format_spec = field.brackets == 0;
                    }
                    self.bump();
                }
                '"' | '\'' if in_expression => {
                    let nested = self.position();
                    self.scan_string_body(nested, false)?;
                }
                _ => {
                    self.bump();
                }
            }
        }
    }

    fn scan_number(&mut self) {
        let start = self.pos;
        let start_pos = self.position();
        let hex = self.peek() == Some('0') && matches!(self.peek_nth(1), Some('x' | 'X'));

        let mut prev = '\0';
        while let Some(ch) = self.peek() {
            let exponent_sign = !hex && matches!(ch, '+' | '-') && matches!(prev, 'e' | 'E');
            if ch.is_ascii_alphanumeric() || ch == '_' || ch == '.' || exponent_sign {
                prev = ch;
                self.bump();
            } else {
                break;
            }
        }

        self.push(TokenKind::Number, start, start_pos);
    }

    fn scan_operator(&mut self) -> Result<(), SourceSyntaxError> {
        let start = self.pos;
        let start_pos = self.position();
        let rest = &self.source[self.pos..];

        let Some(op) = OPERATORS.iter().find(|op| rest.starts_with(**op)) else {
            let ch = self.peek().unwrap_or_default();
            return Err(self.error(format!("invalid character '{ch}'"), start_pos));
        };

        match *op {
            "(" | "[" | "{" => {
                let open = op.chars().next().unwrap_or_default();
                self.brackets.push((open, start_pos));
            }
            ")" | "]" | "}" => {
                let close = op.chars().next().unwrap_or_default();
                match self.brackets.pop() {
                    None => {
                        return Err(self.error(format!("unmatched '{close}'"), start_pos));
                    }
                    Some((open, _)) if closing_for(open) != close => {
                        return Err(self.error(
                            format!(
                                "closing parenthesis '{close}' does not match opening parenthesis '{open}'"
                            ),
                            start_pos,
                        ));
                    }
                    Some(_) => {}
                }
            }
            _ => {}
        }

        for _ in 0..op.len() {
            self.bump();
        }
        self.push(TokenKind::Op, start, start_pos);
        Ok(())
    }

    // --- Helpers ---

    fn push(&mut self, kind: TokenKind, start: usize, start_pos: Position) {
        self.tokens.push(Token {
            kind,
            text: &self.source[start..self.pos],
            start: start_pos,
            end: self.position(),
        });
    }

    fn push_empty(&mut self, kind: TokenKind, at: Position) {
        self.tokens.push(Token {
            kind,
            text: "",
            start: at,
            end: at,
        });
    }

    fn position(&self) -> Position {
        Position::new(self.line, self.column)
    }

    fn peek(&self) -> Option<char> {
        self.source[self.pos..].chars().next()
    }

    fn peek_nth(&self, n: usize) -> Option<char> {
        self.source[self.pos..].chars().nth(n)
    }

    /// Consume one character, tracking line and column.
    /// `\r\n`, `\n` and a lone `\r` each end a line.
    fn bump(&mut self) -> Option<char> {
        let ch = self.peek()?;
        self.pos += ch.len_utf8();
        match ch {
            '\n' => {
                self.line += 1;
                self.column = 0;
            }
            '\r' if self.peek() != Some('\n') => {
                self.line += 1;
                self.column = 0;
            }
            _ => self.column += 1,
        }
        Some(ch)
    }

    fn error(&self, message: impl Into<String>, at: Position) -> SourceSyntaxError {
        SourceSyntaxError {
            message: message.into(),
            line: at.line,
            column: at.column + 1,
        }
    }
}

/// State of one open f-string replacement field.
#[derive(Debug, Default)]
struct ReplacementField {
    /// Open brackets inside the expression part.
    brackets: usize,
    /// Past the top-level `:`.
    format_spec: bool,
}

fn is_identifier_start(c: char) -> bool {
    c == '_' || c.is_alphabetic()
}

fn is_identifier_continue(c: char) -> bool {
    c == '_' || c.is_alphanumeric()
}

fn is_string_prefix(word: &str) -> bool {
    let lower = word.to_ascii_lowercase();
    STRING_PREFIXES.contains(&lower.as_str())
}

fn closing_for(open: char) -> char {
    match open {
        '(' => ')',
        '[' => ']',
        _ => '}',
    }
}
