//! Definition summaries using tree-sitter.
//!
//! Reduces a Python module to the names it exposes: public classes (with
//! their constructor parameters), public functions (with their positional
//! parameters) and public module-level variables.

mod python;

use std::cell::RefCell;
use std::fmt;

use smallvec::SmallVec;
use thiserror::Error;
use tracing::warn;
use tree_sitter::{Node, Parser};

// Empty until first use; grammar loading can fail.
thread_local! {
    static PYTHON_PARSER: RefCell<Option<Parser>> = const { RefCell::new(None) };
}

fn init_python_parser() -> Result<Parser, ParseError> {
    let mut p = Parser::new();
    p.set_language(&tree_sitter_python::LANGUAGE.into())
        .map_err(|_| ParseError::ParserInit)?;
    Ok(p)
}

/// Execute a function with the cached Python parser.
pub(crate) fn with_python_parser<F, R>(f: F) -> Result<R, ParseError>
where
    F: FnOnce(&mut Parser) -> R,
{
    PYTHON_PARSER.with(|cell| {
        let mut slot = cell.borrow_mut();
        if slot.is_none() {
            *slot = Some(init_python_parser()?);
        }

        let parser = slot.as_mut().ok_or(ParseError::ParserInit)?;
        Ok(f(parser))
    })
}

/// Extract node text from content.
pub(crate) fn node_text(node: Node, content: &str) -> String {
    content[node.byte_range()].to_string()
}

/// Errors while building a syntax tree.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("failed to initialize Python parser")]
    ParserInit,

    #[error("parser produced no syntax tree")]
    NoTree,

    /// `line` and `column` are 1-based.
    #[error("{message} (line {line}, column {column})")]
    Syntax {
        message: String,
        line: usize,
        column: usize,
    },
}

/// Public declarations of one module, in source order within each group.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DefinitionSummary {
    /// `Name` or `Name(p1, p2)` when the constructor takes parameters.
    pub classes: SmallVec<[String; 8]>,
    /// `name(p1, p2)`.
    pub functions: SmallVec<[String; 16]>,
    pub variables: SmallVec<[String; 16]>,
}

impl DefinitionSummary {
    pub fn is_empty(&self) -> bool {
        self.classes.is_empty() && self.functions.is_empty() && self.variables.is_empty()
    }

    /// Labeled groups in rendering order.
    pub fn groups(&self) -> [(&'static str, &[String]); 3] {
        [
            ("Classes", self.classes.as_slice()),
            ("Functions", self.functions.as_slice()),
            ("Variables", self.variables.as_slice()),
        ]
    }
}

impl fmt::Display for DefinitionSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut separator = "";
        for (label, entries) in self.groups() {
            if entries.is_empty() {
                continue;
            }
            write!(f, "{separator}{label}:")?;
            for entry in entries {
                write!(f, "\n  {entry}")?;
            }
            separator = "\n";
        }
        Ok(())
    }
}

/// Parse Python source and collect its public top-level definitions.
///
/// # Examples
///
/// ```
/// use sagg::definitions::extract;
///
/// let summary = extract("def foo(a, b): pass\n").unwrap();
/// assert_eq!(summary.to_string(), "Functions:\n  foo(a, b)");
/// ```
pub fn extract(content: &str) -> Result<DefinitionSummary, ParseError> {
    python::extract(content)
}

/// Render the summary of `content`, or the parse error as text.
///
/// Never fails: a file that does not parse still produces a section.
pub fn summarize(content: &str) -> String {
    match extract(content) {
        Ok(summary) => summary.to_string(),
        Err(err) => {
            warn!(error = %err, "definition extraction failed");
            format_parse_error(&err)
        }
    }
}

/// Text written in place of a summary when parsing fails.
pub fn format_parse_error(err: &ParseError) -> String {
    format!("Error parsing source code: {err}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use smallvec::smallvec;

    #[test]
    fn test_empty_summary_renders_nothing() {
        let summary = DefinitionSummary::default();
        assert!(summary.is_empty());
        assert_eq!(summary.to_string(), "");
    }

    #[test]
    fn test_render_skips_empty_groups() {
        let summary = DefinitionSummary {
            classes: smallvec!["Point(x, y)".to_string()],
            functions: SmallVec::new(),
            variables: smallvec!["LIMIT".to_string(), "name".to_string()],
        };
        assert_eq!(
            summary.to_string(),
            "Classes:\n  Point(x, y)\nVariables:\n  LIMIT\n  name"
        );
    }

    #[test]
    fn test_summarize_empty_input() {
        assert_eq!(summarize(""), "");
    }

    #[test]
    fn test_summarize_reports_parse_error() {
        let text = summarize("def broken(:\n");
        assert!(text.starts_with("Error parsing source code: "));
        assert!(text.contains("(line "));
    }

    #[test]
    fn test_summarize_rejects_python2_source() {
        assert_eq!(
            summarize("print \"hello\"\nX = 1\n"),
            "Error parsing source code: missing parentheses in call to 'print' (line 1, column 1)"
        );
        assert!(summarize("return 5\nZ = 1\n").starts_with("Error parsing source code: "));
    }

    #[test]
    fn test_parse_error_display() {
        let err = ParseError::Syntax {
            message: "invalid syntax".into(),
            line: 3,
            column: 7,
        };
        assert_eq!(err.to_string(), "invalid syntax (line 3, column 7)");
        assert_eq!(
            format_parse_error(&err),
            "Error parsing source code: invalid syntax (line 3, column 7)"
        );
    }
}
