//! sagg - Combine a project's source files into one LLM-ready text file.
//!
//! sagg walks a directory tree, optionally strips comments and docstrings
//! from each Python file or reduces it to its public definitions, and writes
//! every file as a `===== path =====` section of a single artifact.
//!
//! # Quick Start
//!
//! ```no_run
//! use sagg::aggregate::Aggregator;
//! use sagg::report::{format_report, ReportFormat};
//!
//! let report = Aggregator::new("./my-project")
//!     .remove_comments(true)
//!     .search_depth(2)
//!     .run("combined_code.txt")
//!     .unwrap();
//!
//! println!("{}", format_report(&report, ReportFormat::Text).unwrap());
//! ```
//!
//! # Modules
//!
//! - [`lexer`] - Python tokenizer
//! - [`strip`] - Comment and docstring removal
//! - [`definitions`] - Tree-sitter based definition summaries
//! - [`walker`] - Directory traversal with gitignore support
//! - [`aggregate`] - The aggregation run
//! - [`tokens`] - Token counting for LLM context budgets
//! - [`report`] - Run summary formatting

pub mod lexer;
pub mod strip;
pub mod definitions;
pub mod walker;
pub mod tokens;
pub mod errors;
pub mod aggregate;
pub mod report;

// Re-export key types at crate root for convenience
pub use aggregate::{AggregateReport, Aggregator, FileOutcome, TransformOptions};
pub use definitions::{DefinitionSummary, ParseError, extract, summarize};
pub use errors::{FileError, SaggError};
pub use lexer::{SourceSyntaxError, Token, TokenKind, tokenize};
pub use report::{ReportFormat, format_report};
pub use strip::strip;
pub use tokens::{Encoding, count_tokens};
pub use walker::{SourceFile, UnreadableEntry, WalkError, WalkOptions};
