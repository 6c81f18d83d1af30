//! The aggregation run.
//!
//! Walks the root, transforms each collected file and writes it as a
//! section of the combined artifact.

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use glob::Pattern;
use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::definitions;
use crate::errors::{FileError, SaggError};
use crate::lexer::SourceSyntaxError;
use crate::strip::strip;
use crate::tokens::{Encoding, count_tokens_with_encoding};
use crate::walker::{SourceFile, UnreadableEntry, WalkError, WalkOptions, collect_sources};

/// Per-file content transforms.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransformOptions {
    /// Remove comments and documentation strings.
    pub remove_comments: bool,
    /// Replace the content with its definition summary.
    pub show_definitions: bool,
}

/// Apply the enabled transforms to one file's text.
///
/// Stripping runs first so the summary is taken from the stripped text.
/// Extraction failures become the section text; only stripping can fail.
pub fn transform(content: &str, options: &TransformOptions) -> Result<String, SourceSyntaxError> {
    let mut text = if options.remove_comments {
        strip(content)?
    } else {
        content.to_string()
    };

    if options.show_definitions {
        text = definitions::summarize(&text);
    }

    Ok(text)
}

/// What happened to one collected file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum FileOutcome {
    Included { label: String, lines: usize },
    Skipped { label: String, reason: String },
}

impl FileOutcome {
    pub fn label(&self) -> &str {
        match self {
            FileOutcome::Included { label, .. } | FileOutcome::Skipped { label, .. } => label,
        }
    }

    pub fn is_included(&self) -> bool {
        matches!(self, FileOutcome::Included { .. })
    }
}

/// Result of a completed run.
#[derive(Debug, Clone)]
pub struct AggregateReport {
    /// Where the artifact was written.
    pub output: PathBuf,
    /// Every collected file, in traversal order.
    pub files: Vec<FileOutcome>,
    /// Token count of the finished artifact.
    pub tokens: usize,
    pub encoding: Encoding,
}

impl AggregateReport {
    pub fn included(&self) -> impl Iterator<Item = &FileOutcome> {
        self.files.iter().filter(|f| f.is_included())
    }

    pub fn skipped(&self) -> impl Iterator<Item = &FileOutcome> {
        self.files.iter().filter(|f| !f.is_included())
    }
}

/// Builder for an aggregation run.
///
/// # Examples
///
/// ```no_run
/// use sagg::aggregate::Aggregator;
///
/// let report = Aggregator::new(".")
///     .remove_comments(true)
///     .search_depth(2)
///     .run("combined_code.txt")
///     .unwrap();
///
/// println!("{} tokens", report.tokens);
/// ```
#[derive(Debug, Clone)]
pub struct Aggregator {
    root: PathBuf,
    walk_options: WalkOptions,
    transform: TransformOptions,
    exempt: Vec<String>,
    encoding: Encoding,
}

impl Aggregator {
    /// Create a new builder for the given root path.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            walk_options: WalkOptions::default(),
            transform: TransformOptions::default(),
            exempt: Vec::new(),
            encoding: Encoding::default(),
        }
    }

    /// Directory levels below the root to search.
    pub fn search_depth(mut self, depth: usize) -> Self {
        self.walk_options.search_depth = Some(depth);
        self
    }

    /// Extension of the files to collect, without the dot.
    pub fn extension(mut self, extension: impl Into<String>) -> Self {
        self.walk_options.extension = extension.into();
        self
    }

    pub fn remove_comments(mut self, enabled: bool) -> Self {
        self.transform.remove_comments = enabled;
        self
    }

    pub fn show_definitions(mut self, enabled: bool) -> Self {
        self.transform.show_definitions = enabled;
        self
    }

    /// Write files whose label matches `pattern` verbatim.
    ///
    /// `pattern` is a glob; an invalid glob only matches the identical label.
    pub fn exempt(mut self, pattern: impl Into<String>) -> Self {
        self.exempt.push(pattern.into());
        self
    }

    /// Include hidden files.
    pub fn include_hidden(mut self, include: bool) -> Self {
        self.walk_options.include_hidden = include;
        self
    }

    /// Respect .gitignore patterns (default: true).
    pub fn respect_gitignore(mut self, respect: bool) -> Self {
        self.walk_options.respect_gitignore = respect;
        self
    }

    /// Encoding used for the final token count.
    pub fn encoding(mut self, encoding: Encoding) -> Self {
        self.encoding = encoding;
        self
    }

    /// Write the combined artifact to `output` and count its tokens.
    ///
    /// An existing file is overwritten. Per-file failures, including entries
    /// the walk cannot read, are reported as skipped. Sources are collected
    /// before the output is created, so a run that fails to start leaves an
    /// existing output untouched.
    pub fn run(&self, output: impl AsRef<Path>) -> Result<AggregateReport, SaggError> {
        let output = output.as_ref();

        if !self.root.exists() {
            return Err(SaggError::PathNotFound(self.root.clone()));
        }
        if !self.root.is_dir() {
            return Err(SaggError::Walk(WalkError::NotADirectory {
                path: self.root.clone(),
            }));
        }

        let sources = self.collect(Some(output))?;

        if output.exists() {
            warn!(path = %output.display(), "output file already exists and will be overwritten");
        }

        let file = File::create(output).map_err(|source| SaggError::OutputCreate {
            path: output.to_path_buf(),
            source,
        })?;

        let mut writer = BufWriter::new(file);
        let files = self.write_sections(&mut writer, sources)?;
        writer.flush()?;
        drop(writer);

        let written = fs::read_to_string(output)?;
        let tokens = count_tokens_with_encoding(&written, self.encoding);
        info!(
            path = %output.display(),
            files = files.iter().filter(|f| f.is_included()).count(),
            tokens,
            "artifact written"
        );

        Ok(AggregateReport {
            output: output.to_path_buf(),
            files,
            tokens,
            encoding: self.encoding,
        })
    }

    /// Write every section to `writer`, in traversal order.
    pub fn write_to<W: Write>(&self, writer: &mut W) -> Result<Vec<FileOutcome>, SaggError> {
        let sources = self.collect(None)?;
        self.write_sections(writer, sources)
    }

    fn collect(
        &self,
        output: Option<&Path>,
    ) -> Result<Vec<Result<SourceFile, UnreadableEntry>>, SaggError> {
        let mut walk_options = self.walk_options.clone();
        if let Some(output) = output {
            walk_options.exclude.push(output.to_path_buf());
        }
        Ok(collect_sources(&self.root, &walk_options)?)
    }

    fn write_sections<W: Write>(
        &self,
        writer: &mut W,
        sources: Vec<Result<SourceFile, UnreadableEntry>>,
    ) -> Result<Vec<FileOutcome>, SaggError> {
        let exempt = compile_patterns(&self.exempt);

        let mut outcomes = Vec::with_capacity(sources.len());
        for entry in sources {
            let source = match entry {
                Ok(source) => source,
                Err(unreadable) => {
                    let err = FileError::Walk(unreadable.error);
                    error!(label = %unreadable.label, error = %err, "skipped");
                    outcomes.push(FileOutcome::Skipped {
                        label: unreadable.label,
                        reason: err.reason(),
                    });
                    continue;
                }
            };

            let _span = tracing::debug_span!("file", label = %source.label).entered();

            let outcome = match self.render(&source, &exempt) {
                Ok(content) => {
                    let lines = write_section(writer, &source.label, &content)?;
                    debug!(lines, "included");
                    FileOutcome::Included {
                        label: source.label.clone(),
                        lines,
                    }
                }
                Err(err) => {
                    error!(error = %err, "skipped");
                    FileOutcome::Skipped {
                        label: source.label.clone(),
                        reason: err.reason(),
                    }
                }
            };
            outcomes.push(outcome);
        }

        Ok(outcomes)
    }

    fn render(&self, source: &SourceFile, exempt: &[Exemption]) -> Result<String, FileError> {
        let content = read_source(&source.path)?;

        if exempt.iter().any(|e| e.matches(&source.label)) {
            debug!("exempt from transforms");
            return Ok(content);
        }

        transform(&content, &self.transform).map_err(|source_err| FileError::Syntax {
            path: source.path.clone(),
            source: source_err,
        })
    }
}

enum Exemption {
    Glob(Pattern),
    Literal(String),
}

impl Exemption {
    fn matches(&self, label: &str) -> bool {
        let label = label.replace('\\', "/");
        match self {
            Exemption::Glob(pattern) => pattern.matches(&label),
            Exemption::Literal(text) => *text == label,
        }
    }
}

fn compile_patterns(patterns: &[String]) -> Vec<Exemption> {
    patterns
        .iter()
        .map(|p| {
            let normalized = p.replace('\\', "/");
            match Pattern::new(&normalized) {
                Ok(pattern) => Exemption::Glob(pattern),
                Err(err) => {
                    warn!(pattern = %p, error = %err, "invalid glob, matching literally");
                    Exemption::Literal(normalized)
                }
            }
        })
        .collect()
}

/// Read a file as UTF-8 text, dropping a leading byte order mark.
pub fn read_source(path: &Path) -> Result<String, FileError> {
    let bytes = fs::read(path).map_err(|source| FileError::Access {
        path: path.to_path_buf(),
        source,
    })?;

    let mut text = String::from_utf8(bytes).map_err(|_| FileError::Decode {
        path: path.to_path_buf(),
    })?;

    if text.starts_with('\u{feff}') {
        text.remove(0);
    }
    Ok(text)
}

/// Write one `===== label =====` section and return its content line count.
///
/// Trailing line breaks of `content` are replaced by exactly one, followed
/// by a single blank line.
pub fn write_section<W: Write>(writer: &mut W, label: &str, content: &str) -> std::io::Result<usize> {
    let body = content.trim_end_matches(['\n', '\r']);

    writeln!(writer, "===== {label} =====")?;
    if body.is_empty() {
        writeln!(writer)?;
        return Ok(0);
    }

    writer.write_all(body.as_bytes())?;
    writer.write_all(b"\n\n")?;
    Ok(bytecount::count(body.as_bytes(), b'\n') + 1)
}
