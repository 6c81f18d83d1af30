//! Source file discovery with gitignore support.
//!
//! Uses the `ignore` crate to walk directories while respecting
//! .gitignore, .git/info/exclude, global gitignore, and .saggignore.

use std::path::{Path, PathBuf};

use ignore::WalkBuilder;
use thiserror::Error;

/// Name of the project-local ignore file looked up in the root.
pub const IGNORE_FILE: &str = ".saggignore";

/// Errors that can occur during directory walking.
#[derive(Debug, Error)]
pub enum WalkError {
    #[error("path not found: {path}")]
    NotFound { path: PathBuf },

    #[error("not a directory: {path}")]
    NotADirectory { path: PathBuf },

    #[error("permission denied: {path}")]
    PermissionDenied { path: PathBuf },

    #[error("IO error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("symlink loop detected: {path}")]
    SymlinkLoop { path: PathBuf },
}

impl WalkError {
    /// The path the error is about, when the walk reported one.
    pub fn path(&self) -> Option<&Path> {
        let path = match self {
            WalkError::NotFound { path }
            | WalkError::NotADirectory { path }
            | WalkError::PermissionDenied { path }
            | WalkError::Io { path, .. }
            | WalkError::SymlinkLoop { path } => path,
        };
        (!path.as_os_str().is_empty()).then_some(path.as_path())
    }
}

/// Options for source discovery.
#[derive(Debug, Clone)]
pub struct WalkOptions {
    /// How many directory levels below the root to descend (None = unlimited).
    /// Files directly in the root are at level 0.
    pub search_depth: Option<usize>,
    /// File extension to collect, without the dot.
    pub extension: String,
    /// Include hidden files and directories.
    pub include_hidden: bool,
    /// Respect .gitignore patterns.
    pub respect_gitignore: bool,
    /// Files never collected, such as the output artifact.
    pub exclude: Vec<PathBuf>,
}

impl Default for WalkOptions {
    fn default() -> Self {
        Self {
            search_depth: Some(1),
            extension: "py".to_string(),
            include_hidden: false,
            respect_gitignore: true,
            exclude: Vec::new(),
        }
    }
}

impl WalkOptions {
    /// Set the search depth.
    pub fn search_depth(mut self, depth: usize) -> Self {
        self.search_depth = Some(depth);
        self
    }

    /// Set the extension filter.
    pub fn extension(mut self, extension: impl Into<String>) -> Self {
        self.extension = extension.into();
        self
    }

    /// Never collect `path`.
    pub fn exclude(mut self, path: impl Into<PathBuf>) -> Self {
        self.exclude.push(path.into());
        self
    }
}

/// A file selected for aggregation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    /// Path on disk.
    pub path: PathBuf,
    /// Root-relative path written in the section header.
    pub label: String,
}

/// An entry below the root that the walk could not read.
#[derive(Debug)]
pub struct UnreadableEntry {
    /// Root-relative path of the entry.
    pub label: String,
    pub error: WalkError,
}

/// Collect the source files under `root`, in traversal order.
///
/// Respects .gitignore and .saggignore patterns automatically. Siblings are
/// visited in file name order so the result is deterministic.
///
/// Only a missing or unreadable root fails the whole call. A directory or
/// file below it that cannot be read becomes an `Err` entry in place, and
/// the walk goes on with its siblings.
///
/// # Examples
///
/// ```no_run
/// use sagg::walker::{collect_sources, WalkOptions};
/// use std::path::Path;
///
/// for entry in collect_sources(Path::new("."), &WalkOptions::default()).unwrap() {
///     match entry {
///         Ok(file) => println!("{}", file.label),
///         Err(unreadable) => eprintln!("{}: {}", unreadable.label, unreadable.error),
///     }
/// }
/// ```
pub fn collect_sources(
    root: &Path,
    options: &WalkOptions,
) -> Result<Vec<Result<SourceFile, UnreadableEntry>>, WalkError> {
    let metadata = root.metadata().map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => WalkError::NotFound {
            path: root.to_path_buf(),
        },
        std::io::ErrorKind::PermissionDenied => WalkError::PermissionDenied {
            path: root.to_path_buf(),
        },
        _ => WalkError::Io {
            path: root.to_path_buf(),
            source: e,
        },
    })?;

    if !metadata.is_dir() {
        return Err(WalkError::NotADirectory {
            path: root.to_path_buf(),
        });
    }

    let mut builder = WalkBuilder::new(root);

    builder
        .hidden(!options.include_hidden)
        .git_ignore(options.respect_gitignore)
        .git_global(options.respect_gitignore)
        .git_exclude(options.respect_gitignore)
        .follow_links(false)
        .sort_by_file_name(|a, b| a.cmp(b));

    // A file inside a directory `d` levels down sits at walk depth d + 1.
    if let Some(depth) = options.search_depth {
        builder.max_depth(Some(depth + 1));
    }

    let saggignore = root.join(IGNORE_FILE);
    if saggignore.exists() {
        builder.add_ignore(&saggignore);
    }

    let excluded: Vec<PathBuf> = options
        .exclude
        .iter()
        .filter_map(|p| p.canonicalize().ok())
        .collect();

    let mut sources = Vec::new();
    for result in builder.build() {
        let entry = match result {
            Ok(entry) => entry,
            Err(err) => {
                let error = convert_error(err);
                let label = error
                    .path()
                    .map(|p| relative_label(root, p))
                    .unwrap_or_default();
                sources.push(Err(UnreadableEntry { label, error }));
                continue;
            }
        };

        if !entry.file_type().is_some_and(|ft| ft.is_file()) {
            continue;
        }

        let path = entry.path();
        if !has_extension(path, &options.extension) {
            continue;
        }

        if !excluded.is_empty() {
            if let Ok(canonical) = path.canonicalize() {
                if excluded.contains(&canonical) {
                    continue;
                }
            }
        }

        sources.push(Ok(SourceFile {
            path: path.to_path_buf(),
            label: relative_label(root, path),
        }));
    }

    Ok(sources)
}

fn has_extension(path: &Path, extension: &str) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e == extension)
}

fn relative_label(root: &Path, path: &Path) -> String {
    path.strip_prefix(root)
        .unwrap_or(path)
        .to_string_lossy()
        .into_owned()
}

/// Convert ignore errors to our error type.
fn convert_error(err: ignore::Error) -> WalkError {
    match err {
        ignore::Error::WithPath { path, err } => match *err {
            ignore::Error::Io(io_err) => io_error(path, io_err),
            ignore::Error::Loop { child, .. } => WalkError::SymlinkLoop { path: child },
            other => WalkError::Io {
                path,
                source: std::io::Error::other(other.to_string()),
            },
        },
        ignore::Error::WithDepth { err, .. } | ignore::Error::WithLineNumber { err, .. } => {
            convert_error(*err)
        }
        ignore::Error::Loop { child, .. } => WalkError::SymlinkLoop { path: child },
        ignore::Error::Io(io_err) => io_error(PathBuf::new(), io_err),
        other => WalkError::Io {
            path: PathBuf::new(),
            source: std::io::Error::other(other.to_string()),
        },
    }
}

fn io_error(path: PathBuf, err: std::io::Error) -> WalkError {
    if err.kind() == std::io::ErrorKind::PermissionDenied {
        WalkError::PermissionDenied { path }
    } else {
        WalkError::Io { path, source: err }
    }
}
