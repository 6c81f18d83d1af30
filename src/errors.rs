//! Error types for sagg.

use std::path::PathBuf;

use crate::lexer::SourceSyntaxError;
use crate::walker::WalkError;

/// Top-level error type for an aggregation run.
#[derive(Debug, thiserror::Error)]
pub enum SaggError {
    #[error("path not found: {0}")]
    PathNotFound(PathBuf),

    #[error("cannot create output file {path}: {source}")]
    OutputCreate {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("walk error: {0}")]
    Walk(#[from] WalkError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Why a single file was left out of the artifact.
///
/// These never abort a run; the file is reported as skipped.
#[derive(Debug, thiserror::Error)]
pub enum FileError {
    #[error("cannot read {path}: {source}")]
    Access {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{path} is not valid UTF-8")]
    Decode { path: PathBuf },

    #[error("cannot tokenize {path}: {source}")]
    Syntax {
        path: PathBuf,
        #[source]
        source: SourceSyntaxError,
    },

    #[error("cannot walk into entry: {0}")]
    Walk(#[source] WalkError),
}

impl FileError {
    /// Short reason shown in the run summary.
    pub fn reason(&self) -> String {
        match self {
            FileError::Access { source, .. } => format!("unreadable: {source}"),
            FileError::Decode { .. } => "not valid UTF-8".to_string(),
            FileError::Syntax { source, .. } => format!("syntax error: {source}"),
            FileError::Walk(source) => format!("unreadable: {source}"),
        }
    }
}

/// Map an error to its exit code.
pub fn exit_code(error: &SaggError) -> i32 {
    match error {
        SaggError::PathNotFound(_) => 3,
        SaggError::OutputCreate { .. } => 4,
        SaggError::Io(_) => 1,
        SaggError::Walk(WalkError::NotFound { .. }) => 3,
        SaggError::Walk(_) => 2,
        SaggError::Serialization(_) => 1,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes() {
        assert_eq!(exit_code(&SaggError::PathNotFound(PathBuf::from("x"))), 3);
        assert_eq!(
            exit_code(&SaggError::OutputCreate {
                path: PathBuf::from("out.txt"),
                source: std::io::Error::from(std::io::ErrorKind::PermissionDenied),
            }),
            4
        );
        assert_eq!(
            exit_code(&SaggError::Walk(WalkError::NotADirectory {
                path: PathBuf::from("f.py"),
            })),
            2
        );
        assert_eq!(exit_code(&SaggError::Io(std::io::Error::other("disk full"))), 1);
    }

    #[test]
    fn test_syntax_reason() {
        let err = FileError::Syntax {
            path: PathBuf::from("bad.py"),
            source: SourceSyntaxError {
                message: "unterminated string literal".into(),
                line: 2,
                column: 5,
            },
        };
        assert_eq!(
            err.reason(),
            "syntax error: unterminated string literal (line 2, column 5)"
        );
    }

    #[test]
    fn test_walk_reason() {
        let err = FileError::Walk(WalkError::PermissionDenied {
            path: PathBuf::from("pkg/locked"),
        });
        assert_eq!(err.reason(), "unreadable: permission denied: pkg/locked");
    }
}
