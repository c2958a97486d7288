//! Error types for PHP config operations.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for phpconfig operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while reading or writing a config file.
#[derive(Debug, Error)]
pub enum Error {
    /// Malformed config file
    #[error("invalid PHP config{} at line {line}: {message}", path_suffix(.path))]
    Parse {
        /// File being parsed, when known
        path: Option<PathBuf>,
        /// Line number where the parse error occurred (1-indexed)
        line: usize,
        /// Description of the syntax error
        message: String,
    },

    /// IO error on a specific file
    #[error("IO error at {}: {source}", .path.display())]
    Io {
        /// Path involved in the error
        path: PathBuf,
        /// Underlying IO error
        #[source]
        source: std::io::Error,
    },
}

fn path_suffix(path: &Option<PathBuf>) -> String {
    path.as_ref()
        .map(|p| format!(" {}", p.display()))
        .unwrap_or_default()
}

impl Error {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Attach the file path to a parse error produced from a string
    pub(crate) fn with_path(self, file: impl Into<PathBuf>) -> Self {
        match self {
            Self::Parse { line, message, .. } => Self::Parse {
                path: Some(file.into()),
                line,
                message,
            },
            other => other,
        }
    }
}
