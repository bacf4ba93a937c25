use serde::{Serialize, Serializer};
use std::io::ErrorKind;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias using the library's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Error kinds produced by the listing, combining, substitution and pruning stages.
#[derive(Error, Debug, Clone)]
#[non_exhaustive]
pub enum Error {
    /// A directory a stage needs as input does not exist.
    #[error("Directory not found: '{path}'")]
    DirectoryNotFound {
        /// Directory that was expected
        path: PathBuf,
    },

    /// A file disappeared or never existed.
    #[error("Failed to {operation} '{path}': file not found")]
    FileNotFound {
        /// What was being attempted (e.g. "read", "remove")
        operation: &'static str,
        /// Offending path
        path: PathBuf,
    },

    /// The operating system refused access.
    #[error("Failed to {operation} '{path}': permission denied")]
    PermissionDenied {
        /// What was being attempted
        operation: &'static str,
        /// Offending path
        path: PathBuf,
    },

    /// The rules file could not be parsed or lacks a required key.
    #[error("Malformed configuration{}: {}", location(.path), .message)]
    ConfigMalformed {
        /// Configuration file, when the problem came from one
        path: Option<PathBuf>,
        /// Detailed error message
        message: String,
    },

    /// Target and replacement sequences differ in length.
    #[error("Rule count mismatch: {targets} target(s) but {replacements} replacement(s)")]
    RuleCountMismatch {
        /// Number of targets
        targets: usize,
        /// Number of replacements
        replacements: usize,
    },

    /// Any other IO failure.
    #[error("Failed to {operation} '{path}': {message}")]
    Io {
        /// What was being attempted
        operation: &'static str,
        /// Offending path
        path: PathBuf,
        /// Error message
        message: String,
    },

    /// Invalid UTF-8 encountered in file.
    #[error("Invalid UTF-8 encoding in file '{path}'. File may be binary or use unsupported encoding.")]
    InvalidUtf8 {
        /// Path to file with encoding issues
        path: PathBuf,
    },

    /// No documents with the requested suffix were found.
    #[error("No '*{suffix}' files found in '{path}'")]
    NoFiles {
        /// Directory that was listed
        path: PathBuf,
        /// Suffix that was searched for
        suffix: String,
    },

    /// Run configuration failed validation.
    #[error("Invalid configuration: {message}")]
    InvalidConfig {
        /// Detailed error message
        message: String,
    },
}

fn location(path: &Option<PathBuf>) -> String {
    path.as_ref()
        .map(|p| format!(" in '{}'", p.display()))
        .unwrap_or_default()
}

impl Error {
    /// Classifies an IO error by kind and attaches the operation and path.
    ///
    /// `InvalidData` only means bad UTF-8 when text is being read.
    #[must_use]
    pub fn io(operation: &'static str, path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        let path = path.into();
        match source.kind() {
            ErrorKind::NotFound => Self::FileNotFound { operation, path },
            ErrorKind::PermissionDenied => Self::PermissionDenied { operation, path },
            ErrorKind::InvalidData if operation == "read" => Self::InvalidUtf8 { path },
            _ => Self::Io {
                operation,
                path,
                message: source.to_string(),
            },
        }
    }

    /// Creates a directory-not-found error.
    #[must_use]
    pub fn directory_not_found(path: impl Into<PathBuf>) -> Self {
        Self::DirectoryNotFound { path: path.into() }
    }

    /// Creates a malformed configuration error.
    #[must_use]
    pub fn malformed(path: Option<PathBuf>, message: impl Into<String>) -> Self {
        Self::ConfigMalformed {
            path,
            message: message.into(),
        }
    }

    /// Creates a run configuration validation error.
    #[must_use]
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            message: message.into(),
        }
    }

    /// Creates a no files error.
    #[must_use]
    pub fn no_files(path: impl Into<PathBuf>, suffix: impl Into<String>) -> Self {
        Self::NoFiles {
            path: path.into(),
            suffix: suffix.into(),
        }
    }

    /// Returns true for the errors that come from configuration.
    #[must_use]
    pub const fn is_config(&self) -> bool {
        matches!(
            self,
            Self::ConfigMalformed { .. } | Self::RuleCountMismatch { .. } | Self::InvalidConfig { .. }
        )
    }

    /// Returns true if this is a filesystem access error.
    #[must_use]
    pub const fn is_io(&self) -> bool {
        matches!(
            self,
            Self::FileNotFound { .. }
                | Self::PermissionDenied { .. }
                | Self::Io { .. }
                | Self::InvalidUtf8 { .. }
        )
    }
}

impl Serialize for Error {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}
