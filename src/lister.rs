//! Directory listing with suffix filtering and deterministic ordering.

use crate::error::{Error, Result};
use std::ffi::OsString;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::{debug, trace};
use walkdir::WalkDir;

/// Ordering applied to listed file names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    /// Lexicographic ascending by file name
    #[default]
    Ascending,
    /// Lexicographic descending by file name
    Descending,
    /// Whatever order the filesystem yields (not stable across platforms)
    None,
}

impl FromStr for SortOrder {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "asc" | "ascending" => Ok(Self::Ascending),
            "desc" | "dsc" | "descending" => Ok(Self::Descending),
            "none" => Ok(Self::None),
            other => Err(Error::invalid_config(format!(
                "unknown sort order '{other}' (expected asc, desc or none)"
            ))),
        }
    }
}

impl fmt::Display for SortOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Ascending => "asc",
            Self::Descending => "desc",
            Self::None => "none",
        })
    }
}

/// A file identified by its name inside a parent directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileEntry {
    /// Directory containing the file
    pub directory: PathBuf,

    /// File name as stored on disk
    pub file_name: OsString,

    /// Printable file name; lossy when the on-disk name is not UTF-8
    pub name: String,
}

impl FileEntry {
    /// Creates a new entry.
    #[must_use]
    pub fn new(directory: impl Into<PathBuf>, file_name: impl Into<OsString>) -> Self {
        let file_name = file_name.into();
        Self {
            directory: directory.into(),
            name: file_name.to_string_lossy().into_owned(),
            file_name,
        }
    }

    /// Returns the full path of the file.
    #[must_use]
    pub fn path(&self) -> PathBuf {
        self.directory.join(&self.file_name)
    }
}

/// Lists the regular files in `directory` whose name ends with `suffix`.
///
/// Only the top level of the directory is read. Symlinks count when they
/// resolve to a regular file. The match is case-sensitive and names are
/// ordered by their on-disk bytes. An existing directory with no matches
/// yields an empty vector.
///
/// # Errors
///
/// Returns [`Error::DirectoryNotFound`] if `directory` does not exist or is
/// not a directory, and an IO error if it cannot be read.
pub fn list_files(directory: &Path, suffix: &str, order: SortOrder) -> Result<Vec<FileEntry>> {
    if !directory.is_dir() {
        return Err(Error::directory_not_found(directory));
    }

    let mut entries = Vec::new();
    for entry in WalkDir::new(directory).min_depth(1).max_depth(1) {
        let entry = entry.map_err(|e| walk_error(directory, e))?;
        if !entry.path().is_file() {
            continue;
        }

        if entry.file_name().as_encoded_bytes().ends_with(suffix.as_bytes()) {
            let file = FileEntry::new(directory, entry.file_name());
            trace!("Listed {}", file.name);
            entries.push(file);
        }
    }

    match order {
        SortOrder::Ascending => entries.sort_by(|a, b| a.file_name.cmp(&b.file_name)),
        SortOrder::Descending => entries.sort_by(|a, b| b.file_name.cmp(&a.file_name)),
        SortOrder::None => {}
    }

    debug!(
        "Found {} '*{}' file(s) in {} (order: {})",
        entries.len(),
        suffix,
        directory.display(),
        order
    );
    Ok(entries)
}

/// Lists documents like [`list_files`], leaving out `output_path`.
///
/// A combined document written into its own input directory would
/// otherwise be read back in on the next run.
///
/// # Errors
///
/// See [`list_files`].
pub fn list_inputs(
    directory: &Path,
    suffix: &str,
    order: SortOrder,
    output_path: &Path,
) -> Result<Vec<FileEntry>> {
    let mut entries = list_files(directory, suffix, order)?;

    if let Ok(output) = output_path.canonicalize() {
        entries.retain(|entry| {
            let is_output = entry
                .path()
                .canonicalize()
                .is_ok_and(|path| path == output);
            if is_output {
                debug!("Not listing previous output {}", entry.name);
            }
            !is_output
        });
    }

    Ok(entries)
}

pub(crate) fn walk_error(directory: &Path, err: walkdir::Error) -> Error {
    let path = err.path().unwrap_or(directory).to_path_buf();
    match err.into_io_error() {
        Some(io) => Error::io("list", path, io),
        None => Error::Io {
            operation: "list",
            path,
            message: "filesystem loop detected".to_string(),
        },
    }
}
