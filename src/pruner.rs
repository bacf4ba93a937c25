use crate::{
    error::{Error, Result},
    lister::walk_error,
};
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
};
use tracing::{debug, info, instrument, warn};
use walkdir::WalkDir;

/// Literal substrings that mark a file name for deletion.
///
/// A name matches when it contains any of the substrings. There is no glob
/// or regex interpretation; `"backup"` matches `report_backup.md` as well
/// as `backup`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RemovalFilter(Vec<String>);

impl RemovalFilter {
    /// Creates a filter from substrings.
    #[must_use]
    pub fn new<I, S>(substrings: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(substrings.into_iter().map(Into::into).collect())
    }

    /// Returns the first substring contained in `name`.
    #[must_use]
    pub fn matching(&self, name: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|needle| !needle.is_empty() && name.contains(needle.as_str()))
            .map(String::as_str)
    }

    /// Returns true if there is nothing to match.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.iter().all(String::is_empty)
    }

    /// The substrings in configuration order.
    #[must_use]
    pub fn substrings(&self) -> &[String] {
        &self.0
    }
}

/// Result of a single deletion attempt.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", content = "error", rename_all = "snake_case")]
pub enum RemovalStatus {
    /// The file is gone
    Removed,
    /// Deletion failed
    Failed(Error),
}

/// One matched entry and what happened to it.
#[derive(Debug, Clone, Serialize)]
pub struct PruneOutcome {
    /// Entry name
    pub name: String,

    /// Full path
    pub path: PathBuf,

    /// The filter substring that selected the entry
    pub matched: String,

    /// Deletion result
    pub status: RemovalStatus,
}

impl PruneOutcome {
    /// Returns true if the file was deleted.
    #[must_use]
    pub const fn is_removed(&self) -> bool {
        matches!(self.status, RemovalStatus::Removed)
    }
}

/// Deletes every entry of `directory` whose name contains a filter substring.
///
/// All entries are considered regardless of extension; non-matching entries
/// are left alone and do not appear in the result. Each matching entry is
/// deleted once even if several substrings match it. Outcomes are in name
/// order.
///
/// # Errors
///
/// Returns [`Error::DirectoryNotFound`] if the directory is missing, or an
/// IO error if it cannot be enumerated. Individual deletion failures are
/// reported in the returned outcomes.
#[instrument(skip(filter), fields(filter_count = filter.substrings().len()))]
pub fn prune(directory: &Path, filter: &RemovalFilter) -> Result<Vec<PruneOutcome>> {
    if !directory.is_dir() {
        return Err(Error::directory_not_found(directory));
    }

    let mut outcomes = Vec::new();
    if filter.is_empty() {
        info!("Removal filter is empty; nothing to prune");
        return Ok(outcomes);
    }

    for entry in WalkDir::new(directory)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
    {
        let entry = entry.map_err(|e| walk_error(directory, e))?;
        let name = entry.file_name().to_string_lossy().into_owned();

        let Some(matched) = filter.matching(&name) else {
            continue;
        };

        let path = entry.into_path();
        let status = match fs::remove_file(&path) {
            Ok(()) => {
                info!("Removed file: {}", path.display());
                RemovalStatus::Removed
            }
            Err(e) => {
                let err = Error::io("remove", &path, e);
                warn!("{}", err);
                RemovalStatus::Failed(err)
            }
        };

        outcomes.push(PruneOutcome {
            name,
            path,
            matched: matched.to_string(),
            status,
        });
    }

    let removed = outcomes.iter().filter(|o| o.is_removed()).count();
    debug!(
        "Pruned {} of {} matching entr(ies) in {}",
        removed,
        outcomes.len(),
        directory.display()
    );
    Ok(outcomes)
}
