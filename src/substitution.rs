//! Ordered literal find/replace over text and over files in place.
//!
//! Rules run strictly in index order and each one sees the output of the
//! rules before it, so `[("a", "b"), ("b", "c")]` turns `"a"` into `"c"`.
//! Matching is plain substring matching: no regex, no word boundaries.

use crate::{
    error::{Error, Result},
    lister::{list_files, SortOrder},
};
use memchr::memmem;
use serde::Serialize;
use std::{
    ffi::OsString,
    fs,
    io::{ErrorKind, Write},
    path::{Path, PathBuf},
    process,
    sync::atomic::{AtomicU64, Ordering},
};
use tracing::{debug, info, instrument, trace, warn};

static TEMP_COUNTER: AtomicU64 = AtomicU64::new(0);

/// A single target/replacement pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubstitutionRule {
    /// Literal text to find
    pub target: String,

    /// Text written in place of every occurrence (empty deletes)
    pub replacement: String,
}

/// An ordered, validated list of substitution rules.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SubstitutionRules {
    rules: Vec<SubstitutionRule>,
}

/// Text produced by [`SubstitutionRules::apply`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Substitution {
    /// Transformed text
    pub text: String,

    /// Occurrences replaced across all rules
    pub replacements: usize,
}

impl SubstitutionRules {
    /// Pairs `targets[i]` with `replacements[i]`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::RuleCountMismatch`] if the lengths differ and
    /// [`Error::ConfigMalformed`] if a target is empty.
    pub fn new<T, R>(targets: &[T], replacements: &[R]) -> Result<Self>
    where
        T: AsRef<str>,
        R: AsRef<str>,
    {
        if targets.len() != replacements.len() {
            return Err(Error::RuleCountMismatch {
                targets: targets.len(),
                replacements: replacements.len(),
            });
        }

        let rules = targets
            .iter()
            .zip(replacements)
            .enumerate()
            .map(|(index, (target, replacement))| {
                let target = target.as_ref();
                if target.is_empty() {
                    return Err(Error::malformed(
                        None,
                        format!("target_word[{index}] is an empty string"),
                    ));
                }
                Ok(SubstitutionRule {
                    target: target.to_string(),
                    replacement: replacement.as_ref().to_string(),
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self { rules })
    }

    /// Returns the rules in application order.
    #[must_use]
    pub fn rules(&self) -> &[SubstitutionRule] {
        &self.rules
    }

    /// Number of rules.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// Returns true if there are no rules.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Applies every rule in order to `text`.
    #[must_use]
    pub fn apply(&self, text: &str) -> Substitution {
        let mut current = text.to_string();
        let mut replacements = 0;

        for rule in &self.rules {
            let count = memmem::find_iter(current.as_bytes(), rule.target.as_bytes()).count();
            if count == 0 {
                continue;
            }
            trace!("'{}' -> '{}' x{}", rule.target, rule.replacement, count);
            current = current.replace(&rule.target, &rule.replacement);
            replacements += count;
        }

        Substitution {
            text: current,
            replacements,
        }
    }
}

/// Applies `targets[i] -> replacements[i]` to `text` in index order.
///
/// # Errors
///
/// Returns [`Error::RuleCountMismatch`] when the sequences differ in length;
/// no substitution is performed in that case.
pub fn apply<T, R>(text: &str, targets: &[T], replacements: &[R]) -> Result<String>
where
    T: AsRef<str>,
    R: AsRef<str>,
{
    Ok(SubstitutionRules::new(targets, replacements)?.apply(text).text)
}

/// What happened to a single file during [`process_all`].
#[derive(Debug, Clone, Serialize)]
pub struct FileOutcome {
    /// File that was processed
    pub path: PathBuf,

    /// Occurrences replaced; zero means the file was left untouched
    pub replacements: usize,
}

/// Outcome of an in-place batch substitution.
#[derive(Debug, Clone, Default, Serialize)]
pub struct BatchReport {
    /// Files that were read successfully, changed or not
    pub processed: Vec<FileOutcome>,

    /// Files that could not be read or written
    pub failures: Vec<Error>,
}

impl BatchReport {
    /// Number of files whose content changed.
    #[must_use]
    pub fn files_changed(&self) -> usize {
        self.processed.iter().filter(|f| f.replacements > 0).count()
    }

    /// Total occurrences replaced across the batch.
    #[must_use]
    pub fn total_replacements(&self) -> usize {
        self.processed.iter().map(|f| f.replacements).sum()
    }
}

/// Rewrites a single file with `rules` applied.
///
/// The file is only written when at least one occurrence was replaced.
///
/// # Errors
///
/// Returns an error if the file cannot be read or written back.
pub fn process_file(path: &Path, rules: &SubstitutionRules) -> Result<FileOutcome> {
    let content = fs::read_to_string(path).map_err(|e| Error::io("read", path, e))?;
    let result = rules.apply(&content);

    if result.replacements > 0 {
        write_file_atomic(path, &result.text)?;
        debug!(
            "Replaced {} occurrence(s) in {}",
            result.replacements,
            path.display()
        );
    } else {
        trace!("No matches in {}", path.display());
    }

    Ok(FileOutcome {
        path: path.to_path_buf(),
        replacements: result.replacements,
    })
}

/// Applies `rules` to every `*suffix` file directly inside `directory`.
///
/// # Errors
///
/// Returns [`Error::DirectoryNotFound`] if the directory is missing.
/// Per-file failures are collected in the report instead.
#[instrument(skip(rules), fields(rule_count = rules.len()))]
pub fn process_all(directory: &Path, suffix: &str, rules: &SubstitutionRules) -> Result<BatchReport> {
    let entries = list_files(directory, suffix, SortOrder::Ascending)?;
    if entries.is_empty() {
        info!("No '*{}' files found in {}", suffix, directory.display());
        return Ok(BatchReport::default());
    }

    let mut report = BatchReport::default();
    for entry in &entries {
        match process_file(&entry.path(), rules) {
            Ok(outcome) => report.processed.push(outcome),
            Err(e) => {
                warn!("Substitution skipped: {}", e);
                report.failures.push(e);
            }
        }
    }

    info!(
        "Replaced {} occurrence(s) in {} of {} file(s)",
        report.total_replacements(),
        report.files_changed(),
        entries.len()
    );
    Ok(report)
}

/// Replaces `path` with `content` through a sibling temp file and a rename,
/// so a failed write never leaves a half-written document behind.
///
/// The temp file is hidden, carries the process id and a counter, and is
/// opened with `create_new` so an existing file is never clobbered.
fn write_file_atomic(path: &Path, content: &str) -> Result<()> {
    let file_name = path
        .file_name()
        .ok_or_else(|| Error::invalid_config(format!("not a file path: {}", path.display())))?;

    let (temp_path, mut temp_file) = loop {
        let mut temp_name = OsString::from(".");
        temp_name.push(file_name);
        temp_name.push(format!(
            ".{}.{}.tmp",
            process::id(),
            TEMP_COUNTER.fetch_add(1, Ordering::Relaxed)
        ));
        let temp_path = path.with_file_name(temp_name);

        match fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&temp_path)
        {
            Ok(file) => break (temp_path, file),
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                trace!("Temp file {} taken, retrying", temp_path.display());
            }
            Err(e) => return Err(Error::io("create", &temp_path, e)),
        }
    };

    let mut written = temp_file.write_all(content.as_bytes());
    if written.is_ok() {
        written = temp_file.sync_all();
    }
    drop(temp_file);
    if let Err(e) = written {
        let _ = fs::remove_file(&temp_path);
        return Err(Error::io("write", &temp_path, e));
    }

    fs::rename(&temp_path, path).map_err(|e| {
        let _ = fs::remove_file(&temp_path);
        Error::io("replace", path, e)
    })
}
